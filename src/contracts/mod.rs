//! JSON-schema contract checks for request and response payloads.
//!
//! Schemas live in `<schema_dir>/<name>.json` and are compiled once.
//! A missing schema passes. In `warn` mode violations are logged; in
//! `strict` mode they fail the request.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use crate::config::{ContractMode, ContractsConfig};
use crate::error::{EmulatorError, EmulatorResult};

/// Which side of the exchange is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Request,
    Response,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
        }
    }
}

/// Compiled schema, or the reason it could not be loaded
#[derive(Clone)]
enum Compiled {
    Missing,
    Ready(Arc<jsonschema::Validator>),
    Broken(String),
}

pub struct ContractValidator {
    schema_dir: PathBuf,
    mode: ContractMode,
    cache: DashMap<String, Compiled>,
}

impl ContractValidator {
    pub fn new(config: &ContractsConfig) -> Self {
        Self::with_dir(&config.schema_dir, config.mode)
    }

    pub fn with_dir(schema_dir: impl AsRef<Path>, mode: ContractMode) -> Self {
        Self {
            schema_dir: schema_dir.as_ref().to_path_buf(),
            mode,
            cache: DashMap::new(),
        }
    }

    pub fn mode(&self) -> ContractMode {
        self.mode
    }

    fn compiled(&self, name: &str) -> Compiled {
        if let Some(hit) = self.cache.get(name) {
            return hit.clone();
        }
        let compiled = self.load(name);
        self.cache.insert(name.to_string(), compiled.clone());
        compiled
    }

    fn load(&self, name: &str) -> Compiled {
        let path = self.schema_dir.join(format!("{name}.json"));
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return Compiled::Missing;
        };
        let schema: Value = match serde_json::from_str(&raw) {
            Ok(schema) => schema,
            Err(e) => return Compiled::Broken(format!("invalid schema JSON: {e}")),
        };
        match jsonschema::draft202012::new(&schema) {
            Ok(validator) => Compiled::Ready(Arc::new(validator)),
            Err(e) => Compiled::Broken(format!("failed to compile schema: {e}")),
        }
    }

    /// Violations of `payload` against the named schema, joined by `"; "`
    pub fn violations(&self, name: &str, payload: &Value) -> Option<String> {
        match self.compiled(name) {
            Compiled::Missing => None,
            Compiled::Broken(reason) => Some(reason),
            Compiled::Ready(validator) => {
                let errs = validator
                    .iter_errors(payload)
                    .map(|e| format!("{} {}", e.instance_path, e))
                    .collect::<Vec<_>>();
                (!errs.is_empty()).then(|| errs.join("; "))
            }
        }
    }

    /// Check a payload; `mode` overrides the configured mode.
    ///
    /// Returns `Ok(true)` when the payload conforms or no schema exists.
    pub fn validate(
        &self,
        kind: PayloadKind,
        name: &str,
        payload: &Value,
        mode: Option<ContractMode>,
    ) -> EmulatorResult<bool> {
        let mode = mode.unwrap_or(self.mode);

        if matches!(self.compiled(name), Compiled::Missing) {
            tracing::debug!(kind = kind.as_str(), name, "contracts.miss");
            return Ok(true);
        }

        let Some(errs) = self.violations(name, payload) else {
            return Ok(true);
        };

        if mode == ContractMode::Strict {
            return Err(EmulatorError::Contract {
                name: name.to_string(),
                message: format!("Schema violation {name}: {errs}"),
            });
        }
        tracing::warn!(kind = kind.as_str(), name, errs = %errs, "contracts.warn");
        Ok(false)
    }
}
