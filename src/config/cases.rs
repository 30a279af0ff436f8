//! Case and HTTP mock definitions

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::faults::CaseOptions;
use crate::error::{EmulatorError, EmulatorResult};
use crate::matching::template;

/// A trigger pattern and the reply it produces.
///
/// Exactly one of `handler` (a registered handler id) or `reply`
/// (a template rendered with the extracted variables) must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseConfig {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(flatten)]
    pub options: CaseOptions,
}

impl CaseConfig {
    pub fn reply(pattern: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            reply: Some(reply.into()),
            ..Default::default()
        }
    }

    pub fn handler(pattern: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            handler: Some(handler.into()),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.options.id = Some(id.into());
        self
    }

    /// Id used in logs: the configured id or the pattern itself
    pub fn label(&self) -> &str {
        self.options.id.as_deref().unwrap_or(&self.pattern)
    }

    pub fn validate(&self, index: usize) -> EmulatorResult<()> {
        let param = format!("cases[{index}]");

        if self.pattern.trim().is_empty() {
            return Err(EmulatorError::Validation {
                message: "pattern cannot be empty".to_string(),
                param: Some(format!("{param}.pattern")),
            });
        }

        let dups = template::duplicate_placeholders(&self.pattern);
        if !dups.is_empty() {
            return Err(EmulatorError::Validation {
                message: format!("placeholder names must be unique, repeated: {}", dups.join(", ")),
                param: Some(format!("{param}.pattern")),
            });
        }

        match (&self.handler, &self.reply) {
            (Some(_), Some(_)) => {
                return Err(EmulatorError::Validation {
                    message: "set either handler or reply, not both".to_string(),
                    param: Some(param),
                })
            }
            (None, None) => {
                return Err(EmulatorError::Validation {
                    message: "case needs a handler or a reply".to_string(),
                    param: Some(param),
                })
            }
            _ => {}
        }

        self.options.validate(&param)
    }
}

/// Method and `:param` path template of an HTTP mock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpMatch {
    /// Absent or empty matches any method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub path: String,
}

impl HttpMatch {
    pub fn accepts(&self, method: &str) -> bool {
        match self.method.as_deref() {
            None | Some("") => true,
            Some(want) => want.eq_ignore_ascii_case(method),
        }
    }
}

/// Generic HTTP mock served by the fallback route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpMockConfig {
    #[serde(rename = "match")]
    pub route: HttpMatch,
    /// Registered mock handler id; takes precedence over `body`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    #[serde(default = "default_status")]
    pub status: u16,
    /// Static body; string leaves are rendered with the path params
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(flatten)]
    pub options: CaseOptions,
}

fn default_status() -> u16 {
    200
}

impl HttpMockConfig {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            route: HttpMatch {
                method: Some(method.to_string()),
                path: path.to_string(),
            },
            handler: None,
            status: 200,
            body: None,
            headers: HashMap::new(),
            options: CaseOptions::default(),
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn validate(&self, index: usize) -> EmulatorResult<()> {
        let param = format!("http_mocks[{index}]");
        if !(100..=599).contains(&self.status) {
            return Err(EmulatorError::Validation {
                message: format!("status must be between 100 and 599, got {}", self.status),
                param: Some(format!("{param}.status")),
            });
        }
        if self.route.path.is_empty() {
            return Err(EmulatorError::Validation {
                message: "path cannot be empty".to_string(),
                param: Some(format!("{param}.match.path")),
            });
        }
        self.options.validate(&param)
    }
}
