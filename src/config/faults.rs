//! Fault, latency and per-case option configuration

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::error::{EmulatorError, EmulatorResult};

/// HTTP statuses a fault may produce by name (`HTTP_<code>`)
pub const FAULT_HTTP_CODES: [u16; 10] = [400, 401, 403, 404, 409, 422, 429, 500, 502, 503];

/// Conjunction of equality predicates over a request context.
///
/// Every field that is set must equal the corresponding context value;
/// an empty condition always applies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Condition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    #[serde(alias = "testTag", skip_serializing_if = "Option::is_none")]
    pub test_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub params: HashMap<String, String>,
}

impl Condition {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Check the condition against a request context
    pub fn matches(&self, ctx: &RequestContext) -> bool {
        fn eq(expected: &Option<String>, actual: Option<&str>) -> bool {
            match expected {
                Some(e) => actual == Some(e.as_str()),
                None => true,
            }
        }

        if !eq(&self.env, Some(ctx.env.as_str())) {
            return false;
        }
        if !eq(&self.test_tag, ctx.test_tag.as_deref()) {
            return false;
        }
        if !eq(&self.provider, Some(ctx.provider.as_str())) {
            return false;
        }
        if !eq(&self.model, ctx.model.as_deref()) {
            return false;
        }
        if let Some(stream) = self.stream {
            if ctx.stream != stream {
                return false;
            }
        }

        // header names are case-insensitive, the context stores them lowercased
        let headers_ok = self
            .headers
            .iter()
            .all(|(k, v)| ctx.headers.get(&k.to_ascii_lowercase()) == Some(v));
        let params_ok = self.params.iter().all(|(k, v)| ctx.params.get(k) == Some(v));

        headers_ok && params_ok
    }
}

/// Controlled vocabulary of simulated failures
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FaultKind {
    /// Never respond
    Timeout,
    /// `HTTP_<code>` for one of [`FAULT_HTTP_CODES`]
    Http(u16),
    MalformedJson,
    StreamDropAfter,
    StreamDuplicateChunk,
    /// Anything else; treated as "no fault" at dispatch time
    Unknown(String),
}

impl FaultKind {
    pub fn is_stream_fault(&self) -> bool {
        matches!(self, Self::StreamDropAfter | Self::StreamDuplicateChunk)
    }

    /// Label used in logs and metrics
    pub fn as_str(&self) -> String {
        match self {
            Self::Timeout => "TIMEOUT".to_string(),
            Self::Http(code) => format!("HTTP_{code}"),
            Self::MalformedJson => "MALFORMED_JSON".to_string(),
            Self::StreamDropAfter => "STREAM_DROP_AFTER".to_string(),
            Self::StreamDuplicateChunk => "STREAM_DUPLICATE_CHUNK".to_string(),
            Self::Unknown(name) => name.clone(),
        }
    }
}

impl From<String> for FaultKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "TIMEOUT" => Self::Timeout,
            "MALFORMED_JSON" => Self::MalformedJson,
            "STREAM_DROP_AFTER" => Self::StreamDropAfter,
            "STREAM_DUPLICATE_CHUNK" => Self::StreamDuplicateChunk,
            other => other
                .strip_prefix("HTTP_")
                .and_then(|code| code.parse::<u16>().ok())
                .filter(|code| FAULT_HTTP_CODES.contains(code))
                .map(Self::Http)
                .unwrap_or(Self::Unknown(value)),
        }
    }
}

impl From<FaultKind> for String {
    fn from(kind: FaultKind) -> Self {
        kind.as_str()
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

/// One configured fault
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultSpec {
    pub kind: FaultKind,
    /// Probability of firing once the condition matches
    #[serde(default = "default_ratio")]
    pub ratio: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Condition>,
    /// Replacement response body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    #[serde(default, alias = "retryAfterSec", skip_serializing_if = "Option::is_none")]
    pub retry_after_sec: Option<u64>,
    /// Content chunks emitted before `STREAM_DROP_AFTER` cuts the stream
    #[serde(default, alias = "afterChunks", skip_serializing_if = "Option::is_none")]
    pub after_chunks: Option<usize>,
}

fn default_ratio() -> f64 {
    1.0
}

impl FaultSpec {
    pub fn new(kind: FaultKind) -> Self {
        Self {
            kind,
            ratio: 1.0,
            when: None,
            body: None,
            retry_after_sec: None,
            after_chunks: None,
        }
    }

    pub fn with_ratio(mut self, ratio: f64) -> Self {
        self.ratio = ratio;
        self
    }

    pub fn with_when(mut self, when: Condition) -> Self {
        self.when = Some(when);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.ratio) {
            return Err(format!("ratio must be between 0.0 and 1.0, got {}", self.ratio));
        }
        Ok(())
    }
}

/// Conditional latency override; the last matching entry wins
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<Condition>,
    #[serde(alias = "meanMs", skip_serializing_if = "Option::is_none")]
    pub mean_ms: Option<f64>,
    #[serde(alias = "p95Ms", skip_serializing_if = "Option::is_none")]
    pub p95_ms: Option<f64>,
}

/// Latency profile for a case or for the defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyProfile {
    #[serde(alias = "meanMs", skip_serializing_if = "Option::is_none")]
    pub mean_ms: Option<f64>,
    #[serde(alias = "p95Ms", skip_serializing_if = "Option::is_none")]
    pub p95_ms: Option<f64>,
    #[serde(alias = "jitterMs", skip_serializing_if = "Option::is_none")]
    pub jitter_ms: Option<f64>,
    /// Accepted for compatibility, sampling ignores it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<LatencyOverride>,
}

impl LatencyProfile {
    /// Profile that never sleeps
    pub fn instant() -> Self {
        Self {
            mean_ms: Some(0.0),
            p95_ms: Some(0.0),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let values = [self.mean_ms, self.p95_ms, self.jitter_ms]
            .into_iter()
            .chain(self.overrides.iter().flat_map(|o| [o.mean_ms, o.p95_ms]))
            .flatten();
        for v in values {
            if !v.is_finite() || v < 0.0 {
                return Err(format!("latency values must be finite and non-negative, got {v}"));
            }
        }
        Ok(())
    }
}

/// Contract names to check for a case
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidateHint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<super::ContractMode>,
}

/// Options carried by a case or an HTTP mock
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencyProfile>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub faults: Vec<FaultSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate: Option<ValidateHint>,
}

impl CaseOptions {
    pub fn validate(&self, param: &str) -> EmulatorResult<()> {
        if let Some(latency) = &self.latency {
            latency.validate().map_err(|message| EmulatorError::Validation {
                message,
                param: Some(format!("{param}.latency")),
            })?;
        }
        for (i, fault) in self.faults.iter().enumerate() {
            fault.validate().map_err(|message| EmulatorError::Validation {
                message,
                param: Some(format!("{param}.faults[{i}]")),
            })?;
            if let FaultKind::Unknown(name) = &fault.kind {
                tracing::warn!(fault = %name, at = %param, "unknown fault kind will never fire");
            }
        }
        Ok(())
    }
}
