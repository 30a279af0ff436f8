//! Cassette recording and replay
//!
//! Each endpoint gets one JSON-lines file under the cassette directory.
//! Configured header names and body keys are redacted before anything
//! touches disk.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;

use crate::config::{VcrConfig, VcrMode};

pub const REDACTED: &str = "[REDACTED]";

/// One recorded interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CassetteEntry {
    pub endpoint: String,
    pub request: Value,
    pub response: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<String>,
}

pub struct CassetteRecorder {
    config: VcrConfig,
}

impl CassetteRecorder {
    pub fn new(config: VcrConfig) -> Self {
        Self { config }
    }

    pub fn is_recording(&self) -> bool {
        self.config.enabled && self.config.mode == VcrMode::Record
    }

    pub fn is_replaying(&self) -> bool {
        self.config.enabled && self.config.mode == VcrMode::Replay
    }

    /// `/v1/chat/completions` is stored as `_v1_chat_completions.jsonl`
    pub fn cassette_path(&self, endpoint: &str) -> PathBuf {
        let stem: String = endpoint
            .chars()
            .map(|c| if c == '/' || c == ':' { '_' } else { c })
            .collect();
        self.config.cassette_dir.join(format!("{stem}.jsonl"))
    }

    /// Replace redacted keys anywhere in the value
    pub fn redact(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| {
                        let v = if self.is_redacted(k) {
                            Value::String(REDACTED.to_string())
                        } else {
                            self.redact(v)
                        };
                        (k.clone(), v)
                    })
                    .collect::<Map<_, _>>(),
            ),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact(v)).collect()),
            other => other.clone(),
        }
    }

    fn is_redacted(&self, key: &str) -> bool {
        self.config.redact.iter().any(|r| r.eq_ignore_ascii_case(key))
    }

    /// Append an interaction; write failures are logged and swallowed
    pub async fn record(&self, endpoint: &str, request: &Value, response: &Value) {
        let entry = CassetteEntry {
            endpoint: endpoint.to_string(),
            request: self.redact(request),
            response: self.redact(response),
            recorded_at: Some(chrono::Utc::now().to_rfc3339()),
        };
        let path = self.cassette_path(endpoint);

        if let Err(e) = self.append(&path, &entry).await {
            tracing::warn!(path = %path.display(), error = %e, "vcr.error");
            return;
        }
        tracing::debug!(endpoint, path = %path.display(), "vcr.record");
    }

    async fn append(&self, path: &PathBuf, entry: &CassetteEntry) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.config.cassette_dir).await?;
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }

    /// All entries of an endpoint's cassette; unreadable lines are skipped
    pub async fn entries(&self, endpoint: &str) -> Vec<CassetteEntry> {
        let Ok(raw) = tokio::fs::read_to_string(self.cassette_path(endpoint)).await else {
            return Vec::new();
        };
        raw.lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect()
    }

    /// Response of the first entry whose request matches after redaction
    pub async fn replay(&self, endpoint: &str, request: &Value) -> Option<Value> {
        let wanted = self.redact(request);
        let hit = self
            .entries(endpoint)
            .await
            .into_iter()
            .find(|e| e.request == wanted)
            .map(|e| e.response);
        if hit.is_some() {
            tracing::debug!(endpoint, "vcr.replay");
        }
        hit
    }
}
