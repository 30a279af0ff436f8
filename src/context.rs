//! Per-request context shared by matching, faults and scenarios

use std::collections::HashMap;

use axum::http::HeaderMap;
use serde::Serialize;

use crate::config::FaultSpec;

/// What the emulator knows about the request being served
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestContext {
    pub request_id: String,
    pub env: String,
    pub test_tag: Option<String>,
    /// Endpoint family, e.g. `openai.chat` or `gemini.generateContent`
    pub provider: String,
    pub model: Option<String>,
    pub stream: bool,
    /// Lowercased header names
    pub headers: HashMap<String, String>,
    /// Query parameters
    pub params: HashMap<String, String>,
    /// Stream fault selected by the injector, applied by the transport
    #[serde(skip)]
    pub stream_fault: Option<FaultSpec>,
}

impl RequestContext {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            env: "local".to_string(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Copy headers, lowercasing names and skipping non-UTF-8 values
    pub fn with_headers(mut self, headers: &HeaderMap) -> Self {
        self.headers = headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        self
    }

    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}
