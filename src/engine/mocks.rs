//! Static HTTP mock responses

use std::collections::HashMap;

use serde_json::Value;

use crate::config::HttpMockConfig;
use crate::handlers::MockResponse;
use crate::matching::template::render_template;

/// Render every string leaf of `body` with the bound path parameters
pub fn render_body(body: &Value, params: &HashMap<String, String>) -> Value {
    match body {
        Value::String(s) => Value::String(render_template(s, params)),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_body(v, params)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_body(v, params)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Response of a mock that has no handler
pub fn static_response(mock: &HttpMockConfig, params: &HashMap<String, String>) -> MockResponse {
    MockResponse {
        status: mock.status,
        body: mock
            .body
            .as_ref()
            .map_or(Value::Null, |body| render_body(body, params)),
        headers: mock.headers.clone(),
    }
}
