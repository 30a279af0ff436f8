//! Common test utilities for integration tests
//!
//! Provides test server spawning, request builders, and assertions.

use std::net::SocketAddr;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use llm_emulator::{
    config::{CaseConfig, EmulatorConfig, LatencyProfile},
    server::{create_router, AppState},
    EmulatorEngine, HandlerRegistry,
};

/// Test server wrapper
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub base_url: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawn a test server with a small default case set
    pub async fn spawn() -> Self {
        Self::spawn_with_config(test_config()).await
    }

    pub async fn spawn_with_config(config: EmulatorConfig) -> Self {
        Self::spawn_with(config, HandlerRegistry::with_builtins()).await
    }

    /// Spawn a test server with custom configuration and handlers
    pub async fn spawn_with(mut config: EmulatorConfig, registry: HandlerRegistry) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        config.server.host = "127.0.0.1".to_string();
        config.server.port = addr.port();
        config.server.request_logging = false;

        let engine = EmulatorEngine::new(config, registry).unwrap();
        let app = create_router(AppState::new(engine));

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .unwrap();
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();
        let base_url = format!("http://{}", addr);

        for _ in 0..50 {
            if client.get(format!("{}/health", base_url)).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        Self {
            addr,
            client,
            base_url,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    /// Send a POST request with JSON body
    pub async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    /// POST bound to a scenario session
    pub async fn post_in_session(&self, path: &str, body: Value, session: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .header("x-emulator-session", session)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn put(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// A case with no latency
pub fn instant_case(pattern: &str, reply: &str) -> CaseConfig {
    let mut case = CaseConfig::reply(pattern, reply);
    case.options.latency = Some(LatencyProfile::instant());
    case
}

/// Config with instant latency everywhere and a few cases
pub fn test_config() -> EmulatorConfig {
    let mut config = EmulatorConfig::default();
    config.seed = Some(7);
    config.defaults.latency = Some(LatencyProfile::instant());
    config.cases = vec![
        instant_case("hello {{name}}", "Hi {{name}}!"),
        instant_case("what is the capital of {{state}}", "The capital of {{state}} is Mockville."),
    ];
    config
}

/// Create a simple chat request
pub fn chat_request(model: &str, message: &str) -> Value {
    json!({
        "model": model,
        "messages": [
            {
                "role": "user",
                "content": message
            }
        ]
    })
}

pub fn streaming_chat_request(model: &str, message: &str) -> Value {
    let mut req = chat_request(model, message);
    req["stream"] = json!(true);
    req
}

/// Create a Google Gemini request
pub fn gemini_request(message: &str) -> Value {
    json!({
        "contents": [
            {
                "role": "user",
                "parts": [
                    {
                        "text": message
                    }
                ]
            }
        ]
    })
}

/// Create an embeddings request
pub fn embeddings_request(model: &str, input: Value) -> Value {
    json!({
        "model": model,
        "input": input
    })
}

/// Reply text of a chat completion
pub fn chat_content(body: &Value) -> &str {
    body["choices"][0]["message"]["content"].as_str().unwrap_or_default()
}

/// `data:` payloads of an SSE body
pub fn sse_data(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.trim().to_string())
        .collect()
}

/// Concatenated delta content of SSE frames
pub fn sse_content(frames: &[String]) -> String {
    frames
        .iter()
        .filter_map(|f| serde_json::from_str::<Value>(f).ok())
        .filter_map(|v| v["choices"][0]["delta"]["content"].as_str().map(str::to_string))
        .collect()
}

pub fn assert_status(response: &reqwest::Response, expected: u16) {
    assert_eq!(
        response.status().as_u16(),
        expected,
        "Expected status {}, got {}",
        expected,
        response.status()
    );
}

/// Assert JSON field exists
pub fn assert_json_field(json: &Value, field: &str) {
    assert!(
        json.get(field).is_some(),
        "Expected field '{}' to exist in {:?}",
        field,
        json
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_server() {
        let server = TestServer::spawn().await;
        let response = server.get("/health").await;
        assert_eq!(response.status().as_u16(), 200);
    }

    #[test]
    fn test_sse_helpers() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"Hi \"}}]}\n\ndata: [DONE]\n\n";
        let frames = sse_data(body);
        assert_eq!(frames.len(), 2);
        assert_eq!(sse_content(&frames), "Hi ");
    }
}
