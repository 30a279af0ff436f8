//! Health, metrics and admin endpoints

use super::common::*;
use serde_json::{json, Value};

#[tokio::test]
async fn test_health() {
    let server = TestServer::spawn().await;

    let response = server.get("/health").await;
    assert_status(&response, 200);
    assert!(response.headers().contains_key("x-request-id"));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "ok": true, "env": "local" }));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = TestServer::spawn().await;

    let response = server
        .client
        .get(server.url("/health"))
        .header("x-request-id", "trace-123")
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-123");
}

#[tokio::test]
async fn test_metrics_exposition() {
    let server = TestServer::spawn().await;

    server
        .post("/v1/chat/completions", chat_request("gpt-4o", "hello Ada"))
        .await;
    let response = server.get("/metrics").await;
    assert_status(&response, 200);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));

    let text = response.text().await.unwrap();
    assert!(text.contains(r#"llm_emulator_requests_total{provider="openai.chat"} 1"#));
    assert!(text.contains("llm_emulator_http_requests_total"));
    assert!(text.contains("# TYPE llm_emulator_faults_total counter"));
}

#[tokio::test]
async fn test_stats_and_reset() {
    let server = TestServer::spawn().await;

    server
        .post("/v1/chat/completions", chat_request("gpt-4o", "hello Ada"))
        .await;
    server
        .post("/v1/chat/completions", chat_request("gpt-4o", "zzzz qqqq"))
        .await;

    let stats: Value = server.get("/_emulator/stats").await.json().await.unwrap();
    assert_eq!(stats["total_requests"], 2);
    assert_eq!(stats["fallbacks"], 1);
    assert_eq!(stats["by_provider"]["openai.chat"], 2);
    assert_eq!(stats["by_case"]["hello {{name}}"], 1);
    assert!(stats["active_scenario"].is_null());
    assert!(stats["uptime_seconds"].is_u64());

    let response = server.post("/_emulator/stats/reset", json!({})).await;
    assert_status(&response, 204);

    let stats: Value = server.get("/_emulator/stats").await.json().await.unwrap();
    assert_eq!(stats["total_requests"], 0);
}
