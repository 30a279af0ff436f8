//! Fault injection over HTTP

use std::time::Duration;

use super::common::*;
use serde_json::{json, Value};

use llm_emulator::config::{CaseConfig, Condition, EmulatorConfig, FaultKind, FaultSpec};

fn faulty_case(pattern: &str, fault: FaultSpec) -> CaseConfig {
    let mut case = instant_case(pattern, "one two three four");
    case.options.faults = vec![fault];
    case
}

fn fault_config() -> EmulatorConfig {
    let rate_limited = FaultSpec {
        retry_after_sec: Some(10),
        ..FaultSpec::new(FaultKind::Http(429))
    };
    let server_error = FaultSpec {
        body: Some(json!({ "error": { "message": "boom", "type": "server_error" } })),
        ..FaultSpec::new(FaultKind::Http(500))
    };
    let drop_after = FaultSpec {
        after_chunks: Some(2),
        ..FaultSpec::new(FaultKind::StreamDropAfter)
    };
    let chaos_only = FaultSpec::new(FaultKind::Http(503)).with_when(Condition {
        env: Some("chaos".to_string()),
        ..Default::default()
    });

    let mut config = test_config();
    config.cases.extend([
        faulty_case("rate limit me", rate_limited),
        faulty_case("break the server", server_error),
        faulty_case("send broken json", FaultSpec::new(FaultKind::MalformedJson)),
        faulty_case("drop my stream", drop_after),
        faulty_case("stutter my stream", FaultSpec::new(FaultKind::StreamDuplicateChunk)),
        faulty_case("never fire", FaultSpec::new(FaultKind::Http(500)).with_ratio(0.0)),
        faulty_case("only in chaos", chaos_only),
        faulty_case("hang forever", FaultSpec::new(FaultKind::Timeout)),
        faulty_case("made up fault", FaultSpec::new(FaultKind::from("HTTP_418".to_string()))),
    ]);
    config
}

#[tokio::test]
async fn test_rate_limit_fault() {
    let server = TestServer::spawn_with_config(fault_config()).await;

    let response = server
        .post("/v1/chat/completions", chat_request("gpt-4o", "rate limit me"))
        .await;
    assert_status(&response, 429);
    assert_eq!(response.headers()["retry-after"], "10");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": { "message": "rate limited" } }));
}

#[tokio::test]
async fn test_http_fault_uses_configured_body() {
    let server = TestServer::spawn_with_config(fault_config()).await;

    let response = server
        .post("/v1/chat/completions", chat_request("gpt-4o", "break the server"))
        .await;
    assert_status(&response, 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["message"], "boom");
}

#[tokio::test]
async fn test_malformed_json_fault() {
    let server = TestServer::spawn_with_config(fault_config()).await;

    let response = server
        .post("/v1/chat/completions", chat_request("gpt-4o", "send broken json"))
        .await;
    assert_status(&response, 200);
    assert_eq!(response.headers()["content-type"], "application/json");
    let text = response.text().await.unwrap();
    assert!(serde_json::from_str::<Value>(&text).is_err());
}

#[tokio::test]
async fn test_stream_drop_after() {
    let server = TestServer::spawn_with_config(fault_config()).await;

    let response = server
        .post("/v1/chat/completions", streaming_chat_request("gpt-4o", "drop my stream"))
        .await;
    assert_status(&response, 200);
    let frames = sse_data(&response.text().await.unwrap());

    assert_eq!(frames.len(), 3);
    assert_eq!(sse_content(&frames), "one two ");
    assert!(!frames.iter().any(|f| f == "[DONE]"));
}

#[tokio::test]
async fn test_stream_duplicate_chunk() {
    let server = TestServer::spawn_with_config(fault_config()).await;

    let response = server
        .post("/v1/chat/completions", streaming_chat_request("gpt-4o", "stutter my stream"))
        .await;
    let frames = sse_data(&response.text().await.unwrap());

    assert_eq!(sse_content(&frames), "one one two three four");
    assert_eq!(frames.last().map(String::as_str), Some("[DONE]"));
}

#[tokio::test]
async fn test_stream_fault_ignored_without_streaming() {
    let server = TestServer::spawn_with_config(fault_config()).await;

    let body: Value = server
        .post("/v1/chat/completions", chat_request("gpt-4o", "drop my stream"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(chat_content(&body), "one two three four");
}

#[tokio::test]
async fn test_zero_ratio_and_unmet_condition_never_fire() {
    let server = TestServer::spawn_with_config(fault_config()).await;

    for text in ["never fire", "only in chaos", "made up fault"] {
        let response = server
            .post("/v1/chat/completions", chat_request("gpt-4o", text))
            .await;
        assert_status(&response, 200);
    }
}

#[tokio::test]
async fn test_condition_matches_env() {
    let mut config = fault_config();
    config.env = "chaos".to_string();
    let server = TestServer::spawn_with_config(config).await;

    let response = server
        .post("/v1/chat/completions", chat_request("gpt-4o", "only in chaos"))
        .await;
    assert_status(&response, 503);
}

#[tokio::test]
async fn test_timeout_fault_never_responds() {
    let server = TestServer::spawn_with_config(fault_config()).await;

    let result = server
        .client
        .post(server.url("/v1/chat/completions"))
        .timeout(Duration::from_millis(300))
        .json(&chat_request("gpt-4o", "hang forever"))
        .send()
        .await;
    assert!(result.unwrap_err().is_timeout());
}

#[tokio::test]
async fn test_faults_are_counted() {
    let server = TestServer::spawn_with_config(fault_config()).await;

    server
        .post("/v1/chat/completions", chat_request("gpt-4o", "rate limit me"))
        .await;
    let stats: Value = server.get("/_emulator/stats").await.json().await.unwrap();
    assert_eq!(stats["faults"]["HTTP_429"], 1);
}
