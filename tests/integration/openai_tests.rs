//! OpenAI-compatible endpoint integration tests

use super::common::*;
use serde_json::{json, Value};

use llm_emulator::config::DEFAULT_FALLBACK;

#[tokio::test]
async fn test_chat_completions_matches_case() {
    let server = TestServer::spawn().await;

    let response = server
        .post("/v1/chat/completions", chat_request("gpt-4o", "Hello Ada"))
        .await;
    assert_status(&response, 200);
    let source = response.headers()["x-emulator-source"].to_str().unwrap().to_string();
    assert!(source.starts_with("case:"), "unexpected source {source}");

    let body: Value = response.json().await.unwrap();
    assert_json_field(&body, "id");
    assert_json_field(&body, "usage");
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(chat_content(&body), "Hi Ada!");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert_eq!(body["usage"]["completion_tokens"], 2);
}

#[tokio::test]
async fn test_chat_completions_without_path_prefix() {
    let server = TestServer::spawn().await;

    let response = server
        .post("/chat/completions", chat_request("gpt-4o", "what is the capital of Ohio"))
        .await;
    assert_status(&response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(chat_content(&body), "The capital of Ohio is Mockville.");
}

#[tokio::test]
async fn test_latest_user_message_is_routed() {
    let server = TestServer::spawn().await;

    let request = json!({
        "model": "gpt-4o",
        "messages": [
            {"role": "system", "content": "You are terse."},
            {"role": "user", "content": "hello Bob"},
            {"role": "assistant", "content": "Hi Bob!"},
            {"role": "user", "content": "hello Eve"}
        ]
    });
    let body: Value = server.post("/v1/chat/completions", request).await.json().await.unwrap();
    assert_eq!(chat_content(&body), "Hi Eve!");
}

#[tokio::test]
async fn test_unmatched_text_gets_fallback() {
    let server = TestServer::spawn().await;

    let response = server
        .post("/v1/chat/completions", chat_request("gpt-4o", "zzzz qqqq"))
        .await;
    assert_status(&response, 200);
    assert_eq!(response.headers()["x-emulator-source"], "fallback");
    let body: Value = response.json().await.unwrap();
    assert_eq!(chat_content(&body), DEFAULT_FALLBACK);
}

#[tokio::test]
async fn test_missing_model_uses_default() {
    let server = TestServer::spawn().await;

    let body: Value = server
        .post(
            "/v1/chat/completions",
            json!({ "messages": [{ "role": "user", "content": "hello Ada" }] }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["model"], "llm-emulator");
}

#[tokio::test]
async fn test_invalid_json_is_400() {
    let server = TestServer::spawn().await;

    let response = server
        .client
        .post(server.url("/v1/chat/completions"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_status(&response, 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn test_streaming_chat_completion() {
    let server = TestServer::spawn().await;

    let response = server
        .post("/v1/chat/completions", streaming_chat_request("gpt-4o", "hello Ada"))
        .await;
    assert_status(&response, 200);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/event-stream"));
    let source = response.headers()["x-emulator-source"].to_str().unwrap();
    assert!(source.starts_with("case:"), "unexpected source {source}");

    let frames = sse_data(&response.text().await.unwrap());
    assert_eq!(frames.last().map(String::as_str), Some("[DONE]"));
    assert_eq!(sse_content(&frames), "Hi Ada!");

    let first: Value = serde_json::from_str(&frames[0]).unwrap();
    assert_eq!(first["object"], "chat.completion.chunk");
    assert_eq!(first["choices"][0]["delta"]["role"], "assistant");
}

#[tokio::test]
async fn test_responses_endpoint() {
    let server = TestServer::spawn().await;

    let response = server
        .post("/v1/responses", json!({ "model": "gpt-4o", "input": "hello Ada" }))
        .await;
    assert_status(&response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["object"], "response");
    assert_eq!(body["output"][0]["content"][0]["text"], "Hi Ada!");
}

#[tokio::test]
async fn test_embeddings_are_deterministic() {
    let server = TestServer::spawn().await;

    let request = embeddings_request("text-embedding-3-small", json!(["alpha", "beta"]));
    let first: Value = server.post("/v1/embeddings", request.clone()).await.json().await.unwrap();
    let second: Value = server.post("/v1/embeddings", request).await.json().await.unwrap();

    assert_eq!(first["object"], "list");
    assert_eq!(first["model"], "text-embedding-3-small");
    let data = first["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[1]["index"], 1);

    let vector = data[0]["embedding"].as_array().unwrap();
    assert_eq!(vector.len(), 1536);
    let norm: f64 = vector.iter().map(|x| x.as_f64().unwrap().powi(2)).sum::<f64>().sqrt();
    assert!((norm - 1.0).abs() < 1e-6);

    assert_eq!(first["data"], second["data"]);
    assert_ne!(data[0]["embedding"], data[1]["embedding"]);
}
