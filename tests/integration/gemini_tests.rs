//! Gemini generateContent integration tests

use super::common::*;
use serde_json::Value;

#[tokio::test]
async fn test_generate_content_v1beta() {
    let server = TestServer::spawn().await;

    let response = server
        .post("/v1beta/models/gemini-1.5-pro:generateContent", gemini_request("hello Grace"))
        .await;
    assert_status(&response, 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["modelVersion"], "gemini-1.5-pro");
    let candidate = &body["candidates"][0];
    assert_eq!(candidate["content"]["role"], "model");
    assert_eq!(candidate["content"]["parts"][0]["text"], "Hi Grace!");
    assert_eq!(candidate["finishReason"], "STOP");
}

#[tokio::test]
async fn test_generate_content_all_api_versions() {
    let server = TestServer::spawn().await;

    for version in ["v1", "v1alpha", "v1beta"] {
        let path = format!("/{version}/models/gemini-pro:generateContent");
        let response = server.post(&path, gemini_request("hello Linus")).await;
        assert_status(&response, 200);
    }
}

#[tokio::test]
async fn test_unknown_model_method_is_404() {
    let server = TestServer::spawn().await;

    let response = server
        .post("/v1beta/models/gemini-pro:streamGenerateContent", gemini_request("hello"))
        .await;
    assert_status(&response, 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "not_found_error");
}
