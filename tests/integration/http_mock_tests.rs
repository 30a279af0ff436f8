//! Generic HTTP mock integration tests

use super::common::*;
use serde_json::{json, Value};

use llm_emulator::config::{EmulatorConfig, HttpMockConfig, LatencyProfile};
use llm_emulator::handlers::{MockRequest, MockResponse, SyncMock};
use llm_emulator::HandlerRegistry;

fn instant_mock(method: &str, path: &str) -> HttpMockConfig {
    let mut mock = HttpMockConfig::new(method, path);
    mock.options.latency = Some(LatencyProfile::instant());
    mock
}

fn mock_config() -> EmulatorConfig {
    let mut created = instant_mock("POST", "/orders").with_body(json!({ "created": true }));
    created.status = 201;
    created.headers.insert("x-mock".to_string(), "orders".to_string());

    let mut echo = instant_mock("POST", "/echo/:kind");
    echo.handler = Some("echo-body".to_string());

    let mut config = test_config();
    config.http_mocks = vec![
        instant_mock("GET", "/users/:id").with_body(json!({ "id": "{{id}}", "name": "User {{id}}" })),
        created,
        echo,
        any_method_hook(),
    ];
    config
}

fn any_method_hook() -> HttpMockConfig {
    let mut hook = instant_mock("GET", "/hooks/:id").with_body(json!({ "hook": "{{id}}" }));
    hook.route.method = None;
    hook
}

fn mock_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::with_builtins();
    registry.register_mock(
        "echo-body",
        SyncMock(|req: &MockRequest| {
            MockResponse::ok(json!({
                "kind": req.params.get("kind"),
                "body": req.body,
                "q": req.query.get("q"),
            }))
        }),
    );
    registry
}

#[tokio::test]
async fn test_static_mock_binds_path_params() {
    let server = TestServer::spawn_with(mock_config(), mock_registry()).await;

    let response = server.get("/users/42").await;
    assert_status(&response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "id": "42", "name": "User 42" }));
}

#[tokio::test]
async fn test_mock_status_and_headers() {
    let server = TestServer::spawn_with(mock_config(), mock_registry()).await;

    let response = server.post("/orders", json!({ "sku": "RJ-001" })).await;
    assert_status(&response, 201);
    assert_eq!(response.headers()["x-mock"], "orders");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["created"], true);
}

#[tokio::test]
async fn test_handler_mock_sees_request() {
    let server = TestServer::spawn_with(mock_config(), mock_registry()).await;

    let response = server.post("/echo/widgets?q=red", json!({ "n": 3 })).await;
    assert_status(&response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "kind": "widgets", "body": { "n": 3 }, "q": "red" }));
}

#[tokio::test]
async fn test_method_must_match() {
    let server = TestServer::spawn_with(mock_config(), mock_registry()).await;

    let response = server.post("/users/42", json!({})).await;
    assert_status(&response, 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["message"], "No mock for POST /users/42");
    assert_eq!(body["error"]["type"], "not_found_error");
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let server = TestServer::spawn_with(mock_config(), mock_registry()).await;

    let response = server.get("/users/42/posts").await;
    assert_status(&response, 404);
}

#[tokio::test]
async fn test_mock_without_method_accepts_any_method() {
    let server = TestServer::spawn_with(mock_config(), mock_registry()).await;

    let response = server.post("/hooks/1", json!({ "event": "push" })).await;
    assert_status(&response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "hook": "1" }));

    let response = server.client.delete(server.url("/hooks/2")).send().await.unwrap();
    assert_status(&response, 200);
}
