//! Scenario playback over HTTP: sessions, activation and reset

use super::common::*;
use serde_json::{json, Value};

use llm_emulator::config::{EmulatorConfig, LatencyProfile, ScenarioConfig};

fn scenario_config() -> EmulatorConfig {
    let scenarios: Vec<ScenarioConfig> = serde_yaml::from_str(
        r#"
- id: checkout
  steps:
    - user: "I want to buy shoes"
      reply: "Which size?"
    - kind: tools
      call: { name: lookup_sku, arguments: { size: 42 } }
      result: [{ sku: "RJ-001" }]
    - error: { code: 503, body: { error: { message: "inventory offline" } } }
- id: support
  start: open
  states:
    open:
      branches:
        - when: "my order {{order}} is late"
          reply: "Order {{order}} ships tomorrow."
          next: closed
    closed:
      final: true
"#,
    )
    .unwrap();

    let mut config = test_config();
    config.scenarios = scenarios;
    config.use_scenario = Some("checkout".to_string());
    config.defaults.latency = Some(LatencyProfile::instant());
    config
}

async fn chat(server: &TestServer, text: &str, session: &str) -> reqwest::Response {
    server
        .post_in_session("/v1/chat/completions", chat_request("gpt-4o", text), session)
        .await
}

#[tokio::test]
async fn test_linear_scenario_plays_in_order() {
    let server = TestServer::spawn_with_config(scenario_config()).await;

    let first = chat(&server, "anything", "s1").await;
    assert_status(&first, 200);
    assert_eq!(first.headers()["x-emulator-source"], "scenario:checkout");
    let body: Value = first.json().await.unwrap();
    assert_eq!(chat_content(&body), "Which size?");

    let second: Value = chat(&server, "size 42", "s1").await.json().await.unwrap();
    assert_eq!(second["choices"][0]["finish_reason"], "tool_calls");
    let call = &second["choices"][0]["message"]["tool_calls"][0];
    assert_eq!(call["type"], "function");
    assert_eq!(call["function"]["name"], "lookup_sku");
    assert_eq!(chat_content(&second), r#"[{"sku":"RJ-001"}]"#);

    let third = chat(&server, "pay", "s1").await;
    assert_status(&third, 503);
    let body: Value = third.json().await.unwrap();
    assert_eq!(body["error"]["message"], "inventory offline");

    // Exhausted scenarios fall through to case matching
    let after: Value = chat(&server, "hello Ada", "s1").await.json().await.unwrap();
    assert_eq!(chat_content(&after), "Hi Ada!");
}

#[tokio::test]
async fn test_sessions_progress_independently() {
    let server = TestServer::spawn_with_config(scenario_config()).await;

    chat(&server, "x", "alice").await;
    let bob: Value = chat(&server, "x", "bob").await.json().await.unwrap();
    assert_eq!(chat_content(&bob), "Which size?");
}

#[tokio::test]
async fn test_reset_restarts_a_session() {
    let server = TestServer::spawn_with_config(scenario_config()).await;

    chat(&server, "x", "s1").await;
    let response = server
        .post("/_emulator/scenario/reset", json!({ "session": "s1" }))
        .await;
    assert_status(&response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["reset"], "s1");

    let again: Value = chat(&server, "x", "s1").await.json().await.unwrap();
    assert_eq!(chat_content(&again), "Which size?");
}

#[tokio::test]
async fn test_switching_to_graph_scenario() {
    let server = TestServer::spawn_with_config(scenario_config()).await;

    let response = server.put("/_emulator/scenario", json!({ "id": "support" })).await;
    assert_status(&response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["active"], "support");

    let reply: Value = chat(&server, "My order 42 is late", "s1").await.json().await.unwrap();
    assert_eq!(chat_content(&reply), "Order 42 ships tomorrow.");

    // Terminal state: matching takes over
    let after: Value = chat(&server, "hello Ada", "s1").await.json().await.unwrap();
    assert_eq!(chat_content(&after), "Hi Ada!");
}

#[tokio::test]
async fn test_unknown_scenario_is_404_and_null_deactivates() {
    let server = TestServer::spawn_with_config(scenario_config()).await;

    let response = server.put("/_emulator/scenario", json!({ "id": "nope" })).await;
    assert_status(&response, 404);

    let response = server.put("/_emulator/scenario", json!({ "id": null })).await;
    assert_status(&response, 200);
    let body: Value = response.json().await.unwrap();
    assert!(body["active"].is_null());

    let reply: Value = chat(&server, "hello Ada", "s1").await.json().await.unwrap();
    assert_eq!(chat_content(&reply), "Hi Ada!");
}
