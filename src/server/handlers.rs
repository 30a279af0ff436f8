//! HTTP request handlers

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::middleware::RequestId;
use super::state::AppState;
use super::streaming::{chat_stream_frames, sse_response};
use crate::config::{ContractMode, ValidateHint};
use crate::context::RequestContext;
use crate::contracts::PayloadKind;
use crate::engine::{Emission, EngineStats, FaultResponse, Reply, ReplySource, MALFORMED_JSON_BODY};
use crate::error::{EmulatorError, EmulatorResult};
use crate::handlers::{MockRequest, MockResponse};
use crate::providers::{
    deterministic_embedding, parse_model_target, ChatRequest, EmbeddingList, EmbeddingsRequest, Endpoint,
    GenerateContentRequest, DEFAULT_EMBEDDING_SEED, EMBEDDING_DIM,
};
use crate::scenario::{ScenarioSummary, DEFAULT_SESSION};

// ============== Provider handlers ==============

/// Chat-style endpoints: OpenAI chat completions and responses
pub async fn chat<R: ChatRequest>(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, EmulatorError> {
    let body = parse_body(&body)?;
    serve_chat::<R>(&state, &request_id, uri.path(), &headers, body, None).await
}

/// POST /{v1,v1alpha,v1beta}/models/{model}:generateContent
pub async fn gemini_generate_content(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(target): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, EmulatorError> {
    let Some(model) = parse_model_target(&target) else {
        return Err(EmulatorError::NotFound(format!("model method '{target}'")));
    };
    let body = parse_body(&body)?;
    let model = model.to_string();
    serve_chat::<GenerateContentRequest>(&state, &request_id, uri.path(), &headers, body, Some(model)).await
}

async fn serve_chat<R: ChatRequest>(
    state: &AppState,
    request_id: &str,
    path: &str,
    headers: &HeaderMap,
    body: Value,
    path_model: Option<String>,
) -> Result<Response, EmulatorError> {
    let endpoint = R::ENDPOINT;
    check_contract(state, PayloadKind::Request, &endpoint.request_contract(), &body, None)?;

    if let Some(recorded) = replay(state, path, &body).await {
        return Ok(Json(recorded).into_response());
    }

    let request: R = serde_json::from_value(body.clone()).map_err(|e| EmulatorError::Validation {
        message: format!("invalid request body: {e}"),
        param: None,
    })?;
    let model = path_model
        .or_else(|| request.model().map(str::to_string))
        .unwrap_or_else(|| endpoint.default_model().to_string());
    let stream = request.stream();

    let mut ctx = request_context(state, endpoint, request_id, headers)
        .with_model(model.clone())
        .with_stream(stream);
    let session = session_key(state, headers);
    let text = request.user_text();

    let handled = state
        .engine
        .handle_text(&session, &text, request.messages(), &mut ctx)
        .await?;

    let reply = match handled.emission {
        Emission::Fault(fault) => return Ok(render_fault(fault).await),
        Emission::Payload(Reply::Error { status, body }) => {
            return Err(EmulatorError::Injected {
                status,
                body,
                retry_after_secs: None,
            })
        }
        Emission::Payload(reply) => reply,
    };

    let mut response = if stream && endpoint == Endpoint::OpenAiChat {
        let frames = chat_stream_frames(&model, reply.text(), ctx.stream_fault.as_ref());
        state
            .metrics
            .record_stream_chunks(endpoint.provider(), frames.len() as u64);
        sse_response(frames).into_response()
    } else {
        let payload = R::encode(&model, &reply);
        let (name, mode) = response_contract(endpoint, handled.validate.as_ref());
        check_contract(state, PayloadKind::Response, &name, &payload, mode)?;
        record(state, path, &body, &payload).await;
        Json(payload).into_response()
    };

    if let Some(value) = source_header(&handled.source) {
        response.headers_mut().insert("x-emulator-source", value);
    }
    Ok(response)
}

/// POST /v1/embeddings
pub async fn openai_embeddings(
    State(state): State<AppState>,
    uri: Uri,
    body: Bytes,
) -> Result<Response, EmulatorError> {
    let endpoint = Endpoint::OpenAiEmbeddings;
    let body = parse_body(&body)?;
    check_contract(&state, PayloadKind::Request, &endpoint.request_contract(), &body, None)?;

    if let Some(recorded) = replay(&state, uri.path(), &body).await {
        return Ok(Json(recorded).into_response());
    }

    let request: EmbeddingsRequest = serde_json::from_value(body.clone()).map_err(|e| EmulatorError::Validation {
        message: format!("invalid request body: {e}"),
        param: Some("input".to_string()),
    })?;
    let model = request.model.as_deref().unwrap_or(endpoint.default_model());
    let seed = state.config().seed.unwrap_or(DEFAULT_EMBEDDING_SEED);
    let vectors = request
        .inputs()
        .iter()
        .map(|text| deterministic_embedding(text, seed, EMBEDDING_DIM))
        .collect();

    let payload = serde_json::to_value(EmbeddingList::new(model, vectors))
        .map_err(|e| EmulatorError::Internal(e.to_string()))?;
    check_contract(&state, PayloadKind::Response, &endpoint.response_contract(), &payload, None)?;
    record(&state, uri.path(), &body, &payload).await;
    Ok(Json(payload).into_response())
}

// ============== HTTP mocks ==============

/// Fallback: serve a configured HTTP mock or a 404 JSON body
pub async fn http_mock(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, EmulatorError> {
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
    };

    let mut ctx = RequestContext {
        request_id,
        env: state.config().env.clone(),
        test_tag: state.config().test_tag.clone(),
        ..RequestContext::new("http")
    }
    .with_headers(&headers)
    .with_params(query.clone());

    let request = MockRequest {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        params: HashMap::new(),
        query,
        headers: ctx.headers.clone(),
        body,
    };

    match state.engine.serve_mock(request, &mut ctx).await? {
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": {
                    "message": format!("No mock for {} {}", method, uri.path()),
                    "type": "not_found_error"
                }
            })),
        )
            .into_response()),
        Some(Emission::Fault(fault)) => Ok(render_fault(fault).await),
        Some(Emission::Payload(mock)) => Ok(render_mock(mock)),
    }
}

fn render_mock(mock: MockResponse) -> Response {
    let status = StatusCode::from_u16(mock.status).unwrap_or(StatusCode::OK);
    let mut response = (status, Json(mock.body)).into_response();
    for (name, value) in &mock.headers {
        if let (Ok(name), Ok(value)) = (
            header::HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}

// ============== Admin handlers ==============

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "ok": true, "env": state.config().env }))
}

/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> Response {
    let body = state.metrics.export(&state.engine.stats());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub uptime_seconds: u64,
    pub active_scenario: Option<String>,
    pub scenarios: Vec<ScenarioSummary>,
    #[serde(flatten)]
    pub stats: EngineStats,
}

/// GET /_emulator/stats
pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let scenarios = state.engine.scenarios();
    Json(StatsResponse {
        uptime_seconds: state.engine.uptime().as_secs(),
        active_scenario: scenarios.active_id(),
        scenarios: scenarios.summaries(),
        stats: state.engine.stats(),
    })
}

/// POST /_emulator/stats/reset
pub async fn reset_stats(State(state): State<AppState>) -> StatusCode {
    state.engine.reset_stats();
    state.metrics.reset();
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
pub struct ActivateScenario {
    pub id: Option<String>,
}

/// PUT /_emulator/scenario
pub async fn set_scenario(
    State(state): State<AppState>,
    Json(body): Json<ActivateScenario>,
) -> Result<Json<Value>, EmulatorError> {
    let scenarios = state.engine.scenarios();
    scenarios.set_active(body.id.as_deref())?;
    Ok(Json(json!({ "active": scenarios.active_id() })))
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetScenario {
    pub session: Option<String>,
}

/// POST /_emulator/scenario/reset
pub async fn reset_scenario(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, EmulatorError> {
    let reset: ResetScenario = if body.is_empty() {
        ResetScenario::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| EmulatorError::Validation {
            message: format!("invalid reset body: {e}"),
            param: Some("session".to_string()),
        })?
    };
    state.engine.scenarios().reset(reset.session.as_deref());
    Ok(Json(json!({ "reset": reset.session.as_deref().unwrap_or("*") })))
}

// ============== Helpers ==============

/// An empty body is treated as `{}`
fn parse_body(body: &[u8]) -> EmulatorResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(json!({}));
    }
    serde_json::from_slice(body).map_err(|e| EmulatorError::Validation {
        message: format!("invalid JSON body: {e}"),
        param: None,
    })
}

fn request_context(state: &AppState, endpoint: Endpoint, request_id: &str, headers: &HeaderMap) -> RequestContext {
    let config = state.config();
    RequestContext {
        request_id: request_id.to_string(),
        env: config.env.clone(),
        test_tag: config.test_tag.clone(),
        ..RequestContext::new(endpoint.provider())
    }
    .with_headers(headers)
}

fn session_key(state: &AppState, headers: &HeaderMap) -> String {
    headers
        .get(state.config().server.session_header.as_str())
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_SESSION)
        .to_string()
}

fn response_contract(endpoint: Endpoint, hint: Option<&ValidateHint>) -> (String, Option<ContractMode>) {
    let name = hint
        .and_then(|h| h.response.clone())
        .unwrap_or_else(|| endpoint.response_contract());
    (name, hint.and_then(|h| h.mode))
}

fn check_contract(
    state: &AppState,
    kind: PayloadKind,
    name: &str,
    payload: &Value,
    mode: Option<ContractMode>,
) -> EmulatorResult<()> {
    match state.contracts.validate(kind, name, payload, mode) {
        Ok(true) => Ok(()),
        Ok(false) => {
            state.metrics.record_contract_violation(name);
            Ok(())
        }
        Err(err) => {
            state.metrics.record_contract_violation(name);
            Err(err)
        }
    }
}

async fn replay(state: &AppState, path: &str, body: &Value) -> Option<Value> {
    if !state.recorder.is_replaying() {
        return None;
    }
    let hit = state.recorder.replay(path, body).await?;
    state.metrics.record_vcr_replay();
    Some(hit)
}

async fn record(state: &AppState, path: &str, request: &Value, response: &Value) {
    if state.recorder.is_recording() {
        state.recorder.record(path, request, response).await;
        state.metrics.record_vcr_record();
    }
}

async fn render_fault(fault: FaultResponse) -> Response {
    match fault {
        FaultResponse::Hang => std::future::pending::<Response>().await,
        FaultResponse::MalformedJson => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            MALFORMED_JSON_BODY,
        )
            .into_response(),
        FaultResponse::Http {
            status,
            body,
            retry_after_secs,
        } => EmulatorError::Injected {
            status,
            body,
            retry_after_secs,
        }
        .into_response(),
    }
}

fn source_header(source: &ReplySource) -> Option<HeaderValue> {
    let label = match source {
        ReplySource::Scenario { id, .. } => format!("scenario:{id}"),
        ReplySource::Case { mode, .. } => format!("case:{mode}"),
        ReplySource::Fallback => "fallback".to_string(),
    };
    HeaderValue::from_str(&label).ok()
}
