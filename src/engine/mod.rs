//! Core emulation engine
//!
//! The EmulatorEngine decides what every request gets back:
//! - Consults the active scenario first
//! - Routes the utterance to a case otherwise
//! - Applies latency and faults before the reply is produced
//! - Serves generic HTTP mocks

mod faults;
mod mocks;
mod state;

pub use faults::*;
pub use mocks::*;
pub use state::*;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

use crate::config::{CaseOptions, EmbedderKind, EmulatorConfig, StepKind, ToolCall, ValidateHint};
use crate::context::RequestContext;
use crate::error::{EmulatorError, EmulatorResult};
use crate::handlers::{run_handler, CaseHandler, HandlerContext, HandlerRegistry, MockRequest, MockResponse};
use crate::latency::{SeededSource, UniformSource};
use crate::matching::template::placeholder_names;
use crate::matching::{Embedder, HashingEmbedder, MatchEngine, MatchMode, MatchResult};
use crate::routing::find_http_mock;
use crate::scenario::{ScenarioEngine, ScenarioStep};

/// A case resolved against the handler registry
#[derive(Debug, Clone)]
pub struct BoundCase {
    pub label: String,
    pub handler: CaseHandler,
    pub options: CaseOptions,
    pub placeholders: Vec<String>,
}

/// Content handed to the provider encoder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Reply {
    Text(String),
    Tool {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        call: Option<ToolCall>,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },
    /// A scripted error step
    Error { status: u16, body: Value },
}

impl Reply {
    fn from_step(step: ScenarioStep) -> Self {
        if let Some(error) = step.error {
            return Self::Error {
                status: error.code,
                body: error.body,
            };
        }
        match step.kind {
            StepKind::Tools => Self::Tool {
                text: step.result.as_ref().map_or_else(|| "null".to_string(), Value::to_string),
                call: step.call,
                result: step.result,
            },
            _ => Self::Text(step.reply.unwrap_or_else(|| "OK".to_string())),
        }
    }

    /// Assistant text; empty for error steps
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) | Self::Tool { text, .. } => text,
            Self::Error { .. } => "",
        }
    }
}

/// Where a reply came from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum ReplySource {
    Scenario { id: String, done: bool },
    Case { label: String, mode: MatchMode, score: f64 },
    Fallback,
}

/// Result of handling one utterance
#[derive(Debug, Clone)]
pub struct Handled {
    pub emission: Emission<Reply>,
    pub source: ReplySource,
    /// Contract names configured on the matched case
    pub validate: Option<ValidateHint>,
}

/// The main emulation engine
pub struct EmulatorEngine {
    config: Arc<EmulatorConfig>,
    matcher: MatchEngine,
    cases: Vec<BoundCase>,
    defaults: CaseOptions,
    scenarios: ScenarioEngine,
    injector: FaultInjector,
    registry: Arc<HandlerRegistry>,
    state: EngineState,
    start_time: Instant,
}

impl EmulatorEngine {
    /// Build an engine; randomness is seeded from `config.seed` when set
    pub fn new(config: EmulatorConfig, registry: HandlerRegistry) -> EmulatorResult<Self> {
        let source: Arc<dyn UniformSource> = Arc::new(SeededSource::from_option(config.seed));
        Self::with_random_source(config, registry, source)
    }

    pub fn with_random_source(
        config: EmulatorConfig,
        registry: HandlerRegistry,
        source: Arc<dyn UniformSource>,
    ) -> EmulatorResult<Self> {
        config.validate()?;
        let registry = Arc::new(registry);

        let cases = config
            .cases
            .iter()
            .map(|case| {
                let handler = match (&case.handler, &case.reply) {
                    (Some(id), _) => registry.case(id)?,
                    (None, Some(reply)) => CaseHandler::template(reply.clone()),
                    (None, None) => {
                        return Err(EmulatorError::Config(format!("case '{}' has no reply", case.label())))
                    }
                };
                handler.check_binding(&case.pattern)?;
                Ok(BoundCase {
                    label: case.label().to_string(),
                    handler,
                    options: case.options.clone(),
                    placeholders: placeholder_names(&case.pattern),
                })
            })
            .collect::<EmulatorResult<Vec<_>>>()?;

        for mock in &config.http_mocks {
            if let Some(id) = &mock.handler {
                registry.mock(id)?;
            }
        }

        let mut matcher = MatchEngine::new(config.cases.iter().map(|c| c.pattern.as_str()), &config.matching)?;
        if config.matching.embedder == EmbedderKind::Hashing {
            matcher = matcher.with_embedder(Arc::new(HashingEmbedder::new(config.matching.embedding_dim)));
        }

        let scenarios = ScenarioEngine::new(&config.scenarios, config.use_scenario.clone(), registry.clone())?;

        tracing::info!(
            cases = cases.len(),
            scenarios = config.scenarios.len(),
            http_mocks = config.http_mocks.len(),
            matcher = ?matcher,
            "engine.ready"
        );

        Ok(Self {
            defaults: config.defaults.options(),
            config: Arc::new(config),
            matcher,
            cases,
            scenarios,
            injector: FaultInjector::new(source),
            registry,
            state: EngineState::new(),
            start_time: Instant::now(),
        })
    }

    /// Back the `semantic-embedding` strategy with a custom embedder
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.matcher = self.matcher.with_embedder(embedder);
        self
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn scenarios(&self) -> &ScenarioEngine {
        &self.scenarios
    }

    pub fn cases(&self) -> &[BoundCase] {
        &self.cases
    }

    pub fn stats(&self) -> EngineStats {
        self.state.stats()
    }

    pub fn reset_stats(&self) {
        self.state.reset();
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Route without side effects; returns the chosen case label too
    pub async fn route(&self, text: &str) -> (MatchResult, Option<String>) {
        let result = self.matcher.route_to_case(text).await;
        let label = result.chosen.and_then(|i| self.cases.get(i)).map(|c| c.label.clone());
        (result, label)
    }

    /// Produce the reply to the latest user utterance of a provider request
    pub async fn handle_text(
        &self,
        session: &str,
        text: &str,
        messages: Option<Value>,
        ctx: &mut RequestContext,
    ) -> EmulatorResult<Handled> {
        let started = Instant::now();
        self.state.record_request(&ctx.provider);
        tracing::info!(
            request_id = %ctx.request_id,
            provider = %ctx.provider,
            model = ?ctx.model,
            stream = ctx.stream,
            "req.in"
        );

        let result = self.dispatch(session, text, messages, ctx).await;
        match &result {
            Ok(handled) => self.count_fault(&handled.emission, ctx),
            Err(_) => self.state.record_error(),
        }
        self.state.record_latency(started.elapsed());
        result
    }

    async fn dispatch(
        &self,
        session: &str,
        text: &str,
        messages: Option<Value>,
        ctx: &mut RequestContext,
    ) -> EmulatorResult<Handled> {
        if let Some(step) = self.scenarios.next_step(session, text, ctx).await {
            self.state.record_scenario_step();
            let source = ReplySource::Scenario {
                id: step.scenario_id.clone(),
                done: step.done,
            };
            let emission = self
                .injector
                .apply_fault_or_latency(&self.defaults, ctx, || async move { Ok(Reply::from_step(step)) })
                .await?;
            return Ok(Handled {
                emission,
                source,
                validate: None,
            });
        }

        let routed = self.matcher.route_to_case(text).await;
        let Some(case) = routed.chosen.and_then(|i| self.cases.get(i)) else {
            tracing::info!(request_id = %ctx.request_id, "match.none");
            self.state.record_match(MatchMode::None, None);
            let fallback = self.config.defaults.fallback.clone();
            let emission = self
                .injector
                .apply_fault_or_latency(&self.defaults, ctx, || async move { Ok(Reply::Text(fallback)) })
                .await?;
            return Ok(Handled {
                emission,
                source: ReplySource::Fallback,
                validate: None,
            });
        };

        tracing::info!(
            request_id = %ctx.request_id,
            case = %case.label,
            mode = %routed.mode,
            score = routed.score,
            "match"
        );
        self.state.record_match(routed.mode, Some(&case.label));

        let handler_ctx = HandlerContext {
            text: text.to_string(),
            vars: routed.vars.clone(),
            model: ctx.model.clone(),
            provider: ctx.provider.clone(),
            score: routed.score,
            matched_pattern: routed.pattern.clone(),
            messages,
            request: ctx.clone(),
        };

        let emission = self
            .injector
            .apply_fault_or_latency(&case.options, ctx, || async move {
                run_handler(&case.handler, &case.placeholders, &handler_ctx)
                    .await
                    .map(Reply::Text)
                    .map_err(|err| match err {
                        EmulatorError::Handler { .. } => err,
                        other => EmulatorError::Handler {
                            id: case.label.clone(),
                            message: other.to_string(),
                        },
                    })
            })
            .await?;

        Ok(Handled {
            emission,
            source: ReplySource::Case {
                label: case.label.clone(),
                mode: routed.mode,
                score: routed.score,
            },
            validate: case.options.validate.clone(),
        })
    }

    /// Serve a generic HTTP mock; `None` when no mock matches
    pub async fn serve_mock(
        &self,
        mut request: MockRequest,
        ctx: &mut RequestContext,
    ) -> EmulatorResult<Option<Emission<MockResponse>>> {
        let Some((index, mock, matched)) = find_http_mock(&self.config.http_mocks, &request.method, &request.path)
        else {
            tracing::debug!(method = %request.method, path = %request.path, "mock.miss");
            return Ok(None);
        };

        self.state.record_request(&ctx.provider);
        tracing::info!(index, method = %request.method, path = %request.path, "mock.match");
        request.params = matched.params;

        let handler = mock.handler.as_deref().map(|id| self.registry.mock(id)).transpose()?;
        let request_ctx = ctx.clone();
        let result = self
            .injector
            .apply_fault_or_latency(&mock.options, ctx, || async move {
                match handler {
                    Some(handler) => handler.handle(&request, &request_ctx).await,
                    None => Ok(static_response(mock, &request.params)),
                }
            })
            .await;

        match &result {
            Ok(emission) => self.count_fault(emission, ctx),
            Err(_) => self.state.record_error(),
        }
        result.map(Some)
    }

    fn count_fault<T>(&self, emission: &Emission<T>, ctx: &RequestContext) {
        let kind = match emission {
            Emission::Fault(FaultResponse::Hang) => Some("TIMEOUT".to_string()),
            Emission::Fault(FaultResponse::Http { status, .. }) => Some(format!("HTTP_{status}")),
            Emission::Fault(FaultResponse::MalformedJson) => Some("MALFORMED_JSON".to_string()),
            Emission::Payload(_) => ctx.stream_fault.as_ref().map(|f| f.kind.as_str()),
        };
        if let Some(kind) = kind {
            self.state.record_fault(&kind);
        }
    }
}
