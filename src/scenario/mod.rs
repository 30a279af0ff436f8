//! Scenario execution: scripted linear and graph conversations.
//!
//! Sessions are keyed by a conversation key (the session header, or
//! `default`). Each session sits behind its own async mutex so two
//! requests on the same key advance it one after the other, while
//! different keys never contend.

pub mod script;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::{ReplyConfig, ScenarioConfig, StepConfig, StepError, StepKind, ToolCall};
use crate::context::RequestContext;
use crate::error::{EmulatorError, EmulatorResult};
use crate::handlers::{HandlerRegistry, ReplyInput};
use crate::matching::template::{render_template, Vars};

pub use script::{GraphBranch, GraphState, Scenario, Script, ScriptKind};

/// Session key used when a request carries no session header
pub const DEFAULT_SESSION: &str = "default";

/// Sessions kept before finished and idle ones are evicted
pub const MAX_SESSIONS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Linear,
    Graph,
    None,
}

/// Progress of one conversation through the active scenario
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub scenario_id: String,
    pub mode: SessionMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_id: Option<String>,
    pub done: bool,
}

impl Session {
    fn start(scenario: &Scenario) -> Self {
        match &scenario.script {
            Script::Linear(_) => Self {
                scenario_id: scenario.id.clone(),
                mode: SessionMode::Linear,
                index: Some(0),
                state_id: None,
                done: false,
            },
            Script::Graph { start, .. } => Self {
                scenario_id: scenario.id.clone(),
                mode: SessionMode::Graph,
                index: None,
                state_id: Some(start.clone()),
                done: false,
            },
        }
    }
}

/// A scripted step that replaces normal case matching
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioStep {
    pub scenario_id: String,
    pub kind: StepKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call: Option<ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
    /// Linear position of this step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Graph state after the transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_id: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub vars: Vars,
    pub done: bool,
}

impl ScenarioStep {
    fn linear(scenario_id: &str, index: usize, step: &StepConfig, done: bool) -> Self {
        Self {
            scenario_id: scenario_id.to_string(),
            kind: step.kind,
            reply: step.reply.clone(),
            result: step.result.clone(),
            call: step.call.clone(),
            error: step.error.clone(),
            index: Some(index),
            state_id: None,
            vars: Vars::new(),
            done,
        }
    }

    /// Text content of the step: the reply for chat steps, the JSON result for tool steps
    pub fn text(&self) -> String {
        match self.kind {
            StepKind::Tools => self
                .result
                .as_ref()
                .map(Value::to_string)
                .unwrap_or_else(|| "null".to_string()),
            _ => self.reply.clone().unwrap_or_else(|| "OK".to_string()),
        }
    }
}

/// Listing entry for `scenario list` and the admin API
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioSummary {
    pub id: String,
    pub kind: ScriptKind,
    pub size: usize,
    pub active: bool,
}

pub struct ScenarioEngine {
    scenarios: HashMap<String, Arc<Scenario>>,
    order: Vec<String>,
    active: RwLock<Option<String>>,
    sessions: DashMap<String, Arc<Mutex<Session>>>,
    max_sessions: usize,
    registry: Arc<HandlerRegistry>,
}

impl ScenarioEngine {
    pub fn new(
        configs: &[ScenarioConfig],
        active: Option<String>,
        registry: Arc<HandlerRegistry>,
    ) -> EmulatorResult<Self> {
        let mut scenarios = HashMap::with_capacity(configs.len());
        let mut order = Vec::with_capacity(configs.len());
        for config in configs {
            let scenario = Scenario::compile(config, &registry)?;
            order.push(scenario.id.clone());
            scenarios.insert(scenario.id.clone(), Arc::new(scenario));
        }

        if let Some(id) = &active {
            if !scenarios.contains_key(id) {
                return Err(EmulatorError::Config(format!("active scenario '{id}' is not defined")));
            }
        }

        Ok(Self {
            scenarios,
            order,
            active: RwLock::new(active),
            sessions: DashMap::new(),
            max_sessions: MAX_SESSIONS,
            registry,
        })
    }

    pub fn with_session_limit(mut self, limit: usize) -> Self {
        self.max_sessions = limit.max(1);
        self
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Make room for a new session: finished ones go first, then idle ones.
    /// Sessions locked by an in-flight request are never evicted.
    fn evict_sessions(&self) {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, slot| slot.try_lock().map_or(true, |session| !session.done));

        let len = self.sessions.len();
        if len >= self.max_sessions {
            let idle: Vec<String> = self
                .sessions
                .iter()
                .filter(|entry| entry.value().try_lock().is_ok())
                .map(|entry| entry.key().clone())
                .take(len + 1 - self.max_sessions)
                .collect();
            for key in idle {
                self.sessions.remove(&key);
            }
        }

        tracing::debug!(evicted = before.saturating_sub(self.sessions.len()), "scenario.evict");
    }

    pub fn active_id(&self) -> Option<String> {
        self.active.read().clone()
    }

    /// Select the active scenario, or none. All sessions restart.
    pub fn set_active(&self, id: Option<&str>) -> EmulatorResult<()> {
        if let Some(id) = id {
            if !self.scenarios.contains_key(id) {
                return Err(EmulatorError::NotFound(format!("scenario '{id}'")));
            }
        }
        *self.active.write() = id.map(str::to_string);
        self.sessions.clear();
        tracing::info!(scenario_id = ?id, "scenario.activate");
        Ok(())
    }

    /// Drop one session, or all of them
    pub fn reset(&self, key: Option<&str>) {
        match key {
            Some(key) => {
                self.sessions.remove(key);
            }
            None => self.sessions.clear(),
        }
        tracing::info!(session = ?key, "scenario.reset");
    }

    pub async fn session(&self, key: &str) -> Option<Session> {
        let slot = self.sessions.get(key).map(|entry| entry.value().clone())?;
        let session = slot.lock().await;
        Some(session.clone())
    }

    pub fn summaries(&self) -> Vec<ScenarioSummary> {
        let active = self.active_id();
        self.order
            .iter()
            .filter_map(|id| self.scenarios.get(id))
            .map(|s| ScenarioSummary {
                id: s.id.clone(),
                kind: s.kind(),
                size: s.size(),
                active: active.as_deref() == Some(s.id.as_str()),
            })
            .collect()
    }

    fn active_scenario(&self) -> Option<Arc<Scenario>> {
        let active = self.active.read();
        active.as_ref().and_then(|id| self.scenarios.get(id)).cloned()
    }

    /// Advance the session for `key`. `None` when no scenario is active,
    /// the session is done, or no graph branch accepts `text`.
    pub async fn next_step(&self, key: &str, text: &str, ctx: &RequestContext) -> Option<ScenarioStep> {
        let scenario = self.active_scenario()?;

        if self.sessions.len() >= self.max_sessions && !self.sessions.contains_key(key) {
            self.evict_sessions();
        }

        let slot = self
            .sessions
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::start(&scenario))))
            .clone();
        let mut session = slot.lock().await;

        if session.scenario_id != scenario.id {
            *session = Session::start(&scenario);
            tracing::info!(session = key, scenario_id = %scenario.id, "scenario.reset");
        }
        if session.done {
            return None;
        }

        let step = match &scenario.script {
            Script::Linear(steps) => next_linear(&scenario.id, steps, &mut session).await,
            Script::Graph { states, .. } => {
                self.next_graph(&scenario.id, states, &mut session, text, ctx)
                    .await
            }
        };

        match &step {
            Some(step) => tracing::info!(
                session = key,
                scenario_id = %scenario.id,
                kind = ?step.kind,
                index = ?step.index,
                state = ?step.state_id,
                done = step.done,
                "scenario.step"
            ),
            None => tracing::debug!(session = key, scenario_id = %scenario.id, "scenario.no_step"),
        }
        if session.done {
            tracing::info!(session = key, scenario_id = %scenario.id, "scenario.complete");
        }
        step
    }

    async fn next_graph(
        &self,
        scenario_id: &str,
        states: &HashMap<String, GraphState>,
        session: &mut Session,
        text: &str,
        ctx: &RequestContext,
    ) -> Option<ScenarioStep> {
        let Some(state_id) = session.state_id.clone() else {
            session.done = true;
            return None;
        };
        let Some(state) = states.get(&state_id) else {
            tracing::warn!(scenario_id, state = %state_id, "scenario state is not defined");
            session.done = true;
            return None;
        };
        if state.is_dead_end() {
            session.done = true;
            return None;
        }

        for (position, branch) in state.branches.iter().enumerate() {
            let Some(vars) = extract(branch, text) else {
                continue;
            };
            if !self.guard_allows(branch, &vars, ctx) {
                continue;
            }

            let input = ReplyInput {
                text: text.to_string(),
                vars,
                state_id: state_id.clone(),
                branch: position,
                request: ctx.clone(),
            };
            let reply = match self.branch_reply(branch, &input).await {
                Ok(reply) => reply,
                Err(err) => {
                    tracing::warn!(scenario_id, state = %state_id, branch = position, error = %err, "scenario reply failed");
                    return None;
                }
            };

            if let Some(ms) = branch.config.delay_ms {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }

            match &branch.config.next {
                Some(next) => {
                    session.done = states.get(next).map_or(true, GraphState::is_dead_end);
                    session.state_id = Some(next.clone());
                }
                None => session.done = state.terminal,
            }

            return Some(ScenarioStep {
                scenario_id: scenario_id.to_string(),
                kind: branch.config.kind,
                reply,
                result: branch.config.result.clone(),
                call: None,
                error: None,
                index: None,
                state_id: session.state_id.clone(),
                vars: input.vars,
                done: session.done,
            });
        }

        None
    }

    fn guard_allows(&self, branch: &GraphBranch, vars: &Vars, ctx: &RequestContext) -> bool {
        let declared = branch.config.vars.iter().all(|(name, expected)| {
            vars.get(name)
                .is_some_and(|actual| actual.trim().eq_ignore_ascii_case(expected.trim()))
        });
        if !declared {
            return false;
        }

        match &branch.config.guard {
            None => true,
            Some(id) => match self.registry.guard(id) {
                Ok(guard) => guard.allows(vars, ctx),
                Err(err) => {
                    tracing::warn!(guard = %id, error = %err, "guard unavailable, skipping branch");
                    false
                }
            },
        }
    }

    async fn branch_reply(&self, branch: &GraphBranch, input: &ReplyInput) -> EmulatorResult<Option<String>> {
        match &branch.config.reply {
            None => Ok(None),
            Some(ReplyConfig::Text(template)) => Ok(Some(render_template(template, &input.vars))),
            Some(ReplyConfig::Handler { handler }) => {
                let reply = self.registry.reply(handler)?;
                reply.reply(input).await.map(Some)
            }
        }
    }
}

/// Branch variables; an empty `when` accepts anything
fn extract(branch: &GraphBranch, text: &str) -> Option<Vars> {
    if branch.config.when.trim().is_empty() {
        return Some(Vars::new());
    }
    branch.extractor.extract(text)
}

/// Wait steps are absorbed: their delay is slept and the next step returned
async fn next_linear(scenario_id: &str, steps: &[StepConfig], session: &mut Session) -> Option<ScenarioStep> {
    loop {
        let index = session.index.unwrap_or(0);
        let Some(step) = steps.get(index) else {
            session.done = true;
            return None;
        };

        if let Some(ms) = step.delay_ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        session.index = Some(index + 1);
        session.done = index + 1 >= steps.len();

        if step.kind == StepKind::Wait {
            tracing::debug!(scenario_id, index, "scenario.wait");
            if session.done {
                return None;
            }
            continue;
        }

        return Some(ScenarioStep::linear(scenario_id, index, step, session.done));
    }
}
