//! Registered handlers: case replies, graph guards, reply functions and HTTP mocks
//!
//! Configuration never embeds code. Cases, branches and mocks name a
//! handler id that is resolved against a [`HandlerRegistry`] when the
//! engine is built. Every handler is awaited, so synchronous closures are
//! wrapped by small adapters.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::context::RequestContext;
use crate::error::{EmulatorError, EmulatorResult};
use crate::matching::template::{placeholder_names, render_template, Vars};

/// Everything a case handler can see about the matched request
#[derive(Debug, Clone, Default, Serialize)]
pub struct HandlerContext {
    /// Latest user utterance
    pub text: String,
    pub vars: Vars,
    pub model: Option<String>,
    pub provider: String,
    pub score: f64,
    pub matched_pattern: Option<String>,
    /// Raw chat messages when the provider sends them
    pub messages: Option<serde_json::Value>,
    pub request: RequestContext,
}

/// Handler invoked with the value of the pattern's only placeholder
#[async_trait]
pub trait SingleArgumentHandler: Send + Sync {
    async fn handle(&self, value: &str, ctx: &HandlerContext) -> EmulatorResult<Option<String>>;
}

/// Handler invoked with the full context
#[async_trait]
pub trait ContextHandler: Send + Sync {
    async fn handle(&self, ctx: &HandlerContext) -> EmulatorResult<Option<String>>;
}

/// A case handler; the calling convention is fixed at registration
#[derive(Clone)]
pub enum CaseHandler {
    SingleArgument(Arc<dyn SingleArgumentHandler>),
    Context(Arc<dyn ContextHandler>),
}

impl fmt::Debug for CaseHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleArgument(_) => f.write_str("CaseHandler::SingleArgument"),
            Self::Context(_) => f.write_str("CaseHandler::Context"),
        }
    }
}

impl CaseHandler {
    /// Wrap a synchronous single-argument closure
    pub fn single_fn<F>(f: F) -> Self
    where
        F: Fn(&str, &HandlerContext) -> Option<String> + Send + Sync + 'static,
    {
        Self::SingleArgument(Arc::new(SyncSingle(f)))
    }

    /// Wrap a synchronous context closure
    pub fn context_fn<F>(f: F) -> Self
    where
        F: Fn(&HandlerContext) -> Option<String> + Send + Sync + 'static,
    {
        Self::Context(Arc::new(SyncContext(f)))
    }

    /// Reply rendered from a `{{var}}` template
    pub fn template(template: impl Into<String>) -> Self {
        Self::Context(Arc::new(TemplateReply {
            template: template.into(),
        }))
    }

    /// Single-argument handlers need a pattern with exactly one distinct placeholder
    pub fn check_binding(&self, pattern: &str) -> EmulatorResult<()> {
        if let Self::SingleArgument(_) = self {
            let count = placeholder_names(pattern).len();
            if count != 1 {
                return Err(EmulatorError::Config(format!(
                    "single-argument handler bound to '{pattern}' which has {count} placeholders"
                )));
            }
        }
        Ok(())
    }
}

struct SyncSingle<F>(F);

#[async_trait]
impl<F> SingleArgumentHandler for SyncSingle<F>
where
    F: Fn(&str, &HandlerContext) -> Option<String> + Send + Sync,
{
    async fn handle(&self, value: &str, ctx: &HandlerContext) -> EmulatorResult<Option<String>> {
        Ok((self.0)(value, ctx))
    }
}

struct SyncContext<F>(F);

#[async_trait]
impl<F> ContextHandler for SyncContext<F>
where
    F: Fn(&HandlerContext) -> Option<String> + Send + Sync,
{
    async fn handle(&self, ctx: &HandlerContext) -> EmulatorResult<Option<String>> {
        Ok((self.0)(ctx))
    }
}

/// Context handler that renders a template with the extracted variables
#[derive(Debug, Clone)]
pub struct TemplateReply {
    template: String,
}

#[async_trait]
impl ContextHandler for TemplateReply {
    async fn handle(&self, ctx: &HandlerContext) -> EmulatorResult<Option<String>> {
        Ok(Some(render_template(&self.template, &ctx.vars)))
    }
}

/// Built-in `echo`: the extracted values joined by spaces, else the utterance
struct Echo;

#[async_trait]
impl ContextHandler for Echo {
    async fn handle(&self, ctx: &HandlerContext) -> EmulatorResult<Option<String>> {
        if ctx.vars.is_empty() {
            return Ok(Some(ctx.text.clone()));
        }
        let mut names: Vec<&String> = ctx.vars.keys().collect();
        names.sort();
        let joined = names
            .into_iter()
            .filter_map(|n| ctx.vars.get(n).map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        Ok(Some(joined))
    }
}

/// Invoke a case handler; `None` becomes the empty string
pub async fn run_handler(
    handler: &CaseHandler,
    placeholders: &[String],
    ctx: &HandlerContext,
) -> EmulatorResult<String> {
    let out = match handler {
        CaseHandler::SingleArgument(h) => {
            let value = placeholders
                .first()
                .and_then(|name| ctx.vars.get(name))
                .map(String::as_str)
                .unwrap_or_default();
            h.handle(value, ctx).await?
        }
        CaseHandler::Context(h) => h.handle(ctx).await?,
    };
    Ok(out.unwrap_or_default())
}

/// Extra predicate on a graph branch
pub trait Guard: Send + Sync {
    fn allows(&self, vars: &Vars, ctx: &RequestContext) -> bool;
}

impl<F> Guard for F
where
    F: Fn(&Vars, &RequestContext) -> bool + Send + Sync,
{
    fn allows(&self, vars: &Vars, ctx: &RequestContext) -> bool {
        self(vars, ctx)
    }
}

/// Input to a dynamic graph reply
#[derive(Debug, Clone)]
pub struct ReplyInput {
    pub text: String,
    pub vars: Vars,
    pub state_id: String,
    /// Index of the branch within its state
    pub branch: usize,
    pub request: RequestContext,
}

/// Dynamic reply for a graph branch
#[async_trait]
pub trait ReplyFn: Send + Sync {
    async fn reply(&self, input: &ReplyInput) -> EmulatorResult<String>;
}

/// Adapter for synchronous reply closures
pub struct SyncReply<F>(pub F);

#[async_trait]
impl<F> ReplyFn for SyncReply<F>
where
    F: Fn(&ReplyInput) -> String + Send + Sync,
{
    async fn reply(&self, input: &ReplyInput) -> EmulatorResult<String> {
        Ok((self.0)(input))
    }
}

/// Normalized HTTP request handed to mock handlers
#[derive(Debug, Clone, Default, Serialize)]
pub struct MockRequest {
    pub method: String,
    pub path: String,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: u16,
    pub body: serde_json::Value,
    pub headers: HashMap<String, String>,
}

impl MockResponse {
    pub fn ok(body: serde_json::Value) -> Self {
        Self {
            status: 200,
            body,
            headers: HashMap::new(),
        }
    }
}

/// Handler behind a generic HTTP mock
#[async_trait]
pub trait HttpMockHandler: Send + Sync {
    async fn handle(&self, request: &MockRequest, ctx: &RequestContext) -> EmulatorResult<MockResponse>;
}

/// Adapter for synchronous mock closures
pub struct SyncMock<F>(pub F);

#[async_trait]
impl<F> HttpMockHandler for SyncMock<F>
where
    F: Fn(&MockRequest) -> MockResponse + Send + Sync,
{
    async fn handle(&self, request: &MockRequest, _ctx: &RequestContext) -> EmulatorResult<MockResponse> {
        Ok((self.0)(request))
    }
}

/// Handlers keyed by id
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    cases: HashMap<String, CaseHandler>,
    guards: HashMap<String, Arc<dyn Guard>>,
    replies: HashMap<String, Arc<dyn ReplyFn>>,
    mocks: HashMap<String, Arc<dyn HttpMockHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in `echo` handler
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_case("echo", CaseHandler::Context(Arc::new(Echo)));
        registry
    }

    pub fn register_case(&mut self, id: impl Into<String>, handler: CaseHandler) -> &mut Self {
        self.cases.insert(id.into(), handler);
        self
    }

    pub fn register_guard(&mut self, id: impl Into<String>, guard: impl Guard + 'static) -> &mut Self {
        self.guards.insert(id.into(), Arc::new(guard));
        self
    }

    pub fn register_reply(&mut self, id: impl Into<String>, reply: impl ReplyFn + 'static) -> &mut Self {
        self.replies.insert(id.into(), Arc::new(reply));
        self
    }

    pub fn register_mock(&mut self, id: impl Into<String>, handler: impl HttpMockHandler + 'static) -> &mut Self {
        self.mocks.insert(id.into(), Arc::new(handler));
        self
    }

    pub fn case(&self, id: &str) -> EmulatorResult<CaseHandler> {
        self.cases
            .get(id)
            .cloned()
            .ok_or_else(|| EmulatorError::HandlerNotFound(id.to_string()))
    }

    pub fn guard(&self, id: &str) -> EmulatorResult<Arc<dyn Guard>> {
        self.guards
            .get(id)
            .cloned()
            .ok_or_else(|| EmulatorError::HandlerNotFound(format!("guard '{id}'")))
    }

    pub fn reply(&self, id: &str) -> EmulatorResult<Arc<dyn ReplyFn>> {
        self.replies
            .get(id)
            .cloned()
            .ok_or_else(|| EmulatorError::HandlerNotFound(format!("reply '{id}'")))
    }

    pub fn mock(&self, id: &str) -> EmulatorResult<Arc<dyn HttpMockHandler>> {
        self.mocks
            .get(id)
            .cloned()
            .ok_or_else(|| EmulatorError::HandlerNotFound(format!("mock '{id}'")))
    }

    /// Registered case handler ids, sorted
    pub fn case_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.cases.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("cases", &self.case_ids())
            .field("guards", &self.guards.len())
            .field("replies", &self.replies.len())
            .field("mocks", &self.mocks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with(vars: &[(&str, &str)]) -> HandlerContext {
        HandlerContext {
            text: "what is the capital city of nj".into(),
            vars: vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_single_argument_gets_the_only_variable() {
        let handler = CaseHandler::single_fn(|state, _| match state.to_lowercase().as_str() {
            "nj" | "new jersey" => Some("Trenton".into()),
            _ => Some("Mock Capital".into()),
        });
        let out = run_handler(&handler, &["state".into()], &ctx_with(&[("state", "NJ")]))
            .await
            .unwrap();
        assert_eq!(out, "Trenton");
    }

    #[tokio::test]
    async fn test_context_handler_and_none_coercion() {
        let handler = CaseHandler::context_fn(|_| None);
        assert_eq!(run_handler(&handler, &[], &ctx_with(&[])).await.unwrap(), "");

        let handler = CaseHandler::context_fn(|ctx| Some(format!("{} vars", ctx.vars.len())));
        let out = run_handler(&handler, &[], &ctx_with(&[("a", "1"), ("b", "2")]))
            .await
            .unwrap();
        assert_eq!(out, "2 vars");
    }

    #[tokio::test]
    async fn test_template_reply() {
        let handler = CaseHandler::template("Explaining {{topic}}.");
        let out = run_handler(&handler, &["topic".into()], &ctx_with(&[("topic", "gravity")]))
            .await
            .unwrap();
        assert_eq!(out, "Explaining gravity.");
    }

    #[tokio::test]
    async fn test_builtin_echo() {
        let registry = HandlerRegistry::with_builtins();
        let echo = registry.case("echo").unwrap();
        assert_eq!(
            run_handler(&echo, &[], &ctx_with(&[("phrase", "hello there")])).await.unwrap(),
            "hello there"
        );
        assert_eq!(
            run_handler(&echo, &[], &ctx_with(&[])).await.unwrap(),
            "what is the capital city of nj"
        );
    }

    #[test]
    fn test_single_argument_binding_check() {
        let single = CaseHandler::single_fn(|v, _| Some(v.to_string()));
        assert!(single.check_binding("hello {{name}}").is_ok());
        assert!(single.check_binding("{{name}} and {{name}}").is_ok());
        assert!(single.check_binding("hello").is_err());
        assert!(single.check_binding("{{a}} {{b}}").is_err());

        let context = CaseHandler::context_fn(|_| None);
        assert!(context.check_binding("{{a}} {{b}}").is_ok());
    }

    #[tokio::test]
    async fn test_registry_lookup() {
        let mut registry = HandlerRegistry::new();
        registry
            .register_guard("is-vip", |vars: &Vars, _: &RequestContext| {
                vars.get("tier").map(String::as_str) == Some("gold")
            })
            .register_reply("shout", SyncReply(|input: &ReplyInput| input.text.to_uppercase()))
            .register_mock("user", SyncMock(|req: &MockRequest| {
                MockResponse::ok(serde_json::json!({ "id": req.params.get("id") }))
            }));

        let mut vars = Vars::new();
        vars.insert("tier".into(), "gold".into());
        assert!(registry.guard("is-vip").unwrap().allows(&vars, &RequestContext::default()));

        let input = ReplyInput {
            text: "hey".into(),
            vars: Vars::new(),
            state_id: "start".into(),
            branch: 0,
            request: RequestContext::default(),
        };
        assert_eq!(registry.reply("shout").unwrap().reply(&input).await.unwrap(), "HEY");

        let mut req = MockRequest::default();
        req.params.insert("id".into(), "7".into());
        let res = registry
            .mock("user")
            .unwrap()
            .handle(&req, &RequestContext::default())
            .await
            .unwrap();
        assert_eq!(res.body["id"], "7");

        assert!(matches!(registry.case("nope"), Err(EmulatorError::HandlerNotFound(_))));
    }
}
