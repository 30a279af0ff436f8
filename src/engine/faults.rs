//! Fault selection and latency application

use std::future::Future;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::{CaseOptions, Condition, FaultKind, FaultSpec};
use crate::context::RequestContext;
use crate::error::EmulatorResult;
use crate::latency::{LatencySampler, UniformSource};

/// Body of an injected `HTTP_429` without a configured body
const RATE_LIMIT_MESSAGE: &str = "rate limited";
/// Deliberately truncated JSON for `MALFORMED_JSON`
pub const MALFORMED_JSON_BODY: &str = r#"{"not":"closed""#;

/// Absent or empty conditions always apply
pub fn should_apply(when: Option<&Condition>, ctx: &RequestContext) -> bool {
    when.map_or(true, |cond| cond.matches(ctx))
}

/// A fault that replaces the normal payload
#[derive(Debug, Clone, PartialEq)]
pub enum FaultResponse {
    /// Never respond
    Hang,
    Http {
        status: u16,
        body: Value,
        retry_after_secs: Option<u64>,
    },
    /// 200 with a JSON content type and an unparsable body
    MalformedJson,
}

/// What the transport should emit
#[derive(Debug, Clone, PartialEq)]
pub enum Emission<T> {
    Payload(T),
    Fault(FaultResponse),
}

impl<T> Emission<T> {
    pub fn payload(self) -> Option<T> {
        match self {
            Self::Payload(p) => Some(p),
            Self::Fault(_) => None,
        }
    }
}

/// Picks faults and latency from a shared random source
#[derive(Clone)]
pub struct FaultInjector {
    source: Arc<dyn UniformSource>,
    latency: LatencySampler,
}

impl FaultInjector {
    pub fn new(source: Arc<dyn UniformSource>) -> Self {
        Self {
            latency: LatencySampler::new(source.clone()),
            source,
        }
    }

    /// First fault whose condition holds and whose Bernoulli draw succeeds
    pub fn pick_fault<'a>(&self, faults: &'a [FaultSpec], ctx: &RequestContext) -> Option<&'a FaultSpec> {
        faults.iter().find(|fault| {
            should_apply(fault.when.as_ref(), ctx) && self.source.next_unit() < fault.ratio
        })
    }


    /// Sleep for the sampled latency, then either run `send` or return a fault.
    ///
    /// Stream faults are recorded on `ctx` and `send` still runs; the
    /// transport mutates the stream.
    pub async fn apply_fault_or_latency<T, F, Fut>(
        &self,
        options: &CaseOptions,
        ctx: &mut RequestContext,
        send: F,
    ) -> EmulatorResult<Emission<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = EmulatorResult<T>>,
    {
        let delay = self.latency.sample(options.latency.as_ref(), ctx);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let Some(fault) = self.pick_fault(&options.faults, ctx) else {
            return send().await.map(Emission::Payload);
        };

        tracing::info!(
            kind = %fault.kind,
            provider = %ctx.provider,
            request_id = %ctx.request_id,
            "fault.injected"
        );

        if fault.kind.is_stream_fault() {
            ctx.stream_fault = Some(fault.clone());
            return send().await.map(Emission::Payload);
        }

        let response = match &fault.kind {
            FaultKind::Timeout => FaultResponse::Hang,
            FaultKind::Http(429) => FaultResponse::Http {
                status: 429,
                body: json!({
                    "error": fault.body.clone().unwrap_or_else(|| json!({ "message": RATE_LIMIT_MESSAGE }))
                }),
                retry_after_secs: fault.retry_after_sec,
            },
            FaultKind::Http(code) => FaultResponse::Http {
                status: *code,
                body: fault
                    .body
                    .clone()
                    .unwrap_or_else(|| json!({ "error": { "message": format!("mock error {code}") } })),
                retry_after_secs: None,
            },
            FaultKind::MalformedJson => FaultResponse::MalformedJson,
            FaultKind::StreamDropAfter | FaultKind::StreamDuplicateChunk | FaultKind::Unknown(_) => {
                return send().await.map(Emission::Payload)
            }
        };

        Ok(Emission::Fault(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::config::LatencyProfile;
    use crate::latency::{ConstantSource, SeededSource};

    fn injector(u: f64) -> FaultInjector {
        FaultInjector::new(Arc::new(ConstantSource(u)))
    }

    fn instant(faults: Vec<FaultSpec>) -> CaseOptions {
        CaseOptions {
            latency: Some(LatencyProfile::instant()),
            faults,
            ..Default::default()
        }
    }

    fn chaos_ctx() -> RequestContext {
        let mut ctx = RequestContext::new("openai.chat");
        ctx.env = "chaos".into();
        ctx
    }

    #[test]
    fn test_should_apply() {
        let ctx = chaos_ctx();
        assert!(should_apply(None, &ctx));
        assert!(should_apply(Some(&Condition::default()), &ctx));
        let local = Condition {
            env: Some("local".into()),
            ..Default::default()
        };
        assert!(!should_apply(Some(&local), &ctx));
    }

    #[test]
    fn test_ratio_one_always_and_zero_never() {
        let seeded = FaultInjector::new(Arc::new(SeededSource::with_seed(1)));
        let always = [FaultSpec::new(FaultKind::Timeout)];
        let never = [FaultSpec::new(FaultKind::Timeout).with_ratio(0.0)];
        for _ in 0..200 {
            assert!(seeded.pick_fault(&always, &chaos_ctx()).is_some());
            assert!(seeded.pick_fault(&never, &chaos_ctx()).is_none());
        }
        // even a zero draw does not fire a zero-ratio fault
        assert!(injector(0.0).pick_fault(&never, &chaos_ctx()).is_none());
    }

    #[test]
    fn test_failed_draw_moves_to_next_fault() {
        let faults = [
            FaultSpec::new(FaultKind::Http(500)).with_ratio(0.3),
            FaultSpec::new(FaultKind::Http(503)).with_ratio(0.8),
        ];
        let picked = injector(0.5).pick_fault(&faults, &chaos_ctx()).unwrap();
        assert_eq!(picked.kind, FaultKind::Http(503));
    }

    #[test]
    fn test_predicate_skips_fault() {
        let faults = [
            FaultSpec::new(FaultKind::Http(500)).with_when(Condition {
                env: Some("prod".into()),
                ..Default::default()
            }),
            FaultSpec::new(FaultKind::MalformedJson),
        ];
        let picked = injector(0.1).pick_fault(&faults, &chaos_ctx()).unwrap();
        assert_eq!(picked.kind, FaultKind::MalformedJson);
    }

    #[tokio::test]
    async fn test_no_fault_sends_payload() {
        let mut ctx = chaos_ctx();
        let out = injector(0.5)
            .apply_fault_or_latency(&instant(vec![]), &mut ctx, || async { Ok("hello") })
            .await
            .unwrap();
        assert_eq!(out, Emission::Payload("hello"));
    }

    #[tokio::test]
    async fn test_rate_limit_fault() {
        let mut fault = FaultSpec::new(FaultKind::Http(429));
        fault.retry_after_sec = Some(10);
        let mut ctx = chaos_ctx();

        let out = injector(0.5)
            .apply_fault_or_latency(&instant(vec![fault]), &mut ctx, || async { Ok(()) })
            .await
            .unwrap();

        assert_eq!(
            out,
            Emission::Fault(FaultResponse::Http {
                status: 429,
                body: json!({ "error": { "message": "rate limited" } }),
                retry_after_secs: Some(10),
            })
        );
    }

    #[tokio::test]
    async fn test_http_fault_default_and_custom_body() {
        let mut ctx = chaos_ctx();
        let out = injector(0.5)
            .apply_fault_or_latency(&instant(vec![FaultSpec::new(FaultKind::Http(502))]), &mut ctx, || async {
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(
            out,
            Emission::Fault(FaultResponse::Http {
                status: 502,
                body: json!({ "error": { "message": "mock error 502" } }),
                retry_after_secs: None,
            })
        );

        let mut custom = FaultSpec::new(FaultKind::Http(422));
        custom.body = Some(json!({ "detail": "bad" }));
        let out = injector(0.5)
            .apply_fault_or_latency(&instant(vec![custom]), &mut ctx, || async { Ok(()) })
            .await
            .unwrap();
        assert_matches!(out, Emission::Fault(FaultResponse::Http { status: 422, ref body, .. }) if body["detail"] == "bad");
    }

    #[tokio::test]
    async fn test_stream_fault_tags_context_and_sends() {
        let mut ctx = chaos_ctx();
        let out = injector(0.5)
            .apply_fault_or_latency(&instant(vec![FaultSpec::new(FaultKind::StreamDropAfter)]), &mut ctx, || async {
                Ok(1)
            })
            .await
            .unwrap();
        assert_eq!(out, Emission::Payload(1));
        assert_eq!(ctx.stream_fault.map(|f| f.kind), Some(FaultKind::StreamDropAfter));
    }

    #[tokio::test]
    async fn test_unknown_kind_is_no_fault() {
        let mut ctx = chaos_ctx();
        let out = injector(0.5)
            .apply_fault_or_latency(&instant(vec![FaultSpec::new(FaultKind::Unknown("BOOM".into()))]), &mut ctx, || async {
                Ok("ok")
            })
            .await
            .unwrap();
        assert_eq!(out, Emission::Payload("ok"));
    }

    #[tokio::test]
    async fn test_timeout_and_malformed() {
        let mut ctx = chaos_ctx();
        let hang = injector(0.5)
            .apply_fault_or_latency(&instant(vec![FaultSpec::new(FaultKind::Timeout)]), &mut ctx, || async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(hang, Emission::Fault(FaultResponse::Hang));

        let bad = injector(0.5)
            .apply_fault_or_latency(&instant(vec![FaultSpec::new(FaultKind::MalformedJson)]), &mut ctx, || async {
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(bad, Emission::Fault(FaultResponse::MalformedJson));
        assert!(serde_json::from_str::<Value>(MALFORMED_JSON_BODY).is_err());
    }

    #[tokio::test]
    async fn test_latency_is_slept_before_sending() {
        let options = CaseOptions {
            latency: Some(LatencyProfile {
                mean_ms: Some(30.0),
                p95_ms: Some(30.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut ctx = chaos_ctx();
        let started = std::time::Instant::now();
        injector(0.5)
            .apply_fault_or_latency(&options, &mut ctx, || async { Ok(()) })
            .await
            .unwrap();
        assert!(started.elapsed() >= std::time::Duration::from_millis(30));
    }
}
