//! Property-based tests for fault selection

use std::sync::Arc;

use proptest::prelude::*;
use llm_emulator::config::{Condition, FaultKind, FaultSpec};
use llm_emulator::context::RequestContext;
use llm_emulator::engine::FaultInjector;
use llm_emulator::latency::{ConstantSource, SeededSource};

fn http(code: u16) -> FaultSpec {
    FaultSpec::new(FaultKind::Http(code))
}

proptest! {
    /// A fault fires exactly when the draw is below its ratio
    #[test]
    fn test_bernoulli_threshold(u in 0.0f64..1.0, ratio in 0.0f64..=1.0) {
        let injector = FaultInjector::new(Arc::new(ConstantSource(u)));
        let faults = vec![http(500).with_ratio(ratio)];
        let picked = injector.pick_fault(&faults, &RequestContext::default());
        prop_assert_eq!(picked.is_some(), u < ratio);
    }

    #[test]
    fn test_zero_ratio_never_fires(seed in any::<u64>()) {
        let injector = FaultInjector::new(Arc::new(SeededSource::with_seed(seed)));
        let faults = vec![http(503).with_ratio(0.0)];
        for _ in 0..50 {
            prop_assert!(injector.pick_fault(&faults, &RequestContext::default()).is_none());
        }
    }

    #[test]
    fn test_full_ratio_always_fires(seed in any::<u64>()) {
        let injector = FaultInjector::new(Arc::new(SeededSource::with_seed(seed)));
        let faults = vec![http(429)];
        for _ in 0..50 {
            prop_assert!(injector.pick_fault(&faults, &RequestContext::default()).is_some());
        }
    }

    /// An unmet condition suppresses the fault whatever the draw
    #[test]
    fn test_condition_gates_fault(u in 0.0f64..1.0, env in "[a-z]{1,8}") {
        let injector = FaultInjector::new(Arc::new(ConstantSource(u)));
        let faults = vec![http(500).with_when(Condition {
            env: Some(format!("{env}-other")),
            ..Default::default()
        })];
        let ctx = RequestContext { env, ..Default::default() };
        prop_assert!(injector.pick_fault(&faults, &ctx).is_none());
    }

    /// Only known status codes parse as HTTP faults
    #[test]
    fn test_http_kind_parsing(code in 100u16..600) {
        let kind = FaultKind::from(format!("HTTP_{code}"));
        let known = llm_emulator::config::FAULT_HTTP_CODES.contains(&code);
        prop_assert_eq!(matches!(kind, FaultKind::Http(c) if c == code), known);
        prop_assert_eq!(kind.as_str(), format!("HTTP_{code}"));
    }
}
