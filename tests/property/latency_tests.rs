//! Property-based tests for latency sampling

use std::sync::Arc;

use proptest::prelude::*;
use llm_emulator::config::LatencyProfile;
use llm_emulator::context::RequestContext;
use llm_emulator::latency::{ConstantSource, LatencySampler};

fn profile(mean: f64, p95: f64, jitter: f64) -> LatencyProfile {
    LatencyProfile {
        mean_ms: Some(mean),
        p95_ms: Some(p95),
        jitter_ms: Some(jitter),
        ..Default::default()
    }
}

proptest! {
    /// Samples stay within a quarter of the mean-to-p95 spread, plus jitter
    #[test]
    fn test_latency_within_bounds(
        mean in 0.0f64..1000.0,
        p95 in 0.0f64..2000.0,
        jitter in 0.0f64..100.0,
        seed in any::<u64>(),
    ) {
        let sampler = LatencySampler::with_seed(seed);
        let profile = profile(mean, p95, jitter);
        let ctx = RequestContext::default();
        let spread = (p95 - mean).abs() / 4.0;

        for _ in 0..20 {
            let ms = sampler.latency_ms(Some(&profile), &ctx) as f64;
            prop_assert!(ms >= (mean - spread - 1.0).max(0.0), "{} below bound", ms);
            prop_assert!(ms <= mean + spread + jitter + 1.0, "{} above bound", ms);
        }
    }

    /// Same seed, same sequence
    #[test]
    fn test_seeded_sampler_deterministic(seed in any::<u64>()) {
        let profile = profile(100.0, 300.0, 10.0);
        let ctx = RequestContext::default();
        let a = LatencySampler::with_seed(seed);
        let b = LatencySampler::with_seed(seed);

        for _ in 0..10 {
            prop_assert_eq!(a.latency_ms(Some(&profile), &ctx), b.latency_ms(Some(&profile), &ctx));
        }
    }

    /// The middle draw lands on the mean
    #[test]
    fn test_midpoint_is_mean(mean in 0u32..5000, p95 in 0u32..5000) {
        let sampler = LatencySampler::new(Arc::new(ConstantSource(0.5)));
        let profile = profile(f64::from(mean), f64::from(p95), 0.0);
        prop_assert_eq!(sampler.latency_ms(Some(&profile), &RequestContext::default()), u64::from(mean));
    }
}

#[test]
fn test_instant_profile_never_sleeps() {
    let sampler = LatencySampler::with_seed(1);
    let ctx = RequestContext::default();
    for _ in 0..100 {
        assert_eq!(sampler.latency_ms(Some(&LatencyProfile::instant()), &ctx), 0);
    }
}
