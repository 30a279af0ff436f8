//! Latency simulation module
//!
//! Every response waits `mean + ((U - 0.5) * (p95 - mean)) / 2`
//! milliseconds, plus `U * jitter` when a jitter is configured.
//! Conditional overrides adjust mean and p95 per request.

mod sampler;

pub use sampler::*;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::LatencyProfile;
use crate::context::RequestContext;

/// Mean latency when the profile leaves it unset
pub const DEFAULT_MEAN_MS: f64 = 100.0;
/// p95 latency when the profile leaves it unset
pub const DEFAULT_P95_MS: f64 = 300.0;

/// Mean and p95 after applying overrides
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveLatency {
    pub mean_ms: f64,
    pub p95_ms: f64,
    pub jitter_ms: f64,
}

/// Resolve a profile against a request; every matching override applies in order
pub fn effective_latency(profile: Option<&LatencyProfile>, ctx: &RequestContext) -> EffectiveLatency {
    let Some(profile) = profile else {
        return EffectiveLatency {
            mean_ms: DEFAULT_MEAN_MS,
            p95_ms: DEFAULT_P95_MS,
            jitter_ms: 0.0,
        };
    };

    let mut mean = profile.mean_ms.unwrap_or(DEFAULT_MEAN_MS);
    let mut p95 = profile.p95_ms.unwrap_or(DEFAULT_P95_MS);

    for over in &profile.overrides {
        let applies = over.when.as_ref().map_or(true, |when| when.matches(ctx));
        if applies {
            mean = over.mean_ms.unwrap_or(mean);
            p95 = over.p95_ms.unwrap_or(p95);
        }
    }

    EffectiveLatency {
        mean_ms: mean,
        p95_ms: p95,
        jitter_ms: profile.jitter_ms.unwrap_or(0.0),
    }
}

/// Samples artificial latency from a shared uniform source
#[derive(Clone)]
pub struct LatencySampler {
    source: Arc<dyn UniformSource>,
}

impl LatencySampler {
    pub fn new(source: Arc<dyn UniformSource>) -> Self {
        Self { source }
    }

    /// Create a sampler with a fixed seed for deterministic behavior
    pub fn with_seed(seed: u64) -> Self {
        Self::new(Arc::new(SeededSource::with_seed(seed)))
    }

    /// Latency in whole milliseconds, never negative
    pub fn latency_ms(&self, profile: Option<&LatencyProfile>, ctx: &RequestContext) -> u64 {
        let latency = effective_latency(profile, ctx);

        let base = latency.mean_ms + ((self.source.next_unit() - 0.5) * (latency.p95_ms - latency.mean_ms)) / 2.0;
        let jitter = if latency.jitter_ms > 0.0 {
            self.source.next_unit() * latency.jitter_ms
        } else {
            0.0
        };

        (base + jitter).round().max(0.0) as u64
    }

    pub fn sample(&self, profile: Option<&LatencyProfile>, ctx: &RequestContext) -> Duration {
        Duration::from_millis(self.latency_ms(profile, ctx))
    }
}

impl Default for LatencySampler {
    fn default() -> Self {
        Self::new(Arc::new(SeededSource::new()))
    }
}

/// Statistics from latency sampling
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatencyStats {
    pub samples: u64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub std_dev_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

impl LatencyStats {
    /// Compute statistics from a set of samples
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let percentile = |p: f64| -> f64 {
            let idx = (p * (sorted.len() - 1) as f64) as usize;
            sorted[idx]
        };

        Self {
            samples: samples.len() as u64,
            min_ms: sorted[0],
            max_ms: sorted[sorted.len() - 1],
            mean_ms: mean,
            std_dev_ms: variance.sqrt(),
            p50_ms: percentile(0.50),
            p95_ms: percentile(0.95),
            p99_ms: percentile(0.99),
        }
    }
}
