//! Engine counters and statistics

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;

use crate::latency::LatencyStats;
use crate::matching::MatchMode;

const MAX_LATENCY_SAMPLES: usize = 10_000;

/// Thread-safe engine counters
pub struct EngineState {
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    fallbacks: AtomicU64,
    scenario_steps: AtomicU64,
    by_provider: DashMap<String, u64>,
    by_mode: DashMap<MatchMode, u64>,
    by_case: DashMap<String, u64>,
    faults: DashMap<String, u64>,
    latencies: RwLock<LatencyTracker>,
}

impl EngineState {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            scenario_steps: AtomicU64::new(0),
            by_provider: DashMap::new(),
            by_mode: DashMap::new(),
            by_case: DashMap::new(),
            faults: DashMap::new(),
            latencies: RwLock::new(LatencyTracker::new()),
        }
    }

    pub fn record_request(&self, provider: &str) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        *self.by_provider.entry(provider.to_string()).or_insert(0) += 1;
    }

    pub fn record_error(&self) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a routing outcome; `case` is the matched case label
    pub fn record_match(&self, mode: MatchMode, case: Option<&str>) {
        *self.by_mode.entry(mode).or_insert(0) += 1;
        match case {
            Some(case) => *self.by_case.entry(case.to_string()).or_insert(0) += 1,
            None => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn record_fault(&self, kind: &str) {
        *self.faults.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn record_scenario_step(&self) {
        self.scenario_steps.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the end-to-end handling time of one request
    pub fn record_latency(&self, latency: Duration) {
        self.latencies.write().record(latency);
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            scenario_steps: self.scenario_steps.load(Ordering::Relaxed),
            by_provider: collect(&self.by_provider, String::clone),
            by_mode: collect(&self.by_mode, |mode| mode.as_str().to_string()),
            by_case: collect(&self.by_case, String::clone),
            faults: collect(&self.faults, String::clone),
            latency: self.latencies.read().stats(),
        }
    }

    pub fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.total_errors.store(0, Ordering::Relaxed);
        self.fallbacks.store(0, Ordering::Relaxed);
        self.scenario_steps.store(0, Ordering::Relaxed);
        self.by_provider.clear();
        self.by_mode.clear();
        self.by_case.clear();
        self.faults.clear();
        *self.latencies.write() = LatencyTracker::new();
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new()
    }
}

fn collect<K, F>(map: &DashMap<K, u64>, key: F) -> BTreeMap<String, u64>
where
    K: Eq + std::hash::Hash,
    F: Fn(&K) -> String,
{
    map.iter().map(|entry| (key(entry.key()), *entry.value())).collect()
}

/// Snapshot served by `GET /_emulator/stats`
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStats {
    pub total_requests: u64,
    pub total_errors: u64,
    /// Requests answered with the fallback text
    pub fallbacks: u64,
    pub scenario_steps: u64,
    pub by_provider: BTreeMap<String, u64>,
    pub by_mode: BTreeMap<String, u64>,
    pub by_case: BTreeMap<String, u64>,
    pub faults: BTreeMap<String, u64>,
    pub latency: LatencyStats,
}

impl EngineStats {
    pub fn error_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_errors as f64 / self.total_requests as f64
        }
    }

    pub fn fallback_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.fallbacks as f64 / self.total_requests as f64
        }
    }
}

/// Reservoir of handling latencies in milliseconds
struct LatencyTracker {
    samples: Vec<f64>,
    count: u64,
}

impl LatencyTracker {
    fn new() -> Self {
        Self {
            samples: Vec::with_capacity(256),
            count: 0,
        }
    }

    fn record(&mut self, latency: Duration) {
        self.count += 1;
        let ms = latency.as_secs_f64() * 1000.0;

        if self.samples.len() < MAX_LATENCY_SAMPLES {
            self.samples.push(ms);
        } else {
            // replace with probability max/count
            let idx = rand::random::<usize>() % self.count as usize;
            if idx < MAX_LATENCY_SAMPLES {
                self.samples[idx] = ms;
            }
        }
    }

    fn stats(&self) -> LatencyStats {
        let mut stats = LatencyStats::from_samples(&self.samples);
        stats.samples = self.count;
        stats
    }
}
