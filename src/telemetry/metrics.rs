//! Prometheus-format metrics

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;

use crate::engine::EngineStats;

const MAX_OBSERVATIONS: usize = 10_000;
const BUCKETS: [f64; 11] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Counters and histograms keyed by their full series name
pub struct MetricsRegistry {
    counters: RwLock<BTreeMap<String, AtomicU64>>,
    histograms: RwLock<BTreeMap<String, Histogram>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(BTreeMap::new()),
            histograms: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn counter_inc(&self, name: &str, value: u64) {
        let counters = self.counters.read();
        if let Some(counter) = counters.get(name) {
            counter.fetch_add(value, Ordering::Relaxed);
            return;
        }
        drop(counters);
        self.counters
            .write()
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(value, Ordering::Relaxed);
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .read()
            .get(name)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    pub fn histogram_observe(&self, name: &str, value: f64) {
        self.histograms
            .write()
            .entry(name.to_string())
            .or_default()
            .observe(value);
    }

    pub fn export_prometheus(&self, out: &mut String) {
        for (name, counter) in self.counters.read().iter() {
            let _ = writeln!(out, "{name} {}", counter.load(Ordering::Relaxed));
        }

        for (name, hist) in self.histograms.read().iter() {
            let _ = writeln!(out, "# TYPE {name} histogram");
            for bucket in BUCKETS {
                let _ = writeln!(out, "{name}_bucket{{le=\"{bucket}\"}} {}", hist.count_below(bucket));
            }
            let _ = writeln!(out, "{name}_bucket{{le=\"+Inf\"}} {}", hist.count);
            let _ = writeln!(out, "{name}_sum {}", hist.sum);
            let _ = writeln!(out, "{name}_count {}", hist.count);
        }
    }

    pub fn reset(&self) {
        self.counters.write().clear();
        self.histograms.write().clear();
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Histogram over a bounded window of observations
#[derive(Debug, Default)]
pub struct Histogram {
    values: Vec<f64>,
    sum: f64,
    count: u64,
}

impl Histogram {
    pub fn observe(&mut self, value: f64) {
        if self.values.len() < MAX_OBSERVATIONS {
            self.values.push(value);
        } else {
            let idx = rand::random::<usize>() % self.values.len();
            self.values[idx] = value;
        }
        self.sum += value;
        self.count += 1;
    }

    /// Observations at or below `threshold`, scaled to the full count
    pub fn count_below(&self, threshold: f64) -> u64 {
        if self.values.is_empty() {
            return 0;
        }
        let below = self.values.iter().filter(|&&v| v <= threshold).count() as f64;
        (below / self.values.len() as f64 * self.count as f64).round() as u64
    }
}

pub mod metric_names {
    pub const HTTP_REQUESTS: &str = "llm_emulator_http_requests_total";
    pub const HTTP_DURATION: &str = "llm_emulator_http_request_duration_seconds";
    pub const STREAM_CHUNKS: &str = "llm_emulator_stream_chunks_total";
    pub const CONTRACT_VIOLATIONS: &str = "llm_emulator_contract_violations_total";
    pub const VCR_REPLAYS: &str = "llm_emulator_vcr_replays_total";
    pub const VCR_RECORDS: &str = "llm_emulator_vcr_records_total";

    pub const REQUESTS: &str = "llm_emulator_requests_total";
    pub const ERRORS: &str = "llm_emulator_errors_total";
    pub const MATCHES: &str = "llm_emulator_matches_total";
    pub const CASE_HITS: &str = "llm_emulator_case_hits_total";
    pub const FAULTS: &str = "llm_emulator_faults_total";
    pub const SCENARIO_STEPS: &str = "llm_emulator_scenario_steps_total";
    pub const LATENCY: &str = "llm_emulator_reply_latency_ms";
}

use metric_names as names;

/// Transport-level metrics; engine counters are folded in at export
pub struct EmulatorMetrics {
    registry: MetricsRegistry,
}

impl EmulatorMetrics {
    pub fn new() -> Self {
        Self {
            registry: MetricsRegistry::new(),
        }
    }

    pub fn record_http(&self, route: &str, status: u16, duration: Duration) {
        let key = format!("{}{{route=\"{route}\",status=\"{status}\"}}", names::HTTP_REQUESTS);
        self.registry.counter_inc(&key, 1);
        let hist = format!("{}{{route=\"{route}\"}}", names::HTTP_DURATION);
        self.registry.histogram_observe(&hist, duration.as_secs_f64());
    }

    pub fn record_stream_chunks(&self, provider: &str, chunks: u64) {
        let key = format!("{}{{provider=\"{provider}\"}}", names::STREAM_CHUNKS);
        self.registry.counter_inc(&key, chunks);
    }

    pub fn record_contract_violation(&self, name: &str) {
        let key = format!("{}{{contract=\"{name}\"}}", names::CONTRACT_VIOLATIONS);
        self.registry.counter_inc(&key, 1);
    }

    pub fn record_vcr_replay(&self) {
        self.registry.counter_inc(names::VCR_REPLAYS, 1);
    }

    pub fn record_vcr_record(&self) {
        self.registry.counter_inc(names::VCR_RECORDS, 1);
    }

    pub fn registry(&self) -> &MetricsRegistry {
        &self.registry
    }

    /// Render engine statistics and transport metrics as Prometheus text
    pub fn export(&self, stats: &EngineStats) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "# TYPE {} counter", names::REQUESTS);
        for (provider, n) in &stats.by_provider {
            let _ = writeln!(out, "{}{{provider=\"{provider}\"}} {n}", names::REQUESTS);
        }
        let _ = writeln!(out, "# TYPE {} counter", names::ERRORS);
        let _ = writeln!(out, "{} {}", names::ERRORS, stats.total_errors);
        let _ = writeln!(out, "# TYPE {} counter", names::MATCHES);
        for (mode, n) in &stats.by_mode {
            let _ = writeln!(out, "{}{{mode=\"{mode}\"}} {n}", names::MATCHES);
        }
        let _ = writeln!(out, "# TYPE {} counter", names::CASE_HITS);
        for (case, n) in &stats.by_case {
            let _ = writeln!(out, "{}{{case=\"{}\"}} {n}", names::CASE_HITS, escape_label(case));
        }
        let _ = writeln!(out, "# TYPE {} counter", names::FAULTS);
        for (kind, n) in &stats.faults {
            let _ = writeln!(out, "{}{{kind=\"{kind}\"}} {n}", names::FAULTS);
        }
        let _ = writeln!(out, "# TYPE {} counter", names::SCENARIO_STEPS);
        let _ = writeln!(out, "{} {}", names::SCENARIO_STEPS, stats.scenario_steps);

        let latency = &stats.latency;
        let _ = writeln!(out, "# TYPE {} summary", names::LATENCY);
        for (q, v) in [("0.5", latency.p50_ms), ("0.95", latency.p95_ms), ("0.99", latency.p99_ms)] {
            let _ = writeln!(out, "{}{{quantile=\"{q}\"}} {v}", names::LATENCY);
        }
        let _ = writeln!(out, "{}_count {}", names::LATENCY, latency.samples);

        self.registry.export_prometheus(&mut out);
        out
    }

    pub fn reset(&self) {
        self.registry.reset();
    }
}

impl Default for EmulatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}
