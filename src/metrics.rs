//! Run counters for sweeps and retrieval.
//!
//! Atomic counters plus a sliding window of page-fetch latencies, summarised
//! in the log at the end of each command.

use crate::config::LATENCY_WINDOW_SIZE;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::info;

pub struct MetricsCollector {
    /// Sweep units materialized in this run
    pub units_computed: AtomicU64,
    /// Sweep units already present in the store
    pub units_skipped: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub pages_fetched: AtomicU64,
    /// Strings with a performance record written in this run
    pub strings_scored: AtomicU64,
    /// Strings recorded with the malformed-query sentinel
    pub strings_invalid: AtomicU64,
    /// Sliding window of recent page latencies (ms)
    page_latencies: RwLock<VecDeque<f64>>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            units_computed: AtomicU64::new(0),
            units_skipped: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            pages_fetched: AtomicU64::new(0),
            strings_scored: AtomicU64::new(0),
            strings_invalid: AtomicU64::new(0),
            page_latencies: RwLock::new(VecDeque::with_capacity(LATENCY_WINDOW_SIZE)),
        }
    }

    pub fn record_unit_computed(&self) {
        self.units_computed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unit_skipped(&self) {
        self.units_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_string_scored(&self) {
        self.strings_scored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_string_invalid(&self) {
        self.strings_invalid.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a fetched page with its latency
    pub fn record_page(&self, latency_ms: f64) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut latencies) = self.page_latencies.write() {
            if latencies.len() >= LATENCY_WINDOW_SIZE {
                latencies.pop_front();
            }
            latencies.push_back(latency_ms);
        }
    }

    /// Calculate P99 latency from the sliding window
    pub fn get_p99_latency(&self) -> f64 {
        if let Ok(latencies) = self.page_latencies.read() {
            if latencies.is_empty() {
                return 0.0;
            }

            let mut sorted: Vec<f64> = latencies.iter().copied().collect();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

            let p99_index = ((sorted.len() as f64) * 0.99).ceil() as usize - 1;
            let p99_index = p99_index.min(sorted.len() - 1);
            sorted[p99_index]
        } else {
            0.0
        }
    }

    pub fn get_avg_latency(&self) -> f64 {
        if let Ok(latencies) = self.page_latencies.read() {
            if latencies.is_empty() {
                return 0.0;
            }
            latencies.iter().sum::<f64>() / latencies.len() as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        info!(
            "📊 units computed={} skipped={} | cache hits={} misses={}",
            self.units_computed.load(Ordering::Relaxed),
            self.units_skipped.load(Ordering::Relaxed),
            self.cache_hits.load(Ordering::Relaxed),
            self.cache_misses.load(Ordering::Relaxed),
        );
        info!(
            "📊 strings scored={} invalid={} | pages={} avg={:.1}ms p99={:.1}ms",
            self.strings_scored.load(Ordering::Relaxed),
            self.strings_invalid.load(Ordering::Relaxed),
            self.pages_fetched.load(Ordering::Relaxed),
            self.get_avg_latency(),
            self.get_p99_latency(),
        );
    }
}
