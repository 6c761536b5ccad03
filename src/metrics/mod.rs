//! Metrics collection module
//!
//! Tracks search counts, error rates, retries, and response times for one
//! client instance.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Per-client metrics collector
pub struct Metrics {
    /// Total search count
    total_searches: AtomicU64,
    /// Successful search count
    successes: AtomicU64,
    /// Retry attempts performed across all searches
    retries: AtomicU64,
    /// Failure counts keyed by error kind
    failures: RwLock<HashMap<String, u64>>,
    /// Response times (rolling window, ms)
    response_times: RwLock<Vec<u64>>,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            total_searches: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            failures: RwLock::new(HashMap::new()),
            response_times: RwLock::new(Vec::new()),
        }
    }

    /// Record the start of a search
    pub fn inc_search(&self) {
        self.total_searches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful search
    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a retry attempt
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a terminal failure by error kind
    pub fn record_failure(&self, kind: &str) {
        let mut failures = self.failures.write().unwrap();
        *failures.entry(kind.to_string()).or_insert(0) += 1;
    }

    /// Record a search response time
    pub fn record_response_time(&self, time_ms: u64) {
        let mut times = self.response_times.write().unwrap();

        // Keep last 100 response times
        if times.len() >= 100 {
            times.remove(0);
        }
        times.push(time_ms);
    }

    /// Get total searches
    pub fn total_searches(&self) -> u64 {
        self.total_searches.load(Ordering::Relaxed)
    }

    /// Get successful search count
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    /// Get total retry attempts
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Get failure count for one error kind
    pub fn failures_of(&self, kind: &str) -> u64 {
        let failures = self.failures.read().unwrap();
        *failures.get(kind).unwrap_or(&0)
    }

    /// Get total failure count across all kinds
    pub fn total_failures(&self) -> u64 {
        let failures = self.failures.read().unwrap();
        failures.values().sum()
    }

    /// Get average response time in milliseconds
    pub fn avg_response_time(&self) -> Option<u64> {
        let times = self.response_times.read().unwrap();
        if times.is_empty() {
            None
        } else {
            Some(times.iter().sum::<u64>() / times.len() as u64)
        }
    }

    /// Success percentage over completed searches
    pub fn reliability(&self) -> f64 {
        let successes = self.successes();
        let total = successes + self.total_failures();
        if total == 0 {
            100.0
        } else {
            (successes as f64 / total as f64) * 100.0
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let metrics = Metrics::new();

        metrics.inc_search();
        metrics.record_response_time(100);
        metrics.record_success();

        assert_eq!(metrics.total_searches(), 1);
        assert_eq!(metrics.avg_response_time(), Some(100));
        assert_eq!(metrics.reliability(), 100.0);
    }

    #[test]
    fn test_failures_by_kind() {
        let metrics = Metrics::new();
        metrics.record_failure("server");
        metrics.record_failure("server");
        metrics.record_failure("network");

        assert_eq!(metrics.failures_of("server"), 2);
        assert_eq!(metrics.failures_of("network"), 1);
        assert_eq!(metrics.failures_of("rate_limit"), 0);
        assert_eq!(metrics.total_failures(), 3);
    }

    #[test]
    fn test_response_time_window_bounded() {
        let metrics = Metrics::new();
        for i in 0..150 {
            metrics.record_response_time(i);
        }
        // Rolling window keeps the most recent 100 entries
        let avg = metrics.avg_response_time().unwrap();
        assert!(avg >= 50);
    }
}
