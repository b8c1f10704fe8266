//! Request counters readable without blocking in-flight queries.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::pool::ProxyPoolStats;

/// Process-wide attempt counters. Relaxed atomics: the snapshot is
/// approximate under concurrent mutation, which is all observability
/// needs.
#[derive(Debug, Default)]
pub struct EngineStats {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, proxies: ProxyPoolStats) -> StatsSnapshot {
        let attempts = self.attempts.load(Ordering::Relaxed);
        let successes = self.successes.load(Ordering::Relaxed);
        StatsSnapshot {
            total_proxies: proxies.total,
            healthy_proxies: proxies.healthy,
            quarantined_proxies: proxies.quarantined,
            total_requests: attempts,
            successful_requests: successes,
            failed_requests: self.failures.load(Ordering::Relaxed),
            success_rate: if attempts > 0 {
                successes as f64 / attempts as f64
            } else {
                0.0
            },
        }
    }
}

/// Point-in-time engine snapshot for observability collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_proxies: usize,
    pub healthy_proxies: usize,
    pub quarantined_proxies: usize,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub success_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_over_attempts() {
        let stats = EngineStats::new();
        for _ in 0..4 {
            stats.record_attempt();
        }
        stats.record_success();
        stats.record_failure();
        stats.record_failure();
        stats.record_failure();

        let snap = stats.snapshot(ProxyPoolStats {
            total: 2,
            healthy: 1,
            quarantined: 1,
        });
        assert_eq!(snap.total_requests, 4);
        assert_eq!(snap.successful_requests, 1);
        assert!((snap.success_rate - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn snapshot_serializes_for_reporting() {
        let stats = EngineStats::new();
        stats.record_attempt();
        stats.record_success();

        let snap = stats.snapshot(ProxyPoolStats {
            total: 3,
            healthy: 2,
            quarantined: 1,
        });
        let value = serde_json::to_value(&snap).unwrap();
        assert_eq!(value["total_proxies"], 3);
        assert_eq!(value["quarantined_proxies"], 1);
        assert_eq!(value["total_requests"], 1);
        assert_eq!(value["success_rate"], 1.0);
    }

    #[test]
    fn zero_attempts_is_zero_rate() {
        let stats = EngineStats::new();
        let snap = stats.snapshot(ProxyPoolStats {
            total: 0,
            healthy: 0,
            quarantined: 0,
        });
        assert_eq!(snap.success_rate, 0.0);
    }
}
