//! Per-endpoint health tracking and circuit breaker.
//!
//! Counters are cumulative for the lifetime of the endpoint entry except where the
//! circuit-close rule explicitly resets them (see [`HealthTracker::record_success`]).

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use tokio::sync::RwLock;

/// How long a tripped circuit stays closed-off before a single probe is let through.
pub const CIRCUIT_OPEN_WINDOW: Duration = Duration::from_secs(30);

/// A snapshot of one endpoint's call history. Returned by [`HealthTracker::snapshot`] as
/// an owned copy — callers never see a live reference into the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndpointHealth {
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    /// Exponentially weighted moving average, weight 0.9 on the old value, 0.1 on the new.
    pub avg_latency_ms: f64,
    pub last_success: Option<SystemTime>,
    pub last_failure: Option<SystemTime>,
    pub circuit_open: bool,
}

impl Default for EndpointHealth {
    fn default() -> Self {
        EndpointHealth {
            total_calls: 0,
            successful_calls: 0,
            failed_calls: 0,
            avg_latency_ms: 0.0,
            last_success: None,
            last_failure: None,
            circuit_open: false,
        }
    }
}

impl EndpointHealth {
    fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            1.0
        } else {
            self.successful_calls as f64 / self.total_calls as f64
        }
    }

    /// `0.7 * success_rate + 0.3 * (1 / (avg_latency_ms + 1))`.
    pub fn score(&self) -> f64 {
        0.7 * self.success_rate() + 0.3 * (1.0 / (self.avg_latency_ms + 1.0))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct EndpointState {
    health: EndpointHealth,
    consecutive_successes: u32,
}

/// Tracks health and circuit-breaker state for a set of RPC endpoints, keyed by URL.
#[derive(Default)]
pub struct HealthTracker {
    endpoints: RwLock<HashMap<String, EndpointState>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `endpoint` may currently be attempted. Endpoints with no recorded history
    /// are healthy. A tripped circuit stays unhealthy until [`CIRCUIT_OPEN_WINDOW`] has
    /// elapsed since its last failure, at which point a single probe is permitted.
    pub async fn is_healthy(&self, endpoint: &str) -> bool {
        let endpoints = self.endpoints.read().await;
        match endpoints.get(endpoint) {
            None => true,
            Some(state) if !state.health.circuit_open => true,
            Some(state) => match state.health.last_failure {
                Some(last_failure) => {
                    SystemTime::now()
                        .duration_since(last_failure)
                        .unwrap_or(Duration::ZERO)
                        >= CIRCUIT_OPEN_WINDOW
                }
                None => true,
            },
        }
    }

    pub async fn record_success(&self, endpoint: &str, latency_ms: f64) {
        let mut endpoints = self.endpoints.write().await;
        let state = endpoints.entry(endpoint.to_string()).or_default();
        let health = &mut state.health;
        health.total_calls += 1;
        health.successful_calls += 1;
        health.last_success = Some(SystemTime::now());
        health.avg_latency_ms = if health.total_calls == 1 {
            latency_ms
        } else {
            0.9 * health.avg_latency_ms + 0.1 * latency_ms
        };
        state.consecutive_successes += 1;

        if health.circuit_open && state.consecutive_successes >= 2 {
            health.circuit_open = false;
            // The open/close rule is defined over lifetime failed/successful counts, so
            // a closed circuit must start from a clean slate or it would immediately
            // re-trip on the next failure.
            health.successful_calls = 0;
            health.failed_calls = 0;
            health.total_calls = 0;
            state.consecutive_successes = 0;
            tracing::info!(endpoint, "circuit closed after consecutive successes");
        }
    }

    pub async fn record_failure(&self, endpoint: &str) {
        let mut endpoints = self.endpoints.write().await;
        let state = endpoints.entry(endpoint.to_string()).or_default();
        let health = &mut state.health;
        health.total_calls += 1;
        health.failed_calls += 1;
        health.last_failure = Some(SystemTime::now());
        state.consecutive_successes = 0;

        if !health.circuit_open && health.failed_calls.saturating_sub(health.successful_calls) >= 3
        {
            health.circuit_open = true;
            tracing::warn!(endpoint, "circuit opened after consecutive failures");
        }
    }

    pub async fn snapshot(&self, endpoint: &str) -> EndpointHealth {
        self.endpoints
            .read()
            .await
            .get(endpoint)
            .map(|s| s.health)
            .unwrap_or_default()
    }

    /// Scores each healthy candidate as `0.7*success_rate + 0.3*(1/(avg_latency_ms+1))`
    /// and returns the highest scorer. Falls back to the first candidate if none are
    /// healthy (best-effort).
    pub async fn best_endpoint<'a>(&self, candidates: &[&'a str]) -> Option<&'a str> {
        if candidates.is_empty() {
            return None;
        }
        let endpoints = self.endpoints.read().await;
        let mut best: Option<(&'a str, f64)> = None;
        for &candidate in candidates {
            let healthy = endpoints
                .get(candidate)
                .map(|s| !s.health.circuit_open)
                .unwrap_or(true);
            if !healthy {
                continue;
            }
            let score = endpoints
                .get(candidate)
                .map(|s| s.health.score())
                .unwrap_or(1.0);
            if best.map(|(_, best_score)| score > best_score).unwrap_or(true) {
                best = Some((candidate, score));
            }
        }
        best.map(|(url, _)| url).or(Some(candidates[0]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_endpoint_is_healthy() {
        let tracker = HealthTracker::new();
        assert!(tracker.is_healthy("http://a").await);
    }

    #[tokio::test]
    async fn circuit_opens_after_three_consecutive_failures() {
        let tracker = HealthTracker::new();
        for _ in 0..3 {
            tracker.record_failure("http://a").await;
        }
        assert!(!tracker.is_healthy("http://a").await);
        let snap = tracker.snapshot("http://a").await;
        assert!(snap.circuit_open);
    }

    #[tokio::test]
    async fn circuit_closes_after_two_consecutive_successes_post_probe() {
        let tracker = HealthTracker::new();
        for _ in 0..3 {
            tracker.record_failure("http://a").await;
        }
        assert!(tracker.snapshot("http://a").await.circuit_open);
        tracker.record_success("http://a", 10.0).await;
        assert!(tracker.snapshot("http://a").await.circuit_open);
        tracker.record_success("http://a", 10.0).await;
        assert!(!tracker.snapshot("http://a").await.circuit_open);
    }

    #[tokio::test]
    async fn best_endpoint_falls_back_to_first_when_all_unhealthy() {
        let tracker = HealthTracker::new();
        for _ in 0..3 {
            tracker.record_failure("http://a").await;
            tracker.record_failure("http://b").await;
        }
        let best = tracker.best_endpoint(&["http://a", "http://b"]).await;
        assert_eq!(best, Some("http://a"));
    }

    #[tokio::test]
    async fn best_endpoint_prefers_lower_latency_among_healthy() {
        let tracker = HealthTracker::new();
        tracker.record_success("http://fast", 5.0).await;
        tracker.record_success("http://slow", 500.0).await;
        let best = tracker.best_endpoint(&["http://fast", "http://slow"]).await;
        assert_eq!(best, Some("http://fast"));
    }
}
