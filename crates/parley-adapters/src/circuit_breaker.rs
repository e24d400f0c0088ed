//! Consecutive-failure circuit breaker
//!
//! Counts end-to-end failures (every provider tried and none answered).
//! Reaching the threshold opens the circuit for a fixed cooldown measured
//! from the moment it opened; when the cooldown has elapsed the count returns
//! to zero. A single success closes it fully. There is no half-open probing
//! state.
//!
//! The breaker is plain owned state with `&mut self` methods: it belongs to
//! exactly one conversation session.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    failure_count: u32,
    /// Set exactly while the circuit is open
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            failure_count: 0,
            opened_at: None,
        }
    }

    /// Whether calls must be short-circuited right now.
    ///
    /// Applies cooldown expiry first, so an elapsed cooldown closes the
    /// circuit and resets the count before answering.
    pub fn is_open(&mut self) -> bool {
        self.expire_cooldown();
        self.opened_at.is_some()
    }

    pub fn state(&mut self) -> CircuitState {
        if self.is_open() {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// A request was answered; the breaker heals completely
    pub fn record_success(&mut self) {
        if self.failure_count > 0 {
            debug!("Resetting failure count after success");
        }
        self.failure_count = 0;
        self.opened_at = None;
    }

    /// Every provider failed for one request
    pub fn record_failure(&mut self) {
        if self.is_open() {
            // Requests are short-circuited while open; nothing to count.
            return;
        }

        self.failure_count += 1;
        debug!(
            failures = self.failure_count,
            threshold = self.config.failure_threshold,
            "Recorded provider failure"
        );

        if self.failure_count >= self.config.failure_threshold {
            warn!(
                failures = self.failure_count,
                cooldown_ms = self.config.cooldown.as_millis() as u64,
                "Circuit breaker transitioning to open state"
            );
            self.opened_at = Some(Instant::now());
        }
    }

    pub fn reset(&mut self) {
        debug!("Manually resetting circuit breaker");
        self.failure_count = 0;
        self.opened_at = None;
    }

    fn expire_cooldown(&mut self) {
        if let Some(opened_at) = self.opened_at {
            if opened_at.elapsed() >= self.config.cooldown {
                info!("Circuit breaker cooldown elapsed, closing circuit");
                self.failure_count = 0;
                self.opened_at = None;
            }
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            cooldown,
        })
    }

    #[tokio::test]
    async fn test_circuit_breaker_closed_state() {
        let mut cb = CircuitBreaker::default();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(!cb.is_open());
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_at_threshold() {
        let mut cb = breaker(3, Duration::from_secs(60));

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.failure_count(), 3);
    }

    #[tokio::test]
    async fn test_failures_not_counted_while_open() {
        let mut cb = breaker(2, Duration::from_secs(60));
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_open());

        cb.record_failure();
        assert_eq!(cb.failure_count(), 2);
    }

    #[tokio::test]
    async fn test_success_resets_count() {
        let mut cb = breaker(3, Duration::from_secs(60));
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.failure_count(), 0);

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_closes_circuit() {
        let mut cb = breaker(2, Duration::from_secs(60));
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_open());

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cb.is_open());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!cb.is_open());
        assert_eq!(cb.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_not_rearmed_by_calls_while_open() {
        let mut cb = breaker(1, Duration::from_secs(10));
        cb.record_failure();

        for _ in 0..9 {
            tokio::time::advance(Duration::from_secs(1)).await;
            assert!(cb.is_open());
            cb.record_failure();
        }

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!cb.is_open());
    }

    #[tokio::test]
    async fn test_circuit_breaker_reset() {
        let mut cb = breaker(1, Duration::from_secs(60));
        cb.record_failure();
        assert!(cb.is_open());

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }
}
