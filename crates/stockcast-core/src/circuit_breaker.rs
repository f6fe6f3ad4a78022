//! Consecutive-failure circuit breaker shared by every upstream fetch.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed { failures: u32 },
    Open { since: Instant, failures: u32 },
    Probing { failures: u32 },
}

impl Phase {
    const fn failures(self) -> u32 {
        match self {
            Self::Closed { failures } | Self::Open { failures, .. } | Self::Probing { failures } => {
                failures
            }
        }
    }
}

/// After `failure_threshold` failed fetches in a row, fetches are refused
/// until `open_timeout` elapses. One probe is then let through; its outcome
/// closes or reopens the circuit.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    phase: Mutex<Phase>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            phase: Mutex::new(Phase::Closed { failures: 0 }),
        }
    }

    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a fetch may go out now. Moves an expired open circuit to
    /// half-open.
    pub fn allow_request(&self) -> bool {
        let mut phase = self.phase();
        match *phase {
            Phase::Closed { .. } | Phase::Probing { .. } => true,
            Phase::Open { since, failures } if since.elapsed() >= self.config.open_timeout => {
                *phase = Phase::Probing { failures };
                tracing::info!("upstream circuit half-open, sending probe");
                true
            }
            Phase::Open { .. } => false,
        }
    }

    /// Time left before an open circuit lets a probe through.
    pub fn retry_in(&self) -> Option<Duration> {
        match *self.phase() {
            Phase::Open { since, .. } => Some(self.config.open_timeout.saturating_sub(since.elapsed())),
            _ => None,
        }
    }

    pub fn record_success(&self) {
        *self.phase() = Phase::Closed { failures: 0 };
    }

    pub fn record_failure(&self) {
        let mut phase = self.phase();
        let failures = phase.failures().saturating_add(1);
        *phase = match *phase {
            Phase::Probing { .. } => Phase::Open {
                since: Instant::now(),
                failures,
            },
            Phase::Closed { .. } if failures >= self.config.failure_threshold => {
                tracing::warn!(failures, "upstream circuit opened");
                Phase::Open {
                    since: Instant::now(),
                    failures,
                }
            }
            Phase::Closed { .. } => Phase::Closed { failures },
            Phase::Open { since, .. } => Phase::Open { since, failures },
        };
    }

    pub fn state(&self) -> CircuitState {
        match *self.phase() {
            Phase::Closed { .. } => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::Probing { .. } => CircuitState::HalfOpen,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.phase().failures()
    }
}
