//! Upstream retry policy with exponential backoff and jitter.

use std::time::Duration;

use crate::error::FetchError;

/// Delay strategy between upstream attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed {
        delay: Duration,
    },
    /// `base * factor^attempt`, capped at `max`, optionally jittered by +/- 50%.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(250),
            factor: 2.0,
            max: Duration::from_secs(2),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let seconds = (base.as_secs_f64() * factor.powi(exponent)).min(max.as_secs_f64());
                let delay = Duration::from_secs_f64(seconds);
                if jitter {
                    apply_jitter(delay)
                } else {
                    delay
                }
            }
        }
    }
}

fn apply_jitter(delay: Duration) -> Duration {
    let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    let spread = millis / 2;
    let offset = fastrand::u64(0..=spread.saturating_mul(2));
    Duration::from_millis((millis - spread).saturating_add(offset))
}

/// How many times, and on which failures, the fetcher retries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    pub retry_on_status: Vec<u16>,
    pub retry_on_timeout: bool,
    pub retry_on_connect: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Backoff::default(),
            retry_on_status: vec![408, 429, 500, 502, 503, 504],
            retry_on_timeout: true,
            retry_on_connect: true,
        }
    }
}

impl RetryPolicy {
    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Whether `error`, seen on attempt `attempt` (0-based), earns another try.
    pub fn should_retry(&self, error: &FetchError, attempt: u32) -> bool {
        if attempt >= self.max_retries {
            return false;
        }

        match error {
            FetchError::Status { status } => self.retry_on_status.contains(status),
            FetchError::Timeout { .. } => self.retry_on_timeout,
            FetchError::Transport { retryable, .. } => self.retry_on_connect && *retryable,
            FetchError::Upstream { .. }
            | FetchError::Decode { .. }
            | FetchError::CircuitOpen
            | FetchError::InvalidRequest(_) => false,
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_backoff_is_constant() {
        let backoff = Backoff::Fixed {
            delay: Duration::from_millis(100),
        };
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(7), Duration::from_millis(100));
    }

    #[test]
    fn exponential_backoff_doubles_until_capped() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_millis(500),
            jitter: false,
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(3), Duration::from_millis(500));
    }

    #[test]
    fn jitter_stays_within_half_of_the_delay() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(200),
            factor: 2.0,
            max: Duration::from_secs(2),
            jitter: true,
        };

        for _ in 0..20 {
            let delay = backoff.delay(1).as_millis();
            assert!((200..=600).contains(&delay), "delay_ms={delay}");
        }
    }

    #[test]
    fn retries_transient_failures_until_budget_is_spent() {
        let policy = RetryPolicy::exponential(2);
        let unavailable = FetchError::Status { status: 503 };

        assert!(policy.should_retry(&unavailable, 0));
        assert!(policy.should_retry(&unavailable, 1));
        assert!(!policy.should_retry(&unavailable, 2));
    }

    #[test]
    fn never_retries_permanent_failures() {
        let policy = RetryPolicy::default();

        assert!(!policy.should_retry(&FetchError::Status { status: 404 }, 0));
        assert!(!policy.should_retry(
            &FetchError::Decode {
                message: String::from("eof")
            },
            0
        ));
        assert!(!policy.should_retry(&FetchError::CircuitOpen, 0));
    }

    #[test]
    fn no_retry_policy_gives_a_single_attempt() {
        let policy = RetryPolicy::no_retry();
        assert!(!policy.should_retry(
            &FetchError::Timeout {
                message: String::from("slow")
            },
            0
        ));
    }
}
