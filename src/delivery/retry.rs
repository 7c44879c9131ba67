//! Exponential backoff for delivery attempts.
//!
//! Retries are an explicit bounded loop with a non-blocking sleep between
//! attempts - never rescheduled timers or recursion - so a delivery always
//! returns a terminal result to its caller. Only retryable failures
//! (timeout, network, 5xx) are retried; terminal classifications surface
//! immediately.
//!
//! Defaults: 3 retries after the initial attempt, delays 2s, 4s, 8s,
//! capped at 30s.

use std::time::Duration;

use tracing::warn;

use super::payload::SinkPayload;
use super::sink::{BookingSink, DeliveryError, Result};

/// Configuration for delivery retry with exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Ceiling for the exponential growth.
    pub max_delay: Duration,
}

impl RetryConfig {
    /// Default delivery policy: 3 retries at 2s, 4s, 8s.
    pub const DEFAULT: Self = Self {
        max_retries: 3,
        initial_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(30),
    };

    /// A policy with a different retry bound and default delays.
    pub fn with_max_retries(max_retries: u32) -> Self {
        RetryConfig {
            max_retries,
            ..Self::DEFAULT
        }
    }

    /// Delay before retry `attempt` (zero-based): `initial × 2^attempt`,
    /// capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    /// All retry delays in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(|attempt| self.delay_for_attempt(attempt))
    }

    /// Worst-case total time spent sleeping between attempts.
    pub fn total_max_wait(&self) -> Duration {
        self.delays().sum()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Delivers one payload, retrying retryable failures with backoff.
///
/// Makes at most `1 + max_retries` attempts. Returns the number of attempts
/// made on acceptance; on failure returns the last error, after which the
/// caller is expected to release the booking's dedup entry.
pub async fn send_with_retry<S: BookingSink>(
    sink: &S,
    payload: &SinkPayload,
    config: &RetryConfig,
) -> Result<u32> {
    let mut attempt = 0u32;

    loop {
        let err: DeliveryError = match sink.deliver(payload, attempt).await {
            Ok(()) => return Ok(attempt + 1),
            Err(e) => e,
        };

        if !err.is_retryable() || attempt >= config.max_retries {
            return Err(err);
        }

        let delay = config.delay_for_attempt(attempt);
        warn!(
            booking_id = %payload.booking_id,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Delivery attempt failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::sink::DeliveryErrorKind;
    use crate::types::{Booking, BookingId};
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn payload() -> SinkPayload {
        let booking = Booking {
            status: Some("Completed".to_string()),
            ..Booking::default()
        };
        SinkPayload::from_booking(&BookingId::new("B1"), &booking)
    }

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(8),
        }
    }

    /// Fails with a fixed kind until `succeed_after` attempts have been made.
    struct ScriptedSink {
        attempts: Arc<AtomicU32>,
        succeed_after: u32,
        kind: DeliveryErrorKind,
    }

    impl ScriptedSink {
        fn failing(kind: DeliveryErrorKind) -> (Self, Arc<AtomicU32>) {
            Self::succeeding_after(u32::MAX, kind)
        }

        fn succeeding_after(n: u32, kind: DeliveryErrorKind) -> (Self, Arc<AtomicU32>) {
            let attempts = Arc::new(AtomicU32::new(0));
            (
                ScriptedSink {
                    attempts: attempts.clone(),
                    succeed_after: n,
                    kind,
                },
                attempts,
            )
        }
    }

    impl BookingSink for ScriptedSink {
        async fn deliver(&self, _payload: &SinkPayload, attempt: u32) -> Result<()> {
            let seen = self.attempts.fetch_add(1, Ordering::SeqCst);
            // The attempt counter the loop passes must track our own count.
            assert_eq!(seen, attempt);

            if seen >= self.succeed_after {
                Ok(())
            } else {
                Err(DeliveryError::new(self.kind, Some(503), "scripted failure"))
            }
        }
    }

    // ─── Unit tests ───

    #[test]
    fn default_delays_are_2_4_8() {
        let delays: Vec<_> = RetryConfig::DEFAULT.delays().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
    }

    #[test]
    fn delay_growth_is_capped() {
        let config = RetryConfig {
            max_retries: 8,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(4), Duration::from_secs(16));
        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(30));
        assert_eq!(config.delay_for_attempt(7), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn first_attempt_success_makes_one_call() {
        let (sink, attempts) = ScriptedSink::succeeding_after(0, DeliveryErrorKind::ServerError);
        let result = send_with_retry(&sink, &payload(), &fast()).await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retryable_failure_recovers_on_third_attempt() {
        let (sink, attempts) = ScriptedSink::succeeding_after(2, DeliveryErrorKind::Timeout);
        let result = send_with_retry(&sink, &payload(), &fast()).await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_503_makes_exactly_one_plus_max_retries_attempts() {
        let (sink, attempts) = ScriptedSink::failing(DeliveryErrorKind::ServerError);
        let result = send_with_retry(&sink, &payload(), &fast()).await;

        let err = result.unwrap_err();
        assert_eq!(err.kind, DeliveryErrorKind::ServerError);
        assert_eq!(attempts.load(Ordering::SeqCst), 1 + fast().max_retries);
    }

    #[tokio::test]
    async fn terminal_failure_is_not_retried() {
        let (sink, attempts) = ScriptedSink::failing(DeliveryErrorKind::ClientError);
        let result = send_with_retry(&sink, &payload(), &fast()).await;

        assert_eq!(result.unwrap_err().kind, DeliveryErrorKind::ClientError);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let config = RetryConfig {
            max_retries: 0,
            ..fast()
        };
        let (sink, attempts) = ScriptedSink::failing(DeliveryErrorKind::Timeout);
        let result = send_with_retry(&sink, &payload(), &config).await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    // ─── Property tests ───

    proptest! {
        /// Delays never exceed the cap and never shrink between attempts.
        #[test]
        fn delays_are_monotonic_and_capped(
            initial_ms in 1u64..5_000,
            max_ms in 5_000u64..60_000,
            max_retries in 1u32..12,
        ) {
            let config = RetryConfig {
                max_retries,
                initial_delay: Duration::from_millis(initial_ms),
                max_delay: Duration::from_millis(max_ms),
            };

            let delays: Vec<_> = config.delays().collect();
            prop_assert_eq!(delays.len(), max_retries as usize);

            for window in delays.windows(2) {
                prop_assert!(window[1] >= window[0]);
            }
            for delay in &delays {
                prop_assert!(*delay <= Duration::from_millis(max_ms));
            }
            prop_assert_eq!(delays[0], Duration::from_millis(initial_ms));
        }

        /// Total worst-case wait is bounded by cap × retries.
        #[test]
        fn total_wait_is_bounded(
            initial_ms in 1u64..1_000,
            max_ms in 1_000u64..10_000,
            max_retries in 1u32..16,
        ) {
            let config = RetryConfig {
                max_retries,
                initial_delay: Duration::from_millis(initial_ms),
                max_delay: Duration::from_millis(max_ms),
            };

            let bound = Duration::from_millis(max_ms * max_retries as u64);
            prop_assert!(config.total_max_wait() <= bound);
        }
    }
}
