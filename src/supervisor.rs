//! Connectivity state machine and reconnection backoff.
//!
//! The supervisor tracks the health of the watch subscription and decides
//! how long to wait before the next subscription attempt. It never gives
//! up: after `max_consecutive` failures the counter resets and supervision
//! continues indefinitely - a relay that cannot reach its store degrades
//! and keeps retrying rather than terminating the process.
//!
//! Transitions:
//!
//! ```text
//! Connecting ── positive signal ──▶ Connected
//! Connected ── negative signal ──▶ Disconnected
//! Connected ── watch error ──▶ Error
//! Disconnected/Error ── backoff elapsed ──▶ Connecting
//! ```
//!
//! The supervisor itself is a pure state machine; the orchestrator drives
//! it and owns the actual sleeping and re-subscription (which always
//! re-runs the full scan).

use std::fmt;
use std::time::Duration;

/// Health of the watch subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// A subscription attempt is in progress.
    Connecting,

    /// The watch is live.
    Connected,

    /// The store signalled connectivity loss.
    Disconnected,

    /// The watch died with an error.
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Backoff policy for re-subscription.
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    /// Delay after the first failure.
    pub initial_delay: Duration,

    /// Ceiling for the exponential growth.
    pub max_delay: Duration,

    /// Consecutive-failure count at which the counter resets to zero.
    pub max_consecutive: u32,
}

impl BackoffConfig {
    /// Default policy: 1s base, doubling, 30s cap, counter reset after 10.
    pub const DEFAULT: Self = Self {
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
        max_consecutive: 10,
    };
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Tracks subscription health and paces reconnection.
#[derive(Debug)]
pub struct ConnectionSupervisor {
    config: BackoffConfig,
    state: ConnectionState,
    consecutive_failures: u32,
}

impl ConnectionSupervisor {
    pub fn new(config: BackoffConfig) -> Self {
        ConnectionSupervisor {
            config,
            state: ConnectionState::Connecting,
            consecutive_failures: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// A subscription attempt is starting.
    pub fn begin_connecting(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    /// Positive connectivity signal: the watch is live. Resets the failure
    /// counter so the next outage starts backoff from the base delay.
    pub fn note_connected(&mut self) {
        self.state = ConnectionState::Connected;
        self.consecutive_failures = 0;
    }

    /// Negative connectivity signal from the store.
    pub fn note_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    /// The watch subscription died with an error.
    pub fn note_watch_error(&mut self) {
        self.state = ConnectionState::Error;
    }

    /// Delay to wait before the next subscription attempt.
    ///
    /// Grows exponentially with consecutive failures, capped at the
    /// configured ceiling. When the counter reaches `max_consecutive` it
    /// resets to zero and supervision simply continues.
    pub fn next_backoff(&mut self) -> Duration {
        let attempt = self.consecutive_failures;
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.config.max_consecutive {
            self.consecutive_failures = 0;
        }

        let factor = 2u32.saturating_pow(attempt);
        self.config
            .initial_delay
            .saturating_mul(factor)
            .min(self.config.max_delay)
    }
}

impl Default for ConnectionSupervisor {
    fn default() -> Self {
        Self::new(BackoffConfig::DEFAULT)
    }
}
