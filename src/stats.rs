//! Process-wide relay statistics, shared with the health server.
//!
//! One instance is constructed at startup and handed to the orchestrator
//! and the health surface - counters are never ambient globals. Updates are
//! lock-free atomics; `snapshot` is a consistent-enough read for an
//! observability endpoint.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::supervisor::ConnectionState;

/// Live counters for the relay process.
#[derive(Debug)]
pub struct RelayStats {
    started_at: DateTime<Utc>,
    total_processed: AtomicU64,
    total_failed: AtomicU64,
    connection: AtomicU8,
}

/// Point-in-time view served by the health endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub status: &'static str,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
    pub total_processed: u64,
    pub total_failed: u64,
    pub connection: &'static str,
}

impl RelayStats {
    pub fn new() -> Self {
        RelayStats {
            started_at: Utc::now(),
            total_processed: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
            connection: AtomicU8::new(encode_state(ConnectionState::Connecting)),
        }
    }

    /// One booking delivered (and, in production mode, deleted).
    pub fn record_processed(&self) {
        self.total_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// One booking failed terminally and was released for a future retry.
    pub fn record_failed(&self) {
        self.total_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_connection(&self, state: ConnectionState) {
        self.connection.store(encode_state(state), Ordering::Relaxed);
    }

    pub fn total_processed(&self) -> u64 {
        self.total_processed.load(Ordering::Relaxed)
    }

    pub fn total_failed(&self) -> u64 {
        self.total_failed.load(Ordering::Relaxed)
    }

    pub fn connection(&self) -> ConnectionState {
        decode_state(self.connection.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            status: "ok",
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds(),
            total_processed: self.total_processed(),
            total_failed: self.total_failed(),
            connection: self.connection().as_str(),
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_state(state: ConnectionState) -> u8 {
    match state {
        ConnectionState::Connecting => 0,
        ConnectionState::Connected => 1,
        ConnectionState::Disconnected => 2,
        ConnectionState::Error => 3,
    }
}

fn decode_state(raw: u8) -> ConnectionState {
    match raw {
        1 => ConnectionState::Connected,
        2 => ConnectionState::Disconnected,
        3 => ConnectionState::Error,
        _ => ConnectionState::Connecting,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = RelayStats::new();
        stats.record_processed();
        stats.record_processed();
        stats.record_failed();

        assert_eq!(stats.total_processed(), 2);
        assert_eq!(stats.total_failed(), 1);
    }

    #[test]
    fn connection_state_round_trips() {
        let stats = RelayStats::new();
        assert_eq!(stats.connection(), ConnectionState::Connecting);

        for state in [
            ConnectionState::Connected,
            ConnectionState::Disconnected,
            ConnectionState::Error,
            ConnectionState::Connecting,
        ] {
            stats.set_connection(state);
            assert_eq!(stats.connection(), state);
        }
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let stats = RelayStats::new();
        stats.record_processed();
        stats.set_connection(ConnectionState::Connected);

        let value = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["totalProcessed"], 1);
        assert_eq!(value["totalFailed"], 0);
        assert_eq!(value["connection"], "connected");
        assert!(value["uptimeSecs"].is_number());
    }
}
