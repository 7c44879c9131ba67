//! The booking record and its terminal-status predicate.
//!
//! A booking arrives from the store as an opaque JSON value keyed by id.
//! `StoreRecord` is that raw form; `Booking` is the typed view used by the
//! delivery path. Every payload attribute is independently optional - the
//! upstream producer fills fields in as a booking progresses, and a terminal
//! record may still be missing any of them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::BookingId;

/// Statuses that make a booking eligible for relay.
///
/// `Complete` and `Completed` both appear upstream (a producer naming
/// inconsistency); both are accepted as the same terminal state rather than
/// normalized away.
pub const TERMINAL_STATUSES: [&str; 3] = ["Cancelled", "Complete", "Completed"];

/// Returns true if `status` is in the terminal set.
///
/// Matching is exact: statuses are producer-controlled strings and this
/// system does not case-fold or trim them.
pub fn is_terminal_status(status: &str) -> bool {
    TERMINAL_STATUSES.contains(&status)
}

/// A raw record as observed in the store: its key plus whatever JSON value
/// lives under it. Produced by both the full scan and the change stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRecord {
    pub key: String,
    pub value: Value,
}

impl StoreRecord {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        StoreRecord {
            key: key.into(),
            value,
        }
    }

    /// The record's id, if it has a usable key.
    pub fn id(&self) -> Option<BookingId> {
        let id = BookingId::new(self.key.clone());
        id.is_valid().then_some(id)
    }
}

/// The typed view of a booking's payload attributes.
///
/// Field names mirror the store's camelCase keys. Unknown keys are ignored
/// so producer-side schema additions don't break the relay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Booking {
    pub status: Option<String>,
    pub driver_id: Option<String>,
    pub created_at: Option<String>,
    pub completed_at: Option<String>,
    pub fare: Option<f64>,
    pub passenger_name: Option<String>,
    pub passenger_phone: Option<String>,
    pub passenger_count: Option<String>,
    pub pickup_latitude: Option<f64>,
    pub pickup_longitude: Option<f64>,
    pub dropoff_latitude: Option<f64>,
    pub dropoff_longitude: Option<f64>,
    pub payment_method: Option<String>,
    pub ratings: Option<f64>,
}

impl Booking {
    /// Parses a booking from a raw store value.
    ///
    /// Returns `None` when the value is not a JSON object - such records are
    /// malformed and ineligible rather than an error.
    pub fn from_value(value: &Value) -> Option<Booking> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// The observed status, rendered as `""` when absent.
    pub fn status_str(&self) -> &str {
        self.status.as_deref().unwrap_or("")
    }

    /// True if this booking's status is in the terminal set.
    pub fn is_terminal(&self) -> bool {
        is_terminal_status(self.status_str())
    }
}
