//! Newtype wrappers for domain identifiers.
//!
//! Booking ids are opaque strings assigned by the upstream store. The newtype
//! prevents accidental mixing with other string-typed values (statuses, URLs)
//! and makes signatures self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The unique identifier of a booking record (the store key).
///
/// Immutable once assigned; this system never writes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(pub String);

impl BookingId {
    pub fn new(s: impl Into<String>) -> Self {
        BookingId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the id is usable as a store key.
    ///
    /// Empty keys cannot address a record and mark the record as malformed.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for BookingId {
    fn from(s: String) -> Self {
        BookingId(s)
    }
}

impl From<&str> for BookingId {
    fn from(s: &str) -> Self {
        BookingId(s.to_string())
    }
}
