//! Eligibility decision for observed records.
//!
//! A pure classification step with no side effects: it reads the dedup cache
//! but never writes it, so the same record can be decided repeatedly in
//! tests. Rules apply in order and the first match wins:
//!
//! 1. no identifiable id, or a non-object value → invalid record
//! 2. id already claimed in the cache → already processed
//! 3. status outside the terminal set → not terminal
//! 4. otherwise eligible

use std::fmt;

use crate::dedupe::DedupCache;
use crate::types::{Booking, BookingId, StoreRecord};

/// Why a record was skipped rather than forwarded.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The record has no usable id or its value is not an object.
    InvalidRecord,

    /// A delivery for this id is in flight or already succeeded.
    AlreadyProcessed,

    /// The status is outside the terminal set; carries the observed status
    /// for diagnostics (empty when the field was absent).
    NotTerminal { status: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InvalidRecord => write!(f, "invalid record"),
            SkipReason::AlreadyProcessed => write!(f, "already processed"),
            SkipReason::NotTerminal { status } => {
                write!(f, "status not terminal: {:?}", status)
            }
        }
    }
}

/// Outcome of the eligibility decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Forward this booking.
    Eligible { id: BookingId, booking: Booking },

    /// Drop this record, with the reason and the id when one was readable.
    Skip {
        id: Option<BookingId>,
        reason: SkipReason,
    },
}

impl Decision {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Decision::Eligible { .. })
    }
}

/// Decides whether a record should be forwarded.
///
/// Callable independently of delivery; the cache is only consulted, and
/// marking remains the orchestrator's responsibility.
pub fn decide(record: &StoreRecord, cache: &DedupCache) -> Decision {
    let Some(id) = record.id() else {
        return Decision::Skip {
            id: None,
            reason: SkipReason::InvalidRecord,
        };
    };

    let Some(booking) = Booking::from_value(&record.value) else {
        return Decision::Skip {
            id: Some(id),
            reason: SkipReason::InvalidRecord,
        };
    };

    if cache.contains(&id) {
        return Decision::Skip {
            id: Some(id),
            reason: SkipReason::AlreadyProcessed,
        };
    }

    if !booking.is_terminal() {
        return Decision::Skip {
            id: Some(id),
            reason: SkipReason::NotTerminal {
                status: booking.status_str().to_string(),
            },
        };
    }

    Decision::Eligible { id, booking }
}
