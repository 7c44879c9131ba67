//! Core domain types for the booking relay.

mod booking;
mod ids;

pub use booking::{Booking, StoreRecord, TERMINAL_STATUSES, is_terminal_status};
pub use ids::BookingId;
