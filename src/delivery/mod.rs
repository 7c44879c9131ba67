//! Delivery of eligible bookings to the downstream HTTP sink.
//!
//! Split the way the rest of the crate is: a pure payload normalization
//! step, a transport seam (`BookingSink`) with the production HTTP
//! implementation, and the bounded retry loop that drives it.

pub mod payload;
pub mod retry;
pub mod sink;

pub use payload::SinkPayload;
pub use retry::{RetryConfig, send_with_retry};
pub use sink::{BookingSink, DeliveryError, DeliveryErrorKind, HttpSink};
