//! Booking relay - watches a remote booking store for records entering a
//! terminal state, forwards each one to a downstream HTTP sink, and removes
//! it from the source upon confirmed acceptance.
//!
//! Delivery is at-least-once with best-effort in-process dedup; the sink is
//! expected to be idempotent on booking id.

pub mod config;
pub mod dedupe;
pub mod delivery;
pub mod filter;
pub mod relay;
pub mod server;
pub mod source;
pub mod stats;
pub mod supervisor;
pub mod types;

#[cfg(test)]
pub mod test_utils;
