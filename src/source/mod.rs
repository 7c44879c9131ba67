//! The record store seam: change subscription, full scans, and deletion.
//!
//! `BookingStore` is the trait the orchestrator is written against. The
//! production implementation (`HttpStore`) speaks a Firebase-style REST
//! surface; tests substitute an in-memory store. A subscription is a lazy,
//! infinite, non-restartable sequence of `StoreEvent`s - once it reports
//! `Lost`, the consumer must subscribe again (after supervisor backoff) and
//! re-run the full scan.

mod http;
mod sse;

pub use http::{HttpStore, StoreError};

use std::future::Future;

use tokio::sync::mpsc;

use crate::types::{BookingId, StoreRecord};

/// One observation from the watch subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// A record was created or changed (or was observed in the initial
    /// server push); carries its current value.
    Changed(StoreRecord),

    /// The store reports connectivity established.
    Connected,

    /// The store reports connectivity lost but the subscription may still
    /// recover on its own.
    Disconnected,

    /// The subscription is dead; the consumer must re-subscribe.
    Lost(String),
}

/// Access to the remote record collection.
///
/// Implementations are cheap to clone / share behind an `Arc`; all methods
/// take `&self`.
pub trait BookingStore {
    type Error: std::fmt::Display + Send;

    /// Establishes the change subscription.
    ///
    /// The receiver yields `Connected` once the watch is live, then change
    /// events until the subscription dies with a final `Lost`.
    fn subscribe(
        &self,
    ) -> impl Future<Output = Result<mpsc::Receiver<StoreEvent>, Self::Error>> + Send;

    /// Reads a full snapshot of the collection.
    fn scan(&self) -> impl Future<Output = Result<Vec<StoreRecord>, Self::Error>> + Send;

    /// Removes one record. Invoked only after confirmed delivery.
    fn delete(&self, id: &BookingId) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
