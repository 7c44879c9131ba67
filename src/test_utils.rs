//! Shared fakes for orchestrator tests.
//!
//! `MemoryStore` plays the record store: scripted subscription batches,
//! a mutable record map for scans and deletes, and counters for asserting
//! how often the orchestrator scanned or re-subscribed. `RecordingSink`
//! captures every POST the pipeline makes and answers with a scripted
//! outcome.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::Value;
use tokio::sync::mpsc;

use crate::delivery::{BookingSink, DeliveryError, DeliveryErrorKind, SinkPayload};
use crate::source::{BookingStore, StoreEvent};
use crate::types::{BookingId, StoreRecord};

/// In-memory store with scripted subscriptions.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Value>>,
    /// One event batch per subscription, consumed in order. A subscription
    /// beyond the script gets a bare `Connected`.
    scripts: Mutex<Vec<Vec<StoreEvent>>>,
    /// Keeps subscription channels open so the orchestrator's live loop
    /// blocks on `recv` instead of seeing a closed channel.
    held_senders: Mutex<Vec<mpsc::Sender<StoreEvent>>>,
    pub deleted: Mutex<Vec<BookingId>>,
    pub scan_count: AtomicU32,
    pub subscribe_count: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(self, key: &str, value: Value) -> Self {
        self.records.lock().unwrap().insert(key.to_string(), value);
        self
    }

    /// Queues the event batch for the next unclaimed subscription.
    pub fn push_script(&self, events: Vec<StoreEvent>) {
        self.scripts.lock().unwrap().push(events);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.lock().unwrap().contains_key(key)
    }

    pub fn deleted_ids(&self) -> Vec<BookingId> {
        self.deleted.lock().unwrap().clone()
    }
}

impl BookingStore for MemoryStore {
    type Error = Infallible;

    async fn subscribe(&self) -> Result<mpsc::Receiver<StoreEvent>, Infallible> {
        self.subscribe_count.fetch_add(1, Ordering::SeqCst);

        let mut scripts = self.scripts.lock().unwrap();
        let events = if scripts.is_empty() {
            vec![StoreEvent::Connected]
        } else {
            scripts.remove(0)
        };
        drop(scripts);

        let (tx, rx) = mpsc::channel(256);
        for event in events {
            tx.try_send(event).expect("scripted batch exceeds channel depth");
        }
        self.held_senders.lock().unwrap().push(tx);
        Ok(rx)
    }

    async fn scan(&self) -> Result<Vec<StoreRecord>, Infallible> {
        self.scan_count.fetch_add(1, Ordering::SeqCst);
        let records = self.records.lock().unwrap();
        let mut out: Vec<StoreRecord> = records
            .iter()
            .map(|(key, value)| StoreRecord::new(key.clone(), value.clone()))
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }

    async fn delete(&self, id: &BookingId) -> Result<(), Infallible> {
        self.records.lock().unwrap().remove(id.as_str());
        self.deleted.lock().unwrap().push(id.clone());
        Ok(())
    }
}

/// How the recording sink answers each delivery attempt.
#[derive(Debug, Clone, Copy)]
pub enum SinkMode {
    Accept,
    Fail(DeliveryErrorKind),
}

/// Sink that records every POST and answers with a fixed outcome.
pub struct RecordingSink {
    pub posts: Mutex<Vec<(SinkPayload, u32)>>,
    mode: SinkMode,
}

impl RecordingSink {
    pub fn accepting() -> Self {
        Self::with_mode(SinkMode::Accept)
    }

    pub fn with_mode(mode: SinkMode) -> Self {
        RecordingSink {
            posts: Mutex::new(Vec::new()),
            mode,
        }
    }

    pub fn post_count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }

    pub fn payloads(&self) -> Vec<SinkPayload> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .map(|(payload, _)| payload.clone())
            .collect()
    }
}

impl BookingSink for RecordingSink {
    async fn deliver(
        &self,
        payload: &SinkPayload,
        attempt: u32,
    ) -> Result<(), DeliveryError> {
        self.posts.lock().unwrap().push((payload.clone(), attempt));
        match self.mode {
            SinkMode::Accept => Ok(()),
            SinkMode::Fail(kind) => Err(DeliveryError::new(kind, Some(503), "scripted failure")),
        }
    }
}
