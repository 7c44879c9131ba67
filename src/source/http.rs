//! HTTP implementation of the record store.
//!
//! Speaks a Firebase-style REST surface rooted at a base URL:
//!
//! - `GET  {base}/{collection}.json` - full snapshot
//! - `DELETE {base}/{collection}/{id}.json` - remove one record
//! - `GET  {base}/{collection}.json` with `Accept: text/event-stream` -
//!   change subscription
//!
//! The subscription runs in a spawned task that feeds `StoreEvent`s into a
//! channel: `Connected` once the stream is established, `Changed` per
//! observed record, and a final `Lost` when the stream errors, ends, or is
//! revoked - after which the consumer re-subscribes from scratch.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::types::{BookingId, StoreRecord};

use super::sse::{ChangeNotice, interpret_frame, parse_frame};
use super::{BookingStore, StoreEvent};

/// Depth of the subscription event channel. Bounded so a stalled consumer
/// applies backpressure to the watch task instead of buffering unboundedly.
const EVENT_CHANNEL_DEPTH: usize = 256;

/// Errors from the HTTP store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport-level failure.
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("store returned HTTP {status} during {context}")]
    Status { status: u16, context: &'static str },
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Production store client.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
}

impl HttpStore {
    /// Creates a store client for the collection `Bookings` under `base_url`.
    pub fn new(base_url: impl Into<String>) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(HttpStore {
            client,
            base_url: base_url.into(),
            collection: "Bookings".to_string(),
        })
    }

    /// Overrides the watched collection name.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    fn collection_url(&self) -> String {
        format!("{}/{}.json", self.base_url, self.collection)
    }

    fn record_url(&self, id: &BookingId) -> String {
        format!("{}/{}/{}.json", self.base_url, self.collection, id)
    }

    /// Reads one record's current value. Used when a change event only names
    /// a nested field.
    async fn fetch_record(&self, id: &BookingId) -> Result<StoreRecord> {
        let response = self.client.get(self.record_url(id)).send().await?;
        if !response.status().is_success() {
            return Err(StoreError::Status {
                status: response.status().as_u16(),
                context: "record read",
            });
        }
        let value: Value = response.json().await?;
        Ok(StoreRecord::new(id.as_str(), value))
    }

    /// Drives one subscription until the stream dies.
    async fn run_watch(self, tx: mpsc::Sender<StoreEvent>) {
        let response = match self
            .client
            .get(self.collection_url())
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                let _ = tx.send(StoreEvent::Lost(e.to_string())).await;
                return;
            }
        };

        if !response.status().is_success() {
            let _ = tx
                .send(StoreEvent::Lost(format!(
                    "watch rejected with HTTP {}",
                    response.status().as_u16()
                )))
                .await;
            return;
        }

        if tx.send(StoreEvent::Connected).await.is_err() {
            return;
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut lines: Vec<String> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    let _ = tx.send(StoreEvent::Lost(e.to_string())).await;
                    return;
                }
            };

            buffer.push_str(&String::from_utf8_lossy(&bytes));
            while let Some(newline) = buffer.find('\n') {
                let line = buffer[..newline].trim_end_matches('\r').to_string();
                buffer.drain(..=newline);

                if !line.is_empty() {
                    lines.push(line);
                    continue;
                }

                // Blank line: one frame is complete.
                let Some(frame) = parse_frame(&lines) else {
                    lines.clear();
                    continue;
                };
                lines.clear();

                if !self.dispatch_notice(interpret_frame(&frame), &tx).await {
                    return;
                }
            }
        }

        let _ = tx
            .send(StoreEvent::Lost("change stream ended".to_string()))
            .await;
    }

    /// Forwards one interpreted frame. Returns false once the subscription
    /// is finished (revoked or consumer gone).
    async fn dispatch_notice(&self, notice: ChangeNotice, tx: &mpsc::Sender<StoreEvent>) -> bool {
        match notice {
            ChangeNotice::Records(records) => {
                for record in records {
                    if tx.send(StoreEvent::Changed(record)).await.is_err() {
                        return false;
                    }
                }
                true
            }
            ChangeNotice::Reread(id) => {
                // The event only named a nested field; read the record to get
                // its full current value. A failed read is logged and skipped
                // rather than killing the stream.
                match self.fetch_record(&id).await {
                    Ok(record) => tx.send(StoreEvent::Changed(record)).await.is_ok(),
                    Err(e) => {
                        warn!(booking_id = %id, error = %e, "Failed to re-read changed record");
                        true
                    }
                }
            }
            ChangeNotice::Revoked(reason) => {
                debug!(reason = %reason, "Change subscription revoked");
                let _ = tx.send(StoreEvent::Lost(reason)).await;
                false
            }
            ChangeNotice::Ignore => true,
        }
    }
}

impl BookingStore for HttpStore {
    type Error = StoreError;

    async fn subscribe(&self) -> Result<mpsc::Receiver<StoreEvent>> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_DEPTH);
        let store = self.clone();
        tokio::spawn(store.run_watch(tx));
        Ok(rx)
    }

    async fn scan(&self) -> Result<Vec<StoreRecord>> {
        let response = self.client.get(self.collection_url()).send().await?;
        if !response.status().is_success() {
            return Err(StoreError::Status {
                status: response.status().as_u16(),
                context: "snapshot scan",
            });
        }

        // An empty collection reads as JSON null.
        let value: Value = response.json().await?;
        let records = match value {
            Value::Object(map) => map
                .into_iter()
                .map(|(key, value)| StoreRecord::new(key, value))
                .collect(),
            _ => Vec::new(),
        };
        Ok(records)
    }

    async fn delete(&self, id: &BookingId) -> Result<()> {
        let response = self.client.delete(self.record_url(id)).send().await?;
        if !response.status().is_success() {
            return Err(StoreError::Status {
                status: response.status().as_u16(),
                context: "record delete",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_follow_the_collection_layout() {
        let store = HttpStore::new("http://store.example").unwrap();
        assert_eq!(
            store.collection_url(),
            "http://store.example/Bookings.json"
        );
        assert_eq!(
            store.record_url(&BookingId::new("B1")),
            "http://store.example/Bookings/B1.json"
        );
    }

    #[test]
    fn collection_override_changes_paths() {
        let store = HttpStore::new("http://store.example")
            .unwrap()
            .with_collection("Rides");
        assert_eq!(store.collection_url(), "http://store.example/Rides.json");
    }
}
