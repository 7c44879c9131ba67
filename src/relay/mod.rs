//! The relay pipeline: the one path every observed record takes.
//!
//! Two notification sources feed this module - the full catch-up scan run
//! at every (re)subscription, and the live change stream - and both funnel
//! through the identical sequence: eligibility decision, dedup mark (the
//! mutual-exclusion gate), delivery with retry, then source deletion on
//! acceptance or dedup release on terminal failure. There is deliberately
//! no divergent logic between the catch-up and live paths.
//!
//! # Event loop
//!
//! The orchestrator runs one outer reconnect loop driven by the
//! `ConnectionSupervisor` (subscribe → scan → consume until the
//! subscription dies → backoff → repeat) and never exits on store failure.
//! Deliveries for distinct booking ids run as independent spawned tasks
//! tracked by a `TaskTracker`; per-record failures are contained to that
//! record. On shutdown the loop stops accepting work and in-flight
//! deliveries drain naturally.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::dedupe::DedupCache;
use crate::delivery::{BookingSink, RetryConfig, SinkPayload, send_with_retry};
use crate::filter::{Decision, decide};
use crate::source::{BookingStore, StoreEvent};
use crate::stats::RelayStats;
use crate::supervisor::{BackoffConfig, ConnectionSupervisor};
use crate::types::{BookingId, StoreRecord};

/// Behavioral knobs for the orchestrator, derived from `RelayConfig`.
#[derive(Debug, Clone, Copy)]
pub struct RelayOptions {
    pub retry: RetryConfig,
    pub backoff: BackoffConfig,
    pub delete_after_delivery: bool,
}

impl RelayOptions {
    pub fn from_config(config: &RelayConfig) -> Self {
        RelayOptions {
            retry: RetryConfig::with_max_retries(config.max_retries),
            backoff: BackoffConfig::DEFAULT,
            delete_after_delivery: config.delete_after_delivery(),
        }
    }
}

/// Wires the pipeline components and drives them until shutdown.
pub struct RelayOrchestrator<S, K> {
    store: Arc<S>,
    sink: Arc<K>,
    cache: Arc<DedupCache>,
    stats: Arc<RelayStats>,
    supervisor: ConnectionSupervisor,
    options: RelayOptions,
    tracker: TaskTracker,
}

impl<S, K> RelayOrchestrator<S, K>
where
    S: BookingStore + Send + Sync + 'static,
    K: BookingSink + Send + Sync + 'static,
{
    pub fn new(
        store: Arc<S>,
        sink: Arc<K>,
        cache: Arc<DedupCache>,
        stats: Arc<RelayStats>,
        options: RelayOptions,
    ) -> Self {
        RelayOrchestrator {
            store,
            sink,
            cache,
            stats,
            supervisor: ConnectionSupervisor::new(options.backoff),
            options,
            tracker: TaskTracker::new(),
        }
    }

    /// Runs the relay until the token is cancelled.
    ///
    /// Store failures never propagate out of this loop; they feed the
    /// supervisor and the loop retries indefinitely.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Relay started");

        while !shutdown.is_cancelled() {
            self.supervisor.begin_connecting();
            self.publish_connection_state();

            let events = match self.store.subscribe().await {
                Ok(rx) => rx,
                Err(e) => {
                    error!(error = %e, "Failed to establish watch subscription");
                    self.supervisor.note_watch_error();
                    self.publish_connection_state();
                    if !self.backoff_or_shutdown(&shutdown).await {
                        break;
                    }
                    continue;
                }
            };

            // Catch-up scan before consuming live events: records that
            // transitioned while we were not watching must still relay.
            // Subscribing first means changes during the scan are buffered,
            // not missed; the dedup gate absorbs the overlap.
            match self.store.scan().await {
                Ok(records) => {
                    debug!(count = records.len(), "Running full catch-up scan");
                    for record in records {
                        self.process_record(record);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Catch-up scan failed; relying on live events");
                }
            }

            match self.consume_events(events, &shutdown).await {
                Some(reason) => {
                    warn!(reason = %reason, "Watch subscription lost");
                    self.supervisor.note_watch_error();
                    self.publish_connection_state();
                    if !self.backoff_or_shutdown(&shutdown).await {
                        break;
                    }
                }
                None => break, // shutdown
            }
        }

        info!("Relay stopping; draining in-flight deliveries");
        self.tracker.close();
        self.tracker.wait().await;
        info!("Relay stopped");
    }

    /// Consumes one subscription until it dies or shutdown is requested.
    ///
    /// Returns the loss reason, or `None` on shutdown.
    async fn consume_events(
        &mut self,
        mut events: tokio::sync::mpsc::Receiver<StoreEvent>,
        shutdown: &CancellationToken,
    ) -> Option<String> {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return None,
                event = events.recv() => match event {
                    Some(StoreEvent::Changed(record)) => self.process_record(record),
                    Some(StoreEvent::Connected) => {
                        info!("Watch subscription connected");
                        self.supervisor.note_connected();
                        self.publish_connection_state();
                    }
                    Some(StoreEvent::Disconnected) => {
                        warn!("Store reported connectivity loss");
                        self.supervisor.note_disconnected();
                        self.publish_connection_state();
                    }
                    Some(StoreEvent::Lost(reason)) => return Some(reason),
                    None => return Some("event channel closed".to_string()),
                }
            }
        }
    }

    /// Runs one record through the pipeline.
    ///
    /// The decision and the dedup mark happen inline; the delivery (and its
    /// backoff sleeps) runs in its own task so slow sinks never stall other
    /// records.
    fn process_record(&self, record: StoreRecord) {
        let (id, booking) = match decide(&record, &self.cache) {
            Decision::Eligible { id, booking } => (id, booking),
            Decision::Skip { id, reason } => {
                debug!(
                    booking_id = id.as_ref().map(BookingId::as_str).unwrap_or("<none>"),
                    %reason,
                    "Skipping record"
                );
                return;
            }
        };

        // The mark is the exclusion gate: of two concurrent notifications
        // for the same id, exactly one inserts and proceeds.
        if !self.cache.mark(&id) {
            debug!(booking_id = %id, "Skipping record: already processed");
            return;
        }

        let payload = SinkPayload::from_booking(&id, &booking);
        self.tracker.spawn(deliver_one(
            self.store.clone(),
            self.sink.clone(),
            self.cache.clone(),
            self.stats.clone(),
            self.options,
            id,
            payload,
        ));
    }

    fn publish_connection_state(&self) {
        self.stats.set_connection(self.supervisor.state());
    }

    /// Sleeps the supervisor's backoff delay. Returns false on shutdown.
    async fn backoff_or_shutdown(&mut self, shutdown: &CancellationToken) -> bool {
        let delay = self.supervisor.next_backoff();
        debug!(delay_ms = delay.as_millis() as u64, "Waiting before re-subscribing");
        tokio::select! {
            _ = shutdown.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

/// Delivers one booking and settles its dedup entry.
///
/// Runs as an independent task; nothing here touches another record's
/// state, so a failure is contained to this booking.
async fn deliver_one<S, K>(
    store: Arc<S>,
    sink: Arc<K>,
    cache: Arc<DedupCache>,
    stats: Arc<RelayStats>,
    options: RelayOptions,
    id: BookingId,
    payload: SinkPayload,
) where
    S: BookingStore + Send + Sync,
    K: BookingSink + Send + Sync,
{
    match send_with_retry(sink.as_ref(), &payload, &options.retry).await {
        Ok(attempts) => {
            info!(booking_id = %id, attempts, "Booking relayed");
            stats.record_processed();

            if options.delete_after_delivery {
                // The entry stays marked either way; the record has been
                // accepted downstream and must not be re-sent.
                if let Err(e) = store.delete(&id).await {
                    warn!(booking_id = %id, error = %e, "Failed to delete relayed booking");
                }
            } else {
                debug!(booking_id = %id, "Deletion skipped outside production mode");
            }
        }
        Err(e) => {
            warn!(
                booking_id = %id,
                error = %e,
                "Delivery failed terminally; booking released for future retry"
            );
            cache.unmark(&id);
            stats.record_failed();
        }
    }
}
