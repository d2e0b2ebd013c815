//! Background alert processing loop and statistics ticker.
//!
//! # Design
//!
//! - One worker task drains the engine alert queue and handles alerts strictly
//!   in order, awaiting store writes before moving to the next alert.
//! - The bounded alert wait doubles as the cancellation point: the exit flag
//!   is observed after every wait, so shutdown latency is one poll interval.
//! - Store failures are logged and counted, never fatal to the loop.

use std::sync::Arc;
use std::time::Duration;

use seedline_data::{DataError, SessionStore};
use seedline_events::{Event, InfoHash, TransferEvent, TransferRates};
use seedline_torrent_core::{Alert, TransferEngine, TransferHandle, TransferStatus};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::shared::Shared;
use crate::transfer::Transfer;

/// Upper bound on a single alert wait; also the exit-flag check cadence.
pub const ALERT_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub(crate) fn spawn<E, S>(engine: Arc<E>, shared: Arc<Shared>, store: S) -> JoinHandle<()>
where
    E: TransferEngine,
    S: SessionStore + 'static,
{
    let worker = AlertWorker {
        engine,
        shared,
        store,
    };
    tokio::spawn(worker.run())
}

/// Periodically ask the engine for DHT, session and transfer statistics.
pub(crate) fn spawn_ticker<E>(engine: Arc<E>, period: Duration) -> JoinHandle<()>
where
    E: TransferEngine,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            engine.post_dht_stats();
            engine.post_session_stats();
            engine.post_transfer_updates();
        }
    })
}

struct AlertWorker<E, S> {
    engine: Arc<E>,
    shared: Arc<Shared>,
    store: S,
}

impl<E, S> AlertWorker<E, S>
where
    E: TransferEngine,
    S: SessionStore,
{
    async fn run(self) {
        debug!("alert worker started");
        loop {
            match self.engine.wait_for_alerts(ALERT_POLL_INTERVAL).await {
                Ok(true) => {
                    for alert in self.engine.pop_alerts() {
                        self.handle(alert).await;
                        self.shared.metrics.inc_alerts_processed();
                    }
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(error = %err, "waiting for engine alerts failed");
                    tokio::time::sleep(ALERT_POLL_INTERVAL).await;
                }
            }
            if self.shared.exit_requested() {
                break;
            }
        }
        debug!("alert worker stopped");
    }

    async fn handle(&self, alert: Alert) {
        match alert {
            Alert::TransferAdded {
                handle,
                error: Some(error),
            } => self.on_add_failed(handle, error),
            Alert::TransferAdded { handle, error: None } => self.on_added(handle).await,
            Alert::MetadataReceived { handle } => self.on_metadata(handle).await,
            Alert::SessionStats { counters } => {
                let stats = self.shared.stats.extract(&counters);
                self.shared.emit(Event::SessionStatistics { stats });
            }
            Alert::StateUpdate { statuses } => self.on_state_update(statuses),
            Alert::StorageMoved { handle, path } => {
                if let Some(transfer) = self.refresh(handle) {
                    transfer.emit(TransferEvent::StorageMoved { path });
                }
            }
            Alert::StorageMovedFailed { handle, error } => {
                if let Some(transfer) = self.refresh(handle) {
                    warn!(info_hash = %handle.info_hash, error = %error, "storage move failed");
                    transfer.emit(TransferEvent::StorageMovedFailed { error });
                }
            }
            Alert::TransferFinished { handle } => {
                let Some(transfer) = self.refresh(handle) else {
                    return;
                };
                if transfer.status().total_payload_download > 0 {
                    self.shared.emit(Event::TransferFinished {
                        transfer: transfer.snapshot(),
                    });
                }
            }
            Alert::TransferPaused { handle } => {
                if let Some(transfer) = self.refresh(handle) {
                    transfer.emit(TransferEvent::Paused);
                    self.shared.emit(Event::TransferPaused {
                        transfer: transfer.snapshot(),
                    });
                }
            }
            Alert::TransferRemoved { info_hash } => self.on_removed(info_hash).await,
            other => trace!(alert = other.what(), "ignoring alert"),
        }
    }

    fn on_add_failed(&self, handle: TransferHandle, error: String) {
        let info_hash = (handle.info_hash != InfoHash::default()).then_some(handle.info_hash);
        if let Some(hash) = info_hash.as_ref() {
            self.shared.unmute(hash);
            self.shared.take_pending(hash);
        }
        warn!(info_hash = ?info_hash, error = %error, "engine rejected transfer");
        self.shared
            .emit(Event::TransferAddFailed { info_hash, error });
    }

    async fn on_added(&self, handle: TransferHandle) {
        let status = match self.engine.status(handle) {
            Ok(status) => status,
            Err(err) => {
                warn!(info_hash = %handle.info_hash, error = %err, "added transfer has no status");
                return;
            }
        };
        let info_hash = status.info_hash;
        let muted = self.shared.unmute(&info_hash);
        if !muted && status.has_metadata {
            self.persist(&status).await;
        }

        let pending = self.shared.take_pending(&info_hash);
        let transfer = if let Some(existing) = self.shared.registry.get(&info_hash) {
            debug!(info_hash = %info_hash, "transfer already registered; refreshing status");
            existing.set_status(status);
            if let Some(metadata) = pending {
                existing.set_metadata(metadata);
            }
            existing
        } else {
            let created = Arc::new(Transfer::new(status));
            if let Some(metadata) = pending {
                created.set_metadata(metadata);
            }
            self.shared.registry.put(Arc::clone(&created));
            created
        };

        if muted {
            debug!(info_hash = %info_hash, "restored transfer registered");
        } else {
            info!(info_hash = %info_hash, "transfer added");
            self.shared.emit(Event::TransferAdded {
                transfer: transfer.snapshot(),
            });
        }
    }

    async fn on_metadata(&self, handle: TransferHandle) {
        let status = match self.engine.status(handle) {
            Ok(status) => status,
            Err(err) => {
                warn!(info_hash = %handle.info_hash, error = %err, "metadata for unknown handle");
                return;
            }
        };
        self.persist(&status).await;
        if let Some(transfer) = self.shared.registry.get(&status.info_hash) {
            transfer.set_status(status);
        }
    }

    fn on_state_update(&self, statuses: Vec<TransferStatus>) {
        let mut stats = TransferRates::default();
        let mut transfers = Vec::new();
        for status in statuses {
            stats.accumulate(status.download_payload_rate, status.upload_payload_rate);
            if let Some(transfer) = self.shared.registry.get(&status.info_hash) {
                transfer.set_status(status);
                transfers.push(transfer.snapshot());
            }
        }
        self.shared
            .metrics
            .set_active_transfers(i64::try_from(self.shared.registry.len()).unwrap_or(i64::MAX));

        self.shared.emit(Event::TransfersStatistics { stats });
        if !transfers.is_empty() {
            self.shared.emit(Event::TransfersUpdated { transfers });
        }
    }

    async fn on_removed(&self, info_hash: InfoHash) {
        match self.shared.registry.delete(&info_hash) {
            Some(transfer) => transfer.emit(TransferEvent::Removed),
            None => debug!(info_hash = %info_hash, "removed transfer was not registered"),
        }
        info!(info_hash = %info_hash, "transfer removed");
        self.shared.emit(Event::TransferRemoved { info_hash });

        if let Err(err) = self.store.delete_descriptor(info_hash).await {
            self.store_failed("delete_descriptor", info_hash, &err);
        }
        if let Err(err) = self.store.delete_transfer(info_hash).await {
            self.store_failed("delete_transfer", info_hash, &err);
        }
    }

    /// Write the transfer record and, when available, its descriptor.
    async fn persist(&self, status: &TransferStatus) {
        let info_hash = status.info_hash;
        if let Err(err) = self
            .store
            .upsert_transfer(info_hash, i64::from(status.queue_position))
            .await
        {
            self.store_failed("upsert_transfer", info_hash, &err);
        }
        match self.engine.descriptor_bytes(status.handle) {
            Ok(descriptor) => {
                if let Err(err) = self.store.upsert_descriptor(info_hash, &descriptor).await {
                    self.store_failed("upsert_descriptor", info_hash, &err);
                }
            }
            Err(err) => {
                warn!(info_hash = %info_hash, error = %err, "descriptor unavailable");
            }
        }
    }

    /// Registered entity for `handle` with its status refreshed from the engine.
    fn refresh(&self, handle: TransferHandle) -> Option<Arc<Transfer>> {
        let Some(transfer) = self.shared.registry.get(&handle.info_hash) else {
            debug!(info_hash = %handle.info_hash, "alert for unregistered transfer");
            return None;
        };
        match self.engine.status(handle) {
            Ok(status) => transfer.set_status(status),
            Err(err) => debug!(info_hash = %handle.info_hash, error = %err, "status refresh failed"),
        }
        Some(transfer)
    }

    fn store_failed(&self, operation: &'static str, info_hash: InfoHash, err: &DataError) {
        warn!(operation, info_hash = %info_hash, error = %err, "session store write failed");
        self.shared.metrics.inc_store_failure(operation);
    }
}
