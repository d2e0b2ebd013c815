//! Session-side transfer entity.

use std::sync::{PoisonError, RwLock};

use seedline_events::{InfoHash, TransferEvent, TransferMetadata, TransferSnapshot};
use seedline_torrent_core::{TransferHandle, TransferStatus};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

const ENTITY_EVENT_CAPACITY: usize = 16;

/// One managed transfer: engine handle, last known status, caller metadata,
/// and an entity-scoped event channel.
#[derive(Debug)]
pub struct Transfer {
    handle: TransferHandle,
    status: RwLock<TransferStatus>,
    metadata: RwLock<Option<TransferMetadata>>,
    events: broadcast::Sender<TransferEvent>,
}

impl Transfer {
    /// Wrap an engine status.
    #[must_use]
    pub fn new(status: TransferStatus) -> Self {
        let (events, _) = broadcast::channel(ENTITY_EVENT_CAPACITY);
        Self {
            handle: status.handle,
            status: RwLock::new(status),
            metadata: RwLock::new(None),
            events,
        }
    }

    /// Transfer identity.
    #[must_use]
    pub const fn info_hash(&self) -> InfoHash {
        self.handle.info_hash
    }

    /// Engine handle.
    #[must_use]
    pub const fn handle(&self) -> TransferHandle {
        self.handle
    }

    /// Last status reported by the engine.
    #[must_use]
    pub fn status(&self) -> TransferStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_status(&self, status: TransferStatus) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Display name, when metadata is known.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .name
            .clone()
    }

    /// Caller metadata, once applied.
    #[must_use]
    pub fn metadata(&self) -> Option<TransferMetadata> {
        self.metadata
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Attach caller metadata. The first value wins; returns `false` when
    /// metadata was already present.
    pub fn set_metadata(&self, metadata: TransferMetadata) -> bool {
        let mut slot = self.metadata.write().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some(metadata);
        true
    }

    /// Subscribe to entity-scoped events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.events.subscribe()
    }

    /// Entity-scoped events as a stream.
    #[must_use]
    pub fn event_stream(&self) -> BroadcastStream<TransferEvent> {
        BroadcastStream::new(self.events.subscribe())
    }

    pub(crate) fn emit(&self, event: TransferEvent) {
        let _ = self.events.send(event);
    }

    /// Public snapshot of status and metadata.
    #[must_use]
    pub fn snapshot(&self) -> TransferSnapshot {
        self.status().snapshot(self.metadata().unwrap_or_default())
    }
}
