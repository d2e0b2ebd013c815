//! State shared between the session controller and its background tasks.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use seedline_events::{Event, EventBus, EventId, InfoHash, TransferMetadata};
use seedline_telemetry::Metrics;

use crate::registry::TransferRegistry;
use crate::stats::StatsTable;

pub(crate) struct Shared {
    pub(crate) registry: TransferRegistry,
    pub(crate) events: EventBus,
    pub(crate) metrics: Metrics,
    pub(crate) stats: StatsTable,
    muted: Mutex<HashSet<InfoHash>>,
    pending: Mutex<HashMap<InfoHash, TransferMetadata>>,
    exit: AtomicBool,
}

impl Shared {
    pub(crate) fn new(events: EventBus, metrics: Metrics, stats: StatsTable) -> Self {
        Self {
            registry: TransferRegistry::new(),
            events,
            metrics,
            stats,
            muted: Mutex::new(HashSet::new()),
            pending: Mutex::new(HashMap::new()),
            exit: AtomicBool::new(false),
        }
    }

    /// Publish a public event and count it.
    pub(crate) fn emit(&self, event: Event) -> EventId {
        self.metrics.inc_event(event.kind().name());
        self.events.publish(event)
    }

    pub(crate) fn mute(&self, info_hash: InfoHash) {
        self.lock_muted().insert(info_hash);
    }

    /// Remove the identity from the muted set, reporting whether it was there.
    pub(crate) fn unmute(&self, info_hash: &InfoHash) -> bool {
        self.lock_muted().remove(info_hash)
    }

    pub(crate) fn set_pending(&self, info_hash: InfoHash, metadata: TransferMetadata) {
        self.lock_pending().insert(info_hash, metadata);
    }

    pub(crate) fn take_pending(&self, info_hash: &InfoHash) -> Option<TransferMetadata> {
        self.lock_pending().remove(info_hash)
    }

    pub(crate) fn request_exit(&self) {
        self.exit.store(true, Ordering::Release);
    }

    pub(crate) fn exit_requested(&self) -> bool {
        self.exit.load(Ordering::Acquire)
    }

    fn lock_muted(&self) -> MutexGuard<'_, HashSet<InfoHash>> {
        self.muted.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<InfoHash, TransferMetadata>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
