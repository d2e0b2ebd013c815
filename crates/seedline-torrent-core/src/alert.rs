//! Asynchronous notifications drained from the engine.

use seedline_events::InfoHash;

use crate::model::{AddTransferParams, TransferHandle, TransferStatus};

/// Engine notification consumed by the session worker.
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    /// An add request completed, successfully or not.
    TransferAdded {
        /// Handle of the new transfer.
        handle: TransferHandle,
        /// Engine failure reason when the add was rejected.
        error: Option<String>,
    },
    /// Descriptor metadata became known for a magnet reference.
    MetadataReceived {
        /// Transfer whose metadata resolved.
        handle: TransferHandle,
    },
    /// Counter snapshot requested through `post_session_stats`.
    SessionStats {
        /// Counter values indexed by catalogue slot.
        counters: Vec<i64>,
    },
    /// Status batch requested through `post_transfer_updates`.
    StateUpdate {
        /// Statuses of transfers that changed.
        statuses: Vec<TransferStatus>,
    },
    /// Storage relocation completed.
    StorageMoved {
        /// Relocated transfer.
        handle: TransferHandle,
        /// New storage path.
        path: String,
    },
    /// Storage relocation failed.
    StorageMovedFailed {
        /// Transfer that failed to relocate.
        handle: TransferHandle,
        /// Engine failure reason.
        error: String,
    },
    /// All wanted pieces downloaded.
    TransferFinished {
        /// Finished transfer.
        handle: TransferHandle,
    },
    /// Transfer was paused.
    TransferPaused {
        /// Paused transfer.
        handle: TransferHandle,
    },
    /// Transfer left the engine.
    TransferRemoved {
        /// Identity of the removed transfer.
        info_hash: InfoHash,
    },
    /// Resumable state produced after `save_resume_data`.
    SaveResumeData {
        /// Transfer the state belongs to.
        handle: TransferHandle,
        /// Parameters that restore the transfer.
        params: AddTransferParams,
    },
    /// Resumable state could not be produced.
    SaveResumeDataFailed {
        /// Transfer the request was for.
        handle: TransferHandle,
        /// Engine failure reason.
        error: String,
    },
    /// Any notification the session does not act upon.
    Other {
        /// Engine-provided alert name.
        what: String,
    },
}

impl Alert {
    /// Short alert name used in logs.
    #[must_use]
    pub fn what(&self) -> &str {
        match self {
            Self::TransferAdded { .. } => "add_torrent",
            Self::MetadataReceived { .. } => "metadata_received",
            Self::SessionStats { .. } => "session_stats",
            Self::StateUpdate { .. } => "state_update",
            Self::StorageMoved { .. } => "storage_moved",
            Self::StorageMovedFailed { .. } => "storage_moved_failed",
            Self::TransferFinished { .. } => "torrent_finished",
            Self::TransferPaused { .. } => "torrent_paused",
            Self::TransferRemoved { .. } => "torrent_removed",
            Self::SaveResumeData { .. } => "save_resume_data",
            Self::SaveResumeDataFailed { .. } => "save_resume_data_failed",
            Self::Other { what } => what,
        }
    }
}
