//! Event payload types carried across the workspace.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::topics::EventKind;

/// Identifier assigned to each event emitted on the bus.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Length in bytes of a transfer identity.
pub const INFO_HASH_LEN: usize = 20;

/// Named session counters extracted from an engine statistics snapshot.
pub type SessionStatistics = BTreeMap<String, i64>;

/// Fixed-length content identifier naming one transfer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct InfoHash([u8; INFO_HASH_LEN]);

impl InfoHash {
    /// Wrap raw identity bytes.
    #[must_use]
    pub const fn new(bytes: [u8; INFO_HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Build an identity from a byte slice of exactly [`INFO_HASH_LEN`] bytes.
    ///
    /// # Errors
    ///
    /// Returns an error when the slice length does not match.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, InfoHashParseError> {
        let array: [u8; INFO_HASH_LEN] =
            bytes
                .try_into()
                .map_err(|_| InfoHashParseError::InvalidLength {
                    length: bytes.len(),
                })?;
        Ok(Self(array))
    }

    /// Raw identity bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; INFO_HASH_LEN] {
        &self.0
    }

    /// Lowercase hexadecimal rendering used for storage keys and logs.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Display for InfoHash {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.to_hex())
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "InfoHash({})", self.to_hex())
    }
}

impl FromStr for InfoHash {
    type Err = InfoHashParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(value.trim()).map_err(|_| InfoHashParseError::InvalidHex)?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for InfoHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for InfoHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Failure to interpret a value as an [`InfoHash`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InfoHashParseError {
    /// Input was not valid hexadecimal.
    #[error("info hash is not valid hex")]
    InvalidHex,
    /// Decoded input had the wrong number of bytes.
    #[error("info hash has invalid length")]
    InvalidLength {
        /// Number of bytes supplied.
        length: usize,
    },
}

/// Engine-reported lifecycle state of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    /// Verifying pieces already on disk.
    CheckingFiles,
    /// Resolving metadata from peers (magnet references).
    DownloadingMetadata,
    /// Downloading payload.
    Downloading,
    /// All wanted pieces downloaded.
    Finished,
    /// Complete and uploading to peers.
    Seeding,
    /// Validating resume data before starting.
    CheckingResumeData,
    /// State has not been reported yet.
    #[default]
    Unknown,
}

/// Caller-supplied metadata attached to a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransferMetadata {
    /// Free-form labels.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Serializable view of a transfer carried by public events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSnapshot {
    /// Transfer identity.
    pub info_hash: InfoHash,
    /// Display name, when metadata is known.
    pub name: Option<String>,
    /// Last reported state.
    pub state: TransferState,
    /// Completion ratio between 0 and 1.
    pub progress: f32,
    /// Relative processing order.
    pub queue_position: i32,
    /// Current payload download rate in bytes per second.
    pub download_payload_rate: u64,
    /// Current payload upload rate in bytes per second.
    pub upload_payload_rate: u64,
    /// Cumulative payload bytes downloaded.
    pub total_payload_download: u64,
    /// Cumulative payload bytes uploaded.
    pub total_payload_upload: u64,
    /// Directory the payload is stored in.
    pub save_path: String,
    /// Whether the transfer is paused.
    pub paused: bool,
    /// Caller-supplied metadata.
    pub metadata: TransferMetadata,
}

/// Aggregate payload rates across a status batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransferRates {
    /// Sum of payload download rates in bytes per second.
    pub download_payload_rate: u64,
    /// Sum of payload upload rates in bytes per second.
    pub upload_payload_rate: u64,
}

impl TransferRates {
    /// Add one transfer's rates to the aggregate.
    pub const fn accumulate(&mut self, download: u64, upload: u64) {
        self.download_payload_rate = self.download_payload_rate.saturating_add(download);
        self.upload_payload_rate = self.upload_payload_rate.saturating_add(upload);
    }
}

/// Typed public session events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The engine confirmed a freshly requested transfer.
    #[serde(rename = "transfer.added")]
    TransferAdded {
        /// Snapshot of the new transfer.
        transfer: TransferSnapshot,
    },
    /// The engine rejected an add request.
    #[serde(rename = "transfer.add_failed")]
    TransferAddFailed {
        /// Identity of the rejected transfer when the engine reported one.
        info_hash: Option<InfoHash>,
        /// Engine-provided failure reason.
        error: String,
    },
    /// A transfer that downloaded payload finished.
    #[serde(rename = "transfer.finished")]
    TransferFinished {
        /// Snapshot of the finished transfer.
        transfer: TransferSnapshot,
    },
    /// A transfer was paused.
    #[serde(rename = "transfer.paused")]
    TransferPaused {
        /// Snapshot of the paused transfer.
        transfer: TransferSnapshot,
    },
    /// A transfer was removed from the engine.
    #[serde(rename = "transfer.removed")]
    TransferRemoved {
        /// Identity of the removed transfer.
        info_hash: InfoHash,
    },
    /// A status batch refreshed one or more transfers.
    #[serde(rename = "transfers.updated")]
    TransfersUpdated {
        /// Snapshots of every updated transfer.
        transfers: Vec<TransferSnapshot>,
    },
    /// Aggregate payload rates for the latest status batch.
    #[serde(rename = "transfers.statistics")]
    TransfersStatistics {
        /// Summed rates.
        stats: TransferRates,
    },
    /// Named session counters from the latest statistics snapshot.
    #[serde(rename = "session.statistics")]
    SessionStatistics {
        /// Counter values keyed by statistic name.
        stats: SessionStatistics,
    },
}

impl Event {
    /// Discriminator used for listener routing and metrics labels.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::TransferAdded { .. } => EventKind::TransferAdded,
            Self::TransferAddFailed { .. } => EventKind::TransferAddFailed,
            Self::TransferFinished { .. } => EventKind::TransferFinished,
            Self::TransferPaused { .. } => EventKind::TransferPaused,
            Self::TransferRemoved { .. } => EventKind::TransferRemoved,
            Self::TransfersUpdated { .. } => EventKind::TransfersUpdated,
            Self::TransfersStatistics { .. } => EventKind::TransfersStatistics,
            Self::SessionStatistics { .. } => EventKind::SessionStatistics,
        }
    }
}

/// Events scoped to a single transfer entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferEvent {
    /// The transfer was paused.
    Paused,
    /// The transfer was removed from the engine.
    Removed,
    /// Storage relocation completed.
    StorageMoved {
        /// New storage path.
        path: String,
    },
    /// Storage relocation failed.
    StorageMovedFailed {
        /// Engine-provided failure reason.
        error: String,
    },
}

impl TransferEvent {
    /// Machine-friendly discriminator.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Paused => "paused",
            Self::Removed => "removed",
            Self::StorageMoved { .. } => "storage_moved",
            Self::StorageMovedFailed { .. } => "storage_moved_failed",
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and
/// emission timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Sequential identifier.
    pub id: EventId,
    /// Emission timestamp.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    pub event: Event,
}
