//! Collaborator trait over the durable session schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use seedline_events::InfoHash;

use crate::error::Result;

/// Most recent serialized engine session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParamsRecord {
    /// Engine-serialized blob.
    pub data: Vec<u8>,
    /// Unix timestamp (seconds) when the record was written.
    pub timestamp: i64,
}

impl SessionParamsRecord {
    /// Timestamp as a UTC date, when representable.
    #[must_use]
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

/// Persisted transfer joined with its descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    /// Transfer identity.
    pub info_hash: InfoHash,
    /// Relative processing order.
    pub queue_position: i64,
    /// Engine resume blob, once one was saved.
    pub resume_data: Option<Vec<u8>>,
    /// Serialized descriptor from the descriptor table.
    pub descriptor: Option<Vec<u8>>,
}

/// Durable store used by the session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Most recent session parameters record, if any.
    async fn latest_session_params(&self) -> Result<Option<SessionParamsRecord>>;

    /// Append a session parameters record.
    async fn append_session_params(&self, data: &[u8], timestamp: i64) -> Result<()>;

    /// Number of persisted transfers.
    async fn count_transfers(&self) -> Result<u64>;

    /// Every persisted transfer ordered by ascending queue position.
    async fn transfers_by_queue_position(&self) -> Result<Vec<TransferRecord>>;

    /// Insert or refresh a transfer record.
    async fn upsert_transfer(&self, info_hash: InfoHash, queue_position: i64) -> Result<()>;

    /// Insert or replace the descriptor blob for a transfer.
    async fn upsert_descriptor(&self, info_hash: InfoHash, descriptor: &[u8]) -> Result<()>;

    /// Persist the queue position and resume blob of an existing record.
    async fn update_resume_data(
        &self,
        info_hash: InfoHash,
        queue_position: i64,
        resume_data: &[u8],
    ) -> Result<()>;

    /// Delete the descriptor blob for a transfer.
    async fn delete_descriptor(&self, info_hash: InfoHash) -> Result<()>;

    /// Delete the transfer record.
    async fn delete_transfer(&self, info_hash: InfoHash) -> Result<()>;
}
