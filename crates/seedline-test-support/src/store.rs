//! Recording in-memory implementation of the session store.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use seedline_data::{DataError, Result, SessionParamsRecord, SessionStore, TransferRecord};
use seedline_events::InfoHash;

/// A write observed by [`RecordingStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// `append_session_params`
    AppendSessionParams {
        /// Blob length.
        len: usize,
        /// Record timestamp.
        timestamp: i64,
    },
    /// `upsert_transfer`
    UpsertTransfer {
        /// Transfer identity.
        info_hash: InfoHash,
        /// Queue position written.
        queue_position: i64,
    },
    /// `upsert_descriptor`
    UpsertDescriptor {
        /// Transfer identity.
        info_hash: InfoHash,
    },
    /// `update_resume_data`
    UpdateResumeData {
        /// Transfer identity.
        info_hash: InfoHash,
        /// Queue position written.
        queue_position: i64,
    },
    /// `delete_descriptor`
    DeleteDescriptor {
        /// Transfer identity.
        info_hash: InfoHash,
    },
    /// `delete_transfer`
    DeleteTransfer {
        /// Transfer identity.
        info_hash: InfoHash,
    },
}

#[derive(Default)]
struct RecordingState {
    ops: Vec<StoreOp>,
    session_params: Vec<SessionParamsRecord>,
    transfers: HashMap<InfoHash, (i64, Option<Vec<u8>>)>,
    descriptors: HashMap<InfoHash, Vec<u8>>,
    failing: HashSet<&'static str>,
    read_delay: Option<Duration>,
}

/// Store double that keeps rows in memory and logs every write.
#[derive(Clone, Default)]
pub struct RecordingStore {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a transfer row without logging a write.
    pub fn seed_transfer(
        &self,
        info_hash: InfoHash,
        queue_position: i64,
        resume_data: Option<Vec<u8>>,
        descriptor: Option<Vec<u8>>,
    ) {
        let mut state = self.lock();
        state
            .transfers
            .insert(info_hash, (queue_position, resume_data));
        if let Some(descriptor) = descriptor {
            state.descriptors.insert(info_hash, descriptor);
        }
    }

    /// Insert a session parameters record without logging a write.
    pub fn seed_session_params(&self, data: Vec<u8>, timestamp: i64) {
        self.lock()
            .session_params
            .push(SessionParamsRecord { data, timestamp });
    }

    /// Make every call to `operation` fail.
    pub fn fail_operation(&self, operation: &'static str) {
        self.lock().failing.insert(operation);
    }

    /// Delay `count_transfers` by `delay`.
    pub fn delay_reads(&self, delay: Duration) {
        self.lock().read_delay = Some(delay);
    }

    /// Every write observed so far.
    #[must_use]
    pub fn ops(&self) -> Vec<StoreOp> {
        self.lock().ops.clone()
    }

    /// Number of `update_resume_data` writes.
    #[must_use]
    pub fn resume_writes(&self) -> usize {
        self.lock()
            .ops
            .iter()
            .filter(|op| matches!(op, StoreOp::UpdateResumeData { .. }))
            .count()
    }

    /// Current row for a transfer, joined with its descriptor.
    #[must_use]
    pub fn transfer(&self, info_hash: InfoHash) -> Option<TransferRecord> {
        let state = self.lock();
        state
            .transfers
            .get(&info_hash)
            .map(|(queue_position, resume_data)| TransferRecord {
                info_hash,
                queue_position: *queue_position,
                resume_data: resume_data.clone(),
                descriptor: state.descriptors.get(&info_hash).cloned(),
            })
    }

    /// Whether a descriptor row exists.
    #[must_use]
    pub fn has_descriptor(&self, info_hash: InfoHash) -> bool {
        self.lock().descriptors.contains_key(&info_hash)
    }

    /// Every session parameters record in insertion order.
    #[must_use]
    pub fn session_params(&self) -> Vec<SessionParamsRecord> {
        self.lock().session_params.clone()
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(state: &RecordingState, operation: &'static str) -> Result<()> {
        if state.failing.contains(operation) {
            return Err(DataError::QueryFailed {
                operation,
                source: sqlx::Error::PoolClosed,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for RecordingStore {
    async fn latest_session_params(&self) -> Result<Option<SessionParamsRecord>> {
        let state = self.lock();
        Self::check(&state, "latest_session_params")?;
        Ok(state
            .session_params
            .iter()
            .max_by_key(|record| record.timestamp)
            .cloned())
    }

    async fn append_session_params(&self, data: &[u8], timestamp: i64) -> Result<()> {
        let mut state = self.lock();
        Self::check(&state, "append_session_params")?;
        state.ops.push(StoreOp::AppendSessionParams {
            len: data.len(),
            timestamp,
        });
        state.session_params.push(SessionParamsRecord {
            data: data.to_vec(),
            timestamp,
        });
        Ok(())
    }

    async fn count_transfers(&self) -> Result<u64> {
        let delay = self.lock().read_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.lock();
        Self::check(&state, "count_transfers")?;
        Ok(state.transfers.len() as u64)
    }

    async fn transfers_by_queue_position(&self) -> Result<Vec<TransferRecord>> {
        let state = self.lock();
        Self::check(&state, "transfers_by_queue_position")?;
        let mut records = state
            .transfers
            .iter()
            .map(|(info_hash, (queue_position, resume_data))| TransferRecord {
                info_hash: *info_hash,
                queue_position: *queue_position,
                resume_data: resume_data.clone(),
                descriptor: state.descriptors.get(info_hash).cloned(),
            })
            .collect::<Vec<_>>();
        records.sort_by_key(|record| (record.queue_position, record.info_hash));
        Ok(records)
    }

    async fn upsert_transfer(&self, info_hash: InfoHash, queue_position: i64) -> Result<()> {
        let mut state = self.lock();
        Self::check(&state, "upsert_transfer")?;
        state.ops.push(StoreOp::UpsertTransfer {
            info_hash,
            queue_position,
        });
        state
            .transfers
            .entry(info_hash)
            .and_modify(|row| row.0 = queue_position)
            .or_insert((queue_position, None));
        Ok(())
    }

    async fn upsert_descriptor(&self, info_hash: InfoHash, descriptor: &[u8]) -> Result<()> {
        let mut state = self.lock();
        Self::check(&state, "upsert_descriptor")?;
        state.ops.push(StoreOp::UpsertDescriptor { info_hash });
        state.descriptors.insert(info_hash, descriptor.to_vec());
        Ok(())
    }

    async fn update_resume_data(
        &self,
        info_hash: InfoHash,
        queue_position: i64,
        resume_data: &[u8],
    ) -> Result<()> {
        let mut state = self.lock();
        Self::check(&state, "update_resume_data")?;
        state.ops.push(StoreOp::UpdateResumeData {
            info_hash,
            queue_position,
        });
        if let Some(row) = state.transfers.get_mut(&info_hash) {
            *row = (queue_position, Some(resume_data.to_vec()));
        }
        Ok(())
    }

    async fn delete_descriptor(&self, info_hash: InfoHash) -> Result<()> {
        let mut state = self.lock();
        Self::check(&state, "delete_descriptor")?;
        state.ops.push(StoreOp::DeleteDescriptor { info_hash });
        state.descriptors.remove(&info_hash);
        Ok(())
    }

    async fn delete_transfer(&self, info_hash: InfoHash) -> Result<()> {
        let mut state = self.lock();
        Self::check(&state, "delete_transfer")?;
        state.ops.push(StoreOp::DeleteTransfer { info_hash });
        state.transfers.remove(&info_hash);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::info_hash;

    #[tokio::test]
    async fn records_writes_and_orders_rows() -> anyhow::Result<()> {
        let store = RecordingStore::new();
        store.seed_transfer(info_hash(2), 3, None, Some(b"d".to_vec()));
        store.upsert_transfer(info_hash(1), 1).await?;

        let records = store.transfers_by_queue_position().await?;
        assert_eq!(records[0].info_hash, info_hash(1));
        assert_eq!(records[1].descriptor.as_deref(), Some(&b"d"[..]));
        assert_eq!(store.ops().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn injected_failures_surface_as_query_errors() {
        let store = RecordingStore::new();
        store.fail_operation("delete_transfer");
        let err = store.delete_transfer(info_hash(1)).await.unwrap_err();
        assert!(matches!(
            err,
            DataError::QueryFailed {
                operation: "delete_transfer",
                ..
            }
        ));
        assert!(store.ops().is_empty());
    }
}
