//! Engine traits implemented by transfer adapters.

use std::time::Duration;

use async_trait::async_trait;

use crate::alert::Alert;
use crate::error::{TorrentError, TorrentResult};
use crate::model::{AddTransferParams, SessionParams, StatsMetric, TransferHandle, TransferStatus};

/// Primary engine trait implemented by adapters.
///
/// Command methods are fire-and-forget: outcomes arrive later as [`Alert`]s
/// drained through [`TransferEngine::wait_for_alerts`] and
/// [`TransferEngine::pop_alerts`].
#[async_trait]
pub trait TransferEngine: Send + Sync + 'static {
    /// Catalogue of statistics counters exposed by the engine.
    fn stats_metrics(&self) -> Vec<StatsMetric>;

    /// Parse a magnet URI into add parameters.
    ///
    /// # Errors
    ///
    /// Returns an error when the URI is malformed.
    fn parse_magnet_uri(&self, uri: &str) -> TorrentResult<AddTransferParams>;

    /// Parse a serialized descriptor into add parameters.
    ///
    /// # Errors
    ///
    /// Returns an error when the descriptor cannot be decoded.
    fn parse_descriptor(&self, bytes: &[u8]) -> TorrentResult<AddTransferParams>;

    /// Decode a resume blob into add parameters.
    ///
    /// # Errors
    ///
    /// Returns an error when the blob is corrupt.
    fn read_resume_data(&self, blob: &[u8]) -> TorrentResult<AddTransferParams>;

    /// Encode add parameters as a resume blob.
    ///
    /// # Errors
    ///
    /// Returns an error when the parameters cannot be encoded.
    fn write_resume_data(&self, params: &AddTransferParams) -> TorrentResult<Vec<u8>>;

    /// Submit a transfer; completion is reported via [`Alert::TransferAdded`].
    fn async_add_transfer(&self, params: AddTransferParams);

    /// Request removal; completion is reported via [`Alert::TransferRemoved`].
    fn remove_transfer(&self, handle: TransferHandle);

    /// Wait up to `timeout` for at least one alert. Returns `true` when
    /// alerts are ready.
    ///
    /// # Errors
    ///
    /// Returns an error when the engine can no longer deliver alerts.
    async fn wait_for_alerts(&self, timeout: Duration) -> TorrentResult<bool>;

    /// Take every queued alert.
    fn pop_alerts(&self) -> Vec<Alert>;

    /// Current status of one transfer.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::NotFound`] when the handle is stale.
    fn status(&self, handle: TransferHandle) -> TorrentResult<TransferStatus>;

    /// Statuses of every managed transfer.
    fn transfer_statuses(&self) -> Vec<TransferStatus>;

    /// Serialized descriptor of a transfer whose metadata is known.
    ///
    /// # Errors
    ///
    /// Returns an error when the handle is stale or metadata is unknown.
    fn descriptor_bytes(&self, handle: TransferHandle) -> TorrentResult<Vec<u8>> {
        let _ = handle;
        Err(TorrentError::Unsupported {
            operation: "descriptor_bytes",
        })
    }

    /// Request resumable state; answered with [`Alert::SaveResumeData`] or
    /// [`Alert::SaveResumeDataFailed`].
    fn save_resume_data(&self, handle: TransferHandle);

    /// Serialize the engine session state (settings plus DHT state).
    ///
    /// # Errors
    ///
    /// Returns an error when the state cannot be encoded.
    fn write_session_params(&self) -> TorrentResult<Vec<u8>>;

    /// Pause the whole engine.
    fn pause(&self);

    /// Request an [`Alert::SessionStats`] snapshot.
    fn post_session_stats(&self);

    /// Request an [`Alert::StateUpdate`] batch.
    fn post_transfer_updates(&self);

    /// Request DHT statistics.
    fn post_dht_stats(&self) {}
}

/// Builds engines from session parameters.
pub trait EngineFactory: Send + Sync {
    /// Engine type produced by this factory.
    type Engine: TransferEngine;

    /// Parameters used when no persisted record is usable.
    fn default_session_params(&self) -> SessionParams {
        SessionParams::default()
    }

    /// Decode a persisted session parameters blob.
    ///
    /// # Errors
    ///
    /// Returns an error when the blob is corrupt.
    fn read_session_params(&self, blob: &[u8]) -> TorrentResult<SessionParams>;

    /// Construct an engine.
    ///
    /// # Errors
    ///
    /// Returns an error when the engine cannot be started.
    fn create(&self, params: SessionParams) -> TorrentResult<Self::Engine>;
}
