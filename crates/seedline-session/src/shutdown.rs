//! Shutdown phases, drain accounting, and the resume-data flush.
//!
//! # Design
//!
//! - The alert worker is stopped and joined before any flush work starts, so
//!   the coordinator is the only alert consumer while flushing.
//! - Resume-data persistence is best effort: failed and abandoned requests are
//!   reported in [`ShutdownReport`] and counted, never returned as errors.
//! - A drain deadline bounds the flush regardless of engine behaviour.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use chrono::Utc;
use seedline_data::SessionStore;
use seedline_torrent_core::{AddTransferParams, Alert, TransferEngine, TransferHandle};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::shared::Shared;

/// Longest single wait for resume-data alerts.
const RESUME_WAIT: Duration = Duration::from_secs(1);

/// Observable lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LifecyclePhase {
    /// Accepting commands and processing alerts.
    Running,
    /// Stopping the alert worker.
    Draining,
    /// Waiting for resume data to be written.
    Flushing,
    /// Fully shut down.
    Stopped,
}

impl LifecyclePhase {
    /// Lowercase phase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Flushing => "flushing",
            Self::Stopped => "stopped",
        }
    }
}

impl Display for LifecyclePhase {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Outcome of the resume-data flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ShutdownReport {
    /// Resume-data requests issued.
    pub requested: usize,
    /// Requests whose data was persisted.
    pub saved: usize,
    /// Requests the engine failed or whose data could not be written.
    pub failed: usize,
    /// Requests still outstanding when the drain deadline passed.
    pub abandoned: usize,
}

impl ShutdownReport {
    fn record(&self, shared: &Shared) {
        for (outcome, count) in [
            ("saved", self.saved),
            ("failed", self.failed),
            ("abandoned", self.abandoned),
        ] {
            shared
                .metrics
                .add_resume_outcome(outcome, u64::try_from(count).unwrap_or(u64::MAX));
        }
    }
}

/// Background tasks started by `load`.
pub(crate) struct SessionTasks {
    pub(crate) worker: JoinHandle<()>,
    pub(crate) ticker: JoinHandle<()>,
}

pub(crate) struct ShutdownCoordinator<'a, E, S: ?Sized> {
    pub(crate) engine: &'a E,
    pub(crate) shared: &'a Shared,
    pub(crate) store: &'a S,
    pub(crate) drain_timeout: Duration,
}

impl<E, S> ShutdownCoordinator<'_, E, S>
where
    E: TransferEngine,
    S: SessionStore + ?Sized,
{
    /// Raise the exit flag, join the worker, and stop the ticker.
    pub(crate) async fn stop_tasks(&self, tasks: Option<SessionTasks>) {
        self.shared.request_exit();
        let Some(SessionTasks { worker, ticker }) = tasks else {
            debug!("alert worker was never started");
            return;
        };
        if let Err(err) = worker.await {
            error!(error = %err, "alert worker terminated abnormally");
        }
        ticker.abort();
        let _ = ticker.await;
    }

    /// Serialise engine session state and append it to the store.
    pub(crate) async fn persist_session_params(&self) {
        let data = match self.engine.write_session_params() {
            Ok(data) => data,
            Err(err) => {
                warn!(error = %err, "session state could not be serialised");
                return;
            }
        };
        let timestamp = Utc::now().timestamp();
        if let Err(err) = self.store.append_session_params(&data, timestamp).await {
            warn!(error = %err, "session state could not be persisted");
            self.shared.metrics.inc_store_failure("append_session_params");
        }
    }

    /// Ask the engine for resume data of every transfer that needs it.
    pub(crate) fn request_resume_data(&self) -> usize {
        let mut requested = 0;
        for status in self.engine.transfer_statuses() {
            if status.wants_resume_save() {
                self.engine.save_resume_data(status.handle);
                requested += 1;
            }
        }
        debug!(requested, "resume data requested");
        requested
    }

    /// Consume resume-data alerts until every request is answered or the
    /// drain deadline passes.
    pub(crate) async fn drain(&self, requested: usize) -> ShutdownReport {
        let mut report = ShutdownReport {
            requested,
            ..ShutdownReport::default()
        };
        let deadline = Instant::now() + self.drain_timeout;
        let mut outstanding = requested;

        while outstanding > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(outstanding, "drain deadline passed; abandoning resume data");
                report.abandoned = outstanding;
                break;
            }
            let wait = remaining.min(RESUME_WAIT);
            match self.engine.wait_for_alerts(wait).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    warn!(error = %err, "waiting for resume data failed");
                    tokio::time::sleep(wait).await;
                    continue;
                }
            }

            for alert in self.engine.pop_alerts() {
                match alert {
                    Alert::SaveResumeData { handle, params } => {
                        outstanding = outstanding.saturating_sub(1);
                        if self.save_resume(handle, &params).await {
                            report.saved += 1;
                        } else {
                            report.failed += 1;
                        }
                    }
                    Alert::SaveResumeDataFailed { handle, error } => {
                        outstanding = outstanding.saturating_sub(1);
                        report.failed += 1;
                        warn!(info_hash = %handle.info_hash, error = %error, "engine could not produce resume data");
                    }
                    _ => {}
                }
            }
        }

        report.record(self.shared);
        info!(
            requested = report.requested,
            saved = report.saved,
            failed = report.failed,
            abandoned = report.abandoned,
            "resume data flush finished"
        );
        report
    }

    async fn save_resume(&self, handle: TransferHandle, params: &AddTransferParams) -> bool {
        let info_hash = handle.info_hash;
        let blob = match self.engine.write_resume_data(params) {
            Ok(blob) => blob,
            Err(err) => {
                warn!(info_hash = %info_hash, error = %err, "resume data could not be encoded");
                return false;
            }
        };
        let queue_position = self.queue_position(handle);
        match self
            .store
            .update_resume_data(info_hash, queue_position, &blob)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                warn!(info_hash = %info_hash, error = %err, "resume data could not be persisted");
                self.shared.metrics.inc_store_failure("update_resume_data");
                false
            }
        }
    }

    fn queue_position(&self, handle: TransferHandle) -> i64 {
        self.engine
            .status(handle)
            .map(|status| status.queue_position)
            .ok()
            .or_else(|| {
                self.shared
                    .registry
                    .get(&handle.info_hash)
                    .map(|transfer| transfer.status().queue_position)
            })
            .map_or(0, i64::from)
    }
}
