//! In-memory test double for the transfer engine.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use seedline_events::{InfoHash, TransferState};
use seedline_torrent_core::{
    AddTransferParams, Alert, EngineFactory, MetricKind, SessionParams, StatsMetric, TorrentError,
    TorrentResult, TransferEngine, TransferHandle, TransferStatus, op_failed,
};
use tokio::sync::Notify;

use crate::fixtures::{DESCRIPTOR_PREFIX, descriptor_info_hash};

/// How the stub answers a resume-data request for one transfer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResumeOutcome {
    /// Produce resumable state.
    #[default]
    Produce,
    /// Report a failure with the given reason.
    Fail(String),
    /// Never answer.
    Ignore,
}

#[derive(Clone)]
struct StubTransfer {
    status: TransferStatus,
    descriptor: Option<Vec<u8>>,
}

#[derive(Default)]
struct StubState {
    next_handle: u64,
    transfers: HashMap<InfoHash, StubTransfer>,
    alerts: VecDeque<Alert>,
    submitted: Vec<AddTransferParams>,
    manual_confirm: bool,
    add_failures: HashMap<InfoHash, String>,
    resume_outcomes: HashMap<InfoHash, ResumeOutcome>,
    resume_requests: Vec<InfoHash>,
    removal_requests: Vec<InfoHash>,
    paused: bool,
    counters: Vec<i64>,
    session_stats_posts: usize,
    transfer_update_posts: usize,
    dht_stats_posts: usize,
    fail_next_wait: bool,
    fail_session_write: bool,
}

/// Engine double that answers commands with alerts from an in-memory queue.
pub struct StubEngine {
    params: SessionParams,
    state: Mutex<StubState>,
    notify: Notify,
}

impl StubEngine {
    /// Construct an engine configured with `params`.
    #[must_use]
    pub fn new(params: SessionParams) -> Self {
        Self {
            params,
            state: Mutex::new(StubState {
                next_handle: 1,
                counters: vec![1_024, 2_048, 12, 1],
                ..StubState::default()
            }),
            notify: Notify::new(),
        }
    }

    /// Session parameters the engine was built with.
    #[must_use]
    pub const fn params(&self) -> &SessionParams {
        &self.params
    }

    /// Queue an alert and wake any waiter.
    pub fn push_alert(&self, alert: Alert) {
        self.lock().alerts.push_back(alert);
        self.notify.notify_one();
    }

    /// Stop confirming adds automatically; use [`StubEngine::confirm_add`].
    pub fn set_manual_confirm(&self, manual: bool) {
        self.lock().manual_confirm = manual;
    }

    /// Emit the add confirmation for an already submitted transfer.
    pub fn confirm_add(&self, info_hash: InfoHash) -> Option<TransferHandle> {
        let handle = self.handle_for(info_hash)?;
        self.push_alert(Alert::TransferAdded {
            handle,
            error: None,
        });
        Some(handle)
    }

    /// Make adds for `info_hash` fail with `reason`.
    pub fn fail_add(&self, info_hash: InfoHash, reason: impl Into<String>) {
        self.lock().add_failures.insert(info_hash, reason.into());
    }

    /// Choose how resume requests for `info_hash` are answered.
    pub fn set_resume_outcome(&self, info_hash: InfoHash, outcome: ResumeOutcome) {
        self.lock().resume_outcomes.insert(info_hash, outcome);
    }

    /// Mutate the engine-side status of a transfer.
    pub fn update_status<F>(&self, info_hash: InfoHash, update: F) -> bool
    where
        F: FnOnce(&mut TransferStatus),
    {
        self.lock()
            .transfers
            .get_mut(&info_hash)
            .map(|transfer| update(&mut transfer.status))
            .is_some()
    }

    /// Attach descriptor metadata to a magnet transfer and emit
    /// [`Alert::MetadataReceived`].
    pub fn resolve_metadata(&self, info_hash: InfoHash, descriptor: Vec<u8>) -> bool {
        let handle = {
            let mut state = self.lock();
            let Some(transfer) = state.transfers.get_mut(&info_hash) else {
                return false;
            };
            transfer.descriptor = Some(descriptor);
            transfer.status.has_metadata = true;
            transfer.status.need_save_resume = true;
            transfer.status.handle
        };
        self.push_alert(Alert::MetadataReceived { handle });
        true
    }

    /// Replace the counter vector reported by statistics snapshots.
    pub fn set_counters(&self, counters: Vec<i64>) {
        self.lock().counters = counters;
    }

    /// Make the next `wait_for_alerts` call fail.
    pub fn fail_next_wait(&self) {
        self.lock().fail_next_wait = true;
    }

    /// Make `write_session_params` fail.
    pub fn fail_session_write(&self, fail: bool) {
        self.lock().fail_session_write = fail;
    }

    /// Handle of a managed transfer.
    #[must_use]
    pub fn handle_for(&self, info_hash: InfoHash) -> Option<TransferHandle> {
        self.lock()
            .transfers
            .get(&info_hash)
            .map(|transfer| transfer.status.handle)
    }

    /// Every add request received so far.
    #[must_use]
    pub fn submitted(&self) -> Vec<AddTransferParams> {
        self.lock().submitted.clone()
    }

    /// Identities resume data was requested for.
    #[must_use]
    pub fn resume_requests(&self) -> Vec<InfoHash> {
        self.lock().resume_requests.clone()
    }

    /// Identities removal was requested for.
    #[must_use]
    pub fn removal_requests(&self) -> Vec<InfoHash> {
        self.lock().removal_requests.clone()
    }

    /// Whether the engine was paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// Number of statistics requests as (session, transfers, dht).
    #[must_use]
    pub fn post_counts(&self) -> (usize, usize, usize) {
        let state = self.lock();
        (
            state.session_stats_posts,
            state.transfer_update_posts,
            state.dht_stats_posts,
        )
    }

    /// Alerts currently queued.
    #[must_use]
    pub fn pending_alerts(&self) -> usize {
        self.lock().alerts.len()
    }

    fn lock(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn identity_of(params: &AddTransferParams) -> Option<InfoHash> {
        params
            .info_hash
            .or_else(|| params.descriptor.as_deref().map(descriptor_info_hash))
    }
}

fn query_value<'a>(query: &'a str, key: &str) -> impl Iterator<Item = &'a str> {
    let prefix = format!("{key}=");
    query
        .split('&')
        .filter_map(move |pair| pair.strip_prefix(prefix.as_str()))
}

#[async_trait]
impl TransferEngine for StubEngine {
    fn stats_metrics(&self) -> Vec<StatsMetric> {
        vec![
            StatsMetric::new("net.recv_bytes", 0, MetricKind::Counter),
            StatsMetric::new("net.sent_bytes", 1, MetricKind::Counter),
            StatsMetric::new("dht.dht_nodes", 2, MetricKind::Gauge),
            StatsMetric::new("ses.num_downloading_torrents", 3, MetricKind::Gauge),
        ]
    }

    fn parse_magnet_uri(&self, uri: &str) -> TorrentResult<AddTransferParams> {
        let query = uri
            .strip_prefix("magnet:?")
            .ok_or(TorrentError::InvalidInput {
                field: "magnet",
                reason: "missing magnet scheme",
            })?;
        let info_hash = query_value(query, "xt")
            .find_map(|value| value.strip_prefix("urn:btih:"))
            .ok_or(TorrentError::InvalidInput {
                field: "magnet",
                reason: "missing btih",
            })?
            .parse::<InfoHash>()
            .map_err(|_| TorrentError::InvalidInput {
                field: "magnet",
                reason: "malformed btih",
            })?;
        Ok(AddTransferParams {
            info_hash: Some(info_hash),
            name: query_value(query, "dn").next().map(str::to_string),
            trackers: query_value(query, "tr").map(str::to_string).collect(),
            ..AddTransferParams::default()
        })
    }

    fn parse_descriptor(&self, bytes: &[u8]) -> TorrentResult<AddTransferParams> {
        let name = bytes
            .strip_prefix(DESCRIPTOR_PREFIX)
            .ok_or(TorrentError::InvalidInput {
                field: "descriptor",
                reason: "unrecognised descriptor encoding",
            })?;
        Ok(AddTransferParams {
            info_hash: Some(descriptor_info_hash(bytes)),
            name: Some(String::from_utf8_lossy(name).into_owned()),
            descriptor: Some(bytes.to_vec()),
            ..AddTransferParams::default()
        })
    }

    fn read_resume_data(&self, blob: &[u8]) -> TorrentResult<AddTransferParams> {
        serde_json::from_slice(blob).map_err(|err| op_failed("read_resume_data", None, err))
    }

    fn write_resume_data(&self, params: &AddTransferParams) -> TorrentResult<Vec<u8>> {
        serde_json::to_vec(params)
            .map_err(|err| op_failed("write_resume_data", params.info_hash, err))
    }

    fn async_add_transfer(&self, params: AddTransferParams) {
        let alert = {
            let mut state = self.lock();
            state.submitted.push(params.clone());
            let id = state.next_handle;
            state.next_handle += 1;

            match Self::identity_of(&params) {
                None => Some(Alert::TransferAdded {
                    handle: TransferHandle::new(id, InfoHash::default()),
                    error: Some("missing info hash".to_string()),
                }),
                Some(info_hash) => {
                    let failure = state.add_failures.get(&info_hash).cloned();
                    if let Some(reason) = failure {
                        Some(Alert::TransferAdded {
                            handle: TransferHandle::new(id, info_hash),
                            error: Some(reason),
                        })
                    } else {
                        let manual = state.manual_confirm;
                        let queue_position =
                            i32::try_from(state.transfers.len()).unwrap_or(i32::MAX);
                        let transfer = state.transfers.entry(info_hash).or_insert_with(|| {
                            let handle = TransferHandle::new(id, info_hash);
                            let mut status = TransferStatus::new(handle, params.save_path.clone());
                            status.name.clone_from(&params.name);
                            status.queue_position = queue_position;
                            status.has_metadata = params.descriptor.is_some();
                            status.need_save_resume = status.has_metadata;
                            status.paused = params.paused;
                            status.state = if status.has_metadata {
                                TransferState::CheckingFiles
                            } else {
                                TransferState::DownloadingMetadata
                            };
                            StubTransfer {
                                status,
                                descriptor: params.descriptor.clone(),
                            }
                        });
                        let handle = transfer.status.handle;
                        (!manual).then_some(Alert::TransferAdded {
                            handle,
                            error: None,
                        })
                    }
                }
            }
        };
        if let Some(alert) = alert {
            self.push_alert(alert);
        }
    }

    fn remove_transfer(&self, handle: TransferHandle) {
        let removed = {
            let mut state = self.lock();
            state.removal_requests.push(handle.info_hash);
            state.transfers.remove(&handle.info_hash).is_some()
        };
        if removed {
            self.push_alert(Alert::TransferRemoved {
                info_hash: handle.info_hash,
            });
        }
    }

    async fn wait_for_alerts(&self, timeout: Duration) -> TorrentResult<bool> {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        {
            let mut state = self.lock();
            if state.fail_next_wait {
                state.fail_next_wait = false;
                return Err(op_failed(
                    "wait_for_alerts",
                    None,
                    io::Error::other("alert queue unavailable"),
                ));
            }
            if !state.alerts.is_empty() {
                return Ok(true);
            }
        }
        let _ = tokio::time::timeout(timeout, notified).await;
        Ok(!self.lock().alerts.is_empty())
    }

    fn pop_alerts(&self) -> Vec<Alert> {
        self.lock().alerts.drain(..).collect()
    }

    fn status(&self, handle: TransferHandle) -> TorrentResult<TransferStatus> {
        self.lock()
            .transfers
            .get(&handle.info_hash)
            .map(|transfer| transfer.status.clone())
            .ok_or(TorrentError::NotFound {
                info_hash: handle.info_hash,
            })
    }

    fn transfer_statuses(&self) -> Vec<TransferStatus> {
        let mut statuses = self
            .lock()
            .transfers
            .values()
            .map(|transfer| transfer.status.clone())
            .collect::<Vec<_>>();
        statuses.sort_by_key(|status| status.queue_position);
        statuses
    }

    fn descriptor_bytes(&self, handle: TransferHandle) -> TorrentResult<Vec<u8>> {
        let state = self.lock();
        let transfer = state
            .transfers
            .get(&handle.info_hash)
            .ok_or(TorrentError::NotFound {
                info_hash: handle.info_hash,
            })?;
        transfer
            .descriptor
            .clone()
            .ok_or(TorrentError::InvalidInput {
                field: "descriptor",
                reason: "metadata not yet known",
            })
    }

    fn save_resume_data(&self, handle: TransferHandle) {
        let alert = {
            let mut state = self.lock();
            state.resume_requests.push(handle.info_hash);
            let outcome = state
                .resume_outcomes
                .get(&handle.info_hash)
                .cloned()
                .unwrap_or_default();
            match (outcome, state.transfers.get_mut(&handle.info_hash)) {
                (ResumeOutcome::Ignore, _) => None,
                (ResumeOutcome::Fail(error), _) => {
                    Some(Alert::SaveResumeDataFailed { handle, error })
                }
                (ResumeOutcome::Produce, None) => Some(Alert::SaveResumeDataFailed {
                    handle,
                    error: "invalid handle".to_string(),
                }),
                (ResumeOutcome::Produce, Some(transfer)) => {
                    transfer.status.need_save_resume = false;
                    Some(Alert::SaveResumeData {
                        handle,
                        params: AddTransferParams {
                            info_hash: Some(handle.info_hash),
                            name: transfer.status.name.clone(),
                            save_path: transfer.status.save_path.clone(),
                            trackers: Vec::new(),
                            descriptor: transfer.descriptor.clone(),
                            resume_state: Some(
                                transfer.status.total_payload_download.to_le_bytes().to_vec(),
                            ),
                            paused: transfer.status.paused,
                        },
                    })
                }
            }
        };
        if let Some(alert) = alert {
            self.push_alert(alert);
        }
    }

    fn write_session_params(&self) -> TorrentResult<Vec<u8>> {
        if self.lock().fail_session_write {
            return Err(op_failed(
                "write_session_params",
                None,
                io::Error::other("session state unavailable"),
            ));
        }
        serde_json::to_vec(&self.params).map_err(|err| op_failed("write_session_params", None, err))
    }

    fn pause(&self) {
        let handles = {
            let mut state = self.lock();
            state.paused = true;
            state
                .transfers
                .values_mut()
                .filter(|transfer| !transfer.status.paused)
                .map(|transfer| {
                    transfer.status.paused = true;
                    transfer.status.handle
                })
                .collect::<Vec<_>>()
        };
        for handle in handles {
            self.push_alert(Alert::TransferPaused { handle });
        }
    }

    fn post_session_stats(&self) {
        let counters = {
            let mut state = self.lock();
            state.session_stats_posts += 1;
            state.counters.clone()
        };
        self.push_alert(Alert::SessionStats { counters });
    }

    fn post_transfer_updates(&self) {
        self.lock().transfer_update_posts += 1;
        let statuses = self.transfer_statuses();
        self.push_alert(Alert::StateUpdate { statuses });
    }

    fn post_dht_stats(&self) {
        self.lock().dht_stats_posts += 1;
        self.push_alert(Alert::Other {
            what: "dht_stats".to_string(),
        });
    }
}

/// Factory producing [`StubEngine`]s and recording their parameters.
#[derive(Clone, Default)]
pub struct StubEngineFactory {
    created: Arc<Mutex<Vec<SessionParams>>>,
    fail_create: Arc<Mutex<bool>>,
}

impl StubEngineFactory {
    /// Construct a factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters of every engine built so far.
    #[must_use]
    pub fn created(&self) -> Vec<SessionParams> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make subsequent `create` calls fail.
    pub fn fail_create(&self, fail: bool) {
        *self.fail_create.lock().unwrap_or_else(PoisonError::into_inner) = fail;
    }

    /// Encode parameters the way `read_session_params` expects them.
    ///
    /// # Errors
    ///
    /// Returns an error when the parameters cannot be encoded.
    pub fn encode_session_params(params: &SessionParams) -> TorrentResult<Vec<u8>> {
        serde_json::to_vec(params).map_err(|err| op_failed("write_session_params", None, err))
    }
}

impl EngineFactory for StubEngineFactory {
    type Engine = StubEngine;

    fn read_session_params(&self, blob: &[u8]) -> TorrentResult<SessionParams> {
        serde_json::from_slice(blob).map_err(|err| op_failed("read_session_params", None, err))
    }

    fn create(&self, params: SessionParams) -> TorrentResult<Self::Engine> {
        if *self.fail_create.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(op_failed(
                "create_engine",
                None,
                io::Error::other("engine startup refused"),
            ));
        }
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(params.clone());
        Ok(StubEngine::new(params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{descriptor, info_hash, magnet_uri};

    fn engine() -> StubEngine {
        StubEngine::new(SessionParams::default())
    }

    #[test]
    fn parses_magnet_identity_name_and_trackers() -> anyhow::Result<()> {
        let hash = info_hash(0x11);
        let params = engine().parse_magnet_uri(&magnet_uri(hash, "demo"))?;
        assert_eq!(params.info_hash, Some(hash));
        assert_eq!(params.name.as_deref(), Some("demo"));
        assert_eq!(params.trackers, vec!["udp://tracker.example:1337".to_string()]);
        Ok(())
    }

    #[test]
    fn rejects_magnets_without_btih() {
        let err = engine().parse_magnet_uri("magnet:?dn=x").unwrap_err();
        assert!(matches!(
            err,
            TorrentError::InvalidInput {
                reason: "missing btih",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn adds_are_confirmed_through_alerts() -> anyhow::Result<()> {
        let engine = engine();
        let params = engine.parse_descriptor(&descriptor("iso"))?;
        let hash = params.info_hash.expect("identity");
        engine.async_add_transfer(params);

        assert!(engine.wait_for_alerts(Duration::from_millis(50)).await?);
        let alerts = engine.pop_alerts();
        assert!(matches!(
            alerts.as_slice(),
            [Alert::TransferAdded { handle, error: None }] if handle.info_hash == hash
        ));
        assert!(!engine.wait_for_alerts(Duration::from_millis(10)).await?);
        Ok(())
    }

    #[tokio::test]
    async fn resume_outcomes_are_configurable() -> anyhow::Result<()> {
        let engine = engine();
        let params = engine.parse_descriptor(&descriptor("a"))?;
        let hash = params.info_hash.expect("identity");
        engine.async_add_transfer(params);
        let _ = engine.pop_alerts();
        let handle = engine.handle_for(hash).expect("handle");

        engine.save_resume_data(handle);
        engine.set_resume_outcome(hash, ResumeOutcome::Fail("disk".into()));
        engine.save_resume_data(handle);
        engine.set_resume_outcome(hash, ResumeOutcome::Ignore);
        engine.save_resume_data(handle);

        let alerts = engine.pop_alerts();
        assert_eq!(alerts.len(), 2);
        assert!(matches!(alerts[0], Alert::SaveResumeData { .. }));
        assert!(matches!(alerts[1], Alert::SaveResumeDataFailed { .. }));
        assert_eq!(engine.resume_requests().len(), 3);
        Ok(())
    }

    #[test]
    fn factory_reads_back_encoded_params() -> anyhow::Result<()> {
        let factory = StubEngineFactory::new();
        let mut params = SessionParams::default();
        params.settings.user_agent = "agent".into();
        let blob = StubEngineFactory::encode_session_params(&params)?;
        assert_eq!(factory.read_session_params(&blob)?, params);
        assert!(factory.read_session_params(b"garbage").is_err());
        Ok(())
    }
}
