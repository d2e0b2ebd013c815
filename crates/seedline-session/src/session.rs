//! Session lifecycle controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use seedline_config::{AddOptions, LoadOptions, SessionOptions, defaults};
use seedline_data::{SessionStore, TransferRecord};
use seedline_events::{EventBus, InfoHash, TransferMetadata};
use seedline_telemetry::Metrics;
use seedline_torrent_core::{
    AddTransferParams, EngineFactory, SessionParams, TorrentError, TransferEngine,
};
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::settings::apply_session_options;
use crate::shared::Shared;
use crate::shutdown::{LifecyclePhase, SessionTasks, ShutdownCoordinator, ShutdownReport};
use crate::stats::StatsTable;
use crate::transfer::Transfer;
use crate::worker;

/// Removal target accepted by [`Session::remove_torrent`].
#[derive(Debug, Clone)]
pub enum RemoveTarget {
    /// Resolve through the registry.
    InfoHash(InfoHash),
    /// Use the entity's own handle.
    Transfer(Arc<Transfer>),
}

impl From<InfoHash> for RemoveTarget {
    fn from(value: InfoHash) -> Self {
        Self::InfoHash(value)
    }
}

impl From<Arc<Transfer>> for RemoveTarget {
    fn from(value: Arc<Transfer>) -> Self {
        Self::Transfer(value)
    }
}

impl From<&Arc<Transfer>> for RemoveTarget {
    fn from(value: &Arc<Transfer>) -> Self {
        Self::Transfer(Arc::clone(value))
    }
}

/// Long-lived session bound to one transfer engine.
///
/// Lifecycle: [`Session::init`] → [`Session::load`] → add/remove calls →
/// [`Session::unload`]. Dropping a session that was never unloaded stops its
/// background tasks without flushing resume data.
pub struct Session<E: TransferEngine> {
    engine: Arc<E>,
    shared: Arc<Shared>,
    drain_timeout: Duration,
    load_options: Mutex<Option<LoadOptions>>,
    tasks: Mutex<Option<SessionTasks>>,
    phase: Mutex<LifecyclePhase>,
    loaded: AtomicBool,
}

impl<E: TransferEngine> Session<E> {
    /// Validate options, restore persisted engine state, and start the engine.
    ///
    /// A missing, unreadable, or corrupt session parameters record falls back
    /// to the factory defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] for invalid options,
    /// [`SessionError::Engine`] when the engine cannot be created, and
    /// [`SessionError::Telemetry`] when metrics cannot be registered.
    pub async fn init<F, S>(factory: &F, store: &S, options: &SessionOptions) -> SessionResult<Self>
    where
        F: EngineFactory<Engine = E>,
        S: SessionStore + ?Sized,
    {
        options
            .validate()
            .map_err(|source| SessionError::Config { source })?;

        let mut params = restore_session_params(factory, store).await;
        apply_session_options(&mut params.settings, options);

        let engine = factory
            .create(params)
            .map_err(SessionError::engine("create_engine"))?;
        let stats = StatsTable::new(engine.stats_metrics());
        let metrics = Metrics::new().map_err(|source| SessionError::Telemetry { source })?;
        debug!(statistics = stats.len(), "engine started");

        Ok(Self {
            engine: Arc::new(engine),
            shared: Arc::new(Shared::new(EventBus::new(), metrics, stats)),
            drain_timeout: Duration::from_millis(options.shutdown.drain_timeout_ms),
            load_options: Mutex::new(None),
            tasks: Mutex::new(None),
            phase: Mutex::new(LifecyclePhase::Running),
            loaded: AtomicBool::new(false),
        })
    }

    /// Restore every persisted transfer and start the alert worker and the
    /// statistics ticker. Returns the number of transfers submitted.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] when called twice or after
    /// unload, [`SessionError::Config`] for invalid options, and
    /// [`SessionError::Store`] when persisted transfers cannot be read.
    pub async fn load<S>(&self, store: &S, options: LoadOptions) -> SessionResult<usize>
    where
        S: SessionStore + Clone + 'static,
    {
        self.ensure_running("load")?;
        options
            .validate()
            .map_err(|source| SessionError::Config { source })?;
        if self.loaded.swap(true, Ordering::AcqRel) {
            return Err(SessionError::InvalidState {
                operation: "load",
                phase: self.phase(),
            });
        }

        let records = match read_transfers(store).await {
            Ok(records) => records,
            Err(err) => {
                self.loaded.store(false, Ordering::Release);
                return Err(err);
            }
        };

        // Unload may have started while the store was read. Holding the
        // task slot orders this check before unload takes the tasks.
        let mut tasks = self.lock_tasks();
        if let Err(err) = self.ensure_running("load") {
            drop(tasks);
            warn!("unload started while persisted transfers were read");
            return Err(err);
        }

        let default_save_path = options
            .save_path
            .clone()
            .unwrap_or_else(|| defaults::SAVE_PATH.to_string());
        let restored = records.len();
        for record in records {
            let info_hash = record.info_hash;
            let params = self.restore_params(record, &default_save_path);
            self.shared.mute(info_hash);
            self.engine.async_add_transfer(params);
        }

        let period = Duration::from_millis(options.stats_interval_ms);
        *self.lock_load_options() = Some(options);
        let worker = worker::spawn(
            Arc::clone(&self.engine),
            Arc::clone(&self.shared),
            store.clone(),
        );
        let ticker = worker::spawn_ticker(Arc::clone(&self.engine), period);
        *tasks = Some(SessionTasks { worker, ticker });
        drop(tasks);

        info!(restored, "session loaded");
        Ok(restored)
    }

    /// Submit a magnet reference. Completion is reported by `transfer.added`
    /// or `transfer.add_failed`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Engine`] when the URI cannot be parsed and
    /// [`SessionError::InvalidState`] once unload started.
    pub fn add_magnet_link(&self, uri: &str, options: &AddOptions) -> SessionResult<InfoHash> {
        self.ensure_running("add_magnet_link")?;
        let params = self
            .engine
            .parse_magnet_uri(uri)
            .map_err(SessionError::engine("parse_magnet_uri"))?;
        self.submit(params, options)
    }

    /// Submit a serialized descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Engine`] when the descriptor cannot be parsed
    /// and [`SessionError::InvalidState`] once unload started.
    pub fn add_torrent(&self, descriptor: &[u8], options: &AddOptions) -> SessionResult<InfoHash> {
        self.ensure_running("add_torrent")?;
        let params = self
            .engine
            .parse_descriptor(descriptor)
            .map_err(SessionError::engine("parse_descriptor"))?;
        self.submit(params, options)
    }

    /// Request removal of a transfer. Returns `false`, with a warning, when
    /// the target cannot be resolved.
    pub fn remove_torrent(&self, target: impl Into<RemoveTarget>) -> bool {
        let phase = self.phase();
        if phase != LifecyclePhase::Running {
            warn!(%phase, "removal requested after unload started");
            return false;
        }
        let handle = match target.into() {
            RemoveTarget::Transfer(transfer) => transfer.handle(),
            RemoveTarget::InfoHash(info_hash) => {
                let Some(transfer) = self.shared.registry.get(&info_hash) else {
                    warn!(info_hash = %info_hash, "removal requested for unknown transfer");
                    return false;
                };
                transfer.handle()
            }
        };
        debug!(info_hash = %handle.info_hash, "removal requested");
        self.engine.remove_transfer(handle);
        true
    }

    /// Stop the worker, persist session state, and flush resume data.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] when unload already started.
    pub async fn unload<S>(&self, store: &S) -> SessionResult<ShutdownReport>
    where
        S: SessionStore + ?Sized,
    {
        self.transition("unload", LifecyclePhase::Running, LifecyclePhase::Draining)?;
        info!("session unloading");

        let coordinator = ShutdownCoordinator {
            engine: self.engine.as_ref(),
            shared: &self.shared,
            store,
            drain_timeout: self.drain_timeout,
        };
        let tasks = self.lock_tasks().take();
        coordinator.stop_tasks(tasks).await;
        coordinator.persist_session_params().await;
        self.engine.pause();

        self.set_phase(LifecyclePhase::Flushing);
        let requested = coordinator.request_resume_data();
        let report = coordinator.drain(requested).await;

        self.set_phase(LifecyclePhase::Stopped);
        info!("session stopped");
        Ok(report)
    }

    /// Snapshot of every registered transfer.
    #[must_use]
    pub fn torrents(&self) -> Vec<Arc<Transfer>> {
        self.shared.registry.values()
    }

    /// Look up one transfer.
    #[must_use]
    pub fn transfer(&self, info_hash: &InfoHash) -> Option<Arc<Transfer>> {
        self.shared.registry.get(info_hash)
    }

    /// Underlying engine.
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Public event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    /// Session metrics.
    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.shared.metrics
    }

    /// Statistic name table built from the engine catalogue.
    #[must_use]
    pub fn stats_table(&self) -> &StatsTable {
        &self.shared.stats
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> LifecyclePhase {
        *self.lock_phase()
    }

    /// Options supplied to [`Session::load`], once loaded.
    #[must_use]
    pub fn load_options(&self) -> Option<LoadOptions> {
        self.lock_load_options().clone()
    }

    fn submit(&self, mut params: AddTransferParams, options: &AddOptions) -> SessionResult<InfoHash> {
        let info_hash = params.info_hash.ok_or(SessionError::Engine {
            operation: "add_transfer",
            source: TorrentError::InvalidInput {
                field: "info_hash",
                reason: "parsed reference carries no identity",
            },
        })?;
        params.save_path = self.resolve_save_path(options);
        self.shared.set_pending(
            info_hash,
            TransferMetadata {
                tags: options.tag_list(),
            },
        );
        debug!(info_hash = %info_hash, save_path = %params.save_path, "submitting transfer");
        self.engine.async_add_transfer(params);
        Ok(info_hash)
    }

    fn resolve_save_path(&self, options: &AddOptions) -> String {
        options
            .save_path
            .clone()
            .or_else(|| {
                self.lock_load_options()
                    .as_ref()
                    .and_then(|load| load.save_path.clone())
            })
            .unwrap_or_else(|| defaults::SAVE_PATH.to_string())
    }

    fn restore_params(&self, record: TransferRecord, default_save_path: &str) -> AddTransferParams {
        let info_hash = record.info_hash;
        let mut params = match record.resume_data.as_deref() {
            Some(blob) => self.engine.read_resume_data(blob).unwrap_or_else(|err| {
                warn!(info_hash = %info_hash, error = %err, "stored resume data is corrupt");
                AddTransferParams::for_info_hash(info_hash)
            }),
            None => AddTransferParams::for_info_hash(info_hash),
        };
        if record.descriptor.is_some() {
            params.descriptor = record.descriptor;
        }
        params.info_hash = Some(info_hash);
        if params.save_path.is_empty() {
            params.save_path = default_save_path.to_string();
        }
        params
    }

    fn ensure_running(&self, operation: &'static str) -> SessionResult<()> {
        let phase = self.phase();
        if phase == LifecyclePhase::Running {
            Ok(())
        } else {
            Err(SessionError::InvalidState { operation, phase })
        }
    }

    fn transition(
        &self,
        operation: &'static str,
        from: LifecyclePhase,
        to: LifecyclePhase,
    ) -> SessionResult<()> {
        let mut phase = self.lock_phase();
        if *phase != from {
            return Err(SessionError::InvalidState {
                operation,
                phase: *phase,
            });
        }
        *phase = to;
        Ok(())
    }

    fn set_phase(&self, phase: LifecyclePhase) {
        debug!(%phase, "session phase changed");
        *self.lock_phase() = phase;
    }

    fn lock_phase(&self) -> MutexGuard<'_, LifecyclePhase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Option<SessionTasks>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_load_options(&self) -> MutexGuard<'_, Option<LoadOptions>> {
        self.load_options
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: TransferEngine> Drop for Session<E> {
    fn drop(&mut self) {
        self.shared.request_exit();
        if let Some(tasks) = self.lock_tasks().take() {
            tasks.ticker.abort();
        }
    }
}

async fn restore_session_params<F, S>(factory: &F, store: &S) -> SessionParams
where
    F: EngineFactory,
    S: SessionStore + ?Sized,
{
    match store.latest_session_params().await {
        Ok(Some(record)) => match factory.read_session_params(&record.data) {
            Ok(params) => {
                info!(timestamp = record.timestamp, "restored session state");
                params
            }
            Err(err) => {
                warn!(error = %err, "stored session state is corrupt; using defaults");
                factory.default_session_params()
            }
        },
        Ok(None) => {
            info!("no stored session state; using defaults");
            factory.default_session_params()
        }
        Err(err) => {
            warn!(error = %err, "session state could not be read; using defaults");
            factory.default_session_params()
        }
    }
}

async fn read_transfers<S>(store: &S) -> SessionResult<Vec<TransferRecord>>
where
    S: SessionStore + ?Sized,
{
    let count = store
        .count_transfers()
        .await
        .map_err(SessionError::store("count_transfers"))?;
    debug!(count, "restoring persisted transfers");
    store
        .transfers_by_queue_position()
        .await
        .map_err(SessionError::store("transfers_by_queue_position"))
}
