//! # Design
//!
//! - Centralize session-level errors for initialisation and lifecycle calls.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use seedline_config::ConfigError;
use seedline_data::DataError;
use seedline_telemetry::TelemetryError;
use seedline_torrent_core::TorrentError;
use thiserror::Error;

use crate::shutdown::LifecyclePhase;

/// Result alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session-level error type.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Supplied options failed validation.
    #[error("invalid session configuration")]
    Config {
        /// Source configuration error.
        source: ConfigError,
    },
    /// The engine rejected an operation.
    #[error("engine operation failed")]
    Engine {
        /// Operation identifier.
        operation: &'static str,
        /// Source engine error.
        source: TorrentError,
    },
    /// The durable store failed.
    #[error("session store operation failed")]
    Store {
        /// Operation identifier.
        operation: &'static str,
        /// Source data-layer error.
        source: DataError,
    },
    /// Session metrics could not be registered.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Source telemetry error.
        source: TelemetryError,
    },
    /// The call is not valid in the current lifecycle phase.
    #[error("operation not valid in current session phase")]
    InvalidState {
        /// Operation identifier.
        operation: &'static str,
        /// Phase the session was in.
        phase: LifecyclePhase,
    },
}

impl SessionError {
    pub(crate) fn engine(operation: &'static str) -> impl FnOnce(TorrentError) -> Self {
        move |source| Self::Engine { operation, source }
    }

    pub(crate) fn store(operation: &'static str) -> impl FnOnce(DataError) -> Self {
        move |source| Self::Store { operation, source }
    }
}
