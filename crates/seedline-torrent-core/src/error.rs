//! Error types for transfer engine operations.

use std::error::Error;

use seedline_events::InfoHash;
use thiserror::Error;

/// Primary error type for engine operations.
#[derive(Debug, Error)]
pub enum TorrentError {
    /// Operation is not supported by the underlying engine.
    #[error("transfer operation not supported")]
    Unsupported {
        /// Operation identifier.
        operation: &'static str,
    },
    /// Input could not be interpreted by the engine.
    #[error("invalid transfer input")]
    InvalidInput {
        /// Field or input name.
        field: &'static str,
        /// Static reason describing the invalid value.
        reason: &'static str,
    },
    /// Operation failed in the underlying engine.
    #[error("transfer operation failed")]
    OperationFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Transfer identity when available.
        info_hash: Option<InfoHash>,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The handle no longer refers to a managed transfer.
    #[error("transfer not found")]
    NotFound {
        /// Missing transfer identity.
        info_hash: InfoHash,
    },
}

/// Convenience alias for engine operation results.
pub type TorrentResult<T> = Result<T, TorrentError>;

/// Build a torrent error with structured operation context.
pub fn op_failed(
    operation: &'static str,
    info_hash: Option<InfoHash>,
    source: impl Error + Send + Sync + 'static,
) -> TorrentError {
    TorrentError::OperationFailed {
        operation,
        info_hash,
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn op_failed_wraps_source() {
        let hash = InfoHash::new([3; 20]);
        let err = op_failed("write_resume_data", Some(hash), io::Error::other("disk"));
        assert_eq!(err.to_string(), "transfer operation failed");
        match err {
            TorrentError::OperationFailed {
                operation,
                info_hash,
                source,
            } => {
                assert_eq!(operation, "write_resume_data");
                assert_eq!(info_hash, Some(hash));
                assert_eq!(source.to_string(), "disk");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn messages_are_constant() {
        let not_found = TorrentError::NotFound {
            info_hash: InfoHash::default(),
        };
        assert_eq!(not_found.to_string(), "transfer not found");
        let invalid = TorrentError::InvalidInput {
            field: "magnet",
            reason: "missing btih",
        };
        assert_eq!(invalid.to_string(), "invalid transfer input");
    }
}
