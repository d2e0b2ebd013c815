#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub, unused)]

//! Engine-agnostic transfer interfaces and DTOs.
//! Layout: `model/` (handles, statuses, parameters, settings), `alert.rs`
//! (engine notifications), `service/` (engine traits), `error.rs`.

pub mod alert;
pub mod error;
pub mod model;
pub mod service;

pub use alert::Alert;
pub use error::{TorrentError, TorrentResult, op_failed};
pub use model::{
    AddTransferParams, EncryptionPolicy, EngineSettings, MetricKind, ProxySettings, ProxyType,
    SessionParams, StatsMetric, TransferHandle, TransferStatus,
};
pub use seedline_events::{InfoHash, TransferMetadata, TransferSnapshot, TransferState};
pub use service::{EngineFactory, TransferEngine};
