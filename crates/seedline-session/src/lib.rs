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

//! Session lifecycle orchestration for Seedline.
//!
//! A [`Session`] owns one transfer engine. It restores persisted transfers,
//! drains the engine's alert stream on a background worker, mirrors engine
//! state into a [`TransferRegistry`], persists changes through a
//! [`seedline_data::SessionStore`], and flushes resumable state on
//! [`Session::unload`].
//!
//! Layout: `session.rs` (controller), `worker.rs` (alert loop),
//! `shutdown.rs` (phases and drain), `registry.rs`, `transfer.rs`,
//! `stats.rs` (metric descriptor table), `settings.rs` (engine settings
//! builder), `shared.rs` (state shared with the worker), `error.rs`.

pub mod error;
pub mod registry;
pub mod session;
pub mod settings;
pub mod shutdown;
pub mod stats;
pub mod transfer;

mod shared;
mod worker;

pub use error::{SessionError, SessionResult};
pub use registry::TransferRegistry;
pub use session::{RemoveTarget, Session};
pub use settings::{apply_session_options, peer_fingerprint, user_agent};
pub use shutdown::{LifecyclePhase, ShutdownReport};
pub use stats::{MetricDescriptor, StatsTable};
pub use transfer::Transfer;
pub use worker::ALERT_POLL_INTERVAL;
