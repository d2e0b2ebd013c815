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

//! Explicit, validated configuration for Seedline sessions.
//!
//! Layout: `model.rs` (typed option structures), `defaults.rs` (default
//! values), `validate.rs` (validation helpers), `loader.rs` (JSON file
//! loading), `error.rs`.

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use model::{
    AddOptions, DatabaseOptions, DhtOptions, HostPort, LoadOptions, LogFormat, LoggingOptions,
    ProxyKind, ProxyOptions, SeedlineConfig, SessionOptions, ShutdownOptions, Tags, join_endpoints,
};
