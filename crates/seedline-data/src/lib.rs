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

//! Durable session state for Seedline.
//! Layout: `store.rs` (collaborator trait and records), `sqlite.rs`
//! (`SQLite` implementation with embedded migrations), `error.rs`.

pub mod error;
pub mod sqlite;
pub mod store;

pub use error::{DataError, Result};
pub use sqlite::SqliteStore;
pub use store::{SessionParamsRecord, SessionStore, TransferRecord};
