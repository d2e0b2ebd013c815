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

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (identities, magnets, descriptors, polling),
//! engine.rs (in-memory engine and factory), store.rs (recording store).

pub mod engine;
pub mod fixtures;
pub mod store;

pub use engine::{ResumeOutcome, StubEngine, StubEngineFactory};
pub use store::{RecordingStore, StoreOp};
