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

//! Core event bus for Seedline.
//!
//! The bus carries a closed, typed set of public session events plus the
//! entity-scoped events emitted by individual transfers. Subscribers either
//! consume an [`EventStream`] (with optional replay of recent envelopes) or
//! register synchronous listeners through [`EventBus::on`] and
//! [`EventBus::once`], cancelled with [`EventBus::off`].
//!
//! Layout: `payloads.rs` (event and DTO types), `routing.rs` (bus, streams,
//! listeners), `topics.rs` (event name catalogue).

pub mod payloads;
pub mod routing;
pub mod topics;

pub use payloads::{
    DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId, INFO_HASH_LEN, InfoHash,
    InfoHashParseError, SessionStatistics, TransferEvent, TransferMetadata, TransferRates,
    TransferSnapshot, TransferState,
};
pub use routing::{EventBus, EventStream, Subscription};
pub use topics::{EventKind, UnknownEventKind};
