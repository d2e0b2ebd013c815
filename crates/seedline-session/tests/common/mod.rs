#![allow(dead_code, unreachable_pub)]

use std::time::Duration;

use anyhow::{Context, Result};
use seedline_config::{LoadOptions, SessionOptions};
use seedline_events::{Event, EventKind, EventStream};
use seedline_session::Session;
use seedline_test_support::{RecordingStore, StubEngine, StubEngineFactory};
use tokio::time::timeout;

pub const WAIT: Duration = Duration::from_secs(3);

/// Load options whose ticker never fires during a test.
pub fn quiet_load() -> LoadOptions {
    LoadOptions {
        save_path: None,
        stats_interval_ms: 600_000,
    }
}

pub async fn init(store: &RecordingStore) -> Result<Session<StubEngine>> {
    init_with(store, &SessionOptions::default()).await
}

pub async fn init_with(
    store: &RecordingStore,
    options: &SessionOptions,
) -> Result<Session<StubEngine>> {
    let factory = StubEngineFactory::new();
    Ok(Session::init(&factory, store, options).await?)
}

/// Initialised and loaded session over an empty store.
pub async fn running(store: &RecordingStore) -> Result<Session<StubEngine>> {
    let session = init(store).await?;
    session.load(store, quiet_load()).await?;
    Ok(session)
}

pub async fn next_event(stream: &mut EventStream, kind: EventKind) -> Result<Event> {
    let envelope = timeout(WAIT, stream.next_of(kind))
        .await
        .with_context(|| format!("timed out waiting for {kind}"))?
        .context("event stream closed")?;
    Ok(envelope.event)
}

/// Number of envelopes of `kind` currently in the replay buffer.
pub fn emitted(session: &Session<StubEngine>, kind: EventKind) -> usize {
    session
        .events()
        .backlog_since(0)
        .iter()
        .filter(|envelope| envelope.event.kind() == kind)
        .count()
}
