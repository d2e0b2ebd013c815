mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use common::{WAIT, emitted, next_event, running};
use seedline_config::AddOptions;
use seedline_events::{Event, EventKind, TransferEvent, TransferRates};
use seedline_session::{Session, SessionError, Transfer};
use seedline_test_support::fixtures::{descriptor, eventually, info_hash, magnet_uri};
use seedline_test_support::{RecordingStore, StoreOp, StubEngine};
use seedline_torrent_core::{Alert, TransferEngine, TransferHandle, TransferStatus};
use tokio::time::timeout;
use tokio_stream::StreamExt;

async fn added(session: &Session<StubEngine>, byte: u8) -> Result<Arc<Transfer>> {
    let mut events = session.events().subscribe(None);
    let hash = info_hash(byte);
    session.add_magnet_link(&magnet_uri(hash, "fixture"), &AddOptions::default())?;
    loop {
        if let Event::TransferAdded { transfer } =
            next_event(&mut events, EventKind::TransferAdded).await?
            && transfer.info_hash == hash
        {
            break;
        }
    }
    session.transfer(&hash).context("entity registered")
}

#[tokio::test]
async fn removal_deletes_rows_and_emits_once() -> Result<()> {
    let store = RecordingStore::new();
    let session = running(&store).await?;
    let mut events = session.events().subscribe(None);

    let hash = session.add_torrent(&descriptor("doomed"), &AddOptions::default())?;
    next_event(&mut events, EventKind::TransferAdded).await?;
    assert!(store.has_descriptor(hash));
    let transfer = session.transfer(&hash).context("entity registered")?;
    let mut entity_events = transfer.subscribe();

    assert!(session.remove_torrent(hash));
    let removed = next_event(&mut events, EventKind::TransferRemoved).await?;
    assert_eq!(removed, Event::TransferRemoved { info_hash: hash });
    assert_eq!(
        timeout(WAIT, entity_events.recv()).await??,
        TransferEvent::Removed
    );
    assert!(session.transfer(&hash).is_none());

    assert!(eventually(WAIT, || store.transfer(hash).is_none()).await);
    assert!(!store.has_descriptor(hash));
    let deletes = store
        .ops()
        .into_iter()
        .filter(|op| {
            matches!(
                op,
                StoreOp::DeleteDescriptor { .. } | StoreOp::DeleteTransfer { .. }
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(
        deletes,
        vec![
            StoreOp::DeleteDescriptor { info_hash: hash },
            StoreOp::DeleteTransfer { info_hash: hash },
        ]
    );
    assert_eq!(emitted(&session, EventKind::TransferRemoved), 1);
    Ok(())
}

#[tokio::test]
async fn removal_accepts_entity_targets() -> Result<()> {
    let store = RecordingStore::new();
    let session = running(&store).await?;
    let transfer = added(&session, 0x41).await?;

    assert!(session.remove_torrent(&transfer));
    assert_eq!(session.engine().removal_requests(), vec![transfer.info_hash()]);
    assert!(eventually(WAIT, || session.torrents().is_empty()).await);
    Ok(())
}

#[tokio::test]
async fn unknown_removal_is_a_noop() -> Result<()> {
    let store = RecordingStore::new();
    let session = running(&store).await?;

    assert!(!session.remove_torrent(info_hash(0x99)));
    assert!(session.engine().removal_requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn status_batches_aggregate_every_reported_rate() -> Result<()> {
    let store = RecordingStore::new();
    let session = running(&store).await?;
    let first = added(&session, 0x51).await?;
    let second = added(&session, 0x52).await?;
    let engine = session.engine();
    engine.update_status(first.info_hash(), |status| {
        status.download_payload_rate = 100;
        status.upload_payload_rate = 10;
    });
    engine.update_status(second.info_hash(), |status| {
        status.download_payload_rate = 50;
        status.upload_payload_rate = 5;
    });
    let mut stranger = TransferStatus::new(TransferHandle::new(99, info_hash(0xEE)), ".");
    stranger.download_payload_rate = 7;
    stranger.upload_payload_rate = 3;
    let mut statuses = engine.transfer_statuses();
    statuses.push(stranger);

    let mut events = session.events().subscribe(None);
    engine.push_alert(Alert::StateUpdate { statuses });

    let stats = next_event(&mut events, EventKind::TransfersStatistics).await?;
    assert_eq!(
        stats,
        Event::TransfersStatistics {
            stats: TransferRates {
                download_payload_rate: 157,
                upload_payload_rate: 18,
            }
        }
    );
    let Event::TransfersUpdated { transfers } =
        next_event(&mut events, EventKind::TransfersUpdated).await?
    else {
        panic!("expected transfers.updated");
    };
    assert_eq!(transfers.len(), 2);
    assert_eq!(first.status().download_payload_rate, 100);
    assert_eq!(session.metrics().snapshot().active_transfers, 2);
    Ok(())
}

#[tokio::test]
async fn empty_status_batch_emits_statistics_only() -> Result<()> {
    let store = RecordingStore::new();
    let session = running(&store).await?;
    let mut events = session.events().subscribe(None);

    session.engine().push_alert(Alert::StateUpdate {
        statuses: Vec::new(),
    });
    next_event(&mut events, EventKind::TransfersStatistics).await?;
    session.engine().post_session_stats();
    next_event(&mut events, EventKind::SessionStatistics).await?;
    assert_eq!(emitted(&session, EventKind::TransfersUpdated), 0);
    Ok(())
}

#[tokio::test]
async fn session_statistics_use_the_descriptor_table() -> Result<()> {
    let store = RecordingStore::new();
    let session = running(&store).await?;
    let mut events = session.events().subscribe(None);
    session.engine().set_counters(vec![5, 6, 7]);
    session.engine().post_session_stats();

    let Event::SessionStatistics { stats } =
        next_event(&mut events, EventKind::SessionStatistics).await?
    else {
        panic!("expected session.statistics");
    };
    assert_eq!(stats.get("net.recv_bytes"), Some(&5));
    assert_eq!(stats.get("dht.dht_nodes"), Some(&7));
    assert!(!stats.contains_key("ses.num_downloading_torrents"));
    assert_eq!(session.stats_table().len(), 4);
    Ok(())
}

#[tokio::test]
async fn finished_requires_downloaded_payload() -> Result<()> {
    let store = RecordingStore::new();
    let session = running(&store).await?;
    let transfer = added(&session, 0x61).await?;
    let engine = session.engine();
    let mut events = session.events().subscribe(None);

    engine.push_alert(Alert::TransferFinished {
        handle: transfer.handle(),
    });
    // Alerts are handled in order, so this marks the first one as done.
    engine.post_session_stats();
    next_event(&mut events, EventKind::SessionStatistics).await?;
    engine.update_status(transfer.info_hash(), |status| {
        status.total_payload_download = 4_096;
    });
    engine.push_alert(Alert::TransferFinished {
        handle: transfer.handle(),
    });

    let Event::TransferFinished { transfer: snapshot } =
        next_event(&mut events, EventKind::TransferFinished).await?
    else {
        panic!("expected transfer.finished");
    };
    assert_eq!(snapshot.total_payload_download, 4_096);
    assert_eq!(emitted(&session, EventKind::TransferFinished), 1);
    Ok(())
}

#[tokio::test]
async fn storage_moves_are_entity_scoped() -> Result<()> {
    let store = RecordingStore::new();
    let session = running(&store).await?;
    let transfer = added(&session, 0x71).await?;
    let mut entity_events = transfer.subscribe();
    let engine = session.engine();
    let last_public = session.events().last_event_id();

    engine.update_status(transfer.info_hash(), |status| {
        status.save_path = "/moved".into();
    });
    engine.push_alert(Alert::StorageMoved {
        handle: transfer.handle(),
        path: "/moved".into(),
    });
    assert_eq!(
        timeout(WAIT, entity_events.recv()).await??,
        TransferEvent::StorageMoved {
            path: "/moved".into()
        }
    );
    assert_eq!(transfer.status().save_path, "/moved");

    let mut stream = transfer.event_stream();
    engine.push_alert(Alert::StorageMovedFailed {
        handle: transfer.handle(),
        error: "read-only filesystem".into(),
    });
    let failed = TransferEvent::StorageMovedFailed {
        error: "read-only filesystem".into(),
    };
    assert_eq!(timeout(WAIT, entity_events.recv()).await??, failed);
    let streamed = timeout(WAIT, stream.next())
        .await?
        .context("entity stream closed")??;
    assert_eq!(streamed, failed);
    assert_eq!(session.events().last_event_id(), last_public);
    Ok(())
}

#[tokio::test]
async fn pause_reaches_entity_and_bus() -> Result<()> {
    let store = RecordingStore::new();
    let session = running(&store).await?;
    let transfer = added(&session, 0x72).await?;
    let mut entity_events = transfer.subscribe();
    let mut events = session.events().subscribe(None);

    session.engine().push_alert(Alert::TransferPaused {
        handle: transfer.handle(),
    });
    assert_eq!(
        timeout(WAIT, entity_events.recv()).await??,
        TransferEvent::Paused
    );
    let Event::TransferPaused { transfer: snapshot } =
        next_event(&mut events, EventKind::TransferPaused).await?
    else {
        panic!("expected transfer.paused");
    };
    assert_eq!(snapshot.info_hash, transfer.info_hash());
    Ok(())
}

#[tokio::test]
async fn rejected_adds_surface_as_add_failed() -> Result<()> {
    let store = RecordingStore::new();
    let session = running(&store).await?;
    let mut events = session.events().subscribe(None);
    let hash = info_hash(0x81);
    session.engine().fail_add(hash, "duplicate torrent");

    session.add_magnet_link(&magnet_uri(hash, "rejected"), &AddOptions::default())?;
    let failed = next_event(&mut events, EventKind::TransferAddFailed).await?;
    assert_eq!(
        failed,
        Event::TransferAddFailed {
            info_hash: Some(hash),
            error: "duplicate torrent".into(),
        }
    );
    assert!(session.torrents().is_empty());
    assert!(store.ops().is_empty());
    Ok(())
}

#[tokio::test]
async fn malformed_references_are_rejected_synchronously() -> Result<()> {
    let store = RecordingStore::new();
    let session = running(&store).await?;

    let magnet = session.add_magnet_link("magnet:?dn=nameless", &AddOptions::default());
    assert!(matches!(
        magnet,
        Err(SessionError::Engine {
            operation: "parse_magnet_uri",
            ..
        })
    ));
    let torrent = session.add_torrent(b"not a descriptor", &AddOptions::default());
    assert!(matches!(
        torrent,
        Err(SessionError::Engine {
            operation: "parse_descriptor",
            ..
        })
    ));
    assert!(session.engine().submitted().is_empty());
    Ok(())
}

#[tokio::test]
async fn resolved_metadata_is_persisted() -> Result<()> {
    let store = RecordingStore::new();
    let session = running(&store).await?;
    let transfer = added(&session, 0x91).await?;
    let hash = transfer.info_hash();
    assert!(store.transfer(hash).is_none(), "magnets persist once metadata is known");

    assert!(session.engine().resolve_metadata(hash, descriptor("resolved")));
    assert!(eventually(WAIT, || store.has_descriptor(hash)).await);
    assert!(store.transfer(hash).is_some());
    assert!(eventually(WAIT, || transfer.status().has_metadata).await);
    Ok(())
}

#[tokio::test]
async fn store_failures_are_counted_and_handling_continues() -> Result<()> {
    let store = RecordingStore::new();
    store.fail_operation("upsert_transfer");
    let session = running(&store).await?;
    let mut events = session.events().subscribe(None);

    let hash = session.add_torrent(&descriptor("unlucky"), &AddOptions::default())?;
    next_event(&mut events, EventKind::TransferAdded).await?;

    assert_eq!(session.metrics().store_failures("upsert_transfer"), 1);
    assert!(store.has_descriptor(hash));
    assert!(session.transfer(&hash).is_some());
    Ok(())
}

#[tokio::test]
async fn alert_wait_errors_are_retried() -> Result<()> {
    let store = RecordingStore::new();
    let session = common::init(&store).await?;
    session.engine().fail_next_wait();
    session.load(&store, common::quiet_load()).await?;

    let transfer = added(&session, 0xA1).await?;
    assert_eq!(transfer.name().as_deref(), Some("fixture"));
    assert!(session.metrics().snapshot().alerts_processed_total >= 1);
    Ok(())
}

#[tokio::test]
async fn listeners_observe_public_events() -> Result<()> {
    let store = RecordingStore::new();
    let session = running(&store).await?;
    let every = Arc::new(AtomicUsize::new(0));
    let first_only = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&every);
    let subscription = session.events().on(EventKind::TransferAdded, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = Arc::clone(&first_only);
    session.events().once(EventKind::TransferAdded, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    added(&session, 0xB1).await?;
    added(&session, 0xB2).await?;
    assert_eq!(every.load(Ordering::SeqCst), 2);
    assert_eq!(first_only.load(Ordering::SeqCst), 1);

    assert!(session.events().off(subscription));
    added(&session, 0xB3).await?;
    assert_eq!(every.load(Ordering::SeqCst), 2);
    assert_eq!(session.metrics().events_emitted("transfer.added"), 3);
    Ok(())
}
