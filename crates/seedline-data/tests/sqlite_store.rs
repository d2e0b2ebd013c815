use anyhow::Result;
use seedline_data::{SessionStore, SqliteStore};
use seedline_events::InfoHash;
use sqlx::query;

fn hash(byte: u8) -> InfoHash {
    InfoHash::new([byte; 20])
}

#[tokio::test]
async fn session_params_return_latest_record() -> Result<()> {
    let store = SqliteStore::in_memory().await?;
    assert!(store.latest_session_params().await?.is_none());

    store.append_session_params(b"old", 100).await?;
    store.append_session_params(b"new", 200).await?;
    store.append_session_params(b"older", 50).await?;

    let latest = store.latest_session_params().await?.expect("record");
    assert_eq!(latest.data, b"new");
    assert_eq!(latest.timestamp, 200);
    Ok(())
}

#[tokio::test]
async fn transfers_join_descriptors_in_queue_order() -> Result<()> {
    let store = SqliteStore::in_memory().await?;
    store.upsert_transfer(hash(2), 5).await?;
    store.upsert_transfer(hash(1), 0).await?;
    store.upsert_transfer(hash(3), 2).await?;
    store.upsert_descriptor(hash(3), b"descriptor-3").await?;

    assert_eq!(store.count_transfers().await?, 3);
    let records = store.transfers_by_queue_position().await?;
    let order = records.iter().map(|r| r.info_hash).collect::<Vec<_>>();
    assert_eq!(order, vec![hash(1), hash(3), hash(2)]);
    assert_eq!(records[1].descriptor.as_deref(), Some(&b"descriptor-3"[..]));
    assert!(records[0].descriptor.is_none());
    assert!(records.iter().all(|r| r.resume_data.is_none()));
    Ok(())
}

#[tokio::test]
async fn upserts_replace_existing_rows() -> Result<()> {
    let store = SqliteStore::in_memory().await?;
    store.upsert_transfer(hash(7), 1).await?;
    store.upsert_transfer(hash(7), 4).await?;
    store.upsert_descriptor(hash(7), b"a").await?;
    store.upsert_descriptor(hash(7), b"b").await?;

    let records = store.transfers_by_queue_position().await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].queue_position, 4);
    assert_eq!(records[0].descriptor.as_deref(), Some(&b"b"[..]));
    Ok(())
}

#[tokio::test]
async fn resume_data_updates_queue_position_and_blob() -> Result<()> {
    let store = SqliteStore::in_memory().await?;
    store.upsert_transfer(hash(9), 0).await?;
    store.update_resume_data(hash(9), 3, b"resume").await?;

    let records = store.transfers_by_queue_position().await?;
    assert_eq!(records[0].queue_position, 3);
    assert_eq!(records[0].resume_data.as_deref(), Some(&b"resume"[..]));
    Ok(())
}

#[tokio::test]
async fn deletes_remove_descriptor_and_record() -> Result<()> {
    let store = SqliteStore::in_memory().await?;
    store.upsert_transfer(hash(4), 0).await?;
    store.upsert_descriptor(hash(4), b"d").await?;

    store.delete_descriptor(hash(4)).await?;
    let records = store.transfers_by_queue_position().await?;
    assert!(records[0].descriptor.is_none());

    store.delete_transfer(hash(4)).await?;
    assert_eq!(store.count_transfers().await?, 0);
    Ok(())
}

#[tokio::test]
async fn malformed_identity_rows_are_skipped() -> Result<()> {
    let store = SqliteStore::in_memory().await?;
    store.upsert_transfer(hash(4), 1).await?;
    query("INSERT INTO transfers (info_hash, queue_position) VALUES ('not-hex', 0)")
        .execute(store.pool())
        .await?;
    store.upsert_transfer(hash(5), 2).await?;

    let records = store.transfers_by_queue_position().await?;
    let order = records.iter().map(|r| r.info_hash).collect::<Vec<_>>();
    assert_eq!(order, vec![hash(4), hash(5)]);
    assert_eq!(store.count_transfers().await?, 3);
    Ok(())
}

#[tokio::test]
async fn file_databases_persist_across_connections() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite://{}", dir.path().join("seedline.sqlite").display());

    {
        let store = SqliteStore::connect(&url).await?;
        store.upsert_transfer(hash(5), 1).await?;
        store.pool().close().await;
    }

    let reopened = SqliteStore::connect(&url).await?;
    assert_eq!(reopened.count_transfers().await?, 1);
    Ok(())
}
