//! `SQLite`-backed implementation of [`SessionStore`].

use std::str::FromStr;

use async_trait::async_trait;
use seedline_events::InfoHash;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, query};
use tracing::{debug, warn};

use crate::error::{DataError, Result};
use crate::store::{SessionParamsRecord, SessionStore, TransferRecord};

const SELECT_LATEST_SESSION_PARAMS: &str = r"
    SELECT data, timestamp
    FROM session_params
    ORDER BY timestamp DESC, id DESC
    LIMIT 1
";

const INSERT_SESSION_PARAMS: &str = r"
    INSERT INTO session_params (data, timestamp) VALUES (?, ?)
";

const COUNT_TRANSFERS: &str = r"SELECT COUNT(*) AS cnt FROM transfers";

const SELECT_TRANSFERS: &str = r"
    SELECT t.info_hash, t.queue_position, t.resume_data, d.data AS descriptor
    FROM transfers t
    LEFT JOIN transfer_descriptors d ON t.info_hash = d.info_hash
    ORDER BY t.queue_position ASC
";

const UPSERT_TRANSFER: &str = r"
    INSERT INTO transfers (info_hash, queue_position) VALUES (?, ?)
    ON CONFLICT (info_hash) DO UPDATE SET queue_position = excluded.queue_position
";

const UPSERT_DESCRIPTOR: &str = r"
    INSERT INTO transfer_descriptors (info_hash, data) VALUES (?, ?)
    ON CONFLICT (info_hash) DO UPDATE SET data = excluded.data
";

const UPDATE_RESUME_DATA: &str = r"
    UPDATE transfers SET queue_position = ?, resume_data = ? WHERE info_hash = ?
";

const DELETE_DESCRIPTOR: &str = r"DELETE FROM transfer_descriptors WHERE info_hash = ?";

const DELETE_TRANSFER: &str = r"DELETE FROM transfers WHERE info_hash = ?";

/// Database-backed session store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap an existing pool, applying pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if migrations fail.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|source| DataError::MigrationFailed { source })?;
        debug!("session store migrations applied");
        Ok(Self { pool })
    }

    /// Open (creating when missing) the database at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the database is unreachable,
    /// or migrations fail.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(DataError::query("connect"))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(DataError::query("connect"))?;
        Self::new(pool).await
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub async fn in_memory() -> Result<Self> {
        let options =
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(DataError::query("connect"))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(DataError::query("connect"))?;
        Self::new(pool).await
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn map_transfer_row(row: &SqliteRow) -> Result<TransferRecord> {
    const OPERATION: &str = "transfers_by_queue_position";
    let raw: String = row
        .try_get("info_hash")
        .map_err(DataError::query(OPERATION))?;
    let info_hash = raw.parse::<InfoHash>().map_err(|_| DataError::InvalidRow {
        operation: OPERATION,
        field: "info_hash",
        value: raw.clone(),
    })?;
    Ok(TransferRecord {
        info_hash,
        queue_position: row
            .try_get("queue_position")
            .map_err(DataError::query(OPERATION))?,
        resume_data: row
            .try_get("resume_data")
            .map_err(DataError::query(OPERATION))?,
        descriptor: row
            .try_get("descriptor")
            .map_err(DataError::query(OPERATION))?,
    })
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn latest_session_params(&self) -> Result<Option<SessionParamsRecord>> {
        let row = query(SELECT_LATEST_SESSION_PARAMS)
            .fetch_optional(&self.pool)
            .await
            .map_err(DataError::query("latest_session_params"))?;
        row.map(|row| {
            Ok(SessionParamsRecord {
                data: row
                    .try_get("data")
                    .map_err(DataError::query("latest_session_params"))?,
                timestamp: row
                    .try_get("timestamp")
                    .map_err(DataError::query("latest_session_params"))?,
            })
        })
        .transpose()
    }

    async fn append_session_params(&self, data: &[u8], timestamp: i64) -> Result<()> {
        query(INSERT_SESSION_PARAMS)
            .bind(data)
            .bind(timestamp)
            .execute(&self.pool)
            .await
            .map_err(DataError::query("append_session_params"))?;
        Ok(())
    }

    async fn count_transfers(&self) -> Result<u64> {
        let row = query(COUNT_TRANSFERS)
            .fetch_one(&self.pool)
            .await
            .map_err(DataError::query("count_transfers"))?;
        let count: i64 = row
            .try_get("cnt")
            .map_err(DataError::query("count_transfers"))?;
        u64::try_from(count).map_err(|_| DataError::InvalidRow {
            operation: "count_transfers",
            field: "cnt",
            value: count.to_string(),
        })
    }

    async fn transfers_by_queue_position(&self) -> Result<Vec<TransferRecord>> {
        let rows = query(SELECT_TRANSFERS)
            .fetch_all(&self.pool)
            .await
            .map_err(DataError::query("transfers_by_queue_position"))?;
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            match map_transfer_row(row) {
                Ok(record) => records.push(record),
                Err(DataError::InvalidRow { field, value, .. }) => {
                    warn!(field, value = %value, "skipping corrupt transfer record");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(records)
    }

    async fn upsert_transfer(&self, info_hash: InfoHash, queue_position: i64) -> Result<()> {
        query(UPSERT_TRANSFER)
            .bind(info_hash.to_hex())
            .bind(queue_position)
            .execute(&self.pool)
            .await
            .map_err(DataError::query("upsert_transfer"))?;
        Ok(())
    }

    async fn upsert_descriptor(&self, info_hash: InfoHash, descriptor: &[u8]) -> Result<()> {
        query(UPSERT_DESCRIPTOR)
            .bind(info_hash.to_hex())
            .bind(descriptor)
            .execute(&self.pool)
            .await
            .map_err(DataError::query("upsert_descriptor"))?;
        Ok(())
    }

    async fn update_resume_data(
        &self,
        info_hash: InfoHash,
        queue_position: i64,
        resume_data: &[u8],
    ) -> Result<()> {
        query(UPDATE_RESUME_DATA)
            .bind(queue_position)
            .bind(resume_data)
            .bind(info_hash.to_hex())
            .execute(&self.pool)
            .await
            .map_err(DataError::query("update_resume_data"))?;
        Ok(())
    }

    async fn delete_descriptor(&self, info_hash: InfoHash) -> Result<()> {
        query(DELETE_DESCRIPTOR)
            .bind(info_hash.to_hex())
            .execute(&self.pool)
            .await
            .map_err(DataError::query("delete_descriptor"))?;
        Ok(())
    }

    async fn delete_transfer(&self, info_hash: InfoHash) -> Result<()> {
        query(DELETE_TRANSFER)
            .bind(info_hash.to_hex())
            .execute(&self.pool)
            .await
            .map_err(DataError::query("delete_transfer"))?;
        Ok(())
    }
}
