//! libSQL backend — async [`Store`] implementation.
//!
//! Supports a local file database in production and `:memory:` in tests.
//! `libsql::Connection` is `Send + Sync` and safe for concurrent async use,
//! so the poller and the HTTP handlers share one connection.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;

use crate::error::StoreError;
use crate::store::migrations;
use crate::store::{OutboxRecord, Store};

/// libSQL store backend.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Open(format!("Failed to create data directory: {e}")))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to open database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");

        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to create in-memory database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;

        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

#[async_trait]
impl Store for LibSqlStore {
    async fn record_processed(&self, message_id: &str) -> Result<bool, StoreError> {
        let affected = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO processed_messages (message_id, processed_at)
                 VALUES (?1, ?2)",
                params![message_id, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("record_processed failed: {e}")))?;

        Ok(affected > 0)
    }

    async fn is_processed(&self, message_id: &str) -> Result<bool, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT 1 FROM processed_messages WHERE message_id = ?1",
                params![message_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("is_processed failed: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("is_processed read failed: {e}")))?;

        Ok(row.is_some())
    }

    async fn insert_outbox(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        status: &str,
        auto: bool,
    ) -> Result<i64, StoreError> {
        self.conn()
            .execute(
                "INSERT INTO outbox (recipient, subject, body, status, auto, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    recipient,
                    subject,
                    body,
                    status,
                    auto as i64,
                    Utc::now().to_rfc3339()
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("insert_outbox failed: {e}")))?;

        Ok(self.conn().last_insert_rowid())
    }

    async fn recent_outbox(&self, limit: usize) -> Result<Vec<OutboxRecord>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, recipient, subject, body, status, auto, created_at
                 FROM outbox ORDER BY id DESC LIMIT ?1",
                params![limit as i64],
            )
            .await
            .map_err(|e| StoreError::Query(format!("recent_outbox failed: {e}")))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("recent_outbox read failed: {e}")))?
        {
            let created_str: String = row
                .get(6)
                .map_err(|e| StoreError::Query(format!("bad outbox row: {e}")))?;
            records.push(OutboxRecord {
                id: row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("bad outbox row: {e}")))?,
                recipient: row
                    .get(1)
                    .map_err(|e| StoreError::Query(format!("bad outbox row: {e}")))?,
                subject: row
                    .get(2)
                    .map_err(|e| StoreError::Query(format!("bad outbox row: {e}")))?,
                body: row
                    .get(3)
                    .map_err(|e| StoreError::Query(format!("bad outbox row: {e}")))?,
                status: row
                    .get(4)
                    .map_err(|e| StoreError::Query(format!("bad outbox row: {e}")))?,
                auto: row
                    .get::<i64>(5)
                    .map_err(|e| StoreError::Query(format!("bad outbox row: {e}")))?
                    != 0,
                created_at: parse_datetime(&created_str),
            });
        }

        Ok(records)
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut rows = self
            .conn()
            .query("SELECT value FROM settings WHERE key = ?1", params![key])
            .await
            .map_err(|e| StoreError::Query(format!("get_setting failed: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("get_setting read failed: {e}")))?;

        match row {
            Some(row) => {
                let value: String = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("bad settings row: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("set_setting failed: {e}")))?;

        Ok(())
    }
}
