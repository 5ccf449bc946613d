//! Durable ledgers — processed-message dedup, outbox log, settings KV.
//!
//! All persistence goes through the [`Store`] trait; no component touches
//! storage directly. The processed ledger's insert is insert-if-absent at
//! the storage layer (primary-key `INSERT OR IGNORE`), so two racing inserts
//! for the same message id can never both succeed.

mod libsql_backend;
mod migrations;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub use libsql_backend::LibSqlStore;

/// A recorded reply attempt. Append-only; not keyed to a message id —
/// deduplication happens upstream in the processed ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxRecord {
    pub id: i64,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    /// Free-text outcome tag: `queued`, `queued(simulated)`, `sent(smtp)`,
    /// or `send_error:<reason>`.
    pub status: String,
    /// Whether this was an automated dispatch.
    pub auto: bool,
    pub created_at: DateTime<Utc>,
}

/// Backend-agnostic persistence trait.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert-if-absent into the processed ledger.
    ///
    /// Returns `true` if the id was newly recorded, `false` if it was
    /// already present. Uniqueness is enforced by the storage layer.
    async fn record_processed(&self, message_id: &str) -> Result<bool, StoreError>;

    /// Membership test against the processed ledger.
    async fn is_processed(&self, message_id: &str) -> Result<bool, StoreError>;

    /// Append one reply attempt to the outbox. Returns the assigned row id.
    async fn insert_outbox(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        status: &str,
        auto: bool,
    ) -> Result<i64, StoreError>;

    /// Most recent outbox records, newest first.
    async fn recent_outbox(&self, limit: usize) -> Result<Vec<OutboxRecord>, StoreError>;

    /// Read a settings value.
    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Upsert a settings value.
    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError>;
}
