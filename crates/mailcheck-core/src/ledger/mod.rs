//! Delivery ledger.
//!
//! Durable record of which `(mailbox, message id)` pairs have already been
//! delivered to the application. Two interchangeable backends implement
//! [`DeliveryLedger`]: an indexed `SQLite` table ([`SqlLedger`]) and a sorted
//! key-value JSON document ([`DocumentLedger`]). The backend is chosen from
//! configuration once, at startup.

mod document;
mod model;
mod sql;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::LedgerConfig;

pub use document::DocumentLedger;
pub use model::DeliveryRecord;
pub use sql::SqlLedger;

/// Errors raised by a ledger backend.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Document file could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document file is not valid JSON.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// No usable location for the document file.
    #[error("No data directory available for the ledger document")]
    NoDataDir,
}

/// Result type alias for ledger operations.
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Storage contract shared by every ledger backend.
///
/// Implementations must be safe to share between concurrently running
/// cycles of different mailboxes.
#[async_trait]
pub trait DeliveryLedger: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Create the table or namespace if it does not exist yet.
    ///
    /// Idempotent; run once at startup.
    async fn ensure_schema(&self) -> LedgerResult<()>;

    /// Return the subset of `message_ids` already delivered for `mailbox`.
    ///
    /// Empty input yields an empty set.
    async fn records_by_ids(
        &self,
        mailbox: &str,
        message_ids: &[String],
    ) -> LedgerResult<HashSet<String>>;

    /// Records of `mailbox` delivered within `[from, to]`, oldest first.
    async fn records_by_date_range(
        &self,
        mailbox: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<Vec<DeliveryRecord>>;

    /// Delete records of `mailbox` delivered within `[from, to]`.
    ///
    /// Returns the number of records removed.
    async fn delete_by_date_range(
        &self,
        mailbox: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<u64>;

    /// Store a record. A record for the same `(mailbox, message_id)` pair
    /// is left untouched.
    async fn insert(&self, record: &DeliveryRecord) -> LedgerResult<()>;

    /// Record `message_id` of `mailbox` as delivered now.
    async fn add(&self, mailbox: &str, message_id: &str) -> LedgerResult<()> {
        self.insert(&DeliveryRecord::now(mailbox, message_id)).await
    }
}

/// Open the ledger backend selected by configuration.
///
/// The schema is not created here; call [`DeliveryLedger::ensure_schema`].
///
/// # Errors
///
/// Returns an error if the database or document cannot be opened.
pub async fn open_ledger(config: &LedgerConfig) -> LedgerResult<Arc<dyn DeliveryLedger>> {
    match config {
        LedgerConfig::Sql {
            url,
            max_connections,
            table_name,
        } => {
            let ledger = SqlLedger::connect(url, *max_connections, table_name).await?;
            Ok(Arc::new(ledger))
        }
        LedgerConfig::Document { path, namespace } => {
            let path = match path {
                Some(path) => path.clone(),
                None => default_document_path()?,
            };
            let ledger = DocumentLedger::open(path, namespace).await?;
            Ok(Arc::new(ledger))
        }
    }
}

/// `<data dir>/mailcheck/mailcheck.json`.
fn default_document_path() -> LedgerResult<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("mailcheck").join("mailcheck.json"))
        .ok_or(LedgerError::NoDataDir)
}
