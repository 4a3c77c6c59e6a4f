//! Relational ledger backend.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, warn};

use super::model::{DeliveryRecord, timestamp};
use super::{DeliveryLedger, LedgerResult};

/// Upper bound on bound parameters per `IN (...)` query.
const IDS_PER_QUERY: usize = 500;

/// Ledger stored in an indexed `SQLite` table.
///
/// Columns: `id` (auto-increment primary key), `message_id` (indexed),
/// `mailbox`, `date`. A unique index on `(mailbox, message_id)` enforces
/// one record per delivered message.
pub struct SqlLedger {
    pool: SqlitePool,
    table: String,
}

impl SqlLedger {
    /// Connect to the database at `url`.
    ///
    /// `table` must be a plain identifier; configuration validation
    /// guarantees this.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails.
    pub async fn connect(url: &str, max_connections: u32, table: &str) -> LedgerResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    /// Create an in-memory ledger with its schema, for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory(table: &str) -> LedgerResult<Self> {
        let ledger = Self::connect("sqlite::memory:", 1, table).await?;
        ledger.ensure_schema().await?;
        Ok(ledger)
    }

    async fn table_exists(&self) -> LedgerResult<bool> {
        let row = sqlx::query(
            r"SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(&self.table)
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row.get("count");
        Ok(count > 0)
    }
}

#[async_trait]
impl DeliveryLedger for SqlLedger {
    fn backend(&self) -> &'static str {
        "sql"
    }

    async fn ensure_schema(&self) -> LedgerResult<()> {
        let existed = self.table_exists().await?;

        let table = &self.table;
        sqlx::query(&format!(
            r"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id TEXT NOT NULL,
                mailbox TEXT NOT NULL,
                date TEXT NOT NULL
            )
            "
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r"CREATE INDEX IF NOT EXISTS idx_{table}_message_id ON {table}(message_id)"
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r"CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_mailbox_message ON {table}(mailbox, message_id)"
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r"CREATE INDEX IF NOT EXISTS idx_{table}_mailbox_date ON {table}(mailbox, date)"
        ))
        .execute(&self.pool)
        .await?;

        // Indexes are (re)created even on an existing table, which may
        // predate them.
        if existed {
            info!(table = %self.table, "Ledger table already exists");
        } else {
            info!(table = %self.table, "Created ledger table");
        }
        Ok(())
    }

    async fn records_by_ids(
        &self,
        mailbox: &str,
        message_ids: &[String],
    ) -> LedgerResult<HashSet<String>> {
        let mut delivered = HashSet::new();

        for batch in message_ids.chunks(IDS_PER_QUERY) {
            let placeholders = vec!["?"; batch.len()].join(", ");
            let sql = format!(
                "SELECT message_id FROM {} WHERE mailbox = ? AND message_id IN ({placeholders})",
                self.table
            );

            let mut query = sqlx::query(&sql).bind(mailbox);
            for id in batch {
                query = query.bind(id);
            }

            let rows = query.fetch_all(&self.pool).await?;
            delivered.extend(rows.iter().map(|row| row.get::<String, _>("message_id")));
        }

        Ok(delivered)
    }

    async fn records_by_date_range(
        &self,
        mailbox: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<Vec<DeliveryRecord>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT mailbox, message_id, date
            FROM {}
            WHERE mailbox = ? AND date >= ? AND date <= ?
            ORDER BY date ASC, id ASC
            ",
            self.table
        ))
        .bind(mailbox)
        .bind(timestamp(from))
        .bind(timestamp(to))
        .fetch_all(&self.pool)
        .await?;

        let records = rows
            .iter()
            .filter_map(|row| {
                let date: String = row.get("date");
                let Ok(delivered_at) = DateTime::parse_from_rfc3339(&date) else {
                    warn!(table = %self.table, %date, "Skipping ledger row with invalid date");
                    return None;
                };

                Some(DeliveryRecord {
                    mailbox: row.get("mailbox"),
                    message_id: row.get("message_id"),
                    delivered_at: delivered_at.with_timezone(&Utc),
                })
            })
            .collect();

        Ok(records)
    }

    async fn delete_by_date_range(
        &self,
        mailbox: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<u64> {
        let result = sqlx::query(&format!(
            r"DELETE FROM {} WHERE mailbox = ? AND date >= ? AND date <= ?",
            self.table
        ))
        .bind(mailbox)
        .bind(timestamp(from))
        .bind(timestamp(to))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert(&self, record: &DeliveryRecord) -> LedgerResult<()> {
        let result = sqlx::query(&format!(
            r"INSERT OR IGNORE INTO {} (message_id, mailbox, date) VALUES (?, ?, ?)",
            self.table
        ))
        .bind(&record.message_id)
        .bind(&record.mailbox)
        .bind(timestamp(record.delivered_at))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(
                mailbox = %record.mailbox,
                message_id = %record.message_id,
                "Message already recorded as delivered"
            );
        }
        Ok(())
    }
}
