//! Key-value document ledger backend.
//!
//! The whole ledger lives in one JSON document, grouped by namespace and
//! keyed by `"{mailbox}-{message_id}"`:
//!
//! ```json
//! { "processedmessage": { "alice@pop.example.com:995-UID1": { "message_id": "UID1", ... } } }
//! ```
//!
//! The document is kept in memory and rewritten atomically (temp file +
//! rename) after every mutation. A mutation is applied to a copy and only
//! becomes visible once the copy is on disk.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::model::DeliveryRecord;
use super::{DeliveryLedger, LedgerResult};

type Namespace = BTreeMap<String, DeliveryRecord>;
type Document = BTreeMap<String, Namespace>;

/// Ledger stored as a sorted key-value JSON document.
pub struct DocumentLedger {
    path: Option<PathBuf>,
    namespace: String,
    document: RwLock<Document>,
}

impl DocumentLedger {
    /// Open the document at `path`, loading it if the file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn open(path: PathBuf, namespace: &str) -> LedgerResult<Self> {
        let document = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Document::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Document::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: Some(path),
            namespace: namespace.to_string(),
            document: RwLock::new(document),
        })
    }

    /// Create a ledger that is never written to disk, for testing.
    #[must_use]
    pub fn in_memory(namespace: &str) -> Self {
        Self {
            path: None,
            namespace: namespace.to_string(),
            document: RwLock::new(Document::new()),
        }
    }

    /// Path of the backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn key(mailbox: &str, message_id: &str) -> String {
        format!("{mailbox}-{message_id}")
    }

    fn in_range(
        record: &DeliveryRecord,
        mailbox: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> bool {
        record.mailbox == mailbox && record.delivered_at >= from && record.delivered_at <= to
    }

    /// Write the document to disk. Callers hold the write lock.
    async fn persist(&self, document: &Document) -> LedgerResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(document)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl DeliveryLedger for DocumentLedger {
    fn backend(&self) -> &'static str {
        "document"
    }

    async fn ensure_schema(&self) -> LedgerResult<()> {
        let mut document = self.document.write().await;
        if document.contains_key(&self.namespace) {
            info!(namespace = %self.namespace, "Ledger namespace already exists");
            return Ok(());
        }

        let mut staged = document.clone();
        staged.insert(self.namespace.clone(), Namespace::new());
        self.persist(&staged).await?;
        *document = staged;
        info!(namespace = %self.namespace, path = ?self.path, "Created ledger namespace");
        Ok(())
    }

    async fn records_by_ids(
        &self,
        mailbox: &str,
        message_ids: &[String],
    ) -> LedgerResult<HashSet<String>> {
        let document = self.document.read().await;
        let Some(namespace) = document.get(&self.namespace) else {
            return Ok(HashSet::new());
        };

        Ok(message_ids
            .iter()
            .filter(|id| namespace.contains_key(&Self::key(mailbox, id)))
            .cloned()
            .collect())
    }

    async fn records_by_date_range(
        &self,
        mailbox: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<Vec<DeliveryRecord>> {
        let document = self.document.read().await;
        let Some(namespace) = document.get(&self.namespace) else {
            return Ok(Vec::new());
        };

        let mut records: Vec<DeliveryRecord> = namespace
            .values()
            .filter(|record| Self::in_range(record, mailbox, from, to))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.delivered_at
                .cmp(&b.delivered_at)
                .then_with(|| a.message_id.cmp(&b.message_id))
        });
        Ok(records)
    }

    async fn delete_by_date_range(
        &self,
        mailbox: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<u64> {
        let mut document = self.document.write().await;
        let Some(namespace) = document.get(&self.namespace) else {
            return Ok(0);
        };

        let kept: Namespace = namespace
            .iter()
            .filter(|(_, record)| !Self::in_range(record, mailbox, from, to))
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect();
        let removed = namespace.len() - kept.len();

        if removed > 0 {
            let mut staged = document.clone();
            staged.insert(self.namespace.clone(), kept);
            self.persist(&staged).await?;
            *document = staged;
        }
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }

    async fn insert(&self, record: &DeliveryRecord) -> LedgerResult<()> {
        let mut document = self.document.write().await;

        let key = Self::key(&record.mailbox, &record.message_id);
        if document
            .get(&self.namespace)
            .is_some_and(|namespace| namespace.contains_key(&key))
        {
            debug!(%key, "Message already recorded as delivered");
            return Ok(());
        }

        let mut staged = document.clone();
        staged
            .entry(self.namespace.clone())
            .or_default()
            .insert(key, record.clone());
        self.persist(&staged).await?;
        *document = staged;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, d, 12, 0, 0).unwrap()
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("mailcheck-{}-{name}", std::process::id()))
            .join("ledger.json")
    }

    #[tokio::test]
    async fn test_records_by_ids() {
        let ledger = DocumentLedger::in_memory("processedmessage");
        ledger.ensure_schema().await.unwrap();
        ledger.add("alice", "A").await.unwrap();
        ledger.add("bob", "B").await.unwrap();

        let found = ledger
            .records_by_ids("alice", &ids(&["A", "B"]))
            .await
            .unwrap();
        assert_eq!(found, HashSet::from(["A".to_string()]));
        assert!(ledger.records_by_ids("alice", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_insert_keeps_first_record() {
        let ledger = DocumentLedger::in_memory("processedmessage");
        ledger
            .insert(&DeliveryRecord::new("alice", "A", day(1)))
            .await
            .unwrap();
        ledger
            .insert(&DeliveryRecord::new("alice", "A", day(2)))
            .await
            .unwrap();

        let records = ledger
            .records_by_date_range("alice", day(1), day(3))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].delivered_at, day(1));
    }

    #[tokio::test]
    async fn test_range_query_and_delete() {
        let ledger = DocumentLedger::in_memory("processedmessage");
        for (id, d) in [("C", 5), ("A", 1), ("B", 3), ("D", 9)] {
            ledger
                .insert(&DeliveryRecord::new("alice", id, day(d)))
                .await
                .unwrap();
        }

        let listed: Vec<String> = ledger
            .records_by_date_range("alice", day(1), day(5))
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.message_id)
            .collect();
        assert_eq!(listed, ids(&["A", "B", "C"]));

        let removed = ledger
            .delete_by_date_range("alice", day(1), day(5))
            .await
            .unwrap();
        assert_eq!(removed, 3);
        let left = ledger
            .records_by_ids("alice", &ids(&["A", "B", "C", "D"]))
            .await
            .unwrap();
        assert_eq!(left, HashSet::from(["D".to_string()]));
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let path = temp_path("reopen");
        let _ = tokio::fs::remove_file(&path).await;

        let ledger = DocumentLedger::open(path.clone(), "processedmessage")
            .await
            .unwrap();
        ledger.ensure_schema().await.unwrap();
        ledger.add("alice", "A").await.unwrap();
        drop(ledger);

        let reopened = DocumentLedger::open(path.clone(), "processedmessage")
            .await
            .unwrap();
        reopened.ensure_schema().await.unwrap();
        let found = reopened
            .records_by_ids("alice", &ids(&["A"]))
            .await
            .unwrap();
        assert!(found.contains("A"));

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(raw.contains("\"alice-A\""));

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }

    #[tokio::test]
    async fn test_namespaces_are_separate() {
        let path = temp_path("namespaces");
        let _ = tokio::fs::remove_file(&path).await;

        let first = DocumentLedger::open(path.clone(), "first").await.unwrap();
        first.ensure_schema().await.unwrap();
        first.add("alice", "A").await.unwrap();

        let second = DocumentLedger::open(path.clone(), "second").await.unwrap();
        second.ensure_schema().await.unwrap();
        assert!(
            second
                .records_by_ids("alice", &ids(&["A"]))
                .await
                .unwrap()
                .is_empty()
        );

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_unchanged() {
        let path = temp_path("failed-write");
        let dir = path.parent().unwrap().to_path_buf();
        let _ = tokio::fs::remove_dir_all(&dir).await;

        let ledger = DocumentLedger::open(path.clone(), "processedmessage")
            .await
            .unwrap();
        ledger
            .insert(&DeliveryRecord::new("alice", "A", day(1)))
            .await
            .unwrap();

        // A plain file where the directory was makes every later write fail.
        tokio::fs::remove_dir_all(&dir).await.unwrap();
        tokio::fs::write(&dir, b"").await.unwrap();

        assert!(
            ledger
                .delete_by_date_range("alice", day(1), day(2))
                .await
                .is_err()
        );
        assert!(ledger.add("alice", "B").await.is_err());

        let found = ledger
            .records_by_ids("alice", &ids(&["A", "B"]))
            .await
            .unwrap();
        assert_eq!(found, HashSet::from(["A".to_string()]));
        assert_eq!(
            ledger
                .records_by_date_range("alice", day(1), day(2))
                .await
                .unwrap()
                .len(),
            1
        );

        let _ = tokio::fs::remove_file(&dir).await;
    }
}
