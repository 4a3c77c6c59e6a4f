//! Configuration model types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::DEFAULT_TABLE_NAME;
use crate::Result;

/// Identity of a remote mailbox for ledger purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MailboxIdentity {
    /// Account user name.
    pub user: String,
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
}

impl MailboxIdentity {
    /// Create a new identity.
    #[must_use]
    pub fn new(user: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
            port,
        }
    }

    /// Key under which this mailbox's delivery records are stored.
    #[must_use]
    pub fn ledger_key(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

impl std::fmt::Display for MailboxIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}

/// One configured mailbox.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxConfig {
    /// Account user name.
    pub user: String,
    /// Account password.
    pub password: String,
    /// Server hostname.
    pub host: String,
    /// Server port (995 for implicit TLS, 110 for plain).
    pub port: u16,
    /// Connect with implicit TLS.
    pub use_encryption: bool,
}

impl MailboxConfig {
    /// Identity of this mailbox.
    #[must_use]
    pub fn identity(&self) -> MailboxIdentity {
        MailboxIdentity::new(&self.user, &self.host, self.port)
    }
}

// Password stays out of logs.
impl std::fmt::Debug for MailboxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxConfig")
            .field("user", &self.user)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_encryption", &self.use_encryption)
            .finish_non_exhaustive()
    }
}

/// Delivery ledger backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum LedgerConfig {
    /// Indexed relational table (`SQLite` via sqlx).
    Sql {
        /// Connection URL, e.g. `sqlite:mailcheck.db?mode=rwc`.
        url: String,
        /// Pool size shared by every mailbox.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Table holding delivery records.
        #[serde(default = "default_table_name")]
        table_name: String,
    },
    /// Sorted key-value JSON document.
    Document {
        /// Document file; defaults to the user data directory.
        #[serde(default)]
        path: Option<PathBuf>,
        /// Top-level namespace holding delivery records.
        #[serde(default = "default_table_name")]
        namespace: String,
    },
}

impl LedgerConfig {
    /// Short backend name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Sql { .. } => "sql",
            Self::Document { .. } => "document",
        }
    }

    /// Table or namespace name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        match self {
            Self::Sql { table_name, .. } => table_name,
            Self::Document { namespace, .. } => namespace,
        }
    }
}

fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

const fn default_max_connections() -> u32 {
    5
}

/// Engine settings shared by every mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Interval between two cycles of the same mailbox.
    #[serde(rename = "checkPeriodMs", with = "duration_ms")]
    pub check_period: Duration,
    /// Maximum number of new messages fetched per cycle.
    pub message_chunk_size: usize,
    /// Ledger backend.
    pub ledger: LedgerConfig,
}

/// Complete configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Engine settings.
    #[serde(flatten)]
    pub sync: SyncConfig,
    /// Mailboxes to poll.
    pub mailboxes: Vec<MailboxConfig>,
}

impl Config {
    /// Parse a configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a required field is missing.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }
}

/// Serde helpers for durations stored as whole milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)] // Required by serde with= signature
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
