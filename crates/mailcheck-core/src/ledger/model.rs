//! Ledger data model.

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Proof that a message was delivered to the application.
///
/// At most one record exists per `(mailbox, message_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    /// Ledger key of the mailbox.
    pub mailbox: String,
    /// Stable server-side unique id.
    pub message_id: String,
    /// When the message was delivered.
    pub delivered_at: DateTime<Utc>,
}

impl DeliveryRecord {
    /// Create a record delivered at the given time.
    #[must_use]
    pub fn new(
        mailbox: impl Into<String>,
        message_id: impl Into<String>,
        delivered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            mailbox: mailbox.into(),
            message_id: message_id.into(),
            delivered_at,
        }
    }

    /// Create a record delivered now.
    #[must_use]
    pub fn now(mailbox: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self::new(mailbox, message_id, Utc::now())
    }
}

const EARLIEST_TIMESTAMP: &str = "0000-01-01T00:00:00.000000Z";
const LATEST_TIMESTAMP: &str = "9999-12-31T23:59:59.999999Z";

/// Fixed-width UTC timestamp that sorts lexicographically in time order.
///
/// Instants outside years 0000-9999 are clamped to the nearest bound, since
/// their RFC 3339 form carries a sign and would break text ordering.
pub(super) fn timestamp(at: DateTime<Utc>) -> String {
    match at.year() {
        ..0 => EARLIEST_TIMESTAMP.to_string(),
        10_000.. => LATEST_TIMESTAMP.to_string(),
        _ => at.to_rfc3339_opts(SecondsFormat::Micros, true),
    }
}
