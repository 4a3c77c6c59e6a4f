//! Maildrop listing types.

/// One line of a `UIDL` listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UidlEntry {
    /// Session-local message number, valid only until `QUIT`.
    pub message_number: u32,
    /// Server-assigned unique id, stable across sessions.
    pub unique_id: String,
}

/// Result of `STAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaildropStat {
    /// Number of messages in the maildrop.
    pub count: u32,
    /// Total size in octets.
    pub size: u64,
}
