//! Mailbox sessions.
//!
//! A session is a live connection to one remote mailbox, opened at the start
//! of a cycle and closed exactly once at its end. The engine only needs
//! three capabilities from it: list, fetch and close.

mod memory;
mod pop3;

use async_trait::async_trait;

use crate::config::MailboxConfig;

pub use memory::{MemoryConnector, MemoryMailbox};
pub use pop3::{Pop3Connector, Pop3Session};

/// Errors that can occur while talking to the mail server.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Operation failed.
    #[error("Operation failed: {0}")]
    Operation(String),

    /// The session was already closed.
    #[error("Session already closed")]
    Closed,
}

/// Result type alias for session operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// A message as reported by one `list` call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerMessageRef {
    /// Session-local handle used to fetch the message.
    pub retrieve_id: u32,
    /// Stable identifier used for deduplication.
    pub unique_id: String,
}

impl ServerMessageRef {
    /// Create a new reference.
    #[must_use]
    pub fn new(retrieve_id: u32, unique_id: impl Into<String>) -> Self {
        Self {
            retrieve_id,
            unique_id: unique_id.into(),
        }
    }
}

/// An open session with a remote mailbox.
///
/// Methods take `&self` so chunk members can be awaited concurrently;
/// implementations serialize wire access internally when needed.
#[async_trait]
pub trait MailboxSession: Send + Sync {
    /// List every message currently on the server, in server order.
    async fn list(&self) -> SessionResult<Vec<ServerMessageRef>>;

    /// Retrieve the raw bytes of one message.
    async fn fetch(&self, retrieve_id: u32) -> SessionResult<Vec<u8>>;

    /// Terminate the session. Called exactly once per opened session.
    async fn close(&self) -> SessionResult<()>;
}

/// Opens sessions for configured mailboxes.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Connect and authenticate.
    async fn open(&self, mailbox: &MailboxConfig) -> SessionResult<Box<dyn MailboxSession>>;
}
