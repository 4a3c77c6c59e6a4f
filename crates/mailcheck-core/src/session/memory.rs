//! In-process mailbox server.
//!
//! [`MemoryMailbox`] holds messages and failure switches; [`MemoryConnector`]
//! opens sessions against it. Like POP3, a session numbers messages at open
//! time and that numbering is fixed for the life of the session.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{MailboxSession, ServerMessageRef, SessionConnector, SessionError, SessionResult};
use crate::config::{MailboxConfig, MailboxIdentity};

#[derive(Debug, Default)]
struct MailboxState {
    messages: Vec<(String, Vec<u8>)>,
    fail_open: bool,
    fail_list: bool,
    fail_close: bool,
    hang_open: bool,
    fail_fetch: HashSet<String>,
    fetch_log: Vec<String>,
    opened: usize,
    closed: usize,
}

/// Shared handle to one in-memory mailbox.
#[derive(Debug, Clone, Default)]
pub struct MemoryMailbox {
    state: Arc<Mutex<MailboxState>>,
}

impl MemoryMailbox {
    /// Create an empty mailbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MailboxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a message to the end of the mailbox.
    pub fn push(&self, unique_id: impl Into<String>, raw: impl Into<Vec<u8>>) {
        self.state().messages.push((unique_id.into(), raw.into()));
    }

    /// Remove a message; sessions opened afterwards no longer list it.
    pub fn remove(&self, unique_id: &str) {
        self.state().messages.retain(|(id, _)| id != unique_id);
    }

    /// Make `open` fail with a connection error.
    pub fn set_fail_open(&self, fail: bool) {
        self.state().fail_open = fail;
    }

    /// Make `open` never complete.
    pub fn set_hang_open(&self, hang: bool) {
        self.state().hang_open = hang;
    }

    /// Make `list` fail.
    pub fn set_fail_list(&self, fail: bool) {
        self.state().fail_list = fail;
    }

    /// Make `close` fail.
    pub fn set_fail_close(&self, fail: bool) {
        self.state().fail_close = fail;
    }

    /// Make fetching `unique_id` fail.
    pub fn fail_fetch(&self, unique_id: impl Into<String>) {
        self.state().fail_fetch.insert(unique_id.into());
    }

    /// Unique ids fetched so far, in call order.
    #[must_use]
    pub fn fetch_log(&self) -> Vec<String> {
        self.state().fetch_log.clone()
    }

    /// Number of sessions successfully opened.
    #[must_use]
    pub fn sessions_opened(&self) -> usize {
        self.state().opened
    }

    /// Number of `close` calls received.
    #[must_use]
    pub fn sessions_closed(&self) -> usize {
        self.state().closed
    }
}

/// Connector resolving mailbox identities to [`MemoryMailbox`]es.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    mailboxes: Mutex<HashMap<MailboxIdentity, MemoryMailbox>>,
}

impl MemoryConnector {
    /// Create a connector with no mailboxes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `mailbox` for `identity`.
    pub fn insert(&self, identity: &MailboxIdentity, mailbox: MemoryMailbox) {
        self.mailboxes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.clone(), mailbox);
    }
}

#[async_trait]
impl SessionConnector for MemoryConnector {
    async fn open(&self, mailbox: &MailboxConfig) -> SessionResult<Box<dyn MailboxSession>> {
        let identity = mailbox.identity();
        let server = self
            .mailboxes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&identity)
            .cloned()
            .ok_or_else(|| SessionError::Connection(format!("no such mailbox: {identity}")))?;

        let hang = server.state().hang_open;
        if hang {
            std::future::pending::<()>().await;
        }

        let snapshot = {
            let mut state = server.state();
            if state.fail_open {
                return Err(SessionError::Connection("connection refused".to_string()));
            }
            state.opened += 1;
            state.messages.clone()
        };

        Ok(Box::new(MemorySession {
            server,
            snapshot,
            closed: Mutex::new(false),
        }))
    }
}

struct MemorySession {
    server: MemoryMailbox,
    snapshot: Vec<(String, Vec<u8>)>,
    closed: Mutex<bool>,
}

impl MemorySession {
    fn ensure_open(&self) -> SessionResult<()> {
        if *self.closed.lock().unwrap_or_else(PoisonError::into_inner) {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MailboxSession for MemorySession {
    async fn list(&self) -> SessionResult<Vec<ServerMessageRef>> {
        self.ensure_open()?;
        if self.server.state().fail_list {
            return Err(SessionError::Operation("listing failed".to_string()));
        }
        Ok(self
            .snapshot
            .iter()
            .zip(1..)
            .map(|((id, _), n)| ServerMessageRef::new(n, id.clone()))
            .collect())
    }

    async fn fetch(&self, retrieve_id: u32) -> SessionResult<Vec<u8>> {
        self.ensure_open()?;
        let index = usize::try_from(retrieve_id)
            .ok()
            .and_then(|n| n.checked_sub(1))
            .ok_or_else(|| SessionError::Operation(format!("no such message: {retrieve_id}")))?;
        let (id, raw) = self
            .snapshot
            .get(index)
            .ok_or_else(|| SessionError::Operation(format!("no such message: {retrieve_id}")))?;

        let mut state = self.server.state();
        state.fetch_log.push(id.clone());
        if state.fail_fetch.contains(id) {
            return Err(SessionError::Operation(format!("retrieve failed: {id}")));
        }
        Ok(raw.clone())
    }

    async fn close(&self) -> SessionResult<()> {
        {
            let mut closed = self.closed.lock().unwrap_or_else(PoisonError::into_inner);
            if *closed {
                return Err(SessionError::Closed);
            }
            *closed = true;
        }
        let mut state = self.server.state();
        state.closed += 1;
        if state.fail_close {
            return Err(SessionError::Connection("connection reset".to_string()));
        }
        Ok(())
    }
}
