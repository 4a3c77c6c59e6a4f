//! # mailcheck-core
//!
//! Mailbox synchronization engine for `mailcheck`.
//!
//! This crate provides:
//! - Configuration loading and validation
//! - A durable **delivery ledger** (`SQLite` table or JSON document)
//! - A mailbox session abstraction with a POP3 implementation
//! - The per-mailbox **sync cycle**: list, filter against the ledger, then
//!   fetch and parse a bounded chunk of new messages
//! - A staggered per-mailbox **scheduler**
//! - **Unprocess**: forget deliveries in a date range so they are delivered again

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
mod error;
pub mod ledger;
pub mod parse;
pub mod scheduler;
pub mod session;
pub mod sync;

pub use config::{
    Config, LedgerConfig, MailboxConfig, MailboxIdentity, SyncConfig, ValidationError,
    ValidationResult, validate_config,
};
pub use engine::{MailChecker, SyncEvent};
pub use error::{Error, Result};
pub use ledger::{
    DeliveryLedger, DeliveryRecord, DocumentLedger, LedgerError, SqlLedger, open_ledger,
};
pub use parse::{Attachment, MessageParser, MimeParser, ParseError, ParsedMessage};
pub use scheduler::Scheduler;
pub use session::{
    MailboxSession, MemoryConnector, MemoryMailbox, Pop3Connector, ServerMessageRef,
    SessionConnector, SessionError,
};
pub use sync::{CycleState, CycleSummary, SyncCycle};
