//! Error types for the synchronization engine.

use std::sync::Arc;

use thiserror::Error;

use crate::config::ValidationError;
use crate::ledger::LedgerError;
use crate::parse::ParseError;
use crate::session::SessionError;
use crate::sync::CycleState;

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Startup options are invalid. Fatal: the engine does not start.
    #[error("Invalid configuration: {}", join_errors(.0))]
    Configuration(Vec<ValidationError>),

    /// Session open, list or fetch failed. Aborts the current cycle only.
    #[error("Transport error while {stage}: {source}")]
    Transport {
        /// Cycle state in which the failure happened.
        stage: CycleState,
        /// Underlying session failure.
        #[source]
        source: SessionError,
    },

    /// A single message could not be decoded.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The ledger could not be queried.
    #[error("Ledger read failed: {0}")]
    LedgerRead(#[source] LedgerError),

    /// A delivery record could not be written.
    #[error("Ledger write failed: {0}")]
    LedgerWrite(#[source] LedgerError),

    /// The ledger could not be opened, or its table or namespace created.
    #[error("Ledger schema setup failed: {0}")]
    Schema(#[source] LedgerError),

    /// An unprocess request failed.
    #[error("Unprocess failed: {0}")]
    Unprocess(Arc<Error>),

    /// No configured mailbox matches the request.
    #[error("Unknown mailbox: {0}")]
    UnknownMailbox(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
