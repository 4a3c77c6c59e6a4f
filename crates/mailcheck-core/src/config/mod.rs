//! Process-wide configuration.
//!
//! Loaded once from a JSON document and validated before the engine starts.

mod model;
mod validation;

pub use model::{Config, LedgerConfig, MailboxConfig, MailboxIdentity, SyncConfig};
pub use validation::{ValidationError, ValidationResult, validate_config};

/// Default ledger table / namespace name.
pub const DEFAULT_TABLE_NAME: &str = "processedmessage";
