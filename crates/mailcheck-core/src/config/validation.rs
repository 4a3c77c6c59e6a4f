//! Configuration validation.

use std::collections::HashSet;

use super::model::{Config, LedgerConfig};

/// Validation error for the configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Check period is zero.
    ZeroCheckPeriod,
    /// Message chunk size is zero.
    ZeroChunkSize,
    /// SQL connection URL is empty.
    EmptyLedgerUrl,
    /// SQL pool size is zero.
    ZeroMaxConnections,
    /// Table or namespace name is empty or not a plain identifier.
    InvalidTableName,
    /// Mailbox user is empty.
    EmptyUser(usize),
    /// Mailbox password is empty.
    EmptyPassword(usize),
    /// Mailbox host is empty.
    EmptyHost(usize),
    /// Mailbox port is zero.
    InvalidPort(usize),
    /// Another mailbox has the same user, host and port.
    DuplicateMailbox(usize),
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::ZeroCheckPeriod => "Check period must be greater than zero",
            Self::ZeroChunkSize => "Message chunk size must be greater than zero",
            Self::EmptyLedgerUrl => "Ledger connection URL is required",
            Self::ZeroMaxConnections => "Ledger pool needs at least one connection",
            Self::InvalidTableName => "Table name must start with a letter or '_' and contain only letters, digits and '_'",
            Self::EmptyUser(_) => "Mailbox user is required",
            Self::EmptyPassword(_) => "Mailbox password is required",
            Self::EmptyHost(_) => "Mailbox host is required",
            Self::InvalidPort(_) => "Mailbox port must be 1-65535",
            Self::DuplicateMailbox(_) => "Mailbox is configured twice",
        }
    }

    /// Get the field path this error relates to.
    #[must_use]
    pub fn field(&self) -> String {
        match self {
            Self::ZeroCheckPeriod => "checkPeriodMs".to_string(),
            Self::ZeroChunkSize => "messageChunkSize".to_string(),
            Self::EmptyLedgerUrl => "ledger.url".to_string(),
            Self::ZeroMaxConnections => "ledger.maxConnections".to_string(),
            Self::InvalidTableName => "ledger.tableName".to_string(),
            Self::EmptyUser(i) => format!("mailboxes[{i}].user"),
            Self::EmptyPassword(i) => format!("mailboxes[{i}].password"),
            Self::EmptyHost(i) => format!("mailboxes[{i}].host"),
            Self::InvalidPort(i) => format!("mailboxes[{i}].port"),
            Self::DuplicateMailbox(i) => format!("mailboxes[{i}]"),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field(), self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating a configuration.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate a configuration document.
///
/// Returns `Ok(())` if valid, or `Err(Vec<ValidationError>)` with all errors.
///
/// # Errors
///
/// Returns a vector of `ValidationError` if any fields are invalid.
pub fn validate_config(config: &Config) -> ValidationResult {
    let mut errors = Vec::new();

    if config.sync.check_period.is_zero() {
        errors.push(ValidationError::ZeroCheckPeriod);
    }
    if config.sync.message_chunk_size == 0 {
        errors.push(ValidationError::ZeroChunkSize);
    }

    if let LedgerConfig::Sql {
        url,
        max_connections,
        ..
    } = &config.sync.ledger
    {
        if url.trim().is_empty() {
            errors.push(ValidationError::EmptyLedgerUrl);
        }
        if *max_connections == 0 {
            errors.push(ValidationError::ZeroMaxConnections);
        }
    }
    if !is_valid_identifier(config.sync.ledger.table_name()) {
        errors.push(ValidationError::InvalidTableName);
    }

    let mut seen = HashSet::new();
    for (i, mailbox) in config.mailboxes.iter().enumerate() {
        if mailbox.user.trim().is_empty() {
            errors.push(ValidationError::EmptyUser(i));
        }
        if mailbox.password.is_empty() {
            errors.push(ValidationError::EmptyPassword(i));
        }
        if mailbox.host.trim().is_empty() {
            errors.push(ValidationError::EmptyHost(i));
        }
        if mailbox.port == 0 {
            errors.push(ValidationError::InvalidPort(i));
        }
        if !seen.insert(mailbox.identity()) {
            errors.push(ValidationError::DuplicateMailbox(i));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::{MailboxConfig, SyncConfig};

    fn mailbox(user: &str) -> MailboxConfig {
        MailboxConfig {
            user: user.to_string(),
            password: "secret".to_string(),
            host: "pop.example.com".to_string(),
            port: 995,
            use_encryption: true,
        }
    }

    fn config() -> Config {
        Config {
            sync: SyncConfig {
                check_period: Duration::from_secs(60),
                message_chunk_size: 10,
                ledger: LedgerConfig::Sql {
                    url: "sqlite::memory:".to_string(),
                    max_connections: 1,
                    table_name: "processedmessage".to_string(),
                },
            },
            mailboxes: vec![mailbox("alice"), mailbox("bob")],
        }
    }

    #[test]
    fn test_valid_identifier() {
        assert!(is_valid_identifier("processedmessage"));
        assert!(is_valid_identifier("processed_2"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("x; DROP TABLE y"));
        assert!(!is_valid_identifier("a-b"));
        assert!(is_valid_identifier("_seen"));
        assert!(is_valid_identifier("seen1"));
        assert!(!is_valid_identifier("1seen"));
    }

    #[test]
    fn test_validate_table_name_leading_digit() {
        let mut config = config();
        config.sync.ledger = LedgerConfig::Sql {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            table_name: "1seen".to_string(),
        };

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::InvalidTableName]);
    }

    #[test]
    fn test_validate_complete_config() {
        assert!(validate_config(&config()).is_ok());
    }

    #[test]
    fn test_validate_zero_values() {
        let mut config = config();
        config.sync.check_period = Duration::ZERO;
        config.sync.message_chunk_size = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::ZeroCheckPeriod));
        assert!(errors.contains(&ValidationError::ZeroChunkSize));
    }

    #[test]
    fn test_validate_collects_every_mailbox_error() {
        let mut config = config();
        config.mailboxes[1].host = "  ".to_string();
        config.mailboxes[1].password = String::new();
        config.mailboxes[0].port = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::EmptyHost(1)));
        assert!(errors.contains(&ValidationError::EmptyPassword(1)));
        assert!(errors.contains(&ValidationError::InvalidPort(0)));
        assert_eq!(
            ValidationError::EmptyHost(1).to_string(),
            "mailboxes[1].host: Mailbox host is required"
        );
    }

    #[test]
    fn test_validate_duplicate_mailbox() {
        let mut config = config();
        config.mailboxes.push(mailbox("alice"));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::DuplicateMailbox(2)]);
    }

    #[test]
    fn test_validate_ledger_settings() {
        let mut config = config();
        config.sync.ledger = LedgerConfig::Sql {
            url: String::new(),
            max_connections: 0,
            table_name: "bad name".to_string(),
        };

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::EmptyLedgerUrl));
        assert!(errors.contains(&ValidationError::ZeroMaxConnections));
        assert!(errors.contains(&ValidationError::InvalidTableName));
    }
}
