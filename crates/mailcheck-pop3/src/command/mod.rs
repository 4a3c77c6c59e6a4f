//! POP3 command builder.

use std::fmt;

/// POP3 command.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// USER - Identify the mailbox
    User {
        /// Mailbox name
        name: String,
    },
    /// PASS - Mailbox password
    Pass {
        /// Password (never logged)
        password: String,
    },
    /// STAT - Maildrop message count and size
    Stat,
    /// UIDL - Unique-id listing for every message
    Uidl,
    /// RETR - Retrieve a message by its session number
    Retr {
        /// Message number
        msg: u32,
    },
    /// NOOP - No operation
    Noop,
    /// QUIT - End the session
    Quit,
}

impl Command {
    /// Serializes the command to bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        match self {
            Self::User { name } => {
                buf.extend_from_slice(b"USER ");
                buf.extend_from_slice(name.as_bytes());
            }
            Self::Pass { password } => {
                buf.extend_from_slice(b"PASS ");
                buf.extend_from_slice(password.as_bytes());
            }
            Self::Stat => buf.extend_from_slice(b"STAT"),
            Self::Uidl => buf.extend_from_slice(b"UIDL"),
            Self::Retr { msg } => {
                buf.extend_from_slice(format!("RETR {msg}").as_bytes());
            }
            Self::Noop => buf.extend_from_slice(b"NOOP"),
            Self::Quit => buf.extend_from_slice(b"QUIT"),
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Returns true if the server answers this command with a multi-line response.
    #[must_use]
    pub const fn is_multiline(&self) -> bool {
        matches!(self, Self::Uidl | Self::Retr { .. })
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User { name } => write!(f, "USER {name}"),
            Self::Pass { .. } => f.write_str("PASS ****"),
            Self::Stat => f.write_str("STAT"),
            Self::Uidl => f.write_str("UIDL"),
            Self::Retr { msg } => write!(f, "RETR {msg}"),
            Self::Noop => f.write_str("NOOP"),
            Self::Quit => f.write_str("QUIT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_command() {
        let cmd = Command::User {
            name: "alice".to_string(),
        };
        assert_eq!(cmd.serialize(), b"USER alice\r\n");
    }

    #[test]
    fn test_retr_command() {
        let cmd = Command::Retr { msg: 17 };
        assert_eq!(cmd.serialize(), b"RETR 17\r\n");
        assert!(cmd.is_multiline());
    }

    #[test]
    fn test_pass_is_redacted_in_debug() {
        let cmd = Command::Pass {
            password: "hunter2".to_string(),
        };
        assert_eq!(cmd.serialize(), b"PASS hunter2\r\n");
        assert_eq!(format!("{cmd:?}"), "PASS ****");
    }

    #[test]
    fn test_single_line_commands() {
        assert_eq!(Command::Stat.serialize(), b"STAT\r\n");
        assert_eq!(Command::Noop.serialize(), b"NOOP\r\n");
        assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
        assert!(!Command::Stat.is_multiline());
        assert!(Command::Uidl.is_multiline());
    }
}
