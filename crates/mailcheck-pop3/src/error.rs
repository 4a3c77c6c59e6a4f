//! Error types for POP3 operations.

use std::io;

/// Result type alias for POP3 operations.
pub type Result<T> = std::result::Result<T, Error>;

/// POP3 error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Server answered with `-ERR`.
    #[error("POP3 server error: {message}")]
    Server {
        /// Text following the `-ERR` indicator.
        message: String,
    },

    /// Server rejected the credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Protocol error (unexpected or malformed response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Connection closed by the server mid-response.
    #[error("Connection closed by server")]
    ConnectionClosed,
}

impl Error {
    /// Creates a server error from the text of a `-ERR` reply.
    #[must_use]
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Returns true if the failure came from the network rather than the server's answer.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Tls(_) | Self::InvalidDnsName(_) | Self::ConnectionClosed
        )
    }
}
