//! POP3 status responses.

use crate::error::{Error, Result};

/// Status indicator that starts every POP3 response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `+OK`
    Ok,
    /// `-ERR`
    Err,
}

/// First line of a POP3 response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Positive or negative status.
    pub status: Status,
    /// Text after the status indicator (may be empty).
    pub text: String,
}

impl Response {
    /// Creates a new response.
    #[must_use]
    pub fn new(status: Status, text: impl Into<String>) -> Self {
        Self {
            status,
            text: text.into(),
        }
    }

    /// Returns true if this is a `+OK` response.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Converts a `-ERR` response into [`Error::Server`].
    ///
    /// # Errors
    ///
    /// Returns an error if the status is `-ERR`.
    pub fn into_result(self) -> Result<Self> {
        match self.status {
            Status::Ok => Ok(self),
            Status::Err => Err(Error::server(self.text)),
        }
    }
}
