//! Type-state POP3 client.

use std::marker::PhantomData;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::trace;

use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{parse_response, parse_stat, parse_uidl_line, unstuff_line};
use crate::types::{MaildropStat, Response, UidlEntry};

/// Longest accepted line, terminator included.
///
/// Status lines are limited to 512 octets, but message bodies often carry
/// longer lines, so the cap only guards against unbounded reads.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Type-state marker for the AUTHORIZATION state.
#[derive(Debug)]
pub struct Authorization;

/// Type-state marker for the TRANSACTION state.
#[derive(Debug)]
pub struct Transaction;

/// POP3 client with type-state pattern.
#[derive(Debug)]
pub struct Client<S, State> {
    stream: BufReader<S>,
    greeting: String,
    _state: PhantomData<State>,
}

impl<S, State> Client<S, State> {
    /// Returns the text of the server greeting.
    #[must_use]
    pub fn greeting(&self) -> &str {
        &self.greeting
    }
}

impl<S> Client<S, Authorization>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or the server answers `-ERR`.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut client = Self {
            stream: BufReader::new(stream),
            greeting: String::new(),
            _state: PhantomData,
        };

        let greeting = client.read_response().await?.into_result()?;
        client.greeting = greeting.text;
        Ok(client)
    }

    /// Authenticates with `USER`/`PASS` and enters the TRANSACTION state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the server rejects either command.
    pub async fn login(mut self, user: &str, password: &str) -> Result<Client<S, Transaction>> {
        let reply = self
            .send_command(&Command::User {
                name: user.to_string(),
            })
            .await?;
        if !reply.is_ok() {
            return Err(Error::Auth(reply.text));
        }

        let reply = self
            .send_command(&Command::Pass {
                password: password.to_string(),
            })
            .await?;
        if !reply.is_ok() {
            return Err(Error::Auth(reply.text));
        }

        Ok(Client {
            stream: self.stream,
            greeting: self.greeting,
            _state: PhantomData,
        })
    }
}

impl<S> Client<S, Transaction>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the message count and total size of the maildrop.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the reply is malformed.
    pub async fn stat(&mut self) -> Result<MaildropStat> {
        let reply = self.send_command(&Command::Stat).await?.into_result()?;
        parse_stat(&reply.text)
    }

    /// Lists every message with its unique id, in maildrop order.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or a listing line is malformed.
    pub async fn uidl(&mut self) -> Result<Vec<UidlEntry>> {
        self.send_command(&Command::Uidl).await?.into_result()?;
        let body = self.read_multiline().await?;

        let text = String::from_utf8_lossy(&body);
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(parse_uidl_line)
            .collect()
    }

    /// Retrieves the raw bytes of a message, with CRLF line endings.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the connection drops mid-message.
    pub async fn retr(&mut self, msg: u32) -> Result<Vec<u8>> {
        self.send_command(&Command::Retr { msg }).await?.into_result()?;
        self.read_multiline().await
    }

    /// Sends `NOOP`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn noop(&mut self) -> Result<()> {
        self.send_command(&Command::Noop).await?.into_result()?;
        Ok(())
    }
}

// Common implementation for all states
impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Sends `QUIT` and ends the session (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        self.send_command(&Command::Quit).await?.into_result()?;
        self.stream.get_mut().shutdown().await?;
        Ok(())
    }

    async fn send_command(&mut self, cmd: &Command) -> Result<Response> {
        trace!(command = ?cmd, "POP3 >>");
        let writer = self.stream.get_mut();
        writer.write_all(&cmd.serialize()).await?;
        writer.flush().await?;
        self.read_response().await
    }

    async fn read_response(&mut self) -> Result<Response> {
        let line = self.read_line().await?;
        let line = String::from_utf8_lossy(&line);
        trace!(response = %line, "POP3 <<");
        parse_response(&line)
    }

    /// Reads one CRLF-terminated line without its terminator.
    async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        let limit = u64::try_from(MAX_LINE_LENGTH).unwrap_or(u64::MAX);
        let read = (&mut self.stream)
            .take(limit)
            .read_until(b'\n', &mut line)
            .await?;
        if read == 0 {
            return Err(Error::ConnectionClosed);
        }
        if read >= MAX_LINE_LENGTH && line.last() != Some(&b'\n') {
            return Err(Error::Protocol(format!("line exceeds {MAX_LINE_LENGTH} bytes")));
        }

        while matches!(line.last(), Some(b'\n' | b'\r')) {
            line.pop();
        }
        Ok(line)
    }

    /// Reads a dot-terminated multi-line body, removing byte-stuffing.
    async fn read_multiline(&mut self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        loop {
            let line = self.read_line().await?;
            let Some(content) = unstuff_line(&line) else {
                break;
            };
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        Ok(body)
    }
}
