//! # mailcheck-pop3
//!
//! An async POP3 client library implementing RFC 1939.
//!
//! ## Features
//!
//! - **Type-state connection management**: `USER`/`PASS` must succeed before
//!   any maildrop command is available
//! - **Maildrop commands**: STAT, UIDL, RETR, NOOP, QUIT
//! - **TLS support**: implicit TLS (port 995) via rustls
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailcheck_pop3::{Client, connection::connect_tls};
//!
//! #[tokio::main]
//! async fn main() -> mailcheck_pop3::Result<()> {
//!     let stream = connect_tls("pop.example.com", 995).await?;
//!     let client = Client::from_stream(stream).await?;
//!     let mut client = client.login("user@example.com", "password").await?;
//!
//!     for entry in client.uidl().await? {
//!         let raw = client.retr(entry.message_number).await?;
//!         println!("{} is {} bytes", entry.unique_id, raw.len());
//!     }
//!
//!     client.quit().await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌───────────────┐
//! │ Authorization │ ─── login() ───→ Transaction ─── quit() ───→ (closed)
//! └───────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{Authorization, Client, MAX_LINE_LENGTH, Pop3Stream, Transaction};
pub use error::{Error, Result};
pub use types::{MaildropStat, Response, Status, UidlEntry};
