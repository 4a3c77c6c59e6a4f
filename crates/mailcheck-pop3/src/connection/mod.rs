//! POP3 connection management with type-state pattern.

mod client;
mod stream;

pub use client::{Authorization, Client, MAX_LINE_LENGTH, Transaction};
pub use stream::{Pop3Stream, connect, connect_plain, connect_tls, create_tls_connector};
