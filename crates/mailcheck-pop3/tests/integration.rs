//! Integration tests for the POP3 client.
//!
//! These tests use a mock stream to simulate POP3 server responses
//! without requiring a real server connection.

#![allow(clippy::unwrap_used)]

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use mailcheck_pop3::parser::{parse_response, parse_stat, parse_uidl_line};
use mailcheck_pop3::{Client, Error, Status};

/// Mock stream that returns predefined responses.
struct MockStream {
    /// Responses to return (in order).
    responses: Cursor<Vec<u8>>,
    /// Captured commands sent by the client.
    sent: Arc<Mutex<Vec<u8>>>,
}

impl MockStream {
    fn new(responses: &[u8]) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let stream = Self {
            responses: Cursor::new(responses.to_vec()),
            sent: Arc::clone(&sent),
        };
        (stream, sent)
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let data = self.responses.get_ref();
        let pos = usize::try_from(self.responses.position()).unwrap();

        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let remaining = &data[pos..];
        let to_read = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..to_read]);
        self.responses.set_position((pos + to_read) as u64);

        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.sent.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn sent_text(sent: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8(sent.lock().unwrap().clone()).unwrap()
}

#[test]
fn test_parser_ok_response() {
    let response = parse_response("+OK 2 messages (320 octets)").unwrap();
    assert_eq!(response.status, Status::Ok);
    assert_eq!(response.text, "2 messages (320 octets)");
}

#[test]
fn test_parser_stat_and_uidl() {
    let stat = parse_stat("2 320").unwrap();
    assert_eq!(stat.count, 2);
    assert_eq!(stat.size, 320);

    let entry = parse_uidl_line("1 whqtswO00WBw418f9t5JxYwZ").unwrap();
    assert_eq!(entry.message_number, 1);
    assert_eq!(entry.unique_id, "whqtswO00WBw418f9t5JxYwZ");
}

#[tokio::test]
async fn test_full_session() {
    let (stream, sent) = MockStream::new(
        b"+OK POP3 server ready\r\n\
          +OK\r\n\
          +OK maildrop locked\r\n\
          +OK 2 320\r\n\
          +OK\r\n\
          1 whqtswO00WBw418f9t5JxYwZ\r\n\
          2 QhdPYR:00WBw1Ph7x7\r\n\
          .\r\n\
          +OK 120 octets\r\n\
          Subject: hi\r\n\
          \r\n\
          ..leading dot\r\n\
          .\r\n\
          +OK bye\r\n",
    );

    let client = Client::from_stream(stream).await.unwrap();
    assert_eq!(client.greeting(), "POP3 server ready");

    let mut client = client.login("alice", "s3cret").await.unwrap();
    assert_eq!(client.stat().await.unwrap().count, 2);

    let listing = client.uidl().await.unwrap();
    assert_eq!(listing.len(), 2);
    assert_eq!(listing[1].message_number, 2);
    assert_eq!(listing[1].unique_id, "QhdPYR:00WBw1Ph7x7");

    let raw = client.retr(1).await.unwrap();
    assert_eq!(raw, b"Subject: hi\r\n\r\n.leading dot\r\n");

    client.quit().await.unwrap();

    assert_eq!(
        sent_text(&sent),
        "USER alice\r\nPASS s3cret\r\nSTAT\r\nUIDL\r\nRETR 1\r\nQUIT\r\n"
    );
}

#[tokio::test]
async fn test_login_rejected() {
    let (stream, _sent) = MockStream::new(
        b"+OK ready\r\n\
          +OK\r\n\
          -ERR invalid password\r\n",
    );

    let client = Client::from_stream(stream).await.unwrap();
    let result = client.login("alice", "wrong").await;
    assert!(matches!(result, Err(Error::Auth(_))));
}

#[tokio::test]
async fn test_retr_error_reply() {
    let (stream, _sent) = MockStream::new(
        b"+OK ready\r\n\
          +OK\r\n\
          +OK\r\n\
          -ERR no such message\r\n",
    );

    let client = Client::from_stream(stream).await.unwrap();
    let mut client = client.login("alice", "pw").await.unwrap();
    let result = client.retr(9).await;
    assert!(matches!(result, Err(Error::Server { .. })));
}

#[tokio::test]
async fn test_connection_dropped_mid_message() {
    let (stream, _sent) = MockStream::new(
        b"+OK ready\r\n\
          +OK\r\n\
          +OK\r\n\
          +OK\r\n\
          Subject: cut\r\n",
    );

    let client = Client::from_stream(stream).await.unwrap();
    let mut client = client.login("alice", "pw").await.unwrap();
    let result = client.retr(1).await;
    assert!(matches!(result, Err(Error::ConnectionClosed)));
}
