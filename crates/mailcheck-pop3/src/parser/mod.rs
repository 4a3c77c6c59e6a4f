//! POP3 response parser.

use crate::error::{Error, Result};
use crate::types::{MaildropStat, Response, Status, UidlEntry};

/// Parses the status line of a POP3 response.
///
/// - Positive: `+OK maildrop ready`
/// - Negative: `-ERR no such message`
///
/// # Errors
///
/// Returns an error if the line starts with neither indicator.
pub fn parse_response(line: &str) -> Result<Response> {
    let (status, rest) = if let Some(rest) = line.strip_prefix("+OK") {
        (Status::Ok, rest)
    } else if let Some(rest) = line.strip_prefix("-ERR") {
        (Status::Err, rest)
    } else {
        return Err(Error::Protocol(format!("Unexpected status line: {line}")));
    };

    if !rest.is_empty() && !rest.starts_with(' ') {
        return Err(Error::Protocol(format!("Malformed status line: {line}")));
    }

    Ok(Response::new(status, rest.trim()))
}

/// Parses one line of a multi-line `UIDL` response (`<msg> <unique-id>`).
///
/// # Errors
///
/// Returns an error if the message number or unique id is missing or invalid.
pub fn parse_uidl_line(line: &str) -> Result<UidlEntry> {
    let mut parts = line.split_whitespace();
    let number = parts
        .next()
        .ok_or_else(|| Error::Protocol("Empty UIDL line".into()))?;
    let message_number = number
        .parse::<u32>()
        .map_err(|_| Error::Protocol(format!("Invalid message number: {number}")))?;
    let unique_id = parts
        .next()
        .ok_or_else(|| Error::Protocol(format!("Missing unique id: {line}")))?;

    Ok(UidlEntry {
        message_number,
        unique_id: unique_id.to_string(),
    })
}

/// Parses the text of a `+OK` reply to `STAT` (`<count> <octets>`).
///
/// # Errors
///
/// Returns an error if either number is missing or invalid.
pub fn parse_stat(text: &str) -> Result<MaildropStat> {
    let mut parts = text.split_whitespace();
    let count = parts
        .next()
        .and_then(|n| n.parse::<u32>().ok())
        .ok_or_else(|| Error::Protocol(format!("Invalid STAT reply: {text}")))?;
    let size = parts
        .next()
        .and_then(|n| n.parse::<u64>().ok())
        .ok_or_else(|| Error::Protocol(format!("Invalid STAT reply: {text}")))?;

    Ok(MaildropStat { count, size })
}

/// Removes byte-stuffing from a line of a multi-line response.
///
/// Returns `None` for the terminating `.` line.
#[must_use]
pub fn unstuff_line(line: &[u8]) -> Option<&[u8]> {
    match line {
        b"." => None,
        [b'.', rest @ ..] => Some(rest),
        _ => Some(line),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ok_response() {
        let response = parse_response("+OK POP3 server ready").unwrap();
        assert!(response.is_ok());
        assert_eq!(response.text, "POP3 server ready");
    }

    #[test]
    fn test_parse_bare_ok() {
        let response = parse_response("+OK").unwrap();
        assert!(response.is_ok());
        assert!(response.text.is_empty());
    }

    #[test]
    fn test_parse_err_response() {
        let response = parse_response("-ERR no such message").unwrap();
        assert_eq!(response.status, Status::Err);
        let err = response.into_result().unwrap_err();
        assert!(matches!(err, Error::Server { ref message } if message == "no such message"));
    }

    #[test]
    fn test_parse_garbage_status() {
        assert!(parse_response("* OK imap").is_err());
        assert!(parse_response("+OKAY").is_err());
    }

    #[test]
    fn test_parse_uidl_line() {
        let entry = parse_uidl_line("2 QhdPYR:00WBw1Ph7x7").unwrap();
        assert_eq!(entry.message_number, 2);
        assert_eq!(entry.unique_id, "QhdPYR:00WBw1Ph7x7");
    }

    #[test]
    fn test_parse_uidl_line_errors() {
        assert!(parse_uidl_line("").is_err());
        assert!(parse_uidl_line("x abc").is_err());
        assert!(parse_uidl_line("3").is_err());
    }

    #[test]
    fn test_parse_stat() {
        let stat = parse_stat("2 320").unwrap();
        assert_eq!(stat, MaildropStat { count: 2, size: 320 });
        assert!(parse_stat("two").is_err());
    }

    #[test]
    fn test_unstuff_line() {
        assert_eq!(unstuff_line(b"."), None);
        assert_eq!(unstuff_line(b"..hidden"), Some(&b".hidden"[..]));
        assert_eq!(unstuff_line(b"plain"), Some(&b"plain"[..]));
        assert_eq!(unstuff_line(b""), Some(&b""[..]));
    }
}
