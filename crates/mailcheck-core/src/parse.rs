//! Message decoding.
//!
//! The engine does not interpret message contents; it hands raw bytes to a
//! [`MessageParser`] and forwards the [`ParsedMessage`] to the application.

use mail_parser::{Address, MimeHeaders};
use serde::{Deserialize, Serialize};

/// A raw message could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to parse message: {0}")]
pub struct ParseError(pub String);

/// Attachment metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Filename, if the part names one.
    pub filename: Option<String>,
    /// MIME type, e.g. `application/pdf`.
    pub mime_type: String,
    /// Decoded size in bytes.
    pub size: usize,
}

/// Structured result of decoding a raw message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedMessage {
    /// `Message-ID` header.
    pub message_id: Option<String>,
    /// Subject.
    pub subject: Option<String>,
    /// Sender addresses.
    pub from: Vec<String>,
    /// Recipient addresses.
    pub to: Vec<String>,
    /// CC addresses.
    pub cc: Vec<String>,
    /// `Date` header in RFC 3339 form.
    pub date: Option<String>,
    /// First plain text body.
    pub text_body: Option<String>,
    /// First HTML body.
    pub html_body: Option<String>,
    /// Raw header fields, in message order.
    pub headers: Vec<(String, String)>,
    /// Attachments.
    pub attachments: Vec<Attachment>,
}

/// Decodes raw message bytes.
pub trait MessageParser: Send + Sync {
    /// Decode one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a decodable message.
    fn parse(&self, raw: &[u8]) -> Result<ParsedMessage, ParseError>;
}

/// MIME decoder backed by `mail-parser`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MimeParser;

impl MessageParser for MimeParser {
    fn parse(&self, raw: &[u8]) -> Result<ParsedMessage, ParseError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(ParseError("empty message".to_string()));
        }

        let message = mail_parser::MessageParser::default()
            .parse(raw)
            .ok_or_else(|| ParseError("not a MIME message".to_string()))?;

        let headers: Vec<(String, String)> = message
            .headers_raw()
            .map(|(name, value)| (name.to_string(), value.trim().to_string()))
            .collect();
        if headers.is_empty() {
            return Err(ParseError("message has no header fields".to_string()));
        }

        let attachments = message
            .attachments()
            .map(|part| Attachment {
                filename: part.attachment_name().map(ToString::to_string),
                mime_type: part.content_type().map_or_else(
                    || "application/octet-stream".to_string(),
                    |ct| match ct.subtype() {
                        Some(subtype) => format!("{}/{subtype}", ct.ctype()),
                        None => ct.ctype().to_string(),
                    },
                ),
                size: part.contents().len(),
            })
            .collect();

        Ok(ParsedMessage {
            message_id: message.message_id().map(ToString::to_string),
            subject: message.subject().map(ToString::to_string),
            from: format_addresses(message.from()),
            to: format_addresses(message.to()),
            cc: format_addresses(message.cc()),
            date: message.date().map(mail_parser::DateTime::to_rfc3339),
            text_body: message.body_text(0).map(|body| body.into_owned()),
            html_body: message.body_html(0).map(|body| body.into_owned()),
            headers,
            attachments,
        })
    }
}

/// Flatten an address header (lists and groups) into display strings.
fn format_addresses(address: Option<&Address<'_>>) -> Vec<String> {
    let Some(address) = address else {
        return Vec::new();
    };

    let addrs: Vec<&mail_parser::Addr<'_>> = match (address.as_list(), address.as_group()) {
        (Some(list), _) => list.iter().collect(),
        (None, Some(groups)) => groups.iter().flat_map(|g| g.addresses.iter()).collect(),
        (None, None) => Vec::new(),
    };

    addrs
        .into_iter()
        .filter_map(|addr| match (addr.name.as_deref(), addr.address.as_deref()) {
            (Some(name), Some(email)) if !name.is_empty() => Some(format!("{name} <{email}>")),
            (_, Some(email)) => Some(email.to_string()),
            (Some(name), None) => Some(name.to_string()),
            (None, None) => None,
        })
        .collect()
}
