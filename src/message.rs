//! Wire records pushed by the feed server.
//!
//! Each text frame carries one JSON object:
//!
//! ```json
//! {"id": "3f2a…", "html": "<div class=\"record\" id=\"m3f2a…\">…</div>"}
//! ```
//!
//! Any other fields (the server also sends the raw record as `body`) are ignored.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{FeedError, Result};

/// Prefix joined to a message id to form its derived identifier.
pub const ID_PREFIX: &str = "m";

/// A message identifier: the server sends either a string (uuid) or an integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Number(i64),
    Text(String),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Number(n) => write!(f, "{n}"),
            MessageId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for MessageId {
    fn from(n: i64) -> Self {
        MessageId::Number(n)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        MessageId::Text(s.to_string())
    }
}

impl MessageId {
    /// Reject ids that would not survive as an element id suffix.
    pub fn validate(&self) -> Result<()> {
        match self {
            MessageId::Number(_) => Ok(()),
            MessageId::Text(s) if s.is_empty() => {
                Err(FeedError::InvalidId("empty string".into()))
            }
            MessageId::Text(s) if s.chars().any(char::is_whitespace) => {
                Err(FeedError::InvalidId(format!("'{s}' contains whitespace")))
            }
            MessageId::Text(_) => Ok(()),
        }
    }

    /// The derived identifier with an explicit prefix, e.g. `m42`.
    pub fn key_with_prefix(&self, prefix: &str) -> String {
        format!("{prefix}{self}")
    }
}

/// An HTML fragment rendered by the server.
///
/// Inserted into the inbox verbatim, without sanitization. Holding a
/// `TrustedHtml` asserts that the producer on the other end of the socket is
/// the trusted origin that rendered this markup from its own template; code
/// that builds one from any other source takes over that responsibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrustedHtml(String);

impl TrustedHtml {
    pub fn from_producer(markup: impl Into<String>) -> Self {
        TrustedHtml(markup.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// One pushed feed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub id: MessageId,
    pub html: TrustedHtml,
}

impl IncomingMessage {
    pub fn new(id: impl Into<MessageId>, html: impl Into<String>) -> Self {
        IncomingMessage {
            id: id.into(),
            html: TrustedHtml::from_producer(html),
        }
    }

    /// Parse one text frame.
    ///
    /// Fails with [`FeedError::Parse`] when the frame is not JSON or not an
    /// object carrying `id` and `html`, and with [`FeedError::InvalidId`] when
    /// the id cannot be used as an identifier suffix.
    pub fn parse(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(FeedError::Parse(format!(
                "expected a JSON object, got {}",
                json_kind(&value)
            )));
        }
        let msg: IncomingMessage = serde_json::from_value(value)?;
        msg.id.validate()?;
        Ok(msg)
    }

    /// Derived identifier using the default [`ID_PREFIX`].
    pub fn key(&self) -> String {
        self.id.key_with_prefix(ID_PREFIX)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
