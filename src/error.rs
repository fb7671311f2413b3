//! Crate-level error type.

use thiserror::Error;

/// Everything that can go wrong between the socket and the inbox.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Payload was not valid JSON, or not an object with `id` and `html`.
    #[error("malformed payload: {0}")]
    Parse(String),

    /// The `id` field cannot be used as a DOM identifier suffix.
    #[error("invalid message id: {0}")]
    InvalidId(String),

    /// The page location could not be turned into a socket endpoint.
    #[error("invalid endpoint: {0}")]
    Endpoint(String),

    /// The WebSocket handshake failed.
    #[error("connection to {url} failed: {detail}")]
    Connect { url: String, detail: String },

    /// The transport failed after the connection was open.
    #[error("transport error: {0}")]
    Transport(String),

    /// The inbox refused a mutation.
    #[error("render failed for '{key}': {detail}")]
    Render { key: String, detail: String },

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for FeedError {
    fn from(e: serde_json::Error) -> Self {
        FeedError::Parse(e.to_string())
    }
}

impl From<toml::de::Error> for FeedError {
    fn from(e: toml::de::Error) -> Self {
        FeedError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let e = FeedError::Parse("expected object".into());
        assert_eq!(e.to_string(), "malformed payload: expected object");
    }

    #[test]
    fn test_connect_error_display_names_url() {
        let e = FeedError::Connect {
            url: "ws://example.com/beersocket".into(),
            detail: "refused".into(),
        };
        assert!(e.to_string().contains("ws://example.com/beersocket"));
        assert!(e.to_string().contains("refused"));
    }

    #[test]
    fn test_from_serde_json_error_is_parse() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(FeedError::from(err), FeedError::Parse(_)));
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e: FeedError = io.into();
        assert!(matches!(e, FeedError::Io(_)));
        assert_eq!(e.to_string(), "gone");
    }
}
