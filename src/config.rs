//! Feed configuration, loaded from TOML.
//!
//! ```toml
//! host = "beer.example.org"
//! secure = true
//! parse_policy = "strict"
//! ```
//!
//! Every key is optional; missing keys fall back to the page defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::endpoint::{PageLocation, SOCKET_PATH};
use crate::error::{FeedError, Result};
use crate::feed::ParsePolicy;
use crate::message::ID_PREFIX;

/// Element id of the inbox container on the page.
pub const INBOX_ELEMENT_ID: &str = "inbox";
/// Element id of the compose input focused at startup.
pub const INPUT_ELEMENT_ID: &str = "message";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
    /// Host (and optional port) the page was served from.
    pub host: String,
    /// Whether the page was served over TLS; selects `wss` over `ws`.
    pub secure: bool,
    pub path: String,
    pub inbox_id: String,
    pub input_id: String,
    pub id_prefix: String,
    pub parse_policy: ParsePolicy,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            host: "localhost:3001".to_string(),
            secure: false,
            path: SOCKET_PATH.to_string(),
            inbox_id: INBOX_ELEMENT_ID.to_string(),
            input_id: INPUT_ELEMENT_ID.to_string(),
            id_prefix: ID_PREFIX.to_string(),
            parse_policy: ParsePolicy::default(),
        }
    }
}

impl FeedConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: FeedConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            FeedError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id_prefix.is_empty() {
            return Err(FeedError::Config("id_prefix must not be empty".into()));
        }
        if self.inbox_id.is_empty() || self.input_id.is_empty() {
            return Err(FeedError::Config("element ids must not be empty".into()));
        }
        Ok(())
    }

    pub fn location(&self) -> PageLocation {
        PageLocation::new(self.host.clone(), self.secure)
    }

    pub fn endpoint(&self) -> Result<String> {
        self.location().endpoint_with_path(&self.path)
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_page_constants() {
        let c = FeedConfig::default();
        assert_eq!(c.path, "/beersocket");
        assert_eq!(c.inbox_id, "inbox");
        assert_eq!(c.input_id, "message");
        assert_eq!(c.id_prefix, "m");
        assert_eq!(c.parse_policy, ParsePolicy::Lenient);
        assert_eq!(c.endpoint().unwrap(), "ws://localhost:3001/beersocket");
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(FeedConfig::from_toml_str("").unwrap(), FeedConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let c = FeedConfig::from_toml_str(
            "host = \"example.com\"\nsecure = true\nparse_policy = \"strict\"\n",
        )
        .unwrap();
        assert_eq!(c.endpoint().unwrap(), "wss://example.com/beersocket");
        assert_eq!(c.parse_policy, ParsePolicy::Strict);
        assert_eq!(c.inbox_id, "inbox");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = FeedConfig::from_toml_str("hots = \"typo\"").unwrap_err();
        assert!(matches!(err, FeedError::Config(_)));
    }

    #[test]
    fn test_empty_prefix_rejected() {
        assert!(FeedConfig::from_toml_str("id_prefix = \"\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host = \"10.0.0.5:8080\"").unwrap();
        let c = FeedConfig::load(file.path()).unwrap();
        assert_eq!(c.endpoint().unwrap(), "ws://10.0.0.5:8080/beersocket");
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FeedConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }
}
