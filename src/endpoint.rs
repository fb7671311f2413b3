//! Socket endpoint derivation from the page location.
//!
//! The endpoint is `<ws|wss>://<host>/beersocket`: the host comes live from the
//! page, the scheme mirrors the page's transport security, the path is fixed.

use std::fmt;

use crate::error::{FeedError, Result};

/// Fixed path of the feed socket on the page's host.
pub const SOCKET_PATH: &str = "/beersocket";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Ws,
    Wss,
}

impl Scheme {
    /// Map a page protocol (`http:` / `https:`, colon optional) to a socket scheme.
    pub fn for_page_protocol(protocol: &str) -> Result<Self> {
        match protocol.trim_end_matches(':').to_ascii_lowercase().as_str() {
            "http" => Ok(Scheme::Ws),
            "https" => Ok(Scheme::Wss),
            other => Err(FeedError::Endpoint(format!(
                "unsupported page protocol '{other}'"
            ))),
        }
    }

    pub fn for_security(secure: bool) -> Self {
        if secure {
            Scheme::Wss
        } else {
            Scheme::Ws
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Ws => write!(f, "ws"),
            Scheme::Wss => write!(f, "wss"),
        }
    }
}

/// The parts of the browser location the endpoint depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    /// `host` in the browser sense: hostname plus optional `:port`.
    pub host: String,
    pub secure: bool,
}

impl PageLocation {
    pub fn new(host: impl Into<String>, secure: bool) -> Self {
        PageLocation {
            host: host.into(),
            secure,
        }
    }

    /// Build from `location.protocol` and `location.host`.
    pub fn from_parts(protocol: &str, host: &str) -> Result<Self> {
        let scheme = Scheme::for_page_protocol(protocol)?;
        Ok(PageLocation::new(host, scheme == Scheme::Wss))
    }

    pub fn scheme(&self) -> Scheme {
        Scheme::for_security(self.secure)
    }

    /// Endpoint on the fixed [`SOCKET_PATH`].
    pub fn endpoint(&self) -> Result<String> {
        self.endpoint_with_path(SOCKET_PATH)
    }

    pub fn endpoint_with_path(&self, path: &str) -> Result<String> {
        validate_host(&self.host)?;
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        Ok(format!("{}://{}{}", self.scheme(), self.host, path))
    }
}

fn validate_host(host: &str) -> Result<()> {
    if host.is_empty() {
        return Err(FeedError::Endpoint("empty host".into()));
    }
    if let Some(bad) = host
        .chars()
        .find(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '@'))
    {
        return Err(FeedError::Endpoint(format!(
            "host '{host}' contains '{}'",
            bad.escape_default()
        )));
    }
    Ok(())
}
