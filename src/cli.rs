//! Command-line arguments for the native `beer-feed` binary.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::FeedConfig;
use crate::error::Result;
use crate::feed::ParsePolicy;

#[derive(Parser, Debug)]
#[command(name = "beer-feed")]
#[command(version)]
#[command(about = "Follow a beer feed socket and print each new record once")]
pub struct Args {
    /// TOML config file (flags override its values)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Host the feed page is served from, e.g. example.com or localhost:3001
    #[arg(long)]
    pub host: Option<String>,

    /// Connect with wss:// instead of ws://
    #[arg(long)]
    pub secure: bool,

    /// Fail loudly on malformed frames instead of dropping them
    #[arg(long)]
    pub strict: bool,

    /// Reconnect this many seconds after the connection is lost
    #[arg(long)]
    pub retry_secs: Option<u64>,

    /// Give up after this many consecutive failed reconnects
    #[arg(long, requires = "retry_secs")]
    pub max_retries: Option<u32>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// File config (or defaults) with command-line overrides applied.
    pub fn resolve_config(&self) -> Result<FeedConfig> {
        let mut config = match &self.config {
            Some(path) => FeedConfig::load(path)?,
            None => FeedConfig::default(),
        };
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if self.secure {
            config.secure = true;
        }
        if self.strict {
            config.parse_policy = ParsePolicy::Strict;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn retry_delay(&self) -> Option<Duration> {
        self.retry_secs.map(Duration::from_secs)
    }

    /// Filter directive for the tracing subscriber.
    pub fn log_filter(&self) -> String {
        format!("beer_feed={}", self.log_level)
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_args_parse_minimal() {
        let args = Args::parse_from(["beer-feed"]);
        assert!(args.config.is_none());
        assert!(args.host.is_none());
        assert!(!args.secure);
        assert!(!args.strict);
        assert!(args.retry_delay().is_none());
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_args_parse_full() {
        let args = Args::parse_from([
            "beer-feed",
            "--host",
            "example.com",
            "--secure",
            "--strict",
            "--retry-secs",
            "3",
            "--max-retries",
            "5",
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.host.as_deref(), Some("example.com"));
        assert!(args.secure);
        assert!(args.strict);
        assert_eq!(args.retry_delay(), Some(Duration::from_secs(3)));
        assert_eq!(args.max_retries, Some(5));
        assert_eq!(args.log_filter(), "beer_feed=debug");
    }

    #[test]
    fn test_max_retries_requires_retry_secs() {
        assert!(Args::try_parse_from(["beer-feed", "--max-retries", "2"]).is_err());
    }

    #[test]
    fn test_resolve_config_defaults() {
        let config = Args::parse_from(["beer-feed"]).resolve_config().unwrap();
        assert_eq!(config, FeedConfig::default());
    }

    #[test]
    fn test_resolve_config_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host = \"from-file:1\"\nid_prefix = \"msg\"").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = Args::parse_from(["beer-feed", "-c", &path, "--host", "flag.example", "--secure"]);
        let config = args.resolve_config().unwrap();
        assert_eq!(config.endpoint().unwrap(), "wss://flag.example/beersocket");
        assert_eq!(config.id_prefix, "msg");
    }

    #[test]
    fn test_resolve_config_strict_flag() {
        let config = Args::parse_from(["beer-feed", "--strict"]).resolve_config().unwrap();
        assert_eq!(config.parse_policy, ParsePolicy::Strict);
    }
}
