#[cfg(not(target_arch = "wasm32"))]
use beer_feed::{
    cli::Args, connection::FeedClient, lifecycle, CloseReason, MessageFeed, TerminalInbox,
};
#[cfg(not(target_arch = "wasm32"))]
use clap::Parser;
#[cfg(not(target_arch = "wasm32"))]
use colored::*;
#[cfg(not(target_arch = "wasm32"))]
use tracing::{debug, info};
#[cfg(not(target_arch = "wasm32"))]
use tracing_subscriber::EnvFilter;

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logs go to stderr; stdout is the inbox.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = args.resolve_config()?;
    let url = config.endpoint()?;
    debug!(input = %config.input_id, "no compose input in terminal mode");

    let feed = MessageFeed::new(TerminalInbox::stdout())
        .with_prefix(config.id_prefix.clone())
        .with_policy(config.parse_policy);

    let hook = match args.retry_delay() {
        Some(delay) => lifecycle::retry_every(delay, args.max_retries),
        None => lifecycle::never_reconnect(),
    };
    let mut client = FeedClient::new(url.clone(), feed).on_connection_lost(hook);

    let shutdown = client.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.shutdown();
        }
    });

    eprintln!("{} {}", "following".bright_cyan(), url.bold());
    let reason = client.run().await;

    let stats = client.feed().stats();
    info!(
        received = stats.received,
        rendered = stats.rendered,
        duplicates = stats.duplicates,
        rejected = stats.rejected,
        "feed stopped"
    );
    eprintln!(
        "{} {} ({} shown, {} duplicate, {} rejected)",
        "stopped:".bright_yellow(),
        reason,
        stats.rendered,
        stats.duplicates,
        stats.rejected
    );

    match reason {
        CloseReason::ConnectFailed(detail) => Err(format!("could not reach {url}: {detail}").into()),
        _ => Ok(()),
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}
