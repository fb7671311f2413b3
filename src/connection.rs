//! Native receive-only connection to the feed socket.
//!
//! ## Lifecycle
//! `Connecting → Open → Closed`. The client never sends data frames. When the
//! connection ends, the loss hook decides whether to open a new one; the
//! default hook stops, so out of the box a lost connection simply ends the
//! feed. The [`MessageFeed`] outlives individual connections, so messages
//! replayed after a reconnect are still deduplicated.

use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::error::{FeedError, Result};
use crate::feed::MessageFeed;
use crate::inbox::Inbox;
use crate::lifecycle::{never_reconnect, CloseReason, ConnectionState, LossHook, Reconnect};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Cloneable handle that asks a running [`FeedClient`] to close its connection.
#[derive(Clone, Default)]
pub struct ShutdownHandle(Arc<Notify>);

impl ShutdownHandle {
    /// Request shutdown. Takes effect even if issued before the client runs.
    pub fn shutdown(&self) {
        self.0.notify_one();
    }
}

// ---------------------------------------------------------------------------
// FeedConnection
// ---------------------------------------------------------------------------

/// One open WebSocket to the feed endpoint.
pub struct FeedConnection {
    url: String,
    state: ConnectionState,
    stream: WsStream,
}

impl FeedConnection {
    /// Perform the handshake with `url`.
    pub async fn open(url: &str) -> Result<Self> {
        debug!(url, "connecting to feed");
        let (stream, _response) = connect_async(url).await.map_err(|e| FeedError::Connect {
            url: url.to_string(),
            detail: e.to_string(),
        })?;
        info!(url, "feed connection open");
        Ok(FeedConnection {
            url: url.to_string(),
            state: ConnectionState::Open,
            stream,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Read frames into `feed` until the connection ends or `shutdown` fires.
    ///
    /// Frames are handled one at a time in delivery order. Only text frames
    /// carry messages; binary and control frames are skipped.
    pub async fn pump<I: Inbox>(
        &mut self,
        feed: &mut MessageFeed<I>,
        shutdown: &ShutdownHandle,
    ) -> CloseReason {
        let reason = loop {
            tokio::select! {
                _ = shutdown.0.notified() => {
                    if let Err(e) = self.close().await {
                        debug!(error = %e, "close handshake failed");
                    }
                    break CloseReason::ClosedByClient;
                }
                frame = self.stream.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Err(e) = feed.handle_frame(&text) {
                            match e {
                                // Already logged by the feed under the strict policy.
                                FeedError::Parse(_) | FeedError::InvalidId(_) => {}
                                other => error!(error = %other, "failed to render message"),
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty());
                        break CloseReason::PeerClosed(reason);
                    }
                    Some(Ok(_)) => {} // binary / ping / pong
                    Some(Err(e)) => break CloseReason::Error(e.to_string()),
                    None => break CloseReason::StreamEnded,
                },
            }
        };
        self.state = ConnectionState::Closed;
        reason
    }

    /// Send a close frame and stop reading.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        self.state = ConnectionState::Closed;
        self.stream
            .send(WsMessage::Close(None))
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FeedClient
// ---------------------------------------------------------------------------

/// Owns the feed and drives connections to one endpoint.
pub struct FeedClient<I: Inbox> {
    url: String,
    feed: MessageFeed<I>,
    state: ConnectionState,
    on_lost: LossHook,
    shutdown: ShutdownHandle,
}

impl<I: Inbox> FeedClient<I> {
    pub fn new(url: impl Into<String>, feed: MessageFeed<I>) -> Self {
        FeedClient {
            url: url.into(),
            feed,
            state: ConnectionState::Closed,
            on_lost: never_reconnect(),
            shutdown: ShutdownHandle::default(),
        }
    }

    /// Install the connection-loss hook.
    pub fn on_connection_lost(mut self, hook: LossHook) -> Self {
        self.on_lost = hook;
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn feed(&self) -> &MessageFeed<I> {
        &self.feed
    }

    pub fn into_feed(self) -> MessageFeed<I> {
        self.feed
    }

    /// Connect and receive until the feed stops.
    ///
    /// Returns the reason the last connection ended. With the default hook
    /// that is the first loss; a custom hook may keep the client reconnecting.
    pub async fn run(&mut self) -> CloseReason {
        let mut losses: u32 = 0;
        loop {
            self.state = ConnectionState::Connecting;
            let reason = match FeedConnection::open(&self.url).await {
                Ok(mut conn) => {
                    self.state = ConnectionState::Open;
                    losses = 0;
                    conn.pump(&mut self.feed, &self.shutdown).await
                }
                Err(e) => CloseReason::ConnectFailed(e.to_string()),
            };
            self.state = ConnectionState::Closed;

            if reason == CloseReason::ClosedByClient {
                info!("feed closed");
                return reason;
            }

            losses = losses.saturating_add(1);
            match (self.on_lost)(&reason, losses) {
                Reconnect::Stop => {
                    warn!(reason = %reason, "feed connection lost");
                    return reason;
                }
                Reconnect::After(delay) => {
                    warn!(
                        reason = %reason,
                        attempt = losses,
                        delay_ms = delay.as_millis() as u64,
                        "feed connection lost, reconnecting"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.shutdown.0.notified() => return CloseReason::ClosedByClient,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbox::MemoryInbox;
    use crate::lifecycle::retry_every;
    use std::time::Duration;

    #[test]
    fn test_new_client_starts_closed() {
        let client = FeedClient::new("ws://127.0.0.1:1/beersocket", MessageFeed::new(MemoryInbox::new()));
        assert_eq!(client.state(), ConnectionState::Closed);
        assert_eq!(client.url(), "ws://127.0.0.1:1/beersocket");
    }

    #[tokio::test]
    async fn test_open_unreachable_is_connect_error() {
        // Port 1 on loopback is not expected to accept connections.
        let err = FeedConnection::open("ws://127.0.0.1:1/beersocket")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, FeedError::Connect { .. }));
    }

    #[tokio::test]
    async fn test_run_reports_connect_failure_with_default_hook() {
        let mut client = FeedClient::new(
            "ws://127.0.0.1:1/beersocket",
            MessageFeed::new(MemoryInbox::new()),
        );
        let reason = client.run().await;
        assert!(matches!(reason, CloseReason::ConnectFailed(_)));
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_shutdown_during_backoff() {
        let mut client = FeedClient::new(
            "ws://127.0.0.1:1/beersocket",
            MessageFeed::new(MemoryInbox::new()),
        )
        .on_connection_lost(retry_every(Duration::from_secs(60), None));
        client.shutdown_handle().shutdown();
        assert_eq!(client.run().await, CloseReason::ClosedByClient);
    }
}
