//! End-to-end tests for the native client against a local WebSocket server.

#![cfg(not(target_arch = "wasm32"))]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use beer_feed::connection::FeedClient;
use beer_feed::lifecycle::{CloseReason, ConnectionState, Reconnect};
use beer_feed::{MemoryInbox, MessageFeed, ParsePolicy};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

fn record(id: serde_json::Value, html: &str) -> Message {
    Message::Text(json!({"id": id, "html": html}).to_string())
}

/// Accept one connection per batch, push its frames, then close with "done".
async fn serve(batches: Vec<Vec<Message>>) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/beersocket", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        for batch in batches {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            for msg in batch {
                ws.send(msg).await.unwrap();
            }
            let _ = ws
                .close(Some(CloseFrame {
                    code: CloseCode::Normal,
                    reason: "done".into(),
                }))
                .await;
            // Drain until the client goes away.
            while let Some(Ok(_)) = ws.next().await {}
        }
    });
    (url, handle)
}

#[tokio::test]
async fn test_renders_each_id_once_then_reports_peer_close() {
    let (url, server) = serve(vec![vec![
        record(json!(1), "<p>one</p>"),
        record(json!(2), "<p>two</p>"),
        record(json!(1), "<p>one again</p>"),
        Message::Text("garbage".into()),
        record(json!(3), "<p>three</p>"),
    ]])
    .await;

    let mut client = FeedClient::new(url, MessageFeed::new(MemoryInbox::new()));
    let reason = client.run().await;
    server.await.unwrap();

    assert_eq!(reason, CloseReason::PeerClosed(Some("done".into())));
    assert_eq!(client.state(), ConnectionState::Closed);

    let feed = client.into_feed();
    let stats = feed.stats();
    assert_eq!(stats.received, 5);
    assert_eq!(stats.rendered, 3);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.rejected, 1);
    assert_eq!(feed.inbox().keys(), vec!["m1", "m2", "m3"]);
    assert_eq!(feed.inbox().get("m1").unwrap().html, "<p>one</p>");
}

#[tokio::test]
async fn test_non_text_frames_are_ignored() {
    let (url, server) = serve(vec![vec![
        Message::Binary(vec![0xde, 0xad]),
        Message::Ping(vec![1]),
        record(json!("x"), "<p>x</p>"),
    ]])
    .await;

    let mut client = FeedClient::new(url, MessageFeed::new(MemoryInbox::new()));
    client.run().await;
    server.await.unwrap();

    let feed = client.into_feed();
    assert_eq!(feed.stats().received, 1);
    assert_eq!(feed.inbox().keys(), vec!["mx"]);
}

#[tokio::test]
async fn test_strict_policy_keeps_receiving() {
    let (url, server) = serve(vec![vec![
        Message::Text("[1, 2]".into()),
        record(json!(9), "<p>nine</p>"),
    ]])
    .await;

    let feed = MessageFeed::new(MemoryInbox::new()).with_policy(ParsePolicy::Strict);
    let mut client = FeedClient::new(url, feed);
    client.run().await;
    server.await.unwrap();

    assert_eq!(client.feed().inbox().keys(), vec!["m9"]);
}

#[tokio::test]
async fn test_reconnect_hook_dedups_across_connections() {
    let (url, server) = serve(vec![
        vec![record(json!("a"), "<p>a</p>"), record(json!("b"), "<p>b</p>")],
        vec![record(json!("b"), "<p>b</p>"), record(json!("c"), "<p>c</p>")],
    ])
    .await;

    // Reconnect after the first loss, stop after the second.
    let losses = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&losses);
    let mut client = FeedClient::new(url, MessageFeed::new(MemoryInbox::new()))
        .on_connection_lost(Box::new(move |_, _| {
            match seen.fetch_add(1, Ordering::SeqCst) {
                0 => Reconnect::After(Duration::from_millis(20)),
                _ => Reconnect::Stop,
            }
        }));
    let reason = client.run().await;
    server.await.unwrap();

    assert_eq!(reason, CloseReason::PeerClosed(Some("done".into())));
    assert_eq!(losses.load(Ordering::SeqCst), 2);
    let feed = client.into_feed();
    assert_eq!(feed.inbox().keys(), vec!["ma", "mb", "mc"]);
    assert_eq!(feed.stats().duplicates, 1);
}

#[tokio::test]
async fn test_shutdown_closes_open_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/beersocket", listener.local_addr().unwrap());
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(record(json!(1), "<p>hello</p>")).await.unwrap();
        // Hold the connection open until the client closes it.
        let mut saw_close = false;
        while let Some(Ok(msg)) = ws.next().await {
            if msg.is_close() {
                saw_close = true;
            }
        }
        saw_close
    });

    let mut client = FeedClient::new(url, MessageFeed::new(MemoryInbox::new()));
    let shutdown = client.shutdown_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.shutdown();
    });

    let reason = client.run().await;
    assert_eq!(reason, CloseReason::ClosedByClient);
    assert!(server.await.unwrap(), "server never saw a close frame");
    assert_eq!(client.feed().inbox().keys(), vec!["m1"]);
}
