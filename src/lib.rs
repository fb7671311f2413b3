//! # beer-feed
//!
//! Receive-only client for a server-pushed feed. The server sends one JSON
//! object per WebSocket text frame, `{"id": …, "html": "…"}`; each distinct id
//! is rendered exactly once into an inbox, in arrival order.
//!
//! ## Modules
//! - [`message`]: wire record, id and trusted-markup types
//! - [`endpoint`]: `ws(s)://<host>/beersocket` derivation
//! - [`feed`]: the dedup/render core, independent of any transport
//! - [`inbox`]: render surfaces (in-memory, terminal)
//! - [`lifecycle`]: connection states, close reasons, loss hooks
//! - `connection`: native tokio-tungstenite client (not on wasm32)
//! - `wasm`: browser glue over `web_sys` (feature `wasm`, wasm32 only)

pub mod cli;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod feed;
pub mod inbox;
pub mod lifecycle;
pub mod message;

#[cfg(not(target_arch = "wasm32"))]
pub mod connection;

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub mod wasm;

pub use config::FeedConfig;
pub use endpoint::{PageLocation, Scheme, SOCKET_PATH};
pub use error::{FeedError, Result};
pub use feed::{FeedStats, MessageFeed, Outcome, ParsePolicy};
pub use inbox::{Inbox, MemoryInbox, RenderedElement, TerminalInbox};
pub use lifecycle::{CloseReason, ConnectionState, LossHook, Reconnect};
pub use message::{IncomingMessage, MessageId, TrustedHtml, ID_PREFIX};

#[cfg(not(target_arch = "wasm32"))]
pub use connection::{FeedClient, FeedConnection, ShutdownHandle};
