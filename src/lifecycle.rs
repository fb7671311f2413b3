//! Connection lifecycle shared by the native and browser front ends.

use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Why a connection stopped delivering frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The server closed the socket, with its reason text if any.
    PeerClosed(Option<String>),
    /// The stream ended without a close frame.
    StreamEnded,
    /// Transport error on an open connection.
    Error(String),
    /// The handshake never completed.
    ConnectFailed(String),
    /// Closed locally.
    ClosedByClient,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::PeerClosed(Some(r)) => write!(f, "closed by server: {r}"),
            CloseReason::PeerClosed(None) => write!(f, "closed by server"),
            CloseReason::StreamEnded => write!(f, "stream ended"),
            CloseReason::Error(e) => write!(f, "transport error: {e}"),
            CloseReason::ConnectFailed(e) => write!(f, "connect failed: {e}"),
            CloseReason::ClosedByClient => write!(f, "closed by client"),
        }
    }
}

/// Decision returned by a connection-loss hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconnect {
    Stop,
    After(Duration),
}

/// Called with the close reason and the number of consecutive losses since
/// the last successful open (starting at 1).
pub type LossHook = Box<dyn FnMut(&CloseReason, u32) -> Reconnect + Send>;

/// Hook that never reconnects. This is the default: a lost feed stays lost.
pub fn never_reconnect() -> LossHook {
    Box::new(|_, _| Reconnect::Stop)
}

/// Hook that reconnects after `delay`, giving up once more than
/// `max_attempts` consecutive losses have happened when a limit is set.
pub fn retry_every(delay: Duration, max_attempts: Option<u32>) -> LossHook {
    Box::new(move |_, attempt| match max_attempts {
        Some(max) if attempt > max => Reconnect::Stop,
        _ => Reconnect::After(delay),
    })
}
