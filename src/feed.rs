//! The message feed: parse, deduplicate, render.
//!
//! ## Pipeline (one call per inbound frame)
//! 1. Parse the frame as an [`IncomingMessage`]; failures follow [`ParsePolicy`].
//! 2. Derive the key (`prefix + id`).
//! 3. Keys already in the rendered set are dropped as duplicates.
//! 4. Otherwise append hidden, reveal, and record the key. A failed reveal
//!    takes the element back out and leaves the key unrecorded, so the next
//!    delivery of that id renders it.
//!
//! The rendered set is owned here rather than read back from the inbox, so
//! dedup does not depend on how the host surface answers lookups. It only
//! grows, starting from the keys the inbox already holds.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, error, warn};

use crate::error::Result;
use crate::inbox::Inbox;
use crate::message::{IncomingMessage, ID_PREFIX};

/// What to do with a frame that does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParsePolicy {
    /// Development: hand the error back to the caller.
    Strict,
    /// Production: log and drop.
    #[default]
    Lenient,
}

/// Result of handling one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A new element keyed by the contained identifier was rendered.
    Rendered(String),
    /// The identifier had already been rendered; nothing changed.
    Duplicate(String),
    /// The frame was malformed and dropped under [`ParsePolicy::Lenient`].
    Dropped,
}

/// Running counters for one feed session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedStats {
    pub received: u64,
    pub rendered: u64,
    pub duplicates: u64,
    pub rejected: u64,
}

pub struct MessageFeed<I: Inbox> {
    inbox: I,
    rendered: HashSet<String>,
    prefix: String,
    policy: ParsePolicy,
    stats: FeedStats,
}

impl<I: Inbox> MessageFeed<I> {
    /// A feed over `inbox`, seeded with whatever the inbox already shows.
    pub fn new(inbox: I) -> Self {
        let mut feed = MessageFeed {
            inbox,
            rendered: HashSet::new(),
            prefix: ID_PREFIX.to_string(),
            policy: ParsePolicy::default(),
            stats: FeedStats::default(),
        };
        let existing = feed.inbox.existing_keys();
        feed.seed(existing);
        feed
    }

    pub fn with_policy(mut self, policy: ParsePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Mark identifiers as already rendered (e.g. server-side pre-rendered history).
    pub fn seed<K: Into<String>>(&mut self, keys: impl IntoIterator<Item = K>) {
        self.rendered.extend(keys.into_iter().map(Into::into));
    }

    /// Handle one raw text frame.
    ///
    /// Under [`ParsePolicy::Lenient`] this only fails when the inbox refuses a
    /// mutation; under [`ParsePolicy::Strict`] parse failures are returned too.
    pub fn handle_frame(&mut self, text: &str) -> Result<Outcome> {
        self.stats.received += 1;
        match IncomingMessage::parse(text) {
            Ok(msg) => self.show(msg),
            Err(e) => {
                self.stats.rejected += 1;
                match self.policy {
                    ParsePolicy::Strict => {
                        error!(error = %e, frame = %preview(text), "rejected feed frame");
                        Err(e)
                    }
                    ParsePolicy::Lenient => {
                        warn!(error = %e, "dropping malformed feed frame");
                        Ok(Outcome::Dropped)
                    }
                }
            }
        }
    }

    /// Render an already-parsed message unless its key was seen before.
    pub fn show(&mut self, msg: IncomingMessage) -> Result<Outcome> {
        let key = msg.id.key_with_prefix(&self.prefix);
        if self.rendered.contains(&key) {
            self.stats.duplicates += 1;
            debug!(key = %key, "duplicate message ignored");
            return Ok(Outcome::Duplicate(key));
        }

        self.inbox.append_hidden(&key, &msg.html)?;
        if let Err(e) = self.inbox.reveal(&key) {
            warn!(key = %key, error = %e, "reveal failed, element withdrawn");
            if let Err(undo) = self.inbox.remove(&key) {
                error!(key = %key, error = %undo, "could not withdraw hidden element");
            }
            return Err(e);
        }
        self.rendered.insert(key.clone());
        self.stats.rendered += 1;
        debug!(key = %key, "message rendered");
        Ok(Outcome::Rendered(key))
    }

    pub fn is_rendered(&self, key: &str) -> bool {
        self.rendered.contains(key)
    }

    pub fn rendered_count(&self) -> usize {
        self.rendered.len()
    }

    pub fn stats(&self) -> FeedStats {
        self.stats
    }

    pub fn policy(&self) -> ParsePolicy {
        self.policy
    }

    pub fn inbox(&self) -> &I {
        &self.inbox
    }

    pub fn inbox_mut(&mut self) -> &mut I {
        &mut self.inbox
    }

    pub fn into_inbox(self) -> I {
        self.inbox
    }
}

/// First 80 chars of a frame, for log lines.
fn preview(text: &str) -> String {
    const MAX: usize = 80;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
