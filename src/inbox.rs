//! Inbox: the surface rendered messages are appended to.
//!
//! The feed only talks to the [`Inbox`] trait. Each message is appended hidden
//! under its derived identifier and then revealed; the browser front end
//! animates the reveal, the other implementations just flip visibility.

use colored::*;
use std::collections::HashMap;
use std::io::{self, Write};

use crate::error::{FeedError, Result};
use crate::message::TrustedHtml;

/// Render seam between [`crate::feed::MessageFeed`] and a host surface.
pub trait Inbox {
    /// Append a hidden element keyed `key` as the last child.
    fn append_hidden(&mut self, key: &str, html: &TrustedHtml) -> Result<()>;

    /// Make a previously appended element visible.
    fn reveal(&mut self, key: &str) -> Result<()>;

    /// Take an appended element back out. Used when a reveal fails.
    fn remove(&mut self, key: &str) -> Result<()>;

    /// Identifiers of elements already present before the feed started.
    fn existing_keys(&self) -> Vec<String> {
        Vec::new()
    }
}

// ---------------------------------------------------------------------------
// MemoryInbox
// ---------------------------------------------------------------------------

/// One child of a [`MemoryInbox`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedElement {
    pub key: String,
    pub html: String,
    pub visible: bool,
}

/// Ordered in-memory inbox. Stands in for the DOM container in tests and
/// embedders that render elsewhere.
#[derive(Debug, Default, Clone)]
pub struct MemoryInbox {
    children: Vec<RenderedElement>,
}

impl MemoryInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// An inbox that already holds visible, pre-rendered children.
    pub fn with_children<I, K, H>(children: I) -> Self
    where
        I: IntoIterator<Item = (K, H)>,
        K: Into<String>,
        H: Into<String>,
    {
        let children = children
            .into_iter()
            .map(|(key, html)| RenderedElement {
                key: key.into(),
                html: html.into(),
                visible: true,
            })
            .collect();
        MemoryInbox { children }
    }

    pub fn children(&self) -> &[RenderedElement] {
        &self.children
    }

    pub fn keys(&self) -> Vec<&str> {
        self.children.iter().map(|c| c.key.as_str()).collect()
    }

    pub fn get(&self, key: &str) -> Option<&RenderedElement> {
        self.children.iter().find(|c| c.key == key)
    }

    pub fn count_key(&self, key: &str) -> usize {
        self.children.iter().filter(|c| c.key == key).count()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl Inbox for MemoryInbox {
    fn append_hidden(&mut self, key: &str, html: &TrustedHtml) -> Result<()> {
        if self.get(key).is_some() {
            return Err(FeedError::Render {
                key: key.to_string(),
                detail: "an element with this id already exists".into(),
            });
        }
        self.children.push(RenderedElement {
            key: key.to_string(),
            html: html.as_str().to_string(),
            visible: false,
        });
        Ok(())
    }

    fn reveal(&mut self, key: &str) -> Result<()> {
        let child = self
            .children
            .iter_mut()
            .find(|c| c.key == key)
            .ok_or_else(|| FeedError::Render {
                key: key.to_string(),
                detail: "no such element".into(),
            })?;
        child.visible = true;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let idx = self
            .children
            .iter()
            .position(|c| c.key == key)
            .ok_or_else(|| FeedError::Render {
                key: key.to_string(),
                detail: "no such element".into(),
            })?;
        self.children.remove(idx);
        Ok(())
    }

    fn existing_keys(&self) -> Vec<String> {
        self.children.iter().map(|c| c.key.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// TerminalInbox
// ---------------------------------------------------------------------------

/// Prints each revealed message as one line of text with markup removed.
pub struct TerminalInbox<W: Write = io::Stdout> {
    out: W,
    pending: HashMap<String, String>,
    shown: usize,
}

impl TerminalInbox<io::Stdout> {
    pub fn stdout() -> Self {
        TerminalInbox::new(io::stdout())
    }
}

impl<W: Write> TerminalInbox<W> {
    pub fn new(out: W) -> Self {
        TerminalInbox {
            out,
            pending: HashMap::new(),
            shown: 0,
        }
    }

    /// Number of messages printed so far.
    pub fn shown(&self) -> usize {
        self.shown
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Inbox for TerminalInbox<W> {
    fn append_hidden(&mut self, key: &str, html: &TrustedHtml) -> Result<()> {
        self.pending.insert(key.to_string(), strip_tags(html.as_str()));
        Ok(())
    }

    fn reveal(&mut self, key: &str) -> Result<()> {
        let text = self.pending.remove(key).ok_or_else(|| FeedError::Render {
            key: key.to_string(),
            detail: "reveal before append".into(),
        })?;
        writeln!(self.out, "{} {}", format!("[{key}]").dimmed(), text.bright_white())?;
        self.out.flush()?;
        self.shown += 1;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.pending.remove(key);
        Ok(())
    }
}

/// Drop markup tags and collapse whitespace, decoding the common entities.
pub fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    let text = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
