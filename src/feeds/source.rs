use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FieldError, SourceError};

/// The two feed modes collected for every query.
///
/// IMPORTANT:
/// - `ALL` defines the per-query fan-out and its merge order
/// - Adding a variant changes both
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedVariant {
    /// Recency-ordered feed
    Latest,

    /// Relevance-ordered feed
    Top,
}

impl FeedVariant {
    pub const ALL: [FeedVariant; 2] = [FeedVariant::Latest, FeedVariant::Top];

    /// Feed-mode parameter understood by the target site.
    pub fn mode(self) -> &'static str {
        match self {
            FeedVariant::Latest => "live",
            FeedVariant::Top => "top",
        }
    }
}

impl std::fmt::Display for FeedVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mode())
    }
}

/// Result of waiting for the visible item count to grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Growth {
    Grew,
    TimedOut,
}

/// One visible feed item as read from the page.
///
/// Every field is read independently; a failed read never hides the
/// other two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    pub key: Result<String, FieldError>,
    pub label: Result<String, FieldError>,
    pub flag: Result<bool, FieldError>,
}

impl RawItem {
    pub fn new(key: &str, label: &str, flag: bool) -> Self {
        Self {
            key: Ok(key.to_string()),
            label: Ok(label.to_string()),
            flag: Ok(flag),
        }
    }
}

/// ContentSource is the boundary between the collection engine and
/// whatever renders the feed (a browser, an HTTP API, a script).
///
/// Each implementation must:
/// - Map a (query, variant) pair to a target it can navigate to
/// - Hand out independent sessions, one per unit of work
///
/// THREAD SAFETY:
/// - Must be Send + Sync
/// - One source instance is shared by every concurrent unit
///
#[async_trait::async_trait]
pub trait ContentSource: Send + Sync {
    /// Canonical source name, used for logging.
    fn name(&self) -> &'static str;

    /// Encodes query text and feed variant into the source's addressing scheme.
    fn target_for(&self, query: &str, variant: FeedVariant) -> String;

    /// Opens a fresh session.
    ///
    /// CONTRACT:
    /// - Sessions never share navigation state, cookies or scroll position
    /// - The caller always hands the session back through `FeedSession::release`
    async fn open_session(&self) -> Result<Box<dyn FeedSession>, SourceError>;
}

/// A single isolated browsing context positioned on one feed.
///
/// Sessions are driven strictly sequentially by their owning unit.
#[async_trait::async_trait]
pub trait FeedSession: Send {
    async fn navigate(&mut self, target: &str) -> Result<(), SourceError>;

    async fn wait_for_initial_content(&mut self, timeout: Duration) -> Result<(), SourceError>;

    /// Advances the feed by one step (page-end signal).
    async fn trigger_reveal(&mut self) -> Result<(), SourceError>;

    /// Waits until more than `expected` items are visible, or `timeout` elapses.
    async fn wait_for_growth(&mut self, expected: usize, timeout: Duration) -> Growth;

    async fn visible_item_count(&mut self) -> Result<usize, SourceError>;

    async fn extract_visible_items(&mut self) -> Result<Vec<RawItem>, SourceError>;

    /// Scoped teardown. Called exactly once on every exit path, after
    /// which the session is dropped.
    async fn release(&mut self);
}
