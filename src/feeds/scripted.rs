//! Scripted feeds for tests.
//!
//! Nothing in the engine or the binary selects this source; `get_source`
//! has no config kind for it. It is public so the integration tests
//! under `tests/` can drive the collector without a network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::SourceError;

use super::source::{ContentSource, FeedSession, FeedVariant, Growth, RawItem};

/// Deterministic in-memory content source.
///
/// Every (query, variant) feed follows a `FeedScript`. Feeds without a
/// script render but never show any item.
///
/// Session bookkeeping (`opened` / `released`) is shared with every
/// clone so callers can check that all sessions were handed back.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    scripts: Arc<HashMap<String, FeedScript>>,
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the script for one (query, variant) feed.
    pub fn with_feed(mut self, query: &str, variant: FeedVariant, script: FeedScript) -> Self {
        let target = self.target_for(query, variant);
        Arc::make_mut(&mut self.scripts).insert(target, script);
        self
    }

    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ContentSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn target_for(&self, query: &str, variant: FeedVariant) -> String {
        format!("scripted://search?q={query}&f={}", variant.mode())
    }

    async fn open_session(&self) -> Result<Box<dyn FeedSession>, SourceError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            scripts: self.scripts.clone(),
            released: self.released.clone(),
            script: None,
            reveals: 0,
        }))
    }
}

// ------------------------------------------------------------
// Feed scripts
// ------------------------------------------------------------

#[derive(Debug, Clone)]
enum Navigation {
    Ok,
    Unreachable(String),
    Hangs,
}

#[derive(Debug, Clone)]
enum Snapshots {
    /// Visible items after reveal `n` are `pages[n - 1]`; the last page
    /// stays visible once the list runs out.
    Fixed(Vec<Vec<RawItem>>),

    /// `n * step` distinct items are visible after reveal `n`.
    Endless { step: usize },
}

/// Behaviour of one scripted feed.
#[derive(Debug, Clone)]
pub struct FeedScript {
    navigation: Navigation,
    renders: bool,
    snapshots: Snapshots,
    fail_reveal_at: Option<usize>,
}

impl FeedScript {
    /// Feed whose visible items after each reveal are given page by page.
    pub fn pages(pages: Vec<Vec<RawItem>>) -> Self {
        Self {
            navigation: Navigation::Ok,
            renders: true,
            snapshots: Snapshots::Fixed(pages),
            fail_reveal_at: None,
        }
    }

    /// Convenience form of `pages` for items with fully resolved fields.
    pub fn keys(pages: &[&[&str]]) -> Self {
        Self::pages(
            pages
                .iter()
                .map(|page| {
                    page.iter()
                        .map(|key| RawItem::new(key, &format!("label {key}"), false))
                        .collect()
                })
                .collect(),
        )
    }

    /// Feed that shows `step` new items on every reveal, forever.
    pub fn endless(step: usize) -> Self {
        Self {
            navigation: Navigation::Ok,
            renders: true,
            snapshots: Snapshots::Endless { step },
            fail_reveal_at: None,
        }
    }

    /// Feed that renders but never shows an item.
    pub fn empty() -> Self {
        Self::pages(Vec::new())
    }

    /// Navigation fails with `reason`.
    pub fn unreachable(reason: &str) -> Self {
        Self {
            navigation: Navigation::Unreachable(reason.to_string()),
            ..Self::empty()
        }
    }

    /// Navigation never completes.
    pub fn hangs() -> Self {
        Self {
            navigation: Navigation::Hangs,
            ..Self::empty()
        }
    }

    /// Navigation succeeds but the initial content never appears.
    pub fn never_renders() -> Self {
        Self {
            renders: false,
            ..Self::empty()
        }
    }

    /// The `n`-th reveal (1-based) fails with a session error.
    pub fn fail_reveal_at(mut self, n: usize) -> Self {
        self.fail_reveal_at = Some(n);
        self
    }

    fn visible_after(&self, reveals: usize) -> Vec<RawItem> {
        if reveals == 0 {
            return Vec::new();
        }
        match &self.snapshots {
            Snapshots::Fixed(pages) => pages
                .get(reveals - 1)
                .or_else(|| pages.last())
                .cloned()
                .unwrap_or_default(),
            Snapshots::Endless { step } => (0..reveals * step)
                .map(|i| RawItem::new(&format!("item-{i}"), &format!("label {i}"), i % 2 == 0))
                .collect(),
        }
    }
}

// ------------------------------------------------------------
// Session
// ------------------------------------------------------------

struct ScriptedSession {
    scripts: Arc<HashMap<String, FeedScript>>,
    released: Arc<AtomicUsize>,
    script: Option<FeedScript>,
    reveals: usize,
}

impl ScriptedSession {
    fn script(&self) -> Result<&FeedScript, SourceError> {
        self.script
            .as_ref()
            .ok_or_else(|| SourceError::Session("session has not navigated".to_string()))
    }
}

#[async_trait::async_trait]
impl FeedSession for ScriptedSession {
    async fn navigate(&mut self, target: &str) -> Result<(), SourceError> {
        let script = self
            .scripts
            .get(target)
            .cloned()
            .unwrap_or_else(FeedScript::empty);

        match &script.navigation {
            Navigation::Ok => {}
            Navigation::Unreachable(reason) => {
                return Err(SourceError::Navigation {
                    target: target.to_string(),
                    reason: reason.clone(),
                });
            }
            Navigation::Hangs => std::future::pending::<()>().await,
        }

        self.script = Some(script);
        self.reveals = 0;
        Ok(())
    }

    async fn wait_for_initial_content(&mut self, timeout: Duration) -> Result<(), SourceError> {
        if self.script()?.renders {
            Ok(())
        } else {
            Err(SourceError::InitialContentTimeout(timeout))
        }
    }

    async fn trigger_reveal(&mut self) -> Result<(), SourceError> {
        let next = self.reveals + 1;
        if self.script()?.fail_reveal_at == Some(next) {
            return Err(SourceError::Session(format!("page crashed on reveal {next}")));
        }
        self.reveals = next;
        Ok(())
    }

    async fn wait_for_growth(&mut self, expected: usize, _timeout: Duration) -> Growth {
        match self.visible_item_count().await {
            Ok(count) if count > expected => Growth::Grew,
            _ => Growth::TimedOut,
        }
    }

    async fn visible_item_count(&mut self) -> Result<usize, SourceError> {
        Ok(self.script()?.visible_after(self.reveals).len())
    }

    async fn extract_visible_items(&mut self) -> Result<Vec<RawItem>, SourceError> {
        Ok(self.script()?.visible_after(self.reveals))
    }

    async fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_pages_keep_last_page_visible() {
        let source = ScriptedSource::new().with_feed(
            "q",
            FeedVariant::Latest,
            FeedScript::keys(&[&["a"], &["a", "b"]]),
        );
        let mut session = source.open_session().await.unwrap();
        session
            .navigate(&source.target_for("q", FeedVariant::Latest))
            .await
            .unwrap();

        assert_eq!(session.visible_item_count().await.unwrap(), 0);
        for expected in [1, 2, 2, 2] {
            session.trigger_reveal().await.unwrap();
            assert_eq!(session.visible_item_count().await.unwrap(), expected);
        }

        session.release().await;
        assert_eq!(source.sessions_opened(), 1);
        assert_eq!(source.sessions_released(), 1);
    }

    #[tokio::test]
    async fn unknown_feed_renders_nothing() {
        let source = ScriptedSource::new();
        let mut session = source.open_session().await.unwrap();
        session.navigate("scripted://search?q=x&f=top").await.unwrap();
        session
            .wait_for_initial_content(Duration::from_millis(1))
            .await
            .unwrap();
        session.trigger_reveal().await.unwrap();

        assert!(session.extract_visible_items().await.unwrap().is_empty());
        assert_eq!(
            session.wait_for_growth(0, Duration::from_millis(1)).await,
            Growth::TimedOut
        );
    }

    #[tokio::test]
    async fn unreachable_feed_fails_navigation() {
        let source = ScriptedSource::new().with_feed(
            "q",
            FeedVariant::Top,
            FeedScript::unreachable("dns lookup failed"),
        );
        let mut session = source.open_session().await.unwrap();
        let err = session
            .navigate(&source.target_for("q", FeedVariant::Top))
            .await
            .unwrap_err();

        assert!(matches!(err, SourceError::Navigation { .. }));
        assert!(err.to_string().contains("dns lookup failed"));
    }
}
