use std::time::Duration;

use rand::{random_bool, random_range};
use tokio::time::sleep;
use url::Url;

use crate::config::DemoSourceConfig;
use crate::error::{FieldError, SourceError};

use super::source::{ContentSource, FeedSession, FeedVariant, Growth, RawItem};

const DEMO_BASE: &str = "demo://feed/search";

/// Synthetic feed source for running the collector without a network.
///
/// DEMO MODE:
/// - Each reveal shows 0..=page_size new items until `max_items`
/// - Both variants of a query share part of their items, so the merge
///   has duplicates to remove
/// - A small share of items has an unreadable label or key
pub struct DemoSource {
    cfg: DemoSourceConfig,
}

impl DemoSource {
    pub fn new(cfg: DemoSourceConfig) -> Self {
        Self { cfg }
    }
}

#[async_trait::async_trait]
impl ContentSource for DemoSource {
    fn name(&self) -> &'static str {
        "demo"
    }

    fn target_for(&self, query: &str, variant: FeedVariant) -> String {
        match Url::parse_with_params(DEMO_BASE, &[("q", query), ("f", variant.mode())]) {
            Ok(url) => url.to_string(),
            Err(_) => DEMO_BASE.to_string(),
        }
    }

    async fn open_session(&self) -> Result<Box<dyn FeedSession>, SourceError> {
        Ok(Box::new(DemoSession {
            cfg: self.cfg.clone(),
            slug: String::new(),
            variant: FeedVariant::Latest,
            visible: Vec::new(),
        }))
    }
}

struct DemoSession {
    cfg: DemoSourceConfig,
    slug: String,
    variant: FeedVariant,
    visible: Vec<RawItem>,
}

impl DemoSession {
    fn item(&self, n: usize) -> RawItem {
        // Top shows every other item of Latest, so half of it overlaps
        let id = match self.variant {
            FeedVariant::Latest => n,
            FeedVariant::Top => n * 2,
        };

        let key = if random_bool(0.01) {
            Err(FieldError::Missing("key"))
        } else {
            Ok(format!("/{}_{id}", self.slug))
        };
        let label = if random_bool(0.03) {
            Err(FieldError::Missing("label"))
        } else {
            Ok(format!("{} user {id}", self.slug))
        };

        RawItem {
            key,
            label,
            flag: Ok(random_bool(0.2)),
        }
    }
}

#[async_trait::async_trait]
impl FeedSession for DemoSession {
    async fn navigate(&mut self, target: &str) -> Result<(), SourceError> {
        let url = Url::parse(target).map_err(|e| SourceError::Navigation {
            target: target.to_string(),
            reason: e.to_string(),
        })?;

        let mut query = None;
        let mut mode = None;
        for (k, v) in url.query_pairs() {
            match k.as_ref() {
                "q" => query = Some(v.into_owned()),
                "f" => mode = Some(v.into_owned()),
                _ => {}
            }
        }

        let query = query.ok_or_else(|| SourceError::Navigation {
            target: target.to_string(),
            reason: "missing query parameter".to_string(),
        })?;

        self.slug = query.to_lowercase().replace(' ', "_");
        self.variant = if mode.as_deref() == Some("top") {
            FeedVariant::Top
        } else {
            FeedVariant::Latest
        };
        self.visible.clear();

        sleep(Duration::from_millis(random_range(20..80))).await;
        Ok(())
    }

    async fn wait_for_initial_content(&mut self, _timeout: Duration) -> Result<(), SourceError> {
        Ok(())
    }

    async fn trigger_reveal(&mut self) -> Result<(), SourceError> {
        let room = self.cfg.max_items.saturating_sub(self.visible.len());
        let batch = random_range(0..=self.cfg.page_size).min(room);
        let start = self.visible.len();
        for n in start..start + batch {
            let item = self.item(n);
            self.visible.push(item);
        }
        Ok(())
    }

    async fn wait_for_growth(&mut self, expected: usize, timeout: Duration) -> Growth {
        let render = Duration::from_millis(random_range(5..40));
        sleep(render.min(timeout)).await;
        if self.visible.len() > expected {
            Growth::Grew
        } else {
            Growth::TimedOut
        }
    }

    async fn visible_item_count(&mut self) -> Result<usize, SourceError> {
        Ok(self.visible.len())
    }

    async fn extract_visible_items(&mut self) -> Result<Vec<RawItem>, SourceError> {
        Ok(self.visible.clone())
    }

    async fn release(&mut self) {
        self.visible.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_feed_never_exceeds_max_items() {
        let source = DemoSource::new(DemoSourceConfig {
            max_items: 10,
            page_size: 4,
        });
        let target = source.target_for("Quantum mechanics", FeedVariant::Top);
        assert!(target.contains("f=top"));

        let mut session = source.open_session().await.unwrap();
        session.navigate(&target).await.unwrap();
        for _ in 0..20 {
            session.trigger_reveal().await.unwrap();
        }

        let items = session.extract_visible_items().await.unwrap();
        assert!(items.len() <= 10);
        for item in items.iter().filter_map(|i| i.key.as_ref().ok()) {
            assert!(item.starts_with("/quantum_mechanics_"));
        }
        session.release().await;
    }
}
