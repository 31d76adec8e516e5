use std::time::Duration;

use serde_json::Value;
use tokio::time::{sleep, Instant};
use url::Url;

use crate::config::{FieldMap, HttpSourceConfig};
use crate::error::{FieldError, SourceError};

use super::source::{ContentSource, FeedSession, FeedVariant, Growth, RawItem};

/// Delay between polls while waiting for the first non-empty page.
const INITIAL_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Paginated JSON feed served over HTTP.
///
/// PROTOCOL:
/// - GET `<base_url>?q=<query>&src=typed_query&f=<mode>[&cursor=<c>]`
/// - Response: `{ "<items_path>": [ {..}, .. ], "<cursor_path>": "c" | null }`
///
/// A "reveal" fetches the next page and appends its items to the
/// visible list, the way an infinite-scroll page grows.
pub struct HttpFeedSource {
    client: reqwest::Client,
    cfg: HttpSourceConfig,
}

impl HttpFeedSource {
    pub fn new(cfg: HttpSourceConfig) -> Result<Self, SourceError> {
        Url::parse(&cfg.base_url).map_err(|e| {
            SourceError::Session(format!("invalid base_url '{}': {e}", cfg.base_url))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()?;

        Ok(Self { client, cfg })
    }
}

#[async_trait::async_trait]
impl ContentSource for HttpFeedSource {
    fn name(&self) -> &'static str {
        "http"
    }

    fn target_for(&self, query: &str, variant: FeedVariant) -> String {
        match Url::parse_with_params(
            &self.cfg.base_url,
            &[("q", query), ("src", "typed_query"), ("f", variant.mode())],
        ) {
            Ok(url) => url.to_string(),
            Err(_) => self.cfg.base_url.clone(),
        }
    }

    async fn open_session(&self) -> Result<Box<dyn FeedSession>, SourceError> {
        // reqwest::Client is a handle; cookies and cursors live per session
        Ok(Box::new(HttpFeedSession {
            client: self.client.clone(),
            cfg: self.cfg.clone(),
            target: None,
            cursor: None,
            visible: Vec::new(),
        }))
    }
}

struct HttpFeedSession {
    client: reqwest::Client,
    cfg: HttpSourceConfig,
    target: Option<Url>,
    cursor: Option<String>,
    visible: Vec<Value>,
}

impl HttpFeedSession {
    fn target(&self) -> Result<&Url, SourceError> {
        self.target
            .as_ref()
            .ok_or_else(|| SourceError::Session("session has not navigated".to_string()))
    }

    /// Fetches one page and appends its items.
    async fn fetch_page(&mut self) -> Result<(), SourceError> {
        let mut url = self.target()?.clone();
        if let Some(cursor) = &self.cursor {
            url.query_pairs_mut().append_pair("cursor", cursor);
        }

        let page: Value = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let items = page
            .get(&self.cfg.items_path)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                SourceError::Malformed(format!("missing '{}' array", self.cfg.items_path))
            })?;

        self.visible.extend(items.iter().cloned());
        self.cursor = page
            .get(&self.cfg.cursor_path)
            .and_then(Value::as_str)
            .map(str::to_owned);
        Ok(())
    }
}

#[async_trait::async_trait]
impl FeedSession for HttpFeedSession {
    async fn navigate(&mut self, target: &str) -> Result<(), SourceError> {
        let url = Url::parse(target).map_err(|e| SourceError::Navigation {
            target: target.to_string(),
            reason: e.to_string(),
        })?;
        self.target = Some(url);
        self.cursor = None;
        self.visible.clear();

        self.fetch_page().await.map_err(|e| SourceError::Navigation {
            target: target.to_string(),
            reason: e.to_string(),
        })
    }

    async fn wait_for_initial_content(&mut self, timeout: Duration) -> Result<(), SourceError> {
        let deadline = Instant::now() + timeout;
        while self.visible.is_empty() {
            if Instant::now() + INITIAL_POLL_INTERVAL > deadline {
                return Err(SourceError::InitialContentTimeout(timeout));
            }
            sleep(INITIAL_POLL_INTERVAL).await;
            self.cursor = None;
            self.fetch_page().await?;
        }
        Ok(())
    }

    async fn trigger_reveal(&mut self) -> Result<(), SourceError> {
        // No cursor: the feed is exhausted, the page simply stops growing
        if self.cursor.is_none() {
            return Ok(());
        }
        self.fetch_page().await
    }

    async fn wait_for_growth(&mut self, expected: usize, _timeout: Duration) -> Growth {
        // Pages are appended synchronously by `trigger_reveal`
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
        Ok(self
            .visible
            .iter()
            .map(|item| read_item(item, &self.cfg.fields))
            .collect())
    }

    async fn release(&mut self) {
        self.target = None;
        self.cursor = None;
        self.visible.clear();
    }
}

/// Reads the mapped members of one JSON item, each independently.
fn read_item(item: &Value, fields: &FieldMap) -> RawItem {
    RawItem {
        key: read_str(item, &fields.key, "key"),
        label: read_str(item, &fields.label, "label"),
        flag: match item.get(&fields.flag) {
            None | Some(Value::Null) => Err(FieldError::Missing("flag")),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(FieldError::Malformed {
                field: "flag",
                details: format!("expected bool, got {other}"),
            }),
        },
    }
}

fn read_str(item: &Value, member: &str, field: &'static str) -> Result<String, FieldError> {
    match item.get(member) {
        None | Some(Value::Null) => Err(FieldError::Missing(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(FieldError::Malformed {
            field,
            details: format!("expected string, got {other}"),
        }),
    }
}
