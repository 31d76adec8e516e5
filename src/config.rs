use std::fs;

use serde::Deserialize;

// ------------------------------------------------------------
// Root configuration
// ------------------------------------------------------------
//
// Top-level structure loaded from `config.json`.
//
// It defines:
// - What to collect (queries, scroll limit, pacing)
// - Which content source renders the feeds
// - Optional debug configuration
//
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Collection parameters shared by every unit
    pub collection: CollectionConfig,

    /// Content source selection and its parameters
    pub source: SourceConfig,

    /// Optional debug configuration
    pub debug: Option<DebugConfig>,
}

// ------------------------------------------------------------
// Collection configuration
// ------------------------------------------------------------
//
// Raw, unvalidated values. `CollectorSettings::from_config`
// checks them before anything runs.
//
// Notes:
// - `scroll_limit` is signed on purpose so that a negative value
//   is reported instead of failing deserialization with a vague error.
// - Timing defaults follow the pacing that proved reliable against
//   infinite-scroll feeds (3s growth wait, 500ms fallback).
//
#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    /// Search queries, one (query × variant) pair of units each
    pub queries: Vec<String>,

    /// Hard cap on reveal iterations per unit
    pub scroll_limit: i64,

    /// Upper bound on units holding a session at the same time
    #[serde(default)]
    pub max_concurrent_units: Option<usize>,

    /// Consecutive non-growing iterations that end a unit
    #[serde(default = "default_stagnation_threshold")]
    pub stagnation_threshold: usize,

    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    #[serde(default = "default_initial_content_timeout_ms")]
    pub initial_content_timeout_ms: u64,

    #[serde(default = "default_growth_timeout_ms")]
    pub growth_timeout_ms: u64,

    #[serde(default = "default_fallback_delay_ms")]
    pub fallback_delay_ms: u64,

    /// What to do with items whose key could not be read
    #[serde(default)]
    pub unresolved_keys: UnresolvedKeys,
}

impl CollectionConfig {
    /// Configuration with default pacing for the given queries.
    pub fn new(queries: Vec<String>, scroll_limit: i64) -> Self {
        Self {
            queries,
            scroll_limit,
            max_concurrent_units: None,
            stagnation_threshold: default_stagnation_threshold(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            initial_content_timeout_ms: default_initial_content_timeout_ms(),
            growth_timeout_ms: default_growth_timeout_ms(),
            fallback_delay_ms: default_fallback_delay_ms(),
            unresolved_keys: UnresolvedKeys::default(),
        }
    }
}

/// Handling of items whose identity key failed to resolve.
///
/// `Collapse` keeps the placeholder key and deduplicates it like any
/// other key, so all such items end up as a single record.
/// `Discard` drops them.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedKeys {
    #[default]
    Collapse,
    Discard,
}

fn default_stagnation_threshold() -> usize {
    3
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

fn default_initial_content_timeout_ms() -> u64 {
    60_000
}

fn default_growth_timeout_ms() -> u64 {
    3_000
}

fn default_fallback_delay_ms() -> u64 {
    500
}

// ------------------------------------------------------------
// Source configuration
// ------------------------------------------------------------
//
// Selects the content source implementation via `kind`.
//
// Example:
//   { "kind": "demo", "max_items": 120, "page_size": 8 }
//   { "kind": "http", "base_url": "https://feed.example/search" }
//
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    Demo(DemoSourceConfig),
    Http(HttpSourceConfig),
}

#[derive(Debug, Deserialize, Clone)]
pub struct DemoSourceConfig {
    /// Items available per feed before it is exhausted
    #[serde(default = "default_demo_max_items")]
    pub max_items: usize,

    /// Upper bound on items revealed per step
    #[serde(default = "default_demo_page_size")]
    pub page_size: usize,
}

fn default_demo_max_items() -> usize {
    120
}

fn default_demo_page_size() -> usize {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpSourceConfig {
    /// Search endpoint; query, mode and cursor are appended as parameters
    pub base_url: String,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// JSON member holding the item array of a page
    #[serde(default = "default_items_path")]
    pub items_path: String,

    /// JSON member holding the next-page cursor (absent or null = last page)
    #[serde(default = "default_cursor_path")]
    pub cursor_path: String,

    /// Item members mapped onto record fields
    #[serde(default)]
    pub fields: FieldMap,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FieldMap {
    pub key: String,
    pub label: String,
    pub flag: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            key: "url".to_string(),
            label: "name".to_string(),
            flag: "verified".to_string(),
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_items_path() -> String {
    "items".to_string()
}

fn default_cursor_path() -> String {
    "next".to_string()
}

// ------------------------------------------------------------
// Debug configuration
// ------------------------------------------------------------
#[derive(Debug, Deserialize, Clone)]
pub struct DebugConfig {
    /// Raises the default log level to `debug`
    pub log: Option<bool>,

    /// Seconds between metrics snapshots (default 10)
    pub metrics_interval_secs: Option<u64>,
}

/// Reads a JSON configuration file from disk.
pub fn load_config(path: &str) -> anyhow::Result<Config> {
    let data = fs::read_to_string(path)?;
    let cfg = serde_json::from_str(&data)?;
    Ok(cfg)
}
