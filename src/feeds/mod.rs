//! Content source registry and factory
//!
//! This module provides:
//! - The `ContentSource` / `FeedSession` capability the engine drives
//! - The bundled source implementations
//! - A factory resolving a source from configuration
//!
//! All rendering and extraction details must live in source modules.
//! The engine interacts exclusively through the traits in `source`.

pub mod demo;
pub mod http;
pub mod scripted;
pub mod source;

use std::sync::Arc;

use crate::config::SourceConfig;
use crate::error::SourceError;

use source::ContentSource;

/// Builds the content source selected by `cfg`.
///
/// THREADING:
/// - Sources are wrapped in `Arc`
/// - The same instance is shared by every concurrent unit; isolation
///   comes from the sessions it hands out
pub fn get_source(cfg: &SourceConfig) -> Result<Arc<dyn ContentSource>, SourceError> {
    match cfg {
        SourceConfig::Demo(demo) => Ok(Arc::new(demo::DemoSource::new(demo.clone()))),
        SourceConfig::Http(http) => Ok(Arc::new(http::HttpFeedSource::new(http.clone())?)),
    }
}
