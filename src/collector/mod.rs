//! Collector module
//!
//! This module groups the collection engine:
//! - `scroller`:    drives one feed until it stops growing
//! - `runner`:      one (query, variant) unit with its own session and outcome
//! - `coordinator`: concurrent fan-out per query and across queries
//! - `aggregate`:   first-seen-wins merge of datasets
//! - `progress`:    per-iteration observer hook
//!
//! Design notes:
//! - Source-specific logic MUST NOT live here
//! - Units never share mutable state; the only synchronization point is
//!   the join before each merge

pub mod aggregate;
pub mod coordinator;
pub mod progress;
pub mod runner;
pub mod scroller;

use std::time::Duration;

use serde::Serialize;

use crate::config::{CollectionConfig, UnresolvedKeys};
use crate::error::CollectError;
use crate::feeds::source::FeedVariant;

/// Identifies one unit of concurrent work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TaskDescriptor {
    pub query: String,
    pub variant: FeedVariant,
    pub scroll_limit: usize,
}

/// Pacing of a single scroller run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollSettings {
    pub scroll_limit: usize,
    pub stagnation_threshold: usize,
    pub growth_timeout: Duration,
    pub fallback_delay: Duration,
    pub unresolved_keys: UnresolvedKeys,
}

/// Validated engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorSettings {
    pub scroll: ScrollSettings,
    pub navigation_timeout: Duration,
    pub initial_content_timeout: Duration,

    /// `None` = one concurrent unit per (query, variant), unbounded
    pub max_concurrent_units: Option<usize>,
}

impl CollectorSettings {
    /// Checks the raw collection block and converts it into engine settings.
    ///
    /// Queries are checked separately by `Collector::collect`.
    pub fn from_config(cfg: &CollectionConfig) -> Result<Self, CollectError> {
        let scroll_limit = usize::try_from(cfg.scroll_limit)
            .map_err(|_| CollectError::NegativeScrollLimit(cfg.scroll_limit))?;

        if cfg.stagnation_threshold == 0 {
            return Err(CollectError::ZeroStagnationThreshold);
        }
        if cfg.max_concurrent_units == Some(0) {
            return Err(CollectError::ZeroConcurrency);
        }

        Ok(Self {
            scroll: ScrollSettings {
                scroll_limit,
                stagnation_threshold: cfg.stagnation_threshold,
                growth_timeout: Duration::from_millis(cfg.growth_timeout_ms),
                fallback_delay: Duration::from_millis(cfg.fallback_delay_ms),
                unresolved_keys: cfg.unresolved_keys,
            },
            navigation_timeout: Duration::from_millis(cfg.navigation_timeout_ms),
            initial_content_timeout: Duration::from_millis(cfg.initial_content_timeout_ms),
            max_concurrent_units: cfg.max_concurrent_units,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_scroll_limit_is_rejected() {
        let cfg = CollectionConfig::new(vec!["q".into()], -3);
        assert_eq!(
            CollectorSettings::from_config(&cfg),
            Err(CollectError::NegativeScrollLimit(-3))
        );
    }

    #[test]
    fn zero_limits_are_rejected() {
        let mut cfg = CollectionConfig::new(vec![], 1);
        cfg.max_concurrent_units = Some(0);
        assert_eq!(
            CollectorSettings::from_config(&cfg),
            Err(CollectError::ZeroConcurrency)
        );

        let mut cfg = CollectionConfig::new(vec![], 1);
        cfg.stagnation_threshold = 0;
        assert_eq!(
            CollectorSettings::from_config(&cfg),
            Err(CollectError::ZeroStagnationThreshold)
        );
    }

    #[test]
    fn zero_scroll_limit_is_valid() {
        let settings =
            CollectorSettings::from_config(&CollectionConfig::new(vec![], 0)).unwrap();
        assert_eq!(settings.scroll.scroll_limit, 0);
        assert_eq!(settings.scroll.growth_timeout, Duration::from_secs(3));
        assert_eq!(settings.navigation_timeout, Duration::from_secs(30));
    }
}
