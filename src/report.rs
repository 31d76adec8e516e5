use serde::Serialize;

use crate::collector::runner::{TaskOutcome, UnitResult};
use crate::collector::scroller::StopReason;
use crate::feeds::source::FeedVariant;
use crate::schema::Dataset;

// ------------------------------------------------------------
// Unit report
// ------------------------------------------------------------
//
// Diagnostic line for one (query, variant) unit. Failed units are
// listed explicitly so a lower total can be explained.
//
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct UnitReport {
    pub query: String,
    pub variant: FeedVariant,

    /// Unique records this unit collected on its own
    pub collected: usize,

    pub iterations: usize,

    /// `None` for failed units
    pub stop: Option<StopReason>,

    /// Cause of failure, `None` for units that collected
    pub failure: Option<String>,
}

impl From<&TaskOutcome> for UnitReport {
    fn from(outcome: &TaskOutcome) -> Self {
        let (collected, iterations, stop, failure) = match &outcome.result {
            UnitResult::Collected {
                dataset,
                iterations,
                stop,
            } => (dataset.len(), *iterations, Some(stop.clone()), None),
            UnitResult::Failed(cause) => (0, 0, None, Some(cause.clone())),
        };

        Self {
            query: outcome.descriptor.query.clone(),
            variant: outcome.descriptor.variant,
            collected,
            iterations,
            stop,
            failure,
        }
    }
}

// ------------------------------------------------------------
// Query result
// ------------------------------------------------------------
//
// Merge of all variants of one query, in `FeedVariant::ALL` order.
//
#[derive(Debug, Serialize, Clone)]
pub struct QueryResult {
    pub query: String,
    pub units: Vec<UnitReport>,
    pub dataset: Dataset,
}

// ------------------------------------------------------------
// Collection report
// ------------------------------------------------------------
//
// Final result of a collection run: the globally merged dataset plus
// per-query and per-unit diagnostics.
//
#[derive(Debug, Serialize, Clone)]
pub struct CollectionReport {
    pub started_at_ms: i64,
    pub finished_at_ms: i64,
    pub total: usize,
    pub queries: Vec<QueryResult>,
    pub dataset: Dataset,
}

impl CollectionReport {
    pub fn new(
        queries: Vec<QueryResult>,
        dataset: Dataset,
        started_at_ms: i64,
        finished_at_ms: i64,
    ) -> Self {
        Self {
            started_at_ms,
            finished_at_ms,
            total: dataset.len(),
            queries,
            dataset,
        }
    }

    /// Total unique records across all queries.
    pub fn total(&self) -> usize {
        self.dataset.len()
    }

    pub fn units(&self) -> impl Iterator<Item = &UnitReport> {
        self.queries.iter().flat_map(|q| q.units.iter())
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitReport> {
        self.units().filter(|u| u.failure.is_some())
    }

    pub fn query(&self, query: &str) -> Option<&QueryResult> {
        self.queries.iter().find(|q| q.query == query)
    }
}
