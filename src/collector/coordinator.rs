use std::sync::Arc;

use futures_util::future::join_all;
use log::{info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::error::CollectError;
use crate::feeds::source::{ContentSource, FeedVariant};
use crate::report::{CollectionReport, QueryResult, UnitReport};
use crate::util;

use super::aggregate;
use super::progress::{LogProgress, ProgressObserver};
use super::runner::{run_variant, TaskOutcome};
use super::{CollectorSettings, TaskDescriptor};

/// Runs every (query, variant) unit concurrently and folds the results.
///
/// DESIGN:
/// - One query → one unit per `FeedVariant`, all spawned at once
/// - All queries run at once; each unit is its own tokio task
/// - Join-all before every merge: variants first, then queries
/// - Failures are isolated per unit; a failed unit merges as empty
///
/// With `max_concurrent_units` set, a shared semaphore bounds how many
/// units hold a session at the same time. Without it the fan-out width
/// is 2 × number of queries.
pub struct Collector {
    source: Arc<dyn ContentSource>,
    settings: Arc<CollectorSettings>,
    observer: Arc<dyn ProgressObserver>,
    limiter: Option<Arc<Semaphore>>,
}

impl Collector {
    pub fn new(source: Arc<dyn ContentSource>, settings: CollectorSettings) -> Self {
        let limiter = settings
            .max_concurrent_units
            .map(|n| Arc::new(Semaphore::new(n)));

        Self {
            source,
            settings: Arc::new(settings),
            observer: Arc::new(LogProgress),
            limiter,
        }
    }

    /// Replaces the default logging observer.
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Collects all queries and merges them into one dataset.
    ///
    /// Queries are whitespace-normalized first; a blank query rejects the
    /// whole run before any unit starts. An empty list yields an empty report.
    pub async fn collect(&self, queries: &[String]) -> Result<CollectionReport, CollectError> {
        let queries = queries
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                let query = util::normalize_query(raw);
                if query.is_empty() {
                    Err(CollectError::BlankQuery { index })
                } else {
                    Ok(query)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let started_at = util::now_ms();
        info!(
            "collecting {} queries from '{}' (scroll limit {})",
            queries.len(),
            self.source.name(),
            self.settings.scroll.scroll_limit
        );

        let per_query = join_all(queries.into_iter().map(|q| self.collect_query(q))).await;
        let dataset = aggregate::merge(per_query.iter().map(|q| &q.dataset));

        info!("Total unique posts from all queries: {}", dataset.len());
        Ok(CollectionReport::new(
            per_query,
            dataset,
            started_at,
            util::now_ms(),
        ))
    }

    /// Runs all variants of one query concurrently and merges them.
    pub async fn collect_query(&self, query: String) -> QueryResult {
        let units: Vec<(TaskDescriptor, JoinHandle<TaskOutcome>)> = FeedVariant::ALL
            .iter()
            .map(|&variant| {
                let descriptor = TaskDescriptor {
                    query: query.clone(),
                    variant,
                    scroll_limit: self.settings.scroll.scroll_limit,
                };
                (descriptor.clone(), self.spawn_unit(descriptor))
            })
            .collect();

        let outcomes: Vec<TaskOutcome> = join_all(units.into_iter().map(
            |(descriptor, handle)| async move {
                match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(
                            "[{} {}] unit task aborted: {}",
                            descriptor.query, descriptor.variant, e
                        );
                        TaskOutcome::failed(descriptor, format!("unit task aborted: {e}"))
                    }
                }
            },
        ))
        .await;

        let dataset = aggregate::merge_outcomes(&outcomes);
        info!("[{}] Total unique posts: {}", query, dataset.len());

        QueryResult {
            query,
            units: outcomes.iter().map(UnitReport::from).collect(),
            dataset,
        }
    }

    fn spawn_unit(&self, descriptor: TaskDescriptor) -> JoinHandle<TaskOutcome> {
        let source = self.source.clone();
        let settings = self.settings.clone();
        let observer = self.observer.clone();
        let limiter = self.limiter.clone();

        tokio::spawn(async move {
            // Held until the unit has released its session
            let _permit = match limiter {
                Some(limiter) => limiter.acquire_owned().await.ok(),
                None => None,
            };
            run_variant(source.as_ref(), descriptor, &settings, observer.as_ref()).await
        })
    }
}
