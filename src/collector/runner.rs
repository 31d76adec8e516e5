use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;

use futures_util::FutureExt;
use log::{info, warn};
use tokio::time::timeout;

use crate::error::SourceError;
use crate::feeds::source::{ContentSource, FeedSession};
use crate::metrics::METRICS;
use crate::schema::Dataset;

use super::progress::ProgressObserver;
use super::scroller::{ScrollOutcome, Scroller, StopReason};
use super::{CollectorSettings, TaskDescriptor};

/// Result of one (query, variant) unit: either a dataset or a failure,
/// never both.
#[derive(Debug, Clone)]
pub enum UnitResult {
    Collected {
        dataset: Dataset,
        iterations: usize,
        stop: StopReason,
    },
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub descriptor: TaskDescriptor,
    pub result: UnitResult,
}

impl TaskOutcome {
    pub fn failed(descriptor: TaskDescriptor, cause: impl ToString) -> Self {
        Self {
            descriptor,
            result: UnitResult::Failed(cause.to_string()),
        }
    }

    /// The collected dataset; `None` for a failed unit, which merges
    /// as an empty dataset.
    pub fn dataset(&self) -> Option<&Dataset> {
        match &self.result {
            UnitResult::Collected { dataset, .. } => Some(dataset),
            UnitResult::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match &self.result {
            UnitResult::Collected { .. } => None,
            UnitResult::Failed(cause) => Some(cause),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure().is_some()
    }
}

/// Runs one unit end to end:
/// open session → navigate → wait for initial content → scroll → release.
///
/// GUARANTEES:
/// - Never returns an error; failures become a failed `TaskOutcome`
/// - The session is released on every path once it was opened
///
/// Per-item field failures never reach this level, the scroller
/// absorbs them.
pub async fn run_variant(
    source: &dyn ContentSource,
    descriptor: TaskDescriptor,
    settings: &CollectorSettings,
    observer: &dyn ProgressObserver,
) -> TaskOutcome {
    METRICS.units_started.fetch_add(1, Ordering::Relaxed);
    let target = source.target_for(&descriptor.query, descriptor.variant);

    let mut session = match source.open_session().await {
        Ok(session) => session,
        Err(e) => return fail(descriptor, e),
    };
    METRICS.sessions_opened.fetch_add(1, Ordering::Relaxed);

    // A panic inside the scroll loop (or the observer) must not skip release
    let run = drive(session.as_mut(), &target, &descriptor, settings, observer);
    let result = AssertUnwindSafe(run)
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(SourceError::Panicked(panic_message(payload.as_ref()))));

    session.release().await;
    METRICS.sessions_released.fetch_add(1, Ordering::Relaxed);

    match result {
        Ok(ScrollOutcome {
            dataset,
            iterations,
            stop,
        }) => {
            METRICS.units_succeeded.fetch_add(1, Ordering::Relaxed);
            if let StopReason::Interrupted(cause) = &stop {
                warn!(
                    "[{} {}] interrupted after {} scrolls, keeping {} records: {}",
                    descriptor.query,
                    descriptor.variant,
                    iterations,
                    dataset.len(),
                    cause
                );
            } else {
                info!(
                    "[{} {}] total scraped posts: {}",
                    descriptor.query,
                    descriptor.variant,
                    dataset.len()
                );
            }
            TaskOutcome {
                descriptor,
                result: UnitResult::Collected {
                    dataset,
                    iterations,
                    stop,
                },
            }
        }
        Err(e) => fail(descriptor, e),
    }
}

async fn drive(
    session: &mut dyn FeedSession,
    target: &str,
    descriptor: &TaskDescriptor,
    settings: &CollectorSettings,
    observer: &dyn ProgressObserver,
) -> Result<ScrollOutcome, SourceError> {
    timeout(settings.navigation_timeout, session.navigate(target))
        .await
        .map_err(|_| SourceError::NavigationTimeout(settings.navigation_timeout))??;

    let wait = settings.initial_content_timeout;
    timeout(wait, session.wait_for_initial_content(wait))
        .await
        .map_err(|_| SourceError::InitialContentTimeout(wait))??;

    Ok(Scroller::new(&settings.scroll, descriptor, observer)
        .run(session)
        .await)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn fail(descriptor: TaskDescriptor, cause: SourceError) -> TaskOutcome {
    METRICS.units_failed.fetch_add(1, Ordering::Relaxed);
    warn!(
        "[{} {}] unit failed: {}",
        descriptor.query, descriptor.variant, cause
    );
    TaskOutcome::failed(descriptor, cause)
}
