use std::sync::atomic::Ordering;

use log::{debug, info};
use serde::Serialize;
use tokio::time::{sleep, timeout};

use crate::config::UnresolvedKeys;
use crate::error::SourceError;
use crate::feeds::source::{FeedSession, Growth, RawItem};
use crate::metrics::METRICS;
use crate::schema::{Dataset, Record, UNRESOLVED};

use super::progress::{ProgressObserver, ScrollProgress};
use super::{ScrollSettings, TaskDescriptor};

/// Why a scroller run ended. All three are normal completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `stagnation_threshold` consecutive iterations added nothing
    Stagnated,

    /// `scroll_limit` iterations ran
    LimitReached,

    /// The session failed mid-run; the records gathered so far are kept
    Interrupted(String),
}

/// Result of one scroller run.
#[derive(Debug, Clone)]
pub struct ScrollOutcome {
    pub dataset: Dataset,

    /// Completed iterations
    pub iterations: usize,

    pub stop: StopReason,
}

/// Drives one feed to completion.
///
/// The loop, per iteration:
/// - Trigger a reveal
/// - Wait for the visible count to exceed the collected count, or fall
///   back to a fixed delay
/// - Extract every visible item and keep the ones with an unseen key
/// - Stop after `stagnation_threshold` consecutive iterations without
///   new records, or after `scroll_limit` iterations
///
/// The dataset (and with it the seen-key set) is owned by the scroller
/// and never shared with other units.
pub struct Scroller<'a> {
    settings: &'a ScrollSettings,
    descriptor: &'a TaskDescriptor,
    observer: &'a dyn ProgressObserver,
    dataset: Dataset,
}

impl<'a> Scroller<'a> {
    pub fn new(
        settings: &'a ScrollSettings,
        descriptor: &'a TaskDescriptor,
        observer: &'a dyn ProgressObserver,
    ) -> Self {
        Self {
            settings,
            descriptor,
            observer,
            dataset: Dataset::new(),
        }
    }

    /// Runs against a session that is already on the feed with its
    /// initial content rendered.
    pub async fn run(mut self, session: &mut dyn FeedSession) -> ScrollOutcome {
        let mut last_count = 0;
        let mut stagnant = 0;
        let mut iterations = 0;

        while iterations < self.settings.scroll_limit {
            let visible = match self.step(session).await {
                Ok(visible) => visible,
                Err(e) => return self.finish(iterations, StopReason::Interrupted(e.to_string())),
            };
            iterations += 1;
            METRICS.scroll_iterations.fetch_add(1, Ordering::Relaxed);

            let current_count = self.dataset.len();
            self.observer.on_scroll(
                self.descriptor,
                ScrollProgress {
                    iteration: iterations,
                    visible,
                    collected: current_count,
                },
            );

            if current_count == last_count {
                stagnant += 1;
                if stagnant >= self.settings.stagnation_threshold {
                    info!(
                        "[{} {}] no new items after {} scrolls, stopping",
                        self.descriptor.query, self.descriptor.variant, stagnant
                    );
                    return self.finish(iterations, StopReason::Stagnated);
                }
            } else {
                stagnant = 0;
            }
            last_count = current_count;
        }

        self.finish(iterations, StopReason::LimitReached)
    }

    /// One reveal + extract cycle. Returns the visible item count.
    async fn step(&mut self, session: &mut dyn FeedSession) -> Result<usize, SourceError> {
        session.trigger_reveal().await?;

        // The source's own timeout is not trusted to fire
        let expected = self.dataset.len();
        let wait = self.settings.growth_timeout;
        let growth = timeout(wait, session.wait_for_growth(expected, wait))
            .await
            .unwrap_or(Growth::TimedOut);
        if growth == Growth::TimedOut {
            METRICS.growth_timeouts.fetch_add(1, Ordering::Relaxed);
            sleep(self.settings.fallback_delay).await;
        }

        let items = session.extract_visible_items().await?;
        let added = self.absorb(items);
        debug!(
            "[{} {}] +{} records",
            self.descriptor.query, self.descriptor.variant, added
        );

        session.visible_item_count().await
    }

    /// Appends every item whose key has not been recorded yet.
    fn absorb(&mut self, items: Vec<RawItem>) -> usize {
        let mut added = 0;
        for item in items {
            let Some(record) = resolve(item, self.settings.unresolved_keys) else {
                continue;
            };
            if self.dataset.insert(record) {
                added += 1;
            }
        }
        METRICS.records_collected.fetch_add(added, Ordering::Relaxed);
        added
    }

    fn finish(self, iterations: usize, stop: StopReason) -> ScrollOutcome {
        match stop {
            StopReason::Stagnated => METRICS.stagnation_stops.fetch_add(1, Ordering::Relaxed),
            StopReason::LimitReached => METRICS.limit_stops.fetch_add(1, Ordering::Relaxed),
            StopReason::Interrupted(_) => METRICS.units_interrupted.fetch_add(1, Ordering::Relaxed),
        };
        ScrollOutcome {
            dataset: self.dataset,
            iterations,
            stop,
        }
    }
}

/// Turns a raw item into a record, substituting defaults for fields
/// that could not be read.
///
/// Returns `None` only for an unreadable key under `UnresolvedKeys::Discard`.
pub fn resolve(item: RawItem, unresolved: UnresolvedKeys) -> Option<Record> {
    let mut fallbacks = 0;

    let key = match item.key {
        Ok(key) => key,
        Err(_) if unresolved == UnresolvedKeys::Discard => return None,
        Err(_) => {
            fallbacks += 1;
            UNRESOLVED.to_string()
        }
    };
    let label = item.label.unwrap_or_else(|_| {
        fallbacks += 1;
        UNRESOLVED.to_string()
    });
    let flag = item.flag.unwrap_or_else(|_| {
        fallbacks += 1;
        false
    });

    if fallbacks > 0 {
        METRICS.field_fallbacks.fetch_add(fallbacks, Ordering::Relaxed);
    }
    Some(Record { key, label, flag })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::collector::progress::LogProgress;
    use crate::error::FieldError;
    use crate::feeds::scripted::{FeedScript, ScriptedSource};
    use crate::feeds::source::{ContentSource, FeedVariant};

    fn settings(scroll_limit: usize) -> ScrollSettings {
        ScrollSettings {
            scroll_limit,
            stagnation_threshold: 3,
            growth_timeout: Duration::from_millis(5),
            fallback_delay: Duration::from_millis(1),
            unresolved_keys: UnresolvedKeys::Collapse,
        }
    }

    fn descriptor(scroll_limit: usize) -> TaskDescriptor {
        TaskDescriptor {
            query: "q".to_string(),
            variant: FeedVariant::Latest,
            scroll_limit,
        }
    }

    async fn scroll(
        script: FeedScript,
        settings: ScrollSettings,
    ) -> (ScrollOutcome, Vec<ScrollProgress>) {
        let source = ScriptedSource::new().with_feed("q", FeedVariant::Latest, script);
        let mut session = source.open_session().await.unwrap();
        session
            .navigate(&source.target_for("q", FeedVariant::Latest))
            .await
            .unwrap();

        let seen = Mutex::new(Vec::new());
        let observer = |_: &TaskDescriptor, p: ScrollProgress| seen.lock().unwrap().push(p);
        let descriptor = descriptor(settings.scroll_limit);
        let outcome = Scroller::new(&settings, &descriptor, &observer)
            .run(session.as_mut())
            .await;
        session.release().await;

        (outcome, seen.into_inner().unwrap())
    }

    #[tokio::test]
    async fn stops_after_three_stagnant_iterations() {
        // Growth on iterations 1 and 2, nothing new afterwards
        let script = FeedScript::keys(&[&["a", "b"], &["a", "b", "c", "d"]]);
        let (outcome, progress) = scroll(script, settings(10)).await;

        assert_eq!(outcome.stop, StopReason::Stagnated);
        assert_eq!(outcome.iterations, 5);
        assert_eq!(progress.len(), 5);
        assert_eq!(outcome.dataset.len(), 4);
    }

    #[tokio::test]
    async fn stops_at_scroll_limit_while_growing() {
        let (outcome, progress) = scroll(FeedScript::endless(3), settings(4)).await;

        assert_eq!(outcome.stop, StopReason::LimitReached);
        assert_eq!(outcome.iterations, 4);
        assert_eq!(outcome.dataset.len(), 12);
        assert_eq!(
            progress.last(),
            Some(&ScrollProgress {
                iteration: 4,
                visible: 12,
                collected: 12
            })
        );
    }

    #[tokio::test]
    async fn zero_limit_collects_nothing() {
        let (outcome, progress) = scroll(FeedScript::endless(3), settings(0)).await;

        assert_eq!(outcome.stop, StopReason::LimitReached);
        assert_eq!(outcome.iterations, 0);
        assert!(outcome.dataset.is_empty());
        assert!(progress.is_empty());
    }

    #[tokio::test]
    async fn overlapping_snapshots_keep_first_seen_order() {
        let script = FeedScript::keys(&[&["a", "b"], &["b", "c"]]);
        let (outcome, _) = scroll(script, settings(2)).await;

        assert_eq!(outcome.dataset.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn stagnation_counter_resets_on_growth() {
        // grow, stall, stall, grow, stall, stall, stall
        let script = FeedScript::keys(&[
            &["a"],
            &["a"],
            &["a"],
            &["a", "b"],
        ]);
        let (outcome, _) = scroll(script, settings(20)).await;

        assert_eq!(outcome.stop, StopReason::Stagnated);
        assert_eq!(outcome.iterations, 7);
        assert_eq!(outcome.dataset.len(), 2);
    }

    #[tokio::test]
    async fn session_failure_keeps_partial_dataset() {
        let script = FeedScript::endless(2).fail_reveal_at(3);
        let (outcome, _) = scroll(script, settings(10)).await;

        assert!(matches!(outcome.stop, StopReason::Interrupted(_)));
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.dataset.len(), 4);
    }

    #[tokio::test]
    async fn field_failures_become_defaults() {
        let broken = RawItem {
            key: Ok("/carol".to_string()),
            label: Err(FieldError::Missing("label")),
            flag: Err(FieldError::Missing("flag")),
        };
        let script = FeedScript::pages(vec![vec![broken]]);
        let (outcome, _) = scroll(script, settings(1)).await;

        let record = outcome.dataset.get("/carol").unwrap();
        assert_eq!(record.label, UNRESOLVED);
        assert!(!record.flag);
    }

    #[test]
    fn unresolved_key_policy() {
        let item = RawItem {
            key: Err(FieldError::Missing("key")),
            label: Ok("x".to_string()),
            flag: Ok(true),
        };

        let kept = resolve(item.clone(), UnresolvedKeys::Collapse).unwrap();
        assert!(kept.has_unresolved_key());
        assert!(kept.flag);

        assert!(resolve(item, UnresolvedKeys::Discard).is_none());
    }

    // Session with canned growth answers that records every wait.
    struct RecordingSession {
        pages: Vec<Vec<&'static str>>,
        answers: Vec<Option<Growth>>,
        reveals: usize,
        waits: Vec<usize>,
    }

    impl RecordingSession {
        /// `None` in `answers` means the wait never resolves.
        fn new(pages: Vec<Vec<&'static str>>, answers: Vec<Option<Growth>>) -> Self {
            Self {
                pages,
                answers,
                reveals: 0,
                waits: Vec::new(),
            }
        }

        fn page(&self) -> &[&'static str] {
            let last = self.pages.len() - 1;
            &self.pages[self.reveals.saturating_sub(1).min(last)]
        }
    }

    #[async_trait::async_trait]
    impl FeedSession for RecordingSession {
        async fn navigate(&mut self, _target: &str) -> Result<(), SourceError> {
            Ok(())
        }

        async fn wait_for_initial_content(
            &mut self,
            _timeout: Duration,
        ) -> Result<(), SourceError> {
            Ok(())
        }

        async fn trigger_reveal(&mut self) -> Result<(), SourceError> {
            self.reveals += 1;
            Ok(())
        }

        async fn wait_for_growth(&mut self, expected: usize, _timeout: Duration) -> Growth {
            self.waits.push(expected);
            let answer = self.answers.get(self.waits.len() - 1).copied().flatten();
            match answer {
                Some(growth) => growth,
                None => std::future::pending().await,
            }
        }

        async fn visible_item_count(&mut self) -> Result<usize, SourceError> {
            Ok(self.page().len())
        }

        async fn extract_visible_items(&mut self) -> Result<Vec<RawItem>, SourceError> {
            Ok(self
                .page()
                .iter()
                .map(|key| RawItem::new(key, key, false))
                .collect())
        }

        async fn release(&mut self) {}
    }

    fn paced(scroll_limit: usize) -> ScrollSettings {
        ScrollSettings {
            growth_timeout: Duration::from_secs(60),
            fallback_delay: Duration::from_secs(1),
            ..settings(scroll_limit)
        }
    }

    async fn scroll_recorded(
        session: &mut RecordingSession,
        settings: &ScrollSettings,
    ) -> ScrollOutcome {
        let descriptor = descriptor(settings.scroll_limit);
        Scroller::new(settings, &descriptor, &LogProgress)
            .run(session)
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn growth_wait_expects_collected_count() {
        let pages = vec![vec!["a", "b"], vec!["a", "b", "c"], vec!["c", "d", "e"]];
        let mut session = RecordingSession::new(pages, vec![Some(Growth::Grew); 4]);

        let outcome = scroll_recorded(&mut session, &paced(4)).await;

        assert_eq!(outcome.dataset.len(), 5);
        assert_eq!(session.waits, vec![0, 2, 3, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_delay_only_after_timed_out_wait() {
        let pages = vec![vec!["a"], vec!["a", "b"], vec!["a", "b", "c"], vec!["a", "b", "c", "d"]];
        let answers = vec![
            Some(Growth::Grew),
            Some(Growth::TimedOut),
            Some(Growth::Grew),
            Some(Growth::TimedOut),
        ];
        let mut session = RecordingSession::new(pages.clone(), answers);

        let started = Instant::now();
        let outcome = scroll_recorded(&mut session, &paced(4)).await;
        let elapsed = started.elapsed();

        assert_eq!(outcome.dataset.len(), 4);
        assert!(elapsed >= Duration::from_secs(2), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");

        let mut session = RecordingSession::new(pages, vec![Some(Growth::Grew); 4]);
        let started = Instant::now();
        scroll_recorded(&mut session, &paced(4)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn unresolved_growth_wait_is_cut_off() {
        let pages = vec![vec!["a"], vec!["a", "b"]];
        let mut session = RecordingSession::new(pages, Vec::new());

        let started = Instant::now();
        let outcome = scroll_recorded(&mut session, &paced(3)).await;

        assert_eq!(outcome.stop, StopReason::LimitReached);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.dataset.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(session.waits, vec![0, 1, 2]);
        // growth timeout plus fallback delay on every iteration
        assert!(started.elapsed() >= Duration::from_secs(3 * 61));
    }
}
