use log::info;

use super::TaskDescriptor;

/// Snapshot emitted once per scroll iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollProgress {
    /// 1-based iteration number
    pub iteration: usize,

    /// Items visible on the feed after this iteration
    pub visible: usize,

    /// Unique records collected so far by this unit
    pub collected: usize,
}

/// Progress hook for front ends.
///
/// Called from the unit's own task, so implementations must be cheap
/// and must not block.
pub trait ProgressObserver: Send + Sync {
    fn on_scroll(&self, descriptor: &TaskDescriptor, progress: ScrollProgress);
}

impl<F> ProgressObserver for F
where
    F: Fn(&TaskDescriptor, ScrollProgress) + Send + Sync,
{
    fn on_scroll(&self, descriptor: &TaskDescriptor, progress: ScrollProgress) {
        self(descriptor, progress)
    }
}

/// Default observer: one log line per iteration.
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_scroll(&self, descriptor: &TaskDescriptor, progress: ScrollProgress) {
        info!(
            "[{} {}] Scroll {} | Visible: {} | Total scraped: {}",
            descriptor.query,
            descriptor.variant,
            progress.iteration,
            progress.visible,
            progress.collected,
        );
    }
}
