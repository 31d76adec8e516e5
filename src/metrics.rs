use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Global runtime metrics for the collector.
///
/// Purpose:
/// - Track unit outcomes (started / succeeded / failed / interrupted)
/// - Track scroll pacing (iterations, growth timeouts, stop reasons)
/// - Track throughput (records collected, field fallbacks)
///
/// Design:
/// - Lock-free (Atomics)
/// - Safe in async + multithreaded contexts
#[derive(Default)]
pub struct RuntimeMetrics {
    // Units
    pub units_started: AtomicUsize,
    pub units_succeeded: AtomicUsize,
    pub units_failed: AtomicUsize,
    pub units_interrupted: AtomicUsize,

    // Sessions
    pub sessions_opened: AtomicUsize,
    pub sessions_released: AtomicUsize,

    // Scrolling
    pub scroll_iterations: AtomicUsize,
    pub growth_timeouts: AtomicUsize,
    pub stagnation_stops: AtomicUsize,
    pub limit_stops: AtomicUsize,

    // Throughput
    pub records_collected: AtomicUsize,
    pub field_fallbacks: AtomicUsize,
}

impl RuntimeMetrics {
    /// One-line snapshot for periodic logging.
    pub fn summary(&self) -> String {
        format!(
            "units={} ok={} failed={} interrupted={} sessions={}/{} scrolls={} growth_timeouts={} stagnant={} capped={} records={} field_fallbacks={}",
            self.units_started.load(Ordering::Relaxed),
            self.units_succeeded.load(Ordering::Relaxed),
            self.units_failed.load(Ordering::Relaxed),
            self.units_interrupted.load(Ordering::Relaxed),
            self.sessions_released.load(Ordering::Relaxed),
            self.sessions_opened.load(Ordering::Relaxed),
            self.scroll_iterations.load(Ordering::Relaxed),
            self.growth_timeouts.load(Ordering::Relaxed),
            self.stagnation_stops.load(Ordering::Relaxed),
            self.limit_stops.load(Ordering::Relaxed),
            self.records_collected.load(Ordering::Relaxed),
            self.field_fallbacks.load(Ordering::Relaxed),
        )
    }
}

/// Global metrics registry (singleton)
pub static METRICS: Lazy<Arc<RuntimeMetrics>> =
    Lazy::new(|| Arc::new(RuntimeMetrics::default()));
