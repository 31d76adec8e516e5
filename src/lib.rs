// ------------------------------------------------------------
// Module declarations
// ------------------------------------------------------------
//
// Each module represents a well-defined responsibility:
//
// - config:    Configuration structs loaded from JSON
// - schema:    Record / Dataset model
// - error:     Typed errors for the engine boundary, sessions and fields
// - feeds:     Content source capability and bundled sources
// - collector: Scroll loop, unit runner, fan-out and merge
// - report:    Final dataset plus per-query / per-unit diagnostics
// - metrics:   Global runtime counters
// - util:      Shared helpers
//
pub mod collector;
pub mod config;
pub mod error;
pub mod feeds;
pub mod metrics;
pub mod report;
pub mod schema;
pub mod util;

pub use collector::coordinator::Collector;
pub use collector::progress::{LogProgress, ProgressObserver, ScrollProgress};
pub use collector::{CollectorSettings, TaskDescriptor};
pub use error::{CollectError, FieldError, SourceError};
pub use feeds::source::{ContentSource, FeedSession, FeedVariant};
pub use report::CollectionReport;
pub use schema::{Dataset, Record, UNRESOLVED};
