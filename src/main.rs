use std::time::Duration;

use anyhow::Context;
use env_logger::Env;
use log::{info, warn};
use tokio::time::sleep;

use feed_multi_collector::config::{load_config, Config};
use feed_multi_collector::feeds::get_source;
use feed_multi_collector::metrics::METRICS;
use feed_multi_collector::{Collector, CollectorSettings};

// ------------------------------------------------------------
// Application entry point
// ------------------------------------------------------------
//
// Responsibilities:
// - Load configuration (path from the first argument, default config.json)
// - Initialize logging
// - Build the content source and run every query
// - Report per-unit failures and print the merged report as JSON
//
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config: Config =
        load_config(&path).with_context(|| format!("failed to load config from {path}"))?;

    let debug_log = config
        .debug
        .as_ref()
        .is_some_and(|d| d.log.unwrap_or(false));
    env_logger::Builder::from_env(Env::default().default_filter_or(if debug_log {
        "debug"
    } else {
        "info"
    }))
    .init();

    // Validate before anything is opened
    let settings = CollectorSettings::from_config(&config.collection)?;
    let source = get_source(&config.source)?;

    // --------------------------------------------------------
    // Metrics reporter (periodic, low-noise)
    // --------------------------------------------------------
    let interval = config
        .debug
        .as_ref()
        .and_then(|d| d.metrics_interval_secs)
        .unwrap_or(10)
        .max(1);
    let reporter = tokio::spawn(async move {
        loop {
            sleep(Duration::from_secs(interval)).await;
            info!("[METRICS] {}", METRICS.summary());
        }
    });

    let collector = Collector::new(source, settings);
    let report = collector.collect(&config.collection.queries).await?;
    reporter.abort();

    for unit in report.units() {
        match &unit.failure {
            Some(cause) => warn!("[{} {}] FAILED: {}", unit.query, unit.variant, cause),
            None => info!(
                "[{} {}] {} records in {} scrolls ({:?})",
                unit.query, unit.variant, unit.collected, unit.iterations, unit.stop
            ),
        }
    }
    info!(
        "Completed: {} unique records, {} failed units",
        report.total(),
        report.failures().count()
    );
    info!("[METRICS] {}", METRICS.summary());

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
