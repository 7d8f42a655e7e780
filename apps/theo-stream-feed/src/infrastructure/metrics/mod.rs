//! Prometheus Metrics Module
//!
//! Exposes feed pipeline metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Stream**: frames received from the upstream server
//! - **Batch**: update queue depth, bars dispatched, conversion failures
//! - **Subscriptions**: active subscription count, dropped bars
//!
//! Metric call sites live next to the instrumented code; this module owns
//! recorder installation and metric descriptions.

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// =============================================================================
// Recorder Installation
// =============================================================================

/// Initialize the Prometheus metrics recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime; the scrape endpoint serves
/// `/metrics` on the given port. A port of 0 disables metrics entirely and
/// metric calls become no-ops against the default recorder.
///
/// # Errors
///
/// Returns an error if a recorder is already installed or the listener
/// cannot bind.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    if port == 0 {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()?;

    register_metrics();
    Ok(())
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Stream counters
    describe_counter!(
        "theo_feed_frames_total",
        "Total frames received from the theo server"
    );

    // Batch pipeline
    describe_counter!(
        "theo_feed_updates_enqueued_total",
        "Total raw updates enqueued for batch processing"
    );
    describe_counter!(
        "theo_feed_bars_dispatched_total",
        "Total theo bars dispatched to the subscription registry"
    );
    describe_counter!(
        "theo_feed_conversion_errors_total",
        "Total raw updates skipped due to conversion failures"
    );
    describe_gauge!(
        "theo_feed_queue_depth",
        "Raw updates currently awaiting batch processing"
    );

    // Subscriptions
    describe_gauge!("theo_feed_subscriptions", "Number of active subscriptions");
    describe_counter!(
        "theo_feed_bars_dropped_total",
        "Total bars dropped for lack of a matching subscription"
    );
}
