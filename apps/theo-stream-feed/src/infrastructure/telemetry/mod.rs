//! Tracing Initialization
//!
//! Configures structured logging for the feed service.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: standard `tracing_subscriber` filter directives; the crate
//!   defaults to `info` when unset.
//!
//! # Usage
//!
//! ```ignore
//! use theo_stream_feed::infrastructure::telemetry;
//!
//! telemetry::init();
//! tracing::info!("Feed starting");
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the tracing subscriber.
#[allow(clippy::expect_used)]
pub fn init() {
    let env_filter = EnvFilter::from_default_env().add_directive(
        "theo_stream_feed=info"
            .parse()
            .expect("static directive 'theo_stream_feed=info' is valid"),
    );

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
