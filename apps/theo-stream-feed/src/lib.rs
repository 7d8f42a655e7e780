#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Theo Stream Feed - Options Theoretical Value Pipeline
//!
//! A feed handler that maintains a single TCP connection to an options
//! theoretical-value server and turns its raw per-strike updates into
//! consolidated per-contract bars for downstream consumers.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core pricing types and consolidation logic
//!   - `contract`: Option contract identity (underlying, strike, expiry, right)
//!   - `bar`: OHLC bars, greeks, and the combined theo bar
//!   - `consolidator`: Time-window consolidation state machine
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Interfaces between pipeline stages
//!   - `services`: The feed service wiring the pipeline together
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `stream`: TCP client, varint framing, and the wire codec
//!   - `batch`: Budgeted batch expansion of raw updates
//!   - `registry`: Subscription registry and delivery queues
//!   - `config`: Configuration from environment variables
//!
//! # Data Flow
//!
//! ```text
//! Theo Server ──► TCP Client ──► Update Queue ──► Batch Drain
//!                                                      │
//!                             ┌────────────────────────┘
//!                             ▼
//!                  Subscription Registry ──► Consolidators ──► Per-key Queues
//!                                                                    │
//!                                                                    ▼
//!                                                          Consumers (drain/recv)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core pricing types with no external integrations.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::bar::{Bar, Greeks, TheoBar};
pub use domain::consolidator::TheoBarConsolidator;
pub use domain::contract::{ContractKey, OptionRight};

// Feed service
pub use application::services::{ServiceError, TheoFeedService};

// Infrastructure config
pub use infrastructure::config::{ConfigError, ConsolidationSettings, FeedConfig, ServerSettings};

// Subscription registry (for integration tests)
pub use infrastructure::registry::{
    SubscriptionHandle, SubscriptionKey, SubscriptionRegistry, WakeCallback,
};

// Stream client and wire types (for integration tests)
pub use infrastructure::stream::{
    ClientError, FrameReader, ProtocolError, StreamClientConfig, TheoStreamClient, TheoUpdate,
    encode_frame,
};

// Batch processing
pub use infrastructure::batch::{BatchConfig, BatchProcessor, ConversionError, DrainReport};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::init as init_telemetry;
