//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations behind the application-layer ports.

/// TCP stream client, framing, and wire codec.
pub mod stream;

/// Batched conversion of raw updates into theo bars.
pub mod batch;

/// Subscription registry and per-contract delivery queues.
pub mod registry;

/// Configuration loaded from the environment.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Tracing subscriber initialization.
pub mod telemetry;
