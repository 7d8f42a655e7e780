//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the feed service that wires the pipeline together and
//! the port interfaces between its stages.

/// Port interfaces between pipeline stages.
pub mod ports;

/// Feed orchestration service.
pub mod services;
