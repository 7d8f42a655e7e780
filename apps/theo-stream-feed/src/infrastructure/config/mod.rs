//! Configuration Module
//!
//! Configuration loading for the feed service.

mod settings;

pub use settings::{ConfigError, ConsolidationSettings, FeedConfig, ServerSettings};
