//! Domain Layer - Core theoretical bar types and consolidation logic.
//!
//! This layer contains the pure domain types for the options theo feed
//! with no I/O dependencies.

/// Option contract identity (underlying, strike, expiry, right).
pub mod contract;

/// Theoretical bar and Greeks value types.
pub mod bar;

/// Per-contract time-window consolidation.
pub mod consolidator;
