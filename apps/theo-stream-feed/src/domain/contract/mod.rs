//! Option Contract Identity
//!
//! A contract key uniquely identifies one option leg by
//! (underlying, strike, expiry, right). Keys are derived deterministically
//! from wire updates plus a chosen right, and are used for subscription
//! routing and per-contract consolidation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Option Right
// =============================================================================

/// The side (leg) of an option contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionRight {
    /// Call option.
    Call,
    /// Put option.
    Put,
}

impl OptionRight {
    /// Both rights, in call/put order.
    #[must_use]
    pub const fn both() -> [Self; 2] {
        [Self::Call, Self::Put]
    }

    /// Single-letter code used in option symbols.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "C",
            Self::Put => "P",
        }
    }
}

impl std::fmt::Display for OptionRight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Contract Key
// =============================================================================

/// Unique identity of one option leg.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractKey {
    /// Underlying identifier (e.g. "SPX").
    pub underlying: String,
    /// Strike price.
    pub strike: Decimal,
    /// Contract expiry.
    pub expiry: DateTime<Utc>,
    /// Call or put leg.
    pub right: OptionRight,
}

impl ContractKey {
    /// Create a new contract key.
    #[must_use]
    pub const fn new(
        underlying: String,
        strike: Decimal,
        expiry: DateTime<Utc>,
        right: OptionRight,
    ) -> Self {
        Self {
            underlying,
            strike,
            expiry,
            right,
        }
    }
}

impl std::fmt::Display for ContractKey {
    /// Renders an OCC-style symbol: `SPX240315C04500000`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // OCC strike field is price x 1000, zero-padded to 8 digits.
        let scaled = (self.strike * Decimal::from(1000)).trunc();
        write!(
            f,
            "{}{}{}{:0>8}",
            self.underlying,
            self.expiry.format("%y%m%d"),
            self.right,
            scaled
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
