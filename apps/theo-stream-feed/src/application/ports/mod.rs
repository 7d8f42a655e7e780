//! Port Interfaces
//!
//! Seams between pipeline stages, so each stage can be exercised against a
//! test double.
//!
//! - [`BarSink`]: where the batch processor delivers expanded bars. The
//!   subscription registry is the production implementation.

use crate::domain::bar::TheoBar;

/// Destination for expanded theo bars.
#[cfg_attr(test, mockall::automock)]
pub trait BarSink: Send + Sync {
    /// Deliver one bar. Delivery for an unsubscribed contract is a no-op,
    /// never an error.
    fn deliver(&self, bar: TheoBar);
}
