//! Time-Window Consolidation
//!
//! Folds successive `TheoBar` updates for one contract into a single bar per
//! time window. Windows are half-open: `[window start, window start + period)`.
//!
//! The consolidator is a two-state machine:
//!
//! - **Empty**: no working bar. The next update opens a window starting at the
//!   update's own timestamp.
//! - **Open**: a working bar is accumulating. Updates inside the window merge
//!   into it; an update at or past the window end closes the window and opens
//!   a new one at the update's timestamp (windows are not required to be
//!   contiguous).
//!
//! `scan` closes a window by clock instead of by data, so a contract whose
//! feed goes quiet still emits its last bar. Each window is emitted exactly
//! once; the closed bar is returned to the caller, which forwards it to the
//! delivery queue.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

use super::bar::TheoBar;

/// Per-contract time-window consolidator.
#[derive(Debug)]
pub struct TheoBarConsolidator {
    period: TimeDelta,
    working: Option<TheoBar>,
    window_end: DateTime<Utc>,
}

impl TheoBarConsolidator {
    /// Create a consolidator with the given window period.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self {
            period: TimeDelta::from_std(period).unwrap_or(TimeDelta::MAX),
            window_end: DateTime::<Utc>::MIN_UTC,
            working: None,
        }
    }

    /// The configured window period.
    #[must_use]
    pub const fn period(&self) -> TimeDelta {
        self.period
    }

    /// The working bar for the currently open window, if any.
    #[must_use]
    pub const fn working_bar(&self) -> Option<&TheoBar> {
        self.working.as_ref()
    }

    /// Fold one update into the consolidator.
    ///
    /// Returns the finished bar when the incoming update closes the current
    /// window, otherwise `None`.
    pub fn update(&mut self, bar: TheoBar) -> Option<TheoBar> {
        match self.working.take() {
            None => {
                self.start_window(bar);
                None
            }
            Some(working) if bar.time >= self.window_end => {
                let closed = self.close(working);
                self.start_window(bar);
                Some(closed)
            }
            Some(mut working) => {
                working.merge(&bar);
                self.working = Some(working);
                None
            }
        }
    }

    /// Close the open window by clock.
    ///
    /// Emits the working bar when `now` has reached the window end; the state
    /// returns to Empty. Driven by a host-provided clock tick, not by data.
    pub fn scan(&mut self, now: DateTime<Utc>) -> Option<TheoBar> {
        if now >= self.window_end {
            self.working.take().map(|working| self.close(working))
        } else {
            None
        }
    }

    fn start_window(&mut self, bar: TheoBar) {
        self.window_end = bar
            .time
            .checked_add_signed(self.period)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.working = Some(bar);
    }

    /// Stamp the window close on the outgoing bar.
    fn close(&self, mut bar: TheoBar) -> TheoBar {
        bar.end_time = self.window_end;
        bar
    }
}

// =============================================================================
// Tests
// =============================================================================
