//! Batched Update Processing
//!
//! Decouples the network receive task from conversion work. The receive task
//! only enqueues raw updates; a periodic tick drains the queue under a dual
//! budget - a wall-clock ceiling and a maximum item count - so a feed burst
//! cannot starve the timer or hold a lock across a whole burst. Whichever
//! budget is hit first stops that drain; the remainder waits for the next
//! tick.
//!
//! Each drained update expands into exactly two bars (call leg, put leg)
//! which are forwarded to the configured [`BarSink`]. A conversion failure
//! skips that one record and never aborts the rest of the batch.
//!
//! There is no backpressure: if the enqueue rate sustainably exceeds the
//! drain budget the queue grows without bound. Queue depth is exported as a
//! gauge so the condition is observable.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use tokio_util::sync::CancellationToken;

use crate::application::ports::BarSink;
use crate::domain::bar::{Bar, Greeks, TheoBar};
use crate::domain::contract::{ContractKey, OptionRight};
use crate::infrastructure::stream::TheoUpdate;

// =============================================================================
// Errors
// =============================================================================

/// A well-framed record failed domain conversion.
///
/// Conversion errors are per-record: logged, counted, and skipped.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// A numeric field was NaN, infinite, or out of `Decimal` range.
    #[error("field {0} is not representable as a decimal")]
    NonFiniteValue(&'static str),

    /// The underlying identifier was empty.
    #[error("update carries an empty underlying identifier")]
    EmptyUnderlying,
}

// =============================================================================
// Configuration
// =============================================================================

/// Budgets for the periodic drain.
#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    /// Interval between drains.
    pub tick_interval: Duration,
    /// Wall-clock ceiling for one drain, leaving headroom before the next
    /// tick.
    pub time_budget: Duration,
    /// Maximum records converted in one drain.
    pub max_items: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(500),
            time_budget: Duration::from_millis(450),
            max_items: 1000,
        }
    }
}

// =============================================================================
// Batch Processor
// =============================================================================

/// Outcome of a single drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Records successfully expanded.
    pub processed: usize,
    /// Records skipped due to conversion failure.
    pub failed: usize,
    /// Records still queued when a budget stopped the drain.
    pub deferred: usize,
}

/// Buffers raw updates and periodically expands them into theo bars.
pub struct BatchProcessor {
    queue: Mutex<VecDeque<TheoUpdate>>,
    config: BatchConfig,
    sink: Arc<dyn BarSink>,
}

impl BatchProcessor {
    /// Create a processor delivering expanded bars to `sink`.
    #[must_use]
    pub fn new(config: BatchConfig, sink: Arc<dyn BarSink>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            config,
            sink,
        }
    }

    /// Enqueue one raw update. Called from the network receive task; only
    /// the queue lock is taken.
    pub fn enqueue(&self, update: TheoUpdate) {
        let depth = {
            let mut queue = self.queue.lock();
            queue.push_back(update);
            queue.len()
        };
        metrics::counter!("theo_feed_updates_enqueued_total").increment(1);
        metrics::gauge!("theo_feed_queue_depth").set(depth as f64);
    }

    /// Number of updates currently queued.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.queue.lock().len()
    }

    /// Drain the queue once under the configured budgets.
    ///
    /// The queue lock is held per pop, not across conversions, so the
    /// network task is never blocked for a whole batch.
    pub fn drain_once(&self) -> DrainReport {
        let started = Instant::now();
        let mut report = DrainReport::default();

        while report.processed + report.failed < self.config.max_items
            && started.elapsed() < self.config.time_budget
        {
            let Some(update) = self.queue.lock().pop_front() else {
                break;
            };

            match expand_update(&update) {
                Ok([call, put]) => {
                    self.sink.deliver(call);
                    self.sink.deliver(put);
                    report.processed += 1;
                    metrics::counter!("theo_feed_bars_dispatched_total").increment(2);
                }
                Err(e) => {
                    report.failed += 1;
                    metrics::counter!("theo_feed_conversion_errors_total").increment(1);
                    tracing::warn!(
                        error = %e,
                        underlying = %update.underlying,
                        strike = update.strike,
                        "Skipping unconvertible update"
                    );
                }
            }
        }

        let deferred = self.queue.lock().len();
        report.deferred = deferred;
        metrics::gauge!("theo_feed_queue_depth").set(deferred as f64);

        if report.deferred > 0 {
            tracing::debug!(
                processed = report.processed,
                deferred = report.deferred,
                "Drain budget reached, deferring remainder"
            );
        }

        report
    }

    /// Run the periodic drain loop until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut tick = tokio::time::interval(self.config.tick_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("Batch processor cancelled");
                    return;
                }
                _ = tick.tick() => {
                    self.drain_once();
                }
            }
        }
    }
}

// =============================================================================
// Conversion
// =============================================================================

/// Expand one raw update into its call and put leg bars.
///
/// Both bars share underlying, strike, expiry, and timestamp; they differ
/// only in right and per-leg fields.
///
/// # Errors
///
/// Fails when a numeric field cannot be represented as a decimal or the
/// underlying identifier is empty.
pub fn expand_update(update: &TheoUpdate) -> Result<[TheoBar; 2], ConversionError> {
    if update.underlying.is_empty() {
        return Err(ConversionError::EmptyUnderlying);
    }

    let strike = decimal(update.strike, "strike")?;
    let expiry = DateTime::from_timestamp_nanos(update.expiry_ns);
    let time = DateTime::from_timestamp_nanos(update.timestamp_ns);

    let call = leg_bar(update, strike, expiry, time, OptionRight::Call)?;
    let put = leg_bar(update, strike, expiry, time, OptionRight::Put)?;
    Ok([call, put])
}

#[allow(clippy::similar_names)]
fn leg_bar(
    update: &TheoUpdate,
    strike: Decimal,
    expiry: DateTime<Utc>,
    time: DateTime<Utc>,
    right: OptionRight,
) -> Result<TheoBar, ConversionError> {
    let (bid_price, ask_price, bid_size, ask_size, theo, delta, gamma, vega, theta, oi) =
        match right {
            OptionRight::Call => (
                decimal(update.bid_price_call, "bid_price_call")?,
                decimal(update.ask_price_call, "ask_price_call")?,
                decimal(update.bid_size_call, "bid_size_call")?,
                decimal(update.ask_size_call, "ask_size_call")?,
                decimal(update.fit_price_call, "fit_price_call")?,
                decimal(update.fit_delta_call, "fit_delta_call")?,
                decimal(update.fit_gamma_call, "fit_gamma_call")?,
                decimal(update.fit_vega_call, "fit_vega_call")?,
                decimal(update.fit_theta_call, "fit_theta_call")?,
                decimal(update.open_interest_call, "open_interest_call")?,
            ),
            OptionRight::Put => (
                decimal(update.bid_price_put, "bid_price_put")?,
                decimal(update.ask_price_put, "ask_price_put")?,
                decimal(update.bid_size_put, "bid_size_put")?,
                decimal(update.ask_size_put, "ask_size_put")?,
                decimal(update.fit_price_put, "fit_price_put")?,
                decimal(update.fit_delta_put, "fit_delta_put")?,
                decimal(update.fit_gamma_put, "fit_gamma_put")?,
                decimal(update.fit_vega_put, "fit_vega_put")?,
                decimal(update.fit_theta_put, "fit_theta_put")?,
                decimal(update.open_interest_put, "open_interest_put")?,
            ),
        };

    Ok(TheoBar {
        key: ContractKey::new(update.underlying.clone(), strike, expiry, right),
        time,
        end_time: time,
        bid: Bar::from_price(bid_price),
        ask: Bar::from_price(ask_price),
        last_bid_size: bid_size,
        last_ask_size: ask_size,
        theoretical_value: theo,
        implied_volatility: decimal(update.vol, "vol")?,
        greeks: Greeks::from_feed(delta, gamma, vega, theta),
        open_interest: oi,
        forward: decimal(update.forward, "forward")?,
        discount: decimal(update.discount, "discount")?,
        moneyness: decimal(update.moneyness, "moneyness")?,
        time_to_expiry: decimal(update.time_to_expiry, "time_to_expiry")?,
    })
}

fn decimal(value: f64, field: &'static str) -> Result<Decimal, ConversionError> {
    Decimal::from_f64(value).ok_or(ConversionError::NonFiniteValue(field))
}

// =============================================================================
// Tests
// =============================================================================
