//! Theoretical Bar Types
//!
//! A `TheoBar` is one contract-leg's quote and theoretical state over a time
//! window: bid/ask OHLC, last sizes, fitted theoretical value, implied
//! volatility, Greeks, open interest, and secondary fields carried through
//! from the most recent update.
//!
//! Bars are mutable while "working" (their window is still open) and treated
//! as immutable once emitted by the consolidator.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::contract::ContractKey;

// =============================================================================
// OHLC Bar
// =============================================================================

/// Open/high/low/close prices for one side of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bar {
    /// Opening price.
    pub open: Decimal,
    /// Highest price.
    pub high: Decimal,
    /// Lowest price.
    pub low: Decimal,
    /// Closing price.
    pub close: Decimal,
}

impl Bar {
    /// Create a bar with explicit OHLC values.
    #[must_use]
    pub const fn new(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Self {
        Self {
            open,
            high,
            low,
            close,
        }
    }

    /// Create a degenerate bar where all four values are one tick's price.
    #[must_use]
    pub const fn from_price(price: Decimal) -> Self {
        Self::new(price, price, price, price)
    }

    /// Extend this bar to cover a newer tick's close price.
    ///
    /// High and low widen to include the price; close becomes the price.
    /// The open never changes.
    pub fn extend(&mut self, price: Decimal) {
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.close = price;
    }
}

// =============================================================================
// Greeks
// =============================================================================

/// Option sensitivities fitted by the upstream pricer.
///
/// `rho` and `lambda` are reserved and always zero: the feed does not supply
/// them and this system does not compute Greeks itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Greeks {
    /// Sensitivity to underlying price.
    pub delta: Decimal,
    /// Rate of change of delta.
    pub gamma: Decimal,
    /// Sensitivity to implied volatility.
    pub vega: Decimal,
    /// Time decay.
    pub theta: Decimal,
    /// Sensitivity to interest rate (reserved, always zero).
    pub rho: Decimal,
    /// Leverage (reserved, always zero).
    pub lambda: Decimal,
}

impl Greeks {
    /// Build Greeks from the four feed-supplied sensitivities.
    #[must_use]
    pub const fn from_feed(delta: Decimal, gamma: Decimal, vega: Decimal, theta: Decimal) -> Self {
        Self {
            delta,
            gamma,
            vega,
            theta,
            rho: Decimal::ZERO,
            lambda: Decimal::ZERO,
        }
    }
}

// =============================================================================
// Theo Bar
// =============================================================================

/// One contract-leg's window-aggregated quote and theoretical state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TheoBar {
    /// Contract identity for this leg.
    pub key: ContractKey,
    /// Window start (time of the first update folded in).
    pub time: DateTime<Utc>,
    /// Window end. For a working bar this tracks the latest update; the
    /// consolidator stamps the window close on emission.
    pub end_time: DateTime<Utc>,
    /// Bid OHLC.
    pub bid: Bar,
    /// Ask OHLC.
    pub ask: Bar,
    /// Most recent bid size.
    pub last_bid_size: Decimal,
    /// Most recent ask size.
    pub last_ask_size: Decimal,
    /// Fitted theoretical value (latest observed).
    pub theoretical_value: Decimal,
    /// Implied volatility (latest observed).
    pub implied_volatility: Decimal,
    /// Fitted Greeks (latest observed).
    pub greeks: Greeks,
    /// Open interest (latest observed).
    pub open_interest: Decimal,
    /// Underlying forward price, carried through unchanged.
    pub forward: Decimal,
    /// Discount factor, carried through unchanged.
    pub discount: Decimal,
    /// Moneyness, carried through unchanged.
    pub moneyness: Decimal,
    /// Time to expiry in years, carried through unchanged.
    pub time_to_expiry: Decimal,
}

impl TheoBar {
    /// Fold a newer bar for the same contract into this working bar.
    ///
    /// Bid/ask high/low/close extend to cover the incoming close prices, last
    /// sizes overwrite, and all theoretical fields overwrite to the latest
    /// observed values. The end time overwrites to the incoming bar's.
    pub fn merge(&mut self, incoming: &Self) {
        self.bid.extend(incoming.bid.close);
        self.ask.extend(incoming.ask.close);
        self.last_bid_size = incoming.last_bid_size;
        self.last_ask_size = incoming.last_ask_size;
        self.theoretical_value = incoming.theoretical_value;
        self.implied_volatility = incoming.implied_volatility;
        self.greeks = incoming.greeks;
        self.open_interest = incoming.open_interest;
        self.forward = incoming.forward;
        self.discount = incoming.discount;
        self.moneyness = incoming.moneyness;
        self.time_to_expiry = incoming.time_to_expiry;
        self.end_time = incoming.end_time;
    }

    /// Mid price of the closing bid/ask quote.
    #[must_use]
    pub fn mid(&self) -> Decimal {
        (self.bid.close + self.ask.close) / Decimal::from(2)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use crate::domain::contract::OptionRight;

    use super::*;

    fn dec(value: i64, scale: u32) -> Decimal {
        Decimal::new(value, scale)
    }

    fn make_bar(time: DateTime<Utc>, bid: Decimal, ask: Decimal, theo: Decimal) -> TheoBar {
        TheoBar {
            key: ContractKey::new(
                "SPX".to_string(),
                Decimal::from(4500),
                Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap(),
                OptionRight::Call,
            ),
            time,
            end_time: time,
            bid: Bar::from_price(bid),
            ask: Bar::from_price(ask),
            last_bid_size: Decimal::from(10),
            last_ask_size: Decimal::from(20),
            theoretical_value: theo,
            implied_volatility: dec(185, 3),
            greeks: Greeks::from_feed(dec(5, 1), dec(1, 2), dec(12, 1), dec(-4, 2)),
            open_interest: Decimal::from(100),
            forward: Decimal::from(4510),
            discount: dec(999, 3),
            moneyness: dec(-2, 2),
            time_to_expiry: dec(45, 3),
        }
    }

    #[test]
    fn bar_extend_widens_range_and_moves_close() {
        let mut bar = Bar::from_price(dec(100, 0));
        bar.extend(dec(105, 0));
        bar.extend(dec(98, 0));
        assert_eq!(bar.open, dec(100, 0));
        assert_eq!(bar.high, dec(105, 0));
        assert_eq!(bar.low, dec(98, 0));
        assert_eq!(bar.close, dec(98, 0));
    }

    #[test]
    fn greeks_reserved_fields_are_zero() {
        let greeks = Greeks::from_feed(dec(5, 1), dec(1, 2), dec(12, 1), dec(-4, 2));
        assert_eq!(greeks.rho, Decimal::ZERO);
        assert_eq!(greeks.lambda, Decimal::ZERO);
    }

    #[test]
    fn merge_extends_quotes_and_overwrites_latest_fields() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap();
        let t1 = t0 + chrono::Duration::seconds(30);

        let mut working = make_bar(t0, dec(100, 0), dec(101, 0), dec(1005, 1));
        let mut incoming = make_bar(t1, dec(102, 0), dec(103, 0), dec(1020, 1));
        incoming.open_interest = Decimal::from(150);

        working.merge(&incoming);

        // Open preserved, high/close extended by incoming closes.
        assert_eq!(working.bid.open, dec(100, 0));
        assert_eq!(working.bid.high, dec(102, 0));
        assert_eq!(working.bid.close, dec(102, 0));
        assert_eq!(working.ask.high, dec(103, 0));
        // Latest-observed fields overwrite.
        assert_eq!(working.theoretical_value, dec(1020, 1));
        assert_eq!(working.open_interest, Decimal::from(150));
        assert_eq!(working.end_time, t1);
        // Window start is untouched.
        assert_eq!(working.time, t0);
    }

    #[test]
    fn mid_is_average_of_closing_quotes() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap();
        let bar = make_bar(t0, dec(100, 0), dec(101, 0), dec(1005, 1));
        assert_eq!(bar.mid(), dec(1005, 1));
    }
}
