//! Theo Feed Wire Record
//!
//! One `TheoUpdate` is the binary payload of one frame: a fitted pricing
//! snapshot for a single (underlying, strike, expiry) point on the surface,
//! carrying both the call and put legs. Records are immutable once decoded.
//!
//! Field numbers are part of the deployed wire contract; never renumber.

/// One decoded pricing update covering both legs of a strike.
#[derive(Clone, PartialEq, prost::Message)]
pub struct TheoUpdate {
    /// Underlying identifier.
    #[prost(string, tag = "1")]
    pub underlying: String,
    /// Strike price.
    #[prost(double, tag = "2")]
    pub strike: f64,
    /// Contract expiry, nanoseconds since the Unix epoch (UTC).
    #[prost(int64, tag = "3")]
    pub expiry_ns: i64,
    /// Observation timestamp, nanoseconds since the Unix epoch (UTC).
    #[prost(int64, tag = "4")]
    pub timestamp_ns: i64,

    /// Call bid price.
    #[prost(double, tag = "5")]
    pub bid_price_call: f64,
    /// Call ask price.
    #[prost(double, tag = "6")]
    pub ask_price_call: f64,
    /// Call bid size.
    #[prost(double, tag = "7")]
    pub bid_size_call: f64,
    /// Call ask size.
    #[prost(double, tag = "8")]
    pub ask_size_call: f64,
    /// Fitted theoretical call price.
    #[prost(double, tag = "9")]
    pub fit_price_call: f64,
    /// Fitted call delta.
    #[prost(double, tag = "10")]
    pub fit_delta_call: f64,
    /// Fitted call gamma.
    #[prost(double, tag = "11")]
    pub fit_gamma_call: f64,
    /// Fitted call vega.
    #[prost(double, tag = "12")]
    pub fit_vega_call: f64,
    /// Fitted call theta.
    #[prost(double, tag = "13")]
    pub fit_theta_call: f64,
    /// Call open interest.
    #[prost(double, tag = "14")]
    pub open_interest_call: f64,

    /// Put bid price.
    #[prost(double, tag = "15")]
    pub bid_price_put: f64,
    /// Put ask price.
    #[prost(double, tag = "16")]
    pub ask_price_put: f64,
    /// Put bid size.
    #[prost(double, tag = "17")]
    pub bid_size_put: f64,
    /// Put ask size.
    #[prost(double, tag = "18")]
    pub ask_size_put: f64,
    /// Fitted theoretical put price.
    #[prost(double, tag = "19")]
    pub fit_price_put: f64,
    /// Fitted put delta.
    #[prost(double, tag = "20")]
    pub fit_delta_put: f64,
    /// Fitted put gamma.
    #[prost(double, tag = "21")]
    pub fit_gamma_put: f64,
    /// Fitted put vega.
    #[prost(double, tag = "22")]
    pub fit_vega_put: f64,
    /// Fitted put theta.
    #[prost(double, tag = "23")]
    pub fit_theta_put: f64,
    /// Put open interest.
    #[prost(double, tag = "24")]
    pub open_interest_put: f64,

    /// Implied volatility at this strike.
    #[prost(double, tag = "25")]
    pub vol: f64,
    /// Underlying forward price.
    #[prost(double, tag = "26")]
    pub forward: f64,
    /// Discount factor to expiry.
    #[prost(double, tag = "27")]
    pub discount: f64,
    /// Log-moneyness of the strike.
    #[prost(double, tag = "28")]
    pub moneyness: f64,
    /// Time to expiry in years.
    #[prost(double, tag = "29")]
    pub time_to_expiry: f64,
}

#[cfg(test)]
mod tests {
    use prost::Message;

    use super::*;

    #[test]
    fn encode_decode_preserves_fields() {
        let update = TheoUpdate {
            underlying: "SPX".to_string(),
            strike: 4500.0,
            expiry_ns: 1_718_928_000_000_000_000,
            timestamp_ns: 1_710_512_345_000_000_000,
            bid_price_call: 100.25,
            ask_price_call: 100.75,
            vol: 0.185,
            ..TheoUpdate::default()
        };

        let bytes = update.encode_to_vec();
        let decoded = TheoUpdate::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, update);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        // A truncated field header is a schema violation.
        assert!(TheoUpdate::decode([0x0a, 0xff].as_slice()).is_err());
    }
}
