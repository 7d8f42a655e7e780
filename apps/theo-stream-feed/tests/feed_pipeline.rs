//! Feed Pipeline Integration Tests
//!
//! Tests the full data flow from framed TCP bytes to per-subscription bar
//! delivery.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use chrono::{TimeZone, Utc};
use prost::Message;
use rust_decimal::Decimal;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::time::timeout;

use theo_stream_feed::{
    FeedConfig, OptionRight, SubscriptionKey, TheoFeedService, TheoUpdate, encode_frame,
};

fn make_update(underlying: &str, strike: f64, timestamp_ns: i64) -> TheoUpdate {
    TheoUpdate {
        underlying: underlying.to_string(),
        strike,
        expiry_ns: 1_718_928_000_000_000_000,
        timestamp_ns,
        bid_price_call: 100.25,
        ask_price_call: 100.75,
        bid_size_call: 10.0,
        ask_size_call: 12.0,
        fit_price_call: 100.5,
        fit_delta_call: 0.55,
        fit_gamma_call: 0.002,
        fit_vega_call: 1.8,
        fit_theta_call: -0.4,
        open_interest_call: 1500.0,
        bid_price_put: 95.0,
        ask_price_put: 95.5,
        bid_size_put: 7.0,
        ask_size_put: 9.0,
        fit_price_put: 95.25,
        fit_delta_put: -0.45,
        fit_gamma_put: 0.002,
        fit_vega_put: 1.8,
        fit_theta_put: -0.38,
        open_interest_put: 900.0,
        vol: 0.185,
        forward: 4510.0,
        discount: 0.999,
        moneyness: -0.02,
        time_to_expiry: 0.045,
    }
}

/// Start a TCP server that writes the given updates as framed records,
/// then holds the socket open.
async fn serve_updates(updates: Vec<TheoUpdate>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        for update in updates {
            let frame = encode_frame(&update.encode_to_vec());
            socket.write_all(&frame).await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(30)).await;
    });
    addr.to_string()
}

fn fast_config(endpoint: String) -> FeedConfig {
    let mut config = FeedConfig {
        endpoint,
        ..FeedConfig::default()
    };
    config.batch.tick_interval = Duration::from_millis(10);
    config.consolidation.scan_interval = Duration::from_millis(20);
    config
}

#[tokio::test]
async fn raw_subscription_receives_both_legs() {
    let t = Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap();
    let endpoint = serve_updates(vec![make_update(
        "SPX",
        4500.0,
        t.timestamp_nanos_opt().unwrap(),
    )])
    .await;

    let service = TheoFeedService::new(fast_config(endpoint));
    let handle = service.subscribe_raw(SubscriptionKey::Chain("SPX".to_string()), None);
    service.start().await.unwrap();

    let bars = timeout(Duration::from_secs(2), async {
        let mut bars = Vec::new();
        while bars.len() < 2 {
            bars.extend(handle.recv().await);
        }
        bars
    })
    .await
    .expect("pipeline should deliver both legs");

    let call = bars.iter().find(|b| b.key.right == OptionRight::Call).unwrap();
    let put = bars.iter().find(|b| b.key.right == OptionRight::Put).unwrap();

    assert_eq!(call.key.underlying, "SPX");
    assert_eq!(call.key.strike, Decimal::from(4500));
    assert_eq!(call.time, t);
    assert_eq!(call.bid.close, Decimal::new(100_25, 2));
    assert_eq!(put.bid.close, Decimal::from(95));
    assert_eq!(call.greeks.delta, Decimal::new(55, 2));
    assert_eq!(put.greeks.delta, Decimal::new(-45, 2));
    // Greeks the feed does not carry stay zeroed.
    assert_eq!(call.greeks.rho, Decimal::ZERO);
    assert_eq!(call.greeks.lambda, Decimal::ZERO);

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn consolidated_subscription_emits_closed_windows() {
    let t = Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap();
    let ns = |secs: i64| {
        (t + chrono::TimeDelta::seconds(secs))
            .timestamp_nanos_opt()
            .unwrap()
    };
    // Two updates inside the first minute, one after it; the third closes
    // the first window for both legs.
    let endpoint = serve_updates(vec![
        make_update("SPX", 4500.0, ns(0)),
        make_update("SPX", 4500.0, ns(30)),
        make_update("SPX", 4500.0, ns(70)),
    ])
    .await;

    // Historical timestamps: keep the wall-clock scan out of the way so the
    // window close is driven by the third update alone.
    let mut config = fast_config(endpoint);
    config.consolidation.scan_interval = Duration::from_secs(3600);

    let service = TheoFeedService::new(config);
    let handle = service.subscribe(SubscriptionKey::Chain("SPX".to_string()), None);
    service.start().await.unwrap();

    let bars = timeout(Duration::from_secs(2), async {
        let mut bars = Vec::new();
        while bars.len() < 2 {
            bars.extend(handle.recv().await);
        }
        bars
    })
    .await
    .expect("third update should close the first window");

    assert_eq!(bars.len(), 2);
    for bar in &bars {
        assert_eq!(bar.time, t);
        assert_eq!(bar.end_time, t + chrono::TimeDelta::seconds(60));
    }

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn unsubscribed_traffic_is_dropped() {
    let t = Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap();
    let ns = t.timestamp_nanos_opt().unwrap();
    let endpoint = serve_updates(vec![
        make_update("NDX", 16000.0, ns),
        make_update("SPX", 4500.0, ns),
    ])
    .await;

    let service = TheoFeedService::new(fast_config(endpoint));
    let handle = service.subscribe_raw(SubscriptionKey::Chain("SPX".to_string()), None);
    service.start().await.unwrap();

    let bars = timeout(Duration::from_secs(2), async {
        let mut bars = Vec::new();
        while bars.len() < 2 {
            bars.extend(handle.recv().await);
        }
        bars
    })
    .await
    .unwrap();

    // Only the subscribed underlying came through.
    assert!(bars.iter().all(|b| b.key.underlying == "SPX"));
    assert!(service.drain(&SubscriptionKey::Chain("SPX".to_string())).is_empty());

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_is_clean_while_stream_is_active() {
    let t = Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap();
    let endpoint = serve_updates(vec![make_update(
        "SPX",
        4500.0,
        t.timestamp_nanos_opt().unwrap(),
    )])
    .await;

    let service = TheoFeedService::new(fast_config(endpoint));
    service.start().await.unwrap();
    assert!(service.is_connected());

    timeout(Duration::from_secs(6), service.shutdown())
        .await
        .expect("shutdown should not hang")
        .unwrap();
    assert!(!service.is_connected());
}
