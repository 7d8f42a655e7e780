//! Subscription Registry
//!
//! Concurrency-safe mapping from subscription keys to per-subscription
//! delivery queues with wake notification. Demultiplexes the batch
//! processor's output and serves both consumption styles:
//!
//! - **Push**: the wake callback registered at subscribe time fires after
//!   each delivery; the consumer then drains its queue.
//! - **Pull**: [`SubscriptionHandle::recv`] awaits a wake and drains,
//!   yielding a restartable sequence of bars across empty-queue periods.
//!
//! # Concurrency Contract
//!
//! Membership is guarded by one `RwLock`; each delivery queue has its own
//! `Mutex` held only around enqueue/drain. No lock spans a dispatch of one
//! bar and the consumer side of another subscription.
//!
//! # Consolidation
//!
//! A subscription created with a window period holds one
//! [`TheoBarConsolidator`] per contract in front of its queue: dispatched
//! bars fold into the working window and only closed windows reach the
//! queue. `scan` closes quiet windows by clock.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;

use crate::application::ports::BarSink;
use crate::domain::bar::TheoBar;
use crate::domain::consolidator::TheoBarConsolidator;
use crate::domain::contract::ContractKey;

// =============================================================================
// Keys and Callbacks
// =============================================================================

/// What a consumer subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionKey {
    /// One option leg.
    Contract(ContractKey),
    /// Every contract on an underlying (whole-chain subscription).
    Chain(String),
}

impl std::fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Contract(key) => write!(f, "{key}"),
            Self::Chain(underlying) => write!(f, "{underlying}:chain"),
        }
    }
}

/// Callback fired after each delivery to a subscription's queue.
pub type WakeCallback = Box<dyn Fn() + Send + Sync>;

// =============================================================================
// Subscription State
// =============================================================================

struct Subscription {
    queue: Arc<Mutex<VecDeque<TheoBar>>>,
    notify: Arc<Notify>,
    on_data: Option<WakeCallback>,
    /// One consolidator per contract; populated lazily. `None` when the
    /// subscription is unconsolidated (raw pass-through).
    consolidators: Option<Mutex<HashMap<ContractKey, TheoBarConsolidator>>>,
    period: Option<Duration>,
}

impl Subscription {
    fn deliver(&self, bar: TheoBar) {
        self.queue.lock().push_back(bar);
        self.notify.notify_one();
        if let Some(on_data) = &self.on_data {
            on_data();
        }
    }
}

/// Consumer-side handle to a subscription's queue.
///
/// Remains valid after `unsubscribe`; it simply stops receiving new bars.
#[derive(Clone)]
pub struct SubscriptionHandle {
    key: SubscriptionKey,
    queue: Arc<Mutex<VecDeque<TheoBar>>>,
    notify: Arc<Notify>,
}

impl SubscriptionHandle {
    /// The key this handle was subscribed with.
    #[must_use]
    pub const fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    /// Remove and return all currently queued bars in enqueue order.
    #[must_use]
    pub fn drain(&self) -> Vec<TheoBar> {
        self.queue.lock().drain(..).collect()
    }

    /// Await the next non-empty batch of bars.
    ///
    /// Returns immediately when bars are already queued; otherwise suspends
    /// until a dispatch wakes this subscription. The sequence is restartable:
    /// call `recv` again after every batch.
    pub async fn recv(&self) -> Vec<TheoBar> {
        loop {
            let bars = self.drain();
            if !bars.is_empty() {
                return bars;
            }
            self.notify.notified().await;
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Demultiplexes theo bars to per-subscription delivery queues.
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: RwLock<HashMap<SubscriptionKey, Arc<Subscription>>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a key with an optional wake callback and an optional
    /// consolidation period.
    ///
    /// With a period, bars fold into per-contract windows and only closed
    /// windows reach the queue; without one, every bar is delivered raw.
    /// Re-subscribing an existing key replaces its queue, callback, and
    /// consolidation state.
    pub fn subscribe(
        &self,
        key: SubscriptionKey,
        period: Option<Duration>,
        on_data: Option<WakeCallback>,
    ) -> SubscriptionHandle {
        let subscription = Arc::new(Subscription {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
            on_data,
            consolidators: period.map(|_| Mutex::new(HashMap::new())),
            period,
        });

        let handle = SubscriptionHandle {
            key: key.clone(),
            queue: Arc::clone(&subscription.queue),
            notify: Arc::clone(&subscription.notify),
        };

        let count = {
            let mut subscriptions = self.subscriptions.write();
            subscriptions.insert(key.clone(), subscription);
            subscriptions.len()
        };
        metrics::gauge!("theo_feed_subscriptions").set(count as f64);
        tracing::debug!(key = %key, total = count, "Subscribed");

        handle
    }

    /// Remove a subscription. In-flight dispatches to the removed key are
    /// dropped; this is not an error.
    pub fn unsubscribe(&self, key: &SubscriptionKey) {
        let count = {
            let mut subscriptions = self.subscriptions.write();
            subscriptions.remove(key);
            subscriptions.len()
        };
        metrics::gauge!("theo_feed_subscriptions").set(count as f64);
        tracing::debug!(key = %key, total = count, "Unsubscribed");
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Route one bar to its subscription, if any.
    ///
    /// Resolution order: the bar's exact contract key, then the whole-chain
    /// key for its underlying. Unsubscribed bars are dropped silently.
    pub fn dispatch(&self, bar: TheoBar) {
        let subscription = {
            let subscriptions = self.subscriptions.read();
            subscriptions
                .get(&SubscriptionKey::Contract(bar.key.clone()))
                .or_else(|| subscriptions.get(&SubscriptionKey::Chain(bar.key.underlying.clone())))
                .map(Arc::clone)
        };

        let Some(subscription) = subscription else {
            metrics::counter!("theo_feed_bars_dropped_total").increment(1);
            tracing::debug!(contract = %bar.key, "Dropping bar for unsubscribed contract");
            return;
        };

        match (&subscription.consolidators, subscription.period) {
            (Some(consolidators), Some(period)) => {
                let emitted = {
                    let mut consolidators = consolidators.lock();
                    consolidators
                        .entry(bar.key.clone())
                        .or_insert_with(|| TheoBarConsolidator::new(period))
                        .update(bar)
                };
                if let Some(closed) = emitted {
                    subscription.deliver(closed);
                }
            }
            _ => subscription.deliver(bar),
        }
    }

    /// Close every consolidation window whose end has passed.
    ///
    /// Driven by a host-provided clock tick so contracts whose feed goes
    /// quiet still emit their last window.
    pub fn scan(&self, now: DateTime<Utc>) {
        let subscriptions: Vec<Arc<Subscription>> =
            self.subscriptions.read().values().map(Arc::clone).collect();

        for subscription in subscriptions {
            let Some(consolidators) = &subscription.consolidators else {
                continue;
            };
            let closed: Vec<TheoBar> = {
                let mut consolidators = consolidators.lock();
                consolidators
                    .values_mut()
                    .filter_map(|consolidator| consolidator.scan(now))
                    .collect()
            };
            for bar in closed {
                subscription.deliver(bar);
            }
        }
    }

    /// Remove and return all bars queued for a key, preserving enqueue order.
    ///
    /// Returns an empty vector for unknown keys.
    #[must_use]
    pub fn drain(&self, key: &SubscriptionKey) -> Vec<TheoBar> {
        let subscription = {
            let subscriptions = self.subscriptions.read();
            subscriptions.get(key).map(Arc::clone)
        };
        subscription.map_or_else(Vec::new, |s| s.queue.lock().drain(..).collect())
    }
}

impl BarSink for SubscriptionRegistry {
    fn deliver(&self, bar: TheoBar) {
        self.dispatch(bar);
    }
}

// =============================================================================
// Tests
// =============================================================================
