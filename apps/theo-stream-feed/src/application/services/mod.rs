//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - [`TheoFeedService`]: wires stream client, batch processor, and
//!   subscription registry into the full update pipeline

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::BarSink;
use crate::domain::bar::TheoBar;
use crate::infrastructure::batch::BatchProcessor;
use crate::infrastructure::config::FeedConfig;
use crate::infrastructure::registry::{
    SubscriptionHandle, SubscriptionKey, SubscriptionRegistry, WakeCallback,
};
use crate::infrastructure::stream::{ClientError, StreamClientConfig, TheoStreamClient};

/// Errors raised by the feed service lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Stream client failure.
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// End-to-end feed pipeline.
///
/// Owns the TCP client, the batch processor, and the subscription registry,
/// plus the background tasks that drive them: the receive loop enqueues raw
/// updates, a periodic drain expands them into bars and dispatches to
/// subscriptions, and a clock scan closes quiet consolidation windows.
///
/// Shutdown is terminal: the service's cancellation token fans out to every
/// task, so a stopped service is rebuilt rather than restarted.
pub struct TheoFeedService {
    config: FeedConfig,
    client: TheoStreamClient,
    processor: Arc<BatchProcessor>,
    registry: Arc<SubscriptionRegistry>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TheoFeedService {
    /// Build the pipeline from configuration. Nothing runs until `start`.
    #[must_use]
    pub fn new(config: FeedConfig) -> Self {
        let cancel = CancellationToken::new();
        let registry = Arc::new(SubscriptionRegistry::new());
        let sink: Arc<dyn BarSink> = Arc::clone(&registry) as Arc<dyn BarSink>;
        let processor = Arc::new(BatchProcessor::new(config.batch, sink));
        let client = TheoStreamClient::new(
            StreamClientConfig {
                endpoint: config.endpoint.clone(),
                max_frame_bytes: config.max_frame_bytes,
            },
            cancel.clone(),
        );

        Self {
            config,
            client,
            processor,
            registry,
            cancel,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Connect upstream and spawn the pipeline tasks.
    ///
    /// # Errors
    ///
    /// Returns the stream client's connect or lifecycle error.
    pub async fn start(&self) -> Result<(), ServiceError> {
        let processor = Arc::clone(&self.processor);
        self.client
            .start(Arc::new(move |update| processor.enqueue(update)))
            .await?;

        let drain = Arc::clone(&self.processor).run(self.cancel.clone());

        let registry = Arc::clone(&self.registry);
        let scan_interval = self.config.consolidation.scan_interval;
        let scan_cancel = self.cancel.clone();
        let scan = async move {
            let mut tick = tokio::time::interval(scan_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = scan_cancel.cancelled() => return,
                    _ = tick.tick() => registry.scan(Utc::now()),
                }
            }
        };

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(drain));
        tasks.push(tokio::spawn(scan));

        tracing::info!(endpoint = %self.config.endpoint, "Feed pipeline started");
        Ok(())
    }

    /// Whether the upstream receive loop is running against a live socket.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// Subscribe one contract or a whole chain using the configured
    /// consolidation window.
    pub fn subscribe(
        &self,
        key: SubscriptionKey,
        on_data: Option<WakeCallback>,
    ) -> SubscriptionHandle {
        self.registry
            .subscribe(key, Some(self.config.consolidation.period), on_data)
    }

    /// Subscribe without consolidation; every expanded bar is delivered raw.
    pub fn subscribe_raw(
        &self,
        key: SubscriptionKey,
        on_data: Option<WakeCallback>,
    ) -> SubscriptionHandle {
        self.registry.subscribe(key, None, on_data)
    }

    /// Remove a subscription.
    pub fn unsubscribe(&self, key: &SubscriptionKey) {
        self.registry.unsubscribe(key);
    }

    /// Remove and return all bars queued for a key.
    #[must_use]
    pub fn drain(&self, key: &SubscriptionKey) -> Vec<TheoBar> {
        self.registry.drain(key)
    }

    /// The registry backing this service's subscriptions.
    #[must_use]
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Stop every pipeline task and release the socket.
    ///
    /// # Errors
    ///
    /// Returns the client's shutdown timeout error; background tasks are
    /// still awaited best-effort.
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        self.cancel.cancel();
        let result = self.client.shutdown().await;

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            task.await.ok();
        }

        tracing::info!("Feed pipeline stopped");
        result.map_err(ServiceError::from)
    }
}

// =============================================================================
// Tests
// =============================================================================
