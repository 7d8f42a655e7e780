//! Theo Stream TCP Client
//!
//! Owns one TCP connection to the theo server and a background receive loop
//! that deframes and decodes `TheoUpdate` records, forwarding each to a
//! registered handler.
//!
//! The client never reconnects on its own: connection loss or a protocol
//! error ends the receive loop and `is_connected` goes false; a fresh
//! `start` is the caller's responsibility.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use prost::Message;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::framing::{FrameReader, ProtocolError};
use super::wire::TheoUpdate;

/// Bounded wait for the receive task to exit during shutdown.
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Handler invoked with each decoded update on the receive task.
pub type UpdateHandler = Arc<dyn Fn(TheoUpdate) + Send + Sync>;

/// Errors raised by the stream client lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Endpoint string is not `host:port`.
    #[error("invalid endpoint {0:?}, expected host:port")]
    InvalidEndpoint(String),

    /// TCP connect failed.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        /// Endpoint that was dialled.
        endpoint: String,
        /// Underlying socket error.
        source: std::io::Error,
    },

    /// `start` called while a receive loop is already running.
    #[error("receive loop already running")]
    AlreadyRunning,

    /// Receive task did not exit within the shutdown deadline.
    #[error("receive task did not stop within {0:?}")]
    ShutdownTimeout(Duration),
}

/// Configuration for the stream client.
#[derive(Debug, Clone)]
pub struct StreamClientConfig {
    /// Server endpoint as `host:port`.
    pub endpoint: String,
    /// Maximum accepted frame payload size.
    pub max_frame_bytes: usize,
}

impl StreamClientConfig {
    /// Create a configuration with the default frame size cap.
    #[must_use]
    pub const fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            max_frame_bytes: super::framing::DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// TCP client for the theo update stream.
pub struct TheoStreamClient {
    config: StreamClientConfig,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl TheoStreamClient {
    /// Create a new client. No connection is made until `start`.
    #[must_use]
    pub fn new(config: StreamClientConfig, cancel: CancellationToken) -> Self {
        Self {
            config,
            connected: Arc::new(AtomicBool::new(false)),
            cancel,
            task: parking_lot::Mutex::new(None),
        }
    }

    /// Whether the receive loop is running against a live socket.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Connect and begin the receive loop on a background task.
    ///
    /// Each decoded update is passed to `handler` on the receive task.
    /// Not safe to call while a previous loop is still running; a finished
    /// loop (connection loss) may be restarted with another `start` call.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AlreadyRunning`] if the loop is active, an
    /// endpoint validation error, or the connect failure.
    pub async fn start(&self, handler: UpdateHandler) -> Result<(), ClientError> {
        {
            let task = self.task.lock();
            if task.as_ref().is_some_and(|t| !t.is_finished()) {
                return Err(ClientError::AlreadyRunning);
            }
        }

        if !self.config.endpoint.contains(':') {
            return Err(ClientError::InvalidEndpoint(self.config.endpoint.clone()));
        }

        tracing::info!(endpoint = %self.config.endpoint, "Connecting to theo stream");
        let stream =
            TcpStream::connect(&self.config.endpoint)
                .await
                .map_err(|source| ClientError::Connect {
                    endpoint: self.config.endpoint.clone(),
                    source,
                })?;

        self.connected.store(true, Ordering::SeqCst);

        let connected = Arc::clone(&self.connected);
        let cancel = self.cancel.clone();
        let max_frame_bytes = self.config.max_frame_bytes;

        let handle = tokio::spawn(async move {
            receive_loop(stream, max_frame_bytes, handler, cancel).await;
            connected.store(false, Ordering::SeqCst);
        });

        *self.task.lock() = Some(handle);
        Ok(())
    }

    /// Stop the receive loop and release the socket.
    ///
    /// Idempotent and safe to call from any thread. Cancellation unblocks a
    /// pending read; the receive task is then joined with a bounded wait.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ShutdownTimeout`] if the receive task does not
    /// exit in time.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.cancel.cancel();

        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            tokio::time::timeout(JOIN_TIMEOUT, handle)
                .await
                .map_err(|_| ClientError::ShutdownTimeout(JOIN_TIMEOUT))?
                .ok();
        }

        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Pull frames until cancellation, EOF, or a protocol error.
async fn receive_loop(
    stream: TcpStream,
    max_frame_bytes: usize,
    handler: UpdateHandler,
    cancel: CancellationToken,
) {
    let mut reader = FrameReader::with_max_frame_bytes(stream, max_frame_bytes);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::info!("Theo stream client cancelled");
                return;
            }
            frame = reader.next_frame() => {
                match frame {
                    Ok(Some(payload)) => {
                        metrics::counter!("theo_feed_frames_total").increment(1);
                        match TheoUpdate::decode(payload.as_slice()) {
                            Ok(update) => handler(update),
                            Err(e) => {
                                // Schema failure is fatal to the connection.
                                let err = ProtocolError::from(e);
                                tracing::error!(error = %err, "Frame payload rejected, closing stream");
                                return;
                            }
                        }
                    }
                    Ok(None) => {
                        tracing::info!("Theo stream ended (remote close)");
                        return;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Theo stream protocol error, closing stream");
                        return;
                    }
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
