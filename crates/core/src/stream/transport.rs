use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;

use crate::error::{Result, StreamError, TransportError};

/// Default number of handshake attempts before giving up.
pub const DEFAULT_HANDSHAKE_ATTEMPTS: u32 = 3;

/// Opens one encrypted datagram channel per call.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Performs a single handshake attempt.
    async fn connect(&self) -> std::result::Result<Box<dyn DatagramSink>, TransportError>;

    /// Human readable remote address, for logs.
    fn describe(&self) -> String;
}

/// The sending half of an established channel.
#[async_trait]
pub trait DatagramSink: Send + Sync {
    async fn send(&self, datagram: &[u8]) -> std::result::Result<(), TransportError>;

    async fn close(&self) -> std::result::Result<(), TransportError>;
}

/// Exclusive owner of the encrypted socket.
pub struct TransportSession {
    sink: Box<dyn DatagramSink>,
    closed: AtomicBool,
    frames_sent: AtomicU64,
    send_failures: AtomicU64,
}

impl TransportSession {
    pub fn new(sink: Box<dyn DatagramSink>) -> Self {
        Self {
            sink,
            closed: AtomicBool::new(false),
            frames_sent: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
        }
    }

    /// Sends one frame. A failure only affects this frame.
    pub async fn send(&self, frame: &[u8]) -> std::result::Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        match self.sink.send(frame).await {
            Ok(()) => {
                self.frames_sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.send_failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Closes the socket. Closing twice is not an error; a failed close
    /// leaves the session open so the next call tries again.
    pub async fn close(&self) -> std::result::Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        match self.sink.close().await {
            Ok(()) | Err(TransportError::Closed) => {
                self.closed.store(true, Ordering::Release);
                log::info!(
                    "Stream closed after {} frames ({} failed sends)",
                    self.frames_sent(),
                    self.send_failures()
                );
                Ok(())
            }
            Err(e) => {
                log::warn!("Failed to close stream: {}", e);
                Err(e)
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }
}

/// Opens a session, retrying only handshake timeouts, at most `max_attempts` times.
pub async fn connect_with_retry(
    connector: &dyn Connector,
    max_attempts: u32,
) -> Result<TransportSession> {
    let max_attempts = max_attempts.max(1);
    let mut attempts = 0;

    while attempts < max_attempts {
        attempts += 1;
        match connector.connect().await {
            Ok(sink) => {
                log::info!(
                    "Connected to {} (attempt {} of {})",
                    connector.describe(),
                    attempts,
                    max_attempts
                );
                return Ok(TransportSession::new(sink));
            }
            Err(TransportError::HandshakeTimeout) => {
                log::warn!(
                    "DTLS handshake with {} timed out after {} of {} tries",
                    connector.describe(),
                    attempts,
                    max_attempts
                );
            }
            Err(e) => {
                log::error!("Failed to open stream to {}: {}", connector.describe(), e);
                return Err(StreamError::Transport(e));
            }
        }
    }

    Err(StreamError::Handshake { attempts })
}
