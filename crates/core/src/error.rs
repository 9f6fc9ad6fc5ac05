use thiserror::Error;

pub type Result<T> = std::result::Result<T, StreamError>;

/// Errors raised by the DTLS transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("DTLS handshake timed out")]
    HandshakeTimeout,

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DTLS error: {0}")]
    Dtls(String),

    #[error("invalid pre-shared key: {0}")]
    InvalidKey(String),

    #[error("transport is closed")]
    Closed,
}

/// Errors raised while serializing a frame. Never fatal to the stream.
#[derive(Debug, Error, PartialEq)]
pub enum EncodeError {
    #[error("group id must be ASCII and at most {max} bytes, got {got:?}")]
    InvalidGroupId { got: String, max: usize },

    #[error("frame has {got} channels, encoder expects {expected}")]
    ChannelCount { expected: usize, got: usize },

    #[error("{0} channels exceed the per-frame limit")]
    TooManyChannels(usize),

    #[error("channel {channel} has a non-finite component")]
    NonFinite { channel: usize },
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("DTLS handshake failed after {attempts} attempts")]
    Handshake { attempts: u32 },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("invalid effect: {0}")]
    InvalidEffectSpec(String),

    #[error("effect queue is empty")]
    QueueEmpty,

    #[error("shutdown failed: {0}")]
    Shutdown(String),

    #[error("bridge request failed: {0:#}")]
    Bridge(anyhow::Error),

    #[error("no streaming session is connected")]
    NotConnected,

    #[error("a streaming session is already connected")]
    AlreadyConnected,

    #[error("playback scheduler is not running")]
    SchedulerStopped,
}

impl StreamError {
    pub fn invalid_effect(msg: impl Into<String>) -> Self {
        Self::InvalidEffectSpec(msg.into())
    }

    /// True for errors that end the streaming session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StreamError::Handshake { .. }
                | StreamError::Transport(_)
                | StreamError::Bridge(_)
                | StreamError::Shutdown(_)
        )
    }
}
