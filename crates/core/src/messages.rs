use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::color::{ColorSpace, LightState};
use crate::effect::{IdleSettings, QueuedEffect};
use crate::error::Result;
use crate::playback::PlaybackState;
use crate::stream::{DEFAULT_HANDSHAKE_ATTEMPTS, HANDSHAKE_TIMEOUT, STREAM_PORT};

/// Commands sent from callers to the scheduler task
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Append an effect; replies with the new queue length
    Enqueue {
        effect: QueuedEffect,
        reply: oneshot::Sender<Result<usize>>,
    },
    /// Promote the queue head now; replies `false` when already idle with nothing queued
    PlayNext { reply: oneshot::Sender<bool> },
    Status {
        reply: oneshot::Sender<PlaybackStatus>,
    },
    Stop,
}

/// Snapshot of the playback timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub tick_index: usize,
    pub frame_count: usize,
    pub interval_ms: u64,
    pub repeat: bool,
    pub queued: usize,
    pub last_light_state: LightState,
}

impl PlaybackStatus {
    pub fn is_idle(&self) -> bool {
        self.state == PlaybackState::Idle
    }
}

/// Settings configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    // Bridge settings
    pub bridge_ip: String,
    pub stream_port: u16,
    /// PSK identity used for the DTLS handshake
    pub application_id: String,
    /// 16-byte pre-shared key as 32 hex characters
    pub client_key: String,

    // Transport settings
    pub handshake_timeout_ms: u64,
    pub handshake_attempts: u32,
    pub color_space: ColorSpace,

    // Idle animation settings
    pub idle_duration_ms: u64,
    pub idle_interval_ms: u64,
    pub idle_dip_brightness: f64,

    // Session settings
    pub shutdown_grace_ms: u64,
    pub channel_count: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let idle = IdleSettings::default();
        Self {
            // Bridge defaults
            bridge_ip: "192.168.1.2".to_string(),
            stream_port: STREAM_PORT,
            application_id: String::new(),
            client_key: String::new(),

            // Transport defaults
            handshake_timeout_ms: HANDSHAKE_TIMEOUT.as_millis() as u64,
            handshake_attempts: DEFAULT_HANDSHAKE_ATTEMPTS,
            color_space: ColorSpace::Xy,

            // Idle defaults
            idle_duration_ms: idle.duration_ms,
            idle_interval_ms: idle.interval_ms,
            idle_dip_brightness: idle.dip_brightness,

            // Session defaults
            shutdown_grace_ms: 1000,
            channel_count: 1,
        }
    }
}
