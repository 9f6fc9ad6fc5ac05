pub use bridge::{light_state_from_statuses, Bridge, ChannelStatus};
pub use color::{ChannelColor, ColorSpace, LightState};
pub use config::{ConfigError, ConfigManager, ConfigSchema};
pub use controller::StreamController;
pub use effect::{
    idle_effect, CompiledEffect, Component, EffectDescription, EffectSpec, Formula, IdleSettings,
    KeyframeSegment, QueuedEffect, TargetColor,
};
pub use error::{EncodeError, Result, StreamError, TransportError};
pub use lifecycle::shutdown_signal;
pub use messages::{PlaybackStatus, SchedulerCommand, Settings};
pub use playback::{Playback, PlaybackState, Scheduler};
pub use stream::{
    connect_with_retry, Connector, DatagramSink, DtlsConnector, FrameEncoder, PskCredentials,
    TransportSession,
};

mod bridge;
mod color;
mod config;
mod controller;
pub mod effect;
mod error;
mod lifecycle;
pub mod messages;
pub mod playback;
pub mod stream;
