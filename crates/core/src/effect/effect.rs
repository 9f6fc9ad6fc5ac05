use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::color::{ChannelColor, LightState};
use crate::error::{Result, StreamError};

/// One color component of a keyframe target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Component {
    Literal(f64),
    /// Reuse the continuity anchor's value for this component
    CarryForward,
}

impl Component {
    pub fn resolve(&self, anchor: f64) -> f64 {
        match self {
            Component::Literal(value) => *value,
            Component::CarryForward => anchor,
        }
    }

    pub fn is_carry_forward(&self) -> bool {
        matches!(self, Component::CarryForward)
    }
}

impl From<f64> for Component {
    fn from(value: f64) -> Self {
        Component::Literal(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetColor(pub [Component; 3]);

impl TargetColor {
    pub fn literal(a: f64, b: f64, c: f64) -> Self {
        TargetColor([a.into(), b.into(), c.into()])
    }

    /// Every component carried forward from the anchor.
    pub fn carry() -> Self {
        TargetColor([Component::CarryForward; 3])
    }

    pub fn resolve(&self, anchor: &ChannelColor) -> ChannelColor {
        let mut out = [0.0; 3];
        for (i, component) in self.0.iter().enumerate() {
            out[i] = component.resolve(anchor.component(i));
        }
        ChannelColor(out)
    }

    pub fn components(&self) -> &[Component; 3] {
        &self.0
    }
}

/// How a segment moves from the previous color to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Formula {
    /// Show the target for the whole segment
    #[default]
    Hold,
    /// Interpolate over [start, end]
    Linear,
}

/// A declared transition for one channel. Ticks are inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyframeSegment {
    pub start: usize,
    pub end: Option<usize>,
    pub target: TargetColor,
    pub formula: Formula,
}

impl KeyframeSegment {
    pub fn hold(start: usize, end: Option<usize>, target: TargetColor) -> Self {
        Self {
            start,
            end,
            target,
            formula: Formula::Hold,
        }
    }

    pub fn linear(start: usize, end: usize, target: TargetColor) -> Self {
        Self {
            start,
            end: Some(end),
            target,
            formula: Formula::Linear,
        }
    }
}

/// Sparse description of an effect: one segment timeline per channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSpec {
    pub duration_ms: u64,
    pub interval_ms: u64,
    pub repeat: bool,
    pub channels: Vec<Vec<KeyframeSegment>>,
}

impl EffectSpec {
    pub fn new(duration_ms: u64, interval_ms: u64, repeat: bool) -> Self {
        Self {
            duration_ms,
            interval_ms,
            repeat,
            channels: Vec::new(),
        }
    }

    pub fn with_channel(mut self, segments: Vec<KeyframeSegment>) -> Self {
        self.channels.push(segments);
        self
    }

    /// Number of ticks; a trailing partial tick is dropped.
    pub fn frame_count(&self) -> usize {
        if self.interval_ms == 0 {
            return 0;
        }
        (self.duration_ms / self.interval_ms) as usize
    }

    /// Checks everything that can be known without a continuity anchor.
    pub fn validate(&self, channel_count: usize) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(StreamError::invalid_effect("interval must be greater than zero"));
        }
        if self.frame_count() == 0 {
            return Err(StreamError::invalid_effect(format!(
                "duration {}ms is shorter than one {}ms tick",
                self.duration_ms, self.interval_ms
            )));
        }
        if self.channels.len() > channel_count {
            return Err(StreamError::invalid_effect(format!(
                "effect has {} channel timelines but the group has {} channels",
                self.channels.len(),
                channel_count
            )));
        }
        for (channel, segments) in self.channels.iter().enumerate() {
            check_timeline(channel, segments)?;
        }
        Ok(())
    }
}

/// Rejects reversed and overlapping segments. A segment may start on the
/// previous segment's end tick (shared keyframe).
pub(crate) fn check_timeline(channel: usize, segments: &[KeyframeSegment]) -> Result<()> {
    for segment in segments {
        if let Some(end) = segment.end {
            if end < segment.start {
                return Err(StreamError::invalid_effect(format!(
                    "channel {}: segment ends at tick {} before it starts at {}",
                    channel, end, segment.start
                )));
            }
        }
    }

    let mut ordered: Vec<&KeyframeSegment> = segments.iter().collect();
    ordered.sort_by_key(|s| s.start);
    for pair in ordered.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        let overlaps = next.start == prev.start || prev.end.is_some_and(|end| next.start < end);
        if overlaps {
            return Err(StreamError::invalid_effect(format!(
                "channel {}: segment at tick {} overlaps segment {}..{}",
                channel,
                next.start,
                prev.start,
                prev.end.map_or_else(|| "open".to_string(), |e| e.to_string())
            )));
        }
    }
    Ok(())
}

/// Dense per-tick playback buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledEffect {
    frames: Vec<LightState>,
    terminal: LightState,
    interval: Duration,
    repeat: bool,
}

impl CompiledEffect {
    pub(crate) fn new(frames: Vec<LightState>, interval: Duration, repeat: bool) -> Self {
        let terminal = frames.last().cloned().unwrap_or_default();
        Self {
            frames,
            terminal,
            interval,
            repeat,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, tick: usize) -> Option<&LightState> {
        self.frames.get(tick)
    }

    pub fn frames(&self) -> &[LightState] {
        &self.frames
    }

    /// Color state after the last frame, the next effect's anchor.
    pub fn terminal(&self) -> &LightState {
        &self.terminal
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }
}

/// An effect waiting in the playback queue.
#[derive(Debug, Clone)]
pub enum QueuedEffect {
    Compiled(Arc<CompiledEffect>),
    /// Compiled when dequeued, anchored to whatever played last
    Pending(EffectSpec),
}

impl QueuedEffect {
    pub fn validate(&self, channel_count: usize) -> Result<()> {
        match self {
            QueuedEffect::Compiled(effect) => {
                let channels = effect.frame(0).map_or(0, |f| f.len());
                if channels != channel_count {
                    return Err(StreamError::invalid_effect(format!(
                        "compiled effect drives {} channels but the group has {}",
                        channels, channel_count
                    )));
                }
                Ok(())
            }
            QueuedEffect::Pending(spec) => spec.validate(channel_count),
        }
    }

    pub fn resolve(self, anchor: &LightState) -> Result<Arc<CompiledEffect>> {
        match self {
            QueuedEffect::Compiled(effect) => Ok(effect),
            QueuedEffect::Pending(spec) => spec.compile(anchor).map(Arc::new),
        }
    }
}

impl From<EffectSpec> for QueuedEffect {
    fn from(spec: EffectSpec) -> Self {
        QueuedEffect::Pending(spec)
    }
}

impl From<CompiledEffect> for QueuedEffect {
    fn from(effect: CompiledEffect) -> Self {
        QueuedEffect::Compiled(Arc::new(effect))
    }
}
