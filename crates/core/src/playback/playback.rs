use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::color::LightState;
use crate::effect::{CompiledEffect, QueuedEffect};
use crate::error::Result;
use crate::messages::PlaybackStatus;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum PlaybackState {
    /// Looping the idle effect
    Idle,
    /// Playing an effect taken from the queue
    Playing,
    /// A one-shot effect emitted its last frame; resolved on the next tick
    Exhausted,
}

/// The effect timeline: one active effect, a FIFO queue and the idle fallback.
///
/// Nothing here does I/O or keeps time; the scheduler calls [`Playback::tick`]
/// once per interval of the active effect.
pub struct Playback {
    idle: Arc<CompiledEffect>,
    active: Arc<CompiledEffect>,
    state: PlaybackState,
    tick_index: usize,
    queue: VecDeque<QueuedEffect>,
    last_light_state: LightState,
    channel_count: usize,
}

impl Playback {
    /// Starts idle. `lights` is the group's state at session start.
    pub fn new(idle: Arc<CompiledEffect>, lights: LightState) -> Self {
        let channel_count = lights.len();
        Self {
            active: idle.clone(),
            idle,
            state: PlaybackState::Idle,
            tick_index: 0,
            queue: VecDeque::new(),
            last_light_state: lights,
            channel_count,
        }
    }

    /// Produces the frame for this tick, switching effects first if needed.
    pub fn tick(&mut self) -> &LightState {
        if self.state == PlaybackState::Idle && !self.queue.is_empty() {
            self.advance();
        } else if self.tick_index >= self.active.frame_count() {
            if self.active.repeat() {
                self.tick_index = 0;
            } else {
                self.advance();
            }
        }

        let index = self.tick_index;
        self.tick_index += 1;
        if self.state == PlaybackState::Playing
            && !self.active.repeat()
            && self.tick_index >= self.active.frame_count()
        {
            self.state = PlaybackState::Exhausted;
        }

        // frame_count >= 1 is guaranteed by compilation
        &self.active.frames()[index]
    }

    /// Appends an effect to the queue and returns the queue length.
    pub fn enqueue(&mut self, effect: QueuedEffect) -> Result<usize> {
        effect.validate(self.channel_count)?;
        self.queue.push_back(effect);
        Ok(self.queue.len())
    }

    /// Pre-empts the active effect. Returns `false` only when idle with an
    /// empty queue.
    pub fn play_next(&mut self) -> bool {
        if self.queue.is_empty() && self.state == PlaybackState::Idle {
            return false;
        }
        self.advance();
        true
    }

    fn advance(&mut self) {
        if self.state != PlaybackState::Idle {
            self.last_light_state = self.active.terminal().clone();
        }

        while let Some(next) = self.queue.pop_front() {
            match next.resolve(&self.last_light_state) {
                Ok(effect) => {
                    log::debug!(
                        "Playing next effect: {} frames every {:?}{}",
                        effect.frame_count(),
                        effect.interval(),
                        if effect.repeat() { ", repeating" } else { "" }
                    );
                    self.active = effect;
                    self.state = PlaybackState::Playing;
                    self.tick_index = 0;
                    return;
                }
                Err(e) => log::error!("Dropping queued effect: {}", e),
            }
        }

        log::debug!("Queue empty, returning to idle");
        self.active = self.idle.clone();
        self.state = PlaybackState::Idle;
        self.tick_index = 0;
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == PlaybackState::Idle
    }

    pub fn active(&self) -> &Arc<CompiledEffect> {
        &self.active
    }

    /// Tick rate of the active effect.
    pub fn interval(&self) -> Duration {
        self.active.interval()
    }

    pub fn tick_index(&self) -> usize {
        self.tick_index
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn last_light_state(&self) -> &LightState {
        &self.last_light_state
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.state,
            tick_index: self.tick_index,
            frame_count: self.active.frame_count(),
            interval_ms: self.active.interval().as_millis() as u64,
            repeat: self.active.repeat(),
            queued: self.queue.len(),
            last_light_state: self.last_light_state.clone(),
        }
    }
}
