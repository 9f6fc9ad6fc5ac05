//! JSON form of an effect, as submitted by the authoring tool.
//!
//! Segment times are milliseconds from the start of the effect. A color
//! component is either a number or the keyword `"start"`, which carries the
//! channel's current value forward.

use serde::{Deserialize, Serialize};

use crate::effect::effect::{Component, EffectSpec, Formula, KeyframeSegment, TargetColor};
use crate::error::{Result, StreamError};

/// Keyword used for the carry-forward sentinel.
pub const CARRY_FORWARD_KEYWORD: &str = "start";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectDescription {
    /// Total length in milliseconds
    pub duration: u64,
    /// Tick interval in milliseconds
    pub interval: u64,
    #[serde(default)]
    pub repeat: bool,
    /// One transition list per channel
    pub effect: Vec<Vec<TransitionDescription>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionDescription {
    pub start: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<[ComponentValue; 3]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[ComponentValue; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ComponentRepr", into = "ComponentRepr")]
pub struct ComponentValue(pub Component);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ComponentRepr {
    Number(f64),
    Keyword(String),
}

impl TryFrom<ComponentRepr> for ComponentValue {
    type Error = String;

    fn try_from(repr: ComponentRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            ComponentRepr::Number(value) => Ok(ComponentValue(Component::Literal(value))),
            ComponentRepr::Keyword(keyword) if keyword == CARRY_FORWARD_KEYWORD => {
                Ok(ComponentValue(Component::CarryForward))
            }
            ComponentRepr::Keyword(other) => Err(format!(
                "unknown color keyword {:?}, expected a number or {:?}",
                other, CARRY_FORWARD_KEYWORD
            )),
        }
    }
}

impl From<ComponentValue> for ComponentRepr {
    fn from(value: ComponentValue) -> Self {
        match value.0 {
            Component::Literal(v) => ComponentRepr::Number(v),
            Component::CarryForward => ComponentRepr::Keyword(CARRY_FORWARD_KEYWORD.to_string()),
        }
    }
}

impl EffectDescription {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| StreamError::invalid_effect(e.to_string()))
    }

    /// Converts millisecond offsets to ticks of `interval`.
    ///
    /// Times are floored to a tick, except that an end at or past the last
    /// frame lands on the last frame. When a transition folds onto the same
    /// tick as the next one without overlapping it in milliseconds, the later
    /// transition wins.
    pub fn into_spec(self) -> Result<EffectSpec> {
        if self.interval == 0 {
            return Err(StreamError::invalid_effect("interval must be greater than zero"));
        }
        let interval = self.interval;

        let mut spec = EffectSpec::new(self.duration, interval, self.repeat);
        let last_tick = spec.frame_count().saturating_sub(1);
        for (channel, transitions) in self.effect.into_iter().enumerate() {
            spec = spec.with_channel(channel_segments(channel, transitions, interval, last_tick)?);
        }
        Ok(spec)
    }
}

fn channel_segments(
    channel: usize,
    mut transitions: Vec<TransitionDescription>,
    interval: u64,
    last_tick: usize,
) -> Result<Vec<KeyframeSegment>> {
    transitions.sort_by_key(|t| t.start);

    let mut segments: Vec<KeyframeSegment> = Vec::with_capacity(transitions.len());
    let mut previous: Option<(u64, Option<u64>)> = None;
    for transition in transitions {
        let span = (transition.start, transition.end);
        let segment = transition.into_segment(channel, interval, last_tick)?;

        let folds = previous.is_some_and(|(start, end)| {
            start < span.0 && end.map_or(true, |end| end <= span.0)
        });
        match segments.last_mut() {
            Some(last) if folds && last.start == segment.start => {
                log::debug!(
                    "channel {}: transition at {}ms replaces the one folded onto tick {}",
                    channel,
                    span.0,
                    segment.start
                );
                *last = segment;
            }
            _ => segments.push(segment),
        }
        previous = Some(span);
    }
    Ok(segments)
}

impl TransitionDescription {
    fn into_segment(
        self,
        channel: usize,
        interval: u64,
        last_tick: usize,
    ) -> Result<KeyframeSegment> {
        let color = self
            .colors
            .and_then(|colors| colors.into_iter().next())
            .or(self.color)
            .ok_or_else(|| {
                StreamError::invalid_effect(format!(
                    "channel {}: transition at {}ms has no color",
                    channel, self.start
                ))
            })?;

        let formula = match self.formula.as_deref() {
            None | Some("hold") | Some("identity") => Formula::Hold,
            Some("t") | Some("linear") => Formula::Linear,
            Some(other) => {
                return Err(StreamError::invalid_effect(format!(
                    "channel {}: unknown formula {:?}",
                    channel, other
                )))
            }
        };

        let start = (self.start / interval) as usize;
        Ok(KeyframeSegment {
            start,
            end: self
                .end
                .map(|end| ((end / interval) as usize).min(last_tick).max(start)),
            target: TargetColor(color.map(|c| c.0)),
            formula,
        })
    }
}
