use serde::{Deserialize, Serialize};

use crate::color::LightState;
use crate::effect::effect::{Component, EffectSpec, KeyframeSegment, TargetColor};

/// Shape of the animation played while the queue is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdleSettings {
    pub duration_ms: u64,
    pub interval_ms: u64,
    /// Brightness (0-255) the group dips to on each breath
    pub dip_brightness: f64,
}

impl Default for IdleSettings {
    fn default() -> Self {
        Self {
            duration_ms: 6000,
            interval_ms: 25,
            dip_brightness: 100.0,
        }
    }
}

/// Keyframes of the idle cycle in milliseconds: settle, then two breaths.
const BREATH_KEYFRAMES_MS: [(u64, u64, bool); 5] = [
    (0, 100, false),
    (100, 300, true),
    (300, 500, false),
    (500, 700, true),
    (700, 900, false),
];

/// Builds the repeating idle effect for `lights`.
///
/// Each channel keeps its chromaticity and fades its brightness down to
/// `dip_brightness` and back to where it started, twice, then holds.
pub fn idle_effect(lights: &LightState, settings: &IdleSettings) -> EffectSpec {
    let interval = settings.interval_ms.max(1);
    let mut spec = EffectSpec::new(settings.duration_ms, interval, true);

    for color in lights.iter() {
        let resting = color.component(2);
        let mut segments: Vec<KeyframeSegment> = Vec::with_capacity(BREATH_KEYFRAMES_MS.len());
        for &(start, end, dip) in BREATH_KEYFRAMES_MS.iter() {
            let brightness = if dip {
                settings.dip_brightness
            } else {
                resting
            };
            let segment = KeyframeSegment::linear(
                (start / interval) as usize,
                (end / interval) as usize,
                TargetColor([
                    Component::CarryForward,
                    Component::CarryForward,
                    Component::Literal(brightness),
                ]),
            );
            // coarse intervals can fold two keyframes onto one tick
            match segments.last_mut() {
                Some(last) if last.start == segment.start => *last = segment,
                _ => segments.push(segment),
            }
        }
        spec = spec.with_channel(segments);
    }
    spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ChannelColor;

    #[test]
    fn idle_effect_breathes_and_returns_to_rest() {
        let lights = LightState::uniform(2, ChannelColor::new(0.31, 0.33, 254.0));
        let effect = idle_effect(&lights, &IdleSettings::default())
            .compile(&lights)
            .unwrap();

        assert!(effect.repeat());
        assert_eq!(effect.frame_count(), 240);
        assert_eq!(effect.frame(0), Some(&lights));
        // bottom of the first breath at 300ms
        assert_eq!(effect.frame(12).unwrap().get(0).unwrap().component(2), 100.0);
        assert_eq!(effect.frame(12).unwrap().get(1).unwrap().component(0), 0.31);
        assert_eq!(effect.terminal(), &lights);
    }

    #[test]
    fn idle_effect_compiles_for_coarse_intervals() {
        let lights = LightState::uniform(1, ChannelColor::new(0.5, 0.4, 10.0));
        let settings = IdleSettings {
            duration_ms: 2000,
            interval_ms: 200,
            dip_brightness: 0.0,
        };
        let effect = idle_effect(&lights, &settings).compile(&lights).unwrap();
        assert_eq!(effect.frame_count(), 10);
        assert_eq!(effect.terminal(), &lights);
    }
}
