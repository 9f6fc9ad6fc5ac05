use std::time::Duration;

use crate::color::{ChannelColor, LightState};
use crate::effect::effect::{check_timeline, CompiledEffect, EffectSpec, Formula, KeyframeSegment};
use crate::error::{Result, StreamError};

impl EffectSpec {
    /// Expands the sparse keyframes into one `LightState` per tick.
    ///
    /// `anchor` is the state carry-forward components resolve against and the
    /// value every channel holds before its first segment.
    pub fn compile(&self, anchor: &LightState) -> Result<CompiledEffect> {
        self.validate(anchor.len())?;
        let frame_count = self.frame_count();

        let mut columns = Vec::with_capacity(anchor.len());
        for (channel, anchor_color) in anchor.iter().enumerate() {
            let segments = self.channels.get(channel).map(Vec::as_slice).unwrap_or(&[]);
            columns.push(compile_channel(channel, segments, *anchor_color, frame_count)?);
        }

        let frames = (0..frame_count)
            .map(|tick| LightState::new(columns.iter().map(|column| column[tick]).collect()))
            .collect();

        Ok(CompiledEffect::new(
            frames,
            Duration::from_millis(self.interval_ms),
            self.repeat,
        ))
    }
}

fn compile_channel(
    channel: usize,
    segments: &[KeyframeSegment],
    anchor: ChannelColor,
    frame_count: usize,
) -> Result<Vec<ChannelColor>> {
    check_timeline(channel, segments)?;

    let mut ordered: Vec<&KeyframeSegment> = segments.iter().collect();
    ordered.sort_by_key(|s| s.start);

    let mut values = Vec::with_capacity(frame_count);
    let mut current = anchor;

    for (i, segment) in ordered.iter().enumerate() {
        if values.len() >= frame_count {
            break;
        }

        while values.len() < segment.start.min(frame_count) {
            values.push(current);
        }

        let next_start = ordered.get(i + 1).map(|next| next.start);
        let end = match (segment.end, next_start) {
            (Some(end), _) => end,
            (None, Some(next)) => next - 1,
            (None, None) => frame_count.saturating_sub(1).max(segment.start),
        };
        // A segment starting on this one's end tick takes that tick over.
        let last_owned = match next_start {
            Some(next) if next <= end => next - 1,
            _ => end,
        };

        let from = current;
        let target = segment.target.resolve(&anchor);
        let carried = segment.target.components().map(|c| c.is_carry_forward());

        for tick in segment.start..=last_owned.min(frame_count.saturating_sub(1)) {
            values.push(sample(segment.formula, from, target, carried, segment.start, end, tick));
        }

        current = target;
    }

    while values.len() < frame_count {
        values.push(current);
    }

    if values.len() != frame_count {
        return Err(StreamError::invalid_effect(format!(
            "channel {} compiled to {} frames, expected {}",
            channel,
            values.len(),
            frame_count
        )));
    }
    Ok(values)
}

fn sample(
    formula: Formula,
    from: ChannelColor,
    target: ChannelColor,
    carried: [bool; 3],
    start: usize,
    end: usize,
    tick: usize,
) -> ChannelColor {
    match formula {
        Formula::Hold => target,
        Formula::Linear => {
            let t = if end == start {
                1.0
            } else {
                ((tick - start) as f64 / (end - start) as f64).clamp(0.0, 1.0)
            };
            let mut out = [0.0; 3];
            for i in 0..3 {
                out[i] = if carried[i] {
                    target.component(i)
                } else {
                    lerp(from.component(i), target.component(i), t)
                };
            }
            ChannelColor(out)
        }
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    if t >= 1.0 {
        b
    } else {
        a + (b - a) * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::effect::{Component, TargetColor};

    fn anchor(colors: &[[f64; 3]]) -> LightState {
        LightState::new(colors.iter().map(|c| ChannelColor(*c)).collect())
    }

    fn channel_values(effect: &CompiledEffect, channel: usize) -> Vec<ChannelColor> {
        effect
            .frames()
            .iter()
            .map(|frame| *frame.get(channel).unwrap())
            .collect()
    }

    #[test]
    fn frame_count_is_duration_over_interval() {
        let start = anchor(&[[0.3, 0.3, 100.0]]);
        let effect = EffectSpec::new(2000, 50, false).compile(&start).unwrap();
        assert_eq!(effect.frame_count(), 40);

        let truncated = EffectSpec::new(2049, 50, false).compile(&start).unwrap();
        assert_eq!(truncated.frame_count(), 40);
    }

    #[test]
    fn channel_without_segments_holds_anchor() {
        let start = anchor(&[[0.3, 0.3, 100.0], [0.5, 0.4, 20.0]]);
        let spec = EffectSpec::new(500, 50, false).with_channel(vec![KeyframeSegment::hold(
            0,
            None,
            TargetColor::literal(0.1, 0.1, 255.0),
        )]);
        let effect = spec.compile(&start).unwrap();

        for value in channel_values(&effect, 1) {
            assert_eq!(value, ChannelColor::new(0.5, 0.4, 20.0));
        }
        assert_eq!(effect.terminal().get(1), start.get(1));
    }

    #[test]
    fn hold_segment_shows_target_for_every_tick() {
        let start = anchor(&[[0.3, 0.3, 100.0]]);
        let target = TargetColor([
            Component::CarryForward,
            Component::Literal(0.6),
            Component::Literal(42.0),
        ]);
        let spec = EffectSpec::new(1000, 50, false)
            .with_channel(vec![KeyframeSegment::hold(3, Some(9), target)]);
        let values = channel_values(&spec.compile(&start).unwrap(), 0);

        for tick in 0..3 {
            assert_eq!(values[tick], ChannelColor::new(0.3, 0.3, 100.0));
        }
        for tick in 3..=9 {
            assert_eq!(values[tick], ChannelColor::new(0.3, 0.6, 42.0));
        }
        // trailing ticks hold the last resolved value
        for tick in 10..20 {
            assert_eq!(values[tick], ChannelColor::new(0.3, 0.6, 42.0));
        }
    }

    #[test]
    fn linear_segment_runs_from_previous_value_to_target() {
        let start = anchor(&[[0.2, 0.2, 0.0]]);
        let spec = EffectSpec::new(1000, 50, false).with_channel(vec![KeyframeSegment::linear(
            2,
            12,
            TargetColor::literal(0.7, 0.4, 200.0),
        )]);
        let values = channel_values(&spec.compile(&start).unwrap(), 0);

        assert_eq!(values[2], ChannelColor::new(0.2, 0.2, 0.0));
        assert_eq!(values[12], ChannelColor::new(0.7, 0.4, 200.0));
        assert!((values[7].component(2) - 100.0).abs() < 1e-9);
        for tick in 3..=12 {
            for c in 0..3 {
                assert!(values[tick].component(c) >= values[tick - 1].component(c));
            }
        }
    }

    #[test]
    fn carried_components_stay_constant_inside_linear_segment() {
        let start = anchor(&[[0.3, 0.3, 100.0]]);
        let spec = EffectSpec::new(1000, 50, false).with_channel(vec![
            KeyframeSegment::hold(0, Some(4), TargetColor::literal(0.9, 0.9, 10.0)),
            KeyframeSegment::linear(
                5,
                15,
                TargetColor([
                    Component::CarryForward,
                    Component::CarryForward,
                    Component::Literal(210.0),
                ]),
            ),
        ]);
        let values = channel_values(&spec.compile(&start).unwrap(), 0);

        for tick in 5..=15 {
            assert_eq!(values[tick].component(0), 0.3);
            assert_eq!(values[tick].component(1), 0.3);
        }
        assert_eq!(values[5].component(2), 10.0);
        assert_eq!(values[15].component(2), 210.0);
    }

    #[test]
    fn overlapping_segments_are_rejected() {
        let start = anchor(&[[0.3, 0.3, 100.0]]);
        let spec = EffectSpec::new(1000, 50, false).with_channel(vec![
            KeyframeSegment::hold(0, Some(10), TargetColor::carry()),
            KeyframeSegment::hold(5, Some(12), TargetColor::literal(0.1, 0.1, 1.0)),
        ]);
        assert!(matches!(
            spec.compile(&start),
            Err(StreamError::InvalidEffectSpec(_))
        ));
    }

    #[test]
    fn adjacent_segments_leave_no_gap() {
        let start = anchor(&[[0.0, 0.0, 0.0]]);
        let spec = EffectSpec::new(500, 50, false).with_channel(vec![
            KeyframeSegment::hold(0, Some(4), TargetColor::literal(1.0, 1.0, 1.0)),
            KeyframeSegment::hold(5, Some(9), TargetColor::literal(2.0, 2.0, 2.0)),
        ]);
        let effect = spec.compile(&start).unwrap();
        let values = channel_values(&effect, 0);

        assert_eq!(values.len(), 10);
        assert!(values[..5].iter().all(|v| *v == ChannelColor::new(1.0, 1.0, 1.0)));
        assert!(values[5..].iter().all(|v| *v == ChannelColor::new(2.0, 2.0, 2.0)));
    }

    #[test]
    fn later_segment_owns_shared_keyframe() {
        let start = anchor(&[[0.0, 0.0, 0.0]]);
        let spec = EffectSpec::new(500, 50, false).with_channel(vec![
            KeyframeSegment::linear(0, 4, TargetColor::literal(0.0, 0.0, 100.0)),
            KeyframeSegment::linear(4, 8, TargetColor::literal(0.0, 0.0, 0.0)),
        ]);
        let values = channel_values(&spec.compile(&start).unwrap(), 0);

        let brightness: Vec<f64> = values.iter().map(|v| v.component(2)).collect();
        assert_eq!(brightness, vec![0.0, 25.0, 50.0, 75.0, 100.0, 75.0, 50.0, 25.0, 0.0, 0.0]);
    }

    #[test]
    fn open_segment_holds_until_next_segment() {
        let start = anchor(&[[0.0, 0.0, 0.0]]);
        let spec = EffectSpec::new(2000, 50, false).with_channel(vec![
            KeyframeSegment::linear(0, 18, TargetColor([
                Component::CarryForward,
                Component::CarryForward,
                Component::Literal(255.0),
            ])),
            KeyframeSegment::hold(18, None, TargetColor([
                Component::CarryForward,
                Component::CarryForward,
                Component::Literal(50.0),
            ])),
            KeyframeSegment::linear(32, 40, TargetColor::carry()),
        ]);
        let effect = spec.compile(&start).unwrap();
        let values = channel_values(&effect, 0);

        assert!((values[17].component(2) - 255.0 * 17.0 / 18.0).abs() < 1e-9);
        for tick in 18..32 {
            assert_eq!(values[tick].component(2), 50.0);
        }
        // fully carried target snaps to the anchor instead of fading
        for tick in 32..40 {
            assert_eq!(values[tick], ChannelColor::new(0.0, 0.0, 0.0));
        }
        assert_eq!(effect.terminal(), effect.frame(39).unwrap());
    }

    #[test]
    fn segment_past_the_end_is_truncated() {
        let start = anchor(&[[0.0, 0.0, 0.0]]);
        let spec = EffectSpec::new(250, 50, false).with_channel(vec![KeyframeSegment::linear(
            0,
            10,
            TargetColor::literal(0.0, 0.0, 100.0),
        )]);
        let effect = spec.compile(&start).unwrap();
        assert_eq!(effect.frame_count(), 5);
        assert!((effect.terminal().get(0).unwrap().component(2) - 40.0).abs() < 1e-9);
    }
}
