//! Wire frame for the entertainment streaming protocol.
//!
//! Layout (big-endian):
//! - `"HueStream"` protocol name, version `0x02 0x00`
//! - sequence id, two reserved bytes
//! - color space selector, one reserved byte
//! - 36-byte group identifier (ASCII, zero padded)
//! - per channel: device type, channel id (u16), three u16 components

use crate::color::{ColorSpace, LightState};
use crate::error::EncodeError;

pub const PROTOCOL_NAME: &[u8; 9] = b"HueStream";
pub const PROTOCOL_VERSION: [u8; 2] = [0x02, 0x00];
pub const GROUP_ID_LEN: usize = 36;
pub const HEADER_LEN: usize = 52;
pub const RECORD_LEN: usize = 9;
/// Most channels a bridge accepts in one frame
pub const MAX_CHANNELS: usize = 20;
pub const DEVICE_TYPE_LIGHT: u8 = 0x00;

#[derive(Debug, Clone)]
pub struct FrameEncoder {
    group_id: [u8; GROUP_ID_LEN],
    color_space: ColorSpace,
    channel_ids: Vec<u16>,
}

impl FrameEncoder {
    pub fn new(
        group_id: &str,
        color_space: ColorSpace,
        channel_ids: Vec<u16>,
    ) -> Result<Self, EncodeError> {
        if !group_id.is_ascii() || group_id.len() > GROUP_ID_LEN {
            return Err(EncodeError::InvalidGroupId {
                got: group_id.to_string(),
                max: GROUP_ID_LEN,
            });
        }
        if channel_ids.len() > MAX_CHANNELS {
            return Err(EncodeError::TooManyChannels(channel_ids.len()));
        }

        let mut padded = [0u8; GROUP_ID_LEN];
        padded[..group_id.len()].copy_from_slice(group_id.as_bytes());

        Ok(Self {
            group_id: padded,
            color_space,
            channel_ids,
        })
    }

    /// Encoder addressing channels `0..channel_count` in order.
    pub fn sequential(
        group_id: &str,
        color_space: ColorSpace,
        channel_count: usize,
    ) -> Result<Self, EncodeError> {
        if channel_count > MAX_CHANNELS {
            return Err(EncodeError::TooManyChannels(channel_count));
        }
        Self::new(group_id, color_space, (0..channel_count as u16).collect())
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn channel_count(&self) -> usize {
        self.channel_ids.len()
    }

    pub fn encode(&self, sequence: u8, state: &LightState) -> Result<Vec<u8>, EncodeError> {
        if state.len() != self.channel_ids.len() {
            return Err(EncodeError::ChannelCount {
                expected: self.channel_ids.len(),
                got: state.len(),
            });
        }

        let mut frame = Vec::with_capacity(HEADER_LEN + RECORD_LEN * state.len());
        frame.extend_from_slice(PROTOCOL_NAME);
        frame.extend_from_slice(&PROTOCOL_VERSION);
        frame.push(sequence);
        frame.extend_from_slice(&[0x00, 0x00]);
        frame.push(self.color_space.selector());
        frame.push(0x00);
        frame.extend_from_slice(&self.group_id);

        let ranges = self.color_space.component_ranges();
        for (channel, (id, color)) in self.channel_ids.iter().zip(state.iter()).enumerate() {
            frame.push(DEVICE_TYPE_LIGHT);
            frame.extend_from_slice(&id.to_be_bytes());
            for (value, range) in color.components().iter().zip(ranges) {
                if !value.is_finite() {
                    return Err(EncodeError::NonFinite { channel });
                }
                frame.extend_from_slice(&scale(*value, range).to_be_bytes());
            }
        }

        Ok(frame)
    }
}

fn scale(value: f64, range: f64) -> u16 {
    ((value / range).clamp(0.0, 1.0) * u16::MAX as f64).round() as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ChannelColor;

    const GROUP: &str = "1a8d99cc-967b-44f2-9202-43f976c0fa6b";

    #[test]
    fn header_layout() {
        let encoder = FrameEncoder::sequential(GROUP, ColorSpace::Xy, 1).unwrap();
        let state = LightState::uniform(1, ChannelColor::new(0.0, 0.0, 0.0));
        let frame = encoder.encode(7, &state).unwrap();

        assert_eq!(frame.len(), HEADER_LEN + RECORD_LEN);
        assert_eq!(&frame[0..9], b"HueStream");
        assert_eq!(&frame[9..11], &[0x02, 0x00]);
        assert_eq!(frame[11], 7);
        assert_eq!(&frame[12..14], &[0x00, 0x00]);
        assert_eq!(frame[14], 0x01);
        assert_eq!(frame[15], 0x00);
        assert_eq!(&frame[16..52], GROUP.as_bytes());
    }

    #[test]
    fn xy_brightness_records_scale_to_16_bits() {
        let encoder = FrameEncoder::new(GROUP, ColorSpace::Xy, vec![3, 258]).unwrap();
        let state = LightState::new(vec![
            ChannelColor::new(1.0, 0.0, 255.0),
            ChannelColor::new(0.5, 2.0, -4.0),
        ]);
        let frame = encoder.encode(0, &state).unwrap();
        let records = &frame[HEADER_LEN..];

        assert_eq!(
            &records[..RECORD_LEN],
            &[0x00, 0x00, 0x03, 0xFF, 0xFF, 0x00, 0x00, 0xFF, 0xFF]
        );
        // out of range components clamp
        assert_eq!(
            &records[RECORD_LEN..],
            &[0x00, 0x01, 0x02, 0x80, 0x00, 0xFF, 0xFF, 0x00, 0x00]
        );
    }

    #[test]
    fn rgb_records_use_full_byte_range() {
        let encoder = FrameEncoder::sequential("group-1", ColorSpace::Rgb, 1).unwrap();
        let state = LightState::uniform(1, ChannelColor::new(255.0, 0.0, 128.0));
        let frame = encoder.encode(0, &state).unwrap();

        assert_eq!(frame[14], 0x00);
        assert_eq!(&frame[16..23], b"group-1");
        assert!(frame[23..52].iter().all(|b| *b == 0));
        let record = &frame[HEADER_LEN..];
        assert_eq!(&record[3..5], &[0xFF, 0xFF]);
        assert_eq!(&record[5..7], &[0x00, 0x00]);
        assert_eq!(u16::from_be_bytes([record[7], record[8]]), 32896);
    }

    #[test]
    fn malformed_frames_are_rejected() {
        let encoder = FrameEncoder::sequential(GROUP, ColorSpace::Xy, 2).unwrap();
        let one = LightState::uniform(1, ChannelColor::default());
        assert_eq!(
            encoder.encode(0, &one),
            Err(EncodeError::ChannelCount {
                expected: 2,
                got: 1
            })
        );

        let nan = LightState::new(vec![
            ChannelColor::default(),
            ChannelColor::new(f64::NAN, 0.0, 0.0),
        ]);
        assert_eq!(
            encoder.encode(0, &nan),
            Err(EncodeError::NonFinite { channel: 1 })
        );
    }

    #[test]
    fn invalid_encoders_are_rejected() {
        assert!(FrameEncoder::sequential(GROUP, ColorSpace::Xy, 21).is_err());
        assert!(FrameEncoder::sequential("grüppe", ColorSpace::Xy, 1).is_err());
        let long = "x".repeat(GROUP_ID_LEN + 1);
        assert!(FrameEncoder::sequential(&long, ColorSpace::Xy, 1).is_err());
    }
}
