use serde::{Deserialize, Serialize};

/// Color space applied to every channel record in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    Rgb,
    /// CIE chromaticity pair plus brightness
    #[default]
    Xy,
}

impl ColorSpace {
    /// Selector byte written into the frame header.
    pub fn selector(&self) -> u8 {
        match self {
            ColorSpace::Rgb => 0x00,
            ColorSpace::Xy => 0x01,
        }
    }

    /// Upper bound of each component before scaling to 16 bits.
    pub fn component_ranges(&self) -> [f64; 3] {
        match self {
            ColorSpace::Rgb => [255.0, 255.0, 255.0],
            ColorSpace::Xy => [1.0, 1.0, 255.0],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorSpace::Rgb => "rgb",
            ColorSpace::Xy => "xy",
        }
    }
}

/// The color one channel shows: (x, y, brightness 0-255) or (r, g, b).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ChannelColor(pub [f64; 3]);

impl ChannelColor {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        ChannelColor([a, b, c])
    }

    pub fn components(&self) -> [f64; 3] {
        self.0
    }

    pub fn component(&self, index: usize) -> f64 {
        self.0[index]
    }
}

/// What every channel of the group currently shows, in channel order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LightState {
    channels: Vec<ChannelColor>,
}

impl LightState {
    pub fn new(channels: Vec<ChannelColor>) -> Self {
        Self { channels }
    }

    /// A state where every channel shows the same color.
    pub fn uniform(channel_count: usize, color: ChannelColor) -> Self {
        Self {
            channels: vec![color; channel_count],
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn get(&self, channel: usize) -> Option<&ChannelColor> {
        self.channels.get(channel)
    }

    pub fn channels(&self) -> &[ChannelColor] {
        &self.channels
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelColor> {
        self.channels.iter()
    }
}

impl From<Vec<ChannelColor>> for LightState {
    fn from(channels: Vec<ChannelColor>) -> Self {
        Self::new(channels)
    }
}
