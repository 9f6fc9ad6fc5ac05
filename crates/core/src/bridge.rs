use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::color::{ChannelColor, LightState};

/// Reported state of one channel of a group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub x: f64,
    pub y: f64,
    /// 0-100
    pub brightness: f64,
}

impl ChannelStatus {
    pub fn to_color(&self) -> ChannelColor {
        ChannelColor::new(self.x, self.y, (self.brightness * 2.55).round())
    }
}

/// Converts reported statuses into the group's starting light state.
pub fn light_state_from_statuses(statuses: &[ChannelStatus]) -> LightState {
    LightState::new(statuses.iter().map(ChannelStatus::to_color).collect())
}

/// The control plane of the fixture controller.
///
/// Streaming mode must be active on a group before frames are accepted, and
/// should be turned off again when the session ends.
#[async_trait]
pub trait Bridge: Send + Sync {
    async fn activate_streaming(&self, group_id: &str) -> anyhow::Result<()>;

    async fn deactivate_streaming(&self, group_id: &str) -> anyhow::Result<()>;

    /// Current color of every channel, in channel order.
    async fn channel_statuses(&self, group_id: &str) -> anyhow::Result<Vec<ChannelStatus>>;
}
