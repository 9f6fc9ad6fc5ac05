use async_trait::async_trait;
use glow_core::{Bridge, ChannelStatus};

/// Bridge for setups where streaming mode is switched on outside this
/// process. Reports every channel as neutral white at full brightness.
pub struct ManualBridge {
    channel_count: usize,
}

impl ManualBridge {
    pub fn new(channel_count: usize) -> Self {
        Self { channel_count }
    }
}

#[async_trait]
impl Bridge for ManualBridge {
    async fn activate_streaming(&self, group_id: &str) -> anyhow::Result<()> {
        log::info!(
            "Assuming streaming is already active for group {}",
            group_id
        );
        Ok(())
    }

    async fn deactivate_streaming(&self, group_id: &str) -> anyhow::Result<()> {
        log::info!("Streaming for group {} can now be deactivated", group_id);
        Ok(())
    }

    async fn channel_statuses(&self, _group_id: &str) -> anyhow::Result<Vec<ChannelStatus>> {
        if self.channel_count == 0 {
            anyhow::bail!("channel count must be at least 1");
        }
        // D65 white point
        let white = ChannelStatus {
            x: 0.3127,
            y: 0.3290,
            brightness: 100.0,
        };
        Ok(vec![white; self.channel_count])
    }
}
