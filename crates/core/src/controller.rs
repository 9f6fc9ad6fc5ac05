use std::sync::Arc;
use std::time::Duration;

use crate::bridge::{light_state_from_statuses, Bridge};
use crate::effect::{idle_effect, EffectDescription, EffectSpec, QueuedEffect};
use crate::error::{Result, StreamError};
use crate::messages::{PlaybackStatus, Settings};
use crate::playback::{Playback, Scheduler};
use crate::stream::{connect_with_retry, Connector, FrameEncoder, TransportSession};

struct ActiveSession {
    group_id: String,
    transport: Arc<TransportSession>,
    scheduler: Scheduler,
}

/// Owns one streaming session: bridge streaming mode, the encrypted
/// transport and the playback scheduler.
pub struct StreamController {
    bridge: Arc<dyn Bridge>,
    connector: Arc<dyn Connector>,
    settings: Settings,
    session: Option<ActiveSession>,
}

impl StreamController {
    pub fn new(bridge: Arc<dyn Bridge>, connector: Arc<dyn Connector>, settings: Settings) -> Self {
        Self {
            bridge,
            connector,
            settings,
            session: None,
        }
    }

    /// Enables streaming on `group_id`, opens the transport and starts the
    /// idle animation.
    pub async fn connect(&mut self, group_id: &str) -> Result<()> {
        if self.session.is_some() {
            return Err(StreamError::AlreadyConnected);
        }

        log::info!("Activating streaming for group {}", group_id);
        self.bridge
            .activate_streaming(group_id)
            .await
            .map_err(StreamError::Bridge)?;

        match self.open(group_id).await {
            Ok(session) => {
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                log::error!("Could not start streaming to group {}: {}", group_id, e);
                if let Err(deactivate) = self.bridge.deactivate_streaming(group_id).await {
                    log::warn!("Failed to deactivate streaming: {:#}", deactivate);
                }
                Err(e)
            }
        }
    }

    async fn open(&self, group_id: &str) -> Result<ActiveSession> {
        let statuses = self
            .bridge
            .channel_statuses(group_id)
            .await
            .map_err(StreamError::Bridge)?;
        let lights = light_state_from_statuses(&statuses);
        if lights.is_empty() {
            return Err(StreamError::Bridge(anyhow::anyhow!(
                "group {} reported no channels",
                group_id
            )));
        }

        let encoder = FrameEncoder::sequential(group_id, self.settings.color_space, lights.len())?;
        let idle = idle_effect(&lights, &self.settings.idle()).compile(&lights)?;

        let transport = Arc::new(
            connect_with_retry(self.connector.as_ref(), self.settings.handshake_attempts).await?,
        );

        let playback = Playback::new(Arc::new(idle), lights);
        let scheduler = Scheduler::spawn(playback, encoder, transport.clone());

        Ok(ActiveSession {
            group_id: group_id.to_string(),
            transport,
            scheduler,
        })
    }

    fn session(&self) -> Result<&ActiveSession> {
        self.session.as_ref().ok_or(StreamError::NotConnected)
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn group_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.group_id.as_str())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Queues an effect behind whatever is already queued.
    pub async fn enqueue(&self, spec: EffectSpec) -> Result<usize> {
        self.enqueue_effect(spec.into()).await
    }

    pub async fn enqueue_effect(&self, effect: QueuedEffect) -> Result<usize> {
        self.session()?.scheduler.enqueue(effect).await
    }

    pub async fn enqueue_description(&self, description: EffectDescription) -> Result<usize> {
        self.enqueue(description.into_spec()?).await
    }

    /// Cuts the active effect short and plays the queue head.
    pub async fn play_next(&self) -> Result<()> {
        if self.session()?.scheduler.play_next().await? {
            Ok(())
        } else {
            Err(StreamError::QueueEmpty)
        }
    }

    pub async fn status(&self) -> Result<PlaybackStatus> {
        self.session()?.scheduler.status().await
    }

    /// Stops the scheduler, closes the transport, then deactivates
    /// streaming. Every step runs even if an earlier one fails.
    pub async fn shutdown(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        log::info!("Shutting down stream for group {}", session.group_id);

        let mut failures = Vec::new();
        if let Err(e) = session.scheduler.stop().await {
            failures.push(e.to_string());
        }
        if let Err(e) = session.transport.close().await {
            failures.push(format!("closing transport: {}", e));
        }
        if let Err(e) = self.bridge.deactivate_streaming(&session.group_id).await {
            failures.push(format!("deactivating streaming: {:#}", e));
        }

        if failures.is_empty() {
            log::info!("Stream shut down cleanly");
            Ok(())
        } else {
            Err(StreamError::Shutdown(failures.join("; ")))
        }
    }

    /// [`shutdown`](Self::shutdown) bounded by `grace`.
    pub async fn shutdown_within(&mut self, grace: Duration) -> Result<()> {
        tokio::time::timeout(grace, self.shutdown())
            .await
            .map_err(|_| StreamError::Shutdown(format!("not finished within {:?}", grace)))?
    }
}
