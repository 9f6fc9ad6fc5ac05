use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use super::playback::Playback;
use crate::effect::QueuedEffect;
use crate::error::{Result, StreamError};
use crate::messages::{PlaybackStatus, SchedulerCommand};
use crate::stream::{FrameEncoder, TransportSession};

/// Drives a [`Playback`] from a tokio task, sending one frame per tick.
///
/// The task owns the playback state; callers talk to it through
/// [`SchedulerCommand`]s so that ticks and commands never interleave.
pub struct Scheduler {
    commands: mpsc::UnboundedSender<SchedulerCommand>,
    status: Arc<Mutex<PlaybackStatus>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Spawns the scheduler. The first frame goes out immediately.
    pub fn spawn(
        playback: Playback,
        encoder: FrameEncoder,
        transport: Arc<TransportSession>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let status = Arc::new(Mutex::new(playback.status()));

        let task = tokio::spawn(run(playback, encoder, transport, rx, status.clone()));

        Self {
            commands: tx,
            status,
            task: Mutex::new(Some(task)),
        }
    }

    pub async fn enqueue(&self, effect: QueuedEffect) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerCommand::Enqueue { effect, reply })?;
        rx.await.map_err(|_| StreamError::SchedulerStopped)?
    }

    /// Pre-empts the active effect at the next tick. When the next effect
    /// ticks at a different rate, its first frame goes out immediately.
    pub async fn play_next(&self) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerCommand::PlayNext { reply })?;
        rx.await.map_err(|_| StreamError::SchedulerStopped)
    }

    pub async fn status(&self) -> Result<PlaybackStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(SchedulerCommand::Status { reply })?;
        rx.await.map_err(|_| StreamError::SchedulerStopped)
    }

    /// Last status published by the task, without a round trip.
    pub fn snapshot(&self) -> PlaybackStatus {
        self.status.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stops ticking and waits for the task to exit. Safe to call twice.
    pub async fn stop(&self) -> Result<()> {
        let _ = self.commands.send(SchedulerCommand::Stop);
        let task = self.task.lock().take();
        match task {
            Some(task) => task
                .await
                .map_err(|e| StreamError::Shutdown(format!("scheduler task failed: {}", e))),
            None => Ok(()),
        }
    }

    fn send(&self, command: SchedulerCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| StreamError::SchedulerStopped)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

fn ticker(start: Instant, period: Duration) -> Interval {
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn run(
    mut playback: Playback,
    encoder: FrameEncoder,
    transport: Arc<TransportSession>,
    mut commands: mpsc::UnboundedReceiver<SchedulerCommand>,
    status: Arc<Mutex<PlaybackStatus>>,
) {
    let mut period = playback.interval();
    let mut ticks = ticker(Instant::now(), period);
    let mut sequence: u8 = 0;

    log::info!(
        "Scheduler started: {} channels, idle every {:?}",
        playback.channel_count(),
        period
    );

    loop {
        tokio::select! {
            command = commands.recv() => {
                // publish before replying so callers never read a stale snapshot
                match command {
                    Some(SchedulerCommand::Enqueue { effect, reply }) => {
                        let result = playback.enqueue(effect);
                        if let Err(e) = &result {
                            log::warn!("Rejected effect: {}", e);
                        }
                        *status.lock() = playback.status();
                        let _ = reply.send(result);
                    }
                    Some(SchedulerCommand::PlayNext { reply }) => {
                        let advanced = playback.play_next();
                        if playback.interval() != period {
                            period = playback.interval();
                            log::debug!("Tick interval now {:?}", period);
                            ticks = ticker(Instant::now(), period);
                        }
                        *status.lock() = playback.status();
                        let _ = reply.send(advanced);
                    }
                    Some(SchedulerCommand::Status { reply }) => {
                        let _ = reply.send(playback.status());
                    }
                    Some(SchedulerCommand::Stop) | None => {
                        log::debug!("Scheduler received stop");
                        break;
                    }
                }
            }

            _ = ticks.tick() => {
                let datagram = encoder.encode(sequence, playback.tick());
                sequence = sequence.wrapping_add(1);

                match datagram {
                    Ok(datagram) => {
                        if let Err(e) = transport.send(&datagram).await {
                            log::warn!("Dropped frame {}: {}", sequence.wrapping_sub(1), e);
                        }
                    }
                    Err(e) => log::warn!("Could not encode frame: {}", e),
                }

                if playback.interval() != period {
                    period = playback.interval();
                    log::debug!("Tick interval now {:?}", period);
                    ticks = ticker(Instant::now() + period, period);
                }
                *status.lock() = playback.status();
            }
        }
    }

    *status.lock() = playback.status();
    log::info!("Scheduler stopped after {} frames", transport.frames_sent());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{ChannelColor, ColorSpace, LightState};
    use crate::effect::{EffectSpec, KeyframeSegment, TargetColor};
    use crate::playback::PlaybackState;
    use crate::stream::transport::testing::RecordingSink;

    const GROUP: &str = "group";

    fn lights() -> LightState {
        LightState::uniform(1, ChannelColor::new(0.3, 0.3, 200.0))
    }

    fn start(sink: &Arc<RecordingSink>) -> Scheduler {
        let idle = EffectSpec::new(100, 25, true).compile(&lights()).unwrap();
        let playback = Playback::new(Arc::new(idle), lights());
        let encoder = FrameEncoder::sequential(GROUP, ColorSpace::Xy, 1).unwrap();
        let transport = Arc::new(TransportSession::new(Box::new(sink.clone())));
        Scheduler::spawn(playback, encoder, transport)
    }

    fn flash(duration_ms: u64, interval_ms: u64) -> EffectSpec {
        EffectSpec::new(duration_ms, interval_ms, false).with_channel(vec![KeyframeSegment::hold(
            0,
            None,
            TargetColor::literal(0.6, 0.3, 255.0),
        )])
    }

    /// Lets the scheduler task run until it is parked on its next tick.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn idle_frames_go_out_at_idle_interval() {
        let sink = Arc::new(RecordingSink::default());
        let scheduler = start(&sink);
        settle().await;
        assert_eq!(sink.datagrams.lock().len(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        settle().await;
        assert_eq!(sink.datagrams.lock().len(), 5);

        let sequences: Vec<u8> = sink.datagrams.lock().iter().map(|d| d[11]).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);

        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn queued_effect_plays_at_its_own_interval_then_reverts() {
        let sink = Arc::new(RecordingSink::default());
        let scheduler = start(&sink);
        settle().await;

        assert_eq!(scheduler.enqueue(flash(500, 50).into()).await.unwrap(), 1);

        // idle tick at 25ms switches to the effect, then 9 more at 50ms each
        tokio::time::sleep(Duration::from_millis(25 + 9 * 50)).await;
        settle().await;
        let status = scheduler.status().await.unwrap();
        assert_eq!(status.state, PlaybackState::Exhausted);
        assert_eq!(status.interval_ms, 50);

        tokio::time::sleep(Duration::from_millis(50)).await;
        settle().await;
        let status = scheduler.status().await.unwrap();
        assert!(status.is_idle());
        assert_eq!(status.interval_ms, 25);
        assert_eq!(
            status.last_light_state,
            LightState::uniform(1, ChannelColor::new(0.6, 0.3, 255.0))
        );
        assert_eq!(sink.datagrams.lock().len(), 1 + 10 + 1);

        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn play_next_reports_empty_idle_queue() {
        let sink = Arc::new(RecordingSink::default());
        let scheduler = start(&sink);
        settle().await;

        assert!(!scheduler.play_next().await.unwrap());

        let mut looping = flash(200, 50);
        looping.repeat = true;
        scheduler.enqueue(looping.into()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        settle().await;
        assert_eq!(scheduler.snapshot().state, PlaybackState::Playing);

        assert!(scheduler.play_next().await.unwrap());
        assert!(scheduler.snapshot().is_idle());

        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn play_next_to_a_faster_effect_does_not_wait_out_the_old_period() {
        let sink = Arc::new(RecordingSink::default());
        let scheduler = start(&sink);
        settle().await;

        let mut slow = flash(2000, 1000);
        slow.repeat = true;
        scheduler.enqueue(slow.into()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        settle().await;
        assert_eq!(scheduler.snapshot().interval_ms, 1000);
        assert_eq!(sink.datagrams.lock().len(), 2);

        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.enqueue(flash(500, 50).into()).await.unwrap();
        assert!(scheduler.play_next().await.unwrap());
        settle().await;

        assert_eq!(sink.datagrams.lock().len(), 3);
        let status = scheduler.status().await.unwrap();
        assert_eq!(status.state, PlaybackState::Playing);
        assert_eq!(status.interval_ms, 50);
        assert_eq!(status.tick_index, 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        settle().await;
        assert_eq!(sink.datagrams.lock().len(), 4);

        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn unencodable_frames_are_skipped_without_stopping() {
        let sink = Arc::new(RecordingSink::default());
        let scheduler = start(&sink);
        settle().await;
        assert_eq!(sink.datagrams.lock().len(), 1);

        let broken = EffectSpec::new(100, 25, false).with_channel(vec![KeyframeSegment::hold(
            0,
            None,
            TargetColor::literal(0.3, 0.3, f64::NAN),
        )]);
        scheduler.enqueue(broken.into()).await.unwrap();

        // all four frames of the effect fail to encode
        tokio::time::sleep(Duration::from_millis(4 * 25)).await;
        settle().await;
        assert!(scheduler.is_running());
        assert_eq!(scheduler.snapshot().state, PlaybackState::Exhausted);
        assert_eq!(sink.datagrams.lock().len(), 1);

        tokio::time::sleep(Duration::from_millis(25)).await;
        settle().await;
        assert!(scheduler.snapshot().is_idle());
        let datagrams = sink.datagrams.lock();
        assert_eq!(datagrams.len(), 2);
        // sequence numbers keep counting through the skipped frames
        assert_eq!(datagrams[1][11], 5);
        drop(datagrams);

        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_effect_is_reported_to_caller() {
        let sink = Arc::new(RecordingSink::default());
        let scheduler = start(&sink);

        let result = scheduler.enqueue(EffectSpec::new(10, 50, false).into()).await;
        assert!(matches!(result, Err(StreamError::InvalidEffectSpec(_))));
        assert_eq!(scheduler.snapshot().queued, 0);

        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn send_failures_do_not_stop_playback() {
        let sink = Arc::new(RecordingSink::default());
        sink.fail_sends
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let scheduler = start(&sink);

        tokio::time::sleep(Duration::from_millis(100)).await;
        settle().await;
        assert!(scheduler.is_running());

        sink.fail_sends
            .store(false, std::sync::atomic::Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(25)).await;
        settle().await;
        assert_eq!(sink.datagrams.lock().len(), 1);

        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_halts_commands() {
        let sink = Arc::new(RecordingSink::default());
        let scheduler = start(&sink);
        settle().await;

        scheduler.stop().await.unwrap();
        scheduler.stop().await.unwrap();
        assert!(!scheduler.is_running());

        let sent = sink.datagrams.lock().len();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(sink.datagrams.lock().len(), sent);

        assert!(matches!(
            scheduler.enqueue(flash(100, 50).into()).await,
            Err(StreamError::SchedulerStopped)
        ));
    }
}
