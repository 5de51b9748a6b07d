use crate::clock::{AudioElement, PlaybackClock, PlaybackState};
use avscript_core::{TimeUs, TimelineState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

struct Running {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Ticks a [`PlaybackClock`] on a tokio task at a fixed frame interval.
///
/// Only one frame task exists at a time. Stopping or pausing cancels the
/// task and waits for it to finish before elements are paused, so no tick
/// can run afterwards.
pub struct FrameDriver<E> {
    clock: Arc<Mutex<PlaybackClock<E>>>,
    timeline: watch::Sender<TimelineState>,
    frame_interval: Duration,
    running: Option<Running>,
}

impl<E: AudioElement + Send + 'static> FrameDriver<E> {
    pub fn new(clock: PlaybackClock<E>, timeline: TimelineState, frame_interval: Duration) -> Self {
        let (timeline, _) = watch::channel(timeline);
        Self {
            clock: Arc::new(Mutex::new(clock)),
            timeline,
            frame_interval,
            running: None,
        }
    }

    /// Replace the timeline the next frames read.
    pub fn set_timeline(&self, state: TimelineState) {
        self.timeline.send_replace(state);
    }

    pub fn clock(&self) -> Arc<Mutex<PlaybackClock<E>>> {
        Arc::clone(&self.clock)
    }

    pub async fn cursor(&self) -> TimeUs {
        self.clock.lock().await.cursor()
    }

    pub async fn state(&self) -> PlaybackState {
        self.clock.lock().await.state()
    }

    /// Whether a frame task is alive. False once the end was reached.
    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|r| !r.task.is_finished())
    }

    pub async fn play(&mut self) {
        if self.is_running() {
            return;
        }
        self.running = None;

        let tracks = self.timeline.borrow().audio_tracks.clone();
        self.clock.lock().await.play(Instant::now(), &tracks);

        let (stop, mut stop_rx) = oneshot::channel::<()>();
        let clock = Arc::clone(&self.clock);
        let timeline = self.timeline.subscribe();
        let period = self.frame_interval;

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    now = interval.tick() => {
                        let mut clock = clock.lock().await;
                        let outcome = {
                            let state = timeline.borrow();
                            clock.tick(now, &state.audio_tracks, state.total_duration())
                        };
                        if outcome.ended {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Frame task finished");
        });

        self.running = Some(Running { stop, task });
        tracing::debug!(interval_ms = period.as_millis() as u64, "Frame driver started");
    }

    pub async fn pause(&mut self) {
        self.halt().await;
        self.clock.lock().await.pause();
    }

    pub async fn stop(&mut self) {
        self.halt().await;
        self.clock.lock().await.stop();
    }

    pub async fn seek(&self, position: TimeUs) {
        let tracks = self.timeline.borrow().audio_tracks.clone();
        self.clock.lock().await.seek(position, &tracks);
    }

    /// Stop and release every element.
    pub async fn shutdown(mut self) {
        self.halt().await;
        self.clock.lock().await.teardown();
    }

    async fn halt(&mut self) {
        if let Some(Running { stop, task }) = self.running.take() {
            let _ = stop.send(());
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Frame task did not finish cleanly");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
