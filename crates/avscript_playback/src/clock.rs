use crate::config::PlaybackConfig;
use avscript_core::{AudioTrack, TimeUs};
use std::collections::HashMap;
use tokio::time::Instant;
use uuid::Uuid;

/// A playable audio source bound to one track.
pub trait AudioElement {
    /// Start buffering so `play` begins promptly.
    fn preload(&mut self);
    fn play(&mut self);
    fn pause(&mut self);
    /// Jump to `position` inside the media.
    fn seek(&mut self, position: TimeUs);
    /// Current position inside the media.
    fn position(&self) -> TimeUs;
    /// 0.0..=1.0
    fn set_gain(&mut self, gain: f64);
    /// Release the underlying resource. The element is not used afterwards.
    fn detach(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    /// Not advancing, cursor kept.
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub cursor: TimeUs,
    /// The cursor reached the end of the timeline and playback stopped.
    pub ended: bool,
}

/// Virtual timeline cursor that drives one element per audio track.
///
/// The cursor advances by wall-clock time between ticks, so playback runs at
/// 1x regardless of how often `tick` is called.
pub struct PlaybackClock<E> {
    state: PlaybackState,
    cursor: TimeUs,
    last_tick: Option<Instant>,
    elements: HashMap<Uuid, E>,
    config: PlaybackConfig,
}

impl<E: AudioElement> PlaybackClock<E> {
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            state: PlaybackState::Stopped,
            cursor: TimeUs::ZERO,
            last_tick: None,
            elements: HashMap::new(),
            config,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn cursor(&self) -> TimeUs {
        self.cursor
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn element(&self, track_id: Uuid) -> Option<&E> {
        self.elements.get(&track_id)
    }

    /// Bind `element` to a track, releasing any element it replaces.
    pub fn attach(&mut self, track_id: Uuid, element: E) {
        if let Some(mut old) = self.elements.insert(track_id, element) {
            old.pause();
            old.detach();
        }
    }

    /// Release elements whose track is gone.
    pub fn retain_tracks(&mut self, tracks: &[AudioTrack]) {
        self.elements.retain(|id, element| {
            let keep = tracks.iter().any(|t| t.clip.id == *id);
            if !keep {
                element.pause();
                element.detach();
            }
            keep
        });
    }

    pub fn play(&mut self, now: Instant, tracks: &[AudioTrack]) {
        if self.state == PlaybackState::Playing {
            return;
        }
        for element in self.elements.values_mut() {
            element.preload();
        }
        self.state = PlaybackState::Playing;
        self.last_tick = Some(now);

        // Tracks already under the cursor start immediately
        let cursor = self.cursor;
        for track in tracks.iter().filter(|t| t.is_active_at(cursor)) {
            if let Some(element) = self.elements.get_mut(&track.clip.id) {
                element.set_gain(track.gain());
                element.seek(cursor - track.clip.start);
                element.play();
            }
        }
        tracing::debug!(cursor = %self.cursor, "Playback started");
    }

    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.pause_all();
        self.state = PlaybackState::Paused;
        self.last_tick = None;
        tracing::debug!(cursor = %self.cursor, "Playback paused");
    }

    /// Pause every element and rewind to zero.
    pub fn stop(&mut self) {
        self.pause_all();
        self.state = PlaybackState::Stopped;
        self.cursor = TimeUs::ZERO;
        self.last_tick = None;
        tracing::debug!("Playback stopped");
    }

    /// Move the cursor. While playing, elements are resynced at once.
    pub fn seek(&mut self, position: TimeUs, tracks: &[AudioTrack]) {
        self.cursor = position.max(TimeUs::ZERO);
        if self.state != PlaybackState::Playing {
            return;
        }
        for track in tracks {
            let Some(element) = self.elements.get_mut(&track.clip.id) else {
                continue;
            };
            if track.is_active_at(self.cursor) {
                element.seek(self.cursor - track.clip.start);
                element.play();
            } else {
                element.pause();
            }
        }
    }

    /// Advance to `now` and bring every element in line with the cursor.
    pub fn tick(&mut self, now: Instant, tracks: &[AudioTrack], total: TimeUs) -> TickOutcome {
        if self.state != PlaybackState::Playing {
            return TickOutcome {
                cursor: self.cursor,
                ended: false,
            };
        }

        let last = self.last_tick.unwrap_or(now);
        let elapsed = TimeUs(now.saturating_duration_since(last).as_micros() as i64);
        self.last_tick = Some(now);

        let previous = self.cursor;
        let next = previous + elapsed;

        if next >= total {
            tracing::info!(total = %total, "Reached end of timeline");
            self.stop();
            return TickOutcome {
                cursor: self.cursor,
                ended: true,
            };
        }

        for track in tracks {
            let Some(element) = self.elements.get_mut(&track.clip.id) else {
                continue;
            };
            let was_active = track.is_active_at(previous);
            let is_active = track.is_active_at(next);
            let expected = next - track.clip.start;

            match (was_active, is_active) {
                (false, true) => {
                    element.set_gain(track.gain());
                    element.seek(expected);
                    element.play();
                }
                (true, false) => element.pause(),
                (true, true) => {
                    let drift = TimeUs((element.position() - expected).0.abs());
                    if drift > self.config.drift_tolerance {
                        tracing::debug!(track = %track.clip.id, drift = %drift, "Correcting drift");
                        element.seek(expected);
                    }
                }
                (false, false) => {}
            }
        }

        self.cursor = next;
        TickOutcome {
            cursor: next,
            ended: false,
        }
    }

    /// Stop and release every element.
    pub fn teardown(&mut self) {
        self.stop();
        for (_, mut element) in self.elements.drain() {
            element.detach();
        }
    }

    fn pause_all(&mut self) {
        for element in self.elements.values_mut() {
            element.pause();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
