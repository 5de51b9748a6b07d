use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Sub};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// TimeUs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeUs(pub i64);

impl TimeUs {
    pub const ZERO: Self = Self(0);

    pub fn from_seconds(s: f64) -> Self {
        Self((s * 1_000_000.0).round() as i64)
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms * 1_000)
    }

    pub fn as_seconds(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }
}

impl Add for TimeUs {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for TimeUs {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for TimeUs {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul<i64> for TimeUs {
    type Output = Self;
    fn mul(self, rhs: i64) -> Self {
        Self(self.0 * rhs)
    }
}

impl Div<i64> for TimeUs {
    type Output = Self;
    fn div(self, rhs: i64) -> Self {
        Self(self.0 / rhs)
    }
}

impl fmt::Display for TimeUs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_us = self.0.unsigned_abs();
        let total_ms = total_us / 1_000;
        let ms = total_ms % 1_000;
        let total_secs = total_ms / 1_000;
        let secs = total_secs % 60;
        let total_mins = total_secs / 60;
        let mins = total_mins % 60;
        let hours = total_mins / 60;
        if self.0 < 0 {
            write!(f, "-{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
        } else {
            write!(f, "{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
        }
    }
}

/// Shortest duration any clip may have.
pub const MIN_DURATION: TimeUs = TimeUs(500_000);

// ---------------------------------------------------------------------------
// Clip
// ---------------------------------------------------------------------------

/// Timing shared by every item on a track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clip {
    pub id: Uuid,
    pub start: TimeUs,
    pub duration: TimeUs,
    /// Display rank. Timing is authoritative, this is recomputed from it.
    #[serde(default)]
    pub order: u32,
    /// Set when the clip mirrors a shot owned by the script.
    #[serde(default)]
    pub source_shot_id: Option<String>,
}

impl Clip {
    pub fn new(start: TimeUs, duration: TimeUs) -> Self {
        Self {
            id: Uuid::new_v4(),
            start: start.max(TimeUs::ZERO),
            duration: duration.max(MIN_DURATION),
            order: 0,
            source_shot_id: None,
        }
    }

    pub fn end(&self) -> TimeUs {
        self.start + self.duration
    }

    /// Half-open `[start, end)` intersection.
    pub fn overlaps(&self, other: &Clip) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    pub fn is_from_script(&self) -> bool {
        self.source_shot_id.is_some()
    }
}

/// Anything that sits on a track and owns a [`Clip`].
pub trait Timed: Clone {
    fn clip(&self) -> &Clip;
    fn clip_mut(&mut self) -> &mut Clip;

    fn id(&self) -> Uuid {
        self.clip().id
    }

    fn start(&self) -> TimeUs {
        self.clip().start
    }

    fn duration(&self) -> TimeUs {
        self.clip().duration
    }

    fn end(&self) -> TimeUs {
        self.clip().end()
    }
}

impl Timed for Clip {
    fn clip(&self) -> &Clip {
        self
    }

    fn clip_mut(&mut self) -> &mut Clip {
        self
    }
}

// ---------------------------------------------------------------------------
// Slide
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slide {
    #[serde(flatten)]
    pub clip: Clip,
    /// `None` while the slide is still a placeholder.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Last duration received from the script, used to tell upstream
    /// changes apart from local edits.
    #[serde(default)]
    pub synced_duration: Option<TimeUs>,
}

impl Slide {
    pub fn new(start: TimeUs, duration: TimeUs) -> Self {
        Self {
            clip: Clip::new(start, duration),
            image_url: None,
            synced_duration: None,
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

impl Timed for Slide {
    fn clip(&self) -> &Clip {
        &self.clip
    }

    fn clip_mut(&mut self) -> &mut Clip {
        &mut self.clip
    }
}

// ---------------------------------------------------------------------------
// AudioTrack
// ---------------------------------------------------------------------------

/// Peak data for waveform display: (min, max) per sample window.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WaveformData {
    pub peaks: Vec<(f32, f32)>,
    pub samples_per_peak: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioTrack {
    #[serde(flatten)]
    pub clip: Clip,
    pub audio_url: String,
    /// 0..=100
    pub volume: u8,
    #[serde(default)]
    pub voice_name: String,
    /// Audio-file reference this track mirrors, if any.
    #[serde(default)]
    pub source_file_id: Option<String>,
    #[serde(default)]
    pub synced_duration: Option<TimeUs>,
    #[serde(skip)]
    pub waveform: Option<WaveformData>,
}

impl AudioTrack {
    pub const MAX_VOLUME: u8 = 100;

    pub fn new(audio_url: impl Into<String>, start: TimeUs, duration: TimeUs) -> Self {
        Self {
            clip: Clip::new(start, duration),
            audio_url: audio_url.into(),
            volume: Self::MAX_VOLUME,
            voice_name: String::new(),
            source_file_id: None,
            synced_duration: None,
            waveform: None,
        }
    }

    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(Self::MAX_VOLUME);
    }

    /// Volume as a 0.0..=1.0 gain.
    pub fn gain(&self) -> f64 {
        f64::from(self.volume) / f64::from(Self::MAX_VOLUME)
    }

    /// Whether `time` falls inside `[start, end)`.
    pub fn is_active_at(&self, time: TimeUs) -> bool {
        time >= self.clip.start && time < self.clip.end()
    }
}

impl Timed for AudioTrack {
    fn clip(&self) -> &Clip {
        &self.clip
    }

    fn clip_mut(&mut self) -> &mut Clip {
        &mut self.clip
    }
}

// ---------------------------------------------------------------------------
// TrackKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Slides,
    Audio,
}

// ---------------------------------------------------------------------------
// TimelineState
// ---------------------------------------------------------------------------

/// Both tracks of one editing session. Slides never collide with audio.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TimelineState {
    pub slides: Vec<Slide>,
    pub audio_tracks: Vec<AudioTrack>,
}

impl TimelineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Largest clip end over both tracks.
    pub fn total_duration(&self) -> TimeUs {
        let slides = self.slides.iter().map(|s| s.clip.end());
        let audio = self.audio_tracks.iter().map(|a| a.clip.end());
        slides.chain(audio).max().unwrap_or(TimeUs::ZERO)
    }

    pub fn find_clip(&self, track: TrackKind, id: Uuid) -> Option<&Clip> {
        match track {
            TrackKind::Slides => self.slides.iter().find(|s| s.clip.id == id).map(|s| &s.clip),
            TrackKind::Audio => self
                .audio_tracks
                .iter()
                .find(|a| a.clip.id == id)
                .map(|a| &a.clip),
        }
    }

    /// Which track holds the clip with this id.
    pub fn track_of(&self, id: Uuid) -> Option<TrackKind> {
        if self.slides.iter().any(|s| s.clip.id == id) {
            Some(TrackKind::Slides)
        } else if self.audio_tracks.iter().any(|a| a.clip.id == id) {
            Some(TrackKind::Audio)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty() && self.audio_tracks.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Selected clip ids. A single selection is a set of one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<Uuid>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(id: Uuid) -> Self {
        let mut sel = Self::default();
        sel.ids.insert(id);
        sel
    }

    /// Replace the selection, or toggle `id` into it when `additive`.
    pub fn select(&mut self, id: Uuid, additive: bool) {
        if !additive {
            self.ids.clear();
            self.ids.insert(id);
        } else if !self.ids.remove(&id) {
            self.ids.insert(id);
        }
    }

    pub fn deselect(&mut self, id: Uuid) {
        self.ids.remove(&id);
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.ids.iter().copied()
    }

    /// Drop ids that no longer exist in `state`.
    pub fn retain_existing(&mut self, state: &TimelineState) {
        self.ids.retain(|id| state.track_of(*id).is_some());
    }
}

impl FromIterator<Uuid> for Selection {
    fn from_iter<I: IntoIterator<Item = Uuid>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
