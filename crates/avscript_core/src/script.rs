//! Upstream script structure: segments (scenes) holding ordered shots.
//!
//! The engine only reads these. Every field is defaulted so partial documents
//! from the store deserialize instead of failing.

use crate::types::TimeUs;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AvScript {
    pub segments: Vec<Segment>,
}

impl AvScript {
    pub fn segment(&self, id: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id)
    }

    pub fn shot_count(&self) -> usize {
        self.segments.iter().map(|s| s.shots.len()).sum()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Segment {
    pub id: String,
    pub segment_number: u32,
    pub title: String,
    pub shots: Vec<Shot>,
}

impl Segment {
    /// Hash of the fields the timeline mirrors: shot ids, images, durations
    /// and audio files. Text edits upstream do not change it.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.id.hash(&mut hasher);
        for shot in &self.shots {
            shot.id.hash(&mut hasher);
            shot.image_url.hash(&mut hasher);
            shot.duration_us().hash(&mut hasher);
            for file in &shot.audio_files {
                file.key().hash(&mut hasher);
                file.url.hash(&mut hasher);
                file.voice_name.hash(&mut hasher);
                file.duration_us().hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Shot {
    pub id: String,
    pub shot_number: u32,
    pub take: String,
    pub audio: String,
    pub visual: String,
    pub image_url: Option<String>,
    /// Seconds.
    pub duration: Option<f64>,
    pub audio_files: Vec<AudioFileRef>,
}

impl Shot {
    /// Duration if present, finite and positive.
    pub fn duration_us(&self) -> Option<TimeUs> {
        seconds_to_us(self.duration)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioFileRef {
    pub id: String,
    pub url: String,
    pub voice_name: String,
    /// Seconds.
    pub duration: Option<f64>,
}

impl AudioFileRef {
    /// Stable key: the id, or the url when the id is missing.
    pub fn key(&self) -> &str {
        if self.id.is_empty() {
            &self.url
        } else {
            &self.id
        }
    }

    pub fn duration_us(&self) -> Option<TimeUs> {
        seconds_to_us(self.duration)
    }
}

fn seconds_to_us(seconds: Option<f64>) -> Option<TimeUs> {
    seconds
        .filter(|s| s.is_finite() && *s > 0.0)
        .map(TimeUs::from_seconds)
}
