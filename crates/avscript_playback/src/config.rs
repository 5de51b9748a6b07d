use avscript_core::TimeUs;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    /// How far an element may drift from the cursor before it is reseeked.
    pub drift_tolerance: TimeUs,
    /// Frame driver tick period in milliseconds.
    pub frame_interval_ms: u64,
    /// Used when an audio file's length cannot be probed.
    pub default_audio_duration: TimeUs,
    /// PCM samples (at 8 kHz) folded into one waveform peak.
    pub samples_per_peak: u32,
}

impl PlaybackConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            drift_tolerance: TimeUs::from_millis(200),
            frame_interval_ms: 16,
            default_audio_duration: TimeUs::from_seconds(3.0),
            samples_per_peak: 256,
        }
    }
}
