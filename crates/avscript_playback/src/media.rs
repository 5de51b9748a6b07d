//! Audio metadata: duration probing and waveform peaks.
//!
//! Failures never block a track. A missing duration falls back to the
//! configured default and a failed decode to a flat waveform.

use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result};
use avscript_core::{AudioTrack, TimeUs, WaveformData};
use futures::future::join_all;
use serde::Deserialize;
use std::future::Future;
use uuid::Uuid;

/// Sample rate PCM is decoded at for waveform display.
pub const WAVEFORM_SAMPLE_RATE: u32 = 8000;

/// Source of audio metadata.
pub trait MediaProbe: Send + Sync {
    fn probe_duration(&self, url: &str) -> impl Future<Output = Result<TimeUs>> + Send;

    /// Mono s16 samples at [`WAVEFORM_SAMPLE_RATE`].
    fn decode_samples(&self, url: &str) -> impl Future<Output = Result<Vec<i16>>> + Send;
}

/// Metadata loaded for one audio track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMedia {
    pub track_id: Uuid,
    pub duration: TimeUs,
    pub waveform: WaveformData,
    /// True when either value is a fallback.
    pub degraded: bool,
}

/// Probe one track. Never fails; see the module docs.
pub async fn load_track<P: MediaProbe>(probe: &P, track: &AudioTrack, config: &PlaybackConfig) -> TrackMedia {
    let (duration, waveform) = tokio::join!(
        probe.probe_duration(&track.audio_url),
        probe.decode_samples(&track.audio_url)
    );

    let mut degraded = false;
    let duration = match duration {
        Ok(d) if d > TimeUs::ZERO => d,
        Ok(_) => {
            tracing::warn!(url = %track.audio_url, "Probe returned no duration, using default");
            degraded = true;
            config.default_audio_duration
        }
        Err(e) => {
            tracing::warn!(url = %track.audio_url, error = %e, "Duration probe failed, using default");
            degraded = true;
            config.default_audio_duration
        }
    };

    let waveform = match waveform {
        Ok(samples) => WaveformData {
            peaks: compute_peaks(&samples, config.samples_per_peak),
            samples_per_peak: config.samples_per_peak,
        },
        Err(e) => {
            tracing::warn!(url = %track.audio_url, error = %e, "Waveform decode failed, using flat placeholder");
            degraded = true;
            placeholder_waveform(duration, config.samples_per_peak)
        }
    };

    TrackMedia {
        track_id: track.clip.id,
        duration,
        waveform,
        degraded,
    }
}

/// Probe every track concurrently and wait for all of them.
pub async fn load_all<P: MediaProbe>(probe: &P, tracks: &[AudioTrack], config: &PlaybackConfig) -> Vec<TrackMedia> {
    let loaded = join_all(tracks.iter().map(|t| load_track(probe, t, config))).await;
    tracing::info!(
        tracks = loaded.len(),
        degraded = loaded.iter().filter(|m| m.degraded).count(),
        "Loaded audio metadata"
    );
    loaded
}

/// Copy loaded waveforms onto their tracks.
pub fn attach_waveforms(tracks: &mut [AudioTrack], media: &[TrackMedia]) {
    for track in tracks.iter_mut() {
        if let Some(m) = media.iter().find(|m| m.track_id == track.clip.id) {
            track.waveform = Some(m.waveform.clone());
        }
    }
}

pub fn compute_peaks(samples: &[i16], samples_per_peak: u32) -> Vec<(f32, f32)> {
    samples
        .chunks(samples_per_peak.max(1) as usize)
        .map(|chunk| {
            let min = chunk.iter().copied().min().unwrap_or(0) as f32 / 32768.0;
            let max = chunk.iter().copied().max().unwrap_or(0) as f32 / 32768.0;
            (min, max)
        })
        .collect()
}

/// Silent waveform with as many peaks as a decoded one of `duration` would have.
pub fn placeholder_waveform(duration: TimeUs, samples_per_peak: u32) -> WaveformData {
    let samples = duration.0.max(0) as u64 * u64::from(WAVEFORM_SAMPLE_RATE) / 1_000_000;
    let count = samples.div_ceil(u64::from(samples_per_peak.max(1))).max(1) as usize;
    WaveformData {
        peaks: vec![(0.0, 0.0); count],
        samples_per_peak,
    }
}

// ---------------------------------------------------------------------------
// ffprobe / ffmpeg
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// [`MediaProbe`] backed by the ffprobe and ffmpeg binaries. Both accept
/// local paths and http(s) URLs.
#[derive(Debug, Clone, Default)]
pub struct FfmpegProbe;

impl MediaProbe for FfmpegProbe {
    async fn probe_duration(&self, url: &str) -> Result<TimeUs> {
        let output = tokio::process::Command::new("ffprobe")
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(url)
            .output()
            .await
            .map_err(|e| PlaybackError::ToolExec {
                tool: "ffprobe",
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(PlaybackError::ProbeFailed {
                url: url.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
        parse_duration(&probe).ok_or_else(|| PlaybackError::ProbeFailed {
            url: url.to_string(),
            reason: "no duration in ffprobe output".into(),
        })
    }

    async fn decode_samples(&self, url: &str) -> Result<Vec<i16>> {
        let rate = WAVEFORM_SAMPLE_RATE.to_string();
        let output = tokio::process::Command::new("ffmpeg")
            .args(["-i", url, "-f", "s16le", "-ac", "1", "-ar", &rate, "-acodec", "pcm_s16le", "-"])
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .output()
            .await
            .map_err(|e| PlaybackError::ToolExec {
                tool: "ffmpeg",
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(PlaybackError::DecodeFailed {
                url: url.to_string(),
                reason: format!("ffmpeg exited with {}", output.status),
            });
        }

        Ok(output
            .stdout
            .chunks_exact(2)
            .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
            .collect())
    }
}

fn parse_duration(probe: &FfprobeOutput) -> Option<TimeUs> {
    let seconds: f64 = probe.format.duration.as_deref()?.parse().ok()?;
    (seconds.is_finite() && seconds > 0.0).then(|| TimeUs::from_seconds(seconds))
}
