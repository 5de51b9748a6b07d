use crate::collision::resolve_collisions;
use crate::error::Result;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk form of one segment's timeline. This is also the payload the
/// autosaver writes back upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimelineDocument {
    pub episode_id: String,
    pub segment_id: String,
    /// Session revision the document was taken at.
    pub revision: u64,
    pub slides: Vec<Slide>,
    pub audio_tracks: Vec<AudioTrack>,
}

impl TimelineDocument {
    pub fn new(episode_id: impl Into<String>, segment_id: impl Into<String>) -> Self {
        Self {
            episode_id: episode_id.into(),
            segment_id: segment_id.into(),
            ..Default::default()
        }
    }

    pub fn with_state(mut self, state: &TimelineState, revision: u64) -> Self {
        self.slides = state.slides.clone();
        self.audio_tracks = state.audio_tracks.clone();
        self.revision = revision;
        self
    }

    /// The document's tracks, normalized: negative starts, short durations
    /// and overlaps from hand-edited or stale files are repaired.
    pub fn state(&self) -> TimelineState {
        TimelineState {
            slides: resolve_collisions(self.slides.clone()),
            audio_tracks: resolve_collisions(self.audio_tracks.clone()),
        }
    }

    /// Save as pretty-printed JSON to [`document_path`] of `path`.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = document_path(path);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        tracing::info!(path = %path.display(), revision = self.revision, "Saved timeline document");
        Ok(())
    }

    /// Load from [`document_path`] of `path`.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(document_path(path))?;
        let doc: TimelineDocument = serde_json::from_str(&data)?;
        Ok(doc)
    }
}

/// Where a timeline document named `path` lives: `path` with `.json`
/// appended unless it already has that extension.
pub fn document_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        path.to_path_buf()
    } else {
        let mut p = path.to_path_buf();
        let mut name = p.file_name().unwrap_or_default().to_os_string();
        name.push(".json");
        p.set_file_name(name);
        p
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Conflict-free arrangement handed to an interchange exporter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportBundle {
    pub slides: Vec<Slide>,
    pub audio_tracks: Vec<AudioTrack>,
    pub total_duration: TimeUs,
}

impl ExportBundle {
    pub fn from_state(state: &TimelineState) -> Self {
        let resolved = TimelineState {
            slides: resolve_collisions(state.slides.clone()),
            audio_tracks: resolve_collisions(state.audio_tracks.clone()),
        };
        Self {
            total_duration: resolved.total_duration(),
            slides: resolved.slides,
            audio_tracks: resolved.audio_tracks,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::find_overlap;
    use tempfile::TempDir;

    fn secs(s: f64) -> TimeUs {
        TimeUs::from_seconds(s)
    }

    fn sample_state() -> TimelineState {
        let mut slide = Slide::new(secs(0.0), secs(2.0)).with_image("https://img/1.png");
        slide.clip.source_shot_id = Some("shot-1".into());
        let mut audio = AudioTrack::new("https://a/1.mp3", secs(0.5), secs(1.5));
        audio.voice_name = "Narrator".into();
        audio.set_volume(80);
        TimelineState {
            slides: vec![slide, Slide::new(secs(2.0), secs(3.0))],
            audio_tracks: vec![audio],
        }
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("timeline.json");

        let doc = TimelineDocument::new("ep-1", "seg-1").with_state(&sample_state(), 4);
        doc.save_to_file(&path).unwrap();

        let loaded = TimelineDocument::load_from_file(&path).unwrap();
        assert_eq!(doc, loaded);
        let state = loaded.state();
        assert_eq!(state.slides.len(), 2);
        assert_eq!(state.slides[1].clip.order, 1);
        assert_eq!(state.audio_tracks[0].volume, 80);
        assert_eq!(state.total_duration(), secs(5.0));
    }

    #[test]
    fn save_appends_extension() {
        let dir = TempDir::new().unwrap();
        let doc = TimelineDocument::new("ep", "seg");
        doc.save_to_file(dir.path().join("draft")).unwrap();
        assert!(dir.path().join("draft.json").exists());
    }

    #[test]
    fn load_uses_same_path_as_save() {
        let dir = TempDir::new().unwrap();
        let doc = TimelineDocument::new("ep", "seg").with_state(&sample_state(), 4);
        doc.save_to_file(dir.path().join("draft")).unwrap();

        let loaded = TimelineDocument::load_from_file(dir.path().join("draft")).unwrap();
        assert_eq!(loaded.episode_id, "ep");
        assert_eq!(loaded.revision, 4);
        assert_eq!(document_path(dir.path().join("draft")), dir.path().join("draft.json"));
        assert_eq!(document_path("a/b.json"), PathBuf::from("a/b.json"));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let result = TimelineDocument::load_from_file("/nonexistent/timeline.json");
        assert!(matches!(result.unwrap_err(), crate::error::CoreError::Io(_)));
    }

    #[test]
    fn partial_document_loads_and_normalizes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.json");
        let a = uuid::Uuid::new_v4();
        let b = uuid::Uuid::new_v4();
        let json = format!(
            r#"{{ "segment_id": "seg", "slides": [
                {{ "id": "{a}", "start": 0, "duration": 4000000 }},
                {{ "id": "{b}", "start": 2000000, "duration": 100 }}
            ] }}"#
        );
        std::fs::write(&path, json).unwrap();

        let doc = TimelineDocument::load_from_file(&path).unwrap();
        assert_eq!(doc.episode_id, "");
        let state = doc.state();
        assert_eq!(state.slides[1].clip.start, secs(4.0));
        assert_eq!(state.slides[1].clip.duration, MIN_DURATION);
        assert!(find_overlap(&state.slides).is_none());
    }

    #[test]
    fn export_bundle_reports_total_duration() {
        let bundle = ExportBundle::from_state(&sample_state());
        assert_eq!(bundle.total_duration, secs(5.0));
        assert_eq!(bundle.slides.len(), 2);
        assert!(find_overlap(&bundle.slides).is_none());

        let json = bundle.to_json().unwrap();
        let back: ExportBundle = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total_duration, bundle.total_duration);
    }
}
