//! Mirror a script segment onto the timeline.
//!
//! Script-owned clips carry the shot id (slides) or audio-file key (audio
//! tracks) they mirror. User-created clips carry neither and are never
//! touched here.

use crate::collision::{insert_by_start, resolve_collisions};
use crate::config::EngineConfig;
use crate::script::{AudioFileRef, Segment, Shot};
use crate::types::*;
use std::collections::{HashMap, HashSet};

/// Result of a gated reconcile.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Upstream did not change, or reconciling produced the same state.
    Unchanged,
    Applied(TimelineState),
}

/// Reconciles only when the upstream segment's fingerprint or the local
/// revision moved since the last run.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    /// `(fingerprint, revision)` the timeline was last in step at.
    last_synced: Option<(u64, u64)>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// `revision` is the revision of `state`. An `Applied` result is taken to
    /// be committed as exactly one new revision.
    pub fn reconcile(
        &mut self,
        state: &TimelineState,
        revision: u64,
        segment: &Segment,
        config: &EngineConfig,
    ) -> ReconcileOutcome {
        let fingerprint = segment.fingerprint();
        if self.last_synced == Some((fingerprint, revision)) {
            tracing::debug!(segment = %segment.id, revision, "Script and timeline unchanged, skipping reconcile");
            return ReconcileOutcome::Unchanged;
        }

        let next = reconcile_scene(state, segment, config);
        if next == *state {
            self.last_synced = Some((fingerprint, revision));
            return ReconcileOutcome::Unchanged;
        }
        self.last_synced = Some((fingerprint, revision + 1));
        tracing::info!(
            segment = %segment.id,
            slides = next.slides.len(),
            audio_tracks = next.audio_tracks.len(),
            "Reconciled timeline with script"
        );
        ReconcileOutcome::Applied(next)
    }

    /// Force the next call to reconcile.
    pub fn invalidate(&mut self) {
        self.last_synced = None;
    }
}

/// Bring `state` in line with `segment`.
///
/// Every shot ends up with exactly one slide and every audio file with
/// exactly one audio track. Clips whose upstream counterpart vanished are
/// dropped, duplicates collapse to the first one, and upstream image and
/// duration changes are copied in. Local edits survive as long as upstream
/// did not change the same field. Running it twice changes nothing.
pub fn reconcile_scene(state: &TimelineState, segment: &Segment, config: &EngineConfig) -> TimelineState {
    let slides = reconcile_slides(&state.slides, segment, config);
    let audio_tracks = reconcile_audio(&state.audio_tracks, &slides, segment, config);
    TimelineState { slides, audio_tracks }
}

// ---------------------------------------------------------------------------
// Slides
// ---------------------------------------------------------------------------

fn reconcile_slides(existing: &[Slide], segment: &Segment, config: &EngineConfig) -> Vec<Slide> {
    let shots: HashMap<&str, &Shot> = segment
        .shots
        .iter()
        .filter(|s| !s.id.is_empty())
        .map(|s| (s.id.as_str(), s))
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut kept: Vec<Slide> = Vec::with_capacity(existing.len());

    for slide in existing {
        let Some(shot_id) = slide.clip.source_shot_id.as_deref() else {
            kept.push(slide.clone());
            continue;
        };
        let Some(shot) = shots.get(shot_id) else {
            tracing::debug!(shot = shot_id, "Shot removed upstream, dropping slide");
            continue;
        };
        if !seen.insert(shot.id.as_str()) {
            tracing::debug!(shot = shot_id, "Collapsing duplicate slide");
            continue;
        }
        let mut slide = slide.clone();
        update_slide(&mut slide, shot);
        kept.push(slide);
    }

    let mut cursor = TimeUs::ZERO;
    for shot in segment.shots.iter().filter(|s| !s.id.is_empty()) {
        if let Some(slide) = kept
            .iter()
            .find(|s| s.clip.source_shot_id.as_deref() == Some(shot.id.as_str()))
        {
            cursor = slide.clip.end();
            continue;
        }

        let synced = shot.duration_us();
        let mut slide = Slide::new(cursor, synced.unwrap_or(config.default_slide_duration));
        slide.clip.source_shot_id = Some(shot.id.clone());
        slide.image_url = shot.image_url.clone();
        slide.synced_duration = synced;
        cursor = slide.clip.end();

        tracing::debug!(shot = %shot.id, start = %slide.clip.start, "Creating slide for new shot");
        insert_by_start(&mut kept, slide);
    }

    resolve_collisions(kept)
}

fn update_slide(slide: &mut Slide, shot: &Shot) {
    if slide.image_url != shot.image_url {
        slide.image_url = shot.image_url.clone();
    }
    if let Some(duration) = shot.duration_us() {
        if slide.synced_duration != Some(duration) {
            slide.clip.duration = duration.max(MIN_DURATION);
            slide.synced_duration = Some(duration);
        }
    }
}

// ---------------------------------------------------------------------------
// Audio tracks
// ---------------------------------------------------------------------------

fn reconcile_audio(
    existing: &[AudioTrack],
    slides: &[Slide],
    segment: &Segment,
    config: &EngineConfig,
) -> Vec<AudioTrack> {
    let files: HashMap<&str, &AudioFileRef> = segment
        .shots
        .iter()
        .flat_map(|s| s.audio_files.iter())
        .filter(|f| !f.key().is_empty())
        .map(|f| (f.key(), f))
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut kept: Vec<AudioTrack> = Vec::with_capacity(existing.len());

    for track in existing {
        let Some(key) = track.source_file_id.as_deref() else {
            kept.push(track.clone());
            continue;
        };
        let Some(file) = files.get(key) else {
            tracing::debug!(file = key, "Audio file removed upstream, dropping track");
            continue;
        };
        if !seen.insert(file.key()) {
            tracing::debug!(file = key, "Collapsing duplicate audio track");
            continue;
        }
        let mut track = track.clone();
        update_track(&mut track, file);
        kept.push(track);
    }

    for shot in segment.shots.iter().filter(|s| !s.id.is_empty()) {
        let mut cursor = slides
            .iter()
            .find(|s| s.clip.source_shot_id.as_deref() == Some(shot.id.as_str()))
            .map(|s| s.clip.start)
            .unwrap_or(TimeUs::ZERO);

        for file in shot.audio_files.iter().filter(|f| !f.key().is_empty()) {
            if let Some(track) = kept
                .iter()
                .find(|t| t.source_file_id.as_deref() == Some(file.key()))
            {
                cursor = track.clip.end();
                continue;
            }

            let synced = file.duration_us();
            let mut track = AudioTrack::new(
                file.url.clone(),
                cursor,
                synced.unwrap_or(config.default_audio_duration),
            );
            track.voice_name = file.voice_name.clone();
            track.source_file_id = Some(file.key().to_string());
            track.synced_duration = synced;
            cursor = track.clip.end();

            tracing::debug!(file = file.key(), start = %track.clip.start, "Creating audio track for new file");
            insert_by_start(&mut kept, track);
        }
    }

    resolve_collisions(kept)
}

fn update_track(track: &mut AudioTrack, file: &AudioFileRef) {
    if track.audio_url != file.url {
        track.audio_url = file.url.clone();
        track.waveform = None;
    }
    if track.voice_name != file.voice_name {
        track.voice_name = file.voice_name.clone();
    }
    if let Some(duration) = file.duration_us() {
        if track.synced_duration != Some(duration) {
            track.clip.duration = duration.max(MIN_DURATION);
            track.synced_duration = Some(duration);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
