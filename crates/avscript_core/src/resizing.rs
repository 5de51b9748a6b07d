use crate::error::{CoreError, Result};
use crate::types::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResizeHandle {
    Start,
    End,
}

/// Start and duration of a clip, captured when a resize begins.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Geometry {
    pub start: TimeUs,
    pub duration: TimeUs,
}

impl Geometry {
    pub fn of(clip: &Clip) -> Self {
        Self {
            start: clip.start,
            duration: clip.duration,
        }
    }

    pub fn end(&self) -> TimeUs {
        self.start + self.duration
    }
}

/// Solve the geometry of `clip_id` after dragging `handle` by `delta`.
///
/// The end handle keeps the start fixed and clamps the duration to
/// `[MIN_DURATION, gap to next clip]`. The start handle keeps the end fixed
/// and clamps the start between the previous clip's end and
/// `end - MIN_DURATION`. When no valid range exists, or the fixed end already
/// runs into the next clip, `origin` comes back unchanged. Neighbours are
/// never touched.
pub fn solve_resize<T: Timed>(
    clips: &[T],
    clip_id: Uuid,
    handle: ResizeHandle,
    origin: Geometry,
    delta: TimeUs,
) -> Result<Geometry> {
    if !clips.iter().any(|c| c.id() == clip_id) {
        return Err(CoreError::ClipNotFound(clip_id));
    }

    let (previous, next) = neighbours(clips, clip_id, origin.start);

    let solved = match handle {
        ResizeHandle::End => {
            let max = next.map(|n| n.start - origin.start);
            match max {
                Some(max) if max < MIN_DURATION => None,
                _ => {
                    let mut duration = (origin.duration + delta).max(MIN_DURATION);
                    if let Some(max) = max {
                        duration = duration.min(max);
                    }
                    Some(Geometry {
                        start: origin.start,
                        duration,
                    })
                }
            }
        }
        ResizeHandle::Start => {
            let fixed_end = origin.end();
            if next.is_some_and(|n| fixed_end > n.start) {
                tracing::warn!(clip = %clip_id, "Clip already overlaps its successor, rejecting resize");
                None
            } else {
                let lower = previous.map(|p| p.end()).unwrap_or(TimeUs::ZERO).max(TimeUs::ZERO);
                let upper = fixed_end - MIN_DURATION;
                if lower > upper {
                    None
                } else {
                    let start = (origin.start + delta).clamp(lower, upper);
                    Some(Geometry {
                        start,
                        duration: fixed_end - start,
                    })
                }
            }
        }
    };

    Ok(solved.unwrap_or(origin))
}

/// Closest clips before and after `start`, ignoring `clip_id` itself.
fn neighbours<T: Timed>(clips: &[T], clip_id: Uuid, start: TimeUs) -> (Option<&Clip>, Option<&Clip>) {
    let others = clips.iter().map(|c| c.clip()).filter(|c| c.id != clip_id);
    let mut previous: Option<&Clip> = None;
    let mut next: Option<&Clip> = None;
    for c in others {
        if c.start < start {
            if previous.map_or(true, |p| c.start > p.start) {
                previous = Some(c);
            }
        } else if next.map_or(true, |n| c.start < n.start) {
            next = Some(c);
        }
    }
    (previous, next)
}

/// Write `geometry` onto the clip with `clip_id`.
pub fn apply_geometry<T: Timed>(clips: &mut [T], clip_id: Uuid, geometry: Geometry) -> Result<()> {
    let clip = clips
        .iter_mut()
        .find(|c| c.id() == clip_id)
        .ok_or(CoreError::ClipNotFound(clip_id))?
        .clip_mut();
    clip.start = geometry.start;
    clip.duration = geometry.duration;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{find_overlap, resolve_collisions};
    use proptest::prelude::*;

    fn secs(s: f64) -> TimeUs {
        TimeUs::from_seconds(s)
    }

    fn clip(start: f64, dur: f64) -> Clip {
        let mut c = Clip::new(TimeUs::ZERO, MIN_DURATION);
        c.start = secs(start);
        c.duration = secs(dur);
        c
    }

    fn three_clips() -> Vec<Clip> {
        vec![clip(0.0, 3.0), clip(3.0, 3.0), clip(6.0, 3.0)]
    }

    // -----------------------------------------------------------------------
    // end handle
    // -----------------------------------------------------------------------

    #[test]
    fn end_handle_clamps_to_gap_before_next_clip() {
        let clips = three_clips();
        let first = &clips[0];
        let g = solve_resize(&clips, first.id, ResizeHandle::End, Geometry::of(first), secs(2.0)).unwrap();
        assert_eq!(g.start, secs(0.0));
        assert_eq!(g.duration, secs(3.0));
    }

    #[test]
    fn end_handle_shrinks_down_to_minimum() {
        let clips = three_clips();
        let first = &clips[0];
        let g = solve_resize(&clips, first.id, ResizeHandle::End, Geometry::of(first), secs(-10.0)).unwrap();
        assert_eq!(g.duration, MIN_DURATION);
        assert_eq!(g.start, secs(0.0));
    }

    #[test]
    fn end_handle_on_last_clip_is_unbounded() {
        let clips = three_clips();
        let last = &clips[2];
        let g = solve_resize(&clips, last.id, ResizeHandle::End, Geometry::of(last), secs(40.0)).unwrap();
        assert_eq!(g.duration, secs(43.0));
    }

    #[test]
    fn end_handle_grows_into_free_space() {
        let clips = vec![clip(0.0, 2.0), clip(5.0, 1.0)];
        let first = &clips[0];
        let g = solve_resize(&clips, first.id, ResizeHandle::End, Geometry::of(first), secs(1.5)).unwrap();
        assert_eq!(g.duration, secs(3.5));
    }

    // -----------------------------------------------------------------------
    // start handle
    // -----------------------------------------------------------------------

    #[test]
    fn start_handle_keeps_end_fixed() {
        let clips = vec![clip(0.0, 2.0), clip(5.0, 3.0)];
        let second = &clips[1];
        let g = solve_resize(&clips, second.id, ResizeHandle::Start, Geometry::of(second), secs(-1.0)).unwrap();
        assert_eq!(g.start, secs(4.0));
        assert_eq!(g.end(), secs(8.0));
    }

    #[test]
    fn start_handle_stops_at_previous_end() {
        let clips = vec![clip(0.0, 2.0), clip(5.0, 3.0)];
        let second = &clips[1];
        let g = solve_resize(&clips, second.id, ResizeHandle::Start, Geometry::of(second), secs(-10.0)).unwrap();
        assert_eq!(g.start, secs(2.0));
        assert_eq!(g.duration, secs(6.0));
    }

    #[test]
    fn start_handle_respects_minimum_duration() {
        let clips = vec![clip(0.0, 2.0), clip(5.0, 3.0)];
        let second = &clips[1];
        let g = solve_resize(&clips, second.id, ResizeHandle::Start, Geometry::of(second), secs(10.0)).unwrap();
        assert_eq!(g.start, secs(7.5));
        assert_eq!(g.duration, MIN_DURATION);
    }

    #[test]
    fn start_handle_on_first_clip_stops_at_zero() {
        let clips = vec![clip(1.0, 2.0)];
        let only = &clips[0];
        let g = solve_resize(&clips, only.id, ResizeHandle::Start, Geometry::of(only), secs(-5.0)).unwrap();
        assert_eq!(g.start, TimeUs::ZERO);
        assert_eq!(g.duration, secs(3.0));
    }

    #[test]
    fn start_handle_rejected_when_end_overlaps_next() {
        // Broken input: [0, 4) runs into [3, 5)
        let clips = vec![clip(0.0, 4.0), clip(3.0, 2.0)];
        let first = &clips[0];
        let origin = Geometry::of(first);
        let g = solve_resize(&clips, first.id, ResizeHandle::Start, origin, secs(1.0)).unwrap();
        assert_eq!(g, origin);
    }

    #[test]
    fn no_valid_range_collapses_to_origin() {
        // Next clip starts closer than the minimum duration
        let clips = vec![clip(0.0, 0.5), clip(0.3, 1.0)];
        let first = &clips[0];
        let origin = Geometry::of(first);
        let g = solve_resize(&clips, first.id, ResizeHandle::End, origin, secs(1.0)).unwrap();
        assert_eq!(g, origin);
    }

    #[test]
    fn resize_unknown_clip_errors() {
        let clips = three_clips();
        let origin = Geometry::of(&clips[0]);
        let result = solve_resize(&clips, Uuid::new_v4(), ResizeHandle::End, origin, secs(1.0));
        assert!(matches!(result.unwrap_err(), CoreError::ClipNotFound(_)));
    }

    // -----------------------------------------------------------------------
    // apply_geometry
    // -----------------------------------------------------------------------

    #[test]
    fn apply_geometry_touches_only_target() {
        let mut clips = three_clips();
        let before = clips.clone();
        let id = clips[1].id;
        apply_geometry(
            &mut clips,
            id,
            Geometry {
                start: secs(3.5),
                duration: secs(2.5),
            },
        )
        .unwrap();
        assert_eq!(clips[1].start, secs(3.5));
        assert_eq!(clips[1].end(), secs(6.0));
        assert_eq!(clips[0], before[0]);
        assert_eq!(clips[2], before[2]);
    }

    proptest! {
        #[test]
        fn resize_keeps_track_invariants(
            raw in prop::collection::vec((0i64..30_000_000, 0i64..5_000_000), 1..12),
            target in any::<prop::sample::Index>(),
            start_handle in any::<bool>(),
            delta in -20_000_000i64..20_000_000,
        ) {
            let mut clips = resolve_collisions(
                raw.iter().map(|&(s, d)| Clip::new(TimeUs(s), TimeUs(d))).collect::<Vec<_>>(),
            );
            let before = clips.clone();
            let i = target.index(clips.len());
            let id = clips[i].id;
            let handle = if start_handle { ResizeHandle::Start } else { ResizeHandle::End };

            let solved = solve_resize(&clips, id, handle, Geometry::of(&clips[i]), TimeUs(delta)).unwrap();
            apply_geometry(&mut clips, id, solved).unwrap();

            prop_assert!(find_overlap(&clips).is_none());
            for (j, c) in clips.iter().enumerate() {
                prop_assert!(c.duration >= MIN_DURATION);
                prop_assert!(c.start >= TimeUs::ZERO);
                if j != i {
                    prop_assert_eq!(c, &before[j]);
                }
            }
        }
    }
}
