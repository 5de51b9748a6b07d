use crate::types::*;
use uuid::Uuid;

/// Arrange `clips` into a non-overlapping, start-ordered track.
///
/// Starts are clamped to zero and durations floored at [`MIN_DURATION`].
/// A clip that begins before the previous clip's end is pushed to exactly
/// that end; the push cascades through every later clip, so the track may
/// grow but never overlaps. Durations are never trimmed. Clips that tie on
/// start keep their input order.
pub fn resolve_collisions<T: Timed>(mut clips: Vec<T>) -> Vec<T> {
    for c in clips.iter_mut() {
        let clip = c.clip_mut();
        if clip.start < TimeUs::ZERO {
            clip.start = TimeUs::ZERO;
        }
        if clip.duration < MIN_DURATION {
            tracing::warn!(clip = %clip.id, duration = %clip.duration, "Duration below minimum, flooring");
            clip.duration = MIN_DURATION;
        }
    }

    clips.sort_by_key(|c| c.start());

    let mut prev_end: Option<TimeUs> = None;
    for c in clips.iter_mut() {
        let clip = c.clip_mut();
        if let Some(end) = prev_end {
            if clip.start < end {
                tracing::debug!(clip = %clip.id, from = %clip.start, to = %end, "Pushing clip past collision");
                clip.start = end;
            }
        }
        prev_end = Some(clip.end());
    }

    renumber(&mut clips);
    clips
}

/// Rewrite `order` from position. Expects `clips` sorted by start.
pub fn renumber<T: Timed>(clips: &mut [T]) {
    for (i, c) in clips.iter_mut().enumerate() {
        c.clip_mut().order = i as u32;
    }
}

/// Insert ahead of the first clip starting at or after `item`, so the
/// resolver pushes that clip rather than the new one.
pub fn insert_by_start<T: Timed>(clips: &mut Vec<T>, item: T) {
    let at = clips
        .iter()
        .position(|c| c.start() >= item.start())
        .unwrap_or(clips.len());
    clips.insert(at, item);
}

/// First pair of overlapping clips, if any.
pub fn find_overlap<T: Timed>(clips: &[T]) -> Option<(Uuid, Uuid)> {
    let mut sorted: Vec<&Clip> = clips.iter().map(|c| c.clip()).collect();
    sorted.sort_by_key(|c| c.start);
    sorted
        .windows(2)
        .find(|w| w[0].overlaps(w[1]))
        .map(|w| (w[0].id, w[1].id))
}

/// Describe every invariant violation on a track.
pub fn validate_track<T: Timed>(clips: &[T]) -> Vec<String> {
    let mut problems = Vec::new();
    for c in clips {
        let clip = c.clip();
        if clip.start < TimeUs::ZERO {
            problems.push(format!("clip {} starts before zero ({})", clip.id, clip.start));
        }
        if clip.duration < MIN_DURATION {
            problems.push(format!(
                "clip {} is shorter than the minimum ({})",
                clip.id, clip.duration
            ));
        }
    }
    if let Some((a, b)) = find_overlap(clips) {
        problems.push(format!("clips {a} and {b} overlap"));
    }
    problems
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn clip(start_s: f64, dur_s: f64) -> Clip {
        let mut c = Clip::new(TimeUs::ZERO, MIN_DURATION);
        c.start = TimeUs::from_seconds(start_s);
        c.duration = TimeUs::from_seconds(dur_s);
        c
    }

    fn spans(clips: &[Clip]) -> Vec<(f64, f64)> {
        clips
            .iter()
            .map(|c| (c.start.as_seconds(), c.duration.as_seconds()))
            .collect()
    }

    #[test]
    fn unsorted_without_overlap_is_only_sorted() {
        let out = resolve_collisions(vec![clip(5.0, 2.0), clip(0.0, 3.0)]);
        assert_eq!(spans(&out), vec![(0.0, 3.0), (5.0, 2.0)]);
        assert_eq!(out[0].order, 0);
        assert_eq!(out[1].order, 1);
    }

    #[test]
    fn overlapping_clip_is_pushed_to_previous_end() {
        let out = resolve_collisions(vec![clip(0.0, 4.0), clip(2.0, 3.0)]);
        assert_eq!(spans(&out), vec![(0.0, 4.0), (4.0, 3.0)]);
    }

    #[test]
    fn push_cascades_through_later_clips() {
        let out = resolve_collisions(vec![clip(0.0, 4.0), clip(3.0, 2.0), clip(5.0, 1.0)]);
        assert_eq!(spans(&out), vec![(0.0, 4.0), (4.0, 2.0), (6.0, 1.0)]);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let out: Vec<Clip> = resolve_collisions(vec![]);
        assert!(out.is_empty());
    }

    #[test]
    fn negative_start_and_short_duration_are_normalized() {
        let out = resolve_collisions(vec![clip(-2.0, 0.1)]);
        assert_eq!(out[0].start, TimeUs::ZERO);
        assert_eq!(out[0].duration, MIN_DURATION);
    }

    #[test]
    fn ties_keep_input_order() {
        let a = clip(1.0, 1.0);
        let b = clip(1.0, 1.0);
        let (a_id, b_id) = (a.id, b.id);
        let out = resolve_collisions(vec![a, b]);
        assert_eq!(out[0].id, a_id);
        assert_eq!(out[1].id, b_id);
        assert_eq!(out[1].start, TimeUs::from_seconds(2.0));
    }

    #[test]
    fn inserted_clip_wins_ties() {
        let mut clips = vec![clip(0.0, 2.0), clip(2.0, 2.0)];
        let new = clip(2.0, 1.0);
        let new_id = new.id;
        insert_by_start(&mut clips, new);
        let out = resolve_collisions(clips);
        assert_eq!(out[1].id, new_id);
        assert_eq!(spans(&out), vec![(0.0, 2.0), (2.0, 1.0), (3.0, 2.0)]);
    }

    #[test]
    fn find_overlap_reports_pair() {
        let a = clip(0.0, 3.0);
        let b = clip(2.0, 3.0);
        let (a_id, b_id) = (a.id, b.id);
        assert_eq!(find_overlap(&[b.clone(), a.clone()]), Some((a_id, b_id)));
        assert!(find_overlap(&resolve_collisions(vec![a, b])).is_none());
    }

    #[test]
    fn validate_track_lists_problems() {
        let mut short = clip(0.0, 1.0);
        short.duration = TimeUs(10);
        let problems = validate_track(&[short, clip(0.0, 2.0)]);
        assert_eq!(problems.len(), 2);
        assert!(validate_track(&[clip(0.0, 1.0), clip(1.0, 1.0)]).is_empty());
    }

    proptest! {
        #[test]
        fn resolved_tracks_never_overlap(
            raw in prop::collection::vec((-5_000_000i64..60_000_000, 0i64..10_000_000), 0..24)
        ) {
            let clips: Vec<Clip> = raw
                .iter()
                .map(|&(s, d)| {
                    let mut c = Clip::new(TimeUs::ZERO, MIN_DURATION);
                    c.start = TimeUs(s);
                    c.duration = TimeUs(d);
                    c
                })
                .collect();
            let n = clips.len();
            let out = resolve_collisions(clips);

            prop_assert_eq!(out.len(), n);
            prop_assert!(find_overlap(&out).is_none());
            for w in out.windows(2) {
                prop_assert!(w[0].start <= w[1].start);
            }
            for c in &out {
                prop_assert!(c.duration >= MIN_DURATION);
                prop_assert!(c.start >= TimeUs::ZERO);
            }
        }

        #[test]
        fn resolving_twice_changes_nothing(
            raw in prop::collection::vec((0i64..30_000_000, 0i64..5_000_000), 0..16)
        ) {
            let clips: Vec<Clip> = raw
                .iter()
                .map(|&(s, d)| Clip::new(TimeUs(s), TimeUs(d)))
                .collect();
            let once = resolve_collisions(clips);
            let twice = resolve_collisions(once.clone());
            prop_assert_eq!(once, twice);
        }
    }
}
