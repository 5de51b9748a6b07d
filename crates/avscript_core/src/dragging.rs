use crate::collision::resolve_collisions;
use crate::error::{CoreError, Result};
use crate::types::*;
use std::collections::HashSet;
use uuid::Uuid;

/// Which side of a hovered clip a drop lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertEdge {
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoverTarget {
    pub clip_id: Uuid,
    pub edge: InsertEdge,
}

/// Left half of `target` inserts before it, right half after it.
pub fn insertion_edge(target: &Clip, pointer: TimeUs) -> InsertEdge {
    let midpoint = target.start + target.duration / 2;
    if pointer < midpoint {
        InsertEdge::Before
    } else {
        InsertEdge::After
    }
}

/// One step of a drag gesture.
#[derive(Debug, Clone)]
pub struct DragRequest<'a> {
    pub dragged_id: Uuid,
    /// Proposed start for the dragged clip.
    pub proposed_start: TimeUs,
    pub hover: Option<HoverTarget>,
    /// The whole selection moves together when it contains the dragged clip.
    pub selection: &'a Selection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arrangement<T> {
    /// The dragged clip at its new position.
    pub primary: T,
    /// Every clip of the track, sorted and renumbered.
    pub clips: Vec<T>,
}

/// Compute the track that results from dropping the dragged group.
///
/// Used both for live preview and for the final commit; the caller decides
/// where the result goes.
pub fn compute_arrangement<T: Timed>(clips: &[T], request: &DragRequest<'_>) -> Result<Arrangement<T>> {
    let dragged = clips
        .iter()
        .find(|c| c.id() == request.dragged_id)
        .ok_or(CoreError::ClipNotFound(request.dragged_id))?;
    let anchor_start = dragged.start();

    let group = drag_group(clips, request);

    let hover = request.hover.and_then(|h| {
        if group.contains(&h.clip_id) {
            return None;
        }
        match clips.iter().find(|c| c.id() == h.clip_id) {
            Some(target) => Some((target.clip().clone(), h.edge)),
            None => {
                tracing::debug!(clip = %h.clip_id, "Hover target not on this track, moving freely");
                None
            }
        }
    });

    let (mut moved, rest): (Vec<T>, Vec<T>) = clips
        .iter()
        .cloned()
        .partition(|c| group.contains(&c.id()));
    moved.sort_by_key(|c| c.start());

    let arranged = match hover {
        Some((target, edge)) => insert_at(moved, rest, &target, edge),
        None => move_freely(moved, rest, anchor_start, request.proposed_start),
    };

    let arranged = resolve_collisions(arranged);
    let primary = arranged
        .iter()
        .find(|c| c.id() == request.dragged_id)
        .cloned()
        .ok_or(CoreError::ClipNotFound(request.dragged_id))?;

    Ok(Arrangement {
        primary,
        clips: arranged,
    })
}

/// The selection if it holds the dragged clip, otherwise the dragged clip alone.
fn drag_group<T: Timed>(clips: &[T], request: &DragRequest<'_>) -> HashSet<Uuid> {
    if request.selection.contains(request.dragged_id) {
        clips
            .iter()
            .map(|c| c.id())
            .filter(|id| request.selection.contains(*id))
            .collect()
    } else {
        HashSet::from([request.dragged_id])
    }
}

/// Shift the group by the dragged clip's offset, then push each member
/// forward past anything it lands on. Members already placed count as
/// obstacles for the ones after them.
fn move_freely<T: Timed>(moved: Vec<T>, rest: Vec<T>, anchor_start: TimeUs, proposed_start: TimeUs) -> Vec<T> {
    let mut delta = proposed_start - anchor_start;
    if let Some(earliest) = moved.first().map(|c| c.start()) {
        if earliest + delta < TimeUs::ZERO {
            delta = TimeUs::ZERO - earliest;
        }
    }

    let mut obstacles: Vec<(TimeUs, TimeUs)> = rest.iter().map(|c| (c.start(), c.end())).collect();
    let mut placed = Vec::with_capacity(moved.len());

    for mut c in moved {
        let duration = c.duration();
        let start = clear_obstacles(c.start() + delta, duration, &obstacles);
        c.clip_mut().start = start;
        obstacles.push((start, start + duration));
        placed.push(c);
    }

    let mut all = rest;
    all.extend(placed);
    all
}

/// Earliest start at or after `start` where `[start, start + duration)` hits nothing.
fn clear_obstacles(mut start: TimeUs, duration: TimeUs, obstacles: &[(TimeUs, TimeUs)]) -> TimeUs {
    while let Some(&(_, end)) = obstacles
        .iter()
        .find(|&&(s, e)| start < e && s < start + duration)
    {
        start = end;
    }
    start
}

/// Lay the group out back to back at the insertion point and push every
/// other clip at or after that point forward by the group's total length.
fn insert_at<T: Timed>(moved: Vec<T>, rest: Vec<T>, target: &Clip, edge: InsertEdge) -> Vec<T> {
    let point = match edge {
        InsertEdge::Before => target.start,
        InsertEdge::After => target.end(),
    };
    let block = moved
        .iter()
        .fold(TimeUs::ZERO, |acc, c| acc + c.duration());

    tracing::debug!(at = %point, block = %block, count = moved.len(), "Inserting dragged clips");

    let mut all: Vec<T> = rest
        .into_iter()
        .map(|mut c| {
            if c.start() >= point {
                c.clip_mut().start += block;
            }
            c
        })
        .collect();

    let mut cursor = point;
    for mut c in moved {
        c.clip_mut().start = cursor;
        cursor += c.duration();
        all.push(c);
    }
    all
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
