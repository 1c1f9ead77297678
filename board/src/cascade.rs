//! Cascades: multi-entity side effects of moving, rescaling, and deleting.
//!
//! DESIGN
//! ======
//! Each cascade takes the board by `&mut`, runs to completion, and returns
//! the `Change`s it made. Containment is computed with the same strict
//! predicate readers use (`geometry::contains`), always against the state
//! *before* the triggering edit.
//!
//! Arrows between a container and the things whose containment relation to
//! it was touched are severed: they describe an adjacency that no longer
//! holds once relative geometry changes.
//!
//! ERROR HANDLING
//! ==============
//! Unknown ids are silent no-ops. Every cascade ends with no arrow pointing
//! at a missing entity.

#[cfg(test)]
#[path = "cascade_test.rs"]
mod cascade_test;

use std::collections::HashSet;

use tracing::debug;

use crate::doc::{Board, EntityId, EntityRef, Scale};
use crate::engine::Change;
use crate::geometry::{self, Placed, Point, Size};

// =============================================================================
// MOVE
// =============================================================================

/// Move a cover. Arrows between the cover and any group that gained or lost
/// it are severed.
pub fn move_cover(board: &mut Board, id: EntityId, to: Point, base: Size) -> Vec<Change> {
    let Some(cover) = board.covers.find(id) else {
        return Vec::new();
    };
    let target = geometry::clamp_position(to, cover.extent(base));
    if target == cover.pos {
        return Vec::new();
    }

    let parents_before: HashSet<EntityId> = geometry::parents_of(board, id, base).into_iter().collect();
    if let Some(cover) = board.covers.find_mut(id) {
        cover.pos = target;
    }
    let parents_after: HashSet<EntityId> = geometry::parents_of(board, id, base).into_iter().collect();

    let changed: HashSet<EntityId> = parents_before.symmetric_difference(&parents_after).copied().collect();
    let mut changes = vec![Change::CoverUpdated(id)];
    changes.extend(sever_between(board, id, &changed));
    changes
}

/// Move a group and everything inside it by the same delta.
///
/// The new position is clamped so the group stays on the board; contents
/// are strictly inside the group and therefore stay on the board too.
pub fn move_group(board: &mut Board, id: EntityId, to: Point, base: Size) -> Vec<Change> {
    let Some(group) = board.groups.find(id) else {
        return Vec::new();
    };
    let old_box = geometry::bounding_box(group, base);
    let target = geometry::clamp_position(to, group.extent(base));
    if target == group.pos {
        return Vec::new();
    }
    let (dx, dy) = (target.x - old_box.x, target.y - old_box.y);

    let contained = geometry::entities_within(board, &old_box, id, base);
    let mut related: HashSet<EntityId> = contained.iter().map(|e| e.id()).collect();
    related.extend(geometry::parents_of(board, id, base));

    let mut changes = vec![Change::GroupUpdated(id)];
    if let Some(group) = board.groups.find_mut(id) {
        group.pos = target;
    }
    for entity in &contained {
        changes.extend(translate(board, *entity, dx, dy));
    }

    related.extend(geometry::contained_entities(board, id, base).into_iter().map(EntityRef::id));
    related.extend(geometry::parents_of(board, id, base));

    debug!(%id, dx, dy, moved = contained.len(), "moved group");
    changes.extend(sever_between(board, id, &related));
    changes
}

/// Rescale a group around its current center. Contents are neither moved
/// nor resized.
pub fn rescale_group(board: &mut Board, id: EntityId, scale: Scale, base: Size) -> Vec<Change> {
    let Some(group) = board.groups.find(id) else {
        return Vec::new();
    };
    let scale = scale.clamped();
    if scale == group.scale {
        return Vec::new();
    }
    let old_box = geometry::bounding_box(group, base);
    let new_size = Size::new(base.width * scale.x, base.height * scale.y);
    let pos = geometry::clamp_position(geometry::centered_position(&old_box, new_size), new_size);

    let mut related: HashSet<EntityId> = geometry::entities_within(board, &old_box, id, base)
        .into_iter()
        .map(EntityRef::id)
        .collect();
    related.extend(geometry::parents_of(board, id, base));

    if let Some(group) = board.groups.find_mut(id) {
        group.scale = scale;
        group.pos = pos;
    }

    related.extend(geometry::contained_entities(board, id, base).into_iter().map(EntityRef::id));
    related.extend(geometry::parents_of(board, id, base));

    debug!(%id, sx = scale.x, sy = scale.y, "rescaled group");
    let mut changes = vec![Change::GroupUpdated(id)];
    changes.extend(sever_between(board, id, &related));
    changes
}

// =============================================================================
// DELETE
// =============================================================================

/// Delete a cover and every arrow touching it.
pub fn delete_cover(board: &mut Board, id: EntityId) -> Vec<Change> {
    if board.covers.remove(id).is_none() {
        return Vec::new();
    }
    let mut changes = vec![Change::CoverRemoved(id)];
    changes.extend(
        board
            .arrows
            .remove_where(|a| a.touches(id))
            .into_iter()
            .map(Change::ArrowRemoved),
    );
    changes
}

/// Delete a group, everything contained in it at delete time, and every
/// arrow touching any removed entity.
pub fn delete_group(board: &mut Board, id: EntityId, base: Size) -> Vec<Change> {
    if !board.groups.exists(id) {
        return Vec::new();
    }
    let contained = geometry::contained_entities(board, id, base);

    let mut removed: HashSet<EntityId> = HashSet::with_capacity(contained.len() + 1);
    let mut changes = Vec::with_capacity(contained.len() + 1);
    for entity in contained {
        match entity {
            EntityRef::Cover(cid) => {
                if board.covers.remove(cid).is_some() {
                    removed.insert(cid);
                    changes.push(Change::CoverRemoved(cid));
                }
            }
            EntityRef::Group(gid) => {
                if board.groups.remove(gid).is_some() {
                    removed.insert(gid);
                    changes.push(Change::GroupRemoved(gid));
                }
            }
        }
    }
    board.groups.remove(id);
    removed.insert(id);
    changes.push(Change::GroupRemoved(id));

    let severed = board
        .arrows
        .remove_where(|a| removed.contains(&a.origin.id) || removed.contains(&a.target.id));
    debug!(%id, removed = removed.len(), severed = severed.len(), "deleted group");
    changes.extend(severed.into_iter().map(Change::ArrowRemoved));
    changes
}

// =============================================================================
// HELPERS
// =============================================================================

fn translate(board: &mut Board, entity: EntityRef, dx: f64, dy: f64) -> Option<Change> {
    match entity {
        EntityRef::Cover(id) => {
            let cover = board.covers.find_mut(id)?;
            cover.pos = cover.pos.offset(dx, dy);
            Some(Change::CoverUpdated(id))
        }
        EntityRef::Group(id) => {
            let group = board.groups.find_mut(id)?;
            group.pos = group.pos.offset(dx, dy);
            Some(Change::GroupUpdated(id))
        }
    }
}

/// Remove arrows linking `id` with any id in `others`.
fn sever_between(board: &mut Board, id: EntityId, others: &HashSet<EntityId>) -> Vec<Change> {
    if others.is_empty() {
        return Vec::new();
    }
    board
        .arrows
        .remove_where(|a| {
            (a.origin.id == id && others.contains(&a.target.id)) || (a.target.id == id && others.contains(&a.origin.id))
        })
        .into_iter()
        .map(Change::ArrowRemoved)
        .collect()
}
