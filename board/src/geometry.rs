//! Geometry and containment.
//!
//! Everything here is a pure function of positions and sizes. Containment is
//! strict: an inner box whose edge touches the outer edge is not inside. The
//! cascade module reuses exactly these predicates, so what a reader sees as
//! "inside a group" is what moves with it.

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;

use serde::{Deserialize, Serialize};

use crate::consts::{COVER_ANCHOR_DIVISOR, GROUP_ANCHOR_DIVISOR, MAX_BOUNDARY};
use crate::doc::{Arrow, Board, Dir, EntityId, EntityRef};

/// A point in board space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// This point shifted by `(dx, dy)`.
    #[must_use]
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self { x: self.x + dx, y: self.y + dy }
    }
}

/// Width and height in board units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned box with its top-left corner at `(x, y)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    #[must_use]
    pub fn new(pos: Point, size: Size) -> Self {
        Self { x: pos.x, y: pos.y, width: size.width, height: size.height }
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether the two boxes share any interior area.
    #[must_use]
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        self.x < other.right() && other.x < self.right() && self.y < other.bottom() && other.y < self.bottom()
    }
}

/// Anything with a top-left position and a size derived from the base size.
pub trait Placed {
    fn pos(&self) -> Point;

    /// Size of this entity given the cover base size.
    fn extent(&self, base: Size) -> Size;
}

/// Which decorative margin an anchor uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Cover,
    Group,
}

impl From<EntityRef> for ShapeKind {
    fn from(entity: EntityRef) -> Self {
        match entity {
            EntityRef::Cover(_) => Self::Cover,
            EntityRef::Group(_) => Self::Group,
        }
    }
}

/// Where a connector and its label are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectorGeometry {
    /// `[x1, y1, x2, y2]` from origin anchor to target anchor.
    pub points: [f64; 4],
    /// Midpoint of the segment, where the label sits.
    pub mid: Point,
}

// =============================================================
// Boxes and containment
// =============================================================

/// Bounding box of a cover (base size) or group (base size times scale).
#[must_use]
pub fn bounding_box<T: Placed>(entity: &T, base: Size) -> BoundingBox {
    BoundingBox::new(entity.pos(), entity.extent(base))
}

/// Whether `inner` lies strictly inside `outer` on both axes.
#[must_use]
pub fn contains(outer: &BoundingBox, inner: &BoundingBox) -> bool {
    inner.x > outer.x && inner.right() < outer.right() && inner.y > outer.y && inner.bottom() < outer.bottom()
}

/// Bounding box of a referenced cover or group, if it still exists.
#[must_use]
pub fn entity_box(board: &Board, entity: EntityRef, base: Size) -> Option<BoundingBox> {
    match entity {
        EntityRef::Cover(id) => board.covers.find(id).map(|c| bounding_box(c, base)),
        EntityRef::Group(id) => board.groups.find(id).map(|g| bounding_box(g, base)),
    }
}

/// Every cover and group strictly inside `outer`, skipping `exclude`.
///
/// Containment is transitive, so this already includes the contents of
/// nested groups.
#[must_use]
pub fn entities_within(board: &Board, outer: &BoundingBox, exclude: EntityId, base: Size) -> Vec<EntityRef> {
    let covers = board
        .covers
        .iter()
        .filter(|c| c.id != exclude && contains(outer, &bounding_box(*c, base)))
        .map(|c| EntityRef::Cover(c.id));
    let groups = board
        .groups
        .iter()
        .filter(|g| g.id != exclude && contains(outer, &bounding_box(*g, base)))
        .map(|g| EntityRef::Group(g.id));
    covers.chain(groups).collect()
}

/// Everything currently inside the group `group_id`. Empty if it doesn't exist.
#[must_use]
pub fn contained_entities(board: &Board, group_id: EntityId, base: Size) -> Vec<EntityRef> {
    let Some(group) = board.groups.find(group_id) else {
        return Vec::new();
    };
    entities_within(board, &bounding_box(group, base), group_id, base)
}

/// Ids of every group that strictly contains the entity `id`.
#[must_use]
pub fn parents_of(board: &Board, id: EntityId, base: Size) -> Vec<EntityId> {
    let Some(entity) = board.resolve(id) else {
        return Vec::new();
    };
    let Some(inner) = entity_box(board, entity, base) else {
        return Vec::new();
    };
    board
        .groups
        .iter()
        .filter(|g| g.id != id && contains(&bounding_box(*g, base), &inner))
        .map(|g| g.id)
        .collect()
}

// =============================================================
// Placement
// =============================================================

/// Clamp `pos` so a box of `size` stays inside `[0, MAX_BOUNDARY]`.
/// Non-finite coordinates collapse to 0.
#[must_use]
pub fn clamp_position(pos: Point, size: Size) -> Point {
    let clamp_axis = |v: f64, extent: f64| {
        let max = (MAX_BOUNDARY - extent).max(0.0);
        if v.is_finite() { v.clamp(0.0, max) } else { 0.0 }
    };
    Point::new(clamp_axis(pos.x, size.width), clamp_axis(pos.y, size.height))
}

/// Top-left corner of a box of `size` centered on `previous`'s center.
#[must_use]
pub fn centered_position(previous: &BoundingBox, size: Size) -> Point {
    let center = previous.center();
    Point::new(center.x - size.width / 2.0, center.y - size.height / 2.0)
}

// =============================================================
// Connectors
// =============================================================

/// Attachment point on `side` of `bbox`, pushed outward by the shape's margin.
#[must_use]
pub fn anchor_point(kind: ShapeKind, bbox: &BoundingBox, side: Dir) -> Point {
    let divisor = match kind {
        ShapeKind::Cover => COVER_ANCHOR_DIVISOR,
        ShapeKind::Group => GROUP_ANCHOR_DIVISOR,
    };
    let center = bbox.center();
    match side {
        Dir::Left => Point::new(bbox.x - bbox.width / divisor, center.y),
        Dir::Right => Point::new(bbox.right() + bbox.width / divisor, center.y),
        Dir::Top => Point::new(center.x, bbox.y - bbox.height / divisor),
        Dir::Bottom => Point::new(center.x, bbox.bottom() + bbox.height / divisor),
    }
}

/// Segment and label position between two anchored boxes.
#[must_use]
pub fn connector_geometry(
    origin: (&BoundingBox, ShapeKind, Dir),
    target: (&BoundingBox, ShapeKind, Dir),
) -> ConnectorGeometry {
    let (origin_box, origin_kind, origin_side) = origin;
    let (target_box, target_kind, target_side) = target;
    let a = anchor_point(origin_kind, origin_box, origin_side);
    let b = anchor_point(target_kind, target_box, target_side);
    ConnectorGeometry { points: [a.x, a.y, b.x, b.y], mid: Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0) }
}

/// Geometry for `arrow` on `board`, or `None` if either endpoint is gone.
#[must_use]
pub fn resolve_connector(board: &Board, arrow: &Arrow, base: Size) -> Option<ConnectorGeometry> {
    let origin = board.resolve(arrow.origin.id)?;
    let target = board.resolve(arrow.target.id)?;
    let origin_box = entity_box(board, origin, base)?;
    let target_box = entity_box(board, target, base)?;
    Some(connector_geometry(
        (&origin_box, origin.into(), arrow.origin.dir),
        (&target_box, target.into(), arrow.target.dir),
    ))
}
