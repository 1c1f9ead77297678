#![allow(clippy::float_cmp)]

use super::*;
use crate::doc::{Config, Cover, Endpoint, Group, Scale};

const BASE: Size = Size { width: 100.0, height: 100.0 };

fn bbox(x: f64, y: f64, w: f64, h: f64) -> BoundingBox {
    BoundingBox { x, y, width: w, height: h }
}

fn cover_at(x: f64, y: f64) -> Cover {
    Cover::new("c", "", "", Point::new(x, y), &Config::default())
}

fn group_at(x: f64, y: f64, scale: f64) -> Group {
    Group::new("g", Point::new(x, y), Scale::new(scale, scale), &Config::default())
}

fn board_with(covers: Vec<Cover>, groups: Vec<Group>) -> Board {
    let mut board = Board::new();
    board.covers.extend(covers);
    board.groups.extend(groups);
    board
}

// =============================================================
// Containment
// =============================================================

#[test]
fn contains_is_strict_on_every_edge() {
    let outer = bbox(0.0, 0.0, 300.0, 300.0);
    assert!(contains(&outer, &bbox(10.0, 10.0, 100.0, 100.0)));
    assert!(!contains(&outer, &bbox(0.0, 10.0, 100.0, 100.0)));
    assert!(!contains(&outer, &bbox(10.0, 0.0, 100.0, 100.0)));
    assert!(!contains(&outer, &bbox(200.0, 10.0, 100.0, 100.0)));
    assert!(!contains(&outer, &bbox(10.0, 200.0, 100.0, 100.0)));
    assert!(!contains(&outer, &outer));
}

#[test]
fn cover_inside_scaled_group() {
    let a = cover_at(10.0, 10.0);
    let g = group_at(0.0, 0.0, 3.0);
    assert!(contains(&bounding_box(&g, BASE), &bounding_box(&a, BASE)));
}

#[test]
fn cover_touching_group_corner_is_outside() {
    let a = cover_at(0.0, 0.0);
    let g = group_at(0.0, 0.0, 3.0);
    assert!(!contains(&bounding_box(&g, BASE), &bounding_box(&a, BASE)));
}

#[test]
fn contained_entities_includes_nested_groups_and_their_covers() {
    let outer = group_at(0.0, 0.0, 5.0);
    let inner = group_at(50.0, 50.0, 2.0);
    let nested = cover_at(60.0, 60.0);
    let outside = cover_at(600.0, 600.0);
    let (outer_id, inner_id, nested_id) = (outer.id, inner.id, nested.id);
    let board = board_with(vec![nested, outside], vec![outer, inner]);

    let found = contained_entities(&board, outer_id, BASE);
    assert_eq!(found.len(), 2);
    assert!(found.contains(&EntityRef::Cover(nested_id)));
    assert!(found.contains(&EntityRef::Group(inner_id)));

    let mut parents = parents_of(&board, nested_id, BASE);
    parents.sort();
    let mut expected = vec![outer_id, inner_id];
    expected.sort();
    assert_eq!(parents, expected);
}

#[test]
fn contained_entities_of_missing_group_is_empty() {
    let board = board_with(vec![cover_at(10.0, 10.0)], vec![]);
    assert!(contained_entities(&board, uuid::Uuid::new_v4(), BASE).is_empty());
}

#[test]
fn overlaps_excludes_touching_edges() {
    let a = bbox(0.0, 0.0, 100.0, 100.0);
    assert!(a.overlaps(&bbox(50.0, 50.0, 100.0, 100.0)));
    assert!(!a.overlaps(&bbox(100.0, 0.0, 100.0, 100.0)));
}

// =============================================================
// Placement
// =============================================================

#[test]
fn clamp_position_keeps_box_on_board() {
    let size = Size::new(150.0, 150.0);
    assert_eq!(clamp_position(Point::new(-20.0, 50.0), size), Point::new(0.0, 50.0));
    assert_eq!(clamp_position(Point::new(9_990.0, 10_500.0), size), Point::new(9_850.0, 9_850.0));
    assert_eq!(clamp_position(Point::new(f64::NAN, f64::INFINITY), size), Point::new(0.0, 0.0));
}

#[test]
fn centered_position_keeps_center() {
    let prev = bbox(100.0, 100.0, 200.0, 200.0);
    let pos = centered_position(&prev, Size::new(100.0, 50.0));
    assert_eq!(pos, Point::new(150.0, 175.0));
}

// =============================================================
// Connectors
// =============================================================

#[test]
fn anchors_push_out_by_shape_margin() {
    let b = bbox(0.0, 0.0, 160.0, 320.0);
    assert_eq!(anchor_point(ShapeKind::Cover, &b, Dir::Left), Point::new(-10.0, 160.0));
    assert_eq!(anchor_point(ShapeKind::Cover, &b, Dir::Bottom), Point::new(80.0, 340.0));
    assert_eq!(anchor_point(ShapeKind::Group, &b, Dir::Right), Point::new(165.0, 160.0));
    assert_eq!(anchor_point(ShapeKind::Group, &b, Dir::Top), Point::new(80.0, -10.0));
}

#[test]
fn connector_geometry_midpoint() {
    let a = bbox(0.0, 0.0, 160.0, 160.0);
    let b = bbox(400.0, 0.0, 160.0, 160.0);
    let geo = connector_geometry((&a, ShapeKind::Cover, Dir::Right), (&b, ShapeKind::Cover, Dir::Left));
    assert_eq!(geo.points, [170.0, 80.0, 390.0, 80.0]);
    assert_eq!(geo.mid, Point::new(280.0, 80.0));
}

#[test]
fn resolve_connector_needs_both_endpoints() {
    let a = cover_at(0.0, 0.0);
    let g = group_at(400.0, 0.0, 2.0);
    let arrow = Arrow::new(Endpoint::new(a.id, Dir::Right), Endpoint::new(g.id, Dir::Left), Dir::Bottom);
    let mut board = board_with(vec![a], vec![g]);

    let geo = resolve_connector(&board, &arrow, BASE).unwrap();
    assert_eq!(geo.points, [106.25, 50.0, 393.75, 100.0]);

    board.groups.remove(arrow.target.id);
    assert!(resolve_connector(&board, &arrow, BASE).is_none());
}
