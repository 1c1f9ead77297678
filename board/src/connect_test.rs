use super::*;
use crate::consts::MAX_ARROWS;
use crate::doc::{Config, Cover, Group, Scale};
use crate::geometry::Point;
use uuid::Uuid;

fn board_with_covers(n: usize) -> (Board, Vec<EntityId>) {
    let mut board = Board::new();
    let covers: Vec<Cover> = (0..n)
        .map(|i| Cover::new("c", "", "", Point::new(200.0 * i as f64, 0.0), &Config::default()))
        .collect();
    let ids = covers.iter().map(|c| c.id).collect();
    board.add_covers(covers).unwrap();
    (board, ids)
}

// =============================================================
// Protocol
// =============================================================

#[test]
fn first_click_sets_pending_origin() {
    let (mut board, ids) = board_with_covers(2);
    let mut connector = Connector::new();
    let outcome = connector.click(&mut board, ids[0], Dir::Right).unwrap();
    assert_eq!(outcome, ConnectOutcome::Pending(Endpoint::new(ids[0], Dir::Right)));
    assert_eq!(connector.pending(), Some(Endpoint::new(ids[0], Dir::Right)));
    assert!(board.arrows.is_empty());
}

#[test]
fn clicking_origin_again_cancels() {
    let (mut board, ids) = board_with_covers(2);
    let mut connector = Connector::new();
    connector.click(&mut board, ids[0], Dir::Right).unwrap();
    let outcome = connector.click(&mut board, ids[0], Dir::Left).unwrap();
    assert_eq!(outcome, ConnectOutcome::Cancelled);
    assert!(connector.pending().is_none());
}

#[test]
fn second_click_creates_arrow_with_config_label_dir() {
    let (mut board, ids) = board_with_covers(2);
    board.configs.arrow_dir = Dir::Top;
    let mut connector = Connector::new();
    connector.click(&mut board, ids[0], Dir::Right).unwrap();
    let ConnectOutcome::Created(arrow_id) = connector.click(&mut board, ids[1], Dir::Left).unwrap() else {
        panic!("expected a new arrow");
    };
    let arrow = board.arrows.find(arrow_id).unwrap();
    assert_eq!(arrow.origin, Endpoint::new(ids[0], Dir::Right));
    assert_eq!(arrow.target, Endpoint::new(ids[1], Dir::Left));
    assert_eq!(arrow.title.dir, Dir::Top);
    assert!(arrow.title.text.is_empty());
    assert!(connector.pending().is_none());
}

#[test]
fn reversed_identical_connection_is_duplicate() {
    let (mut board, ids) = board_with_covers(2);
    let mut connector = Connector::new();
    connector.click(&mut board, ids[0], Dir::Right).unwrap();
    connector.click(&mut board, ids[1], Dir::Left).unwrap();

    connector.click(&mut board, ids[1], Dir::Left).unwrap();
    let outcome = connector.click(&mut board, ids[0], Dir::Right).unwrap();
    assert!(matches!(outcome, ConnectOutcome::Duplicate(_)));
    assert_eq!(board.arrows.len(), 1);
}

#[test]
fn different_dirs_update_existing_arrow_keeping_id_and_label() {
    let (mut board, ids) = board_with_covers(2);
    let mut connector = Connector::new();
    connector.click(&mut board, ids[0], Dir::Right).unwrap();
    let ConnectOutcome::Created(arrow_id) = connector.click(&mut board, ids[1], Dir::Left).unwrap() else {
        panic!("expected a new arrow");
    };
    board.arrows.find_mut(arrow_id).unwrap().title.text = "influenced".into();

    connector.click(&mut board, ids[1], Dir::Top).unwrap();
    let outcome = connector.click(&mut board, ids[0], Dir::Bottom).unwrap();
    assert_eq!(outcome, ConnectOutcome::Updated(arrow_id));

    let arrow = board.arrows.find(arrow_id).unwrap();
    assert_eq!(arrow.origin, Endpoint::new(ids[0], Dir::Bottom));
    assert_eq!(arrow.target, Endpoint::new(ids[1], Dir::Top));
    assert_eq!(arrow.title.text, "influenced");
    assert_eq!(board.arrows.len(), 1);
}

#[test]
fn unknown_ids_are_ignored() {
    let (mut board, ids) = board_with_covers(1);
    let mut connector = Connector::new();
    assert_eq!(connector.click(&mut board, Uuid::new_v4(), Dir::Left).unwrap(), ConnectOutcome::Ignored);
    connector.click(&mut board, ids[0], Dir::Left).unwrap();
    assert_eq!(connector.click(&mut board, Uuid::new_v4(), Dir::Left).unwrap(), ConnectOutcome::Ignored);
    assert!(connector.pending().is_some());
}

#[test]
fn deleted_origin_restarts_from_new_click() {
    let (mut board, ids) = board_with_covers(2);
    let mut connector = Connector::new();
    connector.click(&mut board, ids[0], Dir::Right).unwrap();
    board.covers.remove(ids[0]);
    let outcome = connector.click(&mut board, ids[1], Dir::Left).unwrap();
    assert_eq!(outcome, ConnectOutcome::Pending(Endpoint::new(ids[1], Dir::Left)));
    assert!(board.arrows.is_empty());
}

#[test]
fn connects_covers_to_groups() {
    let (mut board, ids) = board_with_covers(1);
    let group = Group::new("g", Point::new(1_000.0, 0.0), Scale::default(), &Config::default());
    let group_id = group.id;
    board.add_groups(vec![group]).unwrap();
    let mut connector = Connector::new();
    connector.click(&mut board, group_id, Dir::Left).unwrap();
    assert!(matches!(connector.click(&mut board, ids[0], Dir::Right).unwrap(), ConnectOutcome::Created(_)));
}

#[test]
fn insert_past_bound_returns_validation_error() {
    let (mut board, ids) = board_with_covers(12);
    let mut connector = Connector::new();
    let mut made = 0;
    'outer: for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            if made == MAX_ARROWS {
                break 'outer;
            }
            connector.click(&mut board, a, Dir::Right).unwrap();
            connector.click(&mut board, b, Dir::Left).unwrap();
            made += 1;
        }
    }
    assert_eq!(board.arrows.len(), MAX_ARROWS);

    connector.click(&mut board, ids[10], Dir::Right).unwrap();
    let err = connector.click(&mut board, ids[11], Dir::Left).unwrap_err();
    assert!(err.primary().unwrap().kind.is_too_big());
    assert_eq!(board.arrows.len(), MAX_ARROWS);
    assert!(connector.pending().is_none());
}

// =============================================================
// Duplicate detection
// =============================================================

#[test]
fn would_duplicate_checks_unordered_pair() {
    let (mut board, ids) = board_with_covers(3);
    board
        .add_arrows(vec![Arrow::new(Endpoint::new(ids[0], Dir::Right), Endpoint::new(ids[1], Dir::Left), Dir::Bottom)])
        .unwrap();
    assert!(would_duplicate(&board.arrows, ids[0], ids[1]));
    assert!(would_duplicate(&board.arrows, ids[1], ids[0]));
    assert!(!would_duplicate(&board.arrows, ids[0], ids[2]));
}
