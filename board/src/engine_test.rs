#![allow(clippy::float_cmp)]

use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::consts::MAX_TEXT_LEN;
use crate::doc::{Config, LabelPatch, SearchLabelPatch};
use crate::history::ManualClock;
use crate::storage::{MemoryStorage, Saves};
use crate::validation::IssueKind;
use uuid::Uuid;

// =============================================================
// Helpers
// =============================================================

fn engine() -> (BoardEngine, ManualClock) {
    let clock = ManualClock::new(0);
    let engine = BoardEngine::with_parts(Board::default(), HistoryPolicy::default(), Box::new(clock.clone()));
    (engine, clock)
}

fn cover_at(x: f64, y: f64) -> Cover {
    Cover::new("c", "", "", Point::new(x, y), &Config::default())
}

fn group_at(x: f64, y: f64, scale: f64) -> Group {
    Group::new("g", Point::new(x, y), Scale::new(scale, scale), &Config::default())
}

fn record_changes(engine: &mut BoardEngine, slices: &[Slice]) -> Rc<RefCell<Vec<Change>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    engine.subscribe(slices, move |change| sink.borrow_mut().push(*change));
    log
}

// =============================================================
// Concrete scenarios
// =============================================================

#[test]
fn cover_at_10_10_is_inside_group_scale_3() {
    let (mut engine, _) = engine();
    let a = cover_at(10.0, 10.0);
    let g = group_at(0.0, 0.0, 3.0);
    let (a_id, g_id) = (a.id, g.id);
    engine.add_covers(vec![a]).unwrap();
    engine.add_groups(vec![g]).unwrap();
    assert_eq!(engine.cover_size(), Size::new(150.0, 150.0));
    assert_eq!(engine.contained_in(g_id), vec![EntityRef::Cover(a_id)]);
}

#[test]
fn cover_at_origin_is_not_inside_group_at_origin() {
    let (mut engine, _) = engine();
    let a = cover_at(0.0, 0.0);
    let g = group_at(0.0, 0.0, 3.0);
    let g_id = g.id;
    engine.add_covers(vec![a]).unwrap();
    engine.add_groups(vec![g]).unwrap();
    assert!(engine.contained_in(g_id).is_empty());
}

#[test]
fn reversed_duplicate_arrow_is_rejected() {
    let (mut engine, _) = engine();
    let (a, b) = (cover_at(0.0, 0.0), cover_at(400.0, 0.0));
    let (a_id, b_id) = (a.id, b.id);
    engine.add_covers(vec![a, b]).unwrap();
    engine
        .add_arrows(vec![Arrow::new(Endpoint::new(a_id, Dir::Right), Endpoint::new(b_id, Dir::Left), Dir::Bottom)])
        .unwrap();
    let err = engine
        .add_arrows(vec![Arrow::new(Endpoint::new(b_id, Dir::Left), Endpoint::new(a_id, Dir::Right), Dir::Bottom)])
        .unwrap_err();
    assert!(err.issues().iter().any(|i| i.kind == IssueKind::Duplicate));
    assert_eq!(engine.board().arrows.len(), 1);
}

#[test]
fn deleting_cover_removes_its_arrow() {
    let (mut engine, _) = engine();
    let (a, b) = (cover_at(0.0, 0.0), cover_at(400.0, 0.0));
    let (a_id, b_id) = (a.id, b.id);
    engine.add_covers(vec![a, b]).unwrap();
    engine
        .add_arrows(vec![Arrow::new(Endpoint::new(a_id, Dir::Right), Endpoint::new(b_id, Dir::Left), Dir::Bottom)])
        .unwrap();
    assert!(engine.remove_cover(a_id));
    assert!(engine.board().arrows.is_empty());
    assert!(engine.resolve(b_id).is_some());
}

// =============================================================
// Commands
// =============================================================

#[test]
fn update_cover_routes_position_through_cascade() {
    let (mut engine, _) = engine();
    let a = cover_at(10.0, 10.0);
    let id = a.id;
    engine.add_covers(vec![a]).unwrap();
    let patch = CoverPatch {
        pos: Some(Point::new(-30.0, 40.0)),
        title: Some(SearchLabelPatch { text: Some("Renamed".into()), ..SearchLabelPatch::default() }),
        ..CoverPatch::default()
    };
    assert!(engine.update_cover(id, &patch).unwrap());
    let cover = engine.board().covers.find(id).unwrap();
    assert_eq!(cover.pos, Point::new(0.0, 40.0));
    assert_eq!(cover.title.text, "Renamed");
    assert_eq!(cover.title.search, "c");
}

#[test]
fn unknown_ids_are_silent_noops() {
    let (mut engine, _) = engine();
    let ghost = Uuid::new_v4();
    assert!(!engine.update_cover(ghost, &CoverPatch::default()).unwrap());
    assert!(!engine.remove_cover(ghost));
    assert!(!engine.move_group(ghost, Point::new(1.0, 1.0)));
    assert!(!engine.remove_arrow(ghost));
    assert!(!engine.update_arrow(ghost, &ArrowPatch::default()).unwrap());
    assert!(!engine.can_undo());
}

#[test]
fn update_group_rescales_then_moves() {
    let (mut engine, _) = engine();
    let g = group_at(100.0, 100.0, 2.0);
    let id = g.id;
    engine.add_groups(vec![g]).unwrap();
    let patch = GroupPatch {
        scale: Some(Scale::new(4.0, 4.0)),
        pos: Some(Point::new(500.0, 500.0)),
        title: Some(LabelPatch { text: Some("Jazz".into()), dir: None }),
        ..GroupPatch::default()
    };
    assert!(engine.update_group(id, &patch).unwrap());
    let group = engine.board().groups.find(id).unwrap();
    assert_eq!(group.scale, Scale::new(4.0, 4.0));
    assert_eq!(group.pos, Point::new(500.0, 500.0));
    assert_eq!(group.title.text, "Jazz");
}

#[test]
fn move_group_carries_contents() {
    let (mut engine, _) = engine();
    let g = group_at(0.0, 0.0, 3.0);
    let a = cover_at(10.0, 10.0);
    let (g_id, a_id) = (g.id, a.id);
    engine.add_groups(vec![g]).unwrap();
    engine.add_covers(vec![a]).unwrap();
    assert!(engine.move_group(g_id, Point::new(1_000.0, 2_000.0)));
    assert_eq!(engine.board().covers.find(a_id).unwrap().pos, Point::new(1_010.0, 2_010.0));
    assert_eq!(engine.contained_in(g_id), vec![EntityRef::Cover(a_id)]);
}

#[test]
fn remove_group_cascades() {
    let (mut engine, _) = engine();
    let g = group_at(0.0, 0.0, 3.0);
    let a = cover_at(10.0, 10.0);
    let (g_id, a_id) = (g.id, a.id);
    engine.add_groups(vec![g]).unwrap();
    engine.add_covers(vec![a]).unwrap();
    assert!(engine.remove_group(g_id));
    assert!(engine.resolve(a_id).is_none());
}

#[test]
fn refresh_changes_draw_order_only() {
    let (mut engine, _) = engine();
    let (a, b) = (cover_at(0.0, 0.0), cover_at(400.0, 0.0));
    let a_id = a.id;
    engine.add_covers(vec![a, b]).unwrap();
    let before = engine.board().clone();
    assert!(engine.refresh_cover(a_id));
    assert_eq!(engine.board().covers.list()[1].id, a_id);
    assert!(engine.board().same_content(&before));
    assert!(!engine.refresh_cover(Uuid::new_v4()));
}

#[test]
fn config_size_change_reclamps_positions() {
    let (mut engine, _) = engine();
    let a = cover_at(9_800.0, 0.0);
    let id = a.id;
    engine.add_covers(vec![a]).unwrap();
    assert!(engine.update_config(&ConfigPatch { size: Some(2.0), ..ConfigPatch::default() }).unwrap());
    assert_eq!(engine.board().covers.find(id).unwrap().pos.x, 9_700.0);
    assert!(!engine.update_config(&ConfigPatch { size: Some(2.0), ..ConfigPatch::default() }).unwrap());
}

#[test]
fn from_board_reads_history_policy_from_env() {
    let engine = BoardEngine::from_board(Board::default());
    assert_eq!(engine.history().policy(), HistoryPolicy::from_env());
}

// =============================================================
// Patch validation
// =============================================================

#[test]
fn overlong_cover_title_is_rejected_and_rolled_back() {
    let (mut engine, _) = engine();
    let a = cover_at(10.0, 10.0);
    let id = a.id;
    engine.add_covers(vec![a]).unwrap();
    let before = engine.board().clone();
    let log = record_changes(&mut engine, &[Slice::Covers]);

    let patch = CoverPatch {
        pos: Some(Point::new(500.0, 500.0)),
        title: Some(SearchLabelPatch { text: Some("x".repeat(MAX_TEXT_LEN + 1)), ..SearchLabelPatch::default() }),
        ..CoverPatch::default()
    };
    let err = engine.update_cover(id, &patch).unwrap_err();
    assert_eq!(err.issues()[0].path, "covers.0.title.text");
    assert_eq!(engine.board(), &before);
    assert!(log.borrow().is_empty());
    assert_eq!(engine.history().len(), 1);

    let mut saves = Saves::new(MemoryStorage::new());
    saves.store(Some("default"), engine.board()).unwrap();
    assert_eq!(saves.load(Some("default")).unwrap().covers.len(), 1);
}

#[test]
fn overlong_group_and_arrow_labels_are_rejected() {
    let (mut engine, _) = engine();
    let (a, b) = (cover_at(0.0, 0.0), cover_at(400.0, 0.0));
    let g = group_at(2_000.0, 2_000.0, 2.0);
    let (a_id, b_id, g_id) = (a.id, b.id, g.id);
    engine.add_covers(vec![a, b]).unwrap();
    engine.add_groups(vec![g]).unwrap();
    let arrow = Arrow::new(Endpoint::new(a_id, Dir::Right), Endpoint::new(b_id, Dir::Left), Dir::Bottom);
    let arrow_id = arrow.id;
    engine.add_arrows(vec![arrow]).unwrap();
    let before = engine.board().clone();
    let long = Some(LabelPatch { text: Some("y".repeat(MAX_TEXT_LEN + 1)), dir: None });

    let group_patch = GroupPatch { scale: Some(Scale::new(3.0, 3.0)), subtitle: long.clone(), ..GroupPatch::default() };
    assert!(engine.update_group(g_id, &group_patch).is_err());
    assert!(engine.update_arrow(arrow_id, &ArrowPatch { title: long, ..ArrowPatch::default() }).is_err());
    assert_eq!(engine.board(), &before);
}

#[test]
fn non_hex_color_is_rejected() {
    let (mut engine, _) = engine();
    let err = engine
        .update_config(&ConfigPatch { color: Some("red".into()), title: Some("Kept?".into()), ..ConfigPatch::default() })
        .unwrap_err();
    assert_eq!(err.issues()[0].path, "configs.color");
    assert_eq!(engine.board().configs, Config::default());
    assert!(!engine.can_undo());

    assert!(engine.update_config(&ConfigPatch { color: Some("#ff8800".into()), ..ConfigPatch::default() }).unwrap());
    let exported = engine.export_json().unwrap();
    assert!(schema::import_json(&exported).is_ok());
}

// =============================================================
// Connector
// =============================================================

#[test]
fn click_anchor_publishes_pending_and_arrow_changes() {
    let (mut engine, _) = engine();
    let (a, b) = (cover_at(0.0, 0.0), cover_at(400.0, 0.0));
    let (a_id, b_id) = (a.id, b.id);
    engine.add_covers(vec![a, b]).unwrap();
    let log = record_changes(&mut engine, &[Slice::Connector, Slice::Arrows]);

    engine.click_anchor(a_id, Dir::Right).unwrap();
    assert_eq!(engine.pending_origin(), Some(Endpoint::new(a_id, Dir::Right)));
    let ConnectOutcome::Created(arrow_id) = engine.click_anchor(b_id, Dir::Left).unwrap() else {
        panic!("expected a new arrow");
    };
    assert_eq!(
        *log.borrow(),
        [
            Change::PendingOriginChanged(Some(Endpoint::new(a_id, Dir::Right))),
            Change::PendingOriginChanged(None),
            Change::ArrowAdded(arrow_id),
        ]
    );
    assert!(engine.connector(arrow_id).is_some());
}

#[test]
fn cancel_connection_clears_pending() {
    let (mut engine, _) = engine();
    let a = cover_at(0.0, 0.0);
    let a_id = a.id;
    engine.add_covers(vec![a]).unwrap();
    engine.click_anchor(a_id, Dir::Top).unwrap();
    assert!(engine.cancel_connection());
    assert!(engine.pending_origin().is_none());
    assert!(!engine.cancel_connection());
}

// =============================================================
// Subscriptions
// =============================================================

#[test]
fn subscribers_only_see_their_slices() {
    let (mut engine, _) = engine();
    let covers_log = record_changes(&mut engine, &[Slice::Covers]);
    let groups_log = record_changes(&mut engine, &[Slice::Groups]);
    let a = cover_at(0.0, 0.0);
    let a_id = a.id;
    engine.add_covers(vec![a]).unwrap();
    assert_eq!(*covers_log.borrow(), [Change::CoverAdded(a_id)]);
    assert!(groups_log.borrow().is_empty());

    engine.reset();
    assert_eq!(groups_log.borrow().last(), Some(&Change::BoardReplaced));
}

#[test]
fn unsubscribe_stops_delivery() {
    let (mut engine, _) = engine();
    let log = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&log);
    let id = engine.subscribe(&[Slice::Covers], move |_| *sink.borrow_mut() += 1);
    assert!(engine.unsubscribe(id));
    assert!(!engine.unsubscribe(id));
    engine.add_covers(vec![cover_at(0.0, 0.0)]).unwrap();
    assert_eq!(*log.borrow(), 0);
}

// =============================================================
// History
// =============================================================

#[test]
fn undo_round_trip_restores_whole_board() {
    let (mut engine, clock) = engine();
    let (a, b) = (cover_at(0.0, 0.0), cover_at(400.0, 0.0));
    let (a_id, b_id) = (a.id, b.id);
    engine.add_covers(vec![a, b]).unwrap();
    engine
        .add_arrows(vec![Arrow::new(Endpoint::new(a_id, Dir::Right), Endpoint::new(b_id, Dir::Left), Dir::Bottom)])
        .unwrap();
    let snapshot = engine.board().clone();
    clock.advance(1_000);

    engine.remove_cover(a_id);
    assert!(engine.board().arrows.is_empty());
    assert!(engine.undo());
    assert!(engine.board().same_content(&snapshot));

    assert!(engine.redo());
    assert!(engine.resolve(a_id).is_none());
}

#[test]
fn drag_burst_undoes_in_one_step() {
    let (mut engine, clock) = engine();
    let a = cover_at(0.0, 0.0);
    let id = a.id;
    engine.add_covers(vec![a]).unwrap();
    clock.advance(1_000);
    for step in 1..=10 {
        engine.move_cover(id, Point::new(f64::from(step) * 10.0, 0.0));
        clock.advance(16);
    }
    assert!(engine.undo());
    assert_eq!(engine.board().covers.find(id).unwrap().pos, Point::new(0.0, 0.0));
}

#[test]
fn new_mutation_clears_redo() {
    let (mut engine, clock) = engine();
    engine.add_covers(vec![cover_at(0.0, 0.0)]).unwrap();
    clock.advance(1_000);
    engine.add_covers(vec![cover_at(400.0, 0.0)]).unwrap();
    assert!(engine.undo());
    assert!(engine.can_redo());
    clock.advance(1_000);
    engine.add_covers(vec![cover_at(800.0, 0.0)]).unwrap();
    assert!(!engine.can_redo());
    assert!(!engine.redo());
}

#[test]
fn undo_on_fresh_engine_is_noop() {
    let (mut engine, _) = engine();
    assert!(!engine.undo());
    assert_eq!(*engine.board(), Board::default());
}

// =============================================================
// Import / export
// =============================================================

#[test]
fn rejected_import_leaves_board_untouched() {
    let (mut engine, _) = engine();
    engine.add_covers(vec![cover_at(0.0, 0.0)]).unwrap();
    let before = engine.board().clone();
    let raw = r#"{"covers":[{"id":"nope"}],"groups":[],"arrows":[]}"#;
    assert!(engine.import_json(raw).is_err());
    assert_eq!(*engine.board(), before);
}

#[test]
fn import_replaces_board_and_is_undoable() {
    let (mut source, _) = engine();
    source.add_covers(vec![cover_at(50.0, 50.0), cover_at(400.0, 50.0)]).unwrap();
    let exported = source.export_json().unwrap();

    let (mut target, clock) = engine();
    target.add_covers(vec![cover_at(0.0, 0.0)]).unwrap();
    clock.advance(1_000);
    target.import_json(&exported).unwrap();
    assert_eq!(target.board(), source.board());
    assert!(target.undo());
    assert_eq!(target.board().covers.len(), 1);
}

// =============================================================
// Search ingest
// =============================================================

#[test]
fn search_results_land_on_free_slots_in_query_order() {
    let (mut engine, _) = engine();
    let blocker = cover_at(INGEST_GAP, INGEST_GAP);
    engine.add_covers(vec![blocker]).unwrap();
    let results = vec![
        SearchResult { link: "l1".into(), title: "second".into(), subtitle: String::new(), index: 1 },
        SearchResult { link: "l0".into(), title: "first".into(), subtitle: String::new(), index: 0 },
    ];
    let ingest = engine.add_search_results(&results).unwrap();
    assert!(ingest.rejected.is_empty());
    let ids = ingest.added;
    assert_eq!(ids.len(), 2);

    let first = engine.board().covers.find(ids[0]).unwrap();
    assert_eq!(first.title.text, "first");
    assert_eq!(first.link, "l0");
    let base = engine.cover_size();
    assert_eq!(first.pos, Point::new(INGEST_GAP + base.width + INGEST_GAP, INGEST_GAP));

    let boxes: Vec<BoundingBox> = engine
        .board()
        .covers
        .iter()
        .map(|c| geometry::bounding_box(c, base))
        .collect();
    for (i, a) in boxes.iter().enumerate() {
        for b in &boxes[i + 1..] {
            assert!(!a.overlaps(b));
        }
    }
}

#[test]
fn search_results_respect_cover_bound() {
    let (mut engine, _) = engine();
    let results: Vec<SearchResult> = (0..=MAX_COVERS)
        .map(|index| SearchResult { link: String::new(), title: format!("t{index}"), subtitle: String::new(), index })
        .collect();
    assert!(engine.add_search_results(&results).is_err());
    assert!(engine.board().covers.is_empty());
}

#[test]
fn invalid_search_hit_is_skipped_not_fatal() {
    let (mut engine, _) = engine();
    let results = vec![
        SearchResult { link: "l0".into(), title: "ok".into(), subtitle: String::new(), index: 0 },
        SearchResult { link: "l1".into(), title: "z".repeat(MAX_TEXT_LEN + 1), subtitle: String::new(), index: 1 },
        SearchResult { link: "l2".into(), title: "also ok".into(), subtitle: String::new(), index: 2 },
    ];
    let ingest = engine.add_search_results(&results).unwrap();
    assert_eq!(ingest.added.len(), 2);
    assert_eq!(ingest.rejected.len(), 1);
    assert_eq!(ingest.rejected[0].0, 1);
    assert_eq!(ingest.rejected[0].1.issues()[0].path, "results.1.title.text");
    let titles: Vec<&str> = engine.board().covers.iter().map(|c| c.title.text.as_str()).collect();
    assert_eq!(titles, ["ok", "also ok"]);
}

#[test]
fn all_invalid_hits_change_nothing() {
    let (mut engine, _) = engine();
    let results =
        vec![SearchResult { link: String::new(), title: "z".repeat(MAX_TEXT_LEN + 1), subtitle: String::new(), index: 0 }];
    let ingest = engine.add_search_results(&results).unwrap();
    assert!(ingest.added.is_empty());
    assert!(!engine.can_undo());
}
