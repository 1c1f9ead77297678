#![allow(clippy::float_cmp)]

use super::*;
use crate::doc::{Config, Cover};
use crate::geometry::Point;

// =============================================================
// Helpers
// =============================================================

/// A board whose content is identified by `n` (a cover at x = n).
fn board(n: u32) -> Board {
    let mut board = Board::new();
    board
        .covers
        .extend(vec![Cover::new("c", "", "", Point::new(f64::from(n), 0.0), &Config::default())]);
    board
}

fn x_of(board: &Board) -> f64 {
    board.covers.list()[0].pos.x
}

fn policy(capacity: usize, debounce_ms: u64, max_coalesced: usize) -> HistoryPolicy {
    HistoryPolicy { capacity, debounce_ms, max_coalesced }
}

// =============================================================
// Recording
// =============================================================

#[test]
fn no_op_edits_are_not_recorded() {
    let mut history = History::new(HistoryPolicy::default());
    let b = board(1);
    assert!(!history.record(&b, &b.clone(), 0));
    assert!(!history.can_undo());
}

#[test]
fn edits_outside_window_each_record() {
    let mut history = History::new(policy(10, 300, 50));
    let states: Vec<Board> = (0..4).map(board).collect();
    for (i, pair) in states.windows(2).enumerate() {
        assert!(history.record(&pair[0], &pair[1], i as u64 * 1_000));
    }
    assert_eq!(history.len(), 3);
}

#[test]
fn burst_inside_window_coalesces_to_state_before_burst() {
    let mut history = History::new(policy(10, 300, 50));
    let states: Vec<Board> = (0..5).map(board).collect();
    for (i, pair) in states.windows(2).enumerate() {
        history.record(&pair[0], &pair[1], i as u64 * 100);
    }
    assert_eq!(history.len(), 1);
    let restored = history.undo(&states[4]).unwrap();
    assert_eq!(x_of(&restored), 0.0);
}

#[test]
fn max_coalesced_forces_new_entry() {
    let mut history = History::new(policy(10, 300, 3));
    let states: Vec<Board> = (0..8).map(board).collect();
    for pair in states.windows(2) {
        history.record(&pair[0], &pair[1], 0);
    }
    // Seven edits at the same instant, three per entry.
    assert_eq!(history.len(), 3);
}

#[test]
fn capacity_evicts_oldest() {
    let mut history = History::new(policy(3, 0, 50));
    let states: Vec<Board> = (0..6).map(board).collect();
    for (i, pair) in states.windows(2).enumerate() {
        history.record(&pair[0], &pair[1], i as u64 * 1_000);
    }
    assert_eq!(history.len(), 3);
    let mut current = states[5].clone();
    let mut seen = Vec::new();
    while let Some(previous) = history.undo(&current) {
        seen.push(x_of(&previous));
        current = previous;
    }
    assert_eq!(seen, [4.0, 3.0, 2.0]);
}

#[test]
fn duplicate_of_newest_entry_is_skipped() {
    let mut history = History::new(policy(10, 0, 50));
    let (a, b) = (board(1), board(2));
    history.record(&a, &b, 0);
    history.record(&a, &b, 1_000);
    assert_eq!(history.len(), 1);
}

// =============================================================
// Undo / redo
// =============================================================

#[test]
fn undo_on_empty_is_noop() {
    let mut history = History::new(HistoryPolicy::default());
    assert!(history.undo(&board(0)).is_none());
    assert!(history.redo(&board(0)).is_none());
}

#[test]
fn redo_restores_undone_state() {
    let mut history = History::new(HistoryPolicy::default());
    let (a, b) = (board(1), board(2));
    history.record(&a, &b, 0);

    let undone = history.undo(&b).unwrap();
    assert_eq!(x_of(&undone), 1.0);
    assert!(history.can_redo());
    let redone = history.redo(&undone).unwrap();
    assert_eq!(x_of(&redone), 2.0);
    assert!(history.can_undo());
}

#[test]
fn new_edit_clears_redo() {
    let mut history = History::new(HistoryPolicy::default());
    let (a, b, c) = (board(1), board(2), board(3));
    history.record(&a, &b, 0);
    let undone = history.undo(&b).unwrap();
    history.record(&undone, &c, 10);
    assert!(!history.can_redo());
}

#[test]
fn undo_seals_coalescing_window() {
    let mut history = History::new(policy(10, 300, 50));
    let (a, b, c) = (board(1), board(2), board(3));
    history.record(&a, &b, 0);
    let undone = history.undo(&b).unwrap();
    assert!(history.record(&undone, &c, 10));
}

// =============================================================
// Policy
// =============================================================

#[test]
fn policy_defaults() {
    let p = HistoryPolicy::default();
    assert_eq!((p.capacity, p.debounce_ms, p.max_coalesced), (10, 300, 50));
}

#[test]
fn policy_from_lookup_overrides_and_falls_back() {
    let p = HistoryPolicy::from_lookup(|key| match key {
        "BOARD_HISTORY_DEPTH" => Some(" 25 ".to_owned()),
        "BOARD_HISTORY_DEBOUNCE_MS" => Some("soon".to_owned()),
        "BOARD_HISTORY_MAX_COALESCED" => Some("0".to_owned()),
        _ => None,
    });
    assert_eq!(p.capacity, 25);
    assert_eq!(p.debounce_ms, 300);
    assert_eq!(p.max_coalesced, 1);
}

#[test]
fn manual_clock_clones_share_time() {
    let clock = ManualClock::new(100);
    let other = clock.clone();
    clock.advance(50);
    assert_eq!(other.now_ms(), 150);
    other.set(7);
    assert_eq!(clock.now_ms(), 7);
}
