//! Bounded undo/redo over whole-board snapshots.
//!
//! DESIGN
//! ======
//! `past` holds the board as it was before each recorded edit, oldest first,
//! and never grows past `capacity`. Edits that land within `debounce_ms` of
//! the previous one are coalesced into the same snapshot, so a drag or a
//! burst of typing undoes in one step. A run stops coalescing after
//! `max_coalesced` edits so a long continuous gesture still leaves history.
//!
//! Time comes from a `Clock` so tests control the debounce window.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::consts::{HISTORY_DEBOUNCE_MS, HISTORY_DEPTH, HISTORY_MAX_COALESCED};
use crate::doc::Board;

// =============================================================================
// CLOCK
// =============================================================================

/// Millisecond time source.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Wall-clock time since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start_ms: u64) -> Self {
        Self { now: Rc::new(Cell::new(start_ms)) }
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get().saturating_add(ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

// =============================================================================
// POLICY
// =============================================================================

/// History tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryPolicy {
    /// Maximum number of undo steps kept.
    pub capacity: usize,
    /// Edits closer together than this coalesce into one step.
    pub debounce_ms: u64,
    /// Maximum edits folded into one step.
    pub max_coalesced: usize,
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self { capacity: HISTORY_DEPTH, debounce_ms: HISTORY_DEBOUNCE_MS, max_coalesced: HISTORY_MAX_COALESCED }
    }
}

impl HistoryPolicy {
    /// Defaults overridden by `BOARD_HISTORY_DEPTH`,
    /// `BOARD_HISTORY_DEBOUNCE_MS`, and `BOARD_HISTORY_MAX_COALESCED`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| match std::env::var(key) {
            Ok(value) => Some(value),
            Err(_) => None,
        })
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    /// Unparseable values fall back to the default. Capacity is at least 1.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            capacity: env_parse(&lookup, "BOARD_HISTORY_DEPTH", defaults.capacity).max(1),
            debounce_ms: env_parse(&lookup, "BOARD_HISTORY_DEBOUNCE_MS", defaults.debounce_ms),
            max_coalesced: env_parse(&lookup, "BOARD_HISTORY_MAX_COALESCED", defaults.max_coalesced).max(1),
        }
    }
}

fn env_parse<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key).map(|raw| raw.trim().parse::<T>()) {
        Some(Ok(value)) => value,
        _ => default,
    }
}

// =============================================================================
// HISTORY
// =============================================================================

/// Undo and redo stacks of board snapshots.
#[derive(Debug, Clone, Default)]
pub struct History {
    policy: HistoryPolicy,
    past: VecDeque<Board>,
    future: Vec<Board>,
    last_recorded_ms: Option<u64>,
    coalesced: usize,
}

impl History {
    #[must_use]
    pub fn new(policy: HistoryPolicy) -> Self {
        Self { policy, ..Self::default() }
    }

    #[must_use]
    pub fn policy(&self) -> HistoryPolicy {
        self.policy
    }

    /// Record that the board went from `before` to `after` at `now_ms`.
    ///
    /// Returns whether a new undo step was pushed. No-op edits record
    /// nothing; edits inside the debounce window extend the current step.
    pub fn record(&mut self, before: &Board, after: &Board, now_ms: u64) -> bool {
        if before.same_content(after) {
            return false;
        }
        self.future.clear();

        let within_window = self
            .last_recorded_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < self.policy.debounce_ms);
        self.last_recorded_ms = Some(now_ms);

        if within_window && !self.past.is_empty() && self.coalesced < self.policy.max_coalesced {
            self.coalesced += 1;
            return false;
        }

        self.coalesced = 1;
        if self.past.back().is_some_and(|newest| newest.same_content(before)) {
            return false;
        }
        self.past.push_back(before.clone());
        while self.past.len() > self.policy.capacity {
            self.past.pop_front();
        }
        true
    }

    /// End the current coalescing run so the next edit starts a new step.
    pub fn seal(&mut self) {
        self.last_recorded_ms = None;
        self.coalesced = 0;
    }

    /// Step back. Returns the board to restore, stashing `current` for redo.
    pub fn undo(&mut self, current: &Board) -> Option<Board> {
        let previous = self.past.pop_back()?;
        self.future.push(current.clone());
        self.seal();
        Some(previous)
    }

    /// Step forward. Returns the board to restore, stashing `current` for undo.
    pub fn redo(&mut self, current: &Board) -> Option<Board> {
        let next = self.future.pop()?;
        self.past.push_back(current.clone());
        while self.past.len() > self.policy.capacity {
            self.past.pop_front();
        }
        self.seal();
        Some(next)
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
        self.seal();
    }

    /// Number of undo steps available.
    #[must_use]
    pub fn len(&self) -> usize {
        self.past.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.past.is_empty()
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }
}
