//! Board engine: the single owner of board state.
//!
//! DESIGN
//! ======
//! Callers never touch the `Board` directly. Every command goes through the
//! engine, which runs the cascade for it, records the prior snapshot in
//! history, and fans the resulting `Change`s out to subscribers. Reads go
//! through selectors that compute geometry from the current state on demand.
//!
//! Subscribers register for a set of `Slice`s and only see changes in those
//! slices. `BoardReplaced` (undo, redo, import, reset) reaches everyone.
//!
//! ERROR HANDLING
//! ==============
//! Adds and imports validate first and leave state untouched on failure.
//! Patches are merged, the touched entity or config is re-validated, and the
//! board is rolled back if it no longer passes. Commands addressing an
//! unknown id return `false` and change nothing.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use tracing::{debug, info};

use crate::cascade;
use crate::connect::{ConnectOutcome, Connector};
use crate::consts::{INGEST_COLUMNS, INGEST_GAP, MAX_COVERS};
use crate::doc::{
    Arrow, ArrowPatch, Board, ConfigPatch, Cover, CoverPatch, Dir, Endpoint, EntityId, EntityRef, Group, GroupPatch,
    Scale,
};
use crate::geometry::{self, BoundingBox, ConnectorGeometry, Placed, Point, Size};
use crate::history::{Clock, History, HistoryPolicy, SystemClock};
use crate::schema::{self, ImportError};
use crate::search::SearchResult;
use crate::store::check_entity;
use crate::validation::{Report, ValidationError};

// =============================================================================
// CHANGES
// =============================================================================

/// One observable effect of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    CoverAdded(EntityId),
    CoverUpdated(EntityId),
    CoverRemoved(EntityId),
    GroupAdded(EntityId),
    GroupUpdated(EntityId),
    GroupRemoved(EntityId),
    ArrowAdded(EntityId),
    ArrowUpdated(EntityId),
    ArrowRemoved(EntityId),
    ConfigUpdated,
    /// The whole board was swapped out (undo, redo, import, reset).
    BoardReplaced,
    /// The pending connection origin was set or cleared.
    PendingOriginChanged(Option<Endpoint>),
}

/// Part of the state a subscriber can listen to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slice {
    Covers,
    Groups,
    Arrows,
    Config,
    Connector,
}

impl Change {
    /// The slice this change belongs to, or `None` for whole-board changes.
    #[must_use]
    pub fn slice(&self) -> Option<Slice> {
        match self {
            Self::CoverAdded(_) | Self::CoverUpdated(_) | Self::CoverRemoved(_) => Some(Slice::Covers),
            Self::GroupAdded(_) | Self::GroupUpdated(_) | Self::GroupRemoved(_) => Some(Slice::Groups),
            Self::ArrowAdded(_) | Self::ArrowUpdated(_) | Self::ArrowRemoved(_) => Some(Slice::Arrows),
            Self::ConfigUpdated => Some(Slice::Config),
            Self::PendingOriginChanged(_) => Some(Slice::Connector),
            Self::BoardReplaced => None,
        }
    }

    fn matches(&self, slices: &[Slice]) -> bool {
        self.slice().is_none_or(|slice| slices.contains(&slice))
    }
}

/// Handle returned by [`BoardEngine::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    slices: Vec<Slice>,
    callback: Box<dyn FnMut(&Change)>,
}

// =============================================================================
// ENGINE
// =============================================================================

/// Owns a board and everything needed to edit it.
pub struct BoardEngine {
    board: Board,
    history: History,
    clock: Box<dyn Clock>,
    connector: Connector,
    subscribers: Vec<Subscriber>,
    next_subscription: u64,
}

impl Default for BoardEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BoardEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardEngine")
            .field("board", &self.board)
            .field("history", &self.history.len())
            .field("pending", &self.connector.pending())
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}

impl BoardEngine {
    /// An engine over an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::from_board(Board::default())
    }

    /// An engine over `board` with the history policy read from the environment.
    #[must_use]
    pub fn from_board(board: Board) -> Self {
        Self::with_parts(board, HistoryPolicy::from_env(), Box::new(SystemClock))
    }

    /// An engine with explicit history policy and clock.
    #[must_use]
    pub fn with_parts(board: Board, policy: HistoryPolicy, clock: Box<dyn Clock>) -> Self {
        Self {
            board,
            history: History::new(policy),
            clock,
            connector: Connector::new(),
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    // =========================================================================
    // SUBSCRIPTIONS
    // =========================================================================

    /// Call `callback` for every future change in any of `slices`.
    pub fn subscribe<F>(&mut self, slices: &[Slice], callback: F) -> SubscriptionId
    where
        F: FnMut(&Change) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push(Subscriber { id, slices: slices.to_vec(), callback: Box::new(callback) });
        id
    }

    /// Stop a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    fn notify(&mut self, changes: &[Change]) {
        for subscriber in &mut self.subscribers {
            for change in changes.iter().filter(|c| c.matches(&subscriber.slices)) {
                (subscriber.callback)(change);
            }
        }
    }

    /// Record `before` in history and publish `changes`. Empty means nothing happened.
    fn commit(&mut self, before: &Board, changes: &[Change]) -> bool {
        if changes.is_empty() {
            return false;
        }
        let now = self.clock.now_ms();
        self.history.record(before, &self.board, now);
        self.notify(changes);
        true
    }

    // =========================================================================
    // COVERS
    // =========================================================================

    /// Validate and append covers. All or nothing.
    ///
    /// # Errors
    ///
    /// Returns every failing field; the board is unchanged.
    pub fn add_covers(&mut self, covers: Vec<Cover>) -> Result<(), ValidationError> {
        let before = self.board.clone();
        let changes: Vec<Change> = covers.iter().map(|c| Change::CoverAdded(c.id)).collect();
        self.board.add_covers(covers)?;
        self.commit(&before, &changes);
        Ok(())
    }

    /// Merge a patch into a cover. A new position runs the move cascade.
    ///
    /// # Errors
    ///
    /// Returns the failing fields when the patched cover would not pass
    /// import validation; the board is unchanged.
    pub fn update_cover(&mut self, id: EntityId, patch: &CoverPatch) -> Result<bool, ValidationError> {
        if !self.board.covers.exists(id) {
            return Ok(false);
        }
        let before = self.board.clone();
        let base = self.board.cover_size();
        let mut changes = Vec::new();
        if let Some(pos) = patch.pos {
            changes.extend(cascade::move_cover(&mut self.board, id, pos, base));
        }
        let rest = CoverPatch { pos: None, ..patch.clone() };
        if rest != CoverPatch::default() && self.board.covers.update(id, &rest) {
            push_unique(&mut changes, Change::CoverUpdated(id));
        }
        if let Err(err) = self.board.covers.check_stored(id, &self.board.schema()) {
            self.rollback(before, &err);
            return Err(err);
        }
        Ok(self.commit(&before, &changes))
    }

    /// Move a cover, severing arrows to groups it entered or left.
    pub fn move_cover(&mut self, id: EntityId, to: Point) -> bool {
        let before = self.board.clone();
        let base = self.board.cover_size();
        let changes = cascade::move_cover(&mut self.board, id, to, base);
        self.commit(&before, &changes)
    }

    /// Delete a cover and its arrows.
    pub fn remove_cover(&mut self, id: EntityId) -> bool {
        let before = self.board.clone();
        let changes = cascade::delete_cover(&mut self.board, id);
        self.commit(&before, &changes)
    }

    /// Bring a cover to the front of the draw order.
    pub fn refresh_cover(&mut self, id: EntityId) -> bool {
        let before = self.board.clone();
        let changes = if self.board.covers.refresh(id) { vec![Change::CoverUpdated(id)] } else { Vec::new() };
        self.commit(&before, &changes)
    }

    // =========================================================================
    // GROUPS
    // =========================================================================

    /// Validate and append groups. All or nothing.
    ///
    /// # Errors
    ///
    /// Returns every failing field; the board is unchanged.
    pub fn add_groups(&mut self, groups: Vec<Group>) -> Result<(), ValidationError> {
        let before = self.board.clone();
        let changes: Vec<Change> = groups.iter().map(|g| Change::GroupAdded(g.id)).collect();
        self.board.add_groups(groups)?;
        self.commit(&before, &changes);
        Ok(())
    }

    /// Merge a patch into a group. A new scale runs the rescale cascade, then
    /// a new position runs the move cascade.
    ///
    /// # Errors
    ///
    /// Returns the failing fields when the patched group would not pass
    /// import validation; the board is unchanged.
    pub fn update_group(&mut self, id: EntityId, patch: &GroupPatch) -> Result<bool, ValidationError> {
        if !self.board.groups.exists(id) {
            return Ok(false);
        }
        let before = self.board.clone();
        let base = self.board.cover_size();
        let mut changes = Vec::new();
        if let Some(scale) = patch.scale {
            changes.extend(cascade::rescale_group(&mut self.board, id, scale, base));
        }
        if let Some(pos) = patch.pos {
            for change in cascade::move_group(&mut self.board, id, pos, base) {
                push_unique(&mut changes, change);
            }
        }
        let rest = GroupPatch { pos: None, scale: None, ..patch.clone() };
        if rest != GroupPatch::default() && self.board.groups.update(id, &rest) {
            push_unique(&mut changes, Change::GroupUpdated(id));
        }
        if let Err(err) = self.board.groups.check_stored(id, &self.board.schema()) {
            self.rollback(before, &err);
            return Err(err);
        }
        Ok(self.commit(&before, &changes))
    }

    /// Move a group together with everything inside it.
    pub fn move_group(&mut self, id: EntityId, to: Point) -> bool {
        let before = self.board.clone();
        let base = self.board.cover_size();
        let changes = cascade::move_group(&mut self.board, id, to, base);
        self.commit(&before, &changes)
    }

    /// Rescale a group around its center.
    pub fn rescale_group(&mut self, id: EntityId, scale: Scale) -> bool {
        let before = self.board.clone();
        let base = self.board.cover_size();
        let changes = cascade::rescale_group(&mut self.board, id, scale, base);
        self.commit(&before, &changes)
    }

    /// Delete a group, its contents, and every arrow touching them.
    pub fn remove_group(&mut self, id: EntityId) -> bool {
        let before = self.board.clone();
        let base = self.board.cover_size();
        let changes = cascade::delete_group(&mut self.board, id, base);
        self.commit(&before, &changes)
    }

    /// Bring a group to the front of the draw order.
    pub fn refresh_group(&mut self, id: EntityId) -> bool {
        let before = self.board.clone();
        let changes = if self.board.groups.refresh(id) { vec![Change::GroupUpdated(id)] } else { Vec::new() };
        self.commit(&before, &changes)
    }

    // =========================================================================
    // ARROWS
    // =========================================================================

    /// Validate and append arrows. All or nothing.
    ///
    /// # Errors
    ///
    /// Returns every failing field, including duplicate pairs, self links,
    /// and unknown endpoints; the board is unchanged.
    pub fn add_arrows(&mut self, arrows: Vec<Arrow>) -> Result<(), ValidationError> {
        let before = self.board.clone();
        let changes: Vec<Change> = arrows.iter().map(|a| Change::ArrowAdded(a.id)).collect();
        self.board.add_arrows(arrows)?;
        self.commit(&before, &changes);
        Ok(())
    }

    /// Merge a patch into an arrow's label or endpoint sides.
    ///
    /// # Errors
    ///
    /// Returns the failing fields when the patched arrow would not pass
    /// import validation; the board is unchanged.
    pub fn update_arrow(&mut self, id: EntityId, patch: &ArrowPatch) -> Result<bool, ValidationError> {
        let before = self.board.clone();
        if !self.board.arrows.update(id, patch) {
            return Ok(false);
        }
        if let Err(err) = self.board.arrows.check_stored(id, &self.board.schema()) {
            self.rollback(before, &err);
            return Err(err);
        }
        Ok(self.commit(&before, &[Change::ArrowUpdated(id)]))
    }

    pub fn remove_arrow(&mut self, id: EntityId) -> bool {
        let before = self.board.clone();
        let changes = match self.board.arrows.remove(id) {
            Some(_) => vec![Change::ArrowRemoved(id)],
            None => Vec::new(),
        };
        self.commit(&before, &changes)
    }

    /// Feed one anchor click into the two-click connect protocol.
    ///
    /// # Errors
    ///
    /// Returns the validation error when a new arrow cannot be inserted.
    pub fn click_anchor(&mut self, id: EntityId, dir: Dir) -> Result<ConnectOutcome, ValidationError> {
        let before = self.board.clone();
        let pending_before = self.connector.pending();
        let outcome = self.connector.click(&mut self.board, id, dir);
        let mut changes = Vec::new();
        if self.connector.pending() != pending_before {
            changes.push(Change::PendingOriginChanged(self.connector.pending()));
        }
        match &outcome {
            Ok(ConnectOutcome::Created(arrow)) => changes.push(Change::ArrowAdded(*arrow)),
            Ok(ConnectOutcome::Updated(arrow)) => changes.push(Change::ArrowUpdated(*arrow)),
            _ => {}
        }
        self.commit(&before, &changes);
        outcome
    }

    #[must_use]
    pub fn pending_origin(&self) -> Option<Endpoint> {
        self.connector.pending()
    }

    /// Abandon a half-made connection.
    pub fn cancel_connection(&mut self) -> bool {
        if self.connector.cancel().is_none() {
            return false;
        }
        self.notify(&[Change::PendingOriginChanged(None)]);
        true
    }

    // =========================================================================
    // CONFIG AND WHOLE BOARD
    // =========================================================================

    /// Merge a config patch. When the cover size changes, positions are
    /// re-clamped so every box stays on the board.
    ///
    /// # Errors
    ///
    /// Returns the failing fields when the patched config would not pass
    /// import validation, e.g. a color that is not hex; the board is unchanged.
    pub fn update_config(&mut self, patch: &ConfigPatch) -> Result<bool, ValidationError> {
        let before = self.board.clone();
        self.board.configs.apply_patch(patch);
        if self.board.configs == before.configs {
            return Ok(false);
        }
        if let Err(err) = schema::validate_config(&self.board.configs) {
            self.rollback(before, &err);
            return Err(err);
        }
        let mut changes = vec![Change::ConfigUpdated];
        if self.board.cover_size() != before.cover_size() {
            changes.extend(self.reclamp_positions());
        }
        Ok(self.commit(&before, &changes))
    }

    fn rollback(&mut self, before: Board, err: &ValidationError) {
        debug!(error = %err, "rejected patch");
        self.board = before;
    }

    fn reclamp_positions(&mut self) -> Vec<Change> {
        let base = self.board.cover_size();
        let mut changes = Vec::new();
        for cover in self.board.covers.iter_mut() {
            let pos = geometry::clamp_position(cover.pos, cover.extent(base));
            if pos != cover.pos {
                cover.pos = pos;
                changes.push(Change::CoverUpdated(cover.id));
            }
        }
        for group in self.board.groups.iter_mut() {
            let pos = geometry::clamp_position(group.pos, group.extent(base));
            if pos != group.pos {
                group.pos = pos;
                changes.push(Change::GroupUpdated(group.id));
            }
        }
        changes
    }

    /// Replace the board with an empty one. Undoable.
    pub fn reset(&mut self) -> bool {
        self.replace(Board::default())
    }

    /// Replace the whole board with an already-validated one. Undoable.
    pub fn replace(&mut self, board: Board) -> bool {
        let before = std::mem::replace(&mut self.board, board);
        self.connector.cancel();
        self.commit(&before, &[Change::BoardReplaced])
    }

    /// Validate an untrusted blob and replace the board with it. Undoable.
    ///
    /// # Errors
    ///
    /// Returns why the blob was rejected; the board is unchanged.
    pub fn import_json(&mut self, raw: &str) -> Result<(), ImportError> {
        let board = schema::import_json(raw)?;
        info!(
            covers = board.covers.len(),
            groups = board.groups.len(),
            arrows = board.arrows.len(),
            "imported board"
        );
        self.replace(board);
        Ok(())
    }

    /// Current board as a pretty JSON record.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        schema::export_json(&self.board)
    }

    // =========================================================================
    // HISTORY
    // =========================================================================

    /// Restore the previous snapshot. Returns false when there is none.
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.history.undo(&self.board) else {
            return false;
        };
        self.board = previous;
        debug!(remaining = self.history.len(), "undo");
        self.notify(&[Change::BoardReplaced]);
        true
    }

    /// Re-apply the most recently undone snapshot.
    pub fn redo(&mut self) -> bool {
        let Some(next) = self.history.redo(&self.board) else {
            return false;
        };
        self.board = next;
        debug!(remaining = self.history.len(), "redo");
        self.notify(&[Change::BoardReplaced]);
        true
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Close the current coalescing window, e.g. at the end of a drag.
    pub fn seal_history(&mut self) {
        self.history.seal();
    }

    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    // =========================================================================
    // SEARCH INGEST
    // =========================================================================

    /// Turn search hits into covers placed on free grid slots, in query order.
    ///
    /// A hit whose fields would not pass validation (an over-long title, say)
    /// is skipped and reported in [`SearchIngest::rejected`]; the rest land.
    ///
    /// # Errors
    ///
    /// Returns the validation error when the accepted covers would not fit
    /// under the cover bound; nothing is added.
    pub fn add_search_results(&mut self, results: &[SearchResult]) -> Result<SearchIngest, ValidationError> {
        let mut ordered: Vec<&SearchResult> = results.iter().collect();
        ordered.sort_by_key(|r| r.index);

        let entity_schema = self.board.schema();
        let mut accepted = Vec::with_capacity(ordered.len());
        let mut rejected = Vec::new();
        for hit in ordered {
            let cover = Cover::new(&hit.title, &hit.subtitle, &hit.link, Point::default(), &self.board.configs);
            let mut report = Report::default();
            check_entity(&cover, &entity_schema, &format!("results.{}", hit.index), &mut report);
            match report.finish() {
                Ok(()) => accepted.push(cover),
                Err(err) => rejected.push((hit.index, err)),
            }
        }

        let slots = free_slots(&self.board, accepted.len());
        let covers: Vec<Cover> = accepted
            .into_iter()
            .zip(slots)
            .map(|(cover, pos)| Cover { pos, ..cover })
            .collect();
        let added: Vec<EntityId> = covers.iter().map(|c| c.id).collect();
        if !covers.is_empty() {
            self.add_covers(covers)?;
        }
        Ok(SearchIngest { added, rejected })
    }

    // =========================================================================
    // SELECTORS
    // =========================================================================

    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[must_use]
    pub fn cover_size(&self) -> Size {
        self.board.cover_size()
    }

    #[must_use]
    pub fn resolve(&self, id: EntityId) -> Option<EntityRef> {
        self.board.resolve(id)
    }

    #[must_use]
    pub fn bounding_box(&self, entity: EntityRef) -> Option<BoundingBox> {
        geometry::entity_box(&self.board, entity, self.cover_size())
    }

    /// Drawable geometry of an arrow, or `None` if it or an endpoint is gone.
    #[must_use]
    pub fn connector(&self, arrow_id: EntityId) -> Option<ConnectorGeometry> {
        let arrow = self.board.arrows.find(arrow_id)?;
        geometry::resolve_connector(&self.board, arrow, self.cover_size())
    }

    /// Everything strictly inside a group.
    #[must_use]
    pub fn contained_in(&self, group_id: EntityId) -> Vec<EntityRef> {
        geometry::contained_entities(&self.board, group_id, self.cover_size())
    }
}

/// Outcome of [`BoardEngine::add_search_results`].
#[derive(Debug, Default)]
pub struct SearchIngest {
    /// Ids of the new covers, in query order.
    pub added: Vec<EntityId>,
    /// Query index and reason for every hit that was skipped.
    pub rejected: Vec<(usize, ValidationError)>,
}

fn push_unique(changes: &mut Vec<Change>, change: Change) {
    if !changes.contains(&change) {
        changes.push(change);
    }
}

/// First `count` grid positions whose cover box overlaps no existing cover.
fn free_slots(board: &Board, count: usize) -> Vec<Point> {
    let base = board.cover_size();
    let taken: Vec<BoundingBox> = board.covers.iter().map(|c| geometry::bounding_box(c, base)).collect();
    let mut slots = Vec::with_capacity(count);
    let mut placed: Vec<BoundingBox> = Vec::with_capacity(count);
    // An existing cover can straddle at most four slots.
    for slot in 0..(count + 4 * MAX_COVERS) {
        if slots.len() == count {
            break;
        }
        let (row, col) = (slot / INGEST_COLUMNS, slot % INGEST_COLUMNS);
        #[allow(clippy::cast_precision_loss)]
        let pos = Point::new(
            INGEST_GAP + col as f64 * (base.width + INGEST_GAP),
            INGEST_GAP + row as f64 * (base.height + INGEST_GAP),
        );
        let pos = geometry::clamp_position(pos, base);
        let candidate = BoundingBox::new(pos, base);
        if taken.iter().chain(&placed).any(|b| b.overlaps(&candidate)) {
            continue;
        }
        placed.push(candidate);
        slots.push(pos);
    }
    slots
}
