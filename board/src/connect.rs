//! Connection rules and the two-click connect protocol.
//!
//! A connection is made by clicking an anchor on one entity, then an anchor
//! on another. The first click parks a pending origin; the second resolves
//! it against existing arrows for the same unordered pair.

#[cfg(test)]
#[path = "connect_test.rs"]
mod connect_test;

use tracing::debug;

use crate::doc::{Arrow, ArrowPatch, Board, Dir, Endpoint, EntityId};
use crate::store::EntityStore;
use crate::validation::ValidationError;

/// Whether an arrow already links `a` and `b`, in either direction.
#[must_use]
pub fn would_duplicate(arrows: &EntityStore<Arrow>, a: EntityId, b: EntityId) -> bool {
    find_between(arrows, a, b).is_some()
}

/// The arrow linking `a` and `b`, in either direction.
#[must_use]
pub fn find_between(arrows: &EntityStore<Arrow>, a: EntityId, b: EntityId) -> Option<&Arrow> {
    arrows.iter().find(|arrow| arrow.links(a, b))
}

/// What a click on an anchor did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// First click; this endpoint is now the pending origin.
    Pending(Endpoint),
    /// Clicked the pending origin again; nothing is pending now.
    Cancelled,
    /// The id is not a cover or group; nothing changed.
    Ignored,
    /// An identical arrow already exists.
    Duplicate(EntityId),
    /// An arrow for the pair existed and its endpoint dirs were changed.
    Updated(EntityId),
    /// A new arrow was inserted.
    Created(EntityId),
}

/// Pending-origin state for the two-click protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Connector {
    pending: Option<Endpoint>,
}

impl Connector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pending(&self) -> Option<Endpoint> {
        self.pending
    }

    /// Drop the pending origin, returning it if there was one.
    pub fn cancel(&mut self) -> Option<Endpoint> {
        self.pending.take()
    }

    /// Handle a click on the `dir` anchor of entity `id`.
    ///
    /// The pending origin is cleared once a second click resolves, whether
    /// or not an arrow was written.
    ///
    /// # Errors
    ///
    /// Returns the validation error when inserting a new arrow fails, for
    /// example because the arrow bound is reached.
    pub fn click(&mut self, board: &mut Board, id: EntityId, dir: Dir) -> Result<ConnectOutcome, ValidationError> {
        if board.resolve(id).is_none() {
            return Ok(ConnectOutcome::Ignored);
        }
        let Some(origin) = self.pending else {
            let endpoint = Endpoint::new(id, dir);
            self.pending = Some(endpoint);
            return Ok(ConnectOutcome::Pending(endpoint));
        };
        self.pending = None;
        if origin.id == id {
            return Ok(ConnectOutcome::Cancelled);
        }
        if board.resolve(origin.id).is_none() {
            // Origin was deleted while pending; restart from this click.
            let endpoint = Endpoint::new(id, dir);
            self.pending = Some(endpoint);
            return Ok(ConnectOutcome::Pending(endpoint));
        }
        let target = Endpoint::new(id, dir);

        if let Some(existing) = find_between(&board.arrows, origin.id, target.id) {
            let existing_id = existing.id;
            let (origin_dir, target_dir) = if existing.origin.id == origin.id {
                (origin.dir, target.dir)
            } else {
                (target.dir, origin.dir)
            };
            if existing.origin.dir == origin_dir && existing.target.dir == target_dir {
                return Ok(ConnectOutcome::Duplicate(existing_id));
            }
            let patch = ArrowPatch { origin_dir: Some(origin_dir), target_dir: Some(target_dir), ..ArrowPatch::default() };
            board.arrows.update(existing_id, &patch);
            debug!(arrow = %existing_id, "re-anchored arrow");
            return Ok(ConnectOutcome::Updated(existing_id));
        }

        let arrow = Arrow::new(origin, target, board.configs.arrow_dir);
        let arrow_id = arrow.id;
        board.add_arrows(vec![arrow])?;
        debug!(arrow = %arrow_id, origin = %origin.id, target = %target.id, "connected");
        Ok(ConnectOutcome::Created(arrow_id))
    }
}
