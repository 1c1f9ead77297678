//! Ordered, bounded entity collections.
//!
//! `EntityStore<T>` keeps entities in insertion order, which is also their
//! draw order. `refresh` moves one entity to the end to bring it to the
//! front. Lookups by id are linear; boards are capped at a few dozen items.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::consts::{MAX_ARROWS, MAX_COVERS, MAX_GROUPS};
use crate::doc::{Arrow, ArrowPatch, Cover, CoverPatch, EntityId, Group, GroupPatch};
use crate::schema::Schema;
use crate::validation::{IssueKind, Report, ValidationError};

/// Behaviour shared by every stored entity kind.
pub trait Entity: Clone + PartialEq + Serialize {
    /// Sparse update type merged by `EntityStore::update`.
    type Patch;

    /// Collection name used in validation paths and on the wire.
    const COLLECTION: &'static str;

    /// Upper bound on the number of entities of this kind.
    const MAX: usize;

    fn id(&self) -> EntityId;

    fn apply_patch(&mut self, patch: &Self::Patch);

    /// Validate a serialized entity at `path`, appending issues to `report`.
    fn check(schema: &Schema, value: &Value, path: &str, report: &mut Report);
}

impl Entity for Cover {
    type Patch = CoverPatch;
    const COLLECTION: &'static str = "covers";
    const MAX: usize = MAX_COVERS;

    fn id(&self) -> EntityId {
        self.id
    }

    fn apply_patch(&mut self, patch: &CoverPatch) {
        Cover::apply_patch(self, patch);
    }

    fn check(schema: &Schema, value: &Value, path: &str, report: &mut Report) {
        schema.check_cover(value, path, report);
    }
}

impl Entity for Group {
    type Patch = GroupPatch;
    const COLLECTION: &'static str = "groups";
    const MAX: usize = MAX_GROUPS;

    fn id(&self) -> EntityId {
        self.id
    }

    fn apply_patch(&mut self, patch: &GroupPatch) {
        Group::apply_patch(self, patch);
    }

    fn check(schema: &Schema, value: &Value, path: &str, report: &mut Report) {
        schema.check_group(value, path, report);
    }
}

impl Entity for Arrow {
    type Patch = ArrowPatch;
    const COLLECTION: &'static str = "arrows";
    const MAX: usize = MAX_ARROWS;

    fn id(&self) -> EntityId {
        self.id
    }

    fn apply_patch(&mut self, patch: &ArrowPatch) {
        Arrow::apply_patch(self, patch);
    }

    fn check(schema: &Schema, value: &Value, path: &str, report: &mut Report) {
        schema.check_arrow(value, path, report);
    }
}

/// Insertion-ordered collection of one entity kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityStore<T> {
    items: Vec<T>,
}

impl<T> Default for EntityStore<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Entity> EntityStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `items` against the schema, the bound, and id uniqueness,
    /// then append them. Nothing is appended when any check fails.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` listing every failing field.
    pub fn add<I>(&mut self, items: I, schema: &Schema) -> Result<(), ValidationError>
    where
        I: IntoIterator<Item = T>,
    {
        let items: Vec<T> = items.into_iter().collect();
        let mut report = Report::default();
        self.check_new(&items, schema, &mut report);
        report.finish()?;
        self.items.extend(items);
        Ok(())
    }

    /// Append issues for `items` as if they were about to be added.
    pub fn check_new(&self, items: &[T], schema: &Schema, report: &mut Report) {
        let total = self.items.len() + items.len();
        if total > T::MAX {
            report.push(T::COLLECTION, IssueKind::TooMany { max: T::MAX, found: total });
        }

        let mut seen: HashSet<EntityId> = self.ids().collect();
        for (offset, item) in items.iter().enumerate() {
            let path = format!("{}.{}", T::COLLECTION, self.items.len() + offset);
            check_entity(item, schema, &path, report);
            if !seen.insert(item.id()) {
                report.push(format!("{path}.id"), IssueKind::Duplicate);
            }
        }
    }

    /// Append without validation. Callers must have checked the items.
    pub(crate) fn extend(&mut self, items: Vec<T>) {
        self.items.extend(items);
    }

    /// Re-validate the stored entity with `id` against the schema.
    ///
    /// # Errors
    ///
    /// Returns every failing field of that entity. Unknown ids pass.
    pub fn check_stored(&self, id: EntityId, schema: &Schema) -> Result<(), ValidationError> {
        let mut report = Report::default();
        if let Some((index, item)) = self.items.iter().enumerate().find(|(_, item)| item.id() == id) {
            check_entity(item, schema, &format!("{}.{index}", T::COLLECTION), &mut report);
        }
        report.finish()
    }

    /// Merge `patch` into the entity with `id`. Returns false if it doesn't exist.
    /// Unchecked: the engine validates the result and rolls back on failure.
    pub(crate) fn update(&mut self, id: EntityId, patch: &T::Patch) -> bool {
        let Some(item) = self.find_mut(id) else {
            return false;
        };
        item.apply_patch(patch);
        true
    }

    /// Remove an entity by id, returning it if it was present.
    pub(crate) fn remove(&mut self, id: EntityId) -> Option<T> {
        let index = self.items.iter().position(|item| item.id() == id)?;
        Some(self.items.remove(index))
    }

    /// Remove every entity matching `pred`, returning the removed ids in order.
    pub(crate) fn remove_where<F>(&mut self, mut pred: F) -> Vec<EntityId>
    where
        F: FnMut(&T) -> bool,
    {
        let mut removed = Vec::new();
        self.items.retain(|item| {
            if pred(item) {
                removed.push(item.id());
                false
            } else {
                true
            }
        });
        removed
    }

    #[must_use]
    pub fn exists(&self, id: EntityId) -> bool {
        self.items.iter().any(|item| item.id() == id)
    }

    #[must_use]
    pub fn find(&self, id: EntityId) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub(crate) fn find_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.items.iter_mut().find(|item| item.id() == id)
    }

    /// All entities in draw order.
    #[must_use]
    pub fn list(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.items.iter().map(Entity::id)
    }

    /// Move the entity with `id` to the end of the draw order. Returns false
    /// if it doesn't exist.
    pub(crate) fn refresh(&mut self, id: EntityId) -> bool {
        let Some(index) = self.items.iter().position(|item| item.id() == id) else {
            return false;
        };
        let item = self.items.remove(index);
        self.items.push(item);
        true
    }

    /// Compare contents ignoring order.
    #[must_use]
    pub fn same_items(&self, other: &Self) -> bool {
        if self.items.len() != other.items.len() {
            return false;
        }
        let mut mine: Vec<&T> = self.items.iter().collect();
        let mut theirs: Vec<&T> = other.items.iter().collect();
        mine.sort_by_key(|item| item.id());
        theirs.sort_by_key(|item| item.id());
        mine == theirs
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Validate one serialized entity at `path`, appending issues to `report`.
pub(crate) fn check_entity<T: Entity>(item: &T, schema: &Schema, path: &str, report: &mut Report) {
    match serde_json::to_value(item) {
        Ok(value) => T::check(schema, &value, path, report),
        Err(e) => report.push(path, IssueKind::Malformed(e.to_string())),
    }
}

impl<'a, T> IntoIterator for &'a EntityStore<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
