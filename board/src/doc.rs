//! Document model: covers, groups, arrows, the board config, and the
//! aggregate that owns them.
//!
//! This module defines what sits on the board (`Cover`, `Group`, `Arrow`),
//! sparse-update types for incremental edits (`CoverPatch`, `GroupPatch`,
//! `ArrowPatch`, `ConfigPatch`), the tagged `EntityRef` used to address a
//! cover or group without inspecting its shape, and the `Board` aggregate
//! that is persisted, exported, and snapshotted for undo.
//!
//! Patches merge leaf by leaf: a `None` field keeps the current value, and a
//! nested patch only touches the leaves it carries.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consts::{CONFIG_SIZE_MAX, CONFIG_SIZE_MIN, COVER_BASE_HEIGHT, COVER_BASE_WIDTH, MAX_GROUP_SCALE, MAX_STARS};
use crate::geometry::{Placed, Point, Size};
use crate::schema::Schema;
use crate::store::EntityStore;
use crate::validation::{Report, ValidationError};

/// Unique identifier for a cover, group, or arrow.
pub type EntityId = Uuid;

// =============================================================
// Enums
// =============================================================

/// Side of a bounding box that a label or connector is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dir {
    Left,
    Right,
    Top,
    #[default]
    Bottom,
}

impl Dir {
    /// Every side, in declaration order.
    pub const ALL: [Self; 4] = [Self::Left, Self::Right, Self::Top, Self::Bottom];

    /// Wire names accepted by the schema.
    pub const NAMES: &'static [&'static str] = &["left", "right", "top", "bottom"];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Top => "top",
            Self::Bottom => "bottom",
        }
    }
}

/// Kind of media a board collects. Selects the search provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Media {
    #[default]
    Music,
    Movie,
    #[serde(rename = "tvshow")]
    TvShow,
    Book,
    Game,
}

impl Media {
    pub const ALL: [Self; 5] = [Self::Music, Self::Movie, Self::TvShow, Self::Book, Self::Game];

    pub const NAMES: &'static [&'static str] = &["music", "movie", "tvshow", "book", "game"];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Music => "music",
            Self::Movie => "movie",
            Self::TvShow => "tvshow",
            Self::Book => "book",
            Self::Game => "game",
        }
    }
}

/// Error returned when a string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}' (expected one of: {expected})")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
    expected: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str, names: &[&str]) -> Self {
        Self { kind, value: value.to_owned(), expected: names.join(", ") }
    }
}

impl FromStr for Dir {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError::new("direction", s, Self::NAMES))
    }
}

impl FromStr for Media {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError::new("media", s, Self::NAMES))
    }
}

impl fmt::Display for Dir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Media {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================
// Leaf structs
// =============================================================

/// A text label anchored to one side of its owner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub text: String,
    pub dir: Dir,
}

/// A cover label that also remembers the query used to find the cover.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchLabel {
    pub text: String,
    pub search: String,
    pub dir: Dir,
}

/// Star rating in half steps from 0 to 5.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub count: f64,
    pub dir: Dir,
}

/// Independent width and height multipliers of a group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    pub x: f64,
    pub y: f64,
}

impl Scale {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Clamp both axes into `[0, MAX_GROUP_SCALE]`. Non-finite axes become 1.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self { x: clamp_finite(self.x, 0.0, MAX_GROUP_SCALE, 1.0), y: clamp_finite(self.y, 0.0, MAX_GROUP_SCALE, 1.0) }
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self { x: 1.0, y: 1.0 }
    }
}

/// One end of an arrow: the entity it attaches to and the side it leaves from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: EntityId,
    pub dir: Dir,
}

impl Endpoint {
    #[must_use]
    pub fn new(id: EntityId, dir: Dir) -> Self {
        Self { id, dir }
    }
}

// =============================================================
// Entities
// =============================================================

/// A positioned cover image for one media item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cover {
    pub id: EntityId,
    /// Top-left corner.
    pub pos: Point,
    /// Image URL, or empty for a placeholder cover.
    pub link: String,
    pub title: SearchLabel,
    pub subtitle: SearchLabel,
    pub star: Rating,
}

impl Cover {
    /// Build a cover at `pos` using the config's label directions.
    #[must_use]
    pub fn new(title: &str, subtitle: &str, link: &str, pos: Point, config: &Config) -> Self {
        Self {
            id: Uuid::new_v4(),
            pos,
            link: link.to_owned(),
            title: SearchLabel { text: title.to_owned(), search: title.to_owned(), dir: config.title_dir },
            subtitle: SearchLabel { text: subtitle.to_owned(), search: subtitle.to_owned(), dir: config.subtitle_dir },
            star: Rating { count: 0.0, dir: config.star_dir },
        }
    }

    /// Merge a patch into this cover. Star counts are snapped to half steps.
    pub fn apply_patch(&mut self, patch: &CoverPatch) {
        if let Some(pos) = patch.pos {
            self.pos = pos;
        }
        if let Some(ref link) = patch.link {
            self.link.clone_from(link);
        }
        if let Some(ref title) = patch.title {
            title.apply(&mut self.title);
        }
        if let Some(ref subtitle) = patch.subtitle {
            subtitle.apply(&mut self.subtitle);
        }
        if let Some(ref star) = patch.star {
            if let Some(count) = star.count {
                self.star.count = snap_stars(count);
            }
            if let Some(dir) = star.dir {
                self.star.dir = dir;
            }
        }
    }
}

/// A resizable container. Anything strictly inside its box belongs to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: EntityId,
    pub pos: Point,
    pub scale: Scale,
    pub title: Label,
    pub subtitle: Label,
}

impl Group {
    #[must_use]
    pub fn new(title: &str, pos: Point, scale: Scale, config: &Config) -> Self {
        Self {
            id: Uuid::new_v4(),
            pos,
            scale: scale.clamped(),
            title: Label { text: title.to_owned(), dir: config.group_title_dir },
            subtitle: Label { text: String::new(), dir: config.group_subtitle_dir },
        }
    }

    /// Merge a patch into this group. Scale is clamped into range.
    pub fn apply_patch(&mut self, patch: &GroupPatch) {
        if let Some(pos) = patch.pos {
            self.pos = pos;
        }
        if let Some(scale) = patch.scale {
            self.scale = scale.clamped();
        }
        if let Some(ref title) = patch.title {
            title.apply(&mut self.title);
        }
        if let Some(ref subtitle) = patch.subtitle {
            subtitle.apply(&mut self.subtitle);
        }
    }
}

/// A directed, labeled connector between two covers or groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrow {
    pub id: EntityId,
    pub title: Label,
    pub origin: Endpoint,
    pub target: Endpoint,
}

impl Arrow {
    /// A fresh, unlabeled arrow whose label sits on `label_dir`.
    #[must_use]
    pub fn new(origin: Endpoint, target: Endpoint, label_dir: Dir) -> Self {
        Self { id: Uuid::new_v4(), title: Label { text: String::new(), dir: label_dir }, origin, target }
    }

    /// Whether this arrow links `a` and `b`, in either direction.
    #[must_use]
    pub fn links(&self, a: EntityId, b: EntityId) -> bool {
        (self.origin.id == a && self.target.id == b) || (self.origin.id == b && self.target.id == a)
    }

    /// Whether either endpoint is `id`.
    #[must_use]
    pub fn touches(&self, id: EntityId) -> bool {
        self.origin.id == id || self.target.id == id
    }

    /// Merge a patch into this arrow. Endpoint ids never change.
    pub fn apply_patch(&mut self, patch: &ArrowPatch) {
        if let Some(ref title) = patch.title {
            title.apply(&mut self.title);
        }
        if let Some(dir) = patch.origin_dir {
            self.origin.dir = dir;
        }
        if let Some(dir) = patch.target_dir {
            self.target.dir = dir;
        }
    }
}

// =============================================================
// Tagged references
// =============================================================

/// A cover or group id carrying its own kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Cover(EntityId),
    Group(EntityId),
}

impl EntityRef {
    #[must_use]
    pub fn id(self) -> EntityId {
        match self {
            Self::Cover(id) | Self::Group(id) => id,
        }
    }

}

// =============================================================
// Config
// =============================================================

/// Board-wide layout and display parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Board title shown above the canvas.
    pub title: String,
    /// Cover scale; the cover size is `COVER_BASE_* * size`.
    pub size: f64,
    pub media: Media,
    /// Label color as a CSS hex string.
    pub color: String,
    /// Canvas background as a CSS hex string.
    pub background: String,
    pub show_main_title: bool,
    pub show_title: bool,
    pub show_subtitle: bool,
    pub show_stars: bool,
    pub show_arrows: bool,
    pub title_dir: Dir,
    pub subtitle_dir: Dir,
    pub star_dir: Dir,
    pub group_title_dir: Dir,
    pub group_subtitle_dir: Dir,
    /// Label side given to newly connected arrows.
    pub arrow_dir: Dir,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: String::new(),
            size: 1.0,
            media: Media::Music,
            color: "#ffffff".to_owned(),
            background: "#1e1e1e".to_owned(),
            show_main_title: true,
            show_title: true,
            show_subtitle: true,
            show_stars: true,
            show_arrows: true,
            title_dir: Dir::Bottom,
            subtitle_dir: Dir::Bottom,
            star_dir: Dir::Bottom,
            group_title_dir: Dir::Top,
            group_subtitle_dir: Dir::Bottom,
            arrow_dir: Dir::Bottom,
        }
    }
}

impl Config {
    /// Size of one cover, and the base size groups multiply by their scale.
    #[must_use]
    pub fn cover_size(&self) -> Size {
        Size::new(COVER_BASE_WIDTH * self.size, COVER_BASE_HEIGHT * self.size)
    }

    /// Merge a patch. `size` is clamped into its configured range.
    pub fn apply_patch(&mut self, patch: &ConfigPatch) {
        merge(&mut self.title, patch.title.as_ref());
        if let Some(size) = patch.size {
            self.size = clamp_finite(size, CONFIG_SIZE_MIN, CONFIG_SIZE_MAX, 1.0);
        }
        merge_copy(&mut self.media, patch.media);
        merge(&mut self.color, patch.color.as_ref());
        merge(&mut self.background, patch.background.as_ref());
        merge_copy(&mut self.show_main_title, patch.show_main_title);
        merge_copy(&mut self.show_title, patch.show_title);
        merge_copy(&mut self.show_subtitle, patch.show_subtitle);
        merge_copy(&mut self.show_stars, patch.show_stars);
        merge_copy(&mut self.show_arrows, patch.show_arrows);
        merge_copy(&mut self.title_dir, patch.title_dir);
        merge_copy(&mut self.subtitle_dir, patch.subtitle_dir);
        merge_copy(&mut self.star_dir, patch.star_dir);
        merge_copy(&mut self.group_title_dir, patch.group_title_dir);
        merge_copy(&mut self.group_subtitle_dir, patch.group_subtitle_dir);
        merge_copy(&mut self.arrow_dir, patch.arrow_dir);
    }
}

// =============================================================
// Patches
// =============================================================

/// Sparse update for a `Label`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<Dir>,
}

impl LabelPatch {
    fn apply(&self, label: &mut Label) {
        merge(&mut label.text, self.text.as_ref());
        merge_copy(&mut label.dir, self.dir);
    }
}

/// Sparse update for a `SearchLabel`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchLabelPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<Dir>,
}

impl SearchLabelPatch {
    fn apply(&self, label: &mut SearchLabel) {
        merge(&mut label.text, self.text.as_ref());
        merge(&mut label.search, self.search.as_ref());
        merge_copy(&mut label.dir, self.dir);
    }
}

/// Sparse update for a `Rating`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<Dir>,
}

/// Sparse update for a cover. Only present fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<SearchLabelPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<SearchLabelPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub star: Option<RatingPatch>,
}

/// Sparse update for a group. Only present fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<Scale>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<LabelPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<LabelPatch>,
}

/// Sparse update for an arrow's label and endpoint sides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrowPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<LabelPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_dir: Option<Dir>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_dir: Option<Dir>,
}

/// Sparse update for the config. Absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_main_title: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_title: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_subtitle: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_stars: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_arrows: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_dir: Option<Dir>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_dir: Option<Dir>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub star_dir: Option<Dir>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_title_dir: Option<Dir>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_subtitle_dir: Option<Dir>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrow_dir: Option<Dir>,
}

// =============================================================
// Board aggregate
// =============================================================

/// Everything on one board. The unit of persistence, export, and undo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub configs: Config,
    pub covers: EntityStore<Cover>,
    pub groups: EntityStore<Group>,
    pub arrows: EntityStore<Arrow>,
}

impl Board {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Base size for covers and groups under the current config.
    #[must_use]
    pub fn cover_size(&self) -> Size {
        self.configs.cover_size()
    }

    /// Schema bound to the current cover size.
    #[must_use]
    pub fn schema(&self) -> Schema {
        Schema::for_config(&self.configs)
    }

    /// Resolve an id to a cover or group reference.
    #[must_use]
    pub fn resolve(&self, id: EntityId) -> Option<EntityRef> {
        if self.covers.exists(id) {
            Some(EntityRef::Cover(id))
        } else if self.groups.exists(id) {
            Some(EntityRef::Group(id))
        } else {
            None
        }
    }

    /// Ids of every cover and group, i.e. every valid arrow endpoint.
    #[must_use]
    pub fn endpoint_ids(&self) -> HashSet<EntityId> {
        self.covers.ids().chain(self.groups.ids()).collect()
    }

    /// Validate and append covers. All or nothing.
    ///
    /// # Errors
    ///
    /// Returns every failing field when any cover is invalid or the cover
    /// bound would be exceeded.
    pub fn add_covers(&mut self, covers: Vec<Cover>) -> Result<(), ValidationError> {
        let schema = self.schema();
        self.covers.add(covers, &schema)
    }

    /// Validate and append groups. All or nothing.
    ///
    /// # Errors
    ///
    /// Returns every failing field when any group is invalid or the group
    /// bound would be exceeded.
    pub fn add_groups(&mut self, groups: Vec<Group>) -> Result<(), ValidationError> {
        let schema = self.schema();
        self.groups.add(groups, &schema)
    }

    /// Validate and append arrows, checking endpoints and duplicate pairs.
    ///
    /// # Errors
    ///
    /// Returns every failing field when any arrow is malformed, links a
    /// missing or identical endpoint, duplicates an existing pair, or the
    /// arrow bound would be exceeded.
    pub fn add_arrows(&mut self, arrows: Vec<Arrow>) -> Result<(), ValidationError> {
        let schema = self.schema();
        let mut report = Report::default();
        self.arrows.check_new(&arrows, &schema, &mut report);
        let base = self.arrows.len();
        let incoming: Vec<(String, &Arrow)> = arrows
            .iter()
            .enumerate()
            .map(|(i, a)| (format!("arrows.{}", base + i), a))
            .collect();
        crate::schema::check_connections(&self.endpoint_ids(), self.arrows.list(), &incoming, &mut report);
        report.finish()?;
        self.arrows.extend(arrows);
        Ok(())
    }

    /// Order-insensitive deep equality: collections are compared sorted by id.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.configs == other.configs
            && self.covers.same_items(&other.covers)
            && self.groups.same_items(&other.groups)
            && self.arrows.same_items(&other.arrows)
    }
}

impl Placed for Cover {
    fn pos(&self) -> Point {
        self.pos
    }

    fn extent(&self, base: Size) -> Size {
        base
    }
}

impl Placed for Group {
    fn pos(&self) -> Point {
        self.pos
    }

    fn extent(&self, base: Size) -> Size {
        Size::new(base.width * self.scale.x, base.height * self.scale.y)
    }
}

// =============================================================
// Helpers
// =============================================================

fn merge(target: &mut String, value: Option<&String>) {
    if let Some(v) = value {
        target.clone_from(v);
    }
}

fn merge_copy<T: Copy>(target: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *target = v;
    }
}

/// Clamp into `[min, max]`, replacing NaN and infinities with `fallback`.
pub(crate) fn clamp_finite(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_finite() { value.clamp(min, max) } else { fallback }
}

/// Round a star count to the nearest half step inside `[0, 5]`.
#[must_use]
pub fn snap_stars(count: f64) -> f64 {
    let snapped = (clamp_finite(count, 0.0, MAX_STARS, 0.0) * 2.0).round() / 2.0;
    snapped.clamp(0.0, MAX_STARS)
}
