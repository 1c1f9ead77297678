//! Persistence schema: strict validation, import, export, and rehydration.
//!
//! DESIGN
//! ======
//! Untrusted JSON is walked as a `serde_json::Value` so that every violation
//! is reported, not just the first one serde would hit. The same walker
//! validates typed entities on `add` (they are serialized first), so there is
//! exactly one definition of what a valid cover, group, or arrow is.
//!
//! Record layout is `{ "state": { configs, covers, groups, arrows }, "version" }`.
//! Version 1 stored connectors as `lines` with a flat `{text, dir}` label and
//! a lower bound; those are migrated to arrows on read and never written.
//!
//! ERROR HANDLING
//! ==============
//! Import is all or nothing: any issue rejects the whole blob. Rehydration
//! never fails; a corrupt blob is logged and replaced by an empty board.

#[cfg(test)]
#[path = "schema_test.rs"]
mod schema_test;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::consts::{
    CONFIG_SIZE_MAX, CONFIG_SIZE_MIN, LEGACY_SCHEMA_VERSION, MAX_ARROWS, MAX_BOUNDARY, MAX_COVERS, MAX_GROUP_SCALE,
    MAX_GROUPS, MAX_LEGACY_LINES, MAX_LINK_LEN, MAX_STARS, MAX_TEXT_LEN, SCHEMA_VERSION,
};
use crate::doc::{
    Arrow, Board, Config, Cover, Dir, Endpoint, EntityId, Group, Label, Media, Rating, Scale, SearchLabel,
};
use crate::geometry::{Point, Size};
use crate::validation::{IssueKind, Report, ValidationError};

// =============================================================================
// TYPES
// =============================================================================

/// Errors from importing an untrusted board blob.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0}")]
    Invalid(#[from] ValidationError),
    #[error("unsupported record version {0}")]
    UnsupportedVersion(u64),
}

impl ImportError {
    /// One-line reason suitable for showing to a user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Invalid(e) => e.primary_message(),
            other => other.to_string(),
        }
    }
}

/// A persisted board as written to storage and export files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub state: Board,
    pub version: u32,
}

impl Record {
    #[must_use]
    pub fn current(board: Board) -> Self {
        Self { state: board, version: SCHEMA_VERSION }
    }
}

/// Connector layout expected in a state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectorLayout {
    /// `arrows` with nested `title {text, dir}`.
    Arrows,
    /// Version-1 `lines` with a flat `text`/`dir` label.
    LegacyLines,
}

/// Entity validator bound to a cover size.
///
/// Cover positions are only valid if the whole cover stays on the board, so
/// the schema needs to know how big a cover is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schema {
    cover: Size,
}

impl Schema {
    #[must_use]
    pub fn new(cover: Size) -> Self {
        Self { cover }
    }

    #[must_use]
    pub fn for_config(config: &Config) -> Self {
        Self::new(config.cover_size())
    }

    // =========================================================================
    // ENTITIES
    // =========================================================================

    /// Validate a cover value, returning it typed when every field is valid.
    pub fn check_cover(&self, value: &Value, path: &str, report: &mut Report) -> Option<Cover> {
        let obj = object(value, path, report)?;
        let id = field(obj, "id", path, report).and_then(|v| entity_id(v, &join(path, "id"), report));
        let pos = field(obj, "pos", path, report).and_then(|v| position(v, &join(path, "pos"), self.cover, report));
        let link = field(obj, "link", path, report).and_then(|v| text(v, &join(path, "link"), MAX_LINK_LEN, report));
        let title = field(obj, "title", path, report).and_then(|v| search_label(v, &join(path, "title"), report));
        let subtitle =
            field(obj, "subtitle", path, report).and_then(|v| search_label(v, &join(path, "subtitle"), report));
        let star = field(obj, "star", path, report).and_then(|v| rating(v, &join(path, "star"), report));
        Some(Cover { id: id?, pos: pos?, link: link?, title: title?, subtitle: subtitle?, star: star? })
    }

    /// Validate a group value. The whole scaled box must stay on the board.
    pub fn check_group(&self, value: &Value, path: &str, report: &mut Report) -> Option<Group> {
        let obj = object(value, path, report)?;
        let id = field(obj, "id", path, report).and_then(|v| entity_id(v, &join(path, "id"), report));
        let scale = field(obj, "scale", path, report).and_then(|v| scale_pair(v, &join(path, "scale"), report));
        let extent = scale.map_or(Size::default(), |s| {
            Size::new(self.cover.width * s.x, self.cover.height * s.y)
        });
        let pos = field(obj, "pos", path, report).and_then(|v| position(v, &join(path, "pos"), extent, report));
        let title = field(obj, "title", path, report).and_then(|v| label(v, &join(path, "title"), report));
        let subtitle = field(obj, "subtitle", path, report).and_then(|v| label(v, &join(path, "subtitle"), report));
        Some(Group { id: id?, pos: pos?, scale: scale?, title: title?, subtitle: subtitle? })
    }

    /// Validate an arrow value in the canonical nested layout.
    pub fn check_arrow(&self, value: &Value, path: &str, report: &mut Report) -> Option<Arrow> {
        check_connector(value, path, ConnectorLayout::Arrows, report)
    }

    // =========================================================================
    // CONFIG
    // =========================================================================

    /// Validate a config value. Absent fields take their default so older
    /// exports keep loading; present fields must be valid.
    pub fn check_config(value: &Value, path: &str, report: &mut Report) -> Option<Config> {
        let obj = object(value, path, report)?;
        let defaults = Config::default();
        let before = report.len();

        let get = |key: &str| obj.get(key);
        let mut config = Config::default();
        if let Some(v) = get("title") {
            config.title = text(v, &join(path, "title"), MAX_TEXT_LEN, report).unwrap_or(defaults.title);
        }
        if let Some(v) = get("size") {
            config.size = number(v, &join(path, "size"), CONFIG_SIZE_MIN, CONFIG_SIZE_MAX, report).unwrap_or(1.0);
        }
        if let Some(v) = get("media") {
            config.media = media(v, &join(path, "media"), report).unwrap_or_default();
        }
        if let Some(v) = get("color") {
            config.color = color(v, &join(path, "color"), report).unwrap_or(defaults.color);
        }
        if let Some(v) = get("background") {
            config.background = color(v, &join(path, "background"), report).unwrap_or(defaults.background);
        }
        for (key, slot) in [
            ("show_main_title", &mut config.show_main_title),
            ("show_title", &mut config.show_title),
            ("show_subtitle", &mut config.show_subtitle),
            ("show_stars", &mut config.show_stars),
            ("show_arrows", &mut config.show_arrows),
        ] {
            if let Some(v) = get(key) {
                if let Some(b) = boolean(v, &join(path, key), report) {
                    *slot = b;
                }
            }
        }
        for (key, slot) in [
            ("title_dir", &mut config.title_dir),
            ("subtitle_dir", &mut config.subtitle_dir),
            ("star_dir", &mut config.star_dir),
            ("group_title_dir", &mut config.group_title_dir),
            ("group_subtitle_dir", &mut config.group_subtitle_dir),
            ("arrow_dir", &mut config.arrow_dir),
        ] {
            if let Some(v) = get(key) {
                if let Some(d) = dir(v, &join(path, key), report) {
                    *slot = d;
                }
            }
        }

        (report.len() == before).then_some(config)
    }
}

/// Validate a typed config exactly as an import of it would.
///
/// # Errors
///
/// Returns every failing config field.
pub fn validate_config(config: &Config) -> Result<(), ValidationError> {
    let mut report = Report::default();
    match serde_json::to_value(config) {
        Ok(value) => {
            Schema::check_config(&value, "configs", &mut report);
        }
        Err(e) => report.push("configs", IssueKind::Malformed(e.to_string())),
    }
    report.finish()
}

// =============================================================================
// BOARD
// =============================================================================

/// Validate a whole state object (`{configs, covers, groups, arrows}`), or a
/// version-1 state with `lines`.
///
/// # Errors
///
/// Returns every issue found anywhere in the state.
pub fn check_state(value: &Value) -> Result<Board, ValidationError> {
    let layout = match value.get("arrows") {
        None if value.get("lines").is_some() => ConnectorLayout::LegacyLines,
        _ => ConnectorLayout::Arrows,
    };
    check_state_as(value, layout)
}

fn check_state_as(value: &Value, layout: ConnectorLayout) -> Result<Board, ValidationError> {
    let mut report = Report::default();
    let board = walk_state(value, layout, &mut report);
    report.finish()?;
    board.ok_or_else(|| ValidationError::single("", IssueKind::Malformed("state could not be read".to_owned())))
}

fn walk_state(value: &Value, layout: ConnectorLayout, report: &mut Report) -> Option<Board> {
    let obj = object(value, "", report)?;

    let configs = match obj.get("configs") {
        Some(v) => Schema::check_config(v, "configs", report),
        None => Some(Config::default()),
    };
    let schema = Schema::for_config(configs.as_ref().unwrap_or(&Config::default()));

    let covers = field(obj, "covers", "", report)
        .and_then(|v| collection(v, "covers", MAX_COVERS, report, |v, p, r| schema.check_cover(v, p, r)));
    let groups = field(obj, "groups", "", report)
        .and_then(|v| collection(v, "groups", MAX_GROUPS, report, |v, p, r| schema.check_group(v, p, r)));
    let (key, max) = match layout {
        ConnectorLayout::Arrows => ("arrows", MAX_ARROWS),
        ConnectorLayout::LegacyLines => ("lines", MAX_LEGACY_LINES),
    };
    let arrows = field(obj, key, "", report)
        .and_then(|v| collection(v, key, max, report, |v, p, r| check_connector(v, p, layout, r)));

    let covers = covers?;
    let groups = groups?;
    let arrows = arrows?;

    let mut seen: HashSet<EntityId> = HashSet::new();
    for (path, id) in covers
        .iter()
        .enumerate()
        .map(|(i, c)| (format!("covers.{i}.id"), c.id))
        .chain(groups.iter().enumerate().map(|(i, g)| (format!("groups.{i}.id"), g.id)))
        .chain(arrows.iter().enumerate().map(|(i, a)| (format!("{key}.{i}.id"), a.id)))
    {
        if !seen.insert(id) {
            report.push(path, IssueKind::Duplicate);
        }
    }

    let endpoints: HashSet<EntityId> = covers.iter().map(|c| c.id).chain(groups.iter().map(|g| g.id)).collect();
    let incoming: Vec<(String, &Arrow)> = arrows.iter().enumerate().map(|(i, a)| (format!("{key}.{i}"), a)).collect();
    check_connections(&endpoints, &[], &incoming, report);

    let mut board = Board { configs: configs?, ..Board::default() };
    board.covers.extend(covers);
    board.groups.extend(groups);
    board.arrows.extend(arrows);
    Some(board)
}

/// Check arrow endpoints and pair uniqueness against `existing` arrows.
///
/// Each incoming arrow must link two distinct ids from `endpoints`, and no
/// two arrows (existing or incoming) may link the same unordered pair.
pub fn check_connections(
    endpoints: &HashSet<EntityId>,
    existing: &[Arrow],
    incoming: &[(String, &Arrow)],
    report: &mut Report,
) {
    let mut pairs: HashSet<(EntityId, EntityId)> =
        existing.iter().map(|a| pair_key(a.origin.id, a.target.id)).collect();
    for (path, arrow) in incoming {
        if arrow.origin.id == arrow.target.id {
            report.push(format!("{path}.target.id"), IssueKind::SelfLink);
        }
        if !endpoints.contains(&arrow.origin.id) {
            report.push(format!("{path}.origin.id"), IssueKind::UnknownReference(arrow.origin.id));
        }
        if !endpoints.contains(&arrow.target.id) {
            report.push(format!("{path}.target.id"), IssueKind::UnknownReference(arrow.target.id));
        }
        if !pairs.insert(pair_key(arrow.origin.id, arrow.target.id)) {
            report.push(path.clone(), IssueKind::Duplicate);
        }
    }
}

/// Unordered key for an endpoint pair.
#[must_use]
pub fn pair_key(a: EntityId, b: EntityId) -> (EntityId, EntityId) {
    if a <= b { (a, b) } else { (b, a) }
}

// =============================================================================
// IMPORT / EXPORT
// =============================================================================

/// Parse and validate an untrusted board blob.
///
/// Accepts either a full record (`{state, version}`) or a bare state object.
///
/// # Errors
///
/// Returns `Parse` for malformed JSON, `UnsupportedVersion` for records from
/// an unknown schema generation, and `Invalid` with every violation otherwise.
pub fn import_json(raw: &str) -> Result<Board, ImportError> {
    let value: Value = serde_json::from_str(raw)?;
    import_value(&value)
}

/// Validate an already-parsed board blob. See [`import_json`].
///
/// # Errors
///
/// Same as [`import_json`], minus JSON parse errors.
pub fn import_value(value: &Value) -> Result<Board, ImportError> {
    let Some(state) = value.get("state") else {
        return Ok(check_state(value)?);
    };
    let version = match value.get("version") {
        None => u64::from(SCHEMA_VERSION),
        Some(v) => v.as_u64().ok_or_else(|| {
            ValidationError::single("version", IssueKind::InvalidType { expected: "non-negative integer" })
        })?,
    };
    let layout = if version == u64::from(SCHEMA_VERSION) {
        ConnectorLayout::Arrows
    } else if version == u64::from(LEGACY_SCHEMA_VERSION) {
        ConnectorLayout::LegacyLines
    } else {
        return Err(ImportError::UnsupportedVersion(version));
    };
    Ok(check_state_as(state, layout)?)
}

/// Serialize a board as a current-version record.
///
/// # Errors
///
/// Returns a serialization error if the board cannot be encoded.
pub fn export_json(board: &Board) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&Record::current(board.clone()))
}

/// Load a persisted blob, falling back to an empty board when it is missing
/// or fails validation.
#[must_use]
pub fn rehydrate(raw: Option<&str>) -> Board {
    let Some(raw) = raw else {
        return Board::default();
    };
    match import_json(raw) {
        Ok(board) => board,
        Err(e) => {
            warn!(error = %e, "discarding corrupt persisted board");
            Board::default()
        }
    }
}

// =============================================================================
// CONNECTORS
// =============================================================================

fn check_connector(value: &Value, path: &str, layout: ConnectorLayout, report: &mut Report) -> Option<Arrow> {
    let obj = object(value, path, report)?;
    let id = field(obj, "id", path, report).and_then(|v| entity_id(v, &join(path, "id"), report));
    let title = match layout {
        ConnectorLayout::Arrows => field(obj, "title", path, report).and_then(|v| label(v, &join(path, "title"), report)),
        ConnectorLayout::LegacyLines => label_fields(obj, path, report),
    };
    let origin = field(obj, "origin", path, report).and_then(|v| endpoint(v, &join(path, "origin"), report));
    let target = field(obj, "target", path, report).and_then(|v| endpoint(v, &join(path, "target"), report));
    Some(Arrow { id: id?, title: title?, origin: origin?, target: target? })
}

fn endpoint(value: &Value, path: &str, report: &mut Report) -> Option<Endpoint> {
    let obj = object(value, path, report)?;
    let id = field(obj, "id", path, report).and_then(|v| entity_id(v, &join(path, "id"), report));
    let d = field(obj, "dir", path, report).and_then(|v| dir(v, &join(path, "dir"), report));
    Some(Endpoint { id: id?, dir: d? })
}

// =============================================================================
// LEAVES
// =============================================================================

fn label(value: &Value, path: &str, report: &mut Report) -> Option<Label> {
    let obj = object(value, path, report)?;
    label_fields(obj, path, report)
}

fn label_fields(obj: &Map<String, Value>, path: &str, report: &mut Report) -> Option<Label> {
    let t = field(obj, "text", path, report).and_then(|v| text(v, &join(path, "text"), MAX_TEXT_LEN, report));
    let d = field(obj, "dir", path, report).and_then(|v| dir(v, &join(path, "dir"), report));
    Some(Label { text: t?, dir: d? })
}

fn search_label(value: &Value, path: &str, report: &mut Report) -> Option<SearchLabel> {
    let obj = object(value, path, report)?;
    let t = field(obj, "text", path, report).and_then(|v| text(v, &join(path, "text"), MAX_TEXT_LEN, report));
    let s = field(obj, "search", path, report).and_then(|v| text(v, &join(path, "search"), MAX_TEXT_LEN, report));
    let d = field(obj, "dir", path, report).and_then(|v| dir(v, &join(path, "dir"), report));
    Some(SearchLabel { text: t?, search: s?, dir: d? })
}

fn rating(value: &Value, path: &str, report: &mut Report) -> Option<Rating> {
    let obj = object(value, path, report)?;
    let count = field(obj, "count", path, report).and_then(|v| {
        let p = join(path, "count");
        let n = number(v, &p, 0.0, MAX_STARS, report)?;
        if (n * 2.0).fract().abs() > f64::EPSILON {
            report.push(p, IssueKind::InvalidStep { step: 0.5 });
            return None;
        }
        Some(n)
    });
    let d = field(obj, "dir", path, report).and_then(|v| dir(v, &join(path, "dir"), report));
    Some(Rating { count: count?, dir: d? })
}

fn scale_pair(value: &Value, path: &str, report: &mut Report) -> Option<Scale> {
    let obj = object(value, path, report)?;
    let x = field(obj, "x", path, report).and_then(|v| number(v, &join(path, "x"), 0.0, MAX_GROUP_SCALE, report));
    let y = field(obj, "y", path, report).and_then(|v| number(v, &join(path, "y"), 0.0, MAX_GROUP_SCALE, report));
    Some(Scale { x: x?, y: y? })
}

/// A top-left position whose box of `extent` stays inside the board.
fn position(value: &Value, path: &str, extent: Size, report: &mut Report) -> Option<Point> {
    let obj = object(value, path, report)?;
    let max_x = (MAX_BOUNDARY - extent.width).max(0.0);
    let max_y = (MAX_BOUNDARY - extent.height).max(0.0);
    let x = field(obj, "x", path, report).and_then(|v| number(v, &join(path, "x"), 0.0, max_x, report));
    let y = field(obj, "y", path, report).and_then(|v| number(v, &join(path, "y"), 0.0, max_y, report));
    Some(Point { x: x?, y: y? })
}

fn collection<T, F>(value: &Value, path: &str, max: usize, report: &mut Report, mut check: F) -> Option<Vec<T>>
where
    F: FnMut(&Value, &str, &mut Report) -> Option<T>,
{
    let Some(items) = value.as_array() else {
        report.push(path, IssueKind::InvalidType { expected: "array" });
        return None;
    };
    if items.len() > max {
        report.push(path, IssueKind::TooMany { max, found: items.len() });
    }
    let mut out = Vec::with_capacity(items.len());
    let mut complete = true;
    for (i, item) in items.iter().enumerate() {
        match check(item, &format!("{path}.{i}"), report) {
            Some(v) => out.push(v),
            None => complete = false,
        }
    }
    complete.then_some(out)
}

fn object<'v>(value: &'v Value, path: &str, report: &mut Report) -> Option<&'v Map<String, Value>> {
    let obj = value.as_object();
    if obj.is_none() {
        report.push(path, IssueKind::InvalidType { expected: "object" });
    }
    obj
}

fn field<'v>(obj: &'v Map<String, Value>, key: &str, path: &str, report: &mut Report) -> Option<&'v Value> {
    let value = obj.get(key);
    if value.is_none() {
        report.push(join(path, key), IssueKind::Missing);
    }
    value
}

fn number(value: &Value, path: &str, min: f64, max: f64, report: &mut Report) -> Option<f64> {
    let Some(n) = value.as_f64() else {
        report.push(path, IssueKind::InvalidType { expected: "number" });
        return None;
    };
    if n < min {
        report.push(path, IssueKind::TooSmall { min });
        return None;
    }
    if n > max {
        report.push(path, IssueKind::TooBig { max });
        return None;
    }
    Some(n)
}

fn text(value: &Value, path: &str, max_len: usize, report: &mut Report) -> Option<String> {
    let Some(s) = value.as_str() else {
        report.push(path, IssueKind::InvalidType { expected: "string" });
        return None;
    };
    if s.chars().count() > max_len {
        report.push(path, IssueKind::TooLong { max: max_len });
        return None;
    }
    Some(s.to_owned())
}

fn boolean(value: &Value, path: &str, report: &mut Report) -> Option<bool> {
    let b = value.as_bool();
    if b.is_none() {
        report.push(path, IssueKind::InvalidType { expected: "boolean" });
    }
    b
}

fn entity_id(value: &Value, path: &str, report: &mut Report) -> Option<EntityId> {
    let Some(s) = value.as_str() else {
        report.push(path, IssueKind::InvalidType { expected: "string" });
        return None;
    };
    match Uuid::parse_str(s) {
        Ok(id) => Some(id),
        Err(_) => {
            report.push(path, IssueKind::InvalidFormat("uuid"));
            None
        }
    }
}

fn dir(value: &Value, path: &str, report: &mut Report) -> Option<Dir> {
    let name = enum_value(value, path, Dir::NAMES, report)?;
    Dir::ALL.into_iter().find(|d| d.as_str() == name)
}

fn media(value: &Value, path: &str, report: &mut Report) -> Option<Media> {
    let name = enum_value(value, path, Media::NAMES, report)?;
    Media::ALL.into_iter().find(|m| m.as_str() == name)
}

fn enum_value<'v>(value: &'v Value, path: &str, allowed: &'static [&'static str], report: &mut Report) -> Option<&'v str> {
    let Some(s) = value.as_str() else {
        report.push(path, IssueKind::InvalidType { expected: "string" });
        return None;
    };
    if !allowed.iter().any(|a| *a == s) {
        report.push(path, IssueKind::InvalidEnum { allowed });
        return None;
    }
    Some(s)
}

/// CSS hex color: `#rgb`, `#rrggbb`, or `#rrggbbaa`.
fn color(value: &Value, path: &str, report: &mut Report) -> Option<String> {
    let s = text(value, path, 9, report)?;
    let digits = s.strip_prefix('#').unwrap_or("");
    let valid = matches!(digits.len(), 3 | 6 | 8) && digits.chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        report.push(path, IssueKind::InvalidFormat("hex color"));
        return None;
    }
    Some(s)
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() { key.to_owned() } else { format!("{path}.{key}") }
}
