//! Shared numeric constants for the board crate.

// ── Plane ───────────────────────────────────────────────────────

/// Upper bound of the board plane on both axes, in board units.
pub const MAX_BOUNDARY: f64 = 10_000.0;

/// Width of a cover at config size `1.0`.
pub const COVER_BASE_WIDTH: f64 = 150.0;

/// Height of a cover at config size `1.0`.
pub const COVER_BASE_HEIGHT: f64 = 150.0;

// ── Collection bounds ───────────────────────────────────────────

/// Maximum number of covers on one board.
pub const MAX_COVERS: usize = 25;

/// Maximum number of groups on one board.
pub const MAX_GROUPS: usize = 20;

/// Maximum number of arrows on one board.
pub const MAX_ARROWS: usize = 50;

/// Maximum number of connectors accepted from a version-1 record.
pub const MAX_LEGACY_LINES: usize = 20;

// ── Field bounds ────────────────────────────────────────────────

/// Largest per-axis group scale.
pub const MAX_GROUP_SCALE: f64 = 10.0;

/// Largest star rating.
pub const MAX_STARS: f64 = 5.0;

/// Longest label, title, or search string, in characters.
pub const MAX_TEXT_LEN: usize = 256;

/// Longest cover image link, in characters.
pub const MAX_LINK_LEN: usize = 2048;

/// Smallest config cover scale.
pub const CONFIG_SIZE_MIN: f64 = 0.5;

/// Largest config cover scale.
pub const CONFIG_SIZE_MAX: f64 = 3.0;

// ── Anchors ─────────────────────────────────────────────────────

/// Covers push their connector anchors out by `extent / 16`.
pub const COVER_ANCHOR_DIVISOR: f64 = 16.0;

/// Groups push their connector anchors out by `extent / 32`.
pub const GROUP_ANCHOR_DIVISOR: f64 = 32.0;

// ── History ─────────────────────────────────────────────────────

/// Default number of snapshots kept for undo.
pub const HISTORY_DEPTH: usize = 10;

/// Default debounce window for coalescing mutations, in milliseconds.
pub const HISTORY_DEBOUNCE_MS: u64 = 300;

/// Default number of mutations folded into one entry before a new one is forced.
pub const HISTORY_MAX_COALESCED: usize = 50;

// ── Persistence ─────────────────────────────────────────────────

/// Prefix shared by every saved board key.
pub const STORAGE_PREFIX: &str = "coverboard:";

/// Save id used when none is given.
pub const DEFAULT_SAVE_ID: &str = "default";

/// Record version written by this crate.
pub const SCHEMA_VERSION: u32 = 2;

/// Record version that stored connectors as flat `lines`.
pub const LEGACY_SCHEMA_VERSION: u32 = 1;

// ── Layout ──────────────────────────────────────────────────────

/// Columns used when placing freshly ingested covers.
pub const INGEST_COLUMNS: usize = 5;

/// Gap between ingested covers, in board units.
pub const INGEST_GAP: f64 = 40.0;
