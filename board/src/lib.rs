//! State engine for a cover board.
//!
//! A board is a bounded 2D plane holding media covers, resizable groups that
//! contain whatever lies strictly inside them, and labeled arrows between any
//! two covers or groups. This crate owns that state and its rules: bounded
//! collections, containment geometry, cascading moves and deletes, the
//! two-click connect protocol, debounced undo/redo, and the strict JSON
//! schema boards are persisted and shared in. Drawing and input wiring are
//! left to the host, which drives everything through [`engine::BoardEngine`].
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | `BoardEngine` command API, `Change` subscriptions, selectors |
//! | [`doc`] | Covers, groups, arrows, config, patches, and the `Board` aggregate |
//! | [`store`] | Bounded, insertion-ordered entity collections |
//! | [`geometry`] | Bounding boxes, strict containment, connector anchors |
//! | [`cascade`] | Multi-entity effects of moving, rescaling, and deleting |
//! | [`connect`] | Duplicate detection and the two-click connect protocol |
//! | [`history`] | Debounced snapshot undo/redo and the `Clock` seam |
//! | [`schema`] | Strict validation, import/export, legacy migration |
//! | [`validation`] | Field-attributed issues and `ValidationError` |
//! | [`csv`] | `title,subtitle` CSV import and export |
//! | [`search`] | `SearchProvider` trait and concurrent fan-out |
//! | [`storage`] | Named saves over a key-value `Storage` |
//! | [`consts`] | Shared bounds and defaults |

pub mod cascade;
pub mod connect;
pub mod consts;
pub mod csv;
pub mod doc;
pub mod engine;
pub mod geometry;
pub mod history;
pub mod schema;
pub mod search;
pub mod storage;
pub mod store;
pub mod validation;
