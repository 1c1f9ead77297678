//! Plain-text rendering of boards for the terminal.

use board::doc::{Board, EntityId};

/// Multi-line listing of a board: config line, then covers, groups, arrows.
#[must_use]
pub fn render_board(board: &Board) -> String {
    let config = &board.configs;
    let mut lines = Vec::with_capacity(1 + board.covers.len() + board.groups.len() + board.arrows.len());
    let title = if config.title.is_empty() { "(untitled)" } else { config.title.as_str() };
    let size = board.cover_size();
    lines.push(format!(
        "{title} [{media}, cover {w}x{h}] {c} covers, {g} groups, {a} arrows",
        media = config.media,
        w = size.width,
        h = size.height,
        c = board.covers.len(),
        g = board.groups.len(),
        a = board.arrows.len(),
    ));
    for cover in board.covers.iter() {
        lines.push(format!(
            "cover {} at ({}, {}) {:?} / {:?} {}*",
            cover.id, cover.pos.x, cover.pos.y, cover.title.text, cover.subtitle.text, cover.star.count
        ));
    }
    for group in board.groups.iter() {
        lines.push(format!(
            "group {} at ({}, {}) x{}/{} {:?}",
            group.id, group.pos.x, group.pos.y, group.scale.x, group.scale.y, group.title.text
        ));
    }
    for arrow in board.arrows.iter() {
        lines.push(format!(
            "arrow {} {}:{} -> {}:{} {:?}",
            arrow.id,
            label_for(board, arrow.origin.id),
            arrow.origin.dir,
            label_for(board, arrow.target.id),
            arrow.target.dir,
            arrow.title.text
        ));
    }
    lines.iter().map(|line| format!("{line}\n")).collect()
}

/// The title of a cover or group, or its id when it has none.
fn label_for(board: &Board, id: EntityId) -> String {
    let title = board
        .covers
        .find(id)
        .map(|c| c.title.text.as_str())
        .or_else(|| board.groups.find(id).map(|g| g.title.text.as_str()))
        .unwrap_or_default();
    if title.is_empty() { id.to_string() } else { title.to_owned() }
}

#[cfg(test)]
#[path = "output_test.rs"]
mod tests;
