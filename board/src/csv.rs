//! CSV exchange for cover lists.
//!
//! The format is two columns, `title,subtitle`, with a header row. Fields
//! follow RFC 4180 quoting: a quoted field may contain commas, doubled
//! quotes, and line breaks.

#[cfg(test)]
#[path = "csv_test.rs"]
mod csv_test;

use crate::consts::MAX_COVERS;
use crate::doc::Cover;
use crate::search::SearchQuery;

const HEADER: [&str; 2] = ["title", "subtitle"];

/// Errors from reading a cover CSV.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CsvError {
    #[error("empty file: expected a `title,subtitle` header")]
    MissingHeader,

    #[error("header must be `title,subtitle`, found `{0}`")]
    BadHeader(String),

    #[error("line {line}: unterminated quoted field")]
    UnterminatedQuote { line: usize },

    #[error("line {line}: expected 2 columns, found {found}")]
    WrongColumnCount { line: usize, found: usize },

    #[error("at most {max} rows allowed, found {found}")]
    TooManyRows { max: usize, found: usize },
}

/// Parse a `title,subtitle` CSV into search queries. Blank lines are skipped.
///
/// # Errors
///
/// Returns a [`CsvError`] for a missing or wrong header, malformed quoting,
/// rows without exactly two columns, or more rows than a board can hold.
pub fn parse_queries(text: &str) -> Result<Vec<SearchQuery>, CsvError> {
    let mut rows = parse_rows(text)?.into_iter();
    let Some((_, header)) = rows.next() else {
        return Err(CsvError::MissingHeader);
    };
    let normalized: Vec<String> = header.iter().map(|h| h.trim().to_ascii_lowercase()).collect();
    if normalized != HEADER {
        return Err(CsvError::BadHeader(header.join(",")));
    }

    let mut queries = Vec::new();
    for (line, row) in rows {
        let [title, subtitle] = <[String; 2]>::try_from(row)
            .map_err(|row| CsvError::WrongColumnCount { line, found: row.len() })?;
        queries.push(SearchQuery { title: title.trim().to_owned(), subtitle: subtitle.trim().to_owned() });
    }
    if queries.len() > MAX_COVERS {
        return Err(CsvError::TooManyRows { max: MAX_COVERS, found: queries.len() });
    }
    Ok(queries)
}

/// Write one `title,subtitle` row per cover, in draw order.
#[must_use]
pub fn write_covers(covers: &[Cover]) -> String {
    let mut out = HEADER.join(",");
    out.push('\n');
    for cover in covers {
        out.push_str(&escape(&cover.title.text));
        out.push(',');
        out.push_str(&escape(&cover.subtitle.text));
        out.push('\n');
    }
    out
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

/// Split `text` into rows of fields, tagging each row with its 1-based
/// starting line. Rows that are entirely empty are dropped.
fn parse_rows(text: &str) -> Result<Vec<(usize, Vec<String>)>, CsvError> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut row_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                row.push(std::mem::take(&mut field));
                finish_row(&mut rows, std::mem::take(&mut row), row_line);
                line += 1;
                row_line = line;
            }
            _ => field.push(c),
        }
    }
    if in_quotes {
        return Err(CsvError::UnterminatedQuote { line: row_line });
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        finish_row(&mut rows, row, row_line);
    }
    Ok(rows)
}

fn finish_row(rows: &mut Vec<(usize, Vec<String>)>, row: Vec<String>, line: usize) {
    let blank = row.iter().all(|f| f.trim().is_empty());
    if !blank {
        rows.push((line, row));
    }
}
