//! Field-attributed validation results.
//!
//! Every check in the crate appends `Issue`s to a `Report` instead of
//! returning on the first failure, so callers see every broken field at once.
//! `ValidationError::primary` picks the single message shown to a user: the
//! first bound violation if there is one, otherwise the first issue.

#[cfg(test)]
#[path = "validation_test.rs"]
mod validation_test;

use std::fmt;

use crate::doc::EntityId;

/// What is wrong with one field.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IssueKind {
    #[error("must be at most {max}")]
    TooBig { max: f64 },
    #[error("must be at least {min}")]
    TooSmall { min: f64 },
    #[error("must be at most {max} characters")]
    TooLong { max: usize },
    #[error("must contain at most {max} items (found {found})")]
    TooMany { max: usize, found: usize },
    #[error("expected {expected}")]
    InvalidType { expected: &'static str },
    #[error("expected one of: {}", .allowed.join(", "))]
    InvalidEnum { allowed: &'static [&'static str] },
    #[error("must be a multiple of {step}")]
    InvalidStep { step: f64 },
    #[error("invalid format: {0}")]
    InvalidFormat(&'static str),
    #[error("required")]
    Missing,
    #[error("duplicate")]
    Duplicate,
    #[error("origin and target must differ")]
    SelfLink,
    #[error("references unknown entity {0}")]
    UnknownReference(EntityId),
    #[error("malformed: {0}")]
    Malformed(String),
}

impl IssueKind {
    /// Whether this is a "value too large / bound exceeded" issue.
    #[must_use]
    pub fn is_too_big(&self) -> bool {
        matches!(self, Self::TooBig { .. } | Self::TooLong { .. } | Self::TooMany { .. })
    }
}

/// One failing field, addressed by a dotted path such as `covers.3.pos.x`.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub path: String,
    pub kind: IssueKind,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.path, self.kind)
        }
    }
}

/// Accumulates issues during a validation pass.
#[derive(Debug, Default)]
pub struct Report {
    issues: Vec<Issue>,
}

impl Report {
    pub fn push(&mut self, path: impl Into<String>, kind: IssueKind) {
        self.issues.push(Issue { path: path.into(), kind });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// `Ok` when nothing was reported, otherwise every issue as one error.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` carrying all reported issues.
    pub fn finish(self) -> Result<(), ValidationError> {
        if self.issues.is_empty() { Ok(()) } else { Err(ValidationError { issues: self.issues }) }
    }
}

/// A failed validation with every violation found.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    issues: Vec<Issue>,
}

impl ValidationError {
    /// Build an error from a single issue.
    #[must_use]
    pub fn single(path: impl Into<String>, kind: IssueKind) -> Self {
        Self { issues: vec![Issue { path: path.into(), kind }] }
    }

    #[must_use]
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// The representative issue: first bound violation, else first issue.
    #[must_use]
    pub fn primary(&self) -> Option<&Issue> {
        self.issues
            .iter()
            .find(|issue| issue.kind.is_too_big())
            .or_else(|| self.issues.first())
    }

    /// User-facing message for the representative issue.
    #[must_use]
    pub fn primary_message(&self) -> String {
        self.primary()
            .map_or_else(|| "invalid board".to_owned(), ToString::to_string)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.primary_message())?;
        let rest = self.issues.len().saturating_sub(1);
        if rest > 0 {
            write!(f, " (and {rest} more)")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
