use super::*;

fn report(issues: &[(&str, IssueKind)]) -> Report {
    let mut report = Report::default();
    for (path, kind) in issues {
        report.push(*path, kind.clone());
    }
    report
}

#[test]
fn empty_report_finishes_ok() {
    assert!(Report::default().finish().is_ok());
}

#[test]
fn primary_prefers_first_bound_violation() {
    let err = report(&[
        ("covers.0.title.dir", IssueKind::InvalidEnum { allowed: &["left", "right"] }),
        ("covers.1.pos.x", IssueKind::TooBig { max: 9_850.0 }),
        ("covers", IssueKind::TooMany { max: 25, found: 30 }),
    ])
    .finish()
    .unwrap_err();
    assert_eq!(err.primary().unwrap().path, "covers.1.pos.x");
    assert_eq!(err.primary_message(), "covers.1.pos.x: must be at most 9850");
}

#[test]
fn primary_falls_back_to_first_issue() {
    let err = report(&[("configs.media", IssueKind::Missing), ("covers.0.id", IssueKind::Duplicate)])
        .finish()
        .unwrap_err();
    assert_eq!(err.primary().unwrap().path, "configs.media");
}

#[test]
fn too_long_counts_as_bound_violation() {
    assert!(IssueKind::TooLong { max: 256 }.is_too_big());
    assert!(IssueKind::TooMany { max: 1, found: 2 }.is_too_big());
    assert!(!IssueKind::TooSmall { min: 0.0 }.is_too_big());
    assert!(!IssueKind::SelfLink.is_too_big());
}

#[test]
fn display_counts_remaining_issues() {
    let err = report(&[
        ("a", IssueKind::Missing),
        ("b", IssueKind::Missing),
        ("c", IssueKind::Missing),
    ])
    .finish()
    .unwrap_err();
    assert_eq!(err.to_string(), "a: required (and 2 more)");
    assert_eq!(err.issues().len(), 3);
}

#[test]
fn root_issue_has_no_path_prefix() {
    let err = ValidationError::single("", IssueKind::InvalidType { expected: "object" });
    assert_eq!(err.to_string(), "expected object");
}

#[test]
fn enum_issue_lists_allowed_values() {
    let kind = IssueKind::InvalidEnum { allowed: &["music", "book"] };
    assert_eq!(kind.to_string(), "expected one of: music, book");
}
