use pretty_assertions::assert_eq;

use super::*;

#[test]
fn builder_collects_parts() {
    let diag = Diagnostic::error(ErrorCode::E5002)
        .with_message("index 1 is initialized more than once")
        .with_label(Span::new(10, 12), "second initialization")
        .with_secondary_label(Span::new(2, 4), "first initialization")
        .with_note("each index may appear once");
    assert!(diag.is_error());
    assert_eq!(diag.labels.len(), 2);
    assert_eq!(diag.primary_span(), Some(Span::new(10, 12)));
    assert_eq!(diag.notes, vec!["each index may appear once".to_owned()]);
}

#[test]
fn display_format() {
    let diag = Diagnostic::error(ErrorCode::E5001)
        .with_message("too many initializers")
        .with_note("array has 2 elements");
    assert_eq!(
        diag.to_string(),
        "error[E5001]: too many initializers\n  = note: array has 2 elements"
    );
}

#[test]
fn warnings_are_not_errors() {
    let diag = Diagnostic::warning(ErrorCode::E5003);
    assert!(!diag.is_error());
    assert_eq!(diag.primary_span(), None);
}

#[test]
fn internal_error_uses_ice_code() {
    let diag = internal_error(Span::DUMMY, "size mismatch");
    assert_eq!(diag.code, ErrorCode::E9001);
    assert!(diag.message.contains("size mismatch"));
}
