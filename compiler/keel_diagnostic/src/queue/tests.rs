use pretty_assertions::assert_eq;

use super::*;

fn error(msg: &str) -> Diagnostic {
    Diagnostic::error(ErrorCode::E5002).with_message(msg)
}

#[test]
fn test_error_count_and_guarantee() {
    let mut queue = DiagnosticQueue::new();
    assert!(queue.has_errors().is_none());
    let _ = queue.emit_error(error("index 1 is initialized more than once"), 3, 1);
    assert_eq!(queue.error_count(), 1);
    assert!(queue.has_errors().is_some());
}

#[test]
fn test_dedup_same_line_same_prefix() {
    let mut queue = DiagnosticQueue::new();
    assert!(queue.add(error("too many initializers"), 4, 1));
    assert!(!queue.add(error("too many initializers"), 4, 9));
    assert!(queue.add(error("too many initializers"), 5, 1));
    assert_eq!(queue.error_count(), 2);
}

#[test]
fn test_distinct_messages_on_one_line_are_kept() {
    let mut queue = DiagnosticQueue::new();
    assert!(queue.add(error("index 1 is initialized more than once"), 2, 1));
    assert!(queue.add(error("index 2 is initialized more than once"), 2, 5));
    assert_eq!(queue.error_count(), 2);
}

#[test]
fn test_error_limit() {
    let mut queue = DiagnosticQueue::with_config(DiagnosticConfig {
        error_limit: 2,
        deduplicate: false,
    });
    assert!(queue.add(error("a"), 1, 1));
    assert!(queue.add(error("b"), 2, 1));
    assert!(queue.limit_reached());
    assert!(!queue.add(error("c"), 3, 1));
    assert_eq!(queue.error_count(), 2);

    let codes: Vec<_> = queue.flush().iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::E5002, ErrorCode::E5002, ErrorCode::E9002]);
}

#[test]
fn test_unlimited_never_aborts() {
    let mut queue = DiagnosticQueue::with_config(DiagnosticConfig::unlimited());
    for line in 1..=30 {
        queue.add(error("x"), line, 1);
    }
    assert!(queue.peek().all(|d| d.code != ErrorCode::E9002));
}

#[test]
fn test_unlimited_keeps_duplicates() {
    let mut queue = DiagnosticQueue::with_config(DiagnosticConfig::unlimited());
    for _ in 0..20 {
        assert!(queue.add(error("same"), 1, 1));
    }
    assert_eq!(queue.error_count(), 20);
}

#[test]
fn test_flush_sorts_and_resets() {
    let mut queue = DiagnosticQueue::new();
    queue.add(error("late"), 9, 1);
    queue.add(error("early"), 1, 1);
    let flushed = queue.flush();
    let messages: Vec<_> = flushed.iter().map(|d| d.message.as_str()).collect();
    assert_eq!(messages, vec!["early", "late"]);
    assert_eq!(queue.error_count(), 0);
    assert_eq!(queue.peek().count(), 0);
}

#[test]
fn test_too_many_errors() {
    let diag = too_many_errors(10, Span::DUMMY);
    assert_eq!(diag.code, ErrorCode::E9002);
    assert!(diag.message.contains("10"));
}
