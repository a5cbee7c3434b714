//! Integration tests for line-at-a-time sessions and the exported table.

use graff::{Class, Pos, Session, Status, compile, import};
use pretty_assertions::assert_eq;
use serde_json::json;

fn tree_strings(session: &Session, ids: &[graff::NodeId]) -> Vec<String> {
    ids.iter()
        .map(|id| session.pool().tree(*id).unwrap().to_string())
        .collect()
}

// ============================================================================
// Incremental parsing
// ============================================================================

#[test]
fn test_line_breaks_do_not_change_the_table() {
    let (whole, whole_outcome) = compile("let f x = x + 1.. f 2.").unwrap();
    let (spread, spread_outcome) = compile("let f x =\n  x + 1..\nf 2.").unwrap();
    assert_eq!(
        whole.export(whole_outcome.root),
        spread.export(spread_outcome.root)
    );
    assert_eq!(tree_strings(&spread, &spread_outcome.values), vec!["3"]);
}

#[test]
fn test_restore_discards_a_failed_line() {
    let mut session = Session::default();
    session.parse_line("1 + 2.");
    let saved = session.checkpoint();

    let highlights = session.parse_line(") 3.");
    assert_eq!(highlights[0].class, Class::Error);
    assert_eq!(session.state().status(), Status::Failed);

    session.restore(saved);
    assert_eq!(session.line(), 1);
    session.parse_line("3 + 4.");
    let outcome = session.finish().unwrap();
    assert_eq!(tree_strings(&session, &outcome.values), vec!["3", "7"]);
}

#[test]
fn test_failed_buffer_reports_the_syntax_error() {
    let mut session = Session::default();
    session.parse_line("[1 2");
    session.parse_line(".");
    let err = session.finish().unwrap_err();
    assert_eq!(err.to_diagnostic().from.line, 1);
}

#[test]
fn test_highlights_cover_comments() {
    let mut session = Session::default();
    let classes: Vec<Class> = session
        .parse_line("1. // one")
        .iter()
        .map(|h| h.class)
        .collect();
    assert_eq!(classes, vec![Class::Number, Class::Punc, Class::Comment]);
}

#[test]
fn test_name_diagnostics_carry_positions() {
    let (_, outcome) = compile("1.\n  foo.").unwrap();
    assert_eq!(outcome.diagnostics.len(), 1);
    let diag = &outcome.diagnostics[0];
    assert_eq!(diag.from, Pos { line: 1, ch: 2 });
    assert_eq!(diag.to, Pos { line: 1, ch: 5 });
    assert_eq!(
        serde_json::to_value(diag).unwrap()["severity"],
        json!("error")
    );
}

// ============================================================================
// Export
// ============================================================================

#[test]
fn test_export_round_trip() {
    let src = "let f x y = x - y.. f 10. {a: [1 'two' true null]}. case q of 1: 2 end.";
    let (session, outcome) = compile(src).unwrap();
    for root in [outcome.parsed, outcome.root] {
        let table = session.export(root);
        let (pool, imported) = import(&table).unwrap();
        assert_eq!(pool.len(), session.pool().len());
        assert_eq!(pool.tree(imported), session.pool().tree(root));
    }
}

#[test]
fn test_export_header_fields() {
    let (session, outcome) = compile("2 + 3.").unwrap();
    let table = session.export(outcome.root);
    assert_eq!(table["root"], json!(outcome.root.index()));
    assert_eq!(table["version"], json!("1"));
    assert!(table.get("0").is_none());
    let value = outcome.values[0];
    assert_eq!(table[value.to_string()], json!(5));
}
