//! Macro-rules engine: matching, captures, repetition, expansion.

mod util;

use ferroc::ast::{BinOp, ExprKind, Literal};
use ferroc::error::ParseErrorKind;
use util::{expand_macro, expand_macro_to_expr, parse_macro_def, render_tokens};

#[test]
fn expr_capture_splices_into_body() {
    let def = parse_macro_def("macro_rules! inc { ($x:expr) => { $x + 1 }; }");
    let tokens = expand_macro(&def, "(2 + 3)").unwrap();
    // The captured expression is one interpolated token.
    assert_eq!(render_tokens(&tokens), "(2 + 3) + 1");
}

#[test]
fn comma_separated_repetition_builds_array() {
    let def = parse_macro_def("macro_rules! arr { ($($x:expr),*) => { [$($x),*] }; }");
    let tokens = expand_macro(&def, "(1, 2, 3)").unwrap();
    assert_eq!(render_tokens(&tokens), "[ 1 , 2 , 3 ]");
    let e = expand_macro_to_expr(&def, "(1, 2, 3)");
    assert!(matches!(e.kind, ExprKind::ArrayList(ref v) if v.len() == 3));
}

#[test]
fn empty_repetition_matches_zero_iterations() {
    let def = parse_macro_def("macro_rules! arr { ($($x:expr),*) => { [$($x),*] }; }");
    let tokens = expand_macro(&def, "()").unwrap();
    assert_eq!(render_tokens(&tokens), "[ ]");
}

#[test]
fn optional_trailing_separator_is_accepted() {
    let def = parse_macro_def(
        "macro_rules! m { ($($a:ident = $b:expr);* $(;)?) => { [$($b),*] }; }",
    );
    assert!(expand_macro(&def, "(x = 1; y = 2)").is_ok());
    assert!(expand_macro(&def, "(x = 1; y = 2;)").is_ok());
}

#[test]
fn two_loops_may_have_different_counts() {
    let def = parse_macro_def(
        "macro_rules! m { ($($a:ident),+ ; $($b:expr),+) => { [$($b),*] }; }",
    );
    let tokens = expand_macro(&def, "(a, b ; 1, 2, 3)").unwrap();
    assert_eq!(render_tokens(&tokens), "[ 1 , 2 , 3 ]");
}

#[test]
fn multiple_rules_try_in_source_order() {
    let def = parse_macro_def(
        "macro_rules! m { () => { 0 }; ($x:expr) => { $x }; ($x:expr, $y:expr) => { $x + $y }; }",
    );
    assert_eq!(render_tokens(&expand_macro(&def, "()").unwrap()), "0");
    assert_eq!(render_tokens(&expand_macro(&def, "(7)").unwrap()), "7");
    assert_eq!(
        render_tokens(&expand_macro(&def, "(7, 8)").unwrap()),
        "7 + 8"
    );
}

#[test]
fn literal_tokens_must_match_exactly() {
    let def = parse_macro_def("macro_rules! m { (go $x:ident) => { $x }; }");
    assert!(expand_macro(&def, "(go now)").is_ok());
    assert!(expand_macro(&def, "(stop now)").is_err());
}

#[test]
fn nested_groups_in_input_are_matched_structurally() {
    let def = parse_macro_def("macro_rules! m { ([$x:expr]) => { $x }; }");
    assert_eq!(render_tokens(&expand_macro(&def, "([42])").unwrap()), "42");
}

#[test]
fn tt_capture_takes_one_tree() {
    let def = parse_macro_def("macro_rules! m { ($t:tt $u:tt) => { $u $t }; }");
    let tokens = expand_macro(&def, "(a (b c))").unwrap();
    assert_eq!(render_tokens(&tokens), "( b c ) a");
}

#[test]
fn ident_and_type_fragments() {
    let def = parse_macro_def(
        "macro_rules! decl { ($n:ident : $t:ty) => { let $n: $t = 0; }; }",
    );
    let tokens = expand_macro(&def, "(count : u64)").unwrap();
    assert_eq!(render_tokens(&tokens), "let count : u64 = 0 ;");
}

#[test]
fn dollar_crate_expands_to_crate_identity() {
    let def = parse_macro_def("macro_rules! m { () => { $crate::helper() }; }");
    let tokens = expand_macro(&def, "()").unwrap();
    assert_eq!(
        render_tokens(&tokens),
        ":: \"testcrate\" :: helper ( )"
    );
}

// ---- negative cases ------------------------------------------------------

#[test]
fn plus_loop_rejects_empty_input() {
    let def = parse_macro_def("macro_rules! m { ($($x:expr),+) => { [$($x),*] }; }");
    assert!(expand_macro(&def, "()").is_err());
}

#[test]
fn sibling_captures_with_mismatched_counts_fail_expansion() {
    let def = parse_macro_def(
        "macro_rules! m { ($($a:ident),* ; $($b:expr),*) => { [$( ($a, $b) ),*] }; }",
    );
    let err = expand_macro(&def, "(x ; 1, 2)").unwrap_err();
    assert!(
        matches!(err.kind, ParseErrorKind::IterationCountMismatch),
        "got {:?}",
        err.kind
    );
}

#[test]
fn expr_fragment_rejects_bare_comma_without_consuming() {
    let def = parse_macro_def("macro_rules! m { ($x:expr) => { $x }; (,) => { 9 }; }");
    // The first rule's expr fragment must fail cleanly so the second rule
    // still sees the comma.
    let tokens = expand_macro(&def, "(,)").unwrap();
    assert_eq!(render_tokens(&tokens), "9");
}

#[test]
fn unmatched_input_reports_the_last_rule_failure() {
    let def = parse_macro_def("macro_rules! m { (a) => { 1 }; (b) => { 2 }; }");
    assert!(expand_macro(&def, "(c)").is_err());
}

#[test]
fn partial_match_fails_the_rule() {
    // Matching must consume the whole invocation.
    let def = parse_macro_def("macro_rules! m { ($x:expr) => { $x }; }");
    assert!(expand_macro(&def, "(1 2)").is_err());
}

#[test]
fn capture_reuse_across_layers() {
    // A layer-0 capture is repeated for every iteration of the loop.
    let def = parse_macro_def(
        "macro_rules! m { ($base:ident : $($x:expr),*) => { [$( $base + $x ),*] }; }",
    );
    let tokens = expand_macro(&def, "(b : 1, 2)").unwrap();
    assert_eq!(render_tokens(&tokens), "[ b + 1 , b + 2 ]");
}

#[test]
fn expansion_parses_with_correct_precedence() {
    let def = parse_macro_def("macro_rules! double { ($x:expr) => { 2 * $x }; }");
    // The captured `1 + 3` stays one expression node inside the body.
    let e = expand_macro_to_expr(&def, "(1 + 3)");
    match &e.kind {
        ExprKind::BinOp {
            op: BinOp::Mul,
            left,
            right,
        } => {
            assert!(matches!(
                left.kind,
                ExprKind::Literal(Literal::Integer { value: 2, .. })
            ));
            assert!(matches!(right.kind, ExprKind::BinOp { op: BinOp::Add, .. }));
        }
        other => panic!("expected multiplication, got {:?}", other),
    }
}
