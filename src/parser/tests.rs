use std::rc::Rc;

use crate::ast::{
    BinOp, Expr, ExprKind, ItemKind, Literal, Pattern, PatternKind, StructKind, TypeKind, UniOp,
    UseKind,
};
use crate::token::Edition;

use super::{
    ExprParsing, FileParser, ItemParsing, Parser, PathGenericMode, PathParsing, PatternParsing,
    TypeParsing,
};

fn parser(src: &str) -> FileParser {
    Parser::for_source("test.rs", src, Edition::E2015)
}

fn parser_2018(src: &str) -> FileParser {
    Parser::for_source("test.rs", src, Edition::E2018)
}

fn parse_expr(src: &str) -> Rc<Expr> {
    parser(src).parse_expr().expect("expression parses")
}

fn parse_pattern(src: &str) -> Pattern {
    parser(src).parse_pattern(true).expect("pattern parses")
}

fn parse_type(src: &str) -> crate::ast::Type {
    parser(src).parse_type().expect("type parses")
}

fn parse_items(src: &str) -> Vec<crate::ast::Item> {
    let mut p = parser(src);
    let (_attrs, items) = p.parse_mod_items(true).expect("items parse");
    items
}

fn int_lit(e: &Expr) -> u128 {
    match &e.kind {
        ExprKind::Literal(Literal::Integer { value, .. }) => *value,
        other => panic!("expected integer literal, got {:?}", other),
    }
}

// ---- precedence ----------------------------------------------------------

#[test]
fn multiplication_binds_tighter_than_addition() {
    let e = parse_expr("1 + 2 * 3");
    match &e.kind {
        ExprKind::BinOp {
            op: BinOp::Add,
            left,
            right,
        } => {
            assert_eq!(int_lit(left), 1);
            match &right.kind {
                ExprKind::BinOp {
                    op: BinOp::Mul,
                    left,
                    right,
                } => {
                    assert_eq!(int_lit(left), 2);
                    assert_eq!(int_lit(right), 3);
                }
                other => panic!("expected multiplication on the right, got {:?}", other),
            }
        }
        other => panic!("expected addition at the root, got {:?}", other),
    }
}

#[test]
fn assignment_is_right_associative() {
    let e = parse_expr("a = b = c");
    match &e.kind {
        ExprKind::Assign { op: None, value, .. } => {
            assert!(matches!(value.kind, ExprKind::Assign { .. }));
        }
        other => panic!("expected assignment at the root, got {:?}", other),
    }
}

#[test]
fn negation_applies_to_the_whole_method_call() {
    let e = parse_expr("-x.f()");
    match &e.kind {
        ExprKind::UniOp {
            op: UniOp::Neg,
            value,
        } => {
            assert!(matches!(value.kind, ExprKind::CallMethod { .. }));
        }
        other => panic!("expected unary negation at the root, got {:?}", other),
    }
}

#[test]
fn comparison_binds_looser_than_shift() {
    let e = parse_expr("1 << 2 < 3");
    assert!(matches!(
        e.kind,
        ExprKind::BinOp { op: BinOp::Lt, .. }
    ));
}

#[test]
fn cast_sits_between_additive_and_multiplicative() {
    // `a + b as usize` keeps the cast on the right operand.
    let e = parse_expr("a + b as usize");
    match &e.kind {
        ExprKind::BinOp {
            op: BinOp::Add,
            right,
            ..
        } => assert!(matches!(right.kind, ExprKind::Cast { .. })),
        other => panic!("expected addition at root, got {:?}", other),
    }
}

#[test]
fn logical_operators_nest_correctly() {
    let e = parse_expr("a && b || c && d");
    assert!(matches!(e.kind, ExprKind::BinOp { op: BinOp::Or, .. }));
}

#[test]
fn question_mark_is_postfix() {
    let e = parse_expr("f()?");
    assert!(matches!(
        e.kind,
        ExprKind::UniOp {
            op: UniOp::Try,
            ..
        }
    ));
}

#[test]
fn grouping_parens_are_transparent() {
    let e = parse_expr("(1 + 2) * 3");
    match &e.kind {
        ExprKind::BinOp {
            op: BinOp::Mul,
            left,
            ..
        } => assert!(matches!(left.kind, ExprKind::BinOp { op: BinOp::Add, .. })),
        other => panic!("expected multiplication at root, got {:?}", other),
    }
}

// ---- atoms ---------------------------------------------------------------

#[test]
fn tuple_and_unit_literals() {
    assert!(matches!(parse_expr("()").kind, ExprKind::Tuple(ref v) if v.is_empty()));
    assert!(matches!(parse_expr("(1, 2)").kind, ExprKind::Tuple(ref v) if v.len() == 2));
    assert!(matches!(parse_expr("(1,)").kind, ExprKind::Tuple(ref v) if v.len() == 1));
}

#[test]
fn array_literals() {
    assert!(matches!(
        parse_expr("[1, 2, 3]").kind,
        ExprKind::ArrayList(ref v) if v.len() == 3
    ));
    assert!(matches!(
        parse_expr("[0; 16]").kind,
        ExprKind::ArraySized { .. }
    ));
}

#[test]
fn ranges_parse_inclusive_and_exclusive() {
    assert!(matches!(
        parse_expr("1..5").kind,
        ExprKind::Range {
            inclusive: false,
            ..
        }
    ));
    assert!(matches!(
        parse_expr("1..=5").kind,
        ExprKind::Range {
            inclusive: true,
            ..
        }
    ));
    assert!(matches!(
        parse_expr("..9").kind,
        ExprKind::Range { start: None, .. }
    ));
}

#[test]
fn struct_literal_with_base() {
    let e = parse_expr("Point { x: 1, ..base }");
    match &e.kind {
        ExprKind::StructLiteral { fields, base, .. } => {
            assert_eq!(fields.len(), 1);
            assert!(base.is_some());
        }
        other => panic!("expected struct literal, got {:?}", other),
    }
}

#[test]
fn struct_literals_disabled_in_scrutinees() {
    // `S` must stay a named value so `{` starts the body.
    let e = parse_expr("if S { 1 } else { 2 }");
    match &e.kind {
        ExprKind::If { cond, .. } => {
            assert!(matches!(cond.kind, ExprKind::NamedValue(_)));
        }
        other => panic!("expected if, got {:?}", other),
    }
    // Inside parentheses the restriction lifts.
    let e = parse_expr("if (S { x: 1 }).ok() { 1 } else { 2 }");
    assert!(matches!(e.kind, ExprKind::If { .. }));
}

#[test]
fn match_arms_and_guards() {
    let e = parse_expr("match x { 0 => 1, n if n > 2 => 2, _ => 3 }");
    match &e.kind {
        ExprKind::Match { arms, .. } => {
            assert_eq!(arms.len(), 3);
            assert!(arms[1].guard.is_some());
        }
        other => panic!("expected match, got {:?}", other),
    }
}

#[test]
fn closures_parse() {
    assert!(matches!(parse_expr("|x| x + 1").kind, ExprKind::Closure(_)));
    assert!(matches!(parse_expr("move || 5").kind, ExprKind::Closure(_)));
    assert!(matches!(
        parse_expr("|a: i32| -> i32 { a }").kind,
        ExprKind::Closure(_)
    ));
}

#[test]
fn loop_labels_attach() {
    let e = parse_expr("'outer: loop { break 'outer; }");
    match &e.kind {
        ExprKind::Loop { label, .. } => assert!(label.is_some()),
        other => panic!("expected loop, got {:?}", other),
    }
}

#[test]
fn expression_macro_invocation() {
    let e = parse_expr("vec!(1, 2, 3)");
    assert!(matches!(e.kind, ExprKind::Macro(_)));
}

// ---- paths and generics --------------------------------------------------

#[test]
fn turbofish_in_expression_mode() {
    let mut p = parser("foo::<i32>");
    let path = p.parse_path(PathGenericMode::Expr).unwrap();
    assert_eq!(path.nodes.len(), 1);
    assert_eq!(path.nodes[0].params.types.len(), 1);
}

#[test]
fn nested_generics_split_shift_right() {
    let ty = parse_type("Vec<Vec<i32>>");
    match &ty.kind {
        TypeKind::Path(p) => {
            let inner = &p.nodes[0].params.types[0];
            assert!(matches!(inner.kind, TypeKind::Path(_)));
        }
        other => panic!("expected path type, got {:?}", other),
    }
}

#[test]
fn double_lt_splits_in_ufcs_position() {
    // `<<T as Tr>::Out>::item` opens with `<<`.
    let mut p = parser("<<T as Tr>::Out>::item");
    let path = p.parse_path(PathGenericMode::Expr).unwrap();
    assert_eq!(path.nodes.len(), 1);
}

#[test]
fn crate_string_paths_parse() {
    // The macro expander spells `$crate` as `:: "name" ::`.
    let mut p = parser(":: \"mylib\" :: thing");
    let path = p.parse_path(PathGenericMode::Expr).unwrap();
    assert_eq!(path.nodes.len(), 2);
    assert!(path.nodes[0].name.name.is("mylib"));
}

// ---- types ---------------------------------------------------------------

#[test]
fn reference_and_pointer_types() {
    assert!(matches!(
        parse_type("&mut i32").kind,
        TypeKind::Borrow { .. }
    ));
    assert!(matches!(
        parse_type("*const u8").kind,
        TypeKind::Pointer { is_mut: false, .. }
    ));
    assert!(matches!(parse_type("&&u8").kind, TypeKind::Borrow { .. }));
}

#[test]
fn array_slice_and_tuple_types() {
    assert!(matches!(parse_type("[u8; 4]").kind, TypeKind::Array { .. }));
    assert!(matches!(parse_type("[u8]").kind, TypeKind::Slice(_)));
    assert!(matches!(parse_type("(i32, u8)").kind, TypeKind::Tuple(ref v) if v.len() == 2));
    assert!(matches!(parse_type("()").kind, TypeKind::Unit));
}

#[test]
fn function_and_trait_object_types() {
    assert!(matches!(
        parse_type("fn(i32) -> i32").kind,
        TypeKind::Function { .. }
    ));
    let mut p = parser_2018("dyn Iterator + Send");
    let ty = p.parse_type().unwrap();
    assert!(matches!(ty.kind, TypeKind::TraitObject(ref v) if v.len() == 2));
}

#[test]
fn primitives_are_recognised() {
    assert!(matches!(parse_type("i32").kind, TypeKind::Primitive(_)));
    assert!(matches!(parse_type("bool").kind, TypeKind::Primitive(_)));
    // A user type shadowing a primitive name via a path stays a path.
    assert!(matches!(parse_type("i32::Assoc").kind, TypeKind::Path(_)));
}

// ---- patterns ------------------------------------------------------------

#[test]
fn bare_identifier_is_maybe_bind() {
    assert!(matches!(parse_pattern("x").kind, PatternKind::MaybeBind(_)));
}

#[test]
fn ref_mut_bindings_with_subpattern() {
    let p = parse_pattern("ref mut x @ (a, b)");
    match p.kind {
        PatternKind::Bind { binding, sub } => {
            assert!(binding.by_ref);
            assert!(binding.is_mut);
            assert!(matches!(sub.unwrap().kind, PatternKind::Tuple { .. }));
        }
        other => panic!("expected binding, got {:?}", other),
    }
}

#[test]
fn range_patterns_accept_both_spellings() {
    for src in ["1..=9", "1...9"] {
        match parse_pattern(src).kind {
            PatternKind::Range { inclusive, .. } => assert!(inclusive, "{}", src),
            other => panic!("expected range for {}, got {:?}", src, other),
        }
    }
}

#[test]
fn struct_and_tuple_struct_patterns() {
    assert!(matches!(
        parse_pattern("Point { x, y: 0, .. }").kind,
        PatternKind::Struct {
            is_exhaustive: false,
            ..
        }
    ));
    assert!(matches!(
        parse_pattern("Some(x)").kind,
        PatternKind::NamedTuple { .. }
    ));
    assert!(matches!(
        parse_pattern("(a, .., b)").kind,
        PatternKind::Tuple { has_dots: true, .. }
    ));
}

#[test]
fn slice_patterns_with_rest_binding() {
    match parse_pattern("[first, rest @ .., last]").kind {
        PatternKind::Slice { leading, extra } => {
            assert_eq!(leading.len(), 1);
            let extra = extra.unwrap();
            assert!(extra.binding.is_some());
            assert_eq!(extra.trailing.len(), 1);
        }
        other => panic!("expected slice pattern, got {:?}", other),
    }
}

#[test]
fn or_patterns_at_top_level() {
    assert!(matches!(parse_pattern("1 | 2 | 3").kind, PatternKind::Or(ref v) if v.len() == 3));
}

#[test]
fn negative_literal_patterns() {
    match parse_pattern("-1").kind {
        PatternKind::Value(crate::ast::PatternValue::Integer { value, .. }) => {
            assert_eq!(value, 1u128.wrapping_neg());
        }
        other => panic!("expected value pattern, got {:?}", other),
    }
}

// ---- items ---------------------------------------------------------------

#[test]
fn function_item_with_generics_and_where() {
    let items = parse_items("pub fn id<T: Clone>(x: T) -> T where T: Sized { x }");
    assert_eq!(items.len(), 1);
    match &items[0].kind {
        ItemKind::Fn(f) => {
            assert!(f.name.name.is("id"));
            assert_eq!(f.generics.params.len(), 1);
            assert_eq!(f.generics.where_clauses.len(), 1);
            assert!(f.body.is_some());
        }
        other => panic!("expected fn, got {:?}", other),
    }
}

#[test]
fn struct_forms() {
    let items = parse_items(
        "struct Unit;\nstruct Pair(i32, i32);\nstruct Named { a: u8, b: u8 }",
    );
    assert_eq!(items.len(), 3);
    assert!(matches!(
        items[0].kind,
        ItemKind::Struct {
            kind: StructKind::Unit,
            ..
        }
    ));
    assert!(matches!(
        items[1].kind,
        ItemKind::Struct {
            kind: StructKind::Tuple(_),
            ..
        }
    ));
    assert!(matches!(
        items[2].kind,
        ItemKind::Struct {
            kind: StructKind::Named(_),
            ..
        }
    ));
}

#[test]
fn enum_with_discriminants_and_payloads() {
    let items = parse_items("enum E { A, B = 3, C(i32), D { x: u8 } }");
    match &items[0].kind {
        ItemKind::Enum { variants, .. } => {
            assert_eq!(variants.len(), 4);
            assert!(variants[1].discriminant.is_some());
        }
        other => panic!("expected enum, got {:?}", other),
    }
}

#[test]
fn impl_block_with_trait() {
    let items = parse_items("impl Clone for Foo { fn clone(&self) -> Foo { x } }");
    match &items[0].kind {
        ItemKind::Impl {
            trait_path, items, ..
        } => {
            assert!(trait_path.is_some());
            assert_eq!(items.len(), 1);
        }
        other => panic!("expected impl, got {:?}", other),
    }
}

#[test]
fn use_groups_flatten() {
    let items = parse_items("use a::{b, c as d, self};");
    assert_eq!(items.len(), 3);
    assert!(matches!(
        &items[1].kind,
        ItemKind::Use {
            kind: UseKind::Named(Some(_)),
            ..
        }
    ));
}

#[test]
fn use_glob() {
    let items = parse_items("use a::b::*;");
    assert!(matches!(
        &items[0].kind,
        ItemKind::Use {
            kind: UseKind::Glob,
            ..
        }
    ));
}

#[test]
fn extern_block_with_declarations() {
    let items = parse_items("extern \"C\" { fn puts(s: *const u8) -> i32; }");
    match &items[0].kind {
        ItemKind::ExternBlock { abi, items } => {
            assert_eq!(abi, "C");
            match &items[0].kind {
                ItemKind::Fn(f) => assert!(f.body.is_none()),
                other => panic!("expected fn declaration, got {:?}", other),
            }
        }
        other => panic!("expected extern block, got {:?}", other),
    }
}

#[test]
fn macro_definition_item() {
    let items = parse_items("macro_rules! four { () => { 4 }; }");
    match &items[0].kind {
        ItemKind::MacroDef { name, rules } => {
            assert!(name.name.is("four"));
            assert_eq!(rules.rules.len(), 1);
        }
        other => panic!("expected macro definition, got {:?}", other),
    }
}

#[test]
fn item_macro_invocation_requires_semicolon_for_parens() {
    let items = parse_items("make_thing!(a, b);");
    assert!(matches!(items[0].kind, ItemKind::MacroInvocation(_)));
    let mut p = parser("make_thing!(a, b)");
    assert!(p.parse_item().is_err());
}

#[test]
fn doc_comments_become_attributes() {
    let items = parse_items("/// Adds one.\nfn f() {}");
    assert_eq!(items[0].attrs.len(), 1);
    assert!(items[0].attrs[0].is_named("doc"));
    assert_eq!(items[0].attrs[0].string_value(), Some(" Adds one."));
}

#[test]
fn inner_attributes_collect_at_module_level() {
    let mut p = parser("#![feature]\nfn f() {}");
    let (inner, items) = p.parse_mod_items(true).unwrap();
    assert_eq!(inner.len(), 1);
    assert_eq!(items.len(), 1);
}

#[test]
fn statements_require_semicolons_except_block_like() {
    let e = parse_expr("{ if a { } let x = 1; x }");
    match &e.kind {
        ExprKind::Block(block) => {
            assert_eq!(block.stmts.len(), 2);
            assert!(block.tail.is_some());
        }
        other => panic!("expected block, got {:?}", other),
    }
    assert!(parser("{ f() g() }").parse_expr().is_err());
}

#[test]
fn nested_module_items() {
    let items = parse_items("mod inner { pub fn f() {} }");
    match &items[0].kind {
        ItemKind::Module {
            items: Some(sub), ..
        } => assert_eq!(sub.len(), 1),
        other => panic!("expected module, got {:?}", other),
    }
}

#[test]
fn edition_gates_async_keyword() {
    // 2015: `async` is a plain identifier usable as a name.
    let items = parse_items("fn async() {}");
    assert!(matches!(items[0].kind, ItemKind::Fn(_)));
    // 2018: it is reserved, so the same source fails.
    let mut p = parser_2018("fn async() {}");
    assert!(p.parse_item().is_err());
}
