//! Parse → dump → re-parse → dump: the two dumps must agree.

mod util;

use ferroc::dump::{dump_crate, expr_to_string};
use ferroc::parser::{ExprParsing, ItemParsing, Parser};
use ferroc::token::Edition;
use util::{parse_expr, parse_items};

fn round_trip_items(src: &str) {
    let items = parse_items(src);
    let first = dump_crate(&items);
    let mut p = Parser::for_source("redump.rs", &first, Edition::E2015);
    let (_attrs, items2) = p
        .parse_mod_items(true)
        .unwrap_or_else(|e| panic!("re-parse failed for:\n{}\nerror: {}", first, e));
    let second = dump_crate(&items2);
    assert_eq!(first, second, "dump not stable for:\n{}", src);
}

fn round_trip_expr(src: &str) {
    let e = parse_expr(src);
    let first = expr_to_string(&e);
    let e2 = Parser::for_source("redump.rs", &first, Edition::E2015)
        .parse_expr()
        .unwrap_or_else(|err| panic!("re-parse failed for `{}`: {}", first, err));
    let second = expr_to_string(&e2);
    assert_eq!(first, second, "dump not stable for `{}`", src);
}

#[test]
fn expressions_round_trip() {
    for src in [
        "1 + 2 * 3",
        "a = b = c",
        "-x.f()",
        "(1 + 2) * 3",
        "foo(1, bar(2), [3; 4])",
        "x[1].y.0",
        "&mut p.q",
        "*ptr as usize + 1",
        "if a < b { a } else { b }",
        "match v { 0 => 1, _ => 2 }",
        "loop { break 7; }",
        "while let Some(x) = it.next() { go(x); }",
        "|a, b| a + b",
        "s.method::<u8>(1)",
        "1..10",
        "t
            .call()",
    ] {
        round_trip_expr(src);
    }
}

#[test]
fn items_round_trip() {
    for src in [
        "fn add(a: i32, b: i32) -> i32 { a + b }",
        "pub struct Point { x: i32, y: i32 }",
        "struct Wrapper(pub u8);",
        "enum E { A, B(i32), C { f: u8 } }",
        "trait Greet { fn hi(&self) -> u8; }",
        "impl Greet for Point { fn hi(&self) -> u8 { 1 } }",
        "use a::b;\nuse c::d as e;\nuse f::*;",
        "static COUNT: u64 = 0;",
        "const MAX: usize = 1024;",
        "type Alias<T> = Vec<T>;",
        "mod inner { fn f() {} }",
        "extern \"C\" { fn puts(s: *const u8) -> i32; }",
        "fn generic<T: Clone, U>(t: T) -> T where U: Send { t }",
        "/// doc line\nfn documented() {}",
    ] {
        round_trip_items(src);
    }
}

#[test]
fn patterns_round_trip_inside_items() {
    round_trip_items(
        "fn f(v: E) -> i32 {\n    match v {\n        E::A => 0,\n        E::B(ref x) => 1,\n        E::C { f, .. } => 2,\n        [a, rest @ .., b] => 3,\n        1..=9 => 4,\n        _ => 5,\n    }\n}",
    );
}
