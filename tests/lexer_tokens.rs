//! Lexer round-trip properties over whole token sequences.

mod util;

use ferroc::hygiene::Ident;
use ferroc::lexer::Lexer;
use ferroc::stream::TokenSource;
use ferroc::token::{CoreType, Edition, TokenKind};
use util::lex_kinds;

#[test]
fn let_statement_token_sequence() {
    let toks = lex_kinds("let x: i32 = 0x2A;");
    assert_eq!(
        toks,
        vec![
            TokenKind::KwLet,
            TokenKind::Ident(Ident::plain("x")),
            TokenKind::Colon,
            TokenKind::Ident(Ident::plain("i32")),
            TokenKind::Eq,
            TokenKind::Integer {
                value: 42,
                suffix: CoreType::Any
            },
            TokenKind::Semicolon,
        ]
    );
}

#[test]
fn punctuation_spellings_relex_to_themselves() {
    // Lexing a token's canonical spelling produces exactly that token.
    let kinds = vec![
        TokenKind::BangEq,
        TokenKind::DoubleColon,
        TokenKind::ShlEq,
        TokenKind::DotDotEq,
        TokenKind::DotDot,
        TokenKind::DotDotDot,
        TokenKind::FatArrow,
        TokenKind::RArrow,
        TokenKind::PipePipe,
        TokenKind::ShrEq,
        TokenKind::Question,
    ];
    for kind in kinds {
        let spelling = kind.to_source();
        let relexed = lex_kinds(&spelling);
        assert_eq!(relexed, vec![kind], "spelling {:?}", spelling);
    }
}

#[test]
fn numeric_literals_round_trip_through_formatting() {
    let cases: Vec<(u128, CoreType)> = vec![
        (0, CoreType::Any),
        (42, CoreType::U8),
        (65_535, CoreType::U16),
        (1_000_000, CoreType::I64),
        (9_223_372_036_854_775_807, CoreType::I64),
        (7, CoreType::Usize),
    ];
    for (value, suffix) in cases {
        let kind = TokenKind::Integer { value, suffix };
        let source = kind.to_source();
        let relexed = lex_kinds(&source);
        assert_eq!(relexed, vec![kind], "source {:?}", source);
    }
}

#[test]
fn float_literals_round_trip_through_formatting() {
    for (value, suffix) in [
        (1.5f64, CoreType::Any),
        (0.25, CoreType::F64),
        (2.0, CoreType::F32),
    ] {
        let kind = TokenKind::Float { value, suffix };
        let source = kind.to_source();
        let relexed = lex_kinds(&source);
        assert_eq!(relexed, vec![kind], "source {:?}", source);
    }
}

#[test]
fn string_literals_round_trip_through_escaping() {
    for text in ["plain", "with \"quotes\"", "line\nbreak\tand\0nul", "uni\u{1F600}"] {
        let kind = TokenKind::Str(text.to_string());
        let source = kind.to_source();
        let relexed = lex_kinds(&source);
        assert_eq!(relexed, vec![kind], "source {:?}", source);
    }
}

#[test]
fn positions_track_lines_and_columns() {
    let mut lexer = Lexer::new("pos.rs", "fn\n  main", Edition::E2015);
    let f = lexer.next_token().unwrap();
    assert_eq!(f.span.start.line, 1);
    let m = lexer.next_token().unwrap();
    assert_eq!(m.span.start.line, 2);
    assert!(m.span.start.col >= 3);
}

#[test]
fn keywords_and_raw_identifiers_are_distinct() {
    assert_eq!(lex_kinds("match"), vec![TokenKind::KwMatch]);
    assert_eq!(
        lex_kinds("r#match"),
        vec![TokenKind::Ident(Ident::plain("match"))]
    );
}
