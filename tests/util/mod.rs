//! Shared helpers for the integration suites.

#![allow(dead_code)]

use std::rc::Rc;

use ferroc::ast::{Expr, Item};
use ferroc::lexer::Lexer;
use ferroc::macros::{expand_to_tokens, invoke_rules, MacroRulesDef};
use ferroc::mir::module::ModuleTree;
use ferroc::parser::{ExprParsing, ItemParsing, Parser, TtParsing};
use ferroc::stream::TokenSource;
use ferroc::token::{Edition, Span, Token, TokenKind};
use ferroc::tokentree::TokenTree;

pub fn lex_kinds(src: &str) -> Vec<TokenKind> {
    let mut lexer = Lexer::new("test.rs", src, Edition::E2015);
    let mut out = Vec::new();
    loop {
        let tok = lexer.next_token().expect("lex failure");
        if tok.is_eof() {
            break;
        }
        out.push(tok.kind);
    }
    out
}

pub fn parse_expr(src: &str) -> Rc<Expr> {
    Parser::for_source("test.rs", src, Edition::E2015)
        .parse_expr()
        .expect("expression parses")
}

pub fn parse_items(src: &str) -> Vec<Item> {
    let mut p = Parser::for_source("test.rs", src, Edition::E2015);
    let (_attrs, items) = p.parse_mod_items(true).expect("items parse");
    items
}

/// Parse `macro_rules! name { ... }` source into a definition.
pub fn parse_macro_def(src: &str) -> Rc<MacroRulesDef> {
    let items = parse_items(src);
    match &items[0].kind {
        ferroc::ast::ItemKind::MacroDef { rules, .. } => {
            let mut def = (**rules).clone();
            def.crate_name = Some("testcrate".to_string());
            Rc::new(def)
        }
        other => panic!("expected macro definition, got {:?}", other),
    }
}

/// Parse an invocation argument like `(1, 2, 3)` into a token tree.
pub fn parse_invocation_input(src: &str) -> TokenTree {
    let mut p = Parser::for_source("invoke.rs", src, Edition::E2015);
    p.parse_tt().expect("invocation input parses")
}

/// Match + expand, returning the output token kinds.
pub fn expand_macro(def: &MacroRulesDef, input_src: &str) -> Result<Vec<Token>, ferroc::ParseError>
{
    let input = parse_invocation_input(input_src);
    let expander = invoke_rules(def, &input, Span::null())?;
    expand_to_tokens(expander)
}

/// Match + expand, then parse the expansion as a single expression.
pub fn expand_macro_to_expr(def: &MacroRulesDef, input_src: &str) -> Rc<Expr> {
    let input = parse_invocation_input(input_src);
    let expander = invoke_rules(def, &input, Span::null()).expect("a rule matches");
    let mut parser = Parser::new(expander);
    let expr = parser.parse_expr().expect("expansion parses as expression");
    let tail = parser.get().expect("stream readable");
    assert!(tail.is_eof(), "trailing tokens after expansion: {:?}", tail);
    expr
}

pub fn load_mir(src: &str) -> ModuleTree {
    let mut tree = ModuleTree::new();
    tree.load_source("test.mir", src, None).expect("IR loads");
    tree
}

pub fn render_tokens(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| t.kind.to_source())
        .collect::<Vec<_>>()
        .join(" ")
}
