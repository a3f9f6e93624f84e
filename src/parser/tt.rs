//! Token-tree capture: single balanced trees and the fragment sub-grammars
//! used by the macro engine.

use std::rc::Rc;

use crate::ast::Block;
use crate::error::{PResult, ParseError, ParseErrorKind};
use crate::macros::FragmentKind;
use crate::stream::TokenSource;
use crate::token::{Fragment, Token, TokenKind};
use crate::tokentree::{Delim, TokenTree};

use super::expr::ExprParsing;
use super::item::ItemParsing;
use super::paths::{PathGenericMode, PathParsing};
use super::pattern::PatternParsing;
use super::types::TypeParsing;
use super::Parser;

pub trait TtParsing {
    /// Parse exactly one token tree: a single token, or a balanced group.
    fn parse_tt(&mut self) -> PResult<TokenTree>;
    /// Run the sub-grammar for `kind` and return the capture as a token
    /// tree (an interpolated token for the AST-producing fragments).
    fn parse_fragment(&mut self, kind: FragmentKind) -> PResult<TokenTree>;
}

impl<S: TokenSource> TtParsing for Parser<S> {
    fn parse_tt(&mut self) -> PResult<TokenTree> {
        let tok = self.get()?;
        let edition = self.edition();
        let hygiene = self.lex.hygiene();
        match Delim::from_open(&tok.kind) {
            Some(delim) => {
                let open_span = tok.span;
                let close = delim.close_token().expect("open delim has close");
                let mut children = Vec::new();
                loop {
                    let next = self.peek(0)?;
                    if next.same_kind(&close) {
                        self.get()?;
                        break;
                    }
                    if next.is_eof() {
                        return Err(ParseError::new(
                            ParseErrorKind::Unterminated("token tree group"),
                            open_span,
                        ));
                    }
                    children.push(self.parse_tt()?);
                }
                Ok(TokenTree::Group {
                    delim,
                    edition,
                    hygiene,
                    span: open_span.to(self.span()),
                    children,
                })
            }
            None => match tok.kind {
                TokenKind::ParenClose | TokenKind::BracketClose | TokenKind::BraceClose => Err(
                    ParseError::unexpected(tok.kind, "a token tree", tok.span),
                ),
                TokenKind::Eof => Err(ParseError::eof(tok.span)),
                _ => Ok(TokenTree::leaf(edition, hygiene, tok)),
            },
        }
    }

    fn parse_fragment(&mut self, kind: FragmentKind) -> PResult<TokenTree> {
        let edition = self.edition();
        let hygiene = self.lex.hygiene();
        let start = self.span();
        let frag = match kind {
            FragmentKind::Tt => return self.parse_tt(),
            FragmentKind::Ident => {
                let tok = self.get()?;
                return match tok.kind {
                    TokenKind::Ident(_) => Ok(TokenTree::leaf(edition, hygiene, tok)),
                    other => Err(ParseError::unexpected(other, "identifier", tok.span)),
                };
            }
            FragmentKind::Expr => Fragment::Expr(self.parse_expr()?),
            FragmentKind::Ty => Fragment::Ty(Rc::new(self.parse_type()?)),
            FragmentKind::Pat => Fragment::Pat(Rc::new(self.parse_pattern(false)?)),
            FragmentKind::Stmt => Fragment::Stmt(Rc::new(self.parse_stmt()?)),
            FragmentKind::Block => Fragment::Block(Rc::new(self.parse_braced_block()?)),
            FragmentKind::Path => {
                Fragment::Path(Rc::new(self.parse_path(PathGenericMode::Type)?))
            }
            FragmentKind::Meta => Fragment::Meta(Rc::new(self.parse_meta_item()?)),
        };
        let span = start.to(self.span());
        Ok(TokenTree::leaf(
            edition,
            hygiene,
            Token::new(TokenKind::Interpolated(frag), span),
        ))
    }
}

impl<S: TokenSource> Parser<S> {
    fn parse_braced_block(&mut self) -> PResult<Block> {
        if !matches!(self.peek(0)?, TokenKind::BraceOpen) {
            let tok = self.get()?;
            return Err(self.err_unexpected(tok, "a block"));
        }
        self.parse_block()
    }
}
