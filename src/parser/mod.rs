//! Recursive-descent parser.
//!
//! `Parser` wraps a `TokenStream` over any token source: the lexer for
//! files, token-tree streams for macro input, the macro expander for
//! expansion output. The grammar is split into extension traits per area;
//! every parse function documents whether it consumes trailing tokens.
//! Errors unwind to the nearest statement or item boundary.

mod expr;
mod item;
mod paths;
mod pattern;
mod tt;
mod types;

#[cfg(test)]
mod tests;

pub use expr::{tok_starts_expr, ExprParsing};
pub use item::ItemParsing;
pub use paths::{PathGenericMode, PathParsing};
pub use pattern::PatternParsing;
pub use tt::TtParsing;
pub use types::TypeParsing;

use std::ops::{Deref, DerefMut};

use crate::error::{PResult, ParseError, ParseErrorKind};
use crate::hygiene::Ident;
use crate::lexer::Lexer;
use crate::stream::{OwnedTtStream, ParseState, TokenSource, TokenStream};
use crate::token::{Edition, Span, Token, TokenKind};

pub struct Parser<S: TokenSource> {
    pub lex: TokenStream<S>,
}

/// Parser over a source file.
pub type FileParser = Parser<Lexer>;
/// Parser over an owned token tree; cheap to clone for speculation.
pub type TtParser = Parser<OwnedTtStream>;

impl<S: TokenSource> Parser<S> {
    pub fn new(src: S) -> Parser<S> {
        Parser {
            lex: TokenStream::new(src),
        }
    }

    pub fn from_stream(lex: TokenStream<S>) -> Parser<S> {
        Parser { lex }
    }

    // Thin forwarding helpers so grammar code reads tersely.

    pub fn get(&mut self) -> PResult<Token> {
        self.lex.get_token()
    }

    pub fn put_back(&mut self, tok: Token) {
        self.lex.put_back(tok)
    }

    pub fn peek(&mut self, i: usize) -> PResult<TokenKind> {
        self.lex.lookahead(i)
    }

    pub fn consume_if(&mut self, kind: &TokenKind) -> PResult<bool> {
        self.lex.consume_if(kind)
    }

    pub fn expect(&mut self, kind: &TokenKind) -> PResult<Token> {
        self.lex.expect(kind)
    }

    pub fn expect_ident(&mut self) -> PResult<(Ident, Span)> {
        self.lex.expect_ident()
    }

    pub fn span(&self) -> Span {
        self.lex.point_span()
    }

    pub fn edition(&self) -> Edition {
        self.lex.edition()
    }

    pub fn err_unexpected(&self, tok: Token, expected: &str) -> ParseError {
        ParseError::unexpected(tok.kind, expected, tok.span)
    }

    pub fn bug(&self, msg: &'static str) -> ParseError {
        ParseError::new(ParseErrorKind::BugCheck(msg), self.span())
    }

    /// Consume a `<`, splitting `<<` into two by putting a synthetic `<`
    /// back. Returns false without consuming when neither is next.
    pub fn consume_lt(&mut self) -> PResult<bool> {
        match self.peek(0)? {
            TokenKind::Lt => {
                self.get()?;
                Ok(true)
            }
            TokenKind::Shl => {
                let tok = self.get()?;
                self.put_back(Token::new(TokenKind::Lt, tok.span));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Consume a closing `>`, splitting `>>` (and `>=`/`>>=`) as needed.
    pub fn consume_gt(&mut self) -> PResult<bool> {
        match self.peek(0)? {
            TokenKind::Gt => {
                self.get()?;
                Ok(true)
            }
            TokenKind::Shr => {
                let tok = self.get()?;
                self.put_back(Token::new(TokenKind::Gt, tok.span));
                Ok(true)
            }
            TokenKind::Ge => {
                let tok = self.get()?;
                self.put_back(Token::new(TokenKind::Eq, tok.span));
                Ok(true)
            }
            TokenKind::ShrEq => {
                let tok = self.get()?;
                self.put_back(Token::new(TokenKind::Ge, tok.span));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Run `f` with struct literals disallowed (control-flow scrutinees).
    pub fn no_struct_literal<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> PResult<R>,
    ) -> PResult<R> {
        let mut guard = ParseStateGuard::new(self, |state| state.disallow_struct_literal = true);
        f(&mut *guard)
    }

    /// Run `f` with struct literals allowed again (inside brackets/braces).
    pub fn allow_struct_literal<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> PResult<R>,
    ) -> PResult<R> {
        let mut guard =
            ParseStateGuard::new(self, |state| state.disallow_struct_literal = false);
        f(&mut *guard)
    }
}

/// Scoped override of the parse-state side channel. The saved state is
/// restored when the guard drops, so an early `?` return inside the scope
/// cannot leak a flag.
pub struct ParseStateGuard<'p, S: TokenSource> {
    parser: &'p mut Parser<S>,
    saved: ParseState,
}

impl<'p, S: TokenSource> ParseStateGuard<'p, S> {
    pub fn new(
        parser: &'p mut Parser<S>,
        set: impl FnOnce(&mut ParseState),
    ) -> ParseStateGuard<'p, S> {
        let saved = parser.lex.state;
        set(&mut parser.lex.state);
        ParseStateGuard { parser, saved }
    }
}

impl<'p, S: TokenSource> Deref for ParseStateGuard<'p, S> {
    type Target = Parser<S>;
    fn deref(&self) -> &Parser<S> {
        self.parser
    }
}

impl<'p, S: TokenSource> DerefMut for ParseStateGuard<'p, S> {
    fn deref_mut(&mut self) -> &mut Parser<S> {
        self.parser
    }
}

impl<'p, S: TokenSource> Drop for ParseStateGuard<'p, S> {
    fn drop(&mut self) {
        self.parser.lex.state = self.saved;
    }
}

/// Convenience constructors used by the driver and tests.
impl FileParser {
    pub fn for_source(file_name: &str, source: &str, edition: Edition) -> FileParser {
        Parser::new(Lexer::new(file_name, source, edition))
    }
}
