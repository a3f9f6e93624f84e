//! The token stream abstraction.
//!
//! `TokenSource` is the pull interface implemented by the lexer, by token
//! tree streams, and by the macro expander. `TokenStream` wraps any source
//! with a single-token putback cache and a bounded lookahead buffer, and
//! carries the parse-state side channel.

use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::{PResult, ParseError, ParseErrorKind};
use crate::hygiene::{Hygiene, Ident};
use crate::token::{Edition, Span, Token, TokenKind};
use crate::tokentree::{Delim, TokenTree};

/// Maximum lookahead depth.
pub const MAX_LOOKAHEAD: usize = 3;

pub trait TokenSource {
    fn next_token(&mut self) -> PResult<Token>;
    /// Point span at the source's current position, for diagnostics.
    fn source_span(&self) -> Span;
    fn source_edition(&self) -> Edition;
    fn source_hygiene(&self) -> Hygiene;
    fn push_hygiene(&mut self) {}
    fn pop_hygiene(&mut self) {}
}

/// State the parser passes down via a second channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseState {
    /// Inside `if`/`while`/`for`/`match` scrutinees `{` must start the body,
    /// so struct literal syntax is disabled.
    pub disallow_struct_literal: bool,
    /// Debugging hook that disables expansion of macros.
    pub no_expand_macros: bool,
}

#[derive(Clone)]
struct LookaheadEnt {
    tok: Token,
    edition: Edition,
    hygiene: Hygiene,
}

#[derive(Clone)]
pub struct TokenStream<S> {
    src: S,
    cache: Option<Token>,
    lookahead: VecDeque<LookaheadEnt>,
    edition: Edition,
    hygiene: Hygiene,
    pub state: ParseState,
}

impl<S: TokenSource> TokenStream<S> {
    pub fn new(src: S) -> TokenStream<S> {
        let edition = src.source_edition();
        let hygiene = src.source_hygiene();
        TokenStream {
            src,
            cache: None,
            lookahead: VecDeque::new(),
            edition,
            hygiene,
            state: ParseState::default(),
        }
    }

    fn pull(&mut self) -> PResult<LookaheadEnt> {
        let tok = self.src.next_token()?;
        Ok(LookaheadEnt {
            tok,
            edition: self.src.source_edition(),
            hygiene: self.src.source_hygiene(),
        })
    }

    pub fn get_token(&mut self) -> PResult<Token> {
        if let Some(tok) = self.cache.take() {
            return Ok(tok);
        }
        let ent = match self.lookahead.pop_front() {
            Some(ent) => ent,
            None => self.pull()?,
        };
        self.edition = ent.edition;
        self.hygiene = ent.hygiene;
        Ok(ent.tok)
    }

    /// Push one token back. At most one token may be pending.
    pub fn put_back(&mut self, tok: Token) {
        assert!(self.cache.is_none(), "token putback cache already occupied");
        self.cache = Some(tok);
    }

    /// Peek `i` tokens ahead (0 = the next token) without consuming.
    pub fn lookahead(&mut self, i: usize) -> PResult<TokenKind> {
        assert!(i < MAX_LOOKAHEAD, "lookahead depth limited to {}", MAX_LOOKAHEAD);
        let mut i = i;
        if let Some(tok) = &self.cache {
            if i == 0 {
                return Ok(tok.kind.clone());
            }
            i -= 1;
        }
        while self.lookahead.len() <= i {
            let ent = self.pull()?;
            self.lookahead.push_back(ent);
        }
        Ok(self.lookahead[i].tok.kind.clone())
    }

    /// Consume the next token if it is of the given kind (payloads ignored).
    pub fn get_token_if(&mut self, kind: &TokenKind) -> PResult<Option<Token>> {
        if self.lookahead(0)?.same_kind(kind) {
            Ok(Some(self.get_token()?))
        } else {
            Ok(None)
        }
    }

    pub fn consume_if(&mut self, kind: &TokenKind) -> PResult<bool> {
        Ok(self.get_token_if(kind)?.is_some())
    }

    /// Obtain a token, asserting that it is of the given kind.
    pub fn expect(&mut self, kind: &TokenKind) -> PResult<Token> {
        let tok = self.get_token()?;
        if tok.kind.same_kind(kind) {
            Ok(tok)
        } else {
            Err(ParseError::unexpected(
                tok.kind,
                &kind.describe(),
                tok.span,
            ))
        }
    }

    pub fn expect_ident(&mut self) -> PResult<(Ident, Span)> {
        let tok = self.get_token()?;
        match tok.kind {
            TokenKind::Ident(i) => Ok((i, tok.span)),
            other => Err(ParseError::unexpected(other, "identifier", tok.span)),
        }
    }

    /// Edition of the most recently produced token.
    pub fn edition(&self) -> Edition {
        self.edition
    }

    pub fn edition_after(&self, e: Edition) -> bool {
        self.edition >= e
    }

    /// Hygiene scope active when the most recent token was lexed.
    pub fn hygiene(&self) -> Hygiene {
        self.hygiene.clone()
    }

    pub fn point_span(&self) -> Span {
        if let Some(tok) = &self.cache {
            tok.span
        } else if let Some(ent) = self.lookahead.front() {
            ent.tok.span
        } else {
            self.src.source_span()
        }
    }

    pub fn push_hygiene(&mut self) {
        self.src.push_hygiene();
    }

    pub fn pop_hygiene(&mut self) {
        self.src.pop_hygiene();
    }

    pub fn err_unexpected(&self, found: TokenKind, expected: &str, span: Span) -> ParseError {
        ParseError::new(
            ParseErrorKind::Unexpected {
                found,
                expected: vec![expected.to_string()],
            },
            span,
        )
    }
}

// ---------------------------------------------------------------------------
// Token-tree streams: lazily flatten a tree back into tokens.
// ---------------------------------------------------------------------------

/// Borrowing token-tree stream. The root group's delimiters are not emitted;
/// nested groups produce their delimiters; `Delim::None` groups splice.
pub struct TtStream<'a> {
    stack: Vec<BorrowFrame<'a>>,
    edition: Edition,
    hygiene: Hygiene,
    last_span: Span,
}

struct BorrowFrame<'a> {
    children: &'a [TokenTree],
    idx: usize,
    close: Option<(TokenKind, Span)>,
}

impl<'a> TtStream<'a> {
    pub fn new(root: &'a TokenTree) -> TtStream<'a> {
        let children = match root {
            TokenTree::Group { children, .. } => children.as_slice(),
            leaf => std::slice::from_ref(leaf),
        };
        TtStream {
            stack: vec![BorrowFrame {
                children,
                idx: 0,
                close: None,
            }],
            edition: root.edition(),
            hygiene: root.hygiene().clone(),
            last_span: root.span(),
        }
    }

    pub fn from_slice(children: &'a [TokenTree]) -> TtStream<'a> {
        TtStream {
            stack: vec![BorrowFrame {
                children,
                idx: 0,
                close: None,
            }],
            edition: Edition::default(),
            hygiene: Hygiene::none(),
            last_span: Span::null(),
        }
    }
}

impl<'a> TokenSource for TtStream<'a> {
    fn next_token(&mut self) -> PResult<Token> {
        loop {
            let frame = match self.stack.last_mut() {
                Some(f) => f,
                None => return Ok(Token::new(TokenKind::Eof, self.last_span)),
            };
            if frame.idx >= frame.children.len() {
                let close = frame.close.take();
                self.stack.pop();
                if let Some((kind, span)) = close {
                    self.last_span = span;
                    return Ok(Token::new(kind, span));
                }
                continue;
            }
            let child = &frame.children[frame.idx];
            frame.idx += 1;
            match child {
                TokenTree::Leaf {
                    edition,
                    hygiene,
                    token,
                } => {
                    self.edition = *edition;
                    self.hygiene = hygiene.clone();
                    self.last_span = token.span;
                    return Ok(token.clone());
                }
                TokenTree::Group {
                    delim,
                    edition,
                    hygiene,
                    span,
                    children,
                } => {
                    self.edition = *edition;
                    self.hygiene = hygiene.clone();
                    let close = delim.close_token().map(|k| (k, *span));
                    self.stack.push(BorrowFrame {
                        children,
                        idx: 0,
                        close,
                    });
                    if let Some(open) = delim.open_token() {
                        self.last_span = *span;
                        return Ok(Token::new(open, *span));
                    }
                    // Transparent group: keep walking.
                }
            }
        }
    }

    fn source_span(&self) -> Span {
        self.last_span
    }

    fn source_edition(&self) -> Edition {
        self.edition
    }

    fn source_hygiene(&self) -> Hygiene {
        self.hygiene.clone()
    }
}

/// Owning token-tree stream. Cheap to clone: the tree is shared and the
/// cursor is an index path, which makes it the stream of choice for
/// speculative macro matching.
#[derive(Clone)]
pub struct OwnedTtStream {
    root: Rc<TokenTree>,
    stack: Vec<OwnedFrame>,
    edition: Edition,
    hygiene: Hygiene,
    last_span: Span,
}

#[derive(Clone)]
struct OwnedFrame {
    /// Child indices from the root to the group this frame iterates.
    path: Vec<usize>,
    idx: usize,
    emit_close: bool,
}

fn node_at<'t>(root: &'t TokenTree, path: &[usize]) -> &'t TokenTree {
    let mut node = root;
    for &i in path {
        match node {
            TokenTree::Group { children, .. } => node = &children[i],
            TokenTree::Leaf { .. } => unreachable!("path descends through a leaf"),
        }
    }
    node
}

fn children_of(node: &TokenTree) -> &[TokenTree] {
    match node {
        TokenTree::Group { children, .. } => children.as_slice(),
        leaf => std::slice::from_ref(leaf),
    }
}

impl OwnedTtStream {
    pub fn new(root: Rc<TokenTree>) -> OwnedTtStream {
        let edition = root.edition();
        let hygiene = root.hygiene().clone();
        let last_span = root.span();
        OwnedTtStream {
            root,
            stack: vec![OwnedFrame {
                path: Vec::new(),
                idx: 0,
                emit_close: false,
            }],
            edition,
            hygiene,
            last_span,
        }
    }
}

impl TokenSource for OwnedTtStream {
    fn next_token(&mut self) -> PResult<Token> {
        loop {
            let frame = match self.stack.last() {
                Some(f) => f.clone(),
                None => return Ok(Token::new(TokenKind::Eof, self.last_span)),
            };
            let node = node_at(&self.root, &frame.path);
            let children = children_of(node);
            if frame.idx >= children.len() {
                self.stack.pop();
                if frame.emit_close {
                    if let TokenTree::Group { delim, span, .. } = node {
                        if let Some(kind) = delim.close_token() {
                            self.last_span = *span;
                            return Ok(Token::new(kind, *span));
                        }
                    }
                }
                continue;
            }
            self.stack.last_mut().unwrap().idx += 1;
            let child = &children[frame.idx];
            match child {
                TokenTree::Leaf {
                    edition,
                    hygiene,
                    token,
                } => {
                    self.edition = *edition;
                    self.hygiene = hygiene.clone();
                    self.last_span = token.span;
                    return Ok(token.clone());
                }
                TokenTree::Group {
                    delim,
                    edition,
                    hygiene,
                    span,
                    ..
                } => {
                    self.edition = *edition;
                    self.hygiene = hygiene.clone();
                    let delim = *delim;
                    let span = *span;
                    let mut path = frame.path.clone();
                    path.push(frame.idx);
                    self.stack.push(OwnedFrame {
                        path,
                        idx: 0,
                        emit_close: delim != Delim::None,
                    });
                    if let Some(open) = delim.open_token() {
                        self.last_span = span;
                        return Ok(Token::new(open, span));
                    }
                }
            }
        }
    }

    fn source_span(&self) -> Span {
        self.last_span
    }

    fn source_edition(&self) -> Edition {
        self.edition
    }

    fn source_hygiene(&self) -> Hygiene {
        self.hygiene.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn ident_kind(name: &str) -> TokenKind {
        TokenKind::Ident(Ident::plain(name))
    }

    fn stream(src: &str) -> TokenStream<Lexer> {
        TokenStream::new(Lexer::new("t.rs", src, Edition::E2015))
    }

    #[test]
    fn putback_round_trips() {
        let mut s = stream("a b");
        let a = s.get_token().unwrap();
        s.put_back(a.clone());
        let again = s.get_token().unwrap();
        assert_eq!(a, again);
        assert_eq!(s.get_token().unwrap().kind, ident_kind("b"));
    }

    #[test]
    fn lookahead_does_not_consume() {
        let mut s = stream("a b c");
        assert_eq!(s.lookahead(0).unwrap(), ident_kind("a"));
        assert_eq!(s.lookahead(1).unwrap(), ident_kind("b"));
        assert_eq!(s.lookahead(2).unwrap(), ident_kind("c"));
        assert_eq!(s.get_token().unwrap().kind, ident_kind("a"));
        assert_eq!(s.get_token().unwrap().kind, ident_kind("b"));
    }

    #[test]
    fn lookahead_with_putback() {
        let mut s = stream("a b");
        let a = s.get_token().unwrap();
        s.put_back(a);
        assert_eq!(s.lookahead(0).unwrap(), ident_kind("a"));
        assert_eq!(s.lookahead(1).unwrap(), ident_kind("b"));
    }

    #[test]
    fn get_token_if_matches_kind_only() {
        let mut s = stream("x ,");
        assert!(s.get_token_if(&TokenKind::Comma).unwrap().is_none());
        assert!(s
            .get_token_if(&ident_kind("anything"))
            .unwrap()
            .is_some());
        assert!(s.consume_if(&TokenKind::Comma).unwrap());
    }

    #[test]
    fn expect_reports_unexpected() {
        let mut s = stream(",");
        let err = s.expect(&TokenKind::Semicolon).unwrap_err();
        let text = format!("{}", err);
        assert!(text.contains("expected"), "{}", text);
    }

    #[test]
    fn eof_repeats() {
        let mut s = stream("");
        assert!(s.get_token().unwrap().is_eof());
        assert!(s.get_token().unwrap().is_eof());
    }

    #[test]
    fn owned_tt_stream_clone_is_independent() {
        let mut lexer = Lexer::new("t.rs", "a b c", Edition::E2015);
        let mut children = Vec::new();
        loop {
            let t = lexer.next_token().unwrap();
            if t.is_eof() {
                break;
            }
            children.push(TokenTree::leaf(Edition::E2015, Hygiene::none(), t));
        }
        let root = Rc::new(TokenTree::seq(Edition::E2015, Hygiene::none(), children));
        let mut s1 = OwnedTtStream::new(root);
        assert_eq!(s1.next_token().unwrap().kind, ident_kind("a"));
        let mut s2 = s1.clone();
        assert_eq!(s1.next_token().unwrap().kind, ident_kind("b"));
        assert_eq!(s1.next_token().unwrap().kind, ident_kind("c"));
        // The clone resumes from where it was taken.
        assert_eq!(s2.next_token().unwrap().kind, ident_kind("b"));
    }
}
