//! Rule matching: walk a rule's pattern over the invocation token tree,
//! binding captures into a layered multi-map.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{PResult, ParseError, ParseErrorKind};
use crate::intern::Symbol;
use crate::parser::{
    tok_starts_expr, Parser, PatternParsing, TtParser, TtParsing, TypeParsing,
};
use crate::stream::OwnedTtStream;
use crate::token::{Fragment, Span, TokenKind};
use crate::tokentree::TokenTree;

use super::def::{FragmentKind, LoopKind, MacroPatEnt, MacroRule};

/// How many entries a capture has at a given layer.
pub enum CountResult {
    /// Registered at a different layer; not this loop's concern.
    Ignore,
    Count(usize),
}

#[derive(Debug, Clone, Default)]
pub struct Captures {
    inner: HashMap<Symbol, Mapping>,
    layer_count: usize,
}

#[derive(Debug, Clone)]
struct Mapping {
    layer: usize,
    entries: Vec<TokenTree>,
}

impl Captures {
    pub fn new() -> Captures {
        Captures::default()
    }

    /// One more than the deepest registered layer.
    pub fn layer_count(&self) -> usize {
        self.layer_count + 1
    }

    /// Register a capture. A name must live at exactly one layer across all
    /// patterns of a rule.
    pub fn insert(&mut self, layer: usize, name: Symbol, tt: TokenTree) -> PResult<()> {
        if layer > self.layer_count {
            self.layer_count = layer;
        }
        let mapping = self.inner.entry(name).or_insert_with(|| Mapping {
            layer,
            entries: Vec::new(),
        });
        if mapping.layer != layer {
            return Err(ParseError::new(
                ParseErrorKind::CaptureLayerMismatch {
                    name: name.resolve().to_string(),
                },
                tt.span(),
            ));
        }
        mapping.entries.push(tt);
        Ok(())
    }

    /// Fetch entry `idx` of `name` as seen from `layer`. `None` means the
    /// binding lives at a shallower layer (the caller retries shallower) or
    /// ran out of entries; a deeper binding is an error ("still repeating").
    pub fn get(&self, layer: usize, name: Symbol, idx: usize) -> PResult<Option<&TokenTree>> {
        let mapping = match self.inner.get(&name) {
            Some(m) => m,
            None => return Ok(None),
        };
        if mapping.layer < layer {
            Ok(None)
        } else if mapping.layer > layer {
            Err(ParseError::new(
                ParseErrorKind::CaptureLayerMismatch {
                    name: name.resolve().to_string(),
                },
                Span::null(),
            ))
        } else {
            Ok(mapping.entries.get(idx))
        }
    }

    /// Entry count of `name` at `layer`; absent names count as zero.
    pub fn count(&self, layer: usize, name: Symbol) -> CountResult {
        match self.inner.get(&name) {
            None => CountResult::Count(0),
            Some(m) if m.layer != layer => CountResult::Ignore,
            Some(m) => CountResult::Count(m.entries.len()),
        }
    }
}

/// Match one rule against an invocation tree. The stream must be exhausted
/// by the pattern; a partial match fails the rule.
pub fn match_rule(rule: &MacroRule, input: &Rc<TokenTree>) -> PResult<Captures> {
    let mut lex = Parser::new(OwnedTtStream::new(input.clone()));
    // Diagnostics raised while speculating must not leak; the caller keeps
    // only the last rule's error.
    let mut caps = Captures::new();
    for pat in &rule.pattern {
        if !handle_pattern(&mut lex, pat, 0, &mut caps)? {
            return Err(ParseError::new(
                ParseErrorKind::MacroMatchFailed {
                    macro_name: String::new(),
                },
                lex.span(),
            ));
        }
    }
    let tok = lex.get()?;
    if !tok.is_eof() {
        return Err(ParseError::unexpected(
            tok.kind,
            "end of macro input",
            tok.span,
        ));
    }
    Ok(caps)
}

/// Cheap first-token check: can `pat` begin at the current position?
/// Fragments with no distinguishing first token speculate on a clone.
fn try_pattern(lex: &mut TtParser, pat: &MacroPatEnt) -> PResult<bool> {
    match pat {
        MacroPatEnt::Token(tok) => Ok(lex.peek(0)? == tok.kind),
        MacroPatEnt::Loop { kind, pats, .. } => match kind {
            LoopKind::ZeroPlus | LoopKind::ZeroOne => Ok(true),
            LoopKind::OnePlus => match pats.first() {
                Some(first) => try_pattern(lex, first),
                None => Ok(true),
            },
        },
        MacroPatEnt::Fragment { kind, .. } => match kind {
            FragmentKind::Tt => Ok(!lex.peek(0)?.is_eof()),
            FragmentKind::Ident => Ok(matches!(lex.peek(0)?, TokenKind::Ident(_))),
            FragmentKind::Block => Ok(matches!(
                lex.peek(0)?,
                TokenKind::BraceOpen | TokenKind::Interpolated(Fragment::Block(_))
            )),
            FragmentKind::Path => Ok(matches!(
                lex.peek(0)?,
                TokenKind::Ident(_)
                    | TokenKind::DoubleColon
                    | TokenKind::KwSelf
                    | TokenKind::KwSuper
                    | TokenKind::KwCrate
                    | TokenKind::Interpolated(Fragment::Path(_))
            )),
            FragmentKind::Expr => Ok(tok_starts_expr(&lex.peek(0)?)),
            FragmentKind::Meta => Ok(matches!(lex.peek(0)?, TokenKind::Ident(_))),
            FragmentKind::Ty | FragmentKind::Pat | FragmentKind::Stmt => {
                // Speculate on a clone; abandon it whatever happens.
                let mut probe = Parser::from_stream(lex.lex.clone());
                let ok = match kind {
                    FragmentKind::Ty => probe.parse_type().is_ok(),
                    FragmentKind::Pat => probe.parse_pattern(false).is_ok(),
                    FragmentKind::Stmt => {
                        use crate::parser::ExprParsing;
                        probe.parse_stmt().is_ok()
                    }
                    _ => unreachable!(),
                };
                Ok(ok)
            }
        },
    }
}

/// Match one pattern entry, consuming input and binding captures.
/// `Ok(false)` is a clean no-consume failure (loop termination); errors are
/// rule failures.
fn handle_pattern(
    lex: &mut TtParser,
    pat: &MacroPatEnt,
    layer: usize,
    caps: &mut Captures,
) -> PResult<bool> {
    if !try_pattern(lex, pat)? {
        return Ok(false);
    }
    match pat {
        MacroPatEnt::Token(expected) => {
            let tok = lex.get()?;
            if tok.kind != expected.kind {
                return Err(ParseError::unexpected(
                    tok.kind,
                    &expected.kind.describe(),
                    tok.span,
                ));
            }
            Ok(true)
        }
        MacroPatEnt::Loop { sep, kind, pats } => {
            let mut match_count = 0usize;
            loop {
                let gate = match pats.first() {
                    Some(first) => try_pattern(lex, first)?,
                    None => false,
                };
                if !gate {
                    break;
                }
                for sub in pats {
                    if !handle_pattern(lex, sub, layer + 1, caps)? {
                        return Ok(false);
                    }
                }
                match_count += 1;
                if *kind == LoopKind::ZeroOne {
                    break;
                }
                if let Some(sep) = sep {
                    let tok = lex.get()?;
                    if tok.kind != sep.kind {
                        lex.put_back(tok);
                        break;
                    }
                }
            }
            if *kind == LoopKind::OnePlus && match_count == 0 {
                return Ok(false);
            }
            Ok(true)
        }
        MacroPatEnt::Fragment { name, kind } => {
            let tt = lex.parse_fragment(*kind)?;
            caps.insert(layer, *name, tt)?;
            Ok(true)
        }
    }
}
