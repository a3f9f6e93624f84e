//! Pattern parsing.
//!
//! Two phases: a wrapper layer that handles `ref`/`mut` bindings and
//! `@`-sub-patterns, and the inner layer for the pattern constructors. A
//! bare identifier with nothing pattern-specific after it becomes
//! `MaybeBind`, resolved by context later.

use crate::ast::{
    Path, Pattern, PatternBinding, PatternKind, PatternValue, SlicePatternExtra,
};
use crate::error::PResult;
use crate::stream::TokenSource;
use crate::token::{Fragment, TokenKind};

use super::paths::{PathGenericMode, PathParsing};
use super::Parser;

pub trait PatternParsing {
    /// Parse a pattern; `allow_or` enables top-level `|` alternatives.
    fn parse_pattern(&mut self, allow_or: bool) -> PResult<Pattern>;
}

impl<S: TokenSource> PatternParsing for Parser<S> {
    fn parse_pattern(&mut self, allow_or: bool) -> PResult<Pattern> {
        let start = self.span();
        // A leading `|` is tolerated.
        if allow_or {
            self.consume_if(&TokenKind::Pipe)?;
        }
        let first = self.parse_pattern_one()?;
        if allow_or && matches!(self.peek(0)?, TokenKind::Pipe) {
            let mut pats = vec![first];
            while self.consume_if(&TokenKind::Pipe)? {
                pats.push(self.parse_pattern_one()?);
            }
            Ok(Pattern::new(PatternKind::Or(pats), start.to(self.span())))
        } else {
            Ok(first)
        }
    }
}

impl<S: TokenSource> Parser<S> {
    fn parse_pattern_one(&mut self) -> PResult<Pattern> {
        let start = self.span();

        // Wrapper layer: explicit bindings.
        let by_ref = self.consume_if(&TokenKind::KwRef)?;
        let is_mut = self.consume_if(&TokenKind::KwMut)?;
        if by_ref || is_mut {
            let (name, _) = self.expect_ident()?;
            let binding = PatternBinding {
                name,
                by_ref,
                is_mut,
            };
            let sub = if self.consume_if(&TokenKind::At)? {
                Some(Box::new(self.parse_pattern_real()?))
            } else {
                None
            };
            return Ok(Pattern::new(
                PatternKind::Bind { binding, sub },
                start.to(self.span()),
            ));
        }

        // Bare identifier: binding via `@`, path pattern, or MaybeBind.
        if let TokenKind::Ident(_) = self.peek(0)? {
            match self.peek(1)? {
                TokenKind::At => {
                    let (name, _) = self.expect_ident()?;
                    self.expect(&TokenKind::At)?;
                    let sub = self.parse_pattern_real()?;
                    return Ok(Pattern::new(
                        PatternKind::Bind {
                            binding: PatternBinding {
                                name,
                                by_ref: false,
                                is_mut: false,
                            },
                            sub: Some(Box::new(sub)),
                        },
                        start.to(self.span()),
                    ));
                }
                TokenKind::DoubleColon
                | TokenKind::ParenOpen
                | TokenKind::BraceOpen
                | TokenKind::DotDot
                | TokenKind::DotDotDot
                | TokenKind::DotDotEq => {
                    return self.parse_pattern_real();
                }
                _ => {
                    let (name, _) = self.expect_ident()?;
                    return Ok(Pattern::new(
                        PatternKind::MaybeBind(name),
                        start.to(self.span()),
                    ));
                }
            }
        }

        self.parse_pattern_real()
    }

    fn parse_pattern_real(&mut self) -> PResult<Pattern> {
        let start = self.span();
        let kind = match self.peek(0)? {
            TokenKind::Interpolated(Fragment::Pat(_)) => {
                let tok = self.get()?;
                if let TokenKind::Interpolated(Fragment::Pat(p)) = tok.kind {
                    return Ok((*p).clone());
                }
                unreachable!()
            }
            TokenKind::Underscore => {
                self.get()?;
                PatternKind::Any
            }
            TokenKind::Amp | TokenKind::AmpAmp => {
                let tok = self.get()?;
                let doubled = tok.kind == TokenKind::AmpAmp;
                let is_mut = self.consume_if(&TokenKind::KwMut)?;
                let sub = Box::new(self.parse_pattern_one()?);
                if doubled {
                    let inner_span = start.to(self.span());
                    PatternKind::Ref {
                        is_mut: false,
                        sub: Box::new(Pattern::new(PatternKind::Ref { is_mut, sub }, inner_span)),
                    }
                } else {
                    PatternKind::Ref { is_mut, sub }
                }
            }
            TokenKind::KwBox => {
                self.get()?;
                PatternKind::Box(Box::new(self.parse_pattern_one()?))
            }
            TokenKind::ParenOpen => {
                self.get()?;
                let (mut start_pats, has_dots, end_pats) = self.parse_pattern_list()?;
                self.expect(&TokenKind::ParenClose)?;
                if !has_dots && start_pats.len() == 1 {
                    // Parenthesized pattern: transparent.
                    return Ok(start_pats.remove(0));
                }
                PatternKind::Tuple {
                    start: start_pats,
                    has_dots,
                    end: end_pats,
                }
            }
            TokenKind::BracketOpen => {
                self.get()?;
                let kind = self.parse_slice_pattern()?;
                self.expect(&TokenKind::BracketClose)?;
                kind
            }
            TokenKind::DotDot | TokenKind::DotDotDot | TokenKind::DotDotEq => {
                // Open-start range: `..=end` / `..end`.
                let tok = self.get()?;
                let inclusive = tok.kind != TokenKind::DotDot;
                let end = Some(self.parse_pattern_value()?);
                PatternKind::Range {
                    start: None,
                    end,
                    inclusive,
                }
            }
            TokenKind::Ident(_)
            | TokenKind::DoubleColon
            | TokenKind::KwSelf
            | TokenKind::KwSuper
            | TokenKind::KwCrate
            | TokenKind::Lt
            | TokenKind::Shl => {
                let path = self.parse_path(PathGenericMode::Expr)?;
                match self.peek(0)? {
                    TokenKind::ParenOpen => {
                        self.get()?;
                        let (start_pats, has_dots, end_pats) = self.parse_pattern_list()?;
                        self.expect(&TokenKind::ParenClose)?;
                        PatternKind::NamedTuple {
                            path,
                            start: start_pats,
                            has_dots,
                            end: end_pats,
                        }
                    }
                    TokenKind::BraceOpen => {
                        self.get()?;
                        self.parse_struct_pattern(path)?
                    }
                    _ => self.maybe_range(PatternValue::Named(path))?,
                }
            }
            _ => {
                let value = self.parse_pattern_value()?;
                self.maybe_range(value)?
            }
        };
        Ok(Pattern::new(kind, start.to(self.span())))
    }

    /// After a pattern value: a range suffix or a plain value pattern.
    /// `...` and `..=` both mean inclusive; `..` is half-open.
    fn maybe_range(&mut self, value: PatternValue) -> PResult<PatternKind> {
        let inclusive = match self.peek(0)? {
            TokenKind::DotDotEq | TokenKind::DotDotDot => true,
            TokenKind::DotDot => false,
            _ => return Ok(PatternKind::Value(value)),
        };
        self.get()?;
        let end = match self.peek(0)? {
            TokenKind::Comma
            | TokenKind::ParenClose
            | TokenKind::BracketClose
            | TokenKind::BraceClose
            | TokenKind::FatArrow
            | TokenKind::Pipe
            | TokenKind::Eof => None,
            _ => Some(self.parse_pattern_value()?),
        };
        Ok(PatternKind::Range {
            start: Some(value),
            end,
            inclusive,
        })
    }

    fn parse_pattern_value(&mut self) -> PResult<PatternValue> {
        let tok = self.get()?;
        Ok(match tok.kind {
            TokenKind::Integer { value, suffix } => PatternValue::Integer { value, ty: suffix },
            TokenKind::Float { value, suffix } => PatternValue::Float { value, ty: suffix },
            TokenKind::Str(s) => PatternValue::Str(s),
            TokenKind::ByteStr(b) => PatternValue::ByteStr(b),
            TokenKind::CharLit(c) => PatternValue::CharLit(c),
            TokenKind::ByteLit(b) => PatternValue::ByteLit(b),
            TokenKind::KwTrue => PatternValue::Integer {
                value: 1,
                ty: crate::token::CoreType::Bool,
            },
            TokenKind::KwFalse => PatternValue::Integer {
                value: 0,
                ty: crate::token::CoreType::Bool,
            },
            TokenKind::Dash => {
                let tok = self.get()?;
                match tok.kind {
                    TokenKind::Integer { value, suffix } => PatternValue::Integer {
                        value: value.wrapping_neg(),
                        ty: suffix,
                    },
                    TokenKind::Float { value, suffix } => PatternValue::Float {
                        value: -value,
                        ty: suffix,
                    },
                    other => {
                        return Err(self.err_unexpected(
                            crate::token::Token::new(other, tok.span),
                            "numeric literal after `-`",
                        ))
                    }
                }
            }
            TokenKind::Ident(_)
            | TokenKind::DoubleColon
            | TokenKind::KwSelf
            | TokenKind::KwSuper
            | TokenKind::KwCrate => {
                self.put_back(tok);
                PatternValue::Named(self.parse_path(PathGenericMode::Expr)?)
            }
            other => {
                return Err(
                    self.err_unexpected(crate::token::Token::new(other, tok.span), "a pattern")
                )
            }
        })
    }

    /// Comma-separated patterns with an optional `..` splitting start/end.
    /// Stops before the closing delimiter without consuming it.
    fn parse_pattern_list(&mut self) -> PResult<(Vec<Pattern>, bool, Vec<Pattern>)> {
        let mut start = Vec::new();
        let mut end = Vec::new();
        let mut has_dots = false;
        loop {
            match self.peek(0)? {
                TokenKind::ParenClose | TokenKind::BracketClose => break,
                TokenKind::DotDot if !has_dots => {
                    self.get()?;
                    has_dots = true;
                }
                _ => {
                    let pat = self.parse_pattern(false)?;
                    if has_dots {
                        end.push(pat);
                    } else {
                        start.push(pat);
                    }
                }
            }
            if !self.consume_if(&TokenKind::Comma)? {
                break;
            }
        }
        Ok((start, has_dots, end))
    }

    fn parse_slice_pattern(&mut self) -> PResult<PatternKind> {
        let mut leading = Vec::new();
        let mut extra: Option<SlicePatternExtra> = None;
        loop {
            match self.peek(0)? {
                TokenKind::BracketClose => break,
                TokenKind::DotDot if extra.is_none() => {
                    self.get()?;
                    extra = Some(SlicePatternExtra {
                        binding: None,
                        trailing: Vec::new(),
                    });
                }
                TokenKind::Ident(_)
                    if extra.is_none()
                        && matches!(self.peek(1)?, TokenKind::At)
                        && matches!(self.peek(2)?, TokenKind::DotDot) =>
                {
                    let (name, _) = self.expect_ident()?;
                    self.expect(&TokenKind::At)?;
                    self.expect(&TokenKind::DotDot)?;
                    extra = Some(SlicePatternExtra {
                        binding: Some(PatternBinding {
                            name,
                            by_ref: false,
                            is_mut: false,
                        }),
                        trailing: Vec::new(),
                    });
                }
                _ => {
                    let pat = self.parse_pattern(false)?;
                    match &mut extra {
                        Some(e) => e.trailing.push(pat),
                        None => leading.push(pat),
                    }
                }
            }
            if !self.consume_if(&TokenKind::Comma)? {
                break;
            }
        }
        Ok(PatternKind::Slice { leading, extra })
    }

    /// Field list of a struct pattern; the opening `{` is already consumed.
    fn parse_struct_pattern(&mut self, path: Path) -> PResult<PatternKind> {
        let mut fields = Vec::new();
        let mut is_exhaustive = true;
        loop {
            match self.peek(0)? {
                TokenKind::BraceClose => break,
                TokenKind::DotDot => {
                    self.get()?;
                    is_exhaustive = false;
                }
                _ => {
                    let by_ref = self.consume_if(&TokenKind::KwRef)?;
                    let is_mut = self.consume_if(&TokenKind::KwMut)?;
                    let (name, name_span) = self.expect_ident()?;
                    if !by_ref && !is_mut && self.consume_if(&TokenKind::Colon)? {
                        let pat = self.parse_pattern(false)?;
                        fields.push((name, pat));
                    } else {
                        // Shorthand `ref mut name` binds the field.
                        let pat = Pattern::new(
                            PatternKind::Bind {
                                binding: PatternBinding {
                                    name: name.clone(),
                                    by_ref,
                                    is_mut,
                                },
                                sub: None,
                            },
                            name_span,
                        );
                        fields.push((name, pat));
                    }
                }
            }
            if !self.consume_if(&TokenKind::Comma)? {
                break;
            }
        }
        self.expect(&TokenKind::BraceClose)?;
        Ok(PatternKind::Struct {
            path,
            fields,
            is_exhaustive,
        })
    }
}
