//! Macro-rules definitions: the rule data model and the definition parser.

use crate::error::{PResult, ParseError, ParseErrorKind};
use crate::intern::Symbol;
use crate::token::{Token, TokenKind};
use crate::tokentree::{Delim, TokenTree};

/// Typed capture fragments, each backed by a parser sub-grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Tt,
    Pat,
    Ident,
    Path,
    Ty,
    Expr,
    Stmt,
    Block,
    Meta,
}

impl FragmentKind {
    pub fn from_name(name: &str) -> Option<FragmentKind> {
        Some(match name {
            "tt" => FragmentKind::Tt,
            "pat" => FragmentKind::Pat,
            "ident" => FragmentKind::Ident,
            "path" => FragmentKind::Path,
            "ty" => FragmentKind::Ty,
            "expr" => FragmentKind::Expr,
            "stmt" => FragmentKind::Stmt,
            "block" => FragmentKind::Block,
            "meta" => FragmentKind::Meta,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            FragmentKind::Tt => "tt",
            FragmentKind::Pat => "pat",
            FragmentKind::Ident => "ident",
            FragmentKind::Path => "path",
            FragmentKind::Ty => "ty",
            FragmentKind::Expr => "expr",
            FragmentKind::Stmt => "stmt",
            FragmentKind::Block => "block",
            FragmentKind::Meta => "meta",
        }
    }
}

/// `*`, `+`, or `?` on a repetition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    ZeroPlus,
    OnePlus,
    ZeroOne,
}

#[derive(Debug, Clone)]
pub enum MacroPatEnt {
    /// A literal token that must match exactly.
    Token(Token),
    /// `$name:kind`
    Fragment { name: Symbol, kind: FragmentKind },
    /// `$( ... ) sep? (*|+|?)`
    Loop {
        sep: Option<Token>,
        kind: LoopKind,
        pats: Vec<MacroPatEnt>,
    },
}

#[derive(Debug, Clone)]
pub enum MacroRuleEnt {
    /// A literal token emitted as-is.
    Token(Token),
    /// `$name` - interpolate the capture.
    Name(Symbol),
    /// `$crate` - the defining crate's identity.
    CrateRef,
    /// `$( ... ) sep? (*|+|?)` - the suffix is not semantic on the body
    /// side; the iteration count comes from the captures.
    Loop {
        sep: Option<Token>,
        ents: Vec<MacroRuleEnt>,
    },
}

#[derive(Debug, Clone)]
pub struct MacroRule {
    pub pattern: Vec<MacroPatEnt>,
    pub body: Vec<MacroRuleEnt>,
}

#[derive(Debug, Clone)]
pub struct MacroRulesDef {
    pub name: Symbol,
    /// Name of the defining crate, spliced in for `$crate`.
    pub crate_name: Option<String>,
    pub rules: Vec<MacroRule>,
}

fn err_in(tt: &TokenTree, msg: &'static str) -> ParseError {
    ParseError::new(ParseErrorKind::Todo(msg.to_string()), tt.span())
}

fn leaf_kind(tt: &TokenTree) -> Option<&TokenKind> {
    tt.as_token().map(|t| &t.kind)
}

/// Parse the braced body of `macro_rules! name { ... }` into rules.
pub fn parse_macro_rules(name: Symbol, body: &TokenTree) -> PResult<MacroRulesDef> {
    let children = match body {
        TokenTree::Group { children, .. } => children,
        _ => return Err(err_in(body, "macro_rules body must be a delimited group")),
    };
    let mut rules = Vec::new();
    let mut i = 0;
    while i < children.len() {
        let pattern_tt = &children[i];
        let pattern = match pattern_tt {
            TokenTree::Group {
                children, delim, ..
            } if *delim != Delim::None => parse_pattern_ents(children)?,
            other => return Err(err_in(other, "expected delimited rule pattern")),
        };
        i += 1;
        match children.get(i).and_then(leaf_kind) {
            Some(TokenKind::FatArrow) => i += 1,
            _ => {
                return Err(ParseError::unexpected(
                    children
                        .get(i)
                        .and_then(|t| t.as_token())
                        .map(|t| t.kind.clone())
                        .unwrap_or(TokenKind::Eof),
                    "`=>` after rule pattern",
                    children.get(i).map(|t| t.span()).unwrap_or(body.span()),
                ))
            }
        }
        let body_ents = match children.get(i) {
            Some(TokenTree::Group {
                children, delim, ..
            }) if *delim != Delim::None => parse_body_ents(children)?,
            other => {
                return Err(err_in(
                    other.unwrap_or(body),
                    "expected delimited rule body",
                ))
            }
        };
        i += 1;
        if let Some(TokenKind::Semicolon) = children.get(i).and_then(leaf_kind) {
            i += 1;
        }
        rules.push(MacroRule {
            pattern,
            body: body_ents,
        });
    }
    if rules.is_empty() {
        return Err(err_in(body, "macro_rules requires at least one rule"));
    }
    Ok(MacroRulesDef {
        name,
        crate_name: None,
        rules,
    })
}

/// Loop suffix after `$( ... )`: optional separator then `*`/`+`/`?`.
fn parse_loop_suffix(
    children: &[TokenTree],
    i: &mut usize,
) -> PResult<(Option<Token>, LoopKind)> {
    let tok = match children.get(*i).and_then(|t| t.as_token()) {
        Some(t) => t.clone(),
        None => {
            return Err(err_in(
                children.get(*i).unwrap_or(&children[*i - 1]),
                "expected repetition suffix after $(...)",
            ))
        }
    };
    *i += 1;
    let direct = match tok.kind {
        TokenKind::Star => Some(LoopKind::ZeroPlus),
        TokenKind::Plus => Some(LoopKind::OnePlus),
        TokenKind::Question => Some(LoopKind::ZeroOne),
        _ => None,
    };
    if let Some(kind) = direct {
        return Ok((None, kind));
    }
    // `tok` is the separator; the suffix proper follows.
    let suffix = match children.get(*i).and_then(|t| t.as_token()) {
        Some(t) => t.clone(),
        None => {
            return Err(ParseError::new(
                ParseErrorKind::Todo("expected * or + after repetition separator".into()),
                tok.span,
            ))
        }
    };
    *i += 1;
    let kind = match suffix.kind {
        TokenKind::Star => LoopKind::ZeroPlus,
        TokenKind::Plus => LoopKind::OnePlus,
        TokenKind::Question => LoopKind::ZeroOne,
        other => {
            return Err(ParseError::unexpected(
                other,
                "`*`, `+`, or `?`",
                suffix.span,
            ))
        }
    };
    Ok((Some(tok), kind))
}

fn parse_pattern_ents(children: &[TokenTree]) -> PResult<Vec<MacroPatEnt>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < children.len() {
        match &children[i] {
            TokenTree::Leaf { token, .. } if token.kind == TokenKind::Dollar => {
                i += 1;
                match children.get(i) {
                    Some(TokenTree::Leaf { token: nt, .. }) => match &nt.kind {
                        TokenKind::Ident(name) => {
                            let name = name.name;
                            i += 1;
                            match children.get(i).and_then(leaf_kind) {
                                Some(TokenKind::Colon) => i += 1,
                                _ => {
                                    return Err(ParseError::new(
                                        ParseErrorKind::Todo(
                                            "expected `:kind` after capture name".into(),
                                        ),
                                        nt.span,
                                    ))
                                }
                            }
                            let kind = match children.get(i).and_then(leaf_kind) {
                                Some(TokenKind::Ident(k)) => {
                                    FragmentKind::from_name(&k.name.resolve()).ok_or_else(
                                        || {
                                            ParseError::new(
                                                ParseErrorKind::Todo(format!(
                                                    "unknown fragment kind `{}`",
                                                    k.name
                                                )),
                                                nt.span,
                                            )
                                        },
                                    )?
                                }
                                _ => {
                                    return Err(ParseError::new(
                                        ParseErrorKind::Todo(
                                            "expected fragment kind name".into(),
                                        ),
                                        nt.span,
                                    ))
                                }
                            };
                            i += 1;
                            out.push(MacroPatEnt::Fragment { name, kind });
                        }
                        _ => {
                            return Err(ParseError::unexpected(
                                nt.kind.clone(),
                                "capture name or `(` after `$`",
                                nt.span,
                            ))
                        }
                    },
                    Some(TokenTree::Group {
                        children: sub,
                        delim: Delim::Paren,
                        ..
                    }) => {
                        let pats = parse_pattern_ents(sub)?;
                        i += 1;
                        let (sep, kind) = parse_loop_suffix(children, &mut i)?;
                        out.push(MacroPatEnt::Loop { sep, kind, pats });
                    }
                    other => {
                        return Err(err_in(
                            other.unwrap_or(&children[i - 1]),
                            "expected capture name or $(...) loop",
                        ))
                    }
                }
            }
            TokenTree::Leaf { token, .. } => {
                out.push(MacroPatEnt::Token(token.clone()));
                i += 1;
            }
            TokenTree::Group {
                delim,
                span,
                children: sub,
                ..
            } => {
                // A literal group in the pattern matches its delimiters and
                // contents token-by-token.
                if let Some(open) = delim.open_token() {
                    out.push(MacroPatEnt::Token(Token::new(open, *span)));
                }
                out.extend(parse_pattern_ents(sub)?);
                if let Some(close) = delim.close_token() {
                    out.push(MacroPatEnt::Token(Token::new(close, *span)));
                }
                i += 1;
            }
        }
    }
    Ok(out)
}

fn parse_body_ents(children: &[TokenTree]) -> PResult<Vec<MacroRuleEnt>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < children.len() {
        match &children[i] {
            TokenTree::Leaf { token, .. } if token.kind == TokenKind::Dollar => {
                i += 1;
                match children.get(i) {
                    Some(TokenTree::Leaf { token: nt, .. }) => match &nt.kind {
                        TokenKind::Ident(name) => {
                            if name.name.is("crate") {
                                out.push(MacroRuleEnt::CrateRef);
                            } else {
                                out.push(MacroRuleEnt::Name(name.name));
                            }
                            i += 1;
                        }
                        TokenKind::KwCrate => {
                            out.push(MacroRuleEnt::CrateRef);
                            i += 1;
                        }
                        _ => {
                            return Err(ParseError::unexpected(
                                nt.kind.clone(),
                                "capture name or `(` after `$`",
                                nt.span,
                            ))
                        }
                    },
                    Some(TokenTree::Group {
                        children: sub,
                        delim: Delim::Paren,
                        ..
                    }) => {
                        let ents = parse_body_ents(sub)?;
                        i += 1;
                        let (sep, _kind) = parse_loop_suffix(children, &mut i)?;
                        out.push(MacroRuleEnt::Loop { sep, ents });
                    }
                    other => {
                        return Err(err_in(
                            other.unwrap_or(&children[i - 1]),
                            "expected capture name or $(...) loop",
                        ))
                    }
                }
            }
            TokenTree::Leaf { token, .. } => {
                out.push(MacroRuleEnt::Token(token.clone()));
                i += 1;
            }
            TokenTree::Group {
                delim,
                span,
                children: sub,
                ..
            } => {
                if let Some(open) = delim.open_token() {
                    out.push(MacroRuleEnt::Token(Token::new(open, *span)));
                }
                out.extend(parse_body_ents(sub)?);
                if let Some(close) = delim.close_token() {
                    out.push(MacroRuleEnt::Token(Token::new(close, *span)));
                }
                i += 1;
            }
        }
    }
    Ok(out)
}
