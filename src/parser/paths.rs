//! Path parsing.
//!
//! Three generic-argument modes: type mode parses `Name<T>` directly,
//! expression mode requires the `::<T>` turbofish, and `None` disables
//! generics entirely (use trees, macro names).

use crate::ast::{Path, PathClass, PathNode, PathParams};
use crate::error::PResult;
use crate::hygiene::Ident;
use crate::intern::Symbol;
use crate::stream::TokenSource;
use crate::token::{Fragment, TokenKind};

use super::types::TypeParsing;
use super::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathGenericMode {
    None,
    Type,
    Expr,
}

pub trait PathParsing {
    /// Parse a path. Consumes exactly the path tokens.
    fn parse_path(&mut self, mode: PathGenericMode) -> PResult<Path>;
    /// Parse the path components after any anchor.
    fn parse_path_nodes(&mut self, mode: PathGenericMode) -> PResult<Vec<PathNode>>;
    /// Parse `<...>` generic arguments; the leading `<` (split from `<<`
    /// if needed) must be next.
    fn parse_path_params(&mut self) -> PResult<PathParams>;
}

impl<S: TokenSource> PathParsing for Parser<S> {
    fn parse_path(&mut self, mode: PathGenericMode) -> PResult<Path> {
        let start = self.span();

        // Interpolated path fragment from a macro capture.
        if let TokenKind::Interpolated(Fragment::Path(_)) = self.peek(0)? {
            let tok = self.get()?;
            if let TokenKind::Interpolated(Fragment::Path(p)) = tok.kind {
                return Ok((*p).clone());
            }
            unreachable!();
        }

        let class = match self.peek(0)? {
            TokenKind::DoubleColon => {
                self.get()?;
                // `:: "crate-name" ::` names a crate by string; the macro
                // expander emits this for `$crate`.
                if let TokenKind::Str(_) = self.peek(0)? {
                    let tok = self.get()?;
                    let name = match tok.kind {
                        TokenKind::Str(s) => s,
                        _ => unreachable!(),
                    };
                    self.expect(&TokenKind::DoubleColon)?;
                    let mut nodes =
                        vec![PathNode::new(Ident::plain(&name))];
                    nodes.extend(self.parse_path_nodes(mode)?);
                    return Ok(Path {
                        class: PathClass::Absolute,
                        nodes,
                        span: start.to(self.span()),
                    });
                }
                PathClass::Absolute
            }
            TokenKind::KwSelf => {
                self.get()?;
                if !self.consume_if(&TokenKind::DoubleColon)? {
                    // Bare `self` is a single-component value path.
                    return Ok(Path {
                        class: PathClass::Relative,
                        nodes: vec![PathNode::new(Ident::new(
                            Symbol::intern("self"),
                            self.lex.hygiene(),
                        ))],
                        span: start.to(self.span()),
                    });
                }
                PathClass::SelfPath
            }
            TokenKind::KwSuper => {
                let mut count = 0;
                while matches!(self.peek(0)?, TokenKind::KwSuper) {
                    self.get()?;
                    count += 1;
                    self.expect(&TokenKind::DoubleColon)?;
                }
                PathClass::Super(count)
            }
            TokenKind::KwCrate => {
                self.get()?;
                self.expect(&TokenKind::DoubleColon)?;
                PathClass::CratePath
            }
            TokenKind::Lt | TokenKind::Shl => {
                // UFCS: `<Type as Trait>::item`
                self.consume_lt()?;
                let ty = self.parse_type()?;
                let trait_path = if self.consume_if(&TokenKind::KwAs)? {
                    Some(Box::new(self.parse_path(PathGenericMode::Type)?))
                } else {
                    None
                };
                if !self.consume_gt()? {
                    let tok = self.get()?;
                    return Err(self.err_unexpected(tok, "`>`"));
                }
                self.expect(&TokenKind::DoubleColon)?;
                let nodes = self.parse_path_nodes(mode)?;
                return Ok(Path {
                    class: PathClass::Ufcs {
                        ty: Box::new(ty),
                        trait_path,
                    },
                    nodes,
                    span: start.to(self.span()),
                });
            }
            _ => PathClass::Relative,
        };

        let nodes = self.parse_path_nodes(mode)?;
        Ok(Path {
            class,
            nodes,
            span: start.to(self.span()),
        })
    }

    fn parse_path_nodes(&mut self, mode: PathGenericMode) -> PResult<Vec<PathNode>> {
        let mut nodes = Vec::new();
        loop {
            let (name, _) = self.expect_ident()?;
            let mut node = PathNode::new(name);
            match mode {
                PathGenericMode::Type => {
                    if matches!(self.peek(0)?, TokenKind::Lt | TokenKind::Shl) {
                        self.consume_lt()?;
                        node.params = self.parse_path_params()?;
                    }
                }
                PathGenericMode::Expr => {
                    // Turbofish: `::` then `<`.
                    if matches!(self.peek(0)?, TokenKind::DoubleColon)
                        && matches!(self.peek(1)?, TokenKind::Lt | TokenKind::Shl)
                    {
                        self.get()?;
                        self.consume_lt()?;
                        node.params = self.parse_path_params()?;
                    }
                }
                PathGenericMode::None => {}
            }
            nodes.push(node);
            // Only continue on `::` followed by an identifier; `::<` was
            // already taken by the turbofish and `::*`/`::{` belong to the
            // caller (use trees).
            if matches!(self.peek(0)?, TokenKind::DoubleColon)
                && matches!(self.peek(1)?, TokenKind::Ident(_))
            {
                self.get()?;
            } else {
                break;
            }
        }
        Ok(nodes)
    }

    fn parse_path_params(&mut self) -> PResult<PathParams> {
        let mut params = PathParams::default();
        loop {
            if self.consume_gt()? {
                return Ok(params);
            }
            match self.peek(0)? {
                TokenKind::Lifetime(_) => {
                    let tok = self.get()?;
                    if let TokenKind::Lifetime(lt) = tok.kind {
                        params.lifetimes.push(lt);
                    }
                }
                _ => {
                    params.types.push(self.parse_type()?);
                }
            }
            if !self.consume_if(&TokenKind::Comma)? {
                if self.consume_gt()? {
                    return Ok(params);
                }
                let tok = self.get()?;
                return Err(self.err_unexpected(tok, "`,` or `>`"));
            }
        }
    }
}
