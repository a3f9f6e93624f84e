//! Type parsing.

use crate::ast::{BorrowKind, Path, Type, TypeKind};
use crate::error::PResult;
use crate::stream::TokenSource;
use crate::token::{CoreType, Fragment, TokenKind};

use super::paths::{PathGenericMode, PathParsing};
use super::Parser;

pub trait TypeParsing {
    /// Parse one type. Consumes exactly the type's tokens.
    fn parse_type(&mut self) -> PResult<Type>;
    /// `Trait + Trait + ...` bound list (also used after `dyn`/`impl`).
    fn parse_bound_list(&mut self) -> PResult<Vec<Path>>;
}

impl<S: TokenSource> TypeParsing for Parser<S> {
    fn parse_type(&mut self) -> PResult<Type> {
        let start = self.span();
        let kind = match self.peek(0)? {
            TokenKind::Interpolated(Fragment::Ty(_)) => {
                let tok = self.get()?;
                if let TokenKind::Interpolated(Fragment::Ty(ty)) = tok.kind {
                    return Ok((*ty).clone());
                }
                unreachable!()
            }
            TokenKind::Underscore => {
                self.get()?;
                TypeKind::Infer
            }
            TokenKind::Bang => {
                self.get()?;
                TypeKind::Diverge
            }
            TokenKind::Amp | TokenKind::AmpAmp => {
                // `&&T` splits into two borrows.
                let tok = self.get()?;
                let doubled = tok.kind == TokenKind::AmpAmp;
                let inner = self.parse_borrow_inner()?;
                if doubled {
                    let span = start.to(self.span());
                    TypeKind::Borrow {
                        lifetime: None,
                        kind: BorrowKind::Shared,
                        inner: Box::new(Type::new(inner, span)),
                    }
                } else {
                    inner
                }
            }
            TokenKind::Star => {
                self.get()?;
                let is_mut = if self.consume_if(&TokenKind::KwMut)? {
                    true
                } else if self.consume_if(&TokenKind::KwConst)? {
                    false
                } else {
                    let tok = self.get()?;
                    return Err(self.err_unexpected(tok, "`const` or `mut`"));
                };
                TypeKind::Pointer {
                    is_mut,
                    inner: Box::new(self.parse_type()?),
                }
            }
            TokenKind::ParenOpen => {
                self.get()?;
                if self.consume_if(&TokenKind::ParenClose)? {
                    TypeKind::Unit
                } else {
                    let first = self.parse_type()?;
                    if self.consume_if(&TokenKind::Comma)? {
                        let mut items = vec![first];
                        while !matches!(self.peek(0)?, TokenKind::ParenClose) {
                            items.push(self.parse_type()?);
                            if !self.consume_if(&TokenKind::Comma)? {
                                break;
                            }
                        }
                        self.expect(&TokenKind::ParenClose)?;
                        TypeKind::Tuple(items)
                    } else {
                        self.expect(&TokenKind::ParenClose)?;
                        // Parenthesized type: transparent.
                        return Ok(first);
                    }
                }
            }
            TokenKind::BracketOpen => {
                self.get()?;
                let elem = self.parse_type()?;
                let kind = if self.consume_if(&TokenKind::Semicolon)? {
                    use super::expr::ExprParsing;
                    let size = self.parse_expr()?;
                    TypeKind::Array {
                        elem: Box::new(elem),
                        size,
                    }
                } else {
                    TypeKind::Slice(Box::new(elem))
                };
                self.expect(&TokenKind::BracketClose)?;
                kind
            }
            TokenKind::KwFn | TokenKind::KwUnsafe | TokenKind::KwExtern => {
                self.parse_fn_type()?
            }
            TokenKind::KwDyn => {
                self.get()?;
                TypeKind::TraitObject(self.parse_bound_list()?)
            }
            TokenKind::KwImpl => {
                self.get()?;
                TypeKind::ImplTrait(self.parse_bound_list()?)
            }
            TokenKind::DoubleColon | TokenKind::KwSuper | TokenKind::KwCrate | TokenKind::KwSelf
            | TokenKind::Lt | TokenKind::Shl => {
                TypeKind::Path(Box::new(self.parse_path(PathGenericMode::Type)?))
            }
            TokenKind::Ident(i) => {
                // Primitive names are not reserved words; catch them here.
                let text = i.name.resolve();
                let prim = match &*text {
                    "bool" => Some(CoreType::Bool),
                    "char" => Some(CoreType::Char),
                    "str" => Some(CoreType::Str),
                    other => CoreType::from_suffix(other),
                };
                match prim {
                    Some(ct) if !matches!(self.peek(1)?, TokenKind::DoubleColon) => {
                        self.get()?;
                        TypeKind::Primitive(ct)
                    }
                    _ => TypeKind::Path(Box::new(self.parse_path(PathGenericMode::Type)?)),
                }
            }
            _ => {
                let tok = self.get()?;
                return Err(self.err_unexpected(tok, "a type"));
            }
        };
        Ok(Type::new(kind, start.to(self.span())))
    }

    fn parse_bound_list(&mut self) -> PResult<Vec<Path>> {
        let mut bounds = Vec::new();
        // Tolerate parenthesized bound lists.
        let parens = self.consume_if(&TokenKind::ParenOpen)?;
        loop {
            // Lifetime bounds are accepted and dropped (no borrowck here).
            if let TokenKind::Lifetime(_) = self.peek(0)? {
                self.get()?;
            } else {
                bounds.push(self.parse_path(PathGenericMode::Type)?);
            }
            if !self.consume_if(&TokenKind::Plus)? {
                break;
            }
        }
        if parens {
            self.expect(&TokenKind::ParenClose)?;
        }
        Ok(bounds)
    }
}

impl<S: TokenSource> Parser<S> {
    fn parse_borrow_inner(&mut self) -> PResult<TypeKind> {
        let lifetime = if let TokenKind::Lifetime(_) = self.peek(0)? {
            let tok = self.get()?;
            match tok.kind {
                TokenKind::Lifetime(lt) => Some(lt),
                _ => unreachable!(),
            }
        } else {
            None
        };
        let kind = if self.consume_if(&TokenKind::KwMut)? {
            BorrowKind::Unique
        } else if self.consume_if(&TokenKind::KwMove)? {
            BorrowKind::Move
        } else {
            BorrowKind::Shared
        };
        Ok(TypeKind::Borrow {
            lifetime,
            kind,
            inner: Box::new(self.parse_type()?),
        })
    }

    fn parse_fn_type(&mut self) -> PResult<TypeKind> {
        let is_unsafe = self.consume_if(&TokenKind::KwUnsafe)?;
        let abi = if self.consume_if(&TokenKind::KwExtern)? {
            match self.peek(0)? {
                TokenKind::Str(_) => {
                    let tok = self.get()?;
                    match tok.kind {
                        TokenKind::Str(s) => Some(s),
                        _ => unreachable!(),
                    }
                }
                _ => Some("C".to_string()),
            }
        } else {
            None
        };
        self.expect(&TokenKind::KwFn)?;
        self.expect(&TokenKind::ParenOpen)?;
        let mut args = Vec::new();
        let mut variadic = false;
        while !matches!(self.peek(0)?, TokenKind::ParenClose) {
            if self.consume_if(&TokenKind::DotDotDot)? {
                variadic = true;
                break;
            }
            args.push(self.parse_type()?);
            if !self.consume_if(&TokenKind::Comma)? {
                break;
            }
        }
        self.expect(&TokenKind::ParenClose)?;
        let ret = if self.consume_if(&TokenKind::RArrow)? {
            self.parse_type()?
        } else {
            Type::unit(self.span())
        };
        Ok(TypeKind::Function {
            is_unsafe,
            abi,
            args,
            ret: Box::new(ret),
            variadic,
        })
    }
}
