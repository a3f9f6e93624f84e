//! Item parsing: functions, type definitions, impls, uses, macros.

use std::rc::Rc;

use crate::ast::{
    AttrData, Attribute, EnumVariant, Function, GenericParam, Generics, Item, ItemKind, Path,
    PathClass, PathNode, Pattern, PatternBinding, PatternKind, StructKind, Type, TypeKind,
    UseKind, Visibility, WhereClause,
};
use crate::error::{PResult, ParseError};
use crate::hygiene::Ident;
use crate::intern::Symbol;
use crate::stream::TokenSource;
use crate::token::{Span, TokenKind};
use crate::tokentree::Delim;

use super::expr::ExprParsing;
use super::paths::{PathGenericMode, PathParsing};
use super::tt::TtParsing;
use super::types::TypeParsing;
use super::Parser;

pub trait ItemParsing {
    /// Parse one item (grouped `use` expands to several). Outer attributes
    /// and visibility are consumed here.
    fn parse_item(&mut self) -> PResult<Vec<Item>>;
    /// Parse items until EOF (`top` true) or a closing brace. Returns the
    /// module's inner attributes and its items.
    fn parse_mod_items(&mut self, top: bool) -> PResult<(Vec<Attribute>, Vec<Item>)>;
    /// Parse one attribute; `#` must be next.
    fn parse_attribute(&mut self) -> PResult<Attribute>;
    /// Parse the *contents* of an attribute (the `meta` fragment grammar).
    fn parse_meta_item(&mut self) -> PResult<Attribute>;
}

impl<S: TokenSource> ItemParsing for Parser<S> {
    fn parse_item(&mut self) -> PResult<Vec<Item>> {
        let start = self.span();
        let mut attrs = Vec::new();
        while matches!(self.peek(0)?, TokenKind::Hash)
            && matches!(self.peek(1)?, TokenKind::BracketOpen)
        {
            attrs.push(self.parse_attribute()?);
        }

        let vis = self.parse_visibility()?;

        let kinds = self.parse_item_kind()?;
        let span = start.to(self.span());
        let mut items: Vec<Item> = kinds
            .into_iter()
            .map(|kind| Item {
                attrs: attrs.clone(),
                vis: vis.clone(),
                kind,
                span,
            })
            .collect();
        if items.len() > 1 {
            // Only grouped `use` produces several; share the attributes.
            for item in &mut items[1..] {
                item.attrs = attrs.clone();
            }
        }
        Ok(items)
    }

    fn parse_mod_items(&mut self, top: bool) -> PResult<(Vec<Attribute>, Vec<Item>)> {
        let mut inner_attrs = Vec::new();
        let mut items = Vec::new();
        loop {
            match self.peek(0)? {
                TokenKind::Eof if top => break,
                TokenKind::BraceClose if !top => break,
                TokenKind::Hash if matches!(self.peek(1)?, TokenKind::Bang) => {
                    self.get()?;
                    self.get()?;
                    self.expect(&TokenKind::BracketOpen)?;
                    let mut attr = self.parse_meta_item()?;
                    attr.is_inner = true;
                    self.expect(&TokenKind::BracketClose)?;
                    inner_attrs.push(attr);
                }
                _ => items.extend(self.parse_item()?),
            }
        }
        Ok((inner_attrs, items))
    }

    fn parse_attribute(&mut self) -> PResult<Attribute> {
        self.expect(&TokenKind::Hash)?;
        let is_inner = self.consume_if(&TokenKind::Bang)?;
        self.expect(&TokenKind::BracketOpen)?;
        let mut attr = self.parse_meta_item()?;
        attr.is_inner = is_inner;
        self.expect(&TokenKind::BracketClose)?;
        Ok(attr)
    }

    fn parse_meta_item(&mut self) -> PResult<Attribute> {
        let start = self.span();
        if let TokenKind::Interpolated(crate::token::Fragment::Meta(_)) = self.peek(0)? {
            let tok = self.get()?;
            if let TokenKind::Interpolated(crate::token::Fragment::Meta(m)) = tok.kind {
                return Ok((*m).clone());
            }
            unreachable!()
        }
        let name = self.parse_path(PathGenericMode::None)?;
        let data = match self.peek(0)? {
            TokenKind::Eq => {
                self.get()?;
                match self.peek(0)? {
                    TokenKind::Str(_) => {
                        let tok = self.get()?;
                        match tok.kind {
                            TokenKind::Str(s) => AttrData::Str(s),
                            _ => unreachable!(),
                        }
                    }
                    _ => AttrData::Value(self.parse_expr()?),
                }
            }
            TokenKind::ParenOpen => {
                self.get()?;
                let mut list = Vec::new();
                while !matches!(self.peek(0)?, TokenKind::ParenClose) {
                    list.push(self.parse_meta_item()?);
                    if !self.consume_if(&TokenKind::Comma)? {
                        break;
                    }
                }
                self.expect(&TokenKind::ParenClose)?;
                AttrData::List(list)
            }
            _ => AttrData::None,
        };
        Ok(Attribute {
            is_inner: false,
            name,
            data,
            span: start.to(self.span()),
        })
    }
}

impl<S: TokenSource> Parser<S> {
    fn parse_visibility(&mut self) -> PResult<Visibility> {
        if !self.consume_if(&TokenKind::KwPub)? {
            return Ok(Visibility::Private);
        }
        if matches!(self.peek(0)?, TokenKind::ParenOpen) {
            // Only restriction forms take the parens; `pub (tuple)` fields
            // don't reach this parser path.
            match self.peek(1)? {
                TokenKind::KwCrate | TokenKind::KwSuper | TokenKind::KwSelf | TokenKind::KwIn => {
                    self.get()?;
                    let span = self.span();
                    let path = if self.consume_if(&TokenKind::KwIn)? {
                        self.parse_path(PathGenericMode::None)?
                    } else {
                        let tok = self.get()?;
                        let class = match tok.kind {
                            TokenKind::KwCrate => PathClass::CratePath,
                            TokenKind::KwSuper => PathClass::Super(1),
                            TokenKind::KwSelf => PathClass::SelfPath,
                            _ => unreachable!(),
                        };
                        Path {
                            class,
                            nodes: Vec::new(),
                            span,
                        }
                    };
                    self.expect(&TokenKind::ParenClose)?;
                    return Ok(Visibility::Restricted(path));
                }
                _ => {}
            }
        }
        Ok(Visibility::Public)
    }

    fn parse_item_kind(&mut self) -> PResult<Vec<ItemKind>> {
        match self.peek(0)? {
            TokenKind::KwFn => Ok(vec![self.parse_fn_item(false, false, None)?]),
            TokenKind::KwConst => {
                self.get()?;
                if matches!(self.peek(0)?, TokenKind::KwFn) {
                    Ok(vec![self.parse_fn_item(false, true, None)?])
                } else {
                    let (name, _) = self.expect_ident()?;
                    self.expect(&TokenKind::Colon)?;
                    let ty = self.parse_type()?;
                    let value = if self.consume_if(&TokenKind::Eq)? {
                        Some(self.parse_expr()?)
                    } else {
                        None
                    };
                    self.expect(&TokenKind::Semicolon)?;
                    Ok(vec![ItemKind::Const { name, ty, value }])
                }
            }
            TokenKind::KwStatic => {
                self.get()?;
                let is_mut = self.consume_if(&TokenKind::KwMut)?;
                let (name, _) = self.expect_ident()?;
                self.expect(&TokenKind::Colon)?;
                let ty = self.parse_type()?;
                let value = if self.consume_if(&TokenKind::Eq)? {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                self.expect(&TokenKind::Semicolon)?;
                Ok(vec![ItemKind::Static {
                    name,
                    is_mut,
                    ty,
                    value,
                }])
            }
            TokenKind::KwUnsafe => {
                self.get()?;
                match self.peek(0)? {
                    TokenKind::KwFn => Ok(vec![self.parse_fn_item(true, false, None)?]),
                    TokenKind::KwImpl => Ok(vec![self.parse_impl()?]),
                    TokenKind::KwTrait => Ok(vec![self.parse_trait()?]),
                    _ => {
                        let tok = self.get()?;
                        Err(self.err_unexpected(tok, "`fn`, `impl`, or `trait` after `unsafe`"))
                    }
                }
            }
            TokenKind::KwExtern => {
                self.get()?;
                if self.consume_if(&TokenKind::KwCrate)? {
                    let (name, _) = self.expect_ident()?;
                    let alias = if self.consume_if(&TokenKind::KwAs)? {
                        Some(self.expect_ident()?.0)
                    } else {
                        None
                    };
                    self.expect(&TokenKind::Semicolon)?;
                    return Ok(vec![ItemKind::ExternCrate { name, alias }]);
                }
                let abi = match self.peek(0)? {
                    TokenKind::Str(_) => {
                        let tok = self.get()?;
                        match tok.kind {
                            TokenKind::Str(s) => s,
                            _ => unreachable!(),
                        }
                    }
                    _ => "C".to_string(),
                };
                if matches!(self.peek(0)?, TokenKind::BraceOpen) {
                    self.get()?;
                    let mut items = Vec::new();
                    while !matches!(self.peek(0)?, TokenKind::BraceClose) {
                        items.extend(self.parse_item()?);
                    }
                    self.expect(&TokenKind::BraceClose)?;
                    Ok(vec![ItemKind::ExternBlock { abi, items }])
                } else {
                    Ok(vec![self.parse_fn_item(false, false, Some(abi))?])
                }
            }
            TokenKind::KwStruct => Ok(vec![self.parse_struct()?]),
            TokenKind::KwEnum => Ok(vec![self.parse_enum()?]),
            TokenKind::KwTrait => Ok(vec![self.parse_trait()?]),
            TokenKind::KwImpl => Ok(vec![self.parse_impl()?]),
            TokenKind::KwType => {
                self.get()?;
                let (name, _) = self.expect_ident()?;
                let generics = self.parse_generics()?;
                self.expect(&TokenKind::Eq)?;
                let ty = self.parse_type()?;
                self.expect(&TokenKind::Semicolon)?;
                Ok(vec![ItemKind::TypeAlias { name, generics, ty }])
            }
            TokenKind::KwUse => {
                self.get()?;
                let entries = self.parse_use_tree()?;
                self.expect(&TokenKind::Semicolon)?;
                Ok(entries
                    .into_iter()
                    .map(|(path, kind)| ItemKind::Use { path, kind })
                    .collect())
            }
            TokenKind::KwMod => {
                self.get()?;
                let (name, _) = self.expect_ident()?;
                if self.consume_if(&TokenKind::Semicolon)? {
                    Ok(vec![ItemKind::Module { name, items: None }])
                } else {
                    self.expect(&TokenKind::BraceOpen)?;
                    let (_inner, items) = self.parse_mod_items(false)?;
                    self.expect(&TokenKind::BraceClose)?;
                    Ok(vec![ItemKind::Module {
                        name,
                        items: Some(items),
                    }])
                }
            }
            TokenKind::Ident(i) if i.name.is("macro_rules") => {
                self.get()?;
                self.expect(&TokenKind::Bang)?;
                let (name, _) = self.expect_ident()?;
                let body = self.parse_tt()?;
                let rules = crate::macros::parse_macro_rules(name.name, &body)?;
                Ok(vec![ItemKind::MacroDef {
                    name,
                    rules: Rc::new(rules),
                }])
            }
            _ => {
                // Macro invocation in item position: `path ! ident? (tt)`.
                let start = self.span();
                let path = self.parse_path(PathGenericMode::None)?;
                self.expect(&TokenKind::Bang)?;
                let mac = self.parse_macro_invocation_tail(path, start)?;
                if mac.delim != Delim::Brace {
                    self.expect(&TokenKind::Semicolon)?;
                }
                Ok(vec![ItemKind::MacroInvocation(mac)])
            }
        }
    }

    /// `fn` and onwards. `unsafe`/`const`/`extern "abi"` were consumed by
    /// the caller.
    fn parse_fn_item(
        &mut self,
        is_unsafe: bool,
        is_const: bool,
        abi: Option<String>,
    ) -> PResult<ItemKind> {
        self.expect(&TokenKind::KwFn)?;
        let (name, _) = self.expect_ident()?;
        let mut generics = self.parse_generics()?;
        self.expect(&TokenKind::ParenOpen)?;
        let args = self.parse_fn_args()?;
        self.expect(&TokenKind::ParenClose)?;
        let ret = if self.consume_if(&TokenKind::RArrow)? {
            self.parse_type()?
        } else {
            Type::unit(self.span())
        };
        generics.where_clauses = self.parse_where_clauses()?;
        let body = if self.consume_if(&TokenKind::Semicolon)? {
            None
        } else {
            Some(Box::new(self.parse_block()?))
        };
        Ok(ItemKind::Fn(Function {
            name,
            generics,
            abi,
            is_unsafe,
            is_const,
            args,
            ret,
            body,
        }))
    }

    fn parse_fn_args(&mut self) -> PResult<Vec<(Pattern, Type)>> {
        let mut args = Vec::new();
        // Receiver forms: `self`, `&self`, `&mut self`, `mut self`,
        // `self: Ty`. Represented as a plain `self` binding.
        let self_span = self.span();
        let took_receiver = match self.peek(0)? {
            TokenKind::KwSelf => true,
            TokenKind::Amp => match (self.peek(1)?, self.peek(2)?) {
                (TokenKind::KwSelf, _) => true,
                (TokenKind::KwMut, TokenKind::KwSelf) => true,
                (TokenKind::Lifetime(_), _) => matches!(self.peek(2)?, TokenKind::KwSelf),
                _ => false,
            },
            TokenKind::KwMut => matches!(self.peek(1)?, TokenKind::KwSelf),
            _ => false,
        };
        if took_receiver {
            let mut is_ref = false;
            if self.consume_if(&TokenKind::Amp)? {
                is_ref = true;
                if let TokenKind::Lifetime(_) = self.peek(0)? {
                    self.get()?;
                }
            }
            let is_mut = self.consume_if(&TokenKind::KwMut)?;
            self.expect(&TokenKind::KwSelf)?;
            let ty = if self.consume_if(&TokenKind::Colon)? {
                self.parse_type()?
            } else {
                Type::infer(self_span)
            };
            args.push((
                Pattern::new(
                    PatternKind::Bind {
                        binding: PatternBinding {
                            name: Ident::new(Symbol::intern("self"), self.lex.hygiene()),
                            by_ref: is_ref,
                            is_mut,
                        },
                        sub: None,
                    },
                    self_span,
                ),
                ty,
            ));
            if !self.consume_if(&TokenKind::Comma)? {
                return Ok(args);
            }
        }
        while !matches!(self.peek(0)?, TokenKind::ParenClose) {
            if self.consume_if(&TokenKind::DotDotDot)? {
                // C variadics in extern declarations; the marker itself is
                // enough for the front end.
                break;
            }
            use super::pattern::PatternParsing;
            let pat = self.parse_pattern(false)?;
            self.expect(&TokenKind::Colon)?;
            let ty = self.parse_type()?;
            args.push((pat, ty));
            if !self.consume_if(&TokenKind::Comma)? {
                break;
            }
        }
        Ok(args)
    }

    pub(super) fn parse_generics(&mut self) -> PResult<Generics> {
        let mut generics = Generics::default();
        if !matches!(self.peek(0)?, TokenKind::Lt | TokenKind::Shl) {
            return Ok(generics);
        }
        self.consume_lt()?;
        loop {
            if self.consume_gt()? {
                break;
            }
            match self.peek(0)? {
                TokenKind::Lifetime(_) => {
                    let tok = self.get()?;
                    if let TokenKind::Lifetime(lt) = tok.kind {
                        generics.params.push(GenericParam::Lifetime(lt));
                    }
                    // Lifetime bounds are accepted and dropped.
                    if self.consume_if(&TokenKind::Colon)? {
                        loop {
                            if let TokenKind::Lifetime(_) = self.peek(0)? {
                                self.get()?;
                            }
                            if !self.consume_if(&TokenKind::Plus)? {
                                break;
                            }
                        }
                    }
                }
                _ => {
                    let (name, _) = self.expect_ident()?;
                    let bounds = if self.consume_if(&TokenKind::Colon)? {
                        self.parse_bound_list()?
                    } else {
                        Vec::new()
                    };
                    let default = if self.consume_if(&TokenKind::Eq)? {
                        Some(self.parse_type()?)
                    } else {
                        None
                    };
                    generics.params.push(GenericParam::Type {
                        name,
                        bounds,
                        default,
                    });
                }
            }
            if !self.consume_if(&TokenKind::Comma)? {
                if !self.consume_gt()? {
                    let tok = self.get()?;
                    return Err(self.err_unexpected(tok, "`,` or `>`"));
                }
                break;
            }
        }
        Ok(generics)
    }

    fn parse_where_clauses(&mut self) -> PResult<Vec<WhereClause>> {
        let mut clauses = Vec::new();
        if !self.consume_if(&TokenKind::KwWhere)? {
            return Ok(clauses);
        }
        loop {
            match self.peek(0)? {
                TokenKind::BraceOpen | TokenKind::Semicolon | TokenKind::Eof => break,
                TokenKind::Lifetime(_) => {
                    // `'a: 'b` bounds are accepted and dropped.
                    self.get()?;
                    self.expect(&TokenKind::Colon)?;
                    loop {
                        if let TokenKind::Lifetime(_) = self.peek(0)? {
                            self.get()?;
                        }
                        if !self.consume_if(&TokenKind::Plus)? {
                            break;
                        }
                    }
                }
                _ => {
                    let ty = self.parse_type()?;
                    self.expect(&TokenKind::Colon)?;
                    let bounds = self.parse_bound_list()?;
                    clauses.push(WhereClause { ty, bounds });
                }
            }
            if !self.consume_if(&TokenKind::Comma)? {
                break;
            }
        }
        Ok(clauses)
    }

    fn parse_struct(&mut self) -> PResult<ItemKind> {
        self.expect(&TokenKind::KwStruct)?;
        let (name, _) = self.expect_ident()?;
        let mut generics = self.parse_generics()?;
        match self.peek(0)? {
            TokenKind::Semicolon => {
                self.get()?;
                Ok(ItemKind::Struct {
                    name,
                    generics,
                    kind: StructKind::Unit,
                })
            }
            TokenKind::ParenOpen => {
                self.get()?;
                let mut fields = Vec::new();
                while !matches!(self.peek(0)?, TokenKind::ParenClose) {
                    let vis = self.parse_visibility()?;
                    let ty = self.parse_type()?;
                    fields.push((vis, ty));
                    if !self.consume_if(&TokenKind::Comma)? {
                        break;
                    }
                }
                self.expect(&TokenKind::ParenClose)?;
                generics.where_clauses = self.parse_where_clauses()?;
                self.expect(&TokenKind::Semicolon)?;
                Ok(ItemKind::Struct {
                    name,
                    generics,
                    kind: StructKind::Tuple(fields),
                })
            }
            TokenKind::KwWhere | TokenKind::BraceOpen => {
                generics.where_clauses = self.parse_where_clauses()?;
                self.expect(&TokenKind::BraceOpen)?;
                let fields = self.parse_named_fields()?;
                self.expect(&TokenKind::BraceClose)?;
                Ok(ItemKind::Struct {
                    name,
                    generics,
                    kind: StructKind::Named(fields),
                })
            }
            _ => {
                let tok = self.get()?;
                Err(self.err_unexpected(tok, "`;`, `(`, or `{` in struct definition"))
            }
        }
    }

    fn parse_named_fields(&mut self) -> PResult<Vec<(Visibility, Ident, Type)>> {
        let mut fields = Vec::new();
        while !matches!(self.peek(0)?, TokenKind::BraceClose) {
            // Field attributes are parsed and dropped (no expansion pass
            // over fields here).
            while matches!(self.peek(0)?, TokenKind::Hash) {
                self.parse_attribute()?;
            }
            let vis = self.parse_visibility()?;
            let (name, _) = self.expect_ident()?;
            self.expect(&TokenKind::Colon)?;
            let ty = self.parse_type()?;
            fields.push((vis, name, ty));
            if !self.consume_if(&TokenKind::Comma)? {
                break;
            }
        }
        Ok(fields)
    }

    fn parse_enum(&mut self) -> PResult<ItemKind> {
        self.expect(&TokenKind::KwEnum)?;
        let (name, _) = self.expect_ident()?;
        let mut generics = self.parse_generics()?;
        generics.where_clauses = self.parse_where_clauses()?;
        self.expect(&TokenKind::BraceOpen)?;
        let mut variants = Vec::new();
        while !matches!(self.peek(0)?, TokenKind::BraceClose) {
            while matches!(self.peek(0)?, TokenKind::Hash) {
                self.parse_attribute()?;
            }
            let (vname, _) = self.expect_ident()?;
            let kind = match self.peek(0)? {
                TokenKind::ParenOpen => {
                    self.get()?;
                    let mut fields = Vec::new();
                    while !matches!(self.peek(0)?, TokenKind::ParenClose) {
                        fields.push((Visibility::Private, self.parse_type()?));
                        if !self.consume_if(&TokenKind::Comma)? {
                            break;
                        }
                    }
                    self.expect(&TokenKind::ParenClose)?;
                    StructKind::Tuple(fields)
                }
                TokenKind::BraceOpen => {
                    self.get()?;
                    let fields = self.parse_named_fields()?;
                    self.expect(&TokenKind::BraceClose)?;
                    StructKind::Named(fields)
                }
                _ => StructKind::Unit,
            };
            let discriminant = if self.consume_if(&TokenKind::Eq)? {
                Some(self.parse_expr()?)
            } else {
                None
            };
            variants.push(EnumVariant {
                name: vname,
                kind,
                discriminant,
            });
            if !self.consume_if(&TokenKind::Comma)? {
                break;
            }
        }
        self.expect(&TokenKind::BraceClose)?;
        Ok(ItemKind::Enum {
            name,
            generics,
            variants,
        })
    }

    fn parse_trait(&mut self) -> PResult<ItemKind> {
        self.expect(&TokenKind::KwTrait)?;
        let (name, _) = self.expect_ident()?;
        let mut generics = self.parse_generics()?;
        let supertraits = if self.consume_if(&TokenKind::Colon)? {
            self.parse_bound_list()?
        } else {
            Vec::new()
        };
        generics.where_clauses = self.parse_where_clauses()?;
        self.expect(&TokenKind::BraceOpen)?;
        let mut items = Vec::new();
        while !matches!(self.peek(0)?, TokenKind::BraceClose) {
            items.extend(self.parse_item()?);
        }
        self.expect(&TokenKind::BraceClose)?;
        Ok(ItemKind::Trait {
            name,
            generics,
            supertraits,
            items,
        })
    }

    fn parse_impl(&mut self) -> PResult<ItemKind> {
        self.expect(&TokenKind::KwImpl)?;
        let mut generics = self.parse_generics()?;
        let first = self.parse_type()?;
        let (trait_path, ty) = if self.consume_if(&TokenKind::KwFor)? {
            let trait_path = type_to_path(first, self.span())?;
            let ty = self.parse_type()?;
            (Some(trait_path), ty)
        } else {
            (None, first)
        };
        generics.where_clauses = self.parse_where_clauses()?;
        self.expect(&TokenKind::BraceOpen)?;
        let mut items = Vec::new();
        while !matches!(self.peek(0)?, TokenKind::BraceClose) {
            items.extend(self.parse_item()?);
        }
        self.expect(&TokenKind::BraceClose)?;
        Ok(ItemKind::Impl {
            generics,
            trait_path,
            ty,
            items,
        })
    }

    /// Use tree: `a::b`, `a::b as c`, `a::b::*`, `a::{b, c as d, self}`.
    fn parse_use_tree(&mut self) -> PResult<Vec<(Path, UseKind)>> {
        let start = self.span();
        let class = match self.peek(0)? {
            TokenKind::DoubleColon => {
                self.get()?;
                PathClass::Absolute
            }
            TokenKind::KwSelf => {
                self.get()?;
                self.expect(&TokenKind::DoubleColon)?;
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
            _ => PathClass::Relative,
        };
        let mut nodes = Vec::new();
        self.parse_use_tail(class, &mut nodes, start)
    }

    fn parse_use_tail(
        &mut self,
        class: PathClass,
        nodes: &mut Vec<PathNode>,
        start: Span,
    ) -> PResult<Vec<(Path, UseKind)>> {
        loop {
            match self.peek(0)? {
                TokenKind::Star => {
                    self.get()?;
                    let path = Path {
                        class,
                        nodes: nodes.clone(),
                        span: start.to(self.span()),
                    };
                    return Ok(vec![(path, UseKind::Glob)]);
                }
                TokenKind::BraceOpen => {
                    self.get()?;
                    let mut out = Vec::new();
                    while !matches!(self.peek(0)?, TokenKind::BraceClose) {
                        if self.consume_if(&TokenKind::KwSelf)? {
                            // `use a::{self}` pulls in the prefix itself.
                            let alias = if self.consume_if(&TokenKind::KwAs)? {
                                Some(self.expect_ident()?.0)
                            } else {
                                None
                            };
                            out.push((
                                Path {
                                    class: class.clone(),
                                    nodes: nodes.clone(),
                                    span: start.to(self.span()),
                                },
                                UseKind::Named(alias),
                            ));
                        } else {
                            let mut sub_nodes = nodes.clone();
                            out.extend(self.parse_use_tail(
                                class.clone(),
                                &mut sub_nodes,
                                start,
                            )?);
                        }
                        if !self.consume_if(&TokenKind::Comma)? {
                            break;
                        }
                    }
                    self.expect(&TokenKind::BraceClose)?;
                    return Ok(out);
                }
                _ => {
                    let (name, _) = self.expect_ident()?;
                    nodes.push(PathNode::new(name));
                    if self.consume_if(&TokenKind::KwAs)? {
                        let (alias, _) = self.expect_ident()?;
                        let path = Path {
                            class,
                            nodes: nodes.clone(),
                            span: start.to(self.span()),
                        };
                        return Ok(vec![(path, UseKind::Named(Some(alias)))]);
                    }
                    if !self.consume_if(&TokenKind::DoubleColon)? {
                        let path = Path {
                            class,
                            nodes: nodes.clone(),
                            span: start.to(self.span()),
                        };
                        return Ok(vec![(path, UseKind::Named(None))]);
                    }
                }
            }
        }
    }
}

/// Re-interpret a parsed type as a trait path (for `impl Trait for Ty`).
fn type_to_path(ty: Type, span: Span) -> PResult<Path> {
    match ty.kind {
        TypeKind::Path(p) => Ok(*p),
        _ => Err(ParseError::todo("non-path trait in impl header", span)),
    }
}
