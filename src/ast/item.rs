//! Item syntax nodes.

use std::rc::Rc;

use crate::hygiene::Ident;
use crate::macros::MacroRulesDef;
use crate::token::Span;

use super::attr::Attribute;
use super::expr::{Block, ExprRef, MacroInvocation};
use super::path::Path;
use super::pattern::Pattern;
use super::types::Type;

#[derive(Debug, Clone)]
pub enum Visibility {
    Private,
    Public,
    /// `pub(crate)`, `pub(super)`, `pub(in path)`
    Restricted(Path),
}

#[derive(Debug, Clone)]
pub enum GenericParam {
    Lifetime(Ident),
    Type {
        name: Ident,
        bounds: Vec<Path>,
        default: Option<Type>,
    },
}

#[derive(Debug, Clone)]
pub struct WhereClause {
    pub ty: Type,
    pub bounds: Vec<Path>,
}

#[derive(Debug, Clone, Default)]
pub struct Generics {
    pub params: Vec<GenericParam>,
    pub where_clauses: Vec<WhereClause>,
}

impl Generics {
    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.where_clauses.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: Ident,
    pub generics: Generics,
    pub abi: Option<String>,
    pub is_unsafe: bool,
    pub is_const: bool,
    pub args: Vec<(Pattern, Type)>,
    pub ret: Type,
    /// `None` for declarations inside `extern` blocks and trait methods
    /// without defaults.
    pub body: Option<Box<Block>>,
}

#[derive(Debug, Clone)]
pub enum StructKind {
    Unit,
    Tuple(Vec<(Visibility, Type)>),
    Named(Vec<(Visibility, Ident, Type)>),
}

#[derive(Debug, Clone)]
pub struct EnumVariant {
    pub name: Ident,
    pub kind: StructKind,
    pub discriminant: Option<ExprRef>,
}

#[derive(Debug, Clone)]
pub enum UseKind {
    /// `use path;` / `use path as name;`
    Named(Option<Ident>),
    /// `use path::*;`
    Glob,
}

#[derive(Debug, Clone)]
pub enum ItemKind {
    Fn(Function),
    Static {
        name: Ident,
        is_mut: bool,
        ty: Type,
        value: Option<ExprRef>,
    },
    Const {
        name: Ident,
        ty: Type,
        value: Option<ExprRef>,
    },
    Struct {
        name: Ident,
        generics: Generics,
        kind: StructKind,
    },
    Enum {
        name: Ident,
        generics: Generics,
        variants: Vec<EnumVariant>,
    },
    Trait {
        name: Ident,
        generics: Generics,
        supertraits: Vec<Path>,
        items: Vec<Item>,
    },
    Impl {
        generics: Generics,
        trait_path: Option<Path>,
        ty: Type,
        items: Vec<Item>,
    },
    TypeAlias {
        name: Ident,
        generics: Generics,
        ty: Type,
    },
    Use {
        path: Path,
        kind: UseKind,
    },
    ExternCrate {
        name: Ident,
        alias: Option<Ident>,
    },
    Module {
        name: Ident,
        /// `None` for a file-backed `mod name;` (loading the file is the
        /// driver's concern, not the parser's).
        items: Option<Vec<Item>>,
    },
    ExternBlock {
        abi: String,
        items: Vec<Item>,
    },
    MacroDef {
        name: Ident,
        rules: Rc<MacroRulesDef>,
    },
    MacroInvocation(MacroInvocation),
}

#[derive(Debug, Clone)]
pub struct Item {
    pub attrs: Vec<Attribute>,
    pub vis: Visibility,
    pub kind: ItemKind,
    pub span: Span,
}

impl Item {
    pub fn name(&self) -> Option<&Ident> {
        match &self.kind {
            ItemKind::Fn(f) => Some(&f.name),
            ItemKind::Static { name, .. }
            | ItemKind::Const { name, .. }
            | ItemKind::Struct { name, .. }
            | ItemKind::Enum { name, .. }
            | ItemKind::Trait { name, .. }
            | ItemKind::TypeAlias { name, .. }
            | ItemKind::ExternCrate { name, .. }
            | ItemKind::Module { name, .. }
            | ItemKind::MacroDef { name, .. } => Some(name),
            _ => None,
        }
    }
}
