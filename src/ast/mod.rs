pub mod attr;
pub mod expr;
pub mod item;
pub mod path;
pub mod pattern;
pub mod types;
pub mod visitor;

pub use attr::{AttrData, Attribute};
pub use expr::{
    BinOp, Block, Closure, Expr, ExprKind, ExprRef, FlowKind, Literal, MacroInvocation, MatchArm,
    Stmt, UniOp,
};
pub use item::{
    EnumVariant, Function, GenericParam, Generics, Item, ItemKind, StructKind, UseKind, Visibility,
    WhereClause,
};
pub use path::{Path, PathClass, PathNode, PathParams};
pub use pattern::{Pattern, PatternBinding, PatternKind, PatternValue, SlicePatternExtra};
pub use types::{BorrowKind, Type, TypeKind};
