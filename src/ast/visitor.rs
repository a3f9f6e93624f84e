//! AST traversal: a visitor trait with default `walk_*` recursion.

use super::expr::{Block, Expr, ExprKind, Stmt};
use super::item::{Item, ItemKind, StructKind};
use super::path::Path;
use super::pattern::{Pattern, PatternKind};
use super::types::{Type, TypeKind};

pub trait Visitor: Sized {
    fn visit_item(&mut self, item: &Item) {
        walk_item(self, item);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    fn visit_pattern(&mut self, pat: &Pattern) {
        walk_pattern(self, pat);
    }

    fn visit_type(&mut self, ty: &Type) {
        walk_type(self, ty);
    }

    fn visit_path(&mut self, _path: &Path) {}

    fn visit_block(&mut self, block: &Block) {
        walk_block(self, block);
    }
}

pub fn walk_item<V: Visitor>(v: &mut V, item: &Item) {
    match &item.kind {
        ItemKind::Fn(f) => {
            for (pat, ty) in &f.args {
                v.visit_pattern(pat);
                v.visit_type(ty);
            }
            v.visit_type(&f.ret);
            if let Some(body) = &f.body {
                v.visit_block(body);
            }
        }
        ItemKind::Static { ty, value, .. } | ItemKind::Const { ty, value, .. } => {
            v.visit_type(ty);
            if let Some(value) = value {
                v.visit_expr(value);
            }
        }
        ItemKind::Struct { kind, .. } => walk_struct_kind(v, kind),
        ItemKind::Enum { variants, .. } => {
            for variant in variants {
                walk_struct_kind(v, &variant.kind);
                if let Some(disc) = &variant.discriminant {
                    v.visit_expr(disc);
                }
            }
        }
        ItemKind::Trait {
            supertraits, items, ..
        } => {
            for path in supertraits {
                v.visit_path(path);
            }
            for item in items {
                v.visit_item(item);
            }
        }
        ItemKind::Impl {
            trait_path,
            ty,
            items,
            ..
        } => {
            if let Some(path) = trait_path {
                v.visit_path(path);
            }
            v.visit_type(ty);
            for item in items {
                v.visit_item(item);
            }
        }
        ItemKind::TypeAlias { ty, .. } => v.visit_type(ty),
        ItemKind::Use { path, .. } => v.visit_path(path),
        ItemKind::ExternCrate { .. } => {}
        ItemKind::Module { items, .. } => {
            if let Some(items) = items {
                for item in items {
                    v.visit_item(item);
                }
            }
        }
        ItemKind::ExternBlock { items, .. } => {
            for item in items {
                v.visit_item(item);
            }
        }
        ItemKind::MacroDef { .. } => {}
        ItemKind::MacroInvocation(mac) => v.visit_path(&mac.path),
    }
}

fn walk_struct_kind<V: Visitor>(v: &mut V, kind: &StructKind) {
    match kind {
        StructKind::Unit => {}
        StructKind::Tuple(fields) => {
            for (_, ty) in fields {
                v.visit_type(ty);
            }
        }
        StructKind::Named(fields) => {
            for (_, _, ty) in fields {
                v.visit_type(ty);
            }
        }
    }
}

pub fn walk_block<V: Visitor>(v: &mut V, block: &Block) {
    for stmt in &block.stmts {
        match stmt {
            Stmt::Item(item) => v.visit_item(item),
            Stmt::Let { pat, ty, init } => {
                v.visit_pattern(pat);
                if let Some(ty) = ty {
                    v.visit_type(ty);
                }
                if let Some(init) = init {
                    v.visit_expr(init);
                }
            }
            Stmt::Expr { expr, .. } => v.visit_expr(expr),
        }
    }
    if let Some(tail) = &block.tail {
        v.visit_expr(tail);
    }
}

pub fn walk_expr<V: Visitor>(v: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::Literal(_) => {}
        ExprKind::NamedValue(path) => v.visit_path(path),
        ExprKind::Tuple(items) | ExprKind::ArrayList(items) => {
            for item in items {
                v.visit_expr(item);
            }
        }
        ExprKind::ArraySized { value, count } => {
            v.visit_expr(value);
            v.visit_expr(count);
        }
        ExprKind::StructLiteral { path, fields, base } => {
            v.visit_path(path);
            for (_, value) in fields {
                v.visit_expr(value);
            }
            if let Some(base) = base {
                v.visit_expr(base);
            }
        }
        ExprKind::Block(block) => v.visit_block(block),
        ExprKind::Flow { value, .. } => {
            if let Some(value) = value {
                v.visit_expr(value);
            }
        }
        ExprKind::Assign { slot, value, .. } => {
            v.visit_expr(slot);
            v.visit_expr(value);
        }
        ExprKind::CallPath { path, args } => {
            v.visit_path(path);
            for arg in args {
                v.visit_expr(arg);
            }
        }
        ExprKind::CallMethod { obj, args, .. } => {
            v.visit_expr(obj);
            for arg in args {
                v.visit_expr(arg);
            }
        }
        ExprKind::CallObject { obj, args } => {
            v.visit_expr(obj);
            for arg in args {
                v.visit_expr(arg);
            }
        }
        ExprKind::Field { obj, .. } => v.visit_expr(obj),
        ExprKind::Index { obj, idx } => {
            v.visit_expr(obj);
            v.visit_expr(idx);
        }
        ExprKind::Deref(inner) => v.visit_expr(inner),
        ExprKind::Cast { value, ty } => {
            v.visit_expr(value);
            v.visit_type(ty);
        }
        ExprKind::UniOp { value, .. } => v.visit_expr(value),
        ExprKind::BinOp { left, right, .. } => {
            v.visit_expr(left);
            v.visit_expr(right);
        }
        ExprKind::Range { start, end, .. } => {
            if let Some(start) = start {
                v.visit_expr(start);
            }
            if let Some(end) = end {
                v.visit_expr(end);
            }
        }
        ExprKind::Loop { body, .. } => v.visit_block(body),
        ExprKind::While { cond, body, .. } => {
            v.visit_expr(cond);
            v.visit_block(body);
        }
        ExprKind::WhileLet {
            pat, value, body, ..
        } => {
            v.visit_pattern(pat);
            v.visit_expr(value);
            v.visit_block(body);
        }
        ExprKind::ForLoop {
            pat, iter, body, ..
        } => {
            v.visit_pattern(pat);
            v.visit_expr(iter);
            v.visit_block(body);
        }
        ExprKind::If {
            cond,
            then_block,
            else_block,
        } => {
            v.visit_expr(cond);
            v.visit_block(then_block);
            if let Some(els) = else_block {
                v.visit_expr(els);
            }
        }
        ExprKind::IfLet {
            pat,
            value,
            then_block,
            else_block,
        } => {
            v.visit_pattern(pat);
            v.visit_expr(value);
            v.visit_block(then_block);
            if let Some(els) = else_block {
                v.visit_expr(els);
            }
        }
        ExprKind::Match { value, arms } => {
            v.visit_expr(value);
            for arm in arms {
                for pat in &arm.patterns {
                    v.visit_pattern(pat);
                }
                if let Some(guard) = &arm.guard {
                    v.visit_expr(guard);
                }
                v.visit_expr(&arm.body);
            }
        }
        ExprKind::Closure(closure) => {
            for (pat, ty) in &closure.args {
                v.visit_pattern(pat);
                if let Some(ty) = ty {
                    v.visit_type(ty);
                }
            }
            v.visit_expr(&closure.body);
        }
        ExprKind::Macro(mac) => v.visit_path(&mac.path),
    }
}

pub fn walk_pattern<V: Visitor>(v: &mut V, pat: &Pattern) {
    match &pat.kind {
        PatternKind::Any | PatternKind::MaybeBind(_) => {}
        PatternKind::Bind { sub, .. } => {
            if let Some(sub) = sub {
                v.visit_pattern(sub);
            }
        }
        PatternKind::Value(_) | PatternKind::Range { .. } => {}
        PatternKind::Tuple { start, end, .. } => {
            for p in start.iter().chain(end) {
                v.visit_pattern(p);
            }
        }
        PatternKind::NamedTuple {
            path, start, end, ..
        } => {
            v.visit_path(path);
            for p in start.iter().chain(end) {
                v.visit_pattern(p);
            }
        }
        PatternKind::Struct { path, fields, .. } => {
            v.visit_path(path);
            for (_, p) in fields {
                v.visit_pattern(p);
            }
        }
        PatternKind::Or(pats) => {
            for p in pats {
                v.visit_pattern(p);
            }
        }
        PatternKind::Slice { leading, extra } => {
            for p in leading {
                v.visit_pattern(p);
            }
            if let Some(extra) = extra {
                for p in &extra.trailing {
                    v.visit_pattern(p);
                }
            }
        }
        PatternKind::Ref { sub, .. } => v.visit_pattern(sub),
        PatternKind::Box(sub) => v.visit_pattern(sub),
    }
}

pub fn walk_type<V: Visitor>(v: &mut V, ty: &Type) {
    match &ty.kind {
        TypeKind::Infer | TypeKind::Unit | TypeKind::Diverge | TypeKind::Primitive(_) => {}
        TypeKind::Path(path) => v.visit_path(path),
        TypeKind::Tuple(items) => {
            for ty in items {
                v.visit_type(ty);
            }
        }
        TypeKind::Array { elem, size } => {
            v.visit_type(elem);
            v.visit_expr(size);
        }
        TypeKind::Slice(inner) => v.visit_type(inner),
        TypeKind::Borrow { inner, .. } | TypeKind::Pointer { inner, .. } => v.visit_type(inner),
        TypeKind::Function { args, ret, .. } => {
            for ty in args {
                v.visit_type(ty);
            }
            v.visit_type(ret);
        }
        TypeKind::TraitObject(paths) | TypeKind::ImplTrait(paths) => {
            for path in paths {
                v.visit_path(path);
            }
        }
    }
}
