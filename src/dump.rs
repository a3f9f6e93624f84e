//! Debug dump: re-render the AST as source text.
//!
//! The output is deliberately heavy on parentheses so that re-parsing it
//! reproduces a structurally equivalent tree (grouping parens are
//! transparent in the parser). Used by `ferroc parse --dump` and by the
//! round-trip tests.

use crate::ast::{
    AttrData, Attribute, BinOp, Block, Expr, ExprKind, FlowKind, GenericParam, Generics, Item,
    ItemKind, Literal, Path, PathClass, PathParams, Pattern, PatternKind, PatternValue, Stmt,
    StructKind, Type, TypeKind, UniOp, UseKind, Visibility,
};
use crate::macros::{MacroPatEnt, MacroRuleEnt};
use crate::token::{CoreType, TokenKind};

pub fn dump_crate(items: &[Item]) -> String {
    let mut d = RustDump::new();
    for item in items {
        d.item(item);
    }
    d.out
}

pub fn expr_to_string(expr: &Expr) -> String {
    expr_str(expr, 0)
}

pub fn type_to_string(ty: &Type) -> String {
    ty_str(ty)
}

pub fn pattern_to_string(pat: &Pattern) -> String {
    pat_str(pat)
}

pub fn path_to_string(path: &Path, expr_mode: bool) -> String {
    path_str(path, expr_mode)
}

pub fn stmt_to_string(stmt: &Stmt) -> String {
    stmt_str(stmt, 0)
}

pub fn block_to_string(block: &Block) -> String {
    block_str(block, 0)
}

pub fn meta_to_string(attr: &Attribute) -> String {
    meta_str(attr)
}

struct RustDump {
    out: String,
    indent: usize,
}

impl RustDump {
    fn new() -> RustDump {
        RustDump {
            out: String::new(),
            indent: 0,
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn item(&mut self, item: &Item) {
        for attr in &item.attrs {
            self.line(&attr_str(attr));
        }
        let vis = vis_str(&item.vis);
        match &item.kind {
            ItemKind::Fn(f) => {
                let mut sig = vis.clone();
                if f.is_const {
                    sig.push_str("const ");
                }
                if f.is_unsafe {
                    sig.push_str("unsafe ");
                }
                if let Some(abi) = &f.abi {
                    sig.push_str(&format!("extern \"{}\" ", abi));
                }
                sig.push_str(&format!("fn {}{}(", f.name, generics_str(&f.generics)));
                let args: Vec<String> = f
                    .args
                    .iter()
                    .map(|(pat, ty)| {
                        if let Some(recv) = receiver_str(pat, ty) {
                            recv
                        } else {
                            format!("{}: {}", pat_str(pat), ty_str(ty))
                        }
                    })
                    .collect();
                sig.push_str(&args.join(", "));
                sig.push(')');
                if !matches!(f.ret.kind, TypeKind::Unit) {
                    sig.push_str(&format!(" -> {}", ty_str(&f.ret)));
                }
                sig.push_str(&where_str(&f.generics));
                match &f.body {
                    Some(body) => {
                        sig.push(' ');
                        sig.push_str(&block_str(body, self.indent));
                        self.line(&sig);
                    }
                    None => {
                        sig.push(';');
                        self.line(&sig);
                    }
                }
            }
            ItemKind::Static {
                name,
                is_mut,
                ty,
                value,
            } => {
                let mut s = format!(
                    "{}static {}{}: {}",
                    vis,
                    if *is_mut { "mut " } else { "" },
                    name,
                    ty_str(ty)
                );
                if let Some(v) = value {
                    s.push_str(&format!(" = {}", expr_str(v, self.indent)));
                }
                s.push(';');
                self.line(&s);
            }
            ItemKind::Const { name, ty, value } => {
                let mut s = format!("{}const {}: {}", vis, name, ty_str(ty));
                if let Some(v) = value {
                    s.push_str(&format!(" = {}", expr_str(v, self.indent)));
                }
                s.push(';');
                self.line(&s);
            }
            ItemKind::Struct {
                name,
                generics,
                kind,
            } => match kind {
                StructKind::Unit => {
                    self.line(&format!("{}struct {}{};", vis, name, generics_str(generics)))
                }
                StructKind::Tuple(fields) => {
                    let fs: Vec<String> = fields
                        .iter()
                        .map(|(v, t)| format!("{}{}", vis_str(v), ty_str(t)))
                        .collect();
                    self.line(&format!(
                        "{}struct {}{}({}){};",
                        vis,
                        name,
                        generics_str(generics),
                        fs.join(", "),
                        where_str(generics)
                    ));
                }
                StructKind::Named(fields) => {
                    self.line(&format!(
                        "{}struct {}{}{} {{",
                        vis,
                        name,
                        generics_str(generics),
                        where_str(generics)
                    ));
                    self.indent += 1;
                    for (v, n, t) in fields {
                        self.line(&format!("{}{}: {},", vis_str(v), n, ty_str(t)));
                    }
                    self.indent -= 1;
                    self.line("}");
                }
            },
            ItemKind::Enum {
                name,
                generics,
                variants,
            } => {
                self.line(&format!(
                    "{}enum {}{}{} {{",
                    vis,
                    name,
                    generics_str(generics),
                    where_str(generics)
                ));
                self.indent += 1;
                for variant in variants {
                    let mut s = variant.name.to_string();
                    match &variant.kind {
                        StructKind::Unit => {}
                        StructKind::Tuple(fields) => {
                            let fs: Vec<String> =
                                fields.iter().map(|(_, t)| ty_str(t)).collect();
                            s.push_str(&format!("({})", fs.join(", ")));
                        }
                        StructKind::Named(fields) => {
                            let fs: Vec<String> = fields
                                .iter()
                                .map(|(_, n, t)| format!("{}: {}", n, ty_str(t)))
                                .collect();
                            s.push_str(&format!(" {{ {} }}", fs.join(", ")));
                        }
                    }
                    if let Some(d) = &variant.discriminant {
                        s.push_str(&format!(" = {}", expr_str(d, self.indent)));
                    }
                    s.push(',');
                    self.line(&s);
                }
                self.indent -= 1;
                self.line("}");
            }
            ItemKind::Trait {
                name,
                generics,
                supertraits,
                items,
            } => {
                let mut s = format!("{}trait {}{}", vis, name, generics_str(generics));
                if !supertraits.is_empty() {
                    let bs: Vec<String> =
                        supertraits.iter().map(|p| path_str(p, false)).collect();
                    s.push_str(&format!(": {}", bs.join(" + ")));
                }
                s.push_str(&where_str(generics));
                s.push_str(" {");
                self.line(&s);
                self.indent += 1;
                for it in items {
                    self.item(it);
                }
                self.indent -= 1;
                self.line("}");
            }
            ItemKind::Impl {
                generics,
                trait_path,
                ty,
                items,
            } => {
                let mut s = format!("impl{} ", generics_str(generics));
                if let Some(tp) = trait_path {
                    s.push_str(&format!("{} for ", path_str(tp, false)));
                }
                s.push_str(&ty_str(ty));
                s.push_str(&where_str(generics));
                s.push_str(" {");
                self.line(&s);
                self.indent += 1;
                for it in items {
                    self.item(it);
                }
                self.indent -= 1;
                self.line("}");
            }
            ItemKind::TypeAlias { name, generics, ty } => {
                self.line(&format!(
                    "{}type {}{} = {};",
                    vis,
                    name,
                    generics_str(generics),
                    ty_str(ty)
                ));
            }
            ItemKind::Use { path, kind } => {
                let p = path_str(path, false);
                match kind {
                    UseKind::Named(None) => self.line(&format!("{}use {};", vis, p)),
                    UseKind::Named(Some(alias)) => {
                        self.line(&format!("{}use {} as {};", vis, p, alias))
                    }
                    UseKind::Glob => self.line(&format!("{}use {}::*;", vis, p)),
                }
            }
            ItemKind::ExternCrate { name, alias } => match alias {
                Some(a) => self.line(&format!("{}extern crate {} as {};", vis, name, a)),
                None => self.line(&format!("{}extern crate {};", vis, name)),
            },
            ItemKind::Module { name, items } => match items {
                None => self.line(&format!("{}mod {};", vis, name)),
                Some(items) => {
                    self.line(&format!("{}mod {} {{", vis, name));
                    self.indent += 1;
                    for it in items {
                        self.item(it);
                    }
                    self.indent -= 1;
                    self.line("}");
                }
            },
            ItemKind::ExternBlock { abi, items } => {
                self.line(&format!("extern \"{}\" {{", abi));
                self.indent += 1;
                for it in items {
                    self.item(it);
                }
                self.indent -= 1;
                self.line("}");
            }
            ItemKind::MacroDef { name, rules } => {
                self.line(&format!("macro_rules! {} {{", name));
                self.indent += 1;
                for rule in &rules.rules {
                    self.line(&format!(
                        "({}) => {{ {} }};",
                        pat_ents_str(&rule.pattern),
                        body_ents_str(&rule.body)
                    ));
                }
                self.indent -= 1;
                self.line("}");
            }
            ItemKind::MacroInvocation(mac) => {
                self.line(&format!("{}!{};", path_str(&mac.path, true), mac.input));
            }
        }
    }
}

/// The receiver spellings (`self`, `&self`, ...) are not ordinary
/// pattern-colon-type arguments and must be rendered back as written.
fn receiver_str(pat: &Pattern, ty: &Type) -> Option<String> {
    if !matches!(ty.kind, TypeKind::Infer) {
        return None;
    }
    match &pat.kind {
        PatternKind::Bind { binding, sub: None } if binding.name.name.is("self") => {
            Some(match (binding.by_ref, binding.is_mut) {
                (true, true) => "&mut self".into(),
                (true, false) => "&self".into(),
                (false, true) => "mut self".into(),
                (false, false) => "self".into(),
            })
        }
        _ => None,
    }
}

fn vis_str(vis: &Visibility) -> String {
    match vis {
        Visibility::Private => String::new(),
        Visibility::Public => "pub ".into(),
        Visibility::Restricted(path) => match &path.class {
            PathClass::CratePath => "pub(crate) ".into(),
            PathClass::Super(_) => "pub(super) ".into(),
            PathClass::SelfPath => "pub(self) ".into(),
            _ => format!("pub(in {}) ", path_str(path, false)),
        },
    }
}

fn attr_str(attr: &Attribute) -> String {
    let bang = if attr.is_inner { "!" } else { "" };
    format!("#{}[{}]", bang, meta_str(attr))
}

fn meta_str(attr: &Attribute) -> String {
    let name = path_str(&attr.name, false);
    match &attr.data {
        AttrData::None => name,
        AttrData::Str(s) => format!("{} = {}", name, TokenKind::Str(s.clone()).to_source()),
        AttrData::Value(e) => format!("{} = {}", name, expr_str(e, 0)),
        AttrData::List(list) => {
            let inner: Vec<String> = list.iter().map(meta_str).collect();
            format!("{}({})", name, inner.join(", "))
        }
    }
}

fn generics_str(generics: &Generics) -> String {
    if generics.params.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = generics
        .params
        .iter()
        .map(|p| match p {
            GenericParam::Lifetime(l) => format!("'{}", l),
            GenericParam::Type {
                name,
                bounds,
                default,
            } => {
                let mut s = name.to_string();
                if !bounds.is_empty() {
                    let bs: Vec<String> = bounds.iter().map(|b| path_str(b, false)).collect();
                    s.push_str(&format!(": {}", bs.join(" + ")));
                }
                if let Some(d) = default {
                    s.push_str(&format!(" = {}", ty_str(d)));
                }
                s
            }
        })
        .collect();
    format!("<{}>", parts.join(", "))
}

fn where_str(generics: &Generics) -> String {
    if generics.where_clauses.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = generics
        .where_clauses
        .iter()
        .map(|c| {
            let bs: Vec<String> = c.bounds.iter().map(|b| path_str(b, false)).collect();
            format!("{}: {}", ty_str(&c.ty), bs.join(" + "))
        })
        .collect();
    format!(" where {}", parts.join(", "))
}

/// `expr_mode` selects the turbofish spelling for generic arguments.
fn path_str(path: &Path, expr_mode: bool) -> String {
    let mut s = String::new();
    match &path.class {
        PathClass::Absolute => s.push_str("::"),
        PathClass::Relative => {}
        PathClass::SelfPath => s.push_str("self::"),
        PathClass::Super(n) => {
            for _ in 0..*n {
                s.push_str("super::");
            }
        }
        PathClass::CratePath => s.push_str("crate::"),
        PathClass::Ufcs { ty, trait_path } => {
            s.push('<');
            s.push_str(&ty_str(ty));
            if let Some(tp) = trait_path {
                s.push_str(&format!(" as {}", path_str(tp, false)));
            }
            s.push_str(">::");
        }
    }
    for (i, node) in path.nodes.iter().enumerate() {
        if i > 0 {
            s.push_str("::");
        }
        s.push_str(&node.name.to_string());
        if !node.params.is_empty() {
            if expr_mode {
                s.push_str("::");
            }
            s.push_str(&params_str(&node.params));
        }
    }
    s
}

fn params_str(params: &PathParams) -> String {
    let mut parts = Vec::new();
    for lt in &params.lifetimes {
        parts.push(format!("'{}", lt));
    }
    for ty in &params.types {
        parts.push(ty_str(ty));
    }
    format!("<{}>", parts.join(", "))
}

fn ty_str(ty: &Type) -> String {
    match &ty.kind {
        TypeKind::Infer => "_".into(),
        TypeKind::Unit => "()".into(),
        TypeKind::Diverge => "!".into(),
        TypeKind::Primitive(ct) => ct.name().into(),
        TypeKind::Path(p) => path_str(p, false),
        TypeKind::Tuple(items) => {
            let parts: Vec<String> = items.iter().map(ty_str).collect();
            if parts.len() == 1 {
                format!("({},)", parts[0])
            } else {
                format!("({})", parts.join(", "))
            }
        }
        TypeKind::Array { elem, size } => {
            format!("[{}; {}]", ty_str(elem), expr_str(size, 0))
        }
        TypeKind::Slice(inner) => format!("[{}]", ty_str(inner)),
        TypeKind::Borrow {
            lifetime,
            kind,
            inner,
        } => {
            let lt = lifetime
                .as_ref()
                .map(|l| format!("'{} ", l))
                .unwrap_or_default();
            let k = match kind {
                crate::ast::BorrowKind::Shared => "",
                crate::ast::BorrowKind::Unique => "mut ",
                crate::ast::BorrowKind::Move => "move ",
            };
            format!("&{}{}{}", lt, k, ty_str(inner))
        }
        TypeKind::Pointer { is_mut, inner } => {
            format!(
                "*{} {}",
                if *is_mut { "mut" } else { "const" },
                ty_str(inner)
            )
        }
        TypeKind::Function {
            is_unsafe,
            abi,
            args,
            ret,
            variadic,
        } => {
            let mut s = String::new();
            if *is_unsafe {
                s.push_str("unsafe ");
            }
            if let Some(abi) = abi {
                s.push_str(&format!("extern \"{}\" ", abi));
            }
            let mut parts: Vec<String> = args.iter().map(ty_str).collect();
            if *variadic {
                parts.push("...".into());
            }
            s.push_str(&format!("fn({})", parts.join(", ")));
            if !matches!(ret.kind, TypeKind::Unit) {
                s.push_str(&format!(" -> {}", ty_str(ret)));
            }
            s
        }
        TypeKind::TraitObject(paths) => {
            let parts: Vec<String> = paths.iter().map(|p| path_str(p, false)).collect();
            format!("dyn {}", parts.join(" + "))
        }
        TypeKind::ImplTrait(paths) => {
            let parts: Vec<String> = paths.iter().map(|p| path_str(p, false)).collect();
            format!("impl {}", parts.join(" + "))
        }
    }
}

fn pat_str(pat: &Pattern) -> String {
    match &pat.kind {
        PatternKind::Any => "_".into(),
        PatternKind::MaybeBind(name) => name.to_string(),
        PatternKind::Bind { binding, sub } => {
            let mut s = String::new();
            if binding.by_ref {
                s.push_str("ref ");
            }
            if binding.is_mut {
                s.push_str("mut ");
            }
            s.push_str(&binding.name.to_string());
            if let Some(sub) = sub {
                s.push_str(&format!(" @ {}", pat_str(sub)));
            }
            s
        }
        PatternKind::Value(v) => pat_value_str(v),
        PatternKind::Range {
            start,
            end,
            inclusive,
        } => {
            let op = if *inclusive { "..=" } else { ".." };
            format!(
                "{}{}{}",
                start.as_ref().map(pat_value_str).unwrap_or_default(),
                op,
                end.as_ref().map(pat_value_str).unwrap_or_default()
            )
        }
        PatternKind::Tuple {
            start,
            has_dots,
            end,
        } => format!("({})", pat_list_str(start, *has_dots, end)),
        PatternKind::NamedTuple {
            path,
            start,
            has_dots,
            end,
        } => format!(
            "{}({})",
            path_str(path, true),
            pat_list_str(start, *has_dots, end)
        ),
        PatternKind::Struct {
            path,
            fields,
            is_exhaustive,
        } => {
            let mut parts: Vec<String> = fields
                .iter()
                .map(|(n, p)| format!("{}: {}", n, pat_str(p)))
                .collect();
            if !is_exhaustive {
                parts.push("..".into());
            }
            format!("{} {{ {} }}", path_str(path, true), parts.join(", "))
        }
        PatternKind::Or(pats) => {
            let parts: Vec<String> = pats.iter().map(pat_str).collect();
            parts.join(" | ")
        }
        PatternKind::Slice { leading, extra } => {
            let mut parts: Vec<String> = leading.iter().map(pat_str).collect();
            if let Some(extra) = extra {
                match &extra.binding {
                    Some(b) => parts.push(format!("{} @ ..", b.name)),
                    None => parts.push("..".into()),
                }
                parts.extend(extra.trailing.iter().map(pat_str));
            }
            format!("[{}]", parts.join(", "))
        }
        PatternKind::Ref { is_mut, sub } => {
            format!("&{}{}", if *is_mut { "mut " } else { "" }, pat_str(sub))
        }
        PatternKind::Box(sub) => format!("box {}", pat_str(sub)),
    }
}

fn pat_list_str(start: &[Pattern], has_dots: bool, end: &[Pattern]) -> String {
    let mut parts: Vec<String> = start.iter().map(pat_str).collect();
    if has_dots {
        parts.push("..".into());
        parts.extend(end.iter().map(pat_str));
    }
    if parts.len() == 1 && !has_dots {
        format!("{},", parts[0])
    } else {
        parts.join(", ")
    }
}

fn pat_value_str(v: &PatternValue) -> String {
    match v {
        PatternValue::Integer { value, ty } => match ty {
            CoreType::Bool => {
                if *value != 0 {
                    "true".into()
                } else {
                    "false".into()
                }
            }
            _ => format!("{}{}", value, ty.name()),
        },
        PatternValue::Float { value, ty } => TokenKind::Float {
            value: *value,
            suffix: *ty,
        }
        .to_source(),
        PatternValue::Str(s) => TokenKind::Str(s.clone()).to_source(),
        PatternValue::ByteStr(b) => TokenKind::ByteStr(b.clone()).to_source(),
        PatternValue::CharLit(c) => TokenKind::CharLit(*c).to_source(),
        PatternValue::ByteLit(b) => TokenKind::ByteLit(*b).to_source(),
        PatternValue::Named(p) => path_str(p, true),
    }
}

fn literal_str(lit: &Literal) -> String {
    match lit {
        Literal::Integer { value, ty } => format!("{}{}", value, ty.name()),
        Literal::Float { value, ty } => TokenKind::Float {
            value: *value,
            suffix: *ty,
        }
        .to_source(),
        Literal::Bool(b) => if *b { "true" } else { "false" }.into(),
        Literal::Str(s) => TokenKind::Str(s.clone()).to_source(),
        Literal::ByteStr(b) => TokenKind::ByteStr(b.clone()).to_source(),
        Literal::CharLit(c) => TokenKind::CharLit(*c).to_source(),
        Literal::ByteLit(b) => TokenKind::ByteLit(*b).to_source(),
    }
}

fn block_str(block: &Block, indent: usize) -> String {
    let pad = "    ".repeat(indent + 1);
    let close_pad = "    ".repeat(indent);
    let mut s = String::new();
    if block.is_unsafe {
        s.push_str("unsafe ");
    }
    s.push_str("{\n");
    for stmt in &block.stmts {
        s.push_str(&pad);
        s.push_str(&stmt_str(stmt, indent + 1));
        s.push('\n');
    }
    if let Some(tail) = &block.tail {
        s.push_str(&pad);
        s.push_str(&expr_str(tail, indent + 1));
        s.push('\n');
    }
    s.push_str(&close_pad);
    s.push('}');
    s
}

fn stmt_str(stmt: &Stmt, indent: usize) -> String {
    match stmt {
        Stmt::Item(item) => {
            let mut d = RustDump::new();
            d.item(item);
            d.out.trim_end().to_string()
        }
        Stmt::Let { pat, ty, init } => {
            let mut s = format!("let {}", pat_str(pat));
            if let Some(ty) = ty {
                s.push_str(&format!(": {}", ty_str(ty)));
            }
            if let Some(init) = init {
                s.push_str(&format!(" = {}", expr_str(init, indent)));
            }
            s.push(';');
            s
        }
        Stmt::Expr { expr, has_semi } => {
            let mut s = expr_str(expr, indent);
            if *has_semi {
                s.push(';');
            }
            s
        }
    }
}

fn label_str(label: &Option<crate::hygiene::Ident>) -> String {
    match label {
        Some(l) => format!("'{}: ", l),
        None => String::new(),
    }
}

fn expr_str(expr: &Expr, indent: usize) -> String {
    match &expr.kind {
        ExprKind::Literal(lit) => literal_str(lit),
        ExprKind::NamedValue(path) => path_str(path, true),
        ExprKind::Tuple(items) => {
            let parts: Vec<String> = items.iter().map(|e| expr_str(e, indent)).collect();
            if parts.len() == 1 {
                format!("({},)", parts[0])
            } else {
                format!("({})", parts.join(", "))
            }
        }
        ExprKind::ArrayList(items) => {
            let parts: Vec<String> = items.iter().map(|e| expr_str(e, indent)).collect();
            format!("[{}]", parts.join(", "))
        }
        ExprKind::ArraySized { value, count } => {
            format!("[{}; {}]", expr_str(value, indent), expr_str(count, indent))
        }
        ExprKind::StructLiteral { path, fields, base } => {
            let mut parts: Vec<String> = fields
                .iter()
                .map(|(n, e)| format!("{}: {}", n, expr_str(e, indent)))
                .collect();
            if let Some(base) = base {
                parts.push(format!("..{}", expr_str(base, indent)));
            }
            format!("{} {{ {} }}", path_str(path, true), parts.join(", "))
        }
        ExprKind::Block(block) => block_str(block, indent),
        ExprKind::Flow { kind, label, value } => {
            let kw = match kind {
                FlowKind::Return => "return",
                FlowKind::Break => "break",
                FlowKind::Continue => "continue",
            };
            let mut s = kw.to_string();
            if let Some(l) = label {
                s.push_str(&format!(" '{}", l));
            }
            if let Some(v) = value {
                s.push_str(&format!(" {}", expr_str(v, indent)));
            }
            s
        }
        ExprKind::Assign { op, slot, value } => {
            let op_s = match op {
                None => "=".to_string(),
                Some(op) => format!("{}=", op.symbol()),
            };
            format!(
                "({} {} {})",
                expr_str(slot, indent),
                op_s,
                expr_str(value, indent)
            )
        }
        ExprKind::CallPath { path, args } => {
            let parts: Vec<String> = args.iter().map(|e| expr_str(e, indent)).collect();
            format!("{}({})", path_str(path, true), parts.join(", "))
        }
        ExprKind::CallMethod {
            obj,
            method,
            params,
            args,
        } => {
            let parts: Vec<String> = args.iter().map(|e| expr_str(e, indent)).collect();
            let tf = if params.is_empty() {
                String::new()
            } else {
                format!("::{}", params_str(params))
            };
            format!(
                "({}).{}{}({})",
                expr_str(obj, indent),
                method,
                tf,
                parts.join(", ")
            )
        }
        ExprKind::CallObject { obj, args } => {
            let parts: Vec<String> = args.iter().map(|e| expr_str(e, indent)).collect();
            format!("({})({})", expr_str(obj, indent), parts.join(", "))
        }
        ExprKind::Field { obj, name } => format!("({}).{}", expr_str(obj, indent), name),
        ExprKind::Index { obj, idx } => {
            format!("({})[{}]", expr_str(obj, indent), expr_str(idx, indent))
        }
        ExprKind::Deref(inner) => format!("(*{})", expr_str(inner, indent)),
        ExprKind::Cast { value, ty } => {
            format!("({} as {})", expr_str(value, indent), ty_str(ty))
        }
        ExprKind::UniOp { op, value } => {
            let v = expr_str(value, indent);
            match op {
                UniOp::Neg => format!("(-{})", v),
                UniOp::Not => format!("(!{})", v),
                UniOp::Box => format!("(box {})", v),
                UniOp::Borrow => format!("(&{})", v),
                UniOp::BorrowMut => format!("(&mut {})", v),
                UniOp::Try => format!("({}?)", v),
            }
        }
        ExprKind::BinOp { op, left, right } => {
            format!(
                "({} {} {})",
                expr_str(left, indent),
                op.symbol(),
                expr_str(right, indent)
            )
        }
        ExprKind::Range {
            start,
            end,
            inclusive,
        } => {
            let op = if *inclusive { "..=" } else { ".." };
            format!(
                "({}{}{})",
                start
                    .as_ref()
                    .map(|e| expr_str(e, indent))
                    .unwrap_or_default(),
                op,
                end.as_ref()
                    .map(|e| expr_str(e, indent))
                    .unwrap_or_default()
            )
        }
        ExprKind::Loop { label, body } => {
            format!("{}loop {}", label_str(label), block_str(body, indent))
        }
        ExprKind::While { label, cond, body } => format!(
            "{}while {} {}",
            label_str(label),
            expr_str(cond, indent),
            block_str(body, indent)
        ),
        ExprKind::WhileLet {
            label,
            pat,
            value,
            body,
        } => format!(
            "{}while let {} = {} {}",
            label_str(label),
            pat_str(pat),
            expr_str(value, indent),
            block_str(body, indent)
        ),
        ExprKind::ForLoop {
            label,
            pat,
            iter,
            body,
        } => format!(
            "{}for {} in {} {}",
            label_str(label),
            pat_str(pat),
            expr_str(iter, indent),
            block_str(body, indent)
        ),
        ExprKind::If {
            cond,
            then_block,
            else_block,
        } => {
            let mut s = format!(
                "if {} {}",
                expr_str(cond, indent),
                block_str(then_block, indent)
            );
            if let Some(els) = else_block {
                s.push_str(&format!(" else {}", expr_str(els, indent)));
            }
            s
        }
        ExprKind::IfLet {
            pat,
            value,
            then_block,
            else_block,
        } => {
            let mut s = format!(
                "if let {} = {} {}",
                pat_str(pat),
                expr_str(value, indent),
                block_str(then_block, indent)
            );
            if let Some(els) = else_block {
                s.push_str(&format!(" else {}", expr_str(els, indent)));
            }
            s
        }
        ExprKind::Match { value, arms } => {
            let pad = "    ".repeat(indent + 1);
            let close_pad = "    ".repeat(indent);
            let mut s = format!("match {} {{\n", expr_str(value, indent));
            for arm in arms {
                let pats: Vec<String> = arm.patterns.iter().map(pat_str).collect();
                s.push_str(&pad);
                s.push_str(&pats.join(" | "));
                if let Some(guard) = &arm.guard {
                    s.push_str(&format!(" if {}", expr_str(guard, indent + 1)));
                }
                s.push_str(&format!(" => {},\n", expr_str(&arm.body, indent + 1)));
            }
            s.push_str(&close_pad);
            s.push('}');
            s
        }
        ExprKind::Closure(closure) => {
            let mut s = String::new();
            if closure.is_move {
                s.push_str("move ");
            }
            let args: Vec<String> = closure
                .args
                .iter()
                .map(|(pat, ty)| match ty {
                    Some(ty) => format!("{}: {}", pat_str(pat), ty_str(ty)),
                    None => pat_str(pat),
                })
                .collect();
            s.push_str(&format!("|{}|", args.join(", ")));
            match &closure.ret {
                Some(ty) => s.push_str(&format!(
                    " -> {} {}",
                    ty_str(ty),
                    expr_str(&closure.body, indent)
                )),
                None => s.push_str(&format!(" {}", expr_str(&closure.body, indent))),
            }
            s
        }
        ExprKind::Macro(mac) => format!("{}!{}", path_str(&mac.path, true), mac.input),
    }
}

fn pat_ents_str(ents: &[MacroPatEnt]) -> String {
    let parts: Vec<String> = ents
        .iter()
        .map(|ent| match ent {
            MacroPatEnt::Token(tok) => tok.kind.to_source(),
            MacroPatEnt::Fragment { name, kind } => format!("${}:{}", name, kind.name()),
            MacroPatEnt::Loop { sep, kind, pats } => {
                let suffix = match kind {
                    crate::macros::LoopKind::ZeroPlus => "*",
                    crate::macros::LoopKind::OnePlus => "+",
                    crate::macros::LoopKind::ZeroOne => "?",
                };
                let sep_s = sep
                    .as_ref()
                    .map(|t| t.kind.to_source())
                    .unwrap_or_default();
                format!("$({}){}{}", pat_ents_str(pats), sep_s, suffix)
            }
        })
        .collect();
    parts.join(" ")
}

fn body_ents_str(ents: &[MacroRuleEnt]) -> String {
    let parts: Vec<String> = ents
        .iter()
        .map(|ent| match ent {
            MacroRuleEnt::Token(tok) => tok.kind.to_source(),
            MacroRuleEnt::Name(name) => format!("${}", name),
            MacroRuleEnt::CrateRef => "$crate".into(),
            MacroRuleEnt::Loop { sep, ents } => {
                let sep_s = sep
                    .as_ref()
                    .map(|t| t.kind.to_source())
                    .unwrap_or_default();
                format!("$({}){}*", body_ents_str(ents), sep_s)
            }
        })
        .collect();
    parts.join(" ")
}
