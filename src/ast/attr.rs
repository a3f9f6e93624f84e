//! Attributes: `#[name]`, `#[name = value]`, `#[name(list...)]`.

use crate::token::Span;

use super::expr::ExprRef;
use super::path::Path;

#[derive(Debug, Clone)]
pub enum AttrData {
    None,
    /// `#[doc = "..."]` - string payloads are common enough to keep direct.
    Str(String),
    /// `#[key = expr]` - the expression is kept unexpanded.
    Value(ExprRef),
    List(Vec<Attribute>),
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub is_inner: bool,
    pub name: Path,
    pub data: AttrData,
    pub span: Span,
}

impl Attribute {
    pub fn is_named(&self, name: &str) -> bool {
        self.name.is_trivial() && self.name.nodes[0].name.name.is(name)
    }

    /// The string payload of `#[name = "..."]`, if that is the shape.
    pub fn string_value(&self) -> Option<&str> {
        match &self.data {
            AttrData::Str(s) => Some(s),
            _ => None,
        }
    }
}
