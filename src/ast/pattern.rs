//! Pattern syntax nodes.

use crate::hygiene::Ident;
use crate::token::{CoreType, Span};

use super::path::Path;

/// `ref`/`mut` qualifiers on a binding.
#[derive(Debug, Clone)]
pub struct PatternBinding {
    pub name: Ident,
    pub by_ref: bool,
    pub is_mut: bool,
}

/// A value usable in value and range patterns.
#[derive(Debug, Clone)]
pub enum PatternValue {
    Integer { value: u128, ty: CoreType },
    Float { value: f64, ty: CoreType },
    Str(String),
    ByteStr(Vec<u8>),
    CharLit(char),
    ByteLit(u8),
    Named(Path),
}

/// The `..`-and-after tail of a slice pattern.
#[derive(Debug, Clone)]
pub struct SlicePatternExtra {
    /// Optional binding for the middle (`ref rest @ ..` style).
    pub binding: Option<PatternBinding>,
    pub trailing: Vec<Pattern>,
}

#[derive(Debug, Clone)]
pub enum PatternKind {
    /// `_`
    Any,
    /// A bare identifier that is a binding unless context resolves it to a
    /// unit variant or constant later.
    MaybeBind(Ident),
    Bind {
        binding: PatternBinding,
        sub: Option<Box<Pattern>>,
    },
    Value(PatternValue),
    Range {
        start: Option<PatternValue>,
        end: Option<PatternValue>,
        inclusive: bool,
    },
    Tuple {
        start: Vec<Pattern>,
        has_dots: bool,
        end: Vec<Pattern>,
    },
    NamedTuple {
        path: Path,
        start: Vec<Pattern>,
        has_dots: bool,
        end: Vec<Pattern>,
    },
    Struct {
        path: Path,
        fields: Vec<(Ident, Pattern)>,
        /// False when the pattern ends with `..`.
        is_exhaustive: bool,
    },
    Or(Vec<Pattern>),
    Slice {
        leading: Vec<Pattern>,
        extra: Option<SlicePatternExtra>,
    },
    Ref {
        is_mut: bool,
        sub: Box<Pattern>,
    },
    Box(Box<Pattern>),
}

#[derive(Debug, Clone)]
pub struct Pattern {
    pub kind: PatternKind,
    pub span: Span,
}

impl Pattern {
    pub fn new(kind: PatternKind, span: Span) -> Pattern {
        Pattern { kind, span }
    }

    pub fn any(span: Span) -> Pattern {
        Pattern::new(PatternKind::Any, span)
    }
}
