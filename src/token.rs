//! Token model: source positions, editions, token kinds.

use std::fmt;
use std::rc::Rc;

use crate::ast;
use crate::hygiene::Ident;
use crate::intern::Symbol;

/// Line/column pair, 1-based line, 0-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: u32,
    pub col: u32,
}

impl Position {
    pub fn new(line: u32, col: u32) -> Position {
        Position { line, col }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A source region: interned file name plus start/end positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub file: Symbol,
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(file: Symbol, start: Position, end: Position) -> Span {
        Span { file, start, end }
    }

    pub fn point(file: Symbol, pos: Position) -> Span {
        Span { file, start: pos, end: pos }
    }

    pub fn null() -> Span {
        Span::default()
    }

    /// Merge two spans from the same file into one covering both.
    pub fn to(self, other: Span) -> Span {
        Span {
            file: self.file,
            start: self.start,
            end: other.end,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.start)
    }
}

/// Language edition; selects the reserved-word table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Edition {
    #[default]
    E2015,
    E2018,
    E2021,
}

impl Edition {
    pub fn from_str(s: &str) -> Option<Edition> {
        match s {
            "2015" => Some(Edition::E2015),
            "2018" => Some(Edition::E2018),
            "2021" => Some(Edition::E2021),
            _ => None,
        }
    }

    /// Look up a reserved word in this edition's table.
    pub fn find_reserved_word(self, s: &str) -> Option<TokenKind> {
        let table: &[(&str, KwTok)] = match self {
            Edition::E2015 => RWORDS_2015,
            Edition::E2018 | Edition::E2021 => RWORDS_2018,
        };
        table
            .binary_search_by(|(word, _)| word.cmp(&s))
            .ok()
            .map(|idx| (table[idx].1)())
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Edition::E2015 => "2015",
            Edition::E2018 => "2018",
            Edition::E2021 => "2021",
        };
        write!(f, "{}", s)
    }
}

/// Core-type suffix on numeric literals (`Any` when unsuffixed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreType {
    Any,
    Bool,
    Char,
    Str,
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    F32,
    F64,
}

impl CoreType {
    pub fn from_suffix(s: &str) -> Option<CoreType> {
        Some(match s {
            "i8" => CoreType::I8,
            "i16" => CoreType::I16,
            "i32" => CoreType::I32,
            "i64" => CoreType::I64,
            "i128" => CoreType::I128,
            "isize" => CoreType::Isize,
            "u8" => CoreType::U8,
            "u16" => CoreType::U16,
            "u32" => CoreType::U32,
            "u64" => CoreType::U64,
            "u128" => CoreType::U128,
            "usize" => CoreType::Usize,
            "f32" => CoreType::F32,
            "f64" => CoreType::F64,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            CoreType::Any => "",
            CoreType::Bool => "bool",
            CoreType::Char => "char",
            CoreType::Str => "str",
            CoreType::I8 => "i8",
            CoreType::I16 => "i16",
            CoreType::I32 => "i32",
            CoreType::I64 => "i64",
            CoreType::I128 => "i128",
            CoreType::Isize => "isize",
            CoreType::U8 => "u8",
            CoreType::U16 => "u16",
            CoreType::U32 => "u32",
            CoreType::U64 => "u64",
            CoreType::U128 => "u128",
            CoreType::Usize => "usize",
            CoreType::F32 => "f32",
            CoreType::F64 => "f64",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, CoreType::F32 | CoreType::F64)
    }
}

/// A parsed AST subtree riding inside a token (macro fragment capture).
#[derive(Clone)]
pub enum Fragment {
    Expr(Rc<ast::Expr>),
    Ty(Rc<ast::Type>),
    Pat(Rc<ast::Pattern>),
    Stmt(Rc<ast::Stmt>),
    Block(Rc<ast::Block>),
    Path(Rc<ast::Path>),
    Meta(Rc<ast::Attribute>),
}

impl Fragment {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Fragment::Expr(_) => "expr",
            Fragment::Ty(_) => "ty",
            Fragment::Pat(_) => "pat",
            Fragment::Stmt(_) => "stmt",
            Fragment::Block(_) => "block",
            Fragment::Path(_) => "path",
            Fragment::Meta(_) => "meta",
        }
    }
}

impl PartialEq for Fragment {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Fragment::Expr(a), Fragment::Expr(b)) => Rc::ptr_eq(a, b),
            (Fragment::Ty(a), Fragment::Ty(b)) => Rc::ptr_eq(a, b),
            (Fragment::Pat(a), Fragment::Pat(b)) => Rc::ptr_eq(a, b),
            (Fragment::Stmt(a), Fragment::Stmt(b)) => Rc::ptr_eq(a, b),
            (Fragment::Block(a), Fragment::Block(b)) => Rc::ptr_eq(a, b),
            (Fragment::Path(a), Fragment::Path(b)) => Rc::ptr_eq(a, b),
            (Fragment::Meta(a), Fragment::Meta(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fragment({})", self.kind_name())
    }
}

/// Token kinds. Flat union: every punctuation mark and reserved word is its
/// own variant, data-carrying variants hold literal payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Eof,
    // Only produced inside the lexer; skipped before tokens leave it.
    Newline,
    Whitespace,
    Comment(String),

    Ident(Ident),
    Lifetime(Ident),
    Integer { value: u128, suffix: CoreType },
    Float { value: f64, suffix: CoreType },
    Str(String),
    ByteStr(Vec<u8>),
    CharLit(char),
    ByteLit(u8),
    Interpolated(Fragment),

    // Punctuation, ordered as in the lexer's operator table.
    Bang,
    BangEq,
    Hash,
    Dollar,
    Percent,
    PercentEq,
    Amp,
    AmpAmp,
    AmpEq,
    ParenOpen,
    ParenClose,
    Star,
    StarEq,
    Plus,
    PlusEq,
    Comma,
    Dash,
    DashEq,
    RArrow,
    Dot,
    DotDot,
    DotDotDot,
    DotDotEq,
    Slash,
    SlashEq,
    Colon,
    DoubleColon,
    Semicolon,
    Lt,
    LArrow,
    Shl,
    ShlEq,
    Le,
    Eq,
    EqEq,
    FatArrow,
    Gt,
    Ge,
    Shr,
    ShrEq,
    Question,
    At,
    BracketOpen,
    Backslash,
    BracketClose,
    Caret,
    CaretEq,
    Backtick,
    BraceOpen,
    Pipe,
    PipeEq,
    PipePipe,
    BraceClose,
    Tilde,
    Underscore,

    // Reserved words.
    KwAbstract,
    KwAs,
    KwAsync,
    KwAwait,
    KwBecome,
    KwBox,
    KwBreak,
    KwConst,
    KwContinue,
    KwCrate,
    KwDo,
    KwDyn,
    KwElse,
    KwEnum,
    KwExtern,
    KwFalse,
    KwFinal,
    KwFn,
    KwFor,
    KwIf,
    KwImpl,
    KwIn,
    KwLet,
    KwLoop,
    KwMacro,
    KwMatch,
    KwMod,
    KwMove,
    KwMut,
    KwOverride,
    KwPriv,
    KwPub,
    KwRef,
    KwReturn,
    KwSelf,
    KwStatic,
    KwStruct,
    KwSuper,
    KwTrait,
    KwTrue,
    KwTry,
    KwType,
    KwTypeof,
    KwUnsafe,
    KwUnsized,
    KwUse,
    KwVirtual,
    KwWhere,
    KwWhile,
    KwYield,
}

impl TokenKind {
    pub fn is_eof(&self) -> bool {
        matches!(self, TokenKind::Eof)
    }

    /// True when both values are the same variant, ignoring payloads.
    pub fn same_kind(&self, other: &TokenKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Canonical source spelling, used by the AST dump and `stringify`-style
    /// token rendering. Literal payloads are re-escaped.
    pub fn to_source(&self) -> String {
        match self {
            TokenKind::Eof => String::new(),
            TokenKind::Newline => "\n".into(),
            TokenKind::Whitespace => " ".into(),
            TokenKind::Comment(text) => format!("/*{}*/", text),
            TokenKind::Ident(i) => i.name.resolve().to_string(),
            TokenKind::Lifetime(i) => format!("'{}", i.name),
            TokenKind::Integer { value, suffix } => format!("{}{}", value, suffix.name()),
            TokenKind::Float { value, suffix } => {
                let mut s = format!("{}", value);
                if !s.contains('.') && !s.contains('e') && !s.contains("inf") && !s.contains("NaN")
                {
                    s.push_str(".0");
                }
                s.push_str(suffix.name());
                s
            }
            TokenKind::Str(s) => format!("\"{}\"", escape_str(s)),
            TokenKind::ByteStr(bytes) => {
                let mut out = String::from("b\"");
                for &b in bytes {
                    if (0x20..0x7f).contains(&b) && b != b'"' && b != b'\\' {
                        out.push(b as char);
                    } else {
                        out.push_str(&format!("\\x{:02x}", b));
                    }
                }
                out.push('"');
                out
            }
            TokenKind::CharLit(c) => format!("'{}'", c.escape_default()),
            TokenKind::ByteLit(b) => format!("b'\\x{:02x}'", b),
            TokenKind::Interpolated(frag) => match frag {
                Fragment::Expr(e) => crate::dump::expr_to_string(e),
                Fragment::Ty(t) => crate::dump::type_to_string(t),
                Fragment::Pat(p) => crate::dump::pattern_to_string(p),
                Fragment::Stmt(s) => crate::dump::stmt_to_string(s),
                Fragment::Block(b) => crate::dump::block_to_string(b),
                Fragment::Path(p) => crate::dump::path_to_string(p, true),
                Fragment::Meta(m) => crate::dump::meta_to_string(m),
            },
            TokenKind::Bang => "!".into(),
            TokenKind::BangEq => "!=".into(),
            TokenKind::Hash => "#".into(),
            TokenKind::Dollar => "$".into(),
            TokenKind::Percent => "%".into(),
            TokenKind::PercentEq => "%=".into(),
            TokenKind::Amp => "&".into(),
            TokenKind::AmpAmp => "&&".into(),
            TokenKind::AmpEq => "&=".into(),
            TokenKind::ParenOpen => "(".into(),
            TokenKind::ParenClose => ")".into(),
            TokenKind::Star => "*".into(),
            TokenKind::StarEq => "*=".into(),
            TokenKind::Plus => "+".into(),
            TokenKind::PlusEq => "+=".into(),
            TokenKind::Comma => ",".into(),
            TokenKind::Dash => "-".into(),
            TokenKind::DashEq => "-=".into(),
            TokenKind::RArrow => "->".into(),
            TokenKind::Dot => ".".into(),
            TokenKind::DotDot => "..".into(),
            TokenKind::DotDotDot => "...".into(),
            TokenKind::DotDotEq => "..=".into(),
            TokenKind::Slash => "/".into(),
            TokenKind::SlashEq => "/=".into(),
            TokenKind::Colon => ":".into(),
            TokenKind::DoubleColon => "::".into(),
            TokenKind::Semicolon => ";".into(),
            TokenKind::Lt => "<".into(),
            TokenKind::LArrow => "<-".into(),
            TokenKind::Shl => "<<".into(),
            TokenKind::ShlEq => "<<=".into(),
            TokenKind::Le => "<=".into(),
            TokenKind::Eq => "=".into(),
            TokenKind::EqEq => "==".into(),
            TokenKind::FatArrow => "=>".into(),
            TokenKind::Gt => ">".into(),
            TokenKind::Ge => ">=".into(),
            TokenKind::Shr => ">>".into(),
            TokenKind::ShrEq => ">>=".into(),
            TokenKind::Question => "?".into(),
            TokenKind::At => "@".into(),
            TokenKind::BracketOpen => "[".into(),
            TokenKind::Backslash => "\\".into(),
            TokenKind::BracketClose => "]".into(),
            TokenKind::Caret => "^".into(),
            TokenKind::CaretEq => "^=".into(),
            TokenKind::Backtick => "`".into(),
            TokenKind::BraceOpen => "{".into(),
            TokenKind::Pipe => "|".into(),
            TokenKind::PipeEq => "|=".into(),
            TokenKind::PipePipe => "||".into(),
            TokenKind::BraceClose => "}".into(),
            TokenKind::Tilde => "~".into(),
            TokenKind::Underscore => "_".into(),
            TokenKind::KwAbstract => "abstract".into(),
            TokenKind::KwAs => "as".into(),
            TokenKind::KwAsync => "async".into(),
            TokenKind::KwAwait => "await".into(),
            TokenKind::KwBecome => "become".into(),
            TokenKind::KwBox => "box".into(),
            TokenKind::KwBreak => "break".into(),
            TokenKind::KwConst => "const".into(),
            TokenKind::KwContinue => "continue".into(),
            TokenKind::KwCrate => "crate".into(),
            TokenKind::KwDo => "do".into(),
            TokenKind::KwDyn => "dyn".into(),
            TokenKind::KwElse => "else".into(),
            TokenKind::KwEnum => "enum".into(),
            TokenKind::KwExtern => "extern".into(),
            TokenKind::KwFalse => "false".into(),
            TokenKind::KwFinal => "final".into(),
            TokenKind::KwFn => "fn".into(),
            TokenKind::KwFor => "for".into(),
            TokenKind::KwIf => "if".into(),
            TokenKind::KwImpl => "impl".into(),
            TokenKind::KwIn => "in".into(),
            TokenKind::KwLet => "let".into(),
            TokenKind::KwLoop => "loop".into(),
            TokenKind::KwMacro => "macro".into(),
            TokenKind::KwMatch => "match".into(),
            TokenKind::KwMod => "mod".into(),
            TokenKind::KwMove => "move".into(),
            TokenKind::KwMut => "mut".into(),
            TokenKind::KwOverride => "override".into(),
            TokenKind::KwPriv => "priv".into(),
            TokenKind::KwPub => "pub".into(),
            TokenKind::KwRef => "ref".into(),
            TokenKind::KwReturn => "return".into(),
            TokenKind::KwSelf => "self".into(),
            TokenKind::KwStatic => "static".into(),
            TokenKind::KwStruct => "struct".into(),
            TokenKind::KwSuper => "super".into(),
            TokenKind::KwTrait => "trait".into(),
            TokenKind::KwTrue => "true".into(),
            TokenKind::KwTry => "try".into(),
            TokenKind::KwType => "type".into(),
            TokenKind::KwTypeof => "typeof".into(),
            TokenKind::KwUnsafe => "unsafe".into(),
            TokenKind::KwUnsized => "unsized".into(),
            TokenKind::KwUse => "use".into(),
            TokenKind::KwVirtual => "virtual".into(),
            TokenKind::KwWhere => "where".into(),
            TokenKind::KwWhile => "while".into(),
            TokenKind::KwYield => "yield".into(),
        }
    }

    /// Short description for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Eof => "end of input".into(),
            TokenKind::Ident(i) => format!("identifier `{}`", i.name),
            TokenKind::Lifetime(i) => format!("lifetime `'{}`", i.name),
            TokenKind::Integer { value, .. } => format!("integer `{}`", value),
            TokenKind::Float { value, .. } => format!("float `{}`", value),
            TokenKind::Str(_) => "string literal".into(),
            TokenKind::ByteStr(_) => "byte-string literal".into(),
            TokenKind::CharLit(_) => "character literal".into(),
            TokenKind::ByteLit(_) => "byte literal".into(),
            TokenKind::Interpolated(frag) => format!("interpolated {}", frag.kind_name()),
            other => format!("`{}`", other.to_source()),
        }
    }
}

fn escape_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out
}

/// A token with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Token {
        Token { kind, span }
    }

    pub fn bare(kind: TokenKind) -> Token {
        Token {
            kind,
            span: Span::null(),
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind.is_eof()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.to_source())
    }
}

/// Table entries construct their token on lookup: `TokenKind` holds
/// reference-counted payloads in other variants, so the static tables store
/// plain function pointers instead of token values.
type KwTok = fn() -> TokenKind;

macro_rules! rword_table {
    ($($name:literal => $kind:ident,)*) => {
        &[ $( ($name, (|| TokenKind::$kind) as KwTok), )* ]
    };
}

// Both tables must stay sorted by word; lookup is a binary search.
static RWORDS_2015: &[(&str, KwTok)] = rword_table! {
    "_" => Underscore,
    "abstract" => KwAbstract,
    "as" => KwAs,
    "become" => KwBecome,
    "box" => KwBox,
    "break" => KwBreak,
    "const" => KwConst,
    "continue" => KwContinue,
    "crate" => KwCrate,
    "do" => KwDo,
    "else" => KwElse,
    "enum" => KwEnum,
    "extern" => KwExtern,
    "false" => KwFalse,
    "final" => KwFinal,
    "fn" => KwFn,
    "for" => KwFor,
    "if" => KwIf,
    "impl" => KwImpl,
    "in" => KwIn,
    "let" => KwLet,
    "loop" => KwLoop,
    "macro" => KwMacro,
    "match" => KwMatch,
    "mod" => KwMod,
    "move" => KwMove,
    "mut" => KwMut,
    "override" => KwOverride,
    "priv" => KwPriv,
    "pub" => KwPub,
    "ref" => KwRef,
    "return" => KwReturn,
    "self" => KwSelf,
    "static" => KwStatic,
    "struct" => KwStruct,
    "super" => KwSuper,
    "trait" => KwTrait,
    "true" => KwTrue,
    "type" => KwType,
    "typeof" => KwTypeof,
    "unsafe" => KwUnsafe,
    "unsized" => KwUnsized,
    "use" => KwUse,
    "virtual" => KwVirtual,
    "where" => KwWhere,
    "while" => KwWhile,
    "yield" => KwYield,
};

static RWORDS_2018: &[(&str, KwTok)] = rword_table! {
    "_" => Underscore,
    "abstract" => KwAbstract,
    "as" => KwAs,
    "async" => KwAsync,
    "await" => KwAwait,
    "become" => KwBecome,
    "box" => KwBox,
    "break" => KwBreak,
    "const" => KwConst,
    "continue" => KwContinue,
    "crate" => KwCrate,
    "do" => KwDo,
    "dyn" => KwDyn,
    "else" => KwElse,
    "enum" => KwEnum,
    "extern" => KwExtern,
    "false" => KwFalse,
    "final" => KwFinal,
    "fn" => KwFn,
    "for" => KwFor,
    "if" => KwIf,
    "impl" => KwImpl,
    "in" => KwIn,
    "let" => KwLet,
    "loop" => KwLoop,
    "macro" => KwMacro,
    "match" => KwMatch,
    "mod" => KwMod,
    "move" => KwMove,
    "mut" => KwMut,
    "override" => KwOverride,
    "priv" => KwPriv,
    "pub" => KwPub,
    "ref" => KwRef,
    "return" => KwReturn,
    "self" => KwSelf,
    "static" => KwStatic,
    "struct" => KwStruct,
    "super" => KwSuper,
    "trait" => KwTrait,
    "true" => KwTrue,
    "try" => KwTry,
    "type" => KwType,
    "typeof" => KwTypeof,
    "unsafe" => KwUnsafe,
    "unsized" => KwUnsized,
    "use" => KwUse,
    "virtual" => KwVirtual,
    "where" => KwWhere,
    "while" => KwWhile,
    "yield" => KwYield,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_word_tables_are_sorted() {
        for table in [RWORDS_2015, RWORDS_2018] {
            for pair in table.windows(2) {
                assert!(pair[0].0 < pair[1].0, "{} !< {}", pair[0].0, pair[1].0);
            }
        }
    }

    #[test]
    fn edition_2015_does_not_reserve_async() {
        assert_eq!(Edition::E2015.find_reserved_word("async"), None);
        assert_eq!(
            Edition::E2018.find_reserved_word("async"),
            Some(TokenKind::KwAsync)
        );
    }

    #[test]
    fn edition_2018_reserves_try_and_dyn() {
        assert_eq!(
            Edition::E2018.find_reserved_word("try"),
            Some(TokenKind::KwTry)
        );
        assert_eq!(
            Edition::E2021.find_reserved_word("dyn"),
            Some(TokenKind::KwDyn)
        );
        assert_eq!(Edition::E2015.find_reserved_word("dyn"), None);
    }

    #[test]
    fn same_kind_ignores_payload() {
        let a = TokenKind::Integer {
            value: 1,
            suffix: CoreType::Any,
        };
        let b = TokenKind::Integer {
            value: 99,
            suffix: CoreType::U8,
        };
        assert!(a.same_kind(&b));
        assert!(!a.same_kind(&TokenKind::Comma));
    }

    #[test]
    fn suffix_lookup_covers_all_widths() {
        for s in [
            "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64", "u128", "usize",
            "f32", "f64",
        ] {
            let ct = CoreType::from_suffix(s).unwrap();
            assert_eq!(ct.name(), s);
        }
        assert_eq!(CoreType::from_suffix("i7"), None);
    }

    #[test]
    fn token_source_spelling_round_trips_punct() {
        assert_eq!(TokenKind::ShlEq.to_source(), "<<=");
        assert_eq!(TokenKind::DotDotEq.to_source(), "..=");
        assert_eq!(TokenKind::FatArrow.to_source(), "=>");
    }

    #[test]
    fn span_merge_keeps_file_and_ends() {
        let f = Symbol::intern("x.rs");
        let a = Span::new(f, Position::new(1, 0), Position::new(1, 4));
        let b = Span::new(f, Position::new(2, 0), Position::new(2, 7));
        let merged = a.to(b);
        assert_eq!(merged.start, Position::new(1, 0));
        assert_eq!(merged.end, Position::new(2, 7));
    }
}
