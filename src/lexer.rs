//! Streaming lexer: byte stream in, tokens out.
//!
//! Operators are matched by maximal munch against a sorted table. Numeric and
//! string literals are handled inline, with a small push-back token buffer for
//! the cases where one lexeme expands to several tokens (`1..2`, `1.0.0`,
//! doc comments becoming `#[doc = "..."]`).

use crate::error::{PResult, ParseError, ParseErrorKind};
use crate::hygiene::{Hygiene, Ident};
use crate::intern::Symbol;
use crate::stream::TokenSource;
use crate::token::{CoreType, Edition, Position, Span, Token, TokenKind};

/// A decoded codepoint. `Codepoint::EOF` marks end of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Codepoint(u32);

impl Codepoint {
    const EOF: Codepoint = Codepoint(u32::MAX);
    const REPLACEMENT: Codepoint = Codepoint(0xFFFE);

    fn is_eof(self) -> bool {
        self == Codepoint::EOF
    }

    fn is_space(self) -> bool {
        matches!(
            self.0,
            0x09 | 0x0A | 0x0C | 0x0D | 0x20 | 0x85 | 0x200E | 0x200F | 0x2028 | 0x2029
        )
    }

    fn is_digit(self) -> bool {
        (0x30..=0x39).contains(&self.0)
    }

    fn is_xdigit(self) -> bool {
        self.is_digit() || (0x41..=0x46).contains(&self.0) || (0x61..=0x66).contains(&self.0)
    }

    fn to_char(self) -> Option<char> {
        char::from_u32(self.0)
    }
}

impl PartialEq<char> for Codepoint {
    fn eq(&self, other: &char) -> bool {
        self.0 == *other as u32
    }
}

/// Identifier-constituent check: ASCII alphanumerics, `_`, and any
/// non-whitespace codepoint above 127.
fn is_sym(ch: Codepoint) -> bool {
    if ch.is_eof() {
        return false;
    }
    match ch.to_char() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => true,
        Some(_) if ch.0 >= 128 => !ch.is_space(),
        _ => false,
    }
}

/// As with the reserved-word tables, entries construct their token on
/// lookup so the sorted table itself stays free of token payloads.
type OpTok = fn() -> TokenKind;

enum OpEnt {
    Tok(OpTok),
    LineComment,
    BlockComment,
    SingleQuote,
    DoubleQuote,
}

/// Must be kept sorted by byte order, or entries will be skipped by the
/// maximal-munch scan.
static OP_TABLE: &[(&str, OpEnt)] = &[
    ("!", OpEnt::Tok(|| TokenKind::Bang)),
    ("!=", OpEnt::Tok(|| TokenKind::BangEq)),
    ("\"", OpEnt::DoubleQuote),
    ("#", OpEnt::Tok(|| TokenKind::Hash)),
    ("$", OpEnt::Tok(|| TokenKind::Dollar)),
    ("%", OpEnt::Tok(|| TokenKind::Percent)),
    ("%=", OpEnt::Tok(|| TokenKind::PercentEq)),
    ("&", OpEnt::Tok(|| TokenKind::Amp)),
    ("&&", OpEnt::Tok(|| TokenKind::AmpAmp)),
    ("&=", OpEnt::Tok(|| TokenKind::AmpEq)),
    ("'", OpEnt::SingleQuote),
    ("(", OpEnt::Tok(|| TokenKind::ParenOpen)),
    (")", OpEnt::Tok(|| TokenKind::ParenClose)),
    ("*", OpEnt::Tok(|| TokenKind::Star)),
    ("*=", OpEnt::Tok(|| TokenKind::StarEq)),
    ("+", OpEnt::Tok(|| TokenKind::Plus)),
    ("+=", OpEnt::Tok(|| TokenKind::PlusEq)),
    (",", OpEnt::Tok(|| TokenKind::Comma)),
    ("-", OpEnt::Tok(|| TokenKind::Dash)),
    ("-=", OpEnt::Tok(|| TokenKind::DashEq)),
    ("->", OpEnt::Tok(|| TokenKind::RArrow)),
    (".", OpEnt::Tok(|| TokenKind::Dot)),
    ("..", OpEnt::Tok(|| TokenKind::DotDot)),
    ("...", OpEnt::Tok(|| TokenKind::DotDotDot)),
    ("..=", OpEnt::Tok(|| TokenKind::DotDotEq)),
    ("/", OpEnt::Tok(|| TokenKind::Slash)),
    ("/*", OpEnt::BlockComment),
    ("//", OpEnt::LineComment),
    ("/=", OpEnt::Tok(|| TokenKind::SlashEq)),
    (":", OpEnt::Tok(|| TokenKind::Colon)),
    ("::", OpEnt::Tok(|| TokenKind::DoubleColon)),
    (";", OpEnt::Tok(|| TokenKind::Semicolon)),
    ("<", OpEnt::Tok(|| TokenKind::Lt)),
    ("<-", OpEnt::Tok(|| TokenKind::LArrow)),
    ("<<", OpEnt::Tok(|| TokenKind::Shl)),
    ("<<=", OpEnt::Tok(|| TokenKind::ShlEq)),
    ("<=", OpEnt::Tok(|| TokenKind::Le)),
    ("=", OpEnt::Tok(|| TokenKind::Eq)),
    ("==", OpEnt::Tok(|| TokenKind::EqEq)),
    ("=>", OpEnt::Tok(|| TokenKind::FatArrow)),
    (">", OpEnt::Tok(|| TokenKind::Gt)),
    (">=", OpEnt::Tok(|| TokenKind::Ge)),
    (">>", OpEnt::Tok(|| TokenKind::Shr)),
    (">>=", OpEnt::Tok(|| TokenKind::ShrEq)),
    ("?", OpEnt::Tok(|| TokenKind::Question)),
    ("@", OpEnt::Tok(|| TokenKind::At)),
    ("[", OpEnt::Tok(|| TokenKind::BracketOpen)),
    ("\\", OpEnt::Tok(|| TokenKind::Backslash)),
    ("]", OpEnt::Tok(|| TokenKind::BracketClose)),
    ("^", OpEnt::Tok(|| TokenKind::Caret)),
    ("^=", OpEnt::Tok(|| TokenKind::CaretEq)),
    ("`", OpEnt::Tok(|| TokenKind::Backtick)),
    ("{", OpEnt::Tok(|| TokenKind::BraceOpen)),
    ("|", OpEnt::Tok(|| TokenKind::Pipe)),
    ("|=", OpEnt::Tok(|| TokenKind::PipeEq)),
    ("||", OpEnt::Tok(|| TokenKind::PipePipe)),
    ("}", OpEnt::Tok(|| TokenKind::BraceClose)),
    ("~", OpEnt::Tok(|| TokenKind::Tilde)),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumMode {
    Dec,
    Hex,
    Oct,
    Bin,
}

pub struct Lexer {
    file: Symbol,
    bytes: Vec<u8>,
    pos: usize,
    line: u32,
    col: u32,
    last_char: Codepoint,
    last_valid: bool,
    next_tokens: Vec<Token>,
    edition: Edition,
    hygiene: Hygiene,
}

impl Lexer {
    pub fn new(file_name: &str, source: impl Into<Vec<u8>>, edition: Edition) -> Lexer {
        let mut bytes = source.into();
        // UTF-8 BOM at position zero is consumed silently.
        if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
            bytes.drain(..3);
        }
        Lexer {
            file: Symbol::intern(file_name),
            bytes,
            pos: 0,
            line: 1,
            col: 0,
            last_char: Codepoint::EOF,
            last_valid: false,
            next_tokens: Vec::new(),
            edition,
            hygiene: Hygiene::new_scope(),
        }
    }

    pub fn from_file(path: &std::path::Path, edition: Edition) -> std::io::Result<Lexer> {
        let bytes = std::fs::read(path)?;
        Ok(Lexer::new(&path.display().to_string(), bytes, edition))
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.col)
    }

    fn point_span(&self) -> Span {
        Span::point(self.file, self.position())
    }

    fn err(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(kind, self.point_span())
    }

    // ---- character access ------------------------------------------------

    fn getc_byte(&mut self) -> Option<u8> {
        let mut b = *self.bytes.get(self.pos)?;
        self.pos += 1;
        // CRLF collapses to LF for position accounting.
        if b == b'\r' && self.bytes.get(self.pos) == Some(&b'\n') {
            self.pos += 1;
            b = b'\n';
        }
        if b == b'\n' {
            self.line += 1;
            self.col = 0;
        }
        Some(b)
    }

    fn getc_cp(&mut self) -> PResult<Codepoint> {
        let v1 = match self.getc_byte() {
            Some(b) => b,
            None => return Ok(Codepoint::EOF),
        };
        if v1 < 128 {
            return Ok(Codepoint(v1 as u32));
        }
        if v1 & 0xC0 == 0x80 {
            // Stray continuation byte.
            return Ok(Codepoint::REPLACEMENT);
        }
        let (extra, mut val) = if v1 & 0xE0 == 0xC0 {
            (1, (v1 & 0x1F) as u32)
        } else if v1 & 0xF0 == 0xE0 {
            (2, (v1 & 0x0F) as u32)
        } else if v1 & 0xF8 == 0xF0 {
            (3, (v1 & 0x07) as u32)
        } else {
            return Err(self.err(ParseErrorKind::BadUtf8));
        };
        for _ in 0..extra {
            let e = match self.getc_byte() {
                Some(b) => b,
                None => return Ok(Codepoint::REPLACEMENT),
            };
            if e & 0xC0 != 0x80 {
                return Ok(Codepoint::REPLACEMENT);
            }
            val = (val << 6) | (e & 0x3F) as u32;
        }
        Ok(Codepoint(val))
    }

    fn getc(&mut self) -> PResult<Codepoint> {
        if self.last_valid {
            self.last_valid = false;
        } else {
            self.last_char = self.getc_cp()?;
            self.col += 1;
        }
        Ok(self.last_char)
    }

    fn ungetc(&mut self) {
        debug_assert!(!self.last_valid, "double unget");
        self.last_valid = true;
    }

    /// `getc` skipping underscores, for digit runs.
    fn getc_num(&mut self) -> PResult<Codepoint> {
        loop {
            let ch = self.getc()?;
            if ch != '_' {
                return Ok(ch);
            }
        }
    }

    // ---- token building --------------------------------------------------

    fn tok(&self, kind: TokenKind, start: Position) -> Token {
        Token::new(kind, Span::new(self.file, start, self.position()))
    }

    fn push_next(&mut self, kind: TokenKind) {
        let tok = Token::new(kind, self.point_span());
        self.next_tokens.push(tok);
    }

    fn ident_token(&self, name: &str) -> TokenKind {
        TokenKind::Ident(Ident::new(Symbol::intern(name), self.hygiene.clone()))
    }

    // ---- operator scan ---------------------------------------------------

    /// Maximal munch over the sorted operator table. Leaves the first
    /// unmatched character ungot.
    fn get_symbol(&mut self) -> PResult<Option<&'static OpEnt>> {
        let mut ch = self.getc()?;
        let mut ofs = 0usize;
        let mut best: Option<&'static OpEnt> = None;
        for (text, ent) in OP_TABLE {
            let bytes = text.as_bytes();
            if ofs >= bytes.len() || (bytes[ofs] as u32) > ch.0 {
                break;
            }
            while ofs < bytes.len() && ch == bytes[ofs] as char {
                ch = self.getc()?;
                ofs += 1;
            }
            if ofs == bytes.len() {
                best = Some(ent);
            }
        }
        self.ungetc();
        Ok(best)
    }

    // ---- literals --------------------------------------------------------

    fn parse_int(&mut self) -> PResult<(u128, NumMode)> {
        let mut val: u128 = 0;
        let mut mode = NumMode::Dec;
        let mut ch = self.getc()?;
        if ch == '0' {
            ch = self.getc_num()?;
            if ch == 'x' {
                mode = NumMode::Hex;
                loop {
                    ch = self.getc_num()?;
                    if !ch.is_xdigit() {
                        break;
                    }
                    let d = ch.to_char().unwrap().to_digit(16).unwrap();
                    val = val.wrapping_mul(16).wrapping_add(d as u128);
                }
            } else if ch == 'b' {
                mode = NumMode::Bin;
                loop {
                    ch = self.getc_num()?;
                    if !ch.is_digit() {
                        break;
                    }
                    match ch.0 {
                        0x30 => val = val.wrapping_mul(2),
                        0x31 => val = val.wrapping_mul(2).wrapping_add(1),
                        _ => {
                            return Err(self.err(ParseErrorKind::BadLiteral(
                                "invalid digit in binary literal".into(),
                            )))
                        }
                    }
                }
            } else if ch == 'o' {
                mode = NumMode::Oct;
                loop {
                    ch = self.getc_num()?;
                    if !ch.is_digit() {
                        break;
                    }
                    let d = ch.0 - 0x30;
                    if d > 7 {
                        return Err(self.err(ParseErrorKind::BadLiteral(
                            "invalid digit in octal literal".into(),
                        )));
                    }
                    val = val.wrapping_mul(8).wrapping_add(d as u128);
                }
            } else {
                while ch.is_digit() {
                    val = val.wrapping_mul(10).wrapping_add((ch.0 - 0x30) as u128);
                    ch = self.getc_num()?;
                }
            }
        } else {
            while ch.is_digit() {
                val = val.wrapping_mul(10).wrapping_add((ch.0 - 0x30) as u128);
                ch = self.getc_num()?;
            }
        }
        self.ungetc();
        Ok((val, mode))
    }

    /// Parse the fractional/exponent part of a float whose whole part (and
    /// the `.`, when present) have been consumed. Returns `None` when the
    /// input turned out not to be a single float; in that case the resulting
    /// tokens were pushed onto the push-back buffer and the caller should pop
    /// and return the last of them.
    fn parse_float(&mut self, whole: u128) -> PResult<Option<f64>> {
        let mut buf = format!("{}.", whole);
        let mut ch = self.getc_num()?;
        while ch.is_digit() {
            buf.push(ch.to_char().unwrap());
            ch = self.getc_num()?;
        }
        if ch == '.' {
            // `x.y.` is either a range start or double tuple indexing.
            ch = self.getc()?;
            if ch == '.' {
                match self.getc()?.0 {
                    0x2E => self.push_next(TokenKind::DotDotDot),
                    0x3D => self.push_next(TokenKind::DotDotEq),
                    _ => {
                        self.ungetc();
                        self.push_next(TokenKind::DotDot);
                    }
                }
                let fval: f64 = buf.parse().unwrap_or(0.0);
                self.push_next(TokenKind::Float {
                    value: fval,
                    suffix: CoreType::Any,
                });
                Ok(None)
            } else {
                self.ungetc();
                // `x.y.` with a non-dot next: two integers and a method call.
                let dot = buf.find('.').unwrap();
                let first: u128 = buf[..dot].parse().unwrap_or(0);
                let second: u128 = buf[dot + 1..].parse().unwrap_or(0);
                self.push_next(TokenKind::Dot);
                self.push_next(TokenKind::Integer {
                    value: second,
                    suffix: CoreType::Any,
                });
                self.push_next(TokenKind::Dot);
                self.push_next(TokenKind::Integer {
                    value: first,
                    suffix: CoreType::Any,
                });
                Ok(None)
            }
        } else {
            if ch == 'e' || ch == 'E' {
                buf.push('e');
                ch = self.getc_num()?;
                if ch == '-' || ch == '+' {
                    buf.push(ch.to_char().unwrap());
                    ch = self.getc_num()?;
                }
                if !ch.is_digit() {
                    return Err(self.err(ParseErrorKind::BadLiteral(
                        "non-numeric character in float exponent".into(),
                    )));
                }
                while ch.is_digit() {
                    buf.push(ch.to_char().unwrap());
                    ch = self.getc_num()?;
                }
            }
            self.ungetc();
            let fval: f64 = buf
                .parse()
                .map_err(|_| self.err(ParseErrorKind::BadLiteral(format!("bad float `{}`", buf))))?;
            Ok(Some(fval))
        }
    }

    /// Interpret one escape sequence after a `\`. Returns `None` when the
    /// escape produced no character (line continuation that ran into the
    /// terminator).
    fn parse_escape(&mut self, enclosing: char) -> PResult<Option<u32>> {
        let ch = self.getc()?;
        match ch.to_char() {
            Some('x') => {
                let mut v = 0u32;
                for _ in 0..2 {
                    let d = self.getc()?;
                    if !d.is_xdigit() {
                        return Err(self.err(ParseErrorKind::BadEscape(
                            "expected two hex digits after \\x".into(),
                        )));
                    }
                    v = v * 16 + d.to_char().unwrap().to_digit(16).unwrap();
                }
                Ok(Some(v))
            }
            Some('u') => {
                let mut ch = self.getc()?;
                let braced = ch == '{';
                if braced {
                    ch = self.getc()?;
                }
                if !ch.is_xdigit() {
                    return Err(self.err(ParseErrorKind::BadEscape(
                        "expected hex digits in \\u sequence".into(),
                    )));
                }
                let mut val = 0u32;
                while ch.is_xdigit() {
                    val = val * 16 + ch.to_char().unwrap().to_digit(16).unwrap();
                    ch = self.getc()?;
                }
                if braced {
                    if ch != '}' {
                        return Err(self.err(ParseErrorKind::BadEscape(
                            "expected terminating } in \\u sequence".into(),
                        )));
                    }
                } else {
                    self.ungetc();
                }
                Ok(Some(val))
            }
            Some('0') => Ok(Some(0)),
            Some('\\') => Ok(Some('\\' as u32)),
            Some('\'') => Ok(Some('\'' as u32)),
            Some('"') => Ok(Some('"' as u32)),
            Some('r') => Ok(Some('\r' as u32)),
            Some('n') => Ok(Some('\n' as u32)),
            Some('t') => Ok(Some('\t' as u32)),
            Some('\r') | Some('\n') => {
                // Line continuation: skip whitespace, then resume.
                let mut ch = self.getc()?;
                while ch.is_space() {
                    ch = self.getc()?;
                }
                if ch == '\\' {
                    self.parse_escape(enclosing)
                } else if ch == enclosing {
                    self.ungetc();
                    Ok(None)
                } else if ch.is_eof() {
                    Err(self.err(ParseErrorKind::UnexpectedEof))
                } else {
                    Ok(Some(ch.0))
                }
            }
            _ => Err(self.err(ParseErrorKind::BadEscape(format!(
                "unknown escape sequence \\{}",
                ch.to_char().unwrap_or('\u{FFFD}')
            )))),
        }
    }

    fn lex_identifier(
        &mut self,
        leader: char,
        leader2: Option<char>,
        parse_reserved: bool,
    ) -> PResult<TokenKind> {
        let mut name = String::new();
        let mut ch;
        match leader2 {
            Some(l2) => {
                name.push(leader);
                ch = Codepoint(l2 as u32);
            }
            None => ch = Codepoint(leader as u32),
        }
        while is_sym(ch) {
            name.push(ch.to_char().unwrap());
            ch = self.getc()?;
        }
        self.ungetc();
        if parse_reserved {
            if let Some(kind) = self.edition.find_reserved_word(&name) {
                return Ok(kind);
            }
        }
        Ok(self.ident_token(&name))
    }

    fn lex_raw_string(&mut self, is_byte: bool) -> PResult<TokenKind> {
        let mut ch = self.getc()?;
        let mut hashes = 0usize;
        while ch == '#' {
            hashes += 1;
            ch = self.getc()?;
        }
        if ch != '"' {
            if hashes == 0 {
                self.ungetc();
                return if is_byte {
                    self.lex_identifier('b', Some('r'), true)
                } else {
                    self.lex_identifier('r', None, true)
                };
            } else if hashes == 1 {
                // Raw identifier: `r#ident` bypasses the reserved-word table.
                let c = ch
                    .to_char()
                    .ok_or_else(|| self.err(ParseErrorKind::BadChar(ch.0)))?;
                return self.lex_identifier(c, None, false);
            } else {
                return Err(self.err(ParseErrorKind::BadLiteral(
                    "expected '\"' after hashes following `r`".into(),
                )));
            }
        }
        let mut val = String::new();
        let mut terminating = 0usize;
        loop {
            ch = self.getc()?;
            if ch.is_eof() {
                return Err(self.err(ParseErrorKind::Unterminated("raw string")));
            }
            if terminating > 0 {
                if ch != '#' {
                    val.push('"');
                    for _ in 0..(hashes - terminating) {
                        val.push('#');
                    }
                    terminating = 0;
                    self.ungetc();
                } else {
                    terminating -= 1;
                    if terminating == 0 {
                        break;
                    }
                }
            } else if ch == '"' {
                if hashes == 0 {
                    break;
                }
                terminating = hashes;
            } else {
                val.push(ch.to_char().unwrap_or('\u{FFFD}'));
            }
        }
        Ok(if is_byte {
            TokenKind::ByteStr(val.into_bytes())
        } else {
            TokenKind::Str(val)
        })
    }

    fn lex_byte_or_raw(&mut self, first: Codepoint) -> PResult<TokenKind> {
        let mut is_byte = false;
        let mut ch = first;
        if ch == 'b' {
            is_byte = true;
            ch = self.getc()?;
        }
        if ch == 'r' {
            return self.lex_raw_string(is_byte);
        }
        debug_assert!(is_byte);
        if ch == '"' {
            // Byte string: escapes allow the full byte range.
            let mut bytes = Vec::new();
            loop {
                let ch = self.getc()?;
                if ch == '"' {
                    break;
                }
                if ch.is_eof() {
                    return Err(self.err(ParseErrorKind::Unterminated("byte string")));
                }
                if ch == '\\' {
                    if let Some(v) = self.parse_escape('"')? {
                        if v > 255 {
                            return Err(self.err(ParseErrorKind::BadLiteral(
                                "value out of range for byte literal".into(),
                            )));
                        }
                        bytes.push(v as u8);
                    }
                } else if ch.0 > 127 {
                    return Err(self.err(ParseErrorKind::BadLiteral(
                        "non-ASCII character in byte string".into(),
                    )));
                } else {
                    bytes.push(ch.0 as u8);
                }
            }
            Ok(TokenKind::ByteStr(bytes))
        } else if ch == '\'' {
            let ch = self.getc()?;
            let v = if ch == '\\' {
                match self.parse_escape('\'')? {
                    Some(v) => v,
                    None => {
                        return Err(self.err(ParseErrorKind::BadLiteral(
                            "empty byte literal".into(),
                        )))
                    }
                }
            } else {
                ch.0
            };
            if self.getc()? != '\'' {
                return Err(self.err(ParseErrorKind::BadLiteral(
                    "multi-byte character literal".into(),
                )));
            }
            if v > 255 {
                return Err(self.err(ParseErrorKind::BadLiteral(
                    "value out of range for byte literal".into(),
                )));
            }
            Ok(TokenKind::ByteLit(v as u8))
        } else {
            self.ungetc();
            self.lex_identifier('b', None, true)
        }
    }

    fn lex_number(&mut self) -> PResult<TokenKind> {
        self.ungetc();
        let (val, mode) = self.parse_int()?;
        let ch = self.getc()?;
        if ch == 'e' || ch == 'E' || ch == '.' {
            if ch == '.' {
                let ch2 = self.getc()?;
                if ch2 == '.' {
                    // `1..`, `1...`, `1..=`
                    match self.getc()?.0 {
                        0x2E => self.push_next(TokenKind::DotDotDot),
                        0x3D => self.push_next(TokenKind::DotDotEq),
                        _ => {
                            self.ungetc();
                            self.push_next(TokenKind::DotDot);
                        }
                    }
                    return Ok(TokenKind::Integer {
                        value: val,
                        suffix: CoreType::Any,
                    });
                }
                if !ch2.is_digit() {
                    self.ungetc();
                    if is_sym(ch2) {
                        // `1.method()` - integer then field/method access.
                        self.push_next(TokenKind::Dot);
                        return Ok(TokenKind::Integer {
                            value: val,
                            suffix: CoreType::Any,
                        });
                    } else {
                        // Trailing dot: `1.` is a float.
                        return Ok(TokenKind::Float {
                            value: val as f64,
                            suffix: CoreType::Any,
                        });
                    }
                }
                // A digit follows: fall through into the fraction. The digit
                // is ungot below via parse_float's getc_num loop.
            }
            if mode != NumMode::Dec {
                return Err(self.err(ParseErrorKind::Todo("non-decimal floats".into())));
            }
            self.ungetc();
            let fval = match self.parse_float(val)? {
                Some(v) => v,
                None => {
                    let tok = self
                        .next_tokens
                        .pop()
                        .expect("parse_float pushed tokens");
                    return Ok(tok.kind);
                }
            };
            let mut ch = self.getc()?;
            if is_sym(ch) {
                let mut suffix = String::new();
                while is_sym(ch) {
                    suffix.push(ch.to_char().unwrap());
                    ch = self.getc()?;
                }
                self.ungetc();
                let num_type = match suffix.as_str() {
                    "f32" => CoreType::F32,
                    "f64" => CoreType::F64,
                    _ => {
                        return Err(self.err(ParseErrorKind::BadLiteral(format!(
                            "unknown number suffix `{}`",
                            suffix
                        ))))
                    }
                };
                Ok(TokenKind::Float {
                    value: fval,
                    suffix: num_type,
                })
            } else {
                self.ungetc();
                Ok(TokenKind::Float {
                    value: fval,
                    suffix: CoreType::Any,
                })
            }
        } else if is_sym(ch) {
            let mut suffix = String::new();
            let mut ch = ch;
            while is_sym(ch) {
                suffix.push(ch.to_char().unwrap());
                ch = self.getc()?;
            }
            self.ungetc();
            match CoreType::from_suffix(&suffix) {
                Some(ct) if ct.is_float() => Ok(TokenKind::Float {
                    value: val as f64,
                    suffix: ct,
                }),
                Some(ct) => Ok(TokenKind::Integer {
                    value: val,
                    suffix: ct,
                }),
                None => Err(self.err(ParseErrorKind::BadLiteral(format!(
                    "unknown integer suffix `{}`",
                    suffix
                )))),
            }
        } else {
            self.ungetc();
            Ok(TokenKind::Integer {
                value: val,
                suffix: CoreType::Any,
            })
        }
    }

    fn lex_line_comment(&mut self) -> PResult<TokenKind> {
        let mut text = String::new();
        let mut ch = self.getc()?;
        let mut is_doc = false;
        let mut is_pdoc = false;
        if ch == '/' {
            ch = self.getc()?;
            if ch == '/' {
                text.push('/');
            } else {
                is_doc = true;
            }
        } else if ch == '!' {
            is_pdoc = true;
            ch = self.getc()?;
        }
        while !ch.is_eof() && ch != '\n' && ch != '\r' {
            text.push(ch.to_char().unwrap_or('\u{FFFD}'));
            ch = self.getc()?;
        }
        self.ungetc();
        if is_doc || is_pdoc {
            Ok(self.doc_attr_tokens(text, is_pdoc))
        } else {
            Ok(TokenKind::Comment(text))
        }
    }

    fn lex_block_comment(&mut self) -> PResult<TokenKind> {
        let mut text = String::new();
        let mut ch = self.getc()?;
        let mut is_doc = false;
        let mut is_pdoc = false;
        if ch == '*' {
            ch = self.getc()?;
            if ch == '*' {
                text.push('*');
            } else if ch == '/' {
                // `/**/` is an empty plain comment.
                return Ok(TokenKind::Comment(String::new()));
            } else {
                is_doc = true;
            }
        } else if ch == '!' {
            is_pdoc = true;
            ch = self.getc()?;
        }
        let mut level = 0u32;
        loop {
            if ch.is_eof() {
                return Err(self.err(ParseErrorKind::Unterminated("block comment")));
            }
            if ch == '/' {
                let ch2 = self.getc()?;
                if ch2 == '*' {
                    level += 1;
                    text.push('/');
                    text.push('*');
                } else {
                    text.push('/');
                    self.ungetc();
                }
            } else if ch == '*' {
                let ch2 = self.getc()?;
                if ch2 == '/' {
                    if level == 0 {
                        break;
                    }
                    level -= 1;
                    text.push('*');
                    text.push('/');
                } else {
                    text.push('*');
                    self.ungetc();
                }
            } else {
                text.push(ch.to_char().unwrap_or('\u{FFFD}'));
            }
            ch = self.getc()?;
        }
        if is_doc || is_pdoc {
            Ok(self.doc_attr_tokens(text, is_pdoc))
        } else {
            Ok(TokenKind::Comment(text))
        }
    }

    /// Queue the expansion of a doc comment into `#[doc = "..."]` (or the
    /// inner `#![doc = "..."]`), returning the leading `#`.
    fn doc_attr_tokens(&mut self, text: String, inner: bool) -> TokenKind {
        // Pushed in reverse: the buffer pops from the back.
        self.push_next(TokenKind::BracketClose);
        self.push_next(TokenKind::Str(text));
        self.push_next(TokenKind::Eq);
        let doc = self.ident_token("doc");
        self.push_next(doc);
        self.push_next(TokenKind::BracketOpen);
        if inner {
            self.push_next(TokenKind::Bang);
        }
        TokenKind::Hash
    }

    fn lex_quote(&mut self) -> PResult<TokenKind> {
        let first = self.getc()?;
        if first == '\\' {
            let val = match self.parse_escape('\'')? {
                Some(v) => v,
                None => {
                    return Err(self.err(ParseErrorKind::BadLiteral(
                        "empty character literal".into(),
                    )))
                }
            };
            if self.getc()? != '\'' {
                return Err(self.err(ParseErrorKind::BadLiteral(
                    "multi-character literal".into(),
                )));
            }
            let c = char::from_u32(val)
                .ok_or_else(|| self.err(ParseErrorKind::BadLiteral("invalid char value".into())))?;
            Ok(TokenKind::CharLit(c))
        } else {
            if first.is_eof() {
                return Err(self.err(ParseErrorKind::Unterminated("character literal")));
            }
            let ch = self.getc()?;
            if ch == '\'' {
                Ok(TokenKind::CharLit(first.to_char().unwrap_or('\u{FFFD}')))
            } else if is_sym(first) {
                // Lifetime name.
                let mut name = String::new();
                name.push(first.to_char().unwrap());
                let mut ch = ch;
                while is_sym(ch) {
                    name.push(ch.to_char().unwrap());
                    ch = self.getc()?;
                }
                self.ungetc();
                Ok(TokenKind::Lifetime(Ident::new(
                    Symbol::intern(&name),
                    self.hygiene.clone(),
                )))
            } else {
                Err(self.err(ParseErrorKind::BadLiteral(
                    "expected ' after character constant".into(),
                )))
            }
        }
    }

    fn lex_string(&mut self) -> PResult<TokenKind> {
        let mut s = String::new();
        loop {
            let ch = self.getc()?;
            if ch == '"' {
                break;
            }
            if ch.is_eof() {
                return Err(self.err(ParseErrorKind::Unterminated("string literal")));
            }
            if ch == '\\' {
                if let Some(v) = self.parse_escape('"')? {
                    let c = char::from_u32(v).ok_or_else(|| {
                        self.err(ParseErrorKind::BadEscape("invalid char escape value".into()))
                    })?;
                    s.push(c);
                }
            } else {
                s.push(ch.to_char().unwrap_or('\u{FFFD}'));
            }
        }
        Ok(TokenKind::Str(s))
    }

    /// One raw token; whitespace, newlines, and comments are produced
    /// explicitly and filtered by `next_token`.
    fn token_inner(&mut self) -> PResult<Token> {
        if let Some(tok) = self.next_tokens.pop() {
            return Ok(tok);
        }
        let start = self.position();
        let ch = self.getc()?;

        if ch.is_eof() {
            return Ok(self.tok(TokenKind::Eof, start));
        }

        // Shebang / attribute at the very start of the file.
        if self.line == 1 && self.col == 1 && ch == '#' {
            let ch2 = self.getc()?;
            if ch2 == '!' {
                let ch3 = self.getc()?;
                if ch3 == '/' {
                    let mut c = ch3;
                    while !c.is_eof() && c != '\n' {
                        c = self.getc()?;
                    }
                    return Ok(self.tok(TokenKind::Newline, start));
                } else if ch3 == '[' {
                    self.ungetc();
                    self.push_next(TokenKind::Bang);
                    return Ok(self.tok(TokenKind::Hash, start));
                } else {
                    return Err(self.err(ParseErrorKind::BadChar(ch3.0)));
                }
            } else if ch2 == '[' {
                self.ungetc();
                return Ok(self.tok(TokenKind::Hash, start));
            } else {
                self.ungetc();
                return Err(self.err(ParseErrorKind::BadChar(ch.0)));
            }
        }

        if ch == '\n' {
            return Ok(self.tok(TokenKind::Newline, start));
        }
        if ch.is_space() {
            loop {
                let c = self.getc()?;
                if c.is_eof() || !c.is_space() || c == '\n' {
                    break;
                }
            }
            self.ungetc();
            return Ok(self.tok(TokenKind::Whitespace, start));
        }
        self.ungetc();

        match self.get_symbol()? {
            None => {
                let ch = self.getc()?;
                if ch.is_digit() {
                    let kind = self.lex_number()?;
                    Ok(self.tok(kind, start))
                } else if ch == 'b' || ch == 'r' {
                    let kind = self.lex_byte_or_raw(ch)?;
                    Ok(self.tok(kind, start))
                } else if is_sym(ch) {
                    let c = ch.to_char().unwrap();
                    let kind = self.lex_identifier(c, None, true)?;
                    Ok(self.tok(kind, start))
                } else if ch.is_eof() {
                    Ok(self.tok(TokenKind::Eof, start))
                } else {
                    Err(self.err(ParseErrorKind::BadChar(ch.0)))
                }
            }
            Some(OpEnt::Tok(make)) => {
                let kind = make();
                // `.` directly followed by a digit continues a numeric
                // fragment (tuple indexing after a float, `.5` never occurs
                // at expression start in this grammar).
                if kind == TokenKind::Dot {
                    let ch = self.getc()?;
                    self.ungetc();
                    if ch.is_digit() {
                        let (val, _) = self.parse_int()?;
                        self.push_next(TokenKind::Integer {
                            value: val,
                            suffix: CoreType::Any,
                        });
                    }
                }
                Ok(self.tok(kind, start))
            }
            Some(OpEnt::LineComment) => {
                let kind = self.lex_line_comment()?;
                Ok(self.tok(kind, start))
            }
            Some(OpEnt::BlockComment) => {
                let kind = self.lex_block_comment()?;
                Ok(self.tok(kind, start))
            }
            Some(OpEnt::SingleQuote) => {
                let kind = self.lex_quote()?;
                Ok(self.tok(kind, start))
            }
            Some(OpEnt::DoubleQuote) => {
                let kind = self.lex_string()?;
                Ok(self.tok(kind, start))
            }
        }
    }
}

impl TokenSource for Lexer {
    fn next_token(&mut self) -> PResult<Token> {
        loop {
            let tok = self.token_inner()?;
            match tok.kind {
                TokenKind::Newline | TokenKind::Whitespace | TokenKind::Comment(_) => continue,
                _ => return Ok(tok),
            }
        }
    }

    fn source_span(&self) -> Span {
        self.point_span()
    }

    fn source_edition(&self) -> Edition {
        self.edition
    }

    fn source_hygiene(&self) -> Hygiene {
        self.hygiene.clone()
    }

    fn push_hygiene(&mut self) {
        self.hygiene = Hygiene::new_scope_chained(&self.hygiene);
    }

    fn pop_hygiene(&mut self) {
        self.hygiene = self.hygiene.parent();
    }
}

/// Look up a single operator spelling, for synthesized tokens.
pub fn find_operator(s: &str) -> Option<TokenKind> {
    if s == "_" {
        return Some(TokenKind::Underscore);
    }
    for (text, ent) in OP_TABLE {
        if *text > s {
            break;
        }
        if *text == s {
            if let OpEnt::Tok(make) = ent {
                return Some(make());
            }
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(src: &str) -> Vec<TokenKind> {
        lex_all_edition(src, Edition::E2015)
    }

    fn lex_all_edition(src: &str, edition: Edition) -> Vec<TokenKind> {
        let mut lexer = Lexer::new("test.rs", src, edition);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token().expect("lex failure");
            if tok.is_eof() {
                break;
            }
            out.push(tok.kind);
        }
        out
    }

    fn ident(name: &str) -> TokenKind {
        TokenKind::Ident(Ident::plain(name))
    }

    fn int(v: u128) -> TokenKind {
        TokenKind::Integer {
            value: v,
            suffix: CoreType::Any,
        }
    }

    #[test]
    fn lexes_let_statement() {
        let toks = lex_all("let x: i32 = 0x2A;");
        assert_eq!(
            toks,
            vec![
                TokenKind::KwLet,
                ident("x"),
                TokenKind::Colon,
                ident("i32"),
                TokenKind::Eq,
                int(42),
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn operator_table_is_sorted() {
        for pair in OP_TABLE.windows(2) {
            assert!(pair[0].0 < pair[1].0, "{} !< {}", pair[0].0, pair[1].0);
        }
    }

    #[test]
    fn maximal_munch_prefers_longest() {
        assert_eq!(lex_all("<<="), vec![TokenKind::ShlEq]);
        assert_eq!(lex_all("<< ="), vec![TokenKind::Shl, TokenKind::Eq]);
        assert_eq!(lex_all("..="), vec![TokenKind::DotDotEq]);
        assert_eq!(lex_all("..."), vec![TokenKind::DotDotDot]);
        assert_eq!(
            lex_all("||=> ||"),
            vec![TokenKind::PipePipe, TokenKind::Eq, TokenKind::Gt, TokenKind::PipePipe]
        );
    }

    #[test]
    fn number_bases_and_underscores() {
        assert_eq!(lex_all("0x2A"), vec![int(42)]);
        assert_eq!(lex_all("0o17"), vec![int(15)]);
        assert_eq!(lex_all("0b1010"), vec![int(10)]);
        assert_eq!(lex_all("1_000_000"), vec![int(1_000_000)]);
    }

    #[test]
    fn integer_suffixes() {
        assert_eq!(
            lex_all("42u8"),
            vec![TokenKind::Integer {
                value: 42,
                suffix: CoreType::U8
            }]
        );
        assert_eq!(
            lex_all("7isize"),
            vec![TokenKind::Integer {
                value: 7,
                suffix: CoreType::Isize
            }]
        );
        // f-suffix promotes to a float literal.
        assert_eq!(
            lex_all("3f32"),
            vec![TokenKind::Float {
                value: 3.0,
                suffix: CoreType::F32
            }]
        );
    }

    #[test]
    fn float_forms() {
        assert_eq!(
            lex_all("1.5"),
            vec![TokenKind::Float {
                value: 1.5,
                suffix: CoreType::Any
            }]
        );
        assert_eq!(
            lex_all("1.0e-2"),
            vec![TokenKind::Float {
                value: 0.01,
                suffix: CoreType::Any
            }]
        );
        assert_eq!(
            lex_all("1.e1"),
            // `1.e1` is not a float: integer, dot, ident.
            vec![int(1), TokenKind::Dot, ident("e1")]
        );
        assert_eq!(
            lex_all("2."),
            vec![TokenKind::Float {
                value: 2.0,
                suffix: CoreType::Any
            }]
        );
    }

    #[test]
    fn range_after_integer_splits() {
        assert_eq!(lex_all("1..2"), vec![int(1), TokenKind::DotDot, int(2)]);
        assert_eq!(lex_all("1..=2"), vec![int(1), TokenKind::DotDotEq, int(2)]);
        assert_eq!(lex_all("1...2"), vec![int(1), TokenKind::DotDotDot, int(2)]);
    }

    #[test]
    fn double_tuple_index_splits_into_two_integers() {
        assert_eq!(
            lex_all("x.0.1"),
            vec![ident("x"), TokenKind::Dot, int(0), TokenKind::Dot, int(1)]
        );
        assert_eq!(
            lex_all("1.0.0"),
            vec![int(1), TokenKind::Dot, int(0), TokenKind::Dot, int(0)]
        );
    }

    #[test]
    fn float_range_splits() {
        assert_eq!(
            lex_all("1.5..2.5"),
            vec![
                TokenKind::Float {
                    value: 1.5,
                    suffix: CoreType::Any
                },
                TokenKind::DotDot,
                TokenKind::Float {
                    value: 2.5,
                    suffix: CoreType::Any
                },
            ]
        );
    }

    #[test]
    fn integer_method_call() {
        assert_eq!(
            lex_all("1.max(2)"),
            vec![
                int(1),
                TokenKind::Dot,
                ident("max"),
                TokenKind::ParenOpen,
                int(2),
                TokenKind::ParenClose
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            lex_all(r#""a\tb\n\x41\u{1F600}\0""#),
            vec![TokenKind::Str("a\tb\nA\u{1F600}\0".into())]
        );
    }

    #[test]
    fn string_line_continuation() {
        assert_eq!(
            lex_all("\"a\\\n   b\""),
            vec![TokenKind::Str("ab".into())]
        );
    }

    #[test]
    fn raw_strings() {
        assert_eq!(lex_all(r###"r#"a "quoted" b"#"###), vec![TokenKind::Str(
            "a \"quoted\" b".into()
        )]);
        assert_eq!(lex_all(r#"r"plain""#), vec![TokenKind::Str("plain".into())]);
        assert_eq!(
            lex_all(r##"br#"bytes"#"##),
            vec![TokenKind::ByteStr(b"bytes".to_vec())]
        );
    }

    #[test]
    fn raw_identifier_bypasses_keywords() {
        assert_eq!(lex_all("r#match"), vec![ident("match")]);
        assert_eq!(lex_all("match"), vec![TokenKind::KwMatch]);
    }

    #[test]
    fn byte_literals() {
        assert_eq!(lex_all("b'x'"), vec![TokenKind::ByteLit(b'x')]);
        assert_eq!(lex_all(r"b'\xFF'"), vec![TokenKind::ByteLit(0xFF)]);
        assert_eq!(lex_all(r#"b"ab\xFF""#), vec![TokenKind::ByteStr(vec![
            b'a', b'b', 0xFF
        ])]);
    }

    #[test]
    fn char_and_lifetime() {
        assert_eq!(lex_all("'x'"), vec![TokenKind::CharLit('x')]);
        assert_eq!(lex_all(r"'\n'"), vec![TokenKind::CharLit('\n')]);
        let toks = lex_all("'a 'static");
        assert!(matches!(&toks[0], TokenKind::Lifetime(i) if i.name.is("a")));
        assert!(matches!(&toks[1], TokenKind::Lifetime(i) if i.name.is("static")));
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            lex_all("a // line\nb /* block /* nested */ */ c"),
            vec![ident("a"), ident("b"), ident("c")]
        );
    }

    #[test]
    fn doc_comment_expands_to_attribute() {
        let toks = lex_all("/// hello\nfn");
        assert_eq!(toks[0], TokenKind::Hash);
        assert_eq!(toks[1], TokenKind::BracketOpen);
        assert_eq!(toks[2], ident("doc"));
        assert_eq!(toks[3], TokenKind::Eq);
        assert_eq!(toks[4], TokenKind::Str(" hello".into()));
        assert_eq!(toks[5], TokenKind::BracketClose);
        assert_eq!(toks[6], TokenKind::KwFn);
    }

    #[test]
    fn inner_doc_comment_expands_with_bang() {
        let toks = lex_all("x //! inner\n");
        assert_eq!(toks[1], TokenKind::Hash);
        assert_eq!(toks[2], TokenKind::Bang);
        assert_eq!(toks[3], TokenKind::BracketOpen);
    }

    #[test]
    fn shebang_is_skipped() {
        assert_eq!(lex_all("#!/usr/bin/env run\nfn"), vec![TokenKind::KwFn]);
    }

    #[test]
    fn file_start_inner_attribute() {
        let toks = lex_all("#![allow]");
        assert_eq!(toks[0], TokenKind::Hash);
        assert_eq!(toks[1], TokenKind::Bang);
        assert_eq!(toks[2], TokenKind::BracketOpen);
    }

    #[test]
    fn bom_is_consumed() {
        let mut src = vec![0xEF, 0xBB, 0xBF];
        src.extend_from_slice(b"fn");
        let mut lexer = Lexer::new("t.rs", src, Edition::E2015);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::KwFn);
    }

    #[test]
    fn crlf_collapses() {
        let toks = lex_all("a\r\nb");
        assert_eq!(toks, vec![ident("a"), ident("b")]);
        let mut lexer = Lexer::new("t.rs", "a\r\nb", Edition::E2015);
        lexer.next_token().unwrap();
        let b = lexer.next_token().unwrap();
        assert_eq!(b.span.start.line, 2);
    }

    #[test]
    fn edition_keywords_differ() {
        assert_eq!(lex_all_edition("dyn", Edition::E2015), vec![ident("dyn")]);
        assert_eq!(
            lex_all_edition("dyn", Edition::E2018),
            vec![TokenKind::KwDyn]
        );
    }

    #[test]
    fn unterminated_string_fails() {
        let mut lexer = Lexer::new("t.rs", "\"abc", Edition::E2015);
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn unknown_suffix_fails() {
        let mut lexer = Lexer::new("t.rs", "1q32", Edition::E2015);
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn bad_char_fails() {
        let mut lexer = Lexer::new("t.rs", "\u{1}", Edition::E2015);
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn find_operator_resolves_spellings() {
        assert_eq!(find_operator("=>"), Some(TokenKind::FatArrow));
        assert_eq!(find_operator("_"), Some(TokenKind::Underscore));
        assert_eq!(find_operator("§"), None);
    }

    #[test]
    fn trailing_identifier_at_eof_survives() {
        assert_eq!(lex_all("foo"), vec![ident("foo")]);
    }
}
