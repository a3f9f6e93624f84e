//! Front-end diagnostics.
//!
//! Every error carries a span. Parse errors unwind with `?` up to the nearest
//! statement or item boundary; macro-rule matching catches them silently
//! while speculating and reports only the last candidate's failure.

use std::fmt;

use crate::style::Style;
use crate::token::{Span, TokenKind};

pub type PResult<T> = Result<T, ParseError>;

#[derive(Debug, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ParseErrorKind {
    // Lexical
    BadChar(u32),
    UnexpectedEof,
    Unterminated(&'static str),
    BadEscape(String),
    BadUtf8,
    BadLiteral(String),

    // Syntactic
    Unexpected {
        found: TokenKind,
        expected: Vec<String>,
    },
    BugCheck(&'static str),
    Todo(String),

    // Macro engine
    MacroMatchFailed {
        macro_name: String,
    },
    FragmentParseFailed {
        fragment: &'static str,
    },
    CaptureLayerMismatch {
        name: String,
    },
    IterationCountMismatch,
    MissingCapture {
        name: String,
    },
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, span: Span) -> ParseError {
        ParseError { kind, span }
    }

    pub fn bad_char(ch: u32, span: Span) -> ParseError {
        ParseError::new(ParseErrorKind::BadChar(ch), span)
    }

    pub fn eof(span: Span) -> ParseError {
        ParseError::new(ParseErrorKind::UnexpectedEof, span)
    }

    pub fn unexpected(found: TokenKind, expected: &str, span: Span) -> ParseError {
        ParseError::new(
            ParseErrorKind::Unexpected {
                found,
                expected: vec![expected.to_string()],
            },
            span,
        )
    }

    pub fn todo(what: impl Into<String>, span: Span) -> ParseError {
        ParseError::new(ParseErrorKind::Todo(what.into()), span)
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, ParseErrorKind::UnexpectedEof)
    }

    /// Render the error with the offending source line and a caret underline.
    pub fn display_with_source(&self, source: &str) -> String {
        let line_idx = self.span.start.line.max(1) as usize - 1;
        let line = source.lines().nth(line_idx).unwrap_or("");
        let col = self.span.start.col as usize;
        let width = if self.span.end.line == self.span.start.line {
            (self.span.end.col.saturating_sub(self.span.start.col) as usize).max(1)
        } else {
            1
        };
        let underline = format!("{}{}", " ".repeat(col.min(line.len())), "^".repeat(width));

        format!(
            "{}: {}\n  {} {}\n{} {} {}\n     {} {}",
            Style::bold_red("error"),
            self.kind,
            Style::blue("-->"),
            self.span,
            Style::blue(&format!("{:4}", self.span.start.line)),
            Style::blue("|"),
            line,
            Style::blue("|"),
            Style::red(&underline),
        )
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::BadChar(ch) => match char::from_u32(*ch) {
                Some(c) => write!(f, "unexpected character `{}`", c.escape_default()),
                None => write!(f, "unexpected character U+{:04X}", ch),
            },
            ParseErrorKind::UnexpectedEof => write!(f, "unexpected end of input"),
            ParseErrorKind::Unterminated(what) => write!(f, "unterminated {}", what),
            ParseErrorKind::BadEscape(msg) => write!(f, "invalid escape: {}", msg),
            ParseErrorKind::BadUtf8 => write!(f, "invalid UTF-8 in input"),
            ParseErrorKind::BadLiteral(msg) => write!(f, "invalid literal: {}", msg),
            ParseErrorKind::Unexpected { found, expected } => {
                write!(f, "unexpected {}", found.describe())?;
                match expected.len() {
                    0 => Ok(()),
                    1 => write!(f, ", expected {}", expected[0]),
                    _ => write!(f, ", expected one of: {}", expected.join(", ")),
                }
            }
            ParseErrorKind::BugCheck(msg) => write!(f, "internal invariant violated: {}", msg),
            ParseErrorKind::Todo(what) => write!(f, "not implemented: {}", what),
            ParseErrorKind::MacroMatchFailed { macro_name } => {
                write!(f, "no rule of macro `{}` matched the input", macro_name)
            }
            ParseErrorKind::FragmentParseFailed { fragment } => {
                write!(f, "input did not parse as a `{}` fragment", fragment)
            }
            ParseErrorKind::CaptureLayerMismatch { name } => {
                write!(f, "macro capture `${}` used at the wrong repetition depth", name)
            }
            ParseErrorKind::IterationCountMismatch => {
                write!(f, "iteration count mismatch between repeated macro captures")
            }
            ParseErrorKind::MissingCapture { name } => {
                write!(f, "macro body references unknown capture `${}`", name)
            }
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.span, self.kind)
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Symbol;
    use crate::token::Position;

    fn span_on(line: u32, start: u32, end: u32) -> Span {
        Span::new(
            Symbol::intern("test.rs"),
            Position::new(line, start),
            Position::new(line, end),
        )
    }

    #[test]
    fn display_with_source_shows_line_and_underline() {
        let err = ParseError::unexpected(TokenKind::Comma, "`;`", span_on(1, 8, 14));
        let source = "let x = mortal;";
        let rendered = err.display_with_source(source);
        assert!(rendered.contains("mortal"), "missing source line: {}", rendered);
        assert!(rendered.contains("^^^^^^"), "missing underline: {}", rendered);
    }

    #[test]
    fn unexpected_lists_expectations() {
        let err = ParseError::new(
            ParseErrorKind::Unexpected {
                found: TokenKind::Comma,
                expected: vec!["`;`".into(), "`}`".into()],
            },
            span_on(1, 0, 1),
        );
        let text = format!("{}", err.kind);
        assert!(text.contains("one of"));
        assert!(text.contains("`;`"));
    }

    #[test]
    fn eof_error_is_detectable() {
        let err = ParseError::eof(span_on(3, 0, 0));
        assert!(err.is_eof());
    }
}
