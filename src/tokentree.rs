//! Token trees: single tokens or balanced delimiter groups.

use std::fmt;

use crate::hygiene::Hygiene;
use crate::token::{Edition, Span, Token, TokenKind};

/// Group delimiter. `None` marks a synthetic transparent group whose
/// children splice directly into the surrounding stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delim {
    Paren,
    Bracket,
    Brace,
    None,
}

impl Delim {
    pub fn open_token(self) -> Option<TokenKind> {
        match self {
            Delim::Paren => Some(TokenKind::ParenOpen),
            Delim::Bracket => Some(TokenKind::BracketOpen),
            Delim::Brace => Some(TokenKind::BraceOpen),
            Delim::None => None,
        }
    }

    pub fn close_token(self) -> Option<TokenKind> {
        match self {
            Delim::Paren => Some(TokenKind::ParenClose),
            Delim::Bracket => Some(TokenKind::BracketClose),
            Delim::Brace => Some(TokenKind::BraceClose),
            Delim::None => None,
        }
    }

    pub fn from_open(kind: &TokenKind) -> Option<Delim> {
        match kind {
            TokenKind::ParenOpen => Some(Delim::Paren),
            TokenKind::BracketOpen => Some(Delim::Bracket),
            TokenKind::BraceOpen => Some(Delim::Brace),
            _ => None,
        }
    }
}

/// Either a single token or a balanced group of child trees. A group's
/// children never contain the delimiter tokens themselves.
#[derive(Debug, Clone)]
pub enum TokenTree {
    Leaf {
        edition: Edition,
        hygiene: Hygiene,
        token: Token,
    },
    Group {
        delim: Delim,
        edition: Edition,
        hygiene: Hygiene,
        span: Span,
        children: Vec<TokenTree>,
    },
}

impl TokenTree {
    pub fn leaf(edition: Edition, hygiene: Hygiene, token: Token) -> TokenTree {
        TokenTree::Leaf {
            edition,
            hygiene,
            token,
        }
    }

    /// A synthetic transparent group.
    pub fn seq(edition: Edition, hygiene: Hygiene, children: Vec<TokenTree>) -> TokenTree {
        TokenTree::Group {
            delim: Delim::None,
            edition,
            hygiene,
            span: Span::null(),
            children,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, TokenTree::Leaf { .. })
    }

    pub fn as_token(&self) -> Option<&Token> {
        match self {
            TokenTree::Leaf { token, .. } => Some(token),
            TokenTree::Group { .. } => None,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            TokenTree::Leaf { token, .. } => token.span,
            TokenTree::Group { span, .. } => *span,
        }
    }

    pub fn edition(&self) -> Edition {
        match self {
            TokenTree::Leaf { edition, .. } | TokenTree::Group { edition, .. } => *edition,
        }
    }

    pub fn hygiene(&self) -> &Hygiene {
        match self {
            TokenTree::Leaf { hygiene, .. } | TokenTree::Group { hygiene, .. } => hygiene,
        }
    }

    /// Flatten to the token sequence the tree denotes, delimiters included.
    pub fn flatten(&self) -> Vec<Token> {
        let mut out = Vec::new();
        self.flatten_into(&mut out, true);
        out
    }

    fn flatten_into(&self, out: &mut Vec<Token>, root: bool) {
        match self {
            TokenTree::Leaf { token, .. } => out.push(token.clone()),
            TokenTree::Group {
                delim,
                span,
                children,
                ..
            } => {
                let emit = !root;
                if emit {
                    if let Some(open) = delim.open_token() {
                        out.push(Token::new(open, *span));
                    }
                }
                for child in children {
                    child.flatten_into(out, false);
                }
                if emit {
                    if let Some(close) = delim.close_token() {
                        out.push(Token::new(close, *span));
                    }
                }
            }
        }
    }
}

impl fmt::Display for TokenTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenTree::Leaf { token, .. } => write!(f, "{}", token.kind.to_source()),
            TokenTree::Group {
                delim, children, ..
            } => {
                if let Some(open) = delim.open_token() {
                    write!(f, "{}", open.to_source())?;
                }
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", child)?;
                }
                if let Some(close) = delim.close_token() {
                    write!(f, "{}", close.to_source())?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hygiene::Ident;

    fn leaf(kind: TokenKind) -> TokenTree {
        TokenTree::leaf(Edition::E2015, Hygiene::none(), Token::bare(kind))
    }

    #[test]
    fn flatten_root_group_skips_outer_delims() {
        let tt = TokenTree::Group {
            delim: Delim::Paren,
            edition: Edition::E2015,
            hygiene: Hygiene::none(),
            span: Span::null(),
            children: vec![
                leaf(TokenKind::Ident(Ident::plain("a"))),
                leaf(TokenKind::Comma),
            ],
        };
        let toks = tt.flatten();
        assert_eq!(toks.len(), 2);
    }

    #[test]
    fn flatten_nested_group_keeps_delims() {
        let inner = TokenTree::Group {
            delim: Delim::Bracket,
            edition: Edition::E2015,
            hygiene: Hygiene::none(),
            span: Span::null(),
            children: vec![leaf(TokenKind::Ident(Ident::plain("x")))],
        };
        let tt = TokenTree::seq(Edition::E2015, Hygiene::none(), vec![inner]);
        let kinds: Vec<_> = tt.flatten().into_iter().map(|t| t.kind).collect();
        assert_eq!(kinds[0], TokenKind::BracketOpen);
        assert_eq!(kinds[2], TokenKind::BracketClose);
    }

    #[test]
    fn display_renders_balanced() {
        let tt = TokenTree::Group {
            delim: Delim::Paren,
            edition: Edition::E2015,
            hygiene: Hygiene::none(),
            span: Span::null(),
            children: vec![leaf(TokenKind::Ident(Ident::plain("a")))],
        };
        assert_eq!(format!("{}", tt), "(a)");
    }
}
