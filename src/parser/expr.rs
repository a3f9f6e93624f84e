//! Expression, statement, and block parsing.
//!
//! Precedence ladder, loosest to tightest: assignment, range, logical-or,
//! logical-and, equality, comparison, bitor, bitxor, bitand, shift,
//! add/sub, `as`-cast, mul/div/mod, unary, call/field/index/method, atoms.

use crate::ast::{
    BinOp, Block, Closure, Expr, ExprKind, ExprRef, FlowKind, Literal, MacroInvocation, MatchArm,
    Stmt, UniOp,
};
use crate::error::PResult;
use crate::hygiene::Ident;
use crate::stream::TokenSource;
use crate::token::{Fragment, Token, TokenKind};
use crate::tokentree::Delim;

use super::item::ItemParsing;
use super::paths::{PathGenericMode, PathParsing};
use super::pattern::PatternParsing;
use super::tt::TtParsing;
use super::types::TypeParsing;
use super::Parser;

/// Can this token begin an expression? Used for optional-operand decisions
/// and for the macro matcher's `expr`-fragment gate.
pub fn tok_starts_expr(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Ident(_)
            | TokenKind::Integer { .. }
            | TokenKind::Float { .. }
            | TokenKind::Str(_)
            | TokenKind::ByteStr(_)
            | TokenKind::CharLit(_)
            | TokenKind::ByteLit(_)
            | TokenKind::Interpolated(Fragment::Expr(_))
            | TokenKind::Interpolated(Fragment::Block(_))
            | TokenKind::Interpolated(Fragment::Path(_))
            | TokenKind::DoubleColon
            | TokenKind::KwSelf
            | TokenKind::KwSuper
            | TokenKind::KwCrate
            | TokenKind::Lt
            | TokenKind::Shl
            | TokenKind::ParenOpen
            | TokenKind::BracketOpen
            | TokenKind::BraceOpen
            | TokenKind::KwIf
            | TokenKind::KwMatch
            | TokenKind::KwLoop
            | TokenKind::KwWhile
            | TokenKind::KwFor
            | TokenKind::KwUnsafe
            | TokenKind::KwMove
            | TokenKind::KwReturn
            | TokenKind::KwBreak
            | TokenKind::KwContinue
            | TokenKind::KwBox
            | TokenKind::KwTrue
            | TokenKind::KwFalse
            | TokenKind::Dash
            | TokenKind::Bang
            | TokenKind::Star
            | TokenKind::Amp
            | TokenKind::AmpAmp
            | TokenKind::Pipe
            | TokenKind::PipePipe
            | TokenKind::Lifetime(_)
            | TokenKind::DotDot
            | TokenKind::DotDotEq
            | TokenKind::DotDotDot
    )
}

pub trait ExprParsing {
    /// Parse a full expression. Consumes exactly the expression's tokens.
    fn parse_expr(&mut self) -> PResult<ExprRef>;
    /// Parse a braced block; the `{` must be next.
    fn parse_block(&mut self) -> PResult<Block>;
    /// Parse one statement (`let`, item, or expression statement).
    fn parse_stmt(&mut self) -> PResult<Stmt>;
}

impl<S: TokenSource> ExprParsing for Parser<S> {
    fn parse_expr(&mut self) -> PResult<ExprRef> {
        self.parse_expr_assign()
    }

    fn parse_block(&mut self) -> PResult<Block> {
        let start = self.span();
        self.expect(&TokenKind::BraceOpen)?;
        self.allow_struct_literal(|p| {
            let mut stmts = Vec::new();
            let mut tail = None;
            loop {
                if matches!(p.peek(0)?, TokenKind::BraceClose) {
                    break;
                }
                let kind = p.peek(0)?;
                if p.stmt_starts_item(&kind)? {
                    let items = p.parse_item()?;
                    stmts.extend(items.into_iter().map(|i| Stmt::Item(Box::new(i))));
                    continue;
                }
                match p.parse_stmt()? {
                    Stmt::Expr {
                        expr,
                        has_semi: false,
                    } if matches!(p.peek(0)?, TokenKind::BraceClose) => {
                        tail = Some(expr);
                        break;
                    }
                    stmt => stmts.push(stmt),
                }
            }
            p.expect(&TokenKind::BraceClose)?;
            Ok(Block {
                is_unsafe: false,
                stmts,
                tail,
                span: start.to(p.span()),
            })
        })
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        match self.peek(0)? {
            TokenKind::Interpolated(Fragment::Stmt(_)) => {
                let tok = self.get()?;
                if let TokenKind::Interpolated(Fragment::Stmt(s)) = tok.kind {
                    return Ok((*s).clone());
                }
                unreachable!()
            }
            TokenKind::KwLet => {
                self.get()?;
                let pat = self.parse_pattern(false)?;
                let ty = if self.consume_if(&TokenKind::Colon)? {
                    Some(Box::new(self.parse_type()?))
                } else {
                    None
                };
                let init = if self.consume_if(&TokenKind::Eq)? {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                self.expect(&TokenKind::Semicolon)?;
                Ok(Stmt::Let {
                    pat: Box::new(pat),
                    ty,
                    init,
                })
            }
            kind if self.stmt_starts_item(&kind)? => {
                let mut items = self.parse_item()?;
                if items.len() != 1 {
                    return Err(crate::error::ParseError::todo(
                        "grouped use as a captured statement",
                        self.span(),
                    ));
                }
                Ok(Stmt::Item(Box::new(items.remove(0))))
            }
            _ => {
                let expr = self.parse_expr()?;
                let has_semi = self.consume_if(&TokenKind::Semicolon)?;
                if !has_semi && !matches!(self.peek(0)?, TokenKind::BraceClose) {
                    // Block-like expressions stand as statements without a
                    // semicolon; anything else must end with one.
                    if !is_block_like(&expr.kind) {
                        let tok = self.get()?;
                        return Err(self.err_unexpected(tok, "`;`"));
                    }
                }
                Ok(Stmt::Expr { expr, has_semi })
            }
        }
    }
}

fn is_block_like(kind: &ExprKind) -> bool {
    matches!(
        kind,
        ExprKind::Block(_)
            | ExprKind::If { .. }
            | ExprKind::IfLet { .. }
            | ExprKind::Match { .. }
            | ExprKind::Loop { .. }
            | ExprKind::While { .. }
            | ExprKind::WhileLet { .. }
            | ExprKind::ForLoop { .. }
    )
}

impl<S: TokenSource> Parser<S> {
    fn stmt_starts_item(&mut self, kind: &TokenKind) -> PResult<bool> {
        Ok(match kind {
            TokenKind::KwFn
            | TokenKind::KwStruct
            | TokenKind::KwEnum
            | TokenKind::KwTrait
            | TokenKind::KwImpl
            | TokenKind::KwMod
            | TokenKind::KwUse
            | TokenKind::KwStatic
            | TokenKind::KwType
            | TokenKind::KwPub
            | TokenKind::KwExtern => true,
            TokenKind::KwConst => {
                matches!(self.peek(1)?, TokenKind::Ident(_) | TokenKind::KwFn)
            }
            TokenKind::KwUnsafe => {
                matches!(self.peek(1)?, TokenKind::KwFn | TokenKind::KwImpl | TokenKind::KwTrait)
            }
            TokenKind::Ident(i) if i.name.is("macro_rules") => {
                matches!(self.peek(1)?, TokenKind::Bang)
            }
            _ => false,
        })
    }

    // ---- precedence ladder ----------------------------------------------

    fn parse_expr_assign(&mut self) -> PResult<ExprRef> {
        let start = self.span();
        let lhs = self.parse_expr_range()?;
        let op = match self.peek(0)? {
            TokenKind::Eq => None,
            TokenKind::PlusEq => Some(BinOp::Add),
            TokenKind::DashEq => Some(BinOp::Sub),
            TokenKind::StarEq => Some(BinOp::Mul),
            TokenKind::SlashEq => Some(BinOp::Div),
            TokenKind::PercentEq => Some(BinOp::Mod),
            TokenKind::AmpEq => Some(BinOp::BitAnd),
            TokenKind::PipeEq => Some(BinOp::BitOr),
            TokenKind::CaretEq => Some(BinOp::BitXor),
            TokenKind::ShlEq => Some(BinOp::Shl),
            TokenKind::ShrEq => Some(BinOp::Shr),
            _ => return Ok(lhs),
        };
        self.get()?;
        // Right associative: `a = b = c` parses as `a = (b = c)`.
        let value = self.parse_expr_assign()?;
        Ok(Expr::new(
            ExprKind::Assign {
                op,
                slot: lhs,
                value,
            },
            start.to(self.span()),
        ))
    }

    fn parse_expr_range(&mut self) -> PResult<ExprRef> {
        let start_span = self.span();
        let start = match self.peek(0)? {
            TokenKind::DotDot | TokenKind::DotDotEq | TokenKind::DotDotDot => None,
            _ => Some(self.parse_expr_or()?),
        };
        let inclusive = match self.peek(0)? {
            TokenKind::DotDot => false,
            TokenKind::DotDotEq | TokenKind::DotDotDot => true,
            _ => {
                return Ok(start.expect("range start parsed"));
            }
        };
        self.get()?;
        let end = if tok_starts_expr(&self.peek(0)?) {
            Some(self.parse_expr_or()?)
        } else {
            None
        };
        Ok(Expr::new(
            ExprKind::Range {
                start,
                end,
                inclusive,
            },
            start_span.to(self.span()),
        ))
    }

    fn parse_expr_or(&mut self) -> PResult<ExprRef> {
        let start = self.span();
        let mut left = self.parse_expr_and()?;
        while self.consume_if(&TokenKind::PipePipe)? {
            let right = self.parse_expr_and()?;
            left = Expr::new(
                ExprKind::BinOp {
                    op: BinOp::Or,
                    left,
                    right,
                },
                start.to(self.span()),
            );
        }
        Ok(left)
    }

    fn parse_expr_and(&mut self) -> PResult<ExprRef> {
        let start = self.span();
        let mut left = self.parse_expr_equality()?;
        while self.consume_if(&TokenKind::AmpAmp)? {
            let right = self.parse_expr_equality()?;
            left = Expr::new(
                ExprKind::BinOp {
                    op: BinOp::And,
                    left,
                    right,
                },
                start.to(self.span()),
            );
        }
        Ok(left)
    }

    fn parse_expr_equality(&mut self) -> PResult<ExprRef> {
        let start = self.span();
        let mut left = self.parse_expr_cmp()?;
        loop {
            let op = match self.peek(0)? {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::BangEq => BinOp::Ne,
                _ => return Ok(left),
            };
            self.get()?;
            let right = self.parse_expr_cmp()?;
            left = Expr::new(
                ExprKind::BinOp { op, left, right },
                start.to(self.span()),
            );
        }
    }

    fn parse_expr_cmp(&mut self) -> PResult<ExprRef> {
        let start = self.span();
        let mut left = self.parse_expr_bitor()?;
        loop {
            let op = match self.peek(0)? {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Ge => BinOp::Ge,
                _ => return Ok(left),
            };
            self.get()?;
            let right = self.parse_expr_bitor()?;
            left = Expr::new(
                ExprKind::BinOp { op, left, right },
                start.to(self.span()),
            );
        }
    }

    fn parse_expr_bitor(&mut self) -> PResult<ExprRef> {
        let start = self.span();
        let mut left = self.parse_expr_bitxor()?;
        while matches!(self.peek(0)?, TokenKind::Pipe) {
            self.get()?;
            let right = self.parse_expr_bitxor()?;
            left = Expr::new(
                ExprKind::BinOp {
                    op: BinOp::BitOr,
                    left,
                    right,
                },
                start.to(self.span()),
            );
        }
        Ok(left)
    }

    fn parse_expr_bitxor(&mut self) -> PResult<ExprRef> {
        let start = self.span();
        let mut left = self.parse_expr_bitand()?;
        while self.consume_if(&TokenKind::Caret)? {
            let right = self.parse_expr_bitand()?;
            left = Expr::new(
                ExprKind::BinOp {
                    op: BinOp::BitXor,
                    left,
                    right,
                },
                start.to(self.span()),
            );
        }
        Ok(left)
    }

    fn parse_expr_bitand(&mut self) -> PResult<ExprRef> {
        let start = self.span();
        let mut left = self.parse_expr_shift()?;
        while matches!(self.peek(0)?, TokenKind::Amp) {
            self.get()?;
            let right = self.parse_expr_shift()?;
            left = Expr::new(
                ExprKind::BinOp {
                    op: BinOp::BitAnd,
                    left,
                    right,
                },
                start.to(self.span()),
            );
        }
        Ok(left)
    }

    fn parse_expr_shift(&mut self) -> PResult<ExprRef> {
        let start = self.span();
        let mut left = self.parse_expr_add()?;
        loop {
            let op = match self.peek(0)? {
                TokenKind::Shl => BinOp::Shl,
                TokenKind::Shr => BinOp::Shr,
                _ => return Ok(left),
            };
            self.get()?;
            let right = self.parse_expr_add()?;
            left = Expr::new(
                ExprKind::BinOp { op, left, right },
                start.to(self.span()),
            );
        }
    }

    fn parse_expr_add(&mut self) -> PResult<ExprRef> {
        let start = self.span();
        let mut left = self.parse_expr_cast()?;
        loop {
            let op = match self.peek(0)? {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Dash => BinOp::Sub,
                _ => return Ok(left),
            };
            self.get()?;
            let right = self.parse_expr_cast()?;
            left = Expr::new(
                ExprKind::BinOp { op, left, right },
                start.to(self.span()),
            );
        }
    }

    fn parse_expr_cast(&mut self) -> PResult<ExprRef> {
        let start = self.span();
        let mut value = self.parse_expr_mul()?;
        while self.consume_if(&TokenKind::KwAs)? {
            let ty = self.parse_type()?;
            value = Expr::new(
                ExprKind::Cast {
                    value,
                    ty: Box::new(ty),
                },
                start.to(self.span()),
            );
        }
        Ok(value)
    }

    fn parse_expr_mul(&mut self) -> PResult<ExprRef> {
        let start = self.span();
        let mut left = self.parse_expr_unary()?;
        loop {
            let op = match self.peek(0)? {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => return Ok(left),
            };
            self.get()?;
            let right = self.parse_expr_unary()?;
            left = Expr::new(
                ExprKind::BinOp { op, left, right },
                start.to(self.span()),
            );
        }
    }

    fn parse_expr_unary(&mut self) -> PResult<ExprRef> {
        let start = self.span();
        let op = match self.peek(0)? {
            TokenKind::Dash => Some(UniOp::Neg),
            TokenKind::Bang => Some(UniOp::Not),
            TokenKind::KwBox => Some(UniOp::Box),
            TokenKind::Star => {
                self.get()?;
                let value = self.parse_expr_unary()?;
                return Ok(Expr::new(ExprKind::Deref(value), start.to(self.span())));
            }
            TokenKind::Amp => {
                self.get()?;
                let op = if self.consume_if(&TokenKind::KwMut)? {
                    UniOp::BorrowMut
                } else {
                    UniOp::Borrow
                };
                let value = self.parse_expr_unary()?;
                return Ok(Expr::new(
                    ExprKind::UniOp { op, value },
                    start.to(self.span()),
                ));
            }
            TokenKind::AmpAmp => {
                // `&&x` is a double shared borrow.
                self.get()?;
                let op = if self.consume_if(&TokenKind::KwMut)? {
                    UniOp::BorrowMut
                } else {
                    UniOp::Borrow
                };
                let value = self.parse_expr_unary()?;
                let inner = Expr::new(ExprKind::UniOp { op, value }, start.to(self.span()));
                return Ok(Expr::new(
                    ExprKind::UniOp {
                        op: UniOp::Borrow,
                        value: inner,
                    },
                    start.to(self.span()),
                ));
            }
            _ => None,
        };
        if let Some(op) = op {
            self.get()?;
            let value = self.parse_expr_unary()?;
            return Ok(Expr::new(
                ExprKind::UniOp { op, value },
                start.to(self.span()),
            ));
        }
        self.parse_expr_postfix()
    }

    fn parse_expr_postfix(&mut self) -> PResult<ExprRef> {
        let start = self.span();
        let mut expr = self.parse_expr_atom()?;
        loop {
            match self.peek(0)? {
                TokenKind::ParenOpen => {
                    self.get()?;
                    let args = self.parse_call_args()?;
                    expr = Expr::new(
                        ExprKind::CallObject { obj: expr, args },
                        start.to(self.span()),
                    );
                }
                TokenKind::BracketOpen => {
                    self.get()?;
                    let idx = self.allow_struct_literal(|p| p.parse_expr())?;
                    self.expect(&TokenKind::BracketClose)?;
                    expr = Expr::new(
                        ExprKind::Index { obj: expr, idx },
                        start.to(self.span()),
                    );
                }
                TokenKind::Question => {
                    self.get()?;
                    expr = Expr::new(
                        ExprKind::UniOp {
                            op: UniOp::Try,
                            value: expr,
                        },
                        start.to(self.span()),
                    );
                }
                TokenKind::Dot => {
                    self.get()?;
                    let tok = self.get()?;
                    match tok.kind {
                        TokenKind::Integer { value, .. } => {
                            // Tuple index.
                            expr = Expr::new(
                                ExprKind::Field {
                                    obj: expr,
                                    name: Ident::plain(&value.to_string()),
                                },
                                start.to(self.span()),
                            );
                        }
                        TokenKind::Ident(name) => {
                            // Method call needs `(`; turbofish allowed.
                            let mut params = crate::ast::PathParams::default();
                            if matches!(self.peek(0)?, TokenKind::DoubleColon)
                                && matches!(self.peek(1)?, TokenKind::Lt | TokenKind::Shl)
                            {
                                self.get()?;
                                self.consume_lt()?;
                                params = self.parse_path_params()?;
                            }
                            if self.consume_if(&TokenKind::ParenOpen)? {
                                let args = self.parse_call_args()?;
                                expr = Expr::new(
                                    ExprKind::CallMethod {
                                        obj: expr,
                                        method: name,
                                        params,
                                        args,
                                    },
                                    start.to(self.span()),
                                );
                            } else {
                                expr = Expr::new(
                                    ExprKind::Field {
                                        obj: expr,
                                        name,
                                    },
                                    start.to(self.span()),
                                );
                            }
                        }
                        other => {
                            return Err(self.err_unexpected(
                                Token::new(other, tok.span),
                                "field name or method",
                            ))
                        }
                    }
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Comma-separated arguments, consuming the closing `)`.
    fn parse_call_args(&mut self) -> PResult<Vec<ExprRef>> {
        self.allow_struct_literal(|p| {
            let mut args = Vec::new();
            while !matches!(p.peek(0)?, TokenKind::ParenClose) {
                args.push(p.parse_expr()?);
                if !p.consume_if(&TokenKind::Comma)? {
                    break;
                }
            }
            p.expect(&TokenKind::ParenClose)?;
            Ok(args)
        })
    }

    fn parse_expr_atom(&mut self) -> PResult<ExprRef> {
        let start = self.span();
        match self.peek(0)? {
            TokenKind::Interpolated(Fragment::Expr(_)) => {
                let tok = self.get()?;
                if let TokenKind::Interpolated(Fragment::Expr(e)) = tok.kind {
                    return Ok(e);
                }
                unreachable!()
            }
            TokenKind::Interpolated(Fragment::Block(_)) => {
                let tok = self.get()?;
                if let TokenKind::Interpolated(Fragment::Block(b)) = tok.kind {
                    return Ok(Expr::new(
                        ExprKind::Block(Box::new((*b).clone())),
                        tok.span,
                    ));
                }
                unreachable!()
            }
            TokenKind::Integer { .. }
            | TokenKind::Float { .. }
            | TokenKind::Str(_)
            | TokenKind::ByteStr(_)
            | TokenKind::CharLit(_)
            | TokenKind::ByteLit(_)
            | TokenKind::KwTrue
            | TokenKind::KwFalse => {
                let tok = self.get()?;
                let lit = match tok.kind {
                    TokenKind::Integer { value, suffix } => Literal::Integer {
                        value,
                        ty: suffix,
                    },
                    TokenKind::Float { value, suffix } => Literal::Float { value, ty: suffix },
                    TokenKind::Str(s) => Literal::Str(s),
                    TokenKind::ByteStr(b) => Literal::ByteStr(b),
                    TokenKind::CharLit(c) => Literal::CharLit(c),
                    TokenKind::ByteLit(b) => Literal::ByteLit(b),
                    TokenKind::KwTrue => Literal::Bool(true),
                    TokenKind::KwFalse => Literal::Bool(false),
                    _ => unreachable!(),
                };
                Ok(Expr::new(ExprKind::Literal(lit), tok.span))
            }
            TokenKind::ParenOpen => {
                self.get()?;
                self.allow_struct_literal(|p| {
                    if p.consume_if(&TokenKind::ParenClose)? {
                        return Ok(Expr::unit(start.to(p.span())));
                    }
                    let first = p.parse_expr()?;
                    if p.consume_if(&TokenKind::Comma)? {
                        let mut items = vec![first];
                        while !matches!(p.peek(0)?, TokenKind::ParenClose) {
                            items.push(p.parse_expr()?);
                            if !p.consume_if(&TokenKind::Comma)? {
                                break;
                            }
                        }
                        p.expect(&TokenKind::ParenClose)?;
                        Ok(Expr::new(ExprKind::Tuple(items), start.to(p.span())))
                    } else {
                        p.expect(&TokenKind::ParenClose)?;
                        // Grouping parens are transparent.
                        Ok(first)
                    }
                })
            }
            TokenKind::BracketOpen => {
                self.get()?;
                self.allow_struct_literal(|p| {
                    if p.consume_if(&TokenKind::BracketClose)? {
                        return Ok(Expr::new(
                            ExprKind::ArrayList(Vec::new()),
                            start.to(p.span()),
                        ));
                    }
                    let first = p.parse_expr()?;
                    if p.consume_if(&TokenKind::Semicolon)? {
                        let count = p.parse_expr()?;
                        p.expect(&TokenKind::BracketClose)?;
                        Ok(Expr::new(
                            ExprKind::ArraySized {
                                value: first,
                                count,
                            },
                            start.to(p.span()),
                        ))
                    } else {
                        let mut items = vec![first];
                        while p.consume_if(&TokenKind::Comma)? {
                            if matches!(p.peek(0)?, TokenKind::BracketClose) {
                                break;
                            }
                            items.push(p.parse_expr()?);
                        }
                        p.expect(&TokenKind::BracketClose)?;
                        Ok(Expr::new(ExprKind::ArrayList(items), start.to(p.span())))
                    }
                })
            }
            TokenKind::BraceOpen => {
                let block = self.parse_block()?;
                Ok(Expr::new(
                    ExprKind::Block(Box::new(block)),
                    start.to(self.span()),
                ))
            }
            TokenKind::KwUnsafe => {
                self.get()?;
                let mut block = self.parse_block()?;
                block.is_unsafe = true;
                Ok(Expr::new(
                    ExprKind::Block(Box::new(block)),
                    start.to(self.span()),
                ))
            }
            TokenKind::KwIf => self.parse_expr_if(),
            TokenKind::KwMatch => self.parse_expr_match(),
            TokenKind::KwLoop => self.parse_expr_loop(None),
            TokenKind::KwWhile => self.parse_expr_while(None),
            TokenKind::KwFor => self.parse_expr_for(None),
            TokenKind::Lifetime(_) => {
                let tok = self.get()?;
                let label = match tok.kind {
                    TokenKind::Lifetime(i) => i,
                    _ => unreachable!(),
                };
                self.expect(&TokenKind::Colon)?;
                match self.peek(0)? {
                    TokenKind::KwLoop => self.parse_expr_loop(Some(label)),
                    TokenKind::KwWhile => self.parse_expr_while(Some(label)),
                    TokenKind::KwFor => self.parse_expr_for(Some(label)),
                    _ => {
                        let tok = self.get()?;
                        Err(self.err_unexpected(tok, "`loop`, `while`, or `for` after label"))
                    }
                }
            }
            TokenKind::KwReturn | TokenKind::KwBreak | TokenKind::KwContinue => {
                let tok = self.get()?;
                let kind = match tok.kind {
                    TokenKind::KwReturn => FlowKind::Return,
                    TokenKind::KwBreak => FlowKind::Break,
                    TokenKind::KwContinue => FlowKind::Continue,
                    _ => unreachable!(),
                };
                let label = if kind != FlowKind::Return {
                    if let TokenKind::Lifetime(_) = self.peek(0)? {
                        let tok = self.get()?;
                        match tok.kind {
                            TokenKind::Lifetime(i) => Some(i),
                            _ => unreachable!(),
                        }
                    } else {
                        None
                    }
                } else {
                    None
                };
                let value = if kind != FlowKind::Continue && tok_starts_expr(&self.peek(0)?) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                Ok(Expr::new(
                    ExprKind::Flow { kind, label, value },
                    start.to(self.span()),
                ))
            }
            TokenKind::KwMove | TokenKind::Pipe | TokenKind::PipePipe => self.parse_closure(),
            _ => self.parse_expr_path_atom(),
        }
    }

    /// Atoms that begin with a path: named values, calls, struct literals,
    /// and macro invocations.
    fn parse_expr_path_atom(&mut self) -> PResult<ExprRef> {
        let start = self.span();
        let path = self.parse_path(PathGenericMode::Expr)?;
        match self.peek(0)? {
            TokenKind::Bang => {
                self.get()?;
                let mac = self.parse_macro_invocation_tail(path, start)?;
                Ok(Expr::new(
                    ExprKind::Macro(Box::new(mac)),
                    start.to(self.span()),
                ))
            }
            TokenKind::ParenOpen => {
                self.get()?;
                let args = self.parse_call_args()?;
                Ok(Expr::new(
                    ExprKind::CallPath { path, args },
                    start.to(self.span()),
                ))
            }
            TokenKind::BraceOpen if !self.lex.state.disallow_struct_literal => {
                self.get()?;
                self.allow_struct_literal(|p| {
                    let mut fields = Vec::new();
                    let mut base = None;
                    loop {
                        match p.peek(0)? {
                            TokenKind::BraceClose => break,
                            TokenKind::DotDot => {
                                p.get()?;
                                base = Some(p.parse_expr()?);
                                break;
                            }
                            _ => {
                                let (name, name_span) = p.expect_ident()?;
                                let value = if p.consume_if(&TokenKind::Colon)? {
                                    p.parse_expr()?
                                } else {
                                    // Field shorthand.
                                    Expr::new(
                                        ExprKind::NamedValue(crate::ast::Path::from_ident(
                                            name.clone(),
                                            name_span,
                                        )),
                                        name_span,
                                    )
                                };
                                fields.push((name, value));
                            }
                        }
                        if !p.consume_if(&TokenKind::Comma)? {
                            break;
                        }
                    }
                    p.expect(&TokenKind::BraceClose)?;
                    Ok(Expr::new(
                        ExprKind::StructLiteral { path, fields, base },
                        start.to(p.span()),
                    ))
                })
            }
            _ => Ok(Expr::new(
                ExprKind::NamedValue(path),
                start.to(self.span()),
            )),
        }
    }

    /// After `path !`: optional ident, then one balanced token-tree group.
    pub(super) fn parse_macro_invocation_tail(
        &mut self,
        path: crate::ast::Path,
        start: crate::token::Span,
    ) -> PResult<MacroInvocation> {
        let ident = if let TokenKind::Ident(_) = self.peek(0)? {
            let (i, _) = self.expect_ident()?;
            Some(i)
        } else {
            None
        };
        let input = self.parse_tt()?;
        let delim = match &input {
            crate::tokentree::TokenTree::Group { delim, .. } => *delim,
            _ => {
                return Err(self.bug("macro invocation argument must be a delimited group"));
            }
        };
        Ok(MacroInvocation {
            path,
            ident,
            delim,
            input,
            span: start.to(self.span()),
        })
    }

    fn parse_expr_if(&mut self) -> PResult<ExprRef> {
        let start = self.span();
        self.expect(&TokenKind::KwIf)?;
        if self.consume_if(&TokenKind::KwLet)? {
            let pat = self.parse_pattern(true)?;
            self.expect(&TokenKind::Eq)?;
            let value = self.no_struct_literal(|p| p.parse_expr())?;
            let then_block = Box::new(self.parse_block()?);
            let else_block = self.parse_else_tail()?;
            Ok(Expr::new(
                ExprKind::IfLet {
                    pat: Box::new(pat),
                    value,
                    then_block,
                    else_block,
                },
                start.to(self.span()),
            ))
        } else {
            let cond = self.no_struct_literal(|p| p.parse_expr())?;
            let then_block = Box::new(self.parse_block()?);
            let else_block = self.parse_else_tail()?;
            Ok(Expr::new(
                ExprKind::If {
                    cond,
                    then_block,
                    else_block,
                },
                start.to(self.span()),
            ))
        }
    }

    fn parse_else_tail(&mut self) -> PResult<Option<ExprRef>> {
        if !self.consume_if(&TokenKind::KwElse)? {
            return Ok(None);
        }
        let span = self.span();
        match self.peek(0)? {
            TokenKind::KwIf => Ok(Some(self.parse_expr_if()?)),
            TokenKind::BraceOpen => {
                let block = self.parse_block()?;
                Ok(Some(Expr::new(
                    ExprKind::Block(Box::new(block)),
                    span.to(self.span()),
                )))
            }
            _ => {
                let tok = self.get()?;
                Err(self.err_unexpected(tok, "`if` or a block after `else`"))
            }
        }
    }

    fn parse_expr_match(&mut self) -> PResult<ExprRef> {
        let start = self.span();
        self.expect(&TokenKind::KwMatch)?;
        let value = self.no_struct_literal(|p| p.parse_expr())?;
        self.expect(&TokenKind::BraceOpen)?;
        let mut arms = Vec::new();
        while !matches!(self.peek(0)?, TokenKind::BraceClose) {
            let mut patterns = Vec::new();
            self.consume_if(&TokenKind::Pipe)?;
            loop {
                patterns.push(self.parse_pattern(false)?);
                if !self.consume_if(&TokenKind::Pipe)? {
                    break;
                }
            }
            let guard = if self.consume_if(&TokenKind::KwIf)? {
                Some(self.parse_expr()?)
            } else {
                None
            };
            self.expect(&TokenKind::FatArrow)?;
            let body = self.parse_expr()?;
            let body_is_block = is_block_like(&body.kind);
            arms.push(MatchArm {
                patterns,
                guard,
                body,
            });
            if !self.consume_if(&TokenKind::Comma)? {
                if !body_is_block && !matches!(self.peek(0)?, TokenKind::BraceClose) {
                    let tok = self.get()?;
                    return Err(self.err_unexpected(tok, "`,` between match arms"));
                }
            }
        }
        self.expect(&TokenKind::BraceClose)?;
        Ok(Expr::new(
            ExprKind::Match { value, arms },
            start.to(self.span()),
        ))
    }

    fn parse_expr_loop(&mut self, label: Option<Ident>) -> PResult<ExprRef> {
        let start = self.span();
        self.expect(&TokenKind::KwLoop)?;
        let body = Box::new(self.parse_block()?);
        Ok(Expr::new(
            ExprKind::Loop { label, body },
            start.to(self.span()),
        ))
    }

    fn parse_expr_while(&mut self, label: Option<Ident>) -> PResult<ExprRef> {
        let start = self.span();
        self.expect(&TokenKind::KwWhile)?;
        if self.consume_if(&TokenKind::KwLet)? {
            let pat = self.parse_pattern(true)?;
            self.expect(&TokenKind::Eq)?;
            let value = self.no_struct_literal(|p| p.parse_expr())?;
            let body = Box::new(self.parse_block()?);
            Ok(Expr::new(
                ExprKind::WhileLet {
                    label,
                    pat: Box::new(pat),
                    value,
                    body,
                },
                start.to(self.span()),
            ))
        } else {
            let cond = self.no_struct_literal(|p| p.parse_expr())?;
            let body = Box::new(self.parse_block()?);
            Ok(Expr::new(
                ExprKind::While { label, cond, body },
                start.to(self.span()),
            ))
        }
    }

    fn parse_expr_for(&mut self, label: Option<Ident>) -> PResult<ExprRef> {
        let start = self.span();
        self.expect(&TokenKind::KwFor)?;
        let pat = self.parse_pattern(false)?;
        self.expect(&TokenKind::KwIn)?;
        let iter = self.no_struct_literal(|p| p.parse_expr())?;
        let body = Box::new(self.parse_block()?);
        Ok(Expr::new(
            ExprKind::ForLoop {
                label,
                pat: Box::new(pat),
                iter,
                body,
            },
            start.to(self.span()),
        ))
    }

    fn parse_closure(&mut self) -> PResult<ExprRef> {
        let start = self.span();
        let is_move = self.consume_if(&TokenKind::KwMove)?;
        let mut args = Vec::new();
        if !self.consume_if(&TokenKind::PipePipe)? {
            self.expect(&TokenKind::Pipe)?;
            while !matches!(self.peek(0)?, TokenKind::Pipe) {
                let pat = self.parse_pattern(false)?;
                let ty = if self.consume_if(&TokenKind::Colon)? {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                args.push((pat, ty));
                if !self.consume_if(&TokenKind::Comma)? {
                    break;
                }
            }
            self.expect(&TokenKind::Pipe)?;
        }
        let (ret, body) = if self.consume_if(&TokenKind::RArrow)? {
            let ty = self.parse_type()?;
            let block = self.parse_block()?;
            let span = start.to(self.span());
            (
                Some(Box::new(ty)),
                Expr::new(ExprKind::Block(Box::new(block)), span),
            )
        } else {
            (None, self.parse_expr()?)
        };
        Ok(Expr::new(
            ExprKind::Closure(Box::new(Closure {
                is_move,
                args,
                ret,
                body,
            })),
            start.to(self.span()),
        ))
    }
}
