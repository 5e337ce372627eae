//! Recursive-descent parsing of a token sequence into a [`Module`].
//!
//! The grammar, with one token of lookahead and no backtracking:
//!
//! ```text
//! module    := stmt*
//! stmt      := expr ';'
//! expr      := INT | STR | ID | call | define
//! call      := '(' expr call-tail
//! call-tail := ')' | expr+ ')'
//! define    := 'def' expr expr
//! ```
//!
//! A call whose head is the identifier `add` or `sub` becomes a [`ExprKind::BinOp`]
//! and must have exactly two operands.
use core::fmt;

use crate::lexer::{SourceLocation, Token, TokenKind};

pub use ast::{BinOpKind, Expr, ExprKind, Ident, Module, Stmt};

pub mod ast;

/// How many calls and definitions may enclose one another
pub const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    /// No expression where one was needed
    Generic,
    /// A `)` with no matching `(`
    NoLPar,
    /// A `(` with no matching `)`
    NoRPar,
    TooManyBinopOperands,
    TooFewBinopOperands,
    MissingSemicolon,
    IntOutOfRange,
    InvalidDefineTarget,
    /// More than [`MAX_NESTING`] calls or definitions inside each other
    TooDeep,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Generic => "expected an expression",
            Self::NoLPar => "unmatched closing parenthesis",
            Self::NoRPar => "missing closing parenthesis",
            Self::TooManyBinopOperands => "too many operands for builtin operator",
            Self::TooFewBinopOperands => "too few operands for builtin operator",
            Self::MissingSemicolon => "expected `;` after statement",
            Self::IntOutOfRange => "integer literal out of range",
            Self::InvalidDefineTarget => "`def` target must be an identifier",
            Self::TooDeep => "expression nested too deeply",
        })
    }
}

/// The first thing that went wrong while parsing, with the token it went wrong at.
///
/// Failures at the end of input point at the last token.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} at {location}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub location: SourceLocation,
    pub token: Option<Token>,
}

impl ParseError {
    fn at(kind: ParseErrorKind, token: &Token) -> Self {
        Self {
            kind,
            location: token.location,
            token: Some(token.clone()),
        }
    }
}

type ParseResult<T> = Result<T, ParseError>;

#[tracing::instrument(level = "debug", skip_all, fields(tokens = tokens.len()))]
pub fn parse(tokens: &[Token]) -> ParseResult<Module> {
    let module = Parser::new(tokens).module()?;
    tracing::debug!(stmts = module.stmts.len(), "parsed module");
    Ok(module)
}

struct Parser<'t> {
    tokens: &'t [Token],
    current: usize,
    /// How many calls are open around the cursor
    depth: usize,
    /// How many calls and definitions are open around the cursor
    nesting: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            current: 0,
            depth: 0,
            nesting: 0,
        }
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.current)
    }

    fn bump(&mut self) {
        self.current += 1;
    }

    fn location(&self) -> SourceLocation {
        self.peek().map_or(SourceLocation::INVALID, |token| token.location)
    }

    /// Open one more level of nesting at the current token
    fn enter(&mut self) -> ParseResult<()> {
        if self.nesting >= MAX_NESTING {
            return Err(match self.peek() {
                Some(token) => ParseError::at(ParseErrorKind::TooDeep, token),
                None => self.at_end(ParseErrorKind::TooDeep),
            });
        }
        self.nesting += 1;
        Ok(())
    }

    /// An error pointing at the last token, for when the input ran out
    fn at_end(&self, kind: ParseErrorKind) -> ParseError {
        match self.tokens.last() {
            Some(token) => ParseError::at(kind, token),
            None => ParseError {
                kind,
                location: SourceLocation::INVALID,
                token: None,
            },
        }
    }

    fn module(&mut self) -> ParseResult<Module> {
        let location = self.location();
        let mut stmts = vec![];
        while self.peek().is_some() {
            stmts.push(self.stmt()?);
        }
        Ok(Module { location, stmts })
    }

    fn stmt(&mut self) -> ParseResult<Stmt> {
        let expr = self.expr()?;
        match self.peek() {
            Some(token) if token.kind == TokenKind::Semicolon => self.bump(),
            Some(token) => return Err(ParseError::at(ParseErrorKind::MissingSemicolon, token)),
            None => return Err(self.at_end(ParseErrorKind::MissingSemicolon)),
        }
        Ok(Stmt {
            location: expr.location,
            expr,
        })
    }

    fn expr(&mut self) -> ParseResult<Expr> {
        let Some(token) = self.peek() else {
            // running out of input inside a call means the ( was never closed
            return Err(self.at_end(if self.depth > 0 {
                ParseErrorKind::NoRPar
            } else {
                ParseErrorKind::Generic
            }));
        };

        match token.kind {
            TokenKind::LPar => self.call(),
            TokenKind::Def => self.define(),
            TokenKind::RPar => Err(ParseError::at(ParseErrorKind::NoLPar, token)),
            TokenKind::Int => {
                let value = token
                    .text
                    .parse::<i32>()
                    .map_err(|_| ParseError::at(ParseErrorKind::IntOutOfRange, token))?;
                self.bump();
                Ok(Expr::at(token.location, ExprKind::Int(value)))
            }
            TokenKind::Str => {
                self.bump();
                Ok(Expr::at(token.location, ExprKind::Str(token.text.clone())))
            }
            TokenKind::Id => {
                self.bump();
                Ok(Expr::at(token.location, ExprKind::Id(ident(token))))
            }
            // a statement terminator where an expression should start
            TokenKind::Semicolon => Err(ParseError::at(ParseErrorKind::Generic, token)),
        }
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let location = self.location();
        self.enter()?;
        // consume the (
        self.bump();
        self.depth += 1;

        let callee = self.expr()?;
        let builtin = match &callee.kind {
            ExprKind::Id(ident) => ident.builtin(),
            _ => None,
        };

        let expr = match builtin {
            Some(op) => self.binop(location, op)?,
            None => {
                let mut args = vec![];
                loop {
                    match self.peek() {
                        Some(token) if token.kind == TokenKind::RPar => {
                            self.bump();
                            break;
                        }
                        Some(_) => args.push(self.expr()?),
                        None => return Err(self.at_end(ParseErrorKind::NoRPar)),
                    }
                }
                Expr::at(
                    location,
                    ExprKind::Call {
                        callee: Box::new(callee),
                        args,
                    },
                )
            }
        };

        self.depth -= 1;
        self.nesting -= 1;
        Ok(expr)
    }

    fn binop_operand(&mut self) -> ParseResult<Expr> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::RPar => {
                Err(ParseError::at(ParseErrorKind::TooFewBinopOperands, token))
            }
            _ => self.expr(),
        }
    }

    fn binop(&mut self, location: SourceLocation, op: BinOpKind) -> ParseResult<Expr> {
        let lhs = self.binop_operand()?;
        let rhs = self.binop_operand()?;

        match self.peek() {
            Some(token) if token.kind == TokenKind::RPar => self.bump(),
            Some(token) => {
                return Err(ParseError::at(
                    ParseErrorKind::TooManyBinopOperands,
                    token,
                ))
            }
            None => return Err(self.at_end(ParseErrorKind::NoRPar)),
        }

        Ok(Expr::at(
            location,
            ExprKind::BinOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        ))
    }

    fn define(&mut self) -> ParseResult<Expr> {
        let location = self.location();
        self.enter()?;
        // consume def
        self.bump();

        let target = self.peek();
        let dst = match self.expr()?.kind {
            ExprKind::Id(ident) => ident,
            _ => {
                return Err(match target {
                    Some(token) => ParseError::at(ParseErrorKind::InvalidDefineTarget, token),
                    None => self.at_end(ParseErrorKind::InvalidDefineTarget),
                })
            }
        };
        let src = self.expr()?;
        self.nesting -= 1;

        Ok(Expr::at(
            location,
            ExprKind::Assign {
                dst,
                src: Box::new(src),
            },
        ))
    }
}

fn ident(token: &Token) -> Ident {
    Ident {
        location: token.location,
        name: token.text.clone(),
    }
}
