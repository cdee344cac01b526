use std::fmt::Display;

use miette::{Diagnostic, Error, NamedSource, SourceSpan};
use thiserror::Error;

use crate::{
    Lexer,
    lex::{Eof, Token, TokenKind},
};

#[derive(Error, Debug, Diagnostic)]
#[error("unexpected token '{token}'")]
#[diagnostic(help("expected a number, a name, a call, `-` or a parenthesised expression"))]
pub struct UnexpectedToken {
    #[source_code]
    src: NamedSource<String>,

    #[label("here")]
    bad_bit: SourceSpan,

    pub token: String,
}

#[derive(Error, Debug, Diagnostic)]
#[error("invalid expression: unexpected '{token}'")]
#[diagnostic(help("only an operator or the end of the input may follow a complete expression"))]
pub struct TrailingInput {
    #[source_code]
    src: NamedSource<String>,

    #[label("the expression should end before this")]
    bad_bit: SourceSpan,

    pub token: String,
}

#[derive(Error, Debug, Diagnostic)]
#[error("expression nested too deeply (more than {limit} levels)")]
#[diagnostic(help("split the expression or remove redundant parentheses and signs"))]
pub struct TooDeep {
    #[source_code]
    src: NamedSource<String>,

    #[label("nesting limit reached here")]
    bad_bit: SourceSpan,

    pub limit: usize,
}

/// Deepest tree the parser builds; `check`, `eval` and printing recurse this far.
pub const MAX_DEPTH: usize = 512;

// The printed form of a tree spends up to two nested factors per level, `(` and `-`.
const MAX_NESTING: usize = 2 * MAX_DEPTH + 1;

/// An arithmetic expression tree. Names borrow from the parsed input.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<'de> {
    Literal(f64),
    Variable(&'de str),
    Negate(Box<Expr<'de>>),
    Binary {
        op: Op,
        lhs: Box<Expr<'de>>,
        rhs: Box<Expr<'de>>,
    },
    Call {
        function: &'de str,
        arguments: Vec<Expr<'de>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Subtract,
    Multiply,
    Divide,
}

pub struct Parser<'de> {
    lexer: Lexer<'de>,
    depth: usize,
}

/// Parses a whole expression; anything after it other than the end of input is an error.
pub fn parse(input: &str) -> Result<Expr<'_>, Error> {
    Parser::new(None, input).parse_expr()
}

impl<'de> Parser<'de> {
    pub fn new(filename: Option<&'de str>, whole: &'de str) -> Self {
        Parser {
            lexer: Lexer::new(filename, whole),
            depth: 0,
        }
    }

    pub fn parse_expr(mut self) -> Result<Expr<'de>, Error> {
        let (expr, _) = self.parse_within(0)?;
        match self.lexer.next() {
            Some(Ok(Token {
                kind: TokenKind::Eof,
                ..
            }))
            | None => Ok(expr),
            Some(Ok(token)) => Err(TrailingInput {
                src: self.lexer.named_source(),
                bad_bit: token.span(),
                token: token.literal.to_string(),
            }
            .into()),
            Some(Err(e)) => Err(e),
        }
    }

    fn too_deep(&self, bad_bit: SourceSpan) -> Error {
        TooDeep {
            src: self.lexer.named_source(),
            bad_bit,
            limit: MAX_DEPTH,
        }
        .into()
    }

    /// Parses operators binding at least as tightly as `min_bp`, returning the
    /// tree together with its height.
    fn parse_within(&mut self, min_bp: u8) -> Result<(Expr<'de>, usize), Error> {
        let lhs = match self.lexer.next() {
            Some(Ok(token)) => token,
            Some(Err(e)) => return Err(e),
            None => return Err(Eof::build(&self.lexer).into()),
        };

        let start = lhs.span();
        // only the success path unwinds this; an error ends the parse
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.too_deep(start));
        }

        let (mut lhs, mut height) = match lhs {
            Token {
                kind: TokenKind::Number(n),
                ..
            } => (Expr::Literal(n), 1),
            Token {
                kind: TokenKind::Ident,
                literal,
                ..
            } => {
                if matches!(
                    self.lexer.peek(),
                    Some(Ok(Token {
                        kind: TokenKind::LeftParen,
                        ..
                    }))
                ) {
                    self.lexer.next();
                    let (arguments, height) = self.parse_arguments()?;
                    (
                        Expr::Call {
                            function: literal,
                            arguments,
                        },
                        height + 1,
                    )
                } else {
                    (Expr::Variable(literal), 1)
                }
            }
            Token {
                kind: TokenKind::LeftParen,
                ..
            } => {
                let inner = self.parse_within(0)?;
                self.lexer.expect(TokenKind::RightParen, "missing )")?;
                inner
            }
            Token {
                kind: TokenKind::Minus,
                ..
            } => {
                let ((), r_bp) = prefix_binding_power();
                let (operand, height) = self.parse_within(r_bp)?;
                (Expr::Negate(Box::new(operand)), height + 1)
            }
            Token {
                kind: TokenKind::Eof,
                ..
            } => return Err(Eof::build(&self.lexer).into()),
            token => {
                return Err(UnexpectedToken {
                    src: self.lexer.named_source(),
                    bad_bit: token.span(),
                    token: token.literal.to_string(),
                }
                .into());
            }
        };

        loop {
            let (op, span) = match self.lexer.peek() {
                Some(Ok(token)) => match token.kind {
                    TokenKind::Plus => (Op::Add, token.span()),
                    TokenKind::Minus => (Op::Subtract, token.span()),
                    TokenKind::Star => (Op::Multiply, token.span()),
                    TokenKind::Slash => (Op::Divide, token.span()),
                    _ => break,
                },
                // errors are left for the caller
                _ => break,
            };

            let (l_bp, r_bp) = infix_binding_power(op);
            if l_bp < min_bp {
                break;
            }
            self.lexer.next();

            let (rhs, rhs_height) = self.parse_within(r_bp)?;
            height = height.max(rhs_height) + 1;
            if height > MAX_DEPTH {
                return Err(self.too_deep(span));
            }
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }

        if height > MAX_DEPTH {
            return Err(self.too_deep(start));
        }
        self.depth -= 1;
        log::trace!("parsed {lhs}");
        Ok((lhs, height))
    }

    fn parse_arguments(&mut self) -> Result<(Vec<Expr<'de>>, usize), Error> {
        let (first, mut height) = self.parse_within(0)?;
        let mut arguments = vec![first];
        while matches!(
            self.lexer.peek(),
            Some(Ok(Token {
                kind: TokenKind::Comma,
                ..
            }))
        ) {
            self.lexer.next();
            let (argument, argument_height) = self.parse_within(0)?;
            height = height.max(argument_height);
            arguments.push(argument);
        }
        self.lexer.expect(TokenKind::RightParen, "missing )")?;
        Ok((arguments, height))
    }
}

fn infix_binding_power(op: Op) -> (u8, u8) {
    match op {
        Op::Add | Op::Subtract => (1, 2),
        Op::Multiply | Op::Divide => (3, 4),
    }
}

// Unary minus takes a whole term: `-a * b` is `-(a * b)` but `-a - b` is `(-a) - b`.
fn prefix_binding_power() -> ((), u8) {
    let (l_bp, _) = infix_binding_power(Op::Multiply);
    ((), l_bp)
}

impl Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Op::Add => write!(f, "+"),
            Op::Subtract => write!(f, "-"),
            Op::Multiply => write!(f, "*"),
            Op::Divide => write!(f, "/"),
        }
    }
}

/// Fully parenthesised form that parses back to the same tree.
impl Display for Expr<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Literal(n) => write!(f, "{n}"),
            Expr::Variable(name) => write!(f, "{name}"),
            Expr::Negate(operand) => write!(f, "(-{operand})"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            Expr::Call {
                function,
                arguments,
            } => {
                write!(f, "{function}(")?;
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{argument}")?;
                }
                write!(f, ")")
            }
        }
    }
}
