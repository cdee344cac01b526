//! Tokenizer, parser and evaluator for small arithmetic expressions such as
//! `pow(x, 2) - 3 * sin(y)`.

pub mod eval;
pub mod lex;
pub mod parse;
pub mod system;

pub use eval::{CheckError, Environment, EvalError, evaluate};
pub use lex::{Lexer, Token, TokenKind, tokenize};
pub use parse::{Expr, Op, Parser, parse};
pub use system::Builtin;
