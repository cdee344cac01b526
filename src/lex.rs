use std::fmt::Display;

use miette::{Diagnostic, Error, LabeledSpan, NamedSource, SourceSpan, miette};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
#[error("invalid token: '{token}'")]
#[diagnostic(help("expressions are made of numbers, names, `(`, `)`, `+`, `-`, `*`, `/` and `,`"))]
pub struct SingleTokenError {
    #[source_code]
    src: NamedSource<String>,

    #[label("this character")]
    bad_bit: SourceSpan,

    pub token: char,
}

#[derive(Error, Debug, Diagnostic)]
#[error("unexpected end of input")]
#[diagnostic(help(
    "the expression ended early, possibly after an operator, a comma or an opening parenthesis"
))]
pub struct Eof {
    #[source_code]
    src: NamedSource<String>,

    #[label("expected an operand here")]
    bad_bit: SourceSpan,
}

impl Eof {
    pub fn build(lexer: &Lexer<'_>) -> Self {
        Eof {
            src: lexer.named_source(),
            bad_bit: SourceSpan::from(lexer.whole.len()..lexer.whole.len()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'de> {
    pub kind: TokenKind,
    pub literal: &'de str,
    /// Byte offset of `literal` in the input.
    pub offset: usize,
}

impl Token<'_> {
    pub fn span(&self) -> SourceSpan {
        SourceSpan::from(self.offset..self.offset + self.literal.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    Comma,
    Minus,
    Plus,
    Star,
    Slash,
    Ident,
    Number(f64),
    Eof,
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = self.literal;
        match self.kind {
            TokenKind::LeftParen => write!(f, "LEFT_PAREN {lit}"),
            TokenKind::RightParen => write!(f, "RIGHT_PAREN {lit}"),
            TokenKind::Comma => write!(f, "COMMA {lit}"),
            TokenKind::Minus => write!(f, "MINUS {lit}"),
            TokenKind::Plus => write!(f, "PLUS {lit}"),
            TokenKind::Star => write!(f, "STAR {lit}"),
            TokenKind::Slash => write!(f, "SLASH {lit}"),
            TokenKind::Ident => write!(f, "IDENTIFIER {lit}"),
            TokenKind::Number(n) => {
                if n == n.trunc() {
                    write!(f, "NUMBER {lit} {n}.0")
                } else {
                    write!(f, "NUMBER {lit} {n}")
                }
            }
            TokenKind::Eof => write!(f, "EOF"),
        }
    }
}

/// Lazily scans an expression into tokens.
///
/// The stream ends with exactly one [`TokenKind::Eof`] token. A lexical error is
/// yielded as an `Err` item instead, and nothing is produced after it.
pub struct Lexer<'de> {
    filename: Option<&'de str>,
    whole: &'de str,
    rest: &'de str,
    pub byte: usize,
    peeked: Option<Result<Token<'de>, Error>>,
    finished: bool,
}

/// Starts lexical analysis of `input`.
pub fn tokenize(input: &str) -> Lexer<'_> {
    Lexer::new(None, input)
}

impl<'de> Lexer<'de> {
    pub fn new(filename: Option<&'de str>, input: &'de str) -> Self {
        Lexer {
            filename,
            whole: input,
            rest: input,
            byte: 0,
            peeked: None,
            finished: false,
        }
    }

    pub(crate) fn named_source(&self) -> NamedSource<String> {
        NamedSource::new(self.filename.unwrap_or("<input>"), self.whole.to_string())
    }

    pub fn expect(&mut self, expected: TokenKind, error: &str) -> Result<Token<'de>, Error> {
        self.expect_where(|token| token.kind == expected, expected, error)
    }

    pub fn expect_where(
        &mut self,
        check: impl FnOnce(&Token<'de>) -> bool,
        expected: TokenKind,
        error: &str,
    ) -> Result<Token<'de>, Error> {
        match self.next() {
            Some(Ok(token)) if check(&token) => Ok(token),
            Some(Ok(token)) => Err(miette!(
                help = format!("expected {expected:?} here"),
                labels = vec![LabeledSpan::at(token.span(), "here")],
                "{error}",
            )
            .with_source_code(self.named_source())),
            Some(Err(e)) => Err(e),
            None => Err(Eof::build(self).into()),
        }
    }

    pub fn peek(&mut self) -> Option<&Result<Token<'de>, Error>> {
        if self.peeked.is_some() {
            return self.peeked.as_ref();
        }
        self.peeked = self.next();
        self.peeked.as_ref()
    }

    fn scan(&mut self) -> Result<Token<'de>, Error> {
        loop {
            let mut chars = self.rest.chars();
            let Some(c) = chars.next() else {
                self.finished = true;
                return Ok(Token {
                    kind: TokenKind::Eof,
                    literal: "",
                    offset: self.byte,
                });
            };
            let offset = self.byte;
            let literal = &self.rest[..c.len_utf8()];
            let cur = self.rest;
            self.rest = chars.as_str();
            self.byte += c.len_utf8();

            enum Started {
                Ident,
                Number,
            }

            let process = |kind: TokenKind| -> Result<Token<'de>, Error> {
                Ok(Token {
                    kind,
                    literal,
                    offset,
                })
            };

            let started = match c {
                '(' => return process(TokenKind::LeftParen),
                ')' => return process(TokenKind::RightParen),
                ',' => return process(TokenKind::Comma),
                '-' => return process(TokenKind::Minus),
                '+' => return process(TokenKind::Plus),
                '*' => return process(TokenKind::Star),
                '/' => return process(TokenKind::Slash),
                '0'..='9' => Started::Number,
                c if is_letter(c) => Started::Ident,
                c if c.is_whitespace() => continue,
                c => {
                    self.finished = true;
                    return Err(SingleTokenError {
                        src: self.named_source(),
                        bad_bit: SourceSpan::from(offset..self.byte),
                        token: c,
                    }
                    .into());
                }
            };

            let literal = match started {
                Started::Ident => {
                    let end = cur.find(|c: char| !is_letter(c)).unwrap_or(cur.len());
                    &cur[..end]
                }
                Started::Number => {
                    let mut end = cur
                        .find(|c: char| !c.is_ascii_digit())
                        .unwrap_or(cur.len());
                    // at most one decimal point; a second one starts the next token
                    if let Some(fraction) = cur[end..].strip_prefix('.') {
                        end += 1 + fraction
                            .find(|c: char| !c.is_ascii_digit())
                            .unwrap_or(fraction.len());
                    }
                    &cur[..end]
                }
            };

            let extra_bytes = literal.len() - c.len_utf8();
            self.byte += extra_bytes;
            self.rest = &self.rest[extra_bytes..];

            let kind = match started {
                Started::Ident => TokenKind::Ident,
                Started::Number => match literal.parse::<f64>() {
                    Ok(n) if n.is_finite() => TokenKind::Number(n),
                    _ => {
                        self.finished = true;
                        return Err(miette!(
                            help = format!("numbers must be below {:e}", f64::MAX),
                            labels = vec![LabeledSpan::at(offset..self.byte, "this numeric literal")],
                            "number out of range",
                        )
                        .with_source_code(self.named_source()));
                    }
                },
            };

            return Ok(Token {
                kind,
                literal,
                offset,
            });
        }
    }
}

// Letters proper: letter numbers such as `Ⅻ` are alphabetic but not letters.
fn is_letter(c: char) -> bool {
    c.is_alphabetic() && !c.is_numeric()
}

impl<'de> Iterator for Lexer<'de> {
    type Item = Result<Token<'de>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(peeked) = self.peeked.take() {
            return Some(peeked);
        }
        if self.finished {
            return None;
        }
        let token = self.scan();
        match &token {
            Ok(token) => log::trace!("lexed {token} at byte {}", token.offset),
            Err(e) => log::trace!("lexing stopped: {e}"),
        }
        Some(token)
    }
}
