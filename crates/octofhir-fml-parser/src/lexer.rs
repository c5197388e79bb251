//! Tokenizer for FML source text
//!
//! The lexer is a lazy, restartable iterator over spanned tokens. Line and
//! block comments are dropped; `///` documentation comments are kept as
//! tokens because they carry header metadata and rule documentation.
//! Keywords are contextual, so every word is lexed as an identifier and the
//! parser decides what it means at each position.
//!
//! Numbers and date/time literals are recognized with small winnow parsers;
//! everything else is a byte cursor.

use octofhir_fml_diagnostics::{
    ErrorCode, FML0003, FML0004, FML0005, FML0006, FML0007, FML0008, FML0009, LexError, LineIndex, Span,
    Spanned,
};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use winnow::ascii::digit1;
use winnow::combinator::{alt, opt};
use winnow::prelude::*;
use winnow::token::{one_of, take_while};

/// A lexical token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Plain word, including contextual keywords
    Identifier(String),
    /// `"name"` or `` `name` ``
    DelimitedIdentifier(String),
    /// `'text'`
    String(String),
    Integer(i64),
    Decimal(Decimal),
    Boolean(bool),
    /// `@2024-01-15`, text without `@`
    Date(String),
    /// `@2024-01-15T10:00:00Z`, text without `@`
    DateTime(String),
    /// `@T10:00`, text without `@T`
    Time(String),
    /// `$this`, name without `$`
    Variable(String),
    /// `/// text`, trimmed text
    DocComment(String),

    Arrow,
    EqualEqual,
    NotEqual,
    LessEqual,
    GreaterEqual,
    DoubleLess,
    DoubleGreater,
    DotDot,
    Dot,
    Colon,
    Comma,
    Semicolon,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Equal,
    Less,
    Greater,
    Plus,
    Minus,
    Star,
    Slash,
    Ampersand,
    Pipe,
    Tilde,
    Percent,
}

impl Token {
    /// Name text for identifiers of either form
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Token::Identifier(s) | Token::DelimitedIdentifier(s) => Some(s),
            _ => None,
        }
    }

    /// True for a plain identifier spelled `word`
    pub fn is_keyword(&self, word: &str) -> bool {
        matches!(self, Token::Identifier(s) if s == word)
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Token::String(_)
                | Token::Integer(_)
                | Token::Decimal(_)
                | Token::Boolean(_)
                | Token::Date(_)
                | Token::DateTime(_)
                | Token::Time(_)
        )
    }

    fn punctuation(&self) -> Option<&'static str> {
        Some(match self {
            Token::Arrow => "->",
            Token::EqualEqual => "==",
            Token::NotEqual => "!=",
            Token::LessEqual => "<=",
            Token::GreaterEqual => ">=",
            Token::DoubleLess => "<<",
            Token::DoubleGreater => ">>",
            Token::DotDot => "..",
            Token::Dot => ".",
            Token::Colon => ":",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::LeftBrace => "{",
            Token::RightBrace => "}",
            Token::LeftBracket => "[",
            Token::RightBracket => "]",
            Token::Equal => "=",
            Token::Less => "<",
            Token::Greater => ">",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Ampersand => "&",
            Token::Pipe => "|",
            Token::Tilde => "~",
            Token::Percent => "%",
            _ => return None,
        })
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = self.punctuation() {
            return write!(f, "'{p}'");
        }
        match self {
            Token::Identifier(s) => write!(f, "identifier '{s}'"),
            Token::DelimitedIdentifier(s) => write!(f, "identifier \"{s}\""),
            Token::String(s) => write!(f, "string '{s}'"),
            Token::Integer(i) => write!(f, "number {i}"),
            Token::Decimal(d) => write!(f, "number {d}"),
            Token::Boolean(b) => write!(f, "'{b}'"),
            Token::Date(s) | Token::DateTime(s) => write!(f, "date '@{s}'"),
            Token::Time(s) => write!(f, "time '@T{s}'"),
            Token::Variable(s) => write!(f, "'${s}'"),
            Token::DocComment(_) => write!(f, "documentation comment"),
            _ => write!(f, "{self:?}"),
        }
    }
}

/// Lazy tokenizer over a source text
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    failed: bool,
    lines: Arc<LineIndex>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            failed: false,
            lines: Arc::new(LineIndex::new(source)),
        }
    }

    /// Restart from the beginning of the source
    pub fn reset(&mut self) {
        self.pos = 0;
        self.failed = false;
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn line_index(&self) -> Arc<LineIndex> {
        Arc::clone(&self.lines)
    }

    fn error(&self, code: ErrorCode, message: impl Into<String>, start: usize) -> LexError {
        let span = Span::new(start, self.pos.max(start + 1).min(self.source.len().max(start)));
        LexError::new(code, message, self.lines.location(self.source, span))
    }

    fn peek_byte(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    /// Skip whitespace and non-documentation comments
    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match (self.peek_byte(0), self.peek_byte(1)) {
                (Some(b), _) if b.is_ascii_whitespace() => self.pos += 1,
                (Some(b'/'), Some(b'/')) if self.peek_byte(2) != Some(b'/') => {
                    while let Some(b) = self.peek_byte(0) {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                (Some(b'/'), Some(b'*')) => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        match (self.peek_byte(0), self.peek_byte(1)) {
                            (Some(b'*'), Some(b'/')) => {
                                self.pos += 2;
                                break;
                            }
                            (Some(_), _) => self.pos += 1,
                            (None, _) => {
                                return Err(self.error(FML0005, "Unterminated block comment", start));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn doc_comment(&mut self) -> Token {
        self.pos += 3;
        let start = self.pos;
        while let Some(b) = self.peek_byte(0) {
            if b == b'\n' {
                break;
            }
            self.pos += 1;
        }
        Token::DocComment(self.source[start..self.pos].trim().to_string())
    }

    fn identifier(&mut self) -> Token {
        let start = self.pos;
        while let Some(b) = self.peek_byte(0) {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        match &self.source[start..self.pos] {
            "true" => Token::Boolean(true),
            "false" => Token::Boolean(false),
            word => Token::Identifier(word.to_string()),
        }
    }

    /// Quoted text with escapes; the opening quote is at `self.pos`
    fn quoted(&mut self, quote: u8, unterminated: ErrorCode) -> Result<String, LexError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(c) = self.rest().chars().next() else {
                return Err(self.error(unterminated, "Unterminated quoted text", start));
            };
            match c {
                c if c as u32 == quote as u32 => {
                    self.pos += 1;
                    return Ok(out);
                }
                '\\' => {
                    let escape_at = self.pos;
                    self.pos += 1;
                    let Some(e) = self.rest().chars().next() else {
                        return Err(self.error(unterminated, "Unterminated quoted text", start));
                    };
                    self.pos += e.len_utf8();
                    match e {
                        '\'' | '"' | '`' | '\\' | '/' => out.push(e),
                        'f' => out.push('\u{0C}'),
                        'n' => out.push('\n'),
                        'r' => out.push('\r'),
                        't' => out.push('\t'),
                        'u' => {
                            let hex = self.source.get(self.pos..self.pos + 4).unwrap_or("");
                            let decoded = (hex.len() == 4)
                                .then(|| u32::from_str_radix(hex, 16).ok())
                                .flatten()
                                .and_then(char::from_u32);
                            match decoded {
                                Some(ch) => {
                                    out.push(ch);
                                    self.pos += 4;
                                }
                                None => {
                                    return Err(self.error(
                                        FML0006,
                                        "Invalid unicode escape sequence",
                                        escape_at,
                                    ));
                                }
                            }
                        }
                        other => {
                            return Err(self.error(
                                FML0006,
                                format!("Invalid escape sequence '\\{other}'"),
                                escape_at,
                            ));
                        }
                    }
                }
                c => {
                    out.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    fn number(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        let mut rest = self.rest();
        let text = number_text
            .parse_next(&mut rest)
            .map_err(|_| self.error(FML0007, "Invalid number", start))?;
        self.pos += text.len();
        if text.contains('.') {
            Decimal::from_str(text)
                .map(Token::Decimal)
                .map_err(|e| self.error(FML0007, format!("Invalid decimal '{text}': {e}"), start))
        } else {
            text.parse::<i64>()
                .map(Token::Integer)
                .map_err(|e| self.error(FML0007, format!("Invalid integer '{text}': {e}"), start))
        }
    }

    fn temporal(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        self.pos += 1;
        let mut rest = self.rest();
        let parsed = temporal_literal.parse_next(&mut rest);
        let (kind, text) =
            parsed.map_err(|_| self.error(FML0008, "Invalid date/time literal", start))?;
        self.pos += self.rest().len() - rest.len();
        if self.peek_byte(0).is_some_and(|b| b.is_ascii_alphanumeric()) {
            return Err(self.error(FML0008, "Invalid date/time literal", start));
        }
        let text = text.to_string();
        Ok(match kind {
            Temporal::Date => Token::Date(text),
            Temporal::DateTime => Token::DateTime(text),
            Temporal::Time => Token::Time(text),
        })
    }

    fn punctuation(&mut self) -> Option<Token> {
        let two = match (self.peek_byte(0)?, self.peek_byte(1)) {
            (b'-', Some(b'>')) => Some(Token::Arrow),
            (b'=', Some(b'=')) => Some(Token::EqualEqual),
            (b'!', Some(b'=')) => Some(Token::NotEqual),
            (b'<', Some(b'=')) => Some(Token::LessEqual),
            (b'>', Some(b'=')) => Some(Token::GreaterEqual),
            (b'<', Some(b'<')) => Some(Token::DoubleLess),
            (b'>', Some(b'>')) => Some(Token::DoubleGreater),
            (b'.', Some(b'.')) => Some(Token::DotDot),
            _ => None,
        };
        if let Some(token) = two {
            self.pos += 2;
            return Some(token);
        }
        let one = match self.peek_byte(0)? {
            b'.' => Token::Dot,
            b':' => Token::Colon,
            b',' => Token::Comma,
            b';' => Token::Semicolon,
            b'(' => Token::LeftParen,
            b')' => Token::RightParen,
            b'{' => Token::LeftBrace,
            b'}' => Token::RightBrace,
            b'[' => Token::LeftBracket,
            b']' => Token::RightBracket,
            b'=' => Token::Equal,
            b'<' => Token::Less,
            b'>' => Token::Greater,
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' => Token::Star,
            b'/' => Token::Slash,
            b'&' => Token::Ampersand,
            b'|' => Token::Pipe,
            b'~' => Token::Tilde,
            b'%' => Token::Percent,
            _ => return None,
        };
        self.pos += 1;
        Some(one)
    }

    /// Next token, or `None` at end of input
    pub fn next_token(&mut self) -> Result<Option<Spanned<Token>>, LexError> {
        self.skip_trivia()?;
        let start = self.pos;
        let Some(byte) = self.peek_byte(0) else {
            return Ok(None);
        };

        let token = match byte {
            b'/' if self.rest().starts_with("///") => self.doc_comment(),
            b'\'' => Token::String(self.quoted(b'\'', FML0004)?),
            b'"' => Token::DelimitedIdentifier(self.quoted(b'"', FML0009)?),
            b'`' => Token::DelimitedIdentifier(self.quoted(b'`', FML0009)?),
            b'@' => self.temporal()?,
            b'$' => {
                self.pos += 1;
                match self.identifier() {
                    Token::Identifier(name) => Token::Variable(name),
                    _ => return Err(self.error(FML0003, "Expected a name after '$'", start)),
                }
            }
            b if b.is_ascii_digit() => self.number()?,
            b if b.is_ascii_alphabetic() || b == b'_' => self.identifier(),
            _ => match self.punctuation() {
                Some(token) => token,
                None => {
                    let ch = self.rest().chars().next().unwrap_or('?');
                    self.pos += ch.len_utf8();
                    return Err(self.error(FML0003, format!("Unexpected character '{ch}'"), start));
                }
            },
        };

        Ok(Some(Spanned::new(token, Span::new(start, self.pos))))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Spanned<Token>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_token() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Tokenize a whole source text, stopping at the first error
pub fn tokenize(source: &str) -> Result<Vec<Spanned<Token>>, LexError> {
    Lexer::new(source).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Temporal {
    Date,
    DateTime,
    Time,
}

fn number_text<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    (digit1, opt(('.', digit1))).take().parse_next(input)
}

fn two_digits<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    take_while(2, |c: char| c.is_ascii_digit()).parse_next(input)
}

fn time_text<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    (
        two_digits,
        opt((
            ':',
            two_digits,
            opt((':', two_digits, opt(('.', digit1)))),
        )),
    )
        .take()
        .parse_next(input)
}

fn timezone<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    alt(("Z", (one_of(['+', '-']), two_digits, ':', two_digits).take())).parse_next(input)
}

fn date_text<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    (
        take_while(4, |c: char| c.is_ascii_digit()),
        opt(('-', two_digits, opt(('-', two_digits)))),
    )
        .take()
        .parse_next(input)
}

/// Literal body after `@`
fn temporal_literal<'s>(input: &mut &'s str) -> ModalResult<(Temporal, &'s str)> {
    if let Some(time) = input.strip_prefix('T') {
        *input = time;
        return time_text.map(|t| (Temporal::Time, t)).parse_next(input);
    }
    let (text, time) = (date_text, opt(('T', opt(time_text), opt(timezone))))
        .with_taken()
        .map(|((_, time), taken)| (taken, time))
        .parse_next(input)?;
    let kind = if time.is_some() {
        Temporal::DateTime
    } else {
        Temporal::Date
    };
    Ok((kind, text))
}
