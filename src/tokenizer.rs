use std::fs;
use std::path::Path;

#[cfg(test)]
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use tracing::debug;

use crate::error::{
    FileReadSnafu, InvalidIdentifierSnafu, LexError, NestedCommentSnafu, StrayCommentEndSnafu,
    UnbalancedBracketsSnafu, UnknownTokenSnafu, UnterminatedCommentSnafu,
};

#[cfg_attr(test, derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Break,
    Continue,
    Do,
    Else,
    For,
    If,
    Print,
    Return,
    While,
}

#[cfg_attr(test, derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Double,
    Float,
    Int,
    Long,
    Void,
}

#[cfg_attr(test, derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    Ampersand,
    AndAnd,
    Bang,
    DoubleQuote,
    Eq,
    EqEq,
    Gt,
    Gte,
    LeftBrace,
    LeftBracket,
    LeftParen,
    Lt,
    Lte,
    Minus,
    Modulo,
    Ne,
    OrOr,
    Pipe,
    Plus,
    RightBrace,
    RightBracket,
    RightParen,
    Semicolon,
    Slash,
    Star,
    Tilde,
}

#[cfg_attr(test, derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword(Keyword),
    Type(DataType),
    Punct(Punct),
    Number,
    Ident,
    Eof,
}

#[cfg_attr(test, derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
}

impl Token {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

/// Tokenizes a whole source string. Any failure discards every token
/// produced so far.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Tokenizer::new(source).tokenize()
}

pub fn tokenize_file(path: impl AsRef<Path>) -> Result<Vec<Token>, LexError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).context(FileReadSnafu { path })?;
    tokenize(&source)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tokenizer {
    pub source: Vec<u8>,
    pub index: usize,
    pub line: u32,
    brackets: Vec<u8>,
}

impl Tokenizer {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.bytes().collect(),
            index: 0,
            line: 1,
            brackets: vec![],
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = vec![];
        while let Some(c) = self.peek() {
            match c {
                b'_' | b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' => tokens.push(self.word()?),
                b'\n' => self.newline(),
                c if c.is_ascii_whitespace() => self.advance(),
                b'/' if self.peek_next() == Some(b'*') => self.comment()?,
                b'*' if self.peek_next() == Some(b'/') => {
                    return StrayCommentEndSnafu { line: self.line }.fail();
                }
                c => {
                    self.track_bracket(c)?;
                    tokens.push(self.punct()?);
                }
            }
        }

        if !self.brackets.is_empty() {
            return UnbalancedBracketsSnafu { line: self.line }.fail();
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            text: String::new(),
            line: self.line,
        });
        debug!(count = tokens.len(), "tokenized source");

        Ok(tokens)
    }

    // `/* ... */`, newlines inside still count
    fn comment(&mut self) -> Result<(), LexError> {
        let start_line = self.line;
        self.advance_n(2);
        loop {
            match (self.peek(), self.peek_next()) {
                (None, _) => return UnterminatedCommentSnafu { line: start_line }.fail(),
                (Some(b'*'), Some(b'/')) => {
                    self.advance_n(2);
                    return Ok(());
                }
                (Some(b'/'), Some(b'*')) => {
                    return NestedCommentSnafu { line: self.line }.fail();
                }
                (Some(b'\n'), _) => self.newline(),
                _ => self.advance(),
            }
        }
    }

    fn track_bracket(&mut self, c: u8) -> Result<(), LexError> {
        match c {
            b'(' | b'{' | b'[' => self.brackets.push(c),
            b')' | b'}' | b']' => match (self.brackets.pop(), c) {
                (Some(b'('), b')') | (Some(b'{'), b'}') | (Some(b'['), b']') => {}
                _ => return UnbalancedBracketsSnafu { line: self.line }.fail(),
            },
            _ => {}
        }
        Ok(())
    }

    fn word(&mut self) -> Result<Token, LexError> {
        let start = self.index;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.advance();
            } else {
                break;
            }
        }
        let text = String::from_utf8_lossy(&self.source[start..self.index]).to_string();

        let kind = match text.as_str() {
            "int" => TokenKind::Type(DataType::Int),
            "long" => TokenKind::Type(DataType::Long),
            "float" => TokenKind::Type(DataType::Float),
            "double" => TokenKind::Type(DataType::Double),
            "void" => TokenKind::Type(DataType::Void),
            "if" => TokenKind::Keyword(Keyword::If),
            "else" => TokenKind::Keyword(Keyword::Else),
            "print" => TokenKind::Keyword(Keyword::Print),
            "for" => TokenKind::Keyword(Keyword::For),
            "while" => TokenKind::Keyword(Keyword::While),
            "do" => TokenKind::Keyword(Keyword::Do),
            "break" => TokenKind::Keyword(Keyword::Break),
            "return" => TokenKind::Keyword(Keyword::Return),
            "continue" => TokenKind::Keyword(Keyword::Continue),
            _ if text.bytes().all(|c| c.is_ascii_digit()) => TokenKind::Number,
            _ if is_valid_ident(&text) => TokenKind::Ident,
            _ => {
                return InvalidIdentifierSnafu {
                    line: self.line,
                    text,
                }
                .fail()
            }
        };

        Ok(Token {
            kind,
            text,
            line: self.line,
        })
    }

    fn punct(&mut self) -> Result<Token, LexError> {
        let start = self.index;
        let line = self.line;
        // safe, only called with a byte under the cursor
        let c = self.source[self.index];
        let next_c = self.peek_next();
        self.advance();

        let kind = match (c, next_c) {
            (b'=', Some(b'=')) => {
                self.advance();
                Punct::EqEq
            }
            (b'!', Some(b'=')) => {
                self.advance();
                Punct::Ne
            }
            (b'<', Some(b'=')) => {
                self.advance();
                Punct::Lte
            }
            (b'>', Some(b'=')) => {
                self.advance();
                Punct::Gte
            }
            (b'&', Some(b'&')) => {
                self.advance();
                Punct::AndAnd
            }
            (b'|', Some(b'|')) => {
                self.advance();
                Punct::OrOr
            }
            (b'(', _) => Punct::LeftParen,
            (b')', _) => Punct::RightParen,
            (b'{', _) => Punct::LeftBrace,
            (b'}', _) => Punct::RightBrace,
            (b'[', _) => Punct::LeftBracket,
            (b']', _) => Punct::RightBracket,
            (b';', _) => Punct::Semicolon,
            (b'+', _) => Punct::Plus,
            (b'-', _) => Punct::Minus,
            (b'*', _) => Punct::Star,
            (b'/', _) => Punct::Slash,
            (b'%', _) => Punct::Modulo,
            (b'~', _) => Punct::Tilde,
            (b'!', _) => Punct::Bang,
            (b'=', _) => Punct::Eq,
            (b'<', _) => Punct::Lt,
            (b'>', _) => Punct::Gt,
            (b'&', _) => Punct::Ampersand,
            (b'|', _) => Punct::Pipe,
            (b'"', _) => Punct::DoubleQuote,
            _ => {
                return UnknownTokenSnafu {
                    line,
                    text: String::from_utf8_lossy(&self.source[start..self.index]),
                }
                .fail()
            }
        };

        Ok(Token {
            kind: TokenKind::Punct(kind),
            text: String::from_utf8_lossy(&self.source[start..self.index]).to_string(),
            line,
        })
    }

    fn advance(&mut self) {
        self.index += 1;
    }

    fn advance_n(&mut self, steps: usize) {
        self.index += steps;
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.source.get(self.index + 1).copied()
    }

    fn newline(&mut self) {
        self.advance();
        self.line += 1;
    }
}

fn is_valid_ident(text: &str) -> bool {
    let mut bytes = text.bytes();
    match bytes.next() {
        Some(c) if c.is_ascii_alphabetic() || c == b'_' => {
            bytes.all(|c| c.is_ascii_alphanumeric() || c == b'_')
        }
        _ => false,
    }
}
