//! Error types for every stage of the pipeline.
//!
//! Each stage fails fast: the first error aborts the stage and nothing it
//! produced so far is handed on. Every error knows the source line it was
//! raised on, if any.

use std::io;
use std::path::PathBuf;

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LexError {
    #[snafu(display("Line {line}: Unknown token '{text}'"))]
    UnknownToken { line: u32, text: String },

    #[snafu(display("Line {line}: Invalid identifier: {text}"))]
    InvalidIdentifier { line: u32, text: String },

    #[snafu(display("Line {line}: Incorrect parenthesization"))]
    UnbalancedBrackets { line: u32 },

    #[snafu(display("Line {line}: Nested comments are not allowed"))]
    NestedComment { line: u32 },

    #[snafu(display("Line {line}: Invalid use of end comment '*/' token"))]
    StrayCommentEnd { line: u32 },

    #[snafu(display("Line {line}: Unterminated comment"))]
    UnterminatedComment { line: u32 },

    #[snafu(display("Failed to read {}: {source}", path.display()))]
    FileRead { path: PathBuf, source: io::Error },
}

impl LexError {
    pub fn line(&self) -> Option<u32> {
        match self {
            LexError::UnknownToken { line, .. }
            | LexError::InvalidIdentifier { line, .. }
            | LexError::UnbalancedBrackets { line }
            | LexError::NestedComment { line }
            | LexError::StrayCommentEnd { line }
            | LexError::UnterminatedComment { line } => Some(*line),
            LexError::FileRead { .. } => None,
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ParseError {
    #[snafu(display("Line {line}: {message}"))]
    Syntax { line: u32, message: String },

    #[snafu(display("Line {line}: Unexpected end of input"))]
    UnexpectedEof { line: u32 },
}

impl ParseError {
    pub fn line(&self) -> Option<u32> {
        match self {
            ParseError::Syntax { line, .. } | ParseError::UnexpectedEof { line } => Some(*line),
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum GenError {
    #[snafu(display("Line {line}: Undefined reference to identifier: {name}"))]
    UndefinedReference { line: u32, name: String },

    #[snafu(display("Line {line}: Variable {name} is already declared in line {first_line}"))]
    DuplicateDeclaration {
        line: u32,
        name: String,
        first_line: u32,
    },

    #[snafu(display("Line {line}: Invalid {keyword} statement - not inside loop"))]
    NotInLoop { line: u32, keyword: &'static str },

    #[snafu(display("Line {line}: Unexpected else statement"))]
    UnexpectedElse { line: u32 },

    #[snafu(display("Line {line}: Expected a block"))]
    ExpectedBlock { line: u32 },

    #[snafu(display("Line {line}: Expected end of block"))]
    UnterminatedBlock { line: u32 },

    #[snafu(display("Line {line}: Could not assemble function"))]
    MalformedFunction { line: u32 },

    #[snafu(display("Could not assemble function: empty program"))]
    EmptyProgram,
}

impl GenError {
    pub fn line(&self) -> Option<u32> {
        match self {
            GenError::UndefinedReference { line, .. }
            | GenError::DuplicateDeclaration { line, .. }
            | GenError::NotInLoop { line, .. }
            | GenError::UnexpectedElse { line }
            | GenError::ExpectedBlock { line }
            | GenError::UnterminatedBlock { line }
            | GenError::MalformedFunction { line } => Some(*line),
            GenError::EmptyProgram => None,
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CompileError {
    #[snafu(context(false), display("{source}"))]
    Lex { source: LexError },

    #[snafu(context(false), display("{source}"))]
    Parse { source: ParseError },

    #[snafu(context(false), display("{source}"))]
    Gen { source: GenError },

    #[snafu(display("Destination file {} could not be written: {source}", path.display()))]
    WriteOutput { path: PathBuf, source: io::Error },
}

impl CompileError {
    pub fn line(&self) -> Option<u32> {
        match self {
            CompileError::Lex { source } => source.line(),
            CompileError::Parse { source } => source.line(),
            CompileError::Gen { source } => source.line(),
            CompileError::WriteOutput { .. } => None,
        }
    }
}
