use std::path::PathBuf;
use thiserror::Error;

use mas_core::CoreError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LexError {
    #[error("Unexpected character '{ch}' at {line}:{col}")]
    UnexpectedChar { ch: char, line: usize, col: usize },
    #[error("Unterminated string starting at {line}:{col}")]
    UnterminatedString { line: usize, col: usize },
    #[error("Unterminated comment starting at {line}:{col}")]
    UnterminatedComment { line: usize, col: usize },
    #[error("Invalid number at {line}:{col}")]
    InvalidNumber { line: usize, col: usize },
}

pub type LexResult<T> = std::result::Result<T, LexError>;

/// Structural error in an agent source or system file. Always fatal at load
/// time.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token at {line}:{col}: expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
        col: usize,
    },
    #[error("Unexpected end of input: expected {expected}")]
    UnexpectedEof { expected: String },
    #[error("Invalid construct at {line}:{col}: {message}")]
    Invalid {
        message: String,
        line: usize,
        col: usize,
    },
    #[error("Lexer error: {0}")]
    Lex(#[from] LexError),
}

pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Errors loading a system definition and the agent sources it names.
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid system file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A plan source (or the `.mas2j` file itself) does not parse
    #[error("Malformed plan in {origin}: {source}")]
    MalformedPlan {
        origin: String,
        #[source]
        source: ParseError,
    },

    #[error("Agent {agent} asks for {count} instances, expected 1 to {max}")]
    InvalidInstances {
        agent: String,
        count: usize,
        max: usize,
    },

    #[error("Duplicate agent name: {0}")]
    DuplicateAgent(String),

    #[error("No plan source for agent {agent}: {path} not found")]
    MissingSource { agent: String, path: PathBuf },

    #[error("Unsupported system file format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Invalid setting: {0}")]
    InvalidSetting(#[from] CoreError),
}

pub type SystemResult<T> = std::result::Result<T, SystemError>;
