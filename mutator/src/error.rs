//! Error types for the front end and configuration.
//!
//! The mutation engine itself has no error kinds: it succeeds on every
//! well-formed `Program`.

use thiserror::Error;

use crate::tree::Span;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{}:{}: lex error: {message}", span.line, span.col)]
    Lex { span: Span, message: String },

    #[error("{}:{}: parse error: {message}", span.line, span.col)]
    Parse { span: Span, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn lex(span: Span, message: impl Into<String>) -> Self {
        Self::Lex { span, message: message.into() }
    }

    pub fn parse(span: Span, message: impl Into<String>) -> Self {
        Self::Parse { span, message: message.into() }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}
