//! Compile-time errors: user errors carry a byte range into the source,
//! internal errors are invariant violations inside the compiler itself.

use thiserror::Error;

pub type SourceRange = std::ops::Range<usize>;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] fox_parser::ParseError),

    #[error("{message}")]
    User {
        message: String,
        span: Option<SourceRange>,
    },

    #[error("internal compiler error: {0}")]
    Internal(String),
}

impl CompileError {
    pub fn user(span: SourceRange, message: impl Into<String>) -> Self {
        CompileError::User {
            message: message.into(),
            span: Some(span),
        }
    }

    pub fn user_unlocated(message: impl Into<String>) -> Self {
        CompileError::User {
            message: message.into(),
            span: None,
        }
    }

    pub fn span(&self) -> Option<SourceRange> {
        match self {
            CompileError::Parse(e) => Some(e.span()),
            CompileError::User { span, .. } => span.clone(),
            CompileError::Internal(_) => None,
        }
    }
}
