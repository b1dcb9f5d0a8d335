use thiserror::Error;

// Modular parser structure
mod parser;
pub use parser::Parser;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Parse error at {span:?}: {message}")]
    SyntaxError {
        span: std::ops::Range<usize>,
        message: String,
    },
    #[error(transparent)]
    LexerError(#[from] fox_lexer::LexError),
}

impl ParseError {
    pub fn span(&self) -> std::ops::Range<usize> {
        match self {
            ParseError::SyntaxError { span, .. } => span.clone(),
            ParseError::LexerError(e) => e.span(),
        }
    }
}
