// Modular parser for the Fox language
// This module organizes the parser into logical components

use crate::ParseError;
use fox_ast::*;
use fox_lexer::{Lexer, Token, TokenSpan};

// Sub-modules for different parsing responsibilities
mod expressions;
mod items;
mod patterns;
mod statements;
mod types;

// Re-export Parser as the main public interface
pub struct Parser {
    pub(crate) tokens: Vec<TokenSpan>,
    pub(crate) current: usize,
    /// Struct literals are suppressed while parsing if/while/for/match heads
    /// so that `if x { ... }` does not read `x { ... }` as a literal.
    pub(crate) no_struct_literal: bool,
    source_len: usize,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, ParseError> {
        let tokens = Lexer::new(source).collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            tokens,
            current: 0,
            no_struct_literal: false,
            source_len: source.len(),
        })
    }

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut stmts = Vec::new();
        while !self.is_at_end() {
            stmts.push(self.parse_statement()?);
        }
        Ok(Program { stmts })
    }

    // ==================== Helper Methods ====================

    pub(crate) fn match_token(&mut self, kind: &Token) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn check(&self, kind: &Token) -> bool {
        match self.peek() {
            Some(tok) => std::mem::discriminant(tok) == std::mem::discriminant(kind),
            None => false,
        }
    }

    pub(crate) fn check_ahead(&self, offset: usize, kind: &Token) -> bool {
        match self.tokens.get(self.current + offset) {
            Some(ts) => std::mem::discriminant(&ts.token) == std::mem::discriminant(kind),
            None => false,
        }
    }

    pub(crate) fn advance(&mut self) -> Option<&Token> {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.tokens.get(self.current - 1).map(|ts| &ts.token)
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }

    pub(crate) fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current).map(|ts| &ts.token)
    }

    /// Start offset of the current token, or end of input.
    pub(crate) fn pos(&self) -> usize {
        self.tokens
            .get(self.current)
            .map_or(self.source_len, |ts| ts.span.start)
    }

    /// End offset of the previously consumed token.
    pub(crate) fn prev_end(&self) -> usize {
        if self.current == 0 {
            return 0;
        }
        self.tokens
            .get(self.current - 1)
            .map_or(self.source_len, |ts| ts.span.end)
    }

    pub(crate) fn consume(&mut self, kind: &Token, message: &str) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(message))
        }
    }

    pub(crate) fn consume_identifier(&mut self, message: &str) -> Result<String, ParseError> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error(message)),
        }
    }

    pub(crate) fn error(&self, message: &str) -> ParseError {
        let span = self
            .tokens
            .get(self.current)
            .map_or(self.source_len..self.source_len, |ts| ts.span.clone());

        ParseError::SyntaxError {
            span,
            message: message.to_string(),
        }
    }

    pub(crate) fn expr(&self, start: usize, kind: ExprKind) -> Expr {
        Expr {
            kind,
            span: start..self.prev_end(),
        }
    }

    pub(crate) fn stmt(&self, start: usize, kind: StmtKind) -> Stmt {
        Stmt {
            kind,
            span: start..self.prev_end(),
        }
    }

    pub(crate) fn pattern(&self, start: usize, kind: PatternKind) -> Pattern {
        Pattern {
            kind,
            span: start..self.prev_end(),
        }
    }

    pub(crate) fn parse_block(&mut self) -> Result<Block, ParseError> {
        self.consume(&Token::LBrace, "Expected '{'")?;
        let saved = self.no_struct_literal;
        self.no_struct_literal = false;

        let mut stmts = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            stmts.push(self.parse_statement()?);
        }

        self.no_struct_literal = saved;
        self.consume(&Token::RBrace, "Expected '}'")?;

        Ok(Block { stmts })
    }

    /// Parse a `::`-separated path starting with an already-consumed segment.
    pub(crate) fn parse_path_from(&mut self, first: String) -> Result<Vec<String>, ParseError> {
        let mut segments = vec![first];
        while self.match_token(&Token::ColonColon) {
            segments.push(self.consume_identifier("Expected identifier after '::'")?);
        }
        Ok(segments)
    }

    /// Skip tokens until the matching closing brace (for constructs whose
    /// bodies are accepted but not represented, e.g. trait method lists).
    pub(crate) fn skip_braced_block(&mut self) -> Result<(), ParseError> {
        self.consume(&Token::LBrace, "Expected '{'")?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek() {
                Some(Token::LBrace) => depth += 1,
                Some(Token::RBrace) => depth -= 1,
                Some(_) => {}
                None => return Err(self.error("Unexpected end of file inside block")),
            }
            self.advance();
        }
        Ok(())
    }
}
