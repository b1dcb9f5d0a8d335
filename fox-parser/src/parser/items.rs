// Declaration parsing for the Fox language

use super::Parser;
use crate::ParseError;
use fox_ast::*;
use fox_lexer::Token;

impl Parser {
    /// Parse a function declaration, with `fn` as the current token.
    pub(crate) fn parse_fn_decl(&mut self) -> Result<FnDecl, ParseError> {
        self.consume(&Token::Fn, "Expected 'fn'")?;
        let name = self.consume_identifier("Expected function name")?;

        let type_params = self.parse_type_params()?;

        self.consume(&Token::LParen, "Expected '(' after function name")?;
        let mut params = Vec::new();
        let mut varargs = false;
        while !self.check(&Token::RParen) {
            if self.match_token(&Token::DotDotDot) {
                varargs = true;
                break;
            }
            let pname = self.consume_identifier("Expected parameter name")?;
            self.consume(&Token::Colon, "Expected ':' after parameter name")?;
            let ty = self.parse_type()?;
            params.push(Param { name: pname, ty });
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.consume(&Token::RParen, "Expected ')' after parameters")?;

        let ret = if self.match_token(&Token::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = self.parse_block()?;

        Ok(FnDecl {
            name,
            type_params,
            params,
            varargs,
            ret,
            body,
        })
    }

    /// Generic type parameter list: <T, U>. Parsed so the surface syntax is
    /// accepted; instantiation is rejected later in the pipeline.
    fn parse_type_params(&mut self) -> Result<Vec<String>, ParseError> {
        if !self.match_token(&Token::Lt) {
            return Ok(Vec::new());
        }
        let mut params = Vec::new();
        loop {
            params.push(self.consume_identifier("Expected type parameter name")?);
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.consume(&Token::Gt, "Expected '>' after type parameters")?;
        Ok(params)
    }

    pub(crate) fn parse_struct_decl(&mut self) -> Result<Stmt, ParseError> {
        let start = self.pos();
        self.advance(); // consume 'struct'

        let name = self.consume_identifier("Expected struct name")?;
        let type_params = self.parse_type_params()?;

        self.consume(&Token::LBrace, "Expected '{' after struct name")?;
        let mut fields = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            let fname = self.consume_identifier("Expected field name")?;
            self.consume(&Token::Colon, "Expected ':' after field name")?;
            let ty = self.parse_type()?;
            fields.push((fname, ty));
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.consume(&Token::RBrace, "Expected '}' after struct fields")?;

        Ok(self.stmt(
            start,
            StmtKind::StructDecl(StructDecl {
                name,
                type_params,
                fields,
            }),
        ))
    }

    pub(crate) fn parse_enum_decl(&mut self) -> Result<Stmt, ParseError> {
        let start = self.pos();
        self.advance(); // consume 'enum'

        let name = self.consume_identifier("Expected enum name")?;

        self.consume(&Token::LBrace, "Expected '{' after enum name")?;
        let mut variants = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            let vname = self.consume_identifier("Expected variant name")?;
            let mut payload = Vec::new();
            if self.match_token(&Token::LParen) {
                while !self.check(&Token::RParen) {
                    payload.push(self.parse_type()?);
                    if !self.match_token(&Token::Comma) {
                        break;
                    }
                }
                self.consume(&Token::RParen, "Expected ')' after variant payload")?;
            }
            variants.push(EnumVariant {
                name: vname,
                payload,
            });
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.consume(&Token::RBrace, "Expected '}' after enum variants")?;

        Ok(self.stmt(start, StmtKind::EnumDecl(EnumDecl { name, variants })))
    }

    /// impl Type { fns } or impl Trait for Type { fns }
    pub(crate) fn parse_impl_block(&mut self) -> Result<Stmt, ParseError> {
        let start = self.pos();
        self.advance(); // consume 'impl'

        let first = self.consume_identifier("Expected type or trait name after 'impl'")?;
        let (target, trait_name) = if self.match_token(&Token::For) {
            let target = self.consume_identifier("Expected type name after 'for'")?;
            (target, Some(first))
        } else {
            (first, None)
        };

        self.consume(&Token::LBrace, "Expected '{' after impl header")?;
        let mut fns = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            if !self.check(&Token::Fn) {
                return Err(self.error("Expected 'fn' inside impl block"));
            }
            fns.push(self.parse_fn_decl()?);
        }
        self.consume(&Token::RBrace, "Expected '}' after impl block")?;

        Ok(self.stmt(
            start,
            StmtKind::Impl(ImplBlock {
                target,
                trait_name,
                fns,
            }),
        ))
    }

    /// Trait declarations are accepted syntactically; the body is skipped
    /// because traits are rejected during type checking.
    pub(crate) fn parse_trait_decl(&mut self) -> Result<Stmt, ParseError> {
        let start = self.pos();
        self.advance(); // consume 'trait'

        let name = self.consume_identifier("Expected trait name")?;
        self.skip_braced_block()?;

        Ok(self.stmt(start, StmtKind::TraitDecl(TraitDecl { name })))
    }
}
