// Pattern parsing for the Fox language

use super::Parser;
use crate::ParseError;
use fox_ast::*;
use fox_lexer::Token;

impl Parser {
    pub(crate) fn parse_pattern(&mut self) -> Result<Pattern, ParseError> {
        let start = self.pos();

        match self.peek().cloned() {
            Some(Token::Underscore) => {
                self.advance();
                Ok(self.pattern(start, PatternKind::Underscore))
            }
            Some(Token::Mut) => {
                self.advance();
                let name = self.consume_identifier("Expected identifier after 'mut'")?;
                Ok(self.pattern(start, PatternKind::Ident { is_mut: true, name }))
            }
            Some(Token::LParen) => {
                self.advance();
                let mut subs = Vec::new();
                while !self.check(&Token::RParen) {
                    subs.push(self.parse_pattern()?);
                    if !self.match_token(&Token::Comma) {
                        break;
                    }
                }
                self.consume(&Token::RParen, "Expected ')' in tuple pattern")?;
                Ok(self.pattern(start, PatternKind::Tuple(subs)))
            }
            Some(Token::Ident(name)) => {
                self.advance();
                if self.check(&Token::ColonColon) {
                    let path = self.parse_path_from(name)?;
                    if self.check(&Token::LBrace) {
                        return self.parse_struct_pattern(start, path);
                    }
                    let mut args = Vec::new();
                    if self.match_token(&Token::LParen) {
                        while !self.check(&Token::RParen) {
                            args.push(self.parse_pattern()?);
                            if !self.match_token(&Token::Comma) {
                                break;
                            }
                        }
                        self.consume(&Token::RParen, "Expected ')' in enum pattern")?;
                    }
                    return Ok(self.pattern(start, PatternKind::Enum { path, args }));
                }
                if self.check(&Token::LBrace) && !self.no_struct_literal {
                    return self.parse_struct_pattern(start, vec![name]);
                }
                Ok(self.pattern(start, PatternKind::Ident { is_mut: false, name }))
            }
            // Constant patterns, only legal in match arms
            Some(Token::IntLiteral(_))
            | Some(Token::FloatLiteral(_))
            | Some(Token::CharLiteral(_))
            | Some(Token::StringLiteral(_))
            | Some(Token::True)
            | Some(Token::False)
            | Some(Token::Minus) => {
                let value = self.parse_expression()?;
                Ok(self.pattern(start, PatternKind::Value(value)))
            }
            _ => Err(self.error("Expected pattern")),
        }
    }

    fn parse_struct_pattern(
        &mut self,
        start: usize,
        name: Vec<String>,
    ) -> Result<Pattern, ParseError> {
        self.consume(&Token::LBrace, "Expected '{' in struct pattern")?;

        let mut fields = Vec::new();
        let mut has_rest = false;
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            if self.match_token(&Token::DotDot) {
                has_rest = true;
                break;
            }
            let field_start = self.pos();
            let mutable = self.match_token(&Token::Mut);
            let field = self.consume_identifier("Expected field name in struct pattern")?;
            let sub = if !mutable && self.match_token(&Token::Colon) {
                self.parse_pattern()?
            } else {
                // Shorthand: `P { x }` / `P { mut x }` binds the field to a
                // variable of the same name.
                self.pattern(
                    field_start,
                    PatternKind::Ident {
                        is_mut: mutable,
                        name: field.clone(),
                    },
                )
            };
            fields.push((field, sub));
            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        self.consume(&Token::RBrace, "Expected '}' after struct pattern")?;
        Ok(self.pattern(
            start,
            PatternKind::Struct {
                name,
                fields,
                has_rest,
            },
        ))
    }
}
