// Type signature parsing for the Fox language

use super::Parser;
use crate::ParseError;
use fox_ast::*;
use fox_lexer::Token;

impl Parser {
    pub(crate) fn parse_type(&mut self) -> Result<TypeSig, ParseError> {
        match self.peek().cloned() {
            // *T and *mut T
            Some(Token::Star) => {
                self.advance();
                let is_mut = self.match_token(&Token::Mut);
                let inner = self.parse_type()?;
                Ok(TypeSig::Ptr {
                    is_mut,
                    inner: Box::new(inner),
                })
            }
            // [3]T and [..]T
            Some(Token::LBracket) => {
                self.advance();
                if self.match_token(&Token::DotDot) {
                    self.consume(&Token::RBracket, "Expected ']' in slice type")?;
                    let elem = self.parse_type()?;
                    return Ok(TypeSig::Slice {
                        elem: Box::new(elem),
                    });
                }
                let count = match self.peek().cloned() {
                    Some(Token::IntLiteral(n)) if n >= 0 => {
                        self.advance();
                        n as u64
                    }
                    _ => return Err(self.error("Expected array length or '..' in type")),
                };
                self.consume(&Token::RBracket, "Expected ']' in array type")?;
                let elem = self.parse_type()?;
                Ok(TypeSig::Array {
                    count,
                    elem: Box::new(elem),
                })
            }
            // (T, U), (T) -> R, (T)
            Some(Token::LParen) => {
                self.advance();
                let mut elems = Vec::new();
                let mut saw_comma = false;
                while !self.check(&Token::RParen) {
                    elems.push(self.parse_type()?);
                    if self.match_token(&Token::Comma) {
                        saw_comma = true;
                    } else {
                        break;
                    }
                }
                self.consume(&Token::RParen, "Expected ')' in type")?;

                if self.match_token(&Token::Arrow) {
                    let ret = self.parse_type()?;
                    return Ok(TypeSig::Fn {
                        params: elems,
                        ret: Box::new(ret),
                    });
                }

                if elems.len() == 1 && !saw_comma {
                    let mut elems = elems;
                    return elems.pop().ok_or_else(|| self.error("Empty type list"));
                }
                Ok(TypeSig::Tuple(elems))
            }
            Some(Token::Ident(name)) => {
                self.advance();
                if self.check(&Token::ColonColon) {
                    let path = self.parse_path_from(name)?;
                    return Ok(TypeSig::Path(path));
                }
                Ok(TypeSig::Named(name))
            }
            _ => Err(self.error("Expected type")),
        }
    }
}
