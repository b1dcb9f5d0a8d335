// Expression parsing for the Fox language

use super::Parser;
use crate::ParseError;
use fox_ast::*;
use fox_lexer::Token;

impl Parser {
    pub(crate) fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    /// Parse an if/while/for/match head, where a struct literal would
    /// swallow the statement's block.
    pub(crate) fn parse_condition(&mut self) -> Result<Expr, ParseError> {
        let saved = self.no_struct_literal;
        self.no_struct_literal = true;
        let result = self.parse_expression();
        self.no_struct_literal = saved;
        result
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos();
        let mut expr = self.parse_and()?;
        while self.match_token(&Token::Or) {
            let rhs = self.parse_and()?;
            expr = self.expr(
                start,
                ExprKind::Binary {
                    op: BinaryOp::Or,
                    lhs: Box::new(expr),
                    rhs: Box::new(rhs),
                },
            );
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos();
        let mut expr = self.parse_equality()?;
        while self.match_token(&Token::And) {
            let rhs = self.parse_equality()?;
            expr = self.expr(
                start,
                ExprKind::Binary {
                    op: BinaryOp::And,
                    lhs: Box::new(expr),
                    rhs: Box::new(rhs),
                },
            );
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos();
        let mut expr = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::NotEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_comparison()?;
            expr = self.expr(
                start,
                ExprKind::Binary {
                    op,
                    lhs: Box::new(expr),
                    rhs: Box::new(rhs),
                },
            );
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos();
        let mut expr = self.parse_range()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::LtEq) => BinaryOp::LtEq,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::GtEq) => BinaryOp::GtEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_range()?;
            expr = self.expr(
                start,
                ExprKind::Binary {
                    op,
                    lhs: Box::new(expr),
                    rhs: Box::new(rhs),
                },
            );
        }
        Ok(expr)
    }

    /// Ranges are non-associative: a..b and a...b
    fn parse_range(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos();
        let expr = self.parse_additive()?;
        let inclusive = match self.peek() {
            Some(Token::DotDot) => false,
            Some(Token::DotDotDot) => true,
            _ => return Ok(expr),
        };
        self.advance();
        let end = self.parse_additive()?;
        Ok(self.expr(
            start,
            ExprKind::Range {
                inclusive,
                start: Box::new(expr),
                end: Box::new(end),
            },
        ))
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos();
        let mut expr = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            expr = self.expr(
                start,
                ExprKind::Binary {
                    op,
                    lhs: Box::new(expr),
                    rhs: Box::new(rhs),
                },
            );
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos();
        let mut expr = self.parse_cast()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_cast()?;
            expr = self.expr(
                start,
                ExprKind::Binary {
                    op,
                    lhs: Box::new(expr),
                    rhs: Box::new(rhs),
                },
            );
        }
        Ok(expr)
    }

    /// Type cast: expr as Type. Binds tighter than arithmetic, looser
    /// than unary.
    fn parse_cast(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos();
        let mut expr = self.parse_unary()?;
        while self.match_token(&Token::As) {
            let target = self.parse_type()?;
            expr = self.expr(
                start,
                ExprKind::Cast {
                    expr: Box::new(expr),
                    target,
                },
            );
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos();
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Not) => UnaryOp::Not,
            Some(Token::Star) => UnaryOp::Deref,
            Some(Token::Ampersand) => {
                self.advance();
                let op = if self.match_token(&Token::Mut) {
                    UnaryOp::AddrOfMut
                } else {
                    UnaryOp::AddrOf
                };
                let sub = self.parse_unary()?;
                return Ok(self.expr(
                    start,
                    ExprKind::Unary {
                        op,
                        expr: Box::new(sub),
                    },
                ));
            }
            _ => return self.parse_postfix(),
        };
        self.advance();
        let sub = self.parse_unary()?;
        Ok(self.expr(
            start,
            ExprKind::Unary {
                op,
                expr: Box::new(sub),
            },
        ))
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos();
        let mut expr = self.parse_primary()?;

        loop {
            if self.check(&Token::Dot) {
                self.advance();
                match self.peek().cloned() {
                    Some(Token::Ident(name)) => {
                        self.advance();
                        if self.check(&Token::LParen) {
                            let args = self.parse_call_args()?;
                            expr = self.expr(
                                start,
                                ExprKind::MethodCall {
                                    receiver: Box::new(expr),
                                    method: name,
                                    args,
                                },
                            );
                        } else {
                            expr = self.expr(
                                start,
                                ExprKind::FieldAccess {
                                    object: Box::new(expr),
                                    field: name,
                                },
                            );
                        }
                    }
                    Some(Token::IntLiteral(index)) => {
                        self.advance();
                        expr = self.expr(
                            start,
                            ExprKind::TupleField {
                                object: Box::new(expr),
                                index,
                            },
                        );
                    }
                    _ => return Err(self.error("Expected field name or tuple index after '.'")),
                }
            } else if self.check(&Token::LParen) {
                let args = self.parse_call_args()?;
                expr = self.expr(
                    start,
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                );
            } else if self.check(&Token::LBracket) {
                self.advance();
                let saved = self.no_struct_literal;
                self.no_struct_literal = false;
                let index = self.parse_expression()?;
                self.no_struct_literal = saved;
                self.consume(&Token::RBracket, "Expected ']' after subscript")?;
                expr = self.expr(
                    start,
                    ExprKind::Subscript {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                );
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.consume(&Token::LParen, "Expected '('")?;
        let saved = self.no_struct_literal;
        self.no_struct_literal = false;

        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }

        self.no_struct_literal = saved;
        self.consume(&Token::RParen, "Expected ')' after arguments")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos();

        match self.peek().cloned() {
            Some(Token::IntLiteral(v)) => {
                self.advance();
                Ok(self.expr(start, ExprKind::IntLiteral(v)))
            }
            Some(Token::FloatLiteral(v)) => {
                self.advance();
                Ok(self.expr(start, ExprKind::FloatLiteral(v)))
            }
            Some(Token::CharLiteral(v)) => {
                self.advance();
                Ok(self.expr(start, ExprKind::CharLiteral(v)))
            }
            Some(Token::StringLiteral(v)) => {
                self.advance();
                Ok(self.expr(start, ExprKind::StrLiteral(v)))
            }
            Some(Token::True) => {
                self.advance();
                Ok(self.expr(start, ExprKind::BoolLiteral(true)))
            }
            Some(Token::False) => {
                self.advance();
                Ok(self.expr(start, ExprKind::BoolLiteral(false)))
            }
            Some(Token::Noinit) => {
                self.advance();
                Ok(self.expr(start, ExprKind::Noinit))
            }
            Some(Token::If) => self.parse_if(),
            Some(Token::Match) => self.parse_match(),
            Some(Token::Ident(name)) => {
                self.advance();
                if self.check(&Token::ColonColon) {
                    let path = self.parse_path_from(name)?;
                    if self.check(&Token::LBrace) && !self.no_struct_literal {
                        return self.parse_struct_literal(start, path);
                    }
                    return Ok(self.expr(start, ExprKind::Path(path)));
                }
                if self.check(&Token::LBrace) && !self.no_struct_literal {
                    return self.parse_struct_literal(start, vec![name]);
                }
                Ok(self.expr(start, ExprKind::Ident(name)))
            }
            Some(Token::LParen) => self.parse_paren_expr(),
            Some(Token::LBracket) => self.parse_array_literal(),
            Some(Token::LBrace) => {
                let block = self.parse_block()?;
                Ok(self.expr(start, ExprKind::Block(block)))
            }
            _ => Err(self.error("Expected expression")),
        }
    }

    fn parse_if(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos();
        self.advance(); // consume 'if'

        let cond = self.parse_condition()?;
        let then = self.parse_block()?;

        let else_ = if self.match_token(&Token::Else) {
            if self.check(&Token::If) {
                Some(Box::new(self.parse_if()?))
            } else {
                let block_start = self.pos();
                let block = self.parse_block()?;
                Some(Box::new(self.expr(block_start, ExprKind::Block(block))))
            }
        } else {
            None
        };

        Ok(self.expr(
            start,
            ExprKind::If {
                cond: Box::new(cond),
                then,
                else_,
            },
        ))
    }

    fn parse_match(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos();
        self.advance(); // consume 'match'

        let cond = self.parse_condition()?;
        self.consume(&Token::LBrace, "Expected '{' after match condition")?;

        let mut arms = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            let pattern = self.parse_pattern()?;
            self.consume(&Token::FatArrow, "Expected '=>' after match pattern")?;

            let body = if self.check(&Token::LBrace) {
                let body_start = self.pos();
                let block = self.parse_block()?;
                self.expr(body_start, ExprKind::Block(block))
            } else {
                self.parse_arm_body()?
            };

            arms.push(MatchArm { pattern, body });

            if !self.match_token(&Token::Comma) && !self.check(&Token::RBrace) {
                return Err(self.error("Expected ',' between match arms"));
            }
        }

        self.consume(&Token::RBrace, "Expected '}' after match arms")?;
        Ok(self.expr(
            start,
            ExprKind::Match {
                cond: Box::new(cond),
                arms,
            },
        ))
    }

    /// A match arm body may be a statement-like form (`print n`) or any
    /// expression.
    fn parse_arm_body(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos();
        match self.peek() {
            Some(Token::Print) | Some(Token::Puts) => {
                let newline = self.check(&Token::Print);
                self.advance();
                let arg = self.parse_expression()?;
                let span = start..self.prev_end();
                let stmt = Stmt {
                    kind: StmtKind::Print {
                        newline,
                        arg,
                    },
                    span: span.clone(),
                };
                Ok(Expr {
                    kind: ExprKind::Block(Block { stmts: vec![stmt] }),
                    span,
                })
            }
            _ => self.parse_expression(),
        }
    }

    fn parse_paren_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos();
        self.advance(); // consume '('
        let saved = self.no_struct_literal;
        self.no_struct_literal = false;

        let first = self.parse_expression()?;

        if self.match_token(&Token::Comma) {
            let mut elems = vec![first];
            while !self.check(&Token::RParen) {
                elems.push(self.parse_expression()?);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
            self.no_struct_literal = saved;
            self.consume(&Token::RParen, "Expected ')' after tuple literal")?;
            return Ok(self.expr(start, ExprKind::TupleLit(elems)));
        }

        self.no_struct_literal = saved;
        self.consume(&Token::RParen, "Expected ')' after expression")?;
        Ok(first)
    }

    /// Array and slice literals: [3]int { .. }, []int { .. }, [..]int { .. }
    fn parse_array_literal(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos();
        self.advance(); // consume '['

        let (count, is_slice) = match self.peek().cloned() {
            Some(Token::DotDot) => {
                self.advance();
                (None, true)
            }
            Some(Token::IntLiteral(n)) if n >= 0 => {
                self.advance();
                (Some(n as u64), false)
            }
            Some(Token::RBracket) => (None, false),
            _ => return Err(self.error("Expected array length, '..' or ']'")),
        };
        self.consume(&Token::RBracket, "Expected ']' in array literal")?;

        let elem = if self.check(&Token::LBrace) {
            None
        } else {
            Some(self.parse_type()?)
        };

        self.consume(&Token::LBrace, "Expected '{' in array literal")?;
        let saved = self.no_struct_literal;
        self.no_struct_literal = false;

        let mut elems = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            elems.push(self.parse_expression()?);
            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        self.no_struct_literal = saved;
        self.consume(&Token::RBrace, "Expected '}' after array elements")?;

        Ok(self.expr(
            start,
            ExprKind::ArrayLit {
                count,
                elem,
                is_slice,
                elems,
            },
        ))
    }

    fn parse_struct_literal(
        &mut self,
        start: usize,
        name: Vec<String>,
    ) -> Result<Expr, ParseError> {
        self.consume(&Token::LBrace, "Expected '{' in struct literal")?;
        let saved = self.no_struct_literal;
        self.no_struct_literal = false;

        let mut fields = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            let field_start = self.pos();
            let field = self.consume_identifier("Expected field name in struct literal")?;
            let value = if self.match_token(&Token::Colon) {
                self.parse_expression()?
            } else {
                // Shorthand: `P { x }` binds the field from a variable of
                // the same name.
                self.expr(field_start, ExprKind::Ident(field.clone()))
            };
            fields.push((field, value));
            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        self.no_struct_literal = saved;
        self.consume(&Token::RBrace, "Expected '}' after struct literal")?;
        Ok(self.expr(start, ExprKind::StructLit { name, fields }))
    }
}
