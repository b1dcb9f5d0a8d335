// Statement parsing for the Fox language

use super::Parser;
use crate::ParseError;
use fox_ast::*;
use fox_lexer::Token;

impl Parser {
    pub(crate) fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.pos();

        match self.peek() {
            Some(Token::Fn) => {
                let decl = self.parse_fn_decl()?;
                Ok(self.stmt(start, StmtKind::Fn(decl)))
            }
            Some(Token::Struct) => self.parse_struct_decl(),
            Some(Token::Enum) => self.parse_enum_decl(),
            Some(Token::Impl) => self.parse_impl_block(),
            Some(Token::Trait) => self.parse_trait_decl(),
            Some(Token::Import) => self.parse_import(),
            Some(Token::Let) => self.parse_let(false),
            Some(Token::Const) => self.parse_let(true),
            Some(Token::Return) => self.parse_return(),
            Some(Token::While) => self.parse_while(),
            Some(Token::For) => self.parse_for(),
            Some(Token::Print) => self.parse_print(true),
            Some(Token::Puts) => self.parse_print(false),
            Some(Token::Defer) => {
                self.advance();
                let inner = self.parse_statement()?;
                Ok(self.stmt(start, StmtKind::Defer(Box::new(inner))))
            }
            _ => self.parse_expr_or_assign(),
        }
    }

    fn parse_let(&mut self, is_const: bool) -> Result<Stmt, ParseError> {
        let start = self.pos();
        self.advance(); // consume 'let' / 'const'

        let pattern = self.parse_pattern()?;

        let ty = if self.match_token(&Token::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let init = if self.match_token(&Token::Eq) {
            let value = self.parse_expression()?;
            // `= noinit` is spelled like an initializer but means "reserve
            // zeroed storage", the same as omitting the initializer.
            match value.kind {
                ExprKind::Noinit => None,
                _ => Some(value),
            }
        } else {
            None
        };

        self.consume(&Token::Semicolon, "Expected ';' after let declaration")?;
        Ok(self.stmt(
            start,
            StmtKind::Let {
                is_const,
                pattern,
                ty,
                init,
            },
        ))
    }

    fn parse_return(&mut self) -> Result<Stmt, ParseError> {
        let start = self.pos();
        self.advance(); // consume 'return'

        let value = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };

        self.consume(&Token::Semicolon, "Expected ';' after return")?;
        Ok(self.stmt(start, StmtKind::Return(value)))
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        let start = self.pos();
        self.advance(); // consume 'while'

        let cond = self.parse_condition()?;
        let body = self.parse_block()?;

        Ok(self.stmt(start, StmtKind::While { cond, body }))
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        let start = self.pos();
        self.advance(); // consume 'for'

        let pattern = self.parse_pattern()?;

        let counter = if self.match_token(&Token::Comma) {
            Some(self.consume_identifier("Expected counter name after ','")?)
        } else {
            None
        };

        self.consume(&Token::In, "Expected 'in' in for loop")?;
        let iterable = self.parse_condition()?;
        let body = self.parse_block()?;

        Ok(self.stmt(
            start,
            StmtKind::For {
                pattern,
                counter,
                iterable,
                body,
            },
        ))
    }

    fn parse_print(&mut self, newline: bool) -> Result<Stmt, ParseError> {
        let start = self.pos();
        self.advance(); // consume 'print' / 'puts'

        let arg = self.parse_expression()?;
        self.consume(&Token::Semicolon, "Expected ';' after print")?;

        Ok(self.stmt(start, StmtKind::Print { newline, arg }))
    }

    fn parse_import(&mut self) -> Result<Stmt, ParseError> {
        let start = self.pos();
        self.advance(); // consume 'import'

        let first = self.consume_identifier("Expected module path after 'import'")?;
        let path = self.parse_path_from(first)?;

        let alias = if self.match_token(&Token::As) {
            Some(self.consume_identifier("Expected alias after 'as'")?)
        } else {
            None
        };

        self.consume(&Token::Semicolon, "Expected ';' after import")?;
        Ok(self.stmt(start, StmtKind::Import { path, alias }))
    }

    /// Expression statement, possibly an assignment or compound assignment.
    fn parse_expr_or_assign(&mut self) -> Result<Stmt, ParseError> {
        let start = self.pos();
        let expr = self.parse_expression()?;

        let compound: Option<BinaryOp> = match self.peek() {
            Some(Token::Eq) => None,
            Some(Token::PlusEq) => Some(BinaryOp::Add),
            Some(Token::MinusEq) => Some(BinaryOp::Sub),
            Some(Token::StarEq) => Some(BinaryOp::Mul),
            Some(Token::SlashEq) => Some(BinaryOp::Div),
            Some(Token::PercentEq) => Some(BinaryOp::Mod),
            _ => {
                // Plain expression statement. The trailing semicolon is
                // optional after brace-ended expressions.
                let needs_semicolon = !matches!(
                    expr.kind,
                    ExprKind::If { .. } | ExprKind::Match { .. } | ExprKind::Block(_)
                );
                if needs_semicolon {
                    self.consume(&Token::Semicolon, "Expected ';' after expression")?;
                } else {
                    self.match_token(&Token::Semicolon);
                }
                return Ok(self.stmt(start, StmtKind::Expr(expr)));
            }
        };

        self.advance(); // consume the (compound) assignment operator
        let rhs = self.parse_expression()?;
        self.consume(&Token::Semicolon, "Expected ';' after assignment")?;

        // `x += e` desugars to `x = x + e` over a cloned target.
        let value = match compound {
            None => rhs,
            Some(op) => Expr {
                span: expr.span.start..rhs.span.end,
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(expr.clone()),
                    rhs: Box::new(rhs),
                },
            },
        };

        Ok(self.stmt(
            start,
            StmtKind::Assign {
                target: expr,
                value,
            },
        ))
    }
}
