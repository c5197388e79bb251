//! Expression parser using precedence climbing
//!
//! Operator precedence and associativity come from [`BinaryOp`]. Unary minus
//! binds tighter than any binary operator; member access, calls and indexers
//! bind tighter still.

use crate::lexer::Token;
use crate::parser::Parser;
use octofhir_fml_ast::{BinaryOp, Expression, UnaryOp};
use octofhir_fml_diagnostics::{Result, Span};

impl Parser<'_> {
    /// Parse a full expression
    pub fn expression(&mut self) -> Result<Expression> {
        let span = self.peek()?.map(|t| t.span).unwrap_or(Span::point(0));
        self.descend(span)?;
        let expression = self.binary(1)?;
        self.ascend();
        Ok(expression)
    }

    /// Parse `(arg, ...)` contents up to and including the closing `)`
    pub fn argument_expressions(&mut self) -> Result<Vec<Expression>> {
        let mut args = Vec::new();
        if !self.check(&Token::RightParen)? {
            loop {
                args.push(self.expression()?);
                if !self.eat(&Token::Comma)? {
                    break;
                }
            }
        }
        self.expect(Token::RightParen, "')'")?;
        Ok(args)
    }

    fn binary(&mut self, min_precedence: u8) -> Result<Expression> {
        let mut left = self.unary()?;
        while let Some(op) = self.peek_binary_op()? {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.advance("operator")?;
            let next = if op.is_right_associative() {
                precedence
            } else {
                precedence + 1
            };
            let right = self.binary(next)?;
            left = Expression::binary(op, left, right);
        }
        Ok(left)
    }

    fn peek_binary_op(&mut self) -> Result<Option<BinaryOp>> {
        Ok(self.peek()?.and_then(|t| match &t.inner {
            Token::Identifier(word) => BinaryOp::from_keyword(word),
            Token::Equal => Some(BinaryOp::Equal),
            Token::NotEqual => Some(BinaryOp::NotEqual),
            Token::Tilde => Some(BinaryOp::Equivalent),
            Token::Less => Some(BinaryOp::Less),
            Token::LessEqual => Some(BinaryOp::LessOrEqual),
            Token::Greater => Some(BinaryOp::Greater),
            Token::GreaterEqual => Some(BinaryOp::GreaterOrEqual),
            Token::Pipe => Some(BinaryOp::Union),
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Subtract),
            Token::Ampersand => Some(BinaryOp::Concatenate),
            Token::Star => Some(BinaryOp::Multiply),
            Token::Slash => Some(BinaryOp::Divide),
            _ => None,
        }))
    }

    fn unary(&mut self) -> Result<Expression> {
        // `-5` is a negative literal, read by `primary`
        let negate = self.check(&Token::Minus)?
            && !self
                .peek_nth(1)?
                .is_some_and(|t| matches!(t.inner, Token::Integer(_) | Token::Decimal(_)));
        if negate {
            let span = self.advance("'-'")?.span;
            self.descend(span)?;
            let operand = self.unary()?;
            self.ascend();
            return Ok(Expression::Unary {
                op: UnaryOp::Negate,
                operand: Box::new(operand),
            });
        }
        let primary = self.primary()?;
        self.postfix(primary)
    }

    fn postfix(&mut self, mut expression: Expression) -> Result<Expression> {
        loop {
            if self.eat(&Token::Dot)? {
                let name = self.name("member name")?.inner;
                expression = if self.eat(&Token::LeftParen)? {
                    let args = self.argument_expressions()?;
                    Expression::call(Some(expression), name, args)
                } else {
                    Expression::member(expression, name)
                };
            } else if self.eat(&Token::LeftBracket)? {
                let index = self.expression()?;
                self.expect(Token::RightBracket, "']'")?;
                expression = Expression::Index {
                    target: Box::new(expression),
                    index: Box::new(index),
                };
            } else {
                return Ok(expression);
            }
        }
    }

    fn primary(&mut self) -> Result<Expression> {
        if let Some(literal) = self.literal()? {
            return Ok(Expression::Literal(literal));
        }
        match self.peek_token()? {
            Some(Token::LeftParen) => {
                self.advance("'('")?;
                let inner = self.expression()?;
                self.expect(Token::RightParen, "')'")?;
                Ok(inner)
            }
            Some(Token::LeftBrace) => {
                self.advance("'{'")?;
                self.expect(Token::RightBrace, "'}'")?;
                Ok(Expression::Empty)
            }
            Some(Token::Percent) => {
                self.advance("'%'")?;
                let name = match self.peek_token()? {
                    Some(Token::String(name)) => {
                        self.advance("constant name")?;
                        name
                    }
                    _ => self.name("constant name")?.inner,
                };
                Ok(Expression::Constant(name))
            }
            Some(Token::Variable(name)) if name == "this" => {
                self.advance("'$this'")?;
                Ok(Expression::This)
            }
            Some(Token::Identifier(name)) if self.check_nth(1, &Token::LeftParen)? => {
                self.advance("function name")?;
                self.advance("'('")?;
                let args = self.argument_expressions()?;
                Ok(Expression::call(None, name, args))
            }
            Some(Token::Identifier(_) | Token::DelimitedIdentifier(_)) => {
                Ok(Expression::Identifier(self.name("identifier")?.inner))
            }
            _ => Err(self.unexpected("expression")),
        }
    }
}
