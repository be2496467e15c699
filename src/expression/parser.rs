use crate::{
    error::{EngineError, EngineResult, ErrorKind},
    value::Value,
};

use super::token::{ExprToken, ExprTokenKind};

/// A parsed expression. Offsets are relative to the start of the expression
/// text.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal {
        value: Value,
        offset: usize,
    },
    /// A dotted identifier path resolved against the context.
    Ident {
        path: String,
        offset: usize,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        offset: usize,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        offset: usize,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        offset: usize,
    },
}

impl Expr {
    /// A constant expression used where an attribute was missing; evaluates
    /// to nil, which is falsy.
    pub fn nil() -> Expr {
        Expr::Literal {
            value: Value::Null,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Recursive-descent parser over expression tokens, one level per precedence
/// tier: `||` < `&&` < equality < ordering < unary `!` < primary.
#[derive(Debug)]
pub struct ExprParser {
    tokens: Vec<ExprToken>,
    index: usize,
}

impl ExprParser {
    pub fn new(tokens: Vec<ExprToken>) -> ExprParser {
        ExprParser { tokens, index: 0 }
    }

    pub fn parse(mut self) -> EngineResult<Expr> {
        let expression = self.parse_or()?;
        self.expect(ExprTokenKind::Eof)?;
        Ok(expression)
    }

    fn parse_or(&mut self) -> EngineResult<Expr> {
        let mut lhs = self.parse_and()?;

        while self.peek_kind() == ExprTokenKind::Or {
            let offset = self.next().offset;
            let rhs = self.parse_and()?;
            lhs = Expr::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                offset,
            };
        }

        Ok(lhs)
    }

    fn parse_and(&mut self) -> EngineResult<Expr> {
        let mut lhs = self.parse_equality()?;

        while self.peek_kind() == ExprTokenKind::And {
            let offset = self.next().offset;
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary {
                op: BinaryOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                offset,
            };
        }

        Ok(lhs)
    }

    fn parse_equality(&mut self) -> EngineResult<Expr> {
        let mut lhs = self.parse_ordering()?;

        loop {
            let op = match self.peek_kind() {
                ExprTokenKind::EqEq => BinaryOp::Eq,
                ExprTokenKind::NotEq => BinaryOp::Ne,
                _ => break,
            };

            let offset = self.next().offset;
            let rhs = self.parse_ordering()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                offset,
            };
        }

        Ok(lhs)
    }

    fn parse_ordering(&mut self) -> EngineResult<Expr> {
        let mut lhs = self.parse_unary()?;

        loop {
            let op = match self.peek_kind() {
                ExprTokenKind::Lt => BinaryOp::Lt,
                ExprTokenKind::Le => BinaryOp::Le,
                ExprTokenKind::Gt => BinaryOp::Gt,
                ExprTokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };

            let offset = self.next().offset;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                offset,
            };
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> EngineResult<Expr> {
        if self.peek_kind() == ExprTokenKind::Bang {
            let offset = self.next().offset;
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
                offset,
            });
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> EngineResult<Expr> {
        let token = self.next();

        match token.kind {
            ExprTokenKind::Str => Ok(Expr::Literal {
                value: Value::String(token.text),
                offset: token.offset,
            }),
            ExprTokenKind::Int => {
                let value = token.text.parse::<i64>().map_err(|_| {
                    EngineError::new(
                        ErrorKind::ExprParse,
                        format!("integer literal out of range at offset {}", token.offset),
                    )
                })?;
                Ok(Expr::Literal {
                    value: Value::Int(value),
                    offset: token.offset,
                })
            }
            ExprTokenKind::Float => {
                let value = token.text.parse::<f64>().map_err(|_| {
                    EngineError::new(
                        ErrorKind::ExprParse,
                        format!("malformed float literal at offset {}", token.offset),
                    )
                })?;
                Ok(Expr::Literal {
                    value: Value::Float(value),
                    offset: token.offset,
                })
            }
            ExprTokenKind::True => Ok(Expr::Literal {
                value: Value::Bool(true),
                offset: token.offset,
            }),
            ExprTokenKind::False => Ok(Expr::Literal {
                value: Value::Bool(false),
                offset: token.offset,
            }),
            ExprTokenKind::Nil => Ok(Expr::Literal {
                value: Value::Null,
                offset: token.offset,
            }),
            ExprTokenKind::Ident => {
                if self.peek_kind() == ExprTokenKind::LParen {
                    return self.parse_call(token);
                }
                Ok(Expr::Ident {
                    path: token.text,
                    offset: token.offset,
                })
            }
            ExprTokenKind::LParen => {
                let inner = self.parse_or()?;
                self.expect(ExprTokenKind::RParen)?;
                Ok(inner)
            }
            _ => Err(EngineError::new(
                ErrorKind::ExprParse,
                format!(
                    "unexpected token '{}' at offset {}",
                    describe(&token),
                    token.offset
                ),
            )),
        }
    }

    fn parse_call(&mut self, name: ExprToken) -> EngineResult<Expr> {
        if name.text.contains('.') {
            return Err(EngineError::new(
                ErrorKind::ExprParse,
                format!(
                    "function name '{}' cannot be a dotted path (offset {})",
                    name.text, name.offset
                ),
            ));
        }

        self.expect(ExprTokenKind::LParen)?;

        let mut args = vec![];
        if self.peek_kind() != ExprTokenKind::RParen {
            loop {
                args.push(self.parse_or()?);
                if self.peek_kind() != ExprTokenKind::Comma {
                    break;
                }
                self.next();
            }
        }
        self.expect(ExprTokenKind::RParen)?;

        Ok(Expr::Call {
            name: name.text,
            args,
            offset: name.offset,
        })
    }

    fn expect(&mut self, kind: ExprTokenKind) -> EngineResult<ExprToken> {
        let token = self.next();
        if token.kind != kind {
            return Err(EngineError::new(
                ErrorKind::ExprParse,
                format!(
                    "expected {kind:?}, found '{}' at offset {}",
                    describe(&token),
                    token.offset
                ),
            ));
        }
        Ok(token)
    }

    fn peek_kind(&self) -> ExprTokenKind {
        self.tokens
            .get(self.index)
            .map(|token| token.kind)
            .unwrap_or(ExprTokenKind::Eof)
    }

    fn next(&mut self) -> ExprToken {
        let token = self
            .tokens
            .get(self.index)
            .cloned()
            .unwrap_or(ExprToken::new(ExprTokenKind::Eof, "", 0));
        self.index += 1;
        token
    }
}

fn describe(token: &ExprToken) -> String {
    if token.kind == ExprTokenKind::Eof {
        "end of expression".to_owned()
    } else {
        token.text.clone()
    }
}
