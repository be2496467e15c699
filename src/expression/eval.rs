use std::cmp::Ordering;

use crate::{context::Context, error::EngineResult, value::Value};

use super::parser::{BinaryOp, Expr, UnaryOp};

/// Dispatches function calls encountered during evaluation. The executor
/// supplies an implementation that consults the function registry and runs
/// user-registered functions inside the isolation envelope.
pub trait FunctionCaller {
    fn call_function(&self, name: &str, args: Vec<Value>) -> EngineResult<Value>;
}

/// Evaluates expressions against a context. The language is closed: no
/// assignment, no method calls, no resolver access.
pub struct Evaluator<'a> {
    context: &'a Context,
    functions: &'a dyn FunctionCaller,
}

impl<'a> Evaluator<'a> {
    pub fn new(context: &'a Context, functions: &'a dyn FunctionCaller) -> Self {
        Self { context, functions }
    }

    pub fn evaluate(&self, expression: &Expr) -> EngineResult<Value> {
        match expression {
            Expr::Literal { value, .. } => Ok(value.clone()),
            Expr::Ident { path, .. } => Ok(self.context.resolve_path(path)),
            Expr::Unary { op: UnaryOp::Not, operand, .. } => {
                let value = self.evaluate(operand)?;
                Ok(Value::Bool(!value.is_truthy()))
            }
            Expr::Binary { op, lhs, rhs, .. } => self.evaluate_binary(*op, lhs, rhs),
            Expr::Call { name, args, .. } => {
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(self.evaluate(arg)?);
                }
                self.functions.call_function(name, evaluated)
            }
        }
    }

    fn evaluate_binary(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> EngineResult<Value> {
        // || and && short-circuit on the truthiness of the left side.
        match op {
            BinaryOp::Or => {
                if self.evaluate(lhs)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                return Ok(Value::Bool(self.evaluate(rhs)?.is_truthy()));
            }
            BinaryOp::And => {
                if !self.evaluate(lhs)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                return Ok(Value::Bool(self.evaluate(rhs)?.is_truthy()));
            }
            _ => {}
        }

        let left = self.evaluate(lhs)?;
        let right = self.evaluate(rhs)?;

        let result = match op {
            BinaryOp::Eq => left.loosely_equals(&right),
            BinaryOp::Ne => !left.loosely_equals(&right),
            BinaryOp::Lt => left.compare(&right)? == Ordering::Less,
            BinaryOp::Le => left.compare(&right)? != Ordering::Greater,
            BinaryOp::Gt => left.compare(&right)? == Ordering::Greater,
            BinaryOp::Ge => left.compare(&right)? != Ordering::Less,
            BinaryOp::Or | BinaryOp::And => unreachable!("handled above"),
        };

        Ok(Value::Bool(result))
    }
}
