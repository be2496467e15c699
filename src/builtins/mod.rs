use std::sync::Arc;

use crate::{
    error::EngineResult,
    registry::{FnFunction, FunctionRegistry},
    value::Value,
};

/// Register the built-in expression functions. All of them are pure; they
/// run directly instead of through the isolation envelope.
pub fn register_builtins(registry: &FunctionRegistry) -> EngineResult<()> {
    registry.register_builtin(Arc::new(FnFunction::new("length", 1, 1, length)))?;
    registry.register_builtin(Arc::new(FnFunction::new("contains", 2, 2, contains)))?;
    registry.register_builtin(Arc::new(FnFunction::new("trim", 1, 1, trim)))?;
    registry.register_builtin(Arc::new(FnFunction::new("upper", 1, 1, upper)))?;
    registry.register_builtin(Arc::new(FnFunction::new("lower", 1, 1, lower)))?;
    registry.register_builtin(Arc::new(FnFunction::new("min", 1, -1, min)))?;
    registry.register_builtin(Arc::new(FnFunction::new("max", 1, -1, max)))?;
    registry.register_builtin(Arc::new(FnFunction::new("abs", 1, 1, abs)))?;

    registry.register_builtin(Arc::new(FnFunction::new("is_nil", 1, 1, |args: &[Value]| {
        Ok(Value::Bool(args[0].is_null()))
    })))?;
    registry.register_builtin(Arc::new(FnFunction::new("is_bool", 1, 1, |args: &[Value]| {
        Ok(Value::Bool(matches!(args[0], Value::Bool(_))))
    })))?;
    registry.register_builtin(Arc::new(FnFunction::new(
        "is_number",
        1,
        1,
        |args: &[Value]| Ok(Value::Bool(args[0].is_number())),
    )))?;
    registry.register_builtin(Arc::new(FnFunction::new(
        "is_string",
        1,
        1,
        |args: &[Value]| Ok(Value::Bool(matches!(args[0], Value::String(_)))),
    )))?;
    registry.register_builtin(Arc::new(FnFunction::new("is_seq", 1, 1, |args: &[Value]| {
        Ok(Value::Bool(matches!(args[0], Value::Seq(_))))
    })))?;
    registry.register_builtin(Arc::new(FnFunction::new("is_map", 1, 1, |args: &[Value]| {
        Ok(Value::Bool(matches!(args[0], Value::Map(_))))
    })))?;

    Ok(())
}

/// Characters of a string, or element/entry count of a sequence/mapping.
fn length(args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::String(value) => Ok(Value::Int(value.chars().count() as i64)),
        Value::Seq(items) => Ok(Value::Int(items.len() as i64)),
        Value::Map(entries) => Ok(Value::Int(entries.len() as i64)),
        other => Err(format!("length expects a string, sequence or mapping, got {}", other.type_name())),
    }
}

/// Substring test for strings, membership test for sequences.
fn contains(args: &[Value]) -> Result<Value, String> {
    match (&args[0], &args[1]) {
        (Value::String(haystack), Value::String(needle)) => {
            Ok(Value::Bool(haystack.contains(needle.as_str())))
        }
        (Value::Seq(items), needle) => Ok(Value::Bool(
            items.iter().any(|item| item.loosely_equals(needle)),
        )),
        (other, _) => Err(format!(
            "contains expects a string or sequence, got {}",
            other.type_name()
        )),
    }
}

fn trim(args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::String(value) => Ok(Value::from(value.trim())),
        other => Err(format!("trim expects a string, got {}", other.type_name())),
    }
}

fn upper(args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::String(value) => Ok(Value::String(value.to_uppercase())),
        other => Err(format!("upper expects a string, got {}", other.type_name())),
    }
}

fn lower(args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::String(value) => Ok(Value::String(value.to_lowercase())),
        other => Err(format!("lower expects a string, got {}", other.type_name())),
    }
}

fn min(args: &[Value]) -> Result<Value, String> {
    fold_numeric(args, "min", |best, candidate| candidate < best)
}

fn max(args: &[Value]) -> Result<Value, String> {
    fold_numeric(args, "max", |best, candidate| candidate > best)
}

fn fold_numeric(
    args: &[Value],
    name: &str,
    replace: impl Fn(f64, f64) -> bool,
) -> Result<Value, String> {
    let mut winner = &args[0];
    let mut winner_key = numeric(winner, name)?;

    for candidate in &args[1..] {
        let key = numeric(candidate, name)?;
        if replace(winner_key, key) {
            winner = candidate;
            winner_key = key;
        }
    }

    Ok(winner.clone())
}

fn abs(args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::Int(value) => Ok(Value::Int(value.saturating_abs())),
        Value::Float(value) => Ok(Value::Float(value.abs())),
        other => Err(format!("abs expects a number, got {}", other.type_name())),
    }
}

fn numeric(value: &Value, name: &str) -> Result<f64, String> {
    match value {
        Value::Int(value) => Ok(*value as f64),
        Value::Float(value) => Ok(*value),
        other => Err(format!("{name} expects numbers, got {}", other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Result<Value, String> {
        let registry = FunctionRegistry::new();
        register_builtins(&registry).expect("should register");

        registry
            .get(name)
            .expect("builtin should exist")
            .handle
            .evaluate(args)
    }

    #[test]
    fn test_length() {
        assert_eq!(Ok(Value::Int(5)), call("length", &[Value::from("héllo")]));
        assert_eq!(
            Ok(Value::Int(2)),
            call("length", &[Value::Seq(vec![Value::Int(1), Value::Int(2)])])
        );
        assert!(call("length", &[Value::Int(3)]).is_err());
    }

    #[test]
    fn test_contains() {
        assert_eq!(
            Ok(Value::Bool(true)),
            call("contains", &[Value::from("haystack"), Value::from("stack")])
        );
        assert_eq!(
            Ok(Value::Bool(true)),
            call(
                "contains",
                &[
                    Value::Seq(vec![Value::Int(1), Value::Int(2)]),
                    Value::Float(2.0)
                ]
            )
        );
        assert_eq!(
            Ok(Value::Bool(false)),
            call("contains", &[Value::Seq(vec![]), Value::Int(1)])
        );
    }

    #[test]
    fn test_string_helpers() {
        assert_eq!(Ok(Value::from("x")), call("trim", &[Value::from("  x  ")]));
        assert_eq!(Ok(Value::from("ABC")), call("upper", &[Value::from("abc")]));
        assert_eq!(Ok(Value::from("abc")), call("lower", &[Value::from("ABC")]));
    }

    #[test]
    fn test_min_max_preserve_types() {
        assert_eq!(
            Ok(Value::Int(1)),
            call("min", &[Value::Int(3), Value::Int(1), Value::Float(2.5)])
        );
        assert_eq!(
            Ok(Value::Float(3.5)),
            call("max", &[Value::Int(3), Value::Float(3.5)])
        );
        assert!(call("min", &[Value::from("a")]).is_err());
    }

    #[test]
    fn test_abs() {
        assert_eq!(Ok(Value::Int(4)), call("abs", &[Value::Int(-4)]));
        assert_eq!(Ok(Value::Float(0.5)), call("abs", &[Value::Float(-0.5)]));
    }

    #[test]
    fn test_predicates() {
        assert_eq!(Ok(Value::Bool(true)), call("is_nil", &[Value::Null]));
        assert_eq!(Ok(Value::Bool(true)), call("is_number", &[Value::Float(1.0)]));
        assert_eq!(Ok(Value::Bool(false)), call("is_string", &[Value::Int(1)]));
        assert_eq!(Ok(Value::Bool(true)), call("is_seq", &[Value::Seq(vec![])]));
    }
}
