use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, PoisonError, RwLock},
};

use crate::{
    error::{EngineError, EngineResult, ErrorKind},
    value::Value,
};

use super::check_registrable_name;

/// A pure function callable from expressions.
///
/// `max_args` of −1 means variadic. Implementations must be side-effect
/// free: no I/O, no hidden state.
pub trait Function: Send + Sync {
    fn name(&self) -> &str;

    fn min_args(&self) -> usize;

    fn max_args(&self) -> isize;

    fn evaluate(&self, args: &[Value]) -> Result<Value, String>;
}

/// Convenience function built from a closure.
pub struct FnFunction {
    name: String,
    min_args: usize,
    max_args: isize,
    evaluate: Box<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>,
}

impl FnFunction {
    pub fn new(
        name: impl ToString,
        min_args: usize,
        max_args: isize,
        evaluate: impl Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    ) -> FnFunction {
        FnFunction {
            name: name.to_string(),
            min_args,
            max_args,
            evaluate: Box::new(evaluate),
        }
    }
}

impl Function for FnFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_args(&self) -> usize {
        self.min_args
    }

    fn max_args(&self) -> isize {
        self.max_args
    }

    fn evaluate(&self, args: &[Value]) -> Result<Value, String> {
        (self.evaluate)(args)
    }
}

pub struct FunctionEntry {
    pub handle: Arc<dyn Function>,
    /// Built-ins run directly; user functions run inside the envelope.
    pub builtin: bool,
}

impl Clone for FunctionEntry {
    fn clone(&self) -> Self {
        FunctionEntry {
            handle: Arc::clone(&self.handle),
            builtin: self.builtin,
        }
    }
}

/// Function-name → handle registry. Monotonic: no rebinding, and no
/// unregistration at all for functions.
pub struct FunctionRegistry {
    entries: RwLock<HashMap<String, FunctionEntry>>,
}

impl FunctionRegistry {
    pub fn new() -> FunctionRegistry {
        FunctionRegistry {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, handle: Arc<dyn Function>) -> EngineResult<()> {
        self.insert(handle, false)
    }

    /// Registration path for the engine's own function set.
    pub fn register_builtin(&self, handle: Arc<dyn Function>) -> EngineResult<()> {
        self.insert(handle, true)
    }

    fn insert(&self, handle: Arc<dyn Function>, builtin: bool) -> EngineResult<()> {
        let name = handle.name().to_owned();
        if !builtin {
            check_registrable_name(&name, "function")?;
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&name) {
            return Err(EngineError::new(
                ErrorKind::Registry,
                format!("function '{name}' is already registered"),
            ));
        }

        entries.insert(name, FunctionEntry { handle, builtin });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<FunctionEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut names = entries.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    pub fn count(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.len()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        FunctionRegistry::new()
    }
}

impl Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// Check an argument count against a function's declared arity.
pub fn check_arity(function: &dyn Function, count: usize) -> Result<(), String> {
    if count < function.min_args() {
        return Err(format!(
            "function '{}' needs at least {} argument(s), got {count}",
            function.name(),
            function.min_args()
        ));
    }

    let max = function.max_args();
    if max >= 0 && count > max as usize {
        return Err(format!(
            "function '{}' takes at most {max} argument(s), got {count}",
            function.name()
        ));
    }

    Ok(())
}
