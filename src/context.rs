use std::collections::BTreeMap;

use crate::value::Value;

/// A lexically scoped symbol table.
///
/// Implemented as a stack of binding frames; lookups walk the frames from
/// innermost to outermost. A context is owned by a single execution.
#[derive(Debug, Clone)]
pub struct Context {
    frames: Vec<BTreeMap<String, Value>>,
}

impl Context {
    pub fn new() -> Context {
        Context {
            frames: vec![BTreeMap::new()],
        }
    }

    /// A context whose root frame holds the entries of the given value.
    /// Non-mapping values produce an empty root.
    pub fn with_root(data: &Value) -> Context {
        let root = match data {
            Value::Map(entries) => entries.clone(),
            _ => BTreeMap::new(),
        };

        Context { frames: vec![root] }
    }

    /// Push a new scope frame.
    pub fn enter_scope(&mut self) {
        self.frames.push(BTreeMap::new());
    }

    /// Pop the innermost scope frame. The root frame is never popped.
    pub fn exit_scope(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Bind a name in the innermost frame, shadowing outer bindings.
    pub fn bind(&mut self, name: impl ToString, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), value);
        }
    }

    /// Find a binding by plain name, innermost frame first.
    pub fn find(&self, name: &str) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
    }

    /// Resolve a dotted path such as `user.profile.name`.
    ///
    /// The head segment is looked up through the scope chain; the remaining
    /// segments index into mappings. A missing leaf or a traversal into a
    /// non-mapping yields `Null` rather than an error.
    pub fn resolve_path(&self, path: &str) -> Value {
        self.lookup_path(path).unwrap_or(Value::Null)
    }

    /// Like [`resolve_path`](Context::resolve_path), but distinguishes a
    /// missing path (`None`) from an explicitly bound null.
    pub fn lookup_path(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');

        let head = segments.next()?;
        let mut current = self.find(head)?;

        for segment in segments {
            let Value::Map(entries) = current else {
                return None;
            };

            current = entries.get(segment)?;
        }

        Some(current.clone())
    }

    /// Flatten the scope chain into a single mapping, innermost bindings
    /// winning. Used to hand resolvers an owned view of the scope.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        let mut flattened = BTreeMap::new();

        for frame in &self.frames {
            for (name, value) in frame {
                flattened.insert(name.clone(), value.clone());
            }
        }

        flattened
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with(entries: &[(&str, Value)]) -> Context {
        let mut context = Context::new();
        for (name, value) in entries {
            context.bind(*name, value.clone());
        }
        context
    }

    #[test]
    fn test_bind_and_find() {
        let mut context = Context::new();
        context.bind("foo", Value::Int(42));

        assert_eq!(Some(&Value::Int(42)), context.find("foo"));
        assert_eq!(None, context.find("bar"));
    }

    #[test]
    fn test_inner_scope_shadows() {
        let mut context = context_with(&[("foo", Value::Int(1))]);

        context.enter_scope();
        context.bind("foo", Value::Int(2));
        assert_eq!(Some(&Value::Int(2)), context.find("foo"));

        context.exit_scope();
        assert_eq!(Some(&Value::Int(1)), context.find("foo"));
    }

    #[test]
    fn test_root_frame_survives_exit() {
        let mut context = context_with(&[("foo", Value::Int(1))]);

        context.exit_scope();
        context.exit_scope();

        assert_eq!(Some(&Value::Int(1)), context.find("foo"));
    }

    #[test]
    fn test_resolve_dotted_path() {
        let mut profile = BTreeMap::new();
        profile.insert("name".to_owned(), Value::from("Alice"));
        let mut user = BTreeMap::new();
        user.insert("profile".to_owned(), Value::Map(profile));

        let context = context_with(&[("user", Value::Map(user))]);

        assert_eq!(Value::from("Alice"), context.resolve_path("user.profile.name"));
    }

    #[test]
    fn test_resolve_missing_leaf_is_null() {
        let context = context_with(&[("user", Value::Map(BTreeMap::new()))]);

        assert_eq!(Value::Null, context.resolve_path("user.profile.name"));
        assert_eq!(Value::Null, context.resolve_path("ghost"));
    }

    #[test]
    fn test_resolve_through_non_mapping_is_null() {
        let context = context_with(&[("user", Value::from("not a mapping"))]);

        assert_eq!(Value::Null, context.resolve_path("user.name"));
    }

    #[test]
    fn test_lookup_distinguishes_missing_from_null() {
        let mut context = Context::new();
        context.bind("present", Value::Null);

        assert_eq!(Some(Value::Null), context.lookup_path("present"));
        assert_eq!(None, context.lookup_path("absent"));
    }

    #[test]
    fn test_snapshot_flattens_innermost_first() {
        let mut context = context_with(&[("a", Value::Int(1)), ("b", Value::Int(2))]);
        context.enter_scope();
        context.bind("b", Value::Int(20));

        let snapshot = context.snapshot();

        assert_eq!(Some(&Value::Int(1)), snapshot.get("a"));
        assert_eq!(Some(&Value::Int(20)), snapshot.get("b"));
    }
}
