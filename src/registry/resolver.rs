use std::{
    collections::{BTreeMap, HashMap},
    fmt::Debug,
    sync::{Arc, PoisonError, RwLock},
};

use crate::{isolation::CancelToken, value::Value};

use super::check_registrable_name;
use crate::error::{EngineError, EngineResult, ErrorKind};
use crate::parser::ast::Attributes;

/// Everything a resolver gets to see for one invocation: the tag, its
/// attributes, the rendered body (for the block form) and an owned snapshot
/// of the scope. The snapshot keeps the contract `Send` so the call can run
/// on a worker thread.
#[derive(Debug, Clone)]
pub struct ResolverContext {
    pub tag_name: String,
    pub attributes: Attributes,
    /// The body rendered to a string, for block-form calls.
    pub body: Option<String>,
    bindings: BTreeMap<String, Value>,
    /// Cancelled by the envelope on timeout or external cancellation;
    /// long-running resolvers are required to watch it.
    pub cancel: CancelToken,
}

impl ResolverContext {
    pub fn new(
        tag_name: impl ToString,
        attributes: Attributes,
        body: Option<String>,
        bindings: BTreeMap<String, Value>,
        cancel: CancelToken,
    ) -> ResolverContext {
        ResolverContext {
            tag_name: tag_name.to_string(),
            attributes,
            body,
            bindings,
            cancel,
        }
    }

    /// Resolve a dotted path against the scope snapshot; missing leaves and
    /// traversals into non-mappings yield `Null`.
    pub fn lookup(&self, path: &str) -> Value {
        let mut segments = path.split('.');

        let Some(head) = segments.next() else {
            return Value::Null;
        };
        let Some(mut current) = self.bindings.get(head) else {
            return Value::Null;
        };

        for segment in segments {
            let Value::Map(entries) = current else {
                return Value::Null;
            };
            match entries.get(segment) {
                Some(value) => current = value,
                None => return Value::Null,
            }
        }

        current.clone()
    }
}

/// A handler for a registered tag name.
///
/// `validate` runs during static validation and must not have side effects;
/// `resolve` runs inside the isolation envelope on a worker thread.
pub trait Resolver: Send + Sync {
    fn name(&self) -> &str;

    fn validate(&self, _attributes: &Attributes) -> Result<(), String> {
        Ok(())
    }

    fn resolve(&self, context: &ResolverContext) -> Result<String, String>;
}

/// Convenience resolver built from a closure.
pub struct FnResolver {
    name: String,
    resolve: Box<dyn Fn(&ResolverContext) -> Result<String, String> + Send + Sync>,
}

impl FnResolver {
    pub fn new(
        name: impl ToString,
        resolve: impl Fn(&ResolverContext) -> Result<String, String> + Send + Sync + 'static,
    ) -> FnResolver {
        FnResolver {
            name: name.to_string(),
            resolve: Box::new(resolve),
        }
    }
}

impl Resolver for FnResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, context: &ResolverContext) -> Result<String, String> {
        (self.resolve)(context)
    }
}

/// Placeholder entry for a built-in tag. Built-ins are executed by the
/// executor directly; the entry only reserves the name and makes the
/// registry's listing complete.
struct BuiltinTag {
    name: &'static str,
}

impl Resolver for BuiltinTag {
    fn name(&self) -> &str {
        self.name
    }

    fn resolve(&self, _context: &ResolverContext) -> Result<String, String> {
        Err(format!("built-in tag '{}' is executed by the engine", self.name))
    }
}

struct ResolverEntry {
    handle: Arc<dyn Resolver>,
    builtin: bool,
}

/// Tag-name → resolver registry. Monotonic: a bound name is never rebound;
/// only caller-owned (non-built-in) entries can be unregistered.
pub struct ResolverRegistry {
    entries: RwLock<HashMap<String, ResolverEntry>>,
}

impl ResolverRegistry {
    /// A registry pre-seeded with the built-in tag names.
    pub fn new(builtin_tags: &[&'static str]) -> ResolverRegistry {
        let mut entries = HashMap::new();
        for &name in builtin_tags {
            entries.insert(
                name.to_owned(),
                ResolverEntry {
                    handle: Arc::new(BuiltinTag { name }),
                    builtin: true,
                },
            );
        }

        ResolverRegistry {
            entries: RwLock::new(entries),
        }
    }

    pub fn register(&self, handle: Arc<dyn Resolver>) -> EngineResult<()> {
        let name = handle.name().to_owned();
        check_registrable_name(&name, "resolver")?;

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&name) {
            return Err(EngineError::new(
                ErrorKind::Registry,
                format!("resolver '{name}' is already registered"),
            ));
        }

        entries.insert(
            name,
            ResolverEntry {
                handle,
                builtin: false,
            },
        );
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> EngineResult<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        match entries.get(name) {
            None => Err(EngineError::new(
                ErrorKind::Registry,
                format!("resolver '{name}' is not registered"),
            )),
            Some(entry) if entry.builtin => Err(EngineError::new(
                ErrorKind::Registry,
                format!("built-in resolver '{name}' cannot be unregistered"),
            )),
            Some(_) => {
                entries.remove(name);
                Ok(())
            }
        }
    }

    /// Look up a user-registered resolver. Built-in names resolve to `None`
    /// because the executor never dispatches them through the registry.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Resolver>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(name)
            .filter(|entry| !entry.builtin)
            .map(|entry| Arc::clone(&entry.handle))
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

impl Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("names", &self.names())
            .finish()
    }
}
