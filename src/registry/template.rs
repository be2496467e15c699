use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, PoisonError, RwLock},
};

use crate::{
    error::{EngineError, EngineResult, ErrorKind},
    parser::ast::TemplateData,
};

use super::check_registrable_name;

/// Named sub-templates for include and inheritance. Entries are immutable
/// once stored; executions read them through an `Arc` without holding the
/// lock.
pub struct TemplateRegistry {
    entries: RwLock<HashMap<String, Arc<TemplateData>>>,
}

impl TemplateRegistry {
    pub fn new() -> TemplateRegistry {
        TemplateRegistry {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, name: &str, template: Arc<TemplateData>) -> EngineResult<()> {
        check_registrable_name(name, "template")?;

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(name) {
            return Err(EngineError::new(
                ErrorKind::Registry,
                format!("template '{name}' is already registered"),
            ));
        }

        entries.insert(name.to_owned(), template);
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> EngineResult<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        if entries.remove(name).is_none() {
            return Err(EngineError::new(
                ErrorKind::Registry,
                format!("template '{name}' is not registered"),
            ));
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<TemplateData>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(name).map(Arc::clone)
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

impl Default for TemplateRegistry {
    fn default() -> Self {
        TemplateRegistry::new()
    }
}

impl Debug for TemplateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRegistry")
            .field("names", &self.names())
            .finish()
    }
}
