use std::{collections::BTreeMap, sync::Arc};

use crate::{
    error::{EngineError, EngineResult, ErrorKind},
    parser::ast::TemplateData,
    position::Position,
    registry::TemplateRegistry,
};

/// The resolved inheritance chain of a template, flattened once per
/// execution.
///
/// `chain[0]` is the template being executed, `chain.last()` the root-most
/// ancestor whose body drives rendering. `declarers` maps each block name to
/// the chain indices that declare it, most-derived first; index 0 is the
/// effective override and each following index is what `prompty.parent`
/// renders next.
#[derive(Debug)]
pub(crate) struct InheritanceChain {
    pub chain: Vec<Arc<TemplateData>>,
    pub declarers: BTreeMap<String, Vec<usize>>,
}

impl InheritanceChain {
    pub fn root(&self) -> &Arc<TemplateData> {
        // A chain is only built for templates with at least one ancestor.
        self.chain.last().unwrap_or(&self.chain[0])
    }
}

/// Walk parent links through the registry and flatten the block overrides.
pub(crate) fn resolve_chain(
    child: Arc<TemplateData>,
    parent_name: &str,
    templates: &TemplateRegistry,
    max_depth: usize,
    position: Position,
) -> EngineResult<InheritanceChain> {
    let mut chain = vec![child];
    let mut seen = vec![];
    let mut next = Some(parent_name.to_owned());

    while let Some(name) = next {
        if seen.contains(&name) {
            return Err(EngineError::at(
                ErrorKind::Resource,
                format!("inheritance cycle through template '{name}'"),
                position,
            ));
        }

        if chain.len() >= max_depth {
            return Err(EngineError::at(
                ErrorKind::Resource,
                format!("inheritance chain deeper than {max_depth}"),
                position,
            ));
        }

        let Some(parent) = templates.get(&name) else {
            return Err(EngineError::at(
                ErrorKind::Registry,
                format!("parent template '{name}' is not registered"),
                position,
            ));
        };

        next = parent.inherits.clone();
        seen.push(name);
        chain.push(parent);
    }

    let mut declarers: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (index, template) in chain.iter().enumerate() {
        for name in template.declared_blocks.keys() {
            declarers.entry(name.clone()).or_default().push(index);
        }
    }

    Ok(InheritanceChain { chain, declarers })
}
