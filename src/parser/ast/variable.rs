use std::ops::Range;

use crate::{error::ErrorStrategy, position::Position};

use super::Node;

/// `{~prompty.var name="a.b.c" default="..." on_error="..." /~}`
///
/// Resolves a dotted path against the context and renders the value.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub default: Option<String>,
    /// Raw `on_error` attribute; parsed lazily so the validator can flag
    /// unknown strategy names without the parser rejecting the document.
    pub on_error: Option<String>,
    pub position: Position,
    pub span: Range<usize>,
}

impl Variable {
    pub fn strategy(&self) -> Option<ErrorStrategy> {
        self.on_error.as_deref().and_then(ErrorStrategy::parse)
    }
}

impl From<Variable> for Node {
    fn from(value: Variable) -> Self {
        Node::Variable(value)
    }
}
