use std::ops::Range;

use crate::{error::ErrorStrategy, expression::Expr, position::Position};

use super::{Attributes, Node};

/// Attribute names on `prompty.include` that are consumed by the engine;
/// every other attribute is an expression bound into the child scope.
pub const RESERVED_INCLUDE_ATTRS: [&str; 5] =
    ["template", "with", "isolate", "on_error", "default"];

/// `{~prompty.include template="name" with="path" isolate="true" x="expr" /~}`
///
/// Renders another registered template in a child scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    pub template_name: String,
    /// Non-reserved attributes, each parsed as an expression and bound under
    /// its attribute name in the child scope.
    pub bindings: Vec<Binding>,
    /// Dotted path whose value becomes the root of the child scope.
    pub with_path: Option<String>,
    /// When set, the child scope starts from an empty root.
    pub isolate: bool,
    pub attributes: Attributes,
    pub position: Position,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub expression: Expr,
    pub position: Position,
}

impl Include {
    pub fn strategy(&self) -> Option<ErrorStrategy> {
        self.attributes
            .get("on_error")
            .and_then(ErrorStrategy::parse)
    }

    pub fn default_value(&self) -> Option<&str> {
        self.attributes.get("default")
    }
}

impl From<Include> for Node {
    fn from(value: Include) -> Self {
        Node::Include(value)
    }
}
