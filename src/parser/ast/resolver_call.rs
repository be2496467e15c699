use std::ops::Range;

use crate::{error::ErrorStrategy, position::Position};

use super::{Attributes, Node};

/// A tag with a name the parser does not know: resolved against the resolver
/// registry at validation or execution time. `body` is present for the block
/// form.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverCall {
    pub tag_name: String,
    pub attributes: Attributes,
    pub body: Option<Vec<Node>>,
    pub position: Position,
    pub span: Range<usize>,
}

impl ResolverCall {
    pub fn strategy(&self) -> Option<ErrorStrategy> {
        self.attributes
            .get("on_error")
            .and_then(ErrorStrategy::parse)
    }

    pub fn default_value(&self) -> Option<&str> {
        self.attributes.get("default")
    }
}

impl From<ResolverCall> for Node {
    fn from(value: ResolverCall) -> Self {
        Node::ResolverCall(value)
    }
}
