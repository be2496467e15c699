use std::ops::Range;

use crate::position::Position;

use super::Node;

/// `{~prompty.raw~}…{~/prompty.raw~}`
///
/// The body passes through without any tag interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBlock {
    pub content: String,
    pub position: Position,
    pub span: Range<usize>,
}

impl From<RawBlock> for Node {
    fn from(value: RawBlock) -> Self {
        Node::Raw(value)
    }
}

/// `{~prompty.comment~}…{~/prompty.comment~}`
///
/// Parsed, then discarded at execute time.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentBlock {
    pub body: Vec<Node>,
    pub position: Position,
    pub span: Range<usize>,
}

impl From<CommentBlock> for Node {
    fn from(value: CommentBlock) -> Self {
        Node::Comment(value)
    }
}
