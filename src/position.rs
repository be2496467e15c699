use std::fmt::Display;

/// A location in a template source: byte offset plus 1-indexed line and column.
///
/// Every token, every AST node and every error carries one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn start() -> Position {
        Position {
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn new(offset: usize, line: usize, column: usize) -> Position {
        Position {
            offset,
            line,
            column,
        }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}:{}", self.line, self.column))
    }
}
