/// The kind of an expression token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprTokenKind {
    Or,
    And,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Bang,
    LParen,
    RParen,
    Comma,
    /// A dotted identifier path such as `user.profile.name`.
    Ident,
    /// A quoted string literal; `text` holds the unescaped contents.
    Str,
    Int,
    Float,
    True,
    False,
    Nil,
    Eof,
}

/// A token of the expression sub-language. Offsets are relative to the start
/// of the expression text (i.e. within the attribute value).
#[derive(Debug, Clone, PartialEq)]
pub struct ExprToken {
    pub kind: ExprTokenKind,
    pub text: String,
    pub offset: usize,
}

impl ExprToken {
    pub fn new(kind: ExprTokenKind, text: impl ToString, offset: usize) -> ExprToken {
        ExprToken {
            kind,
            text: text.to_string(),
            offset,
        }
    }
}
