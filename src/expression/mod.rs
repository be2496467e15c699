mod eval;
mod lexer;
mod parser;
mod token;

pub use self::eval::*;
pub use self::lexer::*;
pub use self::parser::*;
pub use self::token::*;

use crate::error::EngineResult;

/// Parse the text of an expression attribute into an [`Expr`].
///
/// Errors are `ExprParse` with the offending offset in the message; the
/// template parser attaches the attribute's source position.
pub fn parse_expression(source: &str) -> EngineResult<Expr> {
    let tokens = ExprLexer::new(source).lex()?;
    ExprParser::new(tokens).parse()
}
