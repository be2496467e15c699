use std::{error::Error, fmt::Display};

use crate::position::Position;

/// The category of an engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unterminated tag or string, invalid escape, invalid tag name.
    ParseLexical,
    /// Mismatched block close, nested raw, malformed switch, misplaced extends.
    ParseStructural,
    /// Syntax error inside an expression attribute.
    ExprParse,
    /// Runtime failure while evaluating an expression.
    ExprEval,
    /// Tag name not registered.
    ResolverUnknown,
    /// A registered resolver returned an error.
    ResolverFailed,
    /// A plugin exceeded its time budget.
    PluginTimeout,
    /// A plugin panicked; the panic was captured by the isolation envelope.
    PluginPanic,
    /// Static validation produced at least one error-severity issue.
    ValidationFailed,
    /// Duplicate registration, reserved name, unknown registry entry.
    Registry,
    /// Depth, iteration, output-size or wall-clock budget exceeded.
    Resource,
    /// A variable path evaluated to a missing value.
    VariableUndefined,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ParseLexical => "lexical error",
            ErrorKind::ParseStructural => "structural error",
            ErrorKind::ExprParse => "expression parse error",
            ErrorKind::ExprEval => "expression evaluation error",
            ErrorKind::ResolverUnknown => "unknown resolver",
            ErrorKind::ResolverFailed => "resolver failed",
            ErrorKind::PluginTimeout => "plugin timeout",
            ErrorKind::PluginPanic => "plugin panic",
            ErrorKind::ValidationFailed => "validation failed",
            ErrorKind::Registry => "registry error",
            ErrorKind::Resource => "resource limit exceeded",
            ErrorKind::VariableUndefined => "undefined variable",
        }
    }

    /// Recoverable kinds go through error-strategy dispatch; everything else
    /// aborts the execution with the first error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorKind::VariableUndefined | ErrorKind::ResolverUnknown | ErrorKind::ResolverFailed
        )
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An engine failure with position metadata and an optional cause chain.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineError {
    pub kind: ErrorKind,
    pub message: String,
    pub position: Option<Position>,
    pub cause: Option<Box<EngineError>>,
}

impl EngineError {
    pub fn new(kind: ErrorKind, message: impl ToString) -> EngineError {
        EngineError {
            kind,
            message: message.to_string(),
            position: None,
            cause: None,
        }
    }

    pub fn at(kind: ErrorKind, message: impl ToString, position: Position) -> EngineError {
        EngineError {
            kind,
            message: message.to_string(),
            position: Some(position),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: EngineError) -> EngineError {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn with_position(mut self, position: Position) -> EngineError {
        self.position = Some(position);
        self
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.position {
            Some(position) => f.write_fmt(format_args!(
                "{}: {} ({position})",
                self.kind, self.message
            ))?,
            None => f.write_fmt(format_args!("{}: {}", self.kind, self.message))?,
        }

        if let Some(cause) = &self.cause {
            f.write_fmt(format_args!("; caused by: {cause}"))?;
        }

        Ok(())
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_ref().map(|cause| cause.as_ref() as _)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Policy for recovering from the failure of a single tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorStrategy {
    /// Abort execution and surface the error.
    #[default]
    Throw,
    /// Emit the tag's `default` attribute (empty string if absent) and continue.
    UseDefault,
    /// Emit nothing and continue.
    Remove,
    /// Emit the tag's original source text verbatim and continue.
    KeepRaw,
    /// Invoke the engine's logging hook, emit nothing and continue.
    Log,
}

impl ErrorStrategy {
    pub fn parse(value: &str) -> Option<ErrorStrategy> {
        match value {
            "throw" => Some(ErrorStrategy::Throw),
            "default" => Some(ErrorStrategy::UseDefault),
            "remove" => Some(ErrorStrategy::Remove),
            "keepraw" => Some(ErrorStrategy::KeepRaw),
            "log" => Some(ErrorStrategy::Log),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorStrategy::Throw => "throw",
            ErrorStrategy::UseDefault => "default",
            ErrorStrategy::Remove => "remove",
            ErrorStrategy::KeepRaw => "keepraw",
            ErrorStrategy::Log => "log",
        }
    }
}

impl Display for ErrorStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
