use std::{fmt::Display, time::Duration};

/// Operations a caller can perform on a registered template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Execute,
    Register,
    Unregister,
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Read => f.write_str("read"),
            Operation::Execute => f.write_str("execute"),
            Operation::Register => f.write_str("register"),
            Operation::Unregister => f.write_str("unregister"),
        }
    }
}

/// The verdict of an [`AccessChecker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl Decision {
    pub fn allow() -> Decision {
        Decision {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl ToString) -> Decision {
        Decision {
            allowed: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// Gate consulted before a checked execution. Implemented by the embedding
/// application; the engine only consumes the verdict.
pub trait AccessChecker: Send + Sync {
    fn check(&self, operation: Operation, subject: &str, template_name: &str) -> Decision;
}

/// One audited engine operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub operation: Operation,
    pub subject: String,
    pub template_name: String,
    pub allowed: bool,
    pub duration: Duration,
    pub error: Option<String>,
}

/// Receives one event per checked execution. Implementations must not block
/// for long; the engine calls them synchronously.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// A source of template texts by name, e.g. a storage backend. The engine
/// consumes only `load`; versioning and labels stay on the backend's side.
pub trait TemplateSource: Send + Sync {
    fn load(&self, name: &str) -> Result<String, String>;
}
