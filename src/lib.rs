//! A prompt templating engine for LLM applications.
//!
//! Templates use a content-resistant tag syntax with a configurable
//! delimiter pair (default `{~` / `~}`). A source document is parsed once
//! and then executed against caller data:
//!
//! ```
//! use prompty::{CancelToken, Engine, Value};
//!
//! let engine = Engine::new();
//! let data = Value::from(serde_json::json!({ "u": "Alice" }));
//!
//! let output = engine
//!     .execute(&CancelToken::new(), r#"Hello, {~prompty.var name="u" /~}!"#, &data)
//!     .unwrap();
//! assert_eq!("Hello, Alice!", output);
//! ```
//!
//! Beyond interpolation the engine supports conditionals, loops, switches,
//! include and block-overriding inheritance, raw regions, comments, message
//! extraction, and plugin registration of custom tag resolvers and
//! expression functions. Every plugin call is isolated with timeouts, panic
//! recovery and cancellation.

pub mod access;
pub mod builtins;
pub mod context;
pub mod engine;
pub mod error;
pub mod executor;
pub mod expression;
pub mod frontmatter;
pub mod isolation;
pub mod lexer;
pub mod parser;
pub mod position;
pub mod registry;
pub mod validation;
pub mod value;

pub use access::{AccessChecker, AuditEvent, AuditSink, Decision, Operation, TemplateSource};
pub use context::Context;
pub use engine::{Engine, EngineOptions, LoggerHook, Template};
pub use error::{EngineError, EngineResult, ErrorKind, ErrorStrategy};
pub use executor::{extract_messages, ExtractedMessage};
pub use isolation::CancelToken;
pub use position::Position;
pub use registry::{
    FnFunction, FnResolver, Function, Resolver, ResolverContext, RESERVED_PREFIX,
};
pub use validation::{Issue, Severity, ValidationResult};
pub use value::Value;
