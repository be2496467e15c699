mod function;
mod resolver;
mod template;

pub use self::function::*;
pub use self::resolver::*;
pub use self::template::*;

use crate::error::{EngineError, EngineResult, ErrorKind};

/// Names starting with this prefix are reserved for the engine's built-in
/// tags; external callers cannot register under it.
pub const RESERVED_PREFIX: &str = "prompty.";

/// Common name rules for all registries: non-empty and outside the reserved
/// namespace.
pub(crate) fn check_registrable_name(name: &str, what: &str) -> EngineResult<()> {
    if name.is_empty() {
        return Err(EngineError::new(
            ErrorKind::Registry,
            format!("{what} names cannot be empty"),
        ));
    }

    if name.starts_with(RESERVED_PREFIX) {
        return Err(EngineError::new(
            ErrorKind::Registry,
            format!("{what} name '{name}' uses the reserved prefix '{RESERVED_PREFIX}'"),
        ));
    }

    Ok(())
}
