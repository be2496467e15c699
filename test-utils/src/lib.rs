use prompty::{CancelToken, Engine, EngineError, EngineOptions, ErrorStrategy, Value};

/// Render a source against JSON data with a fresh default engine.
pub fn render(source: &str, data: serde_json::Value) -> Result<String, EngineError> {
    render_with(&Engine::new(), source, data)
}

/// Render a source against JSON data with the given engine.
pub fn render_with(
    engine: &Engine,
    source: &str,
    data: serde_json::Value,
) -> Result<String, EngineError> {
    engine.execute(&CancelToken::new(), source, &Value::from(data))
}

/// An engine whose default error strategy is `remove`, for tests that
/// exercise recovery paths.
pub fn lenient_engine() -> Engine {
    let options = EngineOptions {
        default_error_strategy: ErrorStrategy::Remove,
        ..EngineOptions::default()
    };

    Engine::with_options(options).expect("options should be valid")
}

/// Assert that rendering succeeds and matches the expectation.
pub fn assert_renders(source: &str, data: serde_json::Value, expected: &str) {
    match render(source, data) {
        Ok(output) => assert_eq!(expected, output, "template: {source}"),
        Err(error) => panic!("template {source} should render, failed with: {error}"),
    }
}
