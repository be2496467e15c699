//! End-to-end scenarios executed through the public API.

use serde_json::json;
use test_utils::assert_renders;

#[test]
fn renders_simple_interpolation() {
    assert_renders(
        r#"Hello, {~prompty.var name="u" /~}!"#,
        json!({ "u": "Alice" }),
        "Hello, Alice!",
    );
}

#[test]
fn renders_default_for_missing_path() {
    assert_renders(
        r#"{~prompty.var name="u.profile.name" default="Guest" /~}"#,
        json!({}),
        "Guest",
    );
}

#[test]
fn raw_region_passes_tags_through() {
    assert_renders(
        r#"{~prompty.raw~}{~prompty.var name="x" /~}{~/prompty.raw~}"#,
        json!({}),
        r#"{~prompty.var name="x" /~}"#,
    );
}

#[test]
fn elseif_branch_wins() {
    assert_renders(
        r#"{~prompty.if eval="role==\"admin\""~}A{~prompty.elseif eval="role==\"editor\""~}E{~prompty.else~}V{~/prompty.if~}"#,
        json!({ "role": "editor" }),
        "E",
    );
}

#[test]
fn for_loop_renders_each_element() {
    assert_renders(
        r#"{~prompty.for item="n" in="xs"~}{~prompty.var name="n" /~};{~/prompty.for~}"#,
        json!({ "xs": [1, 2, 3] }),
        "1;2;3;",
    );
}

#[test]
fn switch_falls_back_to_default_case() {
    assert_renders(
        r#"{~prompty.switch eval="day"~}{~prompty.case value="mon"~}M{~/prompty.case~}{~prompty.casedefault~}?{~/prompty.casedefault~}{~/prompty.switch~}"#,
        json!({ "day": "tue" }),
        "?",
    );
}

#[test]
fn execution_does_not_mutate_the_data() {
    use prompty::{CancelToken, Engine, Value};

    let data = Value::from(json!({ "u": "Alice", "xs": [1, 2, 3] }));
    let snapshot = data.clone();

    let engine = Engine::new();
    engine
        .execute(
            &CancelToken::new(),
            r#"{~prompty.for item="n" in="xs"~}{~prompty.var name="n" /~}{~/prompty.for~}"#,
            &data,
        )
        .expect("should render");

    assert_eq!(snapshot, data);
}

#[test]
fn repeated_executions_are_identical() {
    use prompty::{CancelToken, Engine, Value};

    let engine = Engine::new();
    let template = engine
        .parse(r#"{~prompty.for item="e" in="m"~}{~prompty.var name="e.key" /~}={~prompty.var name="e.value" /~};{~/prompty.for~}"#)
        .expect("should parse");
    let data = Value::from(json!({ "m": { "b": 2, "a": 1 } }));

    let first = template
        .execute(&CancelToken::new(), &data)
        .expect("should render");
    let second = template
        .execute(&CancelToken::new(), &data)
        .expect("should render");

    assert_eq!(first, second);
    assert_eq!("a=1;b=2;", first);
}
