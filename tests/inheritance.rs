//! Template inheritance: extends, block overrides and parent calls.

use prompty::{CancelToken, Engine, ErrorKind, Value};
use serde_json::json;
use test_utils::render_with;

fn engine_with_base() -> Engine {
    let engine = Engine::new();
    engine
        .register_template(
            "base",
            r#"<{~prompty.block name="header"~}default header{~/prompty.block~}|{~prompty.block name="body"~}default body{~/prompty.block~}>"#,
        )
        .expect("should register");
    engine
}

#[test]
fn parent_renders_its_own_blocks_without_a_child() {
    let engine = engine_with_base();

    let output = engine
        .get_template("base")
        .expect("should exist")
        .execute(&CancelToken::new(), &Value::from(json!({})))
        .expect("should render");

    assert_eq!("<default header|default body>", output);
}

#[test]
fn child_overrides_one_block() {
    let engine = engine_with_base();

    let output = render_with(
        &engine,
        r#"{~prompty.extends template="base" /~}{~prompty.block name="body"~}custom{~/prompty.block~}"#,
        json!({}),
    )
    .expect("should render");

    assert_eq!("<default header|custom>", output);
}

#[test]
fn parent_call_splices_the_overridden_body() {
    let engine = engine_with_base();

    let output = render_with(
        &engine,
        r#"{~prompty.extends template="base" /~}{~prompty.block name="header"~}[{~prompty.parent /~}]{~/prompty.block~}"#,
        json!({}),
    )
    .expect("should render");

    assert_eq!("<[default header]|default body>", output);
}

#[test]
fn grandchild_chains_override_and_parent_calls() {
    let engine = engine_with_base();
    engine
        .register_template(
            "middle",
            r#"{~prompty.extends template="base" /~}{~prompty.block name="body"~}m({~prompty.parent /~}){~/prompty.block~}"#,
        )
        .expect("should register");

    let output = render_with(
        &engine,
        r#"{~prompty.extends template="middle" /~}{~prompty.block name="body"~}c({~prompty.parent /~}){~/prompty.block~}"#,
        json!({}),
    )
    .expect("should render");

    assert_eq!("<default header|c(m(default body))>", output);
}

#[test]
fn blocks_render_data_from_the_execution_scope() {
    let engine = engine_with_base();

    let output = render_with(
        &engine,
        r#"{~prompty.extends template="base" /~}{~prompty.block name="header"~}{~prompty.var name="title" /~}{~/prompty.block~}"#,
        json!({ "title": "Docs" }),
    )
    .expect("should render");

    assert_eq!("<Docs|default body>", output);
}

#[test]
fn unknown_parent_is_a_registry_error() {
    let engine = Engine::new();

    let error = render_with(
        &engine,
        r#"{~prompty.extends template="ghost" /~}{~prompty.block name="x"~}y{~/prompty.block~}"#,
        json!({}),
    )
    .expect_err("should fail");

    assert_eq!(ErrorKind::Registry, error.kind);
}

#[test]
fn inheritance_cycle_is_detected() {
    let engine = Engine::new();
    engine
        .register_template(
            "a",
            r#"{~prompty.extends template="b" /~}{~prompty.block name="x"~}a{~/prompty.block~}"#,
        )
        .expect("should register");
    engine
        .register_template(
            "b",
            r#"{~prompty.extends template="a" /~}{~prompty.block name="x"~}b{~/prompty.block~}"#,
        )
        .expect("should register");

    let error = render_with(
        &engine,
        r#"{~prompty.extends template="a" /~}{~prompty.block name="x"~}c{~/prompty.block~}"#,
        json!({}),
    )
    .expect_err("should fail");

    assert_eq!(ErrorKind::Resource, error.kind);
}

#[test]
fn block_outside_inheritance_renders_inline() {
    let engine = Engine::new();

    let output = render_with(
        &engine,
        r#"a{~prompty.block name="x"~}inline{~/prompty.block~}b"#,
        json!({}),
    )
    .expect("should render");

    assert_eq!("ainlineb", output);
}

#[test]
fn included_template_with_inheritance_flattens_its_own_chain() {
    let engine = engine_with_base();
    engine
        .register_template(
            "page",
            r#"{~prompty.extends template="base" /~}{~prompty.block name="body"~}page body{~/prompty.block~}"#,
        )
        .expect("should register");

    let output = render_with(
        &engine,
        r#"before {~prompty.include template="page" /~} after"#,
        json!({}),
    )
    .expect("should render");

    assert_eq!("before <default header|page body> after", output);
}
