//! Raw passthrough regions, comments, escapes and front matter.

use prompty::{CancelToken, Engine, ErrorKind, Value};
use serde_json::json;
use test_utils::{assert_renders, render};

#[test]
fn raw_body_is_emitted_verbatim() {
    assert_renders(
        "{~prompty.raw~}anything {~prompty.if eval=\"x\"~} at all{~/prompty.raw~}",
        json!({}),
        "anything {~prompty.if eval=\"x\"~} at all",
    );
}

#[test]
fn raw_roundtrips_arbitrary_content() {
    // Any body without the literal raw opener/closer passes through
    // unchanged.
    let bodies = [
        "",
        "plain",
        "{~",
        "~}",
        "{~prompty.var",
        "multi\nline\ntext",
        "quotes ' and \" and \\",
    ];

    for body in bodies {
        assert_renders(
            &format!("{{~prompty.raw~}}{body}{{~/prompty.raw~}}"),
            json!({}),
            body,
        );
    }
}

#[test]
fn nested_raw_opener_is_rejected() {
    let error = render(
        "{~prompty.raw~}a{~prompty.raw~}b{~/prompty.raw~}",
        json!({}),
    )
    .expect_err("should fail");

    assert_eq!(ErrorKind::ParseStructural, error.kind);
}

#[test]
fn comments_produce_no_output() {
    assert_renders(
        r#"a{~prompty.comment~}internal {~prompty.var name="note" /~}{~/prompty.comment~}b"#,
        json!({}),
        "ab",
    );
}

#[test]
fn comment_bodies_are_not_executed() {
    // The comment references an undefined variable; it must not throw.
    assert_renders(
        r#"{~prompty.comment~}{~prompty.var name="ghost" /~}{~/prompty.comment~}ok"#,
        json!({}),
        "ok",
    );
}

#[test]
fn escaped_open_delimiter_is_literal() {
    assert_renders(r"pre \{~ post", json!({}), "pre {~ post");
}

#[test]
fn backslash_elsewhere_is_plain_text() {
    assert_renders(r"a\b", json!({}), r"a\b");
}

#[test]
fn front_matter_is_not_rendered() {
    let engine = Engine::new();
    let template = engine
        .parse("---\nname: greeting\nversion: 2\n---\nHello")
        .expect("should parse");

    let output = template
        .execute(&CancelToken::new(), &Value::from(json!({})))
        .expect("should render");

    assert_eq!("Hello", output);

    let front_matter = template.front_matter().expect("should be present");
    assert_eq!(
        Some(&Value::from("greeting")),
        front_matter.entries.get("name")
    );
    assert_eq!(Some(&Value::Int(2)), front_matter.entries.get("version"));
}

#[test]
fn positions_account_for_front_matter() {
    let error = render("---\nkey: v\n---\n{~prompty.var name=\"ghost\" /~}", json!({}))
        .expect_err("should fail");

    // The tag starts on line 4 of the document.
    let position = error.position.expect("should carry a position");
    assert_eq!(4, position.line);
}
