//! Message fragments and their extraction.

use prompty::{extract_messages, ExtractedMessage};
use serde_json::json;
use test_utils::render;

#[test]
fn messages_extract_in_source_order() {
    let output = render(
        r#"{~prompty.message role="system" cache="true"~}You are terse.{~/prompty.message~}{~prompty.message role="user"~}Summarize {~prompty.var name="doc" /~}.{~/prompty.message~}"#,
        json!({ "doc": "the report" }),
    )
    .expect("should render");

    assert_eq!(
        vec![
            ExtractedMessage {
                role: "system".to_owned(),
                content: "You are terse.".to_owned(),
                cache: true,
            },
            ExtractedMessage {
                role: "user".to_owned(),
                content: "Summarize the report.".to_owned(),
                cache: false,
            },
        ],
        extract_messages(&output)
    );
}

#[test]
fn message_bodies_run_the_full_engine() {
    let output = render(
        r#"{~prompty.message role="user"~}{~prompty.for item="x" in="xs"~}{~prompty.var name="x" /~} {~/prompty.for~}{~/prompty.message~}"#,
        json!({ "xs": ["a", "b"] }),
    )
    .expect("should render");

    let messages = extract_messages(&output);
    assert_eq!(1, messages.len());
    // Extraction trims the content.
    assert_eq!("a b", messages[0].content);
}

#[test]
fn conditional_messages_only_appear_when_taken() {
    let source = r#"{~prompty.if eval="admin"~}{~prompty.message role="system"~}sudo{~/prompty.message~}{~/prompty.if~}{~prompty.message role="user"~}hi{~/prompty.message~}"#;

    let as_admin = render(source, json!({ "admin": true })).expect("should render");
    assert_eq!(2, extract_messages(&as_admin).len());

    let as_user = render(source, json!({ "admin": false })).expect("should render");
    let messages = extract_messages(&as_user);
    assert_eq!(1, messages.len());
    assert_eq!("user", messages[0].role);
}

#[test]
fn output_without_messages_extracts_nothing() {
    let output = render("plain text", json!({})).expect("should render");

    assert!(extract_messages(&output).is_empty());
}
