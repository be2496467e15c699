//! `prompty.for` over sequences and mappings.

use prompty::ErrorKind;
use serde_json::json;
use test_utils::{assert_renders, render};

#[test]
fn index_variable_counts_from_zero() {
    assert_renders(
        r#"{~prompty.for item="x" index="i" in="xs"~}{~prompty.var name="i" /~}:{~prompty.var name="x" /~} {~/prompty.for~}"#,
        json!({ "xs": ["a", "b"] }),
        "0:a 1:b ",
    );
}

#[test]
fn limit_truncates_iteration() {
    assert_renders(
        r#"{~prompty.for item="x" in="xs" limit="2"~}{~prompty.var name="x" /~}{~/prompty.for~}"#,
        json!({ "xs": [1, 2, 3, 4, 5] }),
        "12",
    );
}

#[test]
fn empty_sequence_renders_nothing() {
    assert_renders(
        r#"<{~prompty.for item="x" in="xs"~}{~prompty.var name="x" /~}{~/prompty.for~}>"#,
        json!({ "xs": [] }),
        "<>",
    );
}

#[test]
fn mapping_iterates_in_sorted_key_order() {
    assert_renders(
        r#"{~prompty.for item="e" in="m"~}{~prompty.var name="e.key" /~}={~prompty.var name="e.value" /~};{~/prompty.for~}"#,
        json!({ "m": { "zeta": 26, "alpha": 1, "mid": 13 } }),
        "alpha=1;mid=13;zeta=26;",
    );
}

#[test]
fn mapping_items_are_key_value_records() {
    // item.key recovers the plain string form of keys-only iteration.
    assert_renders(
        r#"{~prompty.for item="e" in="m"~}{~prompty.var name="e.key" /~},{~/prompty.for~}"#,
        json!({ "m": { "b": 2, "a": 1 } }),
        "a,b,",
    );
}

#[test]
fn loop_variable_shadows_and_unwinds() {
    assert_renders(
        r#"{~prompty.for item="x" in="xs"~}{~prompty.var name="x" /~}{~/prompty.for~}{~prompty.var name="x" /~}"#,
        json!({ "x": "outer", "xs": ["inner"] }),
        "innerouter",
    );
}

#[test]
fn nested_loops() {
    assert_renders(
        r#"{~prompty.for item="row" in="grid"~}{~prompty.for item="cell" in="row"~}{~prompty.var name="cell" /~}{~/prompty.for~}|{~/prompty.for~}"#,
        json!({ "grid": [[1, 2], [3, 4]] }),
        "12|34|",
    );
}

#[test]
fn non_iterable_collection_fails() {
    let error = render(
        r#"{~prompty.for item="x" in="n"~}{~/prompty.for~}"#,
        json!({ "n": 42 }),
    )
    .expect_err("should fail");

    assert_eq!(ErrorKind::ExprEval, error.kind);
    assert!(error.message.contains("cannot iterate"));
}

#[test]
fn missing_collection_is_not_iterable() {
    let error = render(
        r#"{~prompty.for item="x" in="ghost"~}{~/prompty.for~}"#,
        json!({}),
    )
    .expect_err("should fail");

    assert_eq!(ErrorKind::ExprEval, error.kind);
}
