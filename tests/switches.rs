//! `prompty.switch` matching rules.

use serde_json::json;
use test_utils::assert_renders;

const DAYS: &str = r#"{~prompty.switch eval="day"~}
    {~prompty.case value="sat"~}weekend{~/prompty.case~}
    {~prompty.case value="sun"~}weekend{~/prompty.case~}
    {~prompty.casedefault~}weekday{~/prompty.casedefault~}
{~/prompty.switch~}"#;

#[test]
fn literal_case_matches_stringified_scrutinee() {
    assert_renders(DAYS, json!({ "day": "sat" }), "weekend");
    assert_renders(DAYS, json!({ "day": "wed" }), "weekday");
}

#[test]
fn numeric_scrutinee_matches_its_decimal_form() {
    assert_renders(
        r#"{~prompty.switch eval="n"~}{~prompty.case value="3"~}three{~/prompty.case~}{~/prompty.switch~}"#,
        json!({ "n": 3 }),
        "three",
    );
}

#[test]
fn first_match_wins_without_fallthrough() {
    assert_renders(
        r#"{~prompty.switch eval="x"~}{~prompty.case value="a"~}1{~/prompty.case~}{~prompty.case value="a"~}2{~/prompty.case~}{~/prompty.switch~}"#,
        json!({ "x": "a" }),
        "1",
    );
}

#[test]
fn eval_case_sees_the_scrutinee_as_value() {
    assert_renders(
        r#"{~prompty.switch eval="n"~}{~prompty.case eval="value > 10"~}big{~/prompty.case~}{~prompty.casedefault~}small{~/prompty.casedefault~}{~/prompty.switch~}"#,
        json!({ "n": 25 }),
        "big",
    );
}

#[test]
fn no_match_and_no_default_renders_nothing() {
    assert_renders(
        r#"<{~prompty.switch eval="x"~}{~prompty.case value="y"~}!{~/prompty.case~}{~/prompty.switch~}>"#,
        json!({ "x": "z" }),
        "<>",
    );
}

#[test]
fn case_bodies_may_contain_tags() {
    assert_renders(
        r#"{~prompty.switch eval="kind"~}{~prompty.case value="list"~}{~prompty.for item="x" in="xs"~}{~prompty.var name="x" /~}{~/prompty.for~}{~/prompty.case~}{~/prompty.switch~}"#,
        json!({ "kind": "list", "xs": [7, 8] }),
        "78",
    );
}
