//! Access checking and audit events around checked execution.

use std::sync::{Arc, Mutex};

use prompty::{
    AccessChecker, AuditEvent, AuditSink, CancelToken, Decision, Engine, EngineOptions,
    ErrorKind, Operation, Value,
};
use serde_json::json;

struct OnlyAlice;

impl AccessChecker for OnlyAlice {
    fn check(&self, _operation: Operation, subject: &str, _template_name: &str) -> Decision {
        if subject == "alice" {
            Decision::allow()
        } else {
            Decision::deny("not alice")
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl AuditSink for RecordingSink {
    fn record(&self, event: &AuditEvent) {
        self.events
            .lock()
            .expect("lock should work")
            .push(event.clone());
    }
}

fn checked_engine() -> (Engine, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let options = EngineOptions {
        access_checker: Some(Arc::new(OnlyAlice)),
        audit_sink: Some(Arc::clone(&sink) as Arc<dyn AuditSink>),
        ..EngineOptions::default()
    };

    let engine = Engine::with_options(options).expect("options should be valid");
    engine
        .register_template("greeting", "Hello")
        .expect("should register");

    (engine, sink)
}

#[test]
fn allowed_subject_executes_and_is_audited() {
    let (engine, sink) = checked_engine();

    let output = engine
        .execute_checked(&CancelToken::new(), "alice", "greeting", &Value::Null)
        .expect("should render");
    assert_eq!("Hello", output);

    let events = sink.events.lock().expect("lock should work");
    assert_eq!(1, events.len());
    assert_eq!(Operation::Execute, events[0].operation);
    assert_eq!("alice", events[0].subject);
    assert!(events[0].allowed);
    assert!(events[0].error.is_none());
}

#[test]
fn denied_subject_is_rejected_and_audited() {
    let (engine, sink) = checked_engine();

    let error = engine
        .execute_checked(&CancelToken::new(), "mallory", "greeting", &Value::Null)
        .expect_err("should be denied");
    assert_eq!(ErrorKind::Registry, error.kind);
    assert!(error.message.contains("not alice"));

    let events = sink.events.lock().expect("lock should work");
    assert_eq!(1, events.len());
    assert!(!events[0].allowed);
    assert!(events[0].error.is_some());
}

#[test]
fn execution_failures_reach_the_audit_sink() {
    let (engine, sink) = checked_engine();
    engine
        .register_template("broken", r#"{~prompty.var name="ghost" /~}"#)
        .expect("should register");

    let result = engine.execute_checked(&CancelToken::new(), "alice", "broken", &Value::Null);
    assert!(result.is_err());

    let events = sink.events.lock().expect("lock should work");
    assert_eq!(1, events.len());
    assert!(events[0].allowed);
    assert!(events[0]
        .error
        .as_deref()
        .expect("should carry the error")
        .contains("ghost"));
}

#[test]
fn templates_can_be_loaded_from_a_source() {
    use prompty::TemplateSource;

    struct FixedStore;
    impl TemplateSource for FixedStore {
        fn load(&self, name: &str) -> Result<String, String> {
            match name {
                "stored" => Ok("from the store".to_owned()),
                _ => Err("not found".to_owned()),
            }
        }
    }

    let engine = Engine::new();
    engine
        .register_template_from(&FixedStore, "stored")
        .expect("should load and register");

    let output = engine
        .get_template("stored")
        .expect("should exist")
        .execute(&CancelToken::new(), &Value::Null)
        .expect("should render");
    assert_eq!("from the store", output);

    let error = engine
        .register_template_from(&FixedStore, "missing")
        .expect_err("should fail");
    assert_eq!(ErrorKind::Registry, error.kind);
}

#[test]
fn unchecked_execution_skips_the_checker() {
    let (engine, sink) = checked_engine();

    let template = engine.get_template("greeting").expect("should exist");
    let output = template
        .execute(&CancelToken::new(), &Value::Null)
        .expect("should render");

    assert_eq!("Hello", output);
    assert!(sink.events.lock().expect("lock should work").is_empty());
}
