use resdef_core::{
    Arguments, Environment, ErrorKind, HostTable, InvokeOptions, Resource, ResourceType, Runtime,
    Value,
};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn test_shared_environment_is_built_once() {
    let runtime = Runtime::new();
    let first = runtime.environment();
    let second = runtime.environment();
    assert!(std::ptr::eq(first, second));
    assert!(Rc::ptr_eq(first.resource(), second.resource()));
}

#[test]
fn test_environment_definitions() {
    let definition = Value::from(json!({"@type": "environment", "@v": true}));
    let environment = Resource::create(&definition).unwrap();
    assert_eq!(environment.resource_type(), ResourceType::Environment);
    assert_eq!(environment.get("@verbose"), Some(Value::Boolean(true)));
    assert_eq!(environment.get("@quiet"), None);

    let inferred = Resource::create(&Value::from(json!({"@debug": true}))).unwrap();
    assert_eq!(inferred.resource_type(), ResourceType::Environment);

    let err = Resource::create(&Value::from(json!({"@type": "environment", "color": 1}))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Definition);

    let err = Resource::create(&Value::from(json!({"@type": "environment", "@quiet": "yes"}))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
}

#[test]
fn test_extend_leaves_the_shared_environment_untouched() {
    let shared = Environment::new();
    let overrides = Arguments::from([("quiet", true)]).into_map();
    let quiet = shared.extend(&overrides, false).unwrap();

    assert!(quiet.quiet());
    assert!(!shared.quiet());
    assert_eq!(
        Value::Object(quiet.to_map()),
        Value::from(json!({"verbose": false, "quiet": true, "debug": false}))
    );

    let louder = quiet
        .extend(&Arguments::from([("@verbose", true)]).into_map(), false)
        .unwrap();
    assert!(louder.quiet());
    assert!(louder.verbose());
    assert!(!quiet.verbose());
}

#[test]
fn test_explicit_call_environment() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let recorder = Rc::clone(&seen);
    let host = HostTable::new().with("tool", "build", move |invocation| {
        let environment = invocation.environment();
        recorder.borrow_mut().push((environment.verbose(), environment.quiet()));
        Ok(None)
    });
    let runtime = Runtime::new().with_host(host);
    let tool = runtime
        .create(
            &Value::from(json!({"@id": "tool", "build": {"@input": {}}})),
            &Default::default(),
        )
        .unwrap();

    let verbose = Environment::new()
        .extend(&Arguments::from([("v", true)]).into_map(), false)
        .unwrap();
    let options = InvokeOptions {
        parse: false,
        environment: Some(verbose),
    };
    runtime
        .invoke_with(&tool, "build", Arguments::from([("q", true)]), &options)
        .unwrap();

    assert_eq!(*seen.borrow(), vec![(true, true)]);
}

#[test]
fn test_hooks_inherit_the_call_environment() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let recorder = Rc::clone(&seen);
    let host = HostTable::new()
        .with("tool", "lint", move |invocation| {
            recorder.borrow_mut().push(invocation.environment().verbose());
            Ok(None)
        })
        .with("tool", "build", |_| Ok(None));
    let runtime = Runtime::new().with_host(host);
    let tool = runtime
        .create(
            &Value::from(json!({
                "@id": "tool",
                "lint": {"@input": {}},
                "build": {"@input": {}, "@before": "lint"}
            })),
            &Default::default(),
        )
        .unwrap();

    runtime.run(&tool, "build --verbose").unwrap();
    runtime.run(&tool, "build").unwrap();
    assert_eq!(*seen.borrow(), vec![true, false]);
}
