use miette::Report;
use resdef_core::primitive::ValueType;
use resdef_core::resource::ResourceKind;
use resdef_core::{CreateOptions, ErrorKind, Resource, ResourceError, ResourceType, Value};
use serde_json::json;

fn create_ok(definition: serde_json::Value) -> Resource {
    match Resource::create(&Value::from(definition)) {
        Ok(resource) => resource,
        Err(err) => panic!("{:?}", Report::from(err)),
    }
}

fn create_err(definition: serde_json::Value) -> ResourceError {
    match Resource::create(&Value::from(definition)) {
        Ok(_) => panic!("Expected a ResourceError, but got Ok"),
        Err(err) => err,
    }
}

#[test]
fn test_typed_string() {
    let color = create_ok(json!({"@type": "string", "@value": "green"}));
    assert_eq!(color.resource_type(), ResourceType::Value(ValueType::String));
    assert_eq!(color.value(), Some(&Value::from("green")));
    assert_eq!(color.serialize(), Some(Value::from("green")));
}

#[test]
fn test_literal_shorthand_infers_type() {
    let cases = [
        (json!("green"), ValueType::String),
        (json!(44), ValueType::Number),
        (json!(true), ValueType::Boolean),
        (json!(["a", "b"]), ValueType::Array),
    ];
    for (definition, expected) in cases {
        let resource = create_ok(definition.clone());
        match resource.kind() {
            ResourceKind::Value(leaf) => assert_eq!(leaf.value_type(), expected),
            other => panic!("Expected a value resource, got {other:?}"),
        }
        assert_eq!(resource.serialize(), Some(Value::from(definition)));
    }
}

#[test]
fn test_type_without_value_is_kept() {
    let resource = create_ok(json!({"@type": "string"}));
    assert_eq!(resource.value(), None);
    assert_eq!(
        resource.serialize(),
        Some(Value::from(json!({"@type": "string"})))
    );
}

#[test]
fn test_attributes_prevent_collapse() {
    let definition = json!({"@aliases": ["colour"], "@value": "green"});
    let resource = create_ok(definition.clone());
    assert_eq!(resource.aliases(), ["colour".to_string()]);
    assert_eq!(resource.serialize(), Some(Value::from(definition)));

    let single_alias = create_ok(json!({"@alias": "colour", "@value": "green"}));
    assert_eq!(single_alias.serialize(), Some(Value::from(json!({"@aliases": ["colour"], "@value": "green"}))));
}

#[test]
fn test_round_trip_is_canonical() {
    let definitions = [
        json!("green"),
        json!({"@type": "number", "@value": 3}),
        json!({"@type": "boolean"}),
        json!({"@value": "x", "@position": 1, "@description": "first word"}),
        json!({"@type": "array", "@value": [1, 2]}),
    ];
    for definition in definitions {
        let serialized = create_ok(definition).serialize().unwrap();
        let again = Resource::create(&serialized).unwrap().serialize().unwrap();
        assert_eq!(serialized, again);
        assert_ne!(serialized, Value::Object(Default::default()));
    }
}

#[test]
fn test_value_type_mismatch() {
    let err = create_err(json!({"@type": "number", "@value": "44"}));
    assert_eq!(err.kind(), ErrorKind::Type);

    let err = create_err(json!({"@type": "string", "@value": 44}));
    assert_eq!(err.kind(), ErrorKind::Type);
}

#[test]
fn test_parse_reads_text() {
    let options = CreateOptions::default().parsing();
    let definition = Value::from(json!({"@type": "number", "@value": "44"}));
    let age = Resource::create_with(Some(&definition), &options).unwrap();
    assert_eq!(age.value(), Some(&Value::from(44)));

    let definition = Value::from(json!({"@type": "boolean", "@value": "yes"}));
    let err = Resource::create_with(Some(&definition), &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);

    let definition = Value::from(json!({"@type": "number", "@value": "abc"}));
    let err = Resource::create_with(Some(&definition), &options).unwrap_err();
    assert!(matches!(err.root_cause(), ResourceError::ConversionFailed { .. }));
}

#[test]
fn test_numbers_must_be_finite() {
    let options = CreateOptions::default().parsing();
    for text in ["inf", "-infinity", "1e400"] {
        let definition = Value::from(json!({"@type": "number", "@value": text}));
        let err = Resource::create_with(Some(&definition), &options).unwrap_err();
        assert!(matches!(err.root_cause(), ResourceError::ConversionFailed { .. }));
    }

    let mut count = create_ok(json!({"@type": "number"}));
    assert!(count.set_value(f64::INFINITY, false).is_err());
    assert_eq!(count.value(), None);
}

#[test]
fn test_set_value_normalizes() {
    let mut count = create_ok(json!({"@type": "number"}));
    count.set_value("12", true).unwrap();
    assert_eq!(count.value(), Some(&Value::from(12)));

    let err = count.set_value("13", false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(count.value(), Some(&Value::from(12)));
}

#[test]
fn test_integral_numbers_serialize_without_fraction() {
    let resource = create_ok(json!({"age": 44, "height": 1.5}));
    let json = resource.serialize().unwrap().to_json().unwrap();
    assert!(json.contains("\"age\": 44"));
    assert!(json.contains("\"height\": 1.5"));
}

#[test]
fn test_invalid_definitions() {
    let err = create_err(json!({"@colour": "green"}));
    assert_eq!(err.kind(), ErrorKind::Definition);

    let err = create_err(json!({"@value": {"nested": true}}));
    assert_eq!(err.kind(), ErrorKind::Definition);

    let err = create_err(json!({"@type": "object", "@value": 3}));
    assert_eq!(err.kind(), ErrorKind::Type);

    let err = create_err(json!({"@type": "string", "@input": {}}));
    assert!(matches!(err.root_cause(), ResourceError::UnsupportedAttribute { .. }));

    let err = create_err(json!({"@type": "string", "@isVariadic": true}));
    assert_eq!(err.kind(), ErrorKind::Definition);
}

#[test]
fn test_unknown_type_needs_a_loader() {
    let err = create_err(json!({"@type": "./color"}));
    assert_eq!(err.kind(), ErrorKind::Lookup);
}
