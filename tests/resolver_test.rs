use miette::Report;
use resdef_core::resource::TypeRef;
use resdef_core::{CreateOptions, ErrorKind, MemoryLoader, Resource, ResourceError, Runtime, Value};
use serde_json::json;
use std::ops::ControlFlow;
use std::path::Path;
use std::rc::Rc;

fn library() -> MemoryLoader {
    MemoryLoader::new()
        .with(
            "/lib/animal",
            Value::from(json!({
                "legs": 4,
                "sound": {"@type": "string", "@description": "What it says"}
            })),
        )
        .with(
            "/lib/dog",
            Value::from(json!({"@type": "./animal", "sound": "woof"})),
        )
        .with(
            "/lib/label",
            Value::from(json!({
                "@type": "string",
                "@value": "untitled",
                "@position": 0,
                "@description": "A label"
            })),
        )
}

fn create_ok(runtime: &Runtime, definition: serde_json::Value) -> Rc<Resource> {
    match runtime.create(&Value::from(definition), &CreateOptions::default()) {
        Ok(resource) => resource,
        Err(err) => panic!("{:?}", Report::from(err)),
    }
}

fn create_err(runtime: &Runtime, definition: serde_json::Value) -> ResourceError {
    match runtime.create(&Value::from(definition), &CreateOptions::default()) {
        Ok(_) => panic!("Expected a ResourceError, but got Ok"),
        Err(err) => err,
    }
}

#[test]
fn test_multi_level_inheritance() {
    let runtime = Runtime::new().with_loader(library());
    let rex = create_ok(&runtime, json!({"@type": "/lib/dog", "name": "Rex"}));

    assert_eq!(rex.get("name"), Some(Value::from("Rex")));
    assert_eq!(rex.get("sound"), Some(Value::from("woof")));
    assert_eq!(rex.get("legs"), Some(Value::from(4)));
    assert_eq!(rex.chain().len(), 3);
    assert_eq!(rex.type_ref(), Some(&TypeRef::Identifier("/lib/dog".to_string())));

    // Attributes of the inherited child resolve through every level
    let sound = rex.child("sound").unwrap();
    assert_eq!(sound.description(), Some("What it says"));

    assert_eq!(
        rex.serialize(),
        Some(Value::from(json!({"@type": "/lib/dog", "name": "Rex"})))
    );
}

#[test]
fn test_local_values_shadow_inherited_ones() {
    let runtime = Runtime::new().with_loader(library());
    let title = create_ok(&runtime, json!({"@type": "/lib/label", "@value": "Resources"}));
    assert_eq!(title.value(), Some(&Value::from("Resources")));
    assert_eq!(title.position(), Some(0));
    assert_eq!(title.description(), Some("A label"));

    let inherited = create_ok(&runtime, json!({"@type": "/lib/label"}));
    assert_eq!(inherited.value(), Some(&Value::from("untitled")));
    assert_eq!(inherited.serialize(), Some(Value::from(json!({"@type": "/lib/label"}))));
}

#[test]
fn test_unset_shadows_without_a_value() {
    let runtime = Runtime::new().with_loader(library());
    let bare = create_ok(
        &runtime,
        json!({"@type": "/lib/label", "@value": null, "@description": null}),
    );
    assert_eq!(bare.value(), None);
    assert_eq!(bare.description(), None);
    assert_eq!(bare.position(), Some(0));

    let base = runtime.load("/lib/label", None).unwrap();
    assert_eq!(base.description(), Some("A label"));
}

#[test]
fn test_loads_are_cached_by_location() {
    let runtime = Runtime::new().with_loader(library());
    let first = runtime.load("/lib/dog", None).unwrap();
    let second = runtime.load("./dog", Some(Path::new("/lib"))).unwrap();
    assert!(Rc::ptr_eq(&first, &second));

    let rex = create_ok(&runtime, json!({"@type": "/lib/dog"}));
    assert!(Rc::ptr_eq(&rex.bases()[0], &first));
}

#[test]
fn test_circular_bases_are_rejected() {
    let loader = MemoryLoader::new()
        .with("/a", Value::from(json!({"@type": "./b"})))
        .with("/b", Value::from(json!({"@type": "./a"})));
    let runtime = Runtime::new().with_loader(loader);

    let err = runtime.load("/a", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Definition);
    assert!(err.to_string().contains("/a -> /b -> /a"));
}

#[test]
fn test_missing_identifiers() {
    let runtime = Runtime::new().with_loader(library());
    let err = create_err(&runtime, json!({"@type": "/lib/cat"}));
    assert_eq!(err.kind(), ErrorKind::Lookup);

    let err = create_err(&runtime, json!({"pet": {"@type": "/lib/cat"}}));
    assert_eq!(err.path(), Some("pet"));
}

#[test]
fn test_visit_order_and_early_stop() {
    let runtime = Runtime::new().with_loader(library());
    let rex = create_ok(&runtime, json!({"@type": "/lib/dog"}));

    let mut visited = 0;
    let found = rex.for_self_and_each_base(true, |resource| {
        visited += 1;
        match resource.local_child("legs") {
            Some(legs) => ControlFlow::Break(legs.value().cloned()),
            None => ControlFlow::Continue(()),
        }
    });
    assert_eq!(found, Some(Some(Value::from(4))));
    assert_eq!(visited, 3);

    let mut shallow = 0;
    let nothing: Option<()> = rex.for_self_and_each_base(false, |_| {
        shallow += 1;
        ControlFlow::Continue(())
    });
    assert_eq!(nothing, None);
    assert_eq!(shallow, 2);
}

#[test]
fn test_inherited_value_tri_state() {
    let runtime = Runtime::new().with_loader(library());
    let title = create_ok(&runtime, json!({"@type": "/lib/label", "@aliases": null}));
    assert!(title.aliases().is_empty());
    assert_eq!(
        title.serialize(),
        Some(Value::from(json!({"@type": "/lib/label", "@aliases": null})))
    );
}
