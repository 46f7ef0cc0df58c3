//! The environment: the global invocation flags `@verbose`, `@quiet` and
//! `@debug`, each with a one-letter alias.
//!
//! A [`Runtime`](crate::runtime::Runtime) builds one shared environment on
//! first use. Call-scoped overrides never touch it; [`Environment::extend`]
//! returns a specialized copy instead.

use crate::definition::{Attribute, MARKER};
use crate::error::ResourceError;
use crate::primitive::ValueType;
use crate::resolver::Attr;
use crate::resource::{Resource, ResourceKind, ValueResource};
use crate::value::{Map, Value};
use std::rc::Rc;

const FLAGS: [(Attribute, &str); 3] = [
    (Attribute::Verbose, "@v"),
    (Attribute::Quiet, "@q"),
    (Attribute::Debug, "@d"),
];

/// The root of every environment resource: three native boolean flags.
pub(crate) fn prototype() -> Resource {
    let mut prototype = Resource {
        kind: ResourceKind::Environment,
        is_native: true,
        ..Resource::default()
    };
    for (flag, alias) in FLAGS {
        let child = Resource {
            is_native: true,
            aliases: Attr::Set(vec![alias.to_string()]),
            kind: ResourceKind::Value(ValueResource {
                value_type: ValueType::Boolean,
                value: Attr::Absent,
            }),
            ..Resource::default()
        };
        prototype.insert_child(flag.key(), child);
    }
    prototype
}

#[derive(Debug, Clone)]
pub struct Environment {
    resource: Rc<Resource>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    #[must_use]
    pub fn new() -> Self {
        Environment {
            resource: Rc::new(prototype()),
        }
    }

    /// The environment resource; its children are the flags.
    #[must_use]
    pub fn resource(&self) -> &Rc<Resource> {
        &self.resource
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.flag(Attribute::Verbose)
    }

    #[must_use]
    pub fn quiet(&self) -> bool {
        self.flag(Attribute::Quiet)
    }

    #[must_use]
    pub fn debug(&self) -> bool {
        self.flag(Attribute::Debug)
    }

    fn flag(&self, flag: Attribute) -> bool {
        self.resource
            .child(flag.key())
            .and_then(|child| child.value())
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Finds the flag a call argument names, by key or alias, with or
    /// without the leading marker. Returns the canonical key.
    #[must_use]
    pub fn find_parameter(&self, name: &str) -> Option<&str> {
        let marked;
        let name = if name.starts_with(MARKER) {
            name
        } else {
            marked = format!("{MARKER}{name}");
            &marked
        };
        FLAGS
            .iter()
            .map(|(flag, _)| flag.key())
            .find(|key| self.resource.child(key).is_some_and(|flag| flag.is_named(name)))
    }

    /// A new environment with `overrides` applied on top of this one. Keys
    /// may be given with or without the marker, or by alias.
    ///
    /// # Errors
    /// Fails with an invalid-argument error on an unknown key, or a type
    /// error when a flag is not boolean.
    pub fn extend(&self, overrides: &Map, parse: bool) -> Result<Environment, ResourceError> {
        if overrides.is_empty() {
            return Ok(self.clone());
        }
        let mut extended = Resource::derive(&self.resource);
        for (name, value) in overrides {
            let key = self
                .find_parameter(name)
                .ok_or_else(|| ResourceError::InvalidArgument { key: name.clone() })?;
            extended.set_child(key, value.clone(), parse)?;
        }
        Ok(Environment {
            resource: Rc::new(extended),
        })
    }

    /// The resolved flags, keyed without the marker.
    #[must_use]
    pub fn to_map(&self) -> Map {
        FLAGS
            .iter()
            .map(|(flag, _)| {
                let key = flag.key().trim_start_matches(MARKER).to_string();
                (key, Value::Boolean(self.flag(*flag)))
            })
            .collect()
    }
}
