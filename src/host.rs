//! Native implementations supplied by host code.
//!
//! A method without a run expression is implemented by a host function
//! registered under an owner name and the method key. The owner name of a
//! resource is its `@id`; while walking the base chain, every resource with
//! an `@id` or a built-in type reference is a candidate owner.

use crate::environment::Environment;
use crate::error::ResourceError;
use crate::resource::{Resource, TypeRef};
use crate::runtime::Runtime;
use crate::value::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub type NativeFn = Rc<dyn Fn(&Invocation<'_>) -> Result<Option<Value>, ResourceError>>;

/// What a native implementation receives: the bound call.
pub struct Invocation<'a> {
    pub(crate) runtime: &'a Runtime,
    pub(crate) target: &'a Rc<Resource>,
    pub(crate) method: &'a str,
    pub(crate) arguments: &'a Map,
    pub(crate) environment: &'a Environment,
}

impl<'a> Invocation<'a> {
    #[must_use]
    pub fn runtime(&self) -> &'a Runtime {
        self.runtime
    }

    /// The resource the method was invoked on.
    #[must_use]
    pub fn target(&self) -> &'a Rc<Resource> {
        self.target
    }

    #[must_use]
    pub fn method(&self) -> &'a str {
        self.method
    }

    /// Bound input values, keyed by their declared key.
    #[must_use]
    pub fn arguments(&self) -> &'a Map {
        self.arguments
    }

    #[must_use]
    pub fn argument(&self, key: &str) -> Option<&'a Value> {
        self.arguments.get(key)
    }

    /// The environment in effect for this call.
    #[must_use]
    pub fn environment(&self) -> &'a Environment {
        self.environment
    }
}

#[derive(Clone, Default)]
pub struct HostTable {
    functions: HashMap<(String, String), NativeFn>,
}

impl fmt::Debug for HostTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.functions.keys().collect();
        keys.sort();
        f.debug_struct("HostTable").field("functions", &keys).finish()
    }
}

impl HostTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `function` as the implementation of `method` for resources
    /// owned by `owner`.
    pub fn register<F>(&mut self, owner: impl Into<String>, method: impl Into<String>, function: F)
    where
        F: Fn(&Invocation<'_>) -> Result<Option<Value>, ResourceError> + 'static,
    {
        self.functions
            .insert((owner.into(), method.into()), Rc::new(function));
    }

    #[must_use]
    pub fn with<F>(mut self, owner: impl Into<String>, method: impl Into<String>, function: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<Option<Value>, ResourceError> + 'static,
    {
        self.register(owner, method, function);
        self
    }

    #[must_use]
    pub fn get(&self, owner: &str, method: &str) -> Option<&NativeFn> {
        self.functions.get(&(owner.to_string(), method.to_string()))
    }

    /// The function `resource` itself supplies for `method`, if any.
    #[must_use]
    pub fn lookup(&self, resource: &Resource, method: &str) -> Option<&NativeFn> {
        owner_names(resource).find_map(|owner| self.get(owner, method))
    }
}

fn owner_names(resource: &Resource) -> impl Iterator<Item = &str> {
    let builtin = match resource.type_ref() {
        Some(TypeRef::Builtin(builtin)) => Some(builtin.name()),
        _ => None,
    };
    resource.id().into_iter().chain(builtin)
}
