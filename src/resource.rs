//! The resource model.
//!
//! A [`Resource`] is built from definition data. Reserved attributes are
//! consumed by the resource kind that understands them and every other key
//! becomes a child resource. Children inherited from a base are read through
//! transparently; writing to them creates a local child that specializes the
//! inherited one, so bases are never mutated.

use crate::definition::{Attribute, Definition};
use crate::environment;
use crate::error::ResourceError;
use crate::method::MethodResource;
use crate::primitive::{self, ValueType};
use crate::resolver::{Attr, BaseResolver, Detached};
use crate::value::{Map, Value};
use indexmap::{IndexMap, IndexSet};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Built-in resource types, named by `@type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Value(ValueType),
    Object,
    Method,
    Environment,
}

impl ResourceType {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ResourceType::Value(value_type) => value_type.name(),
            ResourceType::Object => "object",
            ResourceType::Method => "method",
            ResourceType::Environment => "environment",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<ResourceType> {
        match name {
            "object" => Some(ResourceType::Object),
            "method" => Some(ResourceType::Method),
            "environment" => Some(ResourceType::Environment),
            other => ValueType::from_name(other).map(ResourceType::Value),
        }
    }
}

/// How a resource named its base in its definition.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Builtin(ResourceType),
    Identifier(String),
    Inline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueResource {
    pub(crate) value_type: ValueType,
    pub(crate) value: Attr<Value>,
}

impl ValueResource {
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }
}

#[derive(Debug, Clone, Default)]
pub enum ResourceKind {
    Value(ValueResource),
    #[default]
    Object,
    Method(MethodResource),
    Environment,
}

impl ResourceKind {
    fn empty(resource_type: ResourceType) -> ResourceKind {
        match resource_type {
            ResourceType::Value(value_type) => ResourceKind::Value(ValueResource {
                value_type,
                value: Attr::Absent,
            }),
            ResourceType::Object => ResourceKind::Object,
            ResourceType::Method => ResourceKind::Method(MethodResource::default()),
            ResourceType::Environment => ResourceKind::Environment,
        }
    }

    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        match self {
            ResourceKind::Value(leaf) => ResourceType::Value(leaf.value_type),
            ResourceKind::Object => ResourceType::Object,
            ResourceKind::Method(_) => ResourceType::Method,
            ResourceKind::Environment => ResourceType::Environment,
        }
    }
}

/// Options for building a resource from a definition.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Key within the enclosing object.
    pub key: Option<String>,
    /// Directory that relative type identifiers resolve against.
    pub directory: Option<PathBuf>,
    /// Read textual values according to each leaf type's grammar.
    pub parse: bool,
    /// The implementation is supplied by host code.
    pub is_native: bool,
}

impl CreateOptions {
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    #[must_use]
    pub fn parsing(mut self) -> Self {
        self.parse = true;
        self
    }

    #[must_use]
    pub fn native(mut self) -> Self {
        self.is_native = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Resource {
    pub(crate) key: Option<String>,
    pub(crate) id: Option<String>,
    pub(crate) type_ref: Option<TypeRef>,
    pub(crate) bases: Vec<Rc<Resource>>,
    pub(crate) directory: Option<PathBuf>,
    pub(crate) is_native: bool,
    pub(crate) aliases: Attr<Vec<String>>,
    pub(crate) position: Attr<usize>,
    pub(crate) is_variadic: Attr<bool>,
    pub(crate) is_sub_input: Attr<bool>,
    pub(crate) description: Attr<String>,
    pub(crate) children: IndexMap<String, Rc<Resource>>,
    pub(crate) kind: ResourceKind,
}

impl Resource {
    /// Builds a resource from `definition` without a loader; type references
    /// must be built-in names or inline definitions.
    ///
    /// # Errors
    /// Fails on any invalid definition.
    pub fn create(definition: &Value) -> Result<Resource, ResourceError> {
        Resource::create_with(Some(definition), &CreateOptions::default())
    }

    /// Like [`Resource::create`], with options. A `None` definition builds an
    /// empty object.
    ///
    /// # Errors
    /// Fails on any invalid definition.
    pub fn create_with(
        definition: Option<&Value>,
        options: &CreateOptions,
    ) -> Result<Resource, ResourceError> {
        Resource::build(definition, options, None, &Detached)
    }

    /// An empty resource that specializes `base`.
    #[must_use]
    pub fn derive(base: &Rc<Resource>) -> Resource {
        let kind = ResourceKind::empty(base.resource_type());
        Resource {
            key: base.key.clone(),
            directory: base.directory.clone(),
            is_native: base.is_native,
            bases: vec![Rc::clone(base)],
            kind,
            ..Resource::default()
        }
    }

    /// Specializes `base` and assigns `value` to the new resource.
    ///
    /// # Errors
    /// Fails if `value` does not fit the base's shape.
    pub fn extend_with(
        base: &Rc<Resource>,
        value: Option<&Value>,
        parse: bool,
    ) -> Result<Resource, ResourceError> {
        let mut resource = Resource::derive(base);
        if let Some(value) = value {
            resource.assign(value, parse)?;
        }
        Ok(resource)
    }

    pub(crate) fn build(
        definition: Option<&Value>,
        options: &CreateOptions,
        implicit_base: Option<Rc<Resource>>,
        resolver: &dyn BaseResolver,
    ) -> Result<Resource, ResourceError> {
        let mut definition = Definition::split(definition)?;
        let directory = options.directory.clone();

        let mut type_ref = None;
        let mut bases = Vec::new();
        let resource_type = match definition.take(Attribute::Type) {
            Some(Value::String(name)) => match ResourceType::from_name(&name) {
                Some(builtin) => {
                    type_ref = Some(TypeRef::Builtin(builtin));
                    builtin
                }
                None => {
                    let base = resolver.resolve_base(&name, directory.as_deref())?;
                    type_ref = Some(TypeRef::Identifier(name));
                    let resource_type = base.resource_type();
                    bases.push(base);
                    resource_type
                }
            },
            Some(inline @ Value::Object(_)) => {
                let base_options = CreateOptions {
                    key: None,
                    ..options.clone()
                };
                let base = Resource::build(Some(&inline), &base_options, None, resolver)
                    .map_err(|e| e.with_context(Attribute::Type.key()))?;
                type_ref = Some(TypeRef::Inline);
                let resource_type = base.resource_type();
                bases.push(Rc::new(base));
                resource_type
            }
            Some(other) => {
                return Err(ResourceError::type_mismatch(
                    "type reference",
                    other.type_name(),
                ))
            }
            None => match implicit_base {
                Some(base) => {
                    let resource_type = base.resource_type();
                    bases.push(base);
                    resource_type
                }
                None => infer_type(&definition)?,
            },
        };
        if resource_type == ResourceType::Environment && bases.is_empty() {
            bases.push(Rc::new(environment::prototype()));
        }

        let mut resource = match bases.first() {
            Some(base) => {
                let mut derived = Resource::derive(base);
                derived.bases = bases;
                derived
            }
            None => Resource {
                kind: ResourceKind::empty(resource_type),
                ..Resource::default()
            },
        };
        resource.key = options.key.clone();
        resource.type_ref = type_ref;
        resource.is_native |= options.is_native;
        if directory.is_some() {
            resource.directory = directory;
        }

        resource.construct(&mut definition, options.parse, resolver)?;
        Ok(resource)
    }

    fn construct(
        &mut self,
        definition: &mut Definition,
        parse: bool,
        resolver: &dyn BaseResolver,
    ) -> Result<(), ResourceError> {
        if let Some(id) = definition.take(Attribute::Id) {
            match id {
                Value::String(id) => self.id = Some(id),
                other => return Err(ResourceError::type_mismatch("string", other.type_name())),
            }
        }
        self.aliases = take_attr(definition, Attribute::Aliases, |value| match value {
            Value::String(alias) => Ok(vec![alias]),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(alias) => Ok(alias),
                    other => Err(ResourceError::type_mismatch("string", other.type_name())),
                })
                .collect(),
            other => Err(ResourceError::type_mismatch("array", other.type_name())),
        })?;
        self.position = take_attr(definition, Attribute::Position, |value| match value {
            Value::Number(n) if n >= 0.0 && n.fract() == 0.0 => Ok(n as usize),
            other => Err(ResourceError::type_mismatch(
                "non-negative integer",
                &other.to_string(),
            )),
        })?;
        self.is_variadic = take_attr(definition, Attribute::IsVariadic, expect_bool)?;
        self.is_sub_input = take_attr(definition, Attribute::IsSubInput, expect_bool)?;
        self.description = take_attr(definition, Attribute::Description, |value| match value {
            Value::String(text) => Ok(text),
            other => Err(ResourceError::type_mismatch("string", other.type_name())),
        })?;

        let is_environment = matches!(self.kind, ResourceKind::Environment);
        let mut flags = Vec::new();
        match &mut self.kind {
            ResourceKind::Value(leaf) => {
                if let Some(raw) = definition.take(Attribute::Value) {
                    leaf.value = if raw.is_null() {
                        Attr::Unset
                    } else {
                        Attr::Set(leaf.value_type.normalize(&raw, parse)?)
                    };
                }
            }
            ResourceKind::Method(method) => {
                let inherited_input = self
                    .bases
                    .iter()
                    .find_map(|base| base.method_input().cloned());
                method.construct(
                    definition,
                    self.directory.as_deref(),
                    inherited_input,
                    resolver,
                )?;
            }
            ResourceKind::Object | ResourceKind::Environment => {
                if let Some(raw) = definition.take(Attribute::Value) {
                    return Err(ResourceError::ObjectExpected {
                        key: self.key.clone().unwrap_or_default(),
                        found: raw.type_name().to_string(),
                    });
                }
                if is_environment {
                    for flag in [Attribute::Verbose, Attribute::Quiet, Attribute::Debug] {
                        if let Some(value) = definition.take(flag) {
                            flags.push((flag.key(), value));
                        }
                    }
                }
            }
        }
        definition.ensure_consumed(self.resource_type().name())?;

        if self.is_variadic() && self.position().is_none() {
            return Err(ResourceError::invalid_definition(
                "a variadic resource must declare a `@position`",
            ));
        }

        if is_environment && !definition.children().is_empty() {
            return Err(ResourceError::invalid_definition(
                "an environment only accepts the `@verbose`, `@quiet` and `@debug` flags",
            ));
        }
        for (key, value) in flags {
            self.set_child(key, value, parse)?;
        }

        for (key, child_definition) in definition.children() {
            let inherited = self.inherited_child(key).cloned();
            let options = CreateOptions {
                key: Some(key.clone()),
                directory: self.directory.clone(),
                parse,
                is_native: false,
            };
            let child = Resource::build(Some(child_definition), &options, inherited, resolver)
                .map_err(|e| e.with_context(key))?;
            self.children.insert(key.clone(), Rc::new(child));
        }
        Ok(())
    }

    // === Attributes ===

    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// The identifier declared locally with `@id`.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    #[must_use]
    pub fn type_ref(&self) -> Option<&TypeRef> {
        self.type_ref.as_ref()
    }

    #[must_use]
    pub fn bases(&self) -> &[Rc<Resource>] {
        &self.bases
    }

    #[must_use]
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    #[must_use]
    pub fn is_native(&self) -> bool {
        self.is_native
    }

    #[must_use]
    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        self.kind.resource_type()
    }

    #[must_use]
    pub fn aliases(&self) -> &[String] {
        self.inherited_value(|r| Some(&r.aliases))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn position(&self) -> Option<usize> {
        self.inherited_value(|r| Some(&r.position)).copied()
    }

    #[must_use]
    pub fn is_variadic(&self) -> bool {
        self.inherited_value(|r| Some(&r.is_variadic))
            .copied()
            .unwrap_or(false)
    }

    #[must_use]
    pub fn is_sub_input(&self) -> bool {
        self.inherited_value(|r| Some(&r.is_sub_input))
            .copied()
            .unwrap_or(false)
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.inherited_value(|r| Some(&r.description))
            .map(String::as_str)
    }

    /// Whether `name` is the key or one of the aliases.
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        self.key() == Some(name) || self.aliases().iter().any(|alias| alias == name)
    }

    // === Values ===

    /// The resolved value of a leaf resource.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.inherited_value(|r| match &r.kind {
            ResourceKind::Value(leaf) => Some(&leaf.value),
            _ => None,
        })
    }

    /// Assigns `value` to a leaf resource, or child values to an object.
    ///
    /// # Errors
    /// Fails with a type-class error when `value` does not fit.
    pub fn set_value(&mut self, value: impl Into<Value>, parse: bool) -> Result<(), ResourceError> {
        self.assign(&value.into(), parse)
    }

    pub(crate) fn assign(&mut self, value: &Value, parse: bool) -> Result<(), ResourceError> {
        if let ResourceKind::Value(leaf) = &mut self.kind {
            leaf.value = if value.is_null() {
                Attr::Unset
            } else {
                Attr::Set(leaf.value_type.normalize(value, parse)?)
            };
            return Ok(());
        }
        if matches!(self.kind, ResourceKind::Method(_)) {
            return Err(ResourceError::type_mismatch("method definition", value.type_name()));
        }
        match value {
            Value::Object(map) => {
                for (key, child_value) in map {
                    self.set_child(key, child_value.clone(), parse)?;
                }
                Ok(())
            }
            other => Err(ResourceError::ObjectExpected {
                key: self.key.clone().unwrap_or_default(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// The plain value of the resource: a leaf's value, or an object's
    /// child values. Absent when nothing holds a value.
    #[must_use]
    pub fn unbox(&self) -> Option<Value> {
        match &self.kind {
            ResourceKind::Value(_) => self.value().cloned(),
            ResourceKind::Method(_) => None,
            ResourceKind::Object | ResourceKind::Environment => {
                let map: Map = self
                    .child_entries()
                    .into_iter()
                    .filter_map(|(key, child)| child.unbox().map(|value| (key.to_string(), value)))
                    .collect();
                if map.is_empty() {
                    None
                } else {
                    Some(Value::Object(map))
                }
            }
        }
    }

    // === Children ===

    #[must_use]
    pub fn local_child(&self, key: &str) -> Option<&Rc<Resource>> {
        self.children.get(key)
    }

    /// The child under `key`, defined locally or inherited.
    #[must_use]
    pub fn child(&self, key: &str) -> Option<&Rc<Resource>> {
        self.for_self_and_each_base(true, |resource| match resource.children.get(key) {
            Some(child) => ControlFlow::Break(child),
            None => ControlFlow::Continue(()),
        })
    }

    pub(crate) fn inherited_child(&self, key: &str) -> Option<&Rc<Resource>> {
        self.bases.iter().find_map(|base| base.child(key))
    }

    /// The child whose key or alias is `name`, with its canonical key.
    #[must_use]
    pub fn find_child(&self, name: &str) -> Option<(&str, &Rc<Resource>)> {
        let entries = self.child_entries();
        let by_key = entries.iter().find(|(key, _)| *key == name);
        by_key
            .or_else(|| {
                entries
                    .iter()
                    .find(|(_, child)| child.aliases().iter().any(|alias| alias == name))
            })
            .copied()
    }

    /// All children, local and inherited. Keys first defined by a base come
    /// first; each key resolves to its most specialized definition.
    #[must_use]
    pub fn child_entries(&self) -> Vec<(&str, &Rc<Resource>)> {
        let mut keys: IndexSet<&str> = IndexSet::new();
        for resource in self.chain().into_iter().rev() {
            for key in resource.children.keys() {
                keys.insert(key.as_str());
            }
        }
        keys.into_iter()
            .filter_map(|key| self.child(key).map(|child| (key, child)))
            .collect()
    }

    /// The unboxed value of the child `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.child(key).and_then(|child| child.unbox())
    }

    /// Assigns `value` to the child `key`; see [`Resource::set_child`].
    ///
    /// # Errors
    /// Fails when the value does not fit the child's shape.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<(), ResourceError> {
        self.set_child(key, value, false)
    }

    /// Assigns `value` to the child named `key` (by key or alias). A local
    /// child is updated in place; an inherited child is specialized locally;
    /// an unknown key defines a new child from the literal value.
    ///
    /// # Errors
    /// Fails when the value does not fit the child's shape, or when the key
    /// is unknown to an environment.
    pub fn set_child(
        &mut self,
        key: &str,
        value: impl Into<Value>,
        parse: bool,
    ) -> Result<(), ResourceError> {
        let value = value.into();
        let key = self
            .find_child(key)
            .map_or_else(|| key.to_string(), |(canonical, _)| canonical.to_string());

        let result = if let Some(child) = self.children.get_mut(&key) {
            Rc::make_mut(child).assign(&value, parse)
        } else if let Some(inherited) = self.inherited_child(&key).cloned() {
            Resource::extend_with(&inherited, Some(&value), parse).map(|child| {
                self.children.insert(key.clone(), Rc::new(child));
            })
        } else if matches!(self.kind, ResourceKind::Environment) {
            return Err(ResourceError::InvalidArgument { key });
        } else {
            let options = CreateOptions {
                key: Some(key.clone()),
                directory: self.directory.clone(),
                parse,
                is_native: false,
            };
            Resource::build(Some(&value), &options, None, &Detached).map(|child| {
                self.children.insert(key.clone(), Rc::new(child));
            })
        };
        result.map_err(|e| e.with_context(&key))
    }

    /// Inserts a child resource, replacing any local child under its key.
    pub fn insert_child(&mut self, key: impl Into<String>, mut child: Resource) {
        let key = key.into();
        child.key = Some(key.clone());
        self.children.insert(key, Rc::new(child));
    }

    // === Serialization ===

    /// The canonical compact definition of the resource, or `None` when it
    /// overrides nothing.
    #[must_use]
    pub fn serialize(&self) -> Option<Value> {
        let mut definition = Map::new();

        match &self.type_ref {
            Some(TypeRef::Builtin(builtin)) => {
                definition.insert(Attribute::Type.key().into(), Value::from(builtin.name()));
            }
            Some(TypeRef::Identifier(identifier)) => {
                definition.insert(Attribute::Type.key().into(), Value::from(identifier.as_str()));
            }
            Some(TypeRef::Inline) => {
                let base = self
                    .bases
                    .first()
                    .and_then(|base| base.serialize())
                    .unwrap_or_else(|| Value::Object(Map::new()));
                definition.insert(Attribute::Type.key().into(), base);
            }
            None => {}
        }
        if let Some(id) = &self.id {
            definition.insert(Attribute::Id.key().into(), Value::from(id.as_str()));
        }
        serialize_attr(&mut definition, Attribute::Aliases, &self.aliases, |aliases| {
            Value::Array(aliases.iter().map(|alias| Value::from(alias.as_str())).collect())
        });
        serialize_attr(&mut definition, Attribute::Position, &self.position, |position| {
            Value::from(*position)
        });
        serialize_attr(&mut definition, Attribute::IsVariadic, &self.is_variadic, |b| {
            Value::Boolean(*b)
        });
        serialize_attr(&mut definition, Attribute::IsSubInput, &self.is_sub_input, |b| {
            Value::Boolean(*b)
        });
        serialize_attr(&mut definition, Attribute::Description, &self.description, |text| {
            Value::from(text.as_str())
        });

        match &self.kind {
            ResourceKind::Value(leaf) => {
                serialize_attr(&mut definition, Attribute::Value, &leaf.value, Clone::clone);
            }
            ResourceKind::Method(method) => method.serialize_into(&mut definition),
            ResourceKind::Object | ResourceKind::Environment => {}
        }

        for (key, child) in &self.children {
            if let Some(serialized) = child.serialize() {
                definition.insert(key.clone(), serialized);
            }
        }

        match self.kind {
            ResourceKind::Value(_) => primitive::compact(definition),
            _ if definition.is_empty() => None,
            _ => Some(Value::Object(definition)),
        }
    }
}

fn infer_type(definition: &Definition) -> Result<ResourceType, ResourceError> {
    if let Some(value) = definition.get(Attribute::Value) {
        return ValueType::infer(value)
            .map(ResourceType::Value)
            .ok_or_else(|| {
                ResourceError::invalid_definition(format!(
                    "cannot infer a resource type from a {} value",
                    value.type_name()
                ))
            });
    }
    if definition.has(Attribute::is_method_attribute) {
        return Ok(ResourceType::Method);
    }
    if definition.has(Attribute::is_environment_attribute) {
        return Ok(ResourceType::Environment);
    }
    Ok(ResourceType::Object)
}

fn take_attr<T>(
    definition: &mut Definition,
    attribute: Attribute,
    convert: impl Fn(Value) -> Result<T, ResourceError>,
) -> Result<Attr<T>, ResourceError> {
    match definition.take(attribute) {
        None => Ok(Attr::Absent),
        Some(Value::Null) => Ok(Attr::Unset),
        Some(value) => convert(value)
            .map(Attr::Set)
            .map_err(|e| e.with_context(attribute.key())),
    }
}

fn expect_bool(value: Value) -> Result<bool, ResourceError> {
    match value {
        Value::Boolean(b) => Ok(b),
        other => Err(ResourceError::type_mismatch("boolean", other.type_name())),
    }
}

pub(crate) fn serialize_attr<T>(
    definition: &mut Map,
    attribute: Attribute,
    value: &Attr<T>,
    convert: impl Fn(&T) -> Value,
) {
    match value {
        Attr::Absent => {}
        Attr::Unset => {
            definition.insert(attribute.key().into(), Value::Null);
        }
        Attr::Set(value) => {
            definition.insert(attribute.key().into(), convert(value));
        }
    }
}
