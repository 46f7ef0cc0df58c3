//! Method resources: declared input, run/before/after expressions and
//! listened/emitted events. All of them resolve through the base chain.

use crate::definition::{Attribute, Definition};
use crate::error::ResourceError;
use crate::resolver::{Attr, BaseResolver};
use crate::resource::{serialize_attr, CreateOptions, Resource, ResourceKind, ResourceType};
use crate::value::{Map, Value};
use indexmap::IndexSet;
use std::path::Path;
use std::rc::Rc;

/// Prefix every emitted event declaration must carry.
pub const EVENT_PREFIX: &str = "*:";

/// An expression as written in a definition: text, or one item per token.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Text(String),
    Tokens(Vec<Value>),
}

impl Expression {
    fn to_value(&self) -> Value {
        match self {
            Expression::Text(text) => Value::from(text.as_str()),
            Expression::Tokens(items) => Value::Array(items.clone()),
        }
    }
}

/// The event pair a method raises around its implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedEvents {
    name: String,
}

impl EmittedEvents {
    /// Reads a `*:name` declaration.
    ///
    /// # Errors
    /// Returns `InvalidEventName` when the prefix is missing.
    pub fn parse(declaration: &str) -> Result<EmittedEvents, ResourceError> {
        match declaration.strip_prefix(EVENT_PREFIX) {
            Some(name) if !name.is_empty() => Ok(EmittedEvents {
                name: name.to_string(),
            }),
            _ => Err(ResourceError::InvalidEventName {
                name: declaration.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn before(&self) -> String {
        format!("before:{}", self.name)
    }

    #[must_use]
    pub fn after(&self) -> String {
        format!("after:{}", self.name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MethodResource {
    pub(crate) input: Attr<Rc<Resource>>,
    pub(crate) run: Attr<Expression>,
    pub(crate) before: Option<Vec<String>>,
    pub(crate) after: Option<Vec<String>>,
    pub(crate) listen: Option<Vec<String>>,
    pub(crate) unlisten: Option<Vec<String>>,
    pub(crate) emit: Attr<EmittedEvents>,
}

impl MethodResource {
    /// Consumes the method attributes of `definition`. A declared input
    /// specializes `inherited_input`, the input of the base method.
    pub(crate) fn construct(
        &mut self,
        definition: &mut Definition,
        directory: Option<&Path>,
        inherited_input: Option<Rc<Resource>>,
        resolver: &dyn BaseResolver,
    ) -> Result<(), ResourceError> {
        let context = |attribute: Attribute| move |e: ResourceError| e.with_context(attribute.key());

        match definition.take(Attribute::Input) {
            None => {}
            Some(Value::Null) => self.input = Attr::Unset,
            Some(shape @ Value::Object(_)) => {
                let options = CreateOptions {
                    directory: directory.map(Path::to_path_buf),
                    ..CreateOptions::default()
                };
                let input = Resource::build(Some(&shape), &options, inherited_input, resolver)
                    .map_err(context(Attribute::Input))?;
                if !matches!(input.kind(), ResourceKind::Object) {
                    return Err(ResourceError::type_mismatch(
                        ResourceType::Object.name(),
                        input.resource_type().name(),
                    )
                    .with_context(Attribute::Input.key()));
                }
                self.input = Attr::Set(Rc::new(input));
            }
            Some(other) => {
                return Err(ResourceError::ObjectExpected {
                    key: Attribute::Input.key().to_string(),
                    found: other.type_name().to_string(),
                })
            }
        }

        self.run = match definition.take(Attribute::Run) {
            None => Attr::Absent,
            Some(Value::Null) => Attr::Unset,
            Some(Value::String(text)) => Attr::Set(Expression::Text(text)),
            Some(Value::Array(items)) => Attr::Set(Expression::Tokens(items)),
            Some(other) => {
                return Err(ResourceError::type_mismatch("expression", other.type_name())
                    .with_context(Attribute::Run.key()))
            }
        };

        self.before = take_names(definition, Attribute::Before)?;
        self.after = take_names(definition, Attribute::After)?;
        self.listen = take_names(definition, Attribute::Listen)?;
        self.unlisten = take_names(definition, Attribute::Unlisten)?;

        self.emit = match definition.take(Attribute::Emit) {
            None => Attr::Absent,
            Some(Value::Null) => Attr::Unset,
            Some(Value::String(declaration)) => {
                Attr::Set(EmittedEvents::parse(&declaration).map_err(context(Attribute::Emit))?)
            }
            Some(other) => {
                return Err(ResourceError::type_mismatch("string", other.type_name())
                    .with_context(Attribute::Emit.key()))
            }
        };
        Ok(())
    }

    pub(crate) fn serialize_into(&self, definition: &mut Map) {
        serialize_attr(definition, Attribute::Input, &self.input, |input| {
            input
                .serialize()
                .unwrap_or_else(|| Value::Object(Map::new()))
        });
        serialize_attr(definition, Attribute::Run, &self.run, Expression::to_value);
        for (attribute, names) in [
            (Attribute::Before, &self.before),
            (Attribute::After, &self.after),
            (Attribute::Listen, &self.listen),
            (Attribute::Unlisten, &self.unlisten),
        ] {
            if let Some(names) = names {
                definition.insert(attribute.key().to_string(), names_to_value(names));
            }
        }
        serialize_attr(definition, Attribute::Emit, &self.emit, |events| {
            Value::from(format!("{EVENT_PREFIX}{}", events.name))
        });
    }
}

fn take_names(
    definition: &mut Definition,
    attribute: Attribute,
) -> Result<Option<Vec<String>>, ResourceError> {
    let names = match definition.take(attribute) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(name)) => vec![name],
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(name) => Ok(name),
                other => Err(ResourceError::type_mismatch("string", other.type_name())),
            })
            .collect::<Result<_, _>>()
            .map_err(|e| e.with_context(attribute.key()))?,
        Some(other) => {
            return Err(ResourceError::type_mismatch("string", other.type_name())
                .with_context(attribute.key()))
        }
    };
    Ok(Some(names))
}

/// A single name is written bare, several as a list.
fn names_to_value(names: &[String]) -> Value {
    match names {
        [single] => Value::from(single.as_str()),
        names => Value::Array(names.iter().map(|name| Value::from(name.as_str())).collect()),
    }
}

fn method_of(resource: &Resource) -> Option<&MethodResource> {
    match &resource.kind {
        ResourceKind::Method(method) => Some(method),
        _ => None,
    }
}

impl Resource {
    #[must_use]
    pub fn as_method(&self) -> Option<&MethodResource> {
        method_of(self)
    }

    /// The declared input shape, resolved through the base chain.
    #[must_use]
    pub fn method_input(&self) -> Option<&Rc<Resource>> {
        self.inherited_value(|r| method_of(r).map(|m| &m.input))
    }

    #[must_use]
    pub fn run_expression(&self) -> Option<&Expression> {
        self.inherited_value(|r| method_of(r).map(|m| &m.run))
    }

    #[must_use]
    pub fn emitted_events(&self) -> Option<&EmittedEvents> {
        self.inherited_value(|r| method_of(r).map(|m| &m.emit))
    }

    /// Before-expressions of the whole chain, bases first, so that the most
    /// specialized hook runs closest to the call.
    #[must_use]
    pub fn all_before_expressions(&self) -> Vec<&str> {
        self.collect_from_bases_first(|m| m.before.as_deref())
    }

    /// After-expressions of the whole chain, bases first.
    #[must_use]
    pub fn all_after_expressions(&self) -> Vec<&str> {
        self.collect_from_bases_first(|m| m.after.as_deref())
    }

    /// Events listened anywhere in the chain, minus those unlistened.
    #[must_use]
    pub fn all_listened_events(&self) -> IndexSet<&str> {
        let listened = self.collect_from_bases_first(|m| m.listen.as_deref());
        let unlistened: IndexSet<&str> = self
            .collect_from_bases_first(|m| m.unlisten.as_deref())
            .into_iter()
            .collect();
        listened
            .into_iter()
            .filter(|event| !unlistened.contains(event))
            .collect()
    }

    fn collect_from_bases_first<'a>(
        &'a self,
        names: impl Fn(&'a MethodResource) -> Option<&'a [String]>,
    ) -> Vec<&'a str> {
        self.chain()
            .into_iter()
            .rev()
            .filter_map(method_of)
            .filter_map(&names)
            .flatten()
            .map(String::as_str)
            .collect()
    }
}
