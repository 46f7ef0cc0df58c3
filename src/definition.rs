//! Splitting raw definitions into reserved attributes and literal children.
//!
//! Every key that starts with [`MARKER`] is a reserved attribute and must be
//! one of the [`Attribute`] variants; every other key defines a child.

use crate::error::ResourceError;
use crate::value::{Map, Value};
use indexmap::IndexMap;

/// Prefix that distinguishes reserved attributes from child keys.
pub const MARKER: char = '@';

/// The closed set of reserved attributes a definition may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Type,
    Id,
    Value,
    Aliases,
    Position,
    IsVariadic,
    IsSubInput,
    Description,
    Input,
    Run,
    Before,
    After,
    Listen,
    Unlisten,
    Emit,
    Verbose,
    Quiet,
    Debug,
}

impl Attribute {
    /// Recognizes a reserved key, including its accepted spellings.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Attribute> {
        let attribute = match key {
            "@type" => Attribute::Type,
            "@id" => Attribute::Id,
            "@value" => Attribute::Value,
            "@aliases" | "@alias" => Attribute::Aliases,
            "@position" => Attribute::Position,
            "@isVariadic" | "@variadic" => Attribute::IsVariadic,
            "@isSubInput" => Attribute::IsSubInput,
            "@description" => Attribute::Description,
            "@input" => Attribute::Input,
            "@run" => Attribute::Run,
            "@before" => Attribute::Before,
            "@after" => Attribute::After,
            "@listen" | "@listens" => Attribute::Listen,
            "@unlisten" => Attribute::Unlisten,
            "@emit" | "@emits" => Attribute::Emit,
            "@verbose" | "@v" => Attribute::Verbose,
            "@quiet" | "@q" => Attribute::Quiet,
            "@debug" | "@d" => Attribute::Debug,
            _ => return None,
        };
        Some(attribute)
    }

    /// The canonical key written back on serialization.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Attribute::Type => "@type",
            Attribute::Id => "@id",
            Attribute::Value => "@value",
            Attribute::Aliases => "@aliases",
            Attribute::Position => "@position",
            Attribute::IsVariadic => "@isVariadic",
            Attribute::IsSubInput => "@isSubInput",
            Attribute::Description => "@description",
            Attribute::Input => "@input",
            Attribute::Run => "@run",
            Attribute::Before => "@before",
            Attribute::After => "@after",
            Attribute::Listen => "@listen",
            Attribute::Unlisten => "@unlisten",
            Attribute::Emit => "@emit",
            Attribute::Verbose => "@verbose",
            Attribute::Quiet => "@quiet",
            Attribute::Debug => "@debug",
        }
    }

    pub(crate) fn is_method_attribute(self) -> bool {
        matches!(
            self,
            Attribute::Input
                | Attribute::Run
                | Attribute::Before
                | Attribute::After
                | Attribute::Listen
                | Attribute::Unlisten
                | Attribute::Emit
        )
    }

    pub(crate) fn is_environment_attribute(self) -> bool {
        matches!(self, Attribute::Verbose | Attribute::Quiet | Attribute::Debug)
    }
}

/// A definition whose reserved attributes have been separated from its
/// literal children. Attributes are consumed with [`Definition::take`] by
/// the constructors that understand them.
#[derive(Debug, Clone, Default)]
pub struct Definition {
    attributes: IndexMap<Attribute, Value>,
    children: Map,
}

impl Definition {
    /// Splits `definition`. Mappings are split key by key; any other value
    /// is literal shorthand for `{"@value": value}`.
    ///
    /// # Errors
    /// Fails on an unknown reserved key or on the same attribute spelled twice.
    pub fn split(definition: Option<&Value>) -> Result<Definition, ResourceError> {
        let mut split = Definition::default();
        match definition {
            None => {}
            Some(Value::Object(map)) => {
                for (key, value) in map {
                    if !key.starts_with(MARKER) {
                        split.children.insert(key.clone(), value.clone());
                        continue;
                    }
                    let attribute =
                        Attribute::from_key(key).ok_or_else(|| ResourceError::UnknownAttribute {
                            attribute: key.clone(),
                        })?;
                    if split.attributes.insert(attribute, value.clone()).is_some() {
                        return Err(ResourceError::invalid_definition(format!(
                            "attribute `{}` is defined more than once",
                            attribute.key()
                        )));
                    }
                }
            }
            Some(literal) => {
                split.attributes.insert(Attribute::Value, literal.clone());
            }
        }
        Ok(split)
    }

    pub fn take(&mut self, attribute: Attribute) -> Option<Value> {
        self.attributes.shift_remove(&attribute)
    }

    #[must_use]
    pub fn get(&self, attribute: Attribute) -> Option<&Value> {
        self.attributes.get(&attribute)
    }

    #[must_use]
    pub fn has(&self, predicate: impl Fn(Attribute) -> bool) -> bool {
        self.attributes.keys().any(|attribute| predicate(*attribute))
    }

    #[must_use]
    pub fn children(&self) -> &Map {
        &self.children
    }

    /// Fails if an attribute was left unconsumed by a resource of `kind`.
    pub(crate) fn ensure_consumed(&self, kind: &str) -> Result<(), ResourceError> {
        match self.attributes.keys().next() {
            Some(attribute) => Err(ResourceError::UnsupportedAttribute {
                attribute: attribute.key().to_string(),
                kind: kind.to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Attribute, Definition};
    use crate::error::ErrorKind;
    use crate::value::Value;
    use serde_json::json;

    #[test]
    fn separates_attributes_from_children() {
        let value = Value::from(json!({"@type": "string", "@alias": ["colour"], "hue": 3}));
        let mut definition = Definition::split(Some(&value)).unwrap();
        assert_eq!(definition.take(Attribute::Type), Some(Value::from("string")));
        assert!(definition.get(Attribute::Aliases).is_some());
        assert_eq!(definition.children().len(), 1);
    }

    #[test]
    fn literal_is_value_shorthand() {
        let mut definition = Definition::split(Some(&Value::from(44))).unwrap();
        assert_eq!(definition.take(Attribute::Value), Some(Value::from(44)));
        assert!(definition.children().is_empty());
    }

    #[test]
    fn rejects_unknown_reserved_keys() {
        let value = Value::from(json!({"@colour": "green"}));
        let err = Definition::split(Some(&value)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Definition);
    }
}
