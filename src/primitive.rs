use crate::definition::Attribute;
use crate::error::ResourceError;
use crate::value::{Map, Value};

/// The leaf resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Boolean,
    Number,
    String,
    Array,
}

impl ValueType {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Boolean => "boolean",
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::Array => "array",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<ValueType> {
        match name {
            "boolean" => Some(ValueType::Boolean),
            "number" => Some(ValueType::Number),
            "string" => Some(ValueType::String),
            "array" => Some(ValueType::Array),
            _ => None,
        }
    }

    /// The type a literal value implies, if it is a leaf.
    #[must_use]
    pub fn infer(value: &Value) -> Option<ValueType> {
        match value {
            Value::Boolean(_) => Some(ValueType::Boolean),
            Value::Number(_) => Some(ValueType::Number),
            Value::String(_) => Some(ValueType::String),
            Value::Array(_) => Some(ValueType::Array),
            Value::Null | Value::Object(_) => None,
        }
    }

    /// Converts `raw` into the canonical value of this type. With `parse`,
    /// text is read according to the type's grammar; otherwise `raw` must
    /// already have the right runtime type.
    ///
    /// # Errors
    /// Returns a type-class error when `raw` cannot be accepted.
    pub fn normalize(self, raw: &Value, parse: bool) -> Result<Value, ResourceError> {
        if parse {
            if let Value::String(text) = raw {
                return self.parse(text);
            }
        }
        match raw {
            Value::Number(n) if self == ValueType::Number && !n.is_finite() => {
                Err(ResourceError::ConversionFailed {
                    expected: self.name().to_string(),
                    input: raw.to_string(),
                })
            }
            _ if ValueType::infer(raw) == Some(self) => Ok(raw.clone()),
            _ => Err(ResourceError::type_mismatch(self.name(), raw.type_name())),
        }
    }

    /// Reads `text` according to the type's grammar.
    ///
    /// # Errors
    /// Returns `ConversionFailed` when the text does not match.
    pub fn parse(self, text: &str) -> Result<Value, ResourceError> {
        let failed = || ResourceError::ConversionFailed {
            expected: self.name().to_string(),
            input: text.to_string(),
        };
        match self {
            ValueType::String => Ok(Value::String(text.to_string())),
            ValueType::Boolean => match text {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                _ => Err(failed()),
            },
            ValueType::Number => {
                let number: f64 = text.trim().parse().map_err(|_| failed())?;
                if !number.is_finite() {
                    return Err(failed());
                }
                Ok(Value::Number(number))
            }
            ValueType::Array => Ok(Value::Array(vec![Value::String(text.to_string())])),
        }
    }
}

/// Applies the canonical compaction to a serialized leaf resource: an empty
/// result is absent, and a result holding only a value (optionally beside
/// its type reference) collapses to the bare value.
pub(crate) fn compact(serialized: Map) -> Option<Value> {
    let value_key = Attribute::Value.key();
    let type_key = Attribute::Type.key();
    let collapses = match serialized.len() {
        0 => return None,
        1 => serialized.contains_key(value_key),
        2 => serialized.contains_key(value_key) && serialized.contains_key(type_key),
        _ => false,
    };
    match serialized.get(value_key) {
        Some(value) if collapses && !value.is_null() => Some(value.clone()),
        _ => Some(Value::Object(serialized)),
    }
}
