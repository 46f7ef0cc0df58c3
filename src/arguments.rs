//! The structured call object produced by the expression parser and
//! accepted by method invocation.
//!
//! Positional arguments live beside named ones in a single mapping, under
//! reserved index keys (`@0`, `@1`, ...). Everything after a `--` separator
//! is a nested call stored under [`SUB_ARGUMENTS_KEY`].

use crate::definition::MARKER;
use crate::resource::Resource;
use crate::value::{Map, Value};

pub const SUB_ARGUMENTS_KEY: &str = "@--";

/// The reserved key of the positional argument at `index`.
#[must_use]
pub fn positional_key(index: usize) -> String {
    format!("{MARKER}{index}")
}

/// The index encoded by a positional key.
#[must_use]
pub fn positional_index(key: &str) -> Option<usize> {
    let digits = key.strip_prefix(MARKER)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    map: Map,
}

impl Arguments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the unboxed values of a resource's children as a call.
    #[must_use]
    pub fn from_resource(resource: &Resource) -> Self {
        match resource.unbox() {
            Some(Value::Object(map)) => Arguments { map },
            _ => Arguments::default(),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.map.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.map.shift_remove(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    /// Positional values in index order, up to the first gap.
    #[must_use]
    pub fn positional(&self) -> Vec<&Value> {
        (0..)
            .map_while(|index| self.map.get(&positional_key(index)))
            .collect()
    }

    pub fn push_positional(&mut self, value: impl Into<Value>) {
        let next = self.positional().len();
        self.map.insert(positional_key(next), value.into());
    }

    /// Removes the first positional argument and renumbers the rest.
    pub fn shift_positional(&mut self) -> Option<Value> {
        let first = self.map.shift_remove(&positional_key(0))?;
        let mut index = 1;
        while let Some(value) = self.map.shift_remove(&positional_key(index)) {
            self.map.insert(positional_key(index - 1), value);
            index += 1;
        }
        Some(first)
    }

    #[must_use]
    pub fn sub_arguments(&self) -> Option<Arguments> {
        match self.map.get(SUB_ARGUMENTS_KEY) {
            Some(Value::Object(map)) => Some(Arguments { map: map.clone() }),
            _ => None,
        }
    }

    pub fn set_sub_arguments(&mut self, sub_arguments: Arguments) {
        self.map
            .insert(SUB_ARGUMENTS_KEY.to_string(), Value::Object(sub_arguments.map));
    }

    #[must_use]
    pub fn as_map(&self) -> &Map {
        &self.map
    }

    #[must_use]
    pub fn into_map(self) -> Map {
        self.map
    }
}

impl From<Map> for Arguments {
    fn from(map: Map) -> Self {
        Arguments { map }
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Arguments {
    fn from(pairs: [(K, V); N]) -> Self {
        Arguments {
            map: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl From<Arguments> for Value {
    fn from(arguments: Arguments) -> Self {
        Value::Object(arguments.map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_keys() {
        assert_eq!(positional_key(2), "@2");
        assert_eq!(positional_index("@12"), Some(12));
        assert_eq!(positional_index("@value"), None);
        assert_eq!(positional_index("@"), None);
        assert_eq!(positional_index("3"), None);
    }

    #[test]
    fn test_shift_positional() {
        let mut arguments = Arguments::new();
        arguments.push_positional("./tool");
        arguments.push_positional("build");
        arguments.insert("verbose", true);

        assert_eq!(arguments.shift_positional(), Some(Value::from("./tool")));
        assert_eq!(arguments.positional(), vec![&Value::from("build")]);
        assert_eq!(arguments.get("verbose"), Some(&Value::Boolean(true)));
        assert_eq!(arguments.shift_positional(), Some(Value::from("build")));
        assert_eq!(arguments.shift_positional(), None);
    }

    #[test]
    fn test_sub_arguments() {
        let mut sub = Arguments::new();
        sub.push_positional("c");
        let mut arguments = Arguments::from([("x", 1)]);
        arguments.set_sub_arguments(sub.clone());
        assert_eq!(arguments.sub_arguments(), Some(sub));
    }
}
