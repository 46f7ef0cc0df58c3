//! Declarative, inheritable resources built from plain definition data and
//! invoked through command-line style expressions.
//!
//! ```
//! use resdef_core::{Resource, Value};
//!
//! let definition = Value::from_json_str(r#"{"name": "Manu", "age": 44}"#).unwrap();
//! let person = Resource::create(&definition).unwrap();
//! assert_eq!(person.get("age"), Some(Value::from(44)));
//! assert_eq!(person.serialize(), Some(definition));
//! ```

pub mod arguments;
pub mod definition;
pub mod dispatch;
pub mod environment;
pub mod error;
pub mod host;
pub mod lexer;
pub mod loader;
pub mod method;
pub mod parser;
pub mod primitive;
pub mod resolver;
pub mod resource;
pub mod runtime;
pub mod value;

pub use arguments::Arguments;
pub use dispatch::{bind, BoundCall, InvokeOptions};
pub use environment::Environment;
pub use error::{ErrorKind, ExpressionError, ResourceError};
pub use host::{HostTable, Invocation};
pub use loader::{LoadedDefinition, Loader, MemoryLoader};
pub use parser::{parse_expression, parse_tokens};
pub use resource::{CreateOptions, Resource, ResourceType};
pub use runtime::Runtime;
pub use value::{Map, Value};
