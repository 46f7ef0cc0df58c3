use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// The class a failure belongs to, independent of its precise variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Wrong runtime type for a value, or a scalar where an object is required.
    Type,
    /// Malformed expression text.
    Syntax,
    /// Unrecognized or surplus call input.
    InvalidArgument,
    /// Missing implementation, method or type, or an invalid event name.
    Lookup,
    /// A malformed resource definition.
    Definition,
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum ResourceError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Expression(#[from] ExpressionError),

    #[error("Invalid value type: expected {expected}, found {found}")]
    #[diagnostic(
        code(resource::type_mismatch),
        help("The value must already have the declared type unless parsing is requested.")
    )]
    TypeMismatch { expected: String, found: String },

    #[error("Cannot convert {input:?} to a {expected}")]
    #[diagnostic(code(resource::conversion_failed))]
    ConversionFailed { expected: String, input: String },

    #[error("Cannot replace the object `{key}` with a {found} value")]
    #[diagnostic(
        code(resource::object_expected),
        help("Objects can only be assigned from a mapping of child values.")
    )]
    ObjectExpected { key: String, found: String },

    #[error("Invalid method argument: `{key}`")]
    #[diagnostic(
        code(method::invalid_argument),
        help("Every argument must match a declared input key, alias, position or an environment flag.")
    )]
    InvalidArgument { key: String },

    #[error("Too many positional arguments (unexpected `{key}`)")]
    #[diagnostic(code(method::too_many_arguments))]
    TooManyArguments { key: String },

    #[error("Invalid variable found in a method expression: `{name}`")]
    #[diagnostic(code(method::unknown_variable))]
    UnknownVariable { name: String },

    #[error("Can't find implementation for `{method}`")]
    #[diagnostic(
        code(method::implementation_not_found),
        help("Provide a `@run` expression or register a host function for this method.")
    )]
    ImplementationNotFound { method: String },

    #[error("`{name}` is not a method")]
    #[diagnostic(code(method::not_found))]
    MethodNotFound { name: String },

    #[error("Invalid event name: {name:?}. It should be prefixed by \"*:\".")]
    #[diagnostic(code(method::invalid_event_name))]
    InvalidEventName { name: String },

    #[error("Unknown resource type `{name}`")]
    #[diagnostic(code(resource::unknown_type))]
    UnknownType { name: String },

    #[error("Unknown attribute `{attribute}`")]
    #[diagnostic(
        code(resource::unknown_attribute),
        help("Keys starting with '@' are reserved; use a plain key to define a child.")
    )]
    UnknownAttribute { attribute: String },

    #[error("Attribute `{attribute}` is not supported by {kind} resources")]
    #[diagnostic(code(resource::unsupported_attribute))]
    UnsupportedAttribute { attribute: String, kind: String },

    #[error("Invalid definition: {reason}")]
    #[diagnostic(code(resource::invalid_definition))]
    InvalidDefinition { reason: String },

    #[error("Circular base detected: {cycle}")]
    #[diagnostic(
        code(resolver::circular_base),
        help("A resource cannot specialize itself, directly or through its bases.")
    )]
    CircularBase { cycle: String },

    #[error("Circular invocation detected: {chain}")]
    #[diagnostic(
        code(method::circular_invocation),
        help("A method cannot be invoked again on the same resource while it is still running.")
    )]
    CircularInvocation { chain: String },

    #[error("Resource `{identifier}` could not be loaded: {reason}")]
    #[diagnostic(code(resolver::load_failed))]
    LoadFailed { identifier: String, reason: String },

    #[error("{source} (in `{path}`)")]
    #[diagnostic(code(resource::context))]
    Context {
        path: String,
        #[source]
        source: Box<ResourceError>,
    },
}

impl ResourceError {
    /// Classifies the error, looking through any attached context.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResourceError::Expression(_) => ErrorKind::Syntax,
            ResourceError::TypeMismatch { .. }
            | ResourceError::ConversionFailed { .. }
            | ResourceError::ObjectExpected { .. } => ErrorKind::Type,
            ResourceError::InvalidArgument { .. }
            | ResourceError::TooManyArguments { .. }
            | ResourceError::UnknownVariable { .. } => ErrorKind::InvalidArgument,
            ResourceError::ImplementationNotFound { .. }
            | ResourceError::MethodNotFound { .. }
            | ResourceError::InvalidEventName { .. }
            | ResourceError::UnknownType { .. }
            | ResourceError::LoadFailed { .. } => ErrorKind::Lookup,
            ResourceError::UnknownAttribute { .. }
            | ResourceError::UnsupportedAttribute { .. }
            | ResourceError::InvalidDefinition { .. }
            | ResourceError::CircularBase { .. }
            | ResourceError::CircularInvocation { .. } => ErrorKind::Definition,
            ResourceError::Context { source, .. } => source.kind(),
        }
    }

    /// Attributes the error to the child `key`, extending an existing path
    /// so that the outermost key comes first (`address.city`).
    #[must_use]
    pub fn with_context(self, key: &str) -> ResourceError {
        match self {
            ResourceError::Context { path, source } => ResourceError::Context {
                path: format!("{key}.{path}"),
                source,
            },
            other => ResourceError::Context {
                path: key.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The dotted key path the error was attributed to, if any.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            ResourceError::Context { path, .. } => Some(path),
            _ => None,
        }
    }

    /// The error with any context stripped.
    #[must_use]
    pub fn root_cause(&self) -> &ResourceError {
        match self {
            ResourceError::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub(crate) fn type_mismatch(expected: &str, found: &str) -> Self {
        ResourceError::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub(crate) fn invalid_definition(reason: impl Into<String>) -> Self {
        ResourceError::InvalidDefinition {
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum ExpressionError {
    #[error("Invalid command line option: `{option}`")]
    #[diagnostic(
        code(expression::invalid_option),
        help("Short option clusters may only contain letters, digits or '_'.")
    )]
    InvalidOption {
        #[source_code]
        src: NamedSource<String>,
        #[label("this flag is not alphanumeric")]
        span: SourceSpan,
        option: String,
    },

    #[error("Unterminated quote")]
    #[diagnostic(
        code(expression::unterminated_quote),
        help("Close the quote before the end of the expression.")
    )]
    UnterminatedQuote {
        #[source_code]
        src: NamedSource<String>,
        #[label("quote opened here")]
        span: SourceSpan,
    },

    #[error("Dangling escape")]
    #[diagnostic(code(expression::dangling_escape))]
    DanglingEscape {
        #[source_code]
        src: NamedSource<String>,
        #[label("nothing follows this backslash")]
        span: SourceSpan,
    },
}
