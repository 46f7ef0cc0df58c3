//! The process-scoped driver state.
//!
//! A [`Runtime`] owns the loader collaborator (through its resolver cache),
//! the host implementation table, the shared environment and the event
//! observers. Everything that loads or invokes resources goes through it.

use crate::arguments::Arguments;
use crate::dispatch::{take_path, InvokeOptions};
use crate::environment::Environment;
use crate::error::ResourceError;
use crate::host::HostTable;
use crate::loader::{Loader, NoLoader};
use crate::parser::parse_expression;
use crate::resolver::Resolver;
use crate::resource::{CreateOptions, Resource};
use crate::value::Value;
use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::path::Path;
use std::rc::Rc;

pub type EventObserver = Rc<dyn Fn(&str)>;

pub struct Runtime {
    resolver: Resolver,
    host: HostTable,
    environment: OnceCell<Environment>,
    observers: RefCell<Vec<EventObserver>>,
    // Method calls currently running, by target and method key
    pub(crate) in_flight: RefCell<Vec<(*const Resource, String)>>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("resolver", &self.resolver)
            .field("host", &self.host)
            .field("environment", &self.environment.get())
            .field("observers", &self.observers.borrow().len())
            .field("in_flight", &self.in_flight.borrow().len())
            .finish()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// A runtime without a loader: type references must be built-in.
    #[must_use]
    pub fn new() -> Self {
        Runtime {
            resolver: Resolver::new(Box::new(NoLoader)),
            host: HostTable::new(),
            environment: OnceCell::new(),
            observers: RefCell::new(Vec::new()),
            in_flight: RefCell::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_loader(mut self, loader: impl Loader + 'static) -> Self {
        self.resolver = Resolver::new(Box::new(loader));
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: HostTable) -> Self {
        self.host = host;
        self
    }

    #[must_use]
    pub fn host(&self) -> &HostTable {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut HostTable {
        &mut self.host
    }

    /// The shared environment, built on first use and reused afterwards.
    pub fn environment(&self) -> &Environment {
        self.environment.get_or_init(|| {
            log::debug!("building the shared environment");
            Environment::new()
        })
    }

    /// Builds a resource, loading referenced types through the loader.
    ///
    /// # Errors
    /// Fails on an invalid definition or an unresolvable type reference.
    pub fn create(
        &self,
        definition: &Value,
        options: &CreateOptions,
    ) -> Result<Rc<Resource>, ResourceError> {
        Resource::build(Some(definition), options, None, &self.resolver).map(Rc::new)
    }

    /// Loads the resource named by `identifier` relative to `directory`.
    ///
    /// # Errors
    /// Fails when the loader cannot find it, the definition is invalid, or
    /// the bases form a cycle.
    pub fn load(
        &self,
        identifier: &str,
        directory: Option<&Path>,
    ) -> Result<Rc<Resource>, ResourceError> {
        self.resolver.load(identifier, directory)
    }

    /// Invokes the method `method_key` of `target` with a programmatic call.
    ///
    /// # Errors
    /// Fails when binding, a hook, an event listener or the implementation
    /// fails.
    pub fn invoke(
        &self,
        target: &Rc<Resource>,
        method_key: &str,
        arguments: impl Into<Arguments>,
    ) -> Result<Option<Value>, ResourceError> {
        self.invoke_with(target, method_key, arguments, &InvokeOptions::default())
    }

    /// Like [`Runtime::invoke`], with explicit options.
    ///
    /// # Errors
    /// See [`Runtime::invoke`].
    pub fn invoke_with(
        &self,
        target: &Rc<Resource>,
        method_key: &str,
        arguments: impl Into<Arguments>,
        options: &InvokeOptions,
    ) -> Result<Option<Value>, ResourceError> {
        self.dispatch(target, method_key, arguments.into(), options)
    }

    /// Runs an expression such as `build --verbose` against `target`. A
    /// path-like first word delegates to the resource it names.
    ///
    /// # Errors
    /// Fails on a malformed expression or any invocation failure.
    pub fn run(&self, target: &Rc<Resource>, expression: &str) -> Result<Option<Value>, ResourceError> {
        let arguments = parse_expression(expression)?;
        self.run_arguments(target, arguments)
    }

    /// Runs an already-parsed expression against `target`.
    ///
    /// # Errors
    /// See [`Runtime::run`].
    pub fn run_arguments(
        &self,
        target: &Rc<Resource>,
        arguments: Arguments,
    ) -> Result<Option<Value>, ResourceError> {
        self.run_parsed(target, target.directory(), arguments, self.environment())
    }

    /// Runs an expression whose first word is a resource path, such as
    /// `./tool build --verbose`, resolved relative to `directory`.
    ///
    /// # Errors
    /// Fails when the first word is not a loadable path, or as
    /// [`Runtime::run`] does.
    pub fn run_in(
        &self,
        directory: impl AsRef<Path>,
        expression: &str,
    ) -> Result<Option<Value>, ResourceError> {
        let mut arguments = parse_expression(expression)?;
        let path = take_path(&mut arguments).ok_or_else(|| ResourceError::LoadFailed {
            identifier: expression.to_string(),
            reason: "the expression does not start with a resource path".to_string(),
        })?;
        let target = self.load(&path, Some(directory.as_ref()))?;
        self.invoke_parsed(&target, arguments, self.environment())
    }

    /// Raises `event` on `target` with the shared environment.
    ///
    /// # Errors
    /// Fails when a listening method fails.
    pub fn emit(&self, target: &Rc<Resource>, event: &str) -> Result<(), ResourceError> {
        self.emit_with(target, event, self.environment())
    }

    /// Registers a callback that receives the name of every raised event.
    pub fn on_event(&self, observer: impl Fn(&str) + 'static) {
        self.observers.borrow_mut().push(Rc::new(observer));
    }

    pub(crate) fn notify(&self, event: &str) {
        // Observers may register further observers
        let observers = self.observers.borrow().clone();
        for observer in observers {
            observer(event);
        }
    }
}
