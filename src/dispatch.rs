//! Method invocation.
//!
//! A call goes through four steps. Binding matches the raw call against the
//! method's declared input and the environment flags. Dispatch locates the
//! implementation. Execution runs the before-chain, the implementation and
//! the after-chain, raising the emitted events around the implementation.
//! Completion returns the implementation's result.

use crate::arguments::{positional_index, positional_key, Arguments, SUB_ARGUMENTS_KEY};
use crate::environment::Environment;
use crate::error::ResourceError;
use crate::host::{Invocation, NativeFn};
use crate::method::Expression;
use crate::parser::{parse_expression_with, parse_tokens};
use crate::primitive::ValueType;
use crate::resource::{Resource, ResourceKind};
use crate::runtime::Runtime;
use crate::value::{Map, Value};
use std::ops::ControlFlow;
use std::path::Path;
use std::rc::Rc;

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    /// Read textual arguments according to each input type's grammar.
    pub parse: bool,
    /// Environment to extend instead of the runtime's shared one.
    pub environment: Option<Environment>,
}

impl InvokeOptions {
    #[must_use]
    pub fn parsing() -> Self {
        InvokeOptions {
            parse: true,
            environment: None,
        }
    }
}

/// A call after binding: normalized input values by declared key, and the
/// call-scoped environment.
#[derive(Debug, Clone)]
pub struct BoundCall {
    pub arguments: Map,
    pub environment: Environment,
}

enum Implementation {
    Expression(Expression),
    Native(NativeFn),
}

/// Binds `arguments` against the declared input of `method` and the
/// environment flags. The declared input is never modified; each value is
/// normalized through a per-call specialization of its parameter.
///
/// # Errors
/// Fails with an invalid-argument error on any key left unmatched, or with
/// a type error when a value does not fit its parameter.
pub fn bind(
    method: &Resource,
    arguments: Arguments,
    parse: bool,
    environment: &Environment,
) -> Result<BoundCall, ResourceError> {
    let mut remaining = arguments.into_map();
    let mut bound = Map::new();

    if let Some(input) = method.method_input() {
        for (key, parameter) in input.child_entries() {
            let value = if parameter.is_variadic() {
                bind_variadic(&mut remaining, key, parameter, parse)
            } else {
                bind_parameter(&mut remaining, key, parameter, parse)
            };
            let value = value.map_err(|e| e.with_context(key))?;
            if let Some(value) = value {
                log::trace!("bound `{key}` to {value}");
                bound.insert(key.to_string(), value);
            }
        }
    }

    let mut overrides = Map::new();
    let flags: Vec<String> = remaining
        .keys()
        .filter(|key| environment.find_parameter(key).is_some())
        .cloned()
        .collect();
    for key in flags {
        if let Some(value) = remaining.shift_remove(&key) {
            log::trace!("environment override `{key}` = {value}");
            overrides.insert(key, value);
        }
    }

    if let Some((key, value)) = remaining.into_iter().next() {
        return Err(if positional_index(&key).is_some() {
            ResourceError::TooManyArguments {
                key: value.to_string(),
            }
        } else {
            ResourceError::InvalidArgument { key }
        });
    }

    let environment = environment.extend(&overrides, parse)?;
    Ok(BoundCall {
        arguments: bound,
        environment,
    })
}

/// Removes the first raw value that names `parameter`: by key, by alias, by
/// position, or as the sub-arguments of a sub-input.
fn take_raw(remaining: &mut Map, key: &str, parameter: &Resource) -> Option<Value> {
    let mut names = vec![key.to_string()];
    names.extend(parameter.aliases().iter().cloned());
    if let Some(position) = parameter.position() {
        names.push(positional_key(position));
    }
    if parameter.is_sub_input() {
        names.push(SUB_ARGUMENTS_KEY.to_string());
    }
    names
        .iter()
        .find_map(|name| remaining.shift_remove(name.as_str()))
}

fn bind_parameter(
    remaining: &mut Map,
    key: &str,
    parameter: &Rc<Resource>,
    parse: bool,
) -> Result<Option<Value>, ResourceError> {
    match take_raw(remaining, key, parameter) {
        Some(raw) => Ok(Resource::extend_with(parameter, Some(&raw), parse)?.unbox()),
        None => Ok(parameter.unbox()),
    }
}

/// A variadic parameter claims its own position and every following
/// position up to the first gap. Nothing claimed binds nothing.
fn bind_variadic(
    remaining: &mut Map,
    key: &str,
    parameter: &Rc<Resource>,
    parse: bool,
) -> Result<Option<Value>, ResourceError> {
    let mut items = Vec::new();
    let named = std::iter::once(key.to_string()).chain(parameter.aliases().iter().cloned());
    if let Some(raw) = named.into_iter().find_map(|name| remaining.shift_remove(&name)) {
        match raw {
            Value::Array(values) => items.extend(values),
            single => items.push(single),
        }
    } else if let Some(start) = parameter.position() {
        let mut position = start;
        while let Some(raw) = remaining.shift_remove(&positional_key(position)) {
            items.push(raw);
            position += 1;
        }
    }
    if items.is_empty() {
        return Ok(None);
    }

    if matches!(parameter.kind(), ResourceKind::Value(leaf) if leaf.value_type() == ValueType::Array)
    {
        return Ok(Resource::extend_with(parameter, Some(&Value::Array(items)), parse)?.unbox());
    }
    let normalized = items
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            Resource::extend_with(parameter, Some(&raw), parse)
                .map(|item| item.unbox().unwrap_or(Value::Null))
                .map_err(|e| e.with_context(&index.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(Value::Array(normalized)))
}

/// Whether the first word of an expression names another resource.
pub(crate) fn is_path_like(word: &str) -> bool {
    word.starts_with('.') || word.contains('/') || Path::new(word).is_absolute()
}

impl Runtime {
    /// Invokes the method child named `method_key` on `target`.
    pub(crate) fn dispatch(
        &self,
        target: &Rc<Resource>,
        method_key: &str,
        arguments: Arguments,
        options: &InvokeOptions,
    ) -> Result<Option<Value>, ResourceError> {
        let (key, method) = match target.find_child(method_key) {
            Some((key, child)) if child.as_method().is_some() => (key.to_string(), Rc::clone(child)),
            _ => {
                return Err(ResourceError::MethodNotFound {
                    name: method_key.to_string(),
                })
            }
        };
        self.call(target, &key, &method, arguments, options)
    }

    /// Invokes `method` on `target`. A method already running on the same
    /// target fails instead of recursing.
    fn call(
        &self,
        target: &Rc<Resource>,
        key: &str,
        method: &Rc<Resource>,
        arguments: Arguments,
        options: &InvokeOptions,
    ) -> Result<Option<Value>, ResourceError> {
        let frame = (Rc::as_ptr(target), key.to_string());
        if self.in_flight.borrow().contains(&frame) {
            let mut chain: Vec<String> = self
                .in_flight
                .borrow()
                .iter()
                .map(|(_, key)| key.clone())
                .collect();
            chain.push(key.to_string());
            return Err(ResourceError::CircularInvocation {
                chain: chain.join(" -> "),
            });
        }

        self.in_flight.borrow_mut().push(frame);
        let result = self.call_in_flight(target, key, method, arguments, options);
        self.in_flight.borrow_mut().pop();
        result
    }

    fn call_in_flight(
        &self,
        target: &Rc<Resource>,
        key: &str,
        method: &Rc<Resource>,
        arguments: Arguments,
        options: &InvokeOptions,
    ) -> Result<Option<Value>, ResourceError> {
        let environment = match &options.environment {
            Some(environment) => environment.clone(),
            None => self.environment().clone(),
        };
        let bound = bind(method, arguments, options.parse, &environment)?;
        let implementation = self.find_implementation(target, key, method)?;
        log::debug!("invoking `{key}`");

        self.run_chain(&method.all_before_expressions(), target, method, &bound)?;
        let events = method.emitted_events().cloned();
        if let Some(events) = &events {
            self.emit_with(target, &events.before(), &bound.environment)?;
        }

        let result = match implementation {
            Implementation::Expression(expression) => {
                self.run_expression(&expression, target, method, &bound)?
            }
            Implementation::Native(function) => function(&Invocation {
                runtime: self,
                target,
                method: key,
                arguments: &bound.arguments,
                environment: &bound.environment,
            })?,
        };

        if let Some(events) = &events {
            self.emit_with(target, &events.after(), &bound.environment)?;
        }
        self.run_chain(&method.all_after_expressions(), target, method, &bound)?;
        Ok(result)
    }

    fn find_implementation(
        &self,
        target: &Rc<Resource>,
        key: &str,
        method: &Resource,
    ) -> Result<Implementation, ResourceError> {
        if let Some(expression) = method.run_expression() {
            return Ok(Implementation::Expression(expression.clone()));
        }
        let not_found = || ResourceError::ImplementationNotFound {
            method: key.to_string(),
        };
        if method.is_native() {
            // Supplied by the host for the invoking resource itself
            return self
                .host()
                .lookup(target, key)
                .map(|function| Implementation::Native(Rc::clone(function)))
                .ok_or_else(not_found);
        }
        let native = target.for_self_and_each_base(true, |resource| {
            match self.host().lookup(resource, key) {
                Some(function) => ControlFlow::Break(Rc::clone(function)),
                None => ControlFlow::Continue(()),
            }
        });
        native.map(Implementation::Native).ok_or_else(not_found)
    }

    /// Runs hook expressions in order against the same bound call. Only the
    /// last result is kept.
    fn run_chain(
        &self,
        expressions: &[&str],
        target: &Rc<Resource>,
        method: &Resource,
        bound: &BoundCall,
    ) -> Result<Option<Value>, ResourceError> {
        let mut result = None;
        for text in expressions {
            let expression = Expression::Text((*text).to_string());
            result = self.run_expression(&expression, target, method, bound)?;
        }
        Ok(result)
    }

    fn run_expression(
        &self,
        expression: &Expression,
        target: &Rc<Resource>,
        method: &Resource,
        bound: &BoundCall,
    ) -> Result<Option<Value>, ResourceError> {
        log::trace!("running expression {expression:?}");
        let arguments = match expression {
            Expression::Text(text) => {
                let variables = |name: &str| {
                    bound.arguments.get(name).map(ToString::to_string).or_else(|| {
                        method
                            .method_input()
                            .and_then(|input| input.child(name))
                            .map(|_| String::new())
                    })
                };
                parse_expression_with(text, &variables)?
            }
            Expression::Tokens(items) => parse_tokens(items)?,
        };
        let directory = method.directory().or_else(|| target.directory());
        self.run_parsed(target, directory, arguments, &bound.environment)
    }

    /// Runs a parsed expression. A path-like first word loads another
    /// resource relative to `directory` and makes it the target.
    pub(crate) fn run_parsed(
        &self,
        target: &Rc<Resource>,
        directory: Option<&Path>,
        mut arguments: Arguments,
        environment: &Environment,
    ) -> Result<Option<Value>, ResourceError> {
        let target = match take_path(&mut arguments) {
            Some(path) => self.load(&path, directory)?,
            None => Rc::clone(target),
        };
        self.invoke_parsed(&target, arguments, environment)
    }

    pub(crate) fn invoke_parsed(
        &self,
        target: &Rc<Resource>,
        mut arguments: Arguments,
        environment: &Environment,
    ) -> Result<Option<Value>, ResourceError> {
        let options = InvokeOptions {
            parse: true,
            environment: Some(environment.clone()),
        };
        if target.as_method().is_some() {
            let key = target.key().unwrap_or_default().to_string();
            return self.call(target, &key, target, arguments, &options);
        }
        match arguments.shift_positional() {
            None => Ok(target.unbox()),
            Some(Value::String(name)) => self.dispatch(target, &name, arguments, &options),
            Some(other) => Err(ResourceError::MethodNotFound {
                name: other.to_string(),
            }),
        }
    }

    /// Raises `event` on `target`: observers are notified, then every
    /// method child listening to the event is invoked without input.
    pub(crate) fn emit_with(
        &self,
        target: &Rc<Resource>,
        event: &str,
        environment: &Environment,
    ) -> Result<(), ResourceError> {
        log::debug!("emitting `{event}`");
        self.notify(event);

        let listeners: Vec<(String, Rc<Resource>)> = target
            .child_entries()
            .into_iter()
            .filter(|(_, child)| {
                child.as_method().is_some() && child.all_listened_events().contains(event)
            })
            .map(|(key, child)| (key.to_string(), Rc::clone(child)))
            .collect();
        let options = InvokeOptions {
            parse: true,
            environment: Some(environment.clone()),
        };
        for (key, listener) in listeners {
            self.call(target, &key, &listener, Arguments::new(), &options)?;
        }
        Ok(())
    }
}

/// Shifts off the first positional word when it names another resource.
pub(crate) fn take_path(arguments: &mut Arguments) -> Option<String> {
    let path = arguments
        .positional()
        .first()
        .and_then(|word| word.as_str())
        .filter(|word| is_path_like(word))?
        .to_string();
    arguments.shift_positional();
    Some(path)
}
