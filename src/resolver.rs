//! Inheritance resolution.
//!
//! A resource specializes zero or more bases. Attribute lookup walks the
//! resource itself and then its bases, nearest first; the first resource that
//! holds the attribute locally decides the result, even when it holds it as
//! explicitly unset. Base resources referenced by identifier are loaded through
//! a [`Loader`], cached by location and checked for cycles.

use crate::error::ResourceError;
use crate::loader::Loader;
use crate::resource::{CreateOptions, Resource};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::path::Path;
use std::rc::Rc;

/// A locally stored attribute.
///
/// `Absent` defers to the bases, `Unset` shadows them with "no value" and
/// `Set` shadows them with a value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Attr<T> {
    #[default]
    Absent,
    Unset,
    Set(T),
}

impl<T> Attr<T> {
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Attr::Absent)
    }

    /// The local value, treating `Unset` like `Absent`.
    #[must_use]
    pub fn local(&self) -> Option<&T> {
        match self {
            Attr::Set(value) => Some(value),
            Attr::Absent | Attr::Unset => None,
        }
    }
}

impl Resource {
    /// Visits the resource, then each base in specialization order, nearest
    /// first. With `deep_search` the bases of bases are visited too, depth
    /// first. The walk stops at the first visitor result that breaks.
    pub fn for_self_and_each_base<'a, B>(
        &'a self,
        deep_search: bool,
        mut visitor: impl FnMut(&'a Resource) -> ControlFlow<B>,
    ) -> Option<B> {
        match self.walk(deep_search, &mut visitor) {
            ControlFlow::Break(found) => Some(found),
            ControlFlow::Continue(()) => None,
        }
    }

    fn walk<'a, B>(
        &'a self,
        deep_search: bool,
        visitor: &mut dyn FnMut(&'a Resource) -> ControlFlow<B>,
    ) -> ControlFlow<B> {
        if let ControlFlow::Break(found) = visitor(self) {
            return ControlFlow::Break(found);
        }
        for base in &self.bases {
            let flow = if deep_search {
                base.walk(deep_search, visitor)
            } else {
                visitor(&**base)
            };
            if let ControlFlow::Break(found) = flow {
                return ControlFlow::Break(found);
            }
        }
        ControlFlow::Continue(())
    }

    /// Resolves an attribute through the base chain. `attribute` returns
    /// `None` for resources that cannot carry it.
    pub fn inherited_value<'a, T: 'a>(
        &'a self,
        attribute: impl Fn(&'a Resource) -> Option<&'a Attr<T>>,
    ) -> Option<&'a T> {
        self.for_self_and_each_base(true, |resource| match attribute(resource) {
            None | Some(Attr::Absent) => ControlFlow::Continue(()),
            Some(Attr::Unset) => ControlFlow::Break(None),
            Some(Attr::Set(value)) => ControlFlow::Break(Some(value)),
        })
        .flatten()
    }

    /// Every resource of the chain, in visiting order.
    #[must_use]
    pub fn chain(&self) -> Vec<&Resource> {
        let mut chain = Vec::new();
        self.for_self_and_each_base(true, |resource| {
            chain.push(resource);
            ControlFlow::<()>::Continue(())
        });
        chain
    }
}

/// Supplies base resources referenced by identifier during construction.
pub(crate) trait BaseResolver {
    fn resolve_base(
        &self,
        identifier: &str,
        directory: Option<&Path>,
    ) -> Result<Rc<Resource>, ResourceError>;
}

/// Used when no loader is available: every identifier fails to resolve.
pub(crate) struct Detached;

impl BaseResolver for Detached {
    fn resolve_base(
        &self,
        identifier: &str,
        _directory: Option<&Path>,
    ) -> Result<Rc<Resource>, ResourceError> {
        Err(ResourceError::LoadFailed {
            identifier: identifier.to_string(),
            reason: "no loader is available".to_string(),
        })
    }
}

pub struct Resolver {
    loader: Box<dyn Loader>,
    // Constructed resources by their resolved location
    resolved: RefCell<HashMap<String, Rc<Resource>>>,
    // Locations currently under construction, to detect circular bases
    resolving_stack: RefCell<Vec<String>>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("resolved", &self.resolved.borrow().keys().collect::<Vec<_>>())
            .field("resolving_stack", &self.resolving_stack.borrow())
            .finish_non_exhaustive()
    }
}

impl Resolver {
    pub fn new(loader: Box<dyn Loader>) -> Self {
        Resolver {
            loader,
            resolved: RefCell::new(HashMap::new()),
            resolving_stack: RefCell::new(Vec::new()),
        }
    }

    /// Loads and constructs the resource named by `identifier`, relative to
    /// `directory`. Each location is constructed once.
    ///
    /// # Errors
    /// Fails if the loader cannot fetch the definition, if the definition is
    /// invalid, or if the location is already being constructed.
    pub fn load(
        &self,
        identifier: &str,
        directory: Option<&Path>,
    ) -> Result<Rc<Resource>, ResourceError> {
        let fetched = self.loader.fetch(identifier, directory)?;
        let location = fetched.location.clone();

        if let Some(resource) = self.resolved.borrow().get(&location) {
            return Ok(Rc::clone(resource));
        }

        if self.resolving_stack.borrow().contains(&location) {
            let mut cycle = self.resolving_stack.borrow().clone();
            cycle.push(location);
            return Err(ResourceError::CircularBase {
                cycle: cycle.join(" -> "),
            });
        }

        log::debug!("loading `{identifier}` from {location}");
        self.resolving_stack.borrow_mut().push(location.clone());
        let options = CreateOptions {
            directory: fetched.directory,
            ..CreateOptions::default()
        };
        let built = Resource::build(Some(&fetched.definition), &options, None, self);
        self.resolving_stack.borrow_mut().pop();

        let resource = Rc::new(built?);
        self.resolved
            .borrow_mut()
            .insert(location, Rc::clone(&resource));
        Ok(resource)
    }
}

impl BaseResolver for Resolver {
    fn resolve_base(
        &self,
        identifier: &str,
        directory: Option<&Path>,
    ) -> Result<Rc<Resource>, ResourceError> {
        self.load(identifier, directory)
    }
}
