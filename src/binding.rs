//! Composed bindings.

use std::any::Any;
use std::fmt;

use crate::cache::Storage;
use crate::canonical::TypeKey;
use crate::container::Container;
use crate::dispatch::{Candidate, Dependency};
use crate::error::{DiError, DiResult};
use crate::lifetime::{LifetimeTag, Scope};

/// Type-erased bound value, downcast back to the canonical type on use.
pub(crate) type Instance = Box<dyn Any + Send + Sync>;

/// How a binding was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// `bind::<From>().to::<To>()`
    Target,
    /// `bind::<From>().to_instance(value)`
    Instance,
    /// `bind::<From>().to_factory(f)` and friends
    Factory,
    /// `register::<T>()`
    Registered,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingKind::Target => f.write_str("target"),
            BindingKind::Instance => f.write_str("instance"),
            BindingKind::Factory => f.write_str("factory"),
            BindingKind::Registered => f.write_str("registered"),
        }
    }
}

/// An immutable binding with its dispatched constructor.
pub struct Binding<S: Storage> {
    key: TypeKey,
    kind: BindingKind,
    scope: Option<Scope>,
    candidate: Candidate<Instance, S>,
}

impl<S: Storage> Binding<S> {
    pub(crate) fn new(
        key: TypeKey,
        kind: BindingKind,
        scope: Option<Scope>,
        candidate: Candidate<Instance, S>,
    ) -> Self {
        Self {
            key,
            kind,
            scope,
            candidate,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn kind(&self) -> BindingKind {
        self.kind
    }

    /// Declared scope; `None` lets the request shape decide.
    pub fn scope(&self) -> Option<Scope> {
        self.scope
    }

    /// Lifetime a dependency on this binding is held with, given the
    /// lifetime its request shape implies.
    pub fn effective_lifetime(&self, requested: LifetimeTag) -> LifetimeTag {
        self.scope.map_or(requested, Scope::tag)
    }

    /// Arity of the dispatched constructor.
    pub fn arity(&self) -> usize {
        self.candidate.arity()
    }

    pub fn dependencies(&self) -> &[Dependency] {
        self.candidate.dependencies()
    }

    /// Builds a fresh instance with the dispatched constructor.
    pub(crate) fn construct<C: 'static>(&self, container: &Container<'_, S>) -> DiResult<C> {
        tracing::trace!("Constructing {} from its {} binding", self.key, self.kind);
        self.candidate
            .invoke(container)?
            .downcast::<C>()
            .map(|instance| *instance)
            .map_err(|_| DiError::TypeMismatch {
                type_name: self.key.name(),
            })
    }
}

impl<S: Storage> fmt::Debug for Binding<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("scope", &self.scope)
            .field("arity", &self.arity())
            .finish()
    }
}
