//! The container façade.
//!
//! A [`Container`] is composed once with a
//! [`ContainerBuilder`](crate::ContainerBuilder) and is immutable afterwards,
//! apart from its lazily populated cache and lifetime registry.
//!
//! # Resolution order
//!
//! 1. a binding in this container
//! 2. the nearest ancestor that binds the type (see [`Delegation`])
//! 3. the type's own constructors, dispatched in this container
//!
//! Shared instances are cached by whichever container satisfied the
//! request, so a child never caches on behalf of its parent.
//!
//! # Example
//!
//! ```ignore
//! let root = ContainerBuilder::new()
//!     .bind::<Settings>().to_instance(settings).in_singleton_scope()
//!     .build()?;
//! let request = ContainerBuilder::child_of(&root)
//!     .register::<Handler>()
//!     .build()?;
//!
//! let settings: &Settings = request.resolve()?;
//! let handler: Handler = request.resolve()?;
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::binding::Binding;
use crate::cache::{ProcessScope, Storage, Synchronized, TypeCache};
use crate::canonical::{canonical_key, Canonical, Canonicalize, TypeKey};
use crate::config::ContainerConfig;
use crate::delegation::Delegation;
use crate::dispatch::{self, Candidate, Dependency};
use crate::error::{DiError, DiResult};
use crate::lifetime::{check_captive, CapturedDependency, LifetimeRegistry, LifetimeTag, Scope};
use crate::resolve::{Injectable, Resolve};

/// A composed dependency-injection container.
///
/// `Container` (with the default [`Synchronized`] storage) is `Send + Sync`
/// and may be shared between threads; `Container<'_, Unsynchronized>` is
/// confined to one thread.
///
/// [`Unsynchronized`]: crate::cache::Unsynchronized
pub struct Container<'p, S: Storage = Synchronized> {
    bindings: HashMap<TypeId, Binding<S>>,
    cache: S::Cache,
    lifetimes: LifetimeRegistry<S::Tags>,
    delegation: Delegation<'p, S>,
    process: Option<Arc<ProcessScope>>,
    config: ContainerConfig,
}

impl<'p, S: Storage> Container<'p, S> {
    pub(crate) fn from_parts(
        bindings: HashMap<TypeId, Binding<S>>,
        lifetimes: LifetimeRegistry<S::Tags>,
        delegation: Delegation<'p, S>,
        process: Option<Arc<ProcessScope>>,
        config: ContainerConfig,
    ) -> Self {
        Self {
            bindings,
            cache: S::Cache::default(),
            lifetimes,
            delegation,
            process,
            config,
        }
    }

    // =========================================================================
    // Public API
    // =========================================================================

    /// Resolves `R` in the shape it is requested.
    ///
    /// Owned shapes (`T`, `Box<T>`) are built fresh on every call; shared
    /// shapes (`&T`, `Arc<T>`, `Weak<T>`) return the instance cached by
    /// the container that satisfies the request.
    pub fn resolve<'c, R: Resolve<'c>>(&'c self) -> DiResult<R> {
        tracing::trace!("Resolving {}", std::any::type_name::<R>());
        R::resolve(self)
    }

    /// Returns the instance of `R` this container has cached, if any.
    pub fn cached<R>(&self) -> Option<&Canonical<R>>
    where
        R: Canonicalize + ?Sized,
        Canonical<R>: Sized + Send + Sync,
    {
        let key = canonical_key::<R>();
        match self.bindings.get(&key.id()).and_then(Binding::scope) {
            Some(Scope::Process) => self.process.as_deref()?.cached(),
            _ => self.cache.get(),
        }
    }

    /// Whether this container itself binds `R`.
    pub fn binds<R: Canonicalize + ?Sized>(&self) -> bool {
        self.binds_key(&canonical_key::<R>())
    }

    /// Lifetime `R` was first resolved with (or declared with) in this
    /// container.
    pub fn lifetime_of<R: Canonicalize + ?Sized>(&self) -> Option<LifetimeTag> {
        self.lifetimes.recorded(&canonical_key::<R>())
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub fn parent(&self) -> Option<&'p Container<'p, S>> {
        self.delegation.parent()
    }

    pub fn delegation(&self) -> &Delegation<'p, S> {
        &self.delegation
    }

    pub fn process_scope(&self) -> Option<&Arc<ProcessScope>> {
        self.process.as_ref()
    }

    /// Number of bindings declared on this container.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Number of shared instances cached by this container.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Resolves a value-shaped `T`.
    ///
    /// Called by the `Resolve` impls that `#[derive(Injectable)]` and
    /// `injectable!` generate.
    #[doc(hidden)]
    pub fn resolve_value<T: Injectable>(&self) -> DiResult<T> {
        self.resolve_transient(T::candidates::<S>)
    }

    // =========================================================================
    // Resolvers
    // =========================================================================

    /// Builds a fresh `C` on every call.
    pub(crate) fn resolve_transient<C: Send + Sync + 'static>(
        &self,
        autowire: fn() -> Vec<Candidate<C, S>>,
    ) -> DiResult<C> {
        let key = TypeKey::of::<C>();
        self.lifetimes.check(&key, LifetimeTag::Transient)?;

        let value = match self.bindings.get(&key.id()) {
            Some(binding) => binding.construct(self)?,
            None => self.delegation.find_in_parent(
                &key,
                |parent| parent.resolve_transient(autowire),
                || self.autowire(&key, autowire, LifetimeTag::Transient),
            )?,
        };

        self.lifetimes.record(&key, LifetimeTag::Transient)?;
        Ok(value)
    }

    /// Returns the shared `C`, constructing it at most once.
    pub(crate) fn resolve_shared<C: Send + Sync + 'static>(
        &self,
        autowire: fn() -> Vec<Candidate<C, S>>,
    ) -> DiResult<&C> {
        let key = TypeKey::of::<C>();
        self.lifetimes.check(&key, LifetimeTag::Singleton)?;

        let value = match self.bindings.get(&key.id()) {
            Some(binding) => self.shared_binding(&key, binding)?,
            None => self.delegation.find_in_parent(
                &key,
                |parent| parent.resolve_shared(autowire),
                || {
                    self.cache
                        .get_or_create(|| self.autowire(&key, autowire, LifetimeTag::Singleton))
                },
            )?,
        };

        self.lifetimes.record(&key, LifetimeTag::Singleton)?;
        Ok(value)
    }

    /// Returns the shared instance of a local binding.
    fn shared_binding<C: Send + Sync + 'static>(
        &self,
        key: &TypeKey,
        binding: &Binding<S>,
    ) -> DiResult<&C> {
        let construct = || -> DiResult<C> {
            // Scoped bindings were checked when the container was built.
            if binding.scope().is_none() {
                self.check_shared_captives(key, binding.dependencies())?;
            }
            binding.construct(self)
        };

        if binding.scope() == Some(Scope::Process) {
            let process = self
                .process
                .as_deref()
                .ok_or(DiError::MissingProcessScope {
                    type_name: key.name(),
                })?;
            return process.get_or_create(construct);
        }
        self.cache.get_or_create(construct)
    }

    /// Builds `C` from its own constructors, dispatched in this container.
    fn autowire<C: 'static>(
        &self,
        key: &TypeKey,
        autowire: fn() -> Vec<Candidate<C, S>>,
        lifetime: LifetimeTag,
    ) -> DiResult<C> {
        let candidates = autowire();
        let index = dispatch::select(key, &candidates, self.config.max_arity, |dependency| {
            self.can_satisfy(dependency)
        })?;
        let candidate = &candidates[index];
        if lifetime == LifetimeTag::Singleton {
            self.check_shared_captives(key, candidate.dependencies())?;
        }

        tracing::debug!("Autowiring {} with arity {}", key, candidate.arity());
        candidate.invoke(self)
    }

    /// Rejects a shared `key` whose dependencies are shorter-lived.
    fn check_shared_captives(&self, key: &TypeKey, dependencies: &[Dependency]) -> DiResult<()> {
        let dependencies = dependencies.iter().map(|dependency| {
            let key = dependency.key();
            let lifetime = match self.find_binding(&key) {
                Some(bound) => bound.effective_lifetime(dependency.lifetime()),
                None => dependency.lifetime(),
            };
            CapturedDependency {
                key,
                lifetime,
                capture: dependency.capture(),
            }
        });
        check_captive(
            key,
            LifetimeTag::Singleton,
            dependencies,
            self.config.captive_policy,
        )
    }

    // =========================================================================
    // Chain queries
    // =========================================================================

    pub(crate) fn binds_key(&self, key: &TypeKey) -> bool {
        self.bindings.contains_key(&key.id())
    }

    /// The binding for `key` in this container or its nearest ancestor.
    pub(crate) fn find_binding(&self, key: &TypeKey) -> Option<&Binding<S>> {
        self.bindings
            .get(&key.id())
            .or_else(|| self.parent()?.find_binding(key))
    }

    /// Whether `dependency` has a resolution path from this container.
    pub(crate) fn can_satisfy(&self, dependency: &Dependency) -> bool {
        dependency.autowired() || self.find_binding(&dependency.key()).is_some()
    }
}

impl<S: Storage> fmt::Debug for Container<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("bindings", &self.bindings.values().collect::<Vec<_>>())
            .field("cached", &self.cache.len())
            .field("resolved", &self.lifetimes.len())
            .field("depth", &self.delegation.depth())
            .field("config", &self.config)
            .finish()
    }
}
