//! Container composition.
//!
//! Bindings are declared on a [`ContainerBuilder`] and validated together in
//! [`build`](ContainerBuilder::build). Composition fails as a whole if any
//! binding is duplicated, cannot be dispatched within the configured arity,
//! needs a missing process scope, or would make a singleton capture a
//! shorter-lived dependency.

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::binding::{Binding, BindingKind, Instance};
use crate::cache::{ProcessScope, Storage, Synchronized, Unsynchronized};
use crate::canonical::{canonical_key, Canonical, Canonicalize, TypeKey};
use crate::config::ContainerConfig;
use crate::container::Container;
use crate::delegation::Delegation;
use crate::dispatch::{self, Candidate, Dependency, Factory};
use crate::error::{DiError, DiResult};
use crate::lifetime::{check_captive, Capture, CapturedDependency, LifetimeRegistry, Scope};
use crate::resolve::{Injectable, Substitute};

fn erase<T: Send + Sync + 'static>(value: T) -> Instance {
    Box::new(value)
}

/// A binding whose construction strategy is still being declared.
struct PendingBinding<S: Storage> {
    key: TypeKey,
    kind: BindingKind,
    scope: Option<Scope>,
    candidates: Vec<Candidate<Instance, S>>,
}

// =============================================================================
// ContainerBuilder
// =============================================================================

/// Declares the bindings of a [`Container`].
///
/// # Example
///
/// ```ignore
/// let container = ContainerBuilder::new()
///     .with_config(ContainerConfig::load()?)
///     .bind::<Arc<dyn Logger>>().to::<ConsoleLogger>().in_singleton_scope()
///     .bind::<Settings>().to_instance(settings)
///     .register::<Service>().in_singleton_scope()
///     .build()?;
/// ```
pub struct ContainerBuilder<'p, S: Storage = Synchronized> {
    pending: Vec<PendingBinding<S>>,
    parent: Option<&'p Container<'p, S>>,
    config: ContainerConfig,
    process: Option<Arc<ProcessScope>>,
    errors: Vec<DiError>,
}

impl ContainerBuilder<'static, Synchronized> {
    /// Starts a thread-safe root container.
    pub fn new() -> Self {
        Self::root()
    }
}

impl ContainerBuilder<'static, Unsynchronized> {
    /// Starts a single-threaded root container.
    pub fn local() -> Self {
        Self::root()
    }
}

impl<S: Storage> ContainerBuilder<'static, S> {
    fn root() -> Self {
        Self {
            pending: Vec::new(),
            parent: None,
            config: ContainerConfig::default(),
            process: None,
            errors: Vec::new(),
        }
    }
}

impl Default for ContainerBuilder<'static, Synchronized> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'p, S: Storage> ContainerBuilder<'p, S> {
    /// Starts a container that falls back to `parent`.
    ///
    /// The child inherits the parent's configuration and process scope.
    pub fn child_of(parent: &'p Container<'p, S>) -> Self {
        Self {
            pending: Vec::new(),
            parent: Some(parent),
            config: parent.config().clone(),
            process: parent.process_scope().cloned(),
            errors: Vec::new(),
        }
    }

    /// Declares a binding for `From`.
    ///
    /// The binding is keyed by `From`'s canonical type, so `bind::<&T>()`
    /// and `bind::<T>()` are the same binding.
    pub fn bind<From>(self) -> BindingBuilder<'p, From, S>
    where
        From: Canonicalize + ?Sized,
        Canonical<From>: Sized + Send + Sync,
    {
        BindingBuilder::new(self, BindingKind::Target, Vec::new())
    }

    /// Binds `T` to its own constructors.
    pub fn register<T: Injectable>(self) -> BindingBuilder<'p, T, S> {
        let candidates = T::candidates::<S>()
            .into_iter()
            .map(|c| c.map(erase))
            .collect();
        BindingBuilder::new(self, BindingKind::Registered, candidates)
    }

    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// Attaches the registry that process-scoped bindings cache into.
    pub fn process_scope(mut self, scope: Arc<ProcessScope>) -> Self {
        self.process = Some(scope);
        self
    }

    fn push(&mut self, binding: PendingBinding<S>) {
        if self.pending.iter().any(|pending| pending.key == binding.key) {
            self.errors.push(DiError::DuplicateBinding {
                type_name: binding.key.name(),
            });
            return;
        }
        self.pending.push(binding);
    }

    /// Validates every binding and composes the container.
    pub fn build(self) -> DiResult<Container<'p, S>> {
        let ContainerBuilder {
            pending,
            parent,
            config,
            process,
            errors,
        } = self;

        if let Some(err) = errors.into_iter().next() {
            return Err(err);
        }
        config.validate()?;

        if process.is_none() {
            if let Some(binding) = pending.iter().find(|b| b.scope == Some(Scope::Process)) {
                return Err(DiError::MissingProcessScope {
                    type_name: binding.key.name(),
                });
            }
        }

        // Dispatch each binding once.
        let declared: HashSet<TypeKey> = pending.iter().map(|binding| binding.key).collect();
        let satisfiable = |dependency: &Dependency| {
            let key = dependency.key();
            dependency.autowired()
                || declared.contains(&key)
                || parent.is_some_and(|parent| parent.find_binding(&key).is_some())
        };

        let mut bindings = HashMap::with_capacity(pending.len());
        for PendingBinding {
            key,
            kind,
            scope,
            mut candidates,
        } in pending
        {
            let index = dispatch::select(&key, &candidates, config.max_arity, &satisfiable)?;
            let candidate = candidates.swap_remove(index);
            let arity = candidate.arity();
            tracing::debug!("Bound {} to {} with arity {}", key, kind, arity);
            bindings.insert(key.id(), Binding::new(key, kind, scope, candidate));
        }

        // Singletons may not capture shorter-lived dependencies.
        for binding in bindings.values() {
            let Some(scope) = binding.scope() else {
                continue;
            };
            let dependencies = binding.dependencies().iter().map(|dependency| {
                let key = dependency.key();
                let bound = bindings
                    .get(&key.id())
                    .or_else(|| parent?.find_binding(&key));
                CapturedDependency {
                    key,
                    lifetime: bound.map_or(dependency.lifetime(), |bound| {
                        bound.effective_lifetime(dependency.lifetime())
                    }),
                    capture: dependency.capture(),
                }
            });
            check_captive(&binding.key(), scope.tag(), dependencies, config.captive_policy)?;

            // Process instances outlive this container and its parents.
            if scope == Scope::Process {
                check_process_captures(binding, |key| {
                    bindings
                        .get(&key.id())
                        .or_else(|| parent?.find_binding(key))
                })?;
            }
        }

        // Declared scopes fix each type's lifetime up front.
        let lifetimes = LifetimeRegistry::<S::Tags>::new();
        for binding in bindings.values() {
            if let Some(scope) = binding.scope() {
                lifetimes.record(&binding.key(), scope.tag())?;
            }
        }

        let delegation = parent.map_or(Delegation::Root, Delegation::Nested);
        tracing::info!(
            "Built container with {} binding(s) at depth {}",
            bindings.len(),
            delegation.depth()
        );

        Ok(Container::from_parts(
            bindings, lifetimes, delegation, process, config,
        ))
    }
}

/// Rejects a process-scoped binding that shares an instance owned by a
/// container.
fn check_process_captures<'b, S: Storage>(
    binding: &Binding<S>,
    find: impl Fn(&TypeKey) -> Option<&'b Binding<S>>,
) -> DiResult<()> {
    let container_owned = binding.dependencies().iter().find(|dependency| {
        dependency.capture() == Capture::Reference
            && find(&dependency.key()).and_then(Binding::scope) != Some(Scope::Process)
    });
    match container_owned {
        Some(dependency) => Err(DiError::ProcessCapture {
            consumer: binding.key().name(),
            dependency: dependency.key().name(),
        }),
        None => Ok(()),
    }
}

// =============================================================================
// BindingBuilder
// =============================================================================

/// Declares how one bound type is constructed and how long it lives.
///
/// Returned by [`ContainerBuilder::bind`] and
/// [`ContainerBuilder::register`]; the binding is committed when the next
/// binding starts or the container is built.
#[must_use = "a binding is only committed by the next `bind`, `register`, `done` or `build`"]
pub struct BindingBuilder<'p, From: ?Sized, S: Storage = Synchronized> {
    builder: ContainerBuilder<'p, S>,
    pending: PendingBinding<S>,
    from: PhantomData<fn() -> Box<From>>,
}

impl<'p, From, S> BindingBuilder<'p, From, S>
where
    From: Canonicalize + ?Sized,
    Canonical<From>: Sized + Send + Sync,
    S: Storage,
{
    fn new(
        builder: ContainerBuilder<'p, S>,
        kind: BindingKind,
        candidates: Vec<Candidate<Instance, S>>,
    ) -> Self {
        Self {
            builder,
            pending: PendingBinding {
                key: canonical_key::<From>(),
                kind,
                scope: None,
                candidates,
            },
            from: PhantomData,
        }
    }

    fn replace(mut self, kind: BindingKind, candidate: Candidate<Canonical<From>, S>) -> Self {
        self.pending.kind = kind;
        self.pending.candidates = vec![candidate.map(erase)];
        self
    }

    /// Builds `To` with its own constructors and converts it to `From`.
    ///
    /// When `To` declares no constructors it is resolved from the container
    /// instead, so it must then be bound itself.
    pub fn to<To>(mut self) -> Self
    where
        To: Injectable,
        Canonical<From>: Substitute<To>,
    {
        let substitute = |to: To| <Canonical<From> as Substitute<To>>::substitute(to);
        let mut candidates: Vec<_> = To::candidates::<S>()
            .into_iter()
            .map(|candidate| candidate.map(substitute).map(erase))
            .collect();
        if candidates.is_empty() {
            let resolve = Candidate::new(vec![Dependency::value::<To>()], move |container| {
                container.resolve_value::<To>().map(substitute)
            });
            candidates.push(resolve.map(erase));
        }
        self.pending.kind = BindingKind::Target;
        self.pending.candidates = candidates;
        self
    }

    /// Binds a fixed value; every construction yields a clone of it.
    pub fn to_instance(self, instance: Canonical<From>) -> Self
    where
        Canonical<From>: Clone,
    {
        let candidate = Candidate::new(Vec::new(), move |_| Ok(instance.clone()));
        self.replace(BindingKind::Instance, candidate)
    }

    /// Builds `From` with `factory`, resolving its parameters.
    pub fn to_factory<F, Args>(self, factory: F) -> Self
    where
        F: Factory<Args, Output = Canonical<From>>,
    {
        self.replace(BindingKind::Factory, Candidate::from_factory(factory))
    }

    /// Builds `From` with a factory that can fail; its error is reported as
    /// [`DiError::Factory`] and nothing is cached.
    pub fn to_try_factory<F, Args, E>(self, factory: F) -> Self
    where
        F: Factory<Args, Output = Result<Canonical<From>, E>>,
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        self.replace(BindingKind::Factory, Candidate::from_try_factory(factory))
    }

    /// Adds an alternative factory.
    ///
    /// The lowest-arity factory whose parameters are all resolvable is
    /// chosen when the container is built.
    pub fn or_factory<F, Args>(mut self, factory: F) -> Self
    where
        F: Factory<Args, Output = Canonical<From>>,
    {
        let candidate = Candidate::from_factory(factory);
        self.pending.kind = BindingKind::Factory;
        self.pending.candidates.push(candidate.map(erase));
        self
    }

    pub fn in_scope(mut self, scope: Scope) -> Self {
        self.pending.scope = Some(scope);
        self
    }

    pub fn in_singleton_scope(self) -> Self {
        self.in_scope(Scope::Singleton)
    }

    pub fn in_transient_scope(self) -> Self {
        self.in_scope(Scope::Transient)
    }

    /// Caches the instance in the container's [`ProcessScope`].
    pub fn in_process_scope(self) -> Self {
        self.in_scope(Scope::Process)
    }

    /// Commits this binding and returns to the container builder.
    pub fn done(self) -> ContainerBuilder<'p, S> {
        let BindingBuilder {
            mut builder,
            pending,
            ..
        } = self;
        builder.push(pending);
        builder
    }

    pub fn bind<Next>(self) -> BindingBuilder<'p, Next, S>
    where
        Next: Canonicalize + ?Sized,
        Canonical<Next>: Sized + Send + Sync,
    {
        self.done().bind::<Next>()
    }

    pub fn register<T: Injectable>(self) -> BindingBuilder<'p, T, S> {
        self.done().register::<T>()
    }

    pub fn build(self) -> DiResult<Container<'p, S>> {
        self.done().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifetime::{CaptivePolicy, LifetimeTag};

    #[derive(Clone)]
    struct Port(u16);

    #[derive(Clone)]
    struct Address(String);

    crate::injectable!(Port, Address);

    #[test]
    fn test_duplicate_binding_fails_build() {
        let result = ContainerBuilder::new()
            .bind::<Port>()
            .to_instance(Port(80))
            .bind::<&Port>()
            .to_instance(Port(443))
            .build();
        assert!(matches!(result, Err(DiError::DuplicateBinding { .. })));
    }

    #[test]
    fn test_process_scope_required() {
        let result = ContainerBuilder::new()
            .bind::<Port>()
            .to_instance(Port(80))
            .in_process_scope()
            .build();
        assert!(matches!(result, Err(DiError::MissingProcessScope { .. })));
    }

    #[test]
    fn test_declared_scope_seeds_registry() {
        let container = ContainerBuilder::new()
            .bind::<Port>()
            .to_instance(Port(80))
            .in_singleton_scope()
            .build()
            .unwrap();
        assert_eq!(container.lifetime_of::<Port>(), Some(LifetimeTag::Singleton));
        assert!(container.resolve::<Port>().is_err());
    }

    #[test]
    fn test_unsatisfiable_factory_fails_build() {
        let result = ContainerBuilder::new()
            .bind::<Address>()
            .to_factory(|port: Port| Address(format!("localhost:{}", port.0)))
            .build();
        assert!(matches!(result, Err(DiError::Unresolvable { .. })));
    }

    #[test]
    fn test_lowest_arity_factory_is_bound() {
        let container = ContainerBuilder::new()
            .bind::<Port>()
            .to_instance(Port(8080))
            .bind::<Address>()
            .to_factory(|port: Port| Address(format!("localhost:{}", port.0)))
            .or_factory(|| Address("127.0.0.1:80".to_string()))
            .build()
            .unwrap();
        let address: Address = container.resolve().unwrap();
        assert_eq!(address.0, "127.0.0.1:80");
    }

    #[test]
    fn test_singleton_capturing_transient_fails_build() {
        let build = |policy| {
            ContainerBuilder::new()
                .with_config(ContainerConfig {
                    captive_policy: policy,
                    ..ContainerConfig::default()
                })
                .bind::<Port>()
                .to_instance(Port(8080))
                .in_transient_scope()
                .bind::<Address>()
                .to_factory(|port: Port| Address(format!("localhost:{}", port.0)))
                .in_singleton_scope()
                .build()
        };
        assert!(matches!(
            build(CaptivePolicy::Conservative),
            Err(DiError::CaptiveDependency { .. })
        ));
        assert!(build(CaptivePolicy::ReferenceOnly).is_ok());
    }

    #[test]
    fn test_process_binding_cannot_share_container_instance() {
        let process = Arc::new(ProcessScope::new());
        let result = ContainerBuilder::new()
            .process_scope(Arc::clone(&process))
            .bind::<Arc<Port>>()
            .to_factory(|| Arc::new(Port(80)))
            .in_singleton_scope()
            .bind::<Address>()
            .to_factory(|port: Arc<Port>| Address(format!("localhost:{}", port.0)))
            .in_process_scope()
            .build();
        assert!(matches!(result, Err(DiError::ProcessCapture { .. })));

        let container = ContainerBuilder::new()
            .process_scope(process)
            .bind::<Arc<Port>>()
            .to_factory(|| Arc::new(Port(80)))
            .in_process_scope()
            .bind::<Address>()
            .to_factory(|port: Arc<Port>| Address(format!("localhost:{}", port.0)))
            .in_process_scope()
            .build()
            .unwrap();
        let address: &Address = container.resolve().unwrap();
        assert_eq!(address.0, "localhost:80");
    }

    #[test]
    fn test_invalid_config_fails_build() {
        let result = ContainerBuilder::new()
            .with_config(ContainerConfig {
                max_arity: 9,
                ..ContainerConfig::default()
            })
            .build();
        assert!(matches!(result, Err(DiError::Config(_))));
    }
}
