//! Argument dispatch.
//!
//! A type can offer several construction strategies ([`Candidate`]s), each
//! with a declared arity and a descriptor for every argument. [`select`]
//! picks the one to use:
//!
//! 1. candidates are tried in increasing arity (ties keep declaration order)
//! 2. a one-argument candidate taking the built type itself is skipped, as
//!    it only restates a copy
//! 3. a candidate with an unsatisfiable argument is skipped
//! 4. the first remaining candidate wins, even if a larger one would also work
//!
//! Explicit bindings are dispatched once when the container is built;
//! autowired types are dispatched when they are resolved.

use std::error::Error;
use std::sync::Arc;

use crate::cache::Storage;
use crate::canonical::TypeKey;
use crate::container::Container;
use crate::error::{DiError, DiResult};
use crate::lifetime::{Capture, LifetimeTag};
use crate::resolve::Resolve;

/// Largest arity a factory may declare.
pub const MAX_ARITY: usize = 8;

// =============================================================================
// Dependency
// =============================================================================

/// Static description of one constructor argument.
#[derive(Debug, Clone, Copy)]
pub struct Dependency {
    key: TypeKey,
    lifetime: LifetimeTag,
    capture: Capture,
    autowired: bool,
}

impl Dependency {
    /// Describes an argument whose canonical type is `C`.
    pub fn new<C: ?Sized + 'static>(
        lifetime: LifetimeTag,
        capture: Capture,
        autowired: bool,
    ) -> Self {
        Self {
            key: TypeKey::of::<C>(),
            lifetime,
            capture,
            autowired,
        }
    }

    /// Canonical type of the argument.
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Lifetime implied by the argument's shape.
    pub fn lifetime(&self) -> LifetimeTag {
        self.lifetime
    }

    pub fn capture(&self) -> Capture {
        self.capture
    }

    /// Whether the argument can be built without any binding.
    pub fn autowired(&self) -> bool {
        self.autowired
    }
}

/// Describes `R` as a constructor argument.
pub fn dependency_of<R: for<'c> Resolve<'c>>() -> Dependency {
    R::dependency()
}

// =============================================================================
// Candidate
// =============================================================================

type Invoke<T, S> = Arc<dyn Fn(&Container<'_, S>) -> DiResult<T> + Send + Sync>;

/// One way to construct a `T` inside a container with storage `S`.
pub struct Candidate<T, S: Storage> {
    origin: TypeKey,
    dependencies: Vec<Dependency>,
    invoke: Invoke<T, S>,
}

impl<T, S: Storage> Clone for Candidate<T, S> {
    fn clone(&self) -> Self {
        Self {
            origin: self.origin,
            dependencies: self.dependencies.clone(),
            invoke: Arc::clone(&self.invoke),
        }
    }
}

impl<T: 'static, S: Storage> Candidate<T, S> {
    /// Creates a candidate from its argument descriptors and a closure that
    /// resolves those arguments and builds the value.
    pub fn new(
        dependencies: Vec<Dependency>,
        invoke: impl Fn(&Container<'_, S>) -> DiResult<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            origin: TypeKey::of::<T>(),
            dependencies,
            invoke: Arc::new(invoke),
        }
    }

    /// Creates a candidate from a function whose parameters are resolved
    /// from the container.
    pub fn from_factory<F, Args>(factory: F) -> Self
    where
        F: Factory<Args, Output = T>,
    {
        Self::new(F::dependencies(), move |container| factory.invoke(container))
    }

    /// Like [`from_factory`](Self::from_factory) for functions that can fail.
    pub fn from_try_factory<F, Args, E>(factory: F) -> Self
    where
        F: Factory<Args, Output = Result<T, E>>,
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        Self::new(F::dependencies(), move |container| {
            factory.invoke(container)?.map_err(|err| DiError::Factory {
                type_name: std::any::type_name::<T>(),
                source: err.into(),
            })
        })
    }

    pub fn arity(&self) -> usize {
        self.dependencies.len()
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Resolves the arguments and builds the value.
    pub fn invoke(&self, container: &Container<'_, S>) -> DiResult<T> {
        (self.invoke)(container)
    }

    /// Wraps the built value, keeping arity and arguments.
    pub fn map<U: 'static>(self, f: impl Fn(T) -> U + Send + Sync + 'static) -> Candidate<U, S> {
        let invoke = self.invoke;
        Candidate {
            origin: self.origin,
            dependencies: self.dependencies,
            invoke: Arc::new(move |container: &Container<'_, S>| invoke(container).map(&f)),
        }
    }

    /// A one-argument candidate whose argument is the type it builds.
    fn is_self_match(&self, target: &TypeKey) -> bool {
        match self.dependencies.as_slice() {
            [only] => only.key == *target || only.key == self.origin,
            _ => false,
        }
    }
}

// =============================================================================
// Factory
// =============================================================================

/// A function whose parameters can all be resolved from a container.
///
/// Implemented for every `Fn(A1, .., An) -> Out` with `n <= MAX_ARITY` where
/// each `Ai` is an owned request shape (`T`, `Box<T>`, `Arc<T>`, `Weak<T>`).
pub trait Factory<Args>: Send + Sync + 'static {
    type Output;

    /// Number of parameters.
    const ARITY: usize;

    fn dependencies() -> Vec<Dependency>;

    fn invoke<S: Storage>(&self, container: &Container<'_, S>) -> DiResult<Self::Output>;
}

macro_rules! impl_factory {
    ($arity:literal $(, $arg:ident)*) => {
        impl<F, Out, $($arg,)*> Factory<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> Out + Send + Sync + 'static,
            $($arg: for<'c> Resolve<'c>,)*
        {
            type Output = Out;

            const ARITY: usize = $arity;

            fn dependencies() -> Vec<Dependency> {
                vec![$(dependency_of::<$arg>()),*]
            }

            #[allow(unused_variables)]
            fn invoke<S: Storage>(&self, container: &Container<'_, S>) -> DiResult<Out> {
                Ok((self)($(<$arg as Resolve>::resolve(container)?),*))
            }
        }
    };
}

impl_factory!(0);
impl_factory!(1, A1);
impl_factory!(2, A1, A2);
impl_factory!(3, A1, A2, A3);
impl_factory!(4, A1, A2, A3, A4);
impl_factory!(5, A1, A2, A3, A4, A5);
impl_factory!(6, A1, A2, A3, A4, A5, A6);
impl_factory!(7, A1, A2, A3, A4, A5, A6, A7);
impl_factory!(8, A1, A2, A3, A4, A5, A6, A7, A8);

// =============================================================================
// Selection
// =============================================================================

/// Picks the candidate used to build `target`, returning its index.
///
/// `satisfiable` reports whether an argument can be resolved in the
/// container doing the dispatch.
pub fn select<T: 'static, S: Storage>(
    target: &TypeKey,
    candidates: &[Candidate<T, S>],
    max_arity: usize,
    satisfiable: impl Fn(&Dependency) -> bool,
) -> DiResult<usize> {
    if candidates.is_empty() {
        return Err(DiError::Unresolvable {
            type_name: target.name(),
            reason: "no binding and no constructor".to_string(),
        });
    }

    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by_key(|&index| candidates[index].arity());

    let mut rejected = Vec::new();
    for index in order {
        let candidate = &candidates[index];
        let arity = candidate.arity();

        if arity > max_arity {
            if rejected.is_empty() {
                return Err(DiError::ArityExceeded {
                    type_name: target.name(),
                    max_arity,
                });
            }
            rejected.push(format!(
                "arity {} exceeds the maximum of {}",
                arity, max_arity
            ));
            break;
        }

        if candidate.is_self_match(target) {
            tracing::debug!("Skipping constructor of {} that takes itself", target);
            rejected.push("arity 1 takes the type itself".to_string());
            continue;
        }

        if let Some(missing) = candidate
            .dependencies()
            .iter()
            .find(|dependency| !satisfiable(dependency))
        {
            rejected.push(format!(
                "arity {} needs unresolvable {}",
                arity,
                missing.key()
            ));
            continue;
        }

        tracing::trace!("Dispatching {} with arity {}", target, arity);
        return Ok(index);
    }

    Err(DiError::Unresolvable {
        type_name: target.name(),
        reason: rejected.join("; "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Synchronized;

    struct Engine;
    struct Wheel;

    fn dependency<C: 'static>() -> Dependency {
        Dependency::new::<C>(LifetimeTag::Transient, Capture::Value, true)
    }

    fn candidate(dependencies: Vec<Dependency>) -> Candidate<Engine, Synchronized> {
        Candidate::new(dependencies, |_| Ok(Engine))
    }

    fn engine() -> TypeKey {
        TypeKey::of::<Engine>()
    }

    #[test]
    fn test_lowest_arity_wins() {
        let candidates = vec![
            candidate(vec![dependency::<Wheel>(), dependency::<Wheel>()]),
            candidate(vec![dependency::<Wheel>()]),
            candidate(vec![]),
        ];
        let chosen = select(&engine(), &candidates, MAX_ARITY, |_| true).unwrap();
        assert_eq!(chosen, 2);
    }

    #[test]
    fn test_ties_keep_declaration_order() {
        let candidates = vec![
            candidate(vec![dependency::<Wheel>()]),
            candidate(vec![dependency::<u8>()]),
        ];
        assert_eq!(select(&engine(), &candidates, MAX_ARITY, |_| true).unwrap(), 0);
    }

    #[test]
    fn test_self_match_is_excluded() {
        let candidates = vec![
            candidate(vec![dependency::<Engine>()]),
            candidate(vec![dependency::<Wheel>(), dependency::<Wheel>()]),
        ];
        assert_eq!(select(&engine(), &candidates, MAX_ARITY, |_| true).unwrap(), 1);

        let only_self = vec![candidate(vec![dependency::<Engine>()])];
        let err = select(&engine(), &only_self, MAX_ARITY, |_| true).unwrap_err();
        assert!(matches!(err, DiError::Unresolvable { .. }));
    }

    #[test]
    fn test_self_match_survives_mapping() {
        let boxed = vec![candidate(vec![dependency::<Engine>()]).map(Box::new)];
        let target = TypeKey::of::<Box<Engine>>();
        assert!(select(&target, &boxed, MAX_ARITY, |_| true).is_err());
    }

    #[test]
    fn test_unsatisfiable_candidates_are_skipped() {
        let wheel = TypeKey::of::<Wheel>();
        let candidates = vec![
            candidate(vec![dependency::<Wheel>()]),
            candidate(vec![dependency::<u8>(), dependency::<u16>()]),
        ];
        let chosen = select(&engine(), &candidates, MAX_ARITY, |d| d.key() != wheel).unwrap();
        assert_eq!(chosen, 1);
    }

    #[test]
    fn test_arity_above_maximum() {
        let candidates = vec![candidate(vec![dependency::<Wheel>(), dependency::<Wheel>()])];
        let err = select(&engine(), &candidates, 1, |_| true).unwrap_err();
        assert!(matches!(err, DiError::ArityExceeded { max_arity: 1, .. }));
    }

    #[test]
    fn test_no_candidates() {
        let err = select::<Engine, Synchronized>(&engine(), &[], MAX_ARITY, |_| true).unwrap_err();
        assert!(err.to_string().contains("no binding and no constructor"));
    }

    #[test]
    fn test_factory_arity_is_declared() {
        fn build(_: u8, _: u16) -> Engine {
            Engine
        }
        assert_eq!(<fn() -> Engine as Factory<()>>::ARITY, 0);
        let candidate: Candidate<Engine, Synchronized> = Candidate::from_factory(build);
        assert_eq!(candidate.arity(), 2);
        assert_eq!(candidate.dependencies()[1].key(), TypeKey::of::<u16>());
    }
}
