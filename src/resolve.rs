//! Request shapes and injectable types.
//!
//! The shape a type is requested in selects how it is resolved:
//!
//! | Request    | Canonical | Lifetime  | Capture   |
//! |------------|-----------|-----------|-----------|
//! | `T`        | `T`       | transient | value     |
//! | `Box<T>`   | `Box<T>`  | transient | value     |
//! | `&T`       | `T`       | singleton | reference |
//! | `Arc<T>`   | `Arc<T>`  | singleton | reference |
//! | `Weak<T>`  | `Arc<T>`  | singleton | reference |
//!
//! Value shapes build a fresh instance on every request; reference shapes
//! share the instance cached by the container that satisfies the request.

use std::sync::{Arc, Weak};

use crate::cache::Storage;
use crate::canonical::Canonicalize;
use crate::container::Container;
use crate::dispatch::{Candidate, Dependency};
use crate::error::DiResult;
use crate::lifetime::{Capture, LifetimeTag};

/// A type that can be requested from a [`Container`].
///
/// Owned shapes implement `Resolve<'c>` for every `'c` and can therefore be
/// used as factory parameters; `&'c T` borrows from the container and is
/// only available from [`Container::resolve`].
pub trait Resolve<'c>: Canonicalize + Sized {
    /// Describes this request as a constructor argument.
    fn dependency() -> Dependency;

    fn resolve<S: Storage>(container: &'c Container<'_, S>) -> DiResult<Self>;
}

/// A type the container can store and, optionally, build on its own.
///
/// Derive it with `#[derive(Injectable)]` to autowire a struct from its
/// fields or from named constructors, or declare it with
/// [`injectable!`](crate::injectable) for types that are only ever bound
/// explicitly (including trait objects).
pub trait Injectable: Canonicalize<Canonical = Self> + Send + Sync + 'static {
    /// Whether the type has constructors usable without a binding.
    const AUTOWIRED: bool = false;

    /// Constructors used when no binding exists.
    fn candidates<S: Storage>() -> Vec<Candidate<Self, S>>
    where
        Self: Sized,
    {
        Vec::new()
    }

    /// Constructors for `Box<Self>` when no binding exists.
    fn boxed_candidates<S: Storage>() -> Vec<Candidate<Box<Self>, S>> {
        Vec::new()
    }

    /// Constructors for `Arc<Self>` when no binding exists.
    fn shared_candidates<S: Storage>() -> Vec<Candidate<Arc<Self>, S>> {
        Vec::new()
    }
}

/// Unsizing from an implementation `T` to the trait object `Self`.
///
/// Generated by `injectable!(dyn Trait)` for every implementor.
pub trait Upcast<T>: Injectable {
    fn upcast_box(value: Box<T>) -> Box<Self>;

    fn upcast_arc(value: Arc<T>) -> Arc<Self>;
}

/// A bound type that an implementation `T` can stand in for.
///
/// Provided for `Box<dyn Trait>` and `Arc<dyn Trait>`; implement it for a
/// concrete type to let `bind::<Self>().to::<T>()` convert between them.
pub trait Substitute<T>: Sized {
    fn substitute(value: T) -> Self;
}

impl<I: Upcast<T> + ?Sized, T> Substitute<T> for Box<I> {
    fn substitute(value: T) -> Self {
        I::upcast_box(Box::new(value))
    }
}

impl<I: Upcast<T> + ?Sized, T> Substitute<T> for Arc<I> {
    fn substitute(value: T) -> Self {
        I::upcast_arc(Arc::new(value))
    }
}

impl Dependency {
    /// Describes an owned `T` argument.
    pub fn value<T: Injectable>() -> Self {
        Dependency::new::<T>(LifetimeTag::Transient, Capture::Value, T::AUTOWIRED)
    }
}

impl<'c, T: Injectable + ?Sized> Resolve<'c> for Box<T> {
    fn dependency() -> Dependency {
        Dependency::new::<Box<T>>(LifetimeTag::Transient, Capture::Value, T::AUTOWIRED)
    }

    fn resolve<S: Storage>(container: &'c Container<'_, S>) -> DiResult<Self> {
        container.resolve_transient(T::boxed_candidates::<S>)
    }
}

impl<'c, T: Injectable + ?Sized> Resolve<'c> for Arc<T> {
    fn dependency() -> Dependency {
        Dependency::new::<Arc<T>>(LifetimeTag::Singleton, Capture::Reference, T::AUTOWIRED)
    }

    fn resolve<S: Storage>(container: &'c Container<'_, S>) -> DiResult<Self> {
        container
            .resolve_shared(T::shared_candidates::<S>)
            .map(Arc::clone)
    }
}

impl<'c, T: Injectable + ?Sized> Resolve<'c> for Weak<T> {
    fn dependency() -> Dependency {
        Dependency::new::<Arc<T>>(LifetimeTag::Singleton, Capture::Reference, T::AUTOWIRED)
    }

    fn resolve<S: Storage>(container: &'c Container<'_, S>) -> DiResult<Self> {
        container
            .resolve_shared(T::shared_candidates::<S>)
            .map(Arc::downgrade)
    }
}

impl<'c, T: Injectable> Resolve<'c> for &'c T {
    fn dependency() -> Dependency {
        Dependency::new::<T>(LifetimeTag::Singleton, Capture::Reference, T::AUTOWIRED)
    }

    fn resolve<S: Storage>(container: &'c Container<'_, S>) -> DiResult<Self> {
        container.resolve_shared(T::candidates::<S>)
    }
}

// Standard types are injectable by binding only.
crate::injectable!(
    String,
    std::path::PathBuf,
    std::time::Duration,
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonical_key;

    trait Clock: Send + Sync {
        fn now(&self) -> u64;
    }

    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> u64 {
            42
        }
    }

    crate::injectable!(dyn Clock);

    #[test]
    fn test_shape_lifetimes() {
        assert_eq!(<u32 as Resolve>::dependency().lifetime(), LifetimeTag::Transient);
        assert_eq!(<Box<u32> as Resolve>::dependency().lifetime(), LifetimeTag::Transient);
        assert_eq!(<&u32 as Resolve>::dependency().lifetime(), LifetimeTag::Singleton);
        assert_eq!(<Arc<u32> as Resolve>::dependency().capture(), Capture::Reference);
        assert_eq!(<Box<u32> as Resolve>::dependency().capture(), Capture::Value);
    }

    #[test]
    fn test_dependencies_use_canonical_keys() {
        assert_eq!(<&String as Resolve>::dependency().key(), canonical_key::<String>());
        assert_eq!(
            <Weak<dyn Clock> as Resolve>::dependency().key(),
            canonical_key::<Arc<dyn Clock>>()
        );
    }

    #[test]
    fn test_bound_only_types_are_not_autowired() {
        assert!(!<String as Resolve>::dependency().autowired());
        assert!(!<Arc<dyn Clock> as Resolve>::dependency().autowired());
    }

    #[test]
    fn test_implementations_substitute_for_trait_objects() {
        let boxed: Box<dyn Clock> = Substitute::substitute(FixedClock);
        let shared: Arc<dyn Clock> = Substitute::substitute(FixedClock);
        assert_eq!(boxed.now(), 42);
        assert_eq!(shared.now(), 42);
    }
}
