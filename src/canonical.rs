//! Canonical type mapping.
//!
//! Every requested type maps to exactly one canonical type, which is the
//! identity used by caches, lifetime registries and bindings:
//!
//! - `&T` and `&mut T` canonicalize to `T` (recursively)
//! - `Box<T>` canonicalizes to `Box<Canonical<T>>`
//! - `Arc<T>` canonicalizes to `Arc<Canonical<T>>`
//! - `Weak<T>` canonicalizes to `Arc<Canonical<T>>`, since only a strong
//!   owner can keep the observed instance alive
//!
//! Leaf types map to themselves. The mapping is resolved entirely by the
//! type checker.

use std::any::TypeId;
use std::fmt;
use std::sync::{Arc, Weak};

/// Maps a requested type to its canonical storage type.
pub trait Canonicalize {
    /// The canonical form of this type.
    type Canonical: ?Sized + 'static;
}

/// Shorthand for the canonical form of `T`.
pub type Canonical<T> = <T as Canonicalize>::Canonical;

impl<T: ?Sized + Canonicalize> Canonicalize for &T {
    type Canonical = T::Canonical;
}

impl<T: ?Sized + Canonicalize> Canonicalize for &mut T {
    type Canonical = T::Canonical;
}

impl<T: ?Sized + Canonicalize> Canonicalize for Box<T> {
    type Canonical = Box<T::Canonical>;
}

impl<T: ?Sized + Canonicalize> Canonicalize for Arc<T> {
    type Canonical = Arc<T::Canonical>;
}

impl<T: ?Sized + Canonicalize> Canonicalize for Weak<T> {
    type Canonical = Arc<T::Canonical>;
}

/// Type identity used to key caches, registries and bindings.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key of `T` itself.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl std::hash::Hash for TypeKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Key of the canonical form of `R`.
pub fn canonical_key<R: ?Sized + Canonicalize>() -> TypeKey {
    TypeKey::of::<R::Canonical>()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget;

    impl Canonicalize for Widget {
        type Canonical = Self;
    }

    trait Shape {}

    impl Canonicalize for dyn Shape {
        type Canonical = Self;
    }

    fn same<A: ?Sized + Canonicalize, B: ?Sized + Canonicalize>() -> bool {
        canonical_key::<A>() == canonical_key::<B>()
    }

    #[test]
    fn test_references_canonicalize_to_value() {
        assert!(same::<Widget, &Widget>());
        assert!(same::<Widget, &mut Widget>());
        assert!(same::<Widget, &&Widget>());
        assert!(same::<Widget, &mut &Widget>());
    }

    #[test]
    fn test_canonicalization_is_idempotent() {
        assert!(same::<Canonical<&Widget>, Widget>());
        assert!(same::<Canonical<Canonical<&Box<&Widget>>>, Box<Widget>>());
    }

    #[test]
    fn test_owning_wrappers_canonicalize_their_element() {
        assert!(same::<Box<&Widget>, Box<Widget>>());
        assert!(same::<Arc<&mut Widget>, Arc<Widget>>());
        assert!(!same::<Box<Widget>, Widget>());
        assert!(!same::<Arc<Widget>, Box<Widget>>());
    }

    #[test]
    fn test_weak_is_stored_as_strong_owner() {
        assert!(same::<Weak<Widget>, Arc<Widget>>());
        assert!(same::<&Weak<&Widget>, Arc<Widget>>());
        assert!(same::<Weak<dyn Shape>, Arc<dyn Shape>>());
    }

    #[test]
    fn test_type_key_display_uses_type_name() {
        let key = canonical_key::<&Widget>();
        assert!(key.name().ends_with("Widget"));
        assert_eq!(key.to_string(), key.name());
        assert_eq!(key.id(), TypeId::of::<Widget>());
    }
}
