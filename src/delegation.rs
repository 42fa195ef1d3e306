//! Delegation from a child container to its ancestors.

use crate::cache::Storage;
use crate::canonical::TypeKey;
use crate::container::Container;

/// Link from a container to the container it falls back to.
///
/// The parent is borrowed, so the borrow checker guarantees it outlives
/// every child that delegates to it.
pub enum Delegation<'p, S: Storage> {
    /// No parent; the chain ends here.
    Root,
    /// Falls back to the borrowed parent.
    Nested(&'p Container<'p, S>),
}

impl<'p, S: Storage> Delegation<'p, S> {
    /// Searches the chain for the nearest ancestor that binds `key`.
    ///
    /// Calls `on_found` with that ancestor, which resolves and owns the
    /// instance itself, or `on_not_found` once the root is reached.
    pub fn find_in_parent<'c, R>(
        &'c self,
        key: &TypeKey,
        on_found: impl FnOnce(&'c Container<'c, S>) -> R,
        on_not_found: impl FnOnce() -> R,
    ) -> R
    where
        'p: 'c,
    {
        match *self {
            Delegation::Root => on_not_found(),
            Delegation::Nested(parent) => {
                if parent.binds_key(key) {
                    tracing::debug!("Delegating {} to parent container", key);
                    on_found(parent)
                } else {
                    parent
                        .delegation()
                        .find_in_parent(key, on_found, on_not_found)
                }
            }
        }
    }

    pub fn parent(&self) -> Option<&'p Container<'p, S>> {
        match *self {
            Delegation::Root => None,
            Delegation::Nested(parent) => Some(parent),
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Delegation::Root)
    }

    /// Number of ancestors above this link.
    pub fn depth(&self) -> usize {
        self.parent()
            .map_or(0, |parent| 1 + parent.delegation().depth())
    }
}

impl<S: Storage> Clone for Delegation<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: Storage> Copy for Delegation<'_, S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ContainerBuilder;
    use crate::cache::Synchronized;

    #[derive(Clone)]
    struct Endpoint;

    crate::injectable!(Endpoint);

    fn key() -> TypeKey {
        TypeKey::of::<Endpoint>()
    }

    fn search(delegation: &Delegation<'_, Synchronized>) -> Option<usize> {
        delegation.find_in_parent(&key(), |found| Some(found.delegation().depth()), || None)
    }

    #[test]
    fn test_root_never_finds() {
        let root: Delegation<'_, Synchronized> = Delegation::Root;
        assert!(root.is_root());
        assert_eq!(root.depth(), 0);
        assert_eq!(search(&root), None);
    }

    #[test]
    fn test_nearest_binding_ancestor_is_found() {
        let root = ContainerBuilder::new()
            .bind::<Endpoint>()
            .to_instance(Endpoint)
            .build()
            .unwrap();
        let middle = ContainerBuilder::child_of(&root).build().unwrap();

        let link = Delegation::Nested(&middle);
        assert_eq!(link.depth(), 2);
        assert_eq!(search(&link), Some(0));
    }

    #[test]
    fn test_unbound_chain_reaches_root() {
        let root = ContainerBuilder::new().build().unwrap();
        let child = ContainerBuilder::child_of(&root).build().unwrap();
        assert_eq!(search(&Delegation::Nested(&child)), None);
    }
}
