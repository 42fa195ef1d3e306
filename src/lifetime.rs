//! Lifetime tags, binding scopes and the lifetime-consistency registry.
//!
//! A container records the [`LifetimeTag`] each canonical type is first
//! resolved with and rejects later requests that use the other tag, so a
//! type never silently switches between fresh and shared identity.
//!
//! The captive-dependency check runs at composition time and forbids a
//! singleton from holding a transient dependency.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::canonical::TypeKey;
use crate::error::{DiError, DiResult};

/// How long a resolved instance lives.
///
/// Ordered by longevity: `Transient < Singleton`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifetimeTag {
    /// A fresh instance per request.
    Transient,
    /// One shared instance per cache.
    Singleton,
}

impl fmt::Display for LifetimeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifetimeTag::Transient => f.write_str("transient"),
            LifetimeTag::Singleton => f.write_str("singleton"),
        }
    }
}

/// How a consumer holds one of its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// The consumer owns its own copy (`T`, `Box<T>`).
    Value,
    /// The consumer shares a cached instance (`&T`, `Arc<T>`, `Weak<T>`).
    Reference,
}

/// Scope declared on a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Constructed on every request.
    Transient,
    /// Cached once per container.
    Singleton,
    /// Cached once in the [`ProcessScope`](crate::cache::ProcessScope)
    /// attached to the container.
    ///
    /// The instance outlives every container sharing the scope, so it may
    /// only hold references to other process-scoped instances.
    Process,
}

impl Scope {
    /// The lifetime tag this scope resolves with.
    pub fn tag(self) -> LifetimeTag {
        match self {
            Scope::Transient => LifetimeTag::Transient,
            Scope::Singleton | Scope::Process => LifetimeTag::Singleton,
        }
    }
}

/// Which dependencies a singleton may not hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptivePolicy {
    /// Reject every transient dependency of a singleton.
    #[default]
    Conservative,
    /// Reject only transient dependencies captured by reference; a copied
    /// value cannot dangle.
    ReferenceOnly,
}

// =============================================================================
// Tag storage
// =============================================================================

/// Map from canonical type to its recorded lifetime tag.
pub type TagMap = HashMap<TypeId, LifetimeTag>;

/// Interior-mutable storage for a [`LifetimeRegistry`].
///
/// The registry follows the same synchronization discipline as the cache it
/// accompanies: a mutex for shared containers, a `RefCell` for
/// single-threaded ones.
pub trait TagStore: Default {
    fn with_tags<R>(&self, f: impl FnOnce(&mut TagMap) -> R) -> R;
}

impl TagStore for Mutex<TagMap> {
    fn with_tags<R>(&self, f: impl FnOnce(&mut TagMap) -> R) -> R {
        f(&mut self.lock())
    }
}

impl TagStore for RefCell<TagMap> {
    fn with_tags<R>(&self, f: impl FnOnce(&mut TagMap) -> R) -> R {
        f(&mut self.borrow_mut())
    }
}

// =============================================================================
// Lifetime Registry
// =============================================================================

/// Per-container record of the lifetime each type was first resolved with.
#[derive(Default)]
pub struct LifetimeRegistry<M: TagStore> {
    tags: M,
}

impl<M: TagStore> LifetimeRegistry<M> {
    pub fn new() -> Self {
        Self { tags: M::default() }
    }

    /// Fails if a tag other than `tag` was recorded for `key`.
    pub fn check(&self, key: &TypeKey, tag: LifetimeTag) -> DiResult<()> {
        match self.recorded(key) {
            Some(recorded) if recorded != tag => Err(DiError::LifetimeMismatch {
                type_name: key.name(),
                recorded,
                requested: tag,
            }),
            _ => Ok(()),
        }
    }

    /// Records `tag` for `key`, or fails if a different tag was recorded.
    pub fn record(&self, key: &TypeKey, tag: LifetimeTag) -> DiResult<()> {
        self.tags.with_tags(|tags| match tags.entry(key.id()) {
            Entry::Occupied(entry) if *entry.get() != tag => Err(DiError::LifetimeMismatch {
                type_name: key.name(),
                recorded: *entry.get(),
                requested: tag,
            }),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(entry) => {
                tracing::trace!("Recording {} lifetime for {}", tag, key);
                entry.insert(tag);
                Ok(())
            }
        })
    }

    /// The tag recorded for `key`, if it has been resolved.
    pub fn recorded(&self, key: &TypeKey) -> Option<LifetimeTag> {
        self.tags.with_tags(|tags| tags.get(&key.id()).copied())
    }

    pub fn len(&self) -> usize {
        self.tags.with_tags(|tags| tags.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Captive Dependency Check
// =============================================================================

/// A dependency as seen by the captive check.
#[derive(Debug, Clone, Copy)]
pub struct CapturedDependency {
    pub key: TypeKey,
    pub lifetime: LifetimeTag,
    pub capture: Capture,
}

/// Verifies that a consumer with lifetime `consumer_lifetime` does not
/// outlive any of its dependencies.
pub fn check_captive(
    consumer: &TypeKey,
    consumer_lifetime: LifetimeTag,
    dependencies: impl IntoIterator<Item = CapturedDependency>,
    policy: CaptivePolicy,
) -> DiResult<()> {
    for dependency in dependencies {
        if consumer_lifetime <= dependency.lifetime {
            continue;
        }
        if policy == CaptivePolicy::ReferenceOnly && dependency.capture == Capture::Value {
            tracing::debug!(
                "Allowing {} {} to copy {} {}",
                consumer_lifetime,
                consumer,
                dependency.lifetime,
                dependency.key
            );
            continue;
        }
        return Err(DiError::CaptiveDependency {
            consumer: consumer.name(),
            consumer_lifetime,
            dependency: dependency.key.name(),
            dependency_lifetime: dependency.lifetime,
        });
    }
    Ok(())
}
