//! Concurrency-safe cache with double-checked slot initialization.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};

use super::TypeCache;
use crate::canonical::TypeKey;
use crate::error::{DiError, DiResult};

type Instance = Box<dyn Any + Send + Sync>;

/// Thread-safe type-indexed cache.
///
/// Each type gets its own slot. Ready slots are read without locking; only
/// the first construction blocks, so concurrent first requests for the same
/// type construct it exactly once and all observe the same instance.
#[derive(Default)]
pub struct SyncCache {
    slots: RwLock<HashMap<TypeId, Arc<Slot>>>,
}

impl SyncCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: TypeId) -> Arc<Slot> {
        if let Some(slot) = self.slots.read().get(&id) {
            return Arc::clone(slot);
        }
        Arc::clone(self.slots.write().entry(id).or_default())
    }

    fn extend<T: 'static>(&self, value: &T) -> &T {
        // SAFETY: slots are never removed from `self.slots` and a set
        // `OnceCell` is never cleared, so the instance lives as long as
        // `self`.
        unsafe { &*(value as *const T) }
    }
}

impl TypeCache for SyncCache {
    fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        let slot = self.slots.read().get(&TypeId::of::<T>()).cloned()?;
        let value = slot.value.get()?.downcast_ref::<T>()?;
        Some(self.extend(value))
    }

    fn get_or_create<T: Send + Sync + 'static>(
        &self,
        create: impl FnOnce() -> DiResult<T>,
    ) -> DiResult<&T> {
        let key = TypeKey::of::<T>();
        let slot = self.slot(key.id());
        let instance = slot.get_or_init(&key, || {
            create().map(|value| Box::new(value) as Instance)
        })?;
        let value = instance.downcast_ref::<T>().ok_or(DiError::TypeMismatch {
            type_name: key.name(),
        })?;
        Ok(self.extend(value))
    }

    fn len(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| slot.value.get().is_some())
            .count()
    }
}

// =============================================================================
// Slot
// =============================================================================

/// One cache entry and the thread currently constructing it.
#[derive(Default)]
struct Slot {
    value: OnceCell<Instance>,
    constructing: Mutex<Option<ThreadId>>,
}

impl Slot {
    fn get_or_init(
        &self,
        key: &TypeKey,
        create: impl FnOnce() -> DiResult<Instance>,
    ) -> DiResult<&Instance> {
        if let Some(instance) = self.value.get() {
            return Ok(instance);
        }

        // Re-entering the cell from its own initializer would deadlock.
        let current = thread::current().id();
        if *self.constructing.lock() == Some(current) {
            return Err(DiError::CircularDependency {
                type_name: key.name(),
            });
        }

        self.value.get_or_try_init(|| {
            let _constructing = Constructing::enter(&self.constructing, current);
            let instance = create()?;
            tracing::trace!("Published shared instance of {}", key);
            Ok(instance)
        })
    }
}

/// Marks a slot as under construction by one thread until dropped,
/// including on unwind.
struct Constructing<'a>(&'a Mutex<Option<ThreadId>>);

impl<'a> Constructing<'a> {
    fn enter(owner: &'a Mutex<Option<ThreadId>>, thread: ThreadId) -> Self {
        *owner.lock() = Some(thread);
        Self(owner)
    }
}

impl Drop for Constructing<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}
