//! Single-threaded cache.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use once_cell::unsync::OnceCell;

use super::TypeCache;
use crate::canonical::TypeKey;
use crate::error::{DiError, DiResult};

/// Type-indexed cache without internal locking.
///
/// `LocalCache` is `!Sync`; it is meant for containers that are composed
/// and used from a single thread. Sharing it across threads requires
/// external synchronization.
#[derive(Default)]
pub struct LocalCache {
    slots: RefCell<HashMap<TypeId, Rc<LocalSlot>>>,
}

#[derive(Default)]
struct LocalSlot {
    value: OnceCell<Box<dyn Any>>,
    initializing: Cell<bool>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn extend<T: 'static>(&self, value: &T) -> &T {
        // SAFETY: slots are never removed from `self.slots` and a set
        // `OnceCell` is never cleared, so the boxed instance lives as long
        // as `self`.
        unsafe { &*(value as *const T) }
    }
}

impl TypeCache for LocalCache {
    fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        let slot = self.slots.borrow().get(&TypeId::of::<T>()).cloned()?;
        let value = slot.value.get()?.downcast_ref::<T>()?;
        Some(self.extend(value))
    }

    fn get_or_create<T: Send + Sync + 'static>(
        &self,
        create: impl FnOnce() -> DiResult<T>,
    ) -> DiResult<&T> {
        let key = TypeKey::of::<T>();
        let slot = Rc::clone(self.slots.borrow_mut().entry(key.id()).or_default());

        if slot.value.get().is_none() {
            if slot.initializing.get() {
                return Err(DiError::CircularDependency {
                    type_name: key.name(),
                });
            }
            let result = {
                let _initializing = InitializingFlag::set(&slot.initializing);
                create()
            };
            let _ = slot.value.set(Box::new(result?));
        }

        let value = slot
            .value
            .get()
            .and_then(|value| value.downcast_ref::<T>())
            .ok_or(DiError::TypeMismatch {
                type_name: key.name(),
            })?;
        Ok(self.extend(value))
    }

    fn len(&self) -> usize {
        self.slots
            .borrow()
            .values()
            .filter(|slot| slot.value.get().is_some())
            .count()
    }
}

/// Clears the initializing flag on scope exit, including unwinding.
struct InitializingFlag<'a>(&'a Cell<bool>);

impl<'a> InitializingFlag<'a> {
    fn set(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for InitializingFlag<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
