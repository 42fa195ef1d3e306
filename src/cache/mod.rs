//! Type-indexed instance caches.
//!
//! A cache maps a canonical type to one lazily created instance that lives
//! as long as the cache. Two implementations share the [`TypeCache`]
//! contract:
//!
//! - [`SyncCache`] - safe for concurrent callers; at most one construction
//!   per type even when several threads race on the first request
//! - [`LocalCache`] - single-threaded, for externally synchronized use
//!
//! [`Storage`] pairs a cache with the matching lifetime registry so a
//! container can be instantiated in either flavor.

mod local;
mod process;
mod sync;

use std::cell::RefCell;

use parking_lot::Mutex;

use crate::error::DiResult;
use crate::lifetime::{TagMap, TagStore};

pub use local::LocalCache;
pub use process::ProcessScope;
pub use sync::SyncCache;

/// Lazily populated map from a type to its single cached instance.
pub trait TypeCache: Default {
    /// Returns the cached instance of `T`, if one has been created.
    fn get<T: Send + Sync + 'static>(&self) -> Option<&T>;

    /// Returns the cached instance of `T`, creating it with `create` on the
    /// first call. A failed `create` leaves the slot empty.
    fn get_or_create<T: Send + Sync + 'static>(
        &self,
        create: impl FnOnce() -> DiResult<T>,
    ) -> DiResult<&T>;

    /// Number of ready instances.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Synchronization flavor of a container.
pub trait Storage: Sized + 'static {
    type Cache: TypeCache;
    type Tags: TagStore;
}

/// Thread-safe containers: [`SyncCache`] and a mutex-guarded registry.
pub enum Synchronized {}

impl Storage for Synchronized {
    type Cache = SyncCache;
    type Tags = Mutex<TagMap>;
}

/// Single-threaded containers: [`LocalCache`] and a `RefCell` registry.
pub enum Unsynchronized {}

impl Storage for Unsynchronized {
    type Cache = LocalCache;
    type Tags = RefCell<TagMap>;
}
