//! Process-wide instance registry.

use super::{SyncCache, TypeCache};
use crate::error::DiResult;

/// Explicitly owned registry for instances shared by every container it is
/// attached to.
///
/// Construct one before composing containers, hand an `Arc<ProcessScope>`
/// to each [`ContainerBuilder`](crate::ContainerBuilder) that should share
/// it, and drop the last handle at shutdown to tear the instances down.
///
/// # Example
///
/// ```ignore
/// let process = Arc::new(ProcessScope::new());
///
/// let api = ContainerBuilder::new()
///     .process_scope(Arc::clone(&process))
///     .bind::<Metrics>().to_factory(Metrics::new).in_process_scope()
///     .build()?;
/// ```
#[derive(Default)]
pub struct ProcessScope {
    cache: SyncCache,
}

impl ProcessScope {
    pub fn new() -> Self {
        tracing::debug!("Creating process scope");
        Self::default()
    }

    /// Returns the process-wide instance of `T`, if one has been created.
    pub fn cached<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.cache.get::<T>()
    }

    /// Number of instances held by this scope.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub(crate) fn get_or_create<T: Send + Sync + 'static>(
        &self,
        create: impl FnOnce() -> DiResult<T>,
    ) -> DiResult<&T> {
        self.cache.get_or_create(create)
    }
}

impl Drop for ProcessScope {
    fn drop(&mut self) {
        tracing::debug!("Tearing down process scope with {} instance(s)", self.len());
    }
}
