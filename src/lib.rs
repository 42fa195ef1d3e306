//! Wiring - Compile-time verified dependency injection
//!
//! A container resolves a requested type by building it (or handing out a
//! previously built instance), recursively resolving the type's own
//! dependencies. Wiring is declared with typed factories and
//! `#[derive(Injectable)]`; nothing is discovered by reflection.
//!
//! ```ignore
//! use std::sync::Arc;
//! use wiring::prelude::*;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, message: &str);
//! }
//! wiring::injectable!(dyn Logger);
//!
//! #[derive(Injectable)]
//! struct Service {
//!     logger: Arc<dyn Logger>,
//! }
//!
//! let root = ContainerBuilder::new()
//!     .bind::<Arc<dyn Logger>>().to::<ConsoleLogger>().in_singleton_scope()
//!     .build()?;
//! let child = ContainerBuilder::child_of(&root).build()?;
//!
//! let service: Service = child.resolve()?;
//! ```

// Lets `#[derive(Injectable)]` refer to `::wiring` inside this crate.
extern crate self as wiring;

pub mod binding;
pub mod builder;
pub mod cache;
pub mod canonical;
pub mod config;
pub mod container;
pub mod delegation;
pub mod dispatch;
pub mod error;
pub mod lifetime;
mod macros;
pub mod resolve;

pub use binding::{Binding, BindingKind};
pub use builder::{BindingBuilder, ContainerBuilder};
pub use cache::{ProcessScope, Storage, Synchronized, Unsynchronized};
pub use canonical::{Canonical, Canonicalize, TypeKey};
pub use config::{ConfigError, ContainerConfig};
pub use container::Container;
pub use dispatch::{Candidate, Dependency, Factory, MAX_ARITY};
pub use error::{DiError, DiResult};
pub use lifetime::{CaptivePolicy, LifetimeTag, Scope};
pub use resolve::{Injectable, Resolve, Substitute, Upcast};

pub use di_macros::Injectable;

/// Everything needed to compose and use a container.
pub mod prelude {
    pub use crate::{
        injectable, CaptivePolicy, Container, ContainerBuilder, ContainerConfig, DiError,
        DiResult, Injectable, LifetimeTag, ProcessScope, Scope,
    };
}
