//! Compile-time dependency injection macros for wiring.
//!
//! This crate provides `#[derive(Injectable)]`, which makes a type
//! resolvable from a `wiring::Container` without a binding.
//!
//! Generated code refers to the container crate as `::wiring`; use
//! `#[injectable(crate = "path")]` when it is re-exported under another name.

use proc_macro::TokenStream;

mod injectable;

/// Derive macro for types the container can build on its own.
///
/// By default the struct is built from its fields: each field is resolved
/// from the container in the shape it is declared with (`T` and `Box<T>`
/// are fresh instances, `Arc<T>` and `Weak<T>` are shared). Fields marked
/// `#[inject(default)]` are filled with `Default::default()` instead.
///
/// # Requirements
///
/// - The type must not be generic
/// - The type must be `Send + Sync + 'static`
/// - Every injected field must be resolvable (derived, bound, or declared
///   with `injectable!`)
///
/// # Example
///
/// ```ignore
/// use wiring::Injectable;
///
/// #[derive(Injectable)]
/// pub struct OrderService {
///     repository: Arc<OrderRepository>,   // shared
///     clock: Box<dyn Clock>,              // fresh per service
///     #[inject(default)]
///     retries: u32,
/// }
/// ```
///
/// # Named Constructors
///
/// Associated functions can be offered instead of the fields. The container
/// picks the one with the fewest parameters whose parameters it can resolve:
///
/// ```ignore
/// #[derive(Injectable)]
/// #[injectable(constructors(new, with_pool), try_constructors(connect))]
/// pub struct Database { /* ... */ }
///
/// impl Database {
///     fn new(settings: Arc<Settings>) -> Self { /* ... */ }
///     fn with_pool(settings: Arc<Settings>, pool: Arc<Pool>) -> Self { /* ... */ }
///     fn connect(url: DatabaseUrl) -> Result<Self, ConnectError> { /* ... */ }
/// }
/// ```
#[proc_macro_derive(Injectable, attributes(injectable, inject))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    injectable::derive_injectable_impl(input)
}
