//! Declarative registration of bound-only types.

/// Makes types resolvable without autowiring them.
///
/// Types declared this way can only be built through a binding, typically a
/// fixed instance or a factory. Trait objects are declared with the `dyn`
/// form, which also lets any implementor be bound with
/// [`to`](crate::BindingBuilder::to):
///
/// ```ignore
/// trait Logger: Send + Sync {
///     fn log(&self, message: &str);
/// }
///
/// wiring::injectable!(dyn Logger);
/// wiring::injectable!(Settings, Endpoint);
///
/// let container = ContainerBuilder::new()
///     .bind::<Arc<dyn Logger>>().to::<ConsoleLogger>().in_singleton_scope()
///     .bind::<Settings>().to_instance(Settings::default())
///     .build()?;
/// ```
///
/// The trait must have `Send + Sync` among its supertraits, or the bounds
/// must be spelled out: `injectable!(dyn Logger + Send + Sync)`.
#[macro_export]
macro_rules! injectable {
    (dyn $($bound:tt)+) => {
        impl $crate::Canonicalize for dyn $($bound)+ {
            type Canonical = Self;
        }

        impl $crate::Injectable for dyn $($bound)+ {}

        impl<__Impl> $crate::Upcast<__Impl> for dyn $($bound)+
        where
            __Impl: $($bound)+ + 'static,
        {
            fn upcast_box(value: ::std::boxed::Box<__Impl>) -> ::std::boxed::Box<Self> {
                value
            }

            fn upcast_arc(value: ::std::sync::Arc<__Impl>) -> ::std::sync::Arc<Self> {
                value
            }
        }
    };
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Canonicalize for $ty {
                type Canonical = Self;
            }

            impl $crate::Injectable for $ty {}

            impl<'c> $crate::Resolve<'c> for $ty {
                fn dependency() -> $crate::Dependency {
                    $crate::Dependency::value::<Self>()
                }

                fn resolve<S: $crate::Storage>(
                    container: &'c $crate::Container<'_, S>,
                ) -> $crate::DiResult<Self> {
                    container.resolve_value::<Self>()
                }
            }
        )+
    };
}
