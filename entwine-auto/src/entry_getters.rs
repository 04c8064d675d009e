use entwine::{Injector, TypeInfo};
use std::sync::Arc;

pub use entwine;
pub use linkme::{self, distributed_slice};

#[distributed_slice]
pub static __INJECTOR_GETTERS: [fn() -> (TypeInfo, Arc<dyn Injector>)];

#[distributed_slice]
pub static __TYPE_DECLARATIONS: [fn()];

/// Collects a precompiled injector for a type at link time
///
/// # Example
/// ```ignore
/// entwine_auto::precompiled!(Clock => ClockInjector);
/// ```
#[macro_export]
macro_rules! precompiled {
    ($ty:ty => $injector:expr) => {
        const _: () = {
            #[$crate::entry_getters::distributed_slice($crate::entry_getters::__INJECTOR_GETTERS)]
            #[linkme(crate = $crate::entry_getters::linkme)]
            static GETTER: fn() -> (
                $crate::entry_getters::entwine::TypeInfo,
                ::std::sync::Arc<dyn $crate::entry_getters::entwine::Injector>,
            ) = || ($crate::entry_getters::entwine::TypeInfo::of::<$ty>(), ::std::sync::Arc::new($injector));
        };
    };
}

/// Collects declarations of closed generic implementations at link time,
/// so open generic bindings can close over them
#[macro_export]
macro_rules! declare_generic {
    ($($ty:ty),+ $(,)?) => {
        $(
            const _: () = {
                #[$crate::entry_getters::distributed_slice($crate::entry_getters::__TYPE_DECLARATIONS)]
                #[linkme(crate = $crate::entry_getters::linkme)]
                static DECLARATION: fn() = || {
                    $crate::entry_getters::entwine::declare::<$ty>();
                };
            };
        )+
    };
}
