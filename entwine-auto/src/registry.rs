use entwine::{register_injector_for, RegistryBuilder};
use std::sync::Once;
use tracing::debug;

use crate::entry_getters::{__INJECTOR_GETTERS, __TYPE_DECLARATIONS};

static INSTALL: Once = Once::new();

/// Registers every collected injector and declaration, once per process
pub fn install() {
    INSTALL.call_once(|| {
        for declare in __TYPE_DECLARATIONS.iter() {
            declare();
        }
        for getter in __INJECTOR_GETTERS.iter() {
            let (ty, injector) = getter();
            register_injector_for(ty, injector);
        }
        debug!(
            injectors = __INJECTOR_GETTERS.len(),
            declarations = __TYPE_DECLARATIONS.len(),
            "Auto injectors installed"
        );
    });
}

pub trait AutoInjectors {
    #[must_use]
    fn provide_auto_injectors(self) -> Self;
}

impl AutoInjectors for RegistryBuilder {
    #[inline]
    fn provide_auto_injectors(self) -> Self {
        install();
        self
    }
}
