use std::sync::Arc;
use tracing::warn;

use crate::any::{Instance, TypeInfo};

/// Called when a scope disposes an instance it cached
pub trait Finalizer<Dep>: Send + Sync + 'static {
    fn finalize(&self, dependency: Arc<Dep>);
}

impl<F, Dep> Finalizer<Dep> for F
where
    F: Fn(Arc<Dep>) + Send + Sync + 'static,
{
    #[inline]
    fn finalize(&self, dependency: Arc<Dep>) {
        self(dependency);
    }
}

/// Disposal capability of a type
pub trait Dispose {
    fn dispose(&self);
}

pub(crate) type BoxedFinalizer = Arc<dyn Fn(Instance) + Send + Sync>;

#[must_use]
pub(crate) fn boxed_finalizer_factory<Dep, Fin>(finalizer: Fin) -> BoxedFinalizer
where
    Dep: Send + Sync + 'static,
    Fin: Finalizer<Dep>,
{
    Arc::new(move |dependency: Instance| match dependency.downcast::<Dep>() {
        Ok(dependency) => finalizer.finalize(dependency),
        Err(_) => warn!(expected = %TypeInfo::of::<Dep>(), "Finalizer skipped, instance has another type"),
    })
}

#[must_use]
pub(crate) fn dispose_finalizer<Dep: Dispose + Send + Sync + 'static>() -> BoxedFinalizer {
    boxed_finalizer_factory::<Dep, _>(|dependency: Arc<Dep>| dependency.dispose())
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Arc;
    use tracing_test::traced_test;

    use super::{boxed_finalizer_factory, dispose_finalizer, Dispose};
    use crate::any::Instance;

    struct Connection(AtomicU8);

    impl Dispose for Connection {
        fn dispose(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    #[traced_test]
    fn test_dispose_finalizer() {
        let connection = Arc::new(Connection(AtomicU8::new(0)));
        let finalizer = dispose_finalizer::<Connection>();

        finalizer(connection.clone() as Instance);
        assert_eq!(connection.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_finalizer_wrong_type() {
        let finalizer = boxed_finalizer_factory::<u8, _>(|_: Arc<u8>| panic!("must not be called"));

        finalizer(Arc::new(1u16) as Instance);
        assert!(logs_contain("Finalizer skipped"));
    }
}
