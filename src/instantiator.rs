use std::sync::Arc;
use tracing::debug;

use crate::{
    any::{BoxedInstance, TypeInfo},
    binding::BoxedFactory,
    dependency_resolver::DependencyResolver,
    errors::{InstantiateErrorKind, ResolveErrorKind},
    resolver::Resolver,
};

/// Factory function whose arguments are resolved as dependencies
pub trait Instantiator<Deps>: Clone + 'static
where
    Deps: DependencyResolver,
{
    type Provides: 'static;
    type Error: Into<InstantiateErrorKind>;

    /// # Errors
    /// Returns the factory's own error, it is reported as a construction failure of [`Self::Provides`]
    fn instantiate(&mut self, dependencies: Deps) -> Result<Self::Provides, Self::Error>;
}

#[must_use]
pub(crate) fn boxed_instantiator_factory<Inst, Deps>(instantiator: Inst) -> BoxedFactory
where
    Inst: Instantiator<Deps> + Send + Sync,
    Inst::Provides: Send + Sync,
    Deps: DependencyResolver,
{
    Arc::new(move |resolver: &Resolver<'_>| -> Result<BoxedInstance, ResolveErrorKind> {
        let dependencies = Deps::resolve(resolver).map_err(Into::into)?;
        let dependency = instantiator
            .clone()
            .instantiate(dependencies)
            .map_err(|err| ResolveErrorKind::Construction {
                ty: TypeInfo::of::<Inst::Provides>(),
                inner: err.into(),
            })?;

        debug!("Instantiated");
        Ok(Box::new(dependency) as BoxedInstance)
    })
}

macro_rules! impl_instantiator {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Response, Err, $($ty,)*> Instantiator<($($ty,)*)> for F
        where
            F: FnMut($($ty,)*) -> Result<Response, Err> + Clone + 'static,
            Response: 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: DependencyResolver, )*
        {
            type Provides = Response;
            type Error = Err;

            fn instantiate(&mut self, ($($ty,)*): ($($ty,)*)) -> Result<Self::Provides, Self::Error> {
                self($($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_instantiator);
