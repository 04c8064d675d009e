use crate::{any::TypeInfo, errors::ResolveErrorKind, resolver::Resolver};

/// Argument of a factory function, resolved from the scope the factory runs in
pub trait DependencyResolver: Sized {
    type Error: Into<ResolveErrorKind>;

    /// # Errors
    /// Returns the resolution error of the dependency, annotated with the type that requested it
    fn resolve(resolver: &Resolver<'_>) -> Result<Self, Self::Error>;

    #[inline]
    #[must_use]
    fn type_info() -> TypeInfo
    where
        Self: 'static,
    {
        TypeInfo::of::<Self>()
    }
}

/// Optional dependency: a missing binding of the dependency itself resolves to `None`.
/// Missing transitive dependencies still fail.
impl<Dep> DependencyResolver for Option<Dep>
where
    Dep: DependencyResolver<Error = ResolveErrorKind> + 'static,
{
    type Error = ResolveErrorKind;

    fn resolve(resolver: &Resolver<'_>) -> Result<Self, Self::Error> {
        match Dep::resolve(resolver) {
            Ok(dependency) => Ok(Some(dependency)),
            Err(err) if err.is_not_found_of(Dep::type_info()) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

macro_rules! impl_dependency_resolver {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_mut)]
        impl<$($ty,)*> DependencyResolver for ($($ty,)*)
        where
            $( $ty: DependencyResolver, )*
        {
            type Error = ResolveErrorKind;

            #[inline]
            #[allow(unused_variables)]
            fn resolve(resolver: &Resolver<'_>) -> Result<Self, Self::Error> {
                Ok(($($ty::resolve(resolver).map_err(Into::into)?,)*))
            }
        }
    };
}

all_the_tuples!(impl_dependency_resolver);
