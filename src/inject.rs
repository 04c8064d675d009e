use std::sync::Arc;

use crate::{any::TypeInfo, dependency_resolver::DependencyResolver, errors::ResolveErrorKind, resolver::Resolver};

/// Single dependency, resolved with the lifetime of its binding
pub struct Inject<Dep: ?Sized>(pub Arc<Dep>);

impl<Dep: ?Sized + Send + Sync + 'static> DependencyResolver for Inject<Dep> {
    type Error = ResolveErrorKind;

    fn resolve(resolver: &Resolver<'_>) -> Result<Self, Self::Error> {
        resolver.resolve().map(Self)
    }

    fn type_info() -> TypeInfo {
        TypeInfo::of::<Dep>()
    }
}

/// Every binding of a contract, in registration order
pub struct InjectAll<Dep: ?Sized>(pub Vec<Arc<Dep>>);

impl<Dep: ?Sized + Send + Sync + 'static> DependencyResolver for InjectAll<Dep> {
    type Error = ResolveErrorKind;

    fn resolve(resolver: &Resolver<'_>) -> Result<Self, Self::Error> {
        resolver.resolve_collection().map(Self)
    }

    fn type_info() -> TypeInfo {
        TypeInfo::of::<Dep>()
    }
}
