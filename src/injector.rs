use core::any::Any;
use parking_lot::{const_rwlock, RwLock};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, warn};

use crate::{
    any::{BoxedInstance, TypeInfo},
    binding::Overrides,
    describe::{Args, MemberKind, ParameterDecl},
    errors::{AnalyzeErrorKind, InjectionPoint, InstantiateErrorKind, ResolveErrorKind},
    metadata::{analyze, InjectionMetadata},
    resolver::Resolver,
    types::{descriptor, is_open_definition},
};

/// Produces instances of one implementation type and injects their members.
///
/// Both operations resolve each dependency by checking `overrides` first,
/// then asking the resolver for the declared type (see [`Resolver::argument`]).
pub trait Injector: Send + Sync + 'static {
    /// # Errors
    /// Returns the resolution error of a dependency or the construction failure of the instance
    fn create_instance(&self, resolver: &Resolver<'_>, overrides: Overrides<'_>) -> Result<BoxedInstance, ResolveErrorKind>;

    /// # Errors
    /// Returns the resolution error of a dependency or the failure of a member setter
    fn inject_members(
        &self,
        instance: &mut (dyn Any + Send + Sync),
        resolver: &Resolver<'_>,
        overrides: Overrides<'_>,
    ) -> Result<(), ResolveErrorKind>;
}

/// Injector driven by the analyzed [`crate::Injectable`] description of a type
pub struct IntrospectionInjector {
    metadata: Arc<InjectionMetadata>,
}

impl IntrospectionInjector {
    #[must_use]
    pub(crate) fn new(metadata: Arc<InjectionMetadata>) -> Self {
        Self { metadata }
    }

    fn arguments(
        parameters: &[ParameterDecl],
        point: impl Fn(&'static str) -> InjectionPoint,
        resolver: &Resolver<'_>,
        overrides: Overrides<'_>,
    ) -> Result<Args, ResolveErrorKind> {
        let mut args = Args::rent(parameters.len());
        for parameter in parameters {
            args.push(resolver.parameter(parameter, point(parameter.name), overrides)?);
        }
        Ok(args)
    }
}

impl Injector for IntrospectionInjector {
    fn create_instance(&self, resolver: &Resolver<'_>, overrides: Overrides<'_>) -> Result<BoxedInstance, ResolveErrorKind> {
        let ty = self.metadata.ty;
        let constructor = &self.metadata.constructor;
        let Some(invoke) = &constructor.invoke else {
            return Err(ResolveErrorKind::Construction {
                ty,
                inner: InstantiateErrorKind::NoConstructor { ty },
            });
        };

        let mut args = Self::arguments(&constructor.parameters, InjectionPoint::ConstructorParameter, resolver, overrides)?;
        invoke(&mut args).map_err(|inner| ResolveErrorKind::Construction { ty, inner })
    }

    fn inject_members(
        &self,
        instance: &mut (dyn Any + Send + Sync),
        resolver: &Resolver<'_>,
        overrides: Overrides<'_>,
    ) -> Result<(), ResolveErrorKind> {
        let ty = self.metadata.ty;
        for member in self.metadata.members() {
            let Some(apply) = &member.apply else {
                continue;
            };

            let method = member.name;
            let mut args = match member.kind {
                MemberKind::Field => Self::arguments(&member.parameters, InjectionPoint::Field, resolver, overrides)?,
                MemberKind::Property => Self::arguments(&member.parameters, InjectionPoint::Property, resolver, overrides)?,
                MemberKind::Method => Self::arguments(
                    &member.parameters,
                    |parameter| InjectionPoint::MethodParameter { method, parameter },
                    resolver,
                    overrides,
                )?,
            };
            apply(&mut *instance, &mut args).map_err(|inner| ResolveErrorKind::Construction { ty, inner })?;
            debug!(member = member.name, declared_in = %member.declared_in, "Injected");
        }
        Ok(())
    }
}

/// Injector chosen for a type: a precompiled one when registered, the introspection one otherwise
#[derive(Clone)]
pub enum InjectorStrategy {
    Precompiled(Arc<dyn Injector>),
    Introspection(Arc<IntrospectionInjector>),
}

impl Injector for InjectorStrategy {
    #[inline]
    fn create_instance(&self, resolver: &Resolver<'_>, overrides: Overrides<'_>) -> Result<BoxedInstance, ResolveErrorKind> {
        match self {
            Self::Precompiled(injector) => injector.create_instance(resolver, overrides),
            Self::Introspection(injector) => injector.create_instance(resolver, overrides),
        }
    }

    #[inline]
    fn inject_members(
        &self,
        instance: &mut (dyn Any + Send + Sync),
        resolver: &Resolver<'_>,
        overrides: Overrides<'_>,
    ) -> Result<(), ResolveErrorKind> {
        match self {
            Self::Precompiled(injector) => injector.inject_members(instance, resolver, overrides),
            Self::Introspection(injector) => injector.inject_members(instance, resolver, overrides),
        }
    }
}

static PRECOMPILED: RwLock<BTreeMap<TypeInfo, Arc<dyn Injector>>> = const_rwlock(BTreeMap::new());
static SELECTED: RwLock<BTreeMap<TypeInfo, InjectorStrategy>> = const_rwlock(BTreeMap::new());

/// Registers a precompiled injector for `T`, preferred over introspection
pub fn register_injector<T: ?Sized + 'static>(injector: impl Injector) {
    register_injector_for(TypeInfo::of::<T>(), Arc::new(injector));
}

/// Registers a precompiled injector for `ty`.
///
/// The choice of injector is fixed when a type is first constructed or injected,
/// a registration arriving after that is ignored.
pub fn register_injector_for(ty: TypeInfo, injector: Arc<dyn Injector>) {
    if SELECTED.read().contains_key(&ty) {
        warn!(%ty, "Injector already selected, precompiled injector ignored");
        return;
    }
    PRECOMPILED.write().insert(ty, injector);
    debug!(%ty, "Precompiled injector registered");
}

/// Selects the injector of `ty` once and returns the same choice afterwards
pub(crate) fn injector_for(ty: TypeInfo) -> Result<InjectorStrategy, ResolveErrorKind> {
    if let Some(strategy) = SELECTED.read().get(&ty) {
        return Ok(strategy.clone());
    }

    let precompiled = PRECOMPILED.read().get(&ty).cloned();
    let strategy = if let Some(injector) = precompiled {
        debug!(%ty, "Precompiled injector selected");
        InjectorStrategy::Precompiled(injector)
    } else {
        if is_open_definition(ty) {
            return Err(ResolveErrorKind::OpenGeneric { ty });
        }
        let descriptor = descriptor(ty).ok_or(ResolveErrorKind::NoInjector { ty })?;
        let metadata = analyze(&descriptor)?;
        debug!(%ty, "Introspection injector selected");
        InjectorStrategy::Introspection(Arc::new(IntrospectionInjector::new(metadata)))
    };

    Ok(SELECTED.write().entry(ty).or_insert(strategy).clone())
}

/// Reports analysis errors of an introspected type ahead of its first use
pub(crate) fn validate(ty: TypeInfo) -> Result<(), AnalyzeErrorKind> {
    if PRECOMPILED.read().contains_key(&ty) {
        return Ok(());
    }
    match descriptor(ty) {
        Some(descriptor) => analyze(&descriptor).map(|_| ()),
        None => Ok(()),
    }
}
