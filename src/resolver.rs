use core::cell::RefCell;
use std::sync::Arc;
use tracing::debug;

use crate::{
    any::{Erased, Instance, LookupKey, TypeInfo},
    binding::{Binding, Overrides, ParameterOverride, Provider},
    describe::{Cardinality, ParameterDecl, Slot},
    errors::{DependencyPath, Hop, InjectionPoint, ResolveErrorKind},
    injector::{injector_for, Injector as _},
    lifetime::Lifetime,
    pool::{BufferPool, Rented},
    registry::Candidate,
    scope::ScopeInner,
    types::is_open_definition,
};

struct Frame {
    ty: TypeInfo,
    via: InjectionPoint,
}

static FRAMES: BufferPool<Frame> = BufferPool::new(32);
static STAGED: BufferPool<Erased> = BufferPool::new(32);

/// Implementation types under construction in one resolve call, outermost first
pub(crate) struct Chain {
    frames: RefCell<Rented<Frame>>,
    max_depth: usize,
}

impl Chain {
    #[must_use]
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            frames: RefCell::new(FRAMES.rent(8)),
            max_depth,
        }
    }

    /// Pushes `ty`, reached through `via`, for as long as the returned guard lives
    pub(crate) fn enter(&self, ty: TypeInfo, via: InjectionPoint) -> Result<FrameGuard<'_>, ResolveErrorKind> {
        let mut frames = self.frames.borrow_mut();

        if let Some(start) = frames.iter().position(|frame| frame.ty == ty) {
            let hops = (start..frames.len())
                .map(|index| match frames.get(index + 1) {
                    Some(next) => Hop {
                        from: frames[index].ty,
                        via: next.via,
                        to: next.ty,
                    },
                    None => Hop {
                        from: frames[index].ty,
                        via,
                        to: ty,
                    },
                })
                .collect();
            return Err(ResolveErrorKind::Circular {
                path: DependencyPath(hops),
            });
        }
        if frames.len() >= self.max_depth {
            return Err(ResolveErrorKind::DepthExceeded(self.max_depth));
        }

        frames.push(Frame { ty, via });
        Ok(FrameGuard { chain: self })
    }
}

pub(crate) struct FrameGuard<'a> {
    chain: &'a Chain,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.chain.frames.borrow_mut().pop();
    }
}

/// View of a scope handed to factories and injectors while they construct one instance.
///
/// Dependencies resolved through it are looked up from the scope the instance belongs to,
/// and their errors are annotated with the type being constructed.
pub struct Resolver<'a> {
    scope: &'a Arc<ScopeInner>,
    chain: &'a Chain,
    via: InjectionPoint,
    owner: Option<TypeInfo>,
}

impl<'a> Resolver<'a> {
    #[inline]
    #[must_use]
    pub(crate) fn new(scope: &'a Arc<ScopeInner>, chain: &'a Chain) -> Self {
        Self {
            scope,
            chain,
            via: InjectionPoint::Request,
            owner: None,
        }
    }

    #[inline]
    fn pointed(&self, via: InjectionPoint) -> Self {
        Self {
            scope: self.scope,
            chain: self.chain,
            via,
            owner: self.owner,
        }
    }

    fn annotate(&self, point: InjectionPoint, err: ResolveErrorKind) -> ResolveErrorKind {
        match self.owner {
            Some(owner) => ResolveErrorKind::Dependency {
                owner,
                point,
                inner: Box::new(err),
            },
            None => err,
        }
    }

    /// Resolves contract `T` with the lifetime of its binding
    ///
    /// # Errors
    /// Returns the resolution error, annotated with the type being constructed
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        self.request(TypeInfo::of::<T>(), None, &[])
            .and_then(downcast::<T>)
            .map_err(|err| self.annotate(self.via, err))
    }

    /// Resolves the binding of contract `T` registered under `key`
    ///
    /// # Errors
    /// Returns the resolution error, annotated with the type being constructed
    pub fn resolve_keyed<T: ?Sized + Send + Sync + 'static>(&self, key: &LookupKey) -> Result<Arc<T>, ResolveErrorKind> {
        self.request(TypeInfo::of::<T>(), Some(key), &[])
            .and_then(downcast::<T>)
            .map_err(|err| self.annotate(self.via, err))
    }

    /// Resolves every binding of contract `T`, in registration order.
    /// A contract without bindings resolves to an empty collection.
    ///
    /// # Errors
    /// Returns the first resolution error of an element, annotated with the type being constructed
    pub fn resolve_collection<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        let mut staged = STAGED.rent(4);
        self.many(TypeInfo::of::<T>(), &mut staged)
            .map_err(|err| self.annotate(self.via, err))?;
        staged.drain(..).map(downcast::<T>).collect()
    }

    /// Resolves the argument of type `T` injected through `point`, taking matching `overrides` first
    ///
    /// # Errors
    /// Returns the resolution error, annotated with the type being constructed and `point`
    pub fn argument<T: ?Sized + Send + Sync + 'static>(&self, point: InjectionPoint, overrides: Overrides<'_>) -> Result<Arc<T>, ResolveErrorKind> {
        let ty = TypeInfo::of::<T>();
        let pointed = self.pointed(point);
        let erased = match overrides.find(ty, point.name()) {
            Some(parameter) => (parameter.value)(&pointed),
            None => pointed.request(ty, None, &[]),
        };
        erased.and_then(downcast::<T>).map_err(|err| self.annotate(point, err))
    }

    /// Keyed counterpart of [`Resolver::argument`]
    ///
    /// # Errors
    /// Returns the resolution error, annotated with the type being constructed and `point`
    pub fn keyed_argument<T: ?Sized + Send + Sync + 'static>(
        &self,
        point: InjectionPoint,
        key: &LookupKey,
        overrides: Overrides<'_>,
    ) -> Result<Arc<T>, ResolveErrorKind> {
        let ty = TypeInfo::of::<T>();
        let pointed = self.pointed(point);
        let erased = match overrides.find(ty, point.name()) {
            Some(parameter) => (parameter.value)(&pointed),
            None => pointed.request(ty, Some(key), &[]),
        };
        erased.and_then(downcast::<T>).map_err(|err| self.annotate(point, err))
    }

    /// Collection counterpart of [`Resolver::argument`]
    ///
    /// # Errors
    /// Returns the first resolution error of an element, annotated with the type being constructed and `point`
    pub fn collection_argument<T: ?Sized + Send + Sync + 'static>(&self, point: InjectionPoint) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        self.pointed(point).resolve_collection()
    }

    /// Resolves one declared parameter into its argument slot
    pub(crate) fn parameter(&self, parameter: &ParameterDecl, point: InjectionPoint, overrides: Overrides<'_>) -> Result<Slot, ResolveErrorKind> {
        let pointed = self.pointed(point);
        let slot = match overrides.find(parameter.ty, point.name()) {
            Some(found) => (found.value)(&pointed).map(Slot::One),
            None => match parameter.cardinality {
                Cardinality::One => pointed.request(parameter.ty, parameter.key.as_ref(), &[]).map(Slot::One),
                Cardinality::Many => {
                    let mut values = Vec::new();
                    pointed.many(parameter.ty, &mut values).map(|()| Slot::Many(values))
                }
            },
        };
        slot.map_err(|err| self.annotate(point, err))
    }

    /// Resolves `contract` into its erased view
    pub(crate) fn request(&self, contract: TypeInfo, key: Option<&LookupKey>, overrides: &[ParameterOverride]) -> Result<Erased, ResolveErrorKind> {
        let Some((owner, candidate)) = self.scope.find(contract, key)? else {
            return Err(match key {
                Some(key) => ResolveErrorKind::NotFoundWithKey { ty: contract, key: key.clone() },
                None if is_open_definition(contract) => ResolveErrorKind::OpenGeneric { ty: contract },
                None => ResolveErrorKind::NotFound { ty: contract },
            });
        };
        self.produce(&owner, &candidate, contract, overrides)
    }

    fn many(&self, contract: TypeInfo, values: &mut Vec<Erased>) -> Result<(), ResolveErrorKind> {
        let mut candidates = crate::registry::CANDIDATES.rent(4);
        let Some(owner) = self.scope.collection(contract, &mut candidates)? else {
            debug!(%contract, "Empty collection");
            return Ok(());
        };
        for candidate in candidates.iter() {
            values.push(self.produce(&owner, candidate, contract, &[])?);
        }
        Ok(())
    }

    /// Instance of `candidate` honoring its lifetime. `owner` is the scope whose registry holds the binding.
    fn produce(&self, owner: &Arc<ScopeInner>, candidate: &Candidate, contract: TypeInfo, overrides: &[ParameterOverride]) -> Result<Erased, ResolveErrorKind> {
        let binding = &candidate.binding;
        let instance = match (&binding.provider, binding.lifetime) {
            (Provider::Instance(instance), _) => instance.clone(),
            (_, Lifetime::Transient) => self.create(self.scope, binding, overrides)?,
            (_, Lifetime::Scoped) => self.scope.get_or_create(binding, || self.create(self.scope, binding, overrides))?,
            (_, Lifetime::Singleton) => owner.get_or_create(binding, || self.create(owner, binding, overrides))?,
        };
        (candidate.cast)(instance).ok_or(ResolveErrorKind::IncorrectType { expected: contract })
    }

    /// Constructs a new instance of `binding`, resolving its dependencies from `scope`
    fn create(&self, scope: &Arc<ScopeInner>, binding: &Binding, overrides: &[ParameterOverride]) -> Result<Instance, ResolveErrorKind> {
        let ty = binding.implementation;
        let _frame = self.chain.enter(ty, self.via)?;
        let resolver = Resolver {
            scope,
            chain: self.chain,
            via: InjectionPoint::Factory,
            owner: Some(ty),
        };
        let overrides = Overrides::new(overrides, &binding.overrides);

        let instance = match &binding.provider {
            Provider::Instance(instance) => return Ok(instance.clone()),
            Provider::Factory(factory) => factory(&resolver)?,
            Provider::Injector => {
                let injector = injector_for(ty)?;
                let mut instance = injector.create_instance(&resolver, overrides)?;
                injector.inject_members(&mut *instance, &resolver, overrides)?;
                instance
            }
        };
        debug!(implementation = %ty, lifetime = %binding.lifetime, "Created");

        Ok(Instance::from(instance))
    }

    /// Injects the members of an instance created outside the container
    pub(crate) fn inject_into(&self, ty: TypeInfo, instance: &mut (dyn core::any::Any + Send + Sync)) -> Result<(), ResolveErrorKind> {
        let _frame = self.chain.enter(ty, self.via)?;
        let resolver = Resolver {
            scope: self.scope,
            chain: self.chain,
            via: InjectionPoint::Request,
            owner: Some(ty),
        };
        injector_for(ty)?.inject_members(instance, &resolver, Overrides::default())
    }
}

#[inline]
fn downcast<T: ?Sized + 'static>(erased: Erased) -> Result<Arc<T>, ResolveErrorKind> {
    erased
        .downcast::<Arc<T>>()
        .map(|value| *value)
        .map_err(|_| ResolveErrorKind::IncorrectType {
            expected: TypeInfo::of::<T>(),
        })
}

#[cfg(test)]
mod tests {
    use super::Chain;
    use crate::{
        any::TypeInfo,
        errors::{InjectionPoint, ResolveErrorKind},
    };

    struct A;
    struct B;
    struct C;

    #[test]
    fn test_chain_reports_cycle_hops() {
        let chain = Chain::new(16);
        let _a = chain.enter(TypeInfo::of::<A>(), InjectionPoint::Request).unwrap();
        let _b = chain.enter(TypeInfo::of::<B>(), InjectionPoint::ConstructorParameter("b")).unwrap();
        let _c = chain.enter(TypeInfo::of::<C>(), InjectionPoint::Field("c")).unwrap();

        let Err(ResolveErrorKind::Circular { path }) = chain.enter(TypeInfo::of::<B>(), InjectionPoint::Property("b")) else {
            panic!("cycle not detected");
        };
        let hops = path.hops();
        assert_eq!(hops.len(), 2);
        assert_eq!(hops[0].from, TypeInfo::of::<B>());
        assert_eq!(hops[0].via, InjectionPoint::Field("c"));
        assert_eq!(hops[1].to, TypeInfo::of::<B>());
        assert_eq!(hops[1].via, InjectionPoint::Property("b"));
    }

    #[test]
    fn test_chain_pops_on_drop() {
        let chain = Chain::new(2);
        {
            let _a = chain.enter(TypeInfo::of::<A>(), InjectionPoint::Request).unwrap();
            let _b = chain.enter(TypeInfo::of::<B>(), InjectionPoint::Factory).unwrap();
            assert!(matches!(
                chain.enter(TypeInfo::of::<C>(), InjectionPoint::Factory),
                Err(ResolveErrorKind::DepthExceeded(2))
            ));
        }
        assert!(chain.enter(TypeInfo::of::<A>(), InjectionPoint::Request).is_ok());
    }
}
