use core::{
    fmt::Debug,
    marker::PhantomData,
    sync::atomic::{AtomicU64, Ordering},
};
use std::sync::Arc;

use crate::{
    any::{BoxedInstance, Erased, Instance, LookupKey, TypeInfo},
    dependency_resolver::DependencyResolver,
    describe::{ContractCast, Injectable},
    errors::ResolveErrorKind,
    finalizer::{boxed_finalizer_factory, dispose_finalizer, BoxedFinalizer, Dispose, Finalizer},
    instantiator::{boxed_instantiator_factory, Instantiator},
    lifetime::Lifetime,
    resolver::Resolver,
    types::declare,
};

/// Identity of a binding, the key of scope instance caches
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BindingId(u64);

static NEXT_BINDING_ID: AtomicU64 = AtomicU64::new(0);

impl BindingId {
    #[must_use]
    pub(crate) fn next() -> Self {
        Self(NEXT_BINDING_ID.fetch_add(1, Ordering::Relaxed))
    }
}

pub(crate) type BoxedFactory = Arc<dyn Fn(&Resolver<'_>) -> Result<BoxedInstance, ResolveErrorKind> + Send + Sync>;

/// How a binding produces its instance
#[derive(Clone)]
pub(crate) enum Provider {
    /// Pre-existing instance, never disposed by the container
    Instance(Instance),
    Factory(BoxedFactory),
    /// Injector selected for the implementation type
    Injector,
}

/// Immutable record mapping contracts to an implementation and a lifetime
pub struct Binding {
    pub(crate) id: BindingId,
    pub(crate) implementation: TypeInfo,
    pub(crate) contracts: Vec<ContractCast>,
    pub(crate) lifetime: Lifetime,
    pub(crate) overrides: Vec<ParameterOverride>,
    pub(crate) key: Option<LookupKey>,
    pub(crate) provider: Provider,
    pub(crate) finalizer: Option<BoxedFinalizer>,
}

impl Binding {
    #[inline]
    #[must_use]
    pub fn id(&self) -> BindingId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn implementation(&self) -> TypeInfo {
        self.implementation
    }

    #[inline]
    #[must_use]
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    #[must_use]
    pub fn contracts(&self) -> Vec<TypeInfo> {
        self.contracts.iter().map(|cast| cast.ty).collect()
    }
}

pub(crate) type OverrideValue = Arc<dyn Fn(&Resolver<'_>) -> Result<Erased, ResolveErrorKind> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OverrideMatch {
    Type(TypeInfo),
    Name(&'static str),
}

/// Explicit value for a constructor or method parameter, matched by declared type or by name
#[derive(Clone)]
pub struct ParameterOverride {
    pub(crate) matcher: OverrideMatch,
    pub(crate) value: OverrideValue,
}

impl ParameterOverride {
    fn literal<T: ?Sized + Send + Sync + 'static>(matcher: OverrideMatch, value: Arc<T>) -> Self {
        Self {
            matcher,
            value: Arc::new(move |_: &Resolver<'_>| -> Result<Erased, ResolveErrorKind> { Ok(Box::new(value.clone()) as Erased) }),
        }
    }

    fn lazy<T, F>(matcher: OverrideMatch, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<T>, ResolveErrorKind> + Send + Sync + 'static,
    {
        Self {
            matcher,
            value: Arc::new(move |resolver: &Resolver<'_>| factory(resolver).map(|value| Box::new(value) as Erased)),
        }
    }

    /// Value for every parameter declared as `T`
    #[must_use]
    pub fn typed<T: ?Sized + Send + Sync + 'static>(value: impl Into<Arc<T>>) -> Self {
        Self::literal(OverrideMatch::Type(TypeInfo::of::<T>()), value.into())
    }

    /// Value for the parameter called `name`. Its declared type must be `T`.
    #[must_use]
    pub fn named<T: ?Sized + Send + Sync + 'static>(name: &'static str, value: impl Into<Arc<T>>) -> Self {
        Self::literal(OverrideMatch::Name(name), value.into())
    }

    /// Value for every parameter declared as `T`, produced on each use
    #[must_use]
    pub fn typed_lazy<T, F>(factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<T>, ResolveErrorKind> + Send + Sync + 'static,
    {
        Self::lazy(OverrideMatch::Type(TypeInfo::of::<T>()), factory)
    }

    /// Value for the parameter called `name`, produced on each use
    #[must_use]
    pub fn named_lazy<T, F>(name: &'static str, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<T>, ResolveErrorKind> + Send + Sync + 'static,
    {
        Self::lazy(OverrideMatch::Name(name), factory)
    }
}

/// Overrides visible to one construction: the ones passed to the resolve call, then the binding's own
#[derive(Clone, Copy, Default)]
pub struct Overrides<'a> {
    call: &'a [ParameterOverride],
    binding: &'a [ParameterOverride],
}

impl<'a> Overrides<'a> {
    #[inline]
    #[must_use]
    pub(crate) fn new(call: &'a [ParameterOverride], binding: &'a [ParameterOverride]) -> Self {
        Self { call, binding }
    }

    /// First override matching by type, else the first matching by name
    #[must_use]
    pub(crate) fn find(&self, ty: TypeInfo, name: Option<&str>) -> Option<&'a ParameterOverride> {
        let all = || self.call.iter().chain(self.binding);
        all()
            .find(|parameter| parameter.matcher == OverrideMatch::Type(ty))
            .or_else(|| {
                let name = name?;
                all().find(|parameter| matches!(parameter.matcher, OverrideMatch::Name(candidate) if candidate == name))
            })
    }
}

/// Builder of one binding of implementation `T`, see [`bind`], [`bind_factory`] and [`bind_instance`]
#[must_use]
pub struct BindingBuilder<T> {
    binding: Binding,
    identity: ContractCast,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> BindingBuilder<T> {
    fn new(lifetime: Lifetime, provider: Provider, finalizer: Option<BoxedFinalizer>) -> Self {
        Self {
            binding: Binding {
                id: BindingId::next(),
                implementation: TypeInfo::of::<T>(),
                contracts: Vec::new(),
                lifetime,
                overrides: Vec::new(),
                key: None,
                provider,
                finalizer,
            },
            identity: ContractCast::identity::<T>(),
            _marker: PhantomData,
        }
    }

    /// Adds contract `C`. Without any contract the implementation type is the only one.
    pub fn as_contract<C>(mut self, cast: fn(Arc<T>) -> Arc<C>) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.binding.contracts.push(ContractCast::new(cast));
        self
    }

    /// Adds the implementation type itself as a contract
    pub fn as_self(mut self) -> Self {
        self.binding.contracts.push(self.identity.clone());
        self
    }

    /// Registers the binding under `key`, for keyed lookups
    pub fn keyed<K>(mut self, key: K) -> Self
    where
        K: PartialEq + Debug + Send + Sync + 'static,
    {
        self.binding.key = Some(LookupKey::new(key));
        self
    }

    pub fn with_parameter(mut self, parameter: ParameterOverride) -> Self {
        self.binding.overrides.push(parameter);
        self
    }

    /// Replaces the finalizer called when a scope disposes the cached instance
    pub fn finalizer(mut self, finalizer: impl Finalizer<T>) -> Self {
        self.binding.finalizer = Some(boxed_finalizer_factory::<T, _>(finalizer));
        self
    }

    /// Finalizes cached instances with [`Dispose::dispose`]
    pub fn disposable(mut self) -> Self
    where
        T: Dispose,
    {
        self.binding.finalizer = Some(dispose_finalizer::<T>());
        self
    }
}

impl<T> From<BindingBuilder<T>> for Binding {
    fn from(builder: BindingBuilder<T>) -> Self {
        let BindingBuilder {
            mut binding, identity, ..
        } = builder;
        if binding.contracts.is_empty() {
            binding.contracts.push(identity);
        }
        binding
    }
}

/// Binds implementation `T`, constructed by the injector selected for it
pub fn bind<T: Injectable>(lifetime: Lifetime) -> BindingBuilder<T> {
    let descriptor = declare::<T>();
    BindingBuilder::new(lifetime, Provider::Injector, descriptor.finalizer.clone())
}

/// Binds the value produced by `instantiator`, whose arguments are resolved as dependencies
pub fn bind_factory<Inst, Deps>(lifetime: Lifetime, instantiator: Inst) -> BindingBuilder<Inst::Provides>
where
    Inst: Instantiator<Deps> + Send + Sync,
    Inst::Provides: Send + Sync,
    Deps: DependencyResolver,
{
    BindingBuilder::new(lifetime, Provider::Factory(boxed_instantiator_factory(instantiator)), None)
}

/// Binds a pre-existing value. It is shared by every scope and never finalized by the container.
pub fn bind_instance<T: Send + Sync + 'static>(value: T) -> BindingBuilder<T> {
    bind_arc(Arc::new(value))
}

/// Binds a pre-existing shared value. It is never finalized by the container.
pub fn bind_arc<T: Send + Sync + 'static>(value: Arc<T>) -> BindingBuilder<T> {
    BindingBuilder::new(Lifetime::Singleton, Provider::Instance(value), None)
}
