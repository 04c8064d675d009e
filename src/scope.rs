use core::{
    any::type_name,
    sync::atomic::{AtomicBool, Ordering},
};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info_span};

use crate::{
    any::{Instance, LookupKey, TypeInfo},
    binding::{Binding, ParameterOverride},
    cache::{Cache, Resolved},
    config::Config,
    describe::Injectable,
    errors::{BuildErrorKind, ResolveErrorKind},
    lock::CreationLock,
    registry::{Candidate, Registry, RegistryBuilder},
    resolver::{Chain, Resolver},
    types::declare,
};

pub(crate) struct ScopeInner {
    registry: Registry,
    cache: Mutex<Cache>,
    creation: CreationLock,
    parent: Option<Weak<ScopeInner>>,
    children: Mutex<Vec<Weak<ScopeInner>>>,
    disposed: AtomicBool,
    config: Config,
    depth: usize,
}

impl ScopeInner {
    fn new(registry: Registry, parent: Option<Weak<ScopeInner>>, config: Config, depth: usize) -> Self {
        Self {
            registry,
            cache: Mutex::new(Cache::new()),
            creation: CreationLock::new(),
            parent,
            children: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
            config,
            depth,
        }
    }

    #[inline]
    fn ensure_open(&self) -> Result<(), ResolveErrorKind> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(ResolveErrorKind::Disposed);
        }
        Ok(())
    }

    fn parent(&self) -> Result<Option<Arc<ScopeInner>>, ResolveErrorKind> {
        match &self.parent {
            Some(parent) => parent.upgrade().map(Some).ok_or(ResolveErrorKind::Disposed),
            None => Ok(None),
        }
    }

    /// Nearest binding of `contract` from this scope up to the root, with the scope holding it
    pub(crate) fn find(self: &Arc<Self>, contract: TypeInfo, key: Option<&LookupKey>) -> Result<Option<(Arc<ScopeInner>, Candidate)>, ResolveErrorKind> {
        let mut current = self.clone();
        loop {
            current.ensure_open()?;
            if let Some(candidate) = current.registry.lookup(contract, key)? {
                return Ok(Some((current, candidate)));
            }
            match current.parent()? {
                Some(parent) => current = parent,
                None => return Ok(None),
            }
        }
    }

    /// Fills `candidates` with the bindings of `contract` from the nearest scope that has any,
    /// and returns that scope
    pub(crate) fn collection(self: &Arc<Self>, contract: TypeInfo, candidates: &mut Vec<Candidate>) -> Result<Option<Arc<ScopeInner>>, ResolveErrorKind> {
        let mut current = self.clone();
        loop {
            current.ensure_open()?;
            if current.registry.collection(contract, candidates)? {
                return Ok(Some(current));
            }
            match current.parent()? {
                Some(parent) => current = parent,
                None => return Ok(None),
            }
        }
    }

    /// Cached instance of `binding`, created at most once per scope
    pub(crate) fn get_or_create(&self, binding: &Binding, create: impl FnOnce() -> Result<Instance, ResolveErrorKind>) -> Result<Instance, ResolveErrorKind> {
        if let Some(instance) = self.cache.lock().get(binding.id) {
            debug!(implementation = %binding.implementation, "Found in cache");
            return Ok(instance);
        }

        let _creation = self.creation.lock();
        if let Some(instance) = self.cache.lock().get(binding.id) {
            debug!(implementation = %binding.implementation, "Found in cache after wait");
            return Ok(instance);
        }

        self.ensure_open()?;
        let instance = create()?;

        let mut cache = self.cache.lock();
        cache.insert(binding.id, instance.clone());
        debug!(implementation = %binding.implementation, depth = self.depth, "Cached");

        if let Some(finalizer) = &binding.finalizer {
            cache.push_resolved(Resolved {
                binding: binding.id,
                dependency: instance.clone(),
                finalizer: finalizer.clone(),
            });
            debug!(implementation = %binding.implementation, "Pushed to resolved set");
        }

        Ok(instance)
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let span = info_span!("dispose", depth = self.depth);
        let _guard = span.enter();

        let children = core::mem::take(&mut *self.children.lock());
        for child in children.iter().rev().filter_map(Weak::upgrade) {
            child.dispose();
        }

        let _creation = self.creation.lock();
        let mut resolved = self.cache.lock().take_resolved_set();
        while let Some(Resolved {
            binding,
            dependency,
            finalizer,
        }) = resolved.0.pop_back()
        {
            finalizer(dependency);
            debug!(?binding, "Finalizer called");
        }
        self.cache.lock().clear();

        debug!("Disposed");
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Resolution context: a registry plus the instances cached for it.
///
/// Child scopes see the bindings of their ancestors and can add their own.
/// Singletons are cached in the scope whose registry holds the binding, scoped instances in the
/// scope they are requested from. Cloning a scope shares it.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    #[must_use]
    pub(crate) fn root(registry: Registry, config: Config) -> Self {
        Self {
            inner: Arc::new(ScopeInner::new(registry, None, config, 0)),
        }
    }

    fn resolve_inner<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: Option<&LookupKey>,
        overrides: &[ParameterOverride],
    ) -> Result<Arc<T>, ResolveErrorKind> {
        self.inner.ensure_open()?;

        let chain = Chain::new(self.inner.config.max_depth);
        let erased = Resolver::new(&self.inner, &chain).request(TypeInfo::of::<T>(), key, overrides)?;
        erased.downcast::<Arc<T>>().map(|value| *value).map_err(|_| ResolveErrorKind::IncorrectType {
            expected: TypeInfo::of::<T>(),
        })
    }

    /// Resolves contract `T` with the lifetime of its binding
    ///
    /// # Errors
    /// - [`ResolveErrorKind::NotFound`] if neither this scope nor an ancestor binds `T`
    /// - [`ResolveErrorKind::Circular`] if constructing `T` needs `T` again
    /// - [`ResolveErrorKind::Disposed`] if this scope or an ancestor is disposed
    /// - errors of transitive dependencies, annotated with the path that requested them
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        self.resolve_with(&[])
    }

    /// Resolves contract `T`, passing `overrides` to the constructor of its implementation
    ///
    /// # Errors
    /// See [`Scope::resolve`]
    pub fn resolve_with<T: ?Sized + Send + Sync + 'static>(&self, overrides: &[ParameterOverride]) -> Result<Arc<T>, ResolveErrorKind> {
        let span = info_span!("resolve", dependency = type_name::<T>(), depth = self.inner.depth);
        let _guard = span.enter();

        self.resolve_inner(None, overrides).map_err(|err| {
            error!("{}", err);
            err
        })
    }

    /// Resolves the binding of contract `T` registered under `key`
    ///
    /// # Errors
    /// [`ResolveErrorKind::NotFoundWithKey`] if no binding of `T` has the key, otherwise see [`Scope::resolve`]
    pub fn resolve_keyed<T, K>(&self, key: K) -> Result<Arc<T>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
        K: PartialEq + core::fmt::Debug + Send + Sync + 'static,
    {
        let key = LookupKey::new(key);
        let span = info_span!("resolve_keyed", dependency = type_name::<T>(), %key, depth = self.inner.depth);
        let _guard = span.enter();

        self.resolve_inner(Some(&key), &[]).map_err(|err| {
            error!("{}", err);
            err
        })
    }

    /// Resolves contract `T`, or `None` if nothing binds it.
    ///
    /// # Errors
    /// Every other failure, including a missing transitive dependency, see [`Scope::resolve`]
    pub fn try_resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>, ResolveErrorKind> {
        let span = info_span!("try_resolve", dependency = type_name::<T>(), depth = self.inner.depth);
        let _guard = span.enter();

        match self.resolve_inner(None, &[]) {
            Ok(dependency) => Ok(Some(dependency)),
            Err(err) if err.is_not_found_of(TypeInfo::of::<T>()) => {
                debug!("Not found");
                Ok(None)
            }
            Err(err) => {
                error!("{}", err);
                Err(err)
            }
        }
    }

    /// Resolves every binding of contract `T` from the nearest scope that has any, in registration order
    ///
    /// # Errors
    /// The first error of an element, see [`Scope::resolve`]
    pub fn resolve_collection<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        let span = info_span!("resolve_collection", dependency = type_name::<T>(), depth = self.inner.depth);
        let _guard = span.enter();

        self.inner
            .ensure_open()
            .and_then(|()| {
                let chain = Chain::new(self.inner.config.max_depth);
                Resolver::new(&self.inner, &chain).resolve_collection()
            })
            .map_err(|err| {
                error!("{}", err);
                err
            })
    }

    /// Injects the marked members of an instance created outside the container
    ///
    /// # Errors
    /// See [`Scope::resolve`]
    pub fn inject<T: Injectable>(&self, instance: &mut T) -> Result<(), ResolveErrorKind> {
        let span = info_span!("inject", dependency = type_name::<T>(), depth = self.inner.depth);
        let _guard = span.enter();

        self.inner
            .ensure_open()
            .and_then(|()| {
                let ty = declare::<T>().info();
                let chain = Chain::new(self.inner.config.max_depth);
                Resolver::new(&self.inner, &chain).inject_into(ty, instance)
            })
            .map_err(|err| {
                error!("{}", err);
                err
            })
    }

    fn child(&self, registry: Registry) -> Self {
        let inner = Arc::new(ScopeInner::new(
            registry,
            Some(Arc::downgrade(&self.inner)),
            self.inner.config,
            self.inner.depth + 1,
        ));

        let mut children = self.inner.children.lock();
        children.retain(|child| child.strong_count() > 0);
        children.push(Arc::downgrade(&inner));
        debug!(depth = inner.depth, "Child scope created");

        Self { inner }
    }

    /// Creates a child scope without bindings of its own
    #[must_use]
    pub fn create_child_scope(&self) -> Self {
        self.child(Registry::default())
    }

    /// Creates a child scope with the bindings of `builder`, which shadow the ones of its ancestors.
    /// The child keeps the configuration of this scope.
    ///
    /// # Errors
    /// Returns the build error of the child registry
    pub fn create_child_scope_with(&self, builder: RegistryBuilder) -> Result<Self, BuildErrorKind> {
        builder.finish(&self.inner.config).map(|registry| self.child(registry))
    }

    /// Disposes child scopes, then calls the finalizers of the instances cached here in reverse creation order.
    /// Later calls do nothing. Dropping the last handle of a scope disposes it too.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Number of ancestors
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.inner.depth
    }
}
