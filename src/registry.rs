use parking_lot::RwLock;
use std::{
    collections::{btree_map::Entry as MapEntry, BTreeMap},
    sync::Arc,
};
use tracing::{debug, info_span};

use crate::{
    any::{LookupKey, TypeInfo},
    binding::{Binding, BindingId, Provider},
    config::Config,
    describe::Caster,
    errors::{BuildErrorKind, ResolveErrorKind},
    generic::GenericDef,
    injector,
    lifetime::Lifetime,
    pool::BufferPool,
    scope::Scope,
    types::{closed_type, descriptor, is_open_definition, mark_open, shape_of},
};

/// Binding together with its cast to the contract it was found under
#[derive(Clone)]
pub(crate) struct Candidate {
    pub(crate) binding: Arc<Binding>,
    pub(crate) cast: Caster,
}

pub(crate) static CANDIDATES: BufferPool<Candidate> = BufferPool::new(32);

/// Bindings sharing one contract, in registration order
pub(crate) struct CollectionBinding {
    contract: TypeInfo,
    members: Vec<Candidate>,
}

pub(crate) enum Entry {
    Single(Candidate),
    Collection(CollectionBinding),
}

impl Entry {
    fn members(&self) -> &[Candidate] {
        match self {
            Self::Single(candidate) => core::slice::from_ref(candidate),
            Self::Collection(collection) => &collection.members,
        }
    }

    /// Adds a later binding of `contract`, promoting a single binding into a collection
    fn push(&mut self, contract: TypeInfo, candidate: Candidate) -> Result<(), BuildErrorKind> {
        let binding = &candidate.binding;
        let mut same_binding = false;
        for member in self.members() {
            if member.binding.id == binding.id {
                same_binding = true;
            } else if constructs_singleton(&member.binding)
                && constructs_singleton(binding)
                && member.binding.implementation == binding.implementation
            {
                return Err(BuildErrorKind::DuplicateSingleton {
                    contract,
                    implementation: binding.implementation,
                });
            }
        }
        if same_binding {
            return Ok(());
        }

        match self {
            Self::Single(existing) => {
                let members = vec![existing.clone(), candidate];
                debug!(%contract, "Promoted to collection");
                *self = Self::Collection(CollectionBinding { contract, members });
            }
            Self::Collection(collection) => {
                debug_assert_eq!(collection.contract, contract);
                collection.members.push(candidate);
            }
        }
        Ok(())
    }

    /// Last registered binding, optionally narrowed to the ones registered under `key`
    fn lookup(&self, key: Option<&LookupKey>) -> Option<&Candidate> {
        let members = self.members().iter();
        match key {
            None => members.last(),
            Some(key) => members.rev().find(|candidate| candidate.binding.key.as_ref() == Some(key)),
        }
    }
}

/// Pre-existing instances are not constructed, so several of the same type can share a contract
fn constructs_singleton(binding: &Binding) -> bool {
    binding.lifetime == Lifetime::Singleton && !matches!(binding.provider, Provider::Instance(_))
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct OpenBinding {
    contract: GenericDef,
    implementation: GenericDef,
    lifetime: Lifetime,
}

/// Immutable lookup structure of one scope layer.
///
/// Closed bindings synthesized from open generic bindings are the only state added after build.
#[derive(Default)]
pub(crate) struct Registry {
    entries: BTreeMap<TypeInfo, Entry>,
    open: BTreeMap<GenericDef, OpenBinding>,
    closed: RwLock<BTreeMap<TypeInfo, Candidate>>,
}

impl Registry {
    /// Last binding of `contract`, closing an open generic binding when no explicit one exists
    pub(crate) fn lookup(&self, contract: TypeInfo, key: Option<&LookupKey>) -> Result<Option<Candidate>, ResolveErrorKind> {
        if let Some(candidate) = self.entries.get(&contract).and_then(|entry| entry.lookup(key)) {
            return Ok(Some(candidate.clone()));
        }
        if key.is_some() {
            return Ok(None);
        }
        self.close_generic(contract)
    }

    /// Pushes every binding of `contract` to `candidates`.
    /// Returns `false` if this layer has none.
    pub(crate) fn collection(&self, contract: TypeInfo, candidates: &mut Vec<Candidate>) -> Result<bool, ResolveErrorKind> {
        if let Some(entry) = self.entries.get(&contract) {
            candidates.extend(entry.members().iter().cloned());
            return Ok(true);
        }
        match self.close_generic(contract)? {
            Some(candidate) => {
                candidates.push(candidate);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn close_generic(&self, contract: TypeInfo) -> Result<Option<Candidate>, ResolveErrorKind> {
        if self.open.is_empty() {
            return Ok(None);
        }
        if let Some(candidate) = self.closed.read().get(&contract) {
            return Ok(Some(candidate.clone()));
        }

        let Some(shape) = shape_of(contract) else {
            return Ok(None);
        };
        let Some(open) = self.open.get(&shape.definition) else {
            return Ok(None);
        };

        let missing = || ResolveErrorKind::MissingGenericInstantiation {
            contract,
            implementation: open.implementation.info,
        };
        let implementation = closed_type(&shape.rebind(open.implementation)).ok_or_else(missing)?;
        let descriptor = descriptor(implementation).ok_or_else(missing)?;
        let cast = descriptor.contract(contract).cloned().ok_or_else(missing)?;

        let mut closed = self.closed.write();
        let candidate = closed.entry(contract).or_insert_with(|| {
            debug!(%contract, %implementation, "Closed generic binding");
            Candidate {
                binding: Arc::new(Binding {
                    id: BindingId::next(),
                    implementation,
                    contracts: vec![cast.clone()],
                    lifetime: open.lifetime,
                    overrides: Vec::new(),
                    key: None,
                    provider: Provider::Injector,
                    finalizer: descriptor.finalizer.clone(),
                }),
                cast: cast.cast,
            }
        });
        Ok(Some(candidate.clone()))
    }
}

/// Collects bindings and builds them into a root [`Scope`], or into the layer of a child scope
#[must_use]
#[derive(Default)]
pub struct RegistryBuilder {
    bindings: Vec<Binding>,
    open: Vec<OpenBinding>,
    config: Config,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration of the root scope, inherited by its children
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn provide(mut self, binding: impl Into<Binding>) -> Self {
        self.bindings.push(binding.into());
        self
    }

    /// Binds every closed instantiation of `contract` to the same instantiation of `implementation`.
    ///
    /// The closed implementation types must be declared, see [`crate::declare`].
    pub fn provide_open_generic(mut self, contract: GenericDef, implementation: GenericDef, lifetime: Lifetime) -> Self {
        self.open.push(OpenBinding {
            contract,
            implementation,
            lifetime,
        });
        self
    }

    /// Finalizes the bindings into a root scope
    ///
    /// # Errors
    /// - [`BuildErrorKind::DuplicateSingleton`] if a contract has two singleton bindings of the same implementation
    /// - [`BuildErrorKind::Analyze`] if an introspected implementation can't be analyzed and [`Config::validate_on_build`] is set
    /// - [`BuildErrorKind::OpenGenericArity`], [`BuildErrorKind::InconsistentGenericContract`] and
    ///   [`BuildErrorKind::OpenGenericContract`] for malformed generic bindings
    pub fn build(self) -> Result<Scope, BuildErrorKind> {
        let config = self.config;
        self.finish(&config).map(|registry| Scope::root(registry, config))
    }

    pub(crate) fn finish(self, config: &Config) -> Result<Registry, BuildErrorKind> {
        let span = info_span!("build", bindings = self.bindings.len(), open = self.open.len());
        let _guard = span.enter();

        let mut open = BTreeMap::new();
        for binding in self.open {
            if binding.contract.arity != binding.implementation.arity {
                return Err(BuildErrorKind::open_generic_arity(binding.contract, binding.implementation));
            }
            mark_open(binding.contract);
            mark_open(binding.implementation);
            open.insert(binding.contract, binding);
        }

        let mut entries: BTreeMap<TypeInfo, Entry> = BTreeMap::new();
        for binding in self.bindings {
            check_generic_contracts(&binding)?;
            if config.validate_on_build && matches!(binding.provider, Provider::Injector) {
                injector::validate(binding.implementation)?;
            }

            let binding = Arc::new(binding);
            for cast in &binding.contracts {
                let candidate = Candidate {
                    binding: binding.clone(),
                    cast: cast.cast.clone(),
                };
                match entries.entry(cast.ty) {
                    MapEntry::Vacant(entry) => {
                        entry.insert(Entry::Single(candidate));
                    }
                    MapEntry::Occupied(mut entry) => entry.get_mut().push(cast.ty, candidate)?,
                }
            }
        }
        debug!(contracts = entries.len(), "Registry built");

        Ok(Registry {
            entries,
            open,
            closed: RwLock::new(BTreeMap::new()),
        })
    }
}

fn check_generic_contracts(binding: &Binding) -> Result<(), BuildErrorKind> {
    let implementation = binding.implementation;
    for cast in &binding.contracts {
        let contract = cast.ty;
        if is_open_definition(contract) {
            return Err(BuildErrorKind::OpenGenericContract { contract, implementation });
        }
        if let (Some(contract_shape), Some(implementation_shape)) = (shape_of(contract), shape_of(implementation)) {
            if contract_shape.arguments != implementation_shape.arguments {
                return Err(BuildErrorKind::InconsistentGenericContract { contract, implementation });
            }
        }
    }
    Ok(())
}

/// Builds a [`RegistryBuilder`] from a list of builder calls
///
/// # Example
/// ```
/// use entwine::{bind_instance, registry, Config};
///
/// let scope = registry! {
///     with_config(Config::default()),
///     provide(bind_instance(1u8)),
///     provide(bind_instance("name")),
/// }
/// .build()
/// .unwrap();
///
/// assert_eq!(*scope.resolve::<u8>().unwrap(), 1);
/// ```
#[macro_export]
macro_rules! registry {
    ( $( $method:ident ( $($args:tt)* ) ),* $(,)? ) => {{
        let builder = $crate::RegistryBuilder::new();
        $(
            let builder = builder.$method($($args)*);
        )*
        builder
    }};
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use tracing_test::traced_test;

    use super::RegistryBuilder;
    use crate::{
        binding::{bind, bind_instance},
        describe::{Describe, Injectable},
        errors::BuildErrorKind,
        generic::GenericDef,
        lifetime::Lifetime,
    };

    trait Plugin: Send + Sync {
        fn name(&self) -> &'static str;
    }

    #[derive(Default)]
    struct First;
    #[derive(Default)]
    struct Second;

    impl Plugin for First {
        fn name(&self) -> &'static str {
            "first"
        }
    }

    impl Plugin for Second {
        fn name(&self) -> &'static str {
            "second"
        }
    }

    impl Injectable for First {
        fn describe(describe: &mut Describe<Self>) {
            describe.default_constructor();
        }
    }

    impl Injectable for Second {
        fn describe(describe: &mut Describe<Self>) {
            describe.default_constructor();
        }
    }

    #[test]
    #[traced_test]
    fn test_last_wins_and_collection_order() {
        let scope = RegistryBuilder::new()
            .provide(bind::<First>(Lifetime::Transient).as_contract::<dyn Plugin>(|this| this))
            .provide(bind::<Second>(Lifetime::Transient).as_contract::<dyn Plugin>(|this| this))
            .build()
            .unwrap();

        assert_eq!(scope.resolve::<dyn Plugin>().unwrap().name(), "second");
        let names = scope
            .resolve_collection::<dyn Plugin>()
            .unwrap()
            .iter()
            .map(|plugin| plugin.name())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["first", "second"]);
        assert!(logs_contain("Promoted to collection"));
    }

    #[test]
    #[traced_test]
    fn test_duplicate_singleton() {
        let result = RegistryBuilder::new()
            .provide(bind::<First>(Lifetime::Singleton).as_contract::<dyn Plugin>(|this| this))
            .provide(bind::<First>(Lifetime::Singleton).as_contract::<dyn Plugin>(|this| this))
            .build();

        assert!(matches!(result, Err(BuildErrorKind::DuplicateSingleton { .. })));
    }

    #[test]
    #[traced_test]
    fn test_keyed_lookup() {
        let scope = RegistryBuilder::new()
            .provide(bind_instance(1u32).keyed("one"))
            .provide(bind_instance(2u32).keyed("two"))
            .provide(bind_instance(3u32))
            .build()
            .unwrap();

        assert_eq!(*scope.resolve::<u32>().unwrap(), 3);
        assert_eq!(*scope.resolve_keyed::<u32, _>("one").unwrap(), 1);
        assert_eq!(*scope.resolve_keyed::<u32, _>("two").unwrap(), 2);
        assert!(scope.resolve_keyed::<u32, _>("three").is_err());
    }

    enum LeftDef {}
    enum RightDef {}

    #[test]
    #[traced_test]
    fn test_open_generic_arity() {
        let result = RegistryBuilder::new()
            .provide_open_generic(GenericDef::of::<LeftDef>(1), GenericDef::of::<RightDef>(2), Lifetime::Transient)
            .build();

        assert!(matches!(
            result,
            Err(BuildErrorKind::OpenGenericArity {
                contract_arity: 1,
                implementation_arity: 2,
                ..
            })
        ));
    }

    #[test]
    #[traced_test]
    fn test_registry_macro() {
        let scope = registry! {
            provide(bind_instance(7u8)),
            provide(bind_instance(Arc::new(8u16))),
        }
        .build()
        .unwrap();

        assert_eq!(*scope.resolve::<u8>().unwrap(), 7);
        assert_eq!(**scope.resolve::<Arc<u16>>().unwrap(), 8);
    }
}
