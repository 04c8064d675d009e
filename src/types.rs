use parking_lot::{const_rwlock, RwLock};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};
use tracing::debug;

use crate::{
    any::TypeInfo,
    describe::{ConstructorDecl, ContractCast, Describe, Injectable, MemberDecl},
    finalizer::BoxedFinalizer,
    generic::{GenericDef, GenericShape, GenericType},
};

/// Injection description of one implementation type, see [`Injectable`]
pub struct TypeDescriptor {
    pub(crate) info: TypeInfo,
    pub(crate) constructors: Vec<ConstructorDecl>,
    pub(crate) members: Vec<MemberDecl>,
    pub(crate) identity: ContractCast,
    pub(crate) contracts: Vec<ContractCast>,
    pub(crate) contract_shapes: Vec<(TypeInfo, GenericShape)>,
    pub(crate) shape: Option<GenericShape>,
    pub(crate) finalizer: Option<BoxedFinalizer>,
}

impl TypeDescriptor {
    #[must_use]
    fn of<T: Injectable>() -> Self {
        let mut describe = Describe::<T>::new();
        T::describe(&mut describe);

        let Describe {
            constructors,
            members,
            contracts,
            contract_shapes,
            shape,
            finalizer,
            ..
        } = describe;

        Self {
            info: TypeInfo::of::<T>(),
            constructors,
            members,
            identity: ContractCast::identity::<T>(),
            contracts,
            contract_shapes,
            shape,
            finalizer,
        }
    }

    #[inline]
    #[must_use]
    pub fn info(&self) -> TypeInfo {
        self.info
    }

    /// Cast of the described type to `contract`, the type itself included
    #[must_use]
    pub(crate) fn contract(&self, contract: TypeInfo) -> Option<&ContractCast> {
        if contract == self.info {
            return Some(&self.identity);
        }
        self.contracts.iter().find(|cast| cast.ty == contract)
    }
}

struct Shapes {
    closed: BTreeMap<GenericShape, TypeInfo>,
    of_type: BTreeMap<TypeInfo, GenericShape>,
    open: BTreeSet<TypeInfo>,
}

impl Shapes {
    const fn new() -> Self {
        Self {
            closed: BTreeMap::new(),
            of_type: BTreeMap::new(),
            open: BTreeSet::new(),
        }
    }

    fn insert(&mut self, ty: TypeInfo, shape: GenericShape) {
        self.closed.entry(shape.clone()).or_insert(ty);
        self.of_type.entry(ty).or_insert(shape);
    }
}

static TYPES: RwLock<BTreeMap<TypeInfo, Arc<TypeDescriptor>>> = const_rwlock(BTreeMap::new());
static SHAPES: RwLock<Shapes> = const_rwlock(Shapes::new());

/// Declares `T` in the process-wide type table and returns its descriptor.
///
/// Declaring is idempotent, the first description of a type is kept for the process lifetime.
/// Binding `T` declares it implicitly. Closed generic implementations that are only reached through
/// open generic bindings have to be declared explicitly.
pub fn declare<T: Injectable>() -> Arc<TypeDescriptor> {
    let info = TypeInfo::of::<T>();
    if let Some(descriptor) = TYPES.read().get(&info) {
        return descriptor.clone();
    }

    let descriptor = Arc::new(TypeDescriptor::of::<T>());
    let descriptor = TYPES.write().entry(info).or_insert(descriptor).clone();

    let mut shapes = SHAPES.write();
    if let Some(shape) = &descriptor.shape {
        shapes.insert(info, shape.clone());
    }
    for (contract, shape) in &descriptor.contract_shapes {
        shapes.insert(*contract, shape.clone());
    }
    debug!(ty = %info, "Declared");

    descriptor
}

/// Records the shape of a closed generic contract without declaring an implementation of it
pub fn declare_contract<C: ?Sized + GenericType>() {
    SHAPES.write().insert(TypeInfo::of::<C>(), C::shape());
}

#[must_use]
pub(crate) fn descriptor(ty: TypeInfo) -> Option<Arc<TypeDescriptor>> {
    TYPES.read().get(&ty).cloned()
}

#[must_use]
pub(crate) fn shape_of(ty: TypeInfo) -> Option<GenericShape> {
    SHAPES.read().of_type.get(&ty).cloned()
}

#[must_use]
pub(crate) fn closed_type(shape: &GenericShape) -> Option<TypeInfo> {
    SHAPES.read().closed.get(shape).copied()
}

pub(crate) fn mark_open(definition: GenericDef) {
    SHAPES.write().open.insert(definition.info);
}

#[must_use]
pub(crate) fn is_open_definition(ty: TypeInfo) -> bool {
    SHAPES.read().open.contains(&ty)
}
