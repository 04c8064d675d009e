use core::{any::Any, fmt::Debug, marker::PhantomData, mem};
use std::sync::Arc;

use crate::{
    any::{BoxedInstance, Erased, Instance, LookupKey, TypeInfo},
    errors::InstantiateErrorKind,
    finalizer::{boxed_finalizer_factory, dispose_finalizer, BoxedFinalizer, Dispose, Finalizer},
    generic::{GenericShape, GenericType},
    pool::{BufferPool, Rented},
};

/// Type that can describe how it is constructed and which of its members take part in injection.
///
/// This is the load-time metadata an injector is driven by.
/// The default description has no constructors and no members,
/// so such a type can only be produced by a factory, a precompiled injector or an instance binding.
///
/// ```
/// use entwine::{Describe, Injectable, Parameters};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Config;
///
/// impl Injectable for Config {
///     fn describe(describe: &mut Describe<Self>) {
///         describe.default_constructor();
///     }
/// }
///
/// struct Service {
///     config: Arc<Config>,
///     name: Option<Arc<String>>,
/// }
///
/// impl Injectable for Service {
///     fn describe(describe: &mut Describe<Self>) {
///         describe
///             .constructor(Parameters::new().one::<Config>("config"), |args| {
///                 Ok(Self { config: args.take(0)?, name: None })
///             })
///             .inject_property::<String>("name", |this, name| this.name = Some(name));
///     }
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    fn describe(describe: &mut Describe<Self>) {
        let _ = describe;
    }
}

pub(crate) type Invoke = Arc<dyn Fn(&mut Args) -> Result<BoxedInstance, InstantiateErrorKind> + Send + Sync>;
pub(crate) type Apply = Arc<dyn Fn(&mut (dyn Any + Send + Sync), &mut Args) -> Result<(), InstantiateErrorKind> + Send + Sync>;
pub(crate) type Caster = Arc<dyn Fn(Instance) -> Option<Erased> + Send + Sync>;

/// Conversion of an implementation instance into the view of one contract
#[derive(Clone)]
pub(crate) struct ContractCast {
    pub(crate) ty: TypeInfo,
    pub(crate) cast: Caster,
}

impl ContractCast {
    #[must_use]
    pub(crate) fn new<T, C>(cast: fn(Arc<T>) -> Arc<C>) -> Self
    where
        T: Send + Sync + 'static,
        C: ?Sized + Send + Sync + 'static,
    {
        Self {
            ty: TypeInfo::of::<C>(),
            cast: Arc::new(move |instance: Instance| instance.downcast::<T>().ok().map(|instance| Box::new(cast(instance)) as Erased)),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn identity<T: Send + Sync + 'static>() -> Self {
        Self::new::<T, T>(|instance| instance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cardinality {
    One,
    Many,
}

/// Dependency source of a parameter or member: declared type, optional key and cardinality
#[derive(Debug, Clone)]
pub(crate) struct ParameterDecl {
    pub(crate) name: &'static str,
    pub(crate) ty: TypeInfo,
    pub(crate) key: Option<LookupKey>,
    pub(crate) cardinality: Cardinality,
}

/// Ordered parameter list of a constructor or method
#[derive(Debug, Clone, Default)]
pub struct Parameters(pub(crate) Vec<ParameterDecl>);

impl Parameters {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Parameter resolved as a single `Arc<T>`
    #[must_use]
    pub fn one<T: ?Sized + 'static>(self, name: &'static str) -> Self {
        self.push::<T>(name, None, Cardinality::One)
    }

    /// Parameter resolved as the binding of `T` registered with `key`
    #[must_use]
    pub fn keyed<T, K>(self, name: &'static str, key: K) -> Self
    where
        T: ?Sized + 'static,
        K: PartialEq + Debug + Send + Sync + 'static,
    {
        self.push::<T>(name, Some(LookupKey::new(key)), Cardinality::One)
    }

    /// Parameter resolved as every binding of `T`, in registration order
    #[must_use]
    pub fn many<T: ?Sized + 'static>(self, name: &'static str) -> Self {
        self.push::<T>(name, None, Cardinality::Many)
    }

    fn push<T: ?Sized + 'static>(mut self, name: &'static str, key: Option<LookupKey>, cardinality: Cardinality) -> Self {
        self.0.push(ParameterDecl {
            name,
            ty: TypeInfo::of::<T>(),
            key,
            cardinality,
        });
        self
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub(crate) enum Slot {
    One(Erased),
    Many(Vec<Erased>),
    Taken,
}

static ARGUMENTS: BufferPool<Slot> = BufferPool::new(64);

/// Resolved arguments of one constructor, method or member call, in parameter order
pub struct Args {
    slots: Rented<Slot>,
}

impl Args {
    #[must_use]
    pub(crate) fn rent(capacity: usize) -> Self {
        Self {
            slots: ARGUMENTS.rent(capacity),
        }
    }

    #[inline]
    pub(crate) fn push(&mut self, slot: Slot) {
        self.slots.push(slot);
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Takes the argument at `position`.
    /// # Errors
    /// - Returns [`InstantiateErrorKind::IncorrectArgument`] if the argument isn't a single `Arc<T>`
    /// - Returns [`InstantiateErrorKind::MissingArgument`] if there is no argument at `position` or it was already taken
    pub fn take<T: ?Sized + Send + Sync + 'static>(&mut self, position: usize) -> Result<Arc<T>, InstantiateErrorKind> {
        match self.slot(position)? {
            Slot::One(value) => value.downcast::<Arc<T>>().map(|value| *value).map_err(|_| InstantiateErrorKind::IncorrectArgument {
                position,
                expected: TypeInfo::of::<T>(),
            }),
            Slot::Many(_) | Slot::Taken => Err(InstantiateErrorKind::IncorrectArgument {
                position,
                expected: TypeInfo::of::<T>(),
            }),
        }
    }

    /// Takes the collection argument at `position`.
    /// # Errors
    /// - Returns [`InstantiateErrorKind::IncorrectArgument`] if the argument isn't a collection of `Arc<T>`
    /// - Returns [`InstantiateErrorKind::MissingArgument`] if there is no argument at `position` or it was already taken
    pub fn take_many<T: ?Sized + Send + Sync + 'static>(&mut self, position: usize) -> Result<Vec<Arc<T>>, InstantiateErrorKind> {
        let incorrect = || InstantiateErrorKind::IncorrectArgument {
            position,
            expected: TypeInfo::of::<T>(),
        };
        match self.slot(position)? {
            Slot::Many(values) => values
                .into_iter()
                .map(|value| value.downcast::<Arc<T>>().map(|value| *value).map_err(|_| incorrect()))
                .collect(),
            Slot::One(_) | Slot::Taken => Err(incorrect()),
        }
    }

    fn slot(&mut self, position: usize) -> Result<Slot, InstantiateErrorKind> {
        match self.slots.get_mut(position).map(|slot| mem::replace(slot, Slot::Taken)) {
            Some(Slot::Taken) | None => Err(InstantiateErrorKind::MissingArgument { position }),
            Some(slot) => Ok(slot),
        }
    }
}

#[derive(Clone)]
pub(crate) struct ConstructorDecl {
    pub(crate) marked: bool,
    pub(crate) parameters: Vec<ParameterDecl>,
    pub(crate) invoke: Invoke,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum MemberKind {
    Field,
    Property,
    Method,
}

#[derive(Clone)]
pub(crate) struct MemberDecl {
    pub(crate) kind: MemberKind,
    pub(crate) name: &'static str,
    pub(crate) marked: bool,
    pub(crate) parameters: Vec<ParameterDecl>,
    /// `None` for a property without a setter
    pub(crate) apply: Option<Apply>,
    /// Distance from the described type, `0` for its own members
    pub(crate) level: usize,
    pub(crate) declared_in: TypeInfo,
}

fn downcast_target<T: 'static>(target: &mut (dyn Any + Send + Sync)) -> Result<&mut T, InstantiateErrorKind> {
    target.downcast_mut::<T>().ok_or(InstantiateErrorKind::IncorrectInstance {
        expected: TypeInfo::of::<T>(),
    })
}

/// Builder of the injection description of `T`, filled by [`Injectable::describe`]
pub struct Describe<T> {
    pub(crate) constructors: Vec<ConstructorDecl>,
    pub(crate) members: Vec<MemberDecl>,
    pub(crate) contracts: Vec<ContractCast>,
    pub(crate) contract_shapes: Vec<(TypeInfo, GenericShape)>,
    pub(crate) shape: Option<GenericShape>,
    pub(crate) finalizer: Option<BoxedFinalizer>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Describe<T> {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            constructors: Vec::new(),
            members: Vec::new(),
            contracts: Vec::new(),
            contract_shapes: Vec::new(),
            shape: None,
            finalizer: None,
            _marker: PhantomData,
        }
    }

    fn push_constructor<F>(&mut self, marked: bool, parameters: Parameters, constructor: F) -> &mut Self
    where
        F: Fn(&mut Args) -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.constructors.push(ConstructorDecl {
            marked,
            parameters: parameters.0,
            invoke: Arc::new(move |args: &mut Args| constructor(args).map(|instance| Box::new(instance) as BoxedInstance)),
        });
        self
    }

    /// Declares a constructor.
    /// Without a marked constructor, the one with the most parameters is used.
    pub fn constructor<F>(&mut self, parameters: Parameters, constructor: F) -> &mut Self
    where
        F: Fn(&mut Args) -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.push_constructor(false, parameters, constructor)
    }

    /// Declares a constructor marked for injection
    pub fn inject_constructor<F>(&mut self, parameters: Parameters, constructor: F) -> &mut Self
    where
        F: Fn(&mut Args) -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.push_constructor(true, parameters, constructor)
    }

    /// Declares a parameterless constructor backed by [`Default`]
    pub fn default_constructor(&mut self) -> &mut Self
    where
        T: Default,
    {
        self.push_constructor(false, Parameters::new(), |_| Ok(T::default()))
    }

    fn push_setter<V>(
        &mut self,
        kind: MemberKind,
        marked: bool,
        name: &'static str,
        key: Option<LookupKey>,
        set: impl Fn(&mut T, Arc<V>) + Send + Sync + 'static,
    ) -> &mut Self
    where
        V: ?Sized + Send + Sync + 'static,
    {
        let apply: Apply = Arc::new(move |target: &mut (dyn Any + Send + Sync), args: &mut Args| -> Result<(), InstantiateErrorKind> {
            let value = args.take::<V>(0)?;
            set(downcast_target::<T>(target)?, value);
            Ok(())
        });
        self.members.push(MemberDecl {
            kind,
            name,
            marked,
            parameters: vec![ParameterDecl {
                name,
                ty: TypeInfo::of::<V>(),
                key,
                cardinality: Cardinality::One,
            }],
            apply: Some(apply),
            level: 0,
            declared_in: TypeInfo::of::<T>(),
        });
        self
    }

    /// Declares a field marked for injection
    pub fn inject_field<V>(&mut self, name: &'static str, set: impl Fn(&mut T, Arc<V>) + Send + Sync + 'static) -> &mut Self
    where
        V: ?Sized + Send + Sync + 'static,
    {
        self.push_setter(MemberKind::Field, true, name, None, set)
    }

    /// Declares a field marked for injection with the binding registered under `key`
    pub fn inject_field_keyed<V, K>(&mut self, name: &'static str, key: K, set: impl Fn(&mut T, Arc<V>) + Send + Sync + 'static) -> &mut Self
    where
        V: ?Sized + Send + Sync + 'static,
        K: PartialEq + Debug + Send + Sync + 'static,
    {
        self.push_setter(MemberKind::Field, true, name, Some(LookupKey::new(key)), set)
    }

    /// Declares a field that isn't marked for injection.
    /// It only matters when it overrides a marked field of a base type.
    pub fn field<V>(&mut self, name: &'static str, set: impl Fn(&mut T, Arc<V>) + Send + Sync + 'static) -> &mut Self
    where
        V: ?Sized + Send + Sync + 'static,
    {
        self.push_setter(MemberKind::Field, false, name, None, set)
    }

    /// Declares a property with a setter, marked for injection
    pub fn inject_property<V>(&mut self, name: &'static str, set: impl Fn(&mut T, Arc<V>) + Send + Sync + 'static) -> &mut Self
    where
        V: ?Sized + Send + Sync + 'static,
    {
        self.push_setter(MemberKind::Property, true, name, None, set)
    }

    /// Declares a property setter that isn't marked for injection
    pub fn property<V>(&mut self, name: &'static str, set: impl Fn(&mut T, Arc<V>) + Send + Sync + 'static) -> &mut Self
    where
        V: ?Sized + Send + Sync + 'static,
    {
        self.push_setter(MemberKind::Property, false, name, None, set)
    }

    /// Declares a marked property without an accessible setter. Such properties are never injected.
    pub fn getter_only_property<V>(&mut self, name: &'static str) -> &mut Self
    where
        V: ?Sized + Send + Sync + 'static,
    {
        self.members.push(MemberDecl {
            kind: MemberKind::Property,
            name,
            marked: true,
            parameters: Parameters::new().one::<V>(name).0,
            apply: None,
            level: 0,
            declared_in: TypeInfo::of::<T>(),
        });
        self
    }

    fn push_method<F>(&mut self, marked: bool, name: &'static str, parameters: Parameters, method: F) -> &mut Self
    where
        F: Fn(&mut T, &mut Args) -> Result<(), InstantiateErrorKind> + Send + Sync + 'static,
    {
        let apply: Apply = Arc::new(move |target: &mut (dyn Any + Send + Sync), args: &mut Args| method(downcast_target::<T>(target)?, args));
        self.members.push(MemberDecl {
            kind: MemberKind::Method,
            name,
            marked,
            parameters: parameters.0,
            apply: Some(apply),
            level: 0,
            declared_in: TypeInfo::of::<T>(),
        });
        self
    }

    /// Declares the inject method. It runs after fields and properties are set.
    pub fn inject_method<F>(&mut self, name: &'static str, parameters: Parameters, method: F) -> &mut Self
    where
        F: Fn(&mut T, &mut Args) -> Result<(), InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.push_method(true, name, parameters, method)
    }

    /// Declares a method that isn't marked for injection.
    /// It only matters when it overrides the inject method of a base type.
    pub fn method<F>(&mut self, name: &'static str, parameters: Parameters, method: F) -> &mut Self
    where
        F: Fn(&mut T, &mut Args) -> Result<(), InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.push_method(false, name, parameters, method)
    }

    /// Inherits the members of `B`, reached through `project`.
    /// Members of `T` with the same kind and name override the inherited ones.
    pub fn base<B: Injectable>(&mut self, project: fn(&mut T) -> &mut B) -> &mut Self {
        let mut base = Describe::<B>::new();
        B::describe(&mut base);

        for member in base.members {
            let apply = member.apply.map(|apply| -> Apply {
                Arc::new(move |target: &mut (dyn Any + Send + Sync), args: &mut Args| apply(project(downcast_target::<T>(target)?), args))
            });
            self.members.push(MemberDecl {
                apply,
                level: member.level + 1,
                ..member
            });
        }
        self
    }

    /// Declares that `T` can be used as contract `C`
    pub fn implements<C>(&mut self, cast: fn(Arc<T>) -> Arc<C>) -> &mut Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.contracts.push(ContractCast::new(cast));
        self
    }

    /// Declares that `T` can be used as the closed generic contract `C`
    pub fn implements_generic<C>(&mut self, cast: fn(Arc<T>) -> Arc<C>) -> &mut Self
    where
        C: ?Sized + GenericType + Send + Sync,
    {
        self.contract_shapes.push((TypeInfo::of::<C>(), C::shape()));
        self.implements(cast)
    }

    /// Records `T` as a closed instantiation of its generic definition,
    /// so open generic bindings of that definition can close over it
    pub fn closed_generic(&mut self) -> &mut Self
    where
        T: GenericType,
    {
        self.shape = Some(T::shape());
        self
    }

    /// Finalizes cached instances with [`Dispose::dispose`]
    pub fn disposable(&mut self) -> &mut Self
    where
        T: Dispose,
    {
        self.finalizer = Some(dispose_finalizer::<T>());
        self
    }

    pub fn finalizer(&mut self, finalizer: impl Finalizer<T>) -> &mut Self {
        self.finalizer = Some(boxed_finalizer_factory::<T, _>(finalizer));
        self
    }
}
