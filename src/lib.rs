#[macro_use]
pub(crate) mod macros;

pub(crate) mod any;
pub(crate) mod binding;
pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod dependency_resolver;
pub(crate) mod describe;
pub(crate) mod errors;
pub(crate) mod finalizer;
pub(crate) mod generic;
pub(crate) mod inject;
pub(crate) mod injector;
pub(crate) mod instantiator;
pub(crate) mod lifetime;
pub(crate) mod lock;
pub(crate) mod metadata;
pub(crate) mod pool;
pub(crate) mod registry;
pub(crate) mod resolver;
pub(crate) mod scope;
pub(crate) mod types;

pub use any::{BoxedInstance, Instance, LookupKey, TypeInfo};
pub use binding::{bind, bind_arc, bind_factory, bind_instance, Binding, BindingBuilder, BindingId, Overrides, ParameterOverride};
pub use config::Config;
pub use dependency_resolver::DependencyResolver;
pub use describe::{Args, Describe, Injectable, Parameters};
pub use errors::{AnalyzeErrorKind, BuildErrorKind, DependencyPath, Hop, InjectionPoint, InstantiateErrorKind, ResolveErrorKind};
pub use finalizer::{Dispose, Finalizer};
pub use generic::{GenericDef, GenericShape, GenericType};
pub use inject::{Inject, InjectAll};
pub use injector::{register_injector, register_injector_for, Injector, InjectorStrategy, IntrospectionInjector};
pub use instantiator::Instantiator;
pub use lifetime::Lifetime;
pub use registry::RegistryBuilder;
pub use resolver::Resolver;
pub use scope::Scope;
pub use types::{declare, declare_contract, TypeDescriptor};
