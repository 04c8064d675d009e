use parking_lot::{const_rwlock, RwLock};
use std::{collections::BTreeMap, sync::Arc};
use tracing::debug;

use crate::{
    any::TypeInfo,
    describe::{Invoke, MemberDecl, MemberKind, ParameterDecl},
    errors::AnalyzeErrorKind,
    types::TypeDescriptor,
};

/// Constructor chosen for injection
pub(crate) struct SelectedConstructor {
    pub(crate) parameters: Vec<ParameterDecl>,
    /// `None` for the implicit constructor of a type that declares none
    pub(crate) invoke: Option<Invoke>,
}

/// Which constructor and members of a type take part in injection
pub(crate) struct InjectionMetadata {
    pub(crate) ty: TypeInfo,
    pub(crate) constructor: SelectedConstructor,
    pub(crate) fields: Vec<MemberDecl>,
    pub(crate) properties: Vec<MemberDecl>,
    pub(crate) method: Option<MemberDecl>,
}

impl InjectionMetadata {
    /// Members in injection order: fields, properties, then the inject method
    pub(crate) fn members(&self) -> impl Iterator<Item = &MemberDecl> {
        self.fields.iter().chain(&self.properties).chain(&self.method)
    }
}

type Analyzed = Result<Arc<InjectionMetadata>, AnalyzeErrorKind>;

static ANALYZED: RwLock<BTreeMap<TypeInfo, Analyzed>> = const_rwlock(BTreeMap::new());

/// Analyzes the descriptor once per type, later calls return the memoized result
pub(crate) fn analyze(descriptor: &TypeDescriptor) -> Analyzed {
    if let Some(analyzed) = ANALYZED.read().get(&descriptor.info) {
        return analyzed.clone();
    }

    let analyzed = analyze_uncached(descriptor).map(Arc::new);
    debug!(ty = %descriptor.info, ok = analyzed.is_ok(), "Analyzed");

    ANALYZED.write().entry(descriptor.info).or_insert(analyzed).clone()
}

fn analyze_uncached(descriptor: &TypeDescriptor) -> Result<InjectionMetadata, AnalyzeErrorKind> {
    let ty = descriptor.info;
    let constructor = select_constructor(descriptor)?;

    let mut fields = Vec::new();
    let mut properties = Vec::new();
    let mut method: Option<MemberDecl> = None;

    for member in dedup_members(&descriptor.members) {
        match member.kind {
            MemberKind::Field => fields.push(member),
            MemberKind::Property => {
                if member.apply.is_some() {
                    properties.push(member);
                } else {
                    debug!(%ty, property = member.name, "Property without setter skipped");
                }
            }
            MemberKind::Method => {
                if let Some(first) = &method {
                    return Err(AnalyzeErrorKind::MultipleInjectMethods {
                        ty,
                        first: first.name,
                        second: member.name,
                    });
                }
                method = Some(member);
            }
        }
    }

    Ok(InjectionMetadata {
        ty,
        constructor,
        fields,
        properties,
        method,
    })
}

fn select_constructor(descriptor: &TypeDescriptor) -> Result<SelectedConstructor, AnalyzeErrorKind> {
    let ty = descriptor.info;
    let constructors = &descriptor.constructors;

    if constructors.is_empty() {
        return Ok(SelectedConstructor {
            parameters: Vec::new(),
            invoke: None,
        });
    }

    let mut marked = constructors.iter().filter(|constructor| constructor.marked);
    let selected = match (marked.next(), marked.next()) {
        (Some(_), Some(_)) => return Err(AnalyzeErrorKind::AmbiguousMarkedConstructor { ty }),
        (Some(constructor), None) => constructor,
        (None, _) => {
            let parameters = constructors
                .iter()
                .map(|constructor| constructor.parameters.len())
                .max()
                .unwrap_or_default();
            let mut widest = constructors.iter().filter(|constructor| constructor.parameters.len() == parameters);
            match (widest.next(), widest.clone().count()) {
                (Some(constructor), 0) => constructor,
                (_, rest) => {
                    return Err(AnalyzeErrorKind::AmbiguousConstructor {
                        ty,
                        count: rest + 1,
                        parameters,
                    })
                }
            }
        }
    };

    Ok(SelectedConstructor {
        parameters: selected.parameters.clone(),
        invoke: Some(selected.invoke.clone()),
    })
}

/// Collapses members redeclared along the base chain into one entry per kind and name.
///
/// The most derived declaration is the one applied, the member counts as marked if any declaration marks it.
/// Only marked members are returned, in order of first declaration.
fn dedup_members(members: &[MemberDecl]) -> Vec<MemberDecl> {
    let mut order = Vec::new();
    let mut chosen: BTreeMap<(MemberKind, &'static str), (MemberDecl, bool)> = BTreeMap::new();

    for member in members {
        let key = (member.kind, member.name);
        match chosen.get_mut(&key) {
            Some((current, marked)) => {
                *marked |= member.marked;
                if member.level < current.level {
                    *current = member.clone();
                }
            }
            None => {
                order.push(key);
                chosen.insert(key, (member.clone(), member.marked));
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| chosen.remove(&key))
        .filter_map(|(member, marked)| marked.then_some(member))
        .collect()
}

#[cfg(test)]
mod tests {
    use core::{
        any::Any,
        sync::atomic::{AtomicU8, Ordering},
    };
    use std::sync::Arc;
    use tracing_test::traced_test;

    use super::analyze;
    use crate::{
        any::Erased,
        describe::{Args, Describe, Injectable, Parameters, Slot},
        errors::AnalyzeErrorKind,
        types::declare,
    };

    struct Widest;

    impl Injectable for Widest {
        fn describe(describe: &mut Describe<Self>) {
            describe
                .constructor(Parameters::new(), |_| Ok(Self))
                .constructor(Parameters::new().one::<u8>("a").one::<u16>("b"), |_| Ok(Self))
                .constructor(Parameters::new().one::<u8>("a"), |_| Ok(Self));
        }
    }

    struct Marked;

    impl Injectable for Marked {
        fn describe(describe: &mut Describe<Self>) {
            describe
                .constructor(Parameters::new().one::<u8>("a").one::<u16>("b"), |_| Ok(Self))
                .inject_constructor(Parameters::new().one::<u32>("c"), |_| Ok(Self));
        }
    }

    struct TwoMarked;

    impl Injectable for TwoMarked {
        fn describe(describe: &mut Describe<Self>) {
            describe
                .inject_constructor(Parameters::new(), |_| Ok(Self))
                .inject_constructor(Parameters::new().one::<u8>("a"), |_| Ok(Self));
        }
    }

    struct Tied;

    impl Injectable for Tied {
        fn describe(describe: &mut Describe<Self>) {
            describe
                .constructor(Parameters::new().one::<u8>("a"), |_| Ok(Self))
                .constructor(Parameters::new().one::<u16>("b"), |_| Ok(Self));
        }
    }

    struct Implicit;

    impl Injectable for Implicit {}

    #[test]
    #[traced_test]
    fn test_constructor_selection() {
        let widest = analyze(&declare::<Widest>()).unwrap();
        assert_eq!(widest.constructor.parameters.len(), 2);

        let marked = analyze(&declare::<Marked>()).unwrap();
        assert_eq!(marked.constructor.parameters.len(), 1);
        assert_eq!(marked.constructor.parameters[0].name, "c");

        let implicit = analyze(&declare::<Implicit>()).unwrap();
        assert!(implicit.constructor.parameters.is_empty());
        assert!(implicit.constructor.invoke.is_none());
    }

    #[test]
    #[traced_test]
    fn test_ambiguous_constructors() {
        assert!(matches!(
            analyze(&declare::<TwoMarked>()),
            Err(AnalyzeErrorKind::AmbiguousMarkedConstructor { .. })
        ));
        assert!(matches!(
            analyze(&declare::<Tied>()),
            Err(AnalyzeErrorKind::AmbiguousConstructor {
                count: 2,
                parameters: 1,
                ..
            })
        ));
    }

    #[test]
    #[traced_test]
    fn test_memoized() {
        let first = analyze(&declare::<Widest>()).unwrap();
        let second = analyze(&declare::<Widest>()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    static BASE_CALLS: AtomicU8 = AtomicU8::new(0);
    static DERIVED_CALLS: AtomicU8 = AtomicU8::new(0);

    #[derive(Default)]
    struct Base;

    impl Injectable for Base {
        fn describe(describe: &mut Describe<Self>) {
            describe
                .inject_property::<u8>("level", |_, _| {
                    BASE_CALLS.fetch_add(1, Ordering::SeqCst);
                })
                .inject_field::<u16>("shared", |_, _| {})
                .getter_only_property::<u32>("id");
        }
    }

    #[derive(Default)]
    struct Derived {
        base: Base,
    }

    impl Injectable for Derived {
        fn describe(describe: &mut Describe<Self>) {
            describe
                .default_constructor()
                .base(|this| &mut this.base)
                .property::<u8>("level", |_, _| {
                    DERIVED_CALLS.fetch_add(1, Ordering::SeqCst);
                })
                .field::<u64>("unmarked", |_, _| {});
        }
    }

    #[test]
    #[traced_test]
    fn test_overridden_members_injected_once() {
        let metadata = analyze(&declare::<Derived>()).unwrap();

        let properties = metadata.properties.iter().map(|member| member.name).collect::<Vec<_>>();
        let fields = metadata.fields.iter().map(|member| member.name).collect::<Vec<_>>();
        assert_eq!(properties, vec!["level"]);
        assert_eq!(fields, vec!["shared"]);
        assert_eq!(metadata.properties[0].level, 0);
        assert!(metadata.method.is_none());
        assert!(logs_contain("Property without setter skipped"));

        let mut derived = Derived::default();
        let mut args = Args::rent(1);
        args.push(Slot::One(Box::new(Arc::new(1u8)) as Erased));
        let apply = metadata.properties[0].apply.clone().unwrap();
        apply(&mut derived as &mut (dyn Any + Send + Sync), &mut args).unwrap();

        assert_eq!(DERIVED_CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(BASE_CALLS.load(Ordering::SeqCst), 0);
    }

    struct TwoMethods;

    impl Injectable for TwoMethods {
        fn describe(describe: &mut Describe<Self>) {
            describe
                .inject_method("first", Parameters::new(), |_, _| Ok(()))
                .inject_method("second", Parameters::new(), |_, _| Ok(()));
        }
    }

    #[test]
    #[traced_test]
    fn test_multiple_inject_methods() {
        assert_eq!(
            analyze(&declare::<TwoMethods>()).err(),
            Some(AnalyzeErrorKind::MultipleInjectMethods {
                ty: crate::any::TypeInfo::of::<TwoMethods>(),
                first: "first",
                second: "second",
            })
        );
    }
}
