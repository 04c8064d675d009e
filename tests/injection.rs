use core::any::Any;
use entwine::{
    bind, bind_factory, bind_instance, register_injector, BoxedInstance, BuildErrorKind, Config, Describe, Inject, InjectionPoint, Injectable,
    Injector, Lifetime, Overrides, ParameterOverride, Parameters, RegistryBuilder, ResolveErrorKind, Resolver,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing_test::traced_test;

#[derive(Debug, PartialEq)]
struct Settings {
    name: &'static str,
}

trait Logger: Send + Sync {
    fn target(&self) -> &'static str;
}

#[derive(Default)]
struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn target(&self) -> &'static str {
        "console"
    }
}

impl Injectable for ConsoleLogger {
    fn describe(describe: &mut Describe<Self>) {
        describe.default_constructor();
    }
}

#[derive(Default)]
struct Service {
    settings: Option<Arc<Settings>>,
    logger: Option<Arc<dyn Logger>>,
    retries: Option<Arc<u32>>,
    order: Vec<&'static str>,
}

impl Injectable for Service {
    fn describe(describe: &mut Describe<Self>) {
        describe
            .default_constructor()
            .inject_method("start", Parameters::new().one::<u32>("retries"), |this, args| {
                this.retries = Some(args.take(0)?);
                this.order.push("start");
                Ok(())
            })
            .inject_property::<dyn Logger>("logger", |this, logger| {
                this.logger = Some(logger);
                this.order.push("logger");
            })
            .inject_field::<Settings>("settings", |this, settings| {
                this.settings = Some(settings);
                this.order.push("settings");
            });
    }
}

fn registry() -> RegistryBuilder {
    RegistryBuilder::new()
        .provide(bind_instance(Settings { name: "default" }))
        .provide(bind_instance(3u32))
        .provide(bind::<ConsoleLogger>(Lifetime::Singleton).as_contract::<dyn Logger>(|this| this))
        .provide(bind::<Service>(Lifetime::Transient))
}

#[test]
#[traced_test]
fn test_members_injected_in_order() {
    let scope = registry().build().unwrap();
    let service = scope.resolve::<Service>().unwrap();

    assert_eq!(service.order, vec!["settings", "logger", "start"]);
    assert_eq!(service.settings.as_deref(), Some(&Settings { name: "default" }));
    assert_eq!(service.logger.as_ref().unwrap().target(), "console");
    assert_eq!(service.retries.as_deref(), Some(&3));
}

#[test]
#[traced_test]
fn test_inject_existing_instance() {
    let scope = registry().build().unwrap();
    let mut service = Service::default();

    scope.inject(&mut service).unwrap();
    assert_eq!(service.order, vec!["settings", "logger", "start"]);

    let empty = RegistryBuilder::new().build().unwrap();
    let err = empty.inject(&mut Service::default()).err().unwrap();
    assert!(err.to_string().contains("field `settings`"));
}

struct Greeting {
    text: String,
}

impl Injectable for Greeting {
    fn describe(describe: &mut Describe<Self>) {
        describe.constructor(
            Parameters::new().one::<Settings>("settings").one::<u32>("times"),
            |args| {
                let settings = args.take::<Settings>(0)?;
                let times = args.take::<u32>(1)?;
                Ok(Self {
                    text: settings.name.repeat(*times as usize),
                })
            },
        );
    }
}

#[test]
#[traced_test]
fn test_parameter_overrides() {
    let scope = registry()
        .provide(bind::<Greeting>(Lifetime::Transient).with_parameter(ParameterOverride::named::<u32>("times", 2u32)))
        .build()
        .unwrap();

    assert_eq!(scope.resolve::<Greeting>().unwrap().text, "defaultdefault");

    let overridden = scope
        .resolve_with::<Greeting>(&[ParameterOverride::typed::<Settings>(Settings { name: "x" })])
        .unwrap();
    assert_eq!(overridden.text, "xx");

    let typed_first = scope
        .resolve_with::<Greeting>(&[ParameterOverride::typed::<u32>(1u32)])
        .unwrap();
    assert_eq!(typed_first.text, "default");
}

#[derive(Debug, PartialEq)]
enum Region {
    East,
    West,
}

struct Router {
    primary: Arc<String>,
    fallback: Option<Arc<String>>,
}

impl Injectable for Router {
    fn describe(describe: &mut Describe<Self>) {
        describe
            .constructor(Parameters::new().keyed::<String, _>("primary", Region::East), |args| {
                Ok(Self {
                    primary: args.take(0)?,
                    fallback: None,
                })
            })
            .inject_field_keyed::<String, _>("fallback", Region::West, |this, fallback| this.fallback = Some(fallback));
    }
}

#[test]
#[traced_test]
fn test_keyed_injection_points() {
    let scope = RegistryBuilder::new()
        .provide(bind_instance(String::from("east")).keyed(Region::East))
        .provide(bind_instance(String::from("west")).keyed(Region::West))
        .provide(bind::<Router>(Lifetime::Transient))
        .build()
        .unwrap();

    let router = scope.resolve::<Router>().unwrap();
    assert_eq!(router.primary.as_str(), "east");
    assert_eq!(router.fallback.as_deref().map(String::as_str), Some("west"));

    let missing = RegistryBuilder::new()
        .provide(bind_instance(String::from("east")).keyed(Region::East))
        .provide(bind::<Router>(Lifetime::Transient))
        .build()
        .unwrap();
    let err = missing.resolve::<Router>().err().unwrap();
    assert!(matches!(err.innermost(), ResolveErrorKind::NotFoundWithKey { .. }));
}

struct Audit {
    logger: Option<Arc<dyn Logger>>,
    settings: Arc<Settings>,
}

#[test]
#[traced_test]
fn test_factory_dependencies() {
    let scope = RegistryBuilder::new()
        .provide(bind_instance(Settings { name: "audit" }))
        .provide(bind_factory(
            Lifetime::Transient,
            |logger: Option<Inject<dyn Logger>>, Inject(settings): Inject<Settings>| {
                Ok::<_, entwine::InstantiateErrorKind>(Audit {
                    logger: logger.map(|Inject(logger)| logger),
                    settings,
                })
            },
        ))
        .build()
        .unwrap();

    let audit = scope.resolve::<Audit>().unwrap();
    assert!(audit.logger.is_none());
    assert_eq!(audit.settings.name, "audit");

    let failing = RegistryBuilder::new()
        .provide(bind_factory(Lifetime::Transient, |Inject(settings): Inject<Settings>| {
            Ok::<_, entwine::InstantiateErrorKind>(Audit { logger: None, settings })
        }))
        .build()
        .unwrap();
    let err = failing.resolve::<Audit>().err().unwrap();
    assert!(err.to_string().contains("factory argument"));
    assert!(matches!(err.innermost(), ResolveErrorKind::NotFound { .. }));
}

struct Ambiguous;

impl Injectable for Ambiguous {
    fn describe(describe: &mut Describe<Self>) {
        describe
            .constructor(Parameters::new().one::<u8>("a"), |_| Ok(Self))
            .constructor(Parameters::new().one::<u16>("b"), |_| Ok(Self));
    }
}

#[test]
#[traced_test]
fn test_analysis_errors() {
    let result = RegistryBuilder::new().provide(bind::<Ambiguous>(Lifetime::Transient)).build();
    assert!(matches!(result, Err(BuildErrorKind::Analyze(_))));

    let scope = RegistryBuilder::new()
        .with_config(Config {
            validate_on_build: false,
            ..Config::default()
        })
        .provide(bind::<Ambiguous>(Lifetime::Transient))
        .build()
        .unwrap();
    assert!(matches!(scope.resolve::<Ambiguous>(), Err(ResolveErrorKind::Analyze(_))));
}

struct NoConstructor;

impl Injectable for NoConstructor {}

#[test]
#[traced_test]
fn test_implicit_constructor_needs_injector() {
    let scope = RegistryBuilder::new().provide(bind::<NoConstructor>(Lifetime::Transient)).build().unwrap();
    assert!(matches!(
        scope.resolve::<NoConstructor>(),
        Err(ResolveErrorKind::Construction {
            inner: entwine::InstantiateErrorKind::NoConstructor { .. },
            ..
        })
    ));
}

static PRECOMPILED_CALLS: Mutex<Vec<&'static str>> = parking_lot::const_mutex(Vec::new());

struct Widget {
    settings: Arc<Settings>,
    logger: Option<Arc<dyn Logger>>,
}

impl Injectable for Widget {
    fn describe(describe: &mut Describe<Self>) {
        describe.constructor(Parameters::new(), |_| panic!("introspection must not be used"));
    }
}

struct WidgetInjector;

impl Injector for WidgetInjector {
    fn create_instance(&self, resolver: &Resolver<'_>, overrides: Overrides<'_>) -> Result<BoxedInstance, ResolveErrorKind> {
        PRECOMPILED_CALLS.lock().push("create");
        Ok(Box::new(Widget {
            settings: resolver.argument(InjectionPoint::ConstructorParameter("settings"), overrides)?,
            logger: None,
        }))
    }

    fn inject_members(&self, instance: &mut (dyn Any + Send + Sync), resolver: &Resolver<'_>, overrides: Overrides<'_>) -> Result<(), ResolveErrorKind> {
        PRECOMPILED_CALLS.lock().push("members");
        if let Some(widget) = instance.downcast_mut::<Widget>() {
            widget.logger = Some(resolver.argument(InjectionPoint::Property("logger"), overrides)?);
        }
        Ok(())
    }
}

#[test]
#[traced_test]
fn test_precompiled_injector_preferred() {
    register_injector::<Widget>(WidgetInjector);
    let scope = registry()
        .provide(bind::<Widget>(Lifetime::Transient))
        .build()
        .unwrap();

    let widget = scope
        .resolve_with::<Widget>(&[ParameterOverride::named::<Settings>("settings", Settings { name: "widget" })])
        .unwrap();
    assert_eq!(widget.settings.name, "widget");
    assert_eq!(widget.logger.as_ref().unwrap().target(), "console");
    assert_eq!(*PRECOMPILED_CALLS.lock(), vec!["create", "members"]);
}

#[derive(Default)]
struct BaseHandler {
    logger: Option<Arc<dyn Logger>>,
    calls: usize,
}

impl Injectable for BaseHandler {
    fn describe(describe: &mut Describe<Self>) {
        describe.default_constructor().inject_property::<dyn Logger>("logger", |this, logger| {
            this.logger = Some(logger);
            this.calls += 1;
        });
    }
}

#[derive(Default)]
struct AuditHandler {
    base: BaseHandler,
    overridden: usize,
}

impl Injectable for AuditHandler {
    fn describe(describe: &mut Describe<Self>) {
        describe
            .default_constructor()
            .base(|this| &mut this.base)
            .property::<dyn Logger>("logger", |this, logger| {
                this.base.logger = Some(logger);
                this.overridden += 1;
            });
    }
}

#[test]
#[traced_test]
fn test_overridden_member_injected_once() {
    let scope = registry().build().unwrap();

    let mut handler = AuditHandler::default();
    scope.inject(&mut handler).unwrap();
    assert_eq!(handler.overridden, 1);
    assert_eq!(handler.base.calls, 0);
    assert!(handler.base.logger.is_some());

    let scope = registry().provide(bind::<AuditHandler>(Lifetime::Transient)).build().unwrap();
    let resolved = scope.resolve::<AuditHandler>().unwrap();
    assert_eq!(resolved.overridden, 1);
    assert_eq!(resolved.base.calls, 0);
}
