//! Custom classes end to end: property tables, object callbacks, private
//! data, inheritance and registration.

use jsc_raii::{
    ClassAttribute, ClassBuilder, ClassRegistry, ContextGroup, JscError, NamedFunctionPropertyCallback,
    NamedValuePropertyCallback, Object, PropertyAttribute, Value, ValueType,
};
use serial_test::serial;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Point {
    x: f64,
    y: f64,
}

fn point_class(registry: &ClassRegistry) -> jsc_raii::Class {
    ClassBuilder::new("Point")
        .version(1)
        .value_property(
            NamedValuePropertyCallback::accessor(
                "x",
                |this: &Object| {
                    let x = this.with_private_data(|p: &mut Point| p.x).unwrap_or(f64::NAN);
                    Ok(this.context().create_number(x).into())
                },
                |this: &Object, value: &Value| {
                    let x = value.to_number()?;
                    Ok(this.with_private_data(|p: &mut Point| p.x = x).is_some())
                },
                [PropertyAttribute::DontDelete],
            )
            .unwrap(),
        )
        .value_property(
            NamedValuePropertyCallback::getter(
                "y",
                |this: &Object| {
                    let y = this.with_private_data(|p: &mut Point| p.y).unwrap_or(f64::NAN);
                    Ok(this.context().create_number(y).into())
                },
                [],
            )
            .unwrap(),
        )
        .value_property(
            NamedValuePropertyCallback::getter(
                "broken",
                |_: &Object| Err(JscError::runtime("boom")),
                [PropertyAttribute::DontEnum],
            )
            .unwrap(),
        )
        .function_property(
            NamedFunctionPropertyCallback::function(
                "norm",
                |this: &Object, _args: &[Value]| {
                    let norm = this
                        .with_private_data(|p: &mut Point| (p.x * p.x + p.y * p.y).sqrt())
                        .ok_or_else(|| JscError::runtime("not a point"))?;
                    Ok(this.context().create_number(norm).into())
                },
                [],
            )
            .unwrap(),
        )
        .function_property(
            NamedFunctionPropertyCallback::function(
                "scale",
                |this: &Object, args: &[Value]| {
                    let factor = match args.first() {
                        Some(arg) => arg.to_number()?,
                        None => return Err(JscError::invalid_argument("scale needs a factor")),
                    };
                    this.with_private_data(|p: &mut Point| {
                        p.x *= factor;
                        p.y *= factor;
                    });
                    Ok(this.clone().into_value())
                },
                [],
            )
            .unwrap(),
        )
        .build(registry)
        .unwrap()
}

fn eval(ctx: &jsc_raii::Context, script: &str) -> Value {
    ctx.evaluate_script(script, None, "", 1).unwrap()
}

#[test]
fn test_value_and_function_properties() {
    let registry = ClassRegistry::new();
    let class = point_class(&registry);
    let ctx = ContextGroup::new().create_context();

    let point = ctx.create_object_of_class(&class, Some(Box::new(Point { x: 3.0, y: 4.0 })));
    ctx.global_object().set_property("p", &point, []).unwrap();

    assert_eq!(eval(&ctx, "p.x").to_number().unwrap(), 3.0);
    assert_eq!(eval(&ctx, "p.norm()").to_number().unwrap(), 5.0);

    eval(&ctx, "p.x = 6; p.scale(0.5);");
    assert_eq!(point.with_private_data(|p: &mut Point| *p), Some(Point { x: 3.0, y: 2.0 }));
    assert!(eval(&ctx, "p.scale(2) === p").to_bool());
}

#[test]
fn test_read_only_getter_ignores_assignment() {
    let registry = ClassRegistry::new();
    let class = point_class(&registry);
    let ctx = ContextGroup::new().create_context();
    let point = ctx.create_object_of_class(&class, Some(Box::new(Point { x: 1.0, y: 2.0 })));
    ctx.global_object().set_property("p", &point, []).unwrap();

    eval(&ctx, "p.y = 100;");
    assert_eq!(eval(&ctx, "p.y").to_number().unwrap(), 2.0);
}

#[test]
fn test_callback_error_becomes_js_exception() {
    let registry = ClassRegistry::new();
    let class = point_class(&registry);
    let ctx = ContextGroup::new().create_context();
    let point = ctx.create_object_of_class(&class, Some(Box::new(Point { x: 0.0, y: 0.0 })));
    ctx.global_object().set_property("p", &point, []).unwrap();

    let caught = eval(&ctx, "try { p.broken; 'no' } catch (e) { e instanceof Error ? e.message : 'bad' }");
    assert_eq!(caught.to_string().unwrap(), "Runtime error: boom");

    let err = ctx.evaluate_script("p.scale()", None, "", 1).unwrap_err();
    assert!(err.is_runtime());
    assert!(err.message().contains("scale needs a factor"));
}

#[test]
fn test_function_on_foreign_receiver_throws() {
    let registry = ClassRegistry::new();
    let class = point_class(&registry);
    let ctx = ContextGroup::new().create_context();
    let point = ctx.create_object_of_class(&class, Some(Box::new(Point { x: 0.0, y: 0.0 })));
    ctx.global_object().set_property("p", &point, []).unwrap();

    let err = ctx.evaluate_script("p.norm.call({})", None, "", 1).unwrap_err();
    assert!(err.is_runtime());
    assert!(err.message().contains("norm"));
}

#[test]
fn test_private_data_access() {
    let registry = ClassRegistry::new();
    let class = point_class(&registry);
    let ctx = ContextGroup::new().create_context();
    let point = ctx.create_object_of_class(&class, None);

    assert!(!point.has_private_data::<Point>());
    assert!(point.set_private_data(Box::new(Point { x: 1.0, y: 1.0 })).unwrap().is_none());
    assert!(point.has_private_data::<Point>());
    assert!(!point.has_private_data::<String>());
    assert_eq!(point.class(), Some(class));

    let taken = point.take_private_data().unwrap();
    assert_eq!(*taken.downcast::<Point>().unwrap(), Point { x: 1.0, y: 1.0 });
    assert!(eval(&ctx, "1").is_number());
}

#[test]
fn test_initialize_runs_on_creation() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&created);
    let registry = ClassRegistry::new();
    let class = ClassBuilder::new("Tracked")
        .initialize(move |this: &Object| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = this.set_property("tagged", &this.context().create_boolean(true), []);
        })
        .build(&registry)
        .unwrap();

    let ctx = ContextGroup::new().create_context();
    let a = ctx.create_object_of_class(&class, None);
    let _b = ctx.create_object_of_class(&class, None);
    assert_eq!(created.load(Ordering::SeqCst), 2);
    assert!(a.get_property("tagged").unwrap().to_bool());
}

#[test]
fn test_object_callbacks() {
    let registry = ClassRegistry::new();
    let class = ClassBuilder::new("Callable")
        .call_as_function(|function: &Object, _this: &Object, args: &[Value]| {
            let ctx = function.context();
            let mut sum = 0.0;
            for arg in args {
                sum += arg.to_number()?;
            }
            Ok(ctx.create_number(sum).into())
        })
        .call_as_constructor(|constructor: &Object, args: &[Value]| {
            let instance = constructor.context().create_object();
            if let Some(first) = args.first() {
                instance.set_property("n", first, [])?;
            }
            Ok(instance)
        })
        .has_instance(|_constructor: &Object, candidate: &Value| Ok(candidate.is_number()))
        .convert_to_type(|this: &Object, hint: ValueType| match hint {
            ValueType::Number => Ok(Some(this.context().create_number(21).into())),
            _ => Ok(None),
        })
        .build(&registry)
        .unwrap();

    let ctx = ContextGroup::new().create_context();
    let callable = ctx.create_object_of_class(&class, None);
    assert!(callable.is_function());
    assert!(callable.is_constructor());
    ctx.global_object().set_property("callable", &callable, []).unwrap();

    assert_eq!(eval(&ctx, "callable(1, 2, 3)").to_number().unwrap(), 6.0);
    assert_eq!(eval(&ctx, "new callable(7).n").to_number().unwrap(), 7.0);
    assert!(eval(&ctx, "5 instanceof callable").to_bool());
    assert!(!eval(&ctx, "'5' instanceof callable").to_bool());
    assert_eq!(eval(&ctx, "callable * 2").to_number().unwrap(), 42.0);

    let sum = callable
        .call_as_function(None, &[ctx.create_number(4).into(), ctx.create_number(5).into()])
        .unwrap();
    assert_eq!(sum.to_number().unwrap(), 9.0);
}

#[test]
fn test_inheritance() {
    let registry = ClassRegistry::new();
    let base = ClassBuilder::new("Animal")
        .function_property(
            NamedFunctionPropertyCallback::function(
                "speak",
                |this: &Object, _: &[Value]| Ok(this.context().create_string("...")),
                [],
            )
            .unwrap(),
        )
        .function_property(
            NamedFunctionPropertyCallback::function(
                "kind",
                |this: &Object, _: &[Value]| Ok(this.context().create_string("animal")),
                [],
            )
            .unwrap(),
        )
        .build(&registry)
        .unwrap();
    let dog = ClassBuilder::new("Dog")
        .parent(&base)
        .function_property(
            NamedFunctionPropertyCallback::function(
                "speak",
                |this: &Object, _: &[Value]| Ok(this.context().create_string("woof")),
                [],
            )
            .unwrap(),
        )
        .build(&registry)
        .unwrap();

    let ctx = ContextGroup::new().create_context();
    let rex = ctx.create_object_of_class(&dog, None);
    let generic = ctx.create_object_of_class(&base, None);
    ctx.global_object().set_property("rex", &rex, []).unwrap();

    assert_eq!(eval(&ctx, "rex.speak()").to_string().unwrap(), "woof");
    assert_eq!(eval(&ctx, "rex.kind()").to_string().unwrap(), "animal");

    assert!(rex.is_object_of_class(&dog));
    assert!(rex.is_object_of_class(&base));
    assert!(!generic.is_object_of_class(&dog));
    assert!(!ctx.create_object().is_object_of_class(&base));
    assert!(!ctx.create_number(1).is_object_of_class(&base));
}

#[test]
fn test_no_automatic_prototype() {
    let registry = ClassRegistry::new();
    let class = ClassBuilder::new("Flat")
        .attribute(ClassAttribute::NoAutomaticPrototype)
        .function_property(
            NamedFunctionPropertyCallback::function(
                "ping",
                |this: &Object, _: &[Value]| Ok(this.context().create_string("pong")),
                [],
            )
            .unwrap(),
        )
        .build(&registry)
        .unwrap();

    let ctx = ContextGroup::new().create_context();
    let flat = ctx.create_object_of_class(&class, None);
    ctx.global_object().set_property("flat", &flat, []).unwrap();
    assert_eq!(eval(&ctx, "flat.ping()").to_string().unwrap(), "pong");
    assert!(eval(&ctx, "Object.getPrototypeOf(flat) === Object.prototype").to_bool());
}

#[test]
fn test_custom_global_object() {
    let registry = ClassRegistry::new();
    let global = ClassBuilder::new("HostGlobal")
        .value_property(
            NamedValuePropertyCallback::getter(
                "hostVersion",
                |this: &Object| Ok(this.context().create_number(3).into()),
                [],
            )
            .unwrap(),
        )
        .build(&registry)
        .unwrap();

    let group = ContextGroup::new();
    let ctx = group.create_context_with_class(&global);
    assert_eq!(eval(&ctx, "hostVersion").to_number().unwrap(), 3.0);
    assert_eq!(eval(&ctx, "typeof JSON.parse").to_string().unwrap(), "function");
    assert!(ctx.global_object().is_object_of_class(&global));
}

#[test]
fn test_global_initialize_keeps_plain_objects_classless() {
    let registry = ClassRegistry::new();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    let global = ClassBuilder::new("InitGlobal")
        .initialize(move |this: &Object| {
            let plain = this.context().create_object();
            let mut seen = record.lock().unwrap();
            seen.push(this.class().map(|c| c.name().to_string()));
            seen.push(plain.class().map(|c| c.name().to_string()));
            let rejected = plain.set_private_data(Box::new(7u32)).is_err();
            seen.push(Some(rejected.to_string()));
        })
        .build(&registry)
        .unwrap();

    let ctx = ContextGroup::new().create_context_with_class(&global);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![Some("InitGlobal".to_string()), None, Some("true".to_string())]
    );
    let global_object = ctx.global_object();
    assert!(global_object.is_object_of_class(&global));
    assert!(!global_object.has_private_data::<u32>());
    assert!(!ctx.create_object().is_object_of_class(&global));
}

#[test]
fn test_nul_in_property_name_rejected() {
    let registry = ClassRegistry::new();
    let err = ClassBuilder::new("Nul")
        .value_property(
            NamedValuePropertyCallback::getter(
                "a\0b",
                |this: &Object| Ok(this.context().create_null().into()),
                [],
            )
            .unwrap(),
        )
        .build(&registry)
        .unwrap_err();
    assert!(err.is_invalid_argument());
    assert!(!registry.contains("Nul"));
}

#[test]
#[serial]
fn test_global_registry_rejects_duplicates() {
    let registry = ClassRegistry::global();
    let name = "GlobalRegistryDuplicate";
    let first = ClassBuilder::new(name).build(registry).unwrap();
    let err = ClassBuilder::new(name).build(registry).unwrap_err();
    assert!(err.is_runtime());
    assert_eq!(registry.get(name), Some(first));
    assert!(registry.names().iter().any(|n| n == name));
}

#[cfg(feature = "debug-gc")]
#[test]
#[serial]
fn test_finalize_receives_private_data() {
    static FINALIZED: AtomicUsize = AtomicUsize::new(0);

    let registry = ClassRegistry::new();
    let class = ClassBuilder::new("Finalized")
        .finalize(|data| {
            if let Some(point) = data.and_then(|d| d.downcast::<Point>().ok()) {
                FINALIZED.fetch_add(point.x as usize, Ordering::SeqCst);
            }
        })
        .build(&registry)
        .unwrap();

    #[inline(never)]
    fn make_garbage(ctx: &jsc_raii::Context, class: &jsc_raii::Class) {
        for _ in 0..100 {
            ctx.create_object_of_class(class, Some(Box::new(Point { x: 1.0, y: 0.0 })));
        }
    }

    let ctx = ContextGroup::new().create_context();
    make_garbage(&ctx, &class);
    ctx.synchronous_garbage_collect_for_debugging();
    // The collector scans the stack conservatively, so a few may survive
    let finalized = FINALIZED.load(Ordering::SeqCst);
    assert!(finalized > 0 && finalized <= 100, "finalized {finalized}");
}

#[cfg(feature = "performance-counter")]
#[test]
#[serial]
fn test_counters_track_clones() {
    use jsc_raii::counter;

    let before = counter::CONTEXT_GROUP.snapshot();
    let group = ContextGroup::new();
    let copy = group.clone();
    drop(copy);
    let after = counter::CONTEXT_GROUP.snapshot();
    assert!(after.created > before.created);
    assert!(after.cloned > before.cloned);
    assert!(after.dropped > before.dropped);
}
