//! Engine-facing callback trampolines.
//!
//! The engine only knows fixed `extern "C"` signatures. Each trampoline
//! rebuilds safe wrappers from the raw arguments, finds the owning class
//! through the object's private block, and dispatches into the stored
//! closure. A closure error is thrown into JavaScript as an `Error` whose
//! message is the error's display text.
//!
//! Panics are not caught here; a panicking closure aborts at the FFI
//! boundary.

use jsc_raii_sys::*;
use std::collections::BTreeMap;
use std::ffi::CString;
use std::ptr;
use tracing::{debug, trace};

use crate::class::{ClassAttribute, ObjectCallbacks};
use crate::context::Context;
use crate::error::{JscError, JscResult};
use crate::object::Object;
use crate::private::ObjectPrivate;
use crate::property::{NamedFunctionPropertyCallback, NamedValuePropertyCallback};
use crate::string::{JsString, js_string_to_rust};
use crate::value::{Value, ValueType, report};

fn c_name(kind: &str, name: &str) -> JscResult<CString> {
    CString::new(name).map_err(|_| {
        report(
            "JSClassCreate",
            JscError::invalid_argument(format!("{} name '{}' contains a NUL byte", kind, name.escape_debug())),
        )
    })
}

/// Create the engine class for a flattened definition
pub(crate) fn create_class(
    name: &str,
    attribute: ClassAttribute,
    value_properties: &BTreeMap<String, NamedValuePropertyCallback>,
    function_properties: &BTreeMap<String, NamedFunctionPropertyCallback>,
    callbacks: &ObjectCallbacks,
) -> JscResult<JSClassRef> {
    let class_name = c_name("class", name)?;

    // The engine copies names and tables during JSClassCreate
    let value_names = value_properties
        .keys()
        .map(|n| c_name("property", n))
        .collect::<JscResult<Vec<_>>>()?;
    let function_names = function_properties
        .keys()
        .map(|n| c_name("function", n))
        .collect::<JscResult<Vec<_>>>()?;

    let mut static_values: Vec<JSStaticValue> = value_properties
        .values()
        .zip(&value_names)
        .map(|(property, name)| JSStaticValue {
            name: name.as_ptr(),
            getProperty: property.getter_callback().map(|_| get_property_trampoline as _),
            setProperty: property.setter_callback().map(|_| set_property_trampoline as _),
            attributes: property.attribute_mask(),
        })
        .collect();
    let mut static_functions: Vec<JSStaticFunction> = function_properties
        .values()
        .zip(&function_names)
        .map(|(property, name)| JSStaticFunction {
            name: name.as_ptr(),
            callAsFunction: Some(function_property_trampoline),
            attributes: property.attribute_mask(),
        })
        .collect();

    let mut definition = JSClassDefinition {
        attributes: attribute.bits(),
        className: class_name.as_ptr(),
        initialize: callbacks.initialize.as_ref().map(|_| initialize_trampoline as _),
        finalize: Some(finalize_trampoline),
        callAsFunction: callbacks.call_as_function.as_ref().map(|_| call_as_function_trampoline as _),
        callAsConstructor: callbacks
            .call_as_constructor
            .as_ref()
            .map(|_| call_as_constructor_trampoline as _),
        hasInstance: callbacks.has_instance.as_ref().map(|_| has_instance_trampoline as _),
        convertToType: callbacks.convert_to_type.as_ref().map(|_| convert_to_type_trampoline as _),
        ..JSClassDefinition::default()
    };
    if !static_values.is_empty() {
        static_values.push(JSStaticValue {
            name: ptr::null(),
            getProperty: None,
            setProperty: None,
            attributes: K_JS_PROPERTY_ATTRIBUTE_NONE,
        });
        definition.staticValues = static_values.as_ptr();
    }
    if !static_functions.is_empty() {
        static_functions.push(JSStaticFunction {
            name: ptr::null(),
            callAsFunction: None,
            attributes: K_JS_PROPERTY_ATTRIBUTE_NONE,
        });
        definition.staticFunctions = static_functions.as_ptr();
    }

    // SAFETY: definition and every table and name it points to outlive the call
    let raw = unsafe { JSClassCreate(&definition) };
    if raw.is_null() {
        return Err(report(
            "JSClassCreate",
            JscError::runtime(format!("engine refused to create class '{}'", name)),
        ));
    }
    Ok(raw)
}

/// Build an `Error` object carrying `message`
///
/// # Safety
/// `ctx` must be a valid context.
pub(crate) unsafe fn make_exception(ctx: JSContextRef, message: &str) -> JSValueRef {
    let js_message = JsString::new(message);
    // SAFETY: ctx is valid per caller contract
    unsafe {
        let argument = JSValueMakeString(ctx, js_message.raw());
        let error = JSObjectMakeError(ctx, 1, &argument, ptr::null_mut());
        if error.is_null() { argument } else { error }
    }
}

/// Store `err` as the pending exception
///
/// # Safety
/// `ctx` must be valid and `exception` null or writable.
unsafe fn raise(ctx: JSContextRef, exception: *mut JSValueRef, err: &JscError) {
    debug!(error = %err, "class callback failed");
    if !exception.is_null() {
        // SAFETY: exception is writable per caller contract
        unsafe { *exception = make_exception(ctx, &err.to_string()) };
    }
}

/// Collect callback arguments into protected values
///
/// # Safety
/// `arguments` must point to `argument_count` values from `ctx`.
unsafe fn collect_args(ctx: &Context, argument_count: usize, arguments: *const JSValueRef) -> Vec<Value> {
    if argument_count == 0 || arguments.is_null() {
        return Vec::new();
    }
    // SAFETY: forwarded caller contract
    unsafe {
        std::slice::from_raw_parts(arguments, argument_count)
            .iter()
            .map(|raw| Value::from_raw(ctx, *raw))
            .collect()
    }
}

fn missing_private(what: &str) -> JscError {
    JscError::runtime(format!("{} called on an object without class data", what))
}

unsafe extern "C" fn initialize_trampoline(ctx: JSContextRef, object: JSObjectRef) {
    // SAFETY: the engine passes a live context and object
    unsafe {
        ObjectPrivate::attach_pending(object);
        let Some(private) = ObjectPrivate::of(object) else {
            return;
        };
        if let Some(initialize) = private.class().callbacks().initialize.as_ref() {
            trace!(class = private.class().name(), "initialize");
            let ctx = Context::from_raw(ctx);
            initialize(&Object::from_raw(&ctx, object));
        }
    }
}

unsafe extern "C" fn finalize_trampoline(object: JSObjectRef) {
    // SAFETY: called once per object by the collector
    let Some(private) = (unsafe { ObjectPrivate::reclaim(object) }) else {
        return;
    };
    let class = private.class().clone();
    let data = private.into_data();
    if let Some(finalize) = class.callbacks().finalize.as_ref() {
        finalize(data);
    }
}

unsafe extern "C" fn get_property_trampoline(
    ctx: JSContextRef,
    object: JSObjectRef,
    property_name: JSStringRef,
    exception: *mut JSValueRef,
) -> JSValueRef {
    // SAFETY: the engine passes live arguments
    unsafe {
        let name = js_string_to_rust(property_name);
        let getter = ObjectPrivate::of(object)
            .and_then(|p| p.class().value_property(&name))
            .and_then(|p| p.getter_callback());
        let Some(getter) = getter else {
            // Not ours: let the engine continue its lookup
            return ptr::null_mut();
        };
        let ctx = Context::from_raw(ctx);
        match getter(&Object::from_raw(&ctx, object)) {
            Ok(value) => value.raw(),
            Err(err) => {
                raise(ctx.raw(), exception, &err);
                JSValueMakeUndefined(ctx.raw())
            }
        }
    }
}

unsafe extern "C" fn set_property_trampoline(
    ctx: JSContextRef,
    object: JSObjectRef,
    property_name: JSStringRef,
    value: JSValueRef,
    exception: *mut JSValueRef,
) -> bool {
    // SAFETY: the engine passes live arguments
    unsafe {
        let name = js_string_to_rust(property_name);
        let setter = ObjectPrivate::of(object)
            .and_then(|p| p.class().value_property(&name))
            .and_then(|p| p.setter_callback());
        let Some(setter) = setter else {
            return false;
        };
        let ctx = Context::from_raw(ctx);
        let value = Value::from_raw(&ctx, value);
        match setter(&Object::from_raw(&ctx, object), &value) {
            Ok(handled) => handled,
            Err(err) => {
                raise(ctx.raw(), exception, &err);
                true
            }
        }
    }
}

/// Name of a static function, read from its `name` property
unsafe fn function_name(ctx: &Context, function: JSObjectRef) -> JscResult<String> {
    // SAFETY: function is a live object in ctx
    let function = unsafe { Object::from_raw(ctx, function) };
    function.get_property("name")?.to_string()
}

unsafe extern "C" fn function_property_trampoline(
    ctx: JSContextRef,
    function: JSObjectRef,
    this_object: JSObjectRef,
    argument_count: usize,
    arguments: *const JSValueRef,
    exception: *mut JSValueRef,
) -> JSValueRef {
    // SAFETY: the engine passes live arguments
    unsafe {
        let ctx = Context::from_raw(ctx);
        let result = (|| -> JscResult<Value> {
            let name = function_name(&ctx, function)?;
            let this = if this_object.is_null() {
                ctx.global_object()
            } else {
                Object::from_raw(&ctx, this_object)
            };
            let callback = ObjectPrivate::of(this.handle())
                .and_then(|p| p.class().function_property(&name))
                .and_then(|p| p.callback().cloned())
                .ok_or_else(|| missing_private(&format!("function '{}'", name)))?;
            let args = collect_args(&ctx, argument_count, arguments);
            callback(&this, &args)
        })();
        match result {
            Ok(value) => value.raw(),
            Err(err) => {
                raise(ctx.raw(), exception, &err);
                JSValueMakeUndefined(ctx.raw())
            }
        }
    }
}

unsafe extern "C" fn call_as_function_trampoline(
    ctx: JSContextRef,
    function: JSObjectRef,
    this_object: JSObjectRef,
    argument_count: usize,
    arguments: *const JSValueRef,
    exception: *mut JSValueRef,
) -> JSValueRef {
    // SAFETY: the engine passes live arguments
    unsafe {
        let ctx = Context::from_raw(ctx);
        let result = (|| -> JscResult<Value> {
            let callback = ObjectPrivate::of(function)
                .and_then(|p| p.class().callbacks().call_as_function.clone())
                .ok_or_else(|| missing_private("call"))?;
            let function = Object::from_raw(&ctx, function);
            let this = if this_object.is_null() {
                ctx.global_object()
            } else {
                Object::from_raw(&ctx, this_object)
            };
            let args = collect_args(&ctx, argument_count, arguments);
            callback(&function, &this, &args)
        })();
        match result {
            Ok(value) => value.raw(),
            Err(err) => {
                raise(ctx.raw(), exception, &err);
                JSValueMakeUndefined(ctx.raw())
            }
        }
    }
}

unsafe extern "C" fn call_as_constructor_trampoline(
    ctx: JSContextRef,
    constructor: JSObjectRef,
    argument_count: usize,
    arguments: *const JSValueRef,
    exception: *mut JSValueRef,
) -> JSObjectRef {
    // SAFETY: the engine passes live arguments
    unsafe {
        let ctx = Context::from_raw(ctx);
        let result = (|| -> JscResult<Object> {
            let callback = ObjectPrivate::of(constructor)
                .and_then(|p| p.class().callbacks().call_as_constructor.clone())
                .ok_or_else(|| missing_private("new"))?;
            let args = collect_args(&ctx, argument_count, arguments);
            callback(&Object::from_raw(&ctx, constructor), &args)
        })();
        match result {
            Ok(object) => object.raw(),
            Err(err) => {
                raise(ctx.raw(), exception, &err);
                ptr::null_mut()
            }
        }
    }
}

unsafe extern "C" fn has_instance_trampoline(
    ctx: JSContextRef,
    constructor: JSObjectRef,
    possible_instance: JSValueRef,
    exception: *mut JSValueRef,
) -> bool {
    // SAFETY: the engine passes live arguments
    unsafe {
        let ctx = Context::from_raw(ctx);
        let result = (|| -> JscResult<bool> {
            let callback = ObjectPrivate::of(constructor)
                .and_then(|p| p.class().callbacks().has_instance.clone())
                .ok_or_else(|| missing_private("instanceof"))?;
            let candidate = Value::from_raw(&ctx, possible_instance);
            callback(&Object::from_raw(&ctx, constructor), &candidate)
        })();
        result.unwrap_or_else(|err| {
            raise(ctx.raw(), exception, &err);
            false
        })
    }
}

unsafe extern "C" fn convert_to_type_trampoline(
    ctx: JSContextRef,
    object: JSObjectRef,
    type_: JSType,
    exception: *mut JSValueRef,
) -> JSValueRef {
    // SAFETY: the engine passes live arguments
    unsafe {
        let Some(callback) = ObjectPrivate::of(object)
            .and_then(|p| p.class().callbacks().convert_to_type.clone())
        else {
            return ptr::null_mut();
        };
        let ctx = Context::from_raw(ctx);
        match callback(&Object::from_raw(&ctx, object), ValueType::from_raw(type_)) {
            Ok(Some(value)) => value.raw(),
            // Null lets the engine apply its default conversion
            Ok(None) => ptr::null_mut(),
            Err(err) => {
                raise(ctx.raw(), exception, &err);
                ptr::null_mut()
            }
        }
    }
}
