//! Safe wrapper around JSC values with automatic GC protection

use jsc_raii_sys::*;
use std::marker::PhantomData;
use std::ptr;
use tracing::error;

use crate::class::Class;
use crate::context::Context;
use crate::counter;
use crate::error::{JscError, JscResult};
use crate::object::Object;
use crate::private::ObjectPrivate;
use crate::string::{JsString, js_string_to_rust};

/// The engine's primitive classification of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueType {
    Undefined,
    Null,
    Boolean,
    Number,
    String,
    Object,
    Symbol,
    BigInt,
}

impl ValueType {
    pub(crate) fn from_raw(raw: JSType) -> Self {
        match raw {
            K_JS_TYPE_UNDEFINED => Self::Undefined,
            K_JS_TYPE_NULL => Self::Null,
            K_JS_TYPE_BOOLEAN => Self::Boolean,
            K_JS_TYPE_NUMBER => Self::Number,
            K_JS_TYPE_STRING => Self::String,
            K_JS_TYPE_SYMBOL => Self::Symbol,
            K_JS_TYPE_BIGINT => Self::BigInt,
            _ => Self::Object,
        }
    }
}

/// A JavaScript value with automatic GC protection
///
/// The wrapper keeps a clone of its owning [`Context`], so the context stays
/// alive at least as long as any value created in it. Each live wrapper
/// holds one `JSValueProtect` on the handle.
///
/// # Thread Safety
///
/// This type is `!Send` and `!Sync` because JavaScript values are tied to
/// their context's thread. Cross-thread access causes undefined behavior.
pub struct Value {
    ctx: Context,
    raw: JSValueRef,
    /// Marker to make this type !Send + !Sync
    _not_send: PhantomData<*mut ()>,
}

impl Value {
    /// Create a new protected value
    ///
    /// # Safety
    /// The value must be valid for the given context
    pub unsafe fn from_raw(ctx: &Context, raw: JSValueRef) -> Self {
        if !raw.is_null() {
            // SAFETY: ctx and raw are valid per caller contract
            unsafe { JSValueProtect(ctx.raw(), raw) };
        }
        counter::VALUE.created();
        Self {
            ctx: ctx.clone(),
            raw,
            _not_send: PhantomData,
        }
    }

    /// Get the raw value reference
    pub fn raw(&self) -> JSValueRef {
        self.raw
    }

    /// The context this value belongs to
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Whether the handle was moved out with [`Value::take`]
    pub fn is_taken(&self) -> bool {
        self.raw.is_null()
    }

    /// Move the handle out, leaving this wrapper empty.
    ///
    /// An empty value is safe to drop; any other use of it panics.
    pub fn take(&mut self) -> Self {
        counter::VALUE.created();
        Self {
            ctx: self.ctx.clone(),
            raw: std::mem::replace(&mut self.raw, ptr::null_mut()),
            _not_send: PhantomData,
        }
    }

    /// The live handle; panics on a taken value
    pub(crate) fn handle(&self) -> JSValueRef {
        assert!(!self.raw.is_null(), "use of a taken Value");
        self.raw
    }

    pub(crate) fn ctx_raw(&self) -> JSContextRef {
        self.ctx.raw()
    }

    pub fn value_type(&self) -> ValueType {
        // SAFETY: handle is live and belongs to ctx
        ValueType::from_raw(unsafe { JSValueGetType(self.ctx_raw(), self.handle()) })
    }

    /// Check if the value is undefined
    pub fn is_undefined(&self) -> bool {
        // SAFETY: handle is live and belongs to ctx
        unsafe { JSValueIsUndefined(self.ctx_raw(), self.handle()) }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        // SAFETY: handle is live and belongs to ctx
        unsafe { JSValueIsNull(self.ctx_raw(), self.handle()) }
    }

    /// Check if the value is a boolean
    pub fn is_boolean(&self) -> bool {
        // SAFETY: handle is live and belongs to ctx
        unsafe { JSValueIsBoolean(self.ctx_raw(), self.handle()) }
    }

    /// Check if the value is a number
    pub fn is_number(&self) -> bool {
        // SAFETY: handle is live and belongs to ctx
        unsafe { JSValueIsNumber(self.ctx_raw(), self.handle()) }
    }

    /// Check if the value is a string
    pub fn is_string(&self) -> bool {
        // SAFETY: handle is live and belongs to ctx
        unsafe { JSValueIsString(self.ctx_raw(), self.handle()) }
    }

    /// Check if the value is an object
    pub fn is_object(&self) -> bool {
        // SAFETY: handle is live and belongs to ctx
        unsafe { JSValueIsObject(self.ctx_raw(), self.handle()) }
    }

    /// Check if the value is an array
    pub fn is_array(&self) -> bool {
        // SAFETY: handle is live and belongs to ctx
        unsafe { JSValueIsArray(self.ctx_raw(), self.handle()) }
    }

    /// Check if the value is a Date
    pub fn is_date(&self) -> bool {
        // SAFETY: handle is live and belongs to ctx
        unsafe { JSValueIsDate(self.ctx_raw(), self.handle()) }
    }

    /// Check if the value is a callable object
    pub fn is_function(&self) -> bool {
        // SAFETY: handle is live; JSObjectIsFunction is only reached for objects
        self.is_object() && unsafe { JSObjectIsFunction(self.ctx_raw(), self.handle()) }
    }

    /// Check if the value is an instance of the built-in `Error`
    pub fn is_error(&self) -> bool {
        self.is_instance_of_builtin("Error")
    }

    /// Check if the value is an instance of the built-in `RegExp`
    pub fn is_regexp(&self) -> bool {
        self.is_instance_of_builtin("RegExp")
    }

    fn is_instance_of_builtin(&self, constructor_name: &str) -> bool {
        if !self.is_object() {
            return false;
        }
        let constructor = self
            .ctx
            .global_object()
            .get_property(constructor_name)
            .ok()
            .and_then(|value| Object::try_from(value).ok());
        match constructor {
            Some(constructor) => self.is_instance_of(&constructor).unwrap_or(false),
            None => false,
        }
    }

    /// Whether this value is an object created from `class`, or from a
    /// class that derives from it.
    pub fn is_object_of_class(&self, class: &Class) -> bool {
        if !self.is_object() {
            return false;
        }
        if class.raw().is_null() {
            // Every object is an instance of the engine default class
            return true;
        }
        // SAFETY: handle is live, class.raw() is a live class
        if unsafe { JSValueIsObjectOfClass(self.ctx_raw(), self.handle(), class.raw()) } {
            return true;
        }
        // SAFETY: handle is a live object
        match unsafe { ObjectPrivate::of(self.handle()) } {
            Some(private) => private.class().derives_from(class),
            None => false,
        }
    }

    /// JavaScript `instanceof`
    pub fn is_instance_of(&self, constructor: &Object) -> JscResult<bool> {
        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: both handles are live in the same context group
        let result = unsafe {
            JSValueIsInstanceOfConstructor(
                self.ctx_raw(),
                self.handle(),
                constructor.handle(),
                &mut exception,
            )
        };
        if !exception.is_null() {
            return Err(self.ctx.runtime_error("JSValueIsInstanceOfConstructor", exception));
        }
        Ok(result)
    }

    /// JavaScript `==` (with type coercion)
    pub fn is_equal(&self, other: &Value) -> JscResult<bool> {
        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: both handles are live in the same context group
        let result =
            unsafe { JSValueIsEqual(self.ctx_raw(), self.handle(), other.handle(), &mut exception) };
        if !exception.is_null() {
            return Err(self.ctx.runtime_error("JSValueIsEqual", exception));
        }
        Ok(result)
    }

    /// Convert to boolean
    pub fn to_bool(&self) -> bool {
        // SAFETY: handle is live and belongs to ctx
        unsafe { JSValueToBoolean(self.ctx_raw(), self.handle()) }
    }

    /// Convert to number
    pub fn to_number(&self) -> JscResult<f64> {
        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: handle is live and belongs to ctx
        let result = unsafe { JSValueToNumber(self.ctx_raw(), self.handle(), &mut exception) };
        if !exception.is_null() {
            return Err(self.ctx.runtime_error("JSValueToNumber", exception));
        }
        Ok(result)
    }

    /// Convert to an engine string
    pub fn to_js_string(&self) -> JscResult<JsString> {
        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: handle is live and belongs to ctx
        let js_str = unsafe { JSValueToStringCopy(self.ctx_raw(), self.handle(), &mut exception) };
        if !exception.is_null() || js_str.is_null() {
            return Err(self.ctx.runtime_error("JSValueToStringCopy", exception));
        }
        // SAFETY: "Copy" results carry one reference for the caller
        Ok(unsafe { JsString::from_owned_raw(js_str) })
    }

    /// Convert to string
    pub fn to_string(&self) -> JscResult<String> {
        self.to_js_string().map(|s| s.to_rust_string())
    }

    /// Serialize as JSON text, as `JSON.stringify(value, null, indent)` would
    pub fn to_json(&self, indent: u32) -> JscResult<String> {
        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: handle is live and belongs to ctx
        let js_str =
            unsafe { JSValueCreateJSONString(self.ctx_raw(), self.handle(), indent, &mut exception) };
        if !exception.is_null() {
            return Err(self.ctx.runtime_error("JSValueCreateJSONString", exception));
        }
        if js_str.is_null() {
            return Err(JscError::runtime(format!(
                "{:?} value has no JSON representation",
                self.value_type()
            )));
        }
        // SAFETY: "Create" results carry one reference for the caller
        Ok(unsafe { JsString::from_owned_raw(js_str) }.to_rust_string())
    }

    /// Deserialize from JSON to Rust type
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> JscResult<T> {
        let json = self.to_json(0)?;
        serde_json::from_str(&json).map_err(JscError::Json)
    }

    /// Convert to an object, boxing primitives as `ToObject` does
    pub fn to_object(&self) -> JscResult<Object> {
        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: handle is live and belongs to ctx
        let object = unsafe { JSValueToObject(self.ctx_raw(), self.handle(), &mut exception) };
        if !exception.is_null() || object.is_null() {
            return Err(self.ctx.runtime_error("JSValueToObject", exception));
        }
        // SAFETY: object was just produced in ctx
        Ok(unsafe { Object::from_raw(&self.ctx, object) })
    }

    /// Short type name used in mismatch errors
    pub(crate) fn type_name(&self) -> &'static str {
        match self.value_type() {
            ValueType::Undefined => "Undefined",
            ValueType::Null => "Null",
            ValueType::Boolean => "Boolean",
            ValueType::Number => "Number",
            ValueType::String => "String",
            ValueType::Symbol => "Symbol",
            ValueType::BigInt => "BigInt",
            ValueType::Object if self.is_function() => "Function",
            ValueType::Object if self.is_array() => "Array",
            ValueType::Object => "Object",
        }
    }
}

impl Clone for Value {
    fn clone(&self) -> Self {
        if !self.raw.is_null() {
            // SAFETY: self.raw is live in self.ctx
            unsafe { JSValueProtect(self.ctx.raw(), self.raw) };
        }
        counter::VALUE.cloned();
        Self {
            ctx: self.ctx.clone(),
            raw: self.raw,
            _not_send: PhantomData,
        }
    }
}

impl Drop for Value {
    fn drop(&mut self) {
        counter::VALUE.dropped();
        if !self.raw.is_null() {
            // SAFETY: value was protected in from_raw(), now unprotecting
            unsafe { JSValueUnprotect(self.ctx.raw(), self.raw) };
        }
    }
}

/// JavaScript `===`
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if self.raw.is_null() || other.raw.is_null() {
            return self.raw == other.raw;
        }
        // SAFETY: both handles are live
        unsafe { JSValueIsStrictEqual(self.ctx_raw(), self.raw, other.raw) }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.raw.is_null() {
            return write!(f, "Value(<taken>)");
        }
        match self.to_string() {
            Ok(s) => write!(f, "Value({})", s),
            Err(_) => write!(f, "Value(<opaque>)"),
        }
    }
}

/// String conversion of a thrown value, used as the message of the error
/// reported for it.
///
/// # Safety
/// `ctx` must be a valid context and `exception` null or a value in it.
pub(crate) unsafe fn exception_message(ctx: JSContextRef, exception: JSValueRef) -> String {
    if exception.is_null() {
        return "Unknown error".to_string();
    }

    // SAFETY: ctx and exception are valid per caller contract
    unsafe {
        let mut nested: JSValueRef = ptr::null_mut();
        let js_str = JSValueToStringCopy(ctx, exception, &mut nested);
        if js_str.is_null() || !nested.is_null() {
            return "Unknown error".to_string();
        }
        let message = js_string_to_rust(js_str);
        JSStringRelease(js_str);
        message
    }
}

/// Log and build the error for an engine exception
pub(crate) fn report(operation: &str, error: JscError) -> JscError {
    error!("{}: {}", operation, error);
    error
}
