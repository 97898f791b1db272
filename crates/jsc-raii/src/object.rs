//! JavaScript object wrapper

use jsc_raii_sys::*;
use std::any::Any;
use std::ops::Deref;
use std::ptr;

use crate::class::Class;
use crate::context::Context;
use crate::error::{JscError, JscResult};
use crate::private::ObjectPrivate;
use crate::property::PropertyAttribute;
use crate::string::{JsString, js_string_to_rust};
use crate::value::Value;

/// A JavaScript object
///
/// Derefs to [`Value`] for the predicates and conversions every value has.
#[derive(Clone, PartialEq)]
pub struct Object(Value);

impl Object {
    /// Create an object wrapper
    ///
    /// # Safety
    /// `raw` must be a valid object in `ctx`
    pub unsafe fn from_raw(ctx: &Context, raw: JSObjectRef) -> Self {
        // SAFETY: forwarded caller contract
        Self(unsafe { Value::from_raw(ctx, raw) })
    }

    pub(crate) fn from_value_unchecked(value: Value) -> Self {
        Self(value)
    }

    /// Get as a plain value
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Get a property by name
    pub fn get_property(&self, name: &str) -> JscResult<Value> {
        let js_name = JsString::new(name);
        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: handle and js_name are live
        let result = unsafe {
            JSObjectGetProperty(self.ctx_raw(), self.handle(), js_name.raw(), &mut exception)
        };
        if !exception.is_null() {
            return Err(self.context().runtime_error("JSObjectGetProperty", exception));
        }
        // SAFETY: result was just produced in this context
        Ok(unsafe { Value::from_raw(self.context(), result) })
    }

    /// Set a property by name with the given attributes
    pub fn set_property(
        &self,
        name: &str,
        value: &Value,
        attributes: impl IntoIterator<Item = PropertyAttribute>,
    ) -> JscResult<()> {
        let js_name = JsString::new(name);
        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: all handles are live
        unsafe {
            JSObjectSetProperty(
                self.ctx_raw(),
                self.handle(),
                js_name.raw(),
                value.handle(),
                PropertyAttribute::mask(attributes),
                &mut exception,
            );
        }
        if !exception.is_null() {
            return Err(self.context().runtime_error("JSObjectSetProperty", exception));
        }
        Ok(())
    }

    /// Check if the object or its prototype chain has a property
    pub fn has_property(&self, name: &str) -> bool {
        let js_name = JsString::new(name);
        // SAFETY: handle and js_name are live
        unsafe { JSObjectHasProperty(self.ctx_raw(), self.handle(), js_name.raw()) }
    }

    /// Delete a property. Returns `false` when the property is `DontDelete`.
    pub fn delete_property(&self, name: &str) -> JscResult<bool> {
        let js_name = JsString::new(name);
        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: handle and js_name are live
        let deleted = unsafe {
            JSObjectDeleteProperty(self.ctx_raw(), self.handle(), js_name.raw(), &mut exception)
        };
        if !exception.is_null() {
            return Err(self.context().runtime_error("JSObjectDeleteProperty", exception));
        }
        Ok(deleted)
    }

    /// Get an indexed property
    pub fn get_property_at_index(&self, index: u32) -> JscResult<Value> {
        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: handle is live
        let result = unsafe {
            JSObjectGetPropertyAtIndex(self.ctx_raw(), self.handle(), index, &mut exception)
        };
        if !exception.is_null() {
            return Err(self.context().runtime_error("JSObjectGetPropertyAtIndex", exception));
        }
        // SAFETY: result was just produced in this context
        Ok(unsafe { Value::from_raw(self.context(), result) })
    }

    /// Set an indexed property
    pub fn set_property_at_index(&self, index: u32, value: &Value) -> JscResult<()> {
        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: handles are live
        unsafe {
            JSObjectSetPropertyAtIndex(
                self.ctx_raw(),
                self.handle(),
                index,
                value.handle(),
                &mut exception,
            );
        }
        if !exception.is_null() {
            return Err(self.context().runtime_error("JSObjectSetPropertyAtIndex", exception));
        }
        Ok(())
    }

    /// Names of the enumerable properties, own and inherited
    pub fn property_names(&self) -> Vec<String> {
        // SAFETY: handle is live; the name array is released before returning
        unsafe {
            let names = JSObjectCopyPropertyNames(self.ctx_raw(), self.handle());
            let count = JSPropertyNameArrayGetCount(names);
            let mut result = Vec::with_capacity(count);
            for i in 0..count {
                result.push(js_string_to_rust(JSPropertyNameArrayGetNameAtIndex(names, i)));
            }
            JSPropertyNameArrayRelease(names);
            result
        }
    }

    /// Whether the object can be called with `new`
    pub fn is_constructor(&self) -> bool {
        // SAFETY: handle is live
        unsafe { JSObjectIsConstructor(self.ctx_raw(), self.handle()) }
    }

    /// Call this object as a function. `this_object` defaults to the global
    /// object.
    pub fn call_as_function(&self, this_object: Option<&Object>, args: &[Value]) -> JscResult<Value> {
        if !self.is_function() {
            return Err(JscError::type_mismatch("Function", self.type_name()));
        }
        let raw_args: Vec<JSValueRef> = args.iter().map(Value::handle).collect();
        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: raw_args holds live values for the duration of the call
        let result = unsafe {
            JSObjectCallAsFunction(
                self.ctx_raw(),
                self.handle(),
                this_object.map_or(ptr::null_mut(), |o| o.handle()),
                raw_args.len(),
                if raw_args.is_empty() { ptr::null() } else { raw_args.as_ptr() },
                &mut exception,
            )
        };
        if !exception.is_null() {
            return Err(self.context().runtime_error("JSObjectCallAsFunction", exception));
        }
        // SAFETY: result was just produced in this context
        Ok(unsafe { Value::from_raw(self.context(), result) })
    }

    /// Call this object as a constructor, as `new` would
    pub fn call_as_constructor(&self, args: &[Value]) -> JscResult<Object> {
        if !self.is_constructor() {
            return Err(JscError::type_mismatch("Constructor", self.type_name()));
        }
        let raw_args: Vec<JSValueRef> = args.iter().map(Value::handle).collect();
        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: raw_args holds live values for the duration of the call
        let result = unsafe {
            JSObjectCallAsConstructor(
                self.ctx_raw(),
                self.handle(),
                raw_args.len(),
                if raw_args.is_empty() { ptr::null() } else { raw_args.as_ptr() },
                &mut exception,
            )
        };
        if !exception.is_null() || result.is_null() {
            return Err(self.context().runtime_error("JSObjectCallAsConstructor", exception));
        }
        // SAFETY: result was just produced in this context
        Ok(unsafe { Object::from_raw(self.context(), result) })
    }

    /// The object's prototype
    pub fn prototype(&self) -> Value {
        // SAFETY: handle is live
        unsafe { Value::from_raw(self.context(), JSObjectGetPrototype(self.ctx_raw(), self.handle())) }
    }

    /// Replace the object's prototype
    pub fn set_prototype(&self, prototype: &Value) {
        // SAFETY: handles are live
        unsafe { JSObjectSetPrototype(self.ctx_raw(), self.handle(), prototype.handle()) };
    }

    fn private(&self) -> Option<&ObjectPrivate> {
        // SAFETY: handle is a live object; the private block lives as long
        // as the object, which self keeps protected
        unsafe { ObjectPrivate::of(self.handle()) }
    }

    /// The class this object was created from, when it was created from a
    /// class built by this crate
    pub fn class(&self) -> Option<Class> {
        self.private().map(|p| p.class().clone())
    }

    /// Whether private data of type `T` is attached
    pub fn has_private_data<T: Any>(&self) -> bool {
        self.with_private_data(|_: &mut T| ()).is_some()
    }

    /// Run `f` on the attached private data.
    ///
    /// Returns `None` when the object has no private storage, holds no data,
    /// holds data of another type, or is already borrowed further up the
    /// stack.
    pub fn with_private_data<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.private()?.with_data(f)
    }

    /// Attach private data, returning what was attached before.
    ///
    /// Fails with [`JscError::InvalidArgument`] when the object was not
    /// created from a class built by this crate.
    pub fn set_private_data(
        &self,
        data: Box<dyn Any + Send>,
    ) -> JscResult<Option<Box<dyn Any + Send>>> {
        match self.private() {
            Some(private) => private.replace_data(Some(data)),
            None => Err(JscError::invalid_argument("object has no private storage")),
        }
    }

    /// Detach and return the private data
    pub fn take_private_data(&self) -> Option<Box<dyn Any + Send>> {
        self.private()?.replace_data(None).ok().flatten()
    }
}

impl Deref for Object {
    type Target = Value;

    fn deref(&self) -> &Value {
        &self.0
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Value {
        object.0
    }
}

impl TryFrom<Value> for Object {
    type Error = JscError;

    fn try_from(value: Value) -> JscResult<Self> {
        if value.is_object() {
            Ok(Self(value))
        } else {
            Err(JscError::type_mismatch("Object", value.type_name()))
        }
    }
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Object(")?;
        match self.0.to_json(0) {
            Ok(json) => write!(f, "{}", json)?,
            Err(_) => write!(f, "<{}>", self.0.type_name())?,
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContextGroup;

    fn context() -> Context {
        ContextGroup::new().create_context()
    }

    #[test]
    fn test_get_set_property() {
        let ctx = context();
        let obj = ctx.create_object();
        obj.set_property("answer", &ctx.create_number(42), []).unwrap();
        assert!(obj.has_property("answer"));
        assert_eq!(obj.get_property("answer").unwrap().to_number().unwrap(), 42.0);
        assert!(obj.get_property("missing").unwrap().is_undefined());
    }

    #[test]
    fn test_read_only_property() {
        let ctx = context();
        let obj = ctx.create_object();
        obj.set_property("fixed", &ctx.create_number(1), [PropertyAttribute::ReadOnly])
            .unwrap();
        ctx.evaluate_script("this.fixed = 2;", Some(&obj), "", 1).unwrap();
        assert_eq!(obj.get_property("fixed").unwrap().to_number().unwrap(), 1.0);
    }

    #[test]
    fn test_dont_delete_property() {
        let ctx = context();
        let obj = ctx.create_object();
        obj.set_property("kept", &ctx.create_boolean(true), [PropertyAttribute::DontDelete])
            .unwrap();
        obj.set_property("gone", &ctx.create_boolean(true), []).unwrap();
        assert!(!obj.delete_property("kept").unwrap());
        assert!(obj.delete_property("gone").unwrap());
        assert!(obj.has_property("kept"));
        assert!(!obj.has_property("gone"));
    }

    #[test]
    fn test_dont_enum_hides_from_names() {
        let ctx = context();
        let obj = ctx.create_object();
        obj.set_property("visible", &ctx.create_null(), []).unwrap();
        obj.set_property("hidden", &ctx.create_null(), [PropertyAttribute::DontEnum])
            .unwrap();
        assert_eq!(obj.property_names(), vec!["visible".to_string()]);
    }

    #[test]
    fn test_indexed_properties() {
        let ctx = context();
        let obj = ctx.create_object();
        obj.set_property_at_index(0, &ctx.create_string("zero")).unwrap();
        assert_eq!(obj.get_property_at_index(0).unwrap().to_string().unwrap(), "zero");
        assert!(obj.get_property_at_index(5).unwrap().is_undefined());
    }

    #[test]
    fn test_call_as_function_and_constructor() {
        let ctx = context();
        let f: Object = ctx
            .evaluate_script("(function (x) { this.x = x; return x * 2; })", None, "", 1)
            .unwrap()
            .try_into()
            .unwrap();
        let doubled = f.call_as_function(None, &[ctx.create_number(21).into()]).unwrap();
        assert_eq!(doubled.to_number().unwrap(), 42.0);

        let instance = f.call_as_constructor(&[ctx.create_number(5).into()]).unwrap();
        assert_eq!(instance.get_property("x").unwrap().to_number().unwrap(), 5.0);
    }

    #[test]
    fn test_call_non_function_is_type_mismatch() {
        let ctx = context();
        let obj = ctx.create_object();
        assert!(obj.call_as_function(None, &[]).unwrap_err().is_type_mismatch());
        assert!(obj.call_as_constructor(&[]).unwrap_err().is_type_mismatch());
    }

    #[test]
    fn test_call_propagates_exception() {
        let ctx = context();
        let f = ctx.create_function("throw new RangeError('out');", &[], "", "", 1).unwrap();
        let err = f.call_as_function(None, &[]).unwrap_err();
        assert!(err.is_runtime());
        assert_eq!(err.message(), "RangeError: out");
    }

    #[test]
    fn test_prototype() {
        let ctx = context();
        let proto = ctx.create_object();
        proto.set_property("inherited", &ctx.create_number(1), []).unwrap();
        let obj = ctx.create_object();
        obj.set_prototype(&proto);
        assert!(obj.prototype() == *proto);
        assert!(obj.has_property("inherited"));
    }

    #[test]
    fn test_try_from_value() {
        let ctx = context();
        let err = Object::try_from(ctx.create_number(1).into_value()).unwrap_err();
        assert!(err.is_type_mismatch());
        assert!(Object::try_from(ctx.create_object().into_value()).is_ok());
    }

    #[test]
    fn test_plain_object_has_no_private_storage() {
        let ctx = context();
        let obj = ctx.create_object();
        assert!(obj.class().is_none());
        assert!(!obj.has_private_data::<u32>());
        assert!(obj.set_private_data(Box::new(1u32)).unwrap_err().is_invalid_argument());
    }
}
