//! Execution contexts

use jsc_raii_sys::*;
use std::any::Any;
use std::hash::{Hash, Hasher};
use std::ptr;
use tracing::{debug, trace, warn};

use crate::class::Class;
use crate::context_group::ContextGroup;
use crate::counter;
use crate::error::{JscError, JscResult};
use crate::object::Object;
use crate::private::{self, ObjectPrivate};
use crate::string::JsString;
use crate::sync::InstanceLock;
use crate::typed::{Array, Boolean, Date, Error, Function, Null, Number, RegExp, Undefined};
use crate::value::{Value, exception_message, report};

/// A JavaScript execution context: one global object plus the state
/// scripts run against.
///
/// Contexts are only created through a [`ContextGroup`]. A context keeps its
/// group alive, and every [`Value`] keeps its context alive, so handles can
/// be dropped in any order.
pub struct Context {
    group: ContextGroup,
    raw: JSGlobalContextRef,
    lock: InstanceLock,
}

// SAFETY: JSGlobalContextRetain/Release are atomic in the engine, and every
// engine-entering call on a shared instance goes through the instance lock.
#[cfg(feature = "thread-safe")]
unsafe impl Send for Context {}
#[cfg(feature = "thread-safe")]
unsafe impl Sync for Context {}

impl Context {
    pub(crate) fn create_in_group(group: ContextGroup, global_object_class: &Class) -> Context {
        let private = ObjectPrivate::for_instance(global_object_class, None);

        // SAFETY: group and class handles are live; the pending slot lets the
        // class initialize callback find its private data during creation
        let raw = private::with_pending_global(private, || unsafe {
            JSGlobalContextCreateInGroup(group.raw(), global_object_class.raw())
        });
        if raw.is_null() {
            if !private.is_null() {
                // SAFETY: never handed to the engine
                drop(unsafe { Box::from_raw(private) });
            }
            panic!("JSGlobalContextCreateInGroup returned null");
        }

        if !private.is_null() {
            // SAFETY: raw is a live context; its global object is an instance
            // of a class with private storage. The initialize callback may
            // already have attached the block.
            let attached = unsafe {
                let global = JSContextGetGlobalObject(raw);
                JSObjectGetPrivate(global) == private.cast()
                    || JSObjectSetPrivate(global, private.cast())
            };
            if !attached {
                warn!(class = global_object_class.name(), "global object has no private storage");
                // SAFETY: the engine refused the pointer, so it is still ours
                drop(unsafe { Box::from_raw(private) });
            }
        }

        debug!(
            context = ?raw,
            class = global_object_class.name(),
            "created global context"
        );
        counter::CONTEXT.created();
        Context {
            group,
            raw,
            lock: InstanceLock::default(),
        }
    }

    /// Wrap the global context behind any context reference, taking new
    /// references to the context and its group. Used by class callbacks.
    ///
    /// # Safety
    /// `ctx` must be a valid JSContextRef.
    pub unsafe fn from_raw(ctx: JSContextRef) -> Context {
        // SAFETY: ctx is valid per caller contract
        unsafe {
            let raw = JSContextGetGlobalContext(ctx);
            JSGlobalContextRetain(raw);
            counter::CONTEXT.created();
            Context {
                group: ContextGroup::from_raw(JSContextGetGroup(ctx)),
                raw,
                lock: InstanceLock::default(),
            }
        }
    }

    /// Get the raw context pointer
    pub fn raw(&self) -> JSContextRef {
        self.raw
    }

    /// Whether the handle was moved out with [`Context::take`]
    pub fn is_taken(&self) -> bool {
        self.raw.is_null()
    }

    /// Move the handle out, leaving this wrapper empty.
    ///
    /// The group reference moves with it. An empty context is safe to drop
    /// and releases nothing; any other use of it panics.
    pub fn take(&mut self) -> Self {
        let _guard = self.lock.lock();
        counter::CONTEXT.created();
        Self {
            group: self.group.take(),
            raw: std::mem::replace(&mut self.raw, ptr::null_mut()),
            lock: InstanceLock::default(),
        }
    }

    /// Exchange handles with `other`
    pub fn swap(&mut self, other: &mut Self) {
        let _mine = self.lock.lock();
        let _theirs = other.lock.lock();
        std::mem::swap(&mut self.raw, &mut other.raw);
        std::mem::swap(&mut self.group, &mut other.group);
    }

    /// Copy-and-swap assignment: share `rhs`'s handle and release the old one
    pub fn assign(&mut self, rhs: &Self) {
        let mut copy = rhs.clone();
        self.swap(&mut copy);
    }

    fn handle(&self) -> JSContextRef {
        assert!(!self.raw.is_null(), "use of a taken Context");
        self.raw
    }

    /// The group this context belongs to
    pub fn context_group(&self) -> ContextGroup {
        self.group.clone()
    }

    /// The global object
    pub fn global_object(&self) -> Object {
        let _guard = self.lock.lock();
        // SAFETY: handle is a live context
        unsafe { Object::from_raw(self, JSContextGetGlobalObject(self.handle())) }
    }

    /// Build the error for a thrown value, logging it first
    pub(crate) fn runtime_error(&self, operation: &str, exception: JSValueRef) -> JscError {
        // SAFETY: exception was produced in this context
        let message = unsafe { exception_message(self.raw, exception) };
        report(operation, JscError::Runtime(message))
    }

    fn invalid_argument_error(&self, operation: &str, exception: JSValueRef) -> JscError {
        // SAFETY: exception was produced in this context
        let message = unsafe { exception_message(self.raw, exception) };
        report(operation, JscError::InvalidArgument(message))
    }

    /// Parse JSON text into a value
    pub fn create_value_from_json(&self, json: &str) -> JscResult<Value> {
        let _guard = self.lock.lock();
        let js_json = JsString::new(json);
        // SAFETY: handle and js_json are live
        let raw = unsafe { JSValueMakeFromJSONString(self.handle(), js_json.raw()) };
        if raw.is_null() {
            return Err(report(
                "JSValueMakeFromJSONString",
                JscError::invalid_argument(format!("input is not valid JSON: {}", json)),
            ));
        }
        // SAFETY: raw was just produced in this context
        Ok(unsafe { Value::from_raw(self, raw) })
    }

    /// Create a string value
    pub fn create_string(&self, s: &str) -> Value {
        let _guard = self.lock.lock();
        let js_str = JsString::new(s);
        // SAFETY: handle and js_str are live; the engine retains the string
        unsafe { Value::from_raw(self, JSValueMakeString(self.handle(), js_str.raw())) }
    }

    /// Create `undefined`
    pub fn create_undefined(&self) -> Undefined {
        let _guard = self.lock.lock();
        // SAFETY: handle is a live context
        let value = unsafe { Value::from_raw(self, JSValueMakeUndefined(self.handle())) };
        Undefined::from_unchecked(value)
    }

    /// Create `null`
    pub fn create_null(&self) -> Null {
        let _guard = self.lock.lock();
        // SAFETY: handle is a live context
        let value = unsafe { Value::from_raw(self, JSValueMakeNull(self.handle())) };
        Null::from_unchecked(value)
    }

    /// Create a boolean
    pub fn create_boolean(&self, b: bool) -> Boolean {
        let _guard = self.lock.lock();
        // SAFETY: handle is a live context
        let value = unsafe { Value::from_raw(self, JSValueMakeBoolean(self.handle(), b)) };
        Boolean::from_unchecked(value)
    }

    /// Create a number from anything losslessly convertible to `f64`
    pub fn create_number(&self, n: impl Into<f64>) -> Number {
        let _guard = self.lock.lock();
        // SAFETY: handle is a live context
        let value = unsafe { Value::from_raw(self, JSValueMakeNumber(self.handle(), n.into())) };
        Number::from_unchecked(value)
    }

    /// Create an empty plain object
    pub fn create_object(&self) -> Object {
        let _guard = self.lock.lock();
        // SAFETY: a null class creates a plain object
        unsafe { Object::from_raw(self, JSObjectMake(self.handle(), ptr::null_mut(), ptr::null_mut())) }
    }

    /// Create an instance of `class`, attaching `private_data` to it.
    ///
    /// The class finalize callback receives the data back when the engine
    /// collects the object. The engine default class has no private storage,
    /// so any data passed with it is dropped immediately.
    pub fn create_object_of_class(
        &self,
        class: &Class,
        private_data: Option<Box<dyn Any + Send>>,
    ) -> Object {
        let _guard = self.lock.lock();
        if class.raw().is_null() && private_data.is_some() {
            warn!("private data dropped: the default class has no private storage");
        }
        let private = ObjectPrivate::for_instance(class, private_data);
        // SAFETY: class is live; ownership of private moves to the engine and
        // comes back through the finalize callback
        let raw = unsafe { JSObjectMake(self.handle(), class.raw(), private.cast()) };
        trace!(class = class.name(), object = ?raw, "created object");
        // SAFETY: raw was just produced in this context
        unsafe { Object::from_raw(self, raw) }
    }

    fn raw_args(args: &[Value]) -> Vec<JSValueRef> {
        args.iter().map(Value::handle).collect()
    }

    fn make_with_args(
        &self,
        operation: &str,
        args: &[Value],
        make: unsafe extern "C" fn(JSContextRef, usize, *const JSValueRef, *mut JSValueRef) -> JSObjectRef,
    ) -> JscResult<Object> {
        let _guard = self.lock.lock();
        let raw_args = Self::raw_args(args);
        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: raw_args holds live values for the duration of the call
        let raw = unsafe {
            make(
                self.handle(),
                raw_args.len(),
                if raw_args.is_empty() { ptr::null() } else { raw_args.as_ptr() },
                &mut exception,
            )
        };
        if !exception.is_null() || raw.is_null() {
            return Err(self.runtime_error(operation, exception));
        }
        // SAFETY: raw was just produced in this context
        Ok(unsafe { Object::from_raw(self, raw) })
    }

    /// Create an array holding `elements`
    pub fn create_array(&self, elements: &[Value]) -> JscResult<Array> {
        self.make_with_args("JSObjectMakeArray", elements, JSObjectMakeArray)
            .map(Array::from_unchecked)
    }

    /// Create a Date as `new Date(...arguments)` would
    pub fn create_date(&self, arguments: &[Value]) -> JscResult<Date> {
        self.make_with_args("JSObjectMakeDate", arguments, JSObjectMakeDate)
            .map(Date::from_unchecked)
    }

    /// Create an Error as `new Error(...arguments)` would
    pub fn create_error(&self, arguments: &[Value]) -> JscResult<Error> {
        self.make_with_args("JSObjectMakeError", arguments, JSObjectMakeError)
            .map(Error::from_unchecked)
    }

    /// Create a RegExp as `new RegExp(...arguments)` would
    pub fn create_regexp(&self, arguments: &[Value]) -> JscResult<RegExp> {
        self.make_with_args("JSObjectMakeRegExp", arguments, JSObjectMakeRegExp)
            .map(RegExp::from_unchecked)
    }

    /// Compile a function from source.
    ///
    /// An empty `function_name` makes an anonymous function; an empty
    /// `source_url` leaves the source unattributed. A syntax error in `body`
    /// is reported as [`JscError::InvalidArgument`].
    pub fn create_function(
        &self,
        body: &str,
        parameter_names: &[&str],
        function_name: &str,
        source_url: &str,
        starting_line_number: i32,
    ) -> JscResult<Function> {
        let _guard = self.lock.lock();
        let js_body = JsString::new(body);
        let js_name = (!function_name.is_empty()).then(|| JsString::new(function_name));
        let js_url = (!source_url.is_empty()).then(|| JsString::new(source_url));
        let js_params: Vec<JsString> = parameter_names.iter().map(|p| JsString::new(p)).collect();
        let raw_params: Vec<JSStringRef> = js_params.iter().map(JsString::raw).collect();

        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: every string handle stays alive across the call
        let raw = unsafe {
            JSObjectMakeFunction(
                self.handle(),
                js_name.as_ref().map_or(ptr::null_mut(), JsString::raw),
                raw_params.len() as std::os::raw::c_uint,
                if raw_params.is_empty() { ptr::null() } else { raw_params.as_ptr() },
                js_body.raw(),
                js_url.as_ref().map_or(ptr::null_mut(), JsString::raw),
                starting_line_number,
                &mut exception,
            )
        };
        if !exception.is_null() || raw.is_null() {
            return Err(self.invalid_argument_error("JSObjectMakeFunction", exception));
        }
        // SAFETY: raw was just produced in this context
        Ok(Function::from_unchecked(unsafe { Object::from_raw(self, raw) }))
    }

    /// Evaluate a script.
    ///
    /// `this_object` defaults to the global object. An empty `source_url`
    /// leaves the source unattributed. A thrown value becomes
    /// [`JscError::Runtime`] carrying its string conversion.
    pub fn evaluate_script(
        &self,
        script: &str,
        this_object: Option<&Object>,
        source_url: &str,
        starting_line_number: i32,
    ) -> JscResult<Value> {
        let _guard = self.lock.lock();
        let js_script = JsString::new(script);
        let js_url = (!source_url.is_empty()).then(|| JsString::new(source_url));
        let mut exception: JSValueRef = ptr::null_mut();

        // SAFETY: every handle stays alive across the call
        let result = unsafe {
            JSEvaluateScript(
                self.handle(),
                js_script.raw(),
                this_object.map_or(ptr::null_mut(), |o| o.handle()),
                js_url.as_ref().map_or(ptr::null_mut(), JsString::raw),
                starting_line_number,
                &mut exception,
            )
        };
        if !exception.is_null() {
            return Err(self.runtime_error("JSEvaluateScript", exception));
        }
        // SAFETY: result was just produced in this context
        Ok(unsafe { Value::from_raw(self, result) })
    }

    /// Check a script for syntax errors without running it.
    ///
    /// Returns `Ok(true)` for valid syntax; a syntax error becomes
    /// [`JscError::InvalidArgument`] carrying the engine's message.
    pub fn check_script_syntax(
        &self,
        script: &str,
        source_url: &str,
        starting_line_number: i32,
    ) -> JscResult<bool> {
        let _guard = self.lock.lock();
        let js_script = JsString::new(script);
        let js_url = (!source_url.is_empty()).then(|| JsString::new(source_url));
        let mut exception: JSValueRef = ptr::null_mut();

        // SAFETY: every handle stays alive across the call
        let valid = unsafe {
            JSCheckScriptSyntax(
                self.handle(),
                js_script.raw(),
                js_url.as_ref().map_or(ptr::null_mut(), JsString::raw),
                starting_line_number,
                &mut exception,
            )
        };
        if !valid || !exception.is_null() {
            return Err(self.invalid_argument_error("JSCheckScriptSyntax", exception));
        }
        Ok(true)
    }

    /// Ask the engine to collect garbage at its next opportunity
    pub fn garbage_collect(&self) {
        let _guard = self.lock.lock();
        // SAFETY: handle is a live context
        unsafe { JSGarbageCollect(self.handle()) };
    }

    /// Run a full collection synchronously. Intended for tests that need
    /// finalizers to run at a known point.
    #[cfg(feature = "debug-gc")]
    pub fn synchronous_garbage_collect_for_debugging(&self) {
        let _guard = self.lock.lock();
        // SAFETY: handle is a live context
        unsafe { JSSynchronousGarbageCollectForDebugging(self.handle()) };
    }
}

impl Clone for Context {
    fn clone(&self) -> Self {
        let _guard = self.lock.lock();
        if !self.raw.is_null() {
            // SAFETY: self.raw is a live context
            unsafe { JSGlobalContextRetain(self.raw) };
        }
        counter::CONTEXT.cloned();
        Self {
            group: self.group.clone(),
            raw: self.raw,
            lock: InstanceLock::default(),
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        counter::CONTEXT.dropped();
        if !self.raw.is_null() {
            trace!(context = ?self.raw, "releasing global context");
            // SAFETY: this wrapper owns exactly one reference
            unsafe { JSGlobalContextRelease(self.raw) };
        }
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Context {}

impl Hash for Context {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.raw as usize).hash(state);
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("raw", &self.raw)
            .field("group", &self.group)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> Context {
        ContextGroup::new().create_context()
    }

    #[test]
    fn test_evaluate_arithmetic() {
        let ctx = context();
        let result = ctx.evaluate_script("1 + 2", None, "", 1).unwrap();
        assert_eq!(result.to_number().unwrap(), 3.0);
    }

    #[test]
    fn test_evaluate_throw_is_runtime_error() {
        let ctx = context();
        let err = ctx.evaluate_script("throw 'x'", None, "", 1).unwrap_err();
        assert!(err.is_runtime());
        assert_eq!(err.message(), "x");
    }

    #[test]
    fn test_evaluate_with_source_url() {
        let ctx = context();
        let err = ctx
            .evaluate_script("null.boom", None, "file:///boom.js", 10)
            .unwrap_err();
        assert!(err.is_runtime());
        assert!(err.message().contains("TypeError"));
    }

    #[test]
    fn test_evaluate_with_this_object() {
        let ctx = context();
        let this = ctx.create_object();
        this.set_property("tag", &ctx.create_string("mine"), []).unwrap();
        let result = ctx.evaluate_script("this.tag", Some(&this), "", 1).unwrap();
        assert_eq!(result.to_string().unwrap(), "mine");
    }

    #[test]
    fn test_check_script_syntax() {
        let ctx = context();
        assert!(ctx.check_script_syntax("var a = 1;", "", 1).unwrap());
        let err = ctx.check_script_syntax("var = ;", "", 1).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(err.message().contains("SyntaxError"));
    }

    #[test]
    fn test_create_value_from_json() {
        let ctx = context();
        let value = ctx.create_value_from_json("[1, 2, 3]").unwrap();
        assert!(value.is_array());
        let err = ctx.create_value_from_json("{not json").unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_create_primitives() {
        let ctx = context();
        assert!(ctx.create_undefined().is_undefined());
        assert!(ctx.create_null().is_null());
        assert!(ctx.create_boolean(false).is_boolean());
        assert_eq!(ctx.create_number(7u8).value(), 7.0);
        assert_eq!(ctx.create_number(-2i32).value(), -2.0);
        assert_eq!(ctx.create_string("s").to_string().unwrap(), "s");
    }

    #[test]
    fn test_create_builtin_objects() {
        let ctx = context();
        let array = ctx
            .create_array(&[ctx.create_number(1).into(), ctx.create_string("two")])
            .unwrap();
        assert_eq!(array.length().unwrap(), 2);

        let date = ctx.create_date(&[ctx.create_number(0).into()]).unwrap();
        assert!(date.is_date());

        let error = ctx.create_error(&[ctx.create_string("bad")]).unwrap();
        assert_eq!(error.message().unwrap(), "bad");

        let regexp = ctx
            .create_regexp(&[ctx.create_string("a+"), ctx.create_string("g")])
            .unwrap();
        assert!(regexp.is_regexp());
    }

    #[test]
    fn test_create_regexp_invalid_pattern() {
        let ctx = context();
        let err = ctx.create_regexp(&[ctx.create_string("(")]).unwrap_err();
        assert!(err.is_runtime());
    }

    #[test]
    fn test_create_function() {
        let ctx = context();
        let add = ctx
            .create_function("return a + b;", &["a", "b"], "add", "", 1)
            .unwrap();
        let result = add
            .call(None, &[ctx.create_number(2).into(), ctx.create_number(3).into()])
            .unwrap();
        assert_eq!(result.to_number().unwrap(), 5.0);
        assert_eq!(add.get_property("name").unwrap().to_string().unwrap(), "add");
    }

    #[test]
    fn test_create_function_syntax_error() {
        let ctx = context();
        let err = ctx.create_function("return +;", &[], "", "", 1).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_create_function_rejects_bad_names() {
        let ctx = context();
        let err = ctx
            .create_function("return 1;", &["1a"], "f", "", 1)
            .unwrap_err();
        assert!(err.is_invalid_argument(), "{err}");

        let err = ctx
            .create_function("return 1;", &[], "my name", "", 1)
            .unwrap_err();
        assert!(err.is_invalid_argument(), "{err}");
    }

    #[test]
    fn test_create_function_without_name_is_anonymous() {
        let ctx = context();
        let f = ctx.create_function("return 7;", &[], "", "", 1).unwrap();
        assert_eq!(f.call(None, &[]).unwrap().to_number().unwrap(), 7.0);
        assert_eq!(f.get_property("name").unwrap().to_string().unwrap(), "anonymous");
    }

    #[test]
    fn test_global_object_persists_state() {
        let ctx = context();
        ctx.evaluate_script("var counter = 41;", None, "", 1).unwrap();
        ctx.evaluate_script("counter++;", None, "", 1).unwrap();
        let counter = ctx.global_object().get_property("counter").unwrap();
        assert_eq!(counter.to_number().unwrap(), 42.0);
    }

    #[test]
    fn test_clone_is_same_context() {
        let ctx = context();
        let copy = ctx.clone();
        assert_eq!(ctx, copy);
        ctx.evaluate_script("var shared = 1;", None, "", 1).unwrap();
        assert!(copy.global_object().has_property("shared"));
    }

    #[test]
    fn test_take_leaves_empty() {
        let mut ctx = context();
        let moved = ctx.take();
        assert!(ctx.is_taken());
        assert!(ctx.context_group().is_taken());
        assert!(!moved.is_taken());
        assert!(!moved.context_group().is_taken());
        assert_ne!(ctx, moved);
    }

    #[test]
    fn test_swap_and_assign() {
        let mut a = context();
        let mut b = context();
        let (raw_a, raw_b) = (a.raw(), b.raw());
        a.swap(&mut b);
        assert_eq!(a.raw(), raw_b);
        assert_eq!(b.raw(), raw_a);

        a.assign(&b);
        assert_eq!(a, b);
        assert_eq!(a.context_group(), b.context_group());
    }

    #[test]
    fn test_values_outlive_context_handle() {
        let ctx = context();
        let value = ctx.evaluate_script("({ kept: true })", None, "", 1).unwrap();
        drop(ctx);
        assert_eq!(value.to_json(0).unwrap(), r#"{"kept":true}"#);
    }

    #[test]
    fn test_garbage_collect() {
        let ctx = context();
        for _ in 0..100 {
            ctx.create_object();
        }
        ctx.garbage_collect();
    }

    #[cfg(feature = "debug-gc")]
    #[test]
    fn test_synchronous_garbage_collect() {
        let ctx = context();
        let kept = ctx.create_object();
        ctx.synchronous_garbage_collect_for_debugging();
        assert!(kept.is_object());
    }
}
