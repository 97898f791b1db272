//! Custom object classes
//!
//! A [`Class`] is built once with a [`ClassBuilder`], registered by name in a
//! [`ClassRegistry`], and then used to create objects
//! ([`Context::create_object_of_class`](crate::Context::create_object_of_class))
//! or custom global objects
//! ([`ContextGroup::create_context_with_class`](crate::ContextGroup::create_context_with_class)).

use jsc_raii_sys::*;
use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::hash::{Hash, Hasher};
use std::ptr;
use std::sync::Arc;
use tracing::debug;

use crate::callback;
use crate::counter;
use crate::error::{JscError, JscResult};
use crate::object::Object;
use crate::property::{NamedFunctionPropertyCallback, NamedValuePropertyCallback};
use crate::registry::ClassRegistry;
use crate::value::{Value, ValueType, report};

/// Class-level behavior flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClassAttribute {
    #[default]
    None,
    /// Do not create a prototype object holding the static functions;
    /// instances use `Object.prototype` and carry the functions themselves
    NoAutomaticPrototype,
}

impl ClassAttribute {
    pub(crate) fn bits(self) -> JSClassAttributes {
        match self {
            Self::None => K_JS_CLASS_ATTRIBUTE_NONE,
            Self::NoAutomaticPrototype => K_JS_CLASS_ATTRIBUTE_NO_AUTOMATIC_PROTOTYPE,
        }
    }
}

/// Runs once when an instance is created, parent class first
pub type InitializeCallback = Arc<dyn Fn(&Object) + Send + Sync>;

/// Runs when the engine collects an instance, receiving its private data.
/// Runs inside the collector, so it must not call into the engine.
pub type FinalizeCallback = Arc<dyn Fn(Option<Box<dyn Any + Send>>) + Send + Sync>;

/// Called as `instance(...args)`, with the instance and `this`
pub type CallAsFunctionCallback =
    Arc<dyn Fn(&Object, &Object, &[Value]) -> JscResult<Value> + Send + Sync>;

/// Called as `new instance(...args)`
pub type CallAsConstructorCallback =
    Arc<dyn Fn(&Object, &[Value]) -> JscResult<Object> + Send + Sync>;

/// Answers `value instanceof instance`
pub type HasInstanceCallback = Arc<dyn Fn(&Object, &Value) -> JscResult<bool> + Send + Sync>;

/// Converts an instance to a primitive; `Ok(None)` defers to the engine
pub type ConvertToTypeCallback =
    Arc<dyn Fn(&Object, ValueType) -> JscResult<Option<Value>> + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct ObjectCallbacks {
    pub(crate) initialize: Option<InitializeCallback>,
    pub(crate) finalize: Option<FinalizeCallback>,
    pub(crate) call_as_function: Option<CallAsFunctionCallback>,
    pub(crate) call_as_constructor: Option<CallAsConstructorCallback>,
    pub(crate) has_instance: Option<HasInstanceCallback>,
    pub(crate) convert_to_type: Option<ConvertToTypeCallback>,
}

impl ObjectCallbacks {
    /// Own callbacks win; missing ones come from `parent`
    fn inherit(self, parent: &ObjectCallbacks) -> Self {
        Self {
            initialize: self.initialize.or_else(|| parent.initialize.clone()),
            finalize: self.finalize.or_else(|| parent.finalize.clone()),
            call_as_function: self.call_as_function.or_else(|| parent.call_as_function.clone()),
            call_as_constructor: self
                .call_as_constructor
                .or_else(|| parent.call_as_constructor.clone()),
            has_instance: self.has_instance.or_else(|| parent.has_instance.clone()),
            convert_to_type: self.convert_to_type.or_else(|| parent.convert_to_type.clone()),
        }
    }
}

struct ClassInner {
    raw: JSClassRef,
    name: String,
    version: u32,
    attribute: ClassAttribute,
    parent: Option<Class>,
    value_properties: BTreeMap<String, NamedValuePropertyCallback>,
    function_properties: BTreeMap<String, NamedFunctionPropertyCallback>,
    callbacks: ObjectCallbacks,
}

// SAFETY: JSClassRef reference counting is thread-safe in the engine and the
// class is immutable after creation; every callback is Send + Sync.
unsafe impl Send for ClassInner {}
unsafe impl Sync for ClassInner {}

impl Drop for ClassInner {
    fn drop(&mut self) {
        if !self.raw.is_null() {
            // SAFETY: ClassInner owns the reference from JSClassCreate
            unsafe { JSClassRelease(self.raw) };
        }
    }
}

/// An immutable class definition backed by a `JSClassRef`.
///
/// Cloning shares the definition. `Class::default()` is the engine's default
/// class: plain objects, no private storage, no custom behavior.
pub struct Class {
    inner: Arc<ClassInner>,
}

impl Class {
    pub fn raw(&self) -> JSClassRef {
        self.inner.raw
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn version(&self) -> u32 {
        self.inner.version
    }

    pub fn attribute(&self) -> ClassAttribute {
        self.inner.attribute
    }

    pub fn parent(&self) -> Option<&Class> {
        self.inner.parent.as_ref()
    }

    /// Value properties, including inherited ones, ordered by name
    pub fn value_properties(&self) -> impl Iterator<Item = &NamedValuePropertyCallback> {
        self.inner.value_properties.values()
    }

    /// Function properties, including inherited ones, ordered by name
    pub fn function_properties(&self) -> impl Iterator<Item = &NamedFunctionPropertyCallback> {
        self.inner.function_properties.values()
    }

    /// Whether this class is `ancestor` or derives from it
    pub fn derives_from(&self, ancestor: &Class) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class == ancestor {
                return true;
            }
            current = class.parent();
        }
        false
    }

    pub(crate) fn value_property(&self, name: &str) -> Option<&NamedValuePropertyCallback> {
        self.inner.value_properties.get(name)
    }

    pub(crate) fn function_property(&self, name: &str) -> Option<&NamedFunctionPropertyCallback> {
        self.inner.function_properties.get(name)
    }

    pub(crate) fn callbacks(&self) -> &ObjectCallbacks {
        &self.inner.callbacks
    }
}

impl Default for Class {
    fn default() -> Self {
        counter::CLASS.created();
        Self {
            inner: Arc::new(ClassInner {
                raw: ptr::null_mut(),
                name: "Default".to_string(),
                version: 0,
                attribute: ClassAttribute::None,
                parent: None,
                value_properties: BTreeMap::new(),
                function_properties: BTreeMap::new(),
                callbacks: ObjectCallbacks::default(),
            }),
        }
    }
}

impl Clone for Class {
    fn clone(&self) -> Self {
        counter::CLASS.cloned();
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for Class {
    fn drop(&mut self) {
        counter::CLASS.dropped();
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.inner.raw == other.inner.raw
    }
}

impl Eq for Class {}

impl Hash for Class {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.inner.raw as usize).hash(state);
    }
}

impl std::fmt::Debug for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.inner.name)
            .field("version", &self.inner.version)
            .field("attribute", &self.inner.attribute)
            .field("parent", &self.inner.parent.as_ref().map(Class::name))
            .field("value_properties", &self.inner.value_properties.keys())
            .field("function_properties", &self.inner.function_properties.keys())
            .finish()
    }
}

/// Builder for [`Class`]
///
/// ```ignore
/// let point = ClassBuilder::new("Point")
///     .value_property(NamedValuePropertyCallback::getter("x", |this| {
///         let x = this.with_private_data(|p: &mut (f64, f64)| p.0).unwrap_or(0.0);
///         Ok(this.context().create_number(x).into())
///     }, [])?)
///     .build(ClassRegistry::global())?;
/// ```
pub struct ClassBuilder {
    name: String,
    version: u32,
    attribute: ClassAttribute,
    parent: Option<Class>,
    value_properties: Vec<NamedValuePropertyCallback>,
    function_properties: Vec<NamedFunctionPropertyCallback>,
    callbacks: ObjectCallbacks,
}

impl ClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 0,
            attribute: ClassAttribute::None,
            parent: None,
            value_properties: Vec::new(),
            function_properties: Vec::new(),
            callbacks: ObjectCallbacks::default(),
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn attribute(mut self, attribute: ClassAttribute) -> Self {
        self.attribute = attribute;
        self
    }

    /// Inherit properties and callbacks from `parent`
    pub fn parent(mut self, parent: &Class) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn value_property(mut self, property: NamedValuePropertyCallback) -> Self {
        self.value_properties.push(property);
        self
    }

    pub fn function_property(mut self, property: NamedFunctionPropertyCallback) -> Self {
        self.function_properties.push(property);
        self
    }

    pub fn initialize(mut self, callback: impl Fn(&Object) + Send + Sync + 'static) -> Self {
        self.callbacks.initialize = Some(Arc::new(callback));
        self
    }

    pub fn finalize(
        mut self,
        callback: impl Fn(Option<Box<dyn Any + Send>>) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.finalize = Some(Arc::new(callback));
        self
    }

    pub fn call_as_function(
        mut self,
        callback: impl Fn(&Object, &Object, &[Value]) -> JscResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.call_as_function = Some(Arc::new(callback));
        self
    }

    pub fn call_as_constructor(
        mut self,
        callback: impl Fn(&Object, &[Value]) -> JscResult<Object> + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.call_as_constructor = Some(Arc::new(callback));
        self
    }

    pub fn has_instance(
        mut self,
        callback: impl Fn(&Object, &Value) -> JscResult<bool> + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.has_instance = Some(Arc::new(callback));
        self
    }

    pub fn convert_to_type(
        mut self,
        callback: impl Fn(&Object, ValueType) -> JscResult<Option<Value>> + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.convert_to_type = Some(Arc::new(callback));
        self
    }

    fn validate(&self) -> JscResult<()> {
        if self.name.is_empty() {
            return Err(report(
                "ClassBuilder",
                JscError::invalid_argument("class name must not be empty"),
            ));
        }
        let mut seen = HashSet::new();
        let names = self
            .value_properties
            .iter()
            .map(NamedValuePropertyCallback::name)
            .chain(self.function_properties.iter().map(NamedFunctionPropertyCallback::name));
        for name in names {
            if !seen.insert(name) {
                return Err(report(
                    "ClassBuilder",
                    JscError::invalid_argument(format!(
                        "property '{}' is defined more than once on class '{}'",
                        name, self.name
                    )),
                ));
            }
        }
        Ok(())
    }

    /// Create the engine class and register it under its name.
    ///
    /// Fails with [`JscError::InvalidArgument`] for an empty class name or a
    /// property name used twice, and with [`JscError::Runtime`] when
    /// `registry` already holds a class of that name.
    pub fn build(self, registry: &ClassRegistry) -> JscResult<Class> {
        self.validate()?;

        let (mut value_properties, mut function_properties, callbacks) = match &self.parent {
            Some(parent) => (
                parent.inner.value_properties.clone(),
                parent.inner.function_properties.clone(),
                self.callbacks.inherit(&parent.inner.callbacks),
            ),
            None => (BTreeMap::new(), BTreeMap::new(), self.callbacks),
        };
        for property in self.value_properties {
            function_properties.remove(property.name());
            value_properties.insert(property.name().to_string(), property);
        }
        for property in self.function_properties {
            value_properties.remove(property.name());
            function_properties.insert(property.name().to_string(), property);
        }

        let name = self.name;
        registry.register_with(&name, || {
            let raw = callback::create_class(
                &name,
                self.attribute,
                &value_properties,
                &function_properties,
                &callbacks,
            )?;
            debug!(
                class = %name,
                version = self.version,
                parent = self.parent.as_ref().map(Class::name),
                "created class"
            );
            counter::CLASS.created();
            Ok(Class {
                inner: Arc::new(ClassInner {
                    raw,
                    name: name.clone(),
                    version: self.version,
                    attribute: self.attribute,
                    parent: self.parent,
                    value_properties,
                    function_properties,
                    callbacks,
                }),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_class() {
        let class = Class::default();
        assert_eq!(class.name(), "Default");
        assert_eq!(class.version(), 0);
        assert!(class.raw().is_null());
        assert!(class.parent().is_none());
        assert_eq!(class, Class::default());
    }

    #[test]
    fn test_empty_name_rejected() {
        let registry = ClassRegistry::new();
        let err = ClassBuilder::new("").build(&registry).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_property_rejected() {
        let registry = ClassRegistry::new();
        let value = NamedValuePropertyCallback::getter("x", |o: &Object| Ok(o.clone().into_value()), [])
            .unwrap();
        let function =
            NamedFunctionPropertyCallback::function("x", |o: &Object, _: &[Value]| Ok(o.clone().into_value()), [])
                .unwrap();
        let err = ClassBuilder::new("Dup")
            .value_property(value)
            .function_property(function)
            .build(&registry)
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(!registry.contains("Dup"));
    }

    #[test]
    fn test_accessors() {
        let registry = ClassRegistry::new();
        let parent = ClassBuilder::new("Base").build(&registry).unwrap();
        let child = ClassBuilder::new("Derived")
            .version(3)
            .attribute(ClassAttribute::NoAutomaticPrototype)
            .parent(&parent)
            .build(&registry)
            .unwrap();
        assert_eq!(child.name(), "Derived");
        assert_eq!(child.version(), 3);
        assert_eq!(child.attribute(), ClassAttribute::NoAutomaticPrototype);
        assert_eq!(child.parent(), Some(&parent));
        assert!(child.derives_from(&parent));
        assert!(!parent.derives_from(&child));
    }

    #[test]
    fn test_child_inherits_and_overrides_properties() {
        let registry = ClassRegistry::new();
        let parent = ClassBuilder::new("Shape")
            .function_property(
                NamedFunctionPropertyCallback::function("area", |o: &Object, _: &[Value]| Ok(o.context().create_number(0).into()), [])
                    .unwrap(),
            )
            .function_property(
                NamedFunctionPropertyCallback::function("describe", |o: &Object, _: &[Value]| Ok(o.context().create_string("shape")), [])
                    .unwrap(),
            )
            .build(&registry)
            .unwrap();
        let child = ClassBuilder::new("Square")
            .parent(&parent)
            .value_property(
                NamedValuePropertyCallback::getter("area", |o: &Object| Ok(o.context().create_number(4).into()), [])
                    .unwrap(),
            )
            .build(&registry)
            .unwrap();

        let functions: Vec<_> = child.function_properties().map(|p| p.name().to_string()).collect();
        let values: Vec<_> = child.value_properties().map(|p| p.name().to_string()).collect();
        assert_eq!(functions, vec!["describe"]);
        assert_eq!(values, vec!["area"]);
    }
}
