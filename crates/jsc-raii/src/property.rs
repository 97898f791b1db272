//! Property attributes and the named property callback descriptors used to
//! build classes.

use jsc_raii_sys::*;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{JscError, JscResult};
use crate::object::Object;
use crate::value::{Value, report};

/// Attribute flags for object properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyAttribute {
    /// No special attributes
    None,
    /// Assignment is silently ignored
    ReadOnly,
    /// Hidden from enumeration
    DontEnum,
    /// `delete` fails
    DontDelete,
}

impl PropertyAttribute {
    pub fn bits(self) -> JSPropertyAttributes {
        match self {
            Self::None => K_JS_PROPERTY_ATTRIBUTE_NONE,
            Self::ReadOnly => K_JS_PROPERTY_ATTRIBUTE_READ_ONLY,
            Self::DontEnum => K_JS_PROPERTY_ATTRIBUTE_DONT_ENUM,
            Self::DontDelete => K_JS_PROPERTY_ATTRIBUTE_DONT_DELETE,
        }
    }

    /// Combined bit mask of a set of attributes
    pub fn mask(attributes: impl IntoIterator<Item = PropertyAttribute>) -> JSPropertyAttributes {
        attributes
            .into_iter()
            .fold(K_JS_PROPERTY_ATTRIBUTE_NONE, |mask, attribute| mask | attribute.bits())
    }
}

/// Getter for a named value property
pub type GetPropertyCallback = Arc<dyn Fn(&Object) -> JscResult<Value> + Send + Sync>;

/// Setter for a named value property. Returning `false` lets the engine
/// store the value itself.
pub type SetPropertyCallback = Arc<dyn Fn(&Object, &Value) -> JscResult<bool> + Send + Sync>;

/// Body of a named function property, called with `this` and the arguments
pub type FunctionPropertyCallback =
    Arc<dyn Fn(&Object, &[Value]) -> JscResult<Value> + Send + Sync>;

/// Normalized attribute set. `None` contributes no bits and is not stored.
fn attribute_set(attributes: impl IntoIterator<Item = PropertyAttribute>) -> BTreeSet<PropertyAttribute> {
    attributes
        .into_iter()
        .filter(|a| *a != PropertyAttribute::None)
        .collect()
}

fn precompute_hash(name: &str, mask: JSPropertyAttributes) -> u64 {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    mask.hash(&mut hasher);
    hasher.finish()
}

fn validate_name(kind: &str, name: &str) -> JscResult<()> {
    if name.is_empty() {
        return Err(report(
            kind,
            JscError::invalid_argument("property name must not be empty"),
        ));
    }
    Ok(())
}

/// A named value property: an accessor pair plus attributes
#[derive(Clone)]
pub struct NamedValuePropertyCallback {
    name: String,
    getter: Option<GetPropertyCallback>,
    setter: Option<SetPropertyCallback>,
    attributes: BTreeSet<PropertyAttribute>,
    mask: JSPropertyAttributes,
    hash: u64,
}

impl NamedValuePropertyCallback {
    /// Fails with [`JscError::InvalidArgument`] when `name` is empty or when
    /// both `getter` and `setter` are absent.
    pub fn new(
        name: impl Into<String>,
        getter: Option<GetPropertyCallback>,
        setter: Option<SetPropertyCallback>,
        attributes: impl IntoIterator<Item = PropertyAttribute>,
    ) -> JscResult<Self> {
        let name = name.into();
        validate_name("NamedValuePropertyCallback", &name)?;
        if getter.is_none() && setter.is_none() {
            return Err(report(
                "NamedValuePropertyCallback",
                JscError::invalid_argument(format!(
                    "property '{}' needs a getter or a setter",
                    name
                )),
            ));
        }
        let attributes = attribute_set(attributes);
        let mask = PropertyAttribute::mask(attributes.iter().copied());
        Ok(Self {
            hash: precompute_hash(&name, mask),
            name,
            getter,
            setter,
            attributes,
            mask,
        })
    }

    /// A read-only property backed by `getter`
    pub fn getter(
        name: impl Into<String>,
        getter: impl Fn(&Object) -> JscResult<Value> + Send + Sync + 'static,
        attributes: impl IntoIterator<Item = PropertyAttribute>,
    ) -> JscResult<Self> {
        let attributes = attribute_set(attributes)
            .into_iter()
            .chain([PropertyAttribute::ReadOnly]);
        Self::new(name, Some(Arc::new(getter)), None, attributes)
    }

    /// A read-write property backed by `getter` and `setter`
    pub fn accessor(
        name: impl Into<String>,
        getter: impl Fn(&Object) -> JscResult<Value> + Send + Sync + 'static,
        setter: impl Fn(&Object, &Value) -> JscResult<bool> + Send + Sync + 'static,
        attributes: impl IntoIterator<Item = PropertyAttribute>,
    ) -> JscResult<Self> {
        Self::new(name, Some(Arc::new(getter)), Some(Arc::new(setter)), attributes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &BTreeSet<PropertyAttribute> {
        &self.attributes
    }

    pub fn attribute_mask(&self) -> JSPropertyAttributes {
        self.mask
    }

    pub fn getter_callback(&self) -> Option<&GetPropertyCallback> {
        self.getter.as_ref()
    }

    pub fn setter_callback(&self) -> Option<&SetPropertyCallback> {
        self.setter.as_ref()
    }

    fn presence(&self) -> (bool, bool) {
        (self.getter.is_some(), self.setter.is_some())
    }
}

impl PartialEq for NamedValuePropertyCallback {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.presence() == other.presence()
            && self.attributes == other.attributes
    }
}

impl Eq for NamedValuePropertyCallback {}

impl PartialOrd for NamedValuePropertyCallback {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NamedValuePropertyCallback {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.attributes.cmp(&other.attributes))
            .then_with(|| self.presence().cmp(&other.presence()))
    }
}

impl Hash for NamedValuePropertyCallback {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl std::fmt::Debug for NamedValuePropertyCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedValuePropertyCallback")
            .field("name", &self.name)
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .field("attributes", &self.attributes)
            .finish()
    }
}

/// A named function property: one callback plus attributes
#[derive(Clone)]
pub struct NamedFunctionPropertyCallback {
    name: String,
    callback: Option<FunctionPropertyCallback>,
    attributes: BTreeSet<PropertyAttribute>,
    mask: JSPropertyAttributes,
    hash: u64,
}

impl NamedFunctionPropertyCallback {
    /// Fails with [`JscError::InvalidArgument`] when `name` is empty or
    /// `callback` is absent.
    pub fn new(
        name: impl Into<String>,
        callback: Option<FunctionPropertyCallback>,
        attributes: impl IntoIterator<Item = PropertyAttribute>,
    ) -> JscResult<Self> {
        let name = name.into();
        validate_name("NamedFunctionPropertyCallback", &name)?;
        if callback.is_none() {
            return Err(report(
                "NamedFunctionPropertyCallback",
                JscError::invalid_argument(format!("function '{}' needs a callback", name)),
            ));
        }
        let attributes = attribute_set(attributes);
        let mask = PropertyAttribute::mask(attributes.iter().copied());
        Ok(Self {
            hash: precompute_hash(&name, mask),
            name,
            callback,
            attributes,
            mask,
        })
    }

    /// Shorthand for [`NamedFunctionPropertyCallback::new`] with a closure
    pub fn function(
        name: impl Into<String>,
        callback: impl Fn(&Object, &[Value]) -> JscResult<Value> + Send + Sync + 'static,
        attributes: impl IntoIterator<Item = PropertyAttribute>,
    ) -> JscResult<Self> {
        Self::new(name, Some(Arc::new(callback)), attributes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &BTreeSet<PropertyAttribute> {
        &self.attributes
    }

    pub fn attribute_mask(&self) -> JSPropertyAttributes {
        self.mask
    }

    pub fn callback(&self) -> Option<&FunctionPropertyCallback> {
        self.callback.as_ref()
    }
}

impl PartialEq for NamedFunctionPropertyCallback {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.callback.is_some() == other.callback.is_some()
            && self.attributes == other.attributes
    }
}

impl Eq for NamedFunctionPropertyCallback {}

impl PartialOrd for NamedFunctionPropertyCallback {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NamedFunctionPropertyCallback {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.attributes.cmp(&other.attributes))
            .then_with(|| self.callback.is_some().cmp(&other.callback.is_some()))
    }
}

impl Hash for NamedFunctionPropertyCallback {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl std::fmt::Debug for NamedFunctionPropertyCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedFunctionPropertyCallback")
            .field("name", &self.name)
            .field("callback", &self.callback.is_some())
            .field("attributes", &self.attributes)
            .finish()
    }
}
