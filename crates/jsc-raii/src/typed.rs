//! Typed views over [`Value`] and [`Object`].
//!
//! Each view is a value already known to have a particular type. Views are
//! obtained from the matching `Context::create_*` method or by narrowing
//! with `TryFrom<Value>`, which fails with [`JscError::TypeMismatch`] on the
//! wrong type. Primitive views deref to [`Value`]; object views deref to
//! [`Object`].

use std::ops::Deref;

use crate::error::{JscError, JscResult};
use crate::object::Object;
use crate::value::Value;

macro_rules! primitive_view {
    ($(#[$meta:meta])* $name:ident, $check:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq)]
        pub struct $name(Value);

        impl $name {
            pub(crate) fn from_unchecked(value: Value) -> Self {
                Self(value)
            }

            /// Get as a plain value
            pub fn into_value(self) -> Value {
                self.0
            }
        }

        impl Deref for $name {
            type Target = Value;

            fn deref(&self) -> &Value {
                &self.0
            }
        }

        impl From<$name> for Value {
            fn from(view: $name) -> Value {
                view.0
            }
        }

        impl TryFrom<Value> for $name {
            type Error = JscError;

            fn try_from(value: Value) -> JscResult<Self> {
                if value.$check() {
                    Ok(Self(value))
                } else {
                    Err(JscError::type_mismatch(stringify!($name), value.type_name()))
                }
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }
    };
}

macro_rules! object_view {
    ($(#[$meta:meta])* $name:ident, $check:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq)]
        pub struct $name(Object);

        impl $name {
            pub(crate) fn from_unchecked(object: Object) -> Self {
                Self(object)
            }

            /// Get as a plain object
            pub fn into_object(self) -> Object {
                self.0
            }

            /// Get as a plain value
            pub fn into_value(self) -> Value {
                self.0.into_value()
            }
        }

        impl Deref for $name {
            type Target = Object;

            fn deref(&self) -> &Object {
                &self.0
            }
        }

        impl From<$name> for Object {
            fn from(view: $name) -> Object {
                view.0
            }
        }

        impl From<$name> for Value {
            fn from(view: $name) -> Value {
                view.0.into_value()
            }
        }

        impl TryFrom<Value> for $name {
            type Error = JscError;

            fn try_from(value: Value) -> JscResult<Self> {
                if value.$check() {
                    Ok(Self(Object::from_value_unchecked(value)))
                } else {
                    Err(JscError::type_mismatch(stringify!($name), value.type_name()))
                }
            }
        }

        impl TryFrom<Object> for $name {
            type Error = JscError;

            fn try_from(object: Object) -> JscResult<Self> {
                <Self as TryFrom<Value>>::try_from(object.into_value())
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }
    };
}

primitive_view!(
    /// The `undefined` value
    Undefined,
    is_undefined
);
primitive_view!(
    /// The `null` value
    Null,
    is_null
);
primitive_view!(
    /// A boolean primitive
    Boolean,
    is_boolean
);
primitive_view!(
    /// A number primitive
    Number,
    is_number
);

object_view!(
    /// An `Array` instance
    Array,
    is_array
);
object_view!(
    /// A `Date` instance
    Date,
    is_date
);
object_view!(
    /// An instance of `Error` or one of its subclasses
    Error,
    is_error
);
object_view!(
    /// A `RegExp` instance
    RegExp,
    is_regexp
);
object_view!(
    /// A callable object
    Function,
    is_function
);

impl Boolean {
    pub fn value(&self) -> bool {
        self.to_bool()
    }
}

impl Number {
    pub fn value(&self) -> f64 {
        // Primitive numbers convert without running script
        self.to_number().unwrap_or(f64::NAN)
    }
}

impl Array {
    /// The `length` property
    pub fn length(&self) -> JscResult<u32> {
        Ok(self.get_property("length")?.to_number()? as u32)
    }

    pub fn get(&self, index: u32) -> JscResult<Value> {
        self.get_property_at_index(index)
    }

    pub fn set(&self, index: u32, value: &Value) -> JscResult<()> {
        self.set_property_at_index(index, value)
    }

    /// Append to the end, as `push` would
    pub fn push(&self, value: &Value) -> JscResult<()> {
        let length = self.length()?;
        self.set_property_at_index(length, value)
    }

    /// Copy the elements out
    pub fn to_vec(&self) -> JscResult<Vec<Value>> {
        (0..self.length()?).map(|i| self.get(i)).collect()
    }
}

impl Date {
    /// Milliseconds since the Unix epoch, as `getTime()` returns
    pub fn time(&self) -> JscResult<f64> {
        self.to_number()
    }
}

impl Error {
    pub fn name(&self) -> JscResult<String> {
        self.get_property("name")?.to_string()
    }

    pub fn message(&self) -> JscResult<String> {
        self.get_property("message")?.to_string()
    }

    /// The `stack` property, when the engine recorded one
    pub fn stack(&self) -> JscResult<Option<String>> {
        let stack = self.get_property("stack")?;
        if stack.is_undefined() {
            return Ok(None);
        }
        stack.to_string().map(Some)
    }
}

impl RegExp {
    pub fn source(&self) -> JscResult<String> {
        self.get_property("source")?.to_string()
    }

    pub fn flags(&self) -> JscResult<String> {
        self.get_property("flags")?.to_string()
    }
}

impl Function {
    /// Call with `this_object` (the global object when `None`)
    pub fn call(&self, this_object: Option<&Object>, args: &[Value]) -> JscResult<Value> {
        self.call_as_function(this_object, args)
    }

    /// Call as `new`
    pub fn construct(&self, args: &[Value]) -> JscResult<Object> {
        self.call_as_constructor(args)
    }
}
