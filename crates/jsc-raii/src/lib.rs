// Allow raw pointer dereference in public functions - this is an FFI wrapper
// where the caller is responsible for providing valid engine pointers.
#![allow(clippy::not_unsafe_ptr_arg_deref)]

//! RAII wrappers for the JavaScriptCore C API.
//!
//! Every engine handle (context group, global context, class, value, string)
//! is owned by a wrapper that retains it on `Clone` and releases it on
//! `Drop`. Fallible operations return [`JscResult`] instead of filling an
//! exception out-parameter.
//!
//! # Example
//!
//! ```
//! use jsc_raii::ContextGroup;
//!
//! let ctx = ContextGroup::new().create_context();
//! let result = ctx.evaluate_script("1 + 1", None, "", 1).unwrap();
//! assert_eq!(result.to_number().unwrap(), 2.0);
//! ```
//!
//! # Thread Safety
//!
//! Values, objects and strings are always `!Send` and `!Sync`: they belong
//! to the thread that created them.
//!
//! ```compile_fail
//! use jsc_raii::ContextGroup;
//! use std::thread;
//!
//! let ctx = ContextGroup::new().create_context();
//! let value = ctx.create_object();
//! thread::spawn(move || {
//!     value.is_object(); // Error: Object is !Send
//! });
//! ```
//!
//! [`Context`] and [`ContextGroup`] become `Send + Sync` with the
//! `thread-safe` feature, which serializes engine calls on each instance
//! behind a reentrant lock. Without it they are `!Send` as well.
//!
//! # Features
//!
//! - `thread-safe`: per-instance locks, `Send + Sync` contexts and groups
//! - `performance-counter`: per-type instance counts in [`counter`]
//! - `debug-gc`: [`Context::synchronous_garbage_collect_for_debugging`]
//! - `system-jsc`: link the system `javascriptcoregtk-4.1` on Linux

mod callback;
mod class;
mod context;
mod context_group;
pub mod counter;
mod error;
mod object;
mod private;
mod property;
mod registry;
pub mod string;
mod sync;
mod typed;
mod value;

pub use class::{
    CallAsConstructorCallback, CallAsFunctionCallback, Class, ClassAttribute, ClassBuilder,
    ConvertToTypeCallback, FinalizeCallback, HasInstanceCallback, InitializeCallback,
};
pub use context::Context;
pub use context_group::ContextGroup;
pub use error::{JscError, JscResult};
pub use object::Object;
pub use property::{
    FunctionPropertyCallback, GetPropertyCallback, NamedFunctionPropertyCallback,
    NamedValuePropertyCallback, PropertyAttribute, SetPropertyCallback,
};
pub use registry::ClassRegistry;
pub use string::JsString;
pub use typed::{Array, Boolean, Date, Error, Function, Null, Number, RegExp, Undefined};
pub use value::{Value, ValueType};

// Re-export sys for advanced usage
pub use jsc_raii_sys as sys;
