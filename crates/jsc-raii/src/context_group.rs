//! Context groups: the only factory for [`Context`]s

use jsc_raii_sys::*;
use std::hash::{Hash, Hasher};
use std::ptr;
use tracing::trace;

use crate::class::Class;
use crate::context::Context;
use crate::counter;
use crate::sync::InstanceLock;

/// A group that associates JavaScript contexts with one another.
///
/// Contexts created from the same group may share and exchange JavaScript
/// values. Cloning retains the underlying `JSContextGroupRef`; dropping
/// releases it, and the engine destroys the group once the last reference
/// (including those held by its contexts) is gone.
pub struct ContextGroup {
    raw: JSContextGroupRef,
    lock: InstanceLock,
}

// SAFETY: JSContextGroupRetain/Release are atomic in the engine, and every
// engine-entering call on a shared instance goes through the instance lock.
#[cfg(feature = "thread-safe")]
unsafe impl Send for ContextGroup {}
#[cfg(feature = "thread-safe")]
unsafe impl Sync for ContextGroup {}

impl ContextGroup {
    /// Create a new context group holding one reference.
    ///
    /// Allocation failure inside the engine is fatal.
    pub fn new() -> Self {
        // SAFETY: JSContextGroupCreate has no preconditions
        let raw = unsafe { JSContextGroupCreate() };
        if raw.is_null() {
            panic!("JSContextGroupCreate returned null");
        }
        trace!(group = ?raw, "created context group");
        counter::CONTEXT_GROUP.created();
        Self {
            raw,
            lock: InstanceLock::default(),
        }
    }

    /// Wrap an existing group, taking a new reference to it.
    ///
    /// # Safety
    /// `raw` must be a valid JSContextGroupRef.
    pub unsafe fn from_raw(raw: JSContextGroupRef) -> Self {
        // SAFETY: raw is valid per caller contract
        unsafe { JSContextGroupRetain(raw) };
        counter::CONTEXT_GROUP.created();
        Self {
            raw,
            lock: InstanceLock::default(),
        }
    }

    /// Get the raw group pointer
    pub fn raw(&self) -> JSContextGroupRef {
        self.raw
    }

    /// Whether the handle was moved out with [`ContextGroup::take`]
    pub fn is_taken(&self) -> bool {
        self.raw.is_null()
    }

    /// Move the handle out, leaving this wrapper empty.
    ///
    /// An empty group is safe to drop and releases nothing.
    pub fn take(&mut self) -> Self {
        let _guard = self.lock.lock();
        counter::CONTEXT_GROUP.created();
        Self {
            raw: std::mem::replace(&mut self.raw, ptr::null_mut()),
            lock: InstanceLock::default(),
        }
    }

    /// Exchange handles with `other`
    pub fn swap(&mut self, other: &mut Self) {
        let _mine = self.lock.lock();
        let _theirs = other.lock.lock();
        std::mem::swap(&mut self.raw, &mut other.raw);
    }

    /// Copy-and-swap assignment: share `rhs`'s handle and release the old one
    pub fn assign(&mut self, rhs: &Self) {
        let mut copy = rhs.clone();
        self.swap(&mut copy);
    }

    /// Create an execution context in this group with the default global
    /// object (populated with the standard built-ins).
    pub fn create_context(&self) -> Context {
        self.create_context_with_class(&Class::default())
    }

    /// Create an execution context whose global object is an instance of
    /// `global_object_class`.
    pub fn create_context_with_class(&self, global_object_class: &Class) -> Context {
        let _guard = self.lock.lock();
        assert!(!self.raw.is_null(), "create_context on a taken ContextGroup");
        Context::create_in_group(self.clone(), global_object_class)
    }
}

impl Default for ContextGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ContextGroup {
    fn clone(&self) -> Self {
        let _guard = self.lock.lock();
        if !self.raw.is_null() {
            // SAFETY: self.raw is a live group
            unsafe { JSContextGroupRetain(self.raw) };
        }
        counter::CONTEXT_GROUP.cloned();
        Self {
            raw: self.raw,
            lock: InstanceLock::default(),
        }
    }
}

impl Drop for ContextGroup {
    fn drop(&mut self) {
        counter::CONTEXT_GROUP.dropped();
        if !self.raw.is_null() {
            // SAFETY: this wrapper owns exactly one reference
            unsafe { JSContextGroupRelease(self.raw) };
        }
    }
}

impl PartialEq for ContextGroup {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for ContextGroup {}

impl Hash for ContextGroup {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.raw as usize).hash(state);
    }
}

impl std::fmt::Debug for ContextGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContextGroup({:?})", self.raw)
    }
}
