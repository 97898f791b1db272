//! Per-object private block for instances of classes built by this crate.
//!
//! Every such instance carries a boxed [`ObjectPrivate`] in its engine
//! private slot. It names the instance's [`Class`] so the callback
//! trampolines can find the closures to run, and it holds the user's private
//! data. The block is freed by the finalize trampoline.

use jsc_raii_sys::*;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::ptr;

use crate::class::Class;
use crate::error::{JscError, JscResult};

pub(crate) struct ObjectPrivate {
    class: Class,
    data: RefCell<Option<Box<dyn Any + Send>>>,
}

thread_local! {
    /// Private block of a global object that is still being created. The
    /// engine runs the class initialize callback before the creating call
    /// returns, so that callback attaches the block itself.
    static PENDING_GLOBAL: Cell<*mut ObjectPrivate> = const { Cell::new(ptr::null_mut()) };
}

impl ObjectPrivate {
    /// Allocate the block for a new instance of `class`. Returns null for the
    /// engine default class, which has no private storage.
    pub(crate) fn for_instance(
        class: &Class,
        data: Option<Box<dyn Any + Send>>,
    ) -> *mut ObjectPrivate {
        if class.raw().is_null() {
            return ptr::null_mut();
        }
        Box::into_raw(Box::new(ObjectPrivate {
            class: class.clone(),
            data: RefCell::new(data),
        }))
    }

    /// Look up the block of `object`.
    ///
    /// # Safety
    /// `object` must be a live object. Its private slot, when set, must hold
    /// a pointer produced by [`ObjectPrivate::for_instance`]; the returned
    /// reference must not outlive the object.
    pub(crate) unsafe fn of<'a>(object: JSObjectRef) -> Option<&'a ObjectPrivate> {
        // SAFETY: object is live per caller contract
        let raw = unsafe { JSObjectGetPrivate(object) } as *mut ObjectPrivate;
        // SAFETY: non-null pointers come from for_instance and stay valid
        // until the finalize trampoline reclaims them
        unsafe { raw.as_ref() }
    }

    /// Attach the pending global block to `object` if its slot is still
    /// empty. Only the initialize callback of a global object under
    /// construction sees an empty slot on an instance of a built class.
    ///
    /// # Safety
    /// `object` must be a live object.
    pub(crate) unsafe fn attach_pending(object: JSObjectRef) -> bool {
        let pending = PENDING_GLOBAL.with(Cell::get);
        // SAFETY: object is live per caller contract
        unsafe {
            if pending.is_null() || !JSObjectGetPrivate(object).is_null() {
                return false;
            }
            if !JSObjectSetPrivate(object, pending.cast()) {
                return false;
            }
        }
        PENDING_GLOBAL.with(|slot| slot.set(ptr::null_mut()));
        true
    }

    /// Reclaim the block of a finalized object.
    ///
    /// # Safety
    /// Must be called at most once per object, from its finalizer.
    pub(crate) unsafe fn reclaim(object: JSObjectRef) -> Option<Box<ObjectPrivate>> {
        // SAFETY: object is being finalized; its slot is ours
        let raw = unsafe { JSObjectGetPrivate(object) } as *mut ObjectPrivate;
        if raw.is_null() {
            return None;
        }
        // SAFETY: the pointer came from Box::into_raw in for_instance
        Some(unsafe { Box::from_raw(raw) })
    }

    pub(crate) fn class(&self) -> &Class {
        &self.class
    }

    pub(crate) fn with_data<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut data = self.data.try_borrow_mut().ok()?;
        let data = data.as_mut()?.downcast_mut::<T>()?;
        Some(f(data))
    }

    pub(crate) fn replace_data(
        &self,
        data: Option<Box<dyn Any + Send>>,
    ) -> JscResult<Option<Box<dyn Any + Send>>> {
        let mut slot = self
            .data
            .try_borrow_mut()
            .map_err(|_| JscError::runtime("private data is borrowed"))?;
        Ok(std::mem::replace(&mut *slot, data))
    }

    pub(crate) fn into_data(self) -> Option<Box<dyn Any + Send>> {
        self.data.into_inner()
    }
}

/// Run `create` with `private` waiting for [`ObjectPrivate::attach_pending`]
pub(crate) fn with_pending_global<R>(private: *mut ObjectPrivate, create: impl FnOnce() -> R) -> R {
    struct Reset(*mut ObjectPrivate);

    impl Drop for Reset {
        fn drop(&mut self) {
            PENDING_GLOBAL.with(|slot| slot.set(self.0));
        }
    }

    let previous = PENDING_GLOBAL.with(|slot| slot.replace(private));
    let _reset = Reset(previous);
    create()
}
