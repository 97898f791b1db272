//! RAII wrapper for JSC strings

use jsc_raii_sys::*;
use std::fmt;
use std::marker::PhantomData;
use std::ptr;

use crate::counter;

/// Reference-counted wrapper around a `JSStringRef`.
///
/// Strings are built from UTF-16 code units, so any Rust `&str` (including
/// one with interior NUL characters) converts without loss.
///
/// # Thread Safety
///
/// This type is `!Send` and `!Sync` because JSC strings should not be
/// shared across threads.
pub struct JsString {
    raw: JSStringRef,
    /// Marker to make this type !Send + !Sync
    _not_send: PhantomData<*mut ()>,
}

impl JsString {
    /// Create a new JSC string from a Rust string
    pub fn new(s: &str) -> Self {
        let units: Vec<JSChar> = s.encode_utf16().collect();
        // SAFETY: units is a valid buffer of units.len() UTF-16 code units
        let raw = unsafe { JSStringCreateWithCharacters(units.as_ptr(), units.len()) };
        if raw.is_null() {
            panic!("JSStringCreateWithCharacters failed to allocate");
        }
        counter::JS_STRING.created();
        Self {
            raw,
            _not_send: PhantomData,
        }
    }

    /// Adopt a string the caller already owns a reference to (a "Copy" or
    /// "Create" result from the C API).
    ///
    /// # Safety
    /// `raw` must be a valid, retained JSStringRef; ownership of that one
    /// reference moves into the wrapper.
    pub unsafe fn from_owned_raw(raw: JSStringRef) -> Self {
        counter::JS_STRING.created();
        Self {
            raw,
            _not_send: PhantomData,
        }
    }

    /// Wrap a borrowed string, taking a new reference to it.
    ///
    /// # Safety
    /// `raw` must be a valid JSStringRef.
    pub unsafe fn from_borrowed_raw(raw: JSStringRef) -> Self {
        // SAFETY: raw is valid per caller contract
        unsafe { Self::from_owned_raw(JSStringRetain(raw)) }
    }

    /// Get the raw JSStringRef
    pub fn raw(&self) -> JSStringRef {
        self.raw
    }

    /// Get the length in UTF-16 code units
    pub fn len(&self) -> usize {
        if self.raw.is_null() {
            return 0;
        }
        // SAFETY: self.raw is valid
        unsafe { JSStringGetLength(self.raw) }
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the handle was moved out with [`JsString::take`]
    pub fn is_taken(&self) -> bool {
        self.raw.is_null()
    }

    /// Move the handle out, leaving this wrapper empty
    pub fn take(&mut self) -> Self {
        counter::JS_STRING.created();
        Self {
            raw: std::mem::replace(&mut self.raw, ptr::null_mut()),
            _not_send: PhantomData,
        }
    }

    /// UTF-16 code units of this string
    pub fn as_utf16(&self) -> &[u16] {
        let len = self.len();
        if len == 0 {
            return &[];
        }
        // SAFETY: the buffer is owned by the string and lives as long as self
        unsafe {
            let chars = JSStringGetCharactersPtr(self.raw);
            std::slice::from_raw_parts(chars, len)
        }
    }

    /// Convert to a Rust String, replacing unpaired surrogates
    pub fn to_rust_string(&self) -> String {
        String::from_utf16_lossy(self.as_utf16())
    }
}

impl Clone for JsString {
    fn clone(&self) -> Self {
        if !self.raw.is_null() {
            // SAFETY: self.raw is valid
            unsafe { JSStringRetain(self.raw) };
        }
        counter::JS_STRING.cloned();
        Self {
            raw: self.raw,
            _not_send: PhantomData,
        }
    }
}

impl Drop for JsString {
    fn drop(&mut self) {
        counter::JS_STRING.dropped();
        if !self.raw.is_null() {
            // SAFETY: this wrapper owns exactly one reference
            unsafe { JSStringRelease(self.raw) };
        }
    }
}

impl Default for JsString {
    fn default() -> Self {
        Self::new("")
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<&String> for JsString {
    fn from(s: &String) -> Self {
        Self::new(s)
    }
}

impl From<String> for JsString {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<&JsString> for String {
    fn from(s: &JsString) -> Self {
        s.to_rust_string()
    }
}

impl PartialEq for JsString {
    fn eq(&self, other: &Self) -> bool {
        match (self.raw.is_null(), other.raw.is_null()) {
            (true, true) => true,
            (false, false) => {
                // SAFETY: both handles are valid
                unsafe { JSStringIsEqual(self.raw, other.raw) }
            }
            _ => false,
        }
    }
}

impl Eq for JsString {}

impl PartialEq<str> for JsString {
    fn eq(&self, other: &str) -> bool {
        self.as_utf16().iter().copied().eq(other.encode_utf16())
    }
}

impl PartialEq<&str> for JsString {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rust_string())
    }
}

impl fmt::Debug for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsString({:?})", self.to_rust_string())
    }
}

/// Convert a borrowed JSStringRef to a Rust String
///
/// # Safety
/// The js_str must be a valid JSStringRef or null
pub unsafe fn js_string_to_rust(js_str: JSStringRef) -> String {
    if js_str.is_null() {
        return String::new();
    }

    // SAFETY: js_str is valid per caller contract
    unsafe {
        let len = JSStringGetLength(js_str);
        if len == 0 {
            return String::new();
        }
        let chars = JSStringGetCharactersPtr(js_str);
        String::from_utf16_lossy(std::slice::from_raw_parts(chars, len))
    }
}
