//! Per-type instance counters.
//!
//! Every wrapper reports construction, cloning and destruction here. The
//! bookkeeping only happens with the `performance-counter` feature; without
//! it the hooks compile to nothing and every reading is zero.

use std::sync::atomic::{AtomicUsize, Ordering};

pub struct InstanceCounter {
    name: &'static str,
    created: AtomicUsize,
    cloned: AtomicUsize,
    dropped: AtomicUsize,
}

/// A point-in-time reading of one [`InstanceCounter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub name: &'static str,
    pub created: usize,
    pub cloned: usize,
    pub dropped: usize,
}

impl CounterSnapshot {
    /// Instances currently alive
    pub fn alive(&self) -> usize {
        (self.created + self.cloned).saturating_sub(self.dropped)
    }
}

impl InstanceCounter {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            created: AtomicUsize::new(0),
            cloned: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub(crate) fn created(&self) {
        #[cfg(feature = "performance-counter")]
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn cloned(&self) {
        #[cfg(feature = "performance-counter")]
        self.cloned.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn dropped(&self) {
        #[cfg(feature = "performance-counter")]
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            name: self.name,
            created: self.created.load(Ordering::Relaxed),
            cloned: self.cloned.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

pub static CONTEXT_GROUP: InstanceCounter = InstanceCounter::new("ContextGroup");
pub static CONTEXT: InstanceCounter = InstanceCounter::new("Context");
pub static CLASS: InstanceCounter = InstanceCounter::new("Class");
pub static VALUE: InstanceCounter = InstanceCounter::new("Value");
pub static JS_STRING: InstanceCounter = InstanceCounter::new("JsString");

/// Readings for every wrapper type
pub fn snapshot_all() -> Vec<CounterSnapshot> {
    [&CONTEXT_GROUP, &CONTEXT, &CLASS, &VALUE, &JS_STRING]
        .into_iter()
        .map(InstanceCounter::snapshot)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alive_saturates() {
        let snapshot = CounterSnapshot {
            name: "x",
            created: 1,
            cloned: 0,
            dropped: 3,
        };
        assert_eq!(snapshot.alive(), 0);
    }

    #[test]
    fn test_snapshot_all_names() {
        let names: Vec<_> = snapshot_all().into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            ["ContextGroup", "Context", "Class", "Value", "JsString"]
        );
    }

    #[cfg(feature = "performance-counter")]
    #[test]
    fn test_counting() {
        let counter = InstanceCounter::new("Test");
        counter.created();
        counter.cloned();
        counter.dropped();
        let snapshot = counter.snapshot();
        assert_eq!(snapshot.created, 1);
        assert_eq!(snapshot.cloned, 1);
        assert_eq!(snapshot.alive(), 1);
    }

    #[cfg(not(feature = "performance-counter"))]
    #[test]
    fn test_disabled_counts_nothing() {
        let counter = InstanceCounter::new("Test");
        counter.created();
        counter.cloned();
        assert_eq!(counter.snapshot().alive(), 0);
    }
}
