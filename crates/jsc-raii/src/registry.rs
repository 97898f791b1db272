//! Name-keyed registry of built classes

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

use crate::class::Class;
use crate::error::{JscError, JscResult};
use crate::value::report;

static GLOBAL_REGISTRY: LazyLock<ClassRegistry> = LazyLock::new(ClassRegistry::new);

/// Class names must be unique within a registry.
///
/// Use [`ClassRegistry::global`] for process-wide uniqueness, or a local
/// registry to scope names (for example per test).
#[derive(Default)]
pub struct ClassRegistry {
    classes: Mutex<BTreeMap<String, Class>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> &'static ClassRegistry {
        &GLOBAL_REGISTRY
    }

    /// Create and insert a class under `name` unless the name is taken.
    /// The lock is held across `create` so two builders cannot race.
    pub(crate) fn register_with(
        &self,
        name: &str,
        create: impl FnOnce() -> JscResult<Class>,
    ) -> JscResult<Class> {
        let mut classes = self.classes.lock();
        if classes.contains_key(name) {
            return Err(report(
                "ClassRegistry",
                JscError::runtime(format!("a class named '{}' already exists", name)),
            ));
        }
        let class = create()?;
        classes.insert(name.to_string(), class.clone());
        debug!(class = name, total = classes.len(), "registered class");
        Ok(class)
    }

    pub fn get(&self, name: &str) -> Option<Class> {
        self.classes.lock().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.lock().contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.classes.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.classes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.lock().is_empty()
    }
}

impl std::fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("classes", &self.names())
            .finish()
    }
}
