//! Purpose: Process-local registry of executed module units.
//! Exports: `UnitRegistry`, `LoadedUnit`, `UnitExports`.
//! Role: Holds the single resident unit per qualified name; the importer is the only writer.
//! Invariants: Entries are inserted or replaced, never evicted.
//! Invariants: A failed reload never displaces the previously resident unit.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

/// Opaque handle to an executed unit.
///
/// The pipeline never looks inside a unit; `describe` is the one advisory
/// window, used for receipts and logs.
pub trait UnitExports: Send + Sync {
    fn describe(&self) -> Value;
}

pub struct LoadedUnit {
    qualified: String,
    path: PathBuf,
    generation: u64,
    loaded_at: Option<String>,
    exports: Box<dyn UnitExports>,
}

impl LoadedUnit {
    pub fn qualified(&self) -> &str {
        &self.qualified
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 1 for a fresh load, incremented on every successful reload.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn loaded_at(&self) -> Option<&str> {
        self.loaded_at.as_deref()
    }

    pub fn exports(&self) -> &dyn UnitExports {
        self.exports.as_ref()
    }
}

impl fmt::Debug for LoadedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedUnit")
            .field("qualified", &self.qualified)
            .field("path", &self.path)
            .field("generation", &self.generation)
            .field("loaded_at", &self.loaded_at)
            .finish_non_exhaustive()
    }
}

/// Shared map from qualified name to the resident unit.
///
/// The map itself is mutex-guarded, and callers running the full pipeline
/// take a per-name serialization lock so two threads cannot race a
/// preparse/publish/load cycle for the same qualified name.
#[derive(Default)]
pub struct UnitRegistry {
    units: Mutex<HashMap<String, Arc<LoadedUnit>>>,
    serial: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, qualified: &str) -> Option<Arc<LoadedUnit>> {
        lock(&self.units).get(qualified).cloned()
    }

    pub fn contains(&self, qualified: &str) -> bool {
        lock(&self.units).contains_key(qualified)
    }

    pub fn len(&self) -> usize {
        lock(&self.units).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.units).is_empty()
    }

    /// Resident qualified names, sorted for stable listings.
    pub fn qualified_names(&self) -> Vec<String> {
        let mut names: Vec<_> = lock(&self.units).keys().cloned().collect();
        names.sort();
        names
    }

    /// Per-name lock serializing whole pipeline runs for one qualified name.
    pub fn serial_lock(&self, qualified: &str) -> Arc<Mutex<()>> {
        lock(&self.serial)
            .entry(qualified.to_string())
            .or_default()
            .clone()
    }

    pub(crate) fn install(
        &self,
        qualified: &str,
        path: &Path,
        loaded_at: Option<String>,
        exports: Box<dyn UnitExports>,
    ) -> Arc<LoadedUnit> {
        let mut units = lock(&self.units);
        let generation = units
            .get(qualified)
            .map(|unit| unit.generation + 1)
            .unwrap_or(1);
        let unit = Arc::new(LoadedUnit {
            qualified: qualified.to_string(),
            path: path.to_path_buf(),
            generation,
            loaded_at,
            exports,
        });
        units.insert(qualified.to_string(), unit.clone());
        unit
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
