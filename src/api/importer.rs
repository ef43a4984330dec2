//! Purpose: Orchestrate resolve, preparse, publish, and load for module units.
//! Exports: `Importer`, `ImportReceipt`, `PreparseReceipt`.
//! Role: The single entry point callers invoke, and re-invoke to force reloads.
//! Invariants: A failed call never installs or displaces a registry entry.
//! Invariants: Pipeline runs for one qualified name are serialized.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError};

use crate::api::runtime::{SourceRuntime, UnitRuntime};
use crate::core::error::Error;
use crate::core::preparse::{locate_tool, preparse_source};
use crate::core::publish::publish_unit;
use crate::core::registry::{LoadedUnit, UnitRegistry};
use crate::core::resolve::{ModuleSpec, ResolvedPaths, Toolchain, resolve_paths};

/// Outcome of a full `import` call.
#[derive(Debug)]
pub struct ImportReceipt {
    pub unit: Arc<LoadedUnit>,
    /// Whether the external preparser ran (a source file was present).
    pub preparsed: bool,
    /// Whether a previous unit for this qualified name was replaced.
    pub reloaded: bool,
}

/// Outcome of a transform-only `preparse` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparseReceipt {
    pub source: PathBuf,
    pub unit: PathBuf,
    pub preparsed: bool,
}

/// Pipeline front end: owns the toolchain conventions, the default module
/// directory, the shared registry, and the execution runtime.
pub struct Importer {
    toolchain: Toolchain,
    module_dir: PathBuf,
    registry: Arc<UnitRegistry>,
    runtime: Arc<dyn UnitRuntime>,
}

impl Default for Importer {
    fn default() -> Self {
        Self::new()
    }
}

impl Importer {
    pub fn new() -> Self {
        Self {
            toolchain: Toolchain::default(),
            module_dir: PathBuf::from("."),
            registry: Arc::new(UnitRegistry::new()),
            runtime: Arc::new(SourceRuntime),
        }
    }

    pub fn with_module_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.module_dir = dir.into();
        self
    }

    pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = toolchain;
        self
    }

    pub fn with_registry(mut self, registry: Arc<UnitRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_runtime(mut self, runtime: Arc<dyn UnitRuntime>) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn registry(&self) -> &Arc<UnitRegistry> {
        &self.registry
    }

    pub fn resolve(&self, spec: &ModuleSpec) -> Result<ResolvedPaths, Error> {
        resolve_paths(spec, &self.module_dir, &self.toolchain)
    }

    /// Import or reload one module unit.
    ///
    /// When a source file exists at the resolved path the preparser runs and
    /// its output replaces the unit artifact; otherwise whatever already sits
    /// at the unit path is loaded as-is. Calling again with the same spec
    /// forces a reload of the freshly resolved content.
    pub fn import(&self, spec: &ModuleSpec) -> Result<ImportReceipt, Error> {
        let qualified = spec.qualified_name();
        tracing::info!(
            module = spec.name(),
            package = spec.package().unwrap_or("-"),
            base = %spec.base().unwrap_or(&self.module_dir).display(),
            "import requested"
        );
        let paths = self.resolve(spec)?;

        let serial = self.registry.serial_lock(&qualified);
        let _guard = serial.lock().unwrap_or_else(PoisonError::into_inner);

        let preparsed = self.refresh_unit(&paths)?;

        let previous = self.registry.get(&qualified);
        if previous.is_some() {
            tracing::debug!(%qualified, "unit already resident; reloading");
        }

        // Build the new exports before touching the registry so a failed
        // reload keeps the previous unit resident.
        let exports = self.runtime.execute(&qualified, &paths.unit)?;
        let unit = self
            .registry
            .install(&qualified, &paths.unit, loaded_timestamp(), exports);

        Ok(ImportReceipt {
            unit,
            preparsed,
            reloaded: previous.is_some(),
        })
    }

    /// Run the transform and publication steps without loading anything.
    ///
    /// A missing source file is not an error; the receipt reports that the
    /// preparser was skipped.
    pub fn preparse(&self, spec: &ModuleSpec) -> Result<PreparseReceipt, Error> {
        let paths = self.resolve(spec)?;
        let qualified = spec.qualified_name();

        let serial = self.registry.serial_lock(&qualified);
        let _guard = serial.lock().unwrap_or_else(PoisonError::into_inner);

        let preparsed = self.refresh_unit(&paths)?;
        Ok(PreparseReceipt {
            source: paths.source,
            unit: paths.unit,
            preparsed,
        })
    }

    fn refresh_unit(&self, paths: &ResolvedPaths) -> Result<bool, Error> {
        if !paths.source.is_file() {
            tracing::debug!(source = %paths.source.display(), "no source file; skipping preparse");
            return Ok(false);
        }
        let tool = locate_tool(&self.toolchain.program)?;
        tracing::debug!(tool = %tool.display(), "preparser located");
        preparse_source(&tool, &paths.source)?;
        publish_unit(&paths.staged, &paths.unit)?;
        Ok(true)
    }
}

fn loaded_timestamp() -> Option<String> {
    use time::format_description::well_known::Rfc3339;
    time::OffsetDateTime::now_utc().format(&Rfc3339).ok()
}
