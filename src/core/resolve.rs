//! Purpose: Resolve symbolic module names to source, staged, and unit paths.
//! Exports: `Toolchain`, `ModuleSpec`, `ResolvedPaths`, `resolve_paths`.
//! Role: Pure name-to-path policy shared by the importer and the CLI.
//! Invariants: Module names and package segments never contain path separators.
//! Invariants: Resolved paths are absolute and share one directory and stem.

use std::path::{Path, PathBuf};

use crate::core::error::{Error, ErrorKind};

/// Naming conventions for the external preparser and its artifacts.
///
/// The staged suffix is appended to the full source file name because the
/// preparser always writes next to its input; it takes no output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub program: String,
    pub source_ext: String,
    pub staged_ext: String,
    pub unit_ext: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            program: "mxc".to_string(),
            source_ext: "mxs".to_string(),
            staged_ext: "out".to_string(),
            unit_ext: "mxu".to_string(),
        }
    }
}

impl Toolchain {
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_suffixes(
        mut self,
        source_ext: impl Into<String>,
        staged_ext: impl Into<String>,
        unit_ext: impl Into<String>,
    ) -> Self {
        self.source_ext = source_ext.into();
        self.staged_ext = staged_ext.into();
        self.unit_ext = unit_ext.into();
        self
    }
}

/// Identifies one loadable unit for a single pipeline call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpec {
    name: String,
    package: Option<String>,
    base: Option<PathBuf>,
}

impl ModuleSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package: None,
            base: None,
        }
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    pub fn with_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    pub fn base(&self) -> Option<&Path> {
        self.base.as_deref()
    }

    /// Registry key: `package.name` when a package is set, bare `name` otherwise.
    pub fn qualified_name(&self) -> String {
        match &self.package {
            Some(package) => format!("{package}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// The three derived paths for one module, all in the same directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub dir: PathBuf,
    pub source: PathBuf,
    pub staged: PathBuf,
    pub unit: PathBuf,
}

pub fn resolve_paths(
    spec: &ModuleSpec,
    default_base: &Path,
    toolchain: &Toolchain,
) -> Result<ResolvedPaths, Error> {
    validate_name(spec.name())?;
    if let Some(package) = spec.package() {
        validate_package(package)?;
    }

    let base = spec.base().unwrap_or(default_base);
    let mut dir = base.to_path_buf();
    if let Some(package) = spec.package() {
        // Only the package is dotted namespace syntax; dots in the module
        // name are part of the file stem.
        for segment in package.split('.') {
            dir.push(segment);
        }
    }
    let dir = absolutize(&dir)?;

    let name = spec.name();
    let source = dir.join(format!("{name}.{}", toolchain.source_ext));
    let staged = dir.join(format!(
        "{name}.{}.{}",
        toolchain.source_ext, toolchain.staged_ext
    ));
    let unit = dir.join(format!("{name}.{}", toolchain.unit_ext));

    Ok(ResolvedPaths {
        dir,
        source,
        staged,
        unit,
    })
}

fn validate_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message("module name must not be empty"));
    }
    if name.chars().any(std::path::is_separator) {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("module name must not contain path separators"));
    }
    Ok(())
}

fn validate_package(package: &str) -> Result<(), Error> {
    for segment in package.split('.') {
        if segment.is_empty() {
            return Err(
                Error::new(ErrorKind::Usage).with_message("package segments must not be empty")
            );
        }
        if segment.chars().any(std::path::is_separator) {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("package segments must not contain path separators"));
        }
    }
    Ok(())
}

/// Absolute form without touching the filesystem beyond reading the cwd, so
/// paths that do not exist yet still resolve.
pub(crate) fn absolutize(path: &Path) -> Result<PathBuf, Error> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read current directory")
            .with_source(err)
    })?;
    Ok(cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::{ModuleSpec, ResolvedPaths, Toolchain, resolve_paths};
    use crate::core::error::ErrorKind;
    use std::path::Path;

    fn resolve(spec: &ModuleSpec) -> ResolvedPaths {
        resolve_paths(spec, Path::new("/modules"), &Toolchain::default()).expect("resolve")
    }

    #[test]
    fn bare_name_resolves_in_base_dir() {
        let paths = resolve(&ModuleSpec::new("signature"));
        assert_eq!(paths.dir, Path::new("/modules"));
        assert_eq!(paths.source, Path::new("/modules/signature.mxs"));
        assert_eq!(paths.staged, Path::new("/modules/signature.mxs.out"));
        assert_eq!(paths.unit, Path::new("/modules/signature.mxu"));
    }

    #[test]
    fn package_dots_become_path_segments() {
        let spec = ModuleSpec::new("cable").with_package("gaknot.sums");
        let paths = resolve(&spec);
        assert_eq!(paths.dir, Path::new("/modules/gaknot/sums"));
        assert_eq!(paths.unit, Path::new("/modules/gaknot/sums/cable.mxu"));
    }

    #[test]
    fn spec_base_overrides_default_base() {
        let spec = ModuleSpec::new("cable").with_base("/elsewhere");
        let paths = resolve(&spec);
        assert_eq!(paths.dir, Path::new("/elsewhere"));
    }

    #[test]
    fn dots_in_module_name_stay_in_the_stem() {
        let paths = resolve(&ModuleSpec::new("v2.cable"));
        assert_eq!(paths.source, Path::new("/modules/v2.cable.mxs"));
        assert_eq!(paths.unit, Path::new("/modules/v2.cable.mxu"));
    }

    #[test]
    fn relative_base_is_absolutized() {
        let spec = ModuleSpec::new("cable").with_base("rel/dir");
        let paths =
            resolve_paths(&spec, Path::new(""), &Toolchain::default()).expect("resolve");
        assert!(paths.dir.is_absolute());
        assert!(paths.dir.ends_with("rel/dir"));
    }

    #[test]
    fn resolution_is_repeatable() {
        let spec = ModuleSpec::new("cable").with_package("gaknot");
        assert_eq!(resolve(&spec), resolve(&spec));
    }

    #[test]
    fn name_with_separator_is_rejected() {
        let err = resolve_paths(
            &ModuleSpec::new("bad/name"),
            Path::new("/modules"),
            &Toolchain::default(),
        )
        .expect_err("separator must be rejected");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn empty_package_segment_is_rejected() {
        let spec = ModuleSpec::new("cable").with_package("gaknot..sums");
        let err = resolve_paths(&spec, Path::new("/modules"), &Toolchain::default())
            .expect_err("empty segment must be rejected");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn custom_toolchain_suffixes_flow_through() {
        let toolchain = Toolchain::default()
            .with_program("translate")
            .with_suffixes("dsl", "gen", "obj");
        let paths = resolve_paths(&ModuleSpec::new("demo"), Path::new("/modules"), &toolchain)
            .expect("resolve");
        assert_eq!(paths.source, Path::new("/modules/demo.dsl"));
        assert_eq!(paths.staged, Path::new("/modules/demo.dsl.gen"));
        assert_eq!(paths.unit, Path::new("/modules/demo.obj"));
    }

    #[test]
    fn qualified_name_joins_package_and_name() {
        assert_eq!(ModuleSpec::new("cable").qualified_name(), "cable");
        assert_eq!(
            ModuleSpec::new("cable").with_package("gaknot").qualified_name(),
            "gaknot.cable"
        );
    }
}
