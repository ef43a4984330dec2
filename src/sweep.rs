//! Purpose: Remove derived artifacts for preparsed module sources.
//! Exports: `SweepConfig`, `SweepOutcome`, `SweepEntry`, `sweep_dir`.
//! Role: Best-effort cleanup of unit and leftover staged files in one directory.
//! Invariants: Source files are never deleted; only derived artifacts are.
//! Invariants: Individual delete failures are reported per path and do not stop the sweep.

use std::path::{Path, PathBuf};

use serde::Serialize;

use modflux::api::{Error, ErrorKind, Toolchain};

#[derive(Debug)]
pub struct SweepConfig {
    pub dir: PathBuf,
    pub toolchain: Toolchain,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepEntry {
    pub path: String,
    pub removed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Default)]
pub struct SweepOutcome {
    pub entries: Vec<SweepEntry>,
    pub removed: usize,
    pub failed: usize,
}

/// Scan the directory for `*.<source_ext>` files and delete the artifacts
/// derived from each: the published unit and any leftover staged output.
/// Files without a matching source are left alone.
pub fn sweep_dir(config: &SweepConfig) -> Result<SweepOutcome, Error> {
    let mut stems = source_stems(&config.dir, &config.toolchain.source_ext)?;
    stems.sort();

    let mut outcome = SweepOutcome::default();
    for stem in stems {
        let unit = config
            .dir
            .join(format!("{stem}.{}", config.toolchain.unit_ext));
        let staged = config.dir.join(format!(
            "{stem}.{}.{}",
            config.toolchain.source_ext, config.toolchain.staged_ext
        ));
        for candidate in [unit, staged] {
            if !candidate.exists() {
                continue;
            }
            match std::fs::remove_file(&candidate) {
                Ok(()) => {
                    outcome.removed += 1;
                    outcome.entries.push(SweepEntry {
                        path: display_name(&candidate),
                        removed: true,
                        detail: None,
                    });
                }
                Err(err) => {
                    outcome.failed += 1;
                    outcome.entries.push(SweepEntry {
                        path: display_name(&candidate),
                        removed: false,
                        detail: Some(err.to_string()),
                    });
                }
            }
        }
    }
    Ok(outcome)
}

fn source_stems(dir: &Path, source_ext: &str) -> Result<Vec<String>, Error> {
    let entries = std::fs::read_dir(dir).map_err(|err| {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::Permission,
            _ => ErrorKind::Io,
        };
        Error::new(kind)
            .with_message("failed to read module directory")
            .with_path(dir)
            .with_source(err)
    })?;

    let mut stems = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read module directory entry")
                .with_path(dir)
                .with_source(err)
        })?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(source_ext) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
            stems.push(stem.to_string());
        }
    }
    Ok(stems)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::{SweepConfig, sweep_dir};
    use modflux::api::Toolchain;
    use std::path::Path;

    fn write(path: &Path, content: &str) {
        std::fs::write(path, content).expect("write file");
    }

    fn config(dir: &Path) -> SweepConfig {
        SweepConfig {
            dir: dir.to_path_buf(),
            toolchain: Toolchain::default(),
        }
    }

    #[test]
    fn sweep_removes_derived_artifacts_only() {
        let temp = tempfile::tempdir().expect("tempdir");
        write(&temp.path().join("demo.mxs"), "source\n");
        write(&temp.path().join("demo.mxu"), "unit\n");
        write(&temp.path().join("demo.mxs.out"), "staged leftover\n");
        // no matching source: must survive the sweep
        write(&temp.path().join("keep.mxu"), "unit without source\n");

        let outcome = sweep_dir(&config(temp.path())).expect("sweep");

        assert_eq!(outcome.removed, 2);
        assert_eq!(outcome.failed, 0);
        assert!(temp.path().join("demo.mxs").is_file());
        assert!(!temp.path().join("demo.mxu").exists());
        assert!(!temp.path().join("demo.mxs.out").exists());
        assert!(temp.path().join("keep.mxu").is_file());
    }

    #[test]
    fn sweep_of_clean_dir_reports_nothing() {
        let temp = tempfile::tempdir().expect("tempdir");
        write(&temp.path().join("demo.mxs"), "source only\n");

        let outcome = sweep_dir(&config(temp.path())).expect("sweep");

        assert!(outcome.entries.is_empty());
        assert_eq!(outcome.removed, 0);
    }

    #[test]
    fn missing_dir_is_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let gone = temp.path().join("gone");
        let err = sweep_dir(&config(&gone)).expect_err("missing dir");
        assert_eq!(err.kind(), modflux::api::ErrorKind::NotFound);
    }
}
