//! Purpose: Locate and invoke the external preparser on module sources.
//! Exports: `locate_tool`, `preparse_source`.
//! Role: Child-process boundary for the source-to-staged transform.
//! Invariants: The preparser is invoked argv-style; paths are never shell-interpolated.
//! Invariants: Success requires a zero exit status, never invocation alone.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::core::error::{Error, ErrorKind};
use crate::core::resolve::absolutize;

/// Resolve the preparser to an absolute location, fresh on every call.
///
/// A program value containing a path separator is treated as an explicit
/// location; anything else is searched on `PATH`.
pub fn locate_tool(program: &str) -> Result<PathBuf, Error> {
    if program.is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message("preparser program must not be empty"));
    }
    if program.chars().any(std::path::is_separator) {
        let candidate = PathBuf::from(program);
        if candidate.is_file() {
            return absolutize(&candidate);
        }
        return Err(Error::new(ErrorKind::ToolNotFound)
            .with_message("preparser not found at the given path")
            .with_path(candidate));
    }
    let search = env::var_os("PATH").unwrap_or_default();
    locate_in(program, &search)
}

fn locate_in(program: &str, search: &OsStr) -> Result<PathBuf, Error> {
    for dir in env::split_paths(search) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        let candidate = dir.join(program);
        if candidate.is_file() {
            return absolutize(&candidate);
        }
        #[cfg(windows)]
        {
            let candidate = candidate.with_extension("exe");
            if candidate.is_file() {
                return absolutize(&candidate);
            }
        }
    }
    Err(Error::new(ErrorKind::ToolNotFound)
        .with_message(format!("preparser `{program}` not found on PATH")))
}

/// Run `<tool> --preparse <source>` and wait for it to exit.
///
/// On success the tool is expected to have written the staged output next to
/// the source; only the publisher checks that, since file creation is the
/// tool's contract, not ours.
pub fn preparse_source(tool: &Path, source: &Path) -> Result<(), Error> {
    tracing::debug!(tool = %tool.display(), source = %source.display(), "running preparser");
    let status = Command::new(tool)
        .arg("--preparse")
        .arg(source)
        .status()
        .map_err(|err| {
            let kind = if err.kind() == std::io::ErrorKind::NotFound {
                ErrorKind::ToolNotFound
            } else {
                ErrorKind::Io
            };
            Error::new(kind)
                .with_message("failed to launch preparser")
                .with_path(tool)
                .with_source(err)
        })?;

    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => Err(Error::new(ErrorKind::Preparse)
            .with_message("preparser exited with a failure status")
            .with_path(source)
            .with_status(code)),
        None => Err(Error::new(ErrorKind::Preparse)
            .with_message("preparser was terminated by a signal")
            .with_path(source)),
    }
}
