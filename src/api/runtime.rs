//! Purpose: Execution seam between the pipeline and the host runtime.
//! Exports: `UnitRuntime`, `SourceRuntime`.
//! Role: Keeps unit execution pluggable; the pipeline treats units as opaque.
//! Invariants: `execute` either yields a complete handle or leaves no trace.

use std::path::Path;

use serde_json::{Value, json};

use crate::core::error::{Error, ErrorKind};
use crate::core::registry::UnitExports;

/// Executes a published unit artifact and hands back its exports.
///
/// Embedding hosts supply their own implementation; the pipeline only cares
/// that execution either completes or fails without side effects.
pub trait UnitRuntime: Send + Sync {
    fn execute(&self, qualified: &str, unit_path: &Path) -> Result<Box<dyn UnitExports>, Error>;
}

/// Default runtime: snapshots the unit source and exposes size metrics.
///
/// This is enough for the CLI to prove a unit is loadable; hosts with a real
/// interpreter replace it via `Importer::with_runtime`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SourceRuntime;

impl UnitRuntime for SourceRuntime {
    fn execute(&self, qualified: &str, unit_path: &Path) -> Result<Box<dyn UnitExports>, Error> {
        let content = std::fs::read_to_string(unit_path).map_err(|err| {
            let kind = match err.kind() {
                std::io::ErrorKind::NotFound => ErrorKind::NotFound,
                std::io::ErrorKind::InvalidData => ErrorKind::Load,
                std::io::ErrorKind::PermissionDenied => ErrorKind::Permission,
                _ => ErrorKind::Io,
            };
            let message = match kind {
                ErrorKind::NotFound => "unit artifact not found",
                ErrorKind::Load => "unit artifact is not valid UTF-8",
                _ => "failed to read unit artifact",
            };
            Error::new(kind)
                .with_message(message)
                .with_path(unit_path)
                .with_source(err)
        })?;

        if content.trim().is_empty() {
            return Err(Error::new(ErrorKind::Load)
                .with_message("unit artifact is empty")
                .with_path(unit_path));
        }

        tracing::debug!(%qualified, bytes = content.len(), "unit executed");
        Ok(Box::new(SourceExports {
            bytes: content.len() as u64,
            lines: content.lines().count() as u64,
        }))
    }
}

struct SourceExports {
    bytes: u64,
    lines: u64,
}

impl UnitExports for SourceExports {
    fn describe(&self) -> Value {
        json!({
            "kind": "source",
            "bytes": self.bytes,
            "lines": self.lines,
        })
    }
}
