//! Purpose: Hold top-level CLI command dispatch for `modflux`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Output envelopes and exit code semantics stay stable per command.
//! Invariants: Helpers in `main.rs` remain the source of output formatting.

use super::*;

pub(super) fn dispatch_command(
    command: Command,
    module_dir: PathBuf,
    toolchain: Toolchain,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "modflux", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output();
            Ok(RunOutcome::ok())
        }
        Command::Resolve {
            name,
            package,
            json,
        } => {
            let importer = pipeline(&module_dir, &toolchain);
            let spec = module_spec(&name, package.as_deref());
            let paths = importer.resolve(&spec)?;
            if json {
                emit_json(resolved_json(&name, &spec, &paths));
            } else {
                emit_resolve_human(&spec, &paths);
            }
            Ok(RunOutcome::ok())
        }
        Command::Load {
            names,
            package,
            json,
        } => {
            let importer = pipeline(&module_dir, &toolchain);
            let mut receipts = Vec::new();
            for name in names {
                let spec = module_spec(&name, package.as_deref());
                let receipt = importer
                    .import(&spec)
                    .map_err(|err| add_missing_unit_hint(err, &name, &toolchain))?;
                receipts.push((name, receipt));
            }
            if json {
                let values = receipts
                    .iter()
                    .map(|(name, receipt)| load_receipt_json(name, receipt))
                    .collect::<Vec<_>>();
                emit_json(json!({ "loaded": values }));
            } else {
                for (_, receipt) in &receipts {
                    emit_load_human(receipt);
                }
            }
            Ok(RunOutcome::ok())
        }
        Command::Preparse {
            names,
            package,
            json,
        } => {
            let importer = pipeline(&module_dir, &toolchain);
            let mut receipts = Vec::new();
            for name in names {
                let spec = module_spec(&name, package.as_deref());
                let receipt = importer.preparse(&spec)?;
                receipts.push((name, receipt));
            }
            if json {
                let values = receipts
                    .iter()
                    .map(|(name, receipt)| preparse_receipt_json(name, receipt))
                    .collect::<Vec<_>>();
                emit_json(json!({ "preparsed": values }));
            } else {
                for (name, receipt) in &receipts {
                    emit_preparse_human(name, receipt);
                }
            }
            Ok(RunOutcome::ok())
        }
        Command::Sweep { json } => {
            let outcome = sweep::sweep_dir(&sweep::SweepConfig {
                dir: module_dir,
                toolchain,
            })?;
            if json {
                let entries = serde_json::to_value(&outcome.entries)
                    .unwrap_or_else(|_| Value::Array(Vec::new()));
                emit_json(json!({
                    "swept": entries,
                    "removed": outcome.removed,
                    "failed": outcome.failed,
                }));
            } else {
                emit_sweep_human(&outcome);
            }
            if outcome.failed > 0 {
                Ok(RunOutcome::with_code(to_exit_code(ErrorKind::Io)))
            } else {
                Ok(RunOutcome::ok())
            }
        }
    }
}
