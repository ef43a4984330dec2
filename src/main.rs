//! Purpose: `modflux` CLI entry point and command surface.
//! Role: Binary crate root; parses args, runs commands, emits JSON or short human text.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use clap::{
    CommandFactory, Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod sweep;

use modflux::api::{
    Error, ErrorKind, ImportReceipt, Importer, ModuleSpec, PreparseReceipt, ResolvedPaths,
    Toolchain, to_exit_code,
};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Run `modflux --help` for usage."));
            }
        },
    };

    let toolchain = match cli.tool {
        Some(program) => Toolchain::default().with_program(program),
        None => Toolchain::default(),
    };

    command_dispatch::dispatch_command(cli.command, cli.dir, toolchain)
        .map_err(add_tool_hint)
        .map_err(add_permission_hint)
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid arguments");
    first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string()
}

#[derive(Parser)]
#[command(
    name = "modflux",
    version,
    about = "Preparse and hot-reload externally translated module units",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Module sources (`<name>.mxs`) are translated by an external preparser
into loadable unit files (`<name>.mxu`). Names without a source load the
existing unit file as-is.

Mental model:
  - `preparse` translates sources into unit files (transform only)
  - `load` runs the full pipeline and registers the unit
  - `resolve` prints the paths a name maps to (no side effects)
"#,
    after_help = r#"EXAMPLES
  $ modflux resolve signature
  $ modflux load signature
  $ modflux load cable --package gaknot --dir ./modules
  $ modflux sweep --dir ./modules

LEARN MORE
  $ modflux <command> --help"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(
        long,
        default_value = ".",
        help = "Module directory for name resolution",
        value_hint = ValueHint::DirPath
    )]
    dir: PathBuf,
    #[arg(long, help = "Preparser program name or path (default: mxc)")]
    tool: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        arg_required_else_help = true,
        about = "Load (or reload) module units into the registry",
        long_about = r#"Run the full pipeline for each name: preparse the source if one exists,
publish the fresh unit artifact, then load it. Loading a name that is
already resident replaces it in place."#,
        after_help = r#"EXAMPLES
  $ modflux load signature
  $ modflux load signature cable --package gaknot
  $ modflux load signature --json

NOTES
  - A missing source file is fine; the existing unit artifact is loaded as-is.
  - Re-run the same command after editing a source to force a reload.
  - Loading stops at the first failing name."#
    )]
    Load {
        #[arg(required = true, help = "Module name(s), without file extension")]
        names: Vec<String>,
        #[arg(long, help = "Dot-separated package the modules belong to")]
        package: Option<String>,
        #[arg(long, help = "Emit JSON instead of human-readable output")]
        json: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Translate sources into unit files without loading",
        long_about = r#"Run the preparser and publish the unit artifact for each name, skipping
names that have no source file. Nothing is loaded or registered."#,
        after_help = r#"EXAMPLES
  $ modflux preparse signature
  $ modflux preparse signature cable --package gaknot --json

NOTES
  - Names without a source file are reported as skipped, not failed."#
    )]
    Preparse {
        #[arg(required = true, help = "Module name(s), without file extension")]
        names: Vec<String>,
        #[arg(long, help = "Dot-separated package the modules belong to")]
        package: Option<String>,
        #[arg(long, help = "Emit JSON instead of human-readable output")]
        json: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Print the paths a module name resolves to",
        after_help = r#"EXAMPLES
  $ modflux resolve signature
  $ modflux resolve cable --package gaknot --json"#
    )]
    Resolve {
        #[arg(help = "Module name, without file extension")]
        name: String,
        #[arg(long, help = "Dot-separated package the module belongs to")]
        package: Option<String>,
        #[arg(long, help = "Emit JSON instead of human-readable output")]
        json: bool,
    },
    #[command(
        about = "Delete derived artifacts for sources in the module directory",
        long_about = r#"Scan the module directory for source files and delete the artifacts
derived from each: the published unit file and any leftover staged output.
Source files are never touched."#,
        after_help = r#"EXAMPLES
  $ modflux sweep
  $ modflux sweep --dir ./modules --json

NOTES
  - Best effort: attempts every delete and reports per-file failures.
  - Exits non-zero if any delete failed."#
    )]
    Sweep {
        #[arg(long, help = "Emit JSON instead of human-readable output")]
        json: bool,
    },
    #[command(
        about = "Print version info as JSON",
        after_help = r#"EXAMPLES
  $ modflux version"#
    )]
    Version,
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        long_about = r#"Print a completion script for the given shell to stdout.
Install the generated file in your shell's completion directory (or source
it) to enable tab completion."#,
        after_help = r#"EXAMPLES
  $ modflux completion bash > ~/.local/share/bash-completion/completions/modflux
  $ modflux completion zsh > ~/.zfunc/_modflux"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn pipeline(module_dir: &Path, toolchain: &Toolchain) -> Importer {
    Importer::new()
        .with_module_dir(module_dir)
        .with_toolchain(toolchain.clone())
}

fn module_spec(name: &str, package: Option<&str>) -> ModuleSpec {
    let mut spec = ModuleSpec::new(name);
    if let Some(package) = package {
        spec = spec.with_package(package);
    }
    spec
}

// ── Error hint policy ─────────────────────────────────────────────────────
//
// Hints are attached at the CLI boundary only, never in the library, and
// only when the error does not already carry one. Command-specific hints
// (missing unit, missing module dir) are attached at the dispatch site
// where the module name is still known; the kind-based fallbacks below
// catch everything else.

fn add_tool_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::ToolNotFound || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Install the preparser, or point --tool at a program name or executable path.",
    )
}

fn add_permission_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Permission || err.hint().is_some() {
        return err;
    }
    err.with_hint("Permission denied. Check directory permissions or use --dir to a writable location.")
}

fn add_io_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Io || err.hint().is_some() {
        return err;
    }
    err.with_hint("I/O error. Check the path, filesystem, and disk space.")
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_BACKTRACE=1 and share command/context if it persists.",
    )
}

fn add_missing_unit_hint(err: Error, name: &str, toolchain: &Toolchain) -> Error {
    if err.kind() != ErrorKind::NotFound || err.hint().is_some() {
        return err;
    }
    err.with_hint(format!(
        "Nothing to load: create {name}.{} (preparsed) or {name}.{} in the module directory, or pass --dir.",
        toolchain.source_ext, toolchain.unit_ext
    ))
}

fn emit_version_output() {
    if io::stdout().is_terminal() {
        println!("modflux {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(json!({
            "name": "modflux",
            "version": env!("CARGO_PKG_VERSION"),
        }));
    }
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    } else {
        serde_json::to_string(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    };
    println!("{json}");
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::ToolNotFound => "preparser not found".to_string(),
        ErrorKind::Preparse => "preparse failed".to_string(),
        ErrorKind::Publish => "publish failed".to_string(),
        ErrorKind::Load => "load failed".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    use std::error::Error as StdError;
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(path) = err.path() {
        lines.push(format!("  path: {}", path.display()));
    }
    if let Some(status) = err.status() {
        lines.push(format!("  status: {status}"));
    }
    for cause in error_causes(err) {
        lines.push(format!("  cause: {cause}"));
    }
    if let Some(hint) = err.hint() {
        lines.push(format!("  hint: {hint}"));
    }
    lines.join("\n")
}

fn load_receipt_json(name: &str, receipt: &ImportReceipt) -> Value {
    json!({
        "module": name,
        "qualified": receipt.unit.qualified(),
        "path": receipt.unit.path().display().to_string(),
        "generation": receipt.unit.generation(),
        "preparsed": receipt.preparsed,
        "reloaded": receipt.reloaded,
        "loaded_at": receipt.unit.loaded_at(),
        "exports": receipt.unit.exports().describe(),
    })
}

fn preparse_receipt_json(name: &str, receipt: &PreparseReceipt) -> Value {
    json!({
        "module": name,
        "source": receipt.source.display().to_string(),
        "unit": receipt.unit.display().to_string(),
        "ran": receipt.preparsed,
    })
}

fn resolved_json(name: &str, spec: &ModuleSpec, paths: &ResolvedPaths) -> Value {
    json!({
        "module": name,
        "qualified": spec.qualified_name(),
        "dir": paths.dir.display().to_string(),
        "source": paths.source.display().to_string(),
        "staged": paths.staged.display().to_string(),
        "unit": paths.unit.display().to_string(),
    })
}

fn emit_load_human(receipt: &ImportReceipt) {
    let state = if receipt.reloaded { "reloaded" } else { "loaded" };
    println!(
        "Loaded {} (generation {}, {state})",
        receipt.unit.qualified(),
        receipt.unit.generation()
    );
    println!("  unit: {}", receipt.unit.path().display());
    println!(
        "  preparsed: {}",
        if receipt.preparsed { "yes" } else { "no (no source file)" }
    );
}

fn emit_preparse_human(name: &str, receipt: &PreparseReceipt) {
    if receipt.preparsed {
        println!("Preparsed {name}");
        println!("  unit: {}", receipt.unit.display());
    } else {
        println!("Skipped {name} (no source file)");
        println!("  source: {}", receipt.source.display());
    }
}

fn emit_resolve_human(spec: &ModuleSpec, paths: &ResolvedPaths) {
    println!("{}", spec.qualified_name());
    println!("  dir:    {}", paths.dir.display());
    println!("  source: {}", paths.source.display());
    println!("  staged: {}", paths.staged.display());
    println!("  unit:   {}", paths.unit.display());
}

fn emit_sweep_human(outcome: &sweep::SweepOutcome) {
    if outcome.entries.is_empty() {
        println!("Nothing to sweep.");
        return;
    }
    if outcome.failed == 0 {
        println!("Removed {} artifacts", outcome.removed);
    } else {
        println!(
            "Removed {} of {} artifacts",
            outcome.removed,
            outcome.entries.len()
        );
    }
    for entry in &outcome.entries {
        if entry.removed {
            println!("  - {}", entry.path);
        } else {
            println!(
                "  ! {} ({})",
                entry.path,
                entry.detail.as_deref().unwrap_or("error")
            );
        }
    }
}
