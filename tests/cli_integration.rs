// CLI integration tests for the modflux binary.
use std::path::Path;
use std::process::Command;

use serde_json::Value;

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_modflux");
    Command::new(exe)
}

fn parse_json(value: &str) -> Value {
    serde_json::from_str(value).expect("valid json")
}

fn parse_json_line(output: &[u8]) -> Value {
    let text = String::from_utf8_lossy(output);
    let line = text.lines().next().expect("json line");
    parse_json(line)
}

// stderr carries advisory log lines as well; the error envelope is the JSON one
fn parse_stderr_error(output: &[u8]) -> Value {
    let text = String::from_utf8_lossy(output);
    let line = text
        .lines()
        .find(|line| line.starts_with('{'))
        .expect("error json line");
    parse_json(line)
}

fn write(path: &Path, content: &str) {
    std::fs::write(path, content).expect("write file");
}

#[test]
fn resolve_emits_the_three_derived_paths() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = cmd()
        .args([
            "--dir",
            temp.path().to_str().unwrap(),
            "resolve",
            "signature",
            "--package",
            "gaknot",
            "--json",
        ])
        .output()
        .expect("resolve");
    assert!(output.status.success());

    let value = parse_json_line(&output.stdout);
    assert_eq!(value["module"], "signature");
    assert_eq!(value["qualified"], "gaknot.signature");
    assert!(value["dir"].as_str().unwrap().ends_with("gaknot"));
    assert!(value["source"].as_str().unwrap().ends_with("gaknot/signature.mxs"));
    assert!(value["staged"].as_str().unwrap().ends_with("gaknot/signature.mxs.out"));
    assert!(value["unit"].as_str().unwrap().ends_with("gaknot/signature.mxu"));
}

#[test]
fn load_registers_an_existing_unit() {
    let temp = tempfile::tempdir().expect("tempdir");
    write(&temp.path().join("demo.mxu"), "resident = true\n");

    let output = cmd()
        .args(["--dir", temp.path().to_str().unwrap(), "load", "demo", "--json"])
        .output()
        .expect("load");
    assert!(output.status.success());

    let value = parse_json_line(&output.stdout);
    let loaded = value["loaded"].as_array().expect("loaded array");
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0]["module"], "demo");
    assert_eq!(loaded[0]["qualified"], "demo");
    assert_eq!(loaded[0]["generation"], 1);
    assert_eq!(loaded[0]["preparsed"], false);
    assert_eq!(loaded[0]["reloaded"], false);
    assert_eq!(loaded[0]["exports"]["kind"], "source");
}

#[test]
fn loading_the_same_name_twice_reloads_in_place() {
    let temp = tempfile::tempdir().expect("tempdir");
    write(&temp.path().join("demo.mxu"), "v = 1\n");

    let output = cmd()
        .args([
            "--dir",
            temp.path().to_str().unwrap(),
            "load",
            "demo",
            "demo",
            "--json",
        ])
        .output()
        .expect("load");
    assert!(output.status.success());

    let value = parse_json_line(&output.stdout);
    let loaded = value["loaded"].as_array().expect("loaded array");
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0]["generation"], 1);
    assert_eq!(loaded[1]["generation"], 2);
    assert_eq!(loaded[1]["reloaded"], true);
}

#[test]
fn loading_a_missing_module_reports_not_found_with_a_hint() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = cmd()
        .args(["--dir", temp.path().to_str().unwrap(), "load", "ghost"])
        .output()
        .expect("load");
    assert_eq!(output.status.code(), Some(3));

    let err = parse_stderr_error(&output.stderr);
    assert_eq!(err["error"]["kind"], "NotFound");
    let hint = err["error"]["hint"].as_str().expect("hint");
    assert!(hint.contains("ghost.mxs"));
    assert!(hint.contains("ghost.mxu"));
}

#[test]
fn a_name_with_separators_is_a_usage_error() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = cmd()
        .args(["--dir", temp.path().to_str().unwrap(), "load", "bad/name"])
        .output()
        .expect("load");
    assert_eq!(output.status.code(), Some(2));

    let err = parse_stderr_error(&output.stderr);
    assert_eq!(err["error"]["kind"], "Usage");
}

#[test]
fn missing_tool_maps_to_its_own_exit_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    write(&temp.path().join("demo.mxs"), "needs preparse\n");

    let output = cmd()
        .args([
            "--dir",
            temp.path().to_str().unwrap(),
            "--tool",
            "modflux-missing-tool-cli",
            "load",
            "demo",
        ])
        .output()
        .expect("load");
    assert_eq!(output.status.code(), Some(4));

    let err = parse_stderr_error(&output.stderr);
    assert_eq!(err["error"]["kind"], "ToolNotFound");
    assert!(err["error"]["hint"].as_str().expect("hint").contains("--tool"));
}

#[cfg(unix)]
#[test]
fn preparse_translates_through_an_explicit_tool_path() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempfile::tempdir().expect("tempdir");
    let tool = temp.path().join("fake-mxc");
    write(
        &tool,
        "#!/bin/sh\ntr '[:lower:]' '[:upper:]' < \"$2\" > \"$2.out\"\n",
    );
    std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    write(&temp.path().join("demo.mxs"), "hello units\n");

    let output = cmd()
        .args([
            "--dir",
            temp.path().to_str().unwrap(),
            "--tool",
            tool.to_str().unwrap(),
            "preparse",
            "demo",
            "--json",
        ])
        .output()
        .expect("preparse");
    assert!(output.status.success());

    let value = parse_json_line(&output.stdout);
    let results = value["preparsed"].as_array().expect("preparsed array");
    assert_eq!(results[0]["module"], "demo");
    assert_eq!(results[0]["ran"], true);
    assert_eq!(
        std::fs::read_to_string(temp.path().join("demo.mxu")).expect("read unit"),
        "HELLO UNITS\n"
    );
    assert!(!temp.path().join("demo.mxs.out").exists());
}

#[test]
fn preparse_skips_names_without_a_source() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = cmd()
        .args([
            "--dir",
            temp.path().to_str().unwrap(),
            "preparse",
            "absent",
            "--json",
        ])
        .output()
        .expect("preparse");
    assert!(output.status.success());

    let value = parse_json_line(&output.stdout);
    assert_eq!(value["preparsed"][0]["ran"], false);
}

#[test]
fn sweep_removes_derived_artifacts_and_reports_them() {
    let temp = tempfile::tempdir().expect("tempdir");
    write(&temp.path().join("demo.mxs"), "source\n");
    write(&temp.path().join("demo.mxu"), "unit\n");
    write(&temp.path().join("demo.mxs.out"), "leftover\n");
    write(&temp.path().join("keep.mxu"), "no source, keep\n");

    let output = cmd()
        .args(["--dir", temp.path().to_str().unwrap(), "sweep", "--json"])
        .output()
        .expect("sweep");
    assert!(output.status.success());

    let value = parse_json_line(&output.stdout);
    assert_eq!(value["removed"], 2);
    assert_eq!(value["failed"], 0);
    assert!(!temp.path().join("demo.mxu").exists());
    assert!(!temp.path().join("demo.mxs.out").exists());
    assert!(temp.path().join("demo.mxs").is_file());
    assert!(temp.path().join("keep.mxu").is_file());
}

#[test]
fn version_emits_json_when_piped() {
    let output = cmd().arg("version").output().expect("version");
    assert!(output.status.success());

    let value = parse_json_line(&output.stdout);
    assert_eq!(value["name"], "modflux");
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn completion_prints_a_script() {
    let output = cmd().args(["completion", "bash"]).output().expect("completion");
    assert!(output.status.success());
    assert!(!output.stdout.is_empty());
}

#[test]
fn no_arguments_shows_help_and_exits_nonzero() {
    let output = cmd().output().expect("bare invocation");
    assert_eq!(output.status.code(), Some(2));
}
