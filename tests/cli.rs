//! Exercises the `clemini-fmt` binary end-to-end: writes a fixture to a
//! temporary file, runs the binary against it, and checks the formatted
//! output. Complements `tests/scenarios.rs`, which drives the library API
//! directly without going through the process boundary.

use std::io::Write;
use std::process::Command;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_clemini-fmt"))
}

#[test]
fn formats_claude_fixture_as_compact_json() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"type":"message","role":"user","content":"Hello"}}"#).unwrap();

    let output = bin()
        .arg(file.path())
        .args(["--vendor", "claude", "--json"])
        .output()
        .expect("clemini-fmt should run");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout, "{\"t\":\"msg\",\"role\":\"user\",\"text\":\"Hello\"}\n");
}

#[test]
fn formats_amp_fixture_as_html_with_hidden_cost() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"phase":"start","task":"build"}}"#).unwrap();
    writeln!(file, r#"{{"phase":"end","task":"build","exitCode":0}}"#).unwrap();

    let output = bin()
        .arg(file.path())
        .args(["--vendor", "amp", "--html", "--hide-cost"])
        .output()
        .expect("clemini-fmt should run");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains(r#"data-tool="build""#));
    assert!(stdout.contains("tool-end success"));
}

#[test]
fn unknown_explicit_vendor_exits_nonzero() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "anything").unwrap();

    let output = bin()
        .arg(file.path())
        .args(["--vendor", "nonexistent"])
        .output()
        .expect("clemini-fmt should run");

    assert!(!output.status.success());
}

#[test]
fn only_filter_restricts_output_to_named_tags() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"type":"message","role":"user","content":"hi"}}"#).unwrap();
    writeln!(file, r#"{{"type":"usage","delta_usd":0.01}}"#).unwrap();

    let output = bin()
        .arg(file.path())
        .args(["--vendor", "claude", "--json", "--only", "cost"])
        .output()
        .expect("clemini-fmt should run");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("\"t\":\"cost\""));
    assert!(!stdout.contains("\"t\":\"msg\""));
}
