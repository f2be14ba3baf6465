// ABOUTME: Integration tests for the marginalia CLI binary.
// ABOUTME: Tests file and stdin input, output files and directories, JSON reports, stage switches and config errors.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn marginalia_cmd() -> Command {
    Command::cargo_bin("marginalia").unwrap()
}

const PAGE: &str = r##"<!DOCTYPE html>
<html>
<head><title>Test Page</title></head>
<body>
<p>See <a href="#bib-smith99">3</a>.</p>
<p>A claim.</p>
<div class="footnote"><a id="footnr-1"></a><sup><a href="#footnote-1">1</a></sup><p>1. A note.</p></div>
<dl><dd><a id="bib-smith99"></a><p>Smith, 1999.</p></dd></dl>
</body>
</html>"##;

#[test]
fn enhances_html_file_to_stdout() {
    let temp_dir = TempDir::new().unwrap();
    let html_path = temp_dir.path().join("page.html");
    fs::write(&html_path, PAGE).unwrap();

    marginalia_cmd()
        .arg(&html_path)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"id="cite-bubble-1""#))
        .stdout(predicate::str::contains(r#"<li id="footnote-1">"#))
        .stdout(predicate::str::contains(r#"id="fn-bubble-1""#));
}

#[test]
fn reads_stdin() {
    marginalia_cmd()
        .write_stdin(r##"<p><a href="#bib-x">1</a></p>"##)
        .assert()
        .success()
        .stdout(predicate::str::contains("Citation not found."));
}

#[test]
fn writes_output_file() {
    let temp_dir = TempDir::new().unwrap();
    let html_path = temp_dir.path().join("page.html");
    let out_path = temp_dir.path().join("out.html");
    fs::write(&html_path, PAGE).unwrap();

    marginalia_cmd()
        .arg(&html_path)
        .arg("-o")
        .arg(&out_path)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let written = fs::read_to_string(&out_path).unwrap();
    assert!(written.contains("footnotes-ready"));
}

#[test]
fn several_inputs_go_to_a_directory() {
    let temp_dir = TempDir::new().unwrap();
    let a = temp_dir.path().join("a.html");
    let b = temp_dir.path().join("b.html");
    fs::write(&a, PAGE).unwrap();
    fs::write(&b, "<p>plain</p>").unwrap();
    let out_dir = temp_dir.path().join("out");

    marginalia_cmd()
        .arg(&a)
        .arg(&b)
        .arg("--output")
        .arg(&out_dir)
        .assert()
        .success();

    assert!(fs::read_to_string(out_dir.join("a.html"))
        .unwrap()
        .contains("cite-popover"));
    assert_eq!(fs::read_to_string(out_dir.join("b.html")).unwrap(), "<p>plain</p>");
}

#[test]
fn inputs_sharing_a_file_name_are_refused() {
    let temp_dir = TempDir::new().unwrap();
    for dir in ["a", "b"] {
        fs::create_dir(temp_dir.path().join(dir)).unwrap();
        fs::write(temp_dir.path().join(dir).join("index.html"), "<p>x</p>").unwrap();
    }
    let out_dir = temp_dir.path().join("out");

    marginalia_cmd()
        .arg(temp_dir.path().join("a").join("index.html"))
        .arg(temp_dir.path().join("b").join("index.html"))
        .arg("-o")
        .arg(&out_dir)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("would both be written to"));

    assert!(!out_dir.join("index.html").exists());
}

#[test]
fn json_prints_reports() {
    let temp_dir = TempDir::new().unwrap();
    let html_path = temp_dir.path().join("page.html");
    fs::write(&html_path, PAGE).unwrap();

    let output = marginalia_cmd().arg(&html_path).arg("--json").output().unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["source"], "page.html");
    assert_eq!(report["bubbles"], 2);
    assert_eq!(report["endnotes"]["endnotes"][0], "footnote-1");
    assert_eq!(report["citations"]["bubbles"][0]["key"], "smith99");
    assert!(report.get("html").is_none());
}

#[test]
fn stage_switches_disable_stages() {
    let temp_dir = TempDir::new().unwrap();
    let html_path = temp_dir.path().join("page.html");
    fs::write(&html_path, PAGE).unwrap();

    marginalia_cmd()
        .arg(&html_path)
        .arg("--no-citations")
        .arg("--no-endnotes")
        .assert()
        .success()
        .stdout(predicate::str::contains("cite-bubble").not())
        .stdout(predicate::str::contains(r#"<section id="notes">"#).not())
        .stdout(predicate::str::contains(r#"id="fn-bubble-1""#));
}

#[test]
fn config_file_overrides_presets() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("marginalia.json");
    fs::write(&config_path, r#"{ "citations": { "fallback": "No such source." } }"#).unwrap();

    marginalia_cmd()
        .arg("--config")
        .arg(&config_path)
        .write_stdin(r##"<p><a href="#bib-missing">1</a></p>"##)
        .assert()
        .success()
        .stdout(predicate::str::contains("No such source."));
}

#[test]
fn invalid_config_exits_with_error() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("marginalia.json");
    fs::write(&config_path, r#"{ "citations": { "references": "a[" } }"#).unwrap();

    marginalia_cmd()
        .arg("--config")
        .arg(&config_path)
        .write_stdin("<p>x</p>")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid selector"));
}

#[test]
fn missing_file_is_reported_and_others_still_processed() {
    let temp_dir = TempDir::new().unwrap();
    let html_path = temp_dir.path().join("page.html");
    fs::write(&html_path, "<p>ok</p>").unwrap();

    marginalia_cmd()
        .arg(temp_dir.path().join("missing.html"))
        .arg(&html_path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("file not found"))
        .stdout(predicate::str::contains("<p>ok</p>"));
}

#[test]
fn charset_flag_decodes_input() {
    let temp_dir = TempDir::new().unwrap();
    let html_path = temp_dir.path().join("latin1.html");
    fs::write(&html_path, b"<p>caf\xe9</p>").unwrap();

    marginalia_cmd()
        .arg(&html_path)
        .arg("--charset")
        .arg("iso-8859-1")
        .assert()
        .success()
        .stdout(predicate::str::contains("café"));
}

#[test]
fn timing_goes_to_stderr() {
    marginalia_cmd()
        .arg("--timing")
        .write_stdin("<p>x</p>")
        .assert()
        .success()
        .stderr(predicate::str::contains("elapsed:"));
}
