use std::path::{Path, PathBuf};
use std::process::Output;

use assert_cmd::Command;
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Config file that keeps patterns inside `dir` and never calls a model.
fn write_config(dir: &TempDir, extra: &str) -> PathBuf {
    let path = dir.path().join("config.yaml");
    let patterns = dir.path().join("patterns.json");
    let body = format!(
        "ai:\n  enabled: false\npatterns:\n  storage_path: {}\n{extra}",
        patterns.display()
    );
    std::fs::write(&path, body).unwrap();
    path
}

fn guidepath(config: &Path, args: &[&str]) -> Output {
    Command::cargo_bin("guidepath")
        .unwrap()
        .env_remove("GUIDEPATH_AI_ENABLED")
        .env_remove("GUIDEPATH_BACKEND_URL")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .unwrap()
}

fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn config_validate_reports_problems() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_config(&dir, "");
    let output = guidepath(&good, &["config", "validate"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("is valid"));

    let bad = write_config(&dir, "resolver:\n  order: [text, text]\n");
    let output = guidepath(&bad, &["config", "validate"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("more than once"));
}

#[test]
fn resolve_records_a_pattern_that_survives_the_process() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, "");
    let page = fixture("contacts_page.json");
    let page = page.to_str().unwrap();

    let output = guidepath(
        &config,
        &[
            "--output",
            "json",
            "resolve",
            "--page",
            page,
            "--instruction",
            "Click Save contact",
            "--selector",
            "#save-contact",
        ],
    );
    let result = stdout_json(&output);
    assert_eq!(result["status"], "found");
    assert_eq!(result["selector"], "#save-contact");
    assert_eq!(result["strategy"], "direct_selector");
    let pattern_id = result["pattern_id"].as_str().unwrap().to_string();

    let listed = stdout_json(&guidepath(&config, &["--output", "json", "patterns", "list"]));
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"], pattern_id.as_str());
    assert_eq!(listed[0]["intent"], "click save contact");

    let updated = stdout_json(&guidepath(
        &config,
        &["--output", "json", "feedback", &pattern_id, "--success"],
    ));
    assert_eq!(updated["success_count"], 1);

    // Served from the learned pattern now, without the hint.
    let again = stdout_json(&guidepath(
        &config,
        &[
            "--output",
            "json",
            "resolve",
            "--page",
            page,
            "--instruction",
            "click   save contact",
        ],
    ));
    assert_eq!(again["strategy"], "pattern_cache");
    assert_eq!(again["pattern_id"], pattern_id.as_str());
}

#[test]
fn workflow_commands_accept_good_files_and_reject_custom_checks() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, "");
    let good = fixture("add_contact.yaml");
    let bad = fixture("custom_validation.yaml");

    let output = guidepath(&config, &["workflow", "validate", good.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("add_contact"));

    let output = guidepath(&config, &["workflow", "validate", bad.to_str().unwrap()]);
    assert!(!output.status.success());

    let hints = stdout_json(&guidepath(
        &config,
        &["--output", "json", "workflow", "optimize", good.to_str().unwrap()],
    ));
    let hints = hints.as_array().unwrap();
    assert_eq!(hints.len(), 1);
    assert_eq!(hints[0]["step_id"], "save");
}

#[test]
fn guide_walks_every_step_against_the_page() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, "");
    let outcomes = stdout_json(&guidepath(
        &config,
        &[
            "--output",
            "json",
            "workflow",
            "guide",
            fixture("add_contact.yaml").to_str().unwrap(),
            "--page",
            fixture("contacts_page.json").to_str().unwrap(),
        ],
    ));
    let outcomes = outcomes.as_array().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0]["selector"], "input[name=\"full_name\"]");
    assert_eq!(outcomes[1]["selector"], "#save-contact");
    assert_eq!(outcomes[1]["complete"], true);
}
