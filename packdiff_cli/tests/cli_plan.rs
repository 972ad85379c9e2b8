use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn packdiff(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("packdiff_cli").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env("APPDATA", config_home)
        .env("HOME", config_home)
        .env_remove("GITHUB_OUTPUT")
        .env_remove("RUST_LOG");
    cmd
}

/// A source tree and a downloaded version with an `overrides` subdirectory
fn fixture() -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("source");
    let download = temp.path().join("download");

    write(&source, "config/a.toml", "a = 1\n");
    write(&source, "config/old.toml", "old\n");
    write(&source, "scripts/main.js", "same\n");

    write(&download, "manifest.json", "{}");
    write(&download, "overrides/config/a.toml", "a = 2\n");
    write(&download, "overrides/config/new.toml", "new\n");
    write(&download, "overrides/scripts/main.js", "same\n");

    (temp, source, download)
}

fn plan_json(config_home: &Path, args: &[&str]) -> Value {
    let output = packdiff(config_home)
        .arg("plan")
        .args(args)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).unwrap()
}

#[test]
fn test_plan_with_new_subdir() {
    let (temp, source, download) = fixture();
    let json = plan_json(
        temp.path(),
        &[
            source.to_str().unwrap(),
            download.to_str().unwrap(),
            "--new-subdir",
            "overrides",
        ],
    );

    assert_eq!(json["changes_detected"], true);
    assert_eq!(json["applied"], false);
    assert_eq!(json["plan"]["updated"][0], "config/a.toml");
    assert_eq!(json["plan"]["added"][0], "config/new.toml");
    assert_eq!(json["plan"]["deleted"][0], "config/old.toml");

    // Planning alone leaves the source untouched
    assert!(source.join("config/old.toml").exists());
}

#[test]
fn test_plan_apply_and_github_output() {
    let (temp, source, download) = fixture();
    let github_output = temp.path().join("github_output");

    packdiff(temp.path())
        .env("GITHUB_OUTPUT", &github_output)
        .args([
            "plan",
            source.to_str().unwrap(),
            download.to_str().unwrap(),
            "--new-subdir",
            "overrides",
            "--apply",
        ])
        .assert()
        .success();

    assert_eq!(fs::read_to_string(source.join("config/a.toml")).unwrap(), "a = 2\n");
    assert!(source.join("config/new.toml").exists());
    assert!(!source.join("config/old.toml").exists());
    assert_eq!(fs::read_to_string(&github_output).unwrap(), "changes_detected=true\n");

    // A second run finds nothing left to do
    let json = plan_json(
        temp.path(),
        &[
            source.to_str().unwrap(),
            download.to_str().unwrap(),
            "--new-subdir",
            "overrides",
        ],
    );
    assert_eq!(json["changes_detected"], false);
}

#[test]
fn test_plan_exclusions_keep_deletions() {
    let (temp, source, download) = fixture();
    let json = plan_json(
        temp.path(),
        &[
            source.to_str().unwrap(),
            download.to_str().unwrap(),
            "--new-subdir",
            "overrides",
            "-x",
            "config/",
        ],
    );

    assert!(json["plan"]["updated"].as_array().unwrap().is_empty());
    assert!(json["plan"]["added"].as_array().unwrap().is_empty());
    assert_eq!(json["plan"]["deleted"][0], "config/old.toml");
}

#[test]
fn test_plan_attention_list_from_config() {
    let (temp, source, download) = fixture();
    let config = temp.path().join("packdiff.toml");
    fs::write(
        &config,
        r#"
[[attention.file_patterns]]
pattern = "scripts/*.js"

[[attention.folders]]
path = "config"
ignore_deletions = true
"#,
    )
    .unwrap();

    let json = plan_json(
        temp.path(),
        &[
            source.to_str().unwrap(),
            download.to_str().unwrap(),
            "--new-subdir",
            "overrides",
            "--config",
            config.to_str().unwrap(),
        ],
    );

    assert_eq!(json["plan"]["updated"][0], "config/a.toml");
    assert!(json["plan"]["deleted"].as_array().unwrap().is_empty());
}

#[test]
fn test_plan_missing_subdir_fails() {
    let (temp, source, download) = fixture();
    packdiff(temp.path())
        .args([
            "plan",
            source.to_str().unwrap(),
            download.to_str().unwrap(),
            "--new-subdir",
            "nope",
        ])
        .assert()
        .failure()
        .code(1);
}
