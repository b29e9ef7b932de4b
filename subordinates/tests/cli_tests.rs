// Command line behaviour against a temporary store

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use subordinates_core::test_helpers::TokenBuilder;

struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new(bus: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("subordinates.toml");
        std::fs::write(
            &config,
            format!(
                r#"
[controller]
id = "0000000000000001"
bus = "{bus}"

[store]
path = "{store}"

[credentials]
bridges_dir = "{bridges}"

[service]
restart_command = []

[logging]
level = "warn"
"#,
                store = dir.path().join("store.json").display(),
                bridges = dir.path().join("bridges").display(),
            ),
        )
        .unwrap();
        Self { dir, config }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("subordinates").unwrap();
        cmd.env_remove("SUBORDINATES_CONTROLLER_ID")
            .env_remove("SUBORDINATES_BUS")
            .env_remove("SUBORDINATES_BRIDGES_DIR")
            .env_remove("SUBORDINATES_STORE_PATH")
            .env_remove("SUBORDINATES_LOG_LEVEL")
            .arg("--config")
            .arg(&self.config);
        cmd
    }

    fn write_token(&self, device_id: &str) -> PathBuf {
        let path = self.dir.path().join(format!("{device_id}.token"));
        std::fs::write(&path, TokenBuilder::new(device_id).build()).unwrap();
        path
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn list(&self) -> serde_json::Value {
        let output = self.cmd().arg("list").output().unwrap();
        assert!(output.status.success());
        serde_json::from_slice(&output.stdout).unwrap()
    }
}

#[test]
fn test_cli_help_displays() {
    let mut cmd = Command::cargo_bin("subordinates").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("subordinate controllers"));
}

#[test]
fn test_add_subsub_requires_via() {
    let ws = Workspace::new("mqtt");
    ws.cmd()
        .args(["add-subsub", "--controller-id", "1122334455667788"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_empty_listing() {
    let ws = Workspace::new("mqtt");
    assert_eq!(ws.list(), serde_json::json!({ "subordinates": [] }));
}

#[test]
fn test_provision_and_manage() {
    let ws = Workspace::new("mqtt");
    let token = ws.write_token("1122334455667788");

    ws.cmd()
        .args(["add-sub", "--token-file"])
        .arg(&token)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""controller_id":"1122334455667788""#))
        .stdout(predicate::str::contains(r#""result":true"#));
    assert!(ws
        .root()
        .join("bridges/1122334455667788/token.key")
        .exists());

    ws.cmd()
        .args(["add-subsub", "--controller-id", "8877665544332211"])
        .args(["--via", "1122334455667788"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""result":true"#));

    ws.cmd()
        .args(["set-enabled", "--controller-id", "1122334455667788", "--enabled", "false"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""enabled":false"#));

    ws.cmd()
        .args(["update-sub", "--controller-id", "1122334455667788"])
        .args(["--custom-name", "garage", "--ip-address", "10.0.0.7"])
        .assert()
        .success();
    ws.cmd()
        .args(["update-subsub", "--controller-id", "8877665544332211"])
        .args(["--custom-name", "shed"])
        .assert()
        .success();

    let listing = ws.list();
    let node = &listing["subordinates"][0];
    assert_eq!(node["controller_id"], "1122334455667788");
    assert_eq!(node["enabled"], false);
    assert_eq!(node["options"]["custom_name"], "garage");
    assert_eq!(node["options"]["ip_address"], "10.0.0.7");
    assert_eq!(node["subsubordinates"][0]["options"]["custom_name"], "shed");

    ws.cmd()
        .args(["del", "--controller-id", "1122334455667788"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""result":true"#));
    assert_eq!(ws.list(), serde_json::json!({ "subordinates": [] }));
    assert!(!ws.root().join("bridges/1122334455667788").exists());
}

#[test]
fn test_token_from_stdin() {
    let ws = Workspace::new("mqtt");
    ws.cmd()
        .args(["add-sub", "--token-file", "-"])
        .write_stdin(TokenBuilder::new("1122334455667788").build())
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""result":true"#));
}

#[test]
fn test_duplicate_token_is_refused() {
    let ws = Workspace::new("mqtt");
    let token = ws.write_token("1122334455667788");

    ws.cmd().args(["add-sub", "--token-file"]).arg(&token).assert().success();
    ws.cmd()
        .args(["add-sub", "--token-file"])
        .arg(&token)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""result":false"#));
}

#[test]
fn test_bad_token_fails() {
    let ws = Workspace::new("mqtt");
    ws.cmd()
        .args(["add-sub", "--token-file", "-"])
        .write_stdin("definitely not a token")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
    assert_eq!(ws.list(), serde_json::json!({ "subordinates": [] }));
}

#[test]
fn test_unknown_node_is_refused() {
    let ws = Workspace::new("mqtt");
    ws.cmd()
        .args(["del", "--controller-id", "1122334455667788"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""result":false"#));
}

#[test]
fn test_non_bridging_bus_refuses_provisioning() {
    let ws = Workspace::new("unix-socket");
    let token = ws.write_token("1122334455667788");
    ws.cmd()
        .args(["add-sub", "--token-file"])
        .arg(&token)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""result":false"#));
    assert!(!ws.root().join("bridges/1122334455667788").exists());
}

#[test]
fn test_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("broken.toml");
    std::fs::write(&config, "[controller]\nbus = \"pigeon\"\n").unwrap();

    let mut cmd = Command::cargo_bin("subordinates").unwrap();
    cmd.arg("--config")
        .arg(&config)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration"));
}

#[test]
fn test_malformed_subsub_id_is_refused() {
    let ws = Workspace::new("mqtt");
    let token = ws.write_token("1122334455667788");
    ws.cmd().args(["add-sub", "--token-file"]).arg(&token).assert().success();

    ws.cmd()
        .args(["add-subsub", "--controller-id", "../escape"])
        .args(["--via", "1122334455667788"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""result":false"#))
        .stdout(predicate::str::contains("not a valid controller id"));
    assert!(ws.root().join("bridges/1122334455667788/token.key").exists());
}
