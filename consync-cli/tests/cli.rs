use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

use consync_core::config::{self, PASSWORD_ENV};
use consync_core::{OrderNo, Phase, SyncStatus};
use consync_store::schema::SOURCE_SCHEMA_SQL;
use consync_store::{SqliteStatusStore, SyncStatusStore};

fn consync_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("consync"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("RUST_LOG", "off")
        .env_remove(PASSWORD_ENV);
    cmd
}

fn init_config(home: &Path, base_url: &str) {
    consync_cmd(home)
        .args(["config", "init", "--base-url", base_url, "--username", "sync"])
        .assert()
        .success();
}

#[test]
fn config_init_then_show_round_trips() {
    let home = TempDir::new().expect("home");

    consync_cmd(home.path())
        .args([
            "config",
            "init",
            "--base-url",
            "https://crm.example.com",
            "--username",
            "sync",
        ])
        .assert()
        .success()
        .stdout(contains("config.yaml"))
        .stdout(contains(PASSWORD_ENV));

    let saved = config::load_at(home.path()).expect("load saved config");
    assert_eq!(saved.api.base_url, "https://crm.example.com");
    assert_eq!(saved.api.username, "sync");
    assert_eq!(saved.sync.batch_size, 50);

    consync_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(contains("crm.example.com"))
        .stdout(contains("batch_size: 50"));
}

#[test]
fn config_init_refuses_to_overwrite_without_force() {
    let home = TempDir::new().expect("home");
    init_config(home.path(), "https://crm.example.com");

    consync_cmd(home.path())
        .args([
            "config",
            "init",
            "--base-url",
            "https://other.example.com",
            "--username",
            "sync",
        ])
        .assert()
        .failure()
        .stderr(contains("--force"));

    consync_cmd(home.path())
        .args([
            "config",
            "init",
            "--base-url",
            "https://other.example.com",
            "--username",
            "ops",
            "--force",
        ])
        .assert()
        .success();
    let saved = config::load_at(home.path()).expect("load");
    assert_eq!(saved.api.base_url, "https://other.example.com");
    assert_eq!(saved.api.username, "ops");
}

#[test]
fn config_init_rejects_non_http_url() {
    let home = TempDir::new().expect("home");
    consync_cmd(home.path())
        .args(["config", "init", "--base-url", "crm.example.com", "--username", "sync"])
        .assert()
        .failure()
        .stderr(contains("api.base_url"));
    assert!(!config::config_path_at(home.path()).exists());
}

#[test]
fn config_show_masks_password_from_env() {
    let home = TempDir::new().expect("home");
    init_config(home.path(), "https://crm.example.com");

    consync_cmd(home.path())
        .env(PASSWORD_ENV, "s3cret-value")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(contains("********"))
        .stdout(contains("s3cret-value").not());
}

#[test]
fn commands_without_config_point_at_config_init() {
    let home = TempDir::new().expect("home");
    consync_cmd(home.path())
        .args(["sync"])
        .assert()
        .failure()
        .stderr(contains("consync config init"));
}

#[test]
fn status_of_unknown_contract_reports_never_synced() {
    let home = TempDir::new().expect("home");
    init_config(home.path(), "https://crm.example.com");

    consync_cmd(home.path())
        .args(["status", "HT-404"])
        .assert()
        .success()
        .stdout(contains("HT-404"))
        .stdout(contains("never synced"));
}

#[test]
fn status_json_includes_record_and_audit_trail() {
    let home = TempDir::new().expect("home");
    init_config(home.path(), "https://crm.example.com");

    let cfg = config::load_at(home.path()).expect("config");
    let store = SqliteStatusStore::open(&cfg.storage.status_db_at(home.path())).expect("store");
    let order_no = OrderNo::from("HT-001");
    store
        .upsert_status(
            &order_no,
            SyncStatus::Success,
            "{}",
            Some(&OrderNo::from("R-001")),
        )
        .expect("upsert");
    store
        .append_log(&order_no, Phase::Start, "starting contract sync: Bridge")
        .expect("log");
    store
        .append_log(&order_no, Phase::Complete, "sync complete")
        .expect("log");
    drop(store);

    let output = consync_cmd(home.path())
        .args(["status", "HT-001", "--json"])
        .output()
        .expect("run status");
    assert!(
        output.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(json["order_no"], "HT-001");
    assert_eq!(json["status"]["status"], "success");
    assert_eq!(json["status"]["remote_order_no"], "R-001");
    assert_eq!(json["logs"][0]["phase"], "START");
    assert_eq!(json["logs"][1]["phase"], "COMPLETE");
}

#[test]
fn sync_with_unreachable_api_fails_on_token() {
    let home = TempDir::new().expect("home");
    init_config(home.path(), "http://127.0.0.1:9");

    let source = config::consync_root(home.path()).join("source.db");
    let conn = rusqlite::Connection::open(&source).expect("source db");
    conn.execute_batch(SOURCE_SCHEMA_SQL).expect("schema");
    drop(conn);

    consync_cmd(home.path())
        .args(["sync", "--batch-size", "5"])
        .assert()
        .failure()
        .stdout(contains("sync failed"))
        .stderr(contains("token acquisition failed"));
}

#[test]
fn daemon_status_when_not_running_prints_fallback() {
    let home = TempDir::new().expect("home");
    consync_cmd(home.path())
        .args(["daemon", "status"])
        .assert()
        .success()
        .stdout(contains("\"running\": false"))
        .stdout(contains("daemon.sock"));

    consync_cmd(home.path())
        .args(["daemon", "stop"])
        .assert()
        .success()
        .stdout(contains("daemon is not running"));
}
