use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ──

/// Binary isolated from the caller's home, config files and tokens
fn azqr(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_azqr"));
    cmd.current_dir(home)
        .env("HOME", home)
        .env_remove("AZURE_ACCESS_TOKEN")
        .env_remove("AZURE_TENANT_ID")
        .env_remove("AZQR__PLUGINS__DIRECTORIES");
    cmd
}

// ── Tests ──

#[test]
fn test_cli_help() {
    let home = TempDir::new().unwrap();
    azqr(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Azure Quick Review"));
}

#[test]
fn test_cli_version() {
    let home = TempDir::new().unwrap();
    azqr(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("azqr 0.1.0"));
}

#[test]
fn test_scan_help_lists_stage_flags() {
    let home = TempDir::new().unwrap();
    azqr(home.path())
        .args(["scan", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--stage-param"))
        .stdout(predicate::str::contains("--management-group-id"));
}

#[test]
fn test_plugins_list_includes_carbon_emissions() {
    let home = TempDir::new().unwrap();
    azqr(home.path())
        .args(["plugins", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("carbon-emissions"))
        .stdout(predicate::str::contains("internal"));
}

#[test]
fn test_plugins_info_unknown_plugin_fails() {
    let home = TempDir::new().unwrap();
    azqr(home.path())
        .args(["plugins", "info", "nope"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("plugin nope not found"));
}

#[test]
fn test_scan_rejects_bad_resource_group_in_filter_file() {
    let home = TempDir::new().unwrap();
    let filters = home.path().join("filters.yaml");
    std::fs::write(
        &filters,
        "azqr:\n  exclude:\n    resourceGroups:\n      - not-a-resource-group-id\n",
    )
    .unwrap();

    azqr(home.path())
        .arg("scan")
        .arg("--filters")
        .arg(&filters)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("has incorrect format"));
}

#[test]
fn test_scan_rejects_unknown_stage() {
    let home = TempDir::new().unwrap();
    azqr(home.path())
        .args(["scan", "--stages", "bogus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bogus"));
}

#[test]
fn test_scan_rejects_management_group_with_subscription() {
    let home = TempDir::new().unwrap();
    azqr(home.path())
        .args(["scan", "-m", "mg", "-s", "00000000-0000-0000-0000-000000000001"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Management Group name cannot be used with a Subscription Id or Resource Group name",
        ));
}

#[test]
fn test_scan_rejects_resource_group_without_subscription() {
    let home = TempDir::new().unwrap();
    azqr(home.path())
        .args(["scan", "-g", "rg-app"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Resource Group name can only be used with a Subscription Id",
        ));
}
