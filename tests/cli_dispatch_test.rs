// tests/cli_dispatch_test.rs

use assert_cmd::Command;
use pos_drivers::hasher::{self, HashAlgorithm};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

// 辅助函数，避免重复
fn main_command() -> Command {
    Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap()
}

/// 配置文件和数据目录都放在临时目录里，不碰用户主目录
fn isolated_command(root: &Path) -> Command {
    let mut cmd = main_command();
    cmd.env("HOME", root)
        .arg("--config")
        .arg(root.join("config.json"))
        .arg("--data-dir")
        .arg(root.join("data"));
    cmd
}

// --- 测试基本 CLI 行为 ---

#[test]
fn test_help_flag() {
    let mut cmd = main_command();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("显示此帮助信息并退出"))
        .stdout(predicate::str::contains("--install <DRIVER_ID>"));
}

#[test]
fn test_missing_mode_shows_help() {
    let mut cmd = main_command();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_hash_requires_url_mode() {
    let mut cmd = main_command();
    cmd.arg("--list").arg("--hash").arg("abcdef").arg("--json");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--hash <HASH>"))
        .stdout(predicate::str::is_empty());
}

// --- 测试核心分发逻辑 ---

#[test]
fn test_list_mode_outputs_catalog_json() {
    let dir = tempdir().unwrap();
    let mut cmd = isolated_command(dir.path());
    cmd.arg("--list").arg("--json");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"epson-tm-t20iii\""))
        .stdout(predicate::str::contains("\"star-tsp143iv\""));

    // 首次运行会写出默认配置
    assert!(dir.path().join("config.json").exists());
}

#[test]
fn test_list_mode_filters_by_platform() {
    let dir = tempdir().unwrap();
    let mut cmd = isolated_command(dir.path());
    cmd.arg("--list").arg("--json").arg("--platform").arg("linux");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"epson-tm-t20iii\""))
        .stdout(predicate::str::contains("xprinter-xp-365b").not());
}

#[test]
fn test_detect_mode_suggests_matching_model() {
    let dir = tempdir().unwrap();
    let mut cmd = isolated_command(dir.path());
    cmd.arg("--detect").arg("Star TSP143IV (USB)").arg("--json");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"brand\": \"star\""))
        .stdout(predicate::str::contains("\"star-tsp143iv\""));
}

#[test]
fn test_unknown_driver_fails() {
    let dir = tempdir().unwrap();
    let mut cmd = isolated_command(dir.path());
    cmd.arg("--download")
        .arg("no-such-printer")
        .arg("--platform")
        .arg("linux");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("未知的驱动 ID: 'no-such-printer'"));
}

#[test]
fn test_url_mode_downloads_and_verifies() {
    let mut server = mockito::Server::new();
    let body = b"POS printer driver";
    let mock = server
        .mock("GET", "/files/DriverSetup.exe")
        .with_status(200)
        .with_body(body)
        .create();

    let dir = tempdir().unwrap();
    let out_dir = dir.path().join("out");
    let digest = hasher::hash_bytes(body, HashAlgorithm::Sha256);

    let mut cmd = isolated_command(dir.path());
    cmd.arg("--url")
        .arg(format!("{}/files/DriverSetup.exe", server.url()))
        .arg("--hash")
        .arg(digest.to_uppercase())
        .arg("-o")
        .arg(&out_dir)
        .arg("--json");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"verified\": true"))
        .stdout(predicate::str::contains(digest.as_str()));

    mock.assert();
    assert_eq!(fs::read(out_dir.join("DriverSetup.exe")).unwrap(), body);
}

#[test]
fn test_url_mode_reports_http_failure() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/files/gone.exe")
        .with_status(404)
        .create();

    let dir = tempdir().unwrap();
    let mut cmd = isolated_command(dir.path());
    cmd.arg("--url")
        .arg(format!("{}/files/gone.exe", server.url()))
        .arg("--retries")
        .arg("0");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("服务器返回错误"))
        .stderr(predicate::str::contains("404"));

    mock.assert();
}

#[test]
fn test_cache_info_on_empty_cache() {
    let dir = tempdir().unwrap();
    let mut cmd = isolated_command(dir.path());
    cmd.arg("--cache-info").arg("--json");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"files\": []"));
}

#[test]
fn test_clean_cache_with_zero_retention_clears_everything() {
    let dir = tempdir().unwrap();
    let cache_dir = dir.path().join("data/drivers/printers/cache");
    fs::create_dir_all(&cache_dir).unwrap();
    fs::write(cache_dir.join("APD_610.exe"), b"old").unwrap();

    let mut cmd = isolated_command(dir.path());
    cmd.arg("--clean-cache")
        .arg("--retention-days")
        .arg("0")
        .arg("-y");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("删除 1 个文件"));

    assert!(!cache_dir.join("APD_610.exe").exists());
}

#[test]
fn test_clean_cache_keeps_fresh_files() {
    let dir = tempdir().unwrap();
    let cache_dir = dir.path().join("data/drivers/printers/cache");
    fs::create_dir_all(&cache_dir).unwrap();
    fs::write(cache_dir.join("fresh.pkg"), b"new").unwrap();

    let mut cmd = isolated_command(dir.path());
    cmd.arg("--clean-cache").arg("--json");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"removed\": 0"));

    assert!(cache_dir.join("fresh.pkg").exists());
}
