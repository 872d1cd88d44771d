//! End-to-end CLI tests for the http-exchange binary.

#![allow(deprecated)]

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

/// Command isolated from any user config file.
fn command(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("http-exchange").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home).env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_binary_help_displays_usage() {
    let tempdir = TempDir::new().unwrap();
    command(tempdir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Run one HTTP exchange"));
}

#[test]
fn test_binary_version_displays_version() {
    let tempdir = TempDir::new().unwrap();
    command(tempdir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("http-exchange"));
}

#[test]
fn test_binary_missing_url_returns_error() {
    let tempdir = TempDir::new().unwrap();
    command(tempdir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("<URL>"));
}

#[test]
fn test_binary_invalid_url_returns_error() {
    let tempdir = TempDir::new().unwrap();
    command(tempdir.path())
        .arg("not a url")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid URL"));
}

#[test]
fn test_binary_invalid_config_returns_error() {
    let tempdir = TempDir::new().unwrap();
    let config = tempdir.path().join("bad.toml");
    std::fs::write(&config, "concurrency = 4\n").unwrap();
    command(tempdir.path())
        .arg("--config")
        .arg(&config)
        .arg("http://127.0.0.1:9/")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config file"));
}

#[tokio::test]
async fn test_binary_basic_auth_and_cookie_json_report() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/secure"))
        .and(header("authorization", "Basic YWxpY2U6c2VjcmV0"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "sid=xyz; Path=/")
                .set_body_string("hello"),
        )
        .with_priority(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secure"))
        .respond_with(
            ResponseTemplate::new(401).insert_header("WWW-Authenticate", "Basic realm=\"cli\""),
        )
        .mount(&mock_server)
        .await;

    let tempdir = TempDir::new().unwrap();
    let assert = command(tempdir.path())
        .arg("-q")
        .arg("--json")
        .arg("-u")
        .arg("alice:secret")
        .arg(format!("{}/secure", mock_server.uri()))
        .assert()
        .success();

    let report: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(report["status"], 200);
    assert_eq!(report["body"], "hello");
    assert_eq!(report["cookies"][0]["name"], "sid");
    assert_eq!(report["cookies"][0]["value"], "xyz");
}

#[tokio::test]
async fn test_binary_sends_cookies_from_file() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header("cookie", "session=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("member"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let tempdir = TempDir::new().unwrap();
    let cookies = tempdir.path().join("cookies.txt");
    std::fs::write(
        &cookies,
        "# Netscape HTTP Cookie File\n127.0.0.1\tFALSE\t/\tFALSE\t0\tsession\tabc123\n",
    )
    .unwrap();

    command(tempdir.path())
        .arg("-q")
        .arg("--cookies")
        .arg(&cookies)
        .arg("--cookie-policy")
        .arg("compatibility")
        .arg(format!("{}/page", mock_server.uri()))
        .assert()
        .success()
        .stdout(predicate::str::contains("status: 200"))
        .stdout(predicate::str::contains("member"));
}

#[tokio::test]
async fn test_binary_no_redirects_prints_redirect_status() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let tempdir = TempDir::new().unwrap();
    command(tempdir.path())
        .arg("-q")
        .arg("--no-redirects")
        .arg(format!("{}/old", mock_server.uri()))
        .assert()
        .success()
        .stdout(predicate::str::contains("status: 301"));
}

#[tokio::test]
async fn test_binary_redirect_limit_from_config_file() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
        .mount(&mock_server)
        .await;

    let tempdir = TempDir::new().unwrap();
    let config = tempdir.path().join("http-exchange.toml");
    std::fs::write(&config, "max_redirects = 0\n").unwrap();

    command(tempdir.path())
        .arg("-q")
        .arg("--config")
        .arg(&config)
        .arg(format!("{}/old", mock_server.uri()))
        .assert()
        .failure()
        .stderr(predicate::str::contains("maximum redirects (0) exceeded"));
}
