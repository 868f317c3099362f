// user-sync/tests/cli_integration.rs

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::net::TcpListener;
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_PATH: &str = "/api/users/update";

/// A command isolated from the caller's environment and config files.
fn user_sync(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("user-sync").unwrap();
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path())
        .env_remove("ITERABLE_API_KEY")
        .env_remove("ITERABLE_API_URL")
        .env_remove("PATH_TO_CSV")
        .env_remove("NUM_THREADS")
        .env_remove("REQUEST_TIMEOUT")
        .env_remove("FAIL_FAST")
        .env_remove("FAILURES_CSV")
        .env_remove("USER_SYNC_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

fn write_csv(dir: &TempDir, name: &str, content: &str) -> String {
    let file = dir.path().join(name);
    fs::write(&file, content).expect("Failed to write csv");
    file.to_string_lossy().into_owned()
}

fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}{}", port, API_PATH)
}

#[test]
fn test_help_shows_flags() {
    let dir = TempDir::new().unwrap();
    user_sync(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--file"))
        .stdout(predicate::str::contains("--concurrency"))
        .stdout(predicate::str::contains("--collect-all"))
        .stdout(predicate::str::contains("--failures-out"));
}

#[test]
fn test_missing_api_key_fails() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(&dir, "users.csv", "email\na@x.com\n");

    user_sync(&dir)
        .args(["--file", csv.as_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ITERABLE_API_KEY"));
}

#[test]
fn test_invalid_concurrency_rejected() {
    let dir = TempDir::new().unwrap();
    user_sync(&dir)
        .args(["--concurrency", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Concurrency must be between 1 and 100"));
}

#[test]
fn test_missing_input_file_fails_before_network() {
    let dir = TempDir::new().unwrap();
    user_sync(&dir)
        .args(["--file", "nope.csv", "--api-key", "k", "--api-url", refused_url().as_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("File error"))
        .stdout(predicate::str::contains("successful requests").not());
}

#[test]
fn test_empty_file_reports_zero_counts() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(&dir, "users.csv", "email\n");

    user_sync(&dir)
        .env("ITERABLE_API_KEY", "k")
        .env("ITERABLE_API_URL", refused_url())
        .env("PATH_TO_CSV", &csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 successful requests"))
        .stdout(predicate::str::contains("0 failed requests"))
        .stdout(predicate::str::contains("seconds ---"));
}

#[test]
fn test_dry_run_counts_records() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(&dir, "users.csv", "email\na@x.com\nb@x.com\nc@x.com\n");

    user_sync(&dir)
        .args(["--file", csv.as_str(), "--api-key", "k", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 records"));
}

#[test]
fn test_connection_error_terminates_without_tally() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(&dir, "users.csv", "email\na@x.com\n");

    user_sync(&dir)
        .args(["--file", csv.as_str(), "--api-key", "k", "--api-url", refused_url().as_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: Transport error"))
        .stdout(predicate::str::contains("successful requests").not());
}

#[test]
fn test_collect_all_records_connection_errors() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(&dir, "users.csv", "email,plan\na@x.com,pro\n");
    let failed = dir.path().join("failed.csv");

    user_sync(&dir)
        .args(["--file", csv.as_str(), "--api-key", "k", "--api-url", refused_url().as_str()])
        .arg("--collect-all")
        .arg("--failures-out")
        .arg(&failed)
        .assert()
        .success()
        .stdout(predicate::str::contains("ERR "))
        .stdout(predicate::str::contains("0 successful requests"))
        .stdout(predicate::str::contains("1 failed requests"));

    let written = fs::read_to_string(&failed).unwrap();
    assert_eq!(written, "email,plan\na@x.com,pro\n");
}

#[test]
fn test_explicit_config_file_supplies_settings() {
    let dir = TempDir::new().unwrap();
    let csv = write_csv(&dir, "users.csv", "email\n");
    let config = dir.path().join("custom.toml");
    fs::write(
        &config,
        format!(
            "[api]\nurl = \"{}\"\nkey = \"from-file\"\n\n[input]\npath = \"{}\"\n",
            refused_url(),
            csv
        ),
    )
    .unwrap();

    user_sync(&dir)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 successful requests"));
}

async fn mount_status(server: &MockServer, email: &str, status: u16) {
    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(body_json(serde_json::json!({ "email": email })))
        .respond_with(ResponseTemplate::new(status))
        .expect(1)
        .mount(server)
        .await;
}

fn run_blocking(mut cmd: Command) -> std::process::Output {
    cmd.output().expect("Failed to run user-sync")
}

#[tokio::test(flavor = "multi_thread")]
async fn test_mixed_statuses_end_to_end() {
    let server = MockServer::start().await;
    mount_status(&server, "a@x.com", 200).await;
    mount_status(&server, "b@x.com", 500).await;
    mount_status(&server, "c@x.com", 200).await;

    let dir = TempDir::new().unwrap();
    let csv = write_csv(&dir, "users.csv", "email\na@x.com\nb@x.com\nc@x.com\n");
    let url = format!("{}{}", server.uri(), API_PATH);

    let mut cmd = user_sync(&dir);
    cmd.env("ITERABLE_API_KEY", "k")
        .env("NUM_THREADS", "2")
        .args(["--file", csv.as_str(), "--api-url", url.as_str()]);

    let output = tokio::task::spawn_blocking(move || run_blocking(cmd))
        .await
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let mut statuses: Vec<&str> = stdout.lines().take(3).collect();
    statuses.sort_unstable();
    assert_eq!(statuses, vec!["200", "200", "500"]);
    assert!(stdout.contains("2 successful requests"));
    assert!(stdout.contains("1 failed requests"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pretty_output_shows_emails() {
    let server = MockServer::start().await;
    mount_status(&server, "a@x.com", 200).await;

    let dir = TempDir::new().unwrap();
    let csv = write_csv(&dir, "users.csv", "email\na@x.com\n");
    let url = format!("{}{}", server.uri(), API_PATH);

    let mut cmd = user_sync(&dir);
    cmd.args(["--file", csv.as_str(), "--api-key", "k", "--api-url", url.as_str(), "--pretty"]);

    let output = tokio::task::spawn_blocking(move || run_blocking(cmd))
        .await
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("a@x.com"));
    assert!(stdout.contains("Summary:"));
}
