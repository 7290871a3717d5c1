//! Integration tests for ScriptChecker against real scripts

use healthcheck::{HealthChecker, HealthStatus, ScriptChecker};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Helper to write an executable shell script into `dir`
fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[tokio::test]
async fn test_script_exit_zero_is_healthy() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "healthy.sh", "exit 0");

    let result = ScriptChecker::new()
        .check(&script, Duration::from_secs(5))
        .await;

    assert_eq!(result.status, HealthStatus::Healthy);
}

#[tokio::test]
async fn test_script_non_zero_exit_is_unhealthy_with_stderr() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "unhealthy.sh", "echo backend down >&2\nexit 3");

    let result = ScriptChecker::new()
        .check(&script, Duration::from_secs(5))
        .await;

    assert_eq!(result.status, HealthStatus::Unhealthy);
    assert_eq!(result.exit_code, Some(3));
    assert!(result.message.unwrap().contains("backend down"));
}

#[tokio::test]
async fn test_script_exceeding_timeout_is_killed() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "slow.sh", "sleep 10");

    let result = ScriptChecker::new()
        .check(&script, Duration::from_millis(200))
        .await;

    assert_eq!(result.status, HealthStatus::Timeout);
    assert!(!result.is_healthy());
    assert!(result.duration < Duration::from_secs(5), "check must not wait for the script");
}

#[tokio::test]
async fn test_non_executable_script_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("not-executable.sh");
    std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

    let result = ScriptChecker::new()
        .check(&path, Duration::from_secs(1))
        .await;

    assert_eq!(result.status, HealthStatus::Error);
}
