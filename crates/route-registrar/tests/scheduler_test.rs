//! Scheduler driven by real health check scripts

use healthcheck::ScriptChecker;
use route_registrar::types::{Endpoint, HealthCheck};
use route_registrar::{HealthOutcome, Route, RouteScheduler};
use std::collections::HashMap;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn write_script(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "#!/bin/sh\n{}", body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn route(script: &Path) -> Arc<Route> {
    Arc::new(Route {
        name: "scripted".to_string(),
        host: "10.0.0.5".to_string(),
        endpoint: Endpoint::Http {
            uris: vec!["app.example.com".to_string()],
            port: Some(8080),
            tls_port: None,
            route_service_url: None,
        },
        tags: HashMap::new(),
        server_cert_domain_san: None,
        registration_interval: Duration::from_millis(200),
        health_check: Some(HealthCheck {
            name: "check".to_string(),
            script_path: script.to_path_buf(),
            timeout: Duration::from_millis(100),
        }),
    })
}

async fn first_outcome(script: &Path) -> HealthOutcome {
    let (tx, mut rx) = mpsc::channel(1);
    let stop = CancellationToken::new();
    let scheduler = RouteScheduler::new(route(script), Arc::new(ScriptChecker::new()), tx, stop.clone());
    let handle = tokio::spawn(scheduler.run());

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();

    stop.cancel();
    handle.await.unwrap();
    event.outcome
}

#[tokio::test]
async fn test_passing_script_is_healthy() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "pass.sh", "exit 0");
    assert_eq!(first_outcome(&script).await, HealthOutcome::Healthy);
}

#[tokio::test]
async fn test_failing_script_is_unhealthy() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "fail.sh", "echo down >&2\nexit 1");
    assert_eq!(first_outcome(&script).await, HealthOutcome::Unhealthy);
}

#[tokio::test]
async fn test_slow_script_is_unhealthy() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "slow.sh", "sleep 5");
    assert_eq!(first_outcome(&script).await, HealthOutcome::Unhealthy);
}

#[tokio::test]
async fn test_missing_script_is_check_error() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("absent.sh");
    assert_eq!(first_outcome(&script).await, HealthOutcome::CheckError);
}
