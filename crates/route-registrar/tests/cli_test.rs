//! Binary exit status and signal handling

use serde_json::json;
use std::io::Write;
use std::process::Stdio;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::process::Command;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BIN: &str = env!("CARGO_BIN_EXE_route-registrar");

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

async fn mount_routing_api(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token-1",
            "token_type": "bearer",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/routing/v1/router_groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "guid": "guid-1",
            "name": "default-tcp",
            "type": "tcp",
            "reservable_ports": "1024-65535"
        }])))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/routing/v1/tcp_routes/create"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/routing/v1/tcp_routes/delete"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

async fn requests_to(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}

fn tcp_config(api_url: &str) -> String {
    format!(
        r#"
host: 127.0.0.1
routing_api:
  api_url: {api_url}
  oauth_url: {api_url}
  client_id: route_registrar
  client_secret: secret
routes:
  - name: tcp-route
    type: tcp
    port: 5000
    external_port: 60000
    router_group: default-tcp
    registration_interval: 1s
"#
    )
}

#[tokio::test]
async fn test_missing_registration_interval_exits_non_zero() {
    let config = write_config(
        r#"
host: 127.0.0.1
message_bus_servers:
  - host: 127.0.0.1:4222
routes:
  - name: no-interval
    port: 8080
    uris: [app.example.com]
"#,
    );

    let output = Command::new(BIN)
        .arg("--config-path")
        .arg(config.path())
        .output()
        .await
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("registration interval not provided"),
        "stderr: {}",
        stderr
    );
}

#[tokio::test]
async fn test_missing_config_file_exits_non_zero() {
    let output = Command::new(BIN)
        .arg("--configPath")
        .arg("/nonexistent/registrar.yml")
        .output()
        .await
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("/nonexistent/registrar.yml"));
}

#[tokio::test]
async fn test_sigterm_unregisters_and_exits_cleanly() {
    let server = MockServer::start().await;
    mount_routing_api(&server).await;

    let config = write_config(&tcp_config(&server.uri()));
    let pidfile = tempfile::tempdir().unwrap();
    let pid_path = pidfile.path().join("route-registrar.pid");

    let mut child = Command::new(BIN)
        .arg("--config-path")
        .arg(config.path())
        .arg("--pidfile")
        .arg(&pid_path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .unwrap();

    let mut registered = false;
    for _ in 0..100 {
        if requests_to(&server, "/routing/v1/tcp_routes/create").await > 0 {
            registered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(registered, "route was never registered");

    let pid = child.id().unwrap();
    assert_eq!(std::fs::read_to_string(&pid_path).unwrap(), pid.to_string());

    let kill = Command::new("kill")
        .arg("-TERM")
        .arg(pid.to_string())
        .status()
        .await
        .unwrap();
    assert!(kill.success());

    let status = tokio::time::timeout(Duration::from_secs(10), child.wait())
        .await
        .unwrap()
        .unwrap();
    assert!(status.success());
    assert_eq!(requests_to(&server, "/routing/v1/tcp_routes/delete").await, 1);
}
