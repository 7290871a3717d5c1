//! Health check implementations.

use crate::types::HealthCheckResult;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Health checker trait
#[async_trait]
pub trait HealthChecker: Send + Sync {
    /// Run the check at `script_path`, bounded by `timeout_duration`
    async fn check(&self, script_path: &Path, timeout_duration: Duration) -> HealthCheckResult;
}

/// Runs an external executable and interprets its exit status.
///
/// Exit status 0 is healthy, any other status is unhealthy. A script still
/// running when the timeout elapses is killed and reported as a timeout.
/// Failing to start the script is an error.
#[derive(Debug, Default, Clone)]
pub struct ScriptChecker;

impl ScriptChecker {
    /// Create a new script health checker
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HealthChecker for ScriptChecker {
    async fn check(&self, script_path: &Path, timeout_duration: Duration) -> HealthCheckResult {
        let start = Instant::now();

        let child = Command::new(script_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!(script = %script_path.display(), error = %e, "Failed to start health check script");
                return HealthCheckResult::error(
                    start.elapsed(),
                    format!("Failed to start script: {}", e),
                );
            }
        };

        // Dropping the wait future on timeout drops the child, which kills it.
        match timeout(timeout_duration, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let duration = start.elapsed();
                if output.status.success() {
                    debug!(script = %script_path.display(), duration_ms = duration.as_millis(),
                           "Script check successful");
                    HealthCheckResult::healthy(duration)
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    warn!(script = %script_path.display(), status = %output.status,
                          "Script exited with error");
                    let mut result = HealthCheckResult::unhealthy(
                        duration,
                        format!("Script exited with {}: {}", output.status, stderr.trim()),
                    );
                    result.exit_code = output.status.code();
                    result
                }
            }
            Ok(Err(e)) => {
                let duration = start.elapsed();
                warn!(script = %script_path.display(), error = %e, "Failed waiting for script");
                HealthCheckResult::error(duration, format!("Failed waiting for script: {}", e))
            }
            Err(_) => {
                let duration = start.elapsed();
                warn!(script = %script_path.display(), timeout_ms = timeout_duration.as_millis(),
                      "Script exceeded timeout");
                HealthCheckResult::timeout(duration)
            }
        }
    }
}
