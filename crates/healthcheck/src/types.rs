//! Health check types and structures.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Health check status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Script exited successfully
    Healthy,
    /// Script exited with a non-zero status
    Unhealthy,
    /// Script ran past its timeout and was killed
    Timeout,
    /// Script could not be run at all
    Error,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "HEALTHY"),
            HealthStatus::Unhealthy => write!(f, "UNHEALTHY"),
            HealthStatus::Timeout => write!(f, "TIMEOUT"),
            HealthStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Health check result
#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    /// Status of the health check
    pub status: HealthStatus,

    /// Duration of the health check
    pub duration: Duration,

    /// Optional error message
    pub message: Option<String>,

    /// Exit code of the script, when it exited normally
    pub exit_code: Option<i32>,
}

impl HealthCheckResult {
    /// Create a healthy result
    pub fn healthy(duration: Duration) -> Self {
        Self {
            status: HealthStatus::Healthy,
            duration,
            message: None,
            exit_code: Some(0),
        }
    }

    /// Create an unhealthy result
    pub fn unhealthy(duration: Duration, message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            duration,
            message: Some(message.into()),
            exit_code: None,
        }
    }

    /// Create a timeout result
    pub fn timeout(duration: Duration) -> Self {
        Self {
            status: HealthStatus::Timeout,
            duration,
            message: Some("Health check timed out".to_string()),
            exit_code: None,
        }
    }

    /// Create an error result
    pub fn error(duration: Duration, message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Error,
            duration,
            message: Some(message.into()),
            exit_code: None,
        }
    }

    /// Check if the result is healthy
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    /// Whether the script could not be executed, as opposed to reporting
    /// itself unhealthy.
    pub fn is_error(&self) -> bool {
        self.status == HealthStatus::Error
    }
}

/// Health check configuration for a single route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    /// Human-readable name of the check
    #[serde(default)]
    pub name: String,

    /// Path of the executable to run
    pub script_path: PathBuf,

    /// Maximum time the script may run before it is killed
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}
