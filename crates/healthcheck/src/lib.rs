//! Script-based health checking for route-registrar.
//!
//! A route may name an executable whose exit status decides whether the
//! route is advertised. This crate runs that executable under a timeout and
//! reports one of four outcomes:
//! - healthy (exit status 0)
//! - unhealthy (non-zero exit status)
//! - timeout (killed after the configured timeout)
//! - error (the executable could not be started)
//!
//! # Example
//!
//! ```no_run
//! use healthcheck::{HealthChecker, ScriptChecker};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let checker = ScriptChecker::new();
//! let result = checker
//!     .check(Path::new("/var/vcap/jobs/app/bin/healthy"), Duration::from_secs(3))
//!     .await;
//!
//! if result.is_healthy() {
//!     // advertise the route
//! }
//! # }
//! ```

pub mod checkers;
pub mod types;

pub use checkers::{HealthChecker, ScriptChecker};
pub use types::{HealthCheckConfig, HealthCheckResult, HealthStatus};
