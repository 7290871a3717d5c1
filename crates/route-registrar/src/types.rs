//! Core types for route registration.

use healthcheck::{HealthCheckResult, HealthStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

/// Subject on which HTTP route registrations are published
pub const REGISTER_SUBJECT: &str = "router.register";

/// Subject on which HTTP route unregistrations are published
pub const UNREGISTER_SUBJECT: &str = "router.unregister";

/// Backend a route is advertised to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteType {
    /// Published on the message bus for the HTTP router
    #[default]
    Http,
    /// Upserted into the routing API as a TCP route mapping
    Tcp,
}

impl RouteType {
    /// Name of the backend that serves this route type, used in logs and metrics
    pub fn backend(&self) -> &'static str {
        match self {
            RouteType::Http => "message_bus",
            RouteType::Tcp => "routing_api",
        }
    }
}

impl fmt::Display for RouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteType::Http => write!(f, "http"),
            RouteType::Tcp => write!(f, "tcp"),
        }
    }
}

/// Type-specific part of a route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Http {
        uris: Vec<String>,
        port: Option<u16>,
        tls_port: Option<u16>,
        route_service_url: Option<String>,
    },
    Tcp {
        router_group: String,
        external_port: u16,
        port: u16,
    },
}

/// Health check attached to a route, with its timeout resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheck {
    pub name: String,
    pub script_path: PathBuf,
    pub timeout: Duration,
}

/// A configured route. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub name: String,

    /// Backend address the route points at
    pub host: String,

    pub endpoint: Endpoint,

    pub tags: HashMap<String, String>,

    /// SNI hint for TLS backends
    pub server_cert_domain_san: Option<String>,

    /// Always greater than zero
    pub registration_interval: Duration,

    /// `None` means the route is always considered healthy
    pub health_check: Option<HealthCheck>,
}

impl Route {
    pub fn route_type(&self) -> RouteType {
        match self.endpoint {
            Endpoint::Http { .. } => RouteType::Http,
            Endpoint::Tcp { .. } => RouteType::Tcp,
        }
    }
}

/// Message bus server with credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct MessageBusServer {
    /// `host:port`
    #[validate(length(min = 1))]
    pub host: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,
}

impl MessageBusServer {
    /// NATS URL for this server. Credentials are passed separately so they
    /// never have to survive URL parsing.
    pub fn url(&self) -> String {
        format!("nats://{}", self.host)
    }

    /// User and password, when a user is configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        (!self.user.is_empty()).then_some((self.user.as_str(), self.password.as_str()))
    }
}

/// Certificate, key and CA files for mutual TLS to the message bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub ca_path: PathBuf,
}

/// Registrar configuration
#[derive(Debug, Clone)]
pub struct RegistrarConfig {
    /// Routes in configuration order
    pub routes: Vec<Route>,

    /// No message bus connection is made when empty
    pub message_bus_servers: Vec<MessageBusServer>,

    /// Mutual TLS material for the message bus, when enabled
    pub message_bus_tls: Option<TlsPaths>,
}

/// Classified result of one scheduler tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthOutcome {
    NoHealthCheck,
    Healthy,
    Unhealthy,
    CheckError,
}

/// What the registrar does with a route in response to an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAction {
    Register,
    Unregister,
}

impl HealthOutcome {
    pub fn action(&self) -> RouteAction {
        match self {
            HealthOutcome::NoHealthCheck | HealthOutcome::Healthy => RouteAction::Register,
            HealthOutcome::Unhealthy | HealthOutcome::CheckError => RouteAction::Unregister,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthOutcome::NoHealthCheck => "no_health_check",
            HealthOutcome::Healthy => "healthy",
            HealthOutcome::Unhealthy => "unhealthy",
            HealthOutcome::CheckError => "check_error",
        }
    }
}

impl From<&HealthCheckResult> for HealthOutcome {
    fn from(result: &HealthCheckResult) -> Self {
        match result.status {
            HealthStatus::Healthy => HealthOutcome::Healthy,
            HealthStatus::Unhealthy | HealthStatus::Timeout => HealthOutcome::Unhealthy,
            HealthStatus::Error => HealthOutcome::CheckError,
        }
    }
}

/// Event sent from a route scheduler to the registrar
#[derive(Debug, Clone)]
pub struct HealthEvent {
    pub route: Arc<Route>,
    pub outcome: HealthOutcome,
}

/// Random identifier for this process, attached to every registration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId(String);

impl InstanceId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for InstanceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
