//! Configuration loading and validation for route-registrar

use crate::routing_api::client::HttpTlsOptions;
use crate::types::{
    Endpoint, HealthCheck, MessageBusServer, RegistrarConfig, Route, RouteType, TlsPaths,
};
use healthcheck::HealthCheckConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Invalid route configuration: {0}")]
    RouteError(#[from] RouteError),

    #[error("routing_api must be configured when tcp routes are present")]
    MissingRoutingApi,

    #[error("message_bus_servers must be configured when http routes are present")]
    MissingMessageBus,
}

/// Problems with a single route entry
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("route name not provided")]
    MissingName,

    #[error("host not provided for route '{0}'")]
    MissingHost(String),

    #[error("registration interval not provided for route '{0}'")]
    MissingRegistrationInterval(String),

    #[error("invalid registration interval for route '{0}': must be greater than zero")]
    InvalidRegistrationInterval(String),

    #[error("health check timeout {timeout:?} must be less than registration interval {interval:?} for route '{route}'")]
    HealthCheckTimeout {
        route: String,
        timeout: Duration,
        interval: Duration,
    },

    #[error("no uris provided for route '{0}'")]
    MissingUris(String),

    #[error("neither port nor tls_port provided for route '{0}'")]
    MissingPort(String),

    #[error("port not provided for tcp route '{0}'")]
    MissingTcpPort(String),

    #[error("external_port not provided for tcp route '{0}'")]
    MissingExternalPort(String),

    #[error("router_group not provided for tcp route '{0}'")]
    MissingRouterGroup(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Default backend host for routes that do not set their own
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub message_bus_servers: Vec<MessageBusServer>,

    #[serde(default)]
    pub nats_mtls_config: NatsMtlsSettings,

    #[serde(default)]
    pub routing_api: Option<RoutingApiSettings>,

    #[serde(default)]
    pub logging: LoggingSettings,

    #[serde(default)]
    pub metrics: MetricsSettings,

    #[serde(default)]
    pub routes: Vec<RouteSettings>,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationErrors> {
        for server in &self.message_bus_servers {
            server.validate()?;
        }
        self.nats_mtls_config.validate()?;
        if let Some(routing_api) = &self.routing_api {
            routing_api.validate()?;
        }
        Ok(())
    }
}

/// Mutual TLS settings for the message bus connection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NatsMtlsSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub cert_path: PathBuf,

    #[serde(default)]
    pub key_path: PathBuf,

    #[serde(default)]
    pub ca_path: PathBuf,
}

impl Validate for NatsMtlsSettings {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.enabled {
            for (field, path) in [
                ("cert_path", &self.cert_path),
                ("key_path", &self.key_path),
                ("ca_path", &self.ca_path),
            ] {
                if path.as_os_str().is_empty() {
                    errors.add(field, ValidationError::new("required_when_mtls_enabled"));
                }
            }
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Routing API and OAuth settings for tcp routes
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RoutingApiSettings {
    #[validate(url)]
    pub api_url: String,

    #[validate(url)]
    pub oauth_url: String,

    #[validate(length(min = 1))]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    #[serde(default)]
    pub skip_ssl_validation: bool,

    /// CA trusted for both the routing API and the OAuth server
    #[serde(default)]
    pub ca_cert_path: Option<PathBuf>,

    #[serde(default)]
    pub client_cert_path: Option<PathBuf>,

    #[serde(default)]
    pub client_private_key_path: Option<PathBuf>,

    /// Ceiling for the TTL of registered tcp routes
    #[serde(default = "default_max_ttl", with = "humantime_serde")]
    #[validate(custom = "validate_max_ttl")]
    pub max_ttl: Duration,
}

impl RoutingApiSettings {
    pub fn tls_options(&self) -> HttpTlsOptions {
        HttpTlsOptions {
            skip_ssl_validation: self.skip_ssl_validation,
            ca_cert_path: self.ca_cert_path.clone(),
            client_cert_path: self.client_cert_path.clone(),
            client_private_key_path: self.client_private_key_path.clone(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
}

/// Metrics endpoint settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// No metrics endpoint is served when absent
    pub listen_addr: Option<String>,
}

/// A route entry as written in the configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteSettings {
    #[serde(default)]
    pub name: String,

    #[serde(default, rename = "type")]
    pub route_type: RouteType,

    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub tls_port: Option<u16>,

    #[serde(default)]
    pub uris: Vec<String>,

    #[serde(default)]
    pub tags: HashMap<String, String>,

    #[serde(default)]
    pub route_service_url: Option<String>,

    #[serde(default)]
    pub server_cert_domain_san: Option<String>,

    #[serde(default, with = "humantime_serde")]
    pub registration_interval: Option<Duration>,

    #[serde(default)]
    pub health_check: Option<HealthCheckConfig>,

    #[serde(default)]
    pub router_group: Option<String>,

    #[serde(default)]
    pub external_port: Option<u16>,
}

fn default_max_ttl() -> Duration {
    Duration::from_secs(120)
}

// Custom validators

fn validate_max_ttl(ttl: &Duration) -> Result<(), ValidationError> {
    if ttl.as_secs() < 1 {
        return Err(ValidationError::new("max_ttl_below_one_second"));
    }
    Ok(())
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).cloned()
}

impl RouteSettings {
    /// Convert into a typed route, checking every per-route rule.
    ///
    /// `default_host` is used when the entry does not name its own host.
    pub fn to_route(&self, default_host: &str) -> Result<Route, RouteError> {
        if self.name.trim().is_empty() {
            return Err(RouteError::MissingName);
        }
        let name = self.name.clone();

        let host = non_empty(self.host.as_ref())
            .or_else(|| {
                Some(default_host.trim())
                    .filter(|h| !h.is_empty())
                    .map(str::to_string)
            })
            .ok_or_else(|| RouteError::MissingHost(name.clone()))?;

        let registration_interval = self
            .registration_interval
            .ok_or_else(|| RouteError::MissingRegistrationInterval(name.clone()))?;
        if registration_interval.is_zero() {
            return Err(RouteError::InvalidRegistrationInterval(name));
        }

        let health_check = match &self.health_check {
            Some(check) if !check.script_path.as_os_str().is_empty() => {
                let timeout = check.timeout.unwrap_or(registration_interval / 2);
                if timeout >= registration_interval {
                    return Err(RouteError::HealthCheckTimeout {
                        route: name,
                        timeout,
                        interval: registration_interval,
                    });
                }
                Some(HealthCheck {
                    name: check.name.clone(),
                    script_path: check.script_path.clone(),
                    timeout,
                })
            }
            _ => None,
        };

        let endpoint = match self.route_type {
            RouteType::Http => {
                if self.uris.is_empty() {
                    return Err(RouteError::MissingUris(name));
                }
                if self.port.is_none() && self.tls_port.is_none() {
                    return Err(RouteError::MissingPort(name));
                }
                Endpoint::Http {
                    uris: self.uris.clone(),
                    port: self.port,
                    tls_port: self.tls_port,
                    route_service_url: non_empty(self.route_service_url.as_ref()),
                }
            }
            RouteType::Tcp => Endpoint::Tcp {
                router_group: non_empty(self.router_group.as_ref())
                    .ok_or_else(|| RouteError::MissingRouterGroup(name.clone()))?,
                external_port: self
                    .external_port
                    .ok_or_else(|| RouteError::MissingExternalPort(name.clone()))?,
                port: self
                    .port
                    .ok_or_else(|| RouteError::MissingTcpPort(name.clone()))?,
            },
        };

        Ok(Route {
            name,
            host,
            endpoint,
            tags: self.tags.clone(),
            server_cert_domain_san: non_empty(self.server_cert_domain_san.as_ref()),
            registration_interval,
            health_check,
        })
    }
}

// Configuration loading implementation

impl Config {
    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&contents)
    }

    /// Parse and structurally validate configuration from YAML text
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Convert to RegistrarConfig, applying the per-route rules
    pub fn to_registrar_config(&self) -> Result<RegistrarConfig, ConfigError> {
        let routes = self
            .routes
            .iter()
            .map(|route| route.to_route(&self.host))
            .collect::<Result<Vec<_>, _>>()?;

        if self.routing_api.is_none() && routes.iter().any(|r| r.route_type() == RouteType::Tcp) {
            return Err(ConfigError::MissingRoutingApi);
        }
        if self.message_bus_servers.is_empty()
            && routes.iter().any(|r| r.route_type() == RouteType::Http)
        {
            return Err(ConfigError::MissingMessageBus);
        }

        let message_bus_tls = self.nats_mtls_config.enabled.then(|| TlsPaths {
            cert_path: self.nats_mtls_config.cert_path.clone(),
            key_path: self.nats_mtls_config.key_path.clone(),
            ca_path: self.nats_mtls_config.ca_path.clone(),
        });

        Ok(RegistrarConfig {
            routes,
            message_bus_servers: self.message_bus_servers.clone(),
            message_bus_tls,
        })
    }
}
