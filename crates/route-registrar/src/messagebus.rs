//! Message bus publisher for HTTP route announcements.

use crate::routing_api::client::{read_ca_bundle, read_identity};
use crate::types::{Endpoint, InstanceId, MessageBusServer, Route, TlsPaths};
use async_nats::{Client, ConnectOptions, ServerAddr};
use async_trait::async_trait;
use bytes::Bytes;
use common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timeout for establishing the initial connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Ping interval for keep-alive
const PING_INTERVAL: Duration = Duration::from_secs(20);

/// Registration envelope published for an HTTP route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub uris: Vec<String>,

    pub host: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_port: Option<u16>,

    #[serde(default)]
    pub tags: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_service_url: Option<String>,

    pub private_instance_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_cert_domain_san: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl Message {
    /// Build the envelope announcing `route` at `host`
    pub fn new(host: &str, route: &Route, instance_id: &InstanceId) -> Self {
        let (uris, port, tls_port, route_service_url) = match &route.endpoint {
            Endpoint::Http {
                uris,
                port,
                tls_port,
                route_service_url,
            } => (uris.clone(), *port, *tls_port, route_service_url.clone()),
            Endpoint::Tcp { port, .. } => (Vec::new(), Some(*port), None, None),
        };

        Self {
            uris,
            host: host.to_string(),
            port,
            tls_port,
            tags: route.tags.clone(),
            route_service_url,
            private_instance_id: instance_id.to_string(),
            server_cert_domain_san: route.server_cert_domain_san.clone(),
            name: route.name.clone(),
        }
    }
}

/// Client certificate, key and CA used for mutual TLS to the message bus.
///
/// Construction parses the CA bundle and the certificate/key pair, so bad
/// material fails at startup instead of on the first handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBusTls {
    cert_path: PathBuf,
    key_path: PathBuf,
    ca_path: PathBuf,
}

impl MessageBusTls {
    pub fn from_files(paths: &TlsPaths) -> Result<Self> {
        let wrap = |e: Error| Error::tls(format!("failed building NATS mTLS config: {}", e));

        let roots = read_ca_bundle(&paths.ca_path).map_err(wrap)?;
        if roots.is_empty() {
            return Err(wrap(Error::tls(format!(
                "no certificates in `{}`",
                paths.ca_path.display()
            ))));
        }
        read_identity(&paths.cert_path, &paths.key_path).map_err(wrap)?;

        Ok(Self {
            cert_path: paths.cert_path.clone(),
            key_path: paths.key_path.clone(),
            ca_path: paths.ca_path.clone(),
        })
    }

    fn apply(self, options: ConnectOptions) -> ConnectOptions {
        options
            .require_tls(true)
            .add_root_certificates(self.ca_path)
            .add_client_certificate(self.cert_path, self.key_path)
    }
}

/// Publishes route announcements on a message bus
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Connect to the first reachable server among `servers`
    async fn connect(
        &mut self,
        servers: &[MessageBusServer],
        tls: Option<MessageBusTls>,
    ) -> Result<()>;

    /// Publish the envelope for `route` on `subject`
    async fn send_message(
        &self,
        subject: &str,
        host: &str,
        route: &Route,
        instance_id: &InstanceId,
    ) -> Result<()>;

    /// Release the connection. Safe to call without a prior connect.
    async fn close(&mut self);
}

/// NATS-backed message bus
#[derive(Default)]
pub struct NatsMessageBus {
    client: Option<Client>,
}

impl NatsMessageBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageBus for NatsMessageBus {
    async fn connect(
        &mut self,
        servers: &[MessageBusServer],
        tls: Option<MessageBusTls>,
    ) -> Result<()> {
        if servers.is_empty() {
            return Err(Error::message_bus("no message bus servers configured"));
        }

        let mut last_error = None;
        for server in servers {
            let addr = ServerAddr::from_str(&server.url()).map_err(|e| {
                Error::message_bus(format!("invalid server address {}: {}", server.host, e))
            })?;

            let mut options = ConnectOptions::new()
                .name("route-registrar")
                .ping_interval(PING_INTERVAL)
                .connection_timeout(CONNECT_TIMEOUT);
            if let Some((user, password)) = server.credentials() {
                options = options.user_and_password(user.to_string(), password.to_string());
            }
            if let Some(tls) = tls.clone() {
                options = tls.apply(options);
            }

            debug!(server = %server.host, "Connecting to message bus");
            match options.connect(addr).await {
                Ok(client) => {
                    info!(server = %server.host, "Message bus connection established");
                    self.client = Some(client);
                    return Ok(());
                }
                Err(e) => {
                    warn!(server = %server.host, error = %e, "Message bus server unavailable");
                    last_error = Some(e);
                }
            }
        }

        Err(Error::message_bus(format!(
            "Failed to connect: {}",
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    async fn send_message(
        &self,
        subject: &str,
        host: &str,
        route: &Route,
        instance_id: &InstanceId,
    ) -> Result<()> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| Error::message_bus("not connected"))?;

        let payload = serde_json::to_vec(&Message::new(host, route, instance_id))?;
        debug!(subject, route = %route.name, bytes = payload.len(), "Publishing route message");

        client
            .publish(subject.to_string(), Bytes::from(payload))
            .await
            .map_err(|e| Error::message_bus(format!("Publish to {} failed: {}", subject, e)))
    }

    async fn close(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.flush().await {
                warn!(error = %e, "Failed to flush message bus connection");
            }
            info!("Message bus connection closed");
        }
    }
}
