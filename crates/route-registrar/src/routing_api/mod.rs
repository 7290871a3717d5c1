//! Routing API backend for tcp routes.
//!
//! Every register or unregister call fetches a fresh OAuth token, resolves
//! the route's router group to its GUID and then upserts or deletes a single
//! TCP route mapping. Router group GUIDs are memoized for the lifetime of the
//! process.

pub mod client;
pub mod uaa;

use crate::metrics::MetricsRegistry;
use crate::types::{Endpoint, Route};
use async_trait::async_trait;
use common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

pub use client::HttpRoutingApiClient;
pub use uaa::UaaTokenFetcher;

/// Multiplier applied to the registration interval so a mapping survives one
/// missed registration
pub const TTL_BUFFER: f64 = 2.1;

/// OAuth access token
#[derive(Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,

    #[serde(default)]
    pub token_type: String,

    #[serde(default)]
    pub expires_in: u64,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// Router group as returned by the routing API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterGroup {
    #[serde(default)]
    pub guid: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, rename = "type")]
    pub group_type: String,

    #[serde(default)]
    pub reservable_ports: String,
}

/// TCP route mapping keyed by router group and external port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpRouteMapping {
    pub router_group_guid: String,

    #[serde(rename = "port")]
    pub external_port: u16,

    #[serde(rename = "backend_ip")]
    pub host_ip: String,

    #[serde(rename = "backend_port")]
    pub host_port: u16,

    #[serde(
        rename = "backend_sni_hostname",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sni_hostname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
}

/// Issues access tokens for the routing API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenFetcher: Send + Sync {
    async fn fetch_token(&self) -> Result<AccessToken>;
}

/// Routing API operations used by the registrar
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoutingApiClient: Send + Sync {
    async fn router_group_with_name(&self, token: &str, name: &str) -> Result<RouterGroup>;

    async fn upsert_tcp_route_mappings(
        &self,
        token: &str,
        mappings: &[TcpRouteMapping],
    ) -> Result<()>;

    async fn delete_tcp_route_mappings(
        &self,
        token: &str,
        mappings: &[TcpRouteMapping],
    ) -> Result<()>;
}

/// Registration backend for tcp routes
#[async_trait]
pub trait RouteApi: Send {
    async fn register_route(&mut self, route: &Route) -> Result<()>;

    async fn unregister_route(&mut self, route: &Route) -> Result<()>;
}

/// Compute the TTL in whole seconds for a route registered every `interval`.
///
/// The buffered interval is clamped to `max_ttl`, and never drops below one
/// second for sub-second intervals.
pub fn calculate_ttl(interval: Duration, max_ttl: Duration) -> u32 {
    let ttl_secs = interval.as_secs_f64() * TTL_BUFFER;
    if ttl_secs > max_ttl.as_secs_f64() {
        return secs_u32(max_ttl);
    }
    (ttl_secs as u32).max(1)
}

fn secs_u32(duration: Duration) -> u32 {
    u32::try_from(duration.as_secs()).unwrap_or(u32::MAX)
}

/// Routing API adapter with a memoized router group cache
pub struct RoutingApi {
    token_fetcher: Box<dyn TokenFetcher>,
    api_client: Box<dyn RoutingApiClient>,
    router_group_guids: HashMap<String, String>,
    max_ttl: Duration,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl RoutingApi {
    pub fn new(
        token_fetcher: Box<dyn TokenFetcher>,
        api_client: Box<dyn RoutingApiClient>,
        max_ttl: Duration,
    ) -> Self {
        Self {
            token_fetcher,
            api_client,
            router_group_guids: HashMap::new(),
            max_ttl,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn refresh_token(&self) -> Result<String> {
        debug!("Refreshing routing API token");
        let token = self.token_fetcher.fetch_token().await.map_err(|e| {
            error!(error = %e, "Failed to fetch routing API token");
            e
        })?;
        Ok(token.access_token)
    }

    async fn router_group_guid(&mut self, token: &str, name: &str) -> Result<String> {
        if let Some(guid) = self.router_group_guids.get(name) {
            return Ok(guid.clone());
        }

        if let Some(ref m) = self.metrics {
            m.record_router_group_lookup();
        }
        let router_group = self.api_client.router_group_with_name(token, name).await?;
        if router_group.guid.is_empty() {
            return Err(Error::RouterGroupNotFound(name.to_string()));
        }

        info!(router_group = name, guid = %router_group.guid, "Mapped new router group");
        self.router_group_guids
            .insert(name.to_string(), router_group.guid.clone());
        Ok(router_group.guid)
    }

    async fn tcp_route_mapping(&mut self, token: &str, route: &Route) -> Result<TcpRouteMapping> {
        let Endpoint::Tcp {
            router_group,
            external_port,
            port,
        } = &route.endpoint
        else {
            return Err(Error::routing_api(format!(
                "route '{}' is not a tcp route",
                route.name
            )));
        };

        let router_group_guid = self.router_group_guid(token, router_group).await?;

        Ok(TcpRouteMapping {
            router_group_guid,
            external_port: *external_port,
            host_ip: route.host.clone(),
            host_port: *port,
            sni_hostname: route
                .server_cert_domain_san
                .clone()
                .filter(|san| !san.is_empty()),
            ttl: Some(calculate_ttl(route.registration_interval, self.max_ttl)),
        })
    }
}

#[async_trait]
impl RouteApi for RoutingApi {
    async fn register_route(&mut self, route: &Route) -> Result<()> {
        let token = self.refresh_token().await?;
        let mapping = self.tcp_route_mapping(&token, route).await?;

        self.api_client
            .upsert_tcp_route_mappings(&token, std::slice::from_ref(&mapping))
            .await?;

        info!(
            route = %route.name,
            router_group_guid = %mapping.router_group_guid,
            external_port = mapping.external_port,
            ttl = ?mapping.ttl,
            "Upserted route"
        );
        Ok(())
    }

    async fn unregister_route(&mut self, route: &Route) -> Result<()> {
        let token = self.refresh_token().await?;
        let mapping = self.tcp_route_mapping(&token, route).await?;

        info!(
            route = %route.name,
            router_group_guid = %mapping.router_group_guid,
            external_port = mapping.external_port,
            "Deleting route"
        );
        self.api_client
            .delete_tcp_route_mappings(&token, std::slice::from_ref(&mapping))
            .await
    }
}
