//! HTTP client for the routing API.

use super::{RouterGroup, RoutingApiClient, TcpRouteMapping};
use async_trait::async_trait;
use common::{Error, Result};
use reqwest::{Certificate, Client, ClientBuilder, Identity, Response};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// TLS options shared by the routing API and OAuth clients
#[derive(Debug, Clone, Default)]
pub struct HttpTlsOptions {
    pub skip_ssl_validation: bool,
    pub ca_cert_path: Option<PathBuf>,
    pub client_cert_path: Option<PathBuf>,
    pub client_private_key_path: Option<PathBuf>,
}

/// Build a `reqwest` client with the given TLS options
pub fn build_http_client(tls: &HttpTlsOptions) -> Result<Client> {
    let mut builder = ClientBuilder::new()
        .use_rustls_tls()
        .timeout(REQUEST_TIMEOUT)
        .danger_accept_invalid_certs(tls.skip_ssl_validation);

    if let Some(ca_path) = &tls.ca_cert_path {
        for cert in read_ca_bundle(ca_path)? {
            builder = builder.add_root_certificate(cert);
        }
    }

    match (&tls.client_cert_path, &tls.client_private_key_path) {
        (Some(cert_path), Some(key_path)) => {
            builder = builder.identity(read_identity(cert_path, key_path)?);
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err(Error::tls(
                "client_cert_path and client_private_key_path must be provided together",
            ));
        }
        (None, None) => {}
    }

    builder
        .build()
        .map_err(|e| Error::tls(format!("failed to build HTTP client: {}", e)))
}

/// Parse every certificate in a PEM CA bundle
pub(crate) fn read_ca_bundle(path: &Path) -> Result<Vec<Certificate>> {
    let bytes = read_pem(path)?;
    Certificate::from_pem_bundle(&bytes).map_err(|e| {
        Error::tls(format!("failed to parse CA file `{}`: {}", path.display(), e))
    })
}

/// Parse a client identity from separate certificate and key PEM files
pub(crate) fn read_identity(cert_path: &Path, key_path: &Path) -> Result<Identity> {
    let mut identity_pem = read_pem(cert_path)?;
    identity_pem.push(b'\n');
    identity_pem.extend(read_pem(key_path)?);
    Identity::from_pem(&identity_pem).map_err(|e| {
        Error::tls(format!(
            "failed to parse client identity from `{}` + `{}`: {}",
            cert_path.display(),
            key_path.display(),
            e
        ))
    })
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| Error::tls(format!("failed to read `{}`: {}", path.display(), e)))
}

/// Turn a non-2xx response into a routing API error carrying status and body
pub(crate) async fn error_for_status(response: Response) -> std::result::Result<Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(format!("unexpected status {}: {}", status, body.trim()))
}

/// Routing API client over HTTP
pub struct HttpRoutingApiClient {
    client: Client,
    api_url: String,
}

impl HttpRoutingApiClient {
    pub fn new(client: Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    async fn post_mappings(
        &self,
        token: &str,
        path: &str,
        mappings: &[TcpRouteMapping],
    ) -> Result<()> {
        let url = self.url(path);
        debug!(url = %url, count = mappings.len(), "Posting tcp route mappings");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(mappings)
            .send()
            .await
            .map_err(|e| Error::routing_api(format!("request to {} failed: {}", path, e)))?;

        error_for_status(response)
            .await
            .map_err(|e| Error::routing_api(format!("{}: {}", path, e)))?;
        Ok(())
    }
}

#[async_trait]
impl RoutingApiClient for HttpRoutingApiClient {
    async fn router_group_with_name(&self, token: &str, name: &str) -> Result<RouterGroup> {
        let url = self.url("/routing/v1/router_groups");
        debug!(url = %url, router_group = name, "Looking up router group");

        let response = self
            .client
            .get(&url)
            .query(&[("name", name)])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::routing_api(format!("router group lookup failed: {}", e)))?;

        let response = error_for_status(response)
            .await
            .map_err(|e| Error::routing_api(format!("router group lookup: {}", e)))?;

        let groups: Vec<RouterGroup> = response.json().await.map_err(|e| {
            Error::routing_api(format!("invalid router group response: {}", e))
        })?;

        Ok(groups.into_iter().next().unwrap_or_default())
    }

    async fn upsert_tcp_route_mappings(
        &self,
        token: &str,
        mappings: &[TcpRouteMapping],
    ) -> Result<()> {
        self.post_mappings(token, "/routing/v1/tcp_routes/create", mappings)
            .await
    }

    async fn delete_tcp_route_mappings(
        &self,
        token: &str,
        mappings: &[TcpRouteMapping],
    ) -> Result<()> {
        self.post_mappings(token, "/routing/v1/tcp_routes/delete", mappings)
            .await
    }
}
