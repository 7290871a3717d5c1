//! OAuth client-credentials token fetcher.

use super::client::error_for_status;
use super::{AccessToken, TokenFetcher};
use async_trait::async_trait;
use common::{Error, Result};
use reqwest::Client;
use tracing::debug;

/// Fetches tokens from a UAA-style OAuth server
pub struct UaaTokenFetcher {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl UaaTokenFetcher {
    pub fn new(
        client: Client,
        oauth_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token_url: format!("{}/oauth/token", oauth_url.trim_end_matches('/')),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

#[async_trait]
impl TokenFetcher for UaaTokenFetcher {
    async fn fetch_token(&self) -> Result<AccessToken> {
        debug!(url = %self.token_url, client_id = %self.client_id, "Requesting access token");

        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| Error::token(format!("token request failed: {}", e)))?;

        let response = error_for_status(response).await.map_err(Error::token)?;

        let token: AccessToken = response
            .json()
            .await
            .map_err(|e| Error::token(format!("invalid token response: {}", e)))?;

        if token.access_token.is_empty() {
            return Err(Error::token("token response carried an empty access_token"));
        }
        Ok(token)
    }
}
