use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use tapster::Jwks;

use super::KeySource;
use crate::KeySetError;

/// A key source backed by a JWKS endpoint
#[derive(Clone, Debug)]
pub struct RemoteKeySource {
    jwks_url: String,
    client: Client,
}

impl RemoteKeySource {
    /// Constructs a source that fetches `jwks_url`, giving up on any request
    /// that takes longer than `timeout`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(jwks_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("tapster_oauth2/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self::with_client(jwks_url, client))
    }

    /// Constructs a source using a preconfigured client
    pub fn with_client(jwks_url: impl Into<String>, client: Client) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            client,
        }
    }

    /// The URL keys are fetched from
    #[must_use]
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }
}

#[async_trait]
impl KeySource for RemoteKeySource {
    #[tracing::instrument(skip(self), fields(jwks.url = %self.jwks_url))]
    async fn fetch(&self) -> Result<Jwks, KeySetError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                http.status_code = status.as_u16(),
                "key set endpoint returned an unexpected status"
            );
            return Err(KeySetError::Status(status));
        }

        let body = response.bytes().await?;
        let jwks: Jwks = serde_json::from_slice(&body)?;

        tracing::info!(jwks.keys = jwks.len(), "key set fetched");
        Ok(jwks)
    }

    fn describe(&self) -> &str {
        &self.jwks_url
    }
}
