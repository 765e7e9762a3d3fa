//! HTTP client implementation

use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::errors::DeployError;

/// JSON HTTP client rooted at a base URL
pub struct HttpClient {
    client: Client,
    base_url: Url,
    token: Option<SecretString>,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str) -> Result<Self, DeployError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base_url: Url::parse(base_url.trim_end_matches('/'))?,
            token: None,
        })
    }

    /// Create a new HTTP client that sends a bearer token
    pub fn with_token(base_url: &str, token: SecretString) -> Result<Self, DeployError> {
        let mut client = Self::new(base_url)?;
        client.token = Some(token);
        Ok(client)
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build a URL by appending percent-encoded path segments to the base URL
    pub fn url(&self, segments: &[&str]) -> Result<Url, DeployError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                DeployError::ConfigError(format!("{} cannot be used as a base URL", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(
                header::AUTHORIZATION,
                format!("Bearer {}", token.expose_secret()),
            ),
            None => request,
        }
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, DeployError> {
        let url = self.url(segments)?;
        debug!("GET {}", url);

        let response = self.authorize(self.client.get(url)).send().await?;
        Self::parse(response, "GET").await
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, DeployError> {
        let url = self.url(segments)?;
        debug!("POST {}", url);

        let response = self.authorize(self.client.post(url)).json(body).send().await?;
        Self::parse(response, "POST").await
    }

    /// Make a HEAD request and return the status code
    pub async fn head(&self, segments: &[&str], accept: &str) -> Result<StatusCode, DeployError> {
        let url = self.url(segments)?;
        debug!("HEAD {}", url);

        let response = self
            .authorize(self.client.head(url))
            .header(header::ACCEPT, accept)
            .send()
            .await?;
        Ok(response.status())
    }

    async fn parse<T: DeserializeOwned>(
        response: reqwest::Response,
        method: &str,
    ) -> Result<T, DeployError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP {} failed: {} - {}", method, status, body);
            return Err(DeployError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.json().await?;
        Ok(body)
    }
}
