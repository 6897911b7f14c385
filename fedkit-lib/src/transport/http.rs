//! Blocking reqwest implementation of [`DocumentFetcher`] and [`DocumentSender`].
//!
//! Only compiled with the `http-client` feature:
//!
//! ```toml
//! [dependencies]
//! fedkit-lib = { version = "0.1", features = ["http-client"] }
//! ```

use std::time::Duration;

use tracing::debug;

use super::{DocumentFetcher, DocumentSender, FetchedDocument};
use crate::config::FederationConfig;
use crate::{FederationError, Result};

/// Accept header used for document fetches.
const ACCEPT: &str = "application/activity+json, application/ld+json, application/xrd+xml, application/json;q=0.9, */*;q=0.8";

/// HTTP client with the configured timeout and User-Agent. No retries.
pub struct HttpClient {
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpClient {
    /// Build a client from configuration.
    pub fn new(config: &FederationConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FederationError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            timeout_secs: config.fetch_timeout_secs,
        })
    }

    fn map_reqwest_error(&self, url: &str, e: reqwest::Error) -> FederationError {
        if e.is_timeout() {
            FederationError::ConnectionTimeout {
                url: url.to_string(),
                timeout_ms: self.timeout_secs * 1000,
            }
        } else {
            FederationError::Transport(format!("{}: {}", url, e))
        }
    }
}

impl DocumentFetcher for HttpClient {
    fn fetch(&self, url: &str) -> Result<FetchedDocument> {
        debug!(url, "fetching document");
        let response = self
            .client
            .get(url)
            .header("Accept", ACCEPT)
            .send()
            .map_err(|e| self.map_reqwest_error(url, e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| FederationError::Serialization(format!("Failed to read response: {}", e)))?;
        Ok(FetchedDocument { body, status })
    }
}

impl DocumentSender for HttpClient {
    fn send(&self, url: &str, body: &str, headers: &[(String, String)]) -> Result<u16> {
        debug!(url, "delivering payload");
        let mut request = self.client.post(url).body(body.to_string());
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request
            .send()
            .map_err(|e| self.map_reqwest_error(url, e))?;
        Ok(response.status().as_u16())
    }
}
