use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::data::ListingSource;
use crate::endpoints::Endpoint;
use crate::gateway::ErrorBody;

#[derive(Debug, Clone, Default)]
pub struct ProxyClientConfig {
    /// Origin of the proxy, e.g. `http://localhost:3000`.
    pub base_url: String,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

/// Talks to a running proxy the way the browser does: every endpoint is
/// requested under `/api/reddit`.
pub struct ProxyClient {
    http: HttpClient,
    base_url: Url,
}

impl ProxyClient {
    pub fn new(config: ProxyClientConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            bail!("proxy client base url required");
        }
        let base_url = Url::parse(config.base_url.trim())
            .with_context(|| format!("proxy client: invalid base url {}", config.base_url))?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()?,
        };
        Ok(Self { http, base_url })
    }

    pub fn url_for(&self, endpoint: &Endpoint) -> Result<Url> {
        let mut url = self.base_url.join(&endpoint.proxied_path())?;
        if !endpoint.params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &endpoint.params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

impl ListingSource for ProxyClient {
    fn fetch(&self, endpoint: &Endpoint) -> Result<Value> {
        let url = self.url_for(endpoint)?;
        debug!(%url, "fetching through proxy");
        let resp = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .context("proxy request")?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<ErrorBody>()
                .map(|body| body.message)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or_default().to_string());
            bail!("proxy: status {}: {}", status.as_u16(), message);
        }
        resp.json().context("proxy: decode response")
    }
}
