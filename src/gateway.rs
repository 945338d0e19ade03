//! Forwards read-only requests to the upstream API and translates failures
//! into structured JSON error bodies.

use anyhow::{Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};
use url::Url;

use crate::config::UpstreamConfig;
use crate::data::ListingSource;
use crate::endpoints::Endpoint;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid upstream url: {0}")]
    Url(#[from] url::ParseError),
    #[error("upstream request timed out")]
    Timeout,
    #[error("upstream request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("upstream returned {status}")]
    Upstream { status: StatusCode },
    #[error("upstream body was not JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("path leaves the upstream origin: {0}")]
    ForeignPath(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Transport(err)
        }
    }
}

impl GatewayError {
    /// Status relayed to the caller: the upstream's own status for HTTP
    /// errors, 400 for paths outside the upstream origin, 500 otherwise.
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::Upstream { status } => status.as_u16(),
            GatewayError::ForeignPath(_) => 400,
            _ => 500,
        }
    }

    pub fn body(&self) -> ErrorBody {
        match self {
            GatewayError::Upstream { status } => ErrorBody::new(
                format!("Reddit API error: {}", status.as_u16()),
                status.canonical_reason().unwrap_or("Unknown status"),
            ),
            GatewayError::ForeignPath(_) => ErrorBody::new("Bad request", "Invalid upstream path"),
            GatewayError::Timeout => {
                ErrorBody::new("Internal server error", "Upstream request timed out")
            }
            _ => ErrorBody::new("Internal server error", "Upstream request failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|_| b"{}".to_vec())
    }
}

/// Status and JSON body to send back to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relay {
    pub status: u16,
    pub body: Vec<u8>,
}

pub struct Gateway {
    http: HttpClient,
    base_url: Url,
    user_agent: String,
}

impl Gateway {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        anyhow::ensure!(
            !config.user_agent.trim().is_empty(),
            "gateway: upstream user agent required"
        );
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .with_context(|| format!("gateway: invalid upstream base url {base}"))?;
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .context("gateway: build http client")?;
        Ok(Self {
            http,
            base_url,
            user_agent: config.user_agent.clone(),
        })
    }

    /// `{base}/{path}.json?{query}`, query pairs appended in order.
    pub fn upstream_url(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Url, GatewayError> {
        let relative = format!("{}.json", path.trim_start_matches('/'));
        let mut url = self.base_url.join(&relative)?;
        if url.origin() != self.base_url.origin() {
            return Err(GatewayError::ForeignPath(path.to_string()));
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Relays one request. Never fails: errors become structured bodies.
    pub fn forward(&self, path: &str, query: &[(String, String)]) -> Relay {
        match self.upstream_url(path, query).and_then(|url| self.get(url)) {
            Ok((body, _)) => Relay { status: 200, body },
            Err(err) => Relay {
                status: err.status(),
                body: err.body().to_json(),
            },
        }
    }

    fn get(&self, url: Url) -> Result<(Vec<u8>, Value), GatewayError> {
        info!(%url, "proxying request");
        let resp = self
            .http
            .get(url.clone())
            .header(USER_AGENT, self.user_agent.as_str())
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|err| {
                let err = GatewayError::from(err);
                error!(%url, error = %err, "proxy request failed");
                err
            })?;

        let status = resp.status();
        if !status.is_success() {
            warn!(%url, %status, "upstream API error");
            return Err(GatewayError::Upstream { status });
        }

        let bytes = resp.bytes().map_err(GatewayError::from)?.to_vec();
        let value: Value = serde_json::from_slice(&bytes).map_err(|err| {
            error!(%url, error = %err, "upstream returned a non-JSON body");
            GatewayError::Decode(err)
        })?;
        Ok((bytes, value))
    }
}

impl ListingSource for Gateway {
    fn fetch(&self, endpoint: &Endpoint) -> Result<Value> {
        let url = self.upstream_url(&endpoint.path, &endpoint.params)?;
        let (_, value) = self.get(url)?;
        Ok(value)
    }
}
