//! Backend client for manifest reads and submissions
//!
//! The backend is a plain request/response service:
//! - `GET {endpoint}?mode={mode}` → `{ ok, groups: [...] }`
//! - `POST {endpoint}` with the submission JSON → `{ sheet, blocks }`
//!
//! There are no retries here. A failed call is reported to the caller, who
//! decides whether to try again.

use crate::error::{FetchError, SubmitError};
use crate::manifest::Group;
use crate::submission::{SubmissionPayload, SubmissionReceipt};
use async_trait::async_trait;
use liq_common::config::ScannerConfig;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("liq-scanner/", env!("CARGO_PKG_VERSION"));

/// Remote manifest and submission service
#[async_trait]
pub trait Backend: Send + Sync {
    /// Read the current manifest groups
    async fn fetch_manifest(&self) -> Result<Vec<Group>, FetchError>;

    /// Deliver one submission payload
    async fn submit(&self, payload: &SubmissionPayload) -> Result<SubmissionReceipt, SubmitError>;
}

#[derive(Debug, Deserialize)]
struct ManifestResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    groups: Option<Vec<Group>>,
}

/// HTTP implementation of [`Backend`]
pub struct HttpBackend {
    http_client: reqwest::Client,
    endpoint: reqwest::Url,
    mode: String,
}

impl HttpBackend {
    pub fn new(endpoint: &str, mode: &str, timeout: Duration) -> liq_common::Result<Self> {
        let endpoint = reqwest::Url::parse(endpoint).map_err(|e| {
            liq_common::Error::Config(format!("Invalid endpoint '{}': {}", endpoint, e))
        })?;

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| liq_common::Error::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint,
            mode: mode.to_string(),
        })
    }

    pub fn from_config(config: &ScannerConfig) -> liq_common::Result<Self> {
        Self::new(&config.endpoint, &config.mode, config.request_timeout)
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_manifest(&self) -> Result<Vec<Group>, FetchError> {
        debug!(endpoint = %self.endpoint, mode = %self.mode, "Requesting manifest");

        let response = self
            .http_client
            .get(self.endpoint.clone())
            .query(&[("mode", self.mode.as_str())])
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }

        let body: ManifestResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        if !body.ok {
            return Err(FetchError::Rejected);
        }
        Ok(body.groups.unwrap_or_default())
    }

    async fn submit(&self, payload: &SubmissionPayload) -> Result<SubmissionReceipt, SubmitError> {
        // Serialized by hand: the backend expects a text/plain body
        let body =
            serde_json::to_string(payload).map_err(|e| SubmitError::Network(e.to_string()))?;

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, "text/plain;charset=UTF-8")
            .body(body)
            .send()
            .await
            .map_err(|e| SubmitError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubmitError::Http(status.as_u16()));
        }

        // Receipt is advisory; an unreadable body still counts as delivered
        let receipt = match response.bytes().await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => SubmissionReceipt::default(),
        };

        info!(
            groups = payload.groups.len(),
            sheet = %receipt.sheet,
            blocks = receipt.blocks,
            "Submission delivered"
        );
        Ok(receipt)
    }
}
