//! Client side of the external control computation service.

use crate::error::CstpError;
use async_trait::async_trait;
use cstp_schemas::{command::ControlCommands, measurement::MeasurementPayload};
use reqwest::{Client, Url};
use std::time::Duration;

pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest upstream error body echoed back in an error detail, in bytes.
const MAX_ERROR_BODY_LEN: usize = 512;

/// Computes actuator commands from a measurement batch.
#[async_trait]
pub trait ControlService: Send + Sync + 'static {
    /// Every failure (transport, status, body) is reported as
    /// [`CstpError::Upstream`].
    async fn compute_control(
        &self,
        payload: &MeasurementPayload,
    ) -> Result<ControlCommands, CstpError>;
}

/// Calls the control service over HTTP with one pooled client per process.
#[derive(Debug, Clone)]
pub struct HttpControlClient {
    client: Client,
    url: Url,
}

impl HttpControlClient {
    /// Builds the client for `url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `CstpError::Validation` if `url` is not an absolute http(s) URL
    /// and `CstpError::Upstream` if the HTTP client cannot be constructed.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, CstpError> {
        let url = parse_control_url(url)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CstpError::Upstream(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Checks that `url` is an absolute `http` or `https` URL.
pub fn parse_control_url(url: &str) -> Result<Url, CstpError> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| CstpError::Validation(format!("invalid control service URL '{url}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(CstpError::Validation(format!(
            "control service URL must use http or https, got '{scheme}'"
        ))),
    }
}

#[async_trait]
impl ControlService for HttpControlClient {
    async fn compute_control(
        &self,
        payload: &MeasurementPayload,
    ) -> Result<ControlCommands, CstpError> {
        let url = self.url.as_str();
        tracing::debug!(%url, plant_id = %payload.plant_id, "requesting control actions");

        let response = self
            .client
            .post(self.url.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                CstpError::Upstream(format!("Error contacting control service at {url}: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CstpError::Upstream(format!(
                "Control service at {url} returned {status}: {}",
                truncate_body(&body, MAX_ERROR_BODY_LEN)
            )));
        }

        let bytes = response.bytes().await.map_err(|e| {
            CstpError::Upstream(format!(
                "Error reading control service response from {url}: {e}"
            ))
        })?;
        let commands: ControlCommands = serde_json::from_slice(&bytes).map_err(|e| {
            CstpError::Upstream(format!(
                "Control service at {url} returned an invalid body: {e}"
            ))
        })?;

        tracing::debug!(%url, %status, actuators = commands.commands.len(), "control actions received");
        Ok(commands)
    }
}

fn truncate_body(body: &str, max_len: usize) -> String {
    if body.len() <= max_len {
        return body.to_string();
    }
    let mut end = max_len;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
