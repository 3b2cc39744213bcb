//! Outbound HTTP calls to host machines.
//!
//! A host exposes `POST /api/session/start`, `POST /api/session/end` and
//! `GET /api/session/programs`. Every call is bounded by the configured
//! timeout and attempted exactly once.

use std::time::Duration;

use imperium_core::host::{endpoint_url, PROGRAMS_PATH, SIGNALING_END_PATH, SIGNALING_START_PATH};
use imperium_db::models::host::Host;
use imperium_db::models::session::SessionResponse;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Failures talking to a host.
#[derive(Debug, thiserror::Error)]
pub enum SignalingError {
    /// The request could not be sent or its body could not be read.
    #[error("Host request failed: {0}")]
    Request(reqwest::Error),

    /// The host did not answer within the configured timeout.
    #[error("Host did not respond in time")]
    Timeout,

    /// The host returned a non-2xx status code.
    #[error("Host returned HTTP {0}")]
    HttpStatus(u16),

    /// The start response had no usable `webrtc_answer`.
    #[error("Host response did not contain a WebRTC answer")]
    MissingAnswer,
}

impl From<reqwest::Error> for SignalingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SignalingError::Timeout
        } else {
            SignalingError::Request(err)
        }
    }
}

// ---------------------------------------------------------------------------
// HostClient
// ---------------------------------------------------------------------------

/// HTTP client for host signaling endpoints.
#[derive(Debug, Clone)]
pub struct HostClient {
    client: reqwest::Client,
}

impl HostClient {
    /// Build a client whose every request times out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client }
    }

    /// Ask the host to start a session. Returns the host's WebRTC answer.
    pub async fn start_session(
        &self,
        host: &Host,
        session: &SessionResponse,
    ) -> Result<String, SignalingError> {
        let url = endpoint_url(&host.ip_address, host.port, SIGNALING_START_PATH);
        let response = self.client.post(&url).json(session).send().await?;
        if !response.status().is_success() {
            return Err(SignalingError::HttpStatus(response.status().as_u16()));
        }

        let body = response.bytes().await?;
        extract_answer(&body).ok_or(SignalingError::MissingAnswer)
    }

    /// Tell the host a session is over.
    pub async fn end_session(
        &self,
        host: &Host,
        session: &SessionResponse,
    ) -> Result<(), SignalingError> {
        let url = endpoint_url(&host.ip_address, host.port, SIGNALING_END_PATH);
        let response = self.client.post(&url).json(session).send().await?;
        if !response.status().is_success() {
            return Err(SignalingError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }

    /// Fetch the list of programs the host can launch, passed through as-is.
    pub async fn list_programs(&self, host: &Host) -> Result<serde_json::Value, SignalingError> {
        let url = endpoint_url(&host.ip_address, host.port, PROGRAMS_PATH);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(SignalingError::HttpStatus(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }
}

/// Pull a non-empty `webrtc_answer` string out of a start response body.
fn extract_answer(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value
        .get("webrtc_answer")
        .and_then(|answer| answer.as_str())
        .filter(|answer| !answer.is_empty())
        .map(str::to_owned)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
