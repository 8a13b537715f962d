//! HTTP client for a remote model endpoint
//!
//! A short liveness probe decides whether prediction is delegated or falls
//! back to mock analysis. Transport failures map to `ModelUnavailable` and
//! are handled by the caller, never surfaced to API clients.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::analysis::{AnalysisSource, TireAnalysisResult};
use crate::error::{MlError, MlResult};

/// Envelope shape of the remote `/analyze` response
#[derive(Debug, Deserialize)]
struct RemoteAnalysisEnvelope {
    #[serde(default)]
    success: bool,
    analysis: Option<TireAnalysisResult>,
}

/// Client for the configured model-serving endpoint
#[derive(Debug, Clone)]
pub struct ModelEndpointClient {
    base_url: String,
    http: reqwest::Client,
}

impl ModelEndpointClient {
    pub fn new(base_url: &str, probe_timeout: Duration) -> MlResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(probe_timeout.max(Duration::from_secs(1)) * 5)
            .connect_timeout(probe_timeout)
            .build()
            .map_err(|e| MlError::ModelUnavailable(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Lightweight liveness probe with a short timeout
    pub async fn is_reachable(&self, probe_timeout: Duration) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.http.get(&url).timeout(probe_timeout).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("model endpoint probe failed: {e}");
                false
            }
        }
    }

    /// Delegate a prediction to the remote endpoint
    pub async fn analyze(&self, filename: &str, raw: Vec<u8>) -> MlResult<TireAnalysisResult> {
        let part = reqwest::multipart::Part::bytes(raw)
            .file_name(filename.to_string())
            .mime_str("image/jpeg")
            .map_err(|e| MlError::ModelUnavailable(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("image", part);

        let url = format!("{}/analyze", self.base_url);
        let resp = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| MlError::ModelUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(MlError::ModelUnavailable(format!(
                "endpoint returned {}",
                resp.status()
            )));
        }

        let envelope: RemoteAnalysisEnvelope = resp
            .json()
            .await
            .map_err(|e| MlError::ModelUnavailable(e.to_string()))?;

        match envelope.analysis {
            Some(mut analysis) if envelope.success => {
                analysis.source = AnalysisSource::Model;
                Ok(analysis.normalize())
            }
            _ => Err(MlError::ModelUnavailable(
                "endpoint response carried no analysis".to_string(),
            )),
        }
    }
}
