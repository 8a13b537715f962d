//! Inference service
//!
//! Given an image, produce a `TireAnalysisResult`. A reachable model
//! endpoint gets the prediction delegated to it; otherwise the service
//! falls back to mock analysis so callers always receive a valid result.
//! Purely a transform: persisting results is the coordinator's job.

pub mod analysis;
pub mod client;
pub mod preprocess;

pub use analysis::{AnalysisSource, TireAnalysisResult};

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::InferenceConfig;
use crate::error::MlResult;
use crate::training::artifacts::{self, ModelManifest};
use client::ModelEndpointClient;

/// Per-model status reported by `GET /models`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
    pub name: String,
    pub loaded: bool,
    pub input_shape: Vec<usize>,
    pub output_shape: Vec<usize>,
}

/// One entry of a batch analysis response
#[derive(Debug, Clone, Serialize)]
pub struct BatchAnalysis {
    pub filename: String,
    pub analysis: TireAnalysisResult,
}

/// Loads persisted models and exposes synchronous image-in/analysis-out
/// predictions. Model objects are process-local and rebuilt wholesale on
/// each deployment via `reload_models`.
pub struct InferenceService {
    config: InferenceConfig,
    endpoint: Option<ModelEndpointClient>,
    models_dir: PathBuf,
    models: RwLock<Vec<ModelManifest>>,
}

impl InferenceService {
    pub fn new(config: InferenceConfig, models_dir: PathBuf) -> Self {
        let probe_timeout = Duration::from_secs(config.probe_timeout_secs);
        let endpoint = config.endpoint.as_deref().and_then(|url| {
            match ModelEndpointClient::new(url, probe_timeout) {
                Ok(client) => Some(client),
                Err(e) => {
                    warn!("ignoring unusable model endpoint '{url}': {e}");
                    None
                }
            }
        });
        Self {
            config,
            endpoint,
            models_dir,
            models: RwLock::new(Vec::new()),
        }
    }

    fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.config.probe_timeout_secs)
    }

    /// Rebuild the in-process model registry from persisted artifacts.
    /// Called once at startup and again by every deployment phase.
    pub async fn reload_models(&self) -> MlResult<usize> {
        let manifests = artifacts::list_manifests(&self.models_dir)?;
        let count = manifests.len();
        *self.models.write().await = manifests;
        info!(count, "reloaded model registry");
        Ok(count)
    }

    /// Names of currently loaded models
    pub async fn loaded_model_names(&self) -> Vec<String> {
        self.models.read().await.iter().map(|m| m.name.clone()).collect()
    }

    /// Registry view for the `/models` endpoint
    pub async fn model_statuses(&self) -> Vec<ModelStatus> {
        self.models
            .read()
            .await
            .iter()
            .map(|m| ModelStatus {
                name: m.name.clone(),
                loaded: true,
                input_shape: m.input_shape.clone(),
                output_shape: m.output_shape.clone(),
            })
            .collect()
    }

    /// Analyze a single image.
    ///
    /// Malformed bytes and oversized payloads are errors; an unreachable
    /// model endpoint is not - that path degrades to mock analysis.
    pub async fn analyze(&self, filename: &str, raw: &[u8]) -> MlResult<TireAnalysisResult> {
        // Decode and resize up front so malformed payloads fail before any
        // delegation; the remote endpoint receives the original bytes.
        let _tensor = preprocess::preprocess(raw, self.config.max_image_bytes)?;

        if let Some(endpoint) = &self.endpoint {
            if endpoint.is_reachable(self.probe_timeout()).await {
                match endpoint.analyze(filename, raw.to_vec()).await {
                    Ok(result) => return Ok(result),
                    Err(e) => warn!("model delegation failed, using mock fallback: {e}"),
                }
            } else {
                debug!("model endpoint unreachable, using mock fallback");
            }
        }

        Ok(analysis::mock_analysis())
    }

    /// Analyze a batch. Every image gets an individual result (model or
    /// mock); a malformed image fails the whole call with a single error.
    pub async fn batch_analyze(
        &self,
        images: &[(String, Vec<u8>)],
    ) -> MlResult<Vec<BatchAnalysis>> {
        for (_, raw) in images {
            preprocess::preprocess(raw, self.config.max_image_bytes)?;
        }

        let delegate = match &self.endpoint {
            Some(endpoint) if endpoint.is_reachable(self.probe_timeout()).await => Some(endpoint),
            _ => None,
        };

        let mut results = Vec::with_capacity(images.len());
        for (filename, raw) in images {
            let analysis = if let Some(endpoint) = delegate {
                match endpoint.analyze(filename, raw.clone()).await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!("batch delegation failed for {filename}, using mock: {e}");
                        analysis::mock_analysis()
                    }
                }
            } else {
                analysis::mock_analysis()
            };
            results.push(BatchAnalysis {
                filename: filename.clone(),
                analysis,
            });
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MlError;

    fn service(dir: &std::path::Path) -> InferenceService {
        InferenceService::new(InferenceConfig::default(), dir.join("models"))
    }

    fn test_jpeg() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(32, 32, image::Rgb([10, 20, 30]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Jpeg)
            .unwrap();
        out
    }

    #[tokio::test]
    async fn test_analyze_without_endpoint_is_mock() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        let result = service.analyze("tire.jpg", &test_jpeg()).await.unwrap();
        assert_eq!(result.source, AnalysisSource::Mock);
        let sum: f64 = result.condition.scores.values().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_analyze_unreachable_endpoint_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = InferenceConfig {
            endpoint: Some("http://192.0.2.1:1".to_string()),
            probe_timeout_secs: 1,
            ..Default::default()
        };
        let service = InferenceService::new(config, dir.path().join("models"));

        let result = service.analyze("tire.jpg", &test_jpeg()).await.unwrap();
        assert_eq!(result.source, AnalysisSource::Mock);
        assert!(result.tread_depth.value_mm >= 0.0 && result.tread_depth.value_mm <= 10.0);
    }

    #[tokio::test]
    async fn test_analyze_rejects_garbage_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        let err = service.analyze("junk.bin", b"garbage").await.unwrap_err();
        assert!(matches!(err, MlError::ImageDecode(_)));
    }

    #[tokio::test]
    async fn test_batch_gives_every_image_a_result() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        let images = vec![
            ("a.jpg".to_string(), test_jpeg()),
            ("b.jpg".to_string(), test_jpeg()),
            ("c.jpg".to_string(), test_jpeg()),
        ];
        let results = service.batch_analyze(&images).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].filename, "a.jpg");
    }

    #[tokio::test]
    async fn test_batch_with_one_bad_image_fails_whole_call() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        let images = vec![
            ("a.jpg".to_string(), test_jpeg()),
            ("bad.jpg".to_string(), b"not an image".to_vec()),
        ];
        let err = service.batch_analyze(&images).await.unwrap_err();
        assert!(matches!(err, MlError::ImageDecode(_)));
    }

    #[tokio::test]
    async fn test_registry_empty_until_artifacts_exist() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        assert_eq!(service.reload_models().await.unwrap(), 0);
        assert!(service.model_statuses().await.is_empty());
    }
}
