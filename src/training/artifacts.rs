//! Model artifact persistence
//!
//! One artifact per model name under `<root>/models/<name>/`: a `model.json`
//! manifest plus a `weights.bin` file of little-endian f32s. A newly trained
//! artifact overwrites the prior one at the same path; there is no rollback
//! versioning.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::architecture::ModelArchitecture;
use super::TrainingTask;
use crate::error::{MlError, MlResult};

pub const MANIFEST_FILE: &str = "model.json";
pub const WEIGHTS_FILE: &str = "weights.bin";

/// Whether a training run consumed real captured samples or the synthetic
/// fallback. Carried through manifests and reports so synthetic runs stay
/// distinguishable from real-data training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Real,
    Synthetic,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Real => write!(f, "real"),
            DataSource::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// Manifest describing one persisted, named model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub name: String,
    pub task: TrainingTask,
    pub version: String,
    pub input_shape: Vec<usize>,
    pub output_shape: Vec<usize>,
    pub architecture: ModelArchitecture,
    pub loss: String,
    pub epochs: usize,
    pub final_loss: f64,
    pub data_source: DataSource,
    pub samples_used: usize,
    pub trained_at: DateTime<Utc>,
    pub weights_file: String,
}

/// A manifest plus its weight vector
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub manifest: ModelManifest,
    pub weights: Array1<f32>,
}

impl ModelArtifact {
    /// Persist under `<models_dir>/<name>/`, overwriting any prior artifact
    pub fn save(&self, models_dir: &Path) -> MlResult<PathBuf> {
        let dir = models_dir.join(&self.manifest.name);
        std::fs::create_dir_all(&dir)?;

        let manifest_json = serde_json::to_string_pretty(&self.manifest)?;
        std::fs::write(dir.join(MANIFEST_FILE), manifest_json)?;

        let mut bytes = Vec::with_capacity(self.weights.len() * 4);
        for value in self.weights.iter() {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        std::fs::write(dir.join(WEIGHTS_FILE), bytes)?;

        info!(
            model = %self.manifest.name,
            version = %self.manifest.version,
            "persisted model artifact"
        );
        Ok(dir)
    }

    /// Load the artifact stored under `<models_dir>/<name>/`
    pub fn load(models_dir: &Path, name: &str) -> MlResult<Self> {
        let dir = models_dir.join(name);
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(MlError::model_not_found(name));
        }
        let manifest: ModelManifest =
            serde_json::from_str(&std::fs::read_to_string(manifest_path)?)?;

        let bytes = std::fs::read(dir.join(&manifest.weights_file))?;
        let weights: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Ok(Self {
            manifest,
            weights: Array1::from_vec(weights),
        })
    }
}

/// Read every manifest under `models_dir`, skipping unreadable entries
pub fn list_manifests(models_dir: &Path) -> MlResult<Vec<ModelManifest>> {
    if !models_dir.exists() {
        return Ok(Vec::new());
    }
    let mut manifests = Vec::new();
    for entry in std::fs::read_dir(models_dir)? {
        let path = entry?.path().join(MANIFEST_FILE);
        if !path.exists() {
            continue;
        }
        let contents = std::fs::read_to_string(&path)?;
        if let Ok(manifest) = serde_json::from_str::<ModelManifest>(&contents) {
            manifests.push(manifest);
        }
    }
    manifests.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(manifests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::architecture::regression_head;

    fn test_artifact(name: &str) -> ModelArtifact {
        ModelArtifact {
            manifest: ModelManifest {
                name: name.to_string(),
                task: TrainingTask::TreadDepth,
                version: "20260101120000".to_string(),
                input_shape: vec![224, 224, 3],
                output_shape: vec![1],
                architecture: regression_head(),
                loss: "mean_squared_error".to_string(),
                epochs: 10,
                final_loss: 0.42,
                data_source: DataSource::Synthetic,
                samples_used: 100,
                trained_at: Utc::now(),
                weights_file: WEIGHTS_FILE.to_string(),
            },
            weights: Array1::from_vec(vec![0.25, -1.5, 3.75]),
        }
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = test_artifact("tread-depth-model");
        artifact.save(dir.path()).unwrap();

        let loaded = ModelArtifact::load(dir.path(), "tread-depth-model").unwrap();
        assert_eq!(loaded.manifest.name, "tread-depth-model");
        assert_eq!(loaded.manifest.task, TrainingTask::TreadDepth);
        assert_eq!(loaded.weights, artifact.weights);
    }

    #[test]
    fn test_save_overwrites_prior_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut artifact = test_artifact("tread-depth-model");
        artifact.save(dir.path()).unwrap();

        artifact.manifest.version = "20260102000000".to_string();
        artifact.weights = Array1::from_vec(vec![9.0]);
        artifact.save(dir.path()).unwrap();

        let loaded = ModelArtifact::load(dir.path(), "tread-depth-model").unwrap();
        assert_eq!(loaded.manifest.version, "20260102000000");
        assert_eq!(loaded.weights.len(), 1);
        // Still exactly one artifact for the name
        assert_eq!(list_manifests(dir.path()).unwrap().len(), 1);
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelArtifact::load(dir.path(), "nope").unwrap_err();
        assert!(matches!(err, MlError::NotFound { .. }));
    }

    #[test]
    fn test_list_manifests_on_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_manifests(dir.path()).unwrap().is_empty());
    }
}
