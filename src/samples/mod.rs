//! Training sample model and filesystem-backed sample store

pub mod store;

pub use store::SampleStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Fixed tire condition label set shared by samples, analysis and training
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TireCondition {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl TireCondition {
    /// All labels, in canonical (score-vector) order
    pub const ALL: [TireCondition; 5] = [
        TireCondition::Excellent,
        TireCondition::Good,
        TireCondition::Fair,
        TireCondition::Poor,
        TireCondition::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TireCondition::Excellent => "excellent",
            TireCondition::Good => "good",
            TireCondition::Fair => "fair",
            TireCondition::Poor => "poor",
            TireCondition::Critical => "critical",
        }
    }
}

impl std::fmt::Display for TireCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Labels attached to a sample. Populated by the inference service at
/// capture time; any field may later be overwritten by user correction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleLabels {
    /// Tread depth in millimeters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tread_depth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<TireCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wear_pattern: Option<String>,
    /// Confidence of the labeling analysis, 0..=1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl SampleLabels {
    pub fn is_empty(&self) -> bool {
        self.tread_depth.is_none()
            && self.condition.is_none()
            && self.wear_pattern.is_none()
            && self.confidence.is_none()
    }
}

/// Capture context. All fields optional and never validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lighting: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_angle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Corrected label values supplied through user feedback. Presence of any
/// field marks the sample as expert validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelCorrections {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tread_depth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<TireCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wear_pattern: Option<String>,
}

impl LabelCorrections {
    pub fn is_empty(&self) -> bool {
        self.tread_depth.is_none() && self.condition.is_none() && self.wear_pattern.is_none()
    }
}

/// One captured observation used for training and evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingSample {
    pub id: String,
    /// Location of the resized 224x224 JPEG copy, owned by the store
    pub image_path: PathBuf,
    /// Foreign reference to the external tire record; stored, never interpreted
    pub tire_id: String,
    /// Foreign reference to the external vehicle record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub labels: SampleLabels,
    #[serde(default)]
    pub metadata: SampleMetadata,
    /// 1..=5, set at most once per sample via feedback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_corrections: Option<LabelCorrections>,
    /// True iff at least one correction was ever applied
    #[serde(default)]
    pub expert_validation: bool,
    pub captured_at: DateTime<Utc>,
}

impl TrainingSample {
    /// Create a fresh sample with a generated id and empty labels
    pub fn new(tire_id: &str, vehicle_id: Option<&str>, image_path: PathBuf) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            image_path,
            tire_id: tire_id.to_string(),
            vehicle_id: vehicle_id.map(|v| v.to_string()),
            labels: SampleLabels::default(),
            metadata: SampleMetadata::default(),
            user_rating: None,
            user_corrections: None,
            expert_validation: false,
            captured_at: Utc::now(),
        }
    }

    /// Merge corrections into the labels, last write wins per field
    pub fn apply_corrections(&mut self, corrections: &LabelCorrections) {
        if corrections.is_empty() {
            return;
        }
        if let Some(depth) = corrections.tread_depth {
            self.labels.tread_depth = Some(depth);
        }
        if let Some(condition) = corrections.condition {
            self.labels.condition = Some(condition);
        }
        if let Some(pattern) = &corrections.wear_pattern {
            self.labels.wear_pattern = Some(pattern.clone());
        }
        let merged = match self.user_corrections.take() {
            Some(mut existing) => {
                if corrections.tread_depth.is_some() {
                    existing.tread_depth = corrections.tread_depth;
                }
                if corrections.condition.is_some() {
                    existing.condition = corrections.condition;
                }
                if corrections.wear_pattern.is_some() {
                    existing.wear_pattern = corrections.wear_pattern.clone();
                }
                existing
            }
            None => corrections.clone(),
        };
        self.user_corrections = Some(merged);
        self.expert_validation = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_order_is_stable() {
        assert_eq!(TireCondition::ALL[0], TireCondition::Excellent);
        assert_eq!(TireCondition::ALL[4], TireCondition::Critical);
        assert_eq!(TireCondition::Fair.to_string(), "fair");
    }

    #[test]
    fn test_apply_corrections_sets_expert_validation() {
        let mut sample = TrainingSample::new("tire-1", None, PathBuf::from("x.jpg"));
        assert!(!sample.expert_validation);

        sample.apply_corrections(&LabelCorrections {
            tread_depth: Some(4.5),
            ..Default::default()
        });
        assert!(sample.expert_validation);
        assert_eq!(sample.labels.tread_depth, Some(4.5));
    }

    #[test]
    fn test_empty_corrections_are_a_no_op() {
        let mut sample = TrainingSample::new("tire-1", None, PathBuf::from("x.jpg"));
        sample.apply_corrections(&LabelCorrections::default());
        assert!(!sample.expert_validation);
        assert!(sample.user_corrections.is_none());
    }

    #[test]
    fn test_corrections_merge_last_write_wins() {
        let mut sample = TrainingSample::new("tire-1", None, PathBuf::from("x.jpg"));
        sample.apply_corrections(&LabelCorrections {
            tread_depth: Some(4.0),
            condition: Some(TireCondition::Fair),
            ..Default::default()
        });
        sample.apply_corrections(&LabelCorrections {
            tread_depth: Some(3.2),
            ..Default::default()
        });

        let merged = sample.user_corrections.as_ref().unwrap();
        assert_eq!(merged.tread_depth, Some(3.2));
        assert_eq!(merged.condition, Some(TireCondition::Fair));
        assert_eq!(sample.labels.tread_depth, Some(3.2));
    }
}
