//! Aggregate statistics over the collected learning data

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the learning store plus retraining schedule state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningStats {
    pub total_samples: usize,
    pub total_images: usize,
    pub user_feedback_count: usize,
    pub expert_validations: usize,
    pub average_user_rating: f64,
    pub last_retraining: Option<DateTime<Utc>>,
    pub next_retraining: Option<DateTime<Utc>>,
    /// Samples still needed before the volume threshold is met; zero once met
    pub samples_until_retrain: usize,
}
