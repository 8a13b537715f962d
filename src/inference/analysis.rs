//! Analysis result types and the mock fallback generator
//!
//! The mock path is a documented design choice, not a bug: the service must
//! always return a syntactically valid analysis even with no trained model,
//! so downstream persistence and KPI code never special-cases "no model".

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::samples::TireCondition;

/// Tread depth is always reported inside this range, millimeters
pub const TREAD_DEPTH_RANGE_MM: (f64, f64) = (0.0, 10.0);

/// Fixed wear pattern vocabulary
pub const WEAR_PATTERNS: [&str; 5] = ["even", "center", "edge", "cupping", "patchy"];

/// Which path produced an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    /// Delegated to a reachable model endpoint
    Model,
    /// Randomized fallback with a deterministic shape
    #[default]
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreadDepthResult {
    /// Clamped to [0, 10] regardless of raw model output
    pub value_mm: f64,
    pub unit: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionResult {
    pub label: TireCondition,
    /// Normalized score of the argmax label
    pub confidence: f64,
    /// Per-label score distribution, sums to ~1.0
    pub scores: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WearPatternResult {
    pub pattern: String,
    pub confidence: f64,
    pub severity: String,
}

/// Full image-in/analysis-out prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TireAnalysisResult {
    pub tread_depth: TreadDepthResult,
    pub condition: ConditionResult,
    pub wear_pattern: WearPatternResult,
    #[serde(default)]
    pub source: AnalysisSource,
    pub analyzed_at: DateTime<Utc>,
}

impl TireAnalysisResult {
    /// Clamp numeric fields into their contractual ranges
    pub fn normalize(mut self) -> Self {
        let (lo, hi) = TREAD_DEPTH_RANGE_MM;
        self.tread_depth.value_mm = self.tread_depth.value_mm.clamp(lo, hi);
        self.tread_depth.confidence = self.tread_depth.confidence.clamp(0.0, 1.0);
        self.condition.confidence = self.condition.confidence.clamp(0.0, 1.0);
        self.wear_pattern.confidence = self.wear_pattern.confidence.clamp(0.0, 1.0);
        self
    }
}

/// Produce a randomized mock analysis with a valid shape
pub fn mock_analysis() -> TireAnalysisResult {
    let mut rng = rand::rng();

    // Random positive weights, softmax-style normalized to sum 1.0
    let raw: Vec<f64> = TireCondition::ALL
        .iter()
        .map(|_| rng.random_range(0.05..1.0))
        .collect();
    let total: f64 = raw.iter().sum();
    let mut scores = HashMap::new();
    let mut best = (TireCondition::Good, 0.0);
    for (condition, weight) in TireCondition::ALL.iter().zip(&raw) {
        let score = weight / total;
        scores.insert(condition.as_str().to_string(), score);
        if score > best.1 {
            best = (*condition, score);
        }
    }

    let pattern = WEAR_PATTERNS[rng.random_range(0..WEAR_PATTERNS.len())];
    let severity = match rng.random_range(0..3) {
        0 => "low",
        1 => "moderate",
        _ => "high",
    };

    TireAnalysisResult {
        tread_depth: TreadDepthResult {
            value_mm: rng.random_range(1.5..8.5),
            unit: "mm".to_string(),
            confidence: rng.random_range(0.7..0.95),
        },
        condition: ConditionResult {
            label: best.0,
            confidence: best.1,
            scores,
        },
        wear_pattern: WearPatternResult {
            pattern: pattern.to_string(),
            confidence: rng.random_range(0.6..0.9),
            severity: severity.to_string(),
        },
        source: AnalysisSource::Mock,
        analyzed_at: Utc::now(),
    }
    .normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_scores_sum_to_one() {
        for _ in 0..50 {
            let analysis = mock_analysis();
            let sum: f64 = analysis.condition.scores.values().sum();
            assert!((sum - 1.0).abs() < 1e-6, "scores summed to {sum}");
            assert_eq!(analysis.condition.scores.len(), TireCondition::ALL.len());
        }
    }

    #[test]
    fn test_mock_tread_depth_in_range() {
        for _ in 0..50 {
            let analysis = mock_analysis();
            assert!(analysis.tread_depth.value_mm >= 0.0);
            assert!(analysis.tread_depth.value_mm <= 10.0);
            assert_eq!(analysis.tread_depth.unit, "mm");
        }
    }

    #[test]
    fn test_mock_confidences_in_unit_interval() {
        let analysis = mock_analysis();
        for c in [
            analysis.tread_depth.confidence,
            analysis.condition.confidence,
            analysis.wear_pattern.confidence,
        ] {
            assert!((0.0..=1.0).contains(&c));
        }
        assert_eq!(analysis.source, AnalysisSource::Mock);
    }

    #[test]
    fn test_normalize_clamps_out_of_range_depth() {
        let mut analysis = mock_analysis();
        analysis.tread_depth.value_mm = 37.5;
        let normalized = analysis.normalize();
        assert!((normalized.tread_depth.value_mm - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_argmax_confidence_matches_scores() {
        let analysis = mock_analysis();
        let max = analysis
            .condition
            .scores
            .values()
            .cloned()
            .fold(f64::MIN, f64::max);
        assert!((analysis.condition.confidence - max).abs() < 1e-9);
    }
}
