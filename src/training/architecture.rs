//! Model architecture descriptions persisted into artifact manifests
//!
//! Both task heads share a small conv/pool backbone; regression ends in a
//! linear scalar, classification in a softmax over the fixed label set.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "layer", rename_all = "snake_case")]
pub enum LayerSpec {
    Conv2d {
        filters: usize,
        kernel: usize,
        activation: String,
    },
    MaxPool2d {
        pool: usize,
    },
    Flatten,
    Dense {
        units: usize,
        activation: String,
    },
    Dropout {
        rate: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArchitecture {
    pub layers: Vec<LayerSpec>,
}

fn backbone() -> Vec<LayerSpec> {
    vec![
        LayerSpec::Conv2d { filters: 32, kernel: 3, activation: "relu".into() },
        LayerSpec::MaxPool2d { pool: 2 },
        LayerSpec::Conv2d { filters: 64, kernel: 3, activation: "relu".into() },
        LayerSpec::MaxPool2d { pool: 2 },
        LayerSpec::Conv2d { filters: 128, kernel: 3, activation: "relu".into() },
        LayerSpec::MaxPool2d { pool: 2 },
        LayerSpec::Flatten,
        LayerSpec::Dense { units: 128, activation: "relu".into() },
        LayerSpec::Dropout { rate: 0.3 },
    ]
}

/// Stacked conv/pool blocks, dense layer, linear scalar output (MSE loss)
pub fn regression_head() -> ModelArchitecture {
    let mut layers = backbone();
    layers.push(LayerSpec::Dense { units: 1, activation: "linear".into() });
    ModelArchitecture { layers }
}

/// Same backbone, softmax over `classes` labels (categorical cross-entropy)
pub fn classification_head(classes: usize) -> ModelArchitecture {
    let mut layers = backbone();
    layers.push(LayerSpec::Dense { units: classes, activation: "softmax".into() });
    ModelArchitecture { layers }
}
