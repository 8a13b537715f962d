//! Synthetic dataset generation
//!
//! When the sample store holds too few labeled images, training falls back
//! to randomly generated image/label pairs so a scheduled run always has
//! something to fit. Runs on synthetic data are marked as such end to end.

use ndarray::Array3;
use rand::Rng;

use super::TrainingTask;
use crate::samples::store::IMAGE_SIZE;

/// Targets for one training run, matching the task head
#[derive(Debug, Clone)]
pub enum Targets {
    /// Tread depth values, millimeters
    Regression(Vec<f32>),
    /// Class indices into the task's label set
    Classification(Vec<usize>),
}

impl Targets {
    pub fn len(&self) -> usize {
        match self {
            Targets::Regression(v) => v.len(),
            Targets::Classification(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An assembled set of input tensors plus targets
#[derive(Debug, Clone)]
pub struct Dataset {
    pub inputs: Vec<Array3<f32>>,
    pub targets: Targets,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// Generate `count` random image/label pairs for `task`
pub fn synthetic_dataset(task: TrainingTask, count: usize) -> Dataset {
    let mut rng = rand::rng();
    let size = IMAGE_SIZE as usize;

    let inputs: Vec<Array3<f32>> = (0..count)
        .map(|_| Array3::from_shape_fn((size, size, 3), |_| rng.random::<f32>()))
        .collect();

    let targets = if task.is_classifier() {
        let classes = task.class_count();
        Targets::Classification((0..count).map(|_| rng.random_range(0..classes)).collect())
    } else {
        Targets::Regression((0..count).map(|_| rng.random_range(0.0..10.0)).collect())
    };

    Dataset { inputs, targets }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_regression_targets_in_range() {
        let dataset = synthetic_dataset(TrainingTask::TreadDepth, 4);
        assert_eq!(dataset.len(), 4);
        match &dataset.targets {
            Targets::Regression(values) => {
                assert!(values.iter().all(|v| (0.0..=10.0).contains(v)));
            }
            other => panic!("expected regression targets, got {other:?}"),
        }
    }

    #[test]
    fn test_synthetic_classification_targets_in_bounds() {
        let dataset = synthetic_dataset(TrainingTask::Condition, 6);
        match &dataset.targets {
            Targets::Classification(indices) => {
                let classes = TrainingTask::Condition.class_count();
                assert!(indices.iter().all(|&i| i < classes));
            }
            other => panic!("expected classification targets, got {other:?}"),
        }
    }

    #[test]
    fn test_synthetic_tensor_shape() {
        let dataset = synthetic_dataset(TrainingTask::WearPattern, 1);
        assert_eq!(dataset.inputs[0].shape(), &[224, 224, 3]);
    }
}
