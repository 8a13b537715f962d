//! TireLearn - Continuous Learning Core
//!
//! The self-improving backend behind tire condition analysis:
//! - Sample store: labeled tire photos collected from the app
//! - Inference service: model-endpoint delegation with a mock fallback
//! - Continuous learning coordinator: capture, feedback and the retraining
//!   trigger
//! - Training pipeline and evaluation service over persisted artifacts
//! - MLOps pipeline orchestrator with drift monitoring
//!
//! # Example
//!
//! ```ignore
//! use tirelearn::config::Config;
//! use tirelearn::server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     server::start(config, None, None).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod samples;
pub mod inference;
pub mod training;
pub mod evaluation;
pub mod learning;
pub mod pipeline;
pub mod server;
pub mod cli;

// Re-export commonly used types for convenience
pub use error::{MlError, MlResult};
pub use inference::{InferenceService, TireAnalysisResult};
pub use learning::{ContinuousLearningCoordinator, LearningStats};
pub use pipeline::MlOpsPipeline;
pub use samples::{store::SampleStore, TrainingSample};
pub use training::{TrainingPipeline, TrainingTask};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
