//! Continuous learning coordinator
//!
//! Ties the capture surface to the training machinery: photos arriving from
//! the app become labeled training samples, user feedback refines them, and
//! a volume-plus-cooldown trigger decides when the pipeline retrains.

pub mod jobs;
pub mod stats;

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::config::RetrainingConfig;
use crate::error::{MlError, MlResult};
use crate::inference::InferenceService;
use crate::pipeline::MlOpsPipeline;
use crate::samples::store::SampleStore;
use crate::samples::{LabelCorrections, SampleMetadata, TrainingSample};

pub use jobs::{RetrainTrigger, RetrainingJob, RetrainingJobLog};
pub use stats::LearningStats;

/// Orchestrates sample collection, feedback, and the retraining schedule.
///
/// Retraining decisions are made inline (cheap file counts) but the training
/// cycle itself always runs in the background, so neither photo capture nor
/// feedback submission ever waits on model training.
pub struct ContinuousLearningCoordinator {
    store: SampleStore,
    inference: Arc<InferenceService>,
    pipeline: Arc<MlOpsPipeline>,
    jobs: RetrainingJobLog,
    retraining: RetrainingConfig,
    last_retrain: Mutex<Option<DateTime<Utc>>>,
}

impl ContinuousLearningCoordinator {
    pub fn new(
        store: SampleStore,
        inference: Arc<InferenceService>,
        pipeline: Arc<MlOpsPipeline>,
        retraining: RetrainingConfig,
    ) -> Self {
        let jobs = RetrainingJobLog::new(store.root());
        Self {
            store,
            inference,
            pipeline,
            jobs,
            retraining,
            last_retrain: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    pub fn jobs(&self) -> &RetrainingJobLog {
        &self.jobs
    }

    /// Ingest a freshly captured tire photo as a training sample.
    ///
    /// The image is resized and stored, then analyzed to produce initial
    /// labels. Storage and analysis failures for the image are tolerated:
    /// the sample is persisted with whatever labels could be produced and
    /// the capture still succeeds. The final step is a retraining check;
    /// when that fires, training runs in the background.
    pub async fn on_photo_captured(
        self: &Arc<Self>,
        tire_id: &str,
        vehicle_id: Option<&str>,
        raw: &[u8],
        context: SampleMetadata,
    ) -> MlResult<TrainingSample> {
        let mut sample = TrainingSample::new(tire_id, vehicle_id, Default::default());
        sample.image_path = self.store.image_path(&sample.id);
        sample.metadata = context;

        if let Err(err) = self.store.write_image(&sample.id, raw) {
            warn!(sample_id = %sample.id, error = %err, "image storage failed, keeping sample without image");
        }

        let filename = format!("{}.jpg", sample.id);
        match self.inference.analyze(&filename, raw).await {
            Ok(analysis) => {
                sample.labels.tread_depth = Some(analysis.tread_depth.value_mm);
                sample.labels.condition = Some(analysis.condition.label);
                sample.labels.wear_pattern = Some(analysis.wear_pattern.pattern.clone());
                sample.labels.confidence = Some(analysis.condition.confidence);
            }
            Err(err) => {
                warn!(sample_id = %sample.id, error = %err, "initial analysis failed, sample stored unlabeled");
            }
        }

        self.store.write(&sample)?;
        debug!(sample_id = %sample.id, tire_id = %tire_id, "captured training sample");

        if let Err(err) = self.check_retraining_trigger(false).await {
            warn!(error = %err, "retraining check failed after capture");
        }

        Ok(sample)
    }

    /// Apply user feedback to a stored sample.
    ///
    /// Ratings outside 1..=5 are rejected before any file is touched.
    /// Corrections merge over the existing labels and mark the sample as
    /// expert-validated. High-confidence feedback (rating >= 4, or any
    /// correction) forces a retraining check that waives the cooldown; the
    /// volume threshold still applies.
    pub async fn on_user_feedback(
        self: &Arc<Self>,
        tire_id: &str,
        sample_id: &str,
        rating: u8,
        corrections: Option<LabelCorrections>,
    ) -> MlResult<TrainingSample> {
        if !(1..=5).contains(&rating) {
            return Err(MlError::Validation(format!(
                "rating must be between 1 and 5, got {rating}"
            )));
        }

        let existing = self.store.read(sample_id)?;
        if existing.tire_id != tire_id {
            return Err(MlError::Validation(format!(
                "sample {sample_id} does not belong to tire {tire_id}"
            )));
        }

        let has_corrections = corrections
            .as_ref()
            .map(|c| !c.is_empty())
            .unwrap_or(false);
        let updated = self.store.update(sample_id, |sample| {
            sample.user_rating = Some(rating);
            if let Some(corrections) = &corrections {
                sample.apply_corrections(corrections);
            }
        })?;
        info!(sample_id = %sample_id, rating, has_corrections, "recorded user feedback");

        if rating >= 4 || has_corrections {
            if let Err(err) = self.check_retraining_trigger(true).await {
                warn!(error = %err, "forced retraining check failed after feedback");
            }
        }

        Ok(updated)
    }

    /// Decide whether to retrain, and kick the pipeline off if so.
    ///
    /// Both gates must pass: the sample count must meet the configured
    /// volume threshold, and the cooldown since the last retrain must have
    /// elapsed. `force` waives only the cooldown, never the volume floor.
    /// Returns whether a retraining cycle was started; the cycle itself
    /// runs in the background.
    pub async fn check_retraining_trigger(self: &Arc<Self>, force: bool) -> MlResult<bool> {
        let count = self.store.count()?;
        let min_samples = self.retraining.min_samples;
        if count < min_samples {
            debug!(count, min_samples, "volume threshold unmet, not retraining");
            return Ok(false);
        }

        if !force {
            let last = *self.last_retrain.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(last) = last {
                let elapsed = Utc::now() - last;
                if elapsed < self.cooldown() {
                    debug!(
                        elapsed_hours = elapsed.num_hours(),
                        "cooldown active, not retraining"
                    );
                    return Ok(false);
                }
            }
        }

        let trigger = if force {
            RetrainTrigger::ForcedFeedback
        } else {
            RetrainTrigger::Scheduled
        };
        let job = RetrainingJob::new(trigger, count);
        self.jobs.record(&job)?;
        *self.last_retrain.lock().unwrap_or_else(|e| e.into_inner()) = Some(job.triggered_at);

        info!(job_id = %job.id, samples = count, force, "retraining triggered");
        let pipeline = Arc::clone(&self.pipeline);
        tokio::spawn(async move {
            let results = pipeline.run_training_cycle().await;
            let failures = results.iter().filter(|r| r.is_err()).count();
            if failures > 0 {
                warn!(failures, "background retraining cycle finished with failures");
            }
        });

        Ok(true)
    }

    /// Aggregate store contents into reporting stats.
    ///
    /// Tolerates an empty store: all counts come back zero rather than an
    /// error.
    pub fn get_learning_stats(&self) -> MlResult<LearningStats> {
        let samples = self.store.load_all()?;
        let total_images = self.store.image_count()?;

        let rated: Vec<u8> = samples.iter().filter_map(|s| s.user_rating).collect();
        let average_user_rating = if rated.is_empty() {
            0.0
        } else {
            rated.iter().map(|r| *r as f64).sum::<f64>() / rated.len() as f64
        };

        let last_retraining = *self.last_retrain.lock().unwrap_or_else(|e| e.into_inner());
        let next_retraining = last_retraining.map(|t| t + self.cooldown());

        Ok(LearningStats {
            total_samples: samples.len(),
            total_images,
            user_feedback_count: rated.len(),
            expert_validations: samples.iter().filter(|s| s.expert_validation).count(),
            average_user_rating,
            last_retraining,
            next_retraining,
            samples_until_retrain: self.retraining.min_samples.saturating_sub(samples.len()),
        })
    }

    fn cooldown(&self) -> Duration {
        Duration::hours(self.retraining.cooldown_hours)
    }
}
