//! MLOps pipeline orchestrator
//!
//! Sequences collecting, labeling, training, evaluating, deploying and
//! monitoring as a best-effort control loop: each phase's failure is logged
//! to the append-only event log and does not abort later phases. Partial
//! pipeline completion is more valuable here than an all-or-nothing
//! transaction. Runs are serialized behind an advisory in-process flag so
//! the retraining trigger and the drift loop never train concurrently.

pub mod events;

pub use events::{EventLog, PipelineEvent};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::MonitoringConfig;
use crate::evaluation::EvaluationService;
use crate::inference::InferenceService;
use crate::samples::SampleStore;
use crate::training::TrainingPipeline;

/// Phases of one full pipeline run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Collecting,
    Labeling,
    Training,
    Evaluating,
    Deploying,
    Monitoring,
}

impl PipelinePhase {
    pub const ALL: [PipelinePhase; 6] = [
        PipelinePhase::Collecting,
        PipelinePhase::Labeling,
        PipelinePhase::Training,
        PipelinePhase::Evaluating,
        PipelinePhase::Deploying,
        PipelinePhase::Monitoring,
    ];
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelinePhase::Collecting => "collecting",
            PipelinePhase::Labeling => "labeling",
            PipelinePhase::Training => "training",
            PipelinePhase::Evaluating => "evaluating",
            PipelinePhase::Deploying => "deploying",
            PipelinePhase::Monitoring => "monitoring",
        };
        write!(f, "{name}")
    }
}

/// Successful completion of one phase
#[derive(Debug, Clone)]
pub struct PhaseOutcome {
    pub phase: PipelinePhase,
    pub detail: String,
}

/// Failure of one phase; later phases still run
#[derive(Debug, Clone, thiserror::Error)]
#[error("phase {phase} failed: {message}")]
pub struct PhaseError {
    pub phase: PipelinePhase,
    pub message: String,
}

pub type PhaseResult = Result<PhaseOutcome, PhaseError>;

/// Orchestrates the train/evaluate/deploy/monitor control loop
pub struct MlOpsPipeline {
    store: SampleStore,
    training: TrainingPipeline,
    evaluation: EvaluationService,
    inference: Arc<InferenceService>,
    monitoring: MonitoringConfig,
    events: EventLog,
    is_running: AtomicBool,
    monitor_started: AtomicBool,
    last_accuracy: Mutex<Option<f64>>,
}

impl MlOpsPipeline {
    pub fn new(
        store: SampleStore,
        training: TrainingPipeline,
        evaluation: EvaluationService,
        inference: Arc<InferenceService>,
        monitoring: MonitoringConfig,
    ) -> Self {
        let events = EventLog::new(store.root());
        Self {
            store,
            training,
            evaluation,
            inference,
            monitoring,
            events,
            is_running: AtomicBool::new(false),
            monitor_started: AtomicBool::new(false),
            last_accuracy: Mutex::new(None),
        }
    }

    pub fn event_log(&self) -> &EventLog {
        &self.events
    }

    /// Advisory flag; not enforced against external processes
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Execute all six phases in order. Every phase gets an entry in the
    /// returned report even when it fails. Returns an empty report when
    /// another run already holds the advisory flag.
    pub async fn run_full_pipeline(self: &Arc<Self>) -> Vec<PhaseResult> {
        if self
            .is_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("pipeline already running, skipping this invocation");
            return Vec::new();
        }

        self.log_event(PipelineEvent::new("pipeline_started"));
        let mut results = Vec::with_capacity(PipelinePhase::ALL.len());
        for phase in PipelinePhase::ALL {
            let result = self.run_phase(phase).await;
            match &result {
                Ok(outcome) => self.log_event(
                    PipelineEvent::new("phase_completed")
                        .phase(phase)
                        .detail(outcome.detail.clone()),
                ),
                Err(e) => {
                    warn!("pipeline phase {phase} failed, continuing: {}", e.message);
                    self.log_event(
                        PipelineEvent::new("phase_failed")
                            .phase(phase)
                            .error(e.message.clone()),
                    );
                }
            }
            results.push(result);
        }
        self.log_event(PipelineEvent::new("pipeline_finished"));

        self.is_running.store(false, Ordering::SeqCst);
        results
    }

    /// The retrain cycle used by the trigger check and the drift loop:
    /// training, evaluating and deploying only.
    pub async fn run_training_cycle(self: &Arc<Self>) -> Vec<PhaseResult> {
        if self
            .is_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("pipeline busy, retraining cycle skipped");
            return Vec::new();
        }

        self.log_event(PipelineEvent::new("retraining_cycle_started"));
        let mut results = Vec::new();
        for phase in [
            PipelinePhase::Training,
            PipelinePhase::Evaluating,
            PipelinePhase::Deploying,
        ] {
            let result = self.run_phase(phase).await;
            if let Err(e) = &result {
                warn!("retraining phase {phase} failed, continuing: {}", e.message);
                self.log_event(
                    PipelineEvent::new("phase_failed")
                        .phase(phase)
                        .error(e.message.clone()),
                );
            }
            results.push(result);
        }
        self.log_event(PipelineEvent::new("retraining_cycle_finished"));

        self.is_running.store(false, Ordering::SeqCst);
        results
    }

    async fn run_phase(self: &Arc<Self>, phase: PipelinePhase) -> PhaseResult {
        info!("pipeline phase: {phase}");
        match phase {
            PipelinePhase::Collecting => self.phase_collecting(),
            PipelinePhase::Labeling => self.phase_labeling(),
            PipelinePhase::Training => self.phase_training().await,
            PipelinePhase::Evaluating => self.phase_evaluating().await,
            PipelinePhase::Deploying => self.phase_deploying().await,
            PipelinePhase::Monitoring => self.phase_monitoring(),
        }
    }

    fn phase_collecting(&self) -> PhaseResult {
        let count = self.store.count().map_err(|e| PhaseError {
            phase: PipelinePhase::Collecting,
            message: e.to_string(),
        })?;
        Ok(PhaseOutcome {
            phase: PipelinePhase::Collecting,
            detail: format!("{count} samples available"),
        })
    }

    fn phase_labeling(&self) -> PhaseResult {
        let samples = self.store.load_all().map_err(|e| PhaseError {
            phase: PipelinePhase::Labeling,
            message: e.to_string(),
        })?;
        let labeled = samples.iter().filter(|s| !s.labels.is_empty()).count();
        let validated = samples.iter().filter(|s| s.expert_validation).count();
        Ok(PhaseOutcome {
            phase: PipelinePhase::Labeling,
            detail: format!(
                "{labeled}/{} samples labeled, {validated} expert validated",
                samples.len()
            ),
        })
    }

    async fn phase_training(&self) -> PhaseResult {
        let reports = self.training.train_all().await;
        let mut trained = Vec::new();
        let mut errors = Vec::new();
        for report in reports {
            match report {
                Ok(r) => trained.push(format!(
                    "{} ({} data, loss {:.3})",
                    r.model_name, r.data_source, r.final_loss
                )),
                Err(e) => errors.push(e.to_string()),
            }
        }
        if !errors.is_empty() {
            return Err(PhaseError {
                phase: PipelinePhase::Training,
                message: errors.join("; "),
            });
        }
        Ok(PhaseOutcome {
            phase: PipelinePhase::Training,
            detail: trained.join(", "),
        })
    }

    async fn phase_evaluating(&self) -> PhaseResult {
        let report = self.evaluation.evaluate_all().await.map_err(|e| PhaseError {
            phase: PipelinePhase::Evaluating,
            message: e.to_string(),
        })?;
        *self
            .last_accuracy
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(report.summary.average_accuracy);
        Ok(PhaseOutcome {
            phase: PipelinePhase::Evaluating,
            detail: format!(
                "average accuracy {:.3} over {} models",
                report.summary.average_accuracy,
                report.models.len()
            ),
        })
    }

    /// Deployment rebuilds the inference service's model registry wholesale.
    /// Nothing loaded yet is not an error.
    async fn phase_deploying(&self) -> PhaseResult {
        let count = self.inference.reload_models().await.map_err(|e| PhaseError {
            phase: PipelinePhase::Deploying,
            message: e.to_string(),
        })?;
        Ok(PhaseOutcome {
            phase: PipelinePhase::Deploying,
            detail: format!("{count} models deployed"),
        })
    }

    fn phase_monitoring(self: &Arc<Self>) -> PhaseResult {
        let started = self.start_monitoring();
        Ok(PhaseOutcome {
            phase: PipelinePhase::Monitoring,
            detail: if started {
                format!(
                    "drift monitoring active, every {}h",
                    self.monitoring.interval_hours
                )
            } else {
                "drift monitoring already active".to_string()
            },
        })
    }

    /// Install the recurring drift-evaluation timer. Idempotent; returns
    /// whether this call started the loop.
    pub fn start_monitoring(self: &Arc<Self>) -> bool {
        if self
            .monitor_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let pipeline = Arc::clone(self);
        let period = Duration::from_secs(self.monitoring.interval_hours * 3600);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // immediate first tick
            loop {
                interval.tick().await;
                if let Err(e) = pipeline.check_drift_once().await {
                    warn!("drift check failed: {e}");
                }
            }
        });
        true
    }

    /// One drift evaluation: re-score the models and re-trigger the
    /// training cycle when accuracy dropped beyond the threshold.
    /// Returns whether a retrain was triggered.
    pub async fn check_drift_once(self: &Arc<Self>) -> crate::error::MlResult<bool> {
        let report = self.evaluation.evaluate_all().await?;
        let current = report.summary.average_accuracy;
        let previous = self
            .last_accuracy
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(current);

        let Some(previous) = previous else {
            return Ok(false);
        };

        if accuracy_dropped(previous, current, self.monitoring.drift_threshold) {
            info!(
                previous,
                current, "model drift detected, re-triggering training cycle"
            );
            self.log_event(
                PipelineEvent::new("drift_detected")
                    .detail(format!("accuracy {previous:.3} -> {current:.3}")),
            );
            self.run_training_cycle().await;
            return Ok(true);
        }
        Ok(false)
    }

    fn log_event(&self, event: PipelineEvent) {
        if let Err(e) = self.events.append(&event) {
            warn!("failed to append pipeline event: {e}");
        }
    }
}

/// Drift predicate: has accuracy dropped by more than `threshold`?
///
/// The comparison carries a small tolerance so a drop of exactly the
/// threshold, computed through f64 subtraction, stays exclusive.
pub fn accuracy_dropped(previous: f64, current: f64, threshold: f64) -> bool {
    previous - current > threshold + 1e-9
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EvaluationConfig, InferenceConfig, TrainingConfig};

    fn build_pipeline(root: &std::path::Path) -> Arc<MlOpsPipeline> {
        let store = SampleStore::open(root).unwrap();
        let models_dir = root.join("models");
        let training = TrainingPipeline::new(
            store.clone(),
            models_dir.clone(),
            TrainingConfig {
                epochs: 2,
                synthetic_samples: 3,
                ..Default::default()
            },
        );
        let evaluation = EvaluationService::new(
            store.clone(),
            models_dir.clone(),
            root.join("results"),
            EvaluationConfig::default(),
        );
        let inference = Arc::new(InferenceService::new(InferenceConfig::default(), models_dir));
        Arc::new(MlOpsPipeline::new(
            store,
            training,
            evaluation,
            inference,
            MonitoringConfig::default(),
        ))
    }

    #[test]
    fn test_accuracy_dropped_threshold() {
        assert!(accuracy_dropped(0.90, 0.85, 0.02));
        assert!(!accuracy_dropped(0.90, 0.89, 0.02));
        assert!(!accuracy_dropped(0.85, 0.90, 0.02));
        // A drop of exactly the threshold does not trigger, even though
        // 0.90 - 0.88 rounds just above 0.02 in f64
        assert!(!accuracy_dropped(0.90, 0.88, 0.02));
        assert!(accuracy_dropped(0.90, 0.8799, 0.02));
    }

    #[tokio::test]
    async fn test_full_pipeline_reports_every_phase() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = build_pipeline(dir.path());

        let results = pipeline.run_full_pipeline().await;
        assert_eq!(results.len(), PipelinePhase::ALL.len());
        for (result, phase) in results.iter().zip(PipelinePhase::ALL) {
            let reported = match result {
                Ok(outcome) => outcome.phase,
                Err(e) => e.phase,
            };
            assert_eq!(reported, phase);
        }
        assert!(!pipeline.is_running());
    }

    #[tokio::test]
    async fn test_failed_training_does_not_abort_later_phases() {
        let dir = tempfile::tempdir().unwrap();
        let store = SampleStore::open(dir.path()).unwrap();
        let models_dir = dir.path().join("models");
        // Empty store + synthetic disabled makes the training phase fail
        let training = TrainingPipeline::new(
            store.clone(),
            models_dir.clone(),
            TrainingConfig {
                synthetic_enabled: false,
                ..Default::default()
            },
        );
        let evaluation = EvaluationService::new(
            store.clone(),
            models_dir.clone(),
            dir.path().join("results"),
            EvaluationConfig::default(),
        );
        let inference = Arc::new(InferenceService::new(InferenceConfig::default(), models_dir));
        let pipeline = Arc::new(MlOpsPipeline::new(
            store,
            training,
            evaluation,
            inference,
            MonitoringConfig::default(),
        ));

        let results = pipeline.run_full_pipeline().await;
        assert_eq!(results.len(), 6);
        assert!(results[2].is_err(), "training phase should fail");
        assert!(results[3].is_ok(), "evaluation still runs");
        assert!(results[4].is_ok(), "deployment still runs");

        let events = pipeline.event_log().read_all().unwrap();
        assert!(events.iter().any(|e| e.event == "phase_failed"
            && e.phase == Some(PipelinePhase::Training)));
        assert!(events.iter().any(|e| e.event == "pipeline_finished"));
    }

    #[tokio::test]
    async fn test_event_log_grows_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = build_pipeline(dir.path());

        pipeline.run_full_pipeline().await;
        let first = pipeline.event_log().read_all().unwrap().len();
        pipeline.run_full_pipeline().await;
        let second = pipeline.event_log().read_all().unwrap().len();
        assert!(second > first, "log must be append-only across runs");
    }

    #[tokio::test]
    async fn test_drift_check_needs_a_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = build_pipeline(dir.path());
        // No prior accuracy recorded: first check only establishes baseline
        assert!(!pipeline.check_drift_once().await.unwrap());
    }
}
