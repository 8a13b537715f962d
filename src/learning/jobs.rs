//! Retraining job records
//!
//! Append-only marker files under `<root>/retraining-jobs/`. A job record
//! describes one retraining invocation; no execution engine attaches to it,
//! it is a log entry rather than a live queue item.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::MlResult;

/// What prompted a retraining invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrainTrigger {
    /// Cooldown elapsed and the volume threshold was met
    Scheduled,
    /// High-confidence user feedback waived the cooldown
    ForcedFeedback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrainingJob {
    pub id: String,
    pub triggered_at: DateTime<Utc>,
    pub trigger: RetrainTrigger,
    pub status: String,
    pub expected_completion: DateTime<Utc>,
    /// Sample count at trigger time
    pub sample_count: usize,
}

impl RetrainingJob {
    pub fn new(trigger: RetrainTrigger, sample_count: usize) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            triggered_at: now,
            trigger,
            status: "requested".to_string(),
            expected_completion: now + Duration::minutes(30),
            sample_count,
        }
    }
}

/// Writer for the per-job marker files
#[derive(Debug, Clone)]
pub struct RetrainingJobLog {
    dir: PathBuf,
}

impl RetrainingJobLog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            dir: root.into().join("retraining-jobs"),
        }
    }

    /// Persist one job record
    pub fn record(&self, job: &RetrainingJob) -> MlResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.json", job.id));
        std::fs::write(&path, serde_json::to_string_pretty(job)?)?;
        info!(job_id = %job.id, trigger = ?job.trigger, "recorded retraining job");
        Ok(())
    }

    /// Load all recorded jobs, most recent last
    pub fn list(&self) -> MlResult<Vec<RetrainingJob>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut jobs = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                let contents = std::fs::read_to_string(&path)?;
                if let Ok(job) = serde_json::from_str::<RetrainingJob>(&contents) {
                    jobs.push(job);
                }
            }
        }
        jobs.sort_by_key(|j| j.triggered_at);
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_list_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let log = RetrainingJobLog::new(dir.path());
        assert!(log.list().unwrap().is_empty());

        log.record(&RetrainingJob::new(RetrainTrigger::Scheduled, 50))
            .unwrap();
        log.record(&RetrainingJob::new(RetrainTrigger::ForcedFeedback, 61))
            .unwrap();

        let jobs = log.list().unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.status == "requested"));
        assert!(jobs.iter().all(|j| j.expected_completion > j.triggered_at));
    }
}
