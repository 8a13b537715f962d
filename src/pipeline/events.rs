//! Append-only pipeline event log
//!
//! Newline-delimited JSON events in `<root>/mlops-pipeline.log`. Events are
//! only ever appended; the log is the durable trace of best-effort phase
//! execution.

use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PipelinePhase;
use crate::error::MlResult;

pub const EVENT_LOG_FILE: &str = "mlops-pipeline.log";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<PipelinePhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineEvent {
    pub fn new(event: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            event: event.to_string(),
            phase: None,
            detail: None,
            error: None,
        }
    }

    pub fn phase(mut self, phase: PipelinePhase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// JSONL writer for pipeline events
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            path: root.into().join(EVENT_LOG_FILE),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Append one event as a JSON line
    pub fn append(&self, event: &PipelineEvent) -> MlResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(event)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Read every event back, skipping unparseable lines
    pub fn read_all(&self) -> MlResult<Vec<PipelineEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(contents
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}
