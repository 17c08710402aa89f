//! Run report: the serializable record of one pipeline invocation.

use crate::artifacts::CleanupSummary;
use crate::error::{ErrorClass, PipelineError, Stage};
use crate::policy;
use chrono::{DateTime, Utc};
use eqflow_process::ProcessResult;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestInfo {
    pub path: String,
    pub digest: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRecord {
    pub stage: Stage,
    #[serde(flatten)]
    pub result: ProcessResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub command: String,
    pub input: String,
    pub output: String,
    pub manifest: Option<ManifestInfo>,
    pub stages: Vec<StageRecord>,
    pub cleaned: Vec<String>,
    pub cleanup_failures: Vec<String>,
    pub exit_code: i32,
    pub error: Option<String>,
    pub error_class: Option<ErrorClass>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineReport {
    pub fn start(command: &str, input: &Path, output: &Path) -> Self {
        Self {
            command: command.to_string(),
            input: input.display().to_string(),
            output: output.display().to_string(),
            manifest: None,
            stages: Vec::new(),
            cleaned: Vec::new(),
            cleanup_failures: Vec::new(),
            exit_code: policy::EXIT_OK,
            error: None,
            error_class: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record(&mut self, stage: Stage, result: &ProcessResult) {
        self.stages.push(StageRecord {
            stage,
            result: result.clone(),
        });
    }

    pub fn ran(&self, stage: Stage) -> bool {
        self.stages.iter().any(|record| record.stage == stage)
    }

    pub fn success(&self) -> bool {
        self.exit_code == policy::EXIT_OK
    }

    pub(crate) fn conclude(
        &mut self,
        outcome: Result<(), PipelineError>,
        cleanup: CleanupSummary,
    ) {
        self.cleaned = cleanup
            .removed
            .iter()
            .map(|path| path.display().to_string())
            .collect();
        self.cleanup_failures = cleanup
            .failed
            .iter()
            .map(|(path, reason)| format!("{}: {reason}", path.display()))
            .collect();
        self.exit_code = policy::exit_code(&outcome);
        if let Err(err) = outcome {
            self.error_class = Some(err.class());
            self.error = Some(err.to_string());
        }
        self.finished_at = Some(Utc::now());
    }
}
