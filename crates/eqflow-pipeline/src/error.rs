//! Pipeline failure taxonomy.

use eqflow_manifest::ManifestError;
use eqflow_process::ProcessError;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Pipeline stage an external process or check belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Preflight,
    Manifest,
    /// Build-manifest interpreter materializing the artifact.
    Interpret,
    /// Mapping/optimization backend.
    Backend,
    /// Producer of the chained variant.
    Frontend,
    /// Consumer of the chained variant.
    Transform,
    /// Equivalence verifier.
    Verify,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Preflight => "preflight",
            Stage::Manifest => "manifest",
            Stage::Interpret => "interpret",
            Stage::Backend => "backend",
            Stage::Frontend => "frontend",
            Stage::Transform => "transform",
            Stage::Verify => "verify",
        }
    }

    pub fn class(self) -> ErrorClass {
        match self {
            Stage::Preflight | Stage::Manifest => ErrorClass::Preflight,
            Stage::Interpret => ErrorClass::ManifestInterpretation,
            Stage::Backend | Stage::Frontend | Stage::Transform => ErrorClass::Backend,
            Stage::Verify => ErrorClass::Verification,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse failure class reported alongside the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Preflight,
    ManifestInterpretation,
    Backend,
    Verification,
    Timeout,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("preflight stage failed: input file not found: {path}")]
    InputMissing { path: String },

    #[error("{stage} stage failed: {program} not found in PATH")]
    ToolMissing { stage: Stage, program: String },

    #[error("manifest stage failed: {0}")]
    Manifest(#[from] ManifestError),

    #[error("{stage} stage failed: {program} exited with code {code}")]
    StageFailed {
        stage: Stage,
        program: String,
        code: i32,
    },

    #[error("{stage} stage failed: {program} timed out after {}s", .limit.as_secs_f64())]
    Timeout {
        stage: Stage,
        program: String,
        limit: Duration,
    },

    #[error("{stage} stage failed: {source}")]
    Process {
        stage: Stage,
        #[source]
        source: ProcessError,
    },
}

impl PipelineError {
    /// Classify a process that could not be run to completion.
    pub fn from_process(stage: Stage, err: ProcessError) -> Self {
        match err {
            ProcessError::NotFound { program } => PipelineError::ToolMissing { stage, program },
            ProcessError::TimedOut { program, limit } => PipelineError::Timeout {
                stage,
                program,
                limit,
            },
            source => PipelineError::Process { stage, source },
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::InputMissing { .. } => Stage::Preflight,
            PipelineError::Manifest(ManifestError::InputMissing { .. }) => Stage::Preflight,
            PipelineError::Manifest(_) => Stage::Manifest,
            PipelineError::ToolMissing { stage, .. }
            | PipelineError::StageFailed { stage, .. }
            | PipelineError::Timeout { stage, .. }
            | PipelineError::Process { stage, .. } => *stage,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            PipelineError::Timeout { .. } => ErrorClass::Timeout,
            other => other.stage().class(),
        }
    }
}
