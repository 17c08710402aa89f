//! Exit-code policy.
//!
//! Stages run in precedence order and the pipeline stops at the first
//! failure, so the reported code is always that of the highest-precedence
//! failure:
//!
//! 1. input file missing: [`EXIT_PREFLIGHT`]
//! 2. required tool missing: [`EXIT_PREFLIGHT`]
//! 3. manifest interpreter nonzero: its code
//! 4. backend nonzero: its code (after cleanup)
//! 5. verifier nonzero: its code (after cleanup)
//! 6. otherwise [`EXIT_OK`]
//!
//! Timeouts report [`EXIT_TIMEOUT`].

use crate::error::PipelineError;

pub const EXIT_OK: i32 = 0;
pub const EXIT_PREFLIGHT: i32 = 1;
pub const EXIT_TIMEOUT: i32 = 124;

impl PipelineError {
    pub fn exit_code(&self) -> i32 {
        match self {
            // A zero here would report success for a failed stage.
            PipelineError::StageFailed { code, .. } if *code != EXIT_OK => *code,
            PipelineError::StageFailed { .. } => EXIT_PREFLIGHT,
            PipelineError::Timeout { .. } => EXIT_TIMEOUT,
            PipelineError::InputMissing { .. }
            | PipelineError::ToolMissing { .. }
            | PipelineError::Manifest(_)
            | PipelineError::Process { .. } => EXIT_PREFLIGHT,
        }
    }
}

/// Final process exit code for a pipeline outcome.
pub fn exit_code(outcome: &Result<(), PipelineError>) -> i32 {
    match outcome {
        Ok(()) => EXIT_OK,
        Err(err) => err.exit_code(),
    }
}
