//! Errors from spawning and supervising external processes.

use std::time::Duration;

/// A process that could not be run to completion.
///
/// A nonzero exit is *not* an error: it is reported through
/// [`crate::ProcessResult::exit_code`] and the caller decides how to react.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("{program} not found in PATH")]
    NotFound { program: String },

    #[error("{program} did not finish within {}s", .limit.as_secs_f64())]
    TimedOut { program: String, limit: Duration },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    pub fn program(&self) -> &str {
        match self {
            ProcessError::NotFound { program }
            | ProcessError::TimedOut { program, .. }
            | ProcessError::Spawn { program, .. }
            | ProcessError::Io { program, .. } => program,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProcessError::NotFound { .. })
    }
}
