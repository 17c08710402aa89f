//! Equivalence verifier invocation.
//!
//! The verifier receives absolute paths to the original and transformed
//! designs and runs from the directory containing the original, so it can
//! resolve both files regardless of the orchestrator's working directory.

use crate::error::{PipelineError, Stage};
use eqflow_process::ProcessSpec;
use std::path::{Path, PathBuf};

/// Build the verifier invocation for `{original, transformed}`.
pub fn verification_spec(
    program: &str,
    original: &Path,
    transformed: &Path,
) -> Result<ProcessSpec, PipelineError> {
    let original = absolute(original)?;
    let transformed = absolute(transformed)?;
    let cwd = original
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));

    Ok(ProcessSpec::new(program)
        .arg(original.into_os_string())
        .arg(transformed.into_os_string())
        .current_dir(cwd))
}

fn absolute(path: &Path) -> Result<PathBuf, PipelineError> {
    let resolved = match std::fs::canonicalize(path) {
        Ok(path) => Ok(path),
        Err(_) => std::path::absolute(path),
    };
    resolved.map_err(|source| PipelineError::Process {
        stage: Stage::Verify,
        source: eqflow_process::ProcessError::Io {
            program: path.display().to_string(),
            source,
        },
    })
}
