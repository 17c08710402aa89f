//! Pipeline executor core: per-run state and the stage runner shared by
//! every variant.

use crate::artifacts::ArtifactSet;
use crate::config::Toolchain;
use crate::error::{PipelineError, Stage};
use crate::report::{ManifestInfo, PipelineReport};
use crate::verify::verification_spec;
use eqflow_manifest::BuildManifest;
use eqflow_process::{ProcessResult, ProcessRunner, ProcessSpec, SearchPath};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Input/output pair plus pass-through options, for variants that do not
/// generate a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub options: Vec<String>,
}

impl TransformRequest {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            options: Vec::new(),
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

/// State of one invocation. Owns the run's intermediates; [`PipelineRun::finish`]
/// releases them exactly once whatever the outcome.
#[derive(Debug)]
pub struct PipelineRun {
    artifacts: ArtifactSet,
    report: PipelineReport,
}

impl PipelineRun {
    pub fn start(command: &str, input: &Path, output: &Path) -> Self {
        tracing::info!(
            command,
            input = %input.display(),
            output = %output.display(),
            "pipeline started"
        );
        Self {
            artifacts: ArtifactSet::new([input, output]),
            report: PipelineReport::start(command, input, output),
        }
    }

    pub fn track(&mut self, path: impl Into<PathBuf>) {
        self.artifacts.track(path);
    }

    /// Record the manifest and take ownership of its sidecar file.
    pub fn adopt_manifest(&mut self, manifest: &BuildManifest) {
        self.track(manifest.path.clone());
        self.report.manifest = Some(ManifestInfo {
            path: manifest.path.display().to_string(),
            digest: manifest.digest(),
        });
    }

    pub fn record(&mut self, stage: Stage, result: &ProcessResult) {
        self.report.record(stage, result);
    }

    pub fn finish(mut self, outcome: Result<(), PipelineError>) -> PipelineReport {
        let cleanup = self.artifacts.release();
        match &outcome {
            Ok(()) => tracing::info!(command = %self.report.command, "pipeline succeeded"),
            Err(err) => tracing::info!(
                command = %self.report.command,
                exit_code = err.exit_code(),
                error = %err,
                "pipeline failed"
            ),
        }
        self.report.conclude(outcome, cleanup);
        self.report
    }
}

/// Coordinates external tools for every pipeline variant.
#[derive(Debug, Clone)]
pub struct Pipeline {
    toolchain: Toolchain,
    runner: ProcessRunner,
}

impl Pipeline {
    pub fn new(toolchain: Toolchain, runner: ProcessRunner) -> Self {
        Self { toolchain, runner }
    }

    /// Resolve tools through the process's `PATH`.
    pub fn from_env(toolchain: Toolchain) -> Self {
        Self::new(toolchain, ProcessRunner::new(Arc::new(SearchPath::from_env())))
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    pub(crate) fn require_input(&self, input: &Path) -> Result<(), PipelineError> {
        if input.is_file() {
            Ok(())
        } else {
            Err(PipelineError::InputMissing {
                path: input.display().to_string(),
            })
        }
    }

    pub(crate) fn require_tools(&self, programs: &[&str]) -> Result<(), PipelineError> {
        for program in programs {
            if !self.runner.locator().is_available(program) {
                return Err(PipelineError::ToolMissing {
                    stage: Stage::Preflight,
                    program: program.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Run one stage. Completed runs are recorded; nonzero exits become
    /// [`PipelineError::StageFailed`].
    pub(crate) async fn run_stage(
        &self,
        run: &mut PipelineRun,
        stage: Stage,
        spec: ProcessSpec,
    ) -> Result<ProcessResult, PipelineError> {
        let spec = spec.timeout(self.toolchain.timeout());
        let result = self
            .runner
            .run(&spec)
            .await
            .map_err(|err| PipelineError::from_process(stage, err))?;
        run.record(stage, &result);
        if result.success() {
            Ok(result)
        } else {
            Err(PipelineError::StageFailed {
                stage,
                program: result.program.clone(),
                code: result.exit_code,
            })
        }
    }

    /// Check `transformed` against `original` with the configured verifier.
    pub(crate) async fn verify(
        &self,
        run: &mut PipelineRun,
        original: &Path,
        transformed: &Path,
    ) -> Result<(), PipelineError> {
        let program = self.toolchain.verifier_program();
        let spec = verification_spec(&program, original, transformed)?;
        self.run_stage(run, Stage::Verify, spec).await?;
        Ok(())
    }
}
