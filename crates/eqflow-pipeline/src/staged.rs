//! Staged variant: manifest, interpreter, backend, verifier.

use crate::error::{PipelineError, Stage};
use crate::pipeline::{Pipeline, PipelineRun};
use crate::report::PipelineReport;
use eqflow_manifest::{BuildManifest, ManifestError, PipelineRequest, generate};
use eqflow_process::{OutputMode, ProcessSpec};

impl Pipeline {
    /// Render the manifest `request` would run, without writing it.
    pub fn manifest_for(&self, request: &PipelineRequest) -> Result<BuildManifest, ManifestError> {
        generate(
            request,
            &self.toolchain().libraries(),
            &self.toolchain().synthesis_tools(),
        )
    }

    /// Materialize the request's artifact through the generated manifest,
    /// map it with the backend, and verify the result against the input.
    ///
    /// Preflight (input, interpreter, synthesis tool, backend) runs before
    /// anything is written. The manifest and artifact are removed on every
    /// exit path; the caller's input and output never are.
    pub async fn run_staged(&self, command: &str, request: &PipelineRequest) -> PipelineReport {
        let mut run = PipelineRun::start(command, request.input(), request.output());
        let outcome = self.drive_staged(&mut run, request).await;
        run.finish(outcome)
    }

    /// Staged run followed by a second, independent verification.
    pub async fn run_verified(&self, command: &str, request: &PipelineRequest) -> PipelineReport {
        let mut run = PipelineRun::start(command, request.input(), request.output());
        let mut outcome = self.drive_staged(&mut run, request).await;
        if outcome.is_ok() {
            outcome = self.verify(&mut run, request.input(), request.output()).await;
        }
        run.finish(outcome)
    }

    async fn drive_staged(
        &self,
        run: &mut PipelineRun,
        request: &PipelineRequest,
    ) -> Result<(), PipelineError> {
        let toolchain = self.toolchain();
        let backend = toolchain.backend_program(request.backend());

        self.require_input(request.input())?;
        self.require_tools(&[
            toolchain.tools.make.as_str(),
            toolchain.synthesis_program(request.target()),
            backend,
        ])?;

        let manifest = self.manifest_for(request)?;
        let artifact = request.artifact_path();
        run.adopt_manifest(&manifest);
        run.track(artifact.clone());
        manifest.write()?;
        tracing::debug!(
            manifest = %manifest.path.display(),
            target = %manifest.default_target,
            "manifest ready"
        );

        // Success of this stage is signalled only by the interpreter's exit code.
        self.run_stage(
            run,
            Stage::Interpret,
            ProcessSpec::new(&toolchain.tools.make)
                .arg("-f")
                .arg(manifest.path.as_os_str())
                .arg(artifact.as_os_str()),
        )
        .await?;

        self.run_stage(
            run,
            Stage::Backend,
            ProcessSpec::new(backend)
                .arg(artifact.as_os_str())
                .arg(request.output().as_os_str())
                .args(request.options())
                .stdout(OutputMode::Inherit),
        )
        .await?;

        self.verify(run, request.input(), request.output()).await
    }
}
