//! Direct variant: backend on the raw input, then the verifier.

use crate::error::{PipelineError, Stage};
use crate::pipeline::{Pipeline, PipelineRun, TransformRequest};
use crate::report::PipelineReport;
use eqflow_manifest::Backend;
use eqflow_process::ProcessSpec;

impl Pipeline {
    /// Run `backend` with `{input, output, options}` and verify the output.
    /// No manifest and no intermediates are produced.
    pub async fn run_direct(
        &self,
        command: &str,
        backend: Backend,
        request: &TransformRequest,
    ) -> PipelineReport {
        let mut run = PipelineRun::start(command, &request.input, &request.output);
        let outcome = self.drive_direct(&mut run, backend, request).await;
        run.finish(outcome)
    }

    async fn drive_direct(
        &self,
        run: &mut PipelineRun,
        backend: Backend,
        request: &TransformRequest,
    ) -> Result<(), PipelineError> {
        let program = self.toolchain().backend_program(backend);
        self.require_input(&request.input)?;
        self.require_tools(&[program])?;

        self.run_stage(
            run,
            Stage::Backend,
            ProcessSpec::new(program)
                .arg(request.input.as_os_str())
                .arg(request.output.as_os_str())
                .args(&request.options),
        )
        .await?;

        self.verify(run, &request.input, &request.output).await
    }
}
