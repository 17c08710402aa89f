//! Chained variant: `frontend -- <input> | transformer <options> > <output>`,
//! then the verifier.

use crate::error::{PipelineError, Stage};
use crate::pipeline::{Pipeline, PipelineRun, TransformRequest};
use crate::report::PipelineReport;
use eqflow_process::{ProcessError, ProcessSpec};

impl Pipeline {
    /// Stream the frontend's output straight into the transformer, whose
    /// output becomes the request's output file. Nothing intermediate
    /// touches disk.
    pub async fn run_chained(&self, command: &str, request: &TransformRequest) -> PipelineReport {
        let mut run = PipelineRun::start(command, &request.input, &request.output);
        let outcome = self.drive_chained(&mut run, request).await;
        run.finish(outcome)
    }

    async fn drive_chained(
        &self,
        run: &mut PipelineRun,
        request: &TransformRequest,
    ) -> Result<(), PipelineError> {
        self.require_input(&request.input)?;

        let tools = &self.toolchain().tools;
        let producer = ProcessSpec::new(&tools.frontend)
            .arg("--")
            .arg(request.input.as_os_str());
        let consumer = ProcessSpec::new(&tools.transformer).args(&request.options);

        let result = self
            .runner()
            .run_chained(
                &producer,
                &consumer,
                &request.output,
                self.toolchain().limits.chain_buffer,
                self.toolchain().timeout(),
            )
            .await
            .map_err(|err| {
                let stage = chain_stage(&err, &tools.frontend);
                PipelineError::from_process(stage, err)
            })?;

        run.record(Stage::Frontend, &result.producer);
        run.record(Stage::Transform, &result.consumer);
        let failed = if !result.consumer.success() {
            Some((Stage::Transform, &result.consumer))
        } else if result.producer_failed() {
            Some((Stage::Frontend, &result.producer))
        } else {
            None
        };
        if let Some((stage, stage_result)) = failed {
            return Err(PipelineError::StageFailed {
                stage,
                program: stage_result.program.clone(),
                code: stage_result.exit_code,
            });
        }
        if result.producer_cut_off {
            tracing::debug!(
                frontend = %result.producer.program,
                "transformer stopped reading early; frontend cut off"
            );
        }

        self.verify(run, &request.input, &request.output).await
    }

    /// Forward `--help` to the transformer and return its exit code.
    pub async fn transformer_help(&self) -> Result<i32, PipelineError> {
        let spec = ProcessSpec::new(&self.toolchain().tools.transformer).arg("--help");
        self.runner()
            .run(&spec)
            .await
            .map(|result| result.exit_code)
            .map_err(|err| PipelineError::from_process(Stage::Transform, err))
    }
}

fn chain_stage(err: &ProcessError, frontend: &str) -> Stage {
    if err.program() == frontend {
        Stage::Frontend
    } else {
        Stage::Transform
    }
}
