use crate::support::{self, Globals};
use eqflow_manifest::Backend;
use eqflow_pipeline::TransformRequest;

pub async fn run(command: &str, args: Vec<String>, globals: &Globals) -> i32 {
    let invocation = support::invocation_or_usage(command, args);
    let pipeline = support::pipeline_or_exit(globals);
    let request =
        TransformRequest::new(invocation.input, invocation.output).with_options(invocation.options);

    let report = pipeline.run_direct(command, Backend::Fpga, &request).await;
    support::finish_report(&report, globals.json)
}
