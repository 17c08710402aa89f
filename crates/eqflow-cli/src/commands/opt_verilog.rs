use crate::support::{self, Globals};
use eqflow_pipeline::TransformRequest;

pub async fn run(command: &str, args: Vec<String>, globals: &Globals) -> i32 {
    if args.first().map(String::as_str) == Some("--help") {
        let pipeline = support::pipeline_or_exit(globals);
        return match pipeline.transformer_help().await {
            Ok(code) => code,
            Err(e) => {
                eprintln!("error: {e}");
                e.exit_code()
            }
        };
    }

    let invocation = support::invocation_or_usage(command, args);
    let pipeline = support::pipeline_or_exit(globals);
    let request =
        TransformRequest::new(invocation.input, invocation.output).with_options(invocation.options);
    let report = pipeline.run_chained(command, &request).await;
    support::finish_report(&report, globals.json)
}
