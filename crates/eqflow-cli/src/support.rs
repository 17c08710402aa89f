use crate::cli::Cli;
use eqflow_pipeline::{Pipeline, PipelineReport, Toolchain};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const VERBOSE_FILTER: &str =
    "warn,runtool=info,eqflow_manifest=info,eqflow_process=info,eqflow_pipeline=info";

/// Flags shared by every command.
#[derive(Debug, Clone)]
pub struct Globals {
    pub config: Option<PathBuf>,
    pub share_dir: Option<PathBuf>,
    pub timeout: Option<u64>,
    pub json: bool,
}

impl Globals {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            config: cli.config.clone(),
            share_dir: cli.share_dir.clone(),
            timeout: cli.timeout,
            json: cli.json,
        }
    }
}

/// Positional arguments of a pipeline command.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub input: PathBuf,
    pub output: PathBuf,
    pub options: Vec<String>,
}

/// Logs go to stderr. `RUST_LOG` wins over `--verbose`.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { VERBOSE_FILTER } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

pub fn runtime_or_exit() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("error: failed to start async runtime: {e}");
            process::exit(1);
        })
}

pub fn toolchain_or_exit(globals: &Globals) -> Toolchain {
    let mut toolchain = Toolchain::discover(globals.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("error: preflight stage failed: {e}");
        process::exit(1);
    });
    if let Some(dir) = &globals.share_dir {
        toolchain.paths.share_dir = Some(dir.clone());
    }
    if let Some(secs) = globals.timeout {
        toolchain.limits.timeout_secs = Some(secs);
    }
    tracing::debug!(
        share_dir = %toolchain.share_dir().display(),
        timeout = ?toolchain.timeout(),
        verifier = %toolchain.verifier_program(),
        "toolchain loaded"
    );
    toolchain
}

pub fn pipeline_or_exit(globals: &Globals) -> Pipeline {
    Pipeline::from_env(toolchain_or_exit(globals))
}

/// Split `<input> <output> [options...]`, or print the usage line and exit 1.
pub fn invocation_or_usage(command: &str, args: Vec<String>) -> Invocation {
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(input), Some(output)) => Invocation {
            input: PathBuf::from(input),
            output: PathBuf::from(output),
            options: args.collect(),
        },
        _ => {
            tracing::debug!(command, "too few positional arguments");
            println!("Usage: {command} <input.v> <output.v> [options]");
            process::exit(1);
        }
    }
}

/// Print the report outcome and return the process exit code.
pub fn finish_report(report: &PipelineReport, json: bool) -> i32 {
    if json {
        match serde_json::to_string_pretty(report) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("error: failed to render run report: {e}"),
        }
    }
    if let Some(error) = &report.error {
        eprintln!("error: {error}");
    }
    report.exit_code
}
