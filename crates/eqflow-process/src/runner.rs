//! Single-process execution.

use crate::error::ProcessError;
use crate::locator::ToolLocator;
use serde::Serialize;
use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Where a process's standard output goes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Inherit,
    Null,
    /// Collected into [`ProcessResult::output`].
    Capture,
    /// Truncate and write to a file.
    File(PathBuf),
}

/// One external command: program, ordered arguments, and how to run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    pub stdout: OutputMode,
    pub timeout: Option<Duration>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdout: OutputMode::Inherit,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn stdout(mut self, mode: OutputMode) -> Self {
        self.stdout = mode;
        self
    }

    pub fn timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    /// `program arg1 arg2 ...` for diagnostics.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// Outcome of a process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    pub program: String,
    pub exit_code: i32,
    #[serde(skip)]
    pub output: Option<Vec<u8>>,
    #[serde(rename = "durationMs", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn output_text(&self) -> Option<String> {
        self.output
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

fn serialize_millis<S: serde::Serializer>(value: &Duration, ser: S) -> Result<S::Ok, S::Error> {
    ser.serialize_u64(millis(*value))
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(value: Duration) -> u64 {
    u64::try_from(value.as_millis()).unwrap_or(u64::MAX)
}

/// Runs external programs resolved through an injected [`ToolLocator`].
#[derive(Clone)]
pub struct ProcessRunner {
    locator: Arc<dyn ToolLocator>,
}

impl std::fmt::Debug for ProcessRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRunner").finish_non_exhaustive()
    }
}

impl ProcessRunner {
    pub fn new(locator: Arc<dyn ToolLocator>) -> Self {
        Self { locator }
    }

    pub fn locator(&self) -> &dyn ToolLocator {
        self.locator.as_ref()
    }

    /// Resolve `program`, reporting a missing executable as [`ProcessError::NotFound`].
    pub fn resolve(&self, program: &str) -> Result<PathBuf, ProcessError> {
        self.locator
            .locate(program)
            .ok_or_else(|| ProcessError::NotFound {
                program: program.to_string(),
            })
    }

    /// Spawn `spec`, wait for it, and report its exit code.
    pub async fn run(&self, spec: &ProcessSpec) -> Result<ProcessResult, ProcessError> {
        let path = self.resolve(&spec.program)?;
        let mut command = self.command(&path, spec);
        command.stdin(Stdio::null());
        command.stdout(stdout_stdio(spec)?);

        tracing::info!(command = %spec.display(), "running");
        let started = Instant::now();
        let child = command
            .spawn()
            .map_err(|source| spawn_error(&spec.program, source))?;
        let pid = child.id();

        let waited = match spec.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    tracing::warn!(program = %spec.program, ?limit, "timed out; killing");
                    kill_process_group(&spec.program, pid);
                    ProcessError::TimedOut {
                        program: spec.program.clone(),
                        limit,
                    }
                })?,
            None => child.wait_with_output().await,
        };
        let output = waited.map_err(|source| ProcessError::Io {
            program: spec.program.clone(),
            source,
        })?;

        let result = ProcessResult {
            program: spec.program.clone(),
            exit_code: exit_code(output.status),
            output: matches!(spec.stdout, OutputMode::Capture).then_some(output.stdout),
            duration: started.elapsed(),
        };
        tracing::info!(
            program = %result.program,
            exit_code = result.exit_code,
            duration_ms = millis(result.duration),
            "finished"
        );
        Ok(result)
    }

    /// Each child leads its own process group so a timeout can reach the
    /// processes it spawned too.
    pub(crate) fn command(&self, path: &Path, spec: &ProcessSpec) -> Command {
        let mut command = Command::new(path);
        command.args(&spec.args).kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }
        command
    }
}

/// SIGKILL the process group led by `pid`. A group that is already gone is
/// not an error.
pub(crate) fn kill_process_group(program: &str, pid: Option<u32>) {
    #[cfg(unix)]
    {
        let Some(pgid) = pid.and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
            return;
        };
        // SAFETY: kill(2) takes no pointers; a negative pid names the group.
        let ret = unsafe { libc::kill(-pgid, libc::SIGKILL) };
        if ret != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ESRCH) {
                tracing::warn!(program, pgid, error = %err, "failed to kill process group");
            }
        }
    }
    #[cfg(not(unix))]
    let _ = (program, pid);
}

fn stdout_stdio(spec: &ProcessSpec) -> Result<Stdio, ProcessError> {
    Ok(match &spec.stdout {
        OutputMode::Inherit => Stdio::inherit(),
        OutputMode::Null => Stdio::null(),
        OutputMode::Capture => Stdio::piped(),
        OutputMode::File(path) => Stdio::from(create_sink(&spec.program, path)?),
    })
}

pub(crate) fn create_sink(program: &str, path: &Path) -> Result<File, ProcessError> {
    File::create(path).map_err(|source| ProcessError::Io {
        program: program.to_string(),
        source,
    })
}

pub(crate) fn spawn_error(program: &str, source: std::io::Error) -> ProcessError {
    if source.kind() == std::io::ErrorKind::NotFound {
        ProcessError::NotFound {
            program: program.to_string(),
        }
    } else {
        ProcessError::Spawn {
            program: program.to_string(),
            source,
        }
    }
}

/// Exit code, or `128 + signal` for a process killed by a signal.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_program_and_args() {
        let spec = ProcessSpec::new("make")
            .arg("-f")
            .arg("design.v.mk")
            .arg("design.v.yxil");
        assert_eq!(spec.display(), "make -f design.v.mk design.v.yxil");
    }

    #[test]
    fn result_serializes_duration_as_millis() {
        let result = ProcessResult {
            program: "eqmap_fpga".to_string(),
            exit_code: 3,
            output: Some(b"ignored".to_vec()),
            duration: Duration::from_millis(1500),
        };
        let value = serde_json::to_value(&result).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({"program": "eqmap_fpga", "exitCode": 3, "durationMs": 1500})
        );
    }

    #[test]
    fn oversized_durations_saturate_instead_of_wrapping() {
        assert_eq!(millis(Duration::from_millis(42)), 42);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
