//! Producer/consumer process chaining.
//!
//! The producer's stdout feeds the consumer's stdin through a bounded
//! channel pumped by two tasks. Both processes start before either is
//! awaited. The channel capacity bounds the bytes in flight: the reader task
//! blocks on `send` while the consumer lags, and the writer task blocks on
//! `recv` until the producer emits more or closes its stream.
//!
//! End-of-input is signalled by ownership alone. Each pipe end is moved out
//! of its child into exactly one pump task, so when the producer closes its
//! stdout the reader drops the sender, the writer drains the channel and
//! then drops the consumer's stdin. The orchestrator never retains a copy;
//! a retained stdin handle would leave the consumer waiting for EOF forever.

use crate::error::ProcessError;
use crate::runner::{
    ProcessResult, ProcessRunner, ProcessSpec, create_sink, exit_code, kill_process_group,
    spawn_error,
};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::mpsc;

const CHUNK_SIZE: usize = 8 * 1024;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Outcome of a chained run where both processes completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainResult {
    pub producer: ProcessResult,
    pub consumer: ProcessResult,
    /// Bytes delivered to the consumer's stdin.
    pub bytes_transferred: u64,
    /// The consumer stopped reading and the producer then died of SIGPIPE.
    pub producer_cut_off: bool,
}

impl ChainResult {
    /// Whether the producer failed on its own account. Being cut off by a
    /// consumer that finished early is not a failure.
    pub fn producer_failed(&self) -> bool {
        !self.producer.success() && !self.producer_cut_off
    }

    /// First failing exit code: consumer before producer.
    pub fn exit_code(&self) -> i32 {
        if !self.consumer.success() {
            self.consumer.exit_code
        } else if self.producer_failed() {
            self.producer.exit_code
        } else {
            0
        }
    }
}

impl ProcessRunner {
    /// Run `producer | consumer > sink` and wait for both.
    ///
    /// Both programs are resolved before anything is spawned, so a missing
    /// executable at either stage leaves no process behind. The
    /// `timeout` of each spec is ignored; `limit` bounds the whole chain.
    pub async fn run_chained(
        &self,
        producer: &ProcessSpec,
        consumer: &ProcessSpec,
        sink: &Path,
        capacity: usize,
        limit: Option<Duration>,
    ) -> Result<ChainResult, ProcessError> {
        let producer_path = self.resolve(&producer.program)?;
        let consumer_path = self.resolve(&consumer.program)?;
        let sink_file = create_sink(&consumer.program, sink)?;

        tracing::info!(
            producer = %producer.display(),
            consumer = %consumer.display(),
            sink = %sink.display(),
            "running chained"
        );
        let started = Instant::now();

        let mut producer_cmd = self.command(&producer_path, producer);
        producer_cmd.stdin(Stdio::null()).stdout(Stdio::piped());
        let mut producer_child = producer_cmd
            .spawn()
            .map_err(|source| spawn_error(&producer.program, source))?;

        let mut consumer_cmd = self.command(&consumer_path, consumer);
        consumer_cmd.stdin(Stdio::piped()).stdout(Stdio::from(sink_file));
        let mut consumer_child = consumer_cmd
            .spawn()
            .map_err(|source| spawn_error(&consumer.program, source))?;

        let upstream = producer_child.stdout.take().ok_or_else(|| ProcessError::Io {
            program: producer.program.clone(),
            source: std::io::Error::other("producer stdout was not piped"),
        })?;
        let downstream = consumer_child.stdin.take().ok_or_else(|| ProcessError::Io {
            program: consumer.program.clone(),
            source: std::io::Error::other("consumer stdin was not piped"),
        })?;

        let producer_pid = producer_child.id();
        let consumer_pid = consumer_child.id();

        let (tx, rx) = mpsc::channel::<Vec<u8>>(capacity.max(1));
        let reader = tokio::spawn(pump_stdout(upstream, tx));
        let writer = tokio::spawn(pump_stdin(rx, downstream));

        let chain = async {
            let (producer_status, consumer_status, read, written) = tokio::join!(
                producer_child.wait(),
                consumer_child.wait(),
                reader,
                writer
            );
            let producer_status = producer_status.map_err(|source| ProcessError::Io {
                program: producer.program.clone(),
                source,
            })?;
            let consumer_status = consumer_status.map_err(|source| ProcessError::Io {
                program: consumer.program.clone(),
                source,
            })?;
            let (_, send_refused) = flatten_pump(read, &producer.program)?;
            let (bytes_transferred, input_closed) = flatten_pump(written, &consumer.program)?;
            Ok::<_, ProcessError>((
                producer_status,
                consumer_status,
                bytes_transferred,
                send_refused || input_closed,
            ))
        };

        let (producer_status, consumer_status, bytes_transferred, consumer_closed) = match limit {
            Some(limit) => tokio::time::timeout(limit, chain).await.map_err(|_| {
                tracing::warn!(?limit, "chained run timed out; killing both stages");
                kill_process_group(&producer.program, producer_pid);
                kill_process_group(&consumer.program, consumer_pid);
                ProcessError::TimedOut {
                    program: format!("{} | {}", producer.program, consumer.program),
                    limit,
                }
            })??,
            None => chain.await?,
        };

        let duration = started.elapsed();
        let result = ChainResult {
            producer: ProcessResult {
                program: producer.program.clone(),
                exit_code: exit_code(producer_status),
                output: None,
                duration,
            },
            consumer: ProcessResult {
                program: consumer.program.clone(),
                exit_code: exit_code(consumer_status),
                output: None,
                duration,
            },
            bytes_transferred,
            producer_cut_off: consumer_closed && killed_by_sigpipe(producer_status),
        };
        tracing::info!(
            producer_exit = result.producer.exit_code,
            consumer_exit = result.consumer.exit_code,
            bytes = result.bytes_transferred,
            "chained run finished"
        );
        Ok(result)
    }
}

/// Bytes read, and whether the consumer side closed before the producer
/// finished.
async fn pump_stdout(
    mut upstream: ChildStdout,
    tx: mpsc::Sender<Vec<u8>>,
) -> std::io::Result<(u64, bool)> {
    let mut total = 0u64;
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = upstream.read(&mut buf).await?;
        if n == 0 {
            return Ok((total, false));
        }
        total += n as u64;
        if tx.send(buf[..n].to_vec()).await.is_err() {
            // Consumer side is gone; dropping `upstream` lets the producer see EPIPE.
            return Ok((total, true));
        }
    }
}

/// Bytes written, and whether the consumer closed its input early.
async fn pump_stdin(
    mut rx: mpsc::Receiver<Vec<u8>>,
    mut downstream: ChildStdin,
) -> std::io::Result<(u64, bool)> {
    let mut total = 0u64;
    while let Some(chunk) = rx.recv().await {
        match downstream.write_all(&chunk).await {
            Ok(()) => total += chunk.len() as u64,
            Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {
                tracing::debug!("consumer closed its input early");
                return Ok((total, true));
            }
            Err(err) => return Err(err),
        }
    }
    match downstream.flush().await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => return Ok((total, true)),
        Err(err) => return Err(err),
    }
    drop(downstream);
    Ok((total, false))
}

/// Direct SIGPIPE death, or a shell wrapper reporting it as `128 + SIGPIPE`.
fn killed_by_sigpipe(status: ExitStatus) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.signal() == Some(libc::SIGPIPE) || status.code() == Some(128 + libc::SIGPIPE)
    }
    #[cfg(not(unix))]
    {
        let _ = status;
        false
    }
}

fn flatten_pump(
    joined: Result<std::io::Result<(u64, bool)>, tokio::task::JoinError>,
    program: &str,
) -> Result<(u64, bool), ProcessError> {
    joined
        .map_err(|err| ProcessError::Io {
            program: program.to_string(),
            source: std::io::Error::other(err),
        })?
        .map_err(|source| ProcessError::Io {
            program: program.to_string(),
            source,
        })
}
