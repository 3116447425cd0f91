//! The bounded-concurrency task runner.
//!
//! The runner polls the queue every 100 ms. For each queued task it
//! acquires a semaphore permit (capacity `max_concurrent`), installs the
//! cancel handle, marks the task Running, and spawns its execution under
//! a per-task cancellation token with a timeout. Shell output streams
//! line-by-line into the task's buffer; stderr lines carry a `[STDERR]`
//! prefix, and the interleaving between the two streams is
//! non-deterministic.

use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{RuntimeError, RuntimeResult};
use crate::queue::TaskQueue;
use crate::task::{CommandKind, Task};

/// Runner tuning knobs.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Maximum tasks executing at once.
    pub max_concurrent: usize,
    /// Per-task wall-clock timeout.
    pub task_timeout: Duration,
    /// Queue poll interval.
    pub poll_interval: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            task_timeout: Duration::from_secs(30 * 60),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Executes queued tasks with bounded concurrency.
pub struct TaskRunner {
    queue: Arc<TaskQueue>,
    config: RunnerConfig,
    semaphore: Arc<Semaphore>,
    stop_token: CancellationToken,
    stopped: Arc<AtomicBool>,
}

impl TaskRunner {
    /// Create a runner over a queue.
    #[must_use]
    pub fn new(queue: Arc<TaskQueue>, config: RunnerConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
        Self {
            queue,
            config,
            semaphore,
            stop_token: CancellationToken::new(),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the poll loop.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::RunnerStopped`] after [`TaskRunner::stop`]
    /// has run; a stopped runner never spawns again.
    pub fn start(&self) -> RuntimeResult<tokio::task::JoinHandle<()>> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(RuntimeError::RunnerStopped);
        }
        let queue = Arc::clone(&self.queue);
        let config = self.config.clone();
        let semaphore = Arc::clone(&self.semaphore);
        let stop_token = self.stop_token.clone();
        Ok(tokio::spawn(run_loop(queue, config, semaphore, stop_token)))
    }

    /// Stop the runner: no further spawns, then wait for in-flight tasks.
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.stop_token.cancel();
        while self.queue.running_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        debug!("task runner stopped");
    }
}

async fn run_loop(
    queue: Arc<TaskQueue>,
    config: RunnerConfig,
    semaphore: Arc<Semaphore>,
    stop_token: CancellationToken,
) {
    let mut interval = tokio::time::interval(config.poll_interval);
    let mut in_flight: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            () = stop_token.cancelled() => break,
            _ = interval.tick() => {
                while in_flight.try_join_next().is_some() {}
                spawn_ready(&queue, &config, &semaphore, &mut in_flight);
            },
        }
    }

    // Drain in-flight tasks before returning.
    while in_flight.join_next().await.is_some() {}
}

fn spawn_ready(
    queue: &Arc<TaskQueue>,
    config: &RunnerConfig,
    semaphore: &Arc<Semaphore>,
    in_flight: &mut JoinSet<()>,
) {
    while let Some(task) = queue.next_queued() {
        let Ok(permit) = Arc::clone(semaphore).try_acquire_owned() else {
            // At capacity; retry on the next tick.
            break;
        };

        // Per-task cancellation scope, installed before the task runs.
        let token = CancellationToken::new();
        if task.set_cancel_handle(token.clone()).is_err() {
            warn!(task_id = %task.id, "cancel handle already set; skipping task");
            let _ = queue.mark_running(task.id);
            let _ = queue.mark_failed(task.id, "cancel handle already set");
            continue;
        }
        if let Err(e) = queue.mark_running(task.id) {
            warn!(task_id = %task.id, error = %e, "failed to mark task running");
            continue;
        }

        let queue = Arc::clone(queue);
        let timeout = config.task_timeout;
        in_flight.spawn(async move {
            let _permit = permit;
            execute(&queue, task, token, timeout).await;
        });
    }
}

async fn execute(queue: &TaskQueue, task: Task, token: CancellationToken, timeout: Duration) {
    // Observe cancellation before execution begins.
    if token.is_cancelled() {
        let _ = queue.mark_canceled(task.id);
        return;
    }

    let id = task.id;
    let outcome = tokio::time::timeout(timeout, run_task(&task, &token)).await;
    let result = match outcome {
        Err(_elapsed) => {
            token.cancel();
            Err(RuntimeError::Timeout {
                secs: timeout.as_secs(),
            })
        },
        Ok(result) => result,
    };

    match result {
        Ok(()) => {
            let _ = queue.mark_complete(id);
        },
        Err(RuntimeError::Cancelled) => {
            let _ = queue.mark_canceled(id);
        },
        Err(e @ RuntimeError::Timeout { .. }) => {
            let _ = queue.mark_failed(id, format!("task timed out: {e}"));
        },
        Err(e) => {
            let _ = queue.mark_failed(id, e.to_string());
        },
    }
}

async fn run_task(task: &Task, token: &CancellationToken) -> RuntimeResult<()> {
    match task.kind {
        CommandKind::Bash => run_shell(task, token).await,
        CommandKind::Sleep => run_sleep(task, token).await,
    }
}

/// Shell selection chain: bash on Unix; powershell, then cmd, on Windows.
#[cfg(not(windows))]
fn select_shell() -> (&'static str, &'static str) {
    ("bash", "-c")
}

#[cfg(windows)]
fn select_shell() -> (&'static str, &'static str) {
    if command_on_path("powershell.exe") {
        ("powershell", "-Command")
    } else {
        ("cmd", "/C")
    }
}

#[cfg(windows)]
fn command_on_path(name: &str) -> bool {
    std::env::var_os("PATH").is_some_and(|path| {
        std::env::split_paths(&path).any(|dir| dir.join(name).is_file())
    })
}

async fn run_shell(task: &Task, token: &CancellationToken) -> RuntimeResult<()> {
    let (shell, flag) = select_shell();
    let command_line = task.args.join(" ");
    debug!(task_id = %task.id, shell, "spawning shell task");

    let mut child = Command::new(shell)
        .arg(flag)
        .arg(&command_line)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    // Concurrent line readers stream into the shared output buffer.
    // No ordering is guaranteed between the two streams.
    let stdout_reader = child.stdout.take().map(|stdout| {
        let task = task.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                task.append_output(&line);
            }
        })
    });
    let stderr_reader = child.stderr.take().map(|stderr| {
        let task = task.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                task.append_output(&format!("[STDERR] {line}"));
            }
        })
    });

    let status = tokio::select! {
        () = token.cancelled() => {
            let _ = child.kill().await;
            join_readers(stdout_reader, stderr_reader).await;
            return Err(RuntimeError::Cancelled);
        },
        status = child.wait() => status?,
    };

    join_readers(stdout_reader, stderr_reader).await;

    if status.success() {
        Ok(())
    } else {
        Err(RuntimeError::CommandFailed {
            code: status.code().unwrap_or(-1),
        })
    }
}

async fn join_readers(
    stdout: Option<tokio::task::JoinHandle<()>>,
    stderr: Option<tokio::task::JoinHandle<()>>,
) {
    if let Some(handle) = stdout {
        let _ = handle.await;
    }
    if let Some(handle) = stderr {
        let _ = handle.await;
    }
}

async fn run_sleep(task: &Task, token: &CancellationToken) -> RuntimeResult<()> {
    let spec = task
        .args
        .first()
        .ok_or_else(|| RuntimeError::InvalidDuration("<missing>".to_owned()))?;
    let secs: f64 = spec
        .trim()
        .trim_end_matches('s')
        .parse()
        .map_err(|_| RuntimeError::InvalidDuration(spec.clone()))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(RuntimeError::InvalidDuration(spec.clone()));
    }

    let total = Duration::from_secs_f64(secs);
    if total.is_zero() {
        task.set_progress(100);
        return Ok(());
    }

    let start = tokio::time::Instant::now();
    let mut interval = tokio::time::interval(Duration::from_millis(100));
    loop {
        tokio::select! {
            () = token.cancelled() => return Err(RuntimeError::Cancelled),
            _ = interval.tick() => {
                let elapsed = start.elapsed();
                if elapsed >= total {
                    task.set_progress(100);
                    return Ok(());
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let percent = ((elapsed.as_secs_f64() / total.as_secs_f64()) * 100.0) as u8;
                task.set_progress(percent);
            },
        }
    }
}
