//! Error types for task and plan execution.

use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the queue, runner, and plan executor.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The queue already holds the maximum number of queued tasks.
    #[error("queue full: {capacity} tasks queued")]
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// A status change outside the allowed transition graph.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        /// Current state.
        from: &'static str,
        /// Requested state.
        to: &'static str,
    },

    /// No task with the given id.
    #[error("task not found: {0}")]
    TaskNotFound(Uuid),

    /// The cancel handle was written twice. Contract violation: it must
    /// be set exactly once before the task is marked Running.
    #[error("cancel handle already set for task {0}")]
    CancelHandleAlreadySet(Uuid),

    /// The task ran past its timeout.
    #[error("timed out after {secs}s")]
    Timeout {
        /// Timeout that elapsed, in seconds.
        secs: u64,
    },

    /// The operation was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// The shell subprocess exited non-zero.
    #[error("command exited with status {code}")]
    CommandFailed {
        /// Process exit code (-1 when killed by signal).
        code: i32,
    },

    /// A sleep task's duration argument was unparseable.
    #[error("invalid duration '{0}'")]
    InvalidDuration(String),

    /// An unrecognized command kind string.
    #[error("unknown command kind '{0}'")]
    UnknownCommandKind(String),

    /// The plan has no steps; empty plans cannot be approved.
    #[error("plan has no steps")]
    EmptyPlan,

    /// A step id collides with an existing step.
    #[error("duplicate step id: {0}")]
    DuplicateStepId(String),

    /// No step with the given id.
    #[error("step not found: {0}")]
    StepNotFound(String),

    /// No tool executor has been configured on the plan executor.
    #[error("tool executor not configured")]
    ExecutorNotConfigured,

    /// The reference stub executor was invoked; implementers must wire a
    /// real tool dispatcher.
    #[error("tool execution not implemented")]
    ToolExecutionNotImplemented,

    /// A tool call failed.
    #[error("tool '{tool}' failed: {message}")]
    ToolFailure {
        /// Tool name.
        tool: String,
        /// Failure detail.
        message: String,
    },

    /// The runner has been stopped; no further starts are accepted.
    #[error("runner stopped")]
    RunnerStopped,

    /// Subprocess I/O failed.
    #[error("task I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
