//! Tasks and their status state machine.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{RuntimeError, RuntimeResult};

/// What a task executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// A shell command (bash on Unix, powershell/cmd on Windows).
    Bash,
    /// A timed sleep with progress reporting.
    Sleep,
}

impl FromStr for CommandKind {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bash" | "sh" | "shell" => Ok(Self::Bash),
            "sleep" => Ok(Self::Sleep),
            other => Err(RuntimeError::UnknownCommandKind(other.to_owned())),
        }
    }
}

/// Task lifecycle states.
///
/// Valid transitions: Queued→Running, Queued→Canceled,
/// Running→{Complete, Failed, Canceled}. The terminal states absorb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for a runner slot.
    Queued,
    /// Executing.
    Running,
    /// Finished cleanly.
    Complete,
    /// Finished with an error or timeout.
    Failed,
    /// Cancelled before or during execution.
    Canceled,
}

impl TaskStatus {
    /// Whether this state has no outgoing transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Canceled)
    }

    /// Whether `self → next` is in the allowed transition graph.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running | Self::Canceled)
                | (Self::Running, Self::Complete | Self::Failed | Self::Canceled)
        )
    }

    /// Lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A long-running background task.
///
/// Clones are shallow over the output buffer, progress gauge, and cancel
/// handle: the runner streams into the same buffers the queue's copy
/// reads from. Metadata is likewise shared; callers must not place
/// mutable reference values in it.
#[derive(Debug, Clone)]
pub struct Task {
    /// Unique task id.
    pub id: Uuid,
    /// Human-readable description.
    pub description: String,
    /// What to execute.
    pub kind: CommandKind,
    /// Arguments: the command line for bash, the duration for sleep.
    pub args: Vec<String>,
    /// Conversation this task belongs to, if any.
    pub conversation_id: Option<String>,
    /// Free-form string metadata.
    pub metadata: HashMap<String, String>,
    /// When execution started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Terminal error, if any.
    pub error: Option<String>,
    status: TaskStatus,
    output: Arc<Mutex<String>>,
    progress: Arc<AtomicU8>,
    cancel: Arc<OnceLock<CancellationToken>>,
}

impl Task {
    /// Create a queued task.
    #[must_use]
    pub fn new(description: impl Into<String>, kind: CommandKind, args: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            kind,
            args,
            conversation_id: None,
            metadata: HashMap::new(),
            started_at: None,
            completed_at: None,
            error: None,
            status: TaskStatus::Queued,
            output: Arc::new(Mutex::new(String::new())),
            progress: Arc::new(AtomicU8::new(0)),
            cancel: Arc::new(OnceLock::new()),
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Transition to `next`, validating against the transition graph.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidStateTransition`] for any edge
    /// outside Queued→{Running, Canceled}, Running→{Complete, Failed,
    /// Canceled}.
    pub fn set_status(&mut self, next: TaskStatus) -> RuntimeResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(RuntimeError::InvalidStateTransition {
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Install the cancel handle. Must happen exactly once, before the
    /// task is marked Running.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::CancelHandleAlreadySet`] on a second write.
    pub fn set_cancel_handle(&self, token: CancellationToken) -> RuntimeResult<()> {
        self.cancel
            .set(token)
            .map_err(|_| RuntimeError::CancelHandleAlreadySet(self.id))
    }

    /// The cancel handle, if installed.
    #[must_use]
    pub fn cancel_handle(&self) -> Option<CancellationToken> {
        self.cancel.get().cloned()
    }

    /// Append a line to the output buffer.
    pub fn append_output(&self, line: &str) {
        if let Ok(mut output) = self.output.lock() {
            output.push_str(line);
            output.push('\n');
        }
    }

    /// Snapshot of the streamed output.
    #[must_use]
    pub fn output(&self) -> String {
        self.output.lock().map(|o| o.clone()).unwrap_or_default()
    }

    /// Progress, 0–100.
    #[must_use]
    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::Relaxed)
    }

    /// Set progress, clamped to 100.
    pub fn set_progress(&self, percent: u8) {
        self.progress.store(percent.min(100), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new("test", CommandKind::Bash, vec!["echo hi".to_owned()])
    }

    #[test]
    fn test_initial_status_queued() {
        assert_eq!(task().status(), TaskStatus::Queued);
    }

    #[test]
    fn test_valid_transitions() {
        let mut t = task();
        t.set_status(TaskStatus::Running).unwrap();
        t.set_status(TaskStatus::Complete).unwrap();
    }

    #[test]
    fn test_queued_to_canceled_is_valid() {
        let mut t = task();
        t.set_status(TaskStatus::Canceled).unwrap();
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut t = task();
        assert!(t.set_status(TaskStatus::Complete).is_err());
        assert!(t.set_status(TaskStatus::Failed).is_err());

        t.set_status(TaskStatus::Running).unwrap();
        assert!(t.set_status(TaskStatus::Queued).is_err());

        t.set_status(TaskStatus::Failed).unwrap();
        // Terminal states absorb.
        assert!(t.set_status(TaskStatus::Running).is_err());
        assert!(t.set_status(TaskStatus::Canceled).is_err());
    }

    #[test]
    fn test_cancel_handle_set_once() {
        let t = task();
        t.set_cancel_handle(CancellationToken::new()).unwrap();
        assert!(matches!(
            t.set_cancel_handle(CancellationToken::new()),
            Err(RuntimeError::CancelHandleAlreadySet(_))
        ));
    }

    #[test]
    fn test_clones_share_output_buffer() {
        let t = task();
        let clone = t.clone();
        t.append_output("from original");
        clone.append_output("from clone");

        assert!(t.output().contains("from clone"));
        assert!(clone.output().contains("from original"));
    }

    #[test]
    fn test_progress_clamped() {
        let t = task();
        t.set_progress(250);
        assert_eq!(t.progress(), 100);
    }

    #[test]
    fn test_command_kind_parse() {
        assert_eq!("bash".parse::<CommandKind>().unwrap(), CommandKind::Bash);
        assert_eq!("sh".parse::<CommandKind>().unwrap(), CommandKind::Bash);
        assert_eq!("shell".parse::<CommandKind>().unwrap(), CommandKind::Bash);
        assert_eq!("sleep".parse::<CommandKind>().unwrap(), CommandKind::Sleep);
        assert!("python".parse::<CommandKind>().is_err());
    }
}
