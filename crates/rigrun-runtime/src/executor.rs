//! The sequential plan executor.
//!
//! Owns a [`Plan`] and runs its steps in order. One reader/writer lock
//! guards the plan, the tool-executor handle, and the progress callback;
//! callbacks and tool calls are always invoked *outside* the lock
//! (copy-the-pointer-then-call), and the lock is never held across an
//! await point.
//!
//! A **fresh** cancellation token is created for every `execute*` call;
//! a token from a previously cancelled run is never reused.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{RuntimeError, RuntimeResult};
use crate::plan::{Plan, PlanStatus, StepStatus, ToolCall};

/// External tool dispatch seam.
///
/// A tool call is `{name, arguments, description}`; the executor returns
/// the tool's string result or an error. Implementations must observe the
/// cancellation token.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute one tool call.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ToolFailure`] (or any other runtime error)
    /// when the tool cannot produce a result.
    async fn execute_tool_call(
        &self,
        call: &ToolCall,
        token: &CancellationToken,
    ) -> RuntimeResult<String>;
}

/// Reference stub: always errors.
///
/// Implementers must replace this with a real tool dispatcher; the stub
/// exists so that the executor's contract is runnable end-to-end.
pub struct StubToolExecutor;

#[async_trait]
impl ToolExecutor for StubToolExecutor {
    async fn execute_tool_call(
        &self,
        _call: &ToolCall,
        _token: &CancellationToken,
    ) -> RuntimeResult<String> {
        Err(RuntimeError::ToolExecutionNotImplemented)
    }
}

/// Progress report delivered to the registered callback.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// The plan being executed.
    pub plan_id: Uuid,
    /// Index of the step this update concerns.
    pub step_index: usize,
    /// Total number of steps.
    pub total_steps: usize,
    /// Id of the step.
    pub step_id: String,
    /// The step's new status.
    pub status: StepStatus,
}

/// Callback invoked on step transitions, outside the executor's lock.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

struct ExecState {
    plan: Plan,
    tool_executor: Option<Arc<dyn ToolExecutor>>,
    callback: Option<ProgressCallback>,
    continue_on_error: bool,
    token: CancellationToken,
}

/// Runs an approved plan sequentially with pause/resume and cancellation.
pub struct PlanExecutor {
    state: RwLock<ExecState>,
}

impl PlanExecutor {
    /// Create an executor over a plan.
    #[must_use]
    pub fn new(plan: Plan) -> Self {
        Self {
            state: RwLock::new(ExecState {
                plan,
                tool_executor: None,
                callback: None,
                continue_on_error: false,
                token: CancellationToken::new(),
            }),
        }
    }

    /// Install the tool dispatcher.
    pub fn set_tool_executor(&self, executor: Arc<dyn ToolExecutor>) {
        if let Ok(mut state) = self.state.write() {
            state.tool_executor = Some(executor);
        }
    }

    /// Install the progress callback.
    pub fn set_progress_callback(&self, callback: ProgressCallback) {
        if let Ok(mut state) = self.state.write() {
            state.callback = Some(callback);
        }
    }

    /// Whether a failed step advances the plan instead of failing it.
    pub fn set_continue_on_error(&self, continue_on_error: bool) {
        if let Ok(mut state) = self.state.write() {
            state.continue_on_error = continue_on_error;
        }
    }

    /// Snapshot of the plan.
    #[must_use]
    pub fn plan(&self) -> Plan {
        self.state
            .read()
            .map(|s| s.plan.clone())
            .unwrap_or_else(|_| Plan::new("", ""))
    }

    /// Current plan status.
    #[must_use]
    pub fn status(&self) -> PlanStatus {
        self.state
            .read()
            .map(|s| s.plan.status())
            .unwrap_or(PlanStatus::Failed)
    }

    /// Execute the plan from its current step to completion.
    ///
    /// A fresh cancellation token is created for this run.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidStateTransition`] unless the plan is
    /// Approved, [`RuntimeError::Cancelled`] if the run is cancelled, or
    /// the failing step's error when `continue_on_error` is off.
    pub async fn execute(&self) -> RuntimeResult<()> {
        let token = self.begin(PlanStatus::Approved)?;
        self.run_steps(&token, None).await
    }

    /// Resume a paused plan.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidStateTransition`] unless the plan is
    /// Paused, plus the same errors as [`PlanExecutor::execute`].
    pub async fn resume(&self) -> RuntimeResult<()> {
        let token = self.begin(PlanStatus::Paused)?;
        self.run_steps(&token, None).await
    }

    /// Execute exactly one step.
    ///
    /// Accepts an Approved or Paused plan; the plan stays Running with
    /// further steps pending, or completes if the step was the last.
    ///
    /// # Errors
    ///
    /// Same as [`PlanExecutor::execute`].
    pub async fn execute_next(&self) -> RuntimeResult<()> {
        let token = {
            let mut state = self
                .state
                .write()
                .map_err(|_| executor_poisoned())?;
            match state.plan.status() {
                PlanStatus::Approved | PlanStatus::Paused => {
                    state.plan.set_status(PlanStatus::Running)?;
                },
                PlanStatus::Running => {},
                // Already finished: a further single-step is a no-op.
                PlanStatus::Complete => return Ok(()),
                other => {
                    return Err(RuntimeError::InvalidStateTransition {
                        from: other.as_str(),
                        to: PlanStatus::Running.as_str(),
                    });
                },
            }
            // Fresh token per execute* call.
            state.token = CancellationToken::new();
            state.token.clone()
        };
        self.run_steps(&token, Some(1)).await
    }

    /// Pause a running plan between steps.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidStateTransition`] unless Running.
    pub fn pause(&self) -> RuntimeResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| executor_poisoned())?;
        state.plan.set_status(PlanStatus::Paused)?;
        info!(plan_id = %state.plan.id, "plan paused");
        Ok(())
    }

    /// Cancel the plan. Idempotent and safe from any state or thread.
    pub fn cancel(&self) {
        let token = self
            .state
            .read()
            .map(|s| s.token.clone())
            .ok();
        if let Some(token) = token {
            token.cancel();
        }
        if let Ok(mut state) = self.state.write()
            && !state.plan.status().is_terminal()
        {
            let _ = state.plan.set_status(PlanStatus::Cancelled);
            info!(plan_id = %state.plan.id, "plan cancelled");
        }
    }

    /// Validate the entry state, transition to Running, and mint a fresh
    /// cancellation token for this run.
    fn begin(&self, expected: PlanStatus) -> RuntimeResult<CancellationToken> {
        let mut state = self
            .state
            .write()
            .map_err(|_| executor_poisoned())?;
        let current = state.plan.status();
        if current != expected {
            return Err(RuntimeError::InvalidStateTransition {
                from: current.as_str(),
                to: PlanStatus::Running.as_str(),
            });
        }
        state.plan.set_status(PlanStatus::Running)?;
        state.token = CancellationToken::new();
        Ok(state.token.clone())
    }

    async fn run_steps(
        &self,
        token: &CancellationToken,
        mut budget: Option<usize>,
    ) -> RuntimeResult<()> {
        loop {
            // Cancellation is observed between steps.
            if token.is_cancelled() {
                self.finish_cancelled();
                return Err(RuntimeError::Cancelled);
            }

            let (step_index, total) = {
                let state = self.state.read().map_err(|_| executor_poisoned())?;
                match state.plan.status() {
                    PlanStatus::Running => {},
                    PlanStatus::Paused => return Ok(()),
                    PlanStatus::Cancelled => return Err(RuntimeError::Cancelled),
                    other => {
                        return Err(RuntimeError::InvalidStateTransition {
                            from: other.as_str(),
                            to: PlanStatus::Running.as_str(),
                        });
                    },
                }
                (state.plan.current_step_index(), state.plan.steps().len())
            };

            if step_index >= total {
                let mut state = self.state.write().map_err(|_| executor_poisoned())?;
                state.plan.set_status(PlanStatus::Complete)?;
                info!(plan_id = %state.plan.id, "plan complete");
                return Ok(());
            }

            if let Some(remaining) = budget {
                if remaining == 0 {
                    return Ok(());
                }
                budget = Some(remaining.saturating_sub(1));
            }

            self.run_step(step_index, token).await?;
        }
    }

    async fn run_step(&self, index: usize, token: &CancellationToken) -> RuntimeResult<()> {
        // Mark the step running and copy out what the await needs.
        let (plan_id, step_id, tool_calls, executor, callback, continue_on_error, total) = {
            let mut state = self.state.write().map_err(|_| executor_poisoned())?;
            let total = state.plan.steps().len();
            let executor = state.tool_executor.clone();
            let callback = state.callback.clone();
            let continue_on_error = state.continue_on_error;
            let plan_id = state.plan.id;
            let step = state
                .plan
                .step_mut(index)
                .ok_or_else(|| RuntimeError::StepNotFound(format!("index {index}")))?;
            step.status = StepStatus::Running;
            step.started_at = Some(Utc::now());
            (
                plan_id,
                step.id.clone(),
                step.tool_calls.clone(),
                executor,
                callback,
                continue_on_error,
                total,
            )
        };

        notify(&callback, plan_id, index, total, &step_id, StepStatus::Running);
        debug!(plan_id = %plan_id, step = %step_id, "step started");

        let mut failure: Option<RuntimeError> = None;
        let mut results: Vec<String> = Vec::new();

        if let Some(executor) = executor {
            for call in &tool_calls {
                // Cancellation is observed between tool calls.
                if token.is_cancelled() {
                    failure = Some(RuntimeError::Cancelled);
                    break;
                }
                match executor.execute_tool_call(call, token).await {
                    Ok(result) => results.push(format!("[{}] {result}", call.name)),
                    Err(e) => {
                        failure = Some(e);
                        break;
                    },
                }
            }
        } else {
            failure = Some(RuntimeError::ExecutorNotConfigured);
        }

        // Write the outcome back under the lock.
        let outcome = {
            let mut state = self.state.write().map_err(|_| executor_poisoned())?;
            let step = state
                .plan
                .step_mut(index)
                .ok_or_else(|| RuntimeError::StepNotFound(format!("index {index}")))?;
            for line in &results {
                step.result.push_str(line);
                step.result.push('\n');
            }
            step.completed_at = Some(Utc::now());

            match failure {
                None => {
                    step.status = StepStatus::Complete;
                    state.plan.advance();
                    Ok(StepStatus::Complete)
                },
                Some(RuntimeError::Cancelled) => {
                    // The step stays observable as Failed with a cancel note.
                    step.status = StepStatus::Failed;
                    step.error = Some("cancelled".to_owned());
                    let _ = state.plan.set_status(PlanStatus::Cancelled);
                    Err(RuntimeError::Cancelled)
                },
                Some(e) => {
                    step.status = StepStatus::Failed;
                    step.error = Some(e.to_string());
                    if continue_on_error {
                        warn!(plan_id = %plan_id, step = %step_id, error = %e, "step failed; continuing");
                        state.plan.advance();
                        Ok(StepStatus::Failed)
                    } else {
                        state.plan.error = Some(e.to_string());
                        let _ = state.plan.set_status(PlanStatus::Failed);
                        Err(e)
                    }
                },
            }
        };

        match outcome {
            Ok(status) => {
                notify(&callback, plan_id, index, total, &step_id, status);
                Ok(())
            },
            Err(e) => {
                notify(&callback, plan_id, index, total, &step_id, StepStatus::Failed);
                Err(e)
            },
        }
    }

    fn finish_cancelled(&self) {
        if let Ok(mut state) = self.state.write()
            && !state.plan.status().is_terminal()
        {
            let _ = state.plan.set_status(PlanStatus::Cancelled);
        }
    }
}

fn notify(
    callback: &Option<ProgressCallback>,
    plan_id: Uuid,
    step_index: usize,
    total_steps: usize,
    step_id: &str,
    status: StepStatus,
) {
    if let Some(callback) = callback {
        callback(ProgressUpdate {
            plan_id,
            step_index,
            total_steps,
            step_id: step_id.to_owned(),
            status,
        });
    }
}

fn executor_poisoned() -> RuntimeError {
    RuntimeError::Io(std::io::Error::other("executor lock poisoned"))
}
