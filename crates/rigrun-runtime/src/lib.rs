//! Rigrun Runtime - Background tasks and multi-step plan execution.
//!
//! This crate provides:
//! - Tasks with a validated status state machine ([`Task`], [`TaskStatus`])
//! - A bounded FIFO queue with terminal-transition notifications
//!   ([`TaskQueue`])
//! - A bounded-concurrency runner for shell and sleep tasks with
//!   cancellation, timeouts, and output streaming ([`TaskRunner`])
//! - Plans, plan steps, and the sequential plan executor with
//!   pause/resume and per-step cancellation ([`Plan`], [`PlanExecutor`])
//! - The external tool-dispatch seam ([`ToolExecutor`])
//!
//! # Cancellation
//!
//! Every long operation takes a cooperative cancellation token and
//! observes it at each logical boundary: before each task's execution,
//! between plan steps, between tool calls within a step, and at each
//! sleep tick. Repeated cancels are no-ops.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod executor;
mod plan;
mod queue;
mod runner;
mod task;

pub use error::{RuntimeError, RuntimeResult};
pub use executor::{PlanExecutor, ProgressCallback, ProgressUpdate, StubToolExecutor, ToolExecutor};
pub use plan::{Plan, PlanStatus, PlanStep, StepStatus, ToolCall};
pub use queue::{TaskNotification, TaskQueue};
pub use runner::{RunnerConfig, TaskRunner};
pub use task::{CommandKind, Task, TaskStatus};
