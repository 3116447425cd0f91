//! Prelude module - commonly used types for convenient import.
//!
//! Use `use rigrun_runtime::prelude::*;` to import all essential types.

// Errors
pub use crate::{RuntimeError, RuntimeResult};

// Tasks
pub use crate::{CommandKind, Task, TaskNotification, TaskQueue, TaskStatus};

// Runner
pub use crate::{RunnerConfig, TaskRunner};

// Plans
pub use crate::{Plan, PlanStatus, PlanStep, StepStatus, ToolCall};

// Execution
pub use crate::{PlanExecutor, ProgressCallback, ProgressUpdate, StubToolExecutor, ToolExecutor};
