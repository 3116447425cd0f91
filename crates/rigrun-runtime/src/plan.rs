//! Plans and plan steps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{RuntimeError, RuntimeResult};

/// Plan lifecycle states.
///
/// Valid transitions: Draft→Approved (via [`Plan::approve`]),
/// Approved→Running, Running↔Paused, Running→{Complete, Failed,
/// Cancelled}. Cancellation is additionally reachable from any
/// non-terminal state so that `cancel` is safe to call anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Being edited; not yet approved.
    Draft,
    /// Approved and ready to run.
    Approved,
    /// Executing.
    Running,
    /// Suspended between steps.
    Paused,
    /// Every step finished.
    Complete,
    /// A step failed and the plan stopped.
    Failed,
    /// Cancelled before completion.
    Cancelled,
}

impl PlanStatus {
    /// Whether this state has no outgoing transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Cancelled)
    }

    /// Whether `self → next` is in the allowed transition graph.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Draft, Self::Approved)
            | (Self::Approved, Self::Running)
            | (Self::Running, Self::Paused | Self::Complete | Self::Failed)
            | (Self::Paused, Self::Running) => true,
            (from, Self::Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Approved => "approved",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not yet reached.
    Pending,
    /// Executing.
    Running,
    /// Finished cleanly.
    Complete,
    /// A tool call failed.
    Failed,
    /// Skipped by the operator.
    Skipped,
}

/// One tool invocation within a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool name, resolved by the external tool executor.
    pub name: String,
    /// Argument map passed to the tool.
    pub arguments: serde_json::Map<String, Value>,
    /// What this call is for.
    pub description: String,
}

impl ToolCall {
    /// Create a call with empty arguments.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: serde_json::Map::new(),
            description: description.into(),
        }
    }
}

/// One step of a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// Step id, unique within the plan.
    pub id: String,
    /// What the step does.
    pub description: String,
    /// Tool calls executed in order.
    pub tool_calls: Vec<ToolCall>,
    /// Current status.
    pub status: StepStatus,
    /// Accumulated tool results, each prefixed `[<tool-name>] `.
    pub result: String,
    /// Failure detail, if the step failed.
    pub error: Option<String>,
    /// When execution started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the step finished.
    pub completed_at: Option<DateTime<Utc>>,
    /// Ids of steps this one depends on.
    pub dependencies: Vec<String>,
    /// Whether the operator may edit this step before approval.
    pub editable: bool,
}

impl PlanStep {
    /// Create a pending, editable step with no tool calls.
    #[must_use]
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            tool_calls: Vec::new(),
            status: StepStatus::Pending,
            result: String::new(),
            error: None,
            started_at: None,
            completed_at: None,
            dependencies: Vec::new(),
            editable: true,
        }
    }

    /// Attach a tool call.
    #[must_use]
    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.tool_calls.push(call);
        self
    }
}

/// A multi-step execution plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Unique plan id.
    pub id: Uuid,
    /// Short description.
    pub description: String,
    /// The original task text the plan was derived from.
    pub original_task: String,
    status: PlanStatus,
    steps: Vec<PlanStep>,
    current_step: usize,
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// When the plan last changed.
    pub updated_at: DateTime<Utc>,
    /// Terminal error, if the plan failed.
    pub error: Option<String>,
}

impl Plan {
    /// Create an empty draft plan.
    #[must_use]
    pub fn new(description: impl Into<String>, original_task: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            original_task: original_task.into(),
            status: PlanStatus::Draft,
            steps: Vec::new(),
            current_step: 0,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> PlanStatus {
        self.status
    }

    /// The steps in order.
    #[must_use]
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Mutable access to a step by index.
    pub(crate) fn step_mut(&mut self, index: usize) -> Option<&mut PlanStep> {
        self.steps.get_mut(index)
    }

    /// Index of the next step to execute.
    #[must_use]
    pub fn current_step_index(&self) -> usize {
        self.current_step
    }

    pub(crate) fn advance(&mut self) {
        self.current_step = self.current_step.saturating_add(1);
        self.updated_at = Utc::now();
    }

    /// Approve a draft plan.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::EmptyPlan`] for plans with zero steps and
    /// [`RuntimeError::InvalidStateTransition`] for non-Draft plans.
    pub fn approve(&mut self) -> RuntimeResult<()> {
        if self.status != PlanStatus::Draft {
            return Err(RuntimeError::InvalidStateTransition {
                from: self.status.as_str(),
                to: PlanStatus::Approved.as_str(),
            });
        }
        if self.steps.is_empty() {
            return Err(RuntimeError::EmptyPlan);
        }
        self.set_status(PlanStatus::Approved)
    }

    /// Transition to `next`, validating against the transition graph.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidStateTransition`] for edges outside
    /// the graph.
    pub fn set_status(&mut self, next: PlanStatus) -> RuntimeResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(RuntimeError::InvalidStateTransition {
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Insert a step at `index`, clamping past-the-end indices to the
    /// current length.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::DuplicateStepId`] if another step already
    /// carries the same id.
    pub fn insert_step(&mut self, index: usize, step: PlanStep) -> RuntimeResult<()> {
        if self.steps.iter().any(|s| s.id == step.id) {
            return Err(RuntimeError::DuplicateStepId(step.id));
        }
        let index = index.min(self.steps.len());
        self.steps.insert(index, step);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Replace the step at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::StepNotFound`] for out-of-range indices and
    /// [`RuntimeError::DuplicateStepId`] if the replacement's id collides
    /// with a *different* step (self-update keeps its id).
    pub fn update_step(&mut self, index: usize, step: PlanStep) -> RuntimeResult<()> {
        if index >= self.steps.len() {
            return Err(RuntimeError::StepNotFound(format!("index {index}")));
        }
        let collision = self
            .steps
            .iter()
            .enumerate()
            .any(|(i, s)| i != index && s.id == step.id);
        if collision {
            return Err(RuntimeError::DuplicateStepId(step.id));
        }
        self.steps[index] = step;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_step_plan() -> Plan {
        let mut plan = Plan::new("demo", "do the thing");
        for i in 1..=3 {
            plan.insert_step(usize::MAX, PlanStep::new(format!("s{i}"), format!("step {i}")))
                .unwrap();
        }
        plan
    }

    #[test]
    fn test_approve_empty_plan_fails() {
        let mut plan = Plan::new("empty", "nothing");
        assert!(matches!(plan.approve(), Err(RuntimeError::EmptyPlan)));
        assert_eq!(plan.status(), PlanStatus::Draft);
    }

    #[test]
    fn test_approve_draft_with_steps() {
        let mut plan = three_step_plan();
        plan.approve().unwrap();
        assert_eq!(plan.status(), PlanStatus::Approved);
    }

    #[test]
    fn test_approve_twice_fails() {
        let mut plan = three_step_plan();
        plan.approve().unwrap();
        assert!(matches!(
            plan.approve(),
            Err(RuntimeError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_status_graph() {
        let mut plan = three_step_plan();
        plan.approve().unwrap();
        plan.set_status(PlanStatus::Running).unwrap();
        plan.set_status(PlanStatus::Paused).unwrap();
        plan.set_status(PlanStatus::Running).unwrap();
        plan.set_status(PlanStatus::Complete).unwrap();

        // Terminal states absorb.
        assert!(plan.set_status(PlanStatus::Running).is_err());
        assert!(plan.set_status(PlanStatus::Cancelled).is_err());
    }

    #[test]
    fn test_draft_cannot_run_directly() {
        let mut plan = three_step_plan();
        assert!(plan.set_status(PlanStatus::Running).is_err());
    }

    #[test]
    fn test_cancel_reachable_from_non_terminal_states() {
        let mut draft = three_step_plan();
        draft.set_status(PlanStatus::Cancelled).unwrap();

        let mut paused = three_step_plan();
        paused.approve().unwrap();
        paused.set_status(PlanStatus::Running).unwrap();
        paused.set_status(PlanStatus::Paused).unwrap();
        paused.set_status(PlanStatus::Cancelled).unwrap();
    }

    #[test]
    fn test_insert_step_clamps_index() {
        let mut plan = three_step_plan();
        plan.insert_step(999, PlanStep::new("s4", "tail")).unwrap();
        assert_eq!(plan.steps().last().unwrap().id, "s4");

        plan.insert_step(0, PlanStep::new("s0", "head")).unwrap();
        assert_eq!(plan.steps().first().unwrap().id, "s0");
    }

    #[test]
    fn test_insert_duplicate_id_rejected() {
        let mut plan = three_step_plan();
        assert!(matches!(
            plan.insert_step(0, PlanStep::new("s1", "dup")),
            Err(RuntimeError::DuplicateStepId(_))
        ));
    }

    #[test]
    fn test_update_step_allows_self_keeps_id() {
        let mut plan = three_step_plan();
        let mut replacement = PlanStep::new("s2", "rewritten");
        replacement.editable = false;
        plan.update_step(1, replacement).unwrap();
        assert_eq!(plan.steps()[1].description, "rewritten");
    }

    #[test]
    fn test_update_step_rejects_collision() {
        let mut plan = three_step_plan();
        assert!(matches!(
            plan.update_step(1, PlanStep::new("s3", "steal id")),
            Err(RuntimeError::DuplicateStepId(_))
        ));
    }

    #[test]
    fn test_update_step_out_of_range() {
        let mut plan = three_step_plan();
        assert!(matches!(
            plan.update_step(9, PlanStep::new("s9", "nope")),
            Err(RuntimeError::StepNotFound(_))
        ));
    }
}
