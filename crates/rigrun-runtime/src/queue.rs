//! The bounded task queue.
//!
//! The queue owns every task; the runner transitions them through the
//! queue's `mark_*` methods, and reader accessors hand out clones (which
//! share the live output buffer). Terminal transitions emit a
//! notification into a bounded ring (capacity 100); on overflow the
//! oldest notification is dropped and a warning is audited.
//!
//! History retention evicts the earliest *completed* tasks once their
//! count exceeds `max_history`, in insertion (FIFO) order rather than
//! time-of-completion order.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use rigrun_audit::{AuditEmitter, AuditEvent, AuditKind};
use rigrun_core::SessionId;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{RuntimeError, RuntimeResult};
use crate::task::{Task, TaskStatus};

/// Capacity of the notification ring.
const NOTIFICATION_CAPACITY: usize = 100;

/// Default bound on queued (not yet running) tasks.
const DEFAULT_MAX_QUEUE_SIZE: usize = 100;

/// Default bound on retained terminal tasks.
const DEFAULT_MAX_HISTORY: usize = 50;

/// Emitted on every terminal transition.
#[derive(Debug, Clone)]
pub struct TaskNotification {
    /// The task that finished.
    pub task_id: Uuid,
    /// Its description.
    pub description: String,
    /// The terminal status.
    pub status: TaskStatus,
    /// The terminal error, if any.
    pub error: Option<String>,
    /// Wall-clock duration from start to finish, when both are known.
    pub duration: Option<chrono::Duration>,
}

struct QueueInner {
    tasks: Vec<Task>,
    notifications: VecDeque<TaskNotification>,
}

/// Bounded-history FIFO task queue.
pub struct TaskQueue {
    inner: RwLock<QueueInner>,
    max_queue_size: usize,
    max_history: usize,
    emitter: Arc<AuditEmitter>,
    session_id: SessionId,
}

impl TaskQueue {
    /// Create a queue with the default bounds.
    #[must_use]
    pub fn new(emitter: Arc<AuditEmitter>) -> Self {
        Self::with_bounds(DEFAULT_MAX_QUEUE_SIZE, DEFAULT_MAX_HISTORY, emitter)
    }

    /// Create a queue with explicit bounds.
    #[must_use]
    pub fn with_bounds(
        max_queue_size: usize,
        max_history: usize,
        emitter: Arc<AuditEmitter>,
    ) -> Self {
        Self {
            inner: RwLock::new(QueueInner {
                tasks: Vec::new(),
                notifications: VecDeque::new(),
            }),
            max_queue_size,
            max_history,
            emitter,
            session_id: SessionId::new(),
        }
    }

    /// Enqueue a task.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::QueueFull`] when the queued (not yet
    /// running) count is at capacity.
    pub fn add(&self, task: Task) -> RuntimeResult<Uuid> {
        let mut inner = self.write()?;
        let queued = inner
            .tasks
            .iter()
            .filter(|t| t.status() == TaskStatus::Queued)
            .count();
        if queued >= self.max_queue_size {
            return Err(RuntimeError::QueueFull {
                capacity: self.max_queue_size,
            });
        }
        let id = task.id;
        debug!(task_id = %id, description = %task.description, "task queued");
        inner.tasks.push(task);
        Ok(id)
    }

    /// Clone of the task with the given id.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<Task> {
        self.inner
            .read()
            .ok()
            .and_then(|inner| inner.tasks.iter().find(|t| t.id == id).cloned())
    }

    /// Clones of all tasks in insertion order.
    #[must_use]
    pub fn all(&self) -> Vec<Task> {
        self.inner
            .read()
            .map(|inner| inner.tasks.clone())
            .unwrap_or_default()
    }

    /// The first queued task, as a working clone sharing live buffers.
    ///
    /// The runner transitions it via [`TaskQueue::mark_running`]; the
    /// shared buffers make output and progress visible to readers.
    #[must_use]
    pub fn next_queued(&self) -> Option<Task> {
        self.inner.read().ok().and_then(|inner| {
            inner
                .tasks
                .iter()
                .find(|t| t.status() == TaskStatus::Queued)
                .cloned()
        })
    }

    /// Number of currently running tasks.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.inner
            .read()
            .map(|inner| {
                inner
                    .tasks
                    .iter()
                    .filter(|t| t.status() == TaskStatus::Running)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Cancel a task.
    ///
    /// A queued task is transitioned to Canceled directly; a running
    /// task has its cancel handle triggered and the runner performs the
    /// terminal transition. Idempotent: cancelling a terminal task is a
    /// no-op and emits no further notification.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::TaskNotFound`] for unknown ids.
    pub fn cancel(&self, id: Uuid) -> RuntimeResult<()> {
        let mut inner = self.write()?;
        let task = inner
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(RuntimeError::TaskNotFound(id))?;

        match task.status() {
            TaskStatus::Queued => {
                task.set_status(TaskStatus::Canceled)?;
                task.completed_at = Some(Utc::now());
                let notification = notification_for(task);
                self.push_notification(&mut inner, notification);
                self.evict_history(&mut inner);
                Ok(())
            },
            TaskStatus::Running => {
                if let Some(token) = task.cancel_handle() {
                    token.cancel();
                }
                Ok(())
            },
            // Already terminal: nothing to do.
            _ => Ok(()),
        }
    }

    /// Transition a task to Running and stamp its start time.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::TaskNotFound`] or
    /// [`RuntimeError::InvalidStateTransition`].
    pub fn mark_running(&self, id: Uuid) -> RuntimeResult<()> {
        let mut inner = self.write()?;
        let task = inner
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(RuntimeError::TaskNotFound(id))?;
        task.set_status(TaskStatus::Running)?;
        task.started_at = Some(Utc::now());
        Ok(())
    }

    /// Transition a task to Complete.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::TaskNotFound`] or
    /// [`RuntimeError::InvalidStateTransition`].
    pub fn mark_complete(&self, id: Uuid) -> RuntimeResult<()> {
        self.finish(id, TaskStatus::Complete, None)
    }

    /// Transition a task to Failed with an error message.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::TaskNotFound`] or
    /// [`RuntimeError::InvalidStateTransition`].
    pub fn mark_failed(&self, id: Uuid, error: impl Into<String>) -> RuntimeResult<()> {
        self.finish(id, TaskStatus::Failed, Some(error.into()))
    }

    /// Transition a task to Canceled.
    ///
    /// Idempotent over already-canceled tasks.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::TaskNotFound`] or
    /// [`RuntimeError::InvalidStateTransition`] from a terminal
    /// non-canceled state.
    pub fn mark_canceled(&self, id: Uuid) -> RuntimeResult<()> {
        {
            let inner = self
                .inner
                .read()
                .map_err(|_| poisoned())?;
            if let Some(task) = inner.tasks.iter().find(|t| t.id == id)
                && task.status() == TaskStatus::Canceled
            {
                return Ok(());
            }
        }
        self.finish(id, TaskStatus::Canceled, None)
    }

    /// Drain all pending notifications, oldest first.
    #[must_use]
    pub fn drain_notifications(&self) -> Vec<TaskNotification> {
        self.inner
            .write()
            .map(|mut inner| inner.notifications.drain(..).collect())
            .unwrap_or_default()
    }

    fn finish(&self, id: Uuid, status: TaskStatus, error: Option<String>) -> RuntimeResult<()> {
        let mut inner = self.write()?;
        let task = inner
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(RuntimeError::TaskNotFound(id))?;

        task.set_status(status)?;
        task.completed_at = Some(Utc::now());
        task.error = error;

        debug!(task_id = %id, status = %status, "task finished");
        let notification = notification_for(task);
        self.push_notification(&mut inner, notification);
        self.evict_history(&mut inner);
        Ok(())
    }

    fn push_notification(&self, inner: &mut QueueInner, notification: TaskNotification) {
        if inner.notifications.len() >= NOTIFICATION_CAPACITY {
            inner.notifications.pop_front();
            warn!("task notification ring full; dropped oldest");
            self.emitter.emit(
                AuditEvent::new(AuditKind::TaskNotificationDropped, self.session_id.clone())
                    .failed(),
            );
        }
        inner.notifications.push_back(notification);
    }

    /// Evict the earliest completed tasks, in insertion order, while the
    /// completed count exceeds `max_history`.
    fn evict_history(&self, inner: &mut QueueInner) {
        let mut completed = inner
            .tasks
            .iter()
            .filter(|t| t.status().is_terminal())
            .count();
        while completed > self.max_history {
            if let Some(pos) = inner.tasks.iter().position(|t| t.status().is_terminal()) {
                inner.tasks.remove(pos);
                completed = completed.saturating_sub(1);
            } else {
                break;
            }
        }
    }

    fn write(&self) -> RuntimeResult<std::sync::RwLockWriteGuard<'_, QueueInner>> {
        self.inner.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> RuntimeError {
    RuntimeError::Io(std::io::Error::other("queue lock poisoned"))
}

fn notification_for(task: &Task) -> TaskNotification {
    let duration = match (task.started_at, task.completed_at) {
        (Some(start), Some(end)) => Some(end.signed_duration_since(start)),
        _ => None,
    };
    TaskNotification {
        task_id: task.id,
        description: task.description.clone(),
        status: task.status(),
        error: task.error.clone(),
        duration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::CommandKind;
    use rigrun_audit::MemorySink;

    fn queue(max_queue: usize, max_history: usize) -> (Arc<MemorySink>, TaskQueue) {
        let sink = Arc::new(MemorySink::new());
        let emitter = Arc::new(AuditEmitter::new(sink.clone()));
        (sink, TaskQueue::with_bounds(max_queue, max_history, emitter))
    }

    fn bash_task(desc: &str) -> Task {
        Task::new(desc, CommandKind::Bash, vec!["true".to_owned()])
    }

    #[test]
    fn test_add_and_get() {
        let (_sink, queue) = queue(10, 10);
        let id = queue.add(bash_task("one")).unwrap();
        assert_eq!(queue.get(id).unwrap().description, "one");
        assert!(queue.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_queue_full() {
        let (_sink, queue) = queue(2, 10);
        queue.add(bash_task("a")).unwrap();
        queue.add(bash_task("b")).unwrap();
        assert!(matches!(
            queue.add(bash_task("c")),
            Err(RuntimeError::QueueFull { capacity: 2 })
        ));
    }

    #[test]
    fn test_running_tasks_do_not_count_toward_queue_bound() {
        let (_sink, queue) = queue(1, 10);
        let id = queue.add(bash_task("a")).unwrap();
        queue.mark_running(id).unwrap();
        // The slot freed up once the task left Queued.
        queue.add(bash_task("b")).unwrap();
    }

    #[test]
    fn test_terminal_transition_emits_notification() {
        let (_sink, queue) = queue(10, 10);
        let id = queue.add(bash_task("a")).unwrap();
        queue.mark_running(id).unwrap();
        queue.mark_complete(id).unwrap();

        let notes = queue.drain_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].task_id, id);
        assert_eq!(notes[0].status, TaskStatus::Complete);
        assert!(notes[0].duration.is_some());
    }

    #[test]
    fn test_notification_ring_drops_oldest_and_audits() {
        let (sink, queue) = queue(200, 200);
        let mut first = None;
        for i in 0..101 {
            let id = queue.add(bash_task(&format!("t{i}"))).unwrap();
            first.get_or_insert(id);
            queue.mark_running(id).unwrap();
            queue.mark_complete(id).unwrap();
        }

        let notes = queue.drain_notifications();
        assert_eq!(notes.len(), 100);
        // The very first notification was dropped.
        assert!(notes.iter().all(|n| Some(n.task_id) != first));
        assert!(
            sink.events()
                .iter()
                .any(|e| e.event_type == AuditKind::TaskNotificationDropped)
        );
    }

    #[test]
    fn test_cancel_queued_task() {
        let (_sink, queue) = queue(10, 10);
        let id = queue.add(bash_task("a")).unwrap();
        queue.cancel(id).unwrap();
        assert_eq!(queue.get(id).unwrap().status(), TaskStatus::Canceled);
        assert_eq!(queue.drain_notifications().len(), 1);
    }

    #[test]
    fn test_cancel_is_idempotent_with_one_notification() {
        let (_sink, queue) = queue(10, 10);
        let id = queue.add(bash_task("a")).unwrap();
        queue.cancel(id).unwrap();
        queue.cancel(id).unwrap();
        queue.cancel(id).unwrap();

        assert_eq!(queue.get(id).unwrap().status(), TaskStatus::Canceled);
        assert_eq!(queue.drain_notifications().len(), 1);
    }

    #[test]
    fn test_cancel_running_triggers_handle() {
        let (_sink, queue) = queue(10, 10);
        let task = bash_task("a");
        let token = tokio_util::sync::CancellationToken::new();
        task.set_cancel_handle(token.clone()).unwrap();
        let id = queue.add(task).unwrap();
        queue.mark_running(id).unwrap();

        queue.cancel(id).unwrap();
        assert!(token.is_cancelled());
        // Still Running until the runner observes the cancellation.
        assert_eq!(queue.get(id).unwrap().status(), TaskStatus::Running);

        queue.mark_canceled(id).unwrap();
        assert_eq!(queue.get(id).unwrap().status(), TaskStatus::Canceled);
    }

    #[test]
    fn test_mark_canceled_idempotent() {
        let (_sink, queue) = queue(10, 10);
        let id = queue.add(bash_task("a")).unwrap();
        queue.cancel(id).unwrap();
        // Second mark is a no-op, not an invalid transition.
        queue.mark_canceled(id).unwrap();
        assert_eq!(queue.drain_notifications().len(), 1);
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let (_sink, queue) = queue(10, 10);
        let id = queue.add(bash_task("a")).unwrap();
        // Queued -> Complete is not in the graph.
        assert!(matches!(
            queue.mark_complete(id),
            Err(RuntimeError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_history_eviction_is_fifo_by_insertion() {
        let (_sink, queue) = queue(10, 2);
        let ids: Vec<Uuid> = (0..4)
            .map(|i| queue.add(bash_task(&format!("t{i}"))).unwrap())
            .collect();

        // Finish them out of insertion order: t1, t0, t2, t3.
        for &i in &[1usize, 0, 2, 3] {
            queue.mark_running(ids[i]).unwrap();
            queue.mark_complete(ids[i]).unwrap();
        }

        // Eviction removed the earliest *inserted* terminal tasks (t0, t1),
        // not the earliest finished.
        let remaining: Vec<Uuid> = queue.all().iter().map(|t| t.id).collect();
        assert_eq!(remaining, vec![ids[2], ids[3]]);
    }
}
