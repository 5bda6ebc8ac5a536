//! Status transition engine.
//!
//! Pure computations: a successful transition returns a new task value,
//! and committing it to the authoritative store is the coordinator's
//! responsibility.

use super::{
    ProjectRole, Task, TaskDomainError, TaskField, TaskStatus, UserId, can_mutate_field,
};
use mockable::Clock;

/// Validates and executes a status change.
///
/// # Errors
///
/// Returns [`TaskDomainError::PermissionDenied`] when the actor is neither
/// an admin/manager nor the assignee, and
/// [`TaskDomainError::InvalidStatusTransition`] when the task is already
/// done or the target equals the current status.
pub fn transition_status(
    actor: UserId,
    role: ProjectRole,
    task: &Task,
    target: TaskStatus,
    clock: &impl Clock,
) -> Result<Task, TaskDomainError> {
    if !can_mutate_field(actor, role, task, TaskField::Status) {
        return Err(TaskDomainError::PermissionDenied {
            actor,
            field: TaskField::Status,
        });
    }
    if !task.status().can_transition_to(target) {
        return Err(TaskDomainError::InvalidStatusTransition {
            from: task.status(),
            to: target,
        });
    }

    let mut updated = task.clone();
    updated.set_status(target, clock);
    Ok(updated)
}

/// Rejects mutation of ordering or scheduling fields on a done task.
///
/// # Errors
///
/// Returns [`TaskDomainError::TerminalTask`] when the task is done.
pub const fn guard_not_terminal(task: &Task) -> Result<(), TaskDomainError> {
    if task.status().is_terminal() {
        return Err(TaskDomainError::TerminalTask(task.id()));
    }
    Ok(())
}
