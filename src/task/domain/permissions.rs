//! Permission evaluation over (actor, role, task) triples.
//!
//! Pure functions with no failure modes beyond returning `false`; the
//! callers turn a `false` into [`TaskDomainError::PermissionDenied`].
//!
//! [`TaskDomainError::PermissionDenied`]: super::TaskDomainError::PermissionDenied

use super::{ProjectRole, Task, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mutable task fields subject to permission evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskField {
    /// Lifecycle status.
    Status,
    /// Owning user.
    AssignedTo,
    /// Priority level.
    Priority,
    /// Ordering key.
    Sequence,
    /// Task title.
    Title,
    /// Free-form description.
    Description,
    /// Scheduled start date.
    StartDate,
    /// Due date.
    DueDate,
    /// Additional non-owning users.
    Participants,
    /// Display-only dependency link.
    Predecessor,
}

impl fmt::Display for TaskField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Status => "status",
            Self::AssignedTo => "assigned_to",
            Self::Priority => "priority",
            Self::Sequence => "sequence",
            Self::Title => "title",
            Self::Description => "description",
            Self::StartDate => "start_date",
            Self::DueDate => "due_date",
            Self::Participants => "participants",
            Self::Predecessor => "predecessor",
        };
        f.write_str(name)
    }
}

/// Returns true when the role carries project-wide task administration.
#[must_use]
pub const fn has_admin_capability(role: ProjectRole) -> bool {
    matches!(role, ProjectRole::Admin | ProjectRole::Manager)
}

/// Returns true when the actor is the task's assigned owner.
#[must_use]
pub fn is_owner(actor: UserId, task: &Task) -> bool {
    task.assigned_to() == actor
}

/// Returns true when the actor may mutate the given field of the task.
///
/// Status changes are open to admin capability or the assignee; every
/// other mutable field requires admin capability.
#[must_use]
pub fn can_mutate_field(actor: UserId, role: ProjectRole, task: &Task, field: TaskField) -> bool {
    match field {
        TaskField::Status => has_admin_capability(role) || is_owner(actor, task),
        _ => has_admin_capability(role),
    }
}
