//! Error types for task domain validation and parsing.

use super::{TaskField, TaskId, TaskStatus, UserId};
use chrono::NaiveDate;
use thiserror::Error;

/// Errors returned while constructing or mutating domain task values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The actor lacks the capability required to mutate the field.
    #[error("user {actor} may not modify task field {field}")]
    PermissionDenied {
        /// The acting user.
        actor: UserId,
        /// The field the actor attempted to mutate.
        field: TaskField,
    },

    /// The requested status transition is not permitted.
    #[error("cannot transition task status from {from} to {to}")]
    InvalidStatusTransition {
        /// Current status of the task.
        from: TaskStatus,
        /// Requested target status.
        to: TaskStatus,
    },

    /// The task is complete and no longer accepts mutation.
    #[error("task {0} is done and can no longer change")]
    TerminalTask(TaskId),

    /// The task title is empty after trimming.
    #[error("task title must not be empty")]
    EmptyTitle,

    /// The due date precedes the start date.
    #[error("due date {due} precedes start date {start}")]
    DueBeforeStart {
        /// Scheduled start date.
        start: NaiveDate,
        /// Requested due date.
        due: NaiveDate,
    },

    /// A reorder index falls outside the project's current ordering.
    #[error("reorder index {index} outside ordering of length {len}")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of tasks in the ordering.
        len: usize,
    },
}

/// Error returned while parsing task statuses from external input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseStatusError(pub String);

/// Error returned while parsing task priorities from external input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task priority: {0}")]
pub struct ParsePriorityError(pub String);

/// Error returned while parsing project roles from external input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown project role: {0}")]
pub struct ParseRoleError(pub String);
