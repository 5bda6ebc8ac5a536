//! Task aggregate root and its lifecycle value types.

use super::{ParsePriorityError, ParseStatusError, ProjectId, TaskDomainError, TaskId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task has been created but work has not started.
    Todo,
    /// Task is being worked on.
    InProgress,
    /// Task work is temporarily paused.
    Suspended,
    /// Task is waiting on something outside it.
    Blocked,
    /// Task has been completed. Terminal.
    Done,
}

impl TaskStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Suspended => "suspended",
            Self::Blocked => "blocked",
            Self::Done => "done",
        }
    }

    /// Returns true when no further transitions may leave this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true when a task in this status may move to `target`.
    ///
    /// Any non-terminal status may move to any *other* status, including
    /// directly to [`TaskStatus::Done`]. Nothing leaves `Done`, and a
    /// same-status request is rejected rather than silently committed.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        !self.is_terminal() && self != target
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "todo" => Ok(Self::Todo),
            "in_progress" => Ok(Self::InProgress),
            "suspended" => Ok(Self::Suspended),
            "blocked" => Ok(Self::Blocked),
            "done" => Ok(Self::Done),
            _ => Err(ParseStatusError(value.to_owned())),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Low priority.
    Low,
    /// Default priority.
    Medium,
    /// High priority.
    High,
}

impl Priority {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl TryFrom<&str> for Priority {
    type Error = ParsePriorityError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(ParsePriorityError(value.to_owned())),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task aggregate root.
///
/// Fields are private; mutation goes through validated methods that stamp
/// `updated_at` from the injected clock. The coordinator owns the only
/// mutable copies, so equality between two `Task` values is exact
/// field-for-field equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    project_id: ProjectId,
    title: String,
    description: Option<String>,
    status: TaskStatus,
    priority: Priority,
    sequence: i64,
    assigned_to: UserId,
    participants: BTreeSet<UserId>,
    start_date: NaiveDate,
    due_date: NaiveDate,
    predecessor: Option<TaskId>,
    comment_count: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for creating a new task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTaskParams {
    /// Owning project.
    pub project_id: ProjectId,
    /// Task title; must not be empty after trimming.
    pub title: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Priority level.
    pub priority: Priority,
    /// Owning user.
    pub assigned_to: UserId,
    /// Additional non-owning users.
    pub participants: BTreeSet<UserId>,
    /// Scheduled start date.
    pub start_date: NaiveDate,
    /// Due date; must not precede `start_date`.
    pub due_date: NaiveDate,
    /// Optional display-only dependency link.
    pub predecessor: Option<TaskId>,
    /// Ordering key within the project.
    pub sequence: i64,
}

/// Parameter object for reconstructing a task from an authoritative
/// snapshot returned by the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskData {
    /// Task identifier.
    pub id: TaskId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Task title.
    pub title: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Priority level.
    pub priority: Priority,
    /// Ordering key within the project.
    pub sequence: i64,
    /// Owning user.
    pub assigned_to: UserId,
    /// Additional non-owning users.
    pub participants: BTreeSet<UserId>,
    /// Scheduled start date.
    pub start_date: NaiveDate,
    /// Due date.
    pub due_date: NaiveDate,
    /// Optional display-only dependency link.
    pub predecessor: Option<TaskId>,
    /// Comment counter maintained by the remote store.
    pub comment_count: u32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new task in [`TaskStatus::Todo`].
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTitle`] when the title trims to
    /// nothing, or [`TaskDomainError::DueBeforeStart`] when the due date
    /// precedes the start date.
    pub fn create(params: NewTaskParams, clock: &impl Clock) -> Result<Self, TaskDomainError> {
        let title = params.title.trim().to_owned();
        if title.is_empty() {
            return Err(TaskDomainError::EmptyTitle);
        }
        validate_dates(params.start_date, params.due_date)?;

        let timestamp = clock.utc();
        Ok(Self {
            id: TaskId::new(),
            project_id: params.project_id,
            title,
            description: params.description,
            status: TaskStatus::Todo,
            priority: params.priority,
            sequence: params.sequence,
            assigned_to: params.assigned_to,
            participants: params.participants,
            start_date: params.start_date,
            due_date: params.due_date,
            predecessor: params.predecessor,
            comment_count: 0,
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    /// Reconstructs a task from an authoritative snapshot.
    #[must_use]
    pub fn from_authoritative(data: TaskData) -> Self {
        Self {
            id: data.id,
            project_id: data.project_id,
            title: data.title,
            description: data.description,
            status: data.status,
            priority: data.priority,
            sequence: data.sequence,
            assigned_to: data.assigned_to,
            participants: data.participants,
            start_date: data.start_date,
            due_date: data.due_date,
            predecessor: data.predecessor,
            comment_count: data.comment_count,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the owning project identifier.
    #[must_use]
    pub const fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Returns the task title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the task description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the priority level.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Returns the ordering key within the project.
    #[must_use]
    pub const fn sequence(&self) -> i64 {
        self.sequence
    }

    /// Returns the owning user.
    #[must_use]
    pub const fn assigned_to(&self) -> UserId {
        self.assigned_to
    }

    /// Returns the additional non-owning users.
    #[must_use]
    pub const fn participants(&self) -> &BTreeSet<UserId> {
        &self.participants
    }

    /// Returns the scheduled start date.
    #[must_use]
    pub const fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    /// Returns the due date.
    #[must_use]
    pub const fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    /// Returns the display-only dependency link, if any.
    #[must_use]
    pub const fn predecessor(&self) -> Option<TaskId> {
        self.predecessor
    }

    /// Returns the comment counter maintained by the remote store.
    #[must_use]
    pub const fn comment_count(&self) -> u32 {
        self.comment_count
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest mutation timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Reschedules the task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::TerminalTask`] for a done task or
    /// [`TaskDomainError::DueBeforeStart`] for an inverted date range.
    pub fn reschedule(
        &mut self,
        start_date: NaiveDate,
        due_date: NaiveDate,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        if self.status.is_terminal() {
            return Err(TaskDomainError::TerminalTask(self.id));
        }
        validate_dates(start_date, due_date)?;
        self.start_date = start_date;
        self.due_date = due_date;
        self.touch(clock);
        Ok(())
    }

    /// Sets the lifecycle status. Transition validation happens in the
    /// transition engine; this only stamps the change.
    pub(crate) fn set_status(&mut self, status: TaskStatus, clock: &impl Clock) {
        self.status = status;
        self.touch(clock);
    }

    /// Sets the ordering key. Terminal and permission guards happen in the
    /// callers; this only stamps the change.
    pub(crate) fn set_sequence(&mut self, sequence: i64, clock: &impl Clock) {
        self.sequence = sequence;
        self.touch(clock);
    }

    /// Copies counters the remote store maintains, without treating the
    /// task as locally mutated.
    pub(crate) fn refresh_counters(&mut self, authoritative: &Self) {
        self.comment_count = authoritative.comment_count;
    }

    /// Updates the `updated_at` timestamp to the current clock time.
    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}

/// Validates that the due date does not precede the start date.
fn validate_dates(start: NaiveDate, due: NaiveDate) -> Result<(), TaskDomainError> {
    if due < start {
        return Err(TaskDomainError::DueBeforeStart { start, due });
    }
    Ok(())
}
