//! Shared fixtures for task unit tests.

use std::sync::Mutex;

use chrono::{DateTime, Local, NaiveDate, TimeDelta, TimeZone, Utc};
use mockable::Clock;

use crate::task::domain::{
    Priority, ProjectId, Task, TaskData, TaskId, TaskStatus, UserId,
};

/// Deterministic, manually advanced clock.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at the given instant.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Creates a clock frozen at the shared test epoch.
    pub fn fixed() -> Self {
        Self::at(test_epoch())
    }

    /// Moves the clock forward.
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().expect("clock lock");
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

/// Instant all fixture tasks are stamped with.
pub fn test_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0)
        .single()
        .expect("valid test epoch")
}

/// Shorthand for building fixture dates.
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
}

/// Builds a task as the authoritative store would return it.
pub fn make_task(
    project_id: ProjectId,
    assigned_to: UserId,
    status: TaskStatus,
    sequence: i64,
) -> Task {
    Task::from_authoritative(TaskData {
        id: TaskId::new(),
        project_id,
        title: format!("Task at {sequence}"),
        description: None,
        status,
        priority: Priority::Medium,
        sequence,
        assigned_to,
        participants: std::collections::BTreeSet::new(),
        start_date: date(2026, 3, 2),
        due_date: date(2026, 3, 16),
        predecessor: None,
        comment_count: 0,
        created_at: test_epoch(),
        updated_at: test_epoch(),
    })
}
