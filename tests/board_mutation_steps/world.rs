//! Shared world state for board mutation BDD scenarios.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use gantry::task::{
    adapters::memory::InMemoryProjectStore,
    domain::{Priority, ProjectId, ProjectRole, Task, TaskData, TaskId, TaskStatus, UserId},
    services::{BoardServiceError, TaskBoardService},
};
use mockable::DefaultClock;
use rstest::fixture;

/// Store type used by the BDD world.
pub type TestStore = InMemoryProjectStore<DefaultClock>;

/// Service type used by the BDD world.
pub type TestBoardService = TaskBoardService<TestStore, TestStore, DefaultClock>;

/// Scenario world for board mutation behaviour tests.
pub struct BoardWorld {
    /// Service under test.
    pub service: TestBoardService,
    /// Authoritative in-memory store behind the service.
    pub store: Arc<TestStore>,
    /// Project every scenario operates on.
    pub project: ProjectId,
    /// Users registered by scenario name.
    pub users: HashMap<String, UserId>,
    /// Tasks registered by title.
    pub tasks: HashMap<String, TaskId>,
    /// Tasks seeded before the board is loaded.
    pub pending_tasks: Vec<Task>,
    /// Outcome of the most recent request step.
    pub last_result: Option<Result<Task, BoardServiceError>>,
}

impl BoardWorld {
    /// Creates a world with an empty store and no scenario state.
    #[must_use]
    pub fn new() -> Self {
        let clock = Arc::new(DefaultClock);
        let store = Arc::new(InMemoryProjectStore::new(Arc::clone(&clock)));
        let service = TaskBoardService::new(Arc::clone(&store), Arc::clone(&store), clock);

        Self {
            service,
            store,
            project: ProjectId::new(),
            users: HashMap::new(),
            tasks: HashMap::new(),
            pending_tasks: Vec::new(),
            last_result: None,
        }
    }

    /// Registers a user under a scenario name.
    pub fn register_user(
        &mut self,
        name: &str,
        role: ProjectRole,
    ) -> Result<UserId, eyre::Report> {
        let user = UserId::new();
        self.store
            .insert_member(self.project, user, role)
            .map_err(|err| eyre::eyre!("register member: {err}"))?;
        self.users.insert(name.to_owned(), user);
        Ok(user)
    }

    /// Looks up a registered user by scenario name.
    pub fn user(&self, name: &str) -> Result<UserId, eyre::Report> {
        self.users
            .get(name)
            .copied()
            .ok_or_else(|| eyre::eyre!("unknown scenario user: {name}"))
    }

    /// Looks up a seeded task by title.
    pub fn task(&self, title: &str) -> Result<TaskId, eyre::Report> {
        self.tasks
            .get(title)
            .copied()
            .ok_or_else(|| eyre::eyre!("unknown scenario task: {title}"))
    }

    /// Builds an authoritative task for seeding.
    pub fn build_task(&self, title: &str, assigned_to: UserId, sequence: i64) -> Task {
        let created_at = Utc
            .with_ymd_and_hms(2026, 3, 2, 9, 0, 0)
            .single()
            .unwrap_or_default();
        Task::from_authoritative(TaskData {
            id: TaskId::new(),
            project_id: self.project,
            title: title.to_owned(),
            description: None,
            status: TaskStatus::Todo,
            priority: Priority::Medium,
            sequence,
            assigned_to,
            participants: BTreeSet::new(),
            start_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap_or_default(),
            due_date: NaiveDate::from_ymd_opt(2026, 3, 16).unwrap_or_default(),
            predecessor: None,
            comment_count: 0,
            created_at,
            updated_at: created_at,
        })
    }
}

impl Default for BoardWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> BoardWorld {
    BoardWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
