//! Optimistic concurrency coordinator for the task board.
//!
//! All mutation of the local task projection goes through
//! [`TaskBoardService`]: view layers call its request methods and read
//! ordered snapshots back, never touching task state directly. Mutations
//! are applied locally first, committed to the authoritative store, and
//! rolled back to the pre-mutation snapshot when the commit fails. A
//! per-task lease keeps concurrent mutations of the same task out;
//! leases expire after a bounded time so a dropped commit can never make
//! a task permanently unreorderable.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::task::{
    domain::{
        NewTaskParams, ParseStatusError, Priority, ProjectId, ProjectRole, ProjectedTask,
        ReorderPlan, Task, TaskDomainError, TaskField, TaskId, TaskStatus, UserId,
        append_sequence, can_mutate_field, guard_not_terminal, has_admin_capability, merge_refresh,
        plan_move, transition_status,
    },
    ports::{MembershipDirectory, ProjectStore, RemoteStoreError},
};

/// Errors surfaced by the board service. No public operation panics; the
/// UI always receives one of these values and a well-defined state to
/// render.
#[derive(Debug, Error)]
pub enum BoardServiceError {
    /// Domain validation failed before any commit call was made.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),

    /// The requested status string is not a recognized state.
    #[error(transparent)]
    InvalidStatus(#[from] ParseStatusError),

    /// A mutation for the task is already in flight.
    #[error("task {0} already has a mutation in flight")]
    ConflictInFlight(TaskId),

    /// The project is not present in the local projection.
    #[error("unknown project: {0}")]
    UnknownProject(ProjectId),

    /// The task is not present in the local projection.
    #[error("unknown task: {0}")]
    UnknownTask(TaskId),

    /// The commit was rejected or failed; the local projection has been
    /// rolled back to the pre-mutation snapshot.
    #[error("commit failed: {0}")]
    Commit(RemoteStoreError),

    /// A non-mutating remote call (fetch, membership lookup) failed.
    #[error("remote store error: {0}")]
    Remote(RemoteStoreError),

    /// The projection lock was poisoned by a panicking thread.
    #[error("projection lock poisoned: {0}")]
    Projection(String),
}

/// Result type for board service operations.
pub type BoardResult<T> = Result<T, BoardServiceError>;

/// Coordinator tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardConfig {
    /// How long an in-flight lease protects a task before a later request
    /// may take it over.
    pub lease_ttl: TimeDelta,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            lease_ttl: TimeDelta::seconds(5),
        }
    }
}

/// Request payload for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTaskRequest {
    title: String,
    description: Option<String>,
    priority: Priority,
    assigned_to: UserId,
    participants: std::collections::BTreeSet<UserId>,
    start_date: chrono::NaiveDate,
    due_date: chrono::NaiveDate,
    predecessor: Option<TaskId>,
}

impl NewTaskRequest {
    /// Creates a request with the required fields.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        assigned_to: UserId,
        start_date: chrono::NaiveDate,
        due_date: chrono::NaiveDate,
    ) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority: Priority::Medium,
            assigned_to,
            participants: std::collections::BTreeSet::new(),
            start_date,
            due_date,
            predecessor: None,
        }
    }

    /// Sets the task description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the priority level.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the additional non-owning participants.
    #[must_use]
    pub fn with_participants(mut self, participants: impl IntoIterator<Item = UserId>) -> Self {
        self.participants = participants.into_iter().collect();
        self
    }

    /// Sets the display-only dependency link.
    #[must_use]
    pub const fn with_predecessor(mut self, predecessor: TaskId) -> Self {
        self.predecessor = Some(predecessor);
        self
    }
}

/// Token identifying one acquisition of a task's in-flight lease.
type LeaseToken = u64;

#[derive(Debug, Clone, Copy)]
struct Lease {
    token: LeaseToken,
    expires_at: DateTime<Utc>,
}

/// Per-task in-flight leases with expiries.
#[derive(Debug, Default)]
struct LeaseTable {
    leases: HashMap<TaskId, Lease>,
    next_token: LeaseToken,
}

impl LeaseTable {
    /// Acquires the task's lease, taking over an expired one. Returns
    /// `None` when a live lease is already held.
    fn acquire(
        &mut self,
        task_id: TaskId,
        now: DateTime<Utc>,
        ttl: TimeDelta,
    ) -> Option<LeaseToken> {
        if let Some(existing) = self.leases.get(&task_id) {
            if existing.expires_at > now {
                return None;
            }
            warn!(%task_id, "in-flight lease expired before its commit resolved; taking over");
        }
        self.next_token += 1;
        let token = self.next_token;
        self.leases.insert(
            task_id,
            Lease {
                token,
                expires_at: now + ttl,
            },
        );
        Some(token)
    }

    /// Releases the lease when `token` still holds it. Returns false when
    /// the lease expired and was taken over in the meantime.
    fn release(&mut self, task_id: TaskId, token: LeaseToken) -> bool {
        let held = self
            .leases
            .get(&task_id)
            .is_some_and(|lease| lease.token == token);
        if held {
            self.leases.remove(&task_id);
        }
        held
    }

    /// Returns true when `token` still holds the task's lease.
    fn holds(&self, task_id: TaskId, token: LeaseToken) -> bool {
        self.leases
            .get(&task_id)
            .is_some_and(|lease| lease.token == token)
    }

    /// Tasks currently protected by a live lease.
    fn in_flight_ids(&self, now: DateTime<Utc>) -> HashSet<TaskId> {
        self.leases
            .iter()
            .filter(|(_, lease)| lease.expires_at > now)
            .map(|(id, _)| *id)
            .collect()
    }
}

#[derive(Debug, Default)]
struct ProjectProjection {
    tasks: HashMap<TaskId, ProjectedTask>,
    roles: HashMap<UserId, ProjectRole>,
}

#[derive(Debug, Default)]
struct BoardState {
    projects: HashMap<ProjectId, ProjectProjection>,
    leases: LeaseTable,
}

/// Optimistic concurrency coordinator over a project's task collection.
pub struct TaskBoardService<S, M, C>
where
    S: ProjectStore,
    M: MembershipDirectory,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    directory: Arc<M>,
    clock: Arc<C>,
    config: BoardConfig,
    state: Arc<Mutex<BoardState>>,
}

// Manual impl: clones share the projection and lease table, and `S`, `M`,
// `C` need not be `Clone`.
impl<S, M, C> Clone for TaskBoardService<S, M, C>
where
    S: ProjectStore,
    M: MembershipDirectory,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            directory: Arc::clone(&self.directory),
            clock: Arc::clone(&self.clock),
            config: self.config,
            state: Arc::clone(&self.state),
        }
    }
}

impl<S, M, C> TaskBoardService<S, M, C>
where
    S: ProjectStore,
    M: MembershipDirectory,
    C: Clock + Send + Sync,
{
    /// Creates a board service with the default configuration.
    #[must_use]
    pub fn new(store: Arc<S>, directory: Arc<M>, clock: Arc<C>) -> Self {
        Self::with_config(store, directory, clock, BoardConfig::default())
    }

    /// Creates a board service with an explicit configuration.
    #[must_use]
    pub fn with_config(
        store: Arc<S>,
        directory: Arc<M>,
        clock: Arc<C>,
        config: BoardConfig,
    ) -> Self {
        Self {
            store,
            directory,
            clock,
            config,
            state: Arc::new(Mutex::new(BoardState::default())),
        }
    }

    /// Loads a project's authoritative task collection into the local
    /// projection and returns the ordered tasks.
    ///
    /// # Errors
    ///
    /// Returns [`BoardServiceError::Remote`] when the fetch fails.
    pub async fn load_project(&self, project_id: ProjectId) -> BoardResult<Vec<Task>> {
        self.refresh_project(project_id).await?;
        self.local_projection(project_id)
    }

    /// Re-fetches a project and folds the authoritative collection into
    /// the local projection. Tasks with a live in-flight lease keep their
    /// optimistic local value.
    ///
    /// # Errors
    ///
    /// Returns [`BoardServiceError::Remote`] when the fetch fails.
    pub async fn refresh_project(&self, project_id: ProjectId) -> BoardResult<()> {
        let fresh = self
            .store
            .fetch_project(project_id)
            .await
            .map_err(BoardServiceError::Remote)?;

        let now = self.clock.utc();
        let mut state = self.lock_state()?;
        let in_flight = state.leases.in_flight_ids(now);
        let project = state.projects.entry(project_id).or_default();
        project.tasks = merge_refresh(&project.tasks, fresh, &in_flight);
        debug!(%project_id, tasks = project.tasks.len(), "merged authoritative refresh");
        Ok(())
    }

    /// Returns the project's tasks ordered by sequence.
    ///
    /// # Errors
    ///
    /// Returns [`BoardServiceError::UnknownProject`] when the project has
    /// not been loaded.
    pub fn local_projection(&self, project_id: ProjectId) -> BoardResult<Vec<Task>> {
        let state = self.lock_state()?;
        let project = state
            .projects
            .get(&project_id)
            .ok_or(BoardServiceError::UnknownProject(project_id))?;
        Ok(ordered_tasks(&project.tasks))
    }

    /// Returns one projected task, annotations included.
    ///
    /// # Errors
    ///
    /// Returns [`BoardServiceError::UnknownProject`] or
    /// [`BoardServiceError::UnknownTask`] for unknown identifiers.
    pub fn projected_task(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
    ) -> BoardResult<ProjectedTask> {
        let state = self.lock_state()?;
        let project = state
            .projects
            .get(&project_id)
            .ok_or(BoardServiceError::UnknownProject(project_id))?;
        project
            .tasks
            .get(&task_id)
            .cloned()
            .ok_or(BoardServiceError::UnknownTask(task_id))
    }

    /// Attaches a transient UI annotation to a task. Annotations never
    /// reach the remote store and survive reconciliation as long as the
    /// task's board position is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`BoardServiceError::UnknownProject`] or
    /// [`BoardServiceError::UnknownTask`] for unknown identifiers.
    pub fn set_annotation(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
        key: impl Into<String>,
        value: Value,
    ) -> BoardResult<()> {
        let mut state = self.lock_state()?;
        let project = state
            .projects
            .get_mut(&project_id)
            .ok_or(BoardServiceError::UnknownProject(project_id))?;
        let entry = project
            .tasks
            .get_mut(&task_id)
            .ok_or(BoardServiceError::UnknownTask(task_id))?;
        entry.ui.set(key, value);
        Ok(())
    }

    /// Creates a task at the end of the project ordering, optimistically
    /// inserted and committed to the remote store.
    ///
    /// # Errors
    ///
    /// Returns a permission error for non-admin actors, a domain error
    /// for invalid fields, or [`BoardServiceError::Commit`] when the
    /// remote store refuses the task (the optimistic insert is removed).
    pub async fn create_task(
        &self,
        actor: UserId,
        project_id: ProjectId,
        request: NewTaskRequest,
    ) -> BoardResult<Task> {
        self.require_project(project_id)?;
        let role = self.ensure_role(actor, project_id).await?;
        if !role.is_some_and(has_admin_capability) {
            return Err(TaskDomainError::PermissionDenied {
                actor,
                field: TaskField::AssignedTo,
            }
            .into());
        }

        let now = self.clock.utc();
        let (task, token) = {
            let mut state = self.lock_state()?;
            let BoardState { projects, leases } = &mut *state;
            let project = projects
                .get_mut(&project_id)
                .ok_or(BoardServiceError::UnknownProject(project_id))?;
            let sequence =
                append_sequence(project.tasks.values().map(|entry| entry.task.sequence()));
            let task = Task::create(
                NewTaskParams {
                    project_id,
                    title: request.title,
                    description: request.description,
                    priority: request.priority,
                    assigned_to: request.assigned_to,
                    participants: request.participants,
                    start_date: request.start_date,
                    due_date: request.due_date,
                    predecessor: request.predecessor,
                    sequence,
                },
                &*self.clock,
            )?;
            let token = leases
                .acquire(task.id(), now, self.config.lease_ttl)
                .ok_or(BoardServiceError::ConflictInFlight(task.id()))?;
            project
                .tasks
                .insert(task.id(), ProjectedTask::new(task.clone()));
            (task, token)
        };

        match self.store.commit_create(&task).await {
            Ok(()) => {
                self.finish_commit(project_id, task.id(), token).await;
                Ok(task)
            }
            Err(err) => {
                self.discard_created(project_id, task.id(), token);
                Err(BoardServiceError::Commit(err))
            }
        }
    }

    /// Moves a task to another lifecycle status.
    ///
    /// The transition is validated locally (permission, terminal state,
    /// recognized status string) before any network call, applied
    /// optimistically, then committed; a failed commit restores the
    /// pre-mutation snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`BoardServiceError::InvalidStatus`] for unrecognized
    /// status strings, a domain error for permission or transition
    /// violations, [`BoardServiceError::ConflictInFlight`] when the task
    /// already has a mutation in flight, or [`BoardServiceError::Commit`]
    /// after a rollback.
    pub async fn request_status_change(
        &self,
        actor: UserId,
        project_id: ProjectId,
        task_id: TaskId,
        target: &str,
    ) -> BoardResult<Task> {
        self.require_project(project_id)?;
        let target_status = TaskStatus::try_from(target)?;
        let role = self
            .ensure_role(actor, project_id)
            .await?
            .ok_or(TaskDomainError::PermissionDenied {
                actor,
                field: TaskField::Status,
            })?;

        let clock = Arc::clone(&self.clock);
        let store = Arc::clone(&self.store);
        self.apply_mutation(
            project_id,
            task_id,
            move |target_task, _ordered| {
                transition_status(actor, role, target_task, target_status, &*clock)
                    .map(|updated| vec![updated])
            },
            move |updated| async move {
                let Some(task) = updated.into_iter().next() else {
                    return Ok(());
                };
                store
                    .commit_status(task.id(), project_id, task.status())
                    .await
            },
        )
        .await
    }

    /// Moves a task to another position in the project ordering.
    ///
    /// The new sequence value is the midpoint between the target slot's
    /// neighbours; when spacing is exhausted the whole project is
    /// renumbered to multiples of ten and every changed sequence is
    /// committed, all under the moved task's lease.
    ///
    /// # Errors
    ///
    /// Returns a domain error for permission, terminal-state, or index
    /// violations, [`BoardServiceError::ConflictInFlight`] when the task
    /// already has a mutation in flight, or [`BoardServiceError::Commit`]
    /// after a rollback.
    pub async fn request_reorder(
        &self,
        actor: UserId,
        project_id: ProjectId,
        task_id: TaskId,
        target_index: usize,
    ) -> BoardResult<Task> {
        self.require_project(project_id)?;
        let role = self
            .ensure_role(actor, project_id)
            .await?
            .ok_or(TaskDomainError::PermissionDenied {
                actor,
                field: TaskField::Sequence,
            })?;

        let clock = Arc::clone(&self.clock);
        let store = Arc::clone(&self.store);
        self.apply_mutation(
            project_id,
            task_id,
            move |target_task, ordered| {
                plan_reorder(actor, role, target_task, ordered, target_index, &*clock)
            },
            move |updated| async move {
                for task in &updated {
                    store
                        .commit_sequence(task.id(), project_id, task.sequence())
                        .await?;
                }
                Ok(())
            },
        )
        .await
    }

    /// Shared optimistic mutation protocol: snapshot, lease, local apply,
    /// commit, then merge on success or rollback on failure.
    async fn apply_mutation<Mut, Commit, Fut>(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
        mutate: Mut,
        commit: Commit,
    ) -> BoardResult<Task>
    where
        Mut: FnOnce(&Task, &[Task]) -> Result<Vec<Task>, TaskDomainError>,
        Commit: FnOnce(Vec<Task>) -> Fut,
        Fut: Future<Output = Result<(), RemoteStoreError>> + Send,
    {
        let now = self.clock.utc();
        let (token, snapshot, updated) = {
            let mut state = self.lock_state()?;
            let BoardState { projects, leases } = &mut *state;
            let project = projects
                .get_mut(&project_id)
                .ok_or(BoardServiceError::UnknownProject(project_id))?;
            let target = project
                .tasks
                .get(&task_id)
                .map(|entry| entry.task.clone())
                .ok_or(BoardServiceError::UnknownTask(task_id))?;
            let ordered = ordered_tasks(&project.tasks);

            let token = leases
                .acquire(task_id, now, self.config.lease_ttl)
                .ok_or(BoardServiceError::ConflictInFlight(task_id))?;
            let updated = match mutate(&target, &ordered) {
                Ok(updated) => updated,
                Err(err) => {
                    leases.release(task_id, token);
                    return Err(err.into());
                }
            };

            let snapshot: Vec<Task> = updated
                .iter()
                .filter_map(|task| project.tasks.get(&task.id()))
                .map(|entry| entry.task.clone())
                .collect();
            for task in &updated {
                if let Some(entry) = project.tasks.get_mut(&task.id()) {
                    entry.task = task.clone();
                }
            }
            (token, snapshot, updated)
        };

        let primary = updated
            .iter()
            .find(|task| task.id() == task_id)
            .cloned()
            .ok_or(BoardServiceError::UnknownTask(task_id))?;
        debug!(%task_id, changed = updated.len(), "applied optimistic mutation");

        match commit(updated).await {
            Ok(()) => {
                self.finish_commit(project_id, task_id, token).await;
                Ok(primary)
            }
            Err(err) => {
                self.rollback(project_id, task_id, token, snapshot);
                Err(BoardServiceError::Commit(err))
            }
        }
    }

    /// Releases the lease after a successful commit and folds in a fresh
    /// authoritative snapshot. A failed refresh only logs: the commit
    /// itself succeeded and the optimistic value stands.
    async fn finish_commit(&self, project_id: ProjectId, task_id: TaskId, token: LeaseToken) {
        let released = self
            .lock_state()
            .map(|mut state| state.leases.release(task_id, token));
        match released {
            Ok(true) => {}
            Ok(false) => {
                warn!(%task_id, "commit resolved after its lease was taken over");
            }
            Err(err) => {
                warn!(%task_id, error = %err, "could not release in-flight lease");
            }
        }

        if let Err(err) = self.refresh_project(project_id).await {
            warn!(%project_id, error = %err, "post-commit refresh failed; keeping optimistic state");
        }
    }

    /// Restores the pre-mutation snapshot after a failed commit, unless
    /// the lease expired and a newer mutation took the task over.
    fn rollback(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
        token: LeaseToken,
        snapshot: Vec<Task>,
    ) {
        let Ok(mut state) = self.lock_state() else {
            warn!(%task_id, "projection lock poisoned during rollback");
            return;
        };
        if state.leases.holds(task_id, token) {
            if let Some(project) = state.projects.get_mut(&project_id) {
                for task in snapshot {
                    if let Some(entry) = project.tasks.get_mut(&task.id()) {
                        entry.task = task;
                    }
                }
            }
            debug!(%task_id, "rolled back optimistic mutation after failed commit");
        } else {
            warn!(%task_id, "skipping rollback: lease was taken over while the commit was in flight");
        }
        state.leases.release(task_id, token);
    }

    /// Removes an optimistically created task after a failed commit.
    fn discard_created(&self, project_id: ProjectId, task_id: TaskId, token: LeaseToken) {
        let Ok(mut state) = self.lock_state() else {
            warn!(%task_id, "projection lock poisoned while discarding created task");
            return;
        };
        if state.leases.holds(task_id, token)
            && let Some(project) = state.projects.get_mut(&project_id)
        {
            project.tasks.remove(&task_id);
        }
        state.leases.release(task_id, token);
    }

    /// Returns the actor's cached role, querying the membership directory
    /// on a cache miss.
    async fn ensure_role(
        &self,
        actor: UserId,
        project_id: ProjectId,
    ) -> BoardResult<Option<ProjectRole>> {
        {
            let state = self.lock_state()?;
            let cached = state
                .projects
                .get(&project_id)
                .and_then(|project| project.roles.get(&actor));
            if let Some(role) = cached {
                return Ok(Some(*role));
            }
        }

        let role = self
            .directory
            .role_of(actor, project_id)
            .await
            .map_err(BoardServiceError::Remote)?;
        if let Some(found) = role {
            let mut state = self.lock_state()?;
            if let Some(project) = state.projects.get_mut(&project_id) {
                project.roles.insert(actor, found);
            }
        }
        Ok(role)
    }

    /// Rejects operations against a project the projection has never
    /// loaded.
    fn require_project(&self, project_id: ProjectId) -> BoardResult<()> {
        let state = self.lock_state()?;
        if state.projects.contains_key(&project_id) {
            Ok(())
        } else {
            Err(BoardServiceError::UnknownProject(project_id))
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, BoardState>, BoardServiceError> {
        self.state
            .lock()
            .map_err(|err| BoardServiceError::Projection(err.to_string()))
    }
}

/// Clones a projection's tasks ordered by `(sequence, id)`.
fn ordered_tasks(tasks: &HashMap<TaskId, ProjectedTask>) -> Vec<Task> {
    let mut ordered: Vec<Task> = tasks.values().map(|entry| entry.task.clone()).collect();
    ordered.sort_by_key(|task| (task.sequence(), task.id()));
    ordered
}

/// Validates a reorder and computes the updated task values.
fn plan_reorder(
    actor: UserId,
    role: ProjectRole,
    target: &Task,
    ordered: &[Task],
    target_index: usize,
    clock: &impl Clock,
) -> Result<Vec<Task>, TaskDomainError> {
    if !can_mutate_field(actor, role, target, TaskField::Sequence) {
        return Err(TaskDomainError::PermissionDenied {
            actor,
            field: TaskField::Sequence,
        });
    }
    guard_not_terminal(target)?;

    let len = ordered.len();
    let from = ordered
        .iter()
        .position(|task| task.id() == target.id())
        .ok_or(TaskDomainError::IndexOutOfRange { index: len, len })?;
    let sequences: Vec<i64> = ordered.iter().map(Task::sequence).collect();

    match plan_move(&sequences, from, target_index)? {
        ReorderPlan::Place(value) => {
            let mut moved = target.clone();
            moved.set_sequence(value, clock);
            Ok(vec![moved])
        }
        ReorderPlan::Renumber(values) => {
            let mut new_order: Vec<Task> = ordered
                .iter()
                .filter(|task| task.id() != target.id())
                .cloned()
                .collect();
            new_order.insert(target_index, target.clone());

            let mut updated = Vec::with_capacity(new_order.len());
            for (task, value) in new_order.into_iter().zip(values) {
                if task.sequence() != value || task.id() == target.id() {
                    let mut renumbered = task;
                    renumbered.set_sequence(value, clock);
                    updated.push(renumbered);
                }
            }
            Ok(updated)
        }
    }
}
