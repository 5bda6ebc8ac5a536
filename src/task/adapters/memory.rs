//! In-memory remote store for tests and local development.
//!
//! Plays the authoritative store the coordinator commits against. Besides
//! the plain port behaviour it offers the instrumentation the concurrency
//! tests need: per-method call counters, injectable rejections, and a
//! gate that holds commit calls open so the in-flight window can be
//! observed deterministically.

use async_trait::async_trait;
use mockable::Clock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Semaphore;

use crate::task::{
    domain::{ProjectId, ProjectRole, Task, TaskId, TaskStatus, UserId},
    ports::{MembershipDirectory, ProjectStore, RemoteResult, RemoteStoreError},
};

/// Permits granted when a gate is released; enough for any test workload.
const GATE_RELEASE_PERMITS: usize = 1 << 20;

#[derive(Debug, Default)]
struct StoreState {
    projects: HashMap<ProjectId, HashMap<TaskId, Task>>,
    members: HashMap<ProjectId, HashMap<UserId, ProjectRole>>,
}

/// Per-method call counters.
#[derive(Debug, Default)]
struct CallCounters {
    create: AtomicUsize,
    status: AtomicUsize,
    sequence: AtomicUsize,
    fetch: AtomicUsize,
}

/// Thread-safe in-memory implementation of both remote ports.
pub struct InMemoryProjectStore<C> {
    state: Arc<RwLock<StoreState>>,
    counters: Arc<CallCounters>,
    gate: Arc<RwLock<Option<Arc<Semaphore>>>>,
    rejections: Arc<AtomicUsize>,
    clock: Arc<C>,
}

// Manual impl: clones share the store, and `C` need not be `Clone`.
impl<C> Clone for InMemoryProjectStore<C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            counters: Arc::clone(&self.counters),
            gate: Arc::clone(&self.gate),
            rejections: Arc::clone(&self.rejections),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C> InMemoryProjectStore<C>
where
    C: Clock + Send + Sync,
{
    /// Creates an empty store stamping mutations from the given clock.
    #[must_use]
    pub fn new(clock: Arc<C>) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            counters: Arc::new(CallCounters::default()),
            gate: Arc::new(RwLock::new(None)),
            rejections: Arc::new(AtomicUsize::new(0)),
            clock,
        }
    }

    /// Seeds a project with tasks, replacing any previous content.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the store lock is poisoned.
    pub fn seed_project(
        &self,
        project_id: ProjectId,
        tasks: impl IntoIterator<Item = Task>,
    ) -> RemoteResult<()> {
        let mut state = write_state(&self.state)?;
        state
            .projects
            .insert(project_id, tasks.into_iter().map(|t| (t.id(), t)).collect());
        Ok(())
    }

    /// Registers a project member.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the store lock is poisoned.
    pub fn insert_member(
        &self,
        project_id: ProjectId,
        user: UserId,
        role: ProjectRole,
    ) -> RemoteResult<()> {
        let mut state = write_state(&self.state)?;
        state
            .members
            .entry(project_id)
            .or_default()
            .insert(user, role);
        Ok(())
    }

    /// Returns a stored task, if present.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the store lock is poisoned.
    pub fn stored_task(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
    ) -> RemoteResult<Option<Task>> {
        let state = read_state(&self.state)?;
        Ok(state
            .projects
            .get(&project_id)
            .and_then(|tasks| tasks.get(&task_id))
            .cloned())
    }

    /// Rejects the next `count` commit calls with an injected error.
    pub fn reject_next_commits(&self, count: usize) {
        self.rejections.store(count, Ordering::SeqCst);
    }

    /// Holds every subsequent commit call open until
    /// [`Self::release_commits`] runs.
    pub fn hold_commits(&self) {
        if let Ok(mut gate) = self.gate.write() {
            *gate = Some(Arc::new(Semaphore::new(0)));
        }
    }

    /// Releases commits held by [`Self::hold_commits`].
    pub fn release_commits(&self) {
        if let Ok(mut gate) = self.gate.write()
            && let Some(sem) = gate.take()
        {
            sem.add_permits(GATE_RELEASE_PERMITS);
        }
    }

    /// Lets exactly one held commit through, in arrival order.
    pub fn admit_one(&self) {
        if let Ok(gate) = self.gate.read()
            && let Some(sem) = gate.as_ref()
        {
            sem.add_permits(1);
        }
    }

    /// Number of `commit_create` calls observed.
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.counters.create.load(Ordering::SeqCst)
    }

    /// Number of `commit_status` calls observed.
    #[must_use]
    pub fn status_calls(&self) -> usize {
        self.counters.status.load(Ordering::SeqCst)
    }

    /// Number of `commit_sequence` calls observed.
    #[must_use]
    pub fn sequence_calls(&self) -> usize {
        self.counters.sequence.load(Ordering::SeqCst)
    }

    /// Number of `fetch_project` calls observed.
    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.counters.fetch.load(Ordering::SeqCst)
    }

    /// Waits at the gate (when held) and consumes one injected rejection.
    async fn admit_commit(&self) -> RemoteResult<()> {
        let held = self
            .gate
            .read()
            .map_err(|err| poisoned(&err.to_string()))?
            .clone();
        if let Some(sem) = held {
            let permit = sem
                .acquire()
                .await
                .map_err(|err| RemoteStoreError::transport(std::io::Error::other(err)))?;
            permit.forget();
        }

        let outcome = self
            .rejections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            });
        if outcome.is_ok() {
            return Err(RemoteStoreError::Rejected("injected rejection".to_owned()));
        }
        Ok(())
    }
}

fn poisoned(detail: &str) -> RemoteStoreError {
    RemoteStoreError::transport(std::io::Error::other(detail.to_owned()))
}

fn read_state(
    state: &Arc<RwLock<StoreState>>,
) -> Result<std::sync::RwLockReadGuard<'_, StoreState>, RemoteStoreError> {
    state.read().map_err(|err| poisoned(&err.to_string()))
}

fn write_state(
    state: &Arc<RwLock<StoreState>>,
) -> Result<std::sync::RwLockWriteGuard<'_, StoreState>, RemoteStoreError> {
    state.write().map_err(|err| poisoned(&err.to_string()))
}

#[async_trait]
impl<C> ProjectStore for InMemoryProjectStore<C>
where
    C: Clock + Send + Sync,
{
    async fn commit_create(&self, task: &Task) -> RemoteResult<()> {
        self.counters.create.fetch_add(1, Ordering::SeqCst);
        self.admit_commit().await?;

        let mut state = write_state(&self.state)?;
        let tasks = state.projects.entry(task.project_id()).or_default();
        if tasks.contains_key(&task.id()) {
            return Err(RemoteStoreError::Rejected(format!(
                "duplicate task identifier: {}",
                task.id()
            )));
        }
        tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn commit_status(
        &self,
        task_id: TaskId,
        project_id: ProjectId,
        status: TaskStatus,
    ) -> RemoteResult<()> {
        self.counters.status.fetch_add(1, Ordering::SeqCst);
        self.admit_commit().await?;

        let mut state = write_state(&self.state)?;
        let task = state
            .projects
            .get_mut(&project_id)
            .and_then(|tasks| tasks.get_mut(&task_id))
            .ok_or_else(|| RemoteStoreError::Rejected(format!("unknown task: {task_id}")))?;
        task.set_status(status, &*self.clock);
        Ok(())
    }

    async fn commit_sequence(
        &self,
        task_id: TaskId,
        project_id: ProjectId,
        sequence: i64,
    ) -> RemoteResult<()> {
        self.counters.sequence.fetch_add(1, Ordering::SeqCst);
        self.admit_commit().await?;

        let mut state = write_state(&self.state)?;
        let task = state
            .projects
            .get_mut(&project_id)
            .and_then(|tasks| tasks.get_mut(&task_id))
            .ok_or_else(|| RemoteStoreError::Rejected(format!("unknown task: {task_id}")))?;
        task.set_sequence(sequence, &*self.clock);
        Ok(())
    }

    async fn fetch_project(&self, project_id: ProjectId) -> RemoteResult<Vec<Task>> {
        self.counters.fetch.fetch_add(1, Ordering::SeqCst);
        let state = read_state(&self.state)?;
        let mut tasks: Vec<Task> = state
            .projects
            .get(&project_id)
            .map(|tasks| tasks.values().cloned().collect())
            .unwrap_or_default();
        tasks.sort_by_key(|task| (task.sequence(), task.id()));
        Ok(tasks)
    }
}

#[async_trait]
impl<C> MembershipDirectory for InMemoryProjectStore<C>
where
    C: Clock + Send + Sync,
{
    async fn role_of(
        &self,
        actor: UserId,
        project_id: ProjectId,
    ) -> RemoteResult<Option<ProjectRole>> {
        let state = read_state(&self.state)?;
        Ok(state
            .members
            .get(&project_id)
            .and_then(|members| members.get(&actor))
            .copied())
    }
}
