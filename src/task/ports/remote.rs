//! Ports for the authoritative remote store and membership lookup.
//!
//! The core never builds requests or parses payloads; it consumes these
//! contracts as opaque asynchronous operations that succeed or fail.

use crate::task::domain::{ProjectId, ProjectRole, Task, TaskId, TaskStatus, UserId};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;
use thiserror::Error;

/// Result type for remote store operations.
pub type RemoteResult<T> = Result<T, RemoteStoreError>;

/// Authoritative task store contract.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Persists a newly created task.
    async fn commit_create(&self, task: &Task) -> RemoteResult<()>;

    /// Persists a status change.
    async fn commit_status(
        &self,
        task_id: TaskId,
        project_id: ProjectId,
        status: TaskStatus,
    ) -> RemoteResult<()>;

    /// Persists a reordering.
    async fn commit_sequence(
        &self,
        task_id: TaskId,
        project_id: ProjectId,
        sequence: i64,
    ) -> RemoteResult<()>;

    /// Fetches the authoritative task collection of a project.
    async fn fetch_project(&self, project_id: ProjectId) -> RemoteResult<Vec<Task>>;
}

/// Membership lookup contract.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    /// Returns the actor's role within the project, or `None` when the
    /// actor is not a member.
    async fn role_of(
        &self,
        actor: UserId,
        project_id: ProjectId,
    ) -> RemoteResult<Option<ProjectRole>>;
}

/// Errors returned by remote store implementations.
#[derive(Debug, Clone, Error)]
pub enum RemoteStoreError {
    /// The authoritative store refused the operation.
    #[error("remote store rejected the operation: {0}")]
    Rejected(String),

    /// The transport layer failed before a verdict was reached.
    #[error("remote store transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl RemoteStoreError {
    /// Wraps a transport-layer error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}
