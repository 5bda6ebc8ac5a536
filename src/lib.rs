//! Gantry: task lifecycle and ordering core for project boards.
//!
//! This crate implements the coordination layer a project-management tool
//! (kanban, list, timeline, Gantt views) needs above its remote data
//! store: permission evaluation for task mutation, the status state
//! machine, sequence allocation for manual drag-reordering, and an
//! optimistic-concurrency coordinator that keeps the local task
//! projection consistent while commits are in flight, failing, or racing
//! a full refresh.
//!
//! # Architecture
//!
//! Gantry follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for the remote store and
//!   membership lookup
//! - **Adapters**: Concrete implementations of ports (in-memory store
//!   for tests and local development)
//! - **Services**: The board coordinator orchestrating optimistic
//!   mutation, rollback, and reconciliation
//!
//! # Modules
//!
//! - [`task`]: Task lifecycle, ordering, and projection management

pub mod task;
