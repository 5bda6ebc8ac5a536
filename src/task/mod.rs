//! Task lifecycle and ordering core.
//!
//! Everything that is hard about the surrounding board application lives
//! here: who may move a task between statuses, how the per-project
//! ordering key is allocated under drag-reordering, and how the local
//! projection stays consistent under optimistic, possibly-failing,
//! possibly-racing mutations against the authoritative remote store.
//! The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
