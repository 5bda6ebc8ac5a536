//! Local projection values and the reconciliation merger.
//!
//! View layers key transient UI state (drag visuals, expanded rows) by
//! task identity, so replacing every task object on each authoritative
//! refresh invalidates drag targets and open dialogs mid-interaction.
//! The merger keeps previous objects wherever the board-salient fields
//! are unchanged and folds in only the fields the remote store maintains
//! on its own.

use super::{Task, TaskId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Transient, UI-only annotations attached to a projected task by view
/// layers. Never sent to the remote store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UiAnnotations(BTreeMap<String, Value>);

impl UiAnnotations {
    /// Creates an empty annotation set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Sets an annotation value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Returns an annotation value, if set.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Removes an annotation value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Returns true when no annotations are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A task as held in the local projection: the task value plus transient
/// view-layer annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedTask {
    /// The task value.
    pub task: Task,
    /// Transient UI-only annotations.
    pub ui: UiAnnotations,
}

impl ProjectedTask {
    /// Wraps a task with empty annotations.
    #[must_use]
    pub const fn new(task: Task) -> Self {
        Self {
            task,
            ui: UiAnnotations::new(),
        }
    }
}

impl From<Task> for ProjectedTask {
    fn from(task: Task) -> Self {
        Self::new(task)
    }
}

/// Returns true when the fields that drive board placement differ.
fn salient_change(previous: &Task, fresh: &Task) -> bool {
    previous.status() != fresh.status() || previous.sequence() != fresh.sequence()
}

/// Merges an authoritative refresh into the previous projection.
///
/// When a task was added or removed the collection is replaced wholesale.
/// Otherwise each task keeps its previous object (annotations included)
/// while the refreshable counters are copied over, unless a salient field
/// changed, in which case the authoritative value is taken outright with
/// fresh annotations. Tasks in `in_flight` keep their local entry
/// untouched so an optimistic value is never overwritten mid-flight.
#[must_use]
pub fn merge_refresh(
    previous: &HashMap<TaskId, ProjectedTask>,
    fresh: Vec<Task>,
    in_flight: &HashSet<TaskId>,
) -> HashMap<TaskId, ProjectedTask> {
    let fresh_ids: HashSet<TaskId> = fresh.iter().map(Task::id).collect();
    let same_membership =
        fresh_ids.len() == previous.len() && previous.keys().all(|id| fresh_ids.contains(id));

    let mut merged: HashMap<TaskId, ProjectedTask> = HashMap::with_capacity(fresh.len());
    for task in fresh {
        let id = task.id();
        let entry = match previous.get(&id) {
            Some(local) if in_flight.contains(&id) => local.clone(),
            Some(local) if same_membership && !salient_change(&local.task, &task) => {
                let mut kept = local.clone();
                kept.task.refresh_counters(&task);
                kept
            }
            _ => ProjectedTask::new(task),
        };
        merged.insert(id, entry);
    }

    // A removed task disappears with the wholesale replacement above, but
    // an in-flight local task must survive even that.
    for (id, local) in previous {
        if in_flight.contains(id) && !merged.contains_key(id) {
            merged.insert(*id, local.clone());
        }
    }

    merged
}
