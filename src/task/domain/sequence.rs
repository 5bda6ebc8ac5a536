//! Sequence allocation for manual task ordering.
//!
//! Sequences are integer keys spaced by tens so that a drag-reorder can
//! usually claim the midpoint between two neighbours without touching any
//! other task. When the gap is exhausted the whole project is renumbered
//! back to multiples of ten; reusing a neighbour's value is never an
//! option, as that would produce duplicate keys and ambiguous ordering.

use super::TaskDomainError;

/// Gap left between consecutive sequence values.
pub const SEQUENCE_SPACING: i64 = 10;

/// Outcome of planning a drag-reorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderPlan {
    /// The moved task takes this sequence value; no other task changes.
    Place(i64),
    /// Spacing is exhausted: every task is renumbered. The values map
    /// positionally onto the post-move display order (the remaining tasks
    /// with the moved task inserted at its target slot).
    Renumber(Vec<i64>),
}

/// Returns the sequence value for a task appended at the end of the
/// project ordering: one spacing step past the current maximum, or one
/// spacing step from zero for an empty project.
#[must_use]
pub fn append_sequence<I>(existing: I) -> i64
where
    I: IntoIterator<Item = i64>,
{
    existing
        .into_iter()
        .max()
        .map_or(SEQUENCE_SPACING, |max| max + SEQUENCE_SPACING)
}

/// Yields `len` sequence values at consecutive multiples of the spacing.
pub fn renumber(len: usize) -> impl Iterator<Item = i64> {
    std::iter::successors(Some(SEQUENCE_SPACING), |seq| Some(seq + SEQUENCE_SPACING)).take(len)
}

/// Plans moving the task at `from` so that it sorts at `to` among the
/// remaining tasks.
///
/// `ordered` holds the project's sequence values in display order. The
/// planned value is the floor midpoint of the target slot's neighbours;
/// an end slot extends one spacing step beyond the boundary value. When
/// the neighbours leave no integer room the plan renumbers the whole
/// project instead.
///
/// # Errors
///
/// Returns [`TaskDomainError::IndexOutOfRange`] when `from` or `to` falls
/// outside the ordering.
pub fn plan_move(
    ordered: &[i64],
    from: usize,
    to: usize,
) -> Result<ReorderPlan, TaskDomainError> {
    let len = ordered.len();
    let moved = ordered
        .get(from)
        .copied()
        .ok_or(TaskDomainError::IndexOutOfRange { index: from, len })?;
    if to >= len {
        return Err(TaskDomainError::IndexOutOfRange { index: to, len });
    }
    if from == to {
        return Ok(ReorderPlan::Place(moved));
    }

    let mut remaining: Vec<i64> = Vec::with_capacity(len.saturating_sub(1));
    remaining.extend(
        ordered
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != from)
            .map(|(_, value)| *value),
    );
    let lo = to
        .checked_sub(1)
        .and_then(|index| remaining.get(index))
        .copied();
    let hi = remaining.get(to).copied();

    match (lo, hi) {
        (None, None) => Ok(ReorderPlan::Place(moved)),
        (None, Some(first)) => Ok(ReorderPlan::Place(first - SEQUENCE_SPACING)),
        (Some(last), None) => Ok(ReorderPlan::Place(last + SEQUENCE_SPACING)),
        (Some(below), Some(above)) => {
            if above - below <= 1 {
                let mut target_order = remaining;
                target_order.insert(to, moved);
                Ok(ReorderPlan::Renumber(
                    renumber(target_order.len()).collect(),
                ))
            } else {
                Ok(ReorderPlan::Place(below.midpoint(above)))
            }
        }
    }
}
