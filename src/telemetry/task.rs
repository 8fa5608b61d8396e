//! Task processing span helpers.

use tracing::Span;

use crate::model::{TaskId, TaskStatus};

/// Start a span covering one task's trip through the worker.
///
/// The `task.status` field starts empty and is filled in by
/// [`record_state_transition`].
pub fn start_task_span(task_id: TaskId) -> Span {
    tracing::info_span!(
        "task.process",
        "task.id" = %task_id,
        "task.status" = tracing::field::Empty,
    )
}

/// Record a status change on the span and emit an event inside it.
pub fn record_state_transition(span: &Span, from: TaskStatus, to: TaskStatus) {
    span.record("task.status", to.as_str());
    span.in_scope(|| {
        tracing::info!(from = from.as_str(), to = to.as_str(), "state_transition");
    });
}
