//! Metric instrument factories.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without an OTLP endpoint the global provider is a no-op.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("salesq")
}

/// Counter: tasks accepted by the store.
/// Labels: `filtered` ("companies" | "none").
pub fn tasks_submitted() -> Counter<u64> {
    meter()
        .u64_counter("salesq.task.submitted")
        .with_description("Number of tasks created")
        .build()
}

/// Counter: task status transitions.
/// Labels: `from`, `to`.
pub fn task_state_transitions() -> Counter<u64> {
    meter()
        .u64_counter("salesq.task.state_transitions")
        .with_description("Number of task status transitions")
        .build()
}

/// Counter: job queue operations.
/// Labels: `operation` ("enqueue" | "dequeue" | "drop").
pub fn queue_operations() -> Counter<u64> {
    meter()
        .u64_counter("salesq.queue.operations")
        .with_description("Number of job queue operations")
        .build()
}

/// Counter: source adapter read passes.
/// Labels: `source`, `result` ("ok" | "unavailable" | "malformed").
pub fn source_reads() -> Counter<u64> {
    meter()
        .u64_counter("salesq.source.reads")
        .with_description("Number of source read passes")
        .build()
}

/// Counter: sales records written.
pub fn records_persisted() -> Counter<u64> {
    meter()
        .u64_counter("salesq.records.persisted")
        .with_description("Number of sales records persisted")
        .build()
}

/// Histogram: operation duration in milliseconds.
/// Labels: `operation`.
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("salesq.operation.duration_ms")
        .with_description("Operation duration in milliseconds")
        .with_unit("ms")
        .build()
}
