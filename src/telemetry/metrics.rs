//! Metric instrument factories for workitem-agent.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"workitem-agent"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for workitem-agent instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("workitem-agent")
}

/// Counter: workitems processed and reported.
/// Labels: `queue`, `state` ("successful" | "retry").
pub fn workitems_processed() -> Counter<u64> {
    meter()
        .u64_counter("workitem.processed")
        .with_description("Number of workitems processed")
        .build()
}

/// Counter: drain passes that ran.
/// Labels: `queue`, `result` ("drained" | "aborted").
pub fn drain_passes() -> Counter<u64> {
    meter()
        .u64_counter("workitem.drain.passes")
        .with_description("Number of queue drain passes")
        .build()
}

/// Counter: triggers dropped because a drain was already running.
/// Labels: `queue`.
pub fn triggers_dropped() -> Counter<u64> {
    meter()
        .u64_counter("workitem.drain.triggers_dropped")
        .with_description("Queue triggers dropped by the single-flight guard")
        .build()
}

/// Counter: stray files removed from the working directory.
pub fn files_cleaned() -> Counter<u64> {
    meter()
        .u64_counter("workitem.files.cleaned")
        .with_description("Files removed from the working directory after processing")
        .build()
}

/// Counter: queue-level operations (create, send, pop, notify).
/// Labels: `queue`, `operation`.
pub fn queue_operations() -> Counter<u64> {
    meter()
        .u64_counter("workitem.queue.operations")
        .with_description("Number of queue operations")
        .build()
}

/// Histogram: processing duration in milliseconds.
/// Labels: `queue`.
pub fn processing_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("workitem.processing.duration_ms")
        .with_description("Workitem processing duration in milliseconds")
        .with_unit("ms")
        .build()
}
