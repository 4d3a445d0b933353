//! Workitem span helpers.
//!
//! Provides span creation and state-transition recording for workitems
//! flowing through the processing wrapper.

use tracing::Span;

/// Start a span for processing one workitem.
///
/// The `workitem.state` field is declared empty and is filled in by
/// [`record_state_transition`].
pub fn start_workitem_span(wiq: &str, workitem_id: &str, retries: u32) -> Span {
    tracing::info_span!(
        "workitem.process",
        "workitem.queue" = wiq,
        "workitem.id" = workitem_id,
        "workitem.retries" = retries,
        "workitem.state" = tracing::field::Empty,
    )
}

/// Record a state transition on the given span.
///
/// Updates `workitem.state` and emits a tracing `info` event scoped to the span.
pub fn record_state_transition(span: &Span, from: &str, to: &str) {
    span.record("workitem.state", to);
    span.in_scope(|| {
        tracing::info!(from = from, to = to, "state_transition");
    });
}
