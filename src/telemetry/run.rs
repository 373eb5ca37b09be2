//! Run span helpers.

use tracing::Span;
use uuid::Uuid;

/// Start a span covering one pipeline run.
///
/// The `pipeline.outcome` field is declared empty and filled in by
/// [`record_outcome`].
pub fn start_run_span(run_id: &Uuid, workers: usize) -> Span {
    tracing::info_span!(
        "pipeline.run",
        "pipeline.run_id" = %run_id,
        "pipeline.workers" = workers,
        "pipeline.outcome" = tracing::field::Empty,
    )
}

/// Record how the run ended on its span.
pub fn record_outcome(span: &Span, outcome: &str) {
    span.record("pipeline.outcome", outcome);
    span.in_scope(|| {
        tracing::info!(outcome, "run finished");
    });
}
