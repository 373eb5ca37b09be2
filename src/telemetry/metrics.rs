//! Metric instrument factories for taskpipe.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without one installed, every instrument is a no-op.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("taskpipe")
}

/// Counter: work items made by the factory.
pub fn items_created() -> Counter<u64> {
    meter()
        .u64_counter("taskpipe.items.created")
        .with_description("Number of work items created from raw input")
        .build()
}

/// Counter: work items whose processing step finished.
pub fn items_processed() -> Counter<u64> {
    meter()
        .u64_counter("taskpipe.items.processed")
        .with_description("Number of work items processed by a worker")
        .build()
}

/// Counter: work items handed to the reporter.
pub fn items_reported() -> Counter<u64> {
    meter()
        .u64_counter("taskpipe.items.reported")
        .with_description("Number of work items reported")
        .build()
}

/// Counter: finished runs.
/// Labels: `outcome` ("completed" | "stream_error" | "deadline_exceeded" | "failed").
pub fn run_outcomes() -> Counter<u64> {
    meter()
        .u64_counter("taskpipe.run.outcomes")
        .with_description("Number of pipeline runs by outcome")
        .build()
}

/// Histogram: wall time of a run in milliseconds.
pub fn run_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("taskpipe.run.duration_ms")
        .with_description("Pipeline run duration in milliseconds")
        .with_unit("ms")
        .build()
}
