//! The run orchestrator.
//!
//! Wires the feeder, the worker pool and the reporter sink together through
//! two bounded queues, then waits for whichever comes first: the sink
//! finishing, the feeder failing, or the deadline. The first signal decides
//! the outcome.
//!
//! ```text
//! raw input -> feeder -> [unprocessed] -> N workers -> [processed] -> sink -> reporter
//! ```

mod feeder;
mod pool;
mod sink;

use std::time::Duration;

use opentelemetry::KeyValue;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::source::TokenSource;
use crate::task::{ItemFactory, WorkItem};
use crate::telemetry::metrics;
use crate::telemetry::run::{record_outcome, start_run_span};

use feeder::Input;
use sink::Drained;

/// Default capacity of both queues. One slot keeps the hand-off close to a
/// rendezvous: the feeder never races far ahead of the workers.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1;

/// Reporting function applied to each completed work item.
pub type Reporter<W> = Box<dyn FnMut(W) + Send>;

/// Default reporter: print the result text to stdout, success or not.
pub fn print_result<W: WorkItem>(item: W) {
    let (text, _success) = item.result();
    println!("{text}");
}

/// Effective worker count: anything below one becomes one.
pub fn effective_workers(requested: isize) -> usize {
    usize::try_from(requested).unwrap_or(0).max(1)
}

// ---------------------------------------------------------------------------
// Run configuration
// ---------------------------------------------------------------------------

/// Options for a single run. Fixed once the run starts.
pub struct RunConfig<W> {
    pub(crate) args: Vec<String>,
    pub(crate) token_source: Option<Box<dyn TokenSource>>,
    pub(crate) reporter: Reporter<W>,
    pub(crate) queue_capacity: usize,
}

impl<W: WorkItem> RunConfig<W> {
    pub fn new() -> Self {
        Self {
            args: Vec::new(),
            token_source: None,
            reporter: Box::new(print_result::<W>),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Direct input values. When non-empty these are the only input and the
    /// token source is never read.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the default token source (lines of stdin).
    pub fn token_source(mut self, source: impl TokenSource + 'static) -> Self {
        self.token_source = Some(Box::new(source));
        self
    }

    /// Replace the default reporter ([`print_result`]).
    pub fn reporter(mut self, report: impl FnMut(W) + Send + 'static) -> Self {
        self.reporter = Box::new(report);
        self
    }

    /// Capacity of the unprocessed and processed queues (minimum 1).
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }
}

impl<W: WorkItem> Default for RunConfig<W> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Run the pipeline until the input is fully reported, the token source
/// fails, or `deadline` passes.
///
/// Returns as soon as the first of those happens; on the error paths the
/// remaining stages are told to stop and any items they still hold are
/// dropped. Dropping the returned future stops them too.
///
/// # Errors
/// [`Error::StreamRead`] if the token source fails, or
/// [`Error::DeadlineExceeded`] if the deadline passes first.
pub async fn run<F: ItemFactory>(
    deadline: Instant,
    factory: F,
    num_workers: isize,
    config: RunConfig<F::Item>,
) -> Result<()> {
    run_until(deadline, None, factory, num_workers, config).await
}

/// [`run`] with a deadline of `timeout` from now.
pub async fn run_with_timeout<F: ItemFactory>(
    timeout: Duration,
    factory: F,
    num_workers: isize,
    config: RunConfig<F::Item>,
) -> Result<()> {
    run_until(deadline_after(timeout), Some(timeout), factory, num_workers, config).await
}

/// `timeout` from now, saturating at a far-future instant instead of
/// overflowing.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + FAR_FUTURE)
}

/// Roughly thirty years; the cap for timeouts the clock cannot represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

async fn run_until<F: ItemFactory>(
    deadline: Instant,
    timeout: Option<Duration>,
    factory: F,
    num_workers: isize,
    config: RunConfig<F::Item>,
) -> Result<()> {
    let workers = effective_workers(num_workers);
    let span = start_run_span(&Uuid::new_v4(), workers);
    let started = std::time::Instant::now();

    let result = orchestrate(deadline, timeout, factory, workers, config)
        .instrument(span.clone())
        .await;

    let outcome = match &result {
        Ok(()) => "completed",
        Err(Error::StreamRead(_)) => "stream_error",
        Err(Error::DeadlineExceeded { .. }) => "deadline_exceeded",
        Err(_) => "failed",
    };
    record_outcome(&span, outcome);
    metrics::run_outcomes().add(1, &[KeyValue::new("outcome", outcome)]);
    metrics::run_duration_ms().record(started.elapsed().as_secs_f64() * 1000.0, &[]);

    result
}

async fn orchestrate<F: ItemFactory>(
    deadline: Instant,
    timeout: Option<Duration>,
    factory: F,
    workers: usize,
    config: RunConfig<F::Item>,
) -> Result<()> {
    let RunConfig {
        args,
        token_source,
        reporter,
        queue_capacity,
    } = config;

    // Every stage watches this token. It fires at the deadline, and when
    // this function returns (or is dropped) for any reason.
    let cancel = CancellationToken::new();
    let _stop_stages = cancel.clone().drop_guard();
    tokio::spawn(cancel_at(deadline, cancel.clone()));

    let (unprocessed_tx, unprocessed_rx) = mpsc::channel(queue_capacity);
    let (processed_tx, processed_rx) = mpsc::channel(queue_capacity);
    let (failed_tx, mut failed_rx) = oneshot::channel();

    info!(workers, queue_capacity, "pipeline starting");

    tokio::spawn(feeder::feed(
        factory,
        Input::resolve(args, token_source),
        unprocessed_tx,
        failed_tx,
        cancel.clone(),
    ));
    pool::spawn(workers, unprocessed_rx, processed_tx, cancel.clone());
    let mut sink = tokio::spawn(sink::drain(processed_rx, reporter, deadline, cancel.clone()));

    tokio::select! {
        biased;
        // The feeder signals failure before it closes the unprocessed queue,
        // so this branch is already ready by the time a sink completion
        // caused by that close could be observed.
        Ok(err) = &mut failed_rx => {
            warn!(error = %err, "input stream failed, abandoning run");
            Err(err)
        }
        done = &mut sink => match done {
            Ok(Drained::Complete { reported }) => {
                info!(reported, "pipeline completed");
                Ok(())
            }
            // Only the deadline stops the sink while this function is
            // still waiting on it.
            Ok(Drained::Stopped { reported }) => {
                warn!(?timeout, reported, "deadline exceeded, abandoning run");
                Err(Error::DeadlineExceeded { timeout })
            }
            Err(e) => Err(Error::Other(format!("reporter task failed: {e}"))),
        },
        _ = tokio::time::sleep_until(deadline) => {
            cancel.cancel();
            warn!(?timeout, "deadline exceeded, abandoning run");
            Err(Error::DeadlineExceeded { timeout })
        }
    }
}

/// Cancel `cancel` once `deadline` passes, unless it is cancelled first.
async fn cancel_at(deadline: Instant, cancel: CancellationToken) {
    tokio::select! {
        _ = tokio::time::sleep_until(deadline) => {
            debug!("deadline reached, stopping pipeline stages");
            cancel.cancel();
        }
        _ = cancel.cancelled() => {}
    }
}
