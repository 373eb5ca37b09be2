//! Source feeder: raw input -> work items -> unprocessed queue.

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};
use crate::source::{Lines, TokenSource};
use crate::task::ItemFactory;
use crate::telemetry::metrics;

/// Where the raw input for a run comes from. Exactly one per run.
pub(crate) enum Input {
    Args(Vec<String>),
    Stream(Box<dyn TokenSource>),
}

impl Input {
    /// Non-empty args win; otherwise the given source, or stdin lines.
    /// The default source is only constructed when it is going to be read.
    pub(crate) fn resolve(args: Vec<String>, source: Option<Box<dyn TokenSource>>) -> Self {
        if !args.is_empty() {
            return Input::Args(args);
        }
        Input::Stream(source.unwrap_or_else(|| Box::new(Lines::stdin())))
    }
}

/// Feed every input value through `factory` onto `queue`, then close it.
///
/// A read failure is sent on `failed` before the queue is closed.
pub(crate) async fn feed<F: ItemFactory>(
    mut factory: F,
    input: Input,
    queue: mpsc::Sender<F::Item>,
    failed: oneshot::Sender<Error>,
    cancel: CancellationToken,
) {
    match fill(&mut factory, input, &queue, &cancel).await {
        Ok(fed) => debug!(fed, "input exhausted, closing unprocessed queue"),
        Err(e) => {
            debug!(error = %e, "feeding stopped on read error");
            let _ = failed.send(e);
        }
    }
    drop(queue);
}

async fn fill<F: ItemFactory>(
    factory: &mut F,
    input: Input,
    queue: &mpsc::Sender<F::Item>,
    cancel: &CancellationToken,
) -> Result<usize> {
    let created = metrics::items_created();
    let mut fed = 0;

    match input {
        Input::Args(args) => {
            for raw in args {
                let item = factory.make(raw);
                created.add(1, &[]);
                if !enqueue(item, queue, cancel).await {
                    return Ok(fed);
                }
                fed += 1;
            }
        }
        Input::Stream(mut source) => loop {
            let token = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(fed),
                token = source.next_token() => token.map_err(Error::StreamRead)?,
            };
            let Some(raw) = token else {
                break;
            };
            let item = factory.make(raw);
            created.add(1, &[]);
            if !enqueue(item, queue, cancel).await {
                return Ok(fed);
            }
            fed += 1;
        },
    }

    Ok(fed)
}

/// Returns false if the pipeline is stopping and feeding should end.
async fn enqueue<T>(item: T, queue: &mpsc::Sender<T>, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = queue.send(item) => sent.is_ok(),
    }
}
