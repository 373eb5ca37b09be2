//! Reporter sink: hands each processed item to the reporting function.

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Reporter;
use crate::task::WorkItem;
use crate::telemetry::metrics;

/// How the sink finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Drained {
    /// The processed queue closed and every item in it was reported.
    Complete { reported: usize },
    /// Stopped by the deadline or run cancellation before the queue closed.
    Stopped { reported: usize },
}

/// Report items in arrival order until the queue closes or the run stops.
pub(crate) async fn drain<W: WorkItem>(
    mut processed: mpsc::Receiver<W>,
    mut report: Reporter<W>,
    deadline: Instant,
    cancel: CancellationToken,
) -> Drained {
    let counter = metrics::items_reported();
    let expired = tokio::time::sleep_until(deadline);
    tokio::pin!(expired);
    let mut reported = 0;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(reported, "run stopped, reporter exiting");
                return Drained::Stopped { reported };
            }
            _ = &mut expired => {
                debug!(reported, "deadline reached, reporter exiting");
                return Drained::Stopped { reported };
            }
            item = processed.recv() => item,
        };
        let Some(item) = next else {
            return Drained::Complete { reported };
        };
        report(item);
        reported += 1;
        counter.add(1, &[]);
    }
}
