//! Worker pool: N workers drain the unprocessed queue into the processed one.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::task::WorkItem;
use crate::telemetry::metrics;

/// Start `workers` workers plus the supervisor that closes `processed`.
///
/// Each worker holds a clone of `processed`; the supervisor holds the
/// original and drops it only after joining every worker, so the processed
/// queue closes exactly once, after the last worker has exited.
pub(crate) fn spawn<W: WorkItem>(
    workers: usize,
    unprocessed: mpsc::Receiver<W>,
    processed: mpsc::Sender<W>,
    cancel: CancellationToken,
) {
    let unprocessed = Arc::new(Mutex::new(unprocessed));
    let mut set = JoinSet::new();
    for worker_id in 0..workers {
        set.spawn(work(
            worker_id,
            Arc::clone(&unprocessed),
            processed.clone(),
            cancel.clone(),
        ));
    }

    tokio::spawn(async move {
        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "worker task failed");
            }
        }
        debug!("all workers exited, closing processed queue");
        drop(processed);
    });
}

async fn work<W: WorkItem>(
    worker_id: usize,
    unprocessed: Arc<Mutex<mpsc::Receiver<W>>>,
    processed: mpsc::Sender<W>,
    cancel: CancellationToken,
) {
    let counter = metrics::items_processed();
    debug!(worker_id, "worker started");

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            item = async { unprocessed.lock().await.recv().await } => item,
        };
        // Closed and drained.
        let Some(mut item) = next else {
            break;
        };

        // A started step always runs to completion; cancellation is only
        // checked again at the hand-off.
        let item = match tokio::task::spawn_blocking(move || {
            item.process();
            item
        })
        .await
        {
            Ok(item) => item,
            Err(e) => {
                error!(worker_id, error = %e, "processing step panicked, dropping item");
                continue;
            }
        };
        counter.add(1, &[]);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = processed.send(item) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }

    debug!(worker_id, "worker exited");
}
