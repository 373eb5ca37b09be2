//! Work item and factory capabilities.
//!
//! A work item carries its own processing step and knows how to describe
//! its result. The pipeline never looks inside one: it only moves it from
//! the factory to exactly one worker and then to the reporter.

/// A unit of work that knows how to process and report itself.
pub trait WorkItem: Send + 'static {
    /// Perform the processing step. Called exactly once, by one worker.
    ///
    /// Runs on the blocking thread pool, so it may do CPU-heavy or
    /// blocking work without stalling the other stages.
    fn process(&mut self);

    /// The display text and whether the computation succeeded.
    ///
    /// The success flag is passed through untouched; the pipeline never
    /// acts on it.
    fn result(&self) -> (String, bool);
}

/// Converts one raw input string into one work item.
///
/// Called once per input value, in input order, from the feeder only, so
/// implementations may keep sequential state (counters and the like).
pub trait ItemFactory: Send + 'static {
    type Item: WorkItem;

    fn make(&mut self, raw: String) -> Self::Item;
}

impl<F, W> ItemFactory for F
where
    F: FnMut(String) -> W + Send + 'static,
    W: WorkItem,
{
    type Item = W;

    fn make(&mut self, raw: String) -> W {
        self(raw)
    }
}
