//! Integration tests for the run orchestrator.

use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use taskpipe::echo::{EchoFactory, EchoTask};
use taskpipe::error::Error;
use taskpipe::pipeline::{RunConfig, effective_workers, run, run_with_timeout};
use taskpipe::source::{IterSource, Lines, TokenSource};
use taskpipe::task::WorkItem;

const GENEROUS: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Echoes its input; success only if processed exactly once.
struct Probe {
    raw: String,
    times_processed: u32,
}

impl Probe {
    fn new(raw: String) -> Self {
        Self {
            raw,
            times_processed: 0,
        }
    }
}

impl WorkItem for Probe {
    fn process(&mut self) {
        self.times_processed += 1;
    }

    fn result(&self) -> (String, bool) {
        (self.raw.clone(), self.times_processed == 1)
    }
}

/// Sleeps while processing and tracks how many are in flight at once.
struct Slow {
    raw: String,
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl WorkItem for Slow {
    fn process(&mut self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn result(&self) -> (String, bool) {
        (self.raw.clone(), true)
    }
}

fn slow_factory(delay: Duration) -> (Arc<AtomicUsize>, impl FnMut(String) -> Slow + Send + 'static) {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let factory = {
        let peak = Arc::clone(&peak);
        move |raw| Slow {
            raw,
            delay,
            in_flight: Arc::clone(&in_flight),
            peak: Arc::clone(&peak),
        }
    };
    (peak, factory)
}

/// Token source that records whether it was ever read.
struct Tripwire(Arc<AtomicBool>);

#[async_trait]
impl TokenSource for Tripwire {
    async fn next_token(&mut self) -> io::Result<Option<String>> {
        self.0.store(true, Ordering::SeqCst);
        Ok(Some("from-stream".to_string()))
    }
}

type Reported = Arc<Mutex<Vec<(String, bool)>>>;

fn collector<W: WorkItem>() -> (Reported, impl FnMut(W) + Send + 'static) {
    let seen: Reported = Arc::default();
    let sink = Arc::clone(&seen);
    (seen, move |item: W| sink.lock().unwrap().push(item.result()))
}

fn texts(seen: &Reported) -> HashSet<String> {
    seen.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
}

fn set(values: &[&str]) -> HashSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn direct_args_round_trip_through_three_workers() {
    let (seen, report) = collector::<Probe>();

    run_with_timeout(
        GENEROUS,
        Probe::new,
        3,
        RunConfig::new().args(["a", "b", "c"]).reporter(report),
    )
    .await
    .unwrap();

    assert_eq!(texts(&seen), set(&["a", "b", "c"]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_item_is_processed_once_and_reported_once() {
    let inputs: Vec<String> = (0..200).map(|i| format!("item-{i}")).collect();
    let (seen, report) = collector::<Probe>();

    run_with_timeout(
        GENEROUS,
        Probe::new,
        8,
        RunConfig::new()
            .args(inputs.clone())
            .queue_capacity(4)
            .reporter(report),
    )
    .await
    .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), inputs.len());
    assert!(seen.iter().all(|(_, once)| *once), "an item was processed twice");
    let unique: HashSet<&String> = seen.iter().map(|(t, _)| t).collect();
    assert_eq!(unique.len(), inputs.len());
}

#[tokio::test]
async fn repeated_runs_report_the_same_set() {
    let mut runs = Vec::new();
    for _ in 0..2 {
        let (seen, report) = collector::<EchoTask>();
        run_with_timeout(
            GENEROUS,
            EchoFactory::new(),
            4,
            RunConfig::new().args(["x", "y", "z"]).reporter(report),
        )
        .await
        .unwrap();
        runs.push(texts(&seen));
    }

    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[0], set(&["1: x", "2: y", "3: z"]));
}

#[tokio::test]
async fn absolute_deadline_run_completes() {
    let (seen, report) = collector::<Probe>();
    let deadline = tokio::time::Instant::now() + GENEROUS;

    run(
        deadline,
        Probe::new,
        2,
        RunConfig::new().args(["only"]).reporter(report),
    )
    .await
    .unwrap();

    assert_eq!(texts(&seen), set(&["only"]));
}

// ---------------------------------------------------------------------------
// Input selection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn direct_args_take_precedence_over_token_source() {
    let touched = Arc::new(AtomicBool::new(false));
    let (seen, report) = collector::<Probe>();

    run_with_timeout(
        GENEROUS,
        Probe::new,
        2,
        RunConfig::new()
            .args(["arg"])
            .token_source(Tripwire(Arc::clone(&touched)))
            .reporter(report),
    )
    .await
    .unwrap();

    assert!(!touched.load(Ordering::SeqCst), "token source was read");
    assert_eq!(texts(&seen), set(&["arg"]));
}

#[tokio::test]
async fn empty_args_fall_back_to_token_source() {
    let (seen, report) = collector::<Probe>();

    run_with_timeout(
        GENEROUS,
        Probe::new,
        2,
        RunConfig::new()
            .args(Vec::<String>::new())
            .token_source(Lines::new(&b"first\nsecond\r\nthird\n"[..]))
            .reporter(report),
    )
    .await
    .unwrap();

    assert_eq!(texts(&seen), set(&["first", "second", "third"]));
}

#[tokio::test]
async fn exhausted_empty_source_completes_with_nothing_reported() {
    let (seen, report) = collector::<Probe>();

    run_with_timeout(
        GENEROUS,
        Probe::new,
        2,
        RunConfig::new()
            .token_source(IterSource::new(Vec::<io::Result<String>>::new()))
            .reporter(report),
    )
    .await
    .unwrap();

    assert!(seen.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Worker count
// ---------------------------------------------------------------------------

#[test]
fn worker_count_is_floored_at_one() {
    assert_eq!(effective_workers(-7), 1);
    assert_eq!(effective_workers(0), 1);
    assert_eq!(effective_workers(1), 1);
    assert_eq!(effective_workers(12), 12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn non_positive_worker_count_runs_one_worker() {
    for requested in [0, -3] {
        let (peak, factory) = slow_factory(Duration::from_millis(10));
        let (seen, report) = collector::<Slow>();

        run_with_timeout(
            GENEROUS,
            factory,
            requested,
            RunConfig::new().args(["a", "b", "c", "d"]).reporter(report),
        )
        .await
        .unwrap();

        assert_eq!(seen.lock().unwrap().len(), 4);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn processing_never_exceeds_worker_count() {
    let (peak, factory) = slow_factory(Duration::from_millis(20));
    let inputs: Vec<String> = (0..24).map(|i| i.to_string()).collect();
    let (seen, report) = collector::<Slow>();

    run_with_timeout(
        GENEROUS,
        factory,
        3,
        RunConfig::new().args(inputs).reporter(report),
    )
    .await
    .unwrap();

    assert_eq!(seen.lock().unwrap().len(), 24);
    let peak = peak.load(Ordering::SeqCst);
    assert!((1..=3).contains(&peak), "peak concurrency was {peak}");
}

// ---------------------------------------------------------------------------
// Failure paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stream_failure_returns_stream_read_error() {
    let (seen, report) = collector::<Probe>();
    let source = IterSource::new(vec![
        Ok("one".to_string()),
        Ok("two".to_string()),
        Err(io::Error::other("disk on fire")),
        Ok("never".to_string()),
    ]);

    let err = run_with_timeout(
        GENEROUS,
        Probe::new,
        2,
        RunConfig::new().token_source(source).reporter(report),
    )
    .await
    .unwrap_err();

    assert!(err.is_stream_read(), "unexpected error: {err}");
    assert!(err.to_string().contains("disk on fire"));
    let reported = texts(&seen);
    assert!(reported.len() <= 2);
    assert!(!reported.contains("never"));
}

#[tokio::test]
async fn stream_failure_before_any_token() {
    let (seen, report) = collector::<Probe>();
    let source = IterSource::new(vec![Err(io::Error::other("closed early"))]);

    let err = run_with_timeout(
        GENEROUS,
        Probe::new,
        1,
        RunConfig::new().token_source(source).reporter(report),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::StreamRead(_)));
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_utf8_in_stream_is_a_read_error() {
    let (_seen, report) = collector::<Probe>();

    let err = run_with_timeout(
        GENEROUS,
        Probe::new,
        1,
        RunConfig::new()
            .token_source(Lines::new(&b"fine\n\xff\xfe\n"[..]))
            .reporter(report),
    )
    .await
    .unwrap_err();

    assert!(err.is_stream_read(), "unexpected error: {err}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deadline_before_completion_reports_nothing() {
    let (_peak, factory) = slow_factory(Duration::from_millis(400));
    let (seen, report) = collector::<Slow>();
    let started = std::time::Instant::now();

    let err = run_with_timeout(
        Duration::from_millis(50),
        factory,
        2,
        RunConfig::new().args(["a", "b", "c", "d"]).reporter(report),
    )
    .await
    .unwrap_err();

    assert!(err.is_deadline_exceeded(), "unexpected error: {err}");
    assert!(
        started.elapsed() < Duration::from_millis(350),
        "run blocked past its deadline: {:?}",
        started.elapsed()
    );
    assert!(seen.lock().unwrap().is_empty());

    // In-flight steps finish, but nothing reaches the reporter afterwards.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deadline_error_carries_the_timeout() {
    let (_peak, factory) = slow_factory(Duration::from_millis(200));

    let err = run_with_timeout(
        Duration::from_millis(20),
        factory,
        1,
        RunConfig::new().args(["slow"]).reporter(|_: Slow| {}),
    )
    .await
    .unwrap_err();

    match err {
        Error::DeadlineExceeded { timeout } => {
            assert_eq!(timeout, Some(Duration::from_millis(20)));
        }
        other => panic!("expected DeadlineExceeded, got {other}"),
    }
}

#[tokio::test]
async fn stalled_source_hits_deadline() {
    struct Stalled;

    #[async_trait]
    impl TokenSource for Stalled {
        async fn next_token(&mut self) -> io::Result<Option<String>> {
            std::future::pending().await
        }
    }

    let err = run_with_timeout(
        Duration::from_millis(30),
        Probe::new,
        2,
        RunConfig::new().token_source(Stalled).reporter(|_: Probe| {}),
    )
    .await
    .unwrap_err();

    assert!(err.is_deadline_exceeded());
}

/// Never finishes within the deadlines used below.
struct Stuck;

impl WorkItem for Stuck {
    fn process(&mut self) {
        std::thread::sleep(Duration::from_millis(100));
    }

    fn result(&self) -> (String, bool) {
        ("stuck".to_string(), true)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deadline_stopped_reporter_never_counts_as_completed() {
    for attempt in 0..50 {
        let (seen, report) = collector::<Stuck>();

        let result = run_with_timeout(
            Duration::from_millis(5),
            |_: String| Stuck,
            1,
            RunConfig::new().args(["a"]).reporter(report),
        )
        .await;

        match result {
            Err(e) if e.is_deadline_exceeded() => {}
            other => panic!("attempt {attempt}: expected deadline error, got {other:?}"),
        }
        assert!(seen.lock().unwrap().is_empty());
    }
}

#[tokio::test]
async fn unrepresentable_timeout_saturates_instead_of_panicking() {
    let timeout = taskpipe::config::parse_duration("10000000000000000000").unwrap();
    let (seen, report) = collector::<EchoTask>();

    run_with_timeout(
        timeout,
        EchoFactory::new(),
        1,
        RunConfig::new().args(["far"]).reporter(report),
    )
    .await
    .unwrap();

    assert_eq!(texts(&seen), set(&["1: far"]));
}

#[tokio::test]
async fn maximum_duration_timeout_completes() {
    let (seen, report) = collector::<Probe>();

    run_with_timeout(
        Duration::MAX,
        Probe::new,
        2,
        RunConfig::new().args(["x", "y"]).reporter(report),
    )
    .await
    .unwrap();

    assert_eq!(texts(&seen), set(&["x", "y"]));
}
