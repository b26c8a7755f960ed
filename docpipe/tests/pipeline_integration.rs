//! Integration tests for the fetch/transform pipeline.
//!
//! These tests verify the complete pipeline workflow including:
//! - At most one fetch and one transform in flight at a time
//! - Fetch of one request overlapping the transform of another
//! - No lost or duplicated requests under concurrent submission
//! - Per-stage FIFO ordering
//! - Idle worker teardown and restart
//! - Failure isolation for fetch errors, transform errors and panics
//! - Caller drop, shutdown and construction errors

use docpipe::pipeline::{
    FetchError, Fetcher, Pipeline, PipelineConfig, PipelineError, RequestError, StageKind,
    TransformError, Transformer,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// Test Helpers
// =============================================================================

/// Tracks calls into one backend and the peak number of concurrent calls.
#[derive(Default)]
struct Probe {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl Probe {
    fn enter(&self, key: &str) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(key.to_string());
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    fn max(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

/// Shared view of both backends, used to observe stage overlap.
#[derive(Default)]
struct Probes {
    fetch: Probe,
    transform: Probe,
    overlap_seen: AtomicBool,
}

impl Probes {
    fn note_overlap(&self) {
        if self.fetch.is_active() && self.transform.is_active() {
            self.overlap_seen.store(true, Ordering::SeqCst);
        }
    }
}

/// Echoes the key after a delay.
///
/// Keys starting with `missing` fail and keys starting with `boom` panic.
struct EchoFetcher {
    probes: Arc<Probes>,
    delay: Duration,
    delays: HashMap<String, Duration>,
}

impl EchoFetcher {
    fn new(probes: Arc<Probes>, delay: Duration) -> Self {
        Self {
            probes,
            delay,
            delays: HashMap::new(),
        }
    }

    fn with_delay_for(mut self, key: &str, delay: Duration) -> Self {
        self.delays.insert(key.to_string(), delay);
        self
    }
}

impl Fetcher for EchoFetcher {
    type Content = String;

    async fn fetch(&self, key: &str) -> Result<String, FetchError> {
        self.probes.fetch.enter(key);
        self.probes.note_overlap();

        let delay = self.delays.get(key).copied().unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.probes.note_overlap();
        self.probes.fetch.exit();

        if key.starts_with("missing") {
            return Err(FetchError::new(format!("no such key: {}", key)));
        }
        if key.starts_with("boom") {
            panic!("fetch exploded on {}", key);
        }
        Ok(key.to_string())
    }
}

/// Uppercases content after a blocking delay.
///
/// Content starting with `bad` fails and content starting with `crash`
/// panics.
struct UppercaseTransformer {
    probes: Arc<Probes>,
    delay: Duration,
}

impl Transformer for UppercaseTransformer {
    type Content = String;
    type Output = String;

    fn transform(&self, content: String) -> Result<String, TransformError> {
        self.probes.transform.enter(&content);
        self.probes.note_overlap();

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.probes.note_overlap();
        self.probes.transform.exit();

        if content.starts_with("bad") {
            return Err(TransformError::new("cannot transform"));
        }
        if content.starts_with("crash") {
            panic!("transform exploded");
        }
        Ok(content.to_uppercase())
    }
}

type TestPipeline = Pipeline<EchoFetcher, UppercaseTransformer>;

fn fast_idle() -> PipelineConfig {
    PipelineConfig::with_idle_policy(Duration::from_millis(1), 5)
}

fn pipeline(fetch_ms: u64, transform_ms: u64) -> (TestPipeline, Arc<Probes>) {
    let probes = Arc::new(Probes::default());
    let pipeline = Pipeline::builder()
        .fetcher(EchoFetcher::new(
            Arc::clone(&probes),
            Duration::from_millis(fetch_ms),
        ))
        .transformer(UppercaseTransformer {
            probes: Arc::clone(&probes),
            delay: Duration::from_millis(transform_ms),
        })
        .config(fast_idle())
        .build()
        .unwrap();
    (pipeline, probes)
}

async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..5000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not met within 5s");
}

async fn wait_for_idle(pipeline: &TestPipeline) {
    wait_until(|| {
        let stats = pipeline.stats();
        stats.is_idle()
            && stats.fetch.workers_started == stats.fetch.workers_stopped
            && stats.transform.workers_started == stats.transform.workers_stopped
    })
    .await;
}

// =============================================================================
// Integration Tests
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_five_keys_resolve_in_order_with_single_flight() {
    let (pipeline, probes) = pipeline(5, 5);

    let handles: Vec<_> = ["1", "2", "3", "4", "5"]
        .iter()
        .map(|key| pipeline.submit(*key))
        .collect();

    for (handle, expected) in handles.into_iter().zip(["1", "2", "3", "4", "5"]) {
        assert_eq!(handle.await.unwrap(), expected);
    }

    assert_eq!(probes.fetch.calls(), vec!["1", "2", "3", "4", "5"]);
    assert_eq!(probes.transform.calls(), vec!["1", "2", "3", "4", "5"]);
    assert_eq!(probes.fetch.max(), 1);
    assert_eq!(probes.transform.max(), 1);

    let stats = pipeline.stats();
    assert_eq!(stats.submitted, 5);
    assert_eq!(stats.fetch.completed, 5);
    assert_eq!(stats.transform.completed, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fetch_overlaps_transform() {
    // Transform is slower than fetch, so the next fetch always starts while
    // the previous transform is still running.
    let (pipeline, probes) = pipeline(20, 30);

    let handles: Vec<_> = (0..4).map(|i| pipeline.submit(format!("k{}", i))).collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(probes.overlap_seen.load(Ordering::SeqCst));
    assert_eq!(probes.fetch.max(), 1);
    assert_eq!(probes.transform.max(), 1);
}

#[test]
fn test_submissions_from_many_threads_are_not_lost() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap();
    let probes = Arc::new(Probes::default());
    let pipeline = Pipeline::builder()
        .fetcher(EchoFetcher::new(Arc::clone(&probes), Duration::ZERO))
        .transformer(UppercaseTransformer {
            probes: Arc::clone(&probes),
            delay: Duration::ZERO,
        })
        // Workers exit almost immediately, so start/stop races are frequent
        .config(PipelineConfig::with_idle_policy(Duration::from_micros(50), 1))
        .runtime(runtime.handle().clone())
        .build()
        .unwrap();

    let threads: Vec<_> = (0..8)
        .map(|t| {
            let pipeline = pipeline.clone();
            std::thread::spawn(move || {
                for i in 0..50 {
                    let key = format!("t{}-{}", t, i);
                    let result = pipeline.submit(key.clone()).wait_blocking();
                    assert_eq!(result.unwrap(), key.to_uppercase());
                    if i % 7 == 0 {
                        std::thread::sleep(Duration::from_millis(1));
                    }
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    let mut fetched = probes.fetch.calls();
    fetched.sort();
    fetched.dedup();
    assert_eq!(fetched.len(), 400, "every key fetched exactly once");
    assert_eq!(probes.transform.calls().len(), 400);
    assert_eq!(probes.fetch.max(), 1);
    assert_eq!(probes.transform.max(), 1);

    let stats = pipeline.stats();
    assert_eq!(stats.submitted, 400);
    assert_eq!(stats.fetch.completed, 400);
    assert_eq!(stats.transform.completed, 400);
    assert!(stats.fetch.workers_started >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_burst_submission_keeps_stage_fifo() {
    let (pipeline, probes) = pipeline(1, 0);

    let keys: Vec<String> = (0..30).map(|i| format!("key-{:02}", i)).collect();
    let handles: Vec<_> = keys.iter().map(|k| pipeline.submit(k.clone())).collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(probes.fetch.calls(), keys);
    assert_eq!(probes.transform.calls(), keys);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_idle_workers_stop_and_restart() {
    let (pipeline, _probes) = pipeline(0, 0);

    assert_eq!(pipeline.submit("first").await.unwrap(), "FIRST");
    wait_for_idle(&pipeline).await;

    let stats = pipeline.stats();
    assert_eq!(stats.fetch.workers_started, 1);
    assert!(!stats.fetch.worker_active);
    assert!(!stats.transform.worker_active);

    assert_eq!(pipeline.submit("second").await.unwrap(), "SECOND");
    wait_for_idle(&pipeline).await;

    let stats = pipeline.stats();
    assert_eq!(stats.fetch.workers_started, 2);
    assert_eq!(stats.transform.workers_started, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fetch_failure_is_isolated() {
    let (pipeline, probes) = pipeline(1, 1);

    let ok_before = pipeline.submit("a");
    let failed = pipeline.submit("missing-page");
    let ok_after = pipeline.submit("b");

    assert_eq!(ok_before.await.unwrap(), "A");
    match failed.await {
        Err(RequestError::Fetch { key, source }) => {
            assert_eq!(key, "missing-page");
            assert_eq!(source.message, "no such key: missing-page");
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(ok_after.await.unwrap(), "B");

    assert_eq!(probes.transform.calls(), vec!["a", "b"]);
    assert_eq!(pipeline.stats().fetch.failed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_transform_failure_and_panic_are_isolated() {
    let (pipeline, _probes) = pipeline(0, 0);

    let bad = pipeline.submit("bad-input");
    let crash = pipeline.submit("crash-now");
    let good = pipeline.submit("fine");

    assert!(matches!(bad.await, Err(RequestError::Transform(_))));
    match crash.await {
        Err(err @ RequestError::Panicked { .. }) => {
            assert_eq!(err.stage(), Some(StageKind::Transform));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(good.await.unwrap(), "FINE");
    assert_eq!(pipeline.stats().transform.failed, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fetch_panic_does_not_stall_stage() {
    let (pipeline, _probes) = pipeline(0, 0);

    let boom = pipeline.submit("boom");
    let next = pipeline.submit("next");

    let err = boom.await.unwrap_err();
    assert_eq!(err.stage(), Some(StageKind::Fetch));
    assert_eq!(next.await.unwrap(), "NEXT");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dropped_request_is_skipped() {
    let probes = Arc::new(Probes::default());
    let pipeline = Pipeline::builder()
        .fetcher(
            EchoFetcher::new(Arc::clone(&probes), Duration::ZERO)
                .with_delay_for("slow", Duration::from_millis(50)),
        )
        .transformer(UppercaseTransformer {
            probes: Arc::clone(&probes),
            delay: Duration::ZERO,
        })
        .build()
        .unwrap();

    let slow = pipeline.submit("slow");
    drop(pipeline.submit("abandoned"));
    let last = pipeline.submit("last");

    assert_eq!(slow.await.unwrap(), "SLOW");
    assert_eq!(last.await.unwrap(), "LAST");
    assert_eq!(probes.fetch.calls(), vec!["slow", "last"]);
    assert_eq!(pipeline.stats().fetch.skipped, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shutdown_rejects_queued_and_new_requests() {
    let (pipeline, probes) = pipeline(30, 0);

    let in_flight = pipeline.submit("first");
    let queued: Vec<_> = (0..3).map(|i| pipeline.submit(format!("q{}", i))).collect();
    wait_until(|| probes.fetch.is_active()).await;

    pipeline.shutdown();

    for handle in queued {
        assert!(matches!(handle.await, Err(RequestError::Shutdown)));
    }
    // The fetch already running completes; its transform is refused.
    assert!(matches!(in_flight.await, Err(RequestError::Shutdown)));
    assert!(matches!(
        pipeline.submit("late").await,
        Err(RequestError::Shutdown)
    ));
    assert_eq!(probes.fetch.calls(), vec!["first"]);
    assert!(probes.transform.calls().is_empty());
}

#[tokio::test]
async fn test_result_can_be_bounded_by_caller_timeout() {
    let (pipeline, _probes) = pipeline(200, 0);

    let result = tokio::time::timeout(Duration::from_millis(10), pipeline.submit("slow")).await;

    assert!(result.is_err(), "caller-side timeout should elapse first");
}

#[test]
fn test_construction_requires_runtime() {
    let probes = Arc::new(Probes::default());
    let result = Pipeline::new(
        EchoFetcher::new(Arc::clone(&probes), Duration::ZERO),
        UppercaseTransformer {
            probes,
            delay: Duration::ZERO,
        },
    );

    assert!(matches!(result, Err(PipelineError::NoRuntime(_))));
}
