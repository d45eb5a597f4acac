use std::sync::{Arc, Mutex};
use std::time::Duration;

use notifier::NotificationSubject;
use pipeline::{
    CancelToken, LineSource, PipelineConfig, PipelineError, Termination, UpdatePipeline,
};
use store::InMemoryStore;
use store::keys::{history_key, price_key};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use gated_store::GatedStore;

fn pipeline_over(store: Arc<InMemoryStore>, config: PipelineConfig) -> UpdatePipeline {
    let subject = NotificationSubject::new(0.0, store).expect("valid threshold");
    UpdatePipeline::new(Arc::new(subject), config)
}

fn lines(text: &'static str) -> tokio::io::Lines<BufReader<&'static [u8]>> {
    BufReader::new(text.as_bytes()).lines()
}

#[tokio::test]
async fn completes_after_applying_every_update() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = pipeline_over(store.clone(), PipelineConfig::default());

    let report = pipeline
        .run(lines("AAA 10\nBBB 20\nAAA 12.5\n"), 3, &CancelToken::new())
        .await;

    assert_eq!(report.termination, Termination::Completed);
    assert_eq!(report.produced, 3);
    assert_eq!(report.applied, 3);
    assert!(report.producer_error.is_none());
    assert!(!report.abandoned);
    assert_eq!(store.scalar(&price_key("AAA")).as_deref(), Some("12.50"));
    assert_eq!(store.scalar(&price_key("BBB")).as_deref(), Some("20.00"));
}

#[tokio::test]
async fn same_symbol_updates_apply_in_input_order() {
    let store = Arc::new(InMemoryStore::new());
    let config = PipelineConfig {
        queue_capacity: 1,
        ..PipelineConfig::default()
    };
    let pipeline = pipeline_over(store.clone(), config);

    let report = pipeline
        .run(lines("X 1\nX 2\nX 3\nX 4\n"), 4, &CancelToken::new())
        .await;

    assert_eq!(report.applied, 4);
    let prices: Vec<String> = store
        .list(&history_key("X"))
        .iter()
        .filter_map(|e| e.split_once('|').map(|(p, _)| p.to_string()))
        .collect();
    assert_eq!(prices, ["1.00", "2.00", "3.00", "4.00"]);
}

#[tokio::test]
async fn malformed_line_stops_producer_after_earlier_updates() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = pipeline_over(store.clone(), PipelineConfig::default());

    let report = pipeline
        .run(lines("AAA 10\nBBB 20\nCCC\n"), 3, &CancelToken::new())
        .await;

    assert_eq!(report.termination, Termination::Completed);
    assert_eq!(report.applied, 2);
    assert!(matches!(
        report.producer_error,
        Some(PipelineError::MalformedInput { ref line, .. }) if line == "CCC"
    ));
    assert!(store.scalar(&price_key("CCC")).is_none());
}

#[tokio::test]
async fn short_input_reports_exhaustion() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = pipeline_over(store, PipelineConfig::default());

    let report = pipeline
        .run(lines("AAA 1\n"), 3, &CancelToken::new())
        .await;

    assert_eq!(report.applied, 1);
    assert!(matches!(
        report.producer_error,
        Some(PipelineError::InputExhausted { read: 1, expected: 3 })
    ));
}

#[tokio::test]
async fn zero_count_completes_immediately() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = pipeline_over(store, PipelineConfig::default());

    let report = pipeline.run(lines(""), 0, &CancelToken::new()).await;

    assert_eq!(report.termination, Termination::Completed);
    assert_eq!(report.produced, 0);
    assert_eq!(report.applied, 0);
}

#[tokio::test]
async fn cancel_mid_update_applies_exactly_one() {
    let store = GatedStore::new();
    let subject = NotificationSubject::new(0.0, store.clone()).expect("valid threshold");
    let pipeline = UpdatePipeline::new(Arc::new(subject), PipelineConfig::default());
    let cancel = CancelToken::new();

    let input = lines("A 1\nB 2\nC 3\nD 4\nE 5\n");

    let (report, ()) = tokio::join!(pipeline.run(input, 5, &cancel), async {
        store.entered.notified().await;
        cancel.cancel();
        store.release.notify_one();
    });

    assert_eq!(report.termination, Termination::Canceled);
    assert_eq!(report.applied, 1);
    assert!(!report.abandoned);
    assert_eq!(store.inner.scalar(&price_key("A")).as_deref(), Some("1.00"));
    for symbol in ["B", "C", "D", "E"] {
        assert!(store.inner.scalar(&price_key(symbol)).is_none());
    }
}

#[tokio::test]
async fn cancel_before_start_applies_nothing() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = pipeline_over(store.clone(), PipelineConfig::default());
    let cancel = CancelToken::new();
    cancel.cancel();

    let report = pipeline.run(lines("A 1\nB 2\n"), 2, &cancel).await;

    assert_eq!(report.termination, Termination::Canceled);
    assert_eq!(report.applied, 0);
    assert!(store.scalar(&price_key("A")).is_none());
}

#[tokio::test]
async fn deadline_cancels_a_stalled_run() {
    let store = Arc::new(InMemoryStore::new());
    let config = PipelineConfig {
        deadline: Duration::from_millis(50),
        grace: Duration::from_secs(1),
        ..PipelineConfig::default()
    };
    let pipeline = pipeline_over(store, config);
    let cancel = CancelToken::new();

    // Sender kept alive so the producer waits forever on input.
    let (tx, rx) = mpsc::channel::<String>(4);
    tx.send("A 1".to_string()).await.unwrap();

    let report = pipeline.run(rx, 3, &cancel).await;

    assert_eq!(report.termination, Termination::TimedOut);
    assert_eq!(report.applied, 1);
    assert!(!report.abandoned);
    assert!(cancel.is_cancelled());
    drop(tx);
}

#[tokio::test]
async fn stuck_stage_is_abandoned_after_grace() {
    let store = GatedStore::new();
    let subject = NotificationSubject::new(0.0, store.clone()).expect("valid threshold");
    let config = PipelineConfig {
        deadline: Duration::from_millis(20),
        grace: Duration::from_millis(20),
        ..PipelineConfig::default()
    };
    let pipeline = UpdatePipeline::new(Arc::new(subject), config);

    // The first read is never released.
    let report = pipeline
        .run(lines("A 1\n"), 1, &CancelToken::new())
        .await;

    assert_eq!(report.termination, Termination::TimedOut);
    assert!(report.abandoned);
    assert_eq!(report.applied, 0);
}

#[tokio::test]
async fn detached_update_still_writes_price_and_history() {
    let store = GatedStore::slow_history(Duration::from_millis(150));
    let subject = NotificationSubject::new(0.0, store.clone()).expect("valid threshold");
    let config = PipelineConfig {
        deadline: Duration::from_millis(20),
        grace: Duration::from_millis(20),
        ..PipelineConfig::default()
    };
    let pipeline = UpdatePipeline::new(Arc::new(subject), config);

    let report = pipeline.run(lines("A 1\n"), 1, &CancelToken::new()).await;

    assert_eq!(report.termination, Termination::TimedOut);
    assert!(report.abandoned);

    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(store.inner.scalar(&price_key("A")).as_deref(), Some("1.00"));
    assert_eq!(store.inner.list(&history_key("A")).len(), 1);
}

#[tokio::test]
async fn shared_source_keeps_unread_lines_for_its_owner() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = pipeline_over(store.clone(), PipelineConfig::default());

    let mut shared = Arc::new(tokio::sync::Mutex::new(lines("A 1\nB 2\nrest\n")));

    let report = pipeline.run(shared.clone(), 2, &CancelToken::new()).await;

    assert_eq!(report.applied, 2);
    assert_eq!(shared.next_line().await.unwrap().as_deref(), Some("rest"));
}

#[tokio::test]
async fn prompt_is_called_before_each_read() {
    let store = Arc::new(InMemoryStore::new());
    let seen: Arc<Mutex<Vec<(usize, usize)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let pipeline = pipeline_over(store, PipelineConfig::default())
        .with_prompt(move |i, n| sink.lock().unwrap().push((i, n)));

    pipeline
        .run(lines("A 1\nB 2\n"), 2, &CancelToken::new())
        .await;

    assert_eq!(seen.lock().unwrap().as_slice(), &[(1, 2), (2, 2)]);
}
