use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use matcher::{Matcher, MatchOutcome};
use reference::{Category, Entity, InMemoryReferenceStore};

use crate::store::InMemoryBatchStore;
use crate::types::ItemStatus;

/// Fails every query and counts calls; tracks the peak number in flight.
#[derive(Default)]
struct CountingResolver {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Resolve for CountingResolver {
    async fn resolve(&self, request: &MatchRequest) -> MatchResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        MatchResult::failed(format!("No match found for '{}'", request.query))
    }
}

/// Panics on one query, standing in for a coordination bug.
struct PanickingResolver;

#[async_trait]
impl Resolve for PanickingResolver {
    async fn resolve(&self, request: &MatchRequest) -> MatchResult {
        if request.query == "boom" {
            panic!("resolver exploded");
        }
        MatchResult::failed("No match found")
    }
}

#[derive(Default)]
struct RecordingNotifier {
    seen: Mutex<Vec<(String, BatchStatus, usize)>>,
}

#[async_trait]
impl CompletionNotifier for RecordingNotifier {
    async fn notify(&self, url: &str, report: &BatchStatusReport) -> Result<(), BatchError> {
        self.seen.lock().unwrap().push((
            url.to_string(),
            report.request.status,
            report.request.counters.processed,
        ));
        Ok(())
    }
}

fn submission(queries: &[&str]) -> BatchSubmission {
    BatchSubmission {
        items: queries.iter().map(|q| MatchRequest::new(*q)).collect(),
        ..Default::default()
    }
}

fn coordinator_with(
    resolver: Arc<dyn Resolve>,
    cfg: BatchConfig,
) -> (BatchCoordinator, Dispatcher, Arc<InMemoryBatchStore>) {
    let store = Arc::new(InMemoryBatchStore::new());
    let (coordinator, dispatcher) =
        BatchCoordinator::new(store.clone(), resolver, cfg, None).unwrap();
    (coordinator, dispatcher, store)
}

fn ready(results: BatchResults) -> BatchResultSet {
    match results {
        BatchResults::Ready(set) => set,
        BatchResults::NotReady { status, .. } => panic!("batch still {status:?}"),
    }
}

#[tokio::test]
async fn empty_and_oversized_batches_are_rejected_without_side_effects() {
    let (coordinator, _dispatcher, store) =
        coordinator_with(Arc::new(CountingResolver::default()), BatchConfig::default());

    assert_eq!(
        coordinator.submit(submission(&[])).await.unwrap_err(),
        BatchError::Empty
    );

    let queries: Vec<String> = (0..1001).map(|i| format!("commune {i}")).collect();
    let refs: Vec<&str> = queries.iter().map(String::as_str).collect();
    let err = coordinator.submit(submission(&refs)).await.unwrap_err();
    assert_eq!(err, BatchError::TooManyItems { max: 1000, got: 1001 });
    assert!(store.is_empty());
}

#[tokio::test]
async fn accepted_batch_is_pending_until_claimed() {
    let (coordinator, mut dispatcher, _store) =
        coordinator_with(Arc::new(CountingResolver::default()), BatchConfig::default());

    let receipt = coordinator.submit(submission(&["Lyon", "Brest"])).await.unwrap();
    assert_eq!(receipt.status, BatchStatus::Pending);
    assert_eq!(receipt.total_items, 2);
    assert_eq!(receipt.estimated_duration, 1);

    let status = coordinator.status(receipt.request_id).await.unwrap();
    assert_eq!(status.request.status, BatchStatus::Pending);
    assert_eq!(status.progress, 0);
    match coordinator.results(receipt.request_id).await.unwrap() {
        BatchResults::NotReady {
            status,
            retry_after_secs,
            ..
        } => {
            assert_eq!(status, BatchStatus::Pending);
            assert!(retry_after_secs >= 1);
        }
        BatchResults::Ready(_) => panic!("results exposed before processing"),
    }

    assert_eq!(dispatcher.run_next().await, Some(receipt.request_id));
    let status = coordinator.status(receipt.request_id).await.unwrap();
    assert_eq!(status.request.status, BatchStatus::Completed);
    assert_eq!(status.progress, 100);
    assert!(status.request.started_at.is_some());
    assert!(status.request.completed_at.is_some());
}

#[tokio::test]
async fn duplicates_share_one_resolution_but_keep_their_own_items() {
    let resolver = Arc::new(CountingResolver::default());
    let (coordinator, mut dispatcher, _store) =
        coordinator_with(resolver.clone(), BatchConfig::default());

    let receipt = coordinator
        .submit(submission(&["Côtes-d'Armor", "Brest", "cotes d armor", "COTES D'ARMOR"]))
        .await
        .unwrap();
    dispatcher.run_next().await;

    assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    let set = ready(coordinator.results(receipt.request_id).await.unwrap());
    assert_eq!(set.items.len(), 4);
    assert_eq!(set.items[0].result, set.items[2].result);
    assert_eq!(set.items[0].result, set.items[3].result);
    assert_eq!(set.items[2].query, "cotes d armor");
    assert_eq!(set.summary.processed, 4);
    assert_eq!(set.summary.failed, 4);
}

#[tokio::test]
async fn different_hints_are_not_merged() {
    let resolver = Arc::new(CountingResolver::default());
    let (coordinator, mut dispatcher, _store) =
        coordinator_with(resolver.clone(), BatchConfig::default());

    let mut hinted = MatchRequest::new("Rennes");
    hinted.hints.category = Some(Category::Groupement);
    let batch = BatchSubmission {
        items: vec![MatchRequest::new("Rennes"), hinted],
        ..Default::default()
    };
    coordinator.submit(batch).await.unwrap();
    dispatcher.run_next().await;
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn resolution_calls_are_bounded_per_chunk() {
    let resolver = Arc::new(CountingResolver::default());
    let (coordinator, mut dispatcher, _store) =
        coordinator_with(resolver.clone(), BatchConfig::default());

    let queries: Vec<String> = (0..35).map(|i| format!("lieu-dit {i}")).collect();
    let refs: Vec<&str> = queries.iter().map(String::as_str).collect();
    coordinator.submit(submission(&refs)).await.unwrap();
    dispatcher.run_next().await;

    assert_eq!(resolver.calls.load(Ordering::SeqCst), 35);
    let peak = resolver.peak.load(Ordering::SeqCst);
    assert!(peak <= 10, "peak in flight was {peak}");
}

#[tokio::test]
async fn results_follow_input_order() {
    let store = InMemoryReferenceStore::new();
    store.extend(
        vec![
            Entity {
                code: "84".into(),
                nom: "Auvergne-Rhône-Alpes".into(),
                category: Category::Region,
                departement_code: None,
                region_code: None,
                nature: None,
            },
            Entity {
                code: "29019".into(),
                nom: "Brest".into(),
                category: Category::Commune,
                departement_code: Some("29".into()),
                region_code: Some("53".into()),
                nature: None,
            },
        ],
        vec![],
    );
    let matcher = Arc::new(Matcher::new(Arc::new(store)));
    let cfg = BatchConfig {
        concurrency: 2,
        ..Default::default()
    };
    let (coordinator, mut dispatcher, _store) = coordinator_with(matcher, cfg);

    let receipt = coordinator
        .submit(submission(&["", "Brest", "84", "Atlantide", "brest"]))
        .await
        .unwrap();
    dispatcher.run_next().await;

    let set = ready(coordinator.results(receipt.request_id).await.unwrap());
    let indices: Vec<usize> = set.items.iter().map(|item| item.input_index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    let statuses: Vec<ItemStatus> = set.items.iter().map(|item| item.status).collect();
    assert_eq!(
        statuses,
        vec![
            ItemStatus::Failed,
            ItemStatus::Matched,
            ItemStatus::Matched,
            ItemStatus::Failed,
            ItemStatus::Matched,
        ]
    );
    assert_eq!(
        set.items[0].result,
        Some(MatchResult::failed("Query is required"))
    );
    assert_eq!(set.summary.matched, 3);
    assert_eq!(set.summary.failed, 2);
    assert_eq!(
        set.items[2].result.as_ref().map(MatchResult::outcome),
        Some(MatchOutcome::Matched)
    );
}

#[tokio::test]
async fn progress_never_decreases_while_polling() {
    let resolver = Arc::new(CountingResolver::default());
    let cfg = BatchConfig {
        concurrency: 3,
        ..Default::default()
    };
    let (coordinator, dispatcher, _store) = coordinator_with(resolver, cfg);
    let queries: Vec<String> = (0..30).map(|i| format!("hameau {i}")).collect();
    let refs: Vec<&str> = queries.iter().map(String::as_str).collect();
    let receipt = coordinator.submit(submission(&refs)).await.unwrap();

    dispatcher.spawn();
    let mut seen = Vec::new();
    for _ in 0..1000 {
        let report = coordinator.status(receipt.request_id).await.unwrap();
        seen.push(report.progress);
        if report.request.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    assert_eq!(seen.last(), Some(&100));
    assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]), "{seen:?}");
}

#[tokio::test]
async fn coordination_panic_marks_batch_failed_and_keeps_partial_results() {
    let cfg = BatchConfig {
        concurrency: 1,
        ..Default::default()
    };
    let (coordinator, mut dispatcher, _store) = coordinator_with(Arc::new(PanickingResolver), cfg);
    let receipt = coordinator
        .submit(submission(&["Quimper", "boom", "Vannes"]))
        .await
        .unwrap();
    dispatcher.run_next().await;

    let set = ready(coordinator.results(receipt.request_id).await.unwrap());
    assert_eq!(set.status, BatchStatus::Failed);
    assert_eq!(set.items[0].status, ItemStatus::Failed);
    assert!(set.items[0].result.is_some());
    assert_eq!(set.items[1].status, ItemStatus::Pending);
    assert_eq!(set.items[2].status, ItemStatus::Pending);
    assert_eq!(set.summary.processed, 1);
}

#[tokio::test]
async fn webhook_fires_once_on_completion() {
    let notifier = Arc::new(RecordingNotifier::default());
    let store = Arc::new(InMemoryBatchStore::new());
    let (coordinator, mut dispatcher) = BatchCoordinator::new(
        store,
        Arc::new(CountingResolver::default()),
        BatchConfig::default(),
        Some(notifier.clone() as Arc<dyn CompletionNotifier>),
    )
    .unwrap();

    let batch = BatchSubmission {
        items: vec![MatchRequest::new("Lorient"), MatchRequest::new("Lorient")],
        client_id: Some("etl".into()),
        webhook_url: Some("https://hooks.example.org/done".into()),
    };
    coordinator.submit(batch).await.unwrap();
    dispatcher.run_next().await;

    let seen = notifier.seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![(
            "https://hooks.example.org/done".to_string(),
            BatchStatus::Completed,
            2
        )]
    );
}

#[tokio::test]
async fn invalid_webhook_is_rejected_up_front() {
    let (coordinator, _dispatcher, store) =
        coordinator_with(Arc::new(CountingResolver::default()), BatchConfig::default());
    let batch = BatchSubmission {
        items: vec![MatchRequest::new("Lorient")],
        webhook_url: Some("mailto:ops@example.org".into()),
        ..Default::default()
    };
    assert!(matches!(
        coordinator.submit(batch).await,
        Err(BatchError::InvalidWebhook(_))
    ));
    assert!(store.is_empty());
}

#[tokio::test]
async fn full_queue_rejects_without_persisting() {
    let cfg = BatchConfig {
        queue_capacity: 1,
        ..Default::default()
    };
    let (coordinator, _dispatcher, store) =
        coordinator_with(Arc::new(CountingResolver::default()), cfg);
    coordinator.submit(submission(&["Lorient"])).await.unwrap();
    assert_eq!(
        coordinator.submit(submission(&["Vannes"])).await.unwrap_err(),
        BatchError::QueueFull
    );
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn client_listing_and_reaping() {
    let (coordinator, _dispatcher, _store) =
        coordinator_with(Arc::new(CountingResolver::default()), BatchConfig::default());
    let batch = BatchSubmission {
        items: vec![MatchRequest::new("Lorient")],
        client_id: Some("etl".into()),
        ..Default::default()
    };
    let receipt = coordinator.submit(batch).await.unwrap();

    let listed = coordinator.list_by_client("etl").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(coordinator.list_by_client("crm").await.unwrap().is_empty());

    assert_eq!(coordinator.reap_expired(Utc::now()).await.unwrap(), 0);
    let later = Utc::now() + chrono::Duration::hours(25);
    assert_eq!(coordinator.reap_expired(later).await.unwrap(), 1);
    assert_eq!(
        coordinator.status(receipt.request_id).await.unwrap_err(),
        BatchError::NotFound(receipt.request_id)
    );
}

#[test]
fn grouping_keeps_first_appearance_order() {
    let items: Vec<BatchMatchItem> = ["Brest", "Lorient", "BREST", "Lorient ", "Vannes"]
        .iter()
        .enumerate()
        .map(|(i, q)| BatchMatchItem::pending(i, MatchRequest::new(*q)))
        .collect();
    let groups = group_items(&items);
    let indices: Vec<Vec<usize>> = groups.iter().map(|g| g.indices.clone()).collect();
    assert_eq!(indices, vec![vec![0, 2], vec![1, 3], vec![4]]);
    assert_eq!(groups[0].request.query, "Brest");
}

#[test]
fn contentless_queries_are_not_merged_with_each_other() {
    let items: Vec<BatchMatchItem> = ["!!!", "", "   ", "!!! ", "?"]
        .iter()
        .enumerate()
        .map(|(i, q)| BatchMatchItem::pending(i, MatchRequest::new(*q)))
        .collect();
    let groups = group_items(&items);
    let indices: Vec<Vec<usize>> = groups.iter().map(|g| g.indices.clone()).collect();
    assert_eq!(indices, vec![vec![0, 3], vec![1, 2], vec![4]]);
}

#[tokio::test]
async fn empty_item_keeps_its_own_failure_message() {
    let store = Arc::new(InMemoryReferenceStore::new());
    let resolver: Arc<dyn Resolve> = Arc::new(Matcher::new(store));
    let (coordinator, mut dispatcher) = BatchCoordinator::new(
        Arc::new(InMemoryBatchStore::new()),
        resolver,
        BatchConfig::default(),
        None,
    )
    .unwrap();

    let receipt = coordinator
        .submit(BatchSubmission {
            items: vec![MatchRequest::new("!!!"), MatchRequest::new("")],
            ..Default::default()
        })
        .await
        .unwrap();
    dispatcher.run_next().await;

    let BatchResults::Ready(set) = coordinator.results(receipt.request_id).await.unwrap() else {
        panic!("batch should be finished");
    };
    let messages: Vec<String> = set
        .items
        .iter()
        .map(|item| match &item.result {
            Some(MatchResult::Failed { message }) => message.clone(),
            other => panic!("unexpected result {other:?}"),
        })
        .collect();
    assert_eq!(messages[0], "No match found for '!!!'");
    assert_eq!(messages[1], matcher::QUERY_REQUIRED);
}
