//! Integration tests for the depth mirror.
//!
//! The runner tests drive the engine with a mock snapshot source and a
//! hand-fed event channel. Tests that hit the real Binance API are ignored.
//! Run those with: cargo test --test integration -- --ignored

use std::sync::Arc;
use std::time::Duration;

use depth_mirror::engine::{
    DepthReporter, DepthSynchronizer, MirrorRunner, RunnerSettings, SnapshotLoader, Throttle,
};
use depth_mirror::feed::{
    BinanceRestClient, FeedEvent, MockConfig, MockFeed, ReconnectConfig, SnapshotBuilder,
    SnapshotSource,
};
use depth_mirror::render::depth_table;
use depth_mirror::{DepthView, MirrorError, PriceLevel, SharedBook, Side, UpdateBatch};
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Default)]
struct Collect(Vec<DepthView>);

impl DepthReporter for Collect {
    fn report(&mut self, view: &DepthView) {
        self.0.push(view.clone());
    }
}

struct Harness {
    book: SharedBook,
    events: mpsc::Sender<FeedEvent>,
    task: JoinHandle<Result<Vec<DepthView>, MirrorError>>,
}

impl Harness {
    fn start(feed: MockFeed) -> Self {
        let book = SharedBook::new("ETHUSDT");
        let sync = DepthSynchronizer::new(book.clone(), Throttle::new(Duration::from_secs(10)), 100);
        let mut runner = MirrorRunner::new(
            SnapshotLoader::new(Arc::new(feed)),
            sync,
            RunnerSettings {
                symbol: "ETHUSDT".to_string(),
                report_depth: 10,
                snapshot_depth: 1000,
                retry: ReconnectConfig {
                    initial_delay_ms: 10,
                    max_delay_s: 1,
                    ..Default::default()
                },
            },
        );

        let (events, mut rx) = mpsc::channel(64);
        let task = tokio::spawn(async move {
            let mut reporter = Collect::default();
            runner.run(&mut rx, &mut reporter).await.map(|_| reporter.0)
        });

        Self { book, events, task }
    }

    async fn send(&self, event: FeedEvent) {
        self.events.send(event).await.unwrap();
    }

    async fn update(&self, first: u64, last: u64, bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) {
        self.send(FeedEvent::Update(UpdateBatch::new(first, last, bids, asks)))
            .await;
    }

    async fn wait_until(&self, what: &str, cond: impl Fn(&SharedBook) -> bool) {
        for _ in 0..400 {
            if cond(&self.book) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {what}");
    }

    async fn finish(self) -> Vec<DepthView> {
        drop(self.events);
        self.task.await.unwrap().unwrap()
    }
}

fn snapshot_five() -> depth_mirror::Snapshot {
    SnapshotBuilder::new(5)
        .bid(dec!(9), dec!(4))
        .ask(dec!(10), dec!(1))
        .ask(dec!(11), dec!(2))
        .build()
}

#[tokio::test]
async fn accepted_updates_all_merge_but_report_once_per_interval() {
    let feed = MockFeed::new();
    feed.push_snapshot(snapshot_five());
    let harness = Harness::start(feed);

    harness.send(FeedEvent::Connected).await;
    harness.wait_until("snapshot", |b| b.is_synchronized()).await;

    harness
        .update(6, 6, vec![], vec![PriceLevel::new(dec!(10), dec!(0))])
        .await;
    harness
        .update(7, 7, vec![PriceLevel::new(dec!(8), dec!(3))], vec![])
        .await;
    harness.wait_until("second update", |b| b.last_update_id() == 7).await;

    assert_eq!(harness.book.top_n(Side::Bid, 10).len(), 2);
    assert_eq!(harness.book.top_n(Side::Ask, 10), vec![PriceLevel::new(dec!(11), dec!(2))]);

    let reports = harness.finish().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].last_update_id, 6);
}

#[tokio::test]
async fn gap_rebootstraps_from_a_fresh_snapshot() {
    let feed = MockFeed::new();
    feed.push_snapshot(snapshot_five());
    feed.push_snapshot(SnapshotBuilder::new(10).bid(dec!(9), dec!(1)).ask(dec!(12), dec!(1)).build());
    let harness = Harness::start(feed.clone());

    harness.send(FeedEvent::Connected).await;
    harness.wait_until("snapshot", |b| b.is_synchronized()).await;
    harness.update(6, 6, vec![], vec![]).await;
    harness.wait_until("first update", |b| b.last_update_id() == 6).await;

    // 7 is missing
    harness
        .update(8, 8, vec![PriceLevel::new(dec!(7), dec!(5))], vec![])
        .await;
    harness
        .wait_until("rebootstrap", |b| b.is_synchronized() && b.last_update_id() == 10)
        .await;

    assert_eq!(feed.requests().len(), 2);
    // the gapped update was never merged and the new snapshot covers it
    assert_eq!(harness.book.top_n(Side::Bid, 10), vec![PriceLevel::new(dec!(9), dec!(1))]);

    harness.update(11, 11, vec![], vec![PriceLevel::new(dec!(13), dec!(2))]).await;
    harness.wait_until("live again", |b| b.last_update_id() == 11).await;

    harness.finish().await;
}

#[tokio::test]
async fn disconnect_waits_for_reconnect_before_resyncing() {
    let feed = MockFeed::new();
    feed.push_snapshot(snapshot_five());
    feed.push_snapshot(SnapshotBuilder::new(20).build());
    let harness = Harness::start(feed.clone());

    harness.send(FeedEvent::Connected).await;
    harness.wait_until("snapshot", |b| b.is_synchronized()).await;

    harness
        .send(FeedEvent::Disconnected {
            reason: "heartbeat timeout".to_string(),
        })
        .await;
    harness.wait_until("desync", |b| !b.is_synchronized()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(feed.requests().len(), 1);

    harness.send(FeedEvent::Connected).await;
    harness
        .wait_until("resync", |b| b.is_synchronized() && b.last_update_id() == 20)
        .await;
    assert_eq!(feed.requests().len(), 2);

    harness.finish().await;
}

#[tokio::test]
async fn disconnect_while_fetching_discards_the_pending_snapshot() {
    let feed = MockFeed::with_config(MockConfig {
        latency_ms: 50,
        ..Default::default()
    });
    feed.push_snapshot(
        SnapshotBuilder::new(20)
            .ladder(dec!(99), dec!(101), dec!(1), 5)
            .build(),
    );
    let harness = Harness::start(feed.clone());

    harness.send(FeedEvent::Connected).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    harness
        .send(FeedEvent::Disconnected {
            reason: "connection reset".to_string(),
        })
        .await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!harness.book.is_synchronized());

    harness.send(FeedEvent::Connected).await;
    harness
        .wait_until("resync", |b| b.is_synchronized() && b.last_update_id() == 20)
        .await;
    // the first fetch was aborted before it reached the source
    assert_eq!(feed.requests().len(), 1);
    assert_eq!(harness.book.level_counts(), (5, 5));

    harness.update(21, 21, vec![], vec![PriceLevel::new(dec!(101), dec!(0))]).await;
    harness.wait_until("live update", |b| b.last_update_id() == 21).await;
    assert!(harness.book.is_synchronized());

    harness.finish().await;
}

#[tokio::test]
async fn failed_rebootstrap_is_retried() {
    let feed = MockFeed::new();
    feed.push_snapshot(snapshot_five());
    feed.push_failure("429 too many requests");
    feed.push_snapshot(SnapshotBuilder::new(9).build());
    let harness = Harness::start(feed.clone());

    harness.send(FeedEvent::Connected).await;
    harness.wait_until("snapshot", |b| b.is_synchronized()).await;

    harness.update(7, 7, vec![], vec![]).await;
    harness
        .wait_until("retried snapshot", |b| b.is_synchronized() && b.last_update_id() == 9)
        .await;

    assert_eq!(feed.requests().len(), 3);
    harness.finish().await;
}

#[tokio::test]
async fn startup_fails_when_snapshot_unavailable() {
    let feed = MockFeed::with_config(MockConfig {
        fail_snapshot: true,
        ..Default::default()
    });
    let harness = Harness::start(feed);
    harness.send(FeedEvent::Connected).await;

    let result = harness.task.await.unwrap();
    assert!(matches!(result, Err(MirrorError::FeedUnavailable { .. })));
}

#[tokio::test]
async fn reported_view_renders_as_table() {
    let feed = MockFeed::new();
    feed.push_snapshot(snapshot_five());
    let harness = Harness::start(feed);

    harness.send(FeedEvent::Connected).await;
    harness.wait_until("snapshot", |b| b.is_synchronized()).await;
    harness.update(6, 6, vec![PriceLevel::new(dec!(8.125), dec!(0.5))], vec![]).await;
    harness.wait_until("update", |b| b.last_update_id() == 6).await;

    let reports = harness.finish().await;
    let table = depth_table(&reports[0].bids, &reports[0].asks, 10);
    let lines: Vec<&str> = table.lines().collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("4.00"));
    assert!(lines[2].starts_with("0.50"));
    assert!(lines[2].contains("8.13"));
    assert!(lines[2].contains("11.00"));
}

#[tokio::test]
#[ignore = "requires network access to api.binance.com"]
async fn live_snapshot_from_binance() {
    let client = BinanceRestClient::new("https://api.binance.com", Duration::from_secs(10)).unwrap();

    let snapshot = client.get_snapshot("BTCUSDT", 5).await.unwrap();

    assert!(snapshot.last_update_id > 0);
    assert!(!snapshot.bids.is_empty());
    assert!(snapshot.bids.len() <= 5);
    assert!(snapshot.bids[0].price < snapshot.asks[0].price);
}
