//! Async driver connecting the feed, the synchronizer and the reporter.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::loader::SnapshotLoader;
use super::sync::{DepthSynchronizer, UpdateOutcome};
use crate::error::Result;
use crate::feed::{FeedEvent, ReconnectConfig, SnapshotSource};
use crate::metrics;
use crate::orderbook::store::SharedBook;
use crate::orderbook::types::{DepthView, Snapshot};

/// Receives the book whenever the throttle lets an emission through.
pub trait DepthReporter: Send {
    fn report(&mut self, view: &DepthView);
}

/// Static parameters of a runner.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Uppercase symbol passed to the snapshot source.
    pub symbol: String,
    /// Levels per side handed to the reporter.
    pub report_depth: usize,
    /// Levels per side requested in each snapshot.
    pub snapshot_depth: usize,
    /// Backoff between failed snapshot attempts.
    pub retry: ReconnectConfig,
}

type SnapshotResult = (u64, Result<Snapshot>);

/// Drives one symbol's synchronizer from a feed subscription.
pub struct MirrorRunner<S> {
    loader: SnapshotLoader<S>,
    sync: DepthSynchronizer,
    settings: RunnerSettings,
}

impl<S: SnapshotSource + 'static> MirrorRunner<S> {
    pub fn new(loader: SnapshotLoader<S>, sync: DepthSynchronizer, settings: RunnerSettings) -> Self {
        Self {
            loader,
            sync,
            settings,
        }
    }

    /// Handle readers can use while the runner writes.
    pub fn book(&self) -> SharedBook {
        self.sync.book().clone()
    }

    /// Processes feed events until the feed closes.
    ///
    /// A snapshot is fetched whenever the synchronizer needs one and the
    /// stream is connected; updates keep being buffered while it is in
    /// flight. Failing to load the very first snapshot is fatal, later
    /// failures are retried with backoff.
    pub async fn run<R: DepthReporter>(
        &mut self,
        events: &mut mpsc::Receiver<FeedEvent>,
        reporter: &mut R,
    ) -> Result<()> {
        let (snapshot_tx, mut snapshot_rx) = mpsc::channel::<SnapshotResult>(1);
        let mut connected = false;
        let mut bootstrapped = false;
        let mut failures = 0u32;
        let mut generation = 0u64;
        let mut in_flight: Option<JoinHandle<()>> = None;

        let outcome = loop {
            if connected && in_flight.is_none() && self.sync.needs_snapshot() {
                let delay = failures
                    .checked_sub(1)
                    .map(|attempt| self.settings.retry.next_delay(attempt));
                if bootstrapped {
                    metrics::inc_rebootstraps();
                }
                in_flight = Some(self.spawn_fetch(snapshot_tx.clone(), generation, delay));
            }

            tokio::select! {
                biased;

                event = events.recv() => match event {
                    None => {
                        info!(symbol = %self.settings.symbol, "Feed closed, stopping");
                        break Ok(());
                    }
                    Some(FeedEvent::Connected) => {
                        info!(symbol = %self.settings.symbol, "Feed connected");
                        connected = true;
                    }
                    Some(FeedEvent::Disconnected { reason }) => {
                        warn!(symbol = %self.settings.symbol, reason = %reason, "Feed disconnected");
                        connected = false;
                        if let Some(task) = in_flight.take() {
                            task.abort();
                        }
                        generation += 1;
                        self.sync.on_disconnect();
                    }
                    Some(FeedEvent::Update(update)) => {
                        let outcome = self.sync.on_update(update, Instant::now());
                        if matches!(outcome, UpdateOutcome::Applied { emit: true }) {
                            self.emit(reporter);
                        }
                    }
                },

                Some((fetched_generation, result)) = snapshot_rx.recv() => {
                    if fetched_generation != generation {
                        debug!(fetched_generation, generation, "Discarding superseded snapshot");
                        continue;
                    }
                    in_flight = None;

                    match result {
                        Ok(snapshot) => {
                            bootstrapped = true;
                            let report = self.sync.install_snapshot(snapshot, Instant::now());
                            if report.gap {
                                failures = failures.saturating_add(1);
                            } else {
                                failures = 0;
                            }
                            if report.emit {
                                self.emit(reporter);
                            }
                        }
                        Err(e) if !bootstrapped => break Err(e),
                        Err(e) => {
                            failures = failures.saturating_add(1);
                            warn!(error = %e, failures, "Rebootstrap failed, will retry");
                        }
                    }
                }
            }
        };

        if let Some(task) = in_flight.take() {
            task.abort();
        }
        outcome
    }

    fn emit<R: DepthReporter>(&self, reporter: &mut R) {
        let view = self.sync.book().view(self.settings.report_depth);
        reporter.report(&view);
        metrics::inc_emissions();
    }

    fn spawn_fetch(
        &self,
        tx: mpsc::Sender<SnapshotResult>,
        generation: u64,
        delay: Option<Duration>,
    ) -> JoinHandle<()> {
        let loader = self.loader.clone();
        let symbol = self.settings.symbol.clone();
        let depth = self.settings.snapshot_depth;

        tokio::spawn(async move {
            if let Some(delay) = delay {
                info!(delay_ms = delay.as_millis() as u64, "Fetching snapshot after delay");
                tokio::time::sleep(delay).await;
            }
            let result = loader.load_snapshot(&symbol, depth).await;
            if tx.send((generation, result)).await.is_err() {
                debug!("Runner gone, dropping snapshot");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::throttle::Throttle;
    use crate::error::MirrorError;
    use crate::feed::{MockFeed, SnapshotBuilder};
    use crate::orderbook::types::{PriceLevel, UpdateBatch};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    #[derive(Default)]
    struct Collect(Vec<DepthView>);

    impl DepthReporter for Collect {
        fn report(&mut self, view: &DepthView) {
            self.0.push(view.clone());
        }
    }

    fn runner(feed: MockFeed) -> MirrorRunner<MockFeed> {
        let sync = DepthSynchronizer::new(
            SharedBook::new("ETHUSDT"),
            Throttle::new(Duration::from_secs(10)),
            100,
        );
        MirrorRunner::new(
            SnapshotLoader::new(Arc::new(feed)),
            sync,
            RunnerSettings {
                symbol: "ETHUSDT".to_string(),
                report_depth: 10,
                snapshot_depth: 1000,
                retry: ReconnectConfig {
                    initial_delay_ms: 1,
                    max_delay_s: 1,
                    ..Default::default()
                },
            },
        )
    }

    #[tokio::test]
    async fn first_snapshot_failure_is_fatal() {
        let feed = MockFeed::new();
        feed.push_failure("down");
        let mut runner = runner(feed);

        let (tx, mut rx) = mpsc::channel(8);
        tx.send(FeedEvent::Connected).await.unwrap();

        let mut reporter = Collect::default();
        let result = runner.run(&mut rx, &mut reporter).await;

        assert!(matches!(result, Err(MirrorError::FeedUnavailable { .. })));
        assert!(reporter.0.is_empty());
    }

    #[tokio::test]
    async fn no_snapshot_before_connect() {
        let feed = MockFeed::new();
        let mut runner = runner(feed.clone());

        let (tx, mut rx) = mpsc::channel(8);
        tx.send(FeedEvent::Update(UpdateBatch::new(1, 1, vec![], vec![])))
            .await
            .unwrap();
        drop(tx);

        let mut reporter = Collect::default();
        runner.run(&mut rx, &mut reporter).await.unwrap();

        assert!(feed.requests().is_empty());
        assert!(reporter.0.is_empty());
    }

    #[tokio::test]
    async fn buffered_updates_are_replayed_and_reported() {
        let feed = MockFeed::new();
        feed.push_snapshot(SnapshotBuilder::new(5).ask(dec!(10), dec!(1)).ask(dec!(11), dec!(2)).build());
        let mut runner = runner(feed.clone());
        let book = runner.book();

        let (tx, mut rx) = mpsc::channel(8);
        tx.send(FeedEvent::Connected).await.unwrap();
        tx.send(FeedEvent::Update(UpdateBatch::new(
            6,
            6,
            vec![],
            vec![PriceLevel::new(dec!(10), dec!(0))],
        )))
        .await
        .unwrap();

        let handle = tokio::spawn(async move {
            let mut reporter = Collect::default();
            runner.run(&mut rx, &mut reporter).await.map(|_| reporter.0)
        });

        for _ in 0..200 {
            if book.last_update_id() == 6 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        drop(tx);

        let reported = handle.await.unwrap().unwrap();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].asks, vec![PriceLevel::new(dec!(11), dec!(2))]);
        assert_eq!(feed.requests(), vec![("ETHUSDT".to_string(), 1000)]);
    }
}
