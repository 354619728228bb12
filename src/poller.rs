//! The poll loop.
//!
//! One sequential loop walks the subscription list, fetching each feed in
//! turn. Every accepted item becomes its own write task; the tasks of a cycle
//! live in a `JoinSet`, bounded by a semaphore, and are drained before the
//! loop goes idle. Nothing that goes wrong with a feed, an item or a write
//! stops the loop; only a shutdown request does.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinError, JoinSet};

use crate::feed::{normalize_item, FeedFetcher, ParsedFeed};
use crate::storage::{Feed, InsertOutcome, NewEntry, StoreGateway};

/// Timing and bounds of the poll loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// Idle wait between cycles
    pub poll_interval: Duration,
    /// Politeness delay before each feed fetch
    pub fetch_delay: Duration,
    /// Entry writes allowed in flight at once
    pub max_pending_writes: usize,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(180),
            fetch_delay: Duration::from_secs(1),
            max_pending_writes: 64,
        }
    }
}

/// Counters for one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub feeds: usize,
    pub failed_feeds: usize,
    pub items: usize,
    /// Items dropped by the normalizer (no usable link)
    pub skipped: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub write_errors: usize,
    /// The cycle stopped early on a shutdown request
    pub interrupted: bool,
}

impl CycleReport {
    fn record_write(&mut self, result: Result<anyhow::Result<InsertOutcome>, JoinError>) {
        match result {
            Ok(Ok(InsertOutcome::Inserted)) => self.inserted += 1,
            Ok(Ok(InsertOutcome::Duplicate)) => self.duplicates += 1,
            Ok(Err(_)) => self.write_errors += 1,
            Err(e) => {
                tracing::warn!(error = %e, "Entry write task failed");
                self.write_errors += 1;
            }
        }
    }
}

pub struct Poller {
    gateway: StoreGateway,
    fetcher: FeedFetcher,
    settings: PollSettings,
    write_permits: Arc<Semaphore>,
}

impl Poller {
    pub fn new(gateway: StoreGateway, fetcher: FeedFetcher, settings: PollSettings) -> Self {
        let write_permits = Arc::new(Semaphore::new(settings.max_pending_writes.max(1)));
        Self {
            gateway,
            fetcher,
            settings,
            write_permits,
        }
    }

    /// Runs cycles until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// Shutdown is observed between feeds and during the idle wait. Writes
    /// already spawned are always drained first.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            poll_interval_secs = self.settings.poll_interval.as_secs(),
            fetch_delay_ms = self.settings.fetch_delay.as_millis() as u64,
            "Poller started"
        );

        loop {
            let report = self.run_cycle(&mut shutdown).await;
            if report.interrupted || *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }
        }

        tracing::info!("Poller stopped");
    }

    /// Runs one pass over the subscription list.
    pub async fn run_cycle(&self, shutdown: &mut watch::Receiver<bool>) -> CycleReport {
        let mut report = CycleReport::default();

        // Gateway lock is held for this read only
        let feeds = match self.gateway.list_feeds().await {
            Ok(feeds) => feeds,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read subscriptions, skipping cycle");
                Vec::new()
            }
        };

        let mut writes: JoinSet<anyhow::Result<InsertOutcome>> = JoinSet::new();

        for feed in &feeds {
            if *shutdown.borrow() {
                report.interrupted = true;
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.fetch_delay) => {}
                _ = shutdown.changed() => {
                    report.interrupted = true;
                    break;
                }
            }

            report.feeds += 1;
            let parsed = match self.fetcher.fetch(&feed.url).await {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!(feed = %feed.url, error = %e, "Feed fetch failed");
                    report.failed_feeds += 1;
                    continue;
                }
            };

            self.spawn_writes(feed, parsed, &mut writes, &mut report).await;

            while let Some(result) = writes.try_join_next() {
                report.record_write(result);
            }
        }

        while let Some(result) = writes.join_next().await {
            report.record_write(result);
        }

        tracing::info!(
            feeds = report.feeds,
            failed = report.failed_feeds,
            items = report.items,
            inserted = report.inserted,
            duplicates = report.duplicates,
            skipped = report.skipped,
            write_errors = report.write_errors,
            "Poll cycle complete"
        );
        report
    }

    async fn spawn_writes(
        &self,
        feed: &Feed,
        parsed: ParsedFeed,
        writes: &mut JoinSet<anyhow::Result<InsertOutcome>>,
        report: &mut CycleReport,
    ) {
        let now = chrono::Utc::now();

        for item in &parsed.items {
            report.items += 1;
            let entry = match normalize_item(&parsed.channel, item, now) {
                Ok(entry) => entry,
                Err(reason) => {
                    tracing::debug!(
                        feed = %feed.url,
                        guid = %item.guid,
                        reason = %reason,
                        "Item skipped"
                    );
                    report.skipped += 1;
                    continue;
                }
            };

            // The semaphore is never closed, so acquisition only waits.
            let Ok(permit) = Arc::clone(&self.write_permits).acquire_owned().await else {
                break;
            };
            let gateway = self.gateway.clone();
            writes.spawn(async move {
                let result = write_entry(&gateway, &entry).await;
                drop(permit);
                result
            });
        }
    }
}

async fn write_entry(gateway: &StoreGateway, entry: &NewEntry) -> anyhow::Result<InsertOutcome> {
    match gateway.insert_entry(entry).await {
        Ok(InsertOutcome::Duplicate) => {
            tracing::debug!(entry = %entry.id, url = %entry.url, "Entry already stored");
            Ok(InsertOutcome::Duplicate)
        }
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            tracing::warn!(
                entry = %entry.id,
                url = %entry.url,
                error = %e,
                "Failed to store entry"
            );
            Err(e)
        }
    }
}
