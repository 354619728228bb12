use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::schema::Database;
use super::types::{
    DatabaseError, Entry, EntrySummary, Feed, ImportReport, InsertOutcome, NewEntry, NewFeed,
};

/// Single point of access to the store.
///
/// Every read and write goes through one async mutex, so store access is
/// serialized program-wide: the poll loop's feed read, each spawned entry
/// write, imports and queries all take turns. The lock is held for exactly
/// one store operation and never across a network call.
#[derive(Clone)]
pub struct StoreGateway {
    db: Arc<Mutex<Database>>,
}

impl StoreGateway {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Open the database at `path` (migrating it) and wrap it.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        Ok(Self::new(Database::open(path).await?))
    }

    pub async fn list_feeds(&self) -> Result<Vec<Feed>> {
        let db = self.db.lock().await;
        db.list_feeds().await
    }

    /// Insert subscriptions in one transaction. See [`Database::import_feeds`].
    pub async fn import_feeds(&self, feeds: &[NewFeed]) -> Result<ImportReport> {
        let db = self.db.lock().await;
        db.import_feeds(feeds).await
    }

    pub async fn insert_feed(&self, feed: &NewFeed) -> Result<i64> {
        let db = self.db.lock().await;
        db.insert_feed(feed).await
    }

    pub async fn insert_entry(&self, entry: &NewEntry) -> Result<InsertOutcome> {
        let db = self.db.lock().await;
        db.insert_entry(entry).await
    }

    pub async fn recent_entries(&self, limit: u32) -> Result<Vec<EntrySummary>> {
        let db = self.db.lock().await;
        db.recent_entries(limit).await
    }

    pub async fn entry_by_id(&self, id: &str) -> Result<Option<Entry>> {
        let db = self.db.lock().await;
        db.entry_by_id(id).await
    }

    pub async fn count_entries(&self) -> Result<i64> {
        let db = self.db.lock().await;
        db.count_entries().await
    }
}
