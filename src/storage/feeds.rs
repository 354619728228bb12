use anyhow::Result;

use super::schema::Database;
use super::types::{Feed, ImportReport, NewFeed};
use crate::feed::dates::format_canonical;

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Insert a batch of subscriptions in a single transaction.
    ///
    /// Rows are inserted in slice order and the transaction commits once at
    /// the end. A row the store rejects (typically a URL that is already
    /// subscribed) is logged and skipped; the rest of the batch continues.
    pub async fn import_feeds(&self, feeds: &[NewFeed]) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        if feeds.is_empty() {
            return Ok(report);
        }

        let created = format_canonical(chrono::Utc::now());
        let mut tx = self.pool.begin().await?;

        for feed in feeds {
            // SAVEPOINT keeps the transaction usable after a rejected row
            sqlx::query("SAVEPOINT feed_row").execute(&mut *tx).await?;

            let result = sqlx::query(
                "INSERT INTO feeds (title, url, site_url, created) VALUES (?, ?, ?, ?)",
            )
            .bind(&feed.title)
            .bind(&feed.xml_url)
            .bind(&feed.html_url)
            .bind(&created)
            .execute(&mut *tx)
            .await;

            match result {
                Ok(_) => {
                    sqlx::query("RELEASE feed_row").execute(&mut *tx).await?;
                    report.inserted += 1;
                }
                Err(e) => {
                    sqlx::query("ROLLBACK TO feed_row").execute(&mut *tx).await?;
                    sqlx::query("RELEASE feed_row").execute(&mut *tx).await?;
                    tracing::warn!(url = %feed.xml_url, error = %e, "Skipping subscription");
                    report.skipped += 1;
                }
            }
        }

        tx.commit().await?;
        Ok(report)
    }

    /// Insert a single subscription, returning its id
    pub async fn insert_feed(&self, feed: &NewFeed) -> Result<i64> {
        let created = format_canonical(chrono::Utc::now());
        let result = sqlx::query(
            "INSERT INTO feeds (title, url, site_url, created) VALUES (?, ?, ?, ?)",
        )
        .bind(&feed.title)
        .bind(&feed.xml_url)
        .bind(&feed.html_url)
        .bind(&created)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// All subscriptions, in insertion order
    pub async fn list_feeds(&self) -> Result<Vec<Feed>> {
        let feeds = sqlx::query_as::<_, Feed>(
            "SELECT id, title, url, site_url, created FROM feeds ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }
}
