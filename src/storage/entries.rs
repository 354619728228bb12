use anyhow::Result;

use super::schema::Database;
use super::types::{Entry, EntrySummary, InsertOutcome, NewEntry};

impl Database {
    // ========================================================================
    // Entry Operations
    // ========================================================================

    /// Insert an entry, ignoring it if the id already exists.
    ///
    /// A duplicate leaves the stored row untouched.
    pub async fn insert_entry(&self, entry: &NewEntry) -> Result<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO entries (id, url, site, title, content, created)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
        "#,
        )
        .bind(&entry.id)
        .bind(&entry.url)
        .bind(&entry.site)
        .bind(&entry.title)
        .bind(&entry.content)
        .bind(&entry.created)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    /// The `limit` most recent entries, newest first, without content.
    ///
    /// Canonical timestamps sort lexically; ties fall back to id so the
    /// order is stable.
    pub async fn recent_entries(&self, limit: u32) -> Result<Vec<EntrySummary>> {
        let entries = sqlx::query_as::<_, EntrySummary>(
            r#"
            SELECT id, url, site, title, created
            FROM entries
            ORDER BY created DESC, id
            LIMIT ?
        "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// Look up one entry, content included
    pub async fn entry_by_id(&self, id: &str) -> Result<Option<Entry>> {
        let entry = sqlx::query_as::<_, Entry>(
            "SELECT id, url, site, title, content, created FROM entries WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    pub async fn count_entries(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
