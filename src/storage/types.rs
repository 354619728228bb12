use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("The database is locked by another process. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

// SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Input Types
// ============================================================================

/// A subscription to insert, as produced by the OPML importer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeed {
    pub title: String,
    pub xml_url: String,
    pub html_url: Option<String>,
}

/// A normalized entry ready to be written.
///
/// `id` is the identity hash and doubles as the dedup key; `created` is
/// already in canonical `YYYY-MM-DD HH:MM:SS` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub id: String,
    pub url: String,
    pub site: String,
    pub title: String,
    pub content: String,
    pub created: String,
}

// ============================================================================
// Result Types
// ============================================================================

/// Outcome of an entry insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// An entry with the same id already exists; the stored row is unchanged
    Duplicate,
}

/// Summary of one subscription import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    /// Rows rejected by the store (e.g. already subscribed) and skipped
    pub skipped: usize,
}

// ============================================================================
// Data Structures
// ============================================================================

/// Subscription row
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Feed {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub site_url: Option<String>,
    pub created: String,
}

/// Entry row with content, as returned by a lookup by id
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Entry {
    pub id: String,
    pub url: String,
    pub site: String,
    pub title: String,
    pub content: String,
    pub created: String,
}

/// Entry row without content, as returned by listings
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct EntrySummary {
    pub id: String,
    pub url: String,
    pub site: String,
    pub title: String,
    pub created: String,
}
