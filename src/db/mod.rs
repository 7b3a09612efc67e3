//! Primary submission store (SQLite).
//!
//! The site's real content store is external; this adapter stands in for it
//! for form submissions. [`PrimaryStore`] wraps an optional [`Database`] so a
//! deployment without one reports "store not initialized" on every write.

mod submissions;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use submissions::{SubmissionCounts, SubmissionStore};

use crate::forms::{Admission, Contact};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        let options = if path == ":memory:" {
            // Each connection would get its own in-memory database, so keep
            // exactly one alive for the life of the pool.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = options.connect(&url).await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub fn submissions(&self) -> SubmissionStore {
        SubmissionStore::new(self.pool.clone())
    }

    /// Close the pool. Later queries fail, which the form handlers treat as an
    /// unavailable store.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                "CREATE TABLE admissions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    student_name TEXT NOT NULL,
                    parent_name TEXT,
                    email TEXT NOT NULL,
                    phone TEXT NOT NULL,
                    age INTEGER,
                    program TEXT NOT NULL,
                    experience TEXT,
                    message TEXT,
                    status TEXT NOT NULL DEFAULT 'pending',
                    source TEXT NOT NULL DEFAULT 'website',
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_admissions_status ON admissions(status)",
                "CREATE TABLE contacts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    name TEXT NOT NULL,
                    email TEXT NOT NULL,
                    phone TEXT,
                    subject TEXT,
                    message TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'pending',
                    source TEXT NOT NULL DEFAULT 'website',
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_contacts_status ON contacts(status)",
            ],
        )
        .await
    }
}

/// Failure writing to the primary store.
#[derive(Debug)]
pub enum StoreError {
    /// No database configured or it failed to open
    NotInitialized,
    /// Query failed
    Database(sqlx::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotInitialized => write!(f, "Store not initialized"),
            StoreError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e)
    }
}

/// Handle to the primary store, which may be absent.
#[derive(Clone, Default)]
pub struct PrimaryStore {
    db: Option<Database>,
}

impl PrimaryStore {
    pub fn new(db: Option<Database>) -> Self {
        Self { db }
    }

    fn db(&self) -> Result<&Database, StoreError> {
        self.db.as_ref().ok_or(StoreError::NotInitialized)
    }

    /// Insert an admission and return its ID.
    pub async fn insert_admission(&self, admission: &Admission) -> Result<String, StoreError> {
        Ok(self.db()?.submissions().insert_admission(admission).await?)
    }

    /// Insert a contact message and return its ID.
    pub async fn insert_contact(&self, contact: &Contact) -> Result<String, StoreError> {
        Ok(self.db()?.submissions().insert_contact(contact).await?)
    }

    pub async fn counts(&self) -> Result<SubmissionCounts, StoreError> {
        Ok(self.db()?.submissions().counts().await?)
    }
}
