use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use tracing::{debug, error};

use crate::models::query_log::{NewQueryLog, QueryLogEntry};
use crate::database::{get_db_pool, DatabaseError, DatabasePool};
use super::errors::RepositoryError;
use super::in_memory::InMemoryStorage;
use super::storage::DatabaseStorage;

/// Repository trait for the anonymized query history
#[async_trait]
pub trait QueryHistoryRepositoryTrait {
    /// Log a new query
    async fn record(&self, log: NewQueryLog) -> Result<QueryLogEntry, RepositoryError>;

    /// Get a logged query by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<QueryLogEntry>, RepositoryError>;

    /// Get the most recent queries, newest first
    async fn get_recent(&self, limit: usize) -> Result<Vec<QueryLogEntry>, RepositoryError> {
        let (entries, _) = self.get_filtered(None, limit, 0).await?;
        Ok(entries)
    }

    /// Get a newest-first page of queries and the total number of matches
    async fn get_filtered(
        &self,
        engine: Option<String>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<QueryLogEntry>, usize), RepositoryError>;

    /// Count queries per engine, sorted by engine name
    async fn count_by_engine(&self) -> Result<Vec<(String, usize)>, RepositoryError>;
}

/// Repository for query history.
/// Uses the configured SQLite pool and keeps an in-memory store as fallback.
#[derive(Debug, Clone, Default)]
pub struct QueryHistoryRepository {
    /// Explicit pool; the global pool is used when absent
    pool: Option<DatabasePool>,
    /// In-memory storage for when the database is not available
    storage: InMemoryStorage,
}

impl QueryHistoryRepository {
    /// Create a repository backed by the global pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository backed by a specific pool
    pub fn with_pool(pool: DatabasePool) -> Self {
        Self {
            pool: Some(pool),
            storage: InMemoryStorage::new(),
        }
    }

    fn pool(&self) -> Result<DatabasePool, DatabaseError> {
        match &self.pool {
            Some(pool) => Ok(pool.clone()),
            None => get_db_pool(),
        }
    }
}

fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
impl QueryHistoryRepositoryTrait for QueryHistoryRepository {
    async fn record(&self, log: NewQueryLog) -> Result<QueryLogEntry, RepositoryError> {
        let timestamp = now_utc();

        match self.pool() {
            Ok(pool) => {
                match DatabaseStorage::record(&pool, log.clone(), timestamp.clone()).await {
                    Ok(entry) => Ok(entry),
                    Err(e) => {
                        error!("Failed to store query log in database: {}", e);
                        self.storage.record(log, timestamp).await
                    }
                }
            },
            Err(e) => {
                debug!("Database not available ({}), using in-memory storage", e);
                self.storage.record(log, timestamp).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<QueryLogEntry>, RepositoryError> {
        match self.pool() {
            Ok(pool) => {
                match DatabaseStorage::get_by_id(&pool, id).await {
                    Ok(entry) => Ok(entry),
                    Err(e) => {
                        error!("Failed to get query log by ID from database: {}", e);
                        self.storage.get_by_id(id).await
                    }
                }
            },
            Err(e) => {
                debug!("Database not available ({}), using in-memory storage for get_by_id", e);
                self.storage.get_by_id(id).await
            }
        }
    }

    async fn get_filtered(
        &self,
        engine: Option<String>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<QueryLogEntry>, usize), RepositoryError> {
        match self.pool() {
            Ok(pool) => {
                match DatabaseStorage::get_filtered(&pool, engine.as_deref(), limit, offset).await {
                    Ok(result) => Ok(result),
                    Err(e) => {
                        error!("Failed to get filtered query history from database: {}", e);
                        self.storage.get_filtered(engine.as_deref(), limit, offset).await
                    }
                }
            },
            Err(e) => {
                debug!("Database not available ({}), using in-memory storage for get_filtered", e);
                self.storage.get_filtered(engine.as_deref(), limit, offset).await
            }
        }
    }

    async fn count_by_engine(&self) -> Result<Vec<(String, usize)>, RepositoryError> {
        match self.pool() {
            Ok(pool) => {
                match DatabaseStorage::count_by_engine(&pool).await {
                    Ok(counts) => Ok(counts),
                    Err(e) => {
                        error!("Failed to count query history in database: {}", e);
                        self.storage.count_by_engine().await
                    }
                }
            },
            Err(e) => {
                debug!("Database not available ({}), using in-memory storage for count_by_engine", e);
                self.storage.count_by_engine().await
            }
        }
    }
}

/// Mock query history repository for testing
#[cfg(any(test, feature = "mock"))]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mock implementation of QueryHistoryRepository for testing
    #[derive(Debug, Default)]
    pub struct MockQueryHistoryRepository {
        entries: Mutex<Vec<QueryLogEntry>>,
        should_fail: bool,
    }

    impl MockQueryHistoryRepository {
        /// Create a new empty mock repository
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a mock repository with predefined entries (oldest first)
        pub fn with_entries(entries: Vec<QueryLogEntry>) -> Self {
            Self { entries: Mutex::new(entries), should_fail: false }
        }

        /// Configure every operation to fail
        pub fn failing() -> Self {
            Self { entries: Mutex::new(Vec::new()), should_fail: true }
        }

        /// Snapshot of everything recorded so far
        pub fn recorded(&self) -> Vec<QueryLogEntry> {
            self.entries.lock().map(|e| e.clone()).unwrap_or_default()
        }

        fn check(&self) -> Result<(), RepositoryError> {
            if self.should_fail {
                Err(RepositoryError::Database(DatabaseError::GenericError(
                    "mock repository is configured to fail".to_string(),
                )))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl QueryHistoryRepositoryTrait for MockQueryHistoryRepository {
        async fn record(&self, log: NewQueryLog) -> Result<QueryLogEntry, RepositoryError> {
            self.check()?;
            let mut entries = self.entries.lock()?;
            let entry = log.into_entry(entries.len() as i64 + 1, now_utc());
            entries.push(entry.clone());
            Ok(entry)
        }

        async fn get_by_id(&self, id: i64) -> Result<Option<QueryLogEntry>, RepositoryError> {
            self.check()?;
            let entries = self.entries.lock()?;
            Ok(entries.iter().find(|e| e.id == id).cloned())
        }

        async fn get_filtered(
            &self,
            engine: Option<String>,
            limit: usize,
            offset: usize,
        ) -> Result<(Vec<QueryLogEntry>, usize), RepositoryError> {
            self.check()?;
            let entries = self.entries.lock()?;
            let matching: Vec<QueryLogEntry> = entries.iter()
                .rev()
                .filter(|e| engine.as_deref().map_or(true, |engine| e.engine == engine))
                .cloned()
                .collect();
            let total = matching.len();
            Ok((matching.into_iter().skip(offset).take(limit).collect(), total))
        }

        async fn count_by_engine(&self) -> Result<Vec<(String, usize)>, RepositoryError> {
            self.check()?;
            let entries = self.entries.lock()?;
            let mut counts = std::collections::BTreeMap::<String, usize>::new();
            for entry in entries.iter() {
                *counts.entry(entry.engine.clone()).or_default() += 1;
            }
            Ok(counts.into_iter().collect())
        }
    }
}
