use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::models::query_log::{NewQueryLog, QueryLogEntry};
use super::errors::RepositoryError;

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    entries: Vec<QueryLogEntry>,
}

/// In-memory storage for query history when the database is unavailable
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStorage {
    /// Create a new in-memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an entry in memory
    pub async fn record(&self, log: NewQueryLog, timestamp_utc: String) -> Result<QueryLogEntry, RepositoryError> {
        let mut inner = self.inner.lock()?;
        inner.next_id += 1;
        let entry = log.into_entry(inner.next_id, timestamp_utc);
        inner.entries.push(entry.clone());
        Ok(entry)
    }

    /// Get an entry by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<QueryLogEntry>, RepositoryError> {
        let inner = self.inner.lock()?;
        Ok(inner.entries.iter().find(|e| e.id == id).cloned())
    }

    /// Get a newest-first page, optionally restricted to one engine
    pub async fn get_filtered(
        &self,
        engine: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<QueryLogEntry>, usize), RepositoryError> {
        let inner = self.inner.lock()?;

        let matching: Vec<&QueryLogEntry> = inner.entries.iter()
            .rev()
            .filter(|e| engine.map_or(true, |engine| e.engine == engine))
            .collect();

        let total = matching.len();
        let page = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();

        Ok((page, total))
    }

    /// Count entries per engine, sorted by engine name
    pub async fn count_by_engine(&self) -> Result<Vec<(String, usize)>, RepositoryError> {
        let inner = self.inner.lock()?;
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for entry in &inner.entries {
            *counts.entry(entry.engine.clone()).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}
