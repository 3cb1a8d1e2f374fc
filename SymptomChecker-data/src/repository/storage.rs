use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use crate::models::query_log::{NewQueryLog, QueryLogEntry};
use crate::database::DatabasePool;
use super::errors::RepositoryError;

const SELECT_COLUMNS: &str =
    "SELECT id, symptom_hash, timestamp_utc, engine, top_condition, top_score, notes FROM queries";

/// Database storage operations for query history
pub struct DatabaseStorage;

impl DatabaseStorage {
    /// Insert a query log and return the stored row
    pub async fn record(
        pool: &DatabasePool,
        log: NewQueryLog,
        timestamp_utc: String,
    ) -> Result<QueryLogEntry, RepositoryError> {
        debug!("Storing query log in database: engine={}", log.engine);

        let conn = pool.get()?;
        conn.execute(
            "INSERT INTO queries (symptom_hash, timestamp_utc, engine, top_condition, top_score, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &log.symptom_hash,
                &timestamp_utc,
                &log.engine,
                &log.top_condition,
                log.top_score,
                &log.notes,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Ok(log.into_entry(id, timestamp_utc))
    }

    /// Get a single row by ID
    pub async fn get_by_id(pool: &DatabasePool, id: i64) -> Result<Option<QueryLogEntry>, RepositoryError> {
        let conn = pool.get()?;
        let entry = conn
            .query_row(&format!("{} WHERE id = ?1", SELECT_COLUMNS), [id], map_row)
            .optional()?;
        Ok(entry)
    }

    /// Get a newest-first page, optionally restricted to one engine
    pub async fn get_filtered(
        pool: &DatabasePool,
        engine: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<QueryLogEntry>, usize), RepositoryError> {
        debug!("Getting filtered query history from database");

        let conn = pool.get()?;

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM queries WHERE (?1 IS NULL OR engine = ?1)",
            [engine],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "{} WHERE (?1 IS NULL OR engine = ?1) ORDER BY id DESC LIMIT ?2 OFFSET ?3",
            SELECT_COLUMNS
        ))?;

        let rows = stmt.query_map(
            params![engine, clamp_to_i64(limit), clamp_to_i64(offset)],
            map_row,
        )?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }

        Ok((result, total as usize))
    }

    /// Count rows per engine, sorted by engine name
    pub async fn count_by_engine(pool: &DatabasePool) -> Result<Vec<(String, usize)>, RepositoryError> {
        let conn = pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT engine, COUNT(*) FROM queries GROUP BY engine ORDER BY engine",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<QueryLogEntry> {
    Ok(QueryLogEntry {
        id: row.get(0)?,
        symptom_hash: row.get(1)?,
        timestamp_utc: row.get(2)?,
        engine: row.get(3)?,
        top_condition: row.get(4)?,
        top_score: row.get(5)?,
        notes: row.get(6)?,
    })
}

// SQLite integers are signed; usize::MAX means "no limit"
fn clamp_to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
