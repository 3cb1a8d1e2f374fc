use rusqlite::Connection;
use tracing::info;

/// Run SQLite migrations
pub fn run_migrations(conn: &Connection) -> Result<(), String> {
    info!("Running SQLite migrations");

    create_queries_table(conn)?;
    create_queries_indexes(conn)?;

    info!("SQLite migrations completed successfully");
    Ok(())
}

/// Create the anonymized query history table
fn create_queries_table(conn: &Connection) -> Result<(), String> {
    info!("Creating queries table if not exists");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS queries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            symptom_hash TEXT NOT NULL,
            timestamp_utc TEXT NOT NULL,
            engine TEXT NOT NULL,
            top_condition TEXT NOT NULL,
            top_score REAL NOT NULL,
            notes TEXT
        )",
        [],
    ).map_err(|e| e.to_string())?;

    Ok(())
}

/// Create indexes for time ordering and engine filtering
fn create_queries_indexes(conn: &Connection) -> Result<(), String> {
    info!("Creating indexes on queries");

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_queries_timestamp ON queries (timestamp_utc DESC);
         CREATE INDEX IF NOT EXISTS idx_queries_engine ON queries (engine);",
    ).map_err(|e| format!("Failed to create index: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'queries'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
