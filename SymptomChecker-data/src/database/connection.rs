//! Database connection module for the symptom checker
//!
//! The query history lives in SQLite. A file-backed pool is preferred; when
//! the file cannot be created or opened the pool falls back to an in-memory
//! database so the service keeps answering.

use std::env;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use thiserror::Error;
use tracing::{error, info, warn};

use super::migrations::run_sqlite_migrations;

/// Global database pool used throughout the application
static DB_POOL: OnceCell<DatabasePool> = OnceCell::new();

/// Default location of the history database
pub const DEFAULT_SQLITE_PATH: &str = "data/history.db";

/// Supported database types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    /// SQLite database (file-based)
    Sqlite,
}

impl DatabaseType {
    /// Convert from string to database type
    pub fn parse(s: &str) -> Result<Self, DatabaseError> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(DatabaseType::Sqlite),
            _ => Err(DatabaseError::UnsupportedDatabaseType(s.to_string())),
        }
    }
}

/// Database error
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// SQLite connection pool error
    #[error("SQLite connection pool error: {0}")]
    SqlitePoolError(#[from] r2d2::Error),

    /// Database pool already initialized
    #[error("Database pool is already initialized")]
    PoolAlreadyInitialized,

    /// Database pool not initialized
    #[error("Database pool is not initialized")]
    PoolNotInitialized,

    /// Unsupported database type
    #[error("Unsupported database type: {0}")]
    UnsupportedDatabaseType(String),

    /// Migration error
    #[error("Database migration error: {0}")]
    MigrationError(String),

    /// Generic database error
    #[error("Database error: {0}")]
    GenericError(String),
}

impl From<String> for DatabaseError {
    fn from(error: String) -> Self {
        DatabaseError::GenericError(error)
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database type
    pub db_type: DatabaseType,
    /// Path to SQLite database file
    pub sqlite_path: Option<String>,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: DatabaseType::Sqlite,
            sqlite_path: Some(DEFAULT_SQLITE_PATH.to_string()),
            max_connections: 10,
            timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    /// Create a new database configuration from environment variables
    pub fn from_env() -> Result<Self, DatabaseError> {
        let db_type_str = env::var("DB_TYPE").unwrap_or_else(|_| "sqlite".to_string());
        let db_type = DatabaseType::parse(&db_type_str)?;

        let sqlite_path = env::var("DB_SQLITE_PATH").ok();
        match sqlite_path {
            Some(ref path) => info!("Using SQLite database at: {}", path),
            None => info!("No DB_SQLITE_PATH provided, will use default path: {}", DEFAULT_SQLITE_PATH),
        }

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(10);

        let timeout_seconds = env::var("DB_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        info!("Database configuration: max_connections={}, timeout={}s",
            max_connections, timeout_seconds);

        Ok(DatabaseConfig {
            db_type,
            sqlite_path,
            max_connections,
            timeout_seconds,
        })
    }
}

/// SQLite connection pool shared across handlers
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: Arc<r2d2::Pool<SqliteConnectionManager>>,
    in_memory: bool,
}

impl DatabasePool {
    /// Open a file-backed pool, falling back to memory if the file is unusable
    pub fn open(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let sqlite_path = config.sqlite_path.clone()
            .unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string());

        info!("Initializing SQLite database at: {}", sqlite_path);

        if let Some(parent) = Path::new(&sqlite_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                info!("Creating parent directory: {:?}", parent);
                if let Err(e) = fs::create_dir_all(parent) {
                    warn!("Failed to create directory: {}, falling back to in-memory database", e);
                    return Self::in_memory(config.timeout_seconds);
                }
            }
        }

        let manager = SqliteConnectionManager::file(&sqlite_path)
            .with_flags(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE);

        let pool = match r2d2::Pool::builder()
            .max_size(config.max_connections)
            .connection_timeout(Duration::from_secs(config.timeout_seconds))
            .build(manager)
        {
            Ok(pool) => pool,
            Err(e) => {
                error!("Failed to create SQLite connection pool: {}", e);
                warn!("Falling back to in-memory SQLite database");
                return Self::in_memory(config.timeout_seconds);
            }
        };

        let database = Self { pool: Arc::new(pool), in_memory: false };
        match database.migrate() {
            Ok(()) => {
                info!("SQLite connection pool created successfully");
                Ok(database)
            },
            Err(e) => {
                error!("Failed to prepare SQLite database: {}", e);
                warn!("Falling back to in-memory SQLite database");
                Self::in_memory(config.timeout_seconds)
            }
        }
    }

    /// Open an in-memory pool.
    ///
    /// Each SQLite in-memory connection is its own database, so the pool is
    /// capped at a single connection to keep every caller on the same data.
    pub fn in_memory(timeout_seconds: u64) -> Result<Self, DatabaseError> {
        info!("Initializing in-memory SQLite database");

        let manager = SqliteConnectionManager::memory();
        let pool = r2d2::Pool::builder()
            .max_size(1)
            .connection_timeout(Duration::from_secs(timeout_seconds))
            .build(manager)?;

        let database = Self { pool: Arc::new(pool), in_memory: true };
        database.migrate()?;

        info!("In-memory SQLite database initialized successfully");
        Ok(database)
    }

    /// Check out a connection
    pub fn get(&self) -> Result<PooledConnection<SqliteConnectionManager>, DatabaseError> {
        Ok(self.pool.get()?)
    }

    /// Whether this pool is backed by memory rather than a file
    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    /// Run a trivial query to confirm the database answers
    pub fn ping(&self) -> Result<(), DatabaseError> {
        let conn = self.get()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    /// Human-readable description of the pool
    pub fn describe(&self) -> String {
        let location = if self.in_memory {
            "SQLite in-memory database".to_string()
        } else {
            match self.get().and_then(|conn| {
                conn.query_row("PRAGMA database_list", [], |row| row.get::<_, String>(2))
                    .map_err(DatabaseError::from)
            }) {
                Ok(path) if !path.is_empty() => format!("SQLite database at {}", path),
                _ => "SQLite database (path unknown)".to_string(),
            }
        };

        let state = self.pool.state();
        format!("{} (connections: active={}, idle={})",
            location,
            state.connections,
            state.idle_connections
        )
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        let conn = self.get()?;
        run_sqlite_migrations(&conn).map_err(DatabaseError::MigrationError)
    }
}

/// Initialize the global database connection pool from the environment
pub fn initialize_database_pool() -> Result<(), DatabaseError> {
    if DB_POOL.get().is_some() {
        return Err(DatabaseError::PoolAlreadyInitialized);
    }

    let config = DatabaseConfig::from_env()?;
    info!("Initializing database pool with type: {:?}", config.db_type);

    let pool = DatabasePool::open(&config)?;
    DB_POOL.set(pool).map_err(|_| DatabaseError::PoolAlreadyInitialized)
}

/// Get the global database connection pool
pub fn get_db_pool() -> Result<DatabasePool, DatabaseError> {
    DB_POOL.get()
        .cloned()
        .ok_or(DatabaseError::PoolNotInitialized)
}

/// Get information about the global database connection
pub fn get_connection_info() -> Option<String> {
    DB_POOL.get().map(DatabasePool::describe)
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.db_type, DatabaseType::Sqlite);
        assert_eq!(config.sqlite_path.as_deref(), Some(DEFAULT_SQLITE_PATH));
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.timeout_seconds, 30);
    }

    #[test]
    fn test_database_type_parse() {
        assert_eq!(DatabaseType::parse("sqlite").unwrap(), DatabaseType::Sqlite);
        assert_eq!(DatabaseType::parse("SQLite").unwrap(), DatabaseType::Sqlite);
        assert!(DatabaseType::parse("postgres").is_err());
    }

    #[test]
    fn test_in_memory_pool_is_migrated() {
        let pool = DatabasePool::in_memory(5).unwrap();
        assert!(pool.is_in_memory());
        pool.ping().unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM queries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
        assert!(pool.describe().contains("in-memory"));
    }

    #[test]
    fn test_file_pool_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.db");
        let config = DatabaseConfig {
            sqlite_path: Some(path.to_string_lossy().to_string()),
            ..DatabaseConfig::default()
        };

        let pool = DatabasePool::open(&config).unwrap();
        assert!(!pool.is_in_memory());
        assert!(path.exists());
        assert!(pool.describe().contains("history.db"));
    }

    #[test]
    fn test_falls_back_to_memory_when_directory_cannot_be_created() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let config = DatabaseConfig {
            sqlite_path: Some(blocker.join("sub").join("history.db").to_string_lossy().to_string()),
            timeout_seconds: 1,
            ..DatabaseConfig::default()
        };

        let pool = DatabasePool::open(&config).unwrap();
        assert!(pool.is_in_memory());
        pool.ping().unwrap();
    }

    #[test]
    fn test_falls_back_to_memory_when_file_cannot_be_opened() {
        let dir = tempfile::tempdir().unwrap();
        let occupied = dir.path().join("history.db");
        std::fs::create_dir(&occupied).unwrap();

        let config = DatabaseConfig {
            sqlite_path: Some(occupied.to_string_lossy().to_string()),
            max_connections: 1,
            timeout_seconds: 1,
            ..DatabaseConfig::default()
        };

        let pool = DatabasePool::open(&config).unwrap();
        assert!(pool.is_in_memory());
        assert!(pool.describe().contains("in-memory"));
    }
}
