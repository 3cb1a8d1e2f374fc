use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::symptom::Engine;

/// One anonymized entry of the query history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: i64,
    /// Hex digest of the normalized symptom text
    pub symptom_hash: String,
    pub timestamp: DateTime<Utc>,
    pub engine: Engine,
    pub top_condition: String,
    pub top_score: f64,
    pub notes: Option<String>,
}

/// Number of queries answered by one engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCount {
    pub engine: Engine,
    pub count: usize,
}

/// Aggregate view of the query history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Total number of logged queries
    pub total: usize,
    /// Per-engine counts, in engine order
    pub by_engine: Vec<EngineCount>,
}
