use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use symptom_checker_domain::entities::history::{HistoryStats, QueryRecord};

/// Query parameters for retrieving query history
#[derive(Debug, Deserialize, Clone, Default, IntoParams, ToSchema)]
pub struct HistoryQueryParams {
    /// Maximum number of results (default: 10, max: 100)
    pub limit: Option<usize>,

    /// Pagination offset (default: 0)
    pub offset: Option<usize>,

    /// Only return queries answered by this engine
    /// (emergency, rule_based, llm, fallback or no_llm)
    pub engine: Option<String>,
}

/// One anonymized history entry
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryRecord {
    pub id: i64,

    /// Hex digest of the normalized symptom text
    pub symptom_hash: String,

    /// When the query was answered
    pub timestamp: DateTime<Utc>,

    /// Engine that produced the answer
    pub engine: String,

    pub top_condition: String,
    pub top_score: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Number of queries answered by one engine
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EngineCountEntry {
    pub engine: String,
    pub count: usize,
}

/// Aggregate history statistics
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryStatsResponse {
    /// Total number of logged queries
    pub total: usize,

    /// Per-engine counts; engines with no queries are omitted
    pub by_engine: Vec<EngineCountEntry>,
}

impl From<QueryRecord> for HistoryRecord {
    fn from(record: QueryRecord) -> Self {
        Self {
            id: record.id,
            symptom_hash: record.symptom_hash,
            timestamp: record.timestamp,
            engine: record.engine.to_string(),
            top_condition: record.top_condition,
            top_score: record.top_score,
            notes: record.notes,
        }
    }
}

impl From<HistoryStats> for HistoryStatsResponse {
    fn from(stats: HistoryStats) -> Self {
        Self {
            total: stats.total,
            by_engine: stats
                .by_engine
                .into_iter()
                .map(|c| EngineCountEntry { engine: c.engine.to_string(), count: c.count })
                .collect(),
        }
    }
}
