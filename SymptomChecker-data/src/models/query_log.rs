use serde::{Deserialize, Serialize};

/// Storage model for one anonymized symptom query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryLogEntry {
    /// Row identifier, increasing with insertion order
    pub id: i64,

    /// Hex digest of the normalized symptom text
    pub symptom_hash: String,

    /// When the query was logged (RFC 3339, UTC)
    pub timestamp_utc: String,

    /// Engine that produced the answer
    pub engine: String,

    /// Highest ranked condition in the answer
    pub top_condition: String,

    /// Relative score of the top condition
    pub top_score: f64,

    /// Optional diagnostic notes
    pub notes: Option<String>,
}

/// Input data for logging a new query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQueryLog {
    pub symptom_hash: String,
    pub engine: String,
    pub top_condition: String,
    pub top_score: f64,
    pub notes: Option<String>,
}

impl NewQueryLog {
    /// Attach an id and timestamp, producing the stored form
    pub fn into_entry(self, id: i64, timestamp_utc: String) -> QueryLogEntry {
        QueryLogEntry {
            id,
            symptom_hash: self.symptom_hash,
            timestamp_utc,
            engine: self.engine,
            top_condition: self.top_condition,
            top_score: self.top_score,
            notes: self.notes,
        }
    }
}
