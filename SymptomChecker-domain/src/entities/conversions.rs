use chrono::{DateTime, NaiveDateTime, Utc};
use sha2::{Digest, Sha256};
use symptom_checker_data::models::query_log::{NewQueryLog, QueryLogEntry};

use crate::entities::history::{EngineCount, QueryRecord};
use crate::entities::symptom::{Engine, SymptomResponse, UNCLEAR_CONDITION};

// Conversion functions between domain entities and data models.
// These follow the pattern convert_to_[target_layer]_[model_name].

/// Anonymize symptom text: hex SHA-256 digest of the trimmed, lowercased input
pub fn hash_symptoms(symptoms: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(symptoms.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

/// Build the history row for an answered query
pub fn convert_to_data_query_log(
    symptoms: &str,
    engine: Engine,
    response: &SymptomResponse,
    notes: Option<String>,
) -> NewQueryLog {
    let (top_condition, top_score) = response
        .top_condition()
        .map(|c| (c.condition.clone(), c.relative_score))
        .unwrap_or_else(|| (UNCLEAR_CONDITION.to_string(), 0.0));

    NewQueryLog {
        symptom_hash: hash_symptoms(symptoms),
        engine: engine.as_str().to_string(),
        top_condition,
        top_score,
        notes,
    }
}

/// Format SQLite's `datetime('now')` writes: UTC without an offset
const SQLITE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a stored timestamp, either RFC 3339 or SQLite's naive UTC form
fn parse_stored_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(rfc_err) => NaiveDateTime::parse_from_str(value, SQLITE_DATETIME_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|_| rfc_err),
    }
}

/// Convert a stored history row to the domain view
pub fn convert_to_domain_query_record(entry: QueryLogEntry) -> Result<QueryRecord, String> {
    let engine = Engine::parse(&entry.engine)
        .ok_or_else(|| format!("Unknown engine in history row {}: {}", entry.id, entry.engine))?;

    let timestamp = parse_stored_timestamp(&entry.timestamp_utc)
        .map_err(|e| format!("Invalid timestamp in history row {}: {}", entry.id, e))?;

    Ok(QueryRecord {
        id: entry.id,
        symptom_hash: entry.symptom_hash,
        timestamp,
        engine,
        top_condition: entry.top_condition,
        top_score: entry.top_score,
        notes: entry.notes,
    })
}

/// Convert stored per-engine counts, skipping engines this build does not know
pub fn convert_to_domain_engine_counts(counts: Vec<(String, usize)>) -> Vec<EngineCount> {
    let mut result: Vec<EngineCount> = counts
        .into_iter()
        .filter_map(|(name, count)| Engine::parse(&name).map(|engine| EngineCount { engine, count }))
        .collect();
    result.sort_by_key(|c| Engine::ALL.iter().position(|e| *e == c.engine));
    result
}
