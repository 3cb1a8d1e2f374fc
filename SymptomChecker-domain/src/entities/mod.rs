// Domain entities and value objects
pub mod symptom;
pub mod history;
pub mod conversions;

// Re-export common types for easier imports
pub use symptom::{Condition, Confidence, Engine, SymptomResponse, DISCLAIMER, UNCLEAR_CONDITION};
pub use history::{EngineCount, HistoryStats, QueryRecord};
