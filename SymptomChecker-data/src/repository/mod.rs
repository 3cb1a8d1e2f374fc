// Repository module structure
pub mod errors;
mod query_history;
mod in_memory;
mod storage;

// Re-export commonly used types
pub use errors::RepositoryError;
pub use query_history::{QueryHistoryRepository, QueryHistoryRepositoryTrait};

// Re-export test modules for both testing and when mock feature is enabled
#[cfg(any(test, feature = "mock"))]
pub use query_history::tests;
