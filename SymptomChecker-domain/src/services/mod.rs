pub mod emergency;
pub mod rules;
pub mod llm;
pub mod parsing;
pub mod symptom_checker;

// Domain services
// This module contains business logic implementations.

// Re-export service traits and factory functions
pub use llm::{create_llm_client, LlmClient, LlmConfig};
pub use symptom_checker::{create_default_symptom_checker_service, SymptomCheckerError, SymptomCheckerServiceTrait};

// Re-export mock service factory functions when the mock feature is enabled
#[cfg(feature = "mock")]
pub use symptom_checker::create_mock_symptom_checker_service;
