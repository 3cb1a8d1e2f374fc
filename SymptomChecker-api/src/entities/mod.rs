// Public entities for the symptom checker API
// This module contains data structures that are shared across the application boundary

// Symptom check request and response
pub mod symptom;

// Query history and statistics
pub mod history;

// Common entities for error handling, pagination, etc.
pub mod common;
