// SymptomChecker Data
// This crate handles persistence of the anonymized query history

// Database connection management
pub mod database;

// Repository implementations for data access
pub mod repository;

// Data storage models
pub mod models;
