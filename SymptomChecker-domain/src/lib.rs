// Symptom Checker Domain
// This crate contains the business logic for the symptom checker

// Services that implement business logic
pub mod services;

// Domain entities
pub mod entities;

// Health checks and system status
pub mod health;

// Re-export the database module from the data crate for convenience
pub use symptom_checker_data::database;

// Testing utilities - only available with mock feature
#[cfg(feature = "mock")]
pub mod testing;
