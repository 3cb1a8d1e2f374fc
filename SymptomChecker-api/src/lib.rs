// Symptom Checker API lib.rs
//
// Main library file for the symptom checker HTTP API.
// It re-exports the APIs from the various modules.

// Public modules
pub mod api;
pub mod entities;
pub mod openapi;
