pub mod health;
pub mod history;
pub mod symptom_check;

// Tests module
#[cfg(test)]
mod tests;

// Re-export handlers for easier imports
pub use history::{get_history, get_history_record, get_history_stats};
pub use symptom_check::{check_symptoms, index};
pub use health::health_check;
