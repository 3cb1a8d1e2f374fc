//! Domain layer health check functionality
//! This module provides health check services for the application

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use symptom_checker_data::database;

use crate::services::llm::LlmClient;

/// System health status
#[derive(Debug, Clone, PartialEq)]
pub enum SystemStatus {
    /// All components are healthy
    Healthy,
    /// Some components are degraded but the system is functional
    Degraded,
    /// System is not functioning properly
    Unhealthy,
}

/// Component health status
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentStatus {
    /// Component is functioning normally
    Healthy,
    /// Component works with reduced capability
    Degraded,
    /// Component is not functioning
    Unhealthy,
}

/// Represents a health component with status and optional details
#[derive(Debug, Clone)]
pub struct HealthComponent {
    /// Status of the component
    pub status: ComponentStatus,
    /// Optional details about the component status
    pub details: Option<String>,
}

/// Represents the overall health of the system
#[derive(Debug, Clone)]
pub struct SystemHealth {
    /// Overall system status
    pub status: SystemStatus,
    /// Map of component names to their health status
    pub components: HashMap<String, HealthComponent>,
}

/// Trait for health services
#[async_trait]
pub trait HealthServiceTrait: Send + Sync + std::fmt::Debug {
    /// Get the overall system health
    async fn get_system_health(&self) -> SystemHealth;

    /// Check the status of the database
    /// Returns true if history is persisted, false if it only lives in memory
    /// Returns an error if the database does not answer
    async fn check_database_status(&self) -> Result<bool, String>;
}

/// Check whether the history database is available
///
/// Returns:
/// - Ok(true) if a file-backed database answers
/// - Ok(false) if history only lives in memory
/// - Err if the pool exists but the database does not answer
pub async fn check_database_status() -> Result<bool, String> {
    match database::get_db_pool() {
        Ok(pool) => {
            pool.ping().map_err(|e| format!("Database connection error: {}", e))?;
            Ok(!pool.is_in_memory())
        },
        Err(_) => Ok(false),
    }
}

fn database_component(status: Result<bool, String>) -> HealthComponent {
    match status {
        Ok(true) => HealthComponent {
            status: ComponentStatus::Healthy,
            details: database::get_connection_info(),
        },
        Ok(false) => HealthComponent {
            status: ComponentStatus::Degraded,
            details: Some("History is kept in memory and will not survive a restart".to_string()),
        },
        Err(e) => HealthComponent {
            status: ComponentStatus::Unhealthy,
            details: Some(e),
        },
    }
}

/// Overall status is the worst component status
fn overall_status<'a>(components: impl IntoIterator<Item = &'a HealthComponent>) -> SystemStatus {
    let mut status = SystemStatus::Healthy;
    for component in components {
        match component.status {
            ComponentStatus::Unhealthy => return SystemStatus::Unhealthy,
            ComponentStatus::Degraded => status = SystemStatus::Degraded,
            ComponentStatus::Healthy => {}
        }
    }
    status
}

/// Health service reporting the database and the language model
#[derive(Clone)]
pub struct HealthService {
    llm: Arc<dyn LlmClient>,
}

impl std::fmt::Debug for HealthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthService")
            .field("llm", &self.llm.describe())
            .finish()
    }
}

impl HealthService {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl HealthServiceTrait for HealthService {
    async fn get_system_health(&self) -> SystemHealth {
        let db_component = database_component(self.check_database_status().await);

        // Both modes always answer
        let llm_component = HealthComponent {
            status: ComponentStatus::Healthy,
            details: Some(self.llm.describe()),
        };

        let components: HashMap<String, HealthComponent> = vec![
            ("database".to_string(), db_component),
            ("llm".to_string(), llm_component),
        ].into_iter().collect();

        SystemHealth {
            status: overall_status(components.values()),
            components,
        }
    }

    async fn check_database_status(&self) -> Result<bool, String> {
        check_database_status().await
    }
}

/// Create the health service for the given language model client
pub fn create_default_health_service(llm: Arc<dyn LlmClient>) -> HealthService {
    HealthService::new(llm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm::OfflineLlmClient;

    fn component(status: ComponentStatus) -> HealthComponent {
        HealthComponent { status, details: None }
    }

    #[test]
    fn test_overall_status_is_worst_component() {
        let healthy = component(ComponentStatus::Healthy);
        let degraded = component(ComponentStatus::Degraded);
        let unhealthy = component(ComponentStatus::Unhealthy);

        assert_eq!(overall_status([&healthy, &healthy]), SystemStatus::Healthy);
        assert_eq!(overall_status([&healthy, &degraded]), SystemStatus::Degraded);
        assert_eq!(overall_status([&degraded, &unhealthy, &healthy]), SystemStatus::Unhealthy);
    }

    #[test]
    fn test_database_component_mapping() {
        assert_eq!(database_component(Ok(false)).status, ComponentStatus::Degraded);
        let failed = database_component(Err("down".to_string()));
        assert_eq!(failed.status, ComponentStatus::Unhealthy);
        assert_eq!(failed.details.as_deref(), Some("down"));
    }

    #[test]
    fn test_database_without_pool_is_degraded() {
        // No test in this crate initializes the global pool
        assert_eq!(tokio_test::block_on(check_database_status()), Ok(false));
    }

    #[tokio::test]
    async fn test_get_system_health() {
        let service = create_default_health_service(Arc::new(OfflineLlmClient::default()));
        let health = service.get_system_health().await;

        // Database status depends on whether a global pool exists in this process
        assert!(health.components.contains_key("database"));
        let llm = &health.components["llm"];
        assert_eq!(llm.status, ComponentStatus::Healthy);
        assert_eq!(llm.details.as_deref(), Some("mock"));
    }
}
