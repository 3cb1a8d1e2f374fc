// Testing utilities and mock implementations for the domain layer
// This module is only available when the "mock" feature is enabled

// Re-export useful test mocks from the data layer
pub use symptom_checker_data::repository::tests::MockQueryHistoryRepository;

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::entities::history::{EngineCount, HistoryStats, QueryRecord};
use crate::entities::symptom::{Condition, Confidence, Engine, SymptomResponse, DISCLAIMER};
use crate::entities::conversions::hash_symptoms;
use crate::health::{ComponentStatus, HealthComponent, HealthServiceTrait, SystemHealth, SystemStatus};
use crate::services::symptom_checker::{SymptomCheckerError, SymptomCheckerServiceTrait};

/// Mock implementation of the SymptomCheckerServiceTrait for testing.
///
/// Every check answers with a single "mock condition" and is recorded under
/// the rule-based engine.
pub struct MockSymptomCheckerService {
    history: RwLock<Vec<QueryRecord>>,
    should_fail_validation: bool,
    should_fail_repository: bool,
}

impl Default for MockSymptomCheckerService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSymptomCheckerService {
    /// Create a new mock symptom checker service
    pub fn new() -> Self {
        Self {
            history: RwLock::new(Vec::new()),
            should_fail_validation: false,
            should_fail_repository: false,
        }
    }

    /// Configure the mock to fail validation
    pub fn with_validation_failure(mut self) -> Self {
        self.should_fail_validation = true;
        self
    }

    /// Configure the mock to fail history reads
    pub fn with_repository_failure(mut self) -> Self {
        self.should_fail_repository = true;
        self
    }

    /// Add pre-defined history records, oldest first
    pub fn with_history(self, records: Vec<QueryRecord>) -> Self {
        if let Ok(mut history) = self.history.write() {
            history.extend(records);
        }
        self
    }

    fn repository_check(&self) -> Result<(), SymptomCheckerError> {
        if self.should_fail_repository {
            Err(SymptomCheckerError::RepositoryError(
                "Repository error - mock is configured to fail".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SymptomCheckerServiceTrait for MockSymptomCheckerService {
    fn validate_symptoms(&self, symptoms: &str) -> Result<(), SymptomCheckerError> {
        if self.should_fail_validation || symptoms.trim().is_empty() {
            Err(SymptomCheckerError::ValidationError(
                "Validation failed - mock is configured to fail validation".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    async fn check_symptoms(&self, symptoms: &str, _allow_llm: bool)
        -> Result<SymptomResponse, SymptomCheckerError>
    {
        self.validate_symptoms(symptoms)?;

        let response = SymptomResponse {
            input: symptoms.to_string(),
            probable_conditions: vec![Condition::new("mock condition", "Mock rationale.", Confidence::Medium, 0.5)],
            recommended_next_steps: vec!["Mock next step.".to_string()],
            disclaimer: DISCLAIMER.to_string(),
            notes: None,
        };

        let mut history = self.history.write().map_err(|e| SymptomCheckerError::RepositoryError(e.to_string()))?;
        let id = history.len() as i64 + 1;
        history.push(QueryRecord {
            id,
            symptom_hash: hash_symptoms(symptoms),
            timestamp: Utc::now(),
            engine: Engine::RuleBased,
            top_condition: "mock condition".to_string(),
            top_score: 0.5,
            notes: None,
        });

        Ok(response)
    }

    async fn get_history(
        &self,
        engine: Option<Engine>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<QueryRecord>, usize), SymptomCheckerError> {
        self.repository_check()?;

        let history = self.history.read().map_err(|e| SymptomCheckerError::RepositoryError(e.to_string()))?;
        let matching: Vec<QueryRecord> = history.iter()
            .rev()
            .filter(|r| engine.map_or(true, |engine| r.engine == engine))
            .cloned()
            .collect();
        let total = matching.len();

        Ok((matching.into_iter().skip(offset).take(limit).collect(), total))
    }

    async fn get_history_record(&self, id: i64) -> Result<Option<QueryRecord>, SymptomCheckerError> {
        self.repository_check()?;

        let history = self.history.read().map_err(|e| SymptomCheckerError::RepositoryError(e.to_string()))?;
        Ok(history.iter().find(|r| r.id == id).cloned())
    }

    async fn get_history_stats(&self) -> Result<HistoryStats, SymptomCheckerError> {
        self.repository_check()?;

        let history = self.history.read().map_err(|e| SymptomCheckerError::RepositoryError(e.to_string()))?;
        let by_engine = Engine::ALL
            .into_iter()
            .map(|engine| EngineCount {
                engine,
                count: history.iter().filter(|r| r.engine == engine).count(),
            })
            .filter(|c| c.count > 0)
            .collect();

        Ok(HistoryStats { total: history.len(), by_engine })
    }
}

/// Mock implementation of health services for testing system health
#[derive(Debug)]
pub struct MockHealthService {
    /// Database component status
    database_status: ComponentStatus,
    /// System status
    system_status: SystemStatus,
    /// Additional components
    components: HashMap<String, HealthComponent>,
}

impl Default for MockHealthService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHealthService {
    /// Create a new mock health service with all components healthy
    pub fn new() -> Self {
        Self {
            database_status: ComponentStatus::Healthy,
            system_status: SystemStatus::Healthy,
            components: HashMap::new(),
        }
    }

    /// Configure the mock with a degraded database
    pub fn with_degraded_database(mut self) -> Self {
        self.database_status = ComponentStatus::Degraded;
        self.system_status = SystemStatus::Degraded;
        self
    }

    /// Configure the mock with an unhealthy database
    pub fn with_unhealthy_database(mut self) -> Self {
        self.database_status = ComponentStatus::Unhealthy;
        self.system_status = SystemStatus::Unhealthy;
        self
    }

    /// Add a custom component with a specific status
    pub fn with_component(mut self, name: &str, status: ComponentStatus, details: Option<String>) -> Self {
        self.components.insert(name.to_string(), HealthComponent { status, details });
        self
    }
}

#[async_trait]
impl HealthServiceTrait for MockHealthService {
    async fn get_system_health(&self) -> SystemHealth {
        let mut components = HashMap::new();

        components.insert(
            "database".to_string(),
            HealthComponent {
                status: self.database_status.clone(),
                details: match self.database_status {
                    ComponentStatus::Healthy => None,
                    ComponentStatus::Degraded => Some("History is kept in memory".to_string()),
                    ComponentStatus::Unhealthy => Some("Database connection failed".to_string()),
                },
            },
        );

        components.insert(
            "llm".to_string(),
            HealthComponent {
                status: ComponentStatus::Healthy,
                details: Some("mock".to_string()),
            },
        );

        for (name, component) in &self.components {
            components.insert(name.clone(), component.clone());
        }

        SystemHealth {
            status: self.system_status.clone(),
            components,
        }
    }

    async fn check_database_status(&self) -> Result<bool, String> {
        match self.database_status {
            ComponentStatus::Healthy => Ok(true),
            ComponentStatus::Degraded => Ok(false),
            ComponentStatus::Unhealthy => Err("Database connection failed".to_string()),
        }
    }
}

/// Factory function to create a mock health service
pub fn create_mock_health_service() -> impl HealthServiceTrait {
    MockHealthService::new()
}
