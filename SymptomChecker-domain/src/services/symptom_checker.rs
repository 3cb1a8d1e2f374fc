use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::entities::conversions;
use crate::entities::history::{HistoryStats, QueryRecord};
use crate::entities::symptom::{Condition, Confidence, Engine, SymptomResponse, DISCLAIMER, UNCLEAR_CONDITION};
use crate::services::emergency::detect_emergency;
use crate::services::llm::{LlmClient, LlmError};
use crate::services::parsing::parse_and_validate;
use crate::services::rules::{infer_conditions, RULE_MATCH_SCORE};
use symptom_checker_data::repository::{QueryHistoryRepositoryTrait, RepositoryError};

/// Longest accepted symptom description, in characters
pub const MAX_SYMPTOMS_CHARS: usize = 2000;

pub const EMERGENCY_CONDITION: &str = "Possible emergency — seek immediate care";
const EMERGENCY_STEP: &str = "Seek emergency care immediately.";
const CLINICIAN_STEP: &str = "Educational only. Consider seeing a clinician for evaluation.";

/// Symptom checker service errors
#[derive(Debug, Error)]
pub enum SymptomCheckerError {
    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Repository error
    #[error("Repository error: {0}")]
    RepositoryError(String),
}

/// Trait for symptom checker operations
#[async_trait]
pub trait SymptomCheckerServiceTrait {
    /// Check that a symptom description is acceptable
    fn validate_symptoms(&self, symptoms: &str) -> Result<(), SymptomCheckerError>;

    /// Produce an educational assessment of free-text symptoms
    async fn check_symptoms(&self, symptoms: &str, allow_llm: bool)
        -> Result<SymptomResponse, SymptomCheckerError>;

    /// Get a newest-first page of the query history and the total match count
    async fn get_history(
        &self,
        engine: Option<Engine>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<QueryRecord>, usize), SymptomCheckerError>;

    /// Get one history record by id
    async fn get_history_record(&self, id: i64) -> Result<Option<QueryRecord>, SymptomCheckerError>;

    /// Get per-engine totals of the query history
    async fn get_history_stats(&self) -> Result<HistoryStats, SymptomCheckerError>;
}

/// Symptom checker combining emergency detection, rules and the language model
pub struct SymptomCheckerService<R: QueryHistoryRepositoryTrait> {
    repository: R,
    llm: Arc<dyn LlmClient>,
    /// Service-wide switch; a request can only narrow it
    allow_llm: bool,
}

impl<R: QueryHistoryRepositoryTrait> SymptomCheckerService<R> {
    /// Create a new service with the language model enabled
    pub fn new(repository: R, llm: Arc<dyn LlmClient>) -> Self {
        Self { repository, llm, allow_llm: true }
    }

    /// Enable or disable the language model for every request
    pub fn with_llm_allowed(mut self, allow_llm: bool) -> Self {
        self.allow_llm = allow_llm;
        self
    }

    fn map_repo_error(&self, err: RepositoryError) -> SymptomCheckerError {
        match err {
            RepositoryError::Validation(msg) => SymptomCheckerError::ValidationError(msg),
            _ => SymptomCheckerError::RepositoryError(err.to_string()),
        }
    }

    /// Write the outcome to history. Failures never reach the caller.
    async fn log_outcome(&self, symptoms: &str, engine: Engine, response: &SymptomResponse, notes: Option<String>) {
        let log = conversions::convert_to_data_query_log(symptoms, engine, response, notes);
        if let Err(e) = self.repository.record(log).await {
            warn!("Failed to log {} query to history: {}", engine, e);
        }
    }
}

fn unclear_response(symptoms: &str, rationale: &str) -> SymptomResponse {
    SymptomResponse {
        input: symptoms.to_string(),
        probable_conditions: vec![Condition::new(UNCLEAR_CONDITION, rationale, Confidence::Low, 0.0)],
        recommended_next_steps: vec![CLINICIAN_STEP.to_string()],
        disclaimer: DISCLAIMER.to_string(),
        notes: None,
    }
}

#[async_trait]
impl<R: QueryHistoryRepositoryTrait + Send + Sync> SymptomCheckerServiceTrait for SymptomCheckerService<R> {
    fn validate_symptoms(&self, symptoms: &str) -> Result<(), SymptomCheckerError> {
        if symptoms.trim().is_empty() {
            return Err(SymptomCheckerError::ValidationError(
                "symptoms must not be empty".to_string(),
            ));
        }

        if symptoms.chars().count() > MAX_SYMPTOMS_CHARS {
            return Err(SymptomCheckerError::ValidationError(format!(
                "symptoms must be at most {} characters",
                MAX_SYMPTOMS_CHARS
            )));
        }

        Ok(())
    }

    async fn check_symptoms(&self, symptoms: &str, allow_llm: bool)
        -> Result<SymptomResponse, SymptomCheckerError>
    {
        self.validate_symptoms(symptoms)?;

        if let Some(phrase) = detect_emergency(symptoms) {
            info!("Emergency phrase matched: {}", phrase);
            let response = SymptomResponse {
                input: symptoms.to_string(),
                probable_conditions: vec![Condition::new(
                    EMERGENCY_CONDITION,
                    "Emergency keyword matched.",
                    Confidence::High,
                    1.0,
                )],
                recommended_next_steps: vec![EMERGENCY_STEP.to_string()],
                disclaimer: DISCLAIMER.to_string(),
                notes: None,
            };
            self.log_outcome(symptoms, Engine::Emergency, &response, Some("emergency_short_circuit".to_string())).await;
            return Ok(response);
        }

        let matches = infer_conditions(symptoms);
        if matches.first().map_or(false, |m| m.score > 0.0) {
            debug!("Rule engine matched {} conditions", matches.len());
            let response = SymptomResponse {
                input: symptoms.to_string(),
                probable_conditions: matches
                    .iter()
                    .map(|m| {
                        let confidence = if m.score >= RULE_MATCH_SCORE { Confidence::High } else { Confidence::Medium };
                        Condition::new(m.condition, "Matched rule keywords.", confidence, m.score)
                    })
                    .collect(),
                recommended_next_steps: vec![CLINICIAN_STEP.to_string()],
                disclaimer: DISCLAIMER.to_string(),
                notes: None,
            };
            self.log_outcome(symptoms, Engine::RuleBased, &response, Some("rule_based_match".to_string())).await;
            return Ok(response);
        }

        if !(allow_llm && self.allow_llm) {
            let response = unclear_response(symptoms, "LLM disabled or no rules matched.");
            self.log_outcome(symptoms, Engine::NoLlm, &response, Some("llm_disabled".to_string())).await;
            return Ok(response);
        }

        let outcome = match self.llm.complete(symptoms).await {
            Ok(raw) => parse_and_validate(&raw).map_err(|e| format!("llm_parse_error:{}", e)),
            Err(LlmError::RateLimited) => Err("llm_rate_limited".to_string()),
            Err(e) => Err(format!("llm_parse_error:{}", e)),
        };

        match outcome {
            Ok(response) => {
                info!("Answered from language model output");
                let notes = response.notes.clone();
                self.log_outcome(symptoms, Engine::Llm, &response, notes).await;
                Ok(response)
            },
            Err(notes) => {
                warn!("Falling back after language model failure: {}", notes);
                let response = unclear_response(symptoms, "Fallback due to LLM parse/validation error.");
                self.log_outcome(symptoms, Engine::Fallback, &response, Some(notes)).await;
                Ok(response)
            }
        }
    }

    async fn get_history(
        &self,
        engine: Option<Engine>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<QueryRecord>, usize), SymptomCheckerError> {
        let (entries, total) = self.repository
            .get_filtered(engine.map(|e| e.as_str().to_string()), limit, offset)
            .await
            .map_err(|e| self.map_repo_error(e))?;

        // An unreadable row fails the whole page
        let records = entries
            .into_iter()
            .map(conversions::convert_to_domain_query_record)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                error!("Unreadable history row: {}", e);
                SymptomCheckerError::RepositoryError(e)
            })?;

        Ok((records, total))
    }

    async fn get_history_record(&self, id: i64) -> Result<Option<QueryRecord>, SymptomCheckerError> {
        let entry = self.repository
            .get_by_id(id)
            .await
            .map_err(|e| self.map_repo_error(e))?;

        entry
            .map(conversions::convert_to_domain_query_record)
            .transpose()
            .map_err(SymptomCheckerError::RepositoryError)
    }

    async fn get_history_stats(&self) -> Result<HistoryStats, SymptomCheckerError> {
        let counts = self.repository
            .count_by_engine()
            .await
            .map_err(|e| self.map_repo_error(e))?;

        let by_engine = conversions::convert_to_domain_engine_counts(counts);
        let total = by_engine.iter().map(|c| c.count).sum();

        Ok(HistoryStats { total, by_engine })
    }
}

/// Read the service-wide `ALLOW_LLM` switch; anything but false-like values enables it
pub fn llm_allowed_from_env() -> bool {
    match env::var("ALLOW_LLM") {
        Ok(value) => !matches!(value.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"),
        Err(_) => true,
    }
}

/// Create a default symptom checker service using the repository from data layer
pub fn create_default_symptom_checker_service(llm: Arc<dyn LlmClient>) -> impl SymptomCheckerServiceTrait + Send + Sync {
    let repository = symptom_checker_data::repository::QueryHistoryRepository::new();
    SymptomCheckerService::new(repository, llm).with_llm_allowed(llm_allowed_from_env())
}

/// Create a mock symptom checker service for testing
/// This function is only available when the mock feature is enabled
#[cfg(feature = "mock")]
pub fn create_mock_symptom_checker_service() -> impl SymptomCheckerServiceTrait + Send + Sync {
    crate::testing::MockSymptomCheckerService::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm::{mock_llm_output, MockLlmClient};
    use symptom_checker_data::models::query_log::QueryLogEntry;
    use symptom_checker_data::repository::tests::MockQueryHistoryRepository;

    fn llm_returning(raw: &'static str) -> Arc<dyn LlmClient> {
        let mut llm = MockLlmClient::new();
        llm.expect_complete().returning(move |_| Ok(raw.to_string()));
        Arc::new(llm)
    }

    fn llm_never_called() -> Arc<dyn LlmClient> {
        let mut llm = MockLlmClient::new();
        llm.expect_complete().never();
        Arc::new(llm)
    }

    fn service(llm: Arc<dyn LlmClient>) -> SymptomCheckerService<MockQueryHistoryRepository> {
        SymptomCheckerService::new(MockQueryHistoryRepository::new(), llm)
    }

    #[test]
    fn test_validate_symptoms() {
        let service = service(llm_never_called());
        assert!(service.validate_symptoms("mild headache").is_ok());
        assert!(service.validate_symptoms("   ").is_err());
        assert!(service.validate_symptoms(&"a".repeat(MAX_SYMPTOMS_CHARS)).is_ok());

        let err = service.validate_symptoms(&"a".repeat(MAX_SYMPTOMS_CHARS + 1)).unwrap_err();
        assert!(err.to_string().contains("2000"));
    }

    #[tokio::test]
    async fn test_emergency_short_circuits_rules_and_llm() {
        let service = service(llm_never_called());

        let response = service.check_symptoms("Fever with CHEST PAIN", true).await.unwrap();
        assert_eq!(response.probable_conditions.len(), 1);
        assert_eq!(response.probable_conditions[0].condition, EMERGENCY_CONDITION);
        assert_eq!(response.probable_conditions[0].confidence, Confidence::High);
        assert_eq!(response.recommended_next_steps, vec![EMERGENCY_STEP]);

        let logged = service.repository.recorded();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].engine, "emergency");
        assert_eq!(logged[0].top_score, 1.0);
        assert_eq!(logged[0].notes.as_deref(), Some("emergency_short_circuit"));
    }

    #[tokio::test]
    async fn test_rule_match() {
        let service = service(llm_never_called());

        let response = service.check_symptoms("I have a feaver and a cough", true).await.unwrap();
        let names: Vec<&str> = response.probable_conditions.iter().map(|c| c.condition.as_str()).collect();
        assert_eq!(names, vec!["flu", "infection", "cold", "bronchitis"]);
        assert!(response.probable_conditions.iter().all(|c| c.confidence == Confidence::High));
        assert_eq!(response.disclaimer, DISCLAIMER);

        let logged = service.repository.recorded();
        assert_eq!(logged[0].engine, "rule_based");
        assert_eq!(logged[0].top_condition, "flu");
        assert_eq!(logged[0].symptom_hash, conversions::hash_symptoms("i have a feaver and a cough"));
    }

    #[tokio::test]
    async fn test_llm_disabled_by_request() {
        let service = service(llm_never_called());

        let response = service.check_symptoms("itchy elbow", false).await.unwrap();
        assert_eq!(response.probable_conditions[0].condition, UNCLEAR_CONDITION);
        assert_eq!(response.probable_conditions[0].rationale, "LLM disabled or no rules matched.");

        let logged = service.repository.recorded();
        assert_eq!(logged[0].engine, "no_llm");
        assert_eq!(logged[0].notes.as_deref(), Some("llm_disabled"));
    }

    #[tokio::test]
    async fn test_llm_disabled_by_service() {
        let service = service(llm_never_called()).with_llm_allowed(false);
        service.check_symptoms("itchy elbow", true).await.unwrap();
        assert_eq!(service.repository.recorded()[0].engine, "no_llm");
    }

    #[tokio::test]
    async fn test_llm_answer_is_used() {
        let raw = r#"Here you go: {"input": "itchy elbow", "probable_conditions": [
            {"condition": "eczema", "rationale": "Dry itchy skin.", "confidence": "medium"}
        ], "recommended_next_steps": ["Moisturize."], "disclaimer": "Educational only."}"#;
        let service = service(llm_returning(raw));

        let response = service.check_symptoms("itchy elbow", true).await.unwrap();
        assert_eq!(response.probable_conditions[0].condition, "eczema");
        assert_eq!(response.probable_conditions[0].relative_score, 0.5);
        assert_eq!(response.disclaimer, "Educational only.");

        let logged = service.repository.recorded();
        assert_eq!(logged[0].engine, "llm");
        assert_eq!(logged[0].top_condition, "eczema");
        assert_eq!(logged[0].notes.as_deref(), Some("parsed_and_rescued_relative_score"));
    }

    #[tokio::test]
    async fn test_offline_output_is_accepted() {
        let mut llm = MockLlmClient::new();
        llm.expect_complete().times(1).returning(|symptoms| Ok(mock_llm_output(symptoms)));
        let service = service(Arc::new(llm));

        let response = service.check_symptoms("itchy elbow", true).await.unwrap();
        assert_eq!(response.probable_conditions[0].condition, UNCLEAR_CONDITION);
        assert_eq!(service.repository.recorded()[0].engine, "llm");
    }

    #[tokio::test]
    async fn test_unparseable_llm_output_falls_back() {
        let service = service(llm_returning("I am not able to answer that."));

        let response = service.check_symptoms("itchy elbow", true).await.unwrap();
        assert_eq!(response.probable_conditions[0].condition, UNCLEAR_CONDITION);
        assert_eq!(response.probable_conditions[0].rationale, "Fallback due to LLM parse/validation error.");
        assert_eq!(response.probable_conditions[0].relative_score, 0.0);

        let logged = service.repository.recorded();
        assert_eq!(logged[0].engine, "fallback");
        assert_eq!(logged[0].notes.as_deref(), Some("llm_parse_error:Could not locate JSON in LLM output"));
    }

    #[tokio::test]
    async fn test_rate_limited_llm_falls_back() {
        let mut llm = MockLlmClient::new();
        llm.expect_complete().returning(|_| Err(LlmError::RateLimited));
        let service = service(Arc::new(llm));

        service.check_symptoms("itchy elbow", true).await.unwrap();
        let logged = service.repository.recorded();
        assert_eq!(logged[0].engine, "fallback");
        assert_eq!(logged[0].notes.as_deref(), Some("llm_rate_limited"));
    }

    #[tokio::test]
    async fn test_history_failure_does_not_fail_request() {
        let service = SymptomCheckerService::new(MockQueryHistoryRepository::failing(), llm_never_called());
        let response = service.check_symptoms("sore throat", true).await.unwrap();
        assert_eq!(response.probable_conditions[0].condition, "throat infection");
    }

    #[tokio::test]
    async fn test_history_and_stats() {
        let service = service(llm_never_called());
        service.check_symptoms("chest pain", true).await.unwrap();
        service.check_symptoms("headache", true).await.unwrap();
        service.check_symptoms("fatigue", true).await.unwrap();
        service.check_symptoms("itchy elbow", false).await.unwrap();

        let (records, total) = service.get_history(None, 2, 0).await.unwrap();
        assert_eq!(total, 4);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].engine, Engine::NoLlm);
        assert_eq!(records[1].top_condition, "anemia");

        let (records, total) = service.get_history(Some(Engine::RuleBased), 10, 0).await.unwrap();
        assert_eq!(total, 2);
        assert!(records.iter().all(|r| r.engine == Engine::RuleBased));

        let stats = service.get_history_stats().await.unwrap();
        assert_eq!(stats.total, 4);
        let counts: Vec<(Engine, usize)> = stats.by_engine.iter().map(|c| (c.engine, c.count)).collect();
        assert_eq!(counts, vec![(Engine::Emergency, 1), (Engine::RuleBased, 2), (Engine::NoLlm, 1)]);
    }

    fn stored_entry(id: i64, timestamp_utc: &str, engine: &str) -> QueryLogEntry {
        QueryLogEntry {
            id,
            symptom_hash: format!("hash-{}", id),
            timestamp_utc: timestamp_utc.to_string(),
            engine: engine.to_string(),
            top_condition: "flu".to_string(),
            top_score: 1.0,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_history_reads_sqlite_datetime_rows() {
        let repository = MockQueryHistoryRepository::with_entries(vec![
            stored_entry(1, "2024-05-01 08:30:00", "rule_based"),
            stored_entry(2, "2024-05-01T09:00:00.000Z", "llm"),
        ]);
        let service = SymptomCheckerService::new(repository, llm_never_called());

        let (records, total) = service.get_history(None, 10, 0).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].timestamp.to_rfc3339(), "2024-05-01T08:30:00+00:00");
    }

    #[tokio::test]
    async fn test_unreadable_history_row_is_an_error() {
        let repository = MockQueryHistoryRepository::with_entries(vec![
            stored_entry(1, "2024-05-01 08:30:00", "rule_based"),
            stored_entry(2, "2024-05-01 08:31:00", "oracle"),
        ]);
        let service = SymptomCheckerService::new(repository, llm_never_called());

        let err = service.get_history(None, 10, 0).await.unwrap_err();
        assert!(matches!(err, SymptomCheckerError::RepositoryError(_)));
    }

    #[tokio::test]
    async fn test_history_record_by_id() {
        let service = service(llm_never_called());
        service.check_symptoms("headache", true).await.unwrap();

        let record = service.get_history_record(1).await.unwrap().unwrap();
        assert_eq!(record.engine, Engine::RuleBased);
        assert_eq!(record.top_condition, "migraine");
        assert!(service.get_history_record(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_history_repository_error() {
        let service = SymptomCheckerService::new(MockQueryHistoryRepository::failing(), llm_never_called());
        let err = service.get_history_stats().await.unwrap_err();
        assert!(matches!(err, SymptomCheckerError::RepositoryError(_)));
    }
}
