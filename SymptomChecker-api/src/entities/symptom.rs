use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use symptom_checker_domain::entities::symptom::{Condition as DomainCondition, SymptomResponse};

/// Request payload for a symptom check
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SymptomCheckRequest {
    /// Free-text description of the symptoms
    #[validate(
        length(max = 2000, message = "Symptoms cannot exceed 2000 characters"),
        custom = "validate_not_blank"
    )]
    #[schema(example = "fever and sore throat for two days")]
    pub symptoms: String,

    /// Whether the language model may be consulted (default: true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_llm: Option<bool>,
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some("Symptoms must not be empty".into());
        return Err(error);
    }
    Ok(())
}

/// A probable condition with its rationale
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Condition {
    /// Name of the condition
    pub condition: String,

    /// Short explanation of why it was suggested
    pub rationale: String,

    /// Qualitative confidence: low, medium, high or unknown
    pub confidence: String,

    /// Relative score in [0, 1]
    pub relative_score: f64,
}

/// Educational assessment of the submitted symptoms
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SymptomCheckResponse {
    /// The symptoms as submitted
    pub input: String,

    /// Probable conditions, best first
    pub probable_conditions: Vec<Condition>,

    /// Suggested next steps
    pub recommended_next_steps: Vec<String>,

    /// Educational-use disclaimer
    pub disclaimer: String,

    /// Diagnostic notes from parsing model output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

fn convert_to_public_condition(condition: DomainCondition) -> Condition {
    Condition {
        condition: condition.condition,
        rationale: condition.rationale,
        confidence: condition.confidence.to_string(),
        relative_score: condition.relative_score,
    }
}

impl From<SymptomResponse> for SymptomCheckResponse {
    fn from(response: SymptomResponse) -> Self {
        Self {
            input: response.input,
            probable_conditions: response
                .probable_conditions
                .into_iter()
                .map(convert_to_public_condition)
                .collect(),
            recommended_next_steps: response.recommended_next_steps,
            disclaimer: response.disclaimer,
            notes: response.notes,
        }
    }
}
