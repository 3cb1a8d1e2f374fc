use std::sync::Arc;
use axum::{
    body::Bytes,
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, info, instrument, warn};
use validator::Validate;

use symptom_checker_domain::services::{
    create_default_symptom_checker_service, LlmClient, SymptomCheckerError, SymptomCheckerServiceTrait,
};

use crate::entities::common::ErrorResponse;
use crate::entities::symptom::{SymptomCheckRequest, SymptomCheckResponse};

/// Message returned when the body is not a JSON object with a symptoms field
pub const MISSING_SYMPTOMS_MESSAGE: &str = "Please POST JSON with 'symptoms' field.";

/// Usage text served at the root path
pub const USAGE_BANNER: &str =
    "Healthcare Symptom Checker. POST /api/v1/symptom-check with {\"symptoms\": \"...\"}";

/// Service type for dependency injection
pub type SymptomCheckerService = Arc<dyn SymptomCheckerServiceTrait + Send + Sync>;

/// Create a default service for the handlers to use
pub fn create_service(llm: Arc<dyn LlmClient>) -> SymptomCheckerService {
    Arc::new(create_default_symptom_checker_service(llm))
}

/// Usage banner
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Usage information", body = String, content_type = "text/plain")
    ),
    tag = "symptom_check"
)]
pub async fn index() -> &'static str {
    USAGE_BANNER
}

/// Flatten validator errors into `{field: [messages]}`
fn validation_details(errors: &validator::ValidationErrors) -> serde_json::Value {
    errors
        .field_errors()
        .iter()
        .map(|(field, errors)| {
            let messages: Vec<String> = errors
                .iter()
                .map(|err| match &err.message {
                    Some(msg) => msg.to_string(),
                    None => format!("Invalid {}", field),
                })
                .collect();
            (field.to_string(), serde_json::json!(messages))
        })
        .collect::<serde_json::Map<String, serde_json::Value>>()
        .into()
}

/// Check free-text symptoms
///
/// The body is read as JSON whatever the declared content type.
#[utoipa::path(
    post,
    path = "/api/v1/symptom-check",
    request_body = SymptomCheckRequest,
    responses(
        (status = 200, description = "Educational assessment", body = SymptomCheckResponse),
        (status = 400, description = "Missing or invalid symptoms", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "symptom_check"
)]
#[instrument(skip(service, body))]
pub async fn check_symptoms(
    State(service): State<SymptomCheckerService>,
    body: Bytes,
) -> Result<impl IntoResponse, Response> {
    let request: SymptomCheckRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected symptom check body: {}", e);
            return Err(ErrorResponse::bad_request(MISSING_SYMPTOMS_MESSAGE).into_response());
        }
    };

    if let Err(errors) = request.validate() {
        warn!("Invalid symptom check request: {}", errors);
        let error = ErrorResponse::validation_error("Invalid symptoms", Some(validation_details(&errors)));
        return Err(error.into_response());
    }

    let allow_llm = request.allow_llm.unwrap_or(true);
    info!("Checking symptoms (allow_llm={})", allow_llm);

    match service.check_symptoms(&request.symptoms, allow_llm).await {
        Ok(response) => Ok((StatusCode::OK, Json(SymptomCheckResponse::from(response)))),
        Err(SymptomCheckerError::ValidationError(message)) => {
            warn!("Symptom check rejected: {}", message);
            Err(ErrorResponse::validation_error(&message, None).into_response())
        },
        Err(e) => {
            error!("Error checking symptoms: {}", e);
            Err(ErrorResponse::internal_error().into_response())
        }
    }
}
