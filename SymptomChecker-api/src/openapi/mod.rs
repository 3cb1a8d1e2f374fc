use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Configure Swagger UI endpoints
pub fn configure_swagger_routes() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
}

// API Documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health endpoints
        crate::api::handlers::health::health_check,

        // Symptom check endpoints
        crate::api::handlers::symptom_check::index,
        crate::api::handlers::symptom_check::check_symptoms,

        // History endpoints
        crate::api::handlers::history::get_history,
        crate::api::handlers::history::get_history_record,
        crate::api::handlers::history::get_history_stats
    ),
    components(
        schemas(
            // Entities
            crate::entities::symptom::SymptomCheckRequest,
            crate::entities::symptom::SymptomCheckResponse,
            crate::entities::symptom::Condition,
            crate::entities::history::HistoryRecord,
            crate::entities::history::HistoryStatsResponse,
            crate::entities::history::EngineCountEntry,
            crate::entities::history::HistoryQueryParams,
            crate::entities::common::ErrorResponse,
            crate::entities::common::HistoryPage,

            // Health handlers
            crate::api::handlers::health::HealthResponse,
            crate::api::handlers::health::ComponentStatus,
            crate::api::handlers::health::ComponentHealthStatus
        )
    ),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "symptom_check", description = "Educational symptom assessment"),
        (name = "history", description = "Anonymized query history")
    ),
    info(
        title = "Symptom Checker API",
        version = "0.1.0",
        description = "Educational symptom checker. Not medical advice.",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        ),
    ),
    servers(
        (url = "/", description = "Local development server")
    )
)]
pub struct ApiDoc;
