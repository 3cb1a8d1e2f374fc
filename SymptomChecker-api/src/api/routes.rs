use axum::{
    routing::{get, post},
    Extension,
    Router,
};
use tracing::debug;

use symptom_checker_domain::services::{create_llm_client, LlmConfig};

use crate::api::handlers::{health, history, symptom_check};
use crate::api::security::configure_security;
use crate::openapi::configure_swagger_routes;

/// Create the application router with services built from the environment
pub async fn create_app() -> Router {
    debug!("Creating application router");

    let llm = create_llm_client(&LlmConfig::from_env());
    let symptom_service = symptom_check::create_service(llm.clone());
    let health_service = health::create_health_service(llm);

    health::initialize_server_start_time();
    debug!("Health check service initialized");

    create_router(symptom_service, health_service)
}

/// Assemble routes, documentation and layers around the given services
pub fn create_router(
    symptom_service: symptom_check::SymptomCheckerService,
    health_service: health::HealthService,
) -> Router {
    let api_routes = Router::new()
        .route("/symptom-check", post(symptom_check::check_symptoms))
        // Specific routes before broader ones
        .route("/history/stats", get(history::get_history_stats))
        .route("/history/:id", get(history::get_history_record))
        .route("/history", get(history::get_history));

    debug!("API routes configured");

    let public_routes = Router::new()
        .route("/", get(symptom_check::index))
        .route("/api/symptom-check", post(symptom_check::check_symptoms))
        .route("/health", get(health::health_check))
        .layer(Extension(health_service));

    debug!("Public routes configured");

    let app = Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .with_state(symptom_service);

    let app = add_swagger_ui(app);
    debug!("Swagger UI merged");

    let app = configure_security(app);
    debug!("Security configuration applied");

    app
}

/// Add Swagger UI to the router
pub fn add_swagger_ui(app: Router) -> Router {
    app.merge(configure_swagger_routes())
}
