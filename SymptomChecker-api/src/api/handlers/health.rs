use axum::{http::StatusCode, response::IntoResponse, Json, Extension};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use std::time::{SystemTime, UNIX_EPOCH};
use std::sync::{Once, Arc};
use once_cell::sync::OnceCell;
use symptom_checker_domain::health::{
    create_default_health_service, ComponentStatus as DomainComponentStatus, HealthComponent as DomainHealthComponent,
    HealthServiceTrait, SystemStatus,
};
use symptom_checker_domain::services::LlmClient;

/// Health check response with system information
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Current service status ("ok", "degraded", or "error")
    pub status: String,
    /// Current application version from Cargo manifest
    pub version: String,
    /// Timestamp of when the response was generated
    pub timestamp: u64,
    /// Uptime of the service in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime: Option<u64>,
    /// Details about various components of the system
    pub components: ComponentStatus,
    /// Environment information
    pub environment: String,
}

/// Status of individual system components
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ComponentStatus {
    /// History database status
    pub database: ComponentHealthStatus,
    /// Language model status
    pub llm: ComponentHealthStatus,
    /// Additional components (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional: Option<serde_json::Value>,
}

/// Health status for an individual component
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ComponentHealthStatus {
    /// Status of the component ("ok", "degraded", or "error")
    pub status: String,
    /// Optional message with more details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Service type for dependency injection
pub type HealthService = Arc<dyn HealthServiceTrait + Send + Sync>;

// Track the time when the server started using a thread-safe OnceCell
static SERVER_START_TIME: OnceCell<u64> = OnceCell::new();
static INIT: Once = Once::new();

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// Initialize the server start time
pub fn initialize_server_start_time() {
    INIT.call_once(|| {
        let _ = SERVER_START_TIME.set(now_secs());
    });
}

/// Health check endpoint to verify the API is running
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "API is healthy", body = HealthResponse),
        (status = 500, description = "API is not healthy", body = HealthResponse),
        (status = 503, description = "API is degraded", body = HealthResponse)
    ),
    tag = "health"
)]
#[instrument(skip(health_service))]
pub async fn health_check(
    Extension(health_service): Extension<HealthService>,
) -> impl IntoResponse {
    info!("Health check requested");

    let now = now_secs();
    let uptime = SERVER_START_TIME.get().map(|&start_time| now.saturating_sub(start_time));

    let system_health = health_service.get_system_health().await;

    let (status_code, overall_status) = match system_health.status {
        SystemStatus::Healthy => (StatusCode::OK, "ok"),
        SystemStatus::Degraded => (StatusCode::SERVICE_UNAVAILABLE, "degraded"),
        SystemStatus::Unhealthy => (StatusCode::INTERNAL_SERVER_ERROR, "error"),
    };

    let additional: serde_json::Map<String, serde_json::Value> = system_health.components.iter()
        .filter(|(name, _)| name.as_str() != "database" && name.as_str() != "llm")
        .map(|(name, component)| {
            (name.clone(), serde_json::json!({
                "status": map_component_status(&component.status),
                "message": component.details,
            }))
        })
        .collect();

    let components = ComponentStatus {
        database: to_public_component(system_health.components.get("database")),
        llm: to_public_component(system_health.components.get("llm")),
        additional: (!additional.is_empty()).then(|| additional.into()),
    };

    let response = HealthResponse {
        status: overall_status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: now,
        uptime,
        components,
        environment: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
    };

    (status_code, Json(response))
}

fn to_public_component(component: Option<&DomainHealthComponent>) -> ComponentHealthStatus {
    match component {
        Some(component) => ComponentHealthStatus {
            status: map_component_status(&component.status),
            message: component.details.clone(),
        },
        None => ComponentHealthStatus {
            status: map_component_status(&DomainComponentStatus::Unhealthy),
            message: Some("Component not reported".to_string()),
        },
    }
}

/// Map domain component status to API status string
fn map_component_status(status: &DomainComponentStatus) -> String {
    match status {
        DomainComponentStatus::Healthy => "ok",
        DomainComponentStatus::Degraded => "degraded",
        DomainComponentStatus::Unhealthy => "error",
    }.to_string()
}

/// Factory function to create a health service
pub fn create_health_service(llm: Arc<dyn LlmClient>) -> HealthService {
    Arc::new(create_default_health_service(llm))
}
