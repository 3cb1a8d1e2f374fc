pub mod handlers;
pub mod routes;
pub mod security;

use axum::Router;

/// Create the application router
pub async fn create_application() -> Router {
    routes::create_app().await
}
