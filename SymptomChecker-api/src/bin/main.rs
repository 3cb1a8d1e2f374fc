use std::net::SocketAddr;
use std::path::PathBuf;
use anyhow::Context;
use dotenv::dotenv;
use tokio::signal;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};
use symptom_checker_api::api::create_application;

/// The main entry point for the symptom checker API server
///
/// This function:
/// 1. Initializes environment variables from .env file
/// 2. Sets up tracing for logging
/// 3. Ensures the data directory exists
/// 4. Initializes the history database pool
/// 5. Creates and starts the Axum web application
/// 6. Handles graceful shutdown
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenv().is_err() {
        eprintln!("Warning: .env file not found or couldn't be read. Using environment variables.");
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(false)
            .with_ansi(true)
            .with_timer(fmt::time::uptime())
            .with_writer(std::io::stdout))
        .with(env_filter)
        .init();

    info!("Starting symptom checker API server");

    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let db_path = PathBuf::from(&data_dir).join("history.db");

    if !PathBuf::from(&data_dir).exists() {
        info!("Creating data directory: {}", data_dir);
        if let Err(e) = std::fs::create_dir_all(&data_dir) {
            // The pool falls back to memory when the file cannot be created
            warn!("Failed to create data directory: {}", e);
        }
    }

    if std::env::var("DB_SQLITE_PATH").is_err() {
        std::env::set_var("DB_SQLITE_PATH", db_path.to_string_lossy().to_string());
        info!("Set DB_SQLITE_PATH to {}", db_path.display());
    }

    match symptom_checker_domain::database::initialize_database_pool() {
        Ok(_) => info!("Database pool initialized successfully"),
        Err(e) => {
            // History falls back to in-memory storage
            error!("Failed to initialize database pool: {}", e);
        }
    }

    if let Some(info) = symptom_checker_domain::database::get_connection_info() {
        info!("Query history stored in {}", info);
    }

    let app = create_application().await;

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .context("PORT must be a number")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for CTRL+C, or SIGTERM on Unix, to trigger graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down server...");
}
