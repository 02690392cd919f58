//! YesNo Backend Service
//!
//! Main entry point for the YesNo prediction betting backend.
//! This service provides the HTTP JSON API for questions, entries, results
//! and wallets, backed by PostgreSQL (or an in-process store for local runs).

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use yesno_backend::api::create_router;
use yesno_backend::config::StoreKind;
use yesno_backend::database::{create_pool, run_migrations};
use yesno_backend::repositories::{MemoryStore, Repositories};
use yesno_backend::services::{AuditTrailService, RazorpayClient};
use yesno_backend::{AppConfig, AppError, AppResult, AppState};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    // Initialize tracing/logging with config
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "yesno_backend={},sqlx=warn,tower_http=info",
                    config.log_level
                )
                .into()
            }),
        )
        .init();

    info!("YesNo backend starting");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);
    info!("HTTP port: {}", config.http_port);

    // =========================================================================
    // STORAGE SETUP
    // =========================================================================
    let repositories = match config.store {
        StoreKind::Postgres => {
            info!("Connecting to database...");

            let pool = create_pool(&config.database).await.map_err(|e| {
                error!("Failed to create database pool: {}", e);
                AppError::Database(e)
            })?;

            info!("Database connection pool created successfully");
            info!("Max connections: {}", config.database.max_connections);

            info!("Running database migrations...");
            run_migrations(&pool, None).await.map_err(|e| {
                error!("Database migration failed: {}", e);
                AppError::Database(e)
            })?;
            info!("Database migrations completed successfully");

            Repositories::postgres(pool)
        }
        StoreKind::Memory => {
            if config.is_production() {
                return Err(AppError::Config(
                    "STORE=memory is not allowed in production".to_string(),
                ));
            }
            warn!("Using the in-memory store; data is lost on shutdown");
            Repositories::in_memory(Arc::new(MemoryStore::new()))
        }
    };

    // =========================================================================
    // SERVICES
    // =========================================================================
    let audit = Arc::new(AuditTrailService::new(&config.audit_log_dir).map_err(|e| {
        error!("Failed to initialize audit trail: {}", e);
        AppError::Message(format!("Audit trail initialization failed: {}", e))
    })?);

    if config.payment.key_secret.is_empty() {
        warn!("RAZORPAY_KEY_SECRET is not set; deposit verification will reject every callback");
    }
    let provider = Arc::new(RazorpayClient::new(config.payment.clone()));

    let state = AppState::new(repositories, &config, provider, audit);
    info!(
        "Services initialized (settlement concurrency {})",
        config.settlement_concurrency
    );

    // =========================================================================
    // HTTP SERVER
    // =========================================================================
    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port)
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid HTTP address: {}", e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Message(format!("Failed to bind HTTP server: {}", e)))?;

    info!("HTTP API listening on {}", addr);
    info!("Press Ctrl+C to shutdown gracefully");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received, shutting down gracefully...");
        })
        .await
        .map_err(|e| AppError::Message(format!("HTTP server error: {}", e)))?;

    info!("YesNo backend shutdown complete");
    Ok(())
}
