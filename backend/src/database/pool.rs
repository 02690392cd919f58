use crate::config::DatabaseConfig;
use sqlx::{PgPool, postgres::PgPoolOptions};
use thiserror::Error;
use tracing::info;

/// Errors that can occur when working with the database
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to create database pool: {0}")]
    PoolCreation(sqlx::Error),
    
    #[error("Database query error: {0}")]
    QueryError(#[from] sqlx::Error),
    
    #[error("Database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Database wrapper that holds the connection pool
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new Database instance with the given pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Round-trip a trivial query
    pub async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Create a PostgreSQL connection pool for the ledger and wager tables
///
/// # Arguments
/// * `config` - Database configuration
///
/// # Returns
/// * `Ok(PgPool)` - Successfully created connection pool
/// * `Err(DatabaseError)` - Error creating the pool
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .idle_timeout(config.idle_timeout())
        .max_lifetime(config.max_lifetime())
        .test_before_acquire(config.test_before_acquire)
        .connect(&config.url)
        .await
        .map_err(DatabaseError::PoolCreation)?;

    Database::new(pool.clone()).ping().await?;
    info!(
        "Database pool ready (max_connections={})",
        config.max_connections
    );

    Ok(pool)
}

/// Run database migrations
///
/// # Arguments
/// * `pool` - Database connection pool
/// * `migrations_path` - Path to migrations directory (default: "./migrations")
///
/// # Returns
/// * `Ok(())` - Migrations completed successfully
/// * `Err(DatabaseError)` - Migration error
pub async fn run_migrations(
    pool: &PgPool,
    migrations_path: Option<&str>,
) -> Result<(), DatabaseError> {
    let path = migrations_path.unwrap_or("./migrations");
    info!("Applying migrations from {}", path);
    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(path))
        .await
        .map_err(DatabaseError::Migration)?;
    
    migrator.run(pool).await.map_err(DatabaseError::Migration)?;
    
    Ok(())
}