//! YesNo Backend Library
//!
//! Prediction-market backend: admins publish yes/no questions, users wager on
//! them, and declaring a result settles every entry against an auditable
//! ledger. This module exposes the components for the binary and the tests.

pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod repositories;
pub mod services;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use auth::JwtValidator;
use axum::extract::FromRef;
use repositories::Repositories;
use services::*;
use std::sync::Arc;

/// Application state shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub repositories: Repositories,
    pub questions: Arc<QuestionService>,
    pub wagers: Arc<WagerService>,
    pub settlement: Arc<SettlementEngine>,
    pub guard: Arc<BalanceGuard>,
    pub wallet: Arc<WalletService>,
    pub dashboard: Arc<DashboardService>,
    pub jwt: Arc<JwtValidator>,
    pub audit: Arc<AuditTrailService>,
}

impl AppState {
    /// Wire every service against one set of repositories
    pub fn new(
        repositories: Repositories,
        config: &AppConfig,
        provider: Arc<dyn PaymentProvider>,
        audit: Arc<AuditTrailService>,
    ) -> Self {
        let guard = Arc::new(BalanceGuard::new(
            repositories.ledger.clone(),
            audit.clone(),
        ));

        Self {
            questions: Arc::new(QuestionService::new(repositories.questions.clone())),
            wagers: Arc::new(WagerService::new(
                repositories.questions.clone(),
                repositories.entries.clone(),
                guard.clone(),
                audit.clone(),
            )),
            settlement: Arc::new(SettlementEngine::new(
                repositories.questions.clone(),
                repositories.entries.clone(),
                guard.clone(),
                audit.clone(),
                config.settlement_concurrency,
            )),
            wallet: Arc::new(WalletService::new(
                repositories.ledger.clone(),
                guard.clone(),
                provider,
                PaymentVerifier::new(config.payment.key_secret.clone()),
            )),
            dashboard: Arc::new(DashboardService::new(
                repositories.questions.clone(),
                repositories.entries.clone(),
                repositories.ledger.clone(),
            )),
            jwt: Arc::new(JwtValidator::new(&config.access_token_secret)),
            guard,
            audit,
            repositories,
        }
    }
}

impl FromRef<AppState> for Arc<JwtValidator> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}
