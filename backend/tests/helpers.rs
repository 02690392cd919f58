#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;
use yesno_backend::config::{AppConfig, PaymentConfig};
use yesno_backend::models::*;
use yesno_backend::repositories::*;
use yesno_backend::services::*;
use yesno_backend::{AppError, AppResult, AppState};

pub const TEST_KEY_SECRET: &str = "test_key_secret";

/// Whole-unit decimal
pub fn dec(value: i64) -> Decimal {
    Decimal::new(value, 0)
}

pub fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

/// Payment provider that hands out sequential fake orders
#[derive(Default)]
pub struct StubPaymentProvider {
    pub orders: Mutex<Vec<ProviderOrder>>,
}

#[async_trait]
impl PaymentProvider for StubPaymentProvider {
    async fn create_order(&self, amount: Decimal, receipt: &str) -> AppResult<ProviderOrder> {
        let mut orders = self.orders.lock();
        let order = ProviderOrder {
            id: format!("order_{}", orders.len() + 1),
            amount: payment::to_minor_units(amount)?,
            currency: payment::CURRENCY.to_string(),
            receipt: Some(receipt.to_string()),
            status: Some("created".to_string()),
        };
        orders.push(order.clone());
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &str) -> AppResult<ProviderOrder> {
        self.orders
            .lock()
            .iter()
            .find(|o| o.id == order_id)
            .cloned()
            .ok_or_else(|| AppError::ExternalService(format!("Unknown order {}", order_id)))
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        payment: PaymentConfig {
            key_secret: TEST_KEY_SECRET.to_string(),
            ..PaymentConfig::default()
        },
        settlement_concurrency: 4,
        ..AppConfig::default()
    }
}

/// Fully wired services over an in-memory store, with one admin and one user
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    pub provider: Arc<StubPaymentProvider>,
    pub admin: User,
    pub user: User,
}

impl TestContext {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::with_repositories(store.clone(), Repositories::in_memory(store)).await
    }

    /// Wire services against `repositories`; `store` must back its ledger
    pub async fn with_repositories(store: Arc<MemoryStore>, repositories: Repositories) -> Self {
        let provider = Arc::new(StubPaymentProvider::default());
        let state = AppState::new(
            repositories,
            &test_config(),
            provider.clone(),
            Arc::new(AuditTrailService::disabled()),
        );

        let admin = store.create_user("admin", Role::Admin).await.unwrap();
        let user = store.create_user("player", Role::User).await.unwrap();

        Self {
            store,
            state,
            provider,
            admin,
            user,
        }
    }

    pub async fn create_user(&self, username: &str) -> User {
        self.store.create_user(username, Role::User).await.unwrap()
    }

    /// Credit `amount` through the balance guard as a deposit
    pub async fn fund(&self, user_id: Uuid, amount: Decimal) {
        let posting = BalanceGuard::posting(
            user_id,
            TransactionCategory::Deposit,
            Some(amount),
            format!("{} INR deposited", amount),
            PaymentReference::default(),
        )
        .unwrap();
        self.state.guard.apply_delta(posting).await.unwrap();
    }

    pub async fn balance(&self, user_id: Uuid) -> Decimal {
        self.store.find_user(user_id).await.unwrap().unwrap().balance
    }

    pub async fn transactions(&self, user_id: Uuid) -> Vec<Transaction> {
        self.store
            .find_transactions_by_user(user_id, None)
            .await
            .unwrap()
    }

    /// A pending question whose betting window is open now
    pub async fn open_question(&self, min_bet: Decimal, max_bet: Decimal) -> Question {
        self.question_with_window(min_bet, max_bet, now() - Duration::hours(1), now() + Duration::hours(1))
            .await
    }

    /// A pending question whose betting window opens tomorrow
    pub async fn future_question(&self) -> Question {
        self.question_with_window(dec(10), dec(100), now() + Duration::days(1), now() + Duration::days(2))
            .await
    }

    pub async fn question_with_window(
        &self,
        min_bet: Decimal,
        max_bet: Decimal,
        starting: NaiveDateTime,
        ending: NaiveDateTime,
    ) -> Question {
        self.state
            .questions
            .create(
                self.admin.id,
                NewQuestion {
                    category: Some(Uuid::new_v4()),
                    question: Some("Will it rain tomorrow?".to_string()),
                    min_bet: Some(min_bet),
                    max_bet: Some(max_bet),
                    starting: Some(starting),
                    ending: Some(ending),
                },
            )
            .await
            .unwrap()
    }

    pub async fn bet(
        &self,
        user_id: Uuid,
        question_id: Uuid,
        bet: Decimal,
        answer: &str,
    ) -> AppResult<PlacedEntry> {
        self.state
            .wagers
            .place_entry(
                user_id,
                question_id,
                PlaceEntryRequest {
                    bet: Some(bet),
                    answer: Some(answer.to_string()),
                },
            )
            .await
    }

    /// Assert the stored balance equals the signed ledger sum
    pub async fn assert_ledger_consistent(&self, user_id: Uuid) {
        let audit = self.state.guard.audit(user_id).await.unwrap();
        assert!(
            audit.consistent,
            "balance {} != ledger {}",
            audit.balance, audit.ledger_sum
        );
    }
}
