//! Storage seam for questions, entries and the ledger.
//!
//! Every method that moves money applies its whole effect (row update, ledger
//! append, balance change) as one unit; callers never sequence those writes
//! themselves.

pub mod entry_repository;
pub mod ledger_repository;
pub mod memory;
pub mod question_repository;

pub use entry_repository::PgEntryRepository;
pub use ledger_repository::PgLedgerRepository;
pub use memory::MemoryStore;
pub use question_repository::PgQuestionRepository;

use crate::error::RepositoryError;
use crate::models::{
    Answer, Entry, LedgerPosting, Question, QuestionPatch, Role, Transaction, TransactionCategory,
    User, UserStatus,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Question counts for dashboards
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuestionCounts {
    pub total: i64,
    pub pending: i64,
}

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    async fn insert(&self, question: &Question) -> RepoResult<Question>;

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Question>>;

    /// All questions, newest first
    async fn find_all(&self) -> RepoResult<Vec<Question>>;

    /// Pending questions, newest first
    async fn find_pending(&self) -> RepoResult<Vec<Question>>;

    /// Merge `patch` into a pending question. `InvalidState` once completed.
    async fn update(&self, id: Uuid, patch: QuestionPatch) -> RepoResult<Question>;

    /// Remove a pending question whose window has not started at `now` and
    /// that has no entries.
    async fn delete(&self, id: Uuid, now: NaiveDateTime) -> RepoResult<()>;

    /// Transition pending -> completed and record the answer, only if the
    /// question is currently pending. `InvalidState` otherwise.
    async fn mark_completed(&self, id: Uuid, answer: Answer) -> RepoResult<Question>;

    async fn counts(&self) -> RepoResult<QuestionCounts>;
}

#[async_trait]
pub trait EntryRepository: Send + Sync {
    /// Record a wager: re-checks the question is pending, applies the `bet`
    /// posting (conditional debit + ledger append) and inserts the entry.
    async fn place(&self, entry: &Entry, posting: LedgerPosting) -> RepoResult<(Entry, Transaction)>;

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Entry>>;

    async fn find_by_question(&self, question_id: Uuid) -> RepoResult<Vec<Entry>>;

    /// Entries of a question whose result is still pending
    async fn find_unsettled_by_question(&self, question_id: Uuid) -> RepoResult<Vec<Entry>>;

    /// A user's entries, newest first
    async fn find_by_user(&self, user_id: Uuid) -> RepoResult<Vec<Entry>>;

    /// All entries, newest first
    async fn find_all(&self) -> RepoResult<Vec<Entry>>;

    async fn count(&self) -> RepoResult<i64>;

    /// pending -> failed. `Ok(false)` when the entry was already settled.
    async fn settle_loss(&self, entry_id: Uuid) -> RepoResult<bool>;

    /// pending -> success with `win`, plus the `win` posting, as one unit.
    /// `Ok(None)` when the entry was already settled; nothing is written then.
    async fn settle_win(
        &self,
        entry_id: Uuid,
        win: Decimal,
        posting: LedgerPosting,
    ) -> RepoResult<Option<Transaction>>;
}

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn create_user(&self, username: &str, role: Role) -> RepoResult<User>;

    async fn find_user(&self, id: Uuid) -> RepoResult<Option<User>>;

    async fn count_users(&self) -> RepoResult<i64>;

    async fn set_user_status(&self, id: Uuid, status: UserStatus) -> RepoResult<User>;

    /// Apply a posting: balance change and ledger append together. Debits that
    /// would drive the balance negative fail with `InsufficientFunds`.
    async fn apply(&self, posting: LedgerPosting) -> RepoResult<(User, Transaction)>;

    /// A user's transactions, newest first
    async fn find_transactions_by_user(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
    ) -> RepoResult<Vec<Transaction>>;

    /// All transactions, newest first
    async fn find_all_transactions(&self, limit: Option<i64>) -> RepoResult<Vec<Transaction>>;

    /// Sum of amounts per category, for one user or platform-wide
    async fn totals_by_category(
        &self,
        user_id: Option<Uuid>,
    ) -> RepoResult<HashMap<TransactionCategory, Decimal>>;
}

/// The three repositories the services are wired against
#[derive(Clone)]
pub struct Repositories {
    pub questions: Arc<dyn QuestionRepository>,
    pub entries: Arc<dyn EntryRepository>,
    pub ledger: Arc<dyn LedgerRepository>,
}

impl Repositories {
    /// PostgreSQL-backed repositories sharing one pool
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            questions: Arc::new(PgQuestionRepository::new(pool.clone())),
            entries: Arc::new(PgEntryRepository::new(pool.clone())),
            ledger: Arc::new(PgLedgerRepository::new(pool)),
        }
    }

    /// Repositories over a single in-process store
    pub fn in_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            questions: store.clone(),
            entries: store.clone(),
            ledger: store,
        }
    }
}
