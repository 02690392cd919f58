//! In-process store implementing every repository trait.
//!
//! All state sits behind one mutex, so each trait method is a single critical
//! section and compound effects (entry + ledger + balance) apply together or
//! not at all. Used by the test suite and by `STORE=memory` runs.

use super::{
    EntryRepository, LedgerRepository, QuestionCounts, QuestionRepository, RepoResult,
};
use crate::error::RepositoryError;
use crate::models::{
    Answer, Entry, EntryResult, LedgerPosting, Question, QuestionPatch, QuestionState, Role,
    Transaction, TransactionCategory, User, UserStatus,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    // Insertion order doubles as creation order
    questions: Vec<Question>,
    entries: Vec<Entry>,
    transactions: Vec<Transaction>,
}

impl MemoryState {
    fn question(&self, id: Uuid) -> RepoResult<&Question> {
        self.questions
            .iter()
            .find(|q| q.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Question {} not found", id)))
    }

    fn question_mut(&mut self, id: Uuid) -> RepoResult<&mut Question> {
        self.questions
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Question {} not found", id)))
    }

    fn entry_mut(&mut self, id: Uuid) -> RepoResult<&mut Entry> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Entry {} not found", id)))
    }

    /// Validate a posting against the current state without mutating anything
    fn check_posting(&self, posting: &LedgerPosting) -> RepoResult<Decimal> {
        let user = self.users.get(&posting.user_id).ok_or_else(|| {
            RepositoryError::NotFound(format!("User {} not found", posting.user_id))
        })?;

        let balance_after = user.balance.checked_add(posting.delta()).ok_or_else(|| {
            RepositoryError::InvalidInput(format!(
                "Balance of user {} would overflow",
                posting.user_id
            ))
        })?;
        if balance_after < Decimal::ZERO {
            return Err(RepositoryError::InsufficientFunds(format!(
                "Insufficient balance: available {}, required {}",
                user.balance, posting.amount
            )));
        }

        if let Some(payment_id) = &posting.payment.provider_payment_id {
            if self
                .transactions
                .iter()
                .any(|t| t.provider_payment_id.as_ref() == Some(payment_id))
            {
                return Err(RepositoryError::Duplicate(format!(
                    "Payment {} already credited",
                    payment_id
                )));
            }
        }

        if let Some(entry_id) = posting.entry_id {
            let category = posting.category.as_str();
            if self
                .transactions
                .iter()
                .any(|t| t.entry_id == Some(entry_id) && t.category == category)
            {
                return Err(RepositoryError::Duplicate(format!(
                    "Entry {} already has a {} transaction",
                    entry_id, category
                )));
            }
        }

        Ok(balance_after)
    }

    fn apply_posting(&mut self, posting: &LedgerPosting) -> RepoResult<(User, Transaction)> {
        let balance_after = self.check_posting(posting)?;

        let user = self.users.get_mut(&posting.user_id).ok_or_else(|| {
            RepositoryError::NotFound(format!("User {} not found", posting.user_id))
        })?;
        user.balance = balance_after;
        user.updated_at = chrono::Utc::now().naive_utc();
        let user = user.clone();

        let transaction = posting.clone().into_transaction(balance_after);
        self.transactions.push(transaction.clone());

        Ok((user, transaction))
    }
}

/// Shared in-memory backing store
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuestionRepository for MemoryStore {
    async fn insert(&self, question: &Question) -> RepoResult<Question> {
        let mut state = self.state.lock();
        if state.questions.iter().any(|q| q.id == question.id) {
            return Err(RepositoryError::Duplicate(format!(
                "Question {} already exists",
                question.id
            )));
        }
        state.questions.push(question.clone());
        Ok(question.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Question>> {
        let state = self.state.lock();
        Ok(state.questions.iter().find(|q| q.id == id).cloned())
    }

    async fn find_all(&self) -> RepoResult<Vec<Question>> {
        let state = self.state.lock();
        Ok(state.questions.iter().rev().cloned().collect())
    }

    async fn find_pending(&self) -> RepoResult<Vec<Question>> {
        let state = self.state.lock();
        Ok(state
            .questions
            .iter()
            .rev()
            .filter(|q| q.is_pending())
            .cloned()
            .collect())
    }

    async fn update(&self, id: Uuid, patch: QuestionPatch) -> RepoResult<Question> {
        let mut state = self.state.lock();
        let stored = state.question_mut(id)?;
        if stored.is_completed() {
            return Err(RepositoryError::InvalidState(
                "This question is already completed.".to_string(),
            ));
        }

        // Validate on a copy so a rejected patch leaves the record untouched
        let mut merged = stored.clone();
        merged
            .apply_patch(patch)
            .map_err(RepositoryError::InvalidInput)?;
        *stored = merged.clone();
        Ok(merged)
    }

    async fn delete(&self, id: Uuid, now: NaiveDateTime) -> RepoResult<()> {
        let mut state = self.state.lock();
        let question = state.question(id)?;
        if question.is_completed() {
            return Err(RepositoryError::InvalidState(
                "This question is already completed.".to_string(),
            ));
        }
        if question.has_started(now) {
            return Err(RepositoryError::InvalidState(
                "This question is already started.".to_string(),
            ));
        }
        if state.entries.iter().any(|e| e.question_id == id) {
            return Err(RepositoryError::InvalidState(
                "This question already has entries.".to_string(),
            ));
        }

        state.questions.retain(|q| q.id != id);
        Ok(())
    }

    async fn mark_completed(&self, id: Uuid, answer: Answer) -> RepoResult<Question> {
        let mut state = self.state.lock();
        let question = state.question_mut(id)?;
        if question.is_completed() {
            return Err(RepositoryError::InvalidState(
                "This question is already completed.".to_string(),
            ));
        }

        question.state = QuestionState::Completed.as_str().to_string();
        question.answer = Some(answer.as_str().to_string());
        question.updated_at = chrono::Utc::now().naive_utc();
        Ok(question.clone())
    }

    async fn counts(&self) -> RepoResult<QuestionCounts> {
        let state = self.state.lock();
        Ok(QuestionCounts {
            total: state.questions.len() as i64,
            pending: state.questions.iter().filter(|q| q.is_pending()).count() as i64,
        })
    }
}

#[async_trait]
impl EntryRepository for MemoryStore {
    async fn place(&self, entry: &Entry, posting: LedgerPosting) -> RepoResult<(Entry, Transaction)> {
        let mut state = self.state.lock();
        if !state.question(entry.question_id)?.is_pending() {
            return Err(RepositoryError::InvalidState(
                "This question is already completed.".to_string(),
            ));
        }

        let posting = LedgerPosting {
            entry_id: Some(entry.id),
            ..posting
        };
        // Debit first: a failed check leaves no entry behind
        let (_, transaction) = state.apply_posting(&posting)?;
        state.entries.push(entry.clone());

        Ok((entry.clone(), transaction))
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Entry>> {
        let state = self.state.lock();
        Ok(state.entries.iter().find(|e| e.id == id).cloned())
    }

    async fn find_by_question(&self, question_id: Uuid) -> RepoResult<Vec<Entry>> {
        let state = self.state.lock();
        Ok(state
            .entries
            .iter()
            .filter(|e| e.question_id == question_id)
            .cloned()
            .collect())
    }

    async fn find_unsettled_by_question(&self, question_id: Uuid) -> RepoResult<Vec<Entry>> {
        let state = self.state.lock();
        Ok(state
            .entries
            .iter()
            .filter(|e| e.question_id == question_id && !e.is_settled())
            .cloned()
            .collect())
    }

    async fn find_by_user(&self, user_id: Uuid) -> RepoResult<Vec<Entry>> {
        let state = self.state.lock();
        Ok(state
            .entries
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_all(&self) -> RepoResult<Vec<Entry>> {
        let state = self.state.lock();
        Ok(state.entries.iter().rev().cloned().collect())
    }

    async fn count(&self) -> RepoResult<i64> {
        Ok(self.state.lock().entries.len() as i64)
    }

    async fn settle_loss(&self, entry_id: Uuid) -> RepoResult<bool> {
        let mut state = self.state.lock();
        let entry = state.entry_mut(entry_id)?;
        if entry.is_settled() {
            return Ok(false);
        }
        entry.result = EntryResult::Failed.as_str().to_string();
        entry.updated_at = chrono::Utc::now().naive_utc();
        Ok(true)
    }

    async fn settle_win(
        &self,
        entry_id: Uuid,
        win: Decimal,
        posting: LedgerPosting,
    ) -> RepoResult<Option<Transaction>> {
        let mut state = self.state.lock();
        if state.entry_mut(entry_id)?.is_settled() {
            return Ok(None);
        }

        let posting = LedgerPosting {
            entry_id: Some(entry_id),
            ..posting
        };
        let (_, transaction) = state.apply_posting(&posting)?;

        let entry = state.entry_mut(entry_id)?;
        entry.result = EntryResult::Success.as_str().to_string();
        entry.win = win;
        entry.updated_at = chrono::Utc::now().naive_utc();

        Ok(Some(transaction))
    }
}

#[async_trait]
impl LedgerRepository for MemoryStore {
    async fn create_user(&self, username: &str, role: Role) -> RepoResult<User> {
        let mut state = self.state.lock();
        if state.users.values().any(|u| u.username == username) {
            return Err(RepositoryError::Duplicate(format!(
                "Username {} already taken",
                username
            )));
        }
        let user = User::new(username.to_string(), role);
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.state.lock().users.get(&id).cloned())
    }

    async fn count_users(&self) -> RepoResult<i64> {
        Ok(self.state.lock().users.len() as i64)
    }

    async fn set_user_status(&self, id: Uuid, status: UserStatus) -> RepoResult<User> {
        let mut state = self.state.lock();
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("User {} not found", id)))?;
        user.status = status.as_str().to_string();
        user.updated_at = chrono::Utc::now().naive_utc();
        Ok(user.clone())
    }

    async fn apply(&self, posting: LedgerPosting) -> RepoResult<(User, Transaction)> {
        self.state.lock().apply_posting(&posting)
    }

    async fn find_transactions_by_user(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
    ) -> RepoResult<Vec<Transaction>> {
        let state = self.state.lock();
        let take = limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        Ok(state
            .transactions
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .take(take)
            .cloned()
            .collect())
    }

    async fn find_all_transactions(&self, limit: Option<i64>) -> RepoResult<Vec<Transaction>> {
        let state = self.state.lock();
        let take = limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        Ok(state.transactions.iter().rev().take(take).cloned().collect())
    }

    async fn totals_by_category(
        &self,
        user_id: Option<Uuid>,
    ) -> RepoResult<HashMap<TransactionCategory, Decimal>> {
        let state = self.state.lock();
        let mut totals = HashMap::new();
        for tx in state
            .transactions
            .iter()
            .filter(|t| user_id.map_or(true, |u| t.user_id == u))
        {
            if let Some(category) = tx.category_enum() {
                *totals.entry(category).or_insert(Decimal::ZERO) += tx.amount;
            }
        }
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentReference;

    fn posting(user_id: Uuid, category: TransactionCategory, amount: i64) -> LedgerPosting {
        LedgerPosting {
            user_id,
            category,
            amount: Decimal::new(amount, 0),
            message: "test".to_string(),
            question_id: None,
            entry_id: None,
            payment: PaymentReference::default(),
        }
    }

    #[tokio::test]
    async fn test_debit_below_zero_is_rejected_without_side_effects() {
        let store = MemoryStore::new();
        let user = store.create_user("alice", Role::User).await.unwrap();
        store
            .apply(posting(user.id, TransactionCategory::Deposit, 10))
            .await
            .unwrap();

        let err = store
            .apply(posting(user.id, TransactionCategory::Withdraw, 11))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InsufficientFunds(_)));

        let user = store.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(user.balance, Decimal::new(10, 0));
        assert_eq!(
            store.find_transactions_by_user(user.id, None).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_duplicate_payment_id_is_rejected() {
        let store = MemoryStore::new();
        let user = store.create_user("bob", Role::User).await.unwrap();
        let mut deposit = posting(user.id, TransactionCategory::Deposit, 10);
        deposit.payment.provider_payment_id = Some("pay_1".to_string());

        store.apply(deposit.clone()).await.unwrap();
        let err = store.apply(deposit).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_overflowing_credit_is_rejected() {
        let store = MemoryStore::new();
        let user = store.create_user("dave", Role::User).await.unwrap();
        let mut credit = posting(user.id, TransactionCategory::Deposit, 0);
        credit.amount = Decimal::MAX;

        store.apply(credit.clone()).await.unwrap();
        let err = store.apply(credit).await.unwrap_err();

        assert!(matches!(err, RepositoryError::InvalidInput(_)));
        let user = store.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(user.balance, Decimal::MAX);
    }

    #[test]
    fn test_transactions_listed_newest_first() {
        let store = MemoryStore::new();
        tokio_test::block_on(async {
            let user = store.create_user("carol", Role::User).await.unwrap();
            store
                .apply(posting(user.id, TransactionCategory::Deposit, 10))
                .await
                .unwrap();
            store
                .apply(posting(user.id, TransactionCategory::Withdraw, 4))
                .await
                .unwrap();

            let txs = store.find_transactions_by_user(user.id, Some(1)).await.unwrap();
            assert_eq!(txs.len(), 1);
            assert_eq!(txs[0].category, "withdraw");
            assert_eq!(txs[0].balance_after, Decimal::new(6, 0));
        });
    }
}
