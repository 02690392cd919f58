use crate::error::{AppError, AppResult};
use crate::models::{Answer, Entry, Transaction};
use crate::repositories::{EntryRepository, QuestionRepository};
use crate::services::{AuditTrailService, BalanceGuard};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Wager request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaceEntryRequest {
    pub bet: Option<Decimal>,
    pub answer: Option<String>,
}

/// A stored entry and the `bet` transaction that paid for it
#[derive(Debug, Clone)]
pub struct PlacedEntry {
    pub entry: Entry,
    pub transaction: Transaction,
}

/// Wager Book: validates and records entries
pub struct WagerService {
    questions: Arc<dyn QuestionRepository>,
    entries: Arc<dyn EntryRepository>,
    guard: Arc<BalanceGuard>,
    audit: Arc<AuditTrailService>,
}

impl WagerService {
    pub fn new(
        questions: Arc<dyn QuestionRepository>,
        entries: Arc<dyn EntryRepository>,
        guard: Arc<BalanceGuard>,
        audit: Arc<AuditTrailService>,
    ) -> Self {
        Self {
            questions,
            entries,
            guard,
            audit,
        }
    }

    /// Place an entry
    pub async fn place_entry(
        &self,
        user_id: Uuid,
        question_id: Uuid,
        request: PlaceEntryRequest,
    ) -> AppResult<PlacedEntry> {
        info!(
            "Placing entry: user={}, question={}, bet={:?}, answer={:?}",
            user_id, question_id, request.bet, request.answer
        );

        let question = self
            .questions
            .find_by_id(question_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Question {} not found", question_id)))?;

        if question.is_completed() {
            return Err(AppError::InvalidState(
                "This question is already completed.".to_string(),
            ));
        }

        let now = chrono::Utc::now().naive_utc();
        if !question.is_open_at(now) {
            return Err(AppError::InvalidState(
                "Betting is not open for this question.".to_string(),
            ));
        }

        let bet = request
            .bet
            .filter(|b| !b.is_zero())
            .ok_or_else(|| AppError::Validation("Bet amount is required.".to_string()))?;

        if !question.accepts_bet(bet) {
            return Err(AppError::Validation(format!(
                "Bet must be between {} and {}.",
                question.min_bet, question.max_bet
            )));
        }

        let answer = request
            .answer
            .as_deref()
            .and_then(Answer::parse)
            .ok_or_else(|| AppError::Validation("Answer must be yes or no.".to_string()))?;

        self.guard.require_active(user_id).await?;

        let entry = Entry::new(user_id, question_id, bet, answer);
        let posting = BalanceGuard::bet_posting(user_id, question_id, bet)?;

        let (entry, transaction) = match self.entries.place(&entry, posting).await {
            Ok(placed) => placed,
            Err(e) => {
                warn!("Entry on question {} by user {} rejected: {}", question_id, user_id, e);
                return Err(e.into());
            }
        };

        self.guard.record(&transaction).await;
        self.audit.log_entry_placed(&entry).await;

        info!(
            "Entry {} placed: {} on '{}' (balance now {})",
            entry.id, entry.bet, entry.answer, transaction.balance_after
        );
        Ok(PlacedEntry { entry, transaction })
    }

    /// A user's entries, newest first
    pub async fn my_entries(&self, user_id: Uuid) -> AppResult<Vec<Entry>> {
        Ok(self.entries.find_by_user(user_id).await?)
    }

    /// Every entry, newest first
    pub async fn all_entries(&self) -> AppResult<Vec<Entry>> {
        Ok(self.entries.find_all().await?)
    }

    /// Entries placed against one question
    pub async fn entries_for_question(&self, question_id: Uuid) -> AppResult<Vec<Entry>> {
        Ok(self.entries.find_by_question(question_id).await?)
    }
}
