use crate::error::{AppError, AppResult};
use crate::models::{Entry, Transaction, TransactionCategory};
use crate::repositories::{EntryRepository, LedgerRepository, QuestionCounts, QuestionRepository};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

const RECENT_LIMIT: usize = 5;

/// Per-category totals keyed by the category's wire name
pub type CategoryTotals = BTreeMap<&'static str, Decimal>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDashboard {
    pub balance: Decimal,
    pub totals: CategoryTotals,
    pub total_staked: Decimal,
    pub total_won: Decimal,
    pub entries: usize,
    pub pending_entries: usize,
    pub recent_entries: Vec<Entry>,
    pub recent_transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboard {
    pub totals: CategoryTotals,
    pub total_questions: i64,
    pub pending_questions: i64,
    pub total_entries: i64,
    pub total_users: i64,
    pub recent_transactions: Vec<Transaction>,
}

pub struct DashboardService {
    questions: Arc<dyn QuestionRepository>,
    entries: Arc<dyn EntryRepository>,
    ledger: Arc<dyn LedgerRepository>,
}

/// Fill in zero for categories with no transactions
fn complete_totals(totals: HashMap<TransactionCategory, Decimal>) -> CategoryTotals {
    TransactionCategory::ALL
        .iter()
        .map(|c| (c.as_str(), totals.get(c).copied().unwrap_or(Decimal::ZERO)))
        .collect()
}

impl DashboardService {
    pub fn new(
        questions: Arc<dyn QuestionRepository>,
        entries: Arc<dyn EntryRepository>,
        ledger: Arc<dyn LedgerRepository>,
    ) -> Self {
        Self {
            questions,
            entries,
            ledger,
        }
    }

    pub async fn user_dashboard(&self, user_id: Uuid) -> AppResult<UserDashboard> {
        let user = self
            .ledger
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        let totals = complete_totals(self.ledger.totals_by_category(Some(user_id)).await?);
        let entries = self.entries.find_by_user(user_id).await?;
        let recent_transactions = self
            .ledger
            .find_transactions_by_user(user_id, Some(RECENT_LIMIT as i64))
            .await?;

        Ok(UserDashboard {
            balance: user.balance,
            totals,
            total_staked: entries.iter().map(|e| e.bet).sum(),
            total_won: entries.iter().map(|e| e.win).sum(),
            entries: entries.len(),
            pending_entries: entries.iter().filter(|e| !e.is_settled()).count(),
            recent_entries: entries.into_iter().take(RECENT_LIMIT).collect(),
            recent_transactions,
        })
    }

    pub async fn admin_dashboard(&self) -> AppResult<AdminDashboard> {
        let QuestionCounts { total, pending } = self.questions.counts().await?;

        Ok(AdminDashboard {
            totals: complete_totals(self.ledger.totals_by_category(None).await?),
            total_questions: total,
            pending_questions: pending,
            total_entries: self.entries.count().await?,
            total_users: self.ledger.count_users().await?,
            recent_transactions: self
                .ledger
                .find_all_transactions(Some(RECENT_LIMIT as i64))
                .await?,
        })
    }
}
