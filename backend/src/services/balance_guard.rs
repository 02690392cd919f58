//! Balance Guard: the one place balance-affecting postings are built.
//!
//! Every movement of money (deposit, withdrawal, bet, win, penalty, refund)
//! is expressed as a [`LedgerPosting`] created here. Repositories apply a
//! posting as a single unit: conditional balance update plus ledger append.

use crate::error::{AppError, AppResult};
use crate::models::{
    ledger_sum, LedgerPosting, PaymentReference, Transaction, TransactionCategory, User,
};
use crate::repositories::LedgerRepository;
use crate::services::AuditTrailService;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Largest number of decimal places a client-supplied amount may carry
pub const MAX_AMOUNT_SCALE: u32 = 2;

/// Largest single amount accepted, well inside the DECIMAL(20,4) columns
pub const MAX_AMOUNT_UNITS: i64 = 1_000_000_000_000;

/// Result of a guarded balance change
#[derive(Debug, Clone)]
pub struct AppliedDelta {
    pub user: User,
    pub transaction: Transaction,
}

impl AppliedDelta {
    pub fn balance(&self) -> Decimal {
        self.user.balance
    }
}

/// Stored balance compared with what the ledger implies
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerAudit {
    pub user_id: Uuid,
    pub balance: Decimal,
    pub ledger_sum: Decimal,
    pub transactions: usize,
    pub consistent: bool,
}

pub struct BalanceGuard {
    ledger: Arc<dyn LedgerRepository>,
    audit: Arc<AuditTrailService>,
}

impl BalanceGuard {
    pub fn new(ledger: Arc<dyn LedgerRepository>, audit: Arc<AuditTrailService>) -> Self {
        Self { ledger, audit }
    }

    /// Reject absent, non-positive or over-precise amounts
    pub fn validate_amount(amount: Option<Decimal>) -> AppResult<Decimal> {
        let amount = amount
            .filter(|a| !a.is_zero())
            .ok_or_else(|| AppError::Validation("Amount is required.".to_string()))?;

        if amount.is_sign_negative() {
            return Err(AppError::Validation(
                "Amount must be greater than zero.".to_string(),
            ));
        }
        if amount > Decimal::from(MAX_AMOUNT_UNITS) {
            return Err(AppError::Validation(format!(
                "Amount must not exceed {}.",
                MAX_AMOUNT_UNITS
            )));
        }
        if amount.normalize().scale() > MAX_AMOUNT_SCALE {
            return Err(AppError::Validation(format!(
                "Amount can have at most {} decimal places.",
                MAX_AMOUNT_SCALE
            )));
        }

        Ok(amount)
    }

    /// Posting for a user-facing movement (deposit, withdraw, penalty, refund)
    pub fn posting(
        user_id: Uuid,
        category: TransactionCategory,
        amount: Option<Decimal>,
        message: impl Into<String>,
        payment: PaymentReference,
    ) -> AppResult<LedgerPosting> {
        let amount = Self::validate_amount(amount)?;
        Ok(LedgerPosting {
            user_id,
            category,
            amount,
            message: message.into(),
            question_id: None,
            entry_id: None,
            payment,
        })
    }

    /// Debit for a wager; the entry id is attached when the entry is stored
    pub fn bet_posting(user_id: Uuid, question_id: Uuid, bet: Decimal) -> AppResult<LedgerPosting> {
        let bet = Self::validate_amount(Some(bet))?;
        Ok(LedgerPosting {
            user_id,
            category: TransactionCategory::Bet,
            amount: bet,
            message: format!("Bet {} on question {}", bet, question_id),
            question_id: Some(question_id),
            entry_id: None,
            payment: PaymentReference::default(),
        })
    }

    /// Credit for a winning entry. Payouts may carry one more decimal place
    /// than the stake, so no scale check here.
    pub fn win_posting(
        user_id: Uuid,
        question_id: Uuid,
        entry_id: Uuid,
        payout: Decimal,
    ) -> LedgerPosting {
        LedgerPosting {
            user_id,
            category: TransactionCategory::Win,
            amount: payout,
            message: format!("Win {} on question {}", payout, question_id),
            question_id: Some(question_id),
            entry_id: Some(entry_id),
            payment: PaymentReference::default(),
        }
    }

    /// The account behind a user-initiated movement; inactive accounts are refused
    pub async fn require_active(&self, user_id: Uuid) -> AppResult<User> {
        let user = self
            .ledger
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        if !user.is_active() {
            warn!("Refused movement for inactive user {}", user_id);
            return Err(AppError::Forbidden("This account is inactive.".to_string()));
        }
        Ok(user)
    }

    /// Apply a standalone posting (no entry row involved)
    pub async fn apply_delta(&self, posting: LedgerPosting) -> AppResult<AppliedDelta> {
        let category = posting.category;
        let user_id = posting.user_id;

        let (user, transaction) = match self.ledger.apply(posting).await {
            Ok(applied) => applied,
            Err(e) => {
                warn!("Rejected {} posting for user {}: {}", category.as_str(), user_id, e);
                return Err(e.into());
            }
        };

        self.record(&transaction).await;
        Ok(AppliedDelta { user, transaction })
    }

    /// Log a transaction applied by a repository on the guard's behalf
    pub async fn record(&self, transaction: &Transaction) {
        info!(
            "Applied {} of {} for user {} (balance now {})",
            transaction.category, transaction.amount, transaction.user_id, transaction.balance_after
        );
        self.audit.log_balance_delta(transaction).await;
    }

    /// Recompute the signed ledger sum for a user and compare it with the balance
    pub async fn audit(&self, user_id: Uuid) -> AppResult<LedgerAudit> {
        let user = self
            .ledger
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        let transactions = self.ledger.find_transactions_by_user(user_id, None).await?;
        let sum = ledger_sum(&transactions);
        let consistent = sum == user.balance;
        if !consistent {
            warn!(
                "Ledger mismatch for user {}: balance {}, ledger {}",
                user_id, user.balance, sum
            );
        }

        Ok(LedgerAudit {
            user_id,
            balance: user.balance,
            ledger_sum: sum,
            transactions: transactions.len(),
            consistent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_amount() {
        assert!(BalanceGuard::validate_amount(None).is_err());
        assert!(BalanceGuard::validate_amount(Some(Decimal::ZERO)).is_err());
        assert!(BalanceGuard::validate_amount(Some(Decimal::new(-5, 0))).is_err());
        assert!(BalanceGuard::validate_amount(Some(Decimal::new(1005, 3))).is_err());
        assert!(BalanceGuard::validate_amount(Some(Decimal::MAX)).is_err());
        assert!(BalanceGuard::validate_amount(Some(Decimal::from(MAX_AMOUNT_UNITS))).is_ok());
        assert!(BalanceGuard::validate_amount(Some(Decimal::from(MAX_AMOUNT_UNITS + 1))).is_err());
        assert_eq!(
            BalanceGuard::validate_amount(Some(Decimal::new(1050, 3))).unwrap(),
            Decimal::new(1050, 3)
        );
    }

    #[test]
    fn test_bet_posting_is_a_debit() {
        let question = Uuid::new_v4();
        let posting = BalanceGuard::bet_posting(Uuid::new_v4(), question, Decimal::new(30, 0)).unwrap();
        assert_eq!(posting.delta(), Decimal::new(-30, 0));
        assert_eq!(posting.question_id, Some(question));
        assert!(posting.payment.provider_payment_id.is_none());
    }

    #[test]
    fn test_win_posting_accepts_three_decimal_payout() {
        let posting = BalanceGuard::win_posting(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Decimal::new(15015, 3),
        );
        assert_eq!(posting.delta(), Decimal::new(15015, 3));
    }
}
