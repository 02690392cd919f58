//! Ledger models: transactions and the postings that produce them

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Category of a monetary movement; determines the sign of the amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionCategory {
    Deposit,
    Withdraw,
    Bet,
    Win,
    Penalty,
    Refund,
}

impl TransactionCategory {
    pub const ALL: [TransactionCategory; 6] = [
        Self::Deposit,
        Self::Withdraw,
        Self::Bet,
        Self::Win,
        Self::Penalty,
        Self::Refund,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::Bet => "bet",
            Self::Win => "win",
            Self::Penalty => "penalty",
            Self::Refund => "refund",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(Self::Deposit),
            "withdraw" => Some(Self::Withdraw),
            "bet" => Some(Self::Bet),
            "win" => Some(Self::Win),
            "penalty" => Some(Self::Penalty),
            "refund" => Some(Self::Refund),
            _ => None,
        }
    }

    /// Deposits, wins and refunds add to the balance
    pub fn is_credit(&self) -> bool {
        matches!(self, Self::Deposit | Self::Win | Self::Refund)
    }

    /// Apply the category's sign to a positive amount
    pub fn signed(&self, amount: Decimal) -> Decimal {
        if self.is_credit() {
            amount
        } else {
            -amount
        }
    }
}

/// Payment-provider correlation data carried by deposits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReference {
    pub order_id: Option<String>,
    pub provider_order_id: Option<String>,
    pub provider_payment_id: Option<String>,
    pub provider_signature: Option<String>,
}

/// A balance delta not yet applied. Built and validated by the balance guard,
/// applied by a repository together with its balance update.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerPosting {
    pub user_id: Uuid,
    pub category: TransactionCategory,
    pub amount: Decimal,
    pub message: String,
    pub question_id: Option<Uuid>,
    pub entry_id: Option<Uuid>,
    pub payment: PaymentReference,
}

impl LedgerPosting {
    /// Signed change to the balance
    pub fn delta(&self) -> Decimal {
        self.category.signed(self.amount)
    }

    /// Materialize the ledger row for this posting at `balance_after`
    pub fn into_transaction(self, balance_after: Decimal) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            amount: self.amount,
            message: self.message,
            category: self.category.as_str().to_string(),
            balance_after,
            question_id: self.question_id,
            entry_id: self.entry_id,
            order_id: self.payment.order_id,
            provider_order_id: self.payment.provider_order_id,
            provider_payment_id: self.payment.provider_payment_id,
            provider_signature: self.payment.provider_signature,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

/// Immutable record of one monetary movement
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub message: String,
    pub category: String,
    pub balance_after: Decimal,
    pub question_id: Option<Uuid>,
    pub entry_id: Option<Uuid>,
    pub order_id: Option<String>,
    pub provider_order_id: Option<String>,
    pub provider_payment_id: Option<String>,
    pub provider_signature: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Transaction {
    pub fn category_enum(&self) -> Option<TransactionCategory> {
        TransactionCategory::from_str(&self.category)
    }

    /// Amount with the category's sign; unknown categories count as zero
    pub fn signed_amount(&self) -> Decimal {
        self.category_enum()
            .map(|c| c.signed(self.amount))
            .unwrap_or(Decimal::ZERO)
    }
}

/// Sum of signed amounts, the balance a ledger implies
pub fn ledger_sum<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Decimal {
    transactions.into_iter().map(Transaction::signed_amount).sum()
}
