use crate::error::{AppError, AppResult};
use crate::models::{PaymentReference, Transaction, TransactionCategory};
use crate::repositories::LedgerRepository;
use crate::services::balance_guard::{AppliedDelta, BalanceGuard};
use crate::services::payment::{from_minor_units, PaymentProvider, PaymentVerifier, ProviderOrder};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Provider callback payload for a completed deposit
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositVerification {
    pub order_creation_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_order_id: String,
    pub razorpay_signature: String,
    pub amount: Option<Decimal>,
}

/// A user's balance and ledger, newest first
#[derive(Debug, Clone)]
pub struct Wallet {
    pub balance: Decimal,
    pub transactions: Vec<Transaction>,
}

/// Deposits, withdrawals, penalties and ledger views
pub struct WalletService {
    ledger: Arc<dyn LedgerRepository>,
    guard: Arc<BalanceGuard>,
    provider: Arc<dyn PaymentProvider>,
    verifier: PaymentVerifier,
}

impl WalletService {
    pub fn new(
        ledger: Arc<dyn LedgerRepository>,
        guard: Arc<BalanceGuard>,
        provider: Arc<dyn PaymentProvider>,
        verifier: PaymentVerifier,
    ) -> Self {
        Self {
            ledger,
            guard,
            provider,
            verifier,
        }
    }

    /// First deposit phase: create a provider order. No balance effect.
    pub async fn deposit(&self, user_id: Uuid, amount: Option<Decimal>) -> AppResult<ProviderOrder> {
        let amount = BalanceGuard::validate_amount(amount)?;
        self.guard.require_active(user_id).await?;
        let receipt = format!("rcpt_{}", Uuid::new_v4().simple());

        info!("Creating deposit order of {} for user {}", amount, user_id);
        self.provider.create_order(amount, &receipt).await
    }

    /// Second deposit phase: verify the provider signature, then credit the
    /// amount the provider holds for the order. A client-supplied amount is
    /// only cross-checked, never trusted.
    pub async fn verify(&self, user_id: Uuid, request: DepositVerification) -> AppResult<AppliedDelta> {
        let signed = if request.razorpay_order_id != request.order_creation_id {
            Err(AppError::Security("Transaction not legit!".to_string()))
        } else {
            self.verifier.verify(
                &request.order_creation_id,
                &request.razorpay_payment_id,
                &request.razorpay_signature,
            )
        };
        if let Err(e) = signed {
            warn!(
                "Rejected deposit callback for user {} (order {})",
                user_id, request.order_creation_id
            );
            return Err(e);
        }

        self.guard.require_active(user_id).await?;

        let order = self.provider.fetch_order(&request.order_creation_id).await?;
        let amount = from_minor_units(order.amount);
        if let Some(claimed) = request.amount {
            if claimed != amount {
                warn!(
                    "Deposit callback for order {} claims {} but the order is for {}",
                    order.id, claimed, amount
                );
                return Err(AppError::Security(
                    "Deposit amount does not match the order.".to_string(),
                ));
            }
        }

        let payment = PaymentReference {
            order_id: Some(request.order_creation_id),
            provider_order_id: Some(request.razorpay_order_id),
            provider_payment_id: Some(request.razorpay_payment_id),
            provider_signature: Some(request.razorpay_signature),
        };
        let posting = BalanceGuard::posting(
            user_id,
            TransactionCategory::Deposit,
            Some(amount),
            format!("{} INR deposited", amount),
            payment,
        )?;

        self.guard.apply_delta(posting).await
    }

    /// Debit the caller's balance; never below zero
    pub async fn withdraw(&self, user_id: Uuid, amount: Option<Decimal>) -> AppResult<AppliedDelta> {
        let amount = BalanceGuard::validate_amount(amount)?;
        self.guard.require_active(user_id).await?;
        let posting = BalanceGuard::posting(
            user_id,
            TransactionCategory::Withdraw,
            Some(amount),
            format!("{} INR withdrawn", amount),
            PaymentReference::default(),
        )?;

        self.guard.apply_delta(posting).await
    }

    /// Admin-imposed debit; never below zero
    pub async fn penalty(&self, user_id: Uuid, amount: Option<Decimal>) -> AppResult<AppliedDelta> {
        let amount = amount
            .ok_or_else(|| AppError::Validation("Penalty amount is required.".to_string()))?;
        let posting = BalanceGuard::posting(
            user_id,
            TransactionCategory::Penalty,
            Some(amount),
            format!("{} INR penalty deducted", amount),
            PaymentReference::default(),
        )?;

        self.guard.apply_delta(posting).await
    }

    pub async fn wallet(&self, user_id: Uuid, limit: Option<i64>) -> AppResult<Wallet> {
        let user = self
            .ledger
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        let transactions = self.ledger.find_transactions_by_user(user_id, limit).await?;

        Ok(Wallet {
            balance: user.balance,
            transactions,
        })
    }

    pub async fn all_transactions(&self, limit: Option<i64>) -> AppResult<Vec<Transaction>> {
        Ok(self.ledger.find_all_transactions(limit).await?)
    }
}
