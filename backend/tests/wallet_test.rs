mod helpers;

use helpers::*;
use rust_decimal::Decimal;
use yesno_backend::models::*;
use yesno_backend::repositories::LedgerRepository;
use yesno_backend::services::{DepositVerification, PaymentVerifier};
use yesno_backend::AppError;

fn signed_callback(order_id: &str, payment_id: &str, amount: Decimal) -> DepositVerification {
    let signature = PaymentVerifier::new(TEST_KEY_SECRET)
        .sign(order_id, payment_id)
        .unwrap();
    DepositVerification {
        order_creation_id: order_id.to_string(),
        razorpay_payment_id: payment_id.to_string(),
        razorpay_order_id: order_id.to_string(),
        razorpay_signature: signature,
        amount: Some(amount),
    }
}

#[tokio::test]
async fn test_deposit_creates_provider_order_without_credit() {
    let ctx = TestContext::new().await;

    let order = ctx
        .state
        .wallet
        .deposit(ctx.user.id, Some(Decimal::new(5050, 2)))
        .await
        .unwrap();

    assert_eq!(order.amount, 5050);
    assert_eq!(order.currency, "INR");
    assert_eq!(ctx.provider.orders.lock().len(), 1);
    assert_eq!(ctx.balance(ctx.user.id).await, Decimal::ZERO);
}

#[tokio::test]
async fn test_verified_deposit_credits_balance() {
    let ctx = TestContext::new().await;
    let order = ctx.state.wallet.deposit(ctx.user.id, Some(dec(50))).await.unwrap();

    let applied = ctx
        .state
        .wallet
        .verify(ctx.user.id, signed_callback(&order.id, "pay_1", dec(50)))
        .await
        .unwrap();

    assert_eq!(applied.balance(), dec(50));
    let tx = &applied.transaction;
    assert_eq!(tx.category, "deposit");
    assert_eq!(tx.message, "50 INR deposited");
    assert_eq!(tx.order_id.as_deref(), Some(order.id.as_str()));
    assert_eq!(tx.provider_payment_id.as_deref(), Some("pay_1"));
    ctx.assert_ledger_consistent(ctx.user.id).await;
}

#[tokio::test]
async fn test_tampered_signature_is_rejected() {
    let ctx = TestContext::new().await;
    let mut callback = signed_callback("order_1", "pay_1", dec(50));
    callback.razorpay_signature = "0".repeat(64);

    let result = ctx.state.wallet.verify(ctx.user.id, callback).await;

    assert!(matches!(result, Err(AppError::Security(_))));
    assert_eq!(ctx.balance(ctx.user.id).await, Decimal::ZERO);
    assert!(ctx.transactions(ctx.user.id).await.is_empty());
}

#[tokio::test]
async fn test_signature_over_other_payment_is_rejected() {
    let ctx = TestContext::new().await;
    let mut callback = signed_callback("order_1", "pay_1", dec(50));
    callback.razorpay_payment_id = "pay_2".to_string();

    let result = ctx.state.wallet.verify(ctx.user.id, callback).await;
    assert!(matches!(result, Err(AppError::Security(_))));
}

#[tokio::test]
async fn test_replayed_callback_credits_once() {
    let ctx = TestContext::new().await;
    let order = ctx.state.wallet.deposit(ctx.user.id, Some(dec(50))).await.unwrap();
    let callback = signed_callback(&order.id, "pay_1", dec(50));

    ctx.state
        .wallet
        .verify(ctx.user.id, callback.clone())
        .await
        .unwrap();
    let result = ctx.state.wallet.verify(ctx.user.id, callback).await;

    assert!(matches!(result, Err(AppError::InvalidState(_))));
    assert_eq!(ctx.balance(ctx.user.id).await, dec(50));
}

#[tokio::test]
async fn test_callback_for_mismatched_order_ids_is_rejected() {
    let ctx = TestContext::new().await;
    let order = ctx.state.wallet.deposit(ctx.user.id, Some(dec(50))).await.unwrap();
    let mut callback = signed_callback(&order.id, "pay_1", dec(50));
    callback.razorpay_order_id = "order_other".to_string();

    let result = ctx.state.wallet.verify(ctx.user.id, callback).await;
    assert!(matches!(result, Err(AppError::Security(_))));
    assert_eq!(ctx.balance(ctx.user.id).await, Decimal::ZERO);
}

#[tokio::test]
async fn test_deposit_credits_the_order_amount_not_the_claimed_one() {
    let ctx = TestContext::new().await;
    let order = ctx.state.wallet.deposit(ctx.user.id, Some(dec(1))).await.unwrap();

    let inflated = signed_callback(&order.id, "pay_1", dec(5000));
    let result = ctx.state.wallet.verify(ctx.user.id, inflated).await;
    assert!(matches!(result, Err(AppError::Security(_))));
    assert_eq!(ctx.balance(ctx.user.id).await, Decimal::ZERO);

    let mut unstated = signed_callback(&order.id, "pay_1", dec(1));
    unstated.amount = None;
    let applied = ctx.state.wallet.verify(ctx.user.id, unstated).await.unwrap();
    assert_eq!(applied.balance(), dec(1));
    assert_eq!(applied.transaction.message, "1 INR deposited");
}

#[tokio::test]
async fn test_callback_for_unknown_order_credits_nothing() {
    let ctx = TestContext::new().await;
    let callback = signed_callback("order_missing", "pay_1", dec(50));

    let result = ctx.state.wallet.verify(ctx.user.id, callback).await;
    assert!(matches!(result, Err(AppError::ExternalService(_))));
    assert!(ctx.transactions(ctx.user.id).await.is_empty());
}

#[tokio::test]
async fn test_oversized_deposit_is_validation_error() {
    let ctx = TestContext::new().await;

    let result = ctx.state.wallet.deposit(ctx.user.id, Some(Decimal::MAX)).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(ctx.provider.orders.lock().is_empty());
}

#[tokio::test]
async fn test_inactive_account_cannot_move_its_own_money() {
    let ctx = TestContext::new().await;
    ctx.fund(ctx.user.id, dec(50)).await;
    let question = ctx.open_question(dec(10), dec(100)).await;
    ctx.store
        .set_user_status(ctx.user.id, UserStatus::Inactive)
        .await
        .unwrap();

    let withdraw = ctx.state.wallet.withdraw(ctx.user.id, Some(dec(10))).await;
    assert!(matches!(withdraw, Err(AppError::Forbidden(_))));
    let deposit = ctx.state.wallet.deposit(ctx.user.id, Some(dec(10))).await;
    assert!(matches!(deposit, Err(AppError::Forbidden(_))));
    let bet = ctx.bet(ctx.user.id, question.id, dec(20), "yes").await;
    assert!(matches!(bet, Err(AppError::Forbidden(_))));
    assert_eq!(ctx.balance(ctx.user.id).await, dec(50));

    // Admin penalties still apply
    ctx.state.wallet.penalty(ctx.user.id, Some(dec(5))).await.unwrap();

    ctx.store
        .set_user_status(ctx.user.id, UserStatus::Active)
        .await
        .unwrap();
    let applied = ctx.state.wallet.withdraw(ctx.user.id, Some(dec(10))).await.unwrap();
    assert_eq!(applied.balance(), dec(35));
}

#[tokio::test]
async fn test_withdraw_debits_balance() {
    let ctx = TestContext::new().await;
    ctx.fund(ctx.user.id, dec(50)).await;

    let applied = ctx.state.wallet.withdraw(ctx.user.id, Some(dec(20))).await.unwrap();

    assert_eq!(applied.balance(), dec(30));
    assert_eq!(applied.transaction.category, "withdraw");
    assert_eq!(applied.transaction.message, "20 INR withdrawn");
    assert!(applied.transaction.provider_payment_id.is_none());
    ctx.assert_ledger_consistent(ctx.user.id).await;
}

#[tokio::test]
async fn test_withdraw_more_than_balance_fails_without_transaction() {
    let ctx = TestContext::new().await;
    ctx.fund(ctx.user.id, dec(50)).await;

    let result = ctx.state.wallet.withdraw(ctx.user.id, Some(dec(51))).await;

    assert!(matches!(result, Err(AppError::InsufficientFunds(_))));
    assert_eq!(ctx.transactions(ctx.user.id).await.len(), 1);
    assert_eq!(ctx.balance(ctx.user.id).await, dec(50));
}

#[tokio::test]
async fn test_withdraw_entire_balance() {
    let ctx = TestContext::new().await;
    ctx.fund(ctx.user.id, dec(50)).await;

    let applied = ctx.state.wallet.withdraw(ctx.user.id, Some(dec(50))).await.unwrap();
    assert_eq!(applied.balance(), Decimal::ZERO);
}

#[tokio::test]
async fn test_invalid_amounts_are_validation_errors() {
    let ctx = TestContext::new().await;
    ctx.fund(ctx.user.id, dec(50)).await;

    for amount in [None, Some(Decimal::ZERO), Some(dec(-5)), Some(Decimal::new(1001, 3))] {
        let result = ctx.state.wallet.withdraw(ctx.user.id, amount).await;
        assert!(matches!(result, Err(AppError::Validation(_))), "{:?}", amount);
    }
    assert_eq!(ctx.balance(ctx.user.id).await, dec(50));
}

#[tokio::test]
async fn test_penalty_debits_and_is_bounded_by_balance() {
    let ctx = TestContext::new().await;
    ctx.fund(ctx.user.id, dec(50)).await;

    let applied = ctx.state.wallet.penalty(ctx.user.id, Some(dec(10))).await.unwrap();
    assert_eq!(applied.balance(), dec(40));
    assert_eq!(applied.transaction.category, "penalty");
    assert_eq!(applied.transaction.message, "10 INR penalty deducted");

    let result = ctx.state.wallet.penalty(ctx.user.id, Some(dec(41))).await;
    assert!(matches!(result, Err(AppError::InsufficientFunds(_))));

    let result = ctx.state.wallet.penalty(ctx.user.id, None).await;
    assert!(matches!(result, Err(AppError::Validation(msg)) if msg == "Penalty amount is required."));

    ctx.assert_ledger_consistent(ctx.user.id).await;
}

#[tokio::test]
async fn test_wallet_lists_transactions_newest_first() {
    let ctx = TestContext::new().await;
    ctx.fund(ctx.user.id, dec(50)).await;
    ctx.state.wallet.withdraw(ctx.user.id, Some(dec(5))).await.unwrap();
    ctx.state.wallet.penalty(ctx.user.id, Some(dec(1))).await.unwrap();

    let wallet = ctx.state.wallet.wallet(ctx.user.id, None).await.unwrap();
    assert_eq!(wallet.balance, dec(44));
    let categories: Vec<&str> = wallet.transactions.iter().map(|t| t.category.as_str()).collect();
    assert_eq!(categories, vec!["penalty", "withdraw", "deposit"]);

    let limited = ctx.state.wallet.wallet(ctx.user.id, Some(2)).await.unwrap();
    assert_eq!(limited.transactions.len(), 2);
}

#[tokio::test]
async fn test_ledger_invariant_holds_across_every_category() {
    let ctx = TestContext::new().await;
    ctx.fund(ctx.user.id, dec(200)).await;
    let question = ctx.open_question(dec(10), dec(100)).await;
    let lost = ctx.open_question(dec(10), dec(100)).await;

    ctx.bet(ctx.user.id, question.id, dec(40), "yes").await.unwrap();
    ctx.bet(ctx.user.id, lost.id, dec(25), "yes").await.unwrap();
    ctx.state.wallet.withdraw(ctx.user.id, Some(dec(30))).await.unwrap();
    ctx.state.wallet.penalty(ctx.user.id, Some(dec(5))).await.unwrap();
    ctx.state
        .settlement
        .declare_result(question.id, "yes", None)
        .await
        .unwrap();
    ctx.state
        .settlement
        .declare_result(lost.id, "no", None)
        .await
        .unwrap();

    // 200 - 40 - 25 - 30 - 5 + 60
    assert_eq!(ctx.balance(ctx.user.id).await, dec(160));
    let audit = ctx.state.guard.audit(ctx.user.id).await.unwrap();
    assert!(audit.consistent);
    assert_eq!(audit.ledger_sum, dec(160));
    assert_eq!(audit.transactions, 6);

    let txs = ctx.transactions(ctx.user.id).await;
    assert_eq!(ledger_sum(&txs), ctx.balance(ctx.user.id).await);
}

#[tokio::test]
async fn test_dashboards_summarize_activity() {
    let ctx = TestContext::new().await;
    ctx.fund(ctx.user.id, dec(100)).await;
    let question = ctx.open_question(dec(10), dec(100)).await;
    ctx.bet(ctx.user.id, question.id, dec(40), "yes").await.unwrap();
    ctx.state
        .settlement
        .declare_result(question.id, "yes", None)
        .await
        .unwrap();
    ctx.open_question(dec(10), dec(100)).await;

    let mine = ctx.state.dashboard.user_dashboard(ctx.user.id).await.unwrap();
    assert_eq!(mine.balance, dec(120));
    assert_eq!(mine.total_staked, dec(40));
    assert_eq!(mine.total_won, dec(60));
    assert_eq!(mine.totals["deposit"], dec(100));
    assert_eq!(mine.totals["refund"], Decimal::ZERO);
    assert_eq!(mine.pending_entries, 0);

    let admin = ctx.state.dashboard.admin_dashboard().await.unwrap();
    assert_eq!(admin.total_questions, 2);
    assert_eq!(admin.pending_questions, 1);
    assert_eq!(admin.total_entries, 1);
    assert_eq!(admin.total_users, 2);
    assert_eq!(admin.totals["win"], dec(60));
}
