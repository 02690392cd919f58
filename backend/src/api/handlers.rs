use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::{NewQuestion, QuestionPatch, UserStatus};
use crate::repositories::LedgerRepository;
use crate::services::{DepositVerification, PlaceEntryRequest};
use crate::AppState;
use axum::extract::State;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

/// Body of deposit, withdraw and penalty requests
#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct ResultRequest {
    pub answer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: Option<UserStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "success": true,
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ===== Questions =====

pub async fn list_open_questions(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let questions = state.questions.list_open().await?;
    Ok(Json(json!({
        "success": true,
        "count": questions.len(),
        "questions": questions,
    })))
}

pub async fn get_open_question(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    let question = state.questions.get_open(id).await?;
    Ok(Json(json!({ "success": true, "question": question })))
}

pub async fn create_question(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(body): ApiJson<NewQuestion>,
) -> AppResult<Json<Value>> {
    user.require_admin()?;
    let question = state.questions.create(user.id, body).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Question created.",
        "question": question,
    })))
}

pub async fn update_question(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<QuestionPatch>,
) -> AppResult<Json<Value>> {
    user.require_admin()?;
    let question = state.questions.update(id, body).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Question updated.",
        "question": question,
    })))
}

pub async fn delete_question(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    user.require_admin()?;
    state.questions.delete(id).await?;
    Ok(Json(json!({ "success": true, "message": "Question deleted." })))
}

pub async fn declare_result(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ResultRequest>,
) -> AppResult<Json<Value>> {
    user.require_admin()?;
    let answer = body.answer.unwrap_or_default();
    let report = state
        .settlement
        .declare_result(id, &answer, Some(user.id))
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": report.message,
        "fundsDistributed": report.funds_distributed,
        "report": report,
    })))
}

pub async fn admin_list_questions(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<Value>> {
    user.require_admin()?;
    let questions = state.questions.list_all().await?;
    Ok(Json(json!({
        "success": true,
        "count": questions.len(),
        "questions": questions,
    })))
}

pub async fn admin_get_question(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    user.require_admin()?;
    let question = state.questions.get(id).await?;
    let entries = state.wagers.entries_for_question(id).await?;
    Ok(Json(json!({
        "success": true,
        "question": question,
        "entries": entries,
    })))
}

pub async fn reconcile_question(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    user.require_admin()?;
    let report = state.settlement.reconcile(id).await?;
    Ok(Json(json!({
        "success": true,
        "message": report.message,
        "report": report,
    })))
}

// ===== Entries =====

pub async fn place_entry(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<PlaceEntryRequest>,
) -> AppResult<Json<Value>> {
    let placed = state.wagers.place_entry(user.id, id, body).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Entry placed.",
        "entry": placed.entry,
        "balance": placed.transaction.balance_after,
    })))
}

pub async fn my_entries(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<Value>> {
    let entries = state.wagers.my_entries(user.id).await?;
    Ok(Json(json!({
        "success": true,
        "count": entries.len(),
        "entries": entries,
    })))
}

pub async fn all_entries(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<Value>> {
    user.require_admin()?;
    let entries = state.wagers.all_entries().await?;
    Ok(Json(json!({
        "success": true,
        "count": entries.len(),
        "entries": entries,
    })))
}

// ===== Wallet =====

pub async fn deposit(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(body): ApiJson<AmountRequest>,
) -> AppResult<Json<Value>> {
    let order = state.wallet.deposit(user.id, body.amount).await?;
    Ok(Json(json!({ "success": true, "order": order })))
}

pub async fn verify_deposit(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(body): ApiJson<DepositVerification>,
) -> AppResult<Json<Value>> {
    let order_id = body.razorpay_order_id.clone();
    let payment_id = body.razorpay_payment_id.clone();
    let applied = state.wallet.verify(user.id, body).await?;

    Ok(Json(json!({
        "success": true,
        "message": "success",
        "orderId": order_id,
        "paymentId": payment_id,
        "balance": applied.balance(),
    })))
}

pub async fn withdraw(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(body): ApiJson<AmountRequest>,
) -> AppResult<Json<Value>> {
    let applied = state.wallet.withdraw(user.id, body.amount).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Withdrawal successful.",
        "balance": applied.balance(),
    })))
}

pub async fn penalty(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<AmountRequest>,
) -> AppResult<Json<Value>> {
    user.require_admin()?;
    let applied = state.wallet.penalty(user_id, body.amount).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Penalty amount deducted.",
        "balance": applied.balance(),
    })))
}

pub async fn wallet(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> AppResult<Json<Value>> {
    let wallet = state.wallet.wallet(user.id, query.limit).await?;
    Ok(Json(json!({
        "success": true,
        "amount": wallet.balance,
        "count": wallet.transactions.len(),
        "transactions": wallet.transactions,
    })))
}

pub async fn all_transactions(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> AppResult<Json<Value>> {
    user.require_admin()?;
    let transactions = state.wallet.all_transactions(query.limit).await?;
    Ok(Json(json!({
        "success": true,
        "count": transactions.len(),
        "transactions": transactions,
    })))
}

// ===== Dashboards =====

pub async fn user_dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<Value>> {
    let dashboard = state.dashboard.user_dashboard(user.id).await?;
    Ok(Json(json!({ "success": true, "dashboard": dashboard })))
}

pub async fn admin_dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<Value>> {
    user.require_admin()?;
    let dashboard = state.dashboard.admin_dashboard().await?;
    Ok(Json(json!({ "success": true, "dashboard": dashboard })))
}

pub async fn set_user_status(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> AppResult<Json<Value>> {
    user.require_admin()?;
    let status = body
        .status
        .ok_or_else(|| AppError::Validation("Status is required.".to_string()))?;
    let updated = state.repositories.ledger.set_user_status(user_id, status).await?;
    info!("User {} is now {}", user_id, status.as_str());
    Ok(Json(json!({ "success": true, "user": updated })))
}

pub async fn ledger_audit(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(user_id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    user.require_admin()?;
    let audit = state.guard.audit(user_id).await?;
    Ok(Json(json!({ "success": true, "audit": audit })))
}
