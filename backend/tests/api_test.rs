mod helpers;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use helpers::*;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use yesno_backend::api::create_router;
use yesno_backend::models::Role;

fn router(ctx: &TestContext) -> Router {
    create_router(ctx.state.clone())
}

fn token(ctx: &TestContext, user_id: Uuid, role: Role) -> String {
    ctx.state.jwt.issue_token(user_id, role).unwrap()
}

async fn send(
    app: Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header("Authorization", format!("Bearer {}", token));
    }
    let body = match body {
        Some(value) => {
            request = request.header("Content-Type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app.oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let ctx = TestContext::new().await;
    let (status, body) = send(router(&ctx), "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let ctx = TestContext::new().await;
    let (status, body) = send(router(&ctx), "GET", "/wallet", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_admin_routes_reject_plain_users() {
    let ctx = TestContext::new().await;
    let user_token = token(&ctx, ctx.user.id, Role::User);

    let (status, body) = send(
        router(&ctx),
        "POST",
        "/question",
        Some(&user_token),
        Some(json!({ "question": "Sneaky?" })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_question_lifecycle_over_http() {
    let ctx = TestContext::new().await;
    ctx.fund(ctx.user.id, dec(50)).await;
    let admin_token = token(&ctx, ctx.admin.id, Role::Admin);
    let user_token = token(&ctx, ctx.user.id, Role::User);

    let starting = (now() - chrono::Duration::hours(1)).format("%Y-%m-%dT%H:%M:%S").to_string();
    let ending = (now() + chrono::Duration::hours(1)).format("%Y-%m-%dT%H:%M:%S").to_string();
    let (status, body) = send(
        router(&ctx),
        "POST",
        "/question",
        Some(&admin_token),
        Some(json!({
            "category": Uuid::new_v4(),
            "question": "Will the match end in a draw?",
            "minBet": 10,
            "maxBet": 100,
            "starting": starting,
            "ending": ending,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let question_id = body["question"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(router(&ctx), "GET", "/questions", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, body) = send(
        router(&ctx),
        "POST",
        &format!("/question/{}/entries", question_id),
        Some(&user_token),
        Some(json!({ "bet": 30, "answer": "yes" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], true);

    let (status, body) = send(
        router(&ctx),
        "POST",
        &format!("/question/{}/result", question_id),
        Some(&admin_token),
        Some(json!({ "answer": "yes" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["fundsDistributed"], true);

    let (status, body) = send(
        router(&ctx),
        "POST",
        &format!("/question/{}/result", question_id),
        Some(&admin_token),
        Some(json!({ "answer": "no" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    assert_eq!(ctx.balance(ctx.user.id).await, dec(65));

    let (status, body) = send(router(&ctx), "GET", "/entries/me", Some(&user_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"][0]["result"], "success");
}

#[tokio::test]
async fn test_withdraw_over_balance_returns_failure_body() {
    let ctx = TestContext::new().await;
    ctx.fund(ctx.user.id, dec(10)).await;
    let user_token = token(&ctx, ctx.user.id, Role::User);

    let (status, body) = send(
        router(&ctx),
        "POST",
        "/withdraw",
        Some(&user_token),
        Some(json!({ "amount": 25 })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("Insufficient"));
}

#[tokio::test]
async fn test_wallet_and_penalty_over_http() {
    let ctx = TestContext::new().await;
    ctx.fund(ctx.user.id, dec(30)).await;
    let admin_token = token(&ctx, ctx.admin.id, Role::Admin);
    let user_token = token(&ctx, ctx.user.id, Role::User);

    let (status, body) = send(
        router(&ctx),
        "POST",
        &format!("/penalty/{}", ctx.user.id),
        Some(&admin_token),
        Some(json!({ "amount": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "Penalty amount deducted.");

    let (status, body) = send(router(&ctx), "GET", "/wallet", Some(&user_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["transactions"][0]["category"], "penalty");

    let (status, body) = send(
        router(&ctx),
        "GET",
        &format!("/admin/ledger/{}", ctx.user.id),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["audit"]["consistent"], true);
}

#[tokio::test]
async fn test_tampered_verification_is_rejected_over_http() {
    let ctx = TestContext::new().await;
    let user_token = token(&ctx, ctx.user.id, Role::User);

    let (status, body) = send(
        router(&ctx),
        "POST",
        "/verify",
        Some(&user_token),
        Some(json!({
            "orderCreationId": "order_1",
            "razorpayPaymentId": "pay_1",
            "razorpayOrderId": "order_1",
            "razorpaySignature": "deadbeef",
            "amount": 50,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(ctx.balance(ctx.user.id).await, dec(0));
}

#[tokio::test]
async fn test_malformed_body_returns_failure_body() {
    let ctx = TestContext::new().await;
    ctx.fund(ctx.user.id, dec(10)).await;
    let user_token = token(&ctx, ctx.user.id, Role::User);

    let (status, body) = send(
        router(&ctx),
        "POST",
        "/withdraw",
        Some(&user_token),
        Some(json!({ "amount": "abc" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());
    assert_eq!(ctx.balance(ctx.user.id).await, dec(10));
}

#[tokio::test]
async fn test_non_uuid_path_returns_failure_body() {
    let ctx = TestContext::new().await;

    let (status, body) = send(router(&ctx), "GET", "/question/not-a-uuid", None, None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_admin_can_deactivate_an_account() {
    let ctx = TestContext::new().await;
    ctx.fund(ctx.user.id, dec(20)).await;
    let admin_token = token(&ctx, ctx.admin.id, Role::Admin);
    let user_token = token(&ctx, ctx.user.id, Role::User);

    let (status, body) = send(
        router(&ctx),
        "POST",
        &format!("/admin/user/{}/status", ctx.user.id),
        Some(&admin_token),
        Some(json!({ "status": "inactive" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["user"]["status"], "inactive");

    let (status, body) = send(
        router(&ctx),
        "POST",
        "/withdraw",
        Some(&user_token),
        Some(json!({ "amount": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert_eq!(ctx.balance(ctx.user.id).await, dec(20));
}
