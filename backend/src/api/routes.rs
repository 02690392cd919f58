use super::handlers;
use crate::AppState;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let questions = Router::new()
        .route("/questions", get(handlers::list_open_questions))
        .route("/question", post(handlers::create_question))
        .route(
            "/question/:id",
            get(handlers::get_open_question)
                .put(handlers::update_question)
                .delete(handlers::delete_question),
        )
        .route("/question/:id/result", post(handlers::declare_result))
        .route("/question/:id/entries", post(handlers::place_entry))
        .route("/entries/me", get(handlers::my_entries))
        .route("/entries", get(handlers::all_entries));

    let wallet = Router::new()
        .route("/deposit", post(handlers::deposit))
        .route("/verify", post(handlers::verify_deposit))
        .route("/withdraw", post(handlers::withdraw))
        .route("/penalty/:user_id", post(handlers::penalty))
        .route("/wallet", get(handlers::wallet))
        .route("/all-transactions", get(handlers::all_transactions));

    let dashboards = Router::new()
        .route("/dashboard", get(handlers::user_dashboard))
        .route("/admin/dashboard", get(handlers::admin_dashboard))
        .route("/admin/questions", get(handlers::admin_list_questions))
        .route("/admin/question/:id", get(handlers::admin_get_question))
        .route(
            "/admin/question/:id/reconcile",
            post(handlers::reconcile_question),
        )
        .route("/admin/ledger/:user_id", get(handlers::ledger_audit))
        .route("/admin/user/:user_id/status", post(handlers::set_user_status));

    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(questions)
        .merge(wallet)
        .merge(dashboards)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
