//! REST API routes configuration

use crate::api::handlers::{self, ApiState};
use crate::api::websocket::ws_handler;
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

/// JSON 404 for unknown routes
async fn fallback_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "application/json")],
        Body::from(r#"{"error":"Not Found"}"#),
    )
}

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    // Configure CORS for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // WebSocket for real-time updates
        .route("/ws", get(ws_handler))
        // Wallet
        .route("/api/wallet", get(handlers::get_wallet))
        .route("/api/wallet/owners", get(handlers::get_owners))
        .route("/api/wallet/deposit", post(handlers::deposit))
        // Transactions
        .route(
            "/api/transactions",
            get(handlers::list_transactions).post(handlers::submit_transaction),
        )
        .route("/api/transactions/{index}", get(handlers::get_transaction))
        .route(
            "/api/transactions/{index}/confirm",
            post(handlers::confirm_transaction),
        )
        .route(
            "/api/transactions/{index}/revoke",
            post(handlers::revoke_confirmation),
        )
        .route(
            "/api/transactions/{index}/execute",
            post(handlers::execute_transaction),
        )
        .route(
            "/api/transactions/{index}/confirmations/{owner}",
            get(handlers::is_confirmed),
        )
        .fallback(fallback_handler)
        // Add state and middleware
        .with_state(state)
        .layer(cors)
}
