//! `POST /api/rpc` — JSON-RPC 2.0 over HTTP, single or batch.
//! `GET /api/rpc/methods` — method discovery.
//!
//! The body is handed to the dispatcher as text so that malformed JSON gets
//! a JSON-RPC parse error (HTTP 200) instead of an axum rejection.

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::rpc::RpcRouter;
use krishi_core::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(call))
        .route("/methods", get(methods))
}

async fn call(State(state): State<AppState>, body: String) -> impl IntoResponse {
    let response = RpcRouter::new(state).handle_request(&body).await;
    ([(header::CONTENT_TYPE, "application/json")], response)
}

async fn methods(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "methods": RpcRouter::new(state).method_list() }))
}
