pub mod flows;
pub mod rpc;

use axum::Router;

use krishi_core::state::AppState;

/// Build the complete API router with all sub-routes.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/api/flows", flows::router())
        .nest("/api/rpc", rpc::router())
}
