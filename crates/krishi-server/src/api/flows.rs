//! Flow endpoints.
//!
//! - `GET  /api/flows`               — names and descriptions
//! - `GET  /api/flows/{name}`        — definition with input/output JSON Schemas
//! - `POST /api/flows/{name}`        — run the flow; body is the raw input object
//! - `POST /api/flows/{name}/render` — dry run; returns the rendered request
//!
//! Errors use `FlowError`'s response mapping:
//! `{ "error": { "code", "message", "field"? } }` with 404 / 422 / 502 / 500.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;

use krishi_core::error::{FlowError, ValidationError, ValidationReason};
use krishi_core::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_flows))
        .route("/{name}", get(get_flow).post(run_flow))
        .route("/{name}/render", post(render_flow))
}

async fn list_flows(State(state): State<AppState>) -> Json<Value> {
    let flows: Vec<Value> = state
        .registry
        .flows()
        .iter()
        .map(|f| {
            serde_json::json!({
                "name": f.name(),
                "description": f.description(),
            })
        })
        .collect();
    Json(serde_json::json!({ "flows": flows }))
}

async fn get_flow(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, FlowError> {
    let flow = state.registry.lookup(&name)?;
    Ok(Json(flow.describe()))
}

async fn run_flow(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, FlowError> {
    let input = json_body(body)?;
    let output = state.executor.execute(&name, input).await?;
    Ok(Json(output))
}

async fn render_flow(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, FlowError> {
    let input = json_body(body)?;
    let rendered = state.executor.render(&name, &input)?;
    Ok(Json(rendered.summary()))
}

/// A body that is not JSON is reported like any other input violation.
fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, FlowError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        FlowError::InputValidation(ValidationError {
            path: String::new(),
            expected: "JSON object".to_string(),
            reason: ValidationReason::WrongKind {
                found: rejection.body_text(),
            },
        })
    })
}
