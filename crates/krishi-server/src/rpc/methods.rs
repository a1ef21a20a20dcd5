//! RPC methods for flows.
//!
//! Methods:
//! - `flows.list`   — names and descriptions of registered flows
//! - `flows.get`    — one flow's definition with JSON Schemas
//! - `flows.run`    — execute a flow
//! - `flows.render` — dry run: validate and render without calling the model

use serde::{Deserialize, Serialize};
use serde_json::Value;

use krishi_core::state::AppState;

use super::error::RpcError;

// ---------------------------------------------------------------------------
// flows.list
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct FlowSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResult {
    pub flows: Vec<FlowSummary>,
}

pub async fn list(state: &AppState) -> Result<ListResult, RpcError> {
    let flows = state
        .registry
        .flows()
        .iter()
        .map(|f| FlowSummary {
            name: f.name().to_string(),
            description: f.description().map(str::to_string),
        })
        .collect();
    Ok(ListResult { flows })
}

// ---------------------------------------------------------------------------
// flows.get
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GetParams {
    pub name: String,
}

pub async fn get(state: &AppState, params: GetParams) -> Result<Value, RpcError> {
    Ok(state.registry.lookup(&params.name)?.describe())
}

// ---------------------------------------------------------------------------
// flows.run / flows.render
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RunParams {
    pub name: String,
    #[serde(default = "empty_object")]
    pub input: Value,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Serialize)]
pub struct RunResult {
    pub output: Value,
}

pub async fn run(state: &AppState, params: RunParams) -> Result<RunResult, RpcError> {
    let output = state.executor.execute(&params.name, params.input).await?;
    Ok(RunResult { output })
}

pub async fn render(state: &AppState, params: RunParams) -> Result<Value, RpcError> {
    let rendered = state.executor.render(&params.name, &params.input)?;
    Ok(rendered.summary())
}
