//! Transport-agnostic JSON-RPC 2.0 dispatcher.
//!
//! `RpcRouter` takes an `AppState` and dispatches incoming JSON-RPC requests
//! to the flow methods. It has no HTTP dependency, so it serves the axum
//! endpoint and any other transport alike.

use serde::Serialize;
use serde_json::Value;

use krishi_core::state::AppState;

use super::error::RpcError;
use super::methods;
use super::types::{codes, JsonRpcError, JsonRpcRequest, JsonRpcResponse, VERSION};

const METHODS: &[&str] = &["flows.list", "flows.get", "flows.run", "flows.render"];

#[derive(Clone)]
pub struct RpcRouter {
    state: AppState,
}

impl RpcRouter {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Handle a raw JSON string (single request or batch) and return the
    /// serialized response.
    pub async fn handle_request(&self, raw: &str) -> String {
        let response = match serde_json::from_str::<Value>(raw) {
            Ok(value) => self.handle_value(value).await,
            Err(e) => to_json(JsonRpcResponse::failure(
                None,
                JsonRpcError::new(codes::PARSE_ERROR, format!("Parse error: {}", e)),
            )),
        };
        response.to_string()
    }

    /// Handle a pre-parsed value. Arrays are treated as batches.
    pub async fn handle_value(&self, value: Value) -> Value {
        if let Value::Array(items) = value {
            if items.is_empty() {
                return to_json(JsonRpcResponse::failure(
                    None,
                    JsonRpcError::new(codes::INVALID_REQUEST, "Empty batch"),
                ));
            }
            let mut responses = Vec::with_capacity(items.len());
            for item in items {
                responses.push(to_json(self.dispatch_value(item).await));
            }
            return Value::Array(responses);
        }
        to_json(self.dispatch_value(value).await)
    }

    async fn dispatch_value(&self, value: Value) -> JsonRpcResponse {
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(req) => self.dispatch(req).await,
            Err(e) => JsonRpcResponse::failure(
                None,
                JsonRpcError::new(codes::INVALID_REQUEST, format!("Invalid request: {}", e)),
            ),
        }
    }

    /// Dispatch a parsed JSON-RPC request to the correct method handler.
    pub async fn dispatch(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        if req.jsonrpc != VERSION {
            return JsonRpcResponse::failure(
                req.id,
                JsonRpcError::new(
                    codes::INVALID_REQUEST,
                    format!("Unsupported JSON-RPC version '{}'", req.jsonrpc),
                ),
            );
        }

        match self.route(&req.method, req.params).await {
            Ok(result) => JsonRpcResponse::success(req.id, result),
            Err(err) => {
                tracing::debug!("[RPC] {} failed: {}", req.method, err);
                JsonRpcResponse::failure(req.id, JsonRpcError::from(&err))
            }
        }
    }

    async fn route(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "flows.list" => result_value(methods::list(&self.state).await?),
            "flows.get" => {
                let p = parse_params(params)?;
                result_value(methods::get(&self.state, p).await?)
            }
            "flows.run" => {
                let p = parse_params(params)?;
                result_value(methods::run(&self.state, p).await?)
            }
            "flows.render" => {
                let p = parse_params(params)?;
                result_value(methods::render(&self.state, p).await?)
            }
            _ => Err(RpcError::MethodNotFound(method.to_string())),
        }
    }

    /// All supported RPC method names.
    pub fn method_list(&self) -> Vec<&'static str> {
        METHODS.to_vec()
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, RpcError> {
    serde_json::from_value(value).map_err(|e| RpcError::InvalidParams(e.to_string()))
}

fn result_value<T: Serialize>(result: T) -> Result<Value, RpcError> {
    serde_json::to_value(result)
        .map_err(|e| RpcError::Internal(format!("Failed to serialize result: {}", e)))
}

fn to_json(response: JsonRpcResponse) -> Value {
    serde_json::to_value(response).unwrap_or_else(|_| {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": null,
            "error": { "code": codes::INTERNAL_ERROR, "message": "Failed to serialize response" }
        })
    })
}
