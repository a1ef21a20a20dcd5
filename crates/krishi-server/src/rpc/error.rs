//! Maps dispatcher and flow failures onto JSON-RPC error objects.

use krishi_core::FlowError;

use super::types::{codes, JsonRpcError};

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Flow(#[from] FlowError),
}

impl RpcError {
    pub fn code(&self) -> i64 {
        match self {
            RpcError::InvalidParams(_) => codes::INVALID_PARAMS,
            RpcError::MethodNotFound(_) => codes::METHOD_NOT_FOUND,
            RpcError::Internal(_) => codes::INTERNAL_ERROR,
            RpcError::Flow(FlowError::NotFound(_)) => codes::NOT_FOUND,
            RpcError::Flow(FlowError::InputValidation(_)) => codes::INPUT_VALIDATION,
            RpcError::Flow(FlowError::Invocation(_)) => codes::INVOCATION_FAILED,
            RpcError::Flow(FlowError::OutputValidation(_)) => codes::OUTPUT_VALIDATION,
            RpcError::Flow(FlowError::Configuration(_)) => codes::INTERNAL_ERROR,
        }
    }
}

impl From<&RpcError> for JsonRpcError {
    fn from(err: &RpcError) -> Self {
        let error = JsonRpcError::new(err.code(), err.to_string());
        match err {
            RpcError::Flow(e) => error.with_data(e.to_json()),
            _ => error,
        }
    }
}
