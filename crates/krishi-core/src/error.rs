//! Error taxonomy for the flow layer.
//!
//! `FlowError` is the discriminated result of every flow execution. Callers
//! match on its variant to decide what to show the user; nothing in the
//! executor is swallowed or downgraded. When the `axum` feature is enabled,
//! it also implements `IntoResponse` so handlers can return it directly.

use std::fmt;

use serde::Serialize;

/// Why a value failed schema validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationReason {
    /// A required field is absent (or `null`).
    Missing,
    /// The value has the wrong JSON kind.
    WrongKind { found: String },
    /// The string is not a member of the declared enum.
    NotInEnum { value: String },
    /// The string is not a well-formed `data:<mime>;base64,<payload>` reference.
    InvalidMedia { detail: String },
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationReason::Missing => write!(f, "required field is missing"),
            ValidationReason::WrongKind { found } => write!(f, "found {}", found),
            ValidationReason::NotInEnum { value } => {
                write!(f, "'{}' is not an allowed value", value)
            }
            ValidationReason::InvalidMedia { detail } => {
                write!(f, "invalid media reference: {}", detail)
            }
        }
    }
}

/// A single schema violation, located by a dotted field path
/// (`diagnosis.confidence`, `schemes[2].name`). The root value has an empty path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub path: String,
    pub expected: String,
    pub reason: ValidationReason,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() {
            "(root)"
        } else {
            &self.path
        };
        write!(f, "{}: {} (expected {})", path, self.reason, self.expected)
    }
}

impl std::error::Error for ValidationError {}

/// Classes of outbound failure. Provider-specific errors are mapped onto these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationErrorKind {
    /// Connection refused, reset, DNS, TLS.
    Transport,
    /// The request or the caller-side deadline elapsed.
    Timeout,
    /// Rate limit or quota exhausted (HTTP 429).
    Quota,
    /// The service rejected the request (other 4xx).
    Rejected,
    /// The service failed internally (5xx).
    Service,
    /// The response envelope could not be read.
    Decode,
}

impl fmt::Display for InvocationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InvocationErrorKind::Transport => "transport",
            InvocationErrorKind::Timeout => "timeout",
            InvocationErrorKind::Quota => "quota",
            InvocationErrorKind::Rejected => "rejected",
            InvocationErrorKind::Service => "service",
            InvocationErrorKind::Decode => "decode",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct InvocationError {
    pub kind: InvocationErrorKind,
    pub message: String,
}

impl InvocationError {
    pub fn new(kind: InvocationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether an identical request may succeed if sent again.
    /// Quota exhaustion and service-side rejections are not transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            InvocationErrorKind::Transport
                | InvocationErrorKind::Timeout
                | InvocationErrorKind::Service
        )
    }
}

impl From<reqwest::Error> for InvocationError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            InvocationErrorKind::Timeout
        } else if err.is_decode() {
            InvocationErrorKind::Decode
        } else {
            InvocationErrorKind::Transport
        };
        InvocationError::new(kind, err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// A flow definition is malformed. Raised at registration, fatal to startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Flow not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InputValidation(ValidationError),

    #[error("Model invocation failed: {0}")]
    Invocation(#[from] InvocationError),

    /// The service answered, but not with what the output schema promises.
    #[error("Model output does not match schema: {0}")]
    OutputValidation(ValidationError),
}

impl FlowError {
    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            FlowError::Configuration(_) => "configuration_error",
            FlowError::NotFound(_) => "not_found",
            FlowError::InputValidation(_) => "input_validation_error",
            FlowError::Invocation(_) => "invocation_error",
            FlowError::OutputValidation(_) => "output_validation_error",
        }
    }

    /// Field path for validation failures.
    pub fn field(&self) -> Option<&str> {
        match self {
            FlowError::InputValidation(e) | FlowError::OutputValidation(e) => Some(&e.path),
            _ => None,
        }
    }

    /// JSON body shared by the HTTP and RPC adapters.
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "code": self.code(),
            "message": self.to_string(),
        });
        if let Some(field) = self.field() {
            body["field"] = serde_json::Value::String(field.to_string());
        }
        if let FlowError::Invocation(e) = self {
            body["kind"] = serde_json::Value::String(e.kind.to_string());
        }
        body
    }
}

// ---------------------------------------------------------------------------
// axum integration (opt-in via feature flag)
// ---------------------------------------------------------------------------

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for FlowError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            FlowError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FlowError::NotFound(_) => StatusCode::NOT_FOUND,
            FlowError::InputValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            FlowError::Invocation(_) => StatusCode::BAD_GATEWAY,
            FlowError::OutputValidation(_) => StatusCode::BAD_GATEWAY,
        };

        let body = serde_json::json!({ "error": self.to_json() });
        (status, axum::Json(body)).into_response()
    }
}
