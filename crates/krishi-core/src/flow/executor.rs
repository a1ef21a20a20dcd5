//! Flow Executor — runs one flow invocation end to end.
//!
//! `Idle → Validating → Rendering → Invoking → ValidatingOutput → Succeeded | Failed`
//!
//! Any failure moves straight to `Failed`; there is no retry transition here
//! (retries, when configured, live inside the model client). The executor
//! holds no per-call state, so one instance serves concurrent callers.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{
    FlowError, InvocationError, InvocationErrorKind, ValidationError, ValidationReason,
};
use crate::flow::registry::FlowRegistry;
use crate::flow::template::RenderedRequest;
use crate::model::{ModelClient, ModelRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    Validating,
    Rendering,
    Invoking,
    ValidatingOutput,
    Succeeded,
    Failed,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionState::Idle => "Idle",
            ExecutionState::Validating => "Validating",
            ExecutionState::Rendering => "Rendering",
            ExecutionState::Invoking => "Invoking",
            ExecutionState::ValidatingOutput => "ValidatingOutput",
            ExecutionState::Succeeded => "Succeeded",
            ExecutionState::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Bookkeeping for a single call, used only for logging.
struct Invocation<'a> {
    flow: &'a str,
    id: Uuid,
    state: ExecutionState,
    started: Instant,
}

impl<'a> Invocation<'a> {
    fn new(flow: &'a str) -> Self {
        Self {
            flow,
            id: Uuid::new_v4(),
            state: ExecutionState::Idle,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: ExecutionState) {
        tracing::debug!(
            "[FlowExecutor] {} ({}): {} -> {}",
            self.flow,
            self.id,
            self.state,
            next
        );
        self.state = next;
    }

    fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }
}

#[derive(Clone)]
pub struct FlowExecutor {
    registry: Arc<FlowRegistry>,
    client: Arc<dyn ModelClient>,
    timeout: Option<Duration>,
}

impl FlowExecutor {
    pub fn new(registry: Arc<FlowRegistry>, client: Arc<dyn ModelClient>) -> Self {
        Self {
            registry,
            client,
            timeout: None,
        }
    }

    /// Give up on the model call after `timeout`; the caller gets an
    /// `Invocation` error of kind `Timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn registry(&self) -> &Arc<FlowRegistry> {
        &self.registry
    }

    /// Run a flow: look up, validate input, render, invoke, validate output.
    pub async fn execute(&self, name: &str, input: Value) -> Result<Value, FlowError> {
        let mut invocation = Invocation::new(name);
        let result = self.run(&mut invocation, input).await;

        match &result {
            Ok(_) => {
                invocation.advance(ExecutionState::Succeeded);
                tracing::info!(
                    "[FlowExecutor] {} ({}) succeeded in {}ms",
                    name,
                    invocation.id,
                    invocation.elapsed_ms()
                );
            }
            Err(e) => {
                let failed_in = invocation.state;
                invocation.advance(ExecutionState::Failed);
                match e {
                    FlowError::OutputValidation(_) => tracing::warn!(
                        "[FlowExecutor] {} ({}) contract drift after {}ms: {}",
                        name,
                        invocation.id,
                        invocation.elapsed_ms(),
                        e
                    ),
                    FlowError::Invocation(_) | FlowError::Configuration(_) => tracing::warn!(
                        "[FlowExecutor] {} ({}) failed in {} after {}ms: {}",
                        name,
                        invocation.id,
                        failed_in,
                        invocation.elapsed_ms(),
                        e
                    ),
                    FlowError::NotFound(_) | FlowError::InputValidation(_) => tracing::info!(
                        "[FlowExecutor] {} ({}) rejected after {}ms: {}",
                        name,
                        invocation.id,
                        invocation.elapsed_ms(),
                        e
                    ),
                }
            }
        }
        result
    }

    async fn run(&self, invocation: &mut Invocation<'_>, input: Value) -> Result<Value, FlowError> {
        let flow = self.registry.lookup(invocation.flow)?;

        invocation.advance(ExecutionState::Validating);
        let input = flow
            .input_schema()
            .validate(&input)
            .map_err(FlowError::InputValidation)?;

        invocation.advance(ExecutionState::Rendering);
        let rendered = flow
            .template()
            .render(&input)
            .map_err(|e| FlowError::Configuration(format!("flow '{}': {}", flow.name(), e)))?;
        tracing::debug!(
            "[FlowExecutor] {} ({}) rendered request: {}",
            invocation.flow,
            invocation.id,
            rendered.summary()
        );

        invocation.advance(ExecutionState::Invoking);
        let request = ModelRequest {
            flow: flow.name().to_string(),
            system: flow.system().map(str::to_string),
            rendered,
            output_schema: flow.output_schema().clone(),
        };
        let raw = self.invoke(&request).await?;

        invocation.advance(ExecutionState::ValidatingOutput);
        flow.output_schema()
            .validate(&raw)
            .map_err(FlowError::OutputValidation)
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<Value, InvocationError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.client.invoke(request))
                .await
                .map_err(|_| {
                    InvocationError::new(
                        InvocationErrorKind::Timeout,
                        format!("no reply from {} within {:?}", self.client.name(), limit),
                    )
                })?,
            None => self.client.invoke(request).await,
        }
    }

    /// Typed wrapper over [`execute`](Self::execute). Output that passed the
    /// schema but does not deserialize into `O` is an output validation error.
    pub async fn execute_typed<I, O>(&self, name: &str, input: &I) -> Result<O, FlowError>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        let input = serde_json::to_value(input).map_err(|e| {
            FlowError::InputValidation(ValidationError {
                path: String::new(),
                expected: "object".to_string(),
                reason: ValidationReason::WrongKind {
                    found: format!("unserializable value ({})", e),
                },
            })
        })?;

        let output = self.execute(name, input).await?;
        serde_json::from_value(output).map_err(|e| {
            FlowError::OutputValidation(ValidationError {
                path: String::new(),
                expected: std::any::type_name::<O>().to_string(),
                reason: ValidationReason::WrongKind {
                    found: e.to_string(),
                },
            })
        })
    }

    /// Dry run: look up, validate and render without calling the model.
    pub fn render(&self, name: &str, input: &Value) -> Result<RenderedRequest, FlowError> {
        self.registry.lookup(name)?.render(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::definition::FlowDefinition;
    use crate::flow::schema::{FieldDef, ObjectSchema};
    use crate::model::MockModelClient;
    use serde_json::json;

    fn price_registry() -> Arc<FlowRegistry> {
        let mut registry = FlowRegistry::new();
        registry
            .register(
                FlowDefinition::new(
                    "getMarketPrice",
                    ObjectSchema::new(vec![FieldDef::string("productName")]).unwrap(),
                    ObjectSchema::new(vec![FieldDef::string("averagePrice")]).unwrap(),
                    "Price of {{{productName}}}",
                )
                .unwrap()
                .with_system("You are a market analyst."),
            )
            .unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_request_carries_system_and_schema() {
        let mock = Arc::new(MockModelClient::always(json!({ "averagePrice": "₹2,500" })));
        let executor = FlowExecutor::new(price_registry(), mock.clone());

        executor
            .execute("getMarketPrice", json!({ "productName": "Onion" }))
            .await
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].flow, "getMarketPrice");
        assert_eq!(requests[0].system.as_deref(), Some("You are a market analyst."));
        assert_eq!(requests[0].rendered.text(), "Price of Onion");
        assert!(requests[0].output_schema.field("averagePrice").is_some());
    }

    #[tokio::test]
    async fn test_caller_timeout_is_invocation_error() {
        let mock = Arc::new(
            MockModelClient::always(json!({ "averagePrice": "late" }))
                .with_delay(Duration::from_millis(200)),
        );
        let executor =
            FlowExecutor::new(price_registry(), mock).with_timeout(Duration::from_millis(10));

        let err = executor
            .execute("getMarketPrice", json!({ "productName": "Onion" }))
            .await
            .unwrap_err();
        match err {
            FlowError::Invocation(e) => assert_eq!(e.kind, InvocationErrorKind::Timeout),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_typed_output_mismatch_is_output_validation() {
        #[derive(serde::Deserialize)]
        #[allow(dead_code)]
        struct Wrong {
            price: u32,
        }

        let mock = Arc::new(MockModelClient::always(json!({ "averagePrice": "₹2,500" })));
        let executor = FlowExecutor::new(price_registry(), mock);
        let result: Result<Wrong, _> = executor
            .execute_typed("getMarketPrice", &json!({ "productName": "Onion" }))
            .await;
        assert!(matches!(result, Err(FlowError::OutputValidation(_))));
    }

    #[test]
    fn test_render_is_dry_run() {
        let mock = Arc::new(MockModelClient::new());
        let executor = FlowExecutor::new(price_registry(), mock.clone());
        let rendered = executor
            .render("getMarketPrice", &json!({ "productName": "Tomato" }))
            .unwrap();
        assert_eq!(rendered.text(), "Price of Tomato");
        assert_eq!(mock.call_count(), 0);
    }
}
