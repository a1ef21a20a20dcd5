use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{ModelClient, ModelRequest};
use crate::error::{InvocationError, InvocationErrorKind};

/// A client that answers from a script and records what it was asked.
///
/// Scripted replies are consumed in order. With `repeat_last`, the final
/// scripted reply keeps being returned once the script runs out; otherwise
/// an exhausted script fails with a `Rejected` error.
#[derive(Default)]
pub struct MockModelClient {
    script: Mutex<VecDeque<Result<Value, InvocationError>>>,
    last: Mutex<Option<Result<Value, InvocationError>>>,
    requests: Mutex<Vec<ModelRequest>>,
    repeat_last: bool,
    delay: Option<Duration>,
}

impl MockModelClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer with `value`.
    pub fn always(value: Value) -> Self {
        Self {
            repeat_last: true,
            ..Self::default()
        }
        .with_response(value)
    }

    pub fn with_response(self, value: Value) -> Self {
        self.push(Ok(value));
        self
    }

    pub fn with_error(self, error: InvocationError) -> Self {
        self.push(Err(error));
        self
    }

    /// Sleep before answering; used to exercise caller-side timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, reply: Result<Value, InvocationError>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn next_reply(&self) -> Result<Value, InvocationError> {
        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        match next {
            Some(reply) => {
                if self.repeat_last {
                    *last = Some(reply.clone());
                }
                reply
            }
            None => last.clone().unwrap_or_else(|| {
                Err(InvocationError::new(
                    InvocationErrorKind::Rejected,
                    "mock model client has no scripted reply left",
                ))
            }),
        }
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    async fn invoke(&self, request: &ModelRequest) -> Result<Value, InvocationError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_reply()
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::schema::ObjectSchema;
    use crate::flow::template::RenderedRequest;
    use serde_json::json;

    fn request(flow: &str) -> ModelRequest {
        ModelRequest {
            flow: flow.to_string(),
            system: None,
            rendered: RenderedRequest::default(),
            output_schema: ObjectSchema::default(),
        }
    }

    #[tokio::test]
    async fn test_script_consumed_in_order() {
        let mock = MockModelClient::new()
            .with_response(json!({ "n": 1 }))
            .with_response(json!({ "n": 2 }));
        assert_eq!(mock.invoke(&request("a")).await.unwrap(), json!({ "n": 1 }));
        assert_eq!(mock.invoke(&request("b")).await.unwrap(), json!({ "n": 2 }));
        assert!(mock.invoke(&request("c")).await.is_err());

        let flows: Vec<String> = mock.requests().into_iter().map(|r| r.flow).collect();
        assert_eq!(flows, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_always_repeats() {
        let mock = MockModelClient::always(json!({ "reply": "ok" }));
        for _ in 0..3 {
            assert_eq!(mock.invoke(&request("farmAssistant")).await.unwrap()["reply"], "ok");
        }
        assert_eq!(mock.call_count(), 3);
    }
}
