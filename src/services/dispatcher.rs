//! Invocation boundary.
//!
//! Resolves a request against the registry, validates its arguments,
//! runs the handler, and folds every outcome (including panics) into a
//! single correlated [`InvocationEvent`].

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

use crate::domain::errors::ToolError;
use crate::domain::models::{InvocationEvent, InvocationRequest, ToolOutput};
use crate::services::capability_registry::CapabilityRegistry;
use crate::services::error_translator::ErrorTranslator;

/// Resolves and runs requests against the registry.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<CapabilityRegistry>,
    translator: ErrorTranslator,
}

impl Dispatcher {
    /// Dispatcher over `registry`.
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            registry,
            translator: ErrorTranslator,
        }
    }

    /// Registry requests are resolved against.
    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Run one request to completion. Never fails: errors become error events.
    #[instrument(skip(self, request), fields(tool = %request.tool_name, request_id = %request.id))]
    pub async fn dispatch(&self, request: &InvocationRequest) -> InvocationEvent {
        let started = Instant::now();
        let id = request.id.clone();

        match self.invoke(request).await {
            Ok(output) => {
                debug!(elapsed_ms = started.elapsed().as_millis(), "tool succeeded");
                InvocationEvent::Response {
                    id,
                    result: output.into(),
                }
            }
            Err(err) => {
                let error = self.translator.translate(&err);
                warn!(
                    code = error.code,
                    elapsed_ms = started.elapsed().as_millis(),
                    error = %error.message,
                    "tool failed"
                );
                InvocationEvent::Error { id, error }
            }
        }
    }

    async fn invoke(&self, request: &InvocationRequest) -> Result<ToolOutput, ToolError> {
        let registration = self.registry.resolve(&request.tool_name)?;

        registration
            .descriptor()
            .input_schema
            .validate(&request.arguments)
            .map_err(|violation| {
                ToolError::invalid_argument(&request.tool_name, violation.to_string())
            })?;

        AssertUnwindSafe(registration.handler().invoke(&request.arguments))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(ToolError::execution_failed("Panic", panic_message(panic.as_ref())))
            })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{CorrelationId, InputSchema, PropertySchema};
    use crate::services::capability_registry::ToolHandler;
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};

    struct Upper;

    #[async_trait]
    impl ToolHandler for Upper {
        async fn invoke(&self, arguments: &Map<String, Value>) -> Result<ToolOutput, ToolError> {
            let text = arguments["text"].as_str().unwrap_or_default();
            Ok(ToolOutput::text(text.to_uppercase()))
        }
    }

    struct Failing;

    #[async_trait]
    impl ToolHandler for Failing {
        async fn invoke(&self, _arguments: &Map<String, Value>) -> Result<ToolOutput, ToolError> {
            Err(ToolError::execution_failed("ProcessNotFound", "process 4242 not found"))
        }
    }

    struct Panicking;

    #[async_trait]
    impl ToolHandler for Panicking {
        async fn invoke(&self, _arguments: &Map<String, Value>) -> Result<ToolOutput, ToolError> {
            panic!("window manager went away");
        }
    }

    fn dispatcher() -> Dispatcher {
        let registry = CapabilityRegistry::builder()
            .register(
                "upper",
                InputSchema::object().require("text", PropertySchema::string()),
                "Uppercase text",
                Arc::new(Upper),
            )
            .unwrap()
            .register("failing", InputSchema::object(), "Always fails", Arc::new(Failing))
            .unwrap()
            .register("panicking", InputSchema::object(), "Always panics", Arc::new(Panicking))
            .unwrap()
            .build();
        Dispatcher::new(Arc::new(registry))
    }

    fn request(id: &str, tool: &str, arguments: Value) -> InvocationRequest {
        InvocationRequest::new(id, tool, arguments.as_object().cloned().unwrap())
    }

    fn error_of(event: InvocationEvent) -> (CorrelationId, u16, String) {
        match event {
            InvocationEvent::Error { id, error } => (id, error.code, error.message),
            other => panic!("Expected error event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_success_wraps_text_block() {
        let event = dispatcher()
            .dispatch(&request("1", "upper", json!({"text": "abc"})))
            .await;
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "response",
                "id": "1",
                "result": {"content": [{"type": "output_text", "text": "ABC"}]}
            })
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_not_found() {
        let event = dispatcher().dispatch(&request("2", "fly", json!({}))).await;
        let (id, code, message) = error_of(event);
        assert_eq!(id, CorrelationId::from("2"));
        assert_eq!(code, 404);
        assert!(message.contains("fly"));
    }

    #[tokio::test]
    async fn test_schema_violation_invalid_argument() {
        let event = dispatcher().dispatch(&request("3", "upper", json!({}))).await;
        let (_, code, message) = error_of(event);
        assert_eq!(code, 400);
        assert_eq!(
            message,
            "Invalid arguments for upper: missing required argument 'text'"
        );
    }

    #[tokio::test]
    async fn test_handler_failure_execution_failed() {
        let event = dispatcher().dispatch(&request("4", "failing", json!({}))).await;
        let (_, code, message) = error_of(event);
        assert_eq!(code, 500);
        assert_eq!(
            message,
            "Tool execution failed: ProcessNotFound: process 4242 not found"
        );
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let dispatcher = dispatcher();
        let event = dispatcher.dispatch(&request("5", "panicking", json!({}))).await;
        let (_, code, message) = error_of(event);
        assert_eq!(code, 500);
        assert_eq!(message, "Tool execution failed: Panic: window manager went away");

        let next = dispatcher
            .dispatch(&request("6", "upper", json!({"text": "still alive"})))
            .await;
        assert!(!next.is_error());
    }
}
