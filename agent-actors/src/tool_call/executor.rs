//! The Tool Executor: decodes one call's arguments, reports it, applies a
//! short-circuit hook, dispatches to its bound capability actor, and
//! classifies the result.
//!
//! `finish_task`/`compact_conversation` are trivial passthrough tools (see
//! `agent_tool::builtin`) — their `ToolResult::Finish`/`Compact`
//! classification happens here, keyed on the tool *name* and its decoded
//! *arguments*, not on anything the tool itself returns.

use std::collections::HashMap;
use std::sync::Arc;

use agent_types::{
    ContentItem, ImageSource, ProgressCallbacks, ToolCall, ToolContext, ToolOutput, ToolResult,
    WasmBoxedFuture, WasmCompatSend, WasmCompatSync,
};
use serde_json::Value;

use crate::correlate;
use crate::runtime::Mailbox;
use crate::tool_call::capability::{CapabilityMessage, ExecuteOutcome};

/// Lets a caller short-circuit a tool call before it ever reaches its bound
/// capability actor — e.g. to serve a cached or policy-substituted result.
pub trait BeforeToolExecutionHook: WasmCompatSend + WasmCompatSync {
    /// Inspect the pending call; return `Some(result)` to short-circuit it
    /// instead of dispatching to the capability actor.
    fn before_tool_execution<'a>(
        &'a self,
        name: &'a str,
        arguments: &'a Value,
    ) -> WasmBoxedFuture<'a, Option<ToolResult>>;
}

/// One tool call's outcome, ready to append to history.
#[derive(Debug, Clone)]
pub struct ToolExecutionRecord {
    /// Correlates with the originating `ContentBlock::ToolUse::id`.
    pub tool_call_id: String,
    /// The tool name that was (or would have been) called.
    pub name: String,
    /// Decoded arguments, or `Value::Null` if decoding failed.
    pub arguments: Value,
    /// The classified result.
    pub result: ToolResult,
    /// Whether this call was cancelled rather than completing normally.
    pub cancelled: bool,
}

fn text_record(call: &ToolCall, arguments: Value, content: impl Into<String>) -> ToolExecutionRecord {
    ToolExecutionRecord {
        tool_call_id: call.id.clone(),
        name: call.function.name.clone(),
        arguments,
        result: ToolResult::Text { content: content.into() },
        cancelled: false,
    }
}

/// Decode a tool call's raw JSON argument string into an object `Value`.
///
/// Mirrors the two failure modes a model's output can produce: malformed
/// JSON, or well-formed JSON that isn't an object.
fn decode_arguments(call: &ToolCall) -> Result<Value, String> {
    let parsed: Value = serde_json::from_str(&call.function.arguments).map_err(|err| {
        format!(
            "Error: Tool call arguments `{}` are not valid JSON: {err}",
            call.function.arguments
        )
    })?;
    if parsed.is_object() {
        Ok(parsed)
    } else {
        Err(format!(
            "Error: Tool call arguments for '{}' must decode to an object.",
            call.function.name
        ))
    }
}

/// Classify a successful tool output by the calling tool's name.
fn classify(name: &str, arguments: &Value, output_text: String) -> ToolResult {
    match name {
        "finish_task" => ToolResult::Finish {
            result: arguments.get("result").and_then(Value::as_str).unwrap_or_default().to_string(),
            summary: arguments.get("summary").and_then(Value::as_str).unwrap_or_default().to_string(),
        },
        "compact_conversation" => ToolResult::Compact {
            summary: arguments.get("summary").and_then(Value::as_str).unwrap_or_default().to_string(),
        },
        _ => ToolResult::Text { content: output_text },
    }
}

/// Render a [`ToolOutput`]'s content items as plain text for appending to
/// history. Images are described by their media type/URL rather than
/// inlined, since history persistence stores text, not binary payloads.
fn render_output(output: &ToolOutput) -> String {
    output
        .content
        .iter()
        .map(|item| match item {
            ContentItem::Text(text) => text.clone(),
            ContentItem::Image { source } => match source {
                ImageSource::Base64 { media_type, .. } => format!("[image: {media_type}]"),
                ImageSource::Url { url } => format!("[image: {url}]"),
            },
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Run one tool call end to end: decode, report, hook, dispatch, classify.
pub async fn execute_one(
    call: ToolCall,
    capabilities: &HashMap<String, Mailbox<CapabilityMessage>>,
    before_hook: Option<&dyn BeforeToolExecutionHook>,
    callbacks: Option<&Arc<dyn ProgressCallbacks>>,
    ctx: ToolContext,
    progress_ctx: &str,
) -> ToolExecutionRecord {
    let name = call.function.name.clone();

    let arguments = match decode_arguments(&call) {
        Ok(arguments) => arguments,
        Err(message) => return text_record(&call, Value::Null, message),
    };

    if let Some(callbacks) = callbacks {
        callbacks.on_tool_start(progress_ctx, &call, &arguments);
    }

    if let Some(hook) = before_hook {
        if let Some(result) = hook.before_tool_execution(&name, &arguments).await {
            return ToolExecutionRecord {
                tool_call_id: call.id.clone(),
                name,
                arguments,
                result,
                cancelled: false,
            };
        }
    }

    let Some(sender) = capabilities.get(&name) else {
        return text_record(
            &call,
            arguments,
            format!("Error executing tool: Tool {name} not found in available tool capabilities."),
        );
    };

    let outcome = correlate::call("tool-capability", sender, |_request_id, reply_to| {
        CapabilityMessage::Execute { arguments: arguments.clone(), ctx, reply_to }
    })
    .await;

    match outcome {
        Ok(ExecuteOutcome::Completed(Ok(output))) => {
            let text = render_output(&output);
            if let Some(callbacks) = callbacks {
                callbacks.on_tool_message(progress_ctx, &text, &name, &arguments);
            }
            let result = classify(&name, &arguments, text);
            ToolExecutionRecord { tool_call_id: call.id.clone(), name, arguments, result, cancelled: false }
        }
        Ok(ExecuteOutcome::Completed(Err(err))) => {
            text_record(&call, arguments, format!("Error executing tool: {err}"))
        }
        Ok(ExecuteOutcome::Cancelled) => ToolExecutionRecord {
            tool_call_id: call.id.clone(),
            name,
            arguments,
            result: ToolResult::Text { content: "Tool execution was cancelled.".to_string() },
            cancelled: true,
        },
        Err(err) => text_record(&call, arguments, format!("Error executing tool: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Actor;
    use crate::tool_call::capability::ToolCapabilityActor;
    use agent_types::{FunctionCall, Tool, ToolDefinition};
    use std::path::PathBuf;
    use tokio_util::sync::CancellationToken;

    struct Echo;

    impl Tool for Echo {
        const NAME: &'static str = "echo";
        type Args = serde_json::Value;
        type Output = serde_json::Value;
        type Error = std::convert::Infallible;

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: Self::NAME.into(),
                title: None,
                description: "echoes its input".into(),
                input_schema: serde_json::json!({"type": "object"}),
                output_schema: None,
                annotations: None,
                cache_control: None,
            }
        }

        fn call(
            &self,
            args: Self::Args,
            _ctx: &ToolContext,
        ) -> impl std::future::Future<Output = Result<Self::Output, Self::Error>> + Send {
            async move { Ok(args) }
        }
    }

    fn test_ctx() -> ToolContext {
        ToolContext {
            cwd: PathBuf::from("."),
            session_id: "s".into(),
            environment: HashMap::new(),
            cancellation_token: CancellationToken::new(),
            progress_reporter: None,
        }
    }

    fn call(id: &str, name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            function: FunctionCall { name: name.into(), arguments: arguments.into() },
        }
    }

    #[tokio::test]
    async fn malformed_json_is_reported_without_dispatch() {
        let capabilities = HashMap::new();
        let record = execute_one(
            call("1", "echo", "not json"),
            &capabilities,
            None,
            None,
            test_ctx(),
            "ctx",
        )
        .await;
        match record.result {
            ToolResult::Text { content } => assert!(content.starts_with("Error: Tool call arguments")),
            other => panic!("expected Text, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_object_arguments_are_rejected() {
        let capabilities = HashMap::new();
        let record = execute_one(call("1", "echo", "[1,2,3]"), &capabilities, None, None, test_ctx(), "ctx")
            .await;
        match record.result {
            ToolResult::Text { content } => assert!(content.contains("must decode to an object")),
            other => panic!("expected Text, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_reported() {
        let capabilities = HashMap::new();
        let record = execute_one(call("1", "missing", "{}"), &capabilities, None, None, test_ctx(), "ctx")
            .await;
        match record.result {
            ToolResult::Text { content } => {
                assert_eq!(content, "Error executing tool: Tool missing not found in available tool capabilities.");
            }
            other => panic!("expected Text, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn finish_task_is_classified_from_arguments() {
        let actor = Actor::spawn("cap", ToolCapabilityActor::new(Arc::new(Echo) as Arc<dyn agent_types::ToolDyn>));
        let mut capabilities = HashMap::new();
        capabilities.insert("finish_task".to_string(), actor.sender());

        let record = execute_one(
            call("1", "finish_task", r#"{"result":"done","summary":"did it"}"#),
            &capabilities,
            None,
            None,
            test_ctx(),
            "ctx",
        )
        .await;

        match record.result {
            ToolResult::Finish { result, summary } => {
                assert_eq!(result, "done");
                assert_eq!(summary, "did it");
            }
            other => panic!("expected Finish, got {other:?}"),
        }
    }
}
