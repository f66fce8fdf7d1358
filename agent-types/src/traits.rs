//! Core traits: Provider, Tool, ToolDyn, ContextStrategy, ObservabilityHook, DurableContext.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::{ContextError, DurableError, HookError, ProviderError, ToolError};
use crate::stream::StreamHandle;
use crate::types::{
    ActivityOptions, CompletionRequest, CompletionResponse, Message, PermissionDecision,
    StatusLevel, ToolCall, ToolContext, ToolDefinition, ToolOutput,
};
use crate::wasm::{WasmBoxedFuture, WasmCompatSend, WasmCompatSync};

/// LLM provider trait. Implement this for each provider (Anthropic, OpenAI, Ollama, etc.).
///
/// Uses RPITIT (return position impl trait in trait) — Rust 2024 native async.
/// Not object-safe by design; use generics `<P: Provider>` to compose.
///
/// # Example
///
/// ```ignore
/// struct MyProvider;
///
/// impl Provider for MyProvider {
///     fn complete(&self, request: CompletionRequest)
///         -> impl Future<Output = Result<CompletionResponse, ProviderError>> + Send
///     {
///         async { todo!() }
///     }
///
///     fn complete_stream(&self, request: CompletionRequest)
///         -> impl Future<Output = Result<StreamHandle, ProviderError>> + Send
///     {
///         async { todo!() }
///     }
/// }
/// ```
pub trait Provider: WasmCompatSend + WasmCompatSync {
    /// Send a completion request and get a full response.
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, ProviderError>> + WasmCompatSend;

    /// Send a completion request and get a stream of events.
    fn complete_stream(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<StreamHandle, ProviderError>> + WasmCompatSend;
}

/// Sink for incremental progress updates emitted during a tool call, and —
/// more broadly — for every user/assistant/tool-visible event an actor-run
/// session wants to surface to a renderer (terminal UI, log, test probe).
///
/// Object-safe so it can be shared as `Arc<dyn ProgressCallbacks>` inside a
/// [`crate::types::ToolContext`] or passed request-scoped to an LLM/agent/chat
/// actor, without generic parameters leaking into every call site. Every
/// method defaults to a no-op (see [`NullProgressCallbacks`]) so a caller
/// only has to override the events it actually renders.
pub trait ProgressCallbacks: WasmCompatSend + WasmCompatSync {
    /// Report a fine-grained progress update from inside a tool call.
    /// `current`/`total` follow whatever unit the tool reports in (bytes,
    /// lines, steps); `total` is `None` when unknown.
    fn on_progress(&self, _message: &str, _current: Option<u64>, _total: Option<u64>) {}

    /// A one-off status line, outside the turn-by-turn message flow.
    fn on_status_message(&self, _text: &str, _level: StatusLevel) {}

    /// A user message was appended to history. `force` asks the renderer to
    /// show it even if it would otherwise be considered already-seen (used
    /// when replaying scrollback on chat resume).
    fn on_user_message(&self, _ctx: &str, _message: &Message, _force: bool) {}

    /// An assistant message was appended to history. See `force` above.
    fn on_assistant_message(&self, _ctx: &str, _message: &Message, _force: bool) {}

    /// A tool call is about to be submitted for execution.
    fn on_tool_start(&self, _ctx: &str, _tool_call: &ToolCall, _arguments: &Value) {}

    /// A tool call produced a result message.
    fn on_tool_message(&self, _ctx: &str, _message: &str, _tool_name: &str, _arguments: &Value) {}

    /// A chunk of assistant-visible content streamed in from the provider.
    fn on_content_chunk(&self, _chunk: &str) {}

    /// A chunk of reasoning/thinking content streamed in from the provider.
    fn on_reasoning_chunk(&self, _chunk: &str) {}

    /// The provider's stream for the current completion has ended.
    fn on_chunks_end(&self) {}
}

/// A [`ProgressCallbacks`] implementation that discards every event.
///
/// Used as the default for sessions that run without a renderer attached
/// (headless agent runs, tests) — see `original_source`'s equivalent null
/// object.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgressCallbacks;

impl ProgressCallbacks for NullProgressCallbacks {}

/// A strongly-typed tool. Implementors get a blanket [`ToolDyn`] impl via
/// [`ErasedTool`] so the registry can hold them as trait objects.
///
/// Uses RPITIT like [`Provider`]; not object-safe by design.
pub trait Tool: WasmCompatSend + WasmCompatSync {
    /// Tool name, as presented to the model. Must be unique within a registry.
    const NAME: &'static str;

    /// Strongly-typed input, deserialized from the model's JSON arguments.
    type Args: serde::de::DeserializeOwned + WasmCompatSend;
    /// Strongly-typed output, serialized back into a [`ToolOutput`].
    type Output: serde::Serialize + WasmCompatSend;
    /// Error type returned on failure; converted to [`ToolError::ExecutionFailed`].
    type Error: std::error::Error + Send + Sync + 'static;

    /// The schema and metadata advertised to the model.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with already-validated, already-deserialized input.
    fn call(
        &self,
        args: Self::Args,
        ctx: &ToolContext,
    ) -> impl Future<Output = Result<Self::Output, Self::Error>> + WasmCompatSend;
}

/// Object-safe counterpart of [`Tool`], used by the registry to hold
/// heterogeneous tools behind a single trait object.
pub trait ToolDyn: WasmCompatSend + WasmCompatSync {
    /// Tool name, mirroring [`Tool::NAME`].
    fn name(&self) -> &str;

    /// The schema and metadata advertised to the model.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with raw JSON input, performing deserialization and
    /// schema validation internally.
    fn call_dyn<'a>(
        &'a self,
        input: Value,
        ctx: &'a ToolContext,
    ) -> WasmBoxedFuture<'a, Result<ToolOutput, ToolError>>;
}

impl<T: Tool> ToolDyn for T {
    fn name(&self) -> &str {
        T::NAME
    }

    fn definition(&self) -> ToolDefinition {
        Tool::definition(self)
    }

    fn call_dyn<'a>(
        &'a self,
        input: Value,
        ctx: &'a ToolContext,
    ) -> WasmBoxedFuture<'a, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let args: T::Args = serde_json::from_value(input)
                .map_err(|e| ToolError::InvalidInput(e.to_string()))?;
            let output = self
                .call(args, ctx)
                .await
                .map_err(|e| ToolError::ExecutionFailed(Box::new(e)))?;
            Ok(output_to_tool_output(&output))
        })
    }
}

/// Convert a strongly-typed tool output into the wire-level [`ToolOutput`].
///
/// A bare JSON string becomes a single text block verbatim; anything else is
/// serialized to compact JSON text and also kept as `structured_content` so
/// callers that want the typed value don't have to re-parse the text.
fn output_to_tool_output<T: serde::Serialize>(output: &T) -> ToolOutput {
    let value = serde_json::to_value(output).unwrap_or(Value::Null);
    let text = match &value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    ToolOutput {
        content: vec![crate::types::ContentItem::Text(text)],
        structured_content: Some(value),
        is_error: false,
    }
}

/// A compaction strategy for keeping a conversation within a model's context
/// window. Implementations decide both *when* compaction should run and
/// *how* the history is rewritten.
pub trait ContextStrategy: WasmCompatSend + WasmCompatSync {
    /// Whether the given history should be compacted, given the current
    /// (estimated or provider-reported) token count.
    fn should_compact(&self, messages: &[Message], token_count: usize) -> bool;

    /// Rewrite the history, returning the (typically shorter) replacement.
    fn compact(
        &self,
        messages: Vec<Message>,
    ) -> impl Future<Output = Result<Vec<Message>, ContextError>> + WasmCompatSend;

    /// A rough token estimate for the given history, used by strategies that
    /// need a cheap heuristic rather than an exact provider-side count.
    fn token_estimate(&self, messages: &[Message]) -> usize;
}

/// A boxed, object-safe [`ContextStrategy`], for registries that hold a
/// heterogeneous list of strategies (e.g. [`crate::types::ToolResult`]
/// handling plus a fallback sliding window).
pub type BoxedContextStrategy = Arc<dyn ErasedContextStrategy>;

/// Object-safe adapter over [`ContextStrategy`], implemented for every `T:
/// ContextStrategy` via a blanket impl in `agent-context`.
pub trait ErasedContextStrategy: WasmCompatSend + WasmCompatSync {
    /// See [`ContextStrategy::should_compact`].
    fn should_compact(&self, messages: &[Message], token_count: usize) -> bool;

    /// See [`ContextStrategy::compact`].
    fn compact<'a>(
        &'a self,
        messages: Vec<Message>,
    ) -> WasmBoxedFuture<'a, Result<Vec<Message>, ContextError>>;

    /// See [`ContextStrategy::token_estimate`].
    fn token_estimate(&self, messages: &[Message]) -> usize;
}

/// Decides whether a tool call, or a sub-agent spawn, is permitted to run.
///
/// Synchronous by design: permission checks are expected to be cheap, local
/// decisions (name/argument matching, static allow/deny lists) rather than
/// I/O. A policy that needs to ask a human should return `Ask` and let the
/// caller handle the out-of-band confirmation.
pub trait PermissionPolicy: WasmCompatSend + WasmCompatSync {
    /// Evaluate a pending tool call and decide whether it may proceed.
    fn check(&self, tool_name: &str, input: &Value) -> PermissionDecision;
}

/// A point in the agent loop at which an [`ObservabilityHook`] can observe
/// or intervene.
#[derive(Debug)]
pub enum HookEvent<'a> {
    /// Fired once per loop iteration, before anything else happens.
    LoopIteration {
        /// Zero-based iteration index within this run.
        turn: usize,
    },
    /// Fired immediately before a request is sent to the provider.
    PreLlmCall {
        /// The request about to be sent.
        request: &'a CompletionRequest,
    },
    /// Fired immediately after a response is received from the provider.
    PostLlmCall {
        /// The response received.
        response: &'a CompletionResponse,
    },
    /// Fired immediately before a tool call is executed.
    PreToolExecution {
        /// Name of the tool about to be called.
        tool_name: &'a str,
        /// Raw JSON input about to be passed to the tool.
        input: &'a Value,
    },
    /// Fired immediately after a tool call completes.
    PostToolExecution {
        /// Name of the tool that was called.
        tool_name: &'a str,
        /// The result produced by the tool.
        output: &'a ToolOutput,
    },
    /// Fired whenever context compaction runs.
    ContextCompaction {
        /// Token estimate before compaction.
        old_tokens: u64,
        /// Token estimate after compaction.
        new_tokens: u64,
    },
    /// Fired once, at the start of a session.
    SessionStart {
        /// Identifier of the session starting.
        session_id: &'a str,
    },
    /// Fired once, when a session ends.
    SessionEnd {
        /// Identifier of the session ending.
        session_id: &'a str,
    },
}

/// What a hook wants to happen next, after observing a [`HookEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookAction {
    /// Proceed normally.
    Continue,
    /// Skip the action the event is reporting on (e.g. don't run this tool
    /// call), but keep the loop running.
    Skip {
        /// Why this step is being skipped.
        reason: String,
    },
    /// Stop the loop entirely.
    Terminate {
        /// Why the loop is being terminated.
        reason: String,
    },
}

/// Observes (and can intervene in) the agent loop at each [`HookEvent`].
///
/// Uses RPITIT like [`Provider`]; not object-safe. `agent-loop` stores hooks
/// behind `Box<dyn ErasedObservabilityHook>` via a blanket adapter impl.
pub trait ObservabilityHook: WasmCompatSend + WasmCompatSync {
    /// Handle one event, returning what should happen next.
    fn on_event(
        &self,
        event: HookEvent<'_>,
    ) -> impl Future<Output = Result<HookAction, HookError>> + WasmCompatSend;
}

/// Object-safe adapter over [`ObservabilityHook`], used by `agent-loop` to
/// hold a heterogeneous `Vec<Box<dyn ErasedObservabilityHook>>`.
pub trait ErasedObservabilityHook: WasmCompatSend + WasmCompatSync {
    /// See [`ObservabilityHook::on_event`].
    fn on_event<'a>(
        &'a self,
        event: HookEvent<'a>,
    ) -> WasmBoxedFuture<'a, Result<HookAction, HookError>>;
}

impl<T: ObservabilityHook> ErasedObservabilityHook for T {
    fn on_event<'a>(
        &'a self,
        event: HookEvent<'a>,
    ) -> WasmBoxedFuture<'a, Result<HookAction, HookError>> {
        Box::pin(self.on_event(event))
    }
}

/// Wraps LLM calls and tool executions as retryable, journaled activities for
/// a workflow engine (Temporal, Restate, Inngest, or a local passthrough).
///
/// Not object-safe by design (RPITIT); `agent-loop` holds an implementor
/// behind a type-erased `BoxedDurable` adapter.
pub trait DurableContext: WasmCompatSend + WasmCompatSync {
    /// Run an LLM completion as a durable activity.
    fn execute_llm_call(
        &self,
        request: CompletionRequest,
        options: ActivityOptions,
    ) -> impl Future<Output = Result<CompletionResponse, DurableError>> + WasmCompatSend;

    /// Run a tool call as a durable activity.
    fn execute_tool(
        &self,
        tool_name: &str,
        input: Value,
        ctx: &ToolContext,
        options: ActivityOptions,
    ) -> impl Future<Output = Result<ToolOutput, DurableError>> + WasmCompatSend;

    /// Wait for an external signal, up to `timeout`. Returns `None` on timeout.
    fn wait_for_signal<T: serde::de::DeserializeOwned + WasmCompatSend>(
        &self,
        signal_name: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Option<T>, DurableError>> + WasmCompatSend;

    /// Whether the engine recommends continuing as a new workflow run (history size limits).
    fn should_continue_as_new(&self) -> bool;

    /// Persist `state` and start a fresh workflow run, replacing the current one.
    fn continue_as_new(
        &self,
        state: Value,
    ) -> impl Future<Output = Result<(), DurableError>> + WasmCompatSend;

    /// Durable, replay-safe sleep.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + WasmCompatSend;

    /// Replay-safe current time.
    fn now(&self) -> chrono::DateTime<chrono::Utc>;
}
