//! Core message and request/response types.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::traits::ProgressCallbacks;

/// The role of a message participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// A human user.
    User,
    /// An AI assistant.
    Assistant,
    /// A system message.
    System,
}

/// A content block within a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ContentBlock {
    /// Plain text content.
    Text(String),
    /// Extended thinking from reasoning models.
    Thinking {
        /// The thinking text.
        thinking: String,
        /// Cryptographic signature for verification.
        signature: String,
    },
    /// Redacted thinking (not visible to user).
    RedactedThinking {
        /// Opaque data blob.
        data: String,
    },
    /// A tool invocation request from the assistant.
    ToolUse {
        /// Unique identifier for this tool call.
        id: String,
        /// Name of the tool to invoke.
        name: String,
        /// JSON input arguments.
        input: serde_json::Value,
    },
    /// Result of a tool invocation.
    ToolResult {
        /// References the `id` from the corresponding `ToolUse`.
        tool_use_id: String,
        /// Content items in the result.
        content: Vec<ContentItem>,
        /// Whether this result represents an error.
        is_error: bool,
    },
    /// An image content block.
    Image {
        /// The image source.
        source: ImageSource,
    },
    /// A document content block.
    Document {
        /// The document source.
        source: DocumentSource,
    },
}

/// A content item within a tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ContentItem {
    /// Plain text content.
    Text(String),
    /// An image.
    Image {
        /// The image source.
        source: ImageSource,
    },
}

/// Source of an image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ImageSource {
    /// Base64-encoded image data.
    Base64 {
        /// MIME type (e.g. "image/png").
        media_type: String,
        /// Base64-encoded data.
        data: String,
    },
    /// URL to an image.
    Url {
        /// The image URL.
        url: String,
    },
}

/// Source of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DocumentSource {
    /// Base64-encoded PDF.
    Base64Pdf {
        /// Base64-encoded PDF data.
        data: String,
    },
    /// Plain text document.
    PlainText {
        /// The text content.
        data: String,
    },
    /// URL to a document.
    Url {
        /// The document URL.
        url: String,
    },
}

/// A message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message author.
    pub role: Role,
    /// The content blocks of this message.
    pub content: Vec<ContentBlock>,
}

/// A system prompt: either a plain string or a list of cacheable blocks.
///
/// Most providers accept a single string; some (Anthropic) support an array
/// of blocks with independent prompt-caching control. Modelling both avoids
/// forcing every caller to flatten structured system prompts into text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SystemPrompt {
    /// A single plain-text system prompt.
    Text(String),
    /// Multiple named blocks, rendered in order.
    Blocks(Vec<ContentBlock>),
}

impl SystemPrompt {
    /// Render the system prompt as a single string, concatenating block text.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            SystemPrompt::Text(text) => text.clone(),
            SystemPrompt::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text(t) => Some(t.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl Default for SystemPrompt {
    fn default() -> Self {
        SystemPrompt::Text(String::new())
    }
}

/// Token usage for a single completion, or accumulated across a loop run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt (messages + system + tools).
    pub input_tokens: u64,
    /// Tokens generated by the model.
    pub output_tokens: u64,
    /// Tokens served from the prompt cache, if the provider reports it.
    pub cache_read_tokens: Option<u64>,
    /// Tokens written to the prompt cache, if the provider reports it.
    pub cache_creation_tokens: Option<u64>,
    /// Tokens spent on extended thinking/reasoning, if the provider reports it.
    pub reasoning_tokens: Option<u64>,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model reached a natural stopping point.
    EndTurn,
    /// The model wants to invoke one or more tools.
    ToolUse,
    /// The model hit `max_tokens`.
    MaxTokens,
    /// The model hit one of the configured stop sequences.
    StopSequence,
}

/// How the model should decide whether and which tool to call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// The model decides freely whether to call a tool.
    Auto,
    /// The model must call at least one tool.
    Any,
    /// The model must call this specific tool.
    Tool {
        /// Name of the tool the model must call.
        name: String,
    },
    /// Tool calling is disabled for this request.
    None,
}

/// Hints about a tool's behavior, surfaced to the model and to permission UIs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolAnnotations {
    /// The tool only reads state; it never mutates anything.
    pub read_only_hint: Option<bool>,
    /// The tool may perform destructive updates (e.g. delete, overwrite).
    pub destructive_hint: Option<bool>,
    /// Calling the tool twice with the same input has the same effect as once.
    pub idempotent_hint: Option<bool>,
    /// The tool interacts with state outside the conversation (network, fs).
    pub open_world_hint: Option<bool>,
}

/// Prompt-cache control for a content block or tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheControl {
    /// Mark this content as an ephemeral cache breakpoint.
    Ephemeral,
}

/// Describes a tool's name, purpose, and input/output schema to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name, referenced by `ContentBlock::ToolUse::name`.
    pub name: String,
    /// Optional human-facing display title, distinct from `name`.
    pub title: Option<String>,
    /// Description shown to the model to decide when/how to call the tool.
    pub description: String,
    /// JSON Schema describing the tool's input.
    pub input_schema: serde_json::Value,
    /// JSON Schema describing the tool's structured output, if any.
    pub output_schema: Option<serde_json::Value>,
    /// Behavioral hints (read-only, destructive, idempotent, open-world).
    pub annotations: Option<ToolAnnotations>,
    /// Prompt-cache control for this definition.
    pub cache_control: Option<CacheControl>,
}

/// The result of a tool invocation, ready to be wrapped in a `ContentBlock::ToolResult`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Content items returned to the model.
    pub content: Vec<ContentItem>,
    /// Optional machine-readable structured result, alongside `content`.
    pub structured_content: Option<serde_json::Value>,
    /// Whether this result represents a tool-side error.
    pub is_error: bool,
}

/// Per-call context passed to every tool invocation.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Working directory the tool should operate relative to.
    pub cwd: PathBuf,
    /// Identifier of the session this call belongs to.
    pub session_id: String,
    /// Process environment variables visible to the tool.
    pub environment: HashMap<String, String>,
    /// Cooperative cancellation signal for long-running tool calls.
    pub cancellation_token: tokio_util::sync::CancellationToken,
    /// Optional sink for incremental progress updates during execution.
    pub progress_reporter: Option<Arc<dyn ProgressCallbacks>>,
}

/// Severity of a status message emitted to [`crate::traits::ProgressCallbacks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    /// Routine informational update.
    Info,
    /// An operation completed successfully.
    Success,
    /// A recoverable problem worth surfacing.
    Warning,
    /// An unrecoverable problem.
    Error,
}

/// A decision returned by a [`crate::traits::PermissionPolicy`] check.
#[derive(Debug, Clone)]
pub enum PermissionDecision {
    /// The call is allowed to proceed.
    Allow,
    /// The call is rejected outright, with a reason.
    Deny(String),
    /// The call requires explicit user confirmation before proceeding.
    Ask(String),
}

/// A single request/response pair sent to a [`crate::traits::Provider`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier. Providers may ignore this and use their own default.
    pub model: String,
    /// Full conversation history to send.
    pub messages: Vec<Message>,
    /// Optional system prompt.
    pub system: Option<SystemPrompt>,
    /// Tools available to the model for this request.
    pub tools: Vec<ToolDefinition>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Nucleus sampling parameter.
    pub top_p: Option<f32>,
    /// Sequences that should stop generation when produced.
    pub stop_sequences: Vec<String>,
    /// How the model should decide whether/which tool to call.
    pub tool_choice: Option<ToolChoice>,
    /// Requested structured response format (e.g. JSON schema), if any.
    pub response_format: Option<serde_json::Value>,
    /// Extended-thinking configuration, if the model supports it.
    pub thinking: Option<serde_json::Value>,
    /// Reasoning effort hint for reasoning-capable models.
    pub reasoning_effort: Option<String>,
    /// Provider-specific extra parameters, passed through verbatim.
    pub extra: Option<serde_json::Value>,
}

/// The full response to a [`CompletionRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Provider-assigned identifier for this completion.
    pub id: String,
    /// The model that actually produced this response.
    pub model: String,
    /// The assistant message produced.
    pub message: Message,
    /// Token usage for this single completion.
    pub usage: TokenUsage,
    /// Why the model stopped.
    pub stop_reason: StopReason,
}

impl PartialEq for StopReason {
    fn eq(&self, other: &Self) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }
}
impl Eq for StopReason {}

/// A wire-level representation of a single tool call, decoupled from the
/// `ContentBlock::ToolUse` shape used internally. Used at actor-message and
/// persistence boundaries where arguments travel as a raw JSON string rather
/// than a parsed `Value`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier correlating this call with its eventual result.
    pub id: String,
    /// The function (tool) being called.
    pub function: FunctionCall,
}

/// The function name and raw argument payload of a [`ToolCall`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Tool name.
    pub name: String,
    /// Arguments as a raw (unparsed) JSON string, matching what providers
    /// stream incrementally before the object is known to be complete.
    pub arguments: String,
}

/// Extract the ordered list of tool calls from an assistant message.
///
/// Converts each `ContentBlock::ToolUse` block into the wire-level
/// [`ToolCall`] shape used by actor messages and history persistence.
#[must_use]
pub fn tool_calls_of(message: &Message) -> Vec<ToolCall> {
    message
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                id: id.clone(),
                function: FunctionCall {
                    name: name.clone(),
                    arguments: input.to_string(),
                },
            }),
            _ => None,
        })
        .collect()
}

/// Cumulative cost/usage reported back to a client over the wire.
///
/// Distinct from [`TokenUsage`]: `tokens` reflects the *current* context
/// size (replaced each turn), while `cost` accumulates across the whole
/// session. See the chat status line in `agent-actors`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Current context size in tokens (replaced, not summed, each turn).
    pub tokens: u64,
    /// Cumulative dollar cost across the session.
    pub cost: f64,
}

/// A named input parameter passed to a launched agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Human-readable description of the parameter's purpose.
    pub description: String,
    /// The concrete value supplied for this invocation.
    pub value: serde_json::Value,
}

/// Static description of an agent: its identity, instructions, and the
/// tools/model it is allowed to use. Analogous to [`crate::SubAgentConfig`]-
/// style configuration but carried as data (e.g. across actor messages)
/// rather than built into a manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescription {
    /// Human-readable agent name.
    pub name: String,
    /// System prompt / instructions for this agent.
    pub instructions: String,
    /// Names of tools this agent is permitted to call.
    pub tools: Vec<String>,
    /// Optional model override.
    pub model: Option<String>,
    /// Named parameters this invocation was launched with, rendered into
    /// the agent's start message alongside `name`/`instructions`.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

/// The final output produced by a completed agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    /// The agent's final result, returned to its caller.
    pub result: String,
    /// A short summary of what the agent did, shown to a launching parent.
    pub summary: String,
}

/// Mutable state threaded through a single agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    /// The conversation history accumulated so far.
    pub history: Vec<Message>,
    /// The final output, set once the agent calls `finish_task`.
    pub output: Option<AgentOutput>,
    /// Cumulative usage for this agent run.
    pub usage: Usage,
}

impl AgentState {
    /// Create fresh state seeded with the given history.
    #[must_use]
    pub fn new(history: Vec<Message>) -> Self {
        Self {
            history,
            output: None,
            usage: Usage::default(),
        }
    }
}

/// The classified outcome of a tool result, used by the tool-call executor
/// to decide whether to keep looping, stop with a final answer, or compact
/// the conversation.
#[derive(Debug, Clone)]
pub enum ToolResult {
    /// An ordinary tool result; append it and keep looping.
    Text {
        /// The content to append as a `ContentBlock::ToolResult`.
        content: String,
    },
    /// The agent called `finish_task`: the run is complete.
    Finish {
        /// The final result returned to the caller.
        result: String,
        /// A short summary of the run.
        summary: String,
    },
    /// The agent called `compact_conversation`: history should be cleared
    /// to the first message plus a synthetic summary.
    Compact {
        /// The summary to seed the post-compaction conversation with.
        summary: String,
    },
}

/// Activity execution options for a durable (retryable) step.
///
/// Mirrors the shape a workflow engine (e.g. Temporal) expects when wrapping
/// an LLM call or tool execution as a retryable "activity".
#[derive(Debug, Clone)]
pub struct ActivityOptions {
    /// Maximum time the activity may run before being considered timed out.
    pub start_to_close_timeout: std::time::Duration,
    /// Maximum time between heartbeats before the activity is considered dead.
    pub heartbeat_timeout: Option<std::time::Duration>,
    /// Retry policy to apply on failure.
    pub retry_policy: Option<RetryPolicy>,
}

/// Retry policy for a durable activity.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_interval: std::time::Duration,
    /// Multiplier applied to the interval after each retry.
    pub backoff_coefficient: f64,
    /// Maximum number of attempts, including the first.
    pub maximum_attempts: u32,
    /// Upper bound on the backoff interval.
    pub maximum_interval: std::time::Duration,
    /// Error messages (substring-matched) that should never be retried.
    pub non_retryable_errors: Vec<String>,
}
