//! Error types shared across the agent crates.

use thiserror::Error;

/// Errors returned by a [`crate::traits::Provider`] implementation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request was rejected before reaching the model (bad params, etc).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The provider's rate limit was hit.
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// The underlying transport failed (connection, timeout, decode).
    #[error("transport error: {0}")]
    Transport(String),
    /// Authentication with the provider failed.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// Any other provider failure, carrying the original error.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors returned while executing a tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool is registered under the requested name.
    #[error("tool not found: {0}")]
    NotFound(String),
    /// The tool's input failed schema or argument validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A [`crate::traits::PermissionPolicy`] denied the call.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// The tool ran but failed, carrying the original error.
    #[error("execution failed: {0}")]
    ExecutionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The tool call was cancelled before it completed.
    #[error("cancelled")]
    Cancelled,
}

/// Errors returned by a [`crate::traits::ContextStrategy`].
#[derive(Debug, Error)]
pub enum ContextError {
    /// Compaction failed for a strategy-specific reason.
    #[error("context compaction failed: {0}")]
    Failed(String),
}

/// Errors returned by an [`crate::traits::ObservabilityHook`].
#[derive(Debug, Error)]
pub enum HookError {
    /// The hook failed to process an event.
    #[error("hook failed: {0}")]
    Failed(String),
}

/// Errors returned while driving an [`agent_loop`-style] agentic loop.
///
/// [`agent_loop`-style]: https://docs.rs/agent-loop
#[derive(Debug, Error)]
pub enum LoopError {
    /// The configured turn limit was reached without a final response.
    #[error("maximum turns reached: {0}")]
    MaxTurns(usize),
    /// An [`crate::traits::ObservabilityHook`] requested termination.
    #[error("terminated by hook: {0}")]
    HookTerminated(String),
    /// The provider returned an error.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Tool execution returned an error.
    #[error(transparent)]
    Tool(#[from] ToolError),
    /// Context compaction returned an error.
    #[error(transparent)]
    Context(#[from] ContextError),
    /// A hook returned an error.
    #[error(transparent)]
    Hook(#[from] HookError),
    /// The loop was cancelled via the cancellation token.
    #[error("cancelled")]
    Cancelled,
    /// A usage limit was exceeded (token budget, request limit, or tool call limit).
    #[error("usage limit exceeded: {0}")]
    UsageLimitExceeded(String),
}

/// Errors from durable execution operations.
#[derive(Debug, Error)]
pub enum DurableError {
    /// An activity (LLM call or tool execution) failed.
    #[error("activity failed: {0}")]
    ActivityFailed(String),
    /// The workflow was cancelled.
    #[error("workflow cancelled")]
    Cancelled,
    /// Timed out waiting for a signal.
    #[error("signal timeout")]
    SignalTimeout,
    /// Continue-as-new was requested.
    #[error("continue as new: {0}")]
    ContinueAsNew(String),
    /// Any other durable execution error.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors returned by a [`crate::traits::Sandbox`] (agent-runtime).
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The sandboxed tool call failed, carrying a description of the failure.
    #[error("sandboxed execution failed: {0}")]
    ExecutionFailed(String),
}

/// Errors returned by session storage backends (agent-runtime).
#[derive(Debug, Error)]
pub enum StorageError {
    /// No session exists under the requested id.
    #[error("session not found: {0}")]
    NotFound(String),
    /// The session failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The underlying storage medium returned an I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned while spawning or running a sub-agent (agent-runtime).
#[derive(Debug, Error)]
pub enum SubAgentError {
    /// No sub-agent is registered under the requested name.
    #[error("sub-agent not found: {0}")]
    NotFound(String),
    /// The caller's nesting depth has reached the configured maximum.
    #[error("max sub-agent depth exceeded: {0}")]
    MaxDepthExceeded(usize),
    /// The sub-agent's own loop failed.
    #[error(transparent)]
    Loop(#[from] LoopError),
}
