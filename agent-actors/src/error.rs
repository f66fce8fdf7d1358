//! Error types for the actor runtime.

use thiserror::Error;

use agent_types::{ContextError, LoopError, ProviderError, ToolError};

/// Errors returned by the generic actor runtime (start/stop, mailbox send).
#[derive(Debug, Error)]
pub enum ActorError {
    /// The actor's mailbox has already been closed (the worker task exited).
    #[error("actor '{0}' mailbox closed")]
    MailboxClosed(String),
    /// `start` was called on an actor that is already running.
    #[error("actor '{0}' already started")]
    AlreadyStarted(String),
}

/// Errors returned by an [`crate::directory::ActorDirectory`].
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// An actor is already registered under this name.
    #[error("actor already registered: {0}")]
    Duplicate(String),
    /// No actor is registered under this name.
    #[error("unknown actor: {0}")]
    Unknown(String),
}

/// Errors returned by the request/reply correlation layer.
#[derive(Debug, Error)]
pub enum CorrelationError {
    /// The target actor's mailbox was closed before a reply arrived.
    #[error("request '{0}' dropped: mailbox closed")]
    MailboxClosed(String),
    /// The reply channel was dropped without a reply ever being sent.
    #[error("request '{0}' dropped: no reply sent")]
    NoReply(String),
    /// The request was cancelled before a reply arrived.
    #[error("request '{0}' cancelled")]
    Cancelled(String),
}

/// Errors returned by the [`crate::llm::LLMActor`].
#[derive(Debug, Error)]
pub enum LlmError {
    /// `complete_step` was called with an empty conversation history.
    #[error("cannot complete an empty conversation history")]
    EmptyHistory,
    /// The underlying provider call failed.
    #[error("provider error: {0}")]
    Provider(String),
}

impl From<ProviderError> for LlmError {
    fn from(err: ProviderError) -> Self {
        LlmError::Provider(err.to_string())
    }
}

/// Errors returned while running the agent turn loop.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The LLM actor returned an error.
    #[error(transparent)]
    Llm(#[from] LlmError),
    /// A tool call failed at the executor layer.
    #[error(transparent)]
    Tool(#[from] ToolError),
    /// Context compaction failed.
    #[error(transparent)]
    Context(#[from] ContextError),
    /// The loop's configured turn limit was reached.
    #[error("maximum turns reached: {0}")]
    MaxTurns(usize),
    /// The run was cancelled.
    #[error("cancelled")]
    Cancelled,
    /// An actor handler violated an invariant the caller relies on
    /// (e.g. a duplicate `request_id` reaching the tool-call actor).
    #[error("invariant violation: {0}")]
    Invariant(String),
    /// A request/reply correlation failed.
    #[error(transparent)]
    Correlation(#[from] CorrelationError),
}

impl From<AgentError> for LoopError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Llm(LlmError::Provider(msg)) => {
                LoopError::Provider(ProviderError::Transport(msg))
            }
            AgentError::Llm(LlmError::EmptyHistory) => {
                LoopError::Provider(ProviderError::InvalidRequest(
                    "empty conversation history".to_string(),
                ))
            }
            AgentError::Tool(err) => LoopError::Tool(err),
            AgentError::Context(err) => LoopError::Context(err),
            AgentError::MaxTurns(n) => LoopError::MaxTurns(n),
            AgentError::Cancelled => LoopError::Cancelled,
            AgentError::Invariant(msg) => LoopError::HookTerminated(msg),
            AgentError::Correlation(err) => LoopError::HookTerminated(err.to_string()),
        }
    }
}

/// Errors returned while running the chat turn loop.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The underlying LLM/tool-call/correlation machinery failed.
    #[error(transparent)]
    Agent(#[from] AgentError),
    /// The agent called `finish_task` from inside a chat session, which
    /// chat sessions treat as a protocol violation: chat conversations end
    /// on `/exit`, not on the agent declaring itself finished.
    #[error("agent unexpectedly finished a chat turn: {0}")]
    UnexpectedFinish(String),
    /// The User Actor's underlying UI failed to produce input (matches
    /// `UserInputFailed{error}` in spec §4.8); the chat loop settles with
    /// this rather than retrying.
    #[error("user input failed: {0}")]
    UserInputFailed(String),
}

/// Errors returned while wiring up a running session (constructing actors,
/// validating required tools are present).
#[derive(Debug, Error)]
pub enum WiringError {
    /// A tool the agent description requires is not present in the registry.
    #[error("required tool not registered: {0}")]
    MissingTool(String),
    /// The agent description names no tools at all and does not permit that.
    #[error("agent must be wired with at least one tool")]
    NoTools,
}
