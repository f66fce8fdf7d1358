#![doc = include_str!("../README.md")]

pub mod agent;
pub mod chat;
pub mod correlate;
pub mod directory;
pub mod error;
pub mod history;
pub mod llm;
pub mod runtime;
pub mod tool_call;
pub mod user;
pub mod wiring;

pub use agent::AgentActor;
pub use chat::{ChatActor, ImageResolver, InterruptSource};
pub use correlate::{call, cancellable_call, new_request_id};
pub use directory::{actor_uri, ActorDirectory, SharedDirectory};
pub use error::{
    ActorError, AgentError, ChatError, CorrelationError, DirectoryError, LlmError, WiringError,
};
pub use history::{HistoryManager, HistoryMessage};
pub use llm::{CompleteStepRequest, CompleteStepResponse, LLMActor, LlmMessage};
pub use runtime::{to_trace_fields, Actor, ActorHandler, HandlerError, Mailbox};
pub use tool_call::{
    BeforeToolExecutionHook, CapabilityMessage, ExecuteOutcome, HandleToolCallsResponse,
    ToolCallActor, ToolCallMessage, ToolCapabilityActor, ToolExecutionRecord,
};
pub use user::{parse_chat_prompt_input, ChatPromptInput, UserActor, UserInputError, UserInterface, UserMessage};
pub use wiring::{
    apply_default_middleware, ensure_builtin_tools, spawn_tool_capabilities, AgentSession,
    ChatSession, DEFAULT_TOOL_OUTPUT_MAX_CHARS,
};
