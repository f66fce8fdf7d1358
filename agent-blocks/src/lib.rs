#![doc = include_str!("../README.md")]

// === Core blocks (always available) ===

/// Shared types and traits — the lingua franca of all blocks.
pub mod types {
    pub use agent_types::*;
}

/// Tool registry, middleware pipeline, and built-in middleware.
pub mod tool {
    pub use agent_tool::*;
}

/// Context management — token counting, compaction strategies, persistent context.
pub mod context {
    pub use agent_context::*;
}

/// The agentic while loop — composes provider + tools + context.
pub mod r#loop {
    pub use agent_loop::*;
}

// === Optional integration blocks ===

/// Production runtime — sessions, sub-agents, guardrails, durability, sandboxing.
#[cfg(feature = "runtime")]
pub mod runtime {
    pub use agent_runtime::*;
}

/// The actor runtime — mailboxes, the LLM/tool-call/agent/chat/user actors,
/// and the wiring that assembles them into a running session.
#[cfg(feature = "actors")]
pub mod actors {
    pub use agent_actors::*;
}

// === Prelude — convenient imports for common usage ===

/// Common imports for working with agent blocks.
pub mod prelude {
    // Core types
    pub use agent_types::{
        CompletionRequest, CompletionResponse, ContentBlock, ContentItem, Message, Provider, Role,
        StopReason, SystemPrompt, TokenUsage, Tool, ToolContext, ToolDefinition, ToolDyn,
        ToolError, ToolOutput,
    };

    // Tool system
    pub use agent_tool::ToolRegistry;

    // Context strategies
    pub use agent_context::SlidingWindowStrategy;

    // The loop
    pub use agent_loop::{AgentLoop, AgentLoopBuilder, AgentResult, LoopConfig};
}
