//! Session wiring: builds every actor a run needs, in dependency order, and
//! tears them down in reverse.
//!
//! Nothing here is reachable from a single actor's own module — an
//! `AgentActor`/`ChatActor` only ever holds mailbox senders to its peers, it
//! never spawns them. Something has to own that assembly step once per
//! session, in the order the peers actually depend on each other (tool
//! capabilities before the tool-call actor that fans out to them, the LLM/
//! user/tool-call actors before the agent/chat actor that correlates with
//! all three); this module is that something.

use std::collections::HashMap;
use std::sync::Arc;

use agent_tool::builtin::{CompactConversationTool, FinishTaskTool, OutputFormatter, SchemaValidator};
use agent_tool::registry::ToolRegistry;
use agent_types::{ProgressCallbacks, Provider, Tool, ToolContext};

use crate::agent::AgentActor;
use crate::chat::{ChatActor, ImageResolver, InterruptSource};
use crate::error::WiringError;
use crate::llm::{LLMActor, LlmMessage};
use crate::runtime::{Actor, Mailbox};
use crate::tool_call::{CapabilityMessage, ToolCallActor, ToolCallMessage, ToolCapabilityActor};
use crate::user::{UserActor, UserInterface, UserMessage};

/// Character limit `apply_default_middleware` truncates tool output to.
///
/// The original implementation split this into a 100 KB/50 KB background-
/// vs-foreground distinction; nothing in this workspace's `ToolContext`
/// currently distinguishes those two call sites, so wiring applies one
/// limit uniformly via the existing `agent_tool::builtin::OutputFormatter`
/// rather than inventing the split back in.
pub const DEFAULT_TOOL_OUTPUT_MAX_CHARS: usize = 50_000;

/// Register `finish_task`/`compact_conversation` if `registry` doesn't
/// already have them, so a caller that forgot to add them still gets a
/// working [`AgentActor`]/[`ChatActor`] rather than a construction-time
/// [`WiringError::MissingTool`].
pub fn ensure_builtin_tools(registry: &mut ToolRegistry) {
    if registry.get(FinishTaskTool::NAME).is_none() {
        registry.register(FinishTaskTool);
    }
    if registry.get(CompactConversationTool::NAME).is_none() {
        registry.register(CompactConversationTool);
    }
}

/// Add the standard middleware pipeline (output truncation, schema
/// validation) to a registry that already holds every tool it will ever
/// hold — `SchemaValidator::new` snapshots definitions at construction, so
/// this must run after the last `register`/`register_dyn` call.
pub fn apply_default_middleware(registry: &mut ToolRegistry) {
    let validator = SchemaValidator::new(registry);
    registry
        .add_middleware(OutputFormatter::new(DEFAULT_TOOL_OUTPUT_MAX_CHARS))
        .add_middleware(validator);
}

/// Spawn one [`ToolCapabilityActor`] per tool currently in `registry`.
///
/// Returns the name-keyed mailbox map a [`ToolCallActor`] fans out through,
/// alongside the actors themselves so a caller can `stop` them later.
#[must_use]
pub fn spawn_tool_capabilities(
    registry: &ToolRegistry,
) -> (HashMap<String, Mailbox<CapabilityMessage>>, Vec<Actor<CapabilityMessage>>) {
    let mut senders = HashMap::new();
    let mut actors = Vec::new();
    for definition in registry.definitions() {
        if let Some(tool) = registry.get(&definition.name) {
            let actor = Actor::spawn(definition.name.clone(), ToolCapabilityActor::new(tool));
            senders.insert(definition.name, actor.sender());
            actors.push(actor);
        }
    }
    (senders, actors)
}

/// A fully wired goal-directed agent run: LLM Actor, Tool-Call Actor, one
/// Tool Capability Actor per registered tool, and the [`AgentActor`] that
/// correlates with all three.
pub struct AgentSession {
    llm: Actor<LlmMessage>,
    tool_call: Actor<ToolCallMessage>,
    capabilities: Vec<Actor<CapabilityMessage>>,
    /// Drives the run; call [`AgentActor::run_agent_loop`] against it.
    pub agent: AgentActor,
}

impl AgentSession {
    /// Build every peer actor `agent` needs and bind them together.
    ///
    /// `registry` is mutated in place: [`ensure_builtin_tools`] fills in
    /// `finish_task`/`compact_conversation` if either is missing.
    ///
    /// # Errors
    ///
    /// Returns [`WiringError::MissingTool`] if a required built-in is
    /// somehow still absent after injection (defensive; should not happen).
    pub fn build<P: Provider + 'static>(
        provider: P,
        registry: &mut ToolRegistry,
        tool_context_template: ToolContext,
        callbacks: Option<Arc<dyn ProgressCallbacks>>,
        compact_at_tokens: u64,
    ) -> Result<Self, WiringError> {
        ensure_builtin_tools(registry);
        let tool_definitions = registry.definitions();
        let (capability_senders, capabilities) = spawn_tool_capabilities(registry);

        let llm = Actor::spawn("llm", LLMActor::new(provider));
        let tool_call = Actor::spawn(
            "tool-call",
            ToolCallActor::new(capability_senders, None, callbacks.clone()),
        );

        let agent = AgentActor::new(
            tool_definitions,
            llm.sender(),
            tool_call.sender(),
            tool_context_template,
            callbacks,
            compact_at_tokens,
        )?;

        Ok(Self { llm, tool_call, capabilities, agent })
    }

    /// Stop every peer actor, tool-call first (so no new capability calls
    /// are dispatched), then capabilities, then the LLM actor last.
    pub async fn shutdown(mut self) {
        self.tool_call.stop().await;
        for mut capability in self.capabilities {
            capability.stop().await;
        }
        self.llm.stop().await;
    }
}

/// A fully wired interactive chat session: LLM Actor, Tool-Call Actor, one
/// Tool Capability Actor per registered tool, a User Actor, and the
/// [`ChatActor`] that correlates with all three.
pub struct ChatSession {
    llm: Actor<LlmMessage>,
    tool_call: Actor<ToolCallMessage>,
    capabilities: Vec<Actor<CapabilityMessage>>,
    user: Actor<UserMessage>,
    /// Drives the session; call [`ChatActor::run_chat_loop`] against it.
    pub chat: ChatActor,
    /// Shared with whatever external interrupt source (e.g. a SIGINT
    /// handler) the embedding binary wires up; not used by this crate.
    pub interrupts: InterruptSource,
}

impl ChatSession {
    /// Build every peer actor `chat` needs and bind them together.
    ///
    /// `registry` is mutated in place the same way as
    /// [`AgentSession::build`]; chat does not itself validate that
    /// `compact_conversation` is present (see [`ChatActor`]'s docs), but
    /// wiring still injects both built-ins so a `/compact` command works.
    #[must_use]
    pub fn build<P: Provider + 'static>(
        provider: P,
        registry: &mut ToolRegistry,
        ui: Arc<dyn UserInterface>,
        model: impl Into<String>,
        tool_context_template: ToolContext,
        image_resolver: Option<Arc<dyn ImageResolver>>,
        callbacks: Option<Arc<dyn ProgressCallbacks>>,
    ) -> Self {
        ensure_builtin_tools(registry);
        let tool_definitions = registry.definitions();
        let (capability_senders, capabilities) = spawn_tool_capabilities(registry);

        let llm = Actor::spawn("llm", LLMActor::new(provider));
        let tool_call = Actor::spawn(
            "tool-call",
            ToolCallActor::new(capability_senders, None, callbacks.clone()),
        );
        let user = Actor::spawn("user", UserActor::new(ui));

        let chat = ChatActor::new(
            llm.sender(),
            tool_call.sender(),
            user.sender(),
            model.into(),
            tool_definitions,
            tool_context_template,
            image_resolver,
            callbacks,
        );

        Self { llm, tool_call, capabilities, user, chat, interrupts: InterruptSource::new() }
    }

    /// Stop every peer actor, tool-call first, then capabilities, then the
    /// user and LLM actors.
    pub async fn shutdown(mut self) {
        self.tool_call.stop().await;
        for mut capability in self.capabilities {
            capability.stop().await;
        }
        self.user.stop().await;
        self.llm.stop().await;
    }
}
