//! The Chat Actor: drives an interactive turn loop where a human, not a
//! fixed goal, decides when the conversation ends.
//!
//! Structurally this mirrors `agent_actors::agent::AgentActor` — same peers
//! (LLM Actor, Tool-Call Actor), same `history`-module mutation helpers —
//! with two differences the interactive setting demands: a User Actor in
//! the loop for slash commands and free text, and a per-turn cancellation
//! scope so a user-driven interrupt can abandon an in-flight LLM or tool
//! step without tearing down the whole session.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

use agent_types::{
    tool_calls_of, ContentBlock, ImageSource, Message, ProgressCallbacks, Role, StatusLevel,
    ToolContext, ToolDefinition, ToolResult, Usage, WasmBoxedFuture, WasmCompatSend, WasmCompatSync,
};

use crate::agent::messages as agent_messages;
use crate::correlate;
use crate::error::{AgentError, ChatError};
use crate::history;
use crate::llm::{CompleteStepRequest, LlmMessage};
use crate::runtime::Mailbox;
use crate::tool_call::ToolCallMessage;
use crate::user::{ChatPromptInput, UserMessage};

/// Preserved strings and template renderers for the chat turn loop.
pub mod messages {
    use agent_types::Usage;

    /// Render the first message of an interactive chat session.
    #[must_use]
    pub fn chat_start_message(instructions: Option<&str>) -> String {
        let mut text = String::from(
            "## General\nYou are an agent. You are in chat mode: a human is driving this \
             conversation turn by turn. Wait for their input between turns and use the \
             available tools to help them.\n",
        );
        if let Some(instructions) = instructions {
            if !instructions.is_empty() {
                text.push_str("\n## Instructions\n");
                text.push_str(instructions);
                text.push('\n');
            }
        }
        text
    }

    /// Sent as a forced user directive when the human runs `/compact`.
    pub const COMPACT_DIRECTIVE: &str = "Please call `compact_conversation` now to summarise our conversation so far.";

    /// Shown in response to `/help`.
    pub const HELP_TEXT: &str = "Commands: /exit  /compact  /clear  /image <path-or-url>  /help";

    /// Shown when `/image` is given no argument.
    pub const IMAGE_ARG_REQUIRED: &str = "/image requires a path or URL argument.";

    /// Shown when `/clear` resets history back to the start message.
    pub const CONVERSATION_CLEARED: &str = "Conversation cleared.";

    /// The slash-command vocabulary offered to [`crate::user::UserActor`]
    /// when yielding control back to the human.
    pub const COMMANDS: &[&str] = &["/exit", "/compact", "/clear", "/image", "/help"];

    /// Render the usage status line shown before each prompt:
    /// "💰 {tokens} tokens • ${cost:.2}".
    #[must_use]
    pub fn usage_line(usage: &Usage) -> String {
        format!("\u{1F4B0} {} tokens \u{2022} ${:.2}", usage.tokens, usage.cost)
    }
}

/// Resolves an image path or URL to a data URL, entirely external to this
/// crate for the same reason [`crate::llm::LLMActor`]'s [`agent_types::Provider`]
/// is: loading and encoding image bytes is outside this workspace's scope
/// (see crate docs' Non-goals).
pub trait ImageResolver: WasmCompatSend + WasmCompatSync {
    /// Resolve `source` (a filesystem path or URL) to a data URL.
    fn resolve<'a>(&'a self, source: &'a str) -> WasmBoxedFuture<'a, Result<String, String>>;
}

/// Hands out a fresh cancellation scope for each chat turn. An external
/// caller (e.g. a SIGINT handler) calls [`InterruptSource::interrupt`] to
/// cancel whichever scope is currently active; [`ChatActor::run_chat_loop`]
/// calls [`InterruptSource::scope`] once per turn to get a token to race its
/// LLM/tool-call work against.
pub struct InterruptSource {
    current: AsyncMutex<CancellationToken>,
}

impl InterruptSource {
    /// Build a fresh, uncancelled interrupt source.
    #[must_use]
    pub fn new() -> Self {
        Self { current: AsyncMutex::new(CancellationToken::new()) }
    }

    /// Start a new turn's cancellation scope, replacing whatever scope was
    /// active before.
    pub async fn scope(&self) -> CancellationToken {
        let mut current = self.current.lock().await;
        *current = CancellationToken::new();
        current.clone()
    }

    /// Cancel whichever scope is currently active.
    pub async fn interrupt(&self) {
        self.current.lock().await.cancel();
    }
}

impl Default for InterruptSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives one interactive chat session to completion (i.e. until `/exit`)
/// against a fixed LLM Actor, Tool-Call Actor, and User Actor.
pub struct ChatActor {
    llm: Mailbox<LlmMessage>,
    tool_call: Mailbox<ToolCallMessage>,
    user: Mailbox<UserMessage>,
    model: String,
    tool_definitions: Vec<ToolDefinition>,
    tool_context_template: ToolContext,
    image_resolver: Option<Arc<dyn ImageResolver>>,
    callbacks: Option<Arc<dyn ProgressCallbacks>>,
}

impl ChatActor {
    /// Bind a chat session to its peers.
    #[must_use]
    pub fn new(
        llm: Mailbox<LlmMessage>,
        tool_call: Mailbox<ToolCallMessage>,
        user: Mailbox<UserMessage>,
        model: String,
        tool_definitions: Vec<ToolDefinition>,
        tool_context_template: ToolContext,
        image_resolver: Option<Arc<dyn ImageResolver>>,
        callbacks: Option<Arc<dyn ProgressCallbacks>>,
    ) -> Self {
        Self {
            llm,
            tool_call,
            user,
            model,
            tool_definitions,
            tool_context_template,
            image_resolver,
            callbacks,
        }
    }

    fn emit_user(&self, history: &mut Vec<Message>, message: Message, force: bool) {
        history::append_user_message(history, message, force, self.callbacks.as_ref(), "chat");
    }

    /// Run the interactive loop until the human sends `/exit`.
    ///
    /// If `history` is non-empty on entry (a resumed session), every
    /// existing user/assistant message is first replayed through
    /// [`ProgressCallbacks`] with `force: true` so a freshly attached
    /// renderer can show scrollback before new turns begin.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::UnexpectedFinish`] if the agent calls
    /// `finish_task` during a chat turn (a protocol violation: chat sessions
    /// end on `/exit`, never on the agent declaring itself finished).
    /// Propagates LLM/tool/correlation/user-input failures otherwise.
    pub async fn run_chat_loop(
        &self,
        history: &mut Vec<Message>,
        instructions: Option<&str>,
        interrupts: &InterruptSource,
    ) -> Result<(), ChatError> {
        if let Some(callbacks) = &self.callbacks {
            for message in history.iter() {
                match message.role {
                    Role::Assistant => callbacks.on_assistant_message("chat", message, true),
                    Role::User => callbacks.on_user_message("chat", message, true),
                    Role::System => {}
                }
            }
        }

        let start_text = messages::chat_start_message(instructions);
        self.emit_user(history, Message { role: Role::User, content: vec![ContentBlock::Text(start_text)] }, true);

        let mut usage = Usage::default();
        let mut need_user_input = true;
        let mut queued: VecDeque<ChatPromptInput> = VecDeque::new();

        loop {
            if need_user_input {
                if let Some(callbacks) = &self.callbacks {
                    callbacks.on_status_message(&messages::usage_line(&usage), StatusLevel::Info);
                }

                let input = match queued.pop_front() {
                    Some(input) => input,
                    None => {
                        let words = messages::COMMANDS.iter().map(|s| (*s).to_string()).collect();
                        let reply = correlate::call("user", &self.user, |_request_id, reply_to| {
                            UserMessage::AgentYieldedToUser { words, reply_to }
                        })
                        .await
                        .map_err(|err| ChatError::Agent(AgentError::Correlation(err)))?;
                        match reply {
                            Ok(parsed) => parsed,
                            Err(user_err) => return Err(ChatError::UserInputFailed(user_err.0)),
                        }
                    }
                };

                match input {
                    ChatPromptInput::Exit => break,
                    ChatPromptInput::Clear => {
                        let first = history.first().cloned();
                        history::clear_history(history, first.into_iter().collect(), self.callbacks.as_ref(), messages::CONVERSATION_CLEARED);
                        continue;
                    }
                    ChatPromptInput::Compact => {
                        let directive = Message { role: Role::User, content: vec![ContentBlock::Text(messages::COMPACT_DIRECTIVE.to_string())] };
                        self.emit_user(history, directive, false);
                        need_user_input = false;
                    }
                    ChatPromptInput::Image(Some(source)) => {
                        let Some(resolver) = &self.image_resolver else {
                            if let Some(callbacks) = &self.callbacks {
                                callbacks.on_status_message(messages::IMAGE_ARG_REQUIRED, StatusLevel::Warning);
                            }
                            continue;
                        };
                        match resolver.resolve(&source).await {
                            Ok(data_url) => {
                                let image = Message { role: Role::User, content: vec![ContentBlock::Image { source: ImageSource::Url { url: data_url } }] };
                                self.emit_user(history, image, false);
                                need_user_input = false;
                            }
                            Err(err) => {
                                if let Some(callbacks) = &self.callbacks {
                                    callbacks.on_status_message(&err, StatusLevel::Warning);
                                }
                                continue;
                            }
                        }
                    }
                    ChatPromptInput::Image(None) => {
                        if let Some(callbacks) = &self.callbacks {
                            callbacks.on_status_message(messages::IMAGE_ARG_REQUIRED, StatusLevel::Warning);
                        }
                        continue;
                    }
                    ChatPromptInput::Help => {
                        if let Some(callbacks) = &self.callbacks {
                            callbacks.on_status_message(messages::HELP_TEXT, StatusLevel::Info);
                        }
                        continue;
                    }
                    ChatPromptInput::Text(text) => {
                        self.emit_user(history, Message { role: Role::User, content: vec![ContentBlock::Text(text)] }, false);
                        need_user_input = false;
                    }
                }
            }

            let turn_token = interrupts.scope().await;
            let request = CompleteStepRequest {
                history: history.clone(),
                model: self.model.clone(),
                tools: self.tool_definitions.clone(),
                system: None,
                tool_choice: None,
                callbacks: self.callbacks.clone(),
            };

            let llm_call = correlate::call("llm", &self.llm, |request_id, reply_to| {
                LlmMessage::CompleteStep { request_id, request, reply_to }
            });

            let step_result = tokio::select! {
                biased;
                () = turn_token.cancelled() => None,
                result = llm_call => Some(result),
            };

            let Some(step_result) = step_result else {
                need_user_input = true;
                continue;
            };

            let response = step_result
                .map_err(|err| ChatError::Agent(AgentError::Correlation(err)))?
                .map_err(|err| ChatError::Agent(AgentError::Llm(err)))?;

            history::append_assistant_message(history, response.message.clone(), self.callbacks.as_ref(), "chat");
            usage.tokens = response.usage.input_tokens + response.usage.output_tokens;

            let calls = tool_calls_of(&response.message);
            if calls.is_empty() {
                need_user_input = true;
                continue;
            }

            let ctx = self.tool_context_template.clone();
            let handle_response = correlate::cancellable_call(
                "tool-call",
                &self.tool_call,
                &turn_token,
                |request_id, reply_to| ToolCallMessage::Handle {
                    request_id,
                    assistant_message: response.message.clone(),
                    ctx: ctx.clone(),
                    reply_to,
                },
                |request_id| ToolCallMessage::Cancel { request_id },
            )
            .await
            .map_err(|err| ChatError::Agent(AgentError::Correlation(err)))?;

            for record in handle_response.results {
                match record.result {
                    ToolResult::Compact { summary } => {
                        let first = history.first().cloned();
                        history::clear_history(history, first.into_iter().collect(), self.callbacks.as_ref(), agent_messages::CONVERSATION_COMPACTED);
                        self.emit_user(
                            history,
                            Message { role: Role::User, content: vec![ContentBlock::Text(agent_messages::compaction_summary_message(&summary))] },
                            false,
                        );
                        history::append_tool_message(
                            history,
                            record.tool_call_id,
                            &record.name,
                            agent_messages::CONVERSATION_COMPACTED.to_string(),
                            false,
                            self.callbacks.as_ref(),
                            "chat",
                        );
                    }
                    ToolResult::Text { content } => {
                        history::append_tool_message(history, record.tool_call_id, &record.name, content, false, self.callbacks.as_ref(), "chat");
                    }
                    ToolResult::Finish { .. } => {
                        return Err(ChatError::UnexpectedFinish(record.name));
                    }
                }
            }

            if handle_response.cancelled {
                need_user_input = true;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Actor;
    use crate::tool_call::{CapabilityMessage, ToolCallActor, ToolCapabilityActor};
    use crate::user::UserActor;
    use agent_types::{CompletionRequest, CompletionResponse, Provider, ProviderError, StopReason, TokenUsage, Tool, ToolContext};
    use crate::user::UserInterface;
    use std::collections::HashMap;
    use std::future::Future;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use crate::user::UserInputError;

    fn test_ctx() -> ToolContext {
        ToolContext {
            cwd: PathBuf::from("."),
            session_id: "s".into(),
            environment: HashMap::new(),
            cancellation_token: CancellationToken::new(),
            progress_reporter: None,
        }
    }

    struct ScriptedUi {
        lines: StdMutex<Vec<String>>,
    }

    impl UserInterface for ScriptedUi {
        fn ask<'a>(&'a self, _prompt: &'a str, _default: Option<&'a str>) -> WasmBoxedFuture<'a, Result<String, UserInputError>> {
            Box::pin(async move { self.next_line() })
        }
        fn confirm<'a>(&'a self, _prompt: &'a str) -> WasmBoxedFuture<'a, Result<bool, UserInputError>> {
            Box::pin(async move { self.next_line().map(|l| l == "yes") })
        }
        fn read_line<'a>(&'a self, _prompt: &'a str) -> WasmBoxedFuture<'a, Result<String, UserInputError>> {
            Box::pin(async move { self.next_line() })
        }
    }

    impl ScriptedUi {
        fn next_line(&self) -> Result<String, UserInputError> {
            let mut lines = self.lines.lock().unwrap();
            if lines.is_empty() {
                Err(UserInputError("no more scripted input".to_string()))
            } else {
                Ok(lines.remove(0))
            }
        }
    }

    struct ScriptedProvider {
        responses: Vec<CompletionResponse>,
        calls: AtomicUsize,
    }

    impl Provider for ScriptedProvider {
        fn complete(&self, _request: CompletionRequest) -> impl Future<Output = Result<CompletionResponse, ProviderError>> + Send {
            let index = self.calls.fetch_add(1, Ordering::SeqCst).min(self.responses.len() - 1);
            let response = self.responses[index].clone();
            async move { Ok(response) }
        }
        fn complete_stream(&self, _request: CompletionRequest) -> impl Future<Output = Result<agent_types::StreamHandle, ProviderError>> + Send {
            async move { Err(ProviderError::Transport("not implemented".into())) }
        }
    }

    struct EchoArgsTool(&'static str);
    impl Tool for EchoArgsTool {
        const NAME: &'static str = "echo_args";
        type Args = serde_json::Value;
        type Output = serde_json::Value;
        type Error = std::convert::Infallible;
        fn definition(&self) -> ToolDefinition {
            ToolDefinition { name: self.0.into(), title: None, description: "".into(), input_schema: serde_json::json!({"type": "object"}), output_schema: None, annotations: None, cache_control: None }
        }
        fn call(&self, args: Self::Args, _ctx: &ToolContext) -> impl Future<Output = Result<Self::Output, Self::Error>> + Send {
            async move { Ok(args) }
        }
    }

    fn tool_definitions() -> Vec<ToolDefinition> {
        vec![ToolDefinition { name: "compact_conversation".into(), title: None, description: "".into(), input_schema: serde_json::json!({"type": "object"}), output_schema: None, annotations: None, cache_control: None }]
    }

    fn assistant_tool_call(id: &str, name: &str, input: serde_json::Value) -> Message {
        Message { role: Role::Assistant, content: vec![ContentBlock::ToolUse { id: id.into(), name: name.into(), input }] }
    }

    fn usage(tokens: u64) -> TokenUsage {
        TokenUsage { input_tokens: tokens, output_tokens: 0, ..Default::default() }
    }

    #[tokio::test]
    async fn exit_ends_the_loop_without_calling_the_llm() {
        let ui = Arc::new(ScriptedUi { lines: StdMutex::new(vec!["/exit".to_string()]) });
        let user_actor = Actor::spawn("user", UserActor::new(ui));

        let provider = ScriptedProvider { responses: vec![], calls: AtomicUsize::new(0) };
        let llm_actor = Actor::spawn("llm", crate::llm::LLMActor::new(provider));
        let tool_call_actor = Actor::spawn("tool-call", ToolCallActor::new(HashMap::new(), None, None));

        let chat = ChatActor::new(
            llm_actor.sender(),
            tool_call_actor.sender(),
            user_actor.sender(),
            "test-model".into(),
            tool_definitions(),
            test_ctx(),
            None,
            None,
        );

        let mut history = vec![];
        let interrupts = InterruptSource::new();
        chat.run_chat_loop(&mut history, None, &interrupts).await.unwrap();
    }

    #[tokio::test]
    async fn compact_tool_result_clears_history_without_forcing() {
        let ui = Arc::new(ScriptedUi { lines: StdMutex::new(vec!["hello".to_string(), "/exit".to_string()]) });
        let user_actor = Actor::spawn("user", UserActor::new(ui));

        let provider = ScriptedProvider {
            responses: vec![
                CompletionResponse {
                    id: "1".into(),
                    model: "m".into(),
                    message: assistant_tool_call("c1", "compact_conversation", serde_json::json!({"summary": "we did stuff"})),
                    usage: usage(10),
                    stop_reason: StopReason::ToolUse,
                },
                CompletionResponse {
                    id: "2".into(),
                    model: "m".into(),
                    message: Message { role: Role::Assistant, content: vec![ContentBlock::Text("anything else?".into())] },
                    usage: usage(5),
                    stop_reason: StopReason::EndTurn,
                },
            ],
            calls: AtomicUsize::new(0),
        };
        let llm_actor = Actor::spawn("llm", crate::llm::LLMActor::new(provider));

        let compact_cap = Actor::spawn("compact_conversation", ToolCapabilityActor::new(Arc::new(EchoArgsTool("compact_conversation"))));
        let mut capabilities = HashMap::new();
        capabilities.insert("compact_conversation".to_string(), compact_cap.sender());
        let tool_call_actor = Actor::spawn("tool-call", ToolCallActor::new(capabilities, None, None));

        let chat = ChatActor::new(
            llm_actor.sender(),
            tool_call_actor.sender(),
            user_actor.sender(),
            "test-model".into(),
            tool_definitions(),
            test_ctx(),
            None,
            None,
        );

        let mut history = vec![];
        let interrupts = InterruptSource::new();
        chat.run_chat_loop(&mut history, None, &interrupts).await.unwrap();

        // history: [start(forced), "hello", assistant tool-use, summary user msg, tool result]
        let summary_present = history.iter().any(|m| matches!(&m.content.first(), Some(ContentBlock::Text(t)) if t.contains("we did stuff")));
        assert!(summary_present);
    }

    #[tokio::test]
    async fn finish_task_during_chat_is_a_protocol_violation() {
        let ui = Arc::new(ScriptedUi { lines: StdMutex::new(vec!["hello".to_string()]) });
        let user_actor = Actor::spawn("user", UserActor::new(ui));

        let provider = ScriptedProvider {
            responses: vec![CompletionResponse {
                id: "1".into(),
                model: "m".into(),
                message: assistant_tool_call("c1", "finish_task", serde_json::json!({"result": "r", "summary": "s"})),
                usage: usage(10),
                stop_reason: StopReason::ToolUse,
            }],
            calls: AtomicUsize::new(0),
        };
        let llm_actor = Actor::spawn("llm", crate::llm::LLMActor::new(provider));

        let finish_cap = Actor::spawn("finish_task", ToolCapabilityActor::new(Arc::new(EchoArgsTool("finish_task"))));
        let mut capabilities = HashMap::new();
        capabilities.insert("finish_task".to_string(), finish_cap.sender());
        let tool_call_actor = Actor::spawn("tool-call", ToolCallActor::new(capabilities, None, None));

        let chat = ChatActor::new(
            llm_actor.sender(),
            tool_call_actor.sender(),
            user_actor.sender(),
            "test-model".into(),
            tool_definitions(),
            test_ctx(),
            None,
            None,
        );

        let mut history = vec![];
        let interrupts = InterruptSource::new();
        let err = chat.run_chat_loop(&mut history, None, &interrupts).await.unwrap_err();
        assert!(matches!(err, ChatError::UnexpectedFinish(name) if name == "finish_task"));
    }

    #[test]
    fn usage_line_matches_the_preserved_format() {
        let usage = Usage { tokens: 123, cost: 4.5 };
        assert_eq!(messages::usage_line(&usage), "\u{1F4B0} 123 tokens \u{2022} $4.50");
    }
}
