//! The Agent Actor: drives one goal-directed turn loop to completion.
//!
//! Unlike the LLM/Tool-Call/Capability actors, the Agent Actor is not its own
//! `Actor<M>` mailbox: a single run has exactly one caller (whatever launched
//! it, directly or as a nested sub-agent) and proceeds turn by turn on that
//! caller's own task rather than interleaving unrelated requests, so a
//! mailbox would only add an indirection nothing needs. It reaches its peers
//! — the LLM Actor and the Tool-Call Actor — the same way
//! `agent_actors::tool_call::executor` reaches capability actors: by holding
//! a cloned `Mailbox` directly.

use std::sync::Arc;

use agent_types::{
    tool_calls_of, AgentDescription, AgentOutput, AgentState, ContentBlock, Message,
    ProgressCallbacks, Role, ToolContext, ToolDefinition, ToolResult,
};

use crate::correlate;
use crate::error::{AgentError, WiringError};
use crate::history;
use crate::llm::{CompleteStepRequest, LlmMessage};
use crate::runtime::Mailbox;
use crate::tool_call::ToolCallMessage;

/// Preserved strings and template renderers for the agent turn loop.
pub mod messages {
    use agent_types::Parameter;

    /// Returned when `run_agent_loop` is called on a state whose output is
    /// already set — a caller re-driving a finished run is a programmer
    /// error, not a recoverable one.
    pub const ALREADY_FINISHED: &str = "Agent already has a result or summary.";

    /// The Tool message text appended when a `finish_task` call settles the
    /// run.
    pub const AGENT_OUTPUT_SET: &str = "Agent output set.";

    /// The Tool message text appended when a `compact_conversation` call
    /// clears history.
    pub const CONVERSATION_COMPACTED: &str = "Conversation compacted and history reset.";

    /// Appended as a fresh user message whenever an assistant turn carries
    /// no tool calls at all, nudging the model back toward making progress.
    pub const NO_TOOL_CALLS_DIRECTIVE: &str =
        "You did not call a tool. Call `finish_task` once your work is complete, or another \
         available tool to keep making progress.";

    /// Render the first message of a task-driven agent run: its name,
    /// instructions, and ordered parameter list.
    #[must_use]
    pub fn start_message(name: &str, instructions: &str, parameters: &[Parameter]) -> String {
        let mut text = format!("# Task: {name}\n\n{instructions}\n");
        if !parameters.is_empty() {
            text.push_str("\n## Parameters\n");
            for parameter in parameters {
                text.push_str(&format!(
                    "- **{}** ({}): {}\n",
                    parameter.name, parameter.description, parameter.value
                ));
            }
        }
        text
    }

    /// Render the synthetic user message a `compact_conversation` result
    /// reseeds history with.
    #[must_use]
    pub fn compaction_summary_message(summary: &str) -> String {
        format!(
            "A summary of your conversation with the client until now: {summary}\n\
             Please continue your work."
        )
    }

    /// Appended when the last completion's token usage crosses the
    /// compaction threshold, directing the model to compact on its own next
    /// turn rather than compacting unilaterally out from under it.
    #[must_use]
    pub fn compact_directive(compact_at_tokens: u64) -> String {
        format!(
            "This conversation has grown past {compact_at_tokens} tokens. Call \
             `compact_conversation` with a summary on your next turn before continuing."
        )
    }
}

const FINISH_TASK: &str = "finish_task";
const COMPACT_CONVERSATION: &str = "compact_conversation";

/// Drives one agent run to completion against a fixed LLM Actor and
/// Tool-Call Actor.
pub struct AgentActor {
    tool_definitions: Vec<ToolDefinition>,
    llm: Mailbox<LlmMessage>,
    tool_call: Mailbox<ToolCallMessage>,
    tool_context_template: ToolContext,
    callbacks: Option<Arc<dyn ProgressCallbacks>>,
    compact_at_tokens: u64,
}

impl AgentActor {
    /// Bind an agent run to its peers, validating that the built-in
    /// `finish_task`/`compact_conversation` capabilities are present in
    /// `tool_definitions` — without them the loop could run forever with no
    /// way to terminate or compact.
    ///
    /// # Errors
    ///
    /// Returns [`WiringError::MissingTool`] naming whichever of the two is
    /// absent.
    pub fn new(
        tool_definitions: Vec<ToolDefinition>,
        llm: Mailbox<LlmMessage>,
        tool_call: Mailbox<ToolCallMessage>,
        tool_context_template: ToolContext,
        callbacks: Option<Arc<dyn ProgressCallbacks>>,
        compact_at_tokens: u64,
    ) -> Result<Self, WiringError> {
        for required in [FINISH_TASK, COMPACT_CONVERSATION] {
            if !tool_definitions.iter().any(|def| def.name == required) {
                return Err(WiringError::MissingTool(required.to_string()));
            }
        }
        Ok(Self { tool_definitions, llm, tool_call, tool_context_template, callbacks, compact_at_tokens })
    }

    /// Run `description` to completion against `state`, mutating it in place
    /// turn by turn until `state.output` is set by a `finish_task` result.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Invariant`] if `state.output` is already set.
    /// Propagates any LLM, tool, or correlation failure encountered along
    /// the way; `state` holds whatever partial history accumulated before
    /// the failure.
    pub async fn run_agent_loop(
        &self,
        description: &AgentDescription,
        state: &mut AgentState,
    ) -> Result<(), AgentError> {
        if state.output.is_some() {
            return Err(AgentError::Invariant(messages::ALREADY_FINISHED.to_string()));
        }

        let start_text =
            messages::start_message(&description.name, &description.instructions, &description.parameters);
        history::append_user_message(
            &mut state.history,
            Message { role: Role::User, content: vec![ContentBlock::Text(start_text)] },
            false,
            self.callbacks.as_ref(),
            &description.name,
        );

        while state.output.is_none() {
            self.run_one_turn(description, state).await?;
        }

        Ok(())
    }

    async fn run_one_turn(&self, description: &AgentDescription, state: &mut AgentState) -> Result<(), AgentError> {
        let request = CompleteStepRequest {
            history: state.history.clone(),
            model: description.model.clone().unwrap_or_default(),
            tools: self.tool_definitions.clone(),
            system: None,
            tool_choice: None,
            callbacks: self.callbacks.clone(),
        };

        let response = correlate::call("llm", &self.llm, |request_id, reply_to| {
            LlmMessage::CompleteStep { request_id, request, reply_to }
        })
        .await
        .map_err(AgentError::Correlation)?
        .map_err(AgentError::Llm)?;

        history::append_assistant_message(
            &mut state.history,
            response.message.clone(),
            self.callbacks.as_ref(),
            &description.name,
        );
        state.usage.tokens = response.usage.input_tokens + response.usage.output_tokens;

        let calls = tool_calls_of(&response.message);
        if calls.is_empty() {
            history::append_user_message(
                &mut state.history,
                Message { role: Role::User, content: vec![ContentBlock::Text(messages::NO_TOOL_CALLS_DIRECTIVE.to_string())] },
                false,
                self.callbacks.as_ref(),
                &description.name,
            );
        } else {
            let handle_response = correlate::call("tool-call", &self.tool_call, |request_id, reply_to| {
                ToolCallMessage::Handle {
                    request_id,
                    assistant_message: response.message.clone(),
                    ctx: self.tool_context_template.clone(),
                    reply_to,
                }
            })
            .await
            .map_err(AgentError::Correlation)?;

            for record in handle_response.results {
                self.apply_tool_result(description, state, record);
            }
        }

        if state.usage.tokens > self.compact_at_tokens {
            history::append_user_message(
                &mut state.history,
                Message {
                    role: Role::User,
                    content: vec![ContentBlock::Text(messages::compact_directive(self.compact_at_tokens))],
                },
                false,
                self.callbacks.as_ref(),
                &description.name,
            );
        }

        Ok(())
    }

    fn apply_tool_result(
        &self,
        description: &AgentDescription,
        state: &mut AgentState,
        record: crate::tool_call::ToolExecutionRecord,
    ) {
        match record.result {
            ToolResult::Finish { result, summary } => {
                state.output = Some(AgentOutput { result, summary });
                history::append_tool_message(
                    &mut state.history,
                    record.tool_call_id,
                    &record.name,
                    messages::AGENT_OUTPUT_SET.to_string(),
                    false,
                    self.callbacks.as_ref(),
                    &description.name,
                );
            }
            ToolResult::Compact { summary } => {
                let first = state.history.first().cloned();
                history::clear_history(
                    &mut state.history,
                    first.into_iter().collect(),
                    self.callbacks.as_ref(),
                    messages::CONVERSATION_COMPACTED,
                );
                history::append_user_message(
                    &mut state.history,
                    Message {
                        role: Role::User,
                        content: vec![ContentBlock::Text(messages::compaction_summary_message(&summary))],
                    },
                    false,
                    self.callbacks.as_ref(),
                    &description.name,
                );
                history::append_tool_message(
                    &mut state.history,
                    record.tool_call_id,
                    &record.name,
                    messages::CONVERSATION_COMPACTED.to_string(),
                    false,
                    self.callbacks.as_ref(),
                    &description.name,
                );
            }
            ToolResult::Text { content } => {
                history::append_tool_message(
                    &mut state.history,
                    record.tool_call_id,
                    &record.name,
                    content,
                    false,
                    self.callbacks.as_ref(),
                    &description.name,
                );
            }
        }
    }
}
