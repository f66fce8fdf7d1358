//! The LLM Actor: serialises completion requests against one bound
//! [`Provider`], returning an assistant message plus usage.
//!
//! `LLMActor<P>` is generic over its provider rather than `dyn Provider`,
//! since [`Provider::complete`] is RPITIT and therefore not object-safe —
//! this mirrors the trait's own doc comment, which recommends generics over
//! dynamic dispatch for composition. One actor instance binds exactly one
//! provider for its whole lifetime; concurrently running agent/chat sessions
//! that want different callbacks for the *same* provider pass those
//! callbacks on each request rather than mutating actor state, which is
//! what keeps callbacks from leaking between unrelated in-flight requests
//! sharing one actor's mailbox.
//!
//! Completions are fully aggregated — `complete_step` drives
//! [`Provider::complete`], not `complete_stream`; the streaming transport
//! that would turn provider SSE chunks into `on_content_chunk`/
//! `on_reasoning_chunk` callback events is exactly the HTTP/SSE layer this
//! workspace treats as an external collaborator (see crate docs), so this
//! actor's contract is satisfied by any conforming `Provider` whether or
//! not it streams internally.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::Instrument;

use agent_types::{
    CompletionRequest, Message, ProgressCallbacks, Provider, StopReason, SystemPrompt,
    TokenUsage, ToolChoice, ToolDefinition,
};

use crate::error::LlmError;
use crate::runtime::{ActorHandler, HandlerError};

/// A single `complete_step` call: the history/model/tools to send, plus a
/// request-scoped callback sink.
pub struct CompleteStepRequest {
    /// Full conversation history to send as the completion's messages.
    pub history: Vec<Message>,
    /// Model identifier to request.
    pub model: String,
    /// Tool definitions offered to the model for this request.
    pub tools: Vec<ToolDefinition>,
    /// Optional system prompt.
    pub system: Option<SystemPrompt>,
    /// How the model should decide whether/which tool to call.
    pub tool_choice: Option<ToolChoice>,
    /// Request-scoped progress sink; not stored on the actor.
    pub callbacks: Option<Arc<dyn ProgressCallbacks>>,
}

impl CompleteStepRequest {
    /// Build a request with no tool choice override and no callbacks.
    #[must_use]
    pub fn new(history: Vec<Message>, model: impl Into<String>, tools: Vec<ToolDefinition>) -> Self {
        Self {
            history,
            model: model.into(),
            tools,
            system: None,
            tool_choice: None,
            callbacks: None,
        }
    }
}

/// The result of a successful `complete_step` call.
#[derive(Debug, Clone)]
pub struct CompleteStepResponse {
    /// The assistant message produced.
    pub message: Message,
    /// Token usage for this completion.
    pub usage: TokenUsage,
    /// Why the model stopped.
    pub stop_reason: StopReason,
}

/// Messages handled by [`LLMActor`].
pub enum LlmMessage {
    /// Request a completion. Replies exactly once.
    CompleteStep {
        /// Correlates this request with its tracing span.
        request_id: String,
        /// The request payload.
        request: CompleteStepRequest,
        /// Settled exactly once with the outcome.
        reply_to: oneshot::Sender<Result<CompleteStepResponse, LlmError>>,
    },
}

/// Wraps one [`Provider`] and serialises completion requests against it.
pub struct LLMActor<P: Provider> {
    provider: P,
}

impl<P: Provider> LLMActor<P> {
    /// Bind a provider to a new LLM actor handler.
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    async fn complete_step(
        &self,
        request: CompleteStepRequest,
    ) -> Result<CompleteStepResponse, LlmError> {
        if request.history.is_empty() {
            return Err(LlmError::EmptyHistory);
        }

        let completion_request = CompletionRequest {
            model: request.model,
            messages: request.history,
            system: request.system,
            tools: request.tools,
            max_tokens: None,
            temperature: None,
            top_p: None,
            stop_sequences: Vec::new(),
            tool_choice: request.tool_choice,
            response_format: None,
            thinking: None,
            reasoning_effort: None,
            extra: None,
        };

        let response = self.provider.complete(completion_request).await?;

        if let Some(callbacks) = &request.callbacks {
            callbacks.on_chunks_end();
        }

        Ok(CompleteStepResponse {
            message: response.message,
            usage: response.usage,
            stop_reason: response.stop_reason,
        })
    }
}

impl<P: Provider> ActorHandler<LlmMessage> for LLMActor<P> {
    async fn handle(&mut self, message: LlmMessage) -> Result<(), HandlerError> {
        match message {
            LlmMessage::CompleteStep { request_id, request, reply_to } => {
                let span = tracing::info_span!(
                    "llm.complete_step",
                    request_id = %request_id,
                    model = %request.model,
                );
                let result = self.complete_step(request).instrument(span).await;
                if let Err(err) = &result {
                    tracing::warn!(request_id = %request_id, error = %err, "llm completion failed");
                }
                let _ = reply_to.send(result);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_types::{CompletionResponse, ContentBlock, ProviderError, Role};
    use std::future::Future;

    struct StubProvider {
        response: CompletionResponse,
    }

    impl Provider for StubProvider {
        fn complete(
            &self,
            _request: CompletionRequest,
        ) -> impl Future<Output = Result<CompletionResponse, ProviderError>> + Send {
            let response = self.response.clone();
            async move { Ok(response) }
        }

        fn complete_stream(
            &self,
            _request: CompletionRequest,
        ) -> impl Future<Output = Result<agent_types::StreamHandle, ProviderError>> + Send {
            async move { Err(ProviderError::Transport("streaming not implemented".into())) }
        }
    }

    fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            id: "resp-1".to_string(),
            model: "test-model".to_string(),
            message: Message {
                role: Role::Assistant,
                content: vec![ContentBlock::Text(text.to_string())],
            },
            usage: TokenUsage { input_tokens: 10, output_tokens: 5, ..Default::default() },
            stop_reason: StopReason::EndTurn,
        }
    }

    #[tokio::test]
    async fn complete_step_returns_assistant_message() {
        let actor = LLMActor::new(StubProvider { response: text_response("hi") });
        let request = CompleteStepRequest::new(
            vec![Message { role: Role::User, content: vec![ContentBlock::Text("go".into())] }],
            "test-model",
            vec![],
        );
        let result = actor.complete_step(request).await.unwrap();
        assert_eq!(result.stop_reason, StopReason::EndTurn);
    }

    #[tokio::test]
    async fn complete_step_rejects_empty_history() {
        let actor = LLMActor::new(StubProvider { response: text_response("hi") });
        let request = CompleteStepRequest::new(vec![], "test-model", vec![]);
        let err = actor.complete_step(request).await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyHistory));
    }
}
