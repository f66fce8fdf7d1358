//! The Tool Capability Actor: one instance per registered tool, owning the
//! tool's `Arc<dyn ToolDyn>` for its whole lifetime.
//!
//! Execution races the tool's own future against `ctx.cancellation_token`
//! rather than spawning and aborting a child task: a raw `JoinHandle::abort`
//! can sever a tool mid-write with no chance to clean up, while racing a
//! `tokio::select!` against the same token the tool already receives in its
//! `ToolContext` lets well-behaved tools observe cancellation cooperatively,
//! with the race as a backstop for ones that don't check it.

use std::sync::Arc;

use agent_types::{ToolContext, ToolDyn, ToolError, ToolOutput};
use tokio::sync::oneshot;

use crate::runtime::{to_trace_fields, ActorHandler, HandlerError};

/// The outcome of one [`CapabilityMessage::Execute`] call.
#[derive(Debug)]
pub enum ExecuteOutcome {
    /// The tool ran to completion, successfully or not.
    Completed(Result<ToolOutput, ToolError>),
    /// `ctx.cancellation_token` fired before the tool finished.
    Cancelled,
}

/// Messages handled by [`ToolCapabilityActor`].
pub enum CapabilityMessage {
    /// Run the bound tool with `arguments` under `ctx`.
    Execute {
        /// JSON arguments to pass to the tool.
        arguments: serde_json::Value,
        /// Per-call execution context; `ctx.cancellation_token` is what
        /// this call races its execution against.
        ctx: ToolContext,
        /// Settled exactly once with the outcome.
        reply_to: oneshot::Sender<ExecuteOutcome>,
    },
}

/// Wraps one [`ToolDyn`] and serialises calls against it.
///
/// One registered tool gets exactly one capability actor, so two concurrent
/// calls to the *same* tool name serialise through this actor's mailbox;
/// calls to different tools run on different actors and proceed in
/// parallel. A batch that calls one tool name twice is rare enough in
/// practice that this trade-off isn't worth a more complex per-tool
/// concurrency story.
pub struct ToolCapabilityActor {
    tool: Arc<dyn ToolDyn>,
}

impl ToolCapabilityActor {
    /// Bind a tool to a new capability actor handler.
    #[must_use]
    pub fn new(tool: Arc<dyn ToolDyn>) -> Self {
        Self { tool }
    }
}

impl ActorHandler<CapabilityMessage> for ToolCapabilityActor {
    async fn handle(&mut self, message: CapabilityMessage) -> Result<(), HandlerError> {
        match message {
            CapabilityMessage::Execute { arguments, ctx, reply_to } => {
                let cancel_token = ctx.cancellation_token.clone();
                let outcome = tokio::select! {
                    biased;
                    () = cancel_token.cancelled() => ExecuteOutcome::Cancelled,
                    result = self.tool.call_dyn(arguments, &ctx) => ExecuteOutcome::Completed(result),
                };
                let _ = reply_to.send(outcome);
            }
        }
        Ok(())
    }

    fn trace_fields(&self, message: &CapabilityMessage) -> Option<String> {
        let CapabilityMessage::Execute { arguments, .. } = message;
        Some(to_trace_fields(arguments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Actor;
    use std::collections::HashMap;
    use std::future::Future;
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    use agent_types::{Tool, ToolDefinition};

    struct SleepEcho;

    impl Tool for SleepEcho {
        const NAME: &'static str = "sleep_echo";
        type Args = serde_json::Value;
        type Output = serde_json::Value;
        type Error = std::convert::Infallible;

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: Self::NAME.into(),
                title: None,
                description: "sleeps then echoes its input".into(),
                input_schema: serde_json::json!({"type": "object"}),
                output_schema: None,
                annotations: None,
                cache_control: None,
            }
        }

        fn call(
            &self,
            args: Self::Args,
            _ctx: &ToolContext,
        ) -> impl Future<Output = Result<Self::Output, Self::Error>> + Send {
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(args)
            }
        }
    }

    fn test_ctx(token: CancellationToken) -> ToolContext {
        ToolContext {
            cwd: PathBuf::from("."),
            session_id: "s".into(),
            environment: HashMap::new(),
            cancellation_token: token,
            progress_reporter: None,
        }
    }

    #[tokio::test]
    async fn execute_completes_without_cancellation() {
        let actor = Actor::spawn("cap", ToolCapabilityActor::new(Arc::new(SleepEcho)));
        let (reply_tx, reply_rx) = oneshot::channel();
        actor
            .send(CapabilityMessage::Execute {
                arguments: serde_json::json!({"x": 1}),
                ctx: test_ctx(CancellationToken::new()),
                reply_to: reply_tx,
            })
            .unwrap();
        let outcome = reply_rx.await.unwrap();
        assert!(matches!(outcome, ExecuteOutcome::Completed(Ok(_))));
    }

    #[tokio::test]
    async fn execute_is_interrupted_by_cancellation() {
        let actor = Actor::spawn("cap", ToolCapabilityActor::new(Arc::new(SleepEcho)));
        let token = CancellationToken::new();
        let (reply_tx, reply_rx) = oneshot::channel();
        actor
            .send(CapabilityMessage::Execute {
                arguments: serde_json::json!({}),
                ctx: test_ctx(token.clone()),
                reply_to: reply_tx,
            })
            .unwrap();
        token.cancel();
        let outcome = reply_rx.await.unwrap();
        assert!(matches!(outcome, ExecuteOutcome::Cancelled));
    }
}
