//! The Tool Call Actor: fans every tool call in one assistant message out
//! across their bound Tool Capability Actors and collects the results.
//!
//! Cancellation is a single per-batch `CancellationToken`; each call's
//! `ToolContext` gets a child of it, so cancelling the batch cancels every
//! call still in flight (completed calls are unaffected — their records are
//! still returned, with `cancelled: false`) while the *batch's* `cancelled`
//! flag on the reply reports whether `Cancel` fired at all.

use std::collections::HashMap;
use std::sync::Arc;

use agent_types::{tool_calls_of, Message, ProgressCallbacks, ToolContext};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use crate::runtime::{ActorHandler, HandlerError, Mailbox};
use crate::tool_call::capability::CapabilityMessage;
use crate::tool_call::executor::{execute_one, BeforeToolExecutionHook, ToolExecutionRecord};

/// The reply to a [`ToolCallMessage::Handle`] request.
#[derive(Debug, Clone)]
pub struct HandleToolCallsResponse {
    /// One record per tool call in the originating assistant message, in
    /// completion order (not necessarily the order the calls appear in the
    /// message — independent calls race to completion).
    pub results: Vec<ToolExecutionRecord>,
    /// Whether [`ToolCallMessage::Cancel`] fired for this `request_id`
    /// before every call had completed.
    pub cancelled: bool,
}

/// Messages handled by [`ToolCallActor`].
pub enum ToolCallMessage {
    /// Execute every tool call in `assistant_message`, fanned out across
    /// their capability actors.
    Handle {
        /// Correlates this batch with a later `Cancel`. Reusing an id that
        /// is still in flight is a programmer error, not a recoverable one.
        request_id: String,
        /// The assistant message whose `ToolUse` blocks to execute.
        assistant_message: Message,
        /// The execution context template; each call gets a clone with its
        /// own child cancellation token.
        ctx: ToolContext,
        /// Settled exactly once, after every call in the batch settles.
        reply_to: oneshot::Sender<HandleToolCallsResponse>,
    },
    /// Cancel every call still in flight for `request_id`. A no-op if the
    /// batch already finished or was never started.
    Cancel {
        /// The `request_id` from the `Handle` message to cancel.
        request_id: String,
    },
}

/// Fans tool calls out to their bound capability actors.
pub struct ToolCallActor {
    capabilities: HashMap<String, Mailbox<CapabilityMessage>>,
    before_hook: Option<Arc<dyn BeforeToolExecutionHook>>,
    callbacks: Option<Arc<dyn ProgressCallbacks>>,
    inflight: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl ToolCallActor {
    /// Build a new tool call actor bound to `capabilities` (tool name →
    /// capability actor mailbox).
    #[must_use]
    pub fn new(
        capabilities: HashMap<String, Mailbox<CapabilityMessage>>,
        before_hook: Option<Arc<dyn BeforeToolExecutionHook>>,
        callbacks: Option<Arc<dyn ProgressCallbacks>>,
    ) -> Self {
        Self {
            capabilities,
            before_hook,
            callbacks,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl ActorHandler<ToolCallMessage> for ToolCallActor {
    async fn handle(&mut self, message: ToolCallMessage) -> Result<(), HandlerError> {
        match message {
            ToolCallMessage::Handle { request_id, assistant_message, ctx, reply_to } => {
                let parent = CancellationToken::new();
                {
                    let mut inflight = self.inflight.lock().await;
                    if inflight.contains_key(&request_id) {
                        panic!("tool-call actor received duplicate request_id: {request_id}");
                    }
                    inflight.insert(request_id.clone(), parent.clone());
                }

                let calls = tool_calls_of(&assistant_message);
                let capabilities = self.capabilities.clone();
                let before_hook = self.before_hook.clone();
                let callbacks = self.callbacks.clone();
                let inflight = self.inflight.clone();

                tokio::spawn(async move {
                    let progress_ctx = request_id.clone();
                    let mut pending = FuturesUnordered::new();
                    for call in calls {
                        let mut call_ctx = ctx.clone();
                        call_ctx.cancellation_token = parent.child_token();
                        let capabilities = &capabilities;
                        let before_hook = before_hook.as_deref();
                        let callbacks = callbacks.clone();
                        let progress_ctx = progress_ctx.clone();
                        pending.push(async move {
                            execute_one(call, capabilities, before_hook, callbacks.as_ref(), call_ctx, &progress_ctx)
                                .await
                        });
                    }

                    let mut results = Vec::new();
                    while let Some(record) = pending.next().await {
                        results.push(record);
                    }

                    let cancelled = parent.is_cancelled();
                    inflight.lock().await.remove(&request_id);
                    let _ = reply_to.send(HandleToolCallsResponse { results, cancelled });
                });
            }
            ToolCallMessage::Cancel { request_id } => {
                if let Some(parent) = self.inflight.lock().await.get(&request_id) {
                    parent.cancel();
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Actor;
    use crate::tool_call::capability::ToolCapabilityActor;
    use agent_types::{ContentBlock, Role, Tool, ToolDefinition};
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    struct SleepEcho(u64);

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
        ) -> impl std::future::Future<Output = Result<Self::Output, Self::Error>> + Send {
            let millis = self.0;
            async move {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok(args)
            }
        }
    }

    struct Never;

    impl Tool for Never {
        const NAME: &'static str = "never";
        type Args = serde_json::Value;
        type Output = serde_json::Value;
        type Error = std::convert::Infallible;

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: Self::NAME.into(),
                title: None,
                description: "never finishes on its own".into(),
                input_schema: serde_json::json!({"type": "object"}),
                output_schema: None,
                annotations: None,
                cache_control: None,
            }
        }

        fn call(
            &self,
            _args: Self::Args,
            _ctx: &ToolContext,
        ) -> impl std::future::Future<Output = Result<Self::Output, Self::Error>> + Send {
            async move {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    fn test_ctx() -> ToolContext {
        ToolContext {
            cwd: PathBuf::from("."),
            session_id: "s".into(),
            environment: std::collections::HashMap::new(),
            cancellation_token: CancellationToken::new(),
            progress_reporter: None,
        }
    }

    fn assistant_with_calls(calls: &[(&str, &str)]) -> Message {
        Message {
            role: Role::Assistant,
            content: calls
                .iter()
                .map(|(id, name)| ContentBlock::ToolUse {
                    id: (*id).to_string(),
                    name: (*name).to_string(),
                    input: serde_json::json!({}),
                })
                .collect(),
        }
    }

    fn spawn_sleeper(name: &str, millis: u64) -> (String, Mailbox<CapabilityMessage>) {
        let actor = Actor::spawn(name, ToolCapabilityActor::new(Arc::new(SleepEcho(millis))));
        (name.to_string(), actor.sender())
    }

    #[tokio::test]
    async fn independent_calls_run_in_parallel() {
        let (name_a, sender_a) = spawn_sleeper("tool_a", 80);
        let (name_b, sender_b) = spawn_sleeper("tool_b", 80);
        let mut capabilities = HashMap::new();
        capabilities.insert(name_a, sender_a);
        capabilities.insert(name_b, sender_b);

        let actor = Actor::spawn("tool-call", ToolCallActor::new(capabilities, None, None));
        let (reply_tx, reply_rx) = oneshot::channel();
        let started = Instant::now();
        actor
            .send(ToolCallMessage::Handle {
                request_id: "r1".into(),
                assistant_message: assistant_with_calls(&[("c1", "tool_a"), ("c2", "tool_b")]),
                ctx: test_ctx(),
                reply_to: reply_tx,
            })
            .unwrap();

        let response = reply_rx.await.unwrap();
        assert_eq!(response.results.len(), 2);
        assert!(!response.cancelled);
        assert!(started.elapsed() < Duration::from_millis(160));
    }

    #[tokio::test]
    async fn cancel_stops_calls_still_in_flight() {
        let never_actor = Actor::spawn("never", ToolCapabilityActor::new(Arc::new(Never)));
        let mut capabilities = HashMap::new();
        capabilities.insert("never".to_string(), never_actor.sender());

        let actor = Actor::spawn("tool-call", ToolCallActor::new(capabilities, None, None));
        let (reply_tx, reply_rx) = oneshot::channel();
        actor
            .send(ToolCallMessage::Handle {
                request_id: "r1".into(),
                assistant_message: assistant_with_calls(&[("c1", "never")]),
                ctx: test_ctx(),
                reply_to: reply_tx,
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        actor.send(ToolCallMessage::Cancel { request_id: "r1".into() }).unwrap();

        let response = reply_rx.await.unwrap();
        assert!(response.cancelled);
        assert_eq!(response.results.len(), 1);
        assert!(response.results[0].cancelled);
    }

    #[tokio::test]
    async fn duplicate_request_id_kills_the_worker() {
        // The handler panics synchronously while handling the second
        // `Handle`; the actor runtime catches it, logs it as fatal, and
        // exits the worker loop rather than crashing the test process —
        // observed here as the next send failing with a closed mailbox.
        let never_actor = Actor::spawn("never", ToolCapabilityActor::new(Arc::new(Never)));
        let mut capabilities = HashMap::new();
        capabilities.insert("never".to_string(), never_actor.sender());

        let actor = Actor::spawn("tool-call", ToolCallActor::new(capabilities, None, None));
        let (reply_tx1, _reply_rx1) = oneshot::channel();
        actor
            .send(ToolCallMessage::Handle {
                request_id: "dup".into(),
                assistant_message: assistant_with_calls(&[("c1", "never")]),
                ctx: test_ctx(),
                reply_to: reply_tx1,
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;

        let (reply_tx2, _reply_rx2) = oneshot::channel();
        actor
            .send(ToolCallMessage::Handle {
                request_id: "dup".into(),
                assistant_message: assistant_with_calls(&[("c2", "never")]),
                ctx: test_ctx(),
                reply_to: reply_tx2,
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let err = actor.send(ToolCallMessage::Cancel { request_id: "dup".into() }).unwrap_err();
        assert!(matches!(err, crate::error::ActorError::MailboxClosed(_)));
    }
}
