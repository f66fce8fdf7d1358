//! The generic actor: a mailbox, a worker task, and a handler that owns
//! state across the lifetime of that task.
//!
//! Every concrete actor in this crate (`LLMActor`, `ToolCallActor`,
//! `AgentActor`, ...) is `Actor<M>` parameterized by its own message enum
//! and driven by an `ActorHandler<M>` implementation. The actor itself
//! never interprets messages; it only owns the mailbox and the worker
//! task's lifecycle.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::error::ActorError;

/// An error a handler recovered from on its own — logged and the actor
/// keeps running. Distinct from a panic inside `handle`, which the worker
/// loop treats as fatal and isolates to this actor alone.
#[derive(Debug, Clone)]
pub struct HandlerError(pub String);

impl HandlerError {
    /// Build a recoverable handler error from any displayable cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handles messages of type `M`, one at a time, holding `&mut self` state
/// across the actor's whole lifetime.
///
/// Implementors are free to hold open resources (provider handles, child
/// task handles, accumulated conversation state) for as long as the actor
/// runs; the runtime guarantees messages are delivered to `handle` strictly
/// in mailbox order, one in flight at a time.
///
/// Returning `Err` reports a recoverable domain error: the worker loop logs
/// it and keeps processing the next message. A panic inside `handle` is
/// fatal instead — the worker loop catches it, logs it, and exits, without
/// taking down any other actor's task.
pub trait ActorHandler<M>: Send + 'static {
    /// Process a single message.
    fn handle(&mut self, message: M) -> impl std::future::Future<Output = Result<(), HandlerError>> + Send;

    /// Render `message` for the `message` tracing field on this actor's
    /// per-message span. Defaults to `None` (no field attached); override
    /// for message types worth seeing in logs, via [`to_trace_fields`].
    fn trace_fields(&self, _message: &M) -> Option<String> {
        None
    }
}

/// One entry in an actor's mailbox channel: either a real message to
/// deliver, timestamped at enqueue time so the worker loop can report how
/// long it waited, or the sentinel the worker loop breaks on.
enum Envelope<M> {
    Message { message: M, enqueued_at: Instant },
    Stop,
}

/// A cloneable handle to an actor's mailbox.
///
/// This is the type other actors hold to address a peer — `Actor::sender`
/// returns one, and it's what `agent.rs`/`chat.rs`/`tool_call` store as
/// `llm`/`tool_call`/`user`/`capabilities` fields. Sending through it never
/// blocks; [`Mailbox::send`] fails only once the worker task has exited.
pub struct Mailbox<M: Send + 'static> {
    name: String,
    sender: mpsc::UnboundedSender<Envelope<M>>,
}

impl<M: Send + 'static> Clone for Mailbox<M> {
    fn clone(&self) -> Self {
        Self { name: self.name.clone(), sender: self.sender.clone() }
    }
}

impl<M: Send + 'static> fmt::Debug for Mailbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox").field("name", &self.name).finish()
    }
}

impl<M: Send + 'static> Mailbox<M> {
    /// Send a message to this actor's mailbox without waiting for it to be
    /// processed.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::MailboxClosed`] if the worker task has already
    /// exited (e.g. after [`Actor::stop`]).
    pub fn send(&self, message: M) -> Result<(), ActorError> {
        self.sender
            .send(Envelope::Message { message, enqueued_at: Instant::now() })
            .map_err(|_| ActorError::MailboxClosed(self.name.clone()))
    }
}

/// A running actor: an owned mailbox sender plus the worker task's join
/// handle.
///
/// Dropping an `Actor<M>` does not stop it — the mailbox sender is cloned
/// internally for the worker loop's own bookkeeping, so the worker keeps
/// running until [`Actor::stop`] is called. Call [`Actor::stop`] for a
/// clean, awaited shutdown.
pub struct Actor<M: Send + 'static> {
    name: String,
    mailbox: Mailbox<M>,
    join: Option<JoinHandle<()>>,
}

impl<M: Send + 'static> fmt::Debug for Actor<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor").field("name", &self.name).finish()
    }
}

impl<M: Send + 'static> Actor<M> {
    /// Spawn a new actor, starting its worker task immediately.
    ///
    /// The worker task runs `handler.handle(message).await` for each
    /// message received, in order, until [`Actor::stop`] enqueues the stop
    /// sentinel and the worker drains up to it.
    pub fn spawn<H>(name: impl Into<String>, mut handler: H) -> Self
    where
        H: ActorHandler<M>,
    {
        let name = name.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Envelope<M>>();
        let span = tracing::info_span!("actor", actor.name = %name);
        let worker_name = name.clone();

        let join = tokio::spawn(
            async move {
                tracing::debug!(actor.name = %worker_name, "actor started");
                while let Some(envelope) = receiver.recv().await {
                    let (message, enqueued_at) = match envelope {
                        Envelope::Message { message, enqueued_at } => (message, enqueued_at),
                        Envelope::Stop => break,
                    };

                    let queue_wait_ms = enqueued_at.elapsed().as_secs_f64() * 1000.0;
                    let trace_fields = handler.trace_fields(&message);
                    let handler_started = Instant::now();
                    let outcome = AssertUnwindSafe(handler.handle(message)).catch_unwind().await;
                    let handler_ms = handler_started.elapsed().as_secs_f64() * 1000.0;

                    match outcome {
                        Ok(Ok(())) => {
                            tracing::debug!(
                                actor.name = %worker_name,
                                queue_wait_ms,
                                handler_ms,
                                status = "ok",
                                message = trace_fields.as_deref().unwrap_or(""),
                                "message handled"
                            );
                        }
                        Ok(Err(err)) => {
                            tracing::warn!(
                                actor.name = %worker_name,
                                queue_wait_ms,
                                handler_ms,
                                status = "error",
                                error = %err,
                                message = trace_fields.as_deref().unwrap_or(""),
                                "handler reported a recoverable error"
                            );
                        }
                        Err(panic) => {
                            let panic_message = panic_message(&panic);
                            tracing::error!(
                                actor.name = %worker_name,
                                queue_wait_ms,
                                handler_ms,
                                status = "fatal",
                                error = %panic_message,
                                message = trace_fields.as_deref().unwrap_or(""),
                                "handler panicked; actor is exiting"
                            );
                            break;
                        }
                    }
                }
                tracing::debug!(actor.name = %worker_name, "actor stopped");
            }
            .instrument(span),
        );

        Self {
            name: name.clone(),
            mailbox: Mailbox { name, sender },
            join: Some(join),
        }
    }

    /// The name this actor was spawned with, used in tracing fields and
    /// directory registration.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send a message to this actor's mailbox without waiting for it to be
    /// processed.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::MailboxClosed`] if the worker task has already
    /// exited (e.g. after [`Actor::stop`]).
    pub fn send(&self, message: M) -> Result<(), ActorError> {
        self.mailbox.send(message)
    }

    /// A cloneable handle to this actor's mailbox, for callers (other
    /// actors, the directory) that need to hold a sender without owning
    /// the actor's lifecycle.
    #[must_use]
    pub fn sender(&self) -> Mailbox<M> {
        self.mailbox.clone()
    }

    /// Stop the actor: enqueue the stop sentinel and wait for the worker
    /// task to drain any already-queued messages and exit.
    ///
    /// Idempotent — calling `stop` twice (or after the worker already
    /// exited on its own, e.g. from a fatal handler panic) is a no-op the
    /// second time. Other callers' `Mailbox` clones do not need to be
    /// dropped first: the sentinel is just another message in mailbox
    /// order, so the worker sees it and exits regardless of how many
    /// clones are still outstanding.
    pub async fn stop(&mut self) {
        if let Some(join) = self.join.take() {
            let _ = self.mailbox.sender.send(Envelope::Stop);
            let _ = join.await;
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "actor handler panicked with a non-string payload".to_string()
    }
}

/// Render a JSON payload as a short, tracing-field-safe string: valid
/// UTF-8, single line, truncated so a single event never dominates a log.
///
/// Used by actors to attach request/response payloads to spans without
/// risking megabyte-sized log lines from a large tool result or completion.
#[must_use]
pub fn to_trace_fields<T: serde::Serialize>(value: &T) -> String {
    const MAX_LEN: usize = 512;
    let rendered = serde_json::to_string(value).unwrap_or_else(|_| "<unserializable>".to_string());
    let rendered = rendered.replace('\n', " ");
    if rendered.len() > MAX_LEN {
        let boundary = rendered.floor_char_boundary(MAX_LEN);
        format!("{}... [{} bytes total]", &rendered[..boundary], rendered.len())
    } else {
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u32);

    impl ActorHandler<u32> for Counter {
        async fn handle(&mut self, message: u32) -> Result<(), HandlerError> {
            self.0 += message;
            Ok(())
        }
    }

    #[tokio::test]
    async fn stop_returns_even_with_outstanding_mailbox_clones() {
        let mut actor = Actor::spawn("counter", Counter(0));
        let _clone_still_held = actor.sender();
        actor.send(1).unwrap();
        actor.send(2).unwrap();
        actor.stop().await;
        assert!(actor.send(3).is_err());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let mut actor = Actor::spawn("counter", Counter(0));
        actor.stop().await;
        actor.stop().await;
    }

    struct AlwaysPanics;

    impl ActorHandler<()> for AlwaysPanics {
        async fn handle(&mut self, _message: ()) -> Result<(), HandlerError> {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn a_handler_panic_is_isolated_and_the_actor_exits() {
        let actor = Actor::spawn("panics", AlwaysPanics);
        actor.send(()).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(actor.send(()).is_err());
    }

    struct Recoverable;

    impl ActorHandler<u32> for Recoverable {
        async fn handle(&mut self, message: u32) -> Result<(), HandlerError> {
            if message == 0 {
                Err(HandlerError::new("zero is not allowed"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn a_recoverable_error_does_not_stop_the_actor() {
        let mut actor = Actor::spawn("recoverable", Recoverable);
        actor.send(0).unwrap();
        actor.send(1).unwrap();
        actor.stop().await;
    }
}
