//! Request/reply correlation over one-way actor mailboxes.
//!
//! Every cross-actor call in this crate (Agent → LLM, Agent → Tool-Call,
//! Tool-Call → Tool-Capability, Chat → User) is a correlated pair: the
//! caller allocates a fresh `request_id`, opens a one-shot reply channel,
//! sends a request message carrying both, and awaits the reply. This module
//! provides the two shapes that pattern takes in this crate:
//!
//! - [`call`]: fire a request, await its one settlement. Used where the
//!   callee either always replies exactly once or where abandoning the
//!   await (dropping `reply_rx`) is an acceptable way to "cancel" — the
//!   LLM Actor has no `Cancel` message in this design (see `agent_actors::llm`
//!   docs), so callers that want to stop waiting on a completion just race
//!   this against their own cancellation signal with `tokio::select!`.
//! - [`cancellable_call`]: fire a request, and if the caller's own
//!   cancellation token fires before a reply arrives, send a `Cancel`
//!   message to the same callee and keep awaiting the *same* reply channel
//!   — the callee is expected to settle it exactly once either way. This is
//!   what `agent_actors::tool_call` uses so a cancelled tool-call batch
//!   still returns whatever partial results had already completed.

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::CorrelationError;
use crate::runtime::Mailbox;

/// Allocate a fresh, globally-unique request id.
#[must_use]
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Anything [`call`]/[`cancellable_call`] can deliver a request to: an
/// actor's [`Mailbox`], or — in this module's own tests and a raw channel
/// standing in for one — an `UnboundedSender` directly.
pub trait MessageSink<M> {
    /// Deliver `message`, reporting only whether the sink is still open.
    fn deliver(&self, message: M) -> Result<(), ()>;
}

impl<M: Send + 'static> MessageSink<M> for Mailbox<M> {
    fn deliver(&self, message: M) -> Result<(), ()> {
        self.send(message).map_err(|_| ())
    }
}

impl<M> MessageSink<M> for UnboundedSender<M> {
    fn deliver(&self, message: M) -> Result<(), ()> {
        self.send(message).map_err(|_| ())
    }
}

/// Send a request built by `build` to `sender` and await its one reply.
///
/// `build` receives the freshly allocated `request_id` and a one-shot
/// reply sender, and must embed both into the request message `M`.
///
/// # Errors
///
/// [`CorrelationError::MailboxClosed`] if the callee's mailbox is already
/// closed; [`CorrelationError::NoReply`] if the callee drops the reply
/// sender without ever replying (e.g. it panicked or was torn down).
pub async fn call<S, M, R>(
    actor_name: &str,
    sender: &S,
    build: impl FnOnce(String, oneshot::Sender<R>) -> M,
) -> Result<R, CorrelationError>
where
    S: MessageSink<M>,
{
    let request_id = new_request_id();
    let (reply_tx, reply_rx) = oneshot::channel();
    let message = build(request_id.clone(), reply_tx);
    sender
        .deliver(message)
        .map_err(|()| CorrelationError::MailboxClosed(actor_name.to_string()))?;
    reply_rx
        .await
        .map_err(|_| CorrelationError::NoReply(request_id))
}

/// Like [`call`], but if `cancel_token` fires before a reply arrives, send
/// a `Cancel` message (built by `build_cancel`) to the same callee and keep
/// awaiting the original reply channel rather than abandoning it.
///
/// The callee must settle the original request exactly once either way —
/// with its normal result if the work raced to completion, or with
/// whatever "cancelled" outcome it encodes in `R` otherwise. This function
/// never returns [`CorrelationError::Cancelled`] on its own: if the callee
/// honours the cancel contract, the reply still arrives as `Ok`; the
/// `Cancelled` variant is reserved for a callee that drops the reply sender
/// after being cancelled instead of settling it.
pub async fn cancellable_call<S, M, R>(
    actor_name: &str,
    sender: &S,
    cancel_token: &CancellationToken,
    build: impl FnOnce(String, oneshot::Sender<R>) -> M,
    build_cancel: impl FnOnce(String) -> M,
) -> Result<R, CorrelationError>
where
    S: MessageSink<M>,
{
    let request_id = new_request_id();
    let (reply_tx, mut reply_rx) = oneshot::channel();
    let message = build(request_id.clone(), reply_tx);
    sender
        .deliver(message)
        .map_err(|()| CorrelationError::MailboxClosed(actor_name.to_string()))?;

    tokio::select! {
        biased;
        _ = cancel_token.cancelled() => {
            let _ = sender.deliver(build_cancel(request_id.clone()));
            reply_rx.await.map_err(|_| CorrelationError::Cancelled(request_id))
        }
        result = &mut reply_rx => {
            result.map_err(|_| CorrelationError::NoReply(request_id))
        }
    }
}
