//! A URI-keyed registry of actor mailboxes, for callers that want to
//! resolve a peer by name (`actor://<context>/<role>[/<id>]`) instead of
//! holding a mailbox clone directly.
//!
//! `agent_actors::wiring` does not route through this module today — it
//! wires `AgentSession`/`ChatSession` by handing each actor its peers'
//! `Mailbox` clones directly at construction time, which is simpler when
//! the full peer set is known up front and fixed for the session's
//! lifetime. This module is a standalone primitive for the cases that
//! aren't: a deployment that registers actors dynamically (e.g. nested
//! agent runs spawned at runtime, or peers resolved by name across a
//! process boundary) can share one `ActorDirectory<M>` per message family
//! and `register`/`resolve`/`send` through it instead.
//!
//! One `ActorDirectory<M>` instance would exist per message family: the LLM
//! actors of a session share one directory keyed by their request/response
//! message enum, the tool-call actors share another, and so on. This keeps
//! `register`/`resolve` fully typed rather than routing through `Box<dyn
//! Any>`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;

use crate::error::DirectoryError;

/// A URI-keyed registry of mailbox senders for one message family `M`.
pub struct ActorDirectory<M: Send + 'static> {
    sinks: RwLock<HashMap<String, UnboundedSender<M>>>,
}

impl<M: Send + 'static> ActorDirectory<M> {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sinks: RwLock::new(HashMap::new()),
        }
    }

    /// Register a mailbox under `uri`.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Duplicate`] if `uri` is already registered.
    pub async fn register(
        &self,
        uri: impl Into<String>,
        sink: UnboundedSender<M>,
    ) -> Result<(), DirectoryError> {
        let uri = uri.into();
        let mut sinks = self.sinks.write().await;
        if sinks.contains_key(&uri) {
            return Err(DirectoryError::Duplicate(uri));
        }
        sinks.insert(uri, sink);
        Ok(())
    }

    /// Remove the mailbox registered under `uri`.
    ///
    /// Idempotent: unregistering a URI that was never registered (or was
    /// already removed) is a no-op.
    pub async fn unregister(&self, uri: &str) {
        self.sinks.write().await.remove(uri);
    }

    /// Resolve `uri` to its registered mailbox sender.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Unknown`] if nothing is registered under
    /// `uri`.
    pub async fn resolve(&self, uri: &str) -> Result<UnboundedSender<M>, DirectoryError> {
        self.sinks
            .read()
            .await
            .get(uri)
            .cloned()
            .ok_or_else(|| DirectoryError::Unknown(uri.to_string()))
    }

    /// Resolve `uri` and deliver `message` to it.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Unknown`] if `uri` is unregistered, or
    /// [`DirectoryError::Duplicate`]-free `DirectoryError` variants never;
    /// delivery to a mailbox whose worker already exited surfaces as
    /// `Unknown` too, since the sink is treated as gone.
    pub async fn send(&self, uri: &str, message: M) -> Result<(), DirectoryError> {
        let sink = self.resolve(uri).await?;
        sink.send(message)
            .map_err(|_| DirectoryError::Unknown(uri.to_string()))
    }

    /// Number of currently registered mailboxes.
    pub async fn len(&self) -> usize {
        self.sinks.read().await.len()
    }

    /// Whether the directory currently holds no registrations.
    pub async fn is_empty(&self) -> bool {
        self.sinks.read().await.is_empty()
    }
}

impl<M: Send + 'static> Default for ActorDirectory<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a standard actor URI: `actor://<context>/<role>[/<id>]`.
#[must_use]
pub fn actor_uri(context: &str, role: &str, id: Option<&str>) -> String {
    match id {
        Some(id) => format!("actor://{context}/{role}/{id}"),
        None => format!("actor://{context}/{role}"),
    }
}

/// Convenience wrapper combining an [`ActorDirectory`] with `Arc` sharing,
/// since wiring constructs one directory per message family and hands
/// clones of the `Arc` to every actor that needs to address peers through it.
pub type SharedDirectory<M> = Arc<ActorDirectory<M>>;
