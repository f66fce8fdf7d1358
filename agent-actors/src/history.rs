//! The History Manager: owns one run's conversation history, persists it
//! after every mutation, and reports user/assistant/tool events to a
//! [`ProgressCallbacks`] sink.
//!
//! The crash-safe repair/wire-format functions this wraps
//! (`repair_history`/`save_history`/`load_history`) live in
//! `agent_runtime::history`, which has no `ProgressCallbacks`/`Actor`
//! dependency of its own — see that module's docs for why the split is
//! this way around.

use std::path::PathBuf;
use std::sync::Arc;

use agent_types::{
    ContentBlock, ContentItem, Message, ProgressCallbacks, Role, StatusLevel, StorageError,
};
use agent_runtime::history::{load_history, repair_history, save_history};
use tokio::sync::oneshot;

use crate::runtime::{ActorHandler, HandlerError};

/// Append a user-authored message, reporting it via `on_user_message` first.
///
/// `force` is forwarded as-is — see [`ProgressCallbacks::on_user_message`].
pub fn append_user_message(
    history: &mut Vec<Message>,
    message: Message,
    force: bool,
    callbacks: Option<&Arc<dyn ProgressCallbacks>>,
    progress_ctx: &str,
) {
    if let Some(callbacks) = callbacks {
        callbacks.on_user_message(progress_ctx, &message, force);
    }
    history.push(message);
}

/// Append an assistant-authored message, reporting it via `on_assistant_message` first.
pub fn append_assistant_message(
    history: &mut Vec<Message>,
    message: Message,
    callbacks: Option<&Arc<dyn ProgressCallbacks>>,
    progress_ctx: &str,
) {
    if let Some(callbacks) = callbacks {
        callbacks.on_assistant_message(progress_ctx, &message, false);
    }
    history.push(message);
}

/// Append one tool result, encoded as the `User`/`ToolResult` message this
/// workspace uses for spec's *Tool* message variant, reporting it via
/// `on_tool_message` first.
pub fn append_tool_message(
    history: &mut Vec<Message>,
    tool_use_id: String,
    tool_name: &str,
    content: String,
    is_error: bool,
    callbacks: Option<&Arc<dyn ProgressCallbacks>>,
    progress_ctx: &str,
) {
    if let Some(callbacks) = callbacks {
        callbacks.on_tool_message(progress_ctx, &content, tool_name, &serde_json::Value::Null);
    }
    history.push(Message {
        role: Role::User,
        content: vec![ContentBlock::ToolResult {
            tool_use_id,
            content: vec![ContentItem::Text(content)],
            is_error,
        }],
    });
}

/// Replace `history` wholesale (the `compact_conversation` path), repairing
/// the replacement and reporting the reset via `on_status_message` first.
pub fn clear_history(
    history: &mut Vec<Message>,
    replacement: Vec<Message>,
    callbacks: Option<&Arc<dyn ProgressCallbacks>>,
    status_text: &str,
) {
    if let Some(callbacks) = callbacks {
        callbacks.on_status_message(status_text, StatusLevel::Info);
    }
    *history = replacement;
    repair_history(history);
}

/// Messages handled by [`HistoryManager`].
pub enum HistoryMessage {
    /// Append a user-authored message.
    AppendUser {
        /// The message to append.
        message: Message,
        /// Forwarded to `on_user_message` — asks a renderer to show this
        /// even if it would otherwise treat it as already-seen.
        force: bool,
        /// Settled once the message is appended and persisted.
        reply_to: oneshot::Sender<()>,
    },
    /// Append an assistant-authored message.
    AppendAssistant {
        /// The message to append.
        message: Message,
        /// Settled once the message is appended and persisted.
        reply_to: oneshot::Sender<()>,
    },
    /// Append one tool result, encoded as the `User`/`ToolResult` message
    /// this workspace uses for spec's *Tool* message variant.
    AppendTool {
        /// The `ToolUse` id this result answers.
        tool_use_id: String,
        /// The tool's name, carried through for the progress callback.
        tool_name: String,
        /// The rendered tool output text.
        content: String,
        /// Whether this result represents a tool-side error.
        is_error: bool,
        /// Settled once the message is appended and persisted.
        reply_to: oneshot::Sender<()>,
    },
    /// Replace the whole history — used by `compact_conversation` handling.
    Reset {
        /// The new history to repair, persist, and hold.
        history: Vec<Message>,
        /// Settled once the reset is persisted.
        reply_to: oneshot::Sender<()>,
    },
    /// Fetch a clone of the current history.
    Snapshot {
        /// Settled with the current history.
        reply_to: oneshot::Sender<Vec<Message>>,
    },
}

/// Owns one run's history, persisting to `working_dir` after each mutation.
pub struct HistoryManager {
    working_dir: PathBuf,
    history: Vec<Message>,
    callbacks: Option<Arc<dyn ProgressCallbacks>>,
    progress_ctx: String,
}

impl HistoryManager {
    /// Load (and repair) the persisted history for `working_dir`, starting
    /// empty if none exists yet.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the history file exists but is
    /// unreadable or fails to deserialize.
    pub async fn load(
        working_dir: PathBuf,
        callbacks: Option<Arc<dyn ProgressCallbacks>>,
        progress_ctx: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let history = load_history(&working_dir).await?;
        Ok(Self { working_dir, history, callbacks, progress_ctx: progress_ctx.into() })
    }

    /// Start with an explicit in-memory history, without touching disk
    /// until the first mutation. Used by tests and by callers that seed a
    /// run's history themselves (e.g. a nested sub-agent's start message).
    #[must_use]
    pub fn seeded(
        working_dir: PathBuf,
        history: Vec<Message>,
        callbacks: Option<Arc<dyn ProgressCallbacks>>,
        progress_ctx: impl Into<String>,
    ) -> Self {
        Self { working_dir, history, callbacks, progress_ctx: progress_ctx.into() }
    }

    async fn persist(&mut self) {
        if let Err(err) = save_history(&self.working_dir, &self.history).await {
            tracing::warn!(error = %err, "failed to persist history");
        }
    }
}

impl ActorHandler<HistoryMessage> for HistoryManager {
    async fn handle(&mut self, message: HistoryMessage) -> Result<(), HandlerError> {
        match message {
            HistoryMessage::AppendUser { message, force, reply_to } => {
                append_user_message(&mut self.history, message, force, self.callbacks.as_ref(), &self.progress_ctx);
                self.persist().await;
                let _ = reply_to.send(());
            }
            HistoryMessage::AppendAssistant { message, reply_to } => {
                append_assistant_message(&mut self.history, message, self.callbacks.as_ref(), &self.progress_ctx);
                self.persist().await;
                let _ = reply_to.send(());
            }
            HistoryMessage::AppendTool { tool_use_id, tool_name, content, is_error, reply_to } => {
                append_tool_message(
                    &mut self.history,
                    tool_use_id,
                    &tool_name,
                    content,
                    is_error,
                    self.callbacks.as_ref(),
                    &self.progress_ctx,
                );
                self.persist().await;
                let _ = reply_to.send(());
            }
            HistoryMessage::Reset { history, reply_to } => {
                clear_history(&mut self.history, history, self.callbacks.as_ref(), "Conversation compacted and history reset.");
                self.persist().await;
                let _ = reply_to.send(());
            }
            HistoryMessage::Snapshot { reply_to } => {
                let _ = reply_to.send(self.history.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Actor;
    use agent_types::{ContentBlock, Role};

    fn user_text(text: &str) -> Message {
        Message { role: Role::User, content: vec![ContentBlock::Text(text.to_string())] }
    }

    #[tokio::test]
    async fn append_persists_and_is_visible_in_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let manager = HistoryManager::load(dir.path().to_path_buf(), None, "ctx").await.unwrap();
        let actor = Actor::spawn("history", manager);

        let (reply_tx, reply_rx) = oneshot::channel();
        actor
            .send(HistoryMessage::AppendUser { message: user_text("hello"), force: false, reply_to: reply_tx })
            .unwrap();
        reply_rx.await.unwrap();

        let (snap_tx, snap_rx) = oneshot::channel();
        actor.send(HistoryMessage::Snapshot { reply_to: snap_tx }).unwrap();
        let history = snap_rx.await.unwrap();
        assert_eq!(history.len(), 1);

        let reloaded = load_history(dir.path()).await.unwrap();
        assert_eq!(reloaded.len(), 1);
    }

    #[tokio::test]
    async fn reset_repairs_and_replaces_history() {
        let dir = tempfile::tempdir().unwrap();
        let manager = HistoryManager::load(dir.path().to_path_buf(), None, "ctx").await.unwrap();
        let actor = Actor::spawn("history", manager);

        let dangling = vec![
            user_text("go"),
            Message {
                role: Role::Assistant,
                content: vec![ContentBlock::ToolUse {
                    id: "c1".to_string(),
                    name: "finish_task".to_string(),
                    input: serde_json::json!({}),
                }],
            },
        ];
        let (reply_tx, reply_rx) = oneshot::channel();
        actor.send(HistoryMessage::Reset { history: dangling, reply_to: reply_tx }).unwrap();
        reply_rx.await.unwrap();

        let (snap_tx, snap_rx) = oneshot::channel();
        actor.send(HistoryMessage::Snapshot { reply_to: snap_tx }).unwrap();
        let history = snap_rx.await.unwrap();
        assert_eq!(history.len(), 1);
    }
}
