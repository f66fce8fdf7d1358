//! The User Actor: serialises every prompt, confirmation, and yield-to-user
//! request against a single external UI implementation.
//!
//! Rendering a prompt on a terminal, TUI, or remote client is exactly the
//! kind of external collaborator this workspace keeps out of its own scope
//! (see crate docs) — [`UserInterface`] is the contract such a collaborator
//! implements; nothing in this crate provides a concrete terminal backend.
//! The shape mirrors `agent_types::Provider`/`Tool`: a trait a caller plugs
//! a real implementation into, expressed with the same [`WasmBoxedFuture`]
//! convention used everywhere else a dyn-safe async boundary is needed.

use std::sync::Arc;

use agent_types::{WasmBoxedFuture, WasmCompatSend, WasmCompatSync};
use tokio::sync::oneshot;
use thiserror::Error;

use crate::runtime::{ActorHandler, HandlerError};

/// The UI failed to produce input — the user closed the prompt, the
/// terminal detached, or a remote client disconnected mid-request.
#[derive(Debug, Clone, Error)]
#[error("user input failed: {0}")]
pub struct UserInputError(pub String);

/// A recognised chat slash command, or free-form text.
///
/// Produced by [`parse_chat_prompt_input`] and [`UserMessage::AgentYieldedToUser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatPromptInput {
    /// `/exit` — end the chat session.
    Exit,
    /// `/compact` — ask the agent to summarise and reset history.
    Compact,
    /// `/clear` — drop history back to just the start message, no summary.
    Clear,
    /// `/image [path-or-url]` — attach an image. `None` when no argument was
    /// given; validated (and rejected) by the chat loop rather than here,
    /// since the original implementation this mirrors resolves the image
    /// lazily and only errors once the attach is actually attempted.
    Image(Option<String>),
    /// `/help` — show the command list.
    Help,
    /// Anything else: free-form text sent to the agent as-is.
    Text(String),
}

/// Split `input` on its leading `/command`, if any, and classify it.
///
/// Unrecognised slash commands fall through to [`ChatPromptInput::Text`]
/// unchanged, matching a grammar where anything not in the closed command
/// set is just a message that happens to start with `/`.
#[must_use]
pub fn parse_chat_prompt_input(input: &str) -> ChatPromptInput {
    let trimmed = input.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return ChatPromptInput::Text(trimmed.to_string());
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default();
    let argument = parts.next().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

    match command {
        "exit" => ChatPromptInput::Exit,
        "compact" => ChatPromptInput::Compact,
        "clear" => ChatPromptInput::Clear,
        "image" => ChatPromptInput::Image(argument),
        "help" => ChatPromptInput::Help,
        _ => ChatPromptInput::Text(trimmed.to_string()),
    }
}

/// The external collaborator this crate delegates all human-facing
/// input/output to.
///
/// Object-safe: a [`UserActor`] holds one as `Arc<dyn UserInterface>` so a
/// single session can share one terminal/TUI/remote-client binding across
/// every `Ask`/`Confirm`/`Prompt` call.
pub trait UserInterface: WasmCompatSend + WasmCompatSync {
    /// Ask a free-form question, optionally pre-filled with `default`.
    fn ask<'a>(&'a self, prompt: &'a str, default: Option<&'a str>) -> WasmBoxedFuture<'a, Result<String, UserInputError>>;

    /// Ask a yes/no question.
    fn confirm<'a>(&'a self, prompt: &'a str) -> WasmBoxedFuture<'a, Result<bool, UserInputError>>;

    /// Read one line of raw input, e.g. to hand to [`parse_chat_prompt_input`].
    fn read_line<'a>(&'a self, prompt: &'a str) -> WasmBoxedFuture<'a, Result<String, UserInputError>>;
}

/// Messages handled by [`UserActor`].
pub enum UserMessage {
    /// A free-form question, optionally pre-filled.
    Ask {
        /// The prompt text to show.
        prompt: String,
        /// A pre-filled default the user can accept as-is.
        default: Option<String>,
        /// Settled exactly once with the user's answer.
        reply_to: oneshot::Sender<Result<String, UserInputError>>,
    },
    /// A yes/no question.
    Confirm {
        /// The prompt text to show.
        prompt: String,
        /// Settled exactly once with the user's answer.
        reply_to: oneshot::Sender<Result<bool, UserInputError>>,
    },
    /// A raw-text prompt, not parsed as a slash command.
    Prompt {
        /// Words making up the rendered prompt (e.g. a command hint list).
        words: Vec<String>,
        /// Settled exactly once with the raw line read.
        reply_to: oneshot::Sender<Result<String, UserInputError>>,
    },
    /// The agent yielded control back to the user; read one line and parse
    /// it as a [`ChatPromptInput`].
    AgentYieldedToUser {
        /// Words making up the rendered prompt (e.g. a command hint list).
        words: Vec<String>,
        /// Settled exactly once with the parsed input.
        reply_to: oneshot::Sender<Result<ChatPromptInput, UserInputError>>,
    },
}

/// Serialises every prompt against one bound [`UserInterface`].
pub struct UserActor {
    ui: Arc<dyn UserInterface>,
}

impl UserActor {
    /// Bind a UI implementation to a new user actor handler.
    #[must_use]
    pub fn new(ui: Arc<dyn UserInterface>) -> Self {
        Self { ui }
    }
}

impl ActorHandler<UserMessage> for UserActor {
    async fn handle(&mut self, message: UserMessage) -> Result<(), HandlerError> {
        match message {
            UserMessage::Ask { prompt, default, reply_to } => {
                let result = self.ui.ask(&prompt, default.as_deref()).await;
                let _ = reply_to.send(result);
            }
            UserMessage::Confirm { prompt, reply_to } => {
                let result = self.ui.confirm(&prompt).await;
                let _ = reply_to.send(result);
            }
            UserMessage::Prompt { words, reply_to } => {
                let prompt = words.join(" ");
                let result = self.ui.read_line(&prompt).await;
                let _ = reply_to.send(result);
            }
            UserMessage::AgentYieldedToUser { words, reply_to } => {
                let prompt = words.join(" ");
                let result = self.ui.read_line(&prompt).await.map(|line| parse_chat_prompt_input(&line));
                let _ = reply_to.send(result);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Actor;
    use std::sync::Mutex;

    /// Hands out a fixed sequence of lines, one per call; used wherever the
    /// original implementation's interactive terminal would normally sit.
    struct ScriptedUi {
        lines: Mutex<Vec<String>>,
    }

    impl UserInterface for ScriptedUi {
        fn ask<'a>(&'a self, _prompt: &'a str, _default: Option<&'a str>) -> WasmBoxedFuture<'a, Result<String, UserInputError>> {
            Box::pin(async move { self.next_line() })
        }

        fn confirm<'a>(&'a self, _prompt: &'a str) -> WasmBoxedFuture<'a, Result<bool, UserInputError>> {
            Box::pin(async move { self.next_line().map(|line| line == "yes") })
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

    #[test]
    fn parses_known_slash_commands() {
        assert_eq!(parse_chat_prompt_input("/exit"), ChatPromptInput::Exit);
        assert_eq!(parse_chat_prompt_input("/compact"), ChatPromptInput::Compact);
        assert_eq!(parse_chat_prompt_input("/clear"), ChatPromptInput::Clear);
        assert_eq!(parse_chat_prompt_input("/help"), ChatPromptInput::Help);
        assert_eq!(
            parse_chat_prompt_input("/image ./photo.png"),
            ChatPromptInput::Image(Some("./photo.png".to_string()))
        );
        assert_eq!(parse_chat_prompt_input("/image"), ChatPromptInput::Image(None));
        assert_eq!(parse_chat_prompt_input("/image   "), ChatPromptInput::Image(None));
    }

    #[test]
    fn unrecognised_slash_command_is_free_text() {
        assert_eq!(
            parse_chat_prompt_input("/unknown thing"),
            ChatPromptInput::Text("/unknown thing".to_string())
        );
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(parse_chat_prompt_input("hello there"), ChatPromptInput::Text("hello there".to_string()));
    }

    #[tokio::test]
    async fn ask_round_trips_through_the_ui() {
        let ui = Arc::new(ScriptedUi { lines: Mutex::new(vec!["42".to_string()]) });
        let actor = Actor::spawn("user", UserActor::new(ui));
        let (reply_tx, reply_rx) = oneshot::channel();
        actor
            .send(UserMessage::Ask { prompt: "pick a number".into(), default: None, reply_to: reply_tx })
            .unwrap();
        assert_eq!(reply_rx.await.unwrap().unwrap(), "42");
    }

    #[tokio::test]
    async fn agent_yielded_to_user_parses_the_line_read() {
        let ui = Arc::new(ScriptedUi { lines: Mutex::new(vec!["/compact".to_string()]) });
        let actor = Actor::spawn("user", UserActor::new(ui));
        let (reply_tx, reply_rx) = oneshot::channel();
        actor
            .send(UserMessage::AgentYieldedToUser { words: vec!["/exit".into(), "/compact".into()], reply_to: reply_tx })
            .unwrap();
        assert_eq!(reply_rx.await.unwrap().unwrap(), ChatPromptInput::Compact);
    }

    #[tokio::test]
    async fn ui_failure_is_forwarded_as_an_error() {
        let ui = Arc::new(ScriptedUi { lines: Mutex::new(vec![]) });
        let actor = Actor::spawn("user", UserActor::new(ui));
        let (reply_tx, reply_rx) = oneshot::channel();
        actor.send(UserMessage::Confirm { prompt: "proceed?".into(), reply_to: reply_tx }).unwrap();
        assert!(reply_rx.await.unwrap().is_err());
    }
}
