//! Crash-safe conversation history persistence.
//!
//! A history file under `<working_dir>/.coding_assistant/history.json` is
//! the only durable record of a conversation: it is (re)written after every
//! turn so a process restarted mid-conversation can resume from the last
//! flushed state. The on-disk shape is intentionally flatter than the
//! in-memory [`Message`] representation — see [`to_wire`]/[`from_wire`] — so
//! that the persisted file reads as an ordinary OpenAI/Anthropic-style
//! transcript rather than an internal implementation detail.
//!
//! The higher-level, callback-emitting wrappers
//! (`append_user_message`/`append_assistant_message`/`append_tool_message`/
//! `clear_history`) and the actor that moves the file write off the turn
//! loop's own task live in `agent_actors::history`, which depends on this
//! module rather than the other way around.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use agent_types::{ContentBlock, ContentItem, Message, Role, StorageError};

/// Repeatedly strip a trailing `Assistant` message carrying one or more
/// tool calls, until the last message in the history is not such a message.
///
/// A crash can land mid-turn with more than one consecutive tool-call-
/// bearing `Assistant` message at the tail (a restart racing a
/// partially-flushed turn), so this is a `while` loop, not a single `if`/pop.
pub fn repair_history(history: &mut Vec<Message>) {
    while matches!(
        history.last(),
        Some(message) if message.role == Role::Assistant
            && message.content.iter().any(|block| matches!(block, ContentBlock::ToolUse { .. }))
    ) {
        history.pop();
    }
}

/// Path to the crash-recovery history file for a working directory.
#[must_use]
pub fn history_file_path(working_dir: &Path) -> PathBuf {
    working_dir.join(".coding_assistant").join("history.json")
}

/// Serialise `history` to the on-disk wire format and write it to
/// `<working_dir>/.coding_assistant/history.json`, creating the directory
/// if needed.
///
/// Always repairs a *clone* of `history` before writing — saving never
/// mutates the caller's in-memory history as a side effect.
pub async fn save_history(working_dir: &Path, history: &[Message]) -> Result<(), StorageError> {
    let mut repaired = history.to_vec();
    repair_history(&mut repaired);
    let wire = to_wire(&repaired);
    let json =
        serde_json::to_string_pretty(&wire).map_err(|e| StorageError::Serialization(e.to_string()))?;
    let path = history_file_path(working_dir);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, json).await?;
    Ok(())
}

/// Load and repair the history file for a working directory.
///
/// Returns `Ok(Vec::new())` if no history file exists yet (a fresh
/// conversation), matching `SessionStorage`'s "first write creates it"
/// convention elsewhere in this crate.
pub async fn load_history(working_dir: &Path) -> Result<Vec<Message>, StorageError> {
    let path = history_file_path(working_dir);
    let data = match tokio::fs::read_to_string(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::Io(e)),
    };
    let wire: Vec<WireMessage> =
        serde_json::from_str(&data).map_err(|e| StorageError::Serialization(e.to_string()))?;
    let mut history = from_wire(wire);
    // Defensive: repair again on load in case the file was written by
    // something other than `save_history` (a raw crash dump mid-write).
    repair_history(&mut history);
    Ok(history)
}

// ---- on-disk wire format (spec §6 persistence layout) ------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum WireMessage {
    System {
        content: WireContent,
    },
    User {
        content: WireContent,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reasoning_content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<WireToolCall>>,
    },
    Tool {
        tool_call_id: String,
        #[serde(default)]
        name: String,
        content: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<WirePart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart {
    Text { text: String },
    ImageUrl { image_url: WireImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireImageUrl {
    url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

fn content_to_wire(content: &[ContentBlock]) -> WireContent {
    if let [ContentBlock::Text(text)] = content {
        return WireContent::Text(text.clone());
    }
    let parts = content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text(text) => Some(WirePart::Text { text: text.clone() }),
            ContentBlock::Image {
                source: agent_types::ImageSource::Url { url },
            } => Some(WirePart::ImageUrl {
                image_url: WireImageUrl { url: url.clone() },
            }),
            _ => None,
        })
        .collect();
    WireContent::Parts(parts)
}

fn wire_content_to_blocks(content: WireContent) -> Vec<ContentBlock> {
    match content {
        WireContent::Text(text) => vec![ContentBlock::Text(text)],
        WireContent::Parts(parts) => parts
            .into_iter()
            .map(|part| match part {
                WirePart::Text { text } => ContentBlock::Text(text),
                WirePart::ImageUrl { image_url } => ContentBlock::Image {
                    source: agent_types::ImageSource::Url { url: image_url.url },
                },
            })
            .collect(),
    }
}

/// Flatten in-memory history into the persisted wire shape.
///
/// A `User` message whose content is entirely `ToolResult` blocks (this
/// teacher's encoding of spec's *Tool* message variant, see
/// `agent-actors`' crate docs) is expanded into one `WireMessage::Tool` per
/// result, tagged with the tool name recovered from the matching
/// `ToolUse` block seen earlier in the same history. Anything else becomes
/// a single `WireMessage::System`/`User`.
fn to_wire(history: &[Message]) -> Vec<WireMessage> {
    let mut tool_names: std::collections::HashMap<String, String> = std::collections::HashMap::new();
    let mut wire = Vec::with_capacity(history.len());

    for message in history {
        match message.role {
            Role::System => wire.push(WireMessage::System {
                content: content_to_wire(&message.content),
            }),
            Role::Assistant => {
                let mut text: Option<String> = None;
                let mut tool_calls = Vec::new();
                for block in &message.content {
                    match block {
                        ContentBlock::Text(t) => {
                            text = Some(match text.take() {
                                Some(existing) => format!("{existing}{t}"),
                                None => t.clone(),
                            });
                        }
                        ContentBlock::ToolUse { id, name, input } => {
                            tool_names.insert(id.clone(), name.clone());
                            tool_calls.push(WireToolCall {
                                id: id.clone(),
                                kind: "function".to_string(),
                                function: WireFunctionCall {
                                    name: name.clone(),
                                    arguments: input.to_string(),
                                },
                            });
                        }
                        _ => {}
                    }
                }
                wire.push(WireMessage::Assistant {
                    content: text,
                    reasoning_content: None,
                    tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
                });
            }
            Role::User => {
                let is_tool_message = !message.content.is_empty()
                    && message.content.iter().all(|b| matches!(b, ContentBlock::ToolResult { .. }));
                if is_tool_message {
                    for block in &message.content {
                        if let ContentBlock::ToolResult { tool_use_id, content, .. } = block {
                            let text = content
                                .iter()
                                .filter_map(|item| match item {
                                    ContentItem::Text(t) => Some(t.as_str()),
                                    ContentItem::Image { .. } => None,
                                })
                                .collect::<Vec<_>>()
                                .join("\n");
                            let name = tool_names.get(tool_use_id).cloned().unwrap_or_default();
                            wire.push(WireMessage::Tool {
                                tool_call_id: tool_use_id.clone(),
                                name,
                                content: text,
                            });
                        }
                    }
                } else {
                    wire.push(WireMessage::User {
                        content: content_to_wire(&message.content),
                    });
                }
            }
        }
    }
    wire
}

/// Reconstruct in-memory history from the persisted wire shape.
///
/// Each `WireMessage::Tool` becomes its own `Message { role: User, content:
/// [ContentBlock::ToolResult] }` rather than being regrouped with its
/// siblings; a second `save_history` of the loaded form reproduces the same
/// wire output, which is all the round-trip invariant (§8: "save → load →
/// save is stable") requires.
fn from_wire(wire: Vec<WireMessage>) -> Vec<Message> {
    wire.into_iter()
        .map(|message| match message {
            WireMessage::System { content } => Message {
                role: Role::System,
                content: wire_content_to_blocks(content),
            },
            WireMessage::User { content } => Message {
                role: Role::User,
                content: wire_content_to_blocks(content),
            },
            WireMessage::Assistant { content, tool_calls, .. } => {
                let mut blocks = Vec::new();
                if let Some(text) = content {
                    blocks.push(ContentBlock::Text(text));
                }
                for call in tool_calls.into_iter().flatten() {
                    let input = serde_json::from_str(&call.function.arguments)
                        .unwrap_or(serde_json::Value::Null);
                    blocks.push(ContentBlock::ToolUse {
                        id: call.id,
                        name: call.function.name,
                        input,
                    });
                }
                Message {
                    role: Role::Assistant,
                    content: blocks,
                }
            }
            WireMessage::Tool { tool_call_id, content, .. } => Message {
                role: Role::User,
                content: vec![ContentBlock::ToolResult {
                    tool_use_id: tool_call_id,
                    content: vec![ContentItem::Text(content)],
                    is_error: false,
                }],
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_types::{ContentBlock, ContentItem, Message, Role};

    fn start_message(text: &str) -> Message {
        Message {
            role: Role::User,
            content: vec![ContentBlock::Text(text.to_string())],
        }
    }

    #[test]
    fn repair_strips_single_trailing_tool_call_message() {
        let mut history = vec![
            start_message("go"),
            Message {
                role: Role::Assistant,
                content: vec![ContentBlock::ToolUse {
                    id: "c1".to_string(),
                    name: "finish_task".to_string(),
                    input: serde_json::json!({}),
                }],
            },
        ];
        repair_history(&mut history);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn repair_strips_multiple_consecutive_tool_call_messages() {
        let mut history = vec![start_message("go")];
        for i in 0..3 {
            history.push(Message {
                role: Role::Assistant,
                content: vec![ContentBlock::ToolUse {
                    id: format!("c{i}"),
                    name: "finish_task".to_string(),
                    input: serde_json::json!({}),
                }],
            });
        }
        repair_history(&mut history);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn repair_leaves_well_formed_history_untouched() {
        let mut history = vec![
            start_message("go"),
            Message {
                role: Role::Assistant,
                content: vec![ContentBlock::ToolUse {
                    id: "c1".to_string(),
                    name: "finish_task".to_string(),
                    input: serde_json::json!({}),
                }],
            },
            Message {
                role: Role::User,
                content: vec![ContentBlock::ToolResult {
                    tool_use_id: "c1".to_string(),
                    content: vec![ContentItem::Text("Agent output set.".to_string())],
                    is_error: false,
                }],
            },
        ];
        let before = history.len();
        repair_history(&mut history);
        assert_eq!(history.len(), before);
    }

    #[tokio::test]
    async fn save_then_load_round_trips_tool_pairing() {
        let dir = tempfile::tempdir().unwrap();
        let history = vec![
            start_message("go"),
            Message {
                role: Role::Assistant,
                content: vec![
                    ContentBlock::Text("working on it".to_string()),
                    ContentBlock::ToolUse {
                        id: "c1".to_string(),
                        name: "finish_task".to_string(),
                        input: serde_json::json!({"result": "done", "summary": "sum"}),
                    },
                ],
            },
            Message {
                role: Role::User,
                content: vec![ContentBlock::ToolResult {
                    tool_use_id: "c1".to_string(),
                    content: vec![ContentItem::Text("Agent output set.".to_string())],
                    is_error: false,
                }],
            },
        ];

        save_history(dir.path(), &history).await.unwrap();
        let loaded = load_history(dir.path()).await.unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[1].role, Role::Assistant);
        let tool_calls = agent_types::tool_calls_of(&loaded[1]);
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(tool_calls[0].id, "c1");
        assert_eq!(tool_calls[0].function.name, "finish_task");

        // save -> load -> save is stable
        let path = history_file_path(dir.path());
        let first = tokio::fs::read_to_string(&path).await.unwrap();
        save_history(dir.path(), &loaded).await.unwrap();
        let second = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn save_repairs_crash_time_trailing_tool_call() {
        let dir = tempfile::tempdir().unwrap();
        let history = vec![
            start_message("go"),
            Message {
                role: Role::Assistant,
                content: vec![ContentBlock::ToolUse {
                    id: "c1".to_string(),
                    name: "finish_task".to_string(),
                    input: serde_json::json!({}),
                }],
            },
        ];
        save_history(dir.path(), &history).await.unwrap();
        let loaded = load_history(dir.path()).await.unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[tokio::test]
    async fn load_missing_file_returns_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_history(dir.path()).await.unwrap();
        assert!(loaded.is_empty());
    }
}
