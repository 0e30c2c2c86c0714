use serde::{ Serialize, Deserialize };
use std::collections::HashMap;
use std::fmt;

/// Elapsed generation time in milliseconds, keyed by assistant message id.
pub type DurationMap = HashMap<String, u64>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartKind {
    Text,
    Reasoning,
}

/// One typed fragment of message content. Streaming appends to the last
/// fragment of the matching kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessagePart {
    Text {
        text: String,
    },
    Reasoning {
        text: String,
    },
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        MessagePart::Text { text: text.into() }
    }

    pub fn kind(&self) -> PartKind {
        match self {
            MessagePart::Text { .. } => PartKind::Text,
            MessagePart::Reasoning { .. } => PartKind::Reasoning,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            MessagePart::Text { text } | MessagePart::Reasoning { text } => text,
        }
    }

    pub(crate) fn push_str(&mut self, delta: &str) {
        match self {
            MessagePart::Text { text } | MessagePart::Reasoning { text } => text.push_str(delta),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl Message {
    pub fn new(id: impl Into<String>, role: Role, parts: Vec<MessagePart>) -> Self {
        Self {
            id: id.into(),
            role,
            parts,
        }
    }

    /// Concatenation of the plain-text fragments, skipping reasoning.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter(|p| p.kind() == PartKind::Text)
            .map(|p| p.content())
            .collect()
    }
}

/// The single blob written under the storage key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub durations: DurationMap,
}

impl PersistedRecord {
    pub fn new(messages: Vec<Message>, durations: DurationMap) -> Self {
        Self { messages, durations }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.durations.is_empty()
    }

    /// Drops duration entries that do not name an assistant message.
    pub fn normalize(mut self) -> Self {
        let messages = &self.messages;
        self.durations.retain(|id, _| {
            messages.iter().any(|m| m.role == Role::Assistant && &m.id == id)
        });
        self
    }
}

/// Lifecycle of the active exchange.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    #[default]
    Ready,
    Submitted,
    Streaming,
    Error,
}

impl ChatStatus {
    pub fn accepts_input(&self) -> bool {
        matches!(self, ChatStatus::Ready | ChatStatus::Error)
    }

    pub fn is_generating(&self) -> bool {
        matches!(self, ChatStatus::Submitted | ChatStatus::Streaming)
    }
}

impl fmt::Display for ChatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChatStatus::Ready => "ready",
            ChatStatus::Submitted => "submitted",
            ChatStatus::Streaming => "streaming",
            ChatStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_sdk_shaped_message() {
        let json = r#"{"id":"a1","role":"assistant","parts":[{"type":"text","text":"Namaste"}]}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.text(), "Namaste");
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let record: PersistedRecord = serde_json::from_str("{}").unwrap();
        assert!(record.is_empty());

        let record: PersistedRecord = serde_json::from_str(r#"{"messages":[],"extra":1}"#).unwrap();
        assert!(record.durations.is_empty());
    }

    #[test]
    fn normalize_keeps_only_assistant_durations() {
        let record = PersistedRecord::new(
            vec![
                Message::new("u1", Role::User, vec![MessagePart::text("hi")]),
                Message::new("a1", Role::Assistant, vec![MessagePart::text("hello")])
            ],
            DurationMap::from([
                ("u1".to_string(), 5),
                ("a1".to_string(), 1200),
                ("ghost".to_string(), 7),
            ])
        ).normalize();

        assert_eq!(record.durations.len(), 1);
        assert_eq!(record.durations.get("a1"), Some(&1200));
    }

    #[test]
    fn text_skips_reasoning_parts() {
        let msg = Message::new(
            "a1",
            Role::Assistant,
            vec![
                MessagePart::Reasoning { text: "thinking".into() },
                MessagePart::text("Yes, "),
                MessagePart::text("you are.")
            ]
        );
        assert_eq!(msg.text(), "Yes, you are.");
    }
}
