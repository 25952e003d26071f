//! Conversation state: the message list and the fold that updates it.
//!
//! The conversation is an owned value. The session controller holds it and
//! mutates it only through [`Conversation::apply`], which runs the pure
//! [`reduce`] function on the targeted message.

mod reducer;

pub use reducer::{AUTH_FAILED_NOTICE, MessageAction, TRANSPORT_FAILED_NOTICE, reduce};

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::event::ChartPayload;

/// Identifier of a message, ordered by creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MessageId(u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
}

/// The body of a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MessageContent {
    #[default]
    Empty,
    Text(String),
    Chart(ChartPayload),
}

impl MessageContent {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_chart(&self) -> Option<&ChartPayload> {
        match self {
            Self::Chart(chart) => Some(chart),
            _ => None,
        }
    }
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationMessage {
    pub id: MessageId,
    pub sender: Sender,
    pub created_at: DateTime<Utc>,
    pub content: MessageContent,
    /// Progress notes, in arrival order. Only ever appended to.
    pub thinking_steps: Vec<String>,
    pub is_thinking_open: bool,
    pub is_done: bool,
    pub is_error: bool,
    pub is_chart: bool,
}

impl ConversationMessage {
    fn user(id: MessageId, text: &str) -> Self {
        Self {
            id,
            sender: Sender::User,
            created_at: Utc::now(),
            content: MessageContent::Text(text.to_string()),
            thinking_steps: Vec::new(),
            is_thinking_open: false,
            is_done: true,
            is_error: false,
            is_chart: false,
        }
    }

    fn assistant_placeholder(id: MessageId) -> Self {
        Self {
            id,
            sender: Sender::Assistant,
            created_at: Utc::now(),
            content: MessageContent::Empty,
            thinking_steps: Vec::new(),
            is_thinking_open: true,
            is_done: false,
            is_error: false,
            is_chart: false,
        }
    }
}

/// The ordered list of messages in one chat.
///
/// Messages are shared behind `Arc`, so cloning a conversation for a
/// snapshot copies pointers. A fold replaces only the message it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Conversation {
    messages: Vec<Arc<ConversationMessage>>,
    next_id: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Append a user message and its assistant placeholder.
    ///
    /// Both are pushed in one call, so no observer ever sees one without
    /// the other. Returns the placeholder's id.
    pub fn begin_exchange(&mut self, text: &str) -> MessageId {
        let user_id = self.allocate_id();
        let assistant_id = self.allocate_id();
        self.messages.extend([
            Arc::new(ConversationMessage::user(user_id, text)),
            Arc::new(ConversationMessage::assistant_placeholder(assistant_id)),
        ]);
        assistant_id
    }

    /// Fold an action into the message with the given id.
    ///
    /// Every other message is left untouched. Returns whether the targeted
    /// message changed.
    pub fn apply(&mut self, id: MessageId, action: &MessageAction) -> bool {
        let Some(message) = self.messages.iter_mut().find(|m| m.id == id) else {
            return false;
        };
        let next = reduce(message, action);
        if next == **message {
            return false;
        }
        *message = Arc::new(next);
        true
    }

    pub fn messages(&self) -> &[Arc<ConversationMessage>] {
        &self.messages
    }

    pub fn get(&self, id: MessageId) -> Option<&ConversationMessage> {
        self.messages.iter().find(|m| m.id == id).map(Arc::as_ref)
    }

    /// The assistant message still waiting for its answer, if any.
    pub fn open_message(&self) -> Option<&ConversationMessage> {
        self.messages
            .iter()
            .find(|m| m.sender == Sender::Assistant && !m.is_done)
            .map(Arc::as_ref)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Drop every message. Ids keep increasing across resets.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
