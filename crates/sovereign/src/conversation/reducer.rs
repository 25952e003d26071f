//! The message reducer.

use crate::event::{FinalAnswer, StreamEvent};

use super::{ConversationMessage, MessageContent};

/// Shown when the backend rejects the stored API key.
pub const AUTH_FAILED_NOTICE: &str = "Authentication failed. Please check your API Key.";

/// Shown when the response could not be read.
pub const TRANSPORT_FAILED_NOTICE: &str =
    "Error: Could not fetch response. Please check your connection and API Key.";

/// A change to one message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageAction {
    /// Append a progress note.
    AppendStep(String),
    /// Deliver the final answer.
    Finalize(FinalAnswer),
    /// The backend answered 401.
    AuthFailed,
    /// The response could not be obtained or read to completion.
    TransportFailed,
    /// The user abandoned the exchange. Steps so far are kept.
    Cancelled,
    /// The user expanded or collapsed the thinking steps.
    ToggleThinking,
}

impl From<StreamEvent> for MessageAction {
    fn from(event: StreamEvent) -> Self {
        match event {
            StreamEvent::Step(step) => Self::AppendStep(step),
            StreamEvent::Finalize(answer) => Self::Finalize(answer),
        }
    }
}

/// Fold one action into a message, returning the new message.
///
/// A message that is done only responds to [`MessageAction::ToggleThinking`];
/// every other action returns it unchanged.
pub fn reduce(message: &ConversationMessage, action: &MessageAction) -> ConversationMessage {
    let mut next = message.clone();

    match action {
        MessageAction::ToggleThinking => {
            next.is_thinking_open = !next.is_thinking_open;
        }
        _ if message.is_done => {}
        MessageAction::AppendStep(step) => {
            next.thinking_steps.push(step.clone());
        }
        MessageAction::Finalize(FinalAnswer::Text(text)) => {
            next.content = MessageContent::Text(text.clone());
            next.is_chart = false;
            next.is_done = true;
            next.is_thinking_open = false;
        }
        MessageAction::Finalize(FinalAnswer::Chart(chart)) => {
            next.content = MessageContent::Chart(chart.clone());
            next.is_chart = true;
            next.is_done = true;
            next.is_thinking_open = false;
        }
        MessageAction::AuthFailed => fail(&mut next, AUTH_FAILED_NOTICE),
        MessageAction::TransportFailed => fail(&mut next, TRANSPORT_FAILED_NOTICE),
        MessageAction::Cancelled => {
            next.is_done = true;
        }
    }

    next
}

fn fail(message: &mut ConversationMessage, notice: &str) {
    message.content = MessageContent::Text(notice.to_string());
    message.is_error = true;
    message.is_chart = false;
    message.is_done = true;
}
