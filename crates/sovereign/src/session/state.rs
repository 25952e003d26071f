//! Session lifecycle types.

use std::time::Duration;

use serde::Serialize;

use crate::auth::CredentialError;
use crate::conversation::Conversation;

/// Where the controller is in the current (or last) exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No exchange has run since creation or reset.
    Idle,
    /// The last send stopped before the network: no usable API key.
    CredentialMissing,
    /// Request sent, waiting for the response status.
    AwaitingAuth,
    /// Reading the response body.
    Streaming,
    /// The final answer arrived.
    Completed,
    /// The backend rejected the API key.
    AuthFailed,
    /// The response could not be obtained or read to completion.
    TransportFailed,
    /// The exchange was abandoned by the user.
    Cancelled,
}

impl SessionState {
    /// Whether an exchange is in flight. Input is not accepted while busy.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::AwaitingAuth | Self::Streaming)
    }
}

/// How a call to `send` ended.
#[derive(Debug)]
pub enum ExchangeOutcome {
    /// The text was blank; nothing happened.
    Ignored,
    /// No usable API key is stored. No messages were created and no
    /// request was made.
    CredentialRequired(CredentialError),
    /// The final answer was delivered.
    Completed,
    /// The backend rejected the API key, which has been forgotten.
    AuthFailed,
    /// The backend could not be reached or the stream broke off.
    TransportFailed,
    /// The exchange was cancelled before it finished.
    Cancelled,
}

impl ExchangeOutcome {
    /// Whether the user should be asked for an API key before resending.
    pub fn requires_credential_entry(&self) -> bool {
        matches!(self, Self::CredentialRequired(_) | Self::AuthFailed)
    }

    /// Whether the exchange ended in a user-visible error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::AuthFailed | Self::TransportFailed)
    }
}

/// Immutable view published to subscribers after every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub conversation: Conversation,
    pub state: SessionState,
}

impl Snapshot {
    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }
}

/// Time limits for one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    /// Limit on waiting for the response status.
    pub request_timeout: Duration,
    /// Limit on silence between two chunks of the body.
    pub idle_timeout: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(120),
        }
    }
}
