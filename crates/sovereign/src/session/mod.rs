//! Stream session controller.
//!
//! Owns the conversation and drives one exchange at a time:
//!
//! ```text
//! Idle ─send─▶ AwaitingAuth ─2xx─▶ Streaming ─result─▶ Completed
//!   │               │ 401               │ error / timeout / early EOF
//!   ▼               ▼                   ▼
//! CredentialMissing AuthFailed      TransportFailed
//! ```
//!
//! `send` takes `&mut self`, so two exchanges can never overlap on one
//! controller. Every fold and every state change publishes a fresh
//! [`Snapshot`] on a watch channel; renderers subscribe to that.

mod state;

pub use state::{ExchangeOutcome, SessionState, Snapshot, StreamSettings};

use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::{CredentialError, CredentialStore};
use crate::client::{ByteStream, ChatResponse, ClientError, Transport};
use crate::conversation::{Conversation, MessageAction, MessageId};
use crate::decoder::RecordStream;
use crate::event::classify;

/// Errors that prevent `send` from running an exchange at all.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("an exchange is already in progress")]
    Busy,

    #[error(transparent)]
    Credentials(#[from] CredentialError),
}

/// Drives exchanges against the assistant backend.
pub struct SessionController<T> {
    transport: T,
    credentials: CredentialStore,
    settings: StreamSettings,
    conversation: Conversation,
    state: SessionState,
    updates: watch::Sender<Snapshot>,
    cancel: CancellationToken,
}

impl<T: Transport> SessionController<T> {
    pub fn new(transport: T, credentials: CredentialStore, settings: StreamSettings) -> Self {
        let conversation = Conversation::new();
        let state = SessionState::Idle;
        let (updates, _) = watch::channel(Snapshot {
            conversation: conversation.clone(),
            state,
        });
        Self {
            transport,
            credentials,
            settings,
            conversation,
            state,
            updates,
            cancel: CancellationToken::new(),
        }
    }

    /// Subscribe to snapshots. The receiver starts at the current state.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            conversation: self.conversation.clone(),
            state: self.state,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Mutable access for credential entry between exchanges.
    pub fn credentials_mut(&mut self) -> &mut CredentialStore {
        &mut self.credentials
    }

    /// Token that cancels the next (or current) exchange.
    ///
    /// Grab it before calling [`send`](Self::send); cancelling it makes the
    /// read loop stop and discard whatever is still in flight.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Expand or collapse a message's thinking steps.
    pub fn toggle_thinking(&mut self, id: MessageId) -> bool {
        self.fold(id, &MessageAction::ToggleThinking)
    }

    /// Drop the whole conversation and return to `Idle`.
    pub fn reset_conversation(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.conversation.clear();
        self.state = SessionState::Idle;
        info!("conversation reset");
        self.publish();
    }

    /// Run one exchange for `text`.
    ///
    /// Blank text is ignored. Without a well-formed API key the call returns
    /// [`ExchangeOutcome::CredentialRequired`] before any message is created.
    /// Otherwise a user message and an assistant placeholder are appended and
    /// the response is streamed into the placeholder until it is done.
    pub async fn send(&mut self, text: &str) -> Result<ExchangeOutcome, SessionError> {
        if text.trim().is_empty() {
            debug!("ignoring blank input");
            return Ok(ExchangeOutcome::Ignored);
        }
        if self.is_busy() {
            return Err(SessionError::Busy);
        }

        let api_key = match self.credentials.api_key() {
            Ok(key) => key,
            Err(e) if e.is_entry_required() => {
                info!(reason = %e, "API key required before sending");
                self.transition(SessionState::CredentialMissing);
                return Ok(ExchangeOutcome::CredentialRequired(e));
            }
            Err(e) => return Err(e.into()),
        };

        let id = self.conversation.begin_exchange(text);
        info!(message_id = %id, "exchange started");
        self.transition(SessionState::AwaitingAuth);

        let outcome = self.run_exchange(id, text, &api_key).await;

        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        info!(message_id = %id, state = ?self.state, "exchange finished");
        Ok(outcome)
    }

    async fn run_exchange(&mut self, id: MessageId, text: &str, api_key: &str) -> ExchangeOutcome {
        let cancel = self.cancel.clone();
        let request_timeout = self.settings.request_timeout;

        let opened = tokio::select! {
            _ = cancel.cancelled() => None,
            result = timeout(request_timeout, self.transport.open_chat(text, api_key)) => Some(result),
        };

        let body = match opened {
            None => return self.cancelled(id),
            Some(Err(_)) => {
                warn!(
                    timeout_secs = request_timeout.as_secs(),
                    "backend did not respond in time"
                );
                return self.fail(id, MessageAction::TransportFailed);
            }
            Some(Ok(Err(e))) => {
                warn!(error = %e, "chat request failed");
                return self.fail(id, MessageAction::TransportFailed);
            }
            Some(Ok(Ok(ChatResponse::Unauthorized))) => {
                warn!("backend rejected the API key");
                if let Err(e) = self.credentials.clear_api_key() {
                    warn!(error = %e, "failed to forget rejected API key");
                }
                return self.fail(id, MessageAction::AuthFailed);
            }
            Some(Ok(Ok(ChatResponse::Streaming(body)))) => body,
        };

        self.transition(SessionState::Streaming);

        let mut records = RecordStream::new(with_idle_timeout(body, self.settings.idle_timeout));

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return self.cancelled(id),
                next = records.next() => next,
            };

            let record = match next {
                None => {
                    warn!("response ended before a result arrived");
                    return self.fail(id, MessageAction::TransportFailed);
                }
                Some(Err(e)) => {
                    warn!(error = %e, "response stream broke off");
                    return self.fail(id, MessageAction::TransportFailed);
                }
                Some(Ok(record)) => record,
            };

            match classify(&record) {
                Ok(Some(event)) => {
                    debug!(message_id = %id, ?event, "folding event");
                    self.fold(id, &MessageAction::from(event));
                }
                Ok(None) => debug!(%record, "ignoring record of unknown kind"),
                Err(e) => warn!(error = %e, %record, "dropping malformed record"),
            }

            // Anything after the final answer is never read.
            if self.conversation.get(id).is_some_and(|m| m.is_done) {
                self.transition(SessionState::Completed);
                return ExchangeOutcome::Completed;
            }
        }
    }

    fn fail(&mut self, id: MessageId, action: MessageAction) -> ExchangeOutcome {
        let (state, outcome) = match action {
            MessageAction::AuthFailed => (SessionState::AuthFailed, ExchangeOutcome::AuthFailed),
            _ => (
                SessionState::TransportFailed,
                ExchangeOutcome::TransportFailed,
            ),
        };
        self.conversation.apply(id, &action);
        self.transition(state);
        outcome
    }

    fn cancelled(&mut self, id: MessageId) -> ExchangeOutcome {
        info!(message_id = %id, "exchange cancelled");
        self.conversation.apply(id, &MessageAction::Cancelled);
        self.transition(SessionState::Cancelled);
        ExchangeOutcome::Cancelled
    }

    fn fold(&mut self, id: MessageId, action: &MessageAction) -> bool {
        let changed = self.conversation.apply(id, action);
        if changed {
            self.publish();
        }
        changed
    }

    fn transition(&mut self, state: SessionState) {
        debug!(from = ?self.state, to = ?state, "session state");
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        self.updates.send_replace(self.snapshot());
    }
}

/// Fail the body with [`ClientError::Timeout`] when no chunk arrives within
/// `idle`. Any chunk resets the clock, whether or not it completes a record.
fn with_idle_timeout(body: ByteStream, idle: Duration) -> ByteStream {
    let seconds = idle.as_secs();
    let timed = tokio_stream::StreamExt::timeout(body, idle).map(move |item| match item {
        Ok(chunk) => chunk,
        Err(_) => Err(ClientError::Timeout { seconds }),
    });
    Box::pin(timed)
}
