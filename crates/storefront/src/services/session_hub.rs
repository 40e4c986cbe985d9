//! Session change notifications.
//!
//! The hub is the process-wide context for authentication state. It reads the
//! current session from the browser's session store and fans out change
//! events (sign-in, sign-out, token refresh) to listeners registered for one
//! sign-in's `gate_key`. Open protected pages hold a listener through the
//! `/session/events` stream; dropping the stream cancels it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tower_sessions::Session;
use uuid::Uuid;

use crate::models::{CurrentSession, session_keys};

/// Events buffered per gate key before slow listeners start lagging.
const CHANNEL_CAPACITY: usize = 16;

/// A change to the authentication state of one sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

impl SessionEvent {
    /// Name used on the event stream.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SignedIn => "signed_in",
            Self::SignedOut => "signed_out",
            Self::TokenRefreshed => "token_refreshed",
        }
    }
}

/// Fan-out of session events keyed by gate key.
#[derive(Clone, Default)]
pub struct SessionHub {
    inner: Arc<HubInner>,
}

#[derive(Default)]
struct HubInner {
    channels: Mutex<HashMap<Uuid, broadcast::Sender<SessionEvent>>>,
}

impl HubInner {
    fn channels(&self) -> MutexGuard<'_, HashMap<Uuid, broadcast::Sender<SessionEvent>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The session stored for this browser, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store cannot be read.
    pub async fn current(
        &self,
        session: &Session,
    ) -> Result<Option<CurrentSession>, tower_sessions::session::Error> {
        session.get(session_keys::CURRENT_SESSION).await
    }

    /// Register a listener for `gate_key`.
    #[must_use]
    pub fn subscribe(&self, gate_key: Uuid) -> SessionSubscription {
        let receiver = self
            .inner
            .channels()
            .entry(gate_key)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();

        tracing::debug!(%gate_key, "Session listener registered");
        SessionSubscription {
            gate_key,
            receiver: Some(receiver),
            hub: Arc::clone(&self.inner),
        }
    }

    /// Deliver `event` to every listener of `gate_key`. Returns how many
    /// listeners received it.
    pub fn publish(&self, gate_key: Uuid, event: SessionEvent) -> usize {
        let delivered = self
            .inner
            .channels()
            .get(&gate_key)
            .and_then(|sender| sender.send(event).ok())
            .unwrap_or(0);

        tracing::debug!(%gate_key, event = event.as_str(), delivered, "Session event published");
        delivered
    }

    /// Number of live listeners for `gate_key`.
    #[must_use]
    pub fn listener_count(&self, gate_key: Uuid) -> usize {
        self.inner
            .channels()
            .get(&gate_key)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Close every channel. Listeners see the end of their stream, which lets
    /// open event streams finish during graceful shutdown.
    pub fn shutdown(&self) {
        let closed = {
            let mut channels = self.inner.channels();
            let count = channels.len();
            channels.clear();
            count
        };
        tracing::info!(closed, "Session hub shut down");
    }
}

/// A cancellable registration for one gate key's events.
///
/// Cancelled explicitly with [`cancel`](Self::cancel) or implicitly on drop.
pub struct SessionSubscription {
    gate_key: Uuid,
    receiver: Option<broadcast::Receiver<SessionEvent>>,
    hub: Arc<HubInner>,
}

impl SessionSubscription {
    #[must_use]
    pub const fn gate_key(&self) -> Uuid {
        self.gate_key
    }

    /// Wait for the next event. Returns `None` once cancelled or when the hub
    /// shuts down.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(gate_key = %self.gate_key, skipped, "Session listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Stop listening.
    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.receiver.take().is_none() {
            return;
        }
        let mut channels = self.hub.channels();
        if channels
            .get(&self.gate_key)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&self.gate_key);
        }
        tracing::debug!(gate_key = %self.gate_key, "Session listener cancelled");
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        self.release();
    }
}
