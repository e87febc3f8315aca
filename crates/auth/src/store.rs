//! Session storage shared between clients, and the auth-change broadcast.
//!
//! Every [`crate::Auth`] built over the same [`SessionStore`] sees the same
//! session, and every subscriber receives every change. This is how several
//! tabs of one browser stay in sync.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, trace, warn};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::types::Session;

const DEFAULT_CAPACITY: usize = 64;

/// Auth state transitions pushed to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthChangeEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

impl fmt::Display for AuthChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
            Self::PasswordRecovery => "PASSWORD_RECOVERY",
        };
        f.write_str(name)
    }
}

/// One broadcast change: the event and the session after it.
#[derive(Debug, Clone)]
pub struct AuthChange {
    pub event: AuthChangeEvent,
    pub session: Option<Session>,
}

struct StoreInner {
    session: RwLock<Option<Session>>,
    changes: broadcast::Sender<AuthChange>,
}

/// Cloneable handle to the shared session slot.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// `capacity` bounds how far a slow subscriber may fall behind before it
    /// starts skipping changes.
    pub fn with_capacity(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(StoreInner {
                session: RwLock::new(None),
                changes,
            }),
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.inner
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the stored session and tells every subscriber.
    pub fn commit(&self, event: AuthChangeEvent, session: Option<Session>) {
        {
            let mut slot = self
                .inner
                .session
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            *slot = session.clone();
        }
        self.publish(AuthChange { event, session });
    }

    /// Broadcasts without touching the stored session.
    pub fn notify(&self, event: AuthChangeEvent) {
        self.publish(AuthChange {
            event,
            session: self.current(),
        });
    }

    fn publish(&self, change: AuthChange) {
        let event = change.event;
        match self.inner.changes.send(change) {
            Ok(receivers) => debug!("Broadcast {} to {} subscriber(s)", event, receivers),
            Err(_) => trace!("Broadcast {} with no subscribers", event),
        }
    }

    pub fn subscribe(&self) -> AuthSubscription {
        let subscription = AuthSubscription {
            id: Uuid::new_v4(),
            receiver: self.inner.changes.subscribe(),
        };
        debug!("Auth subscription {} opened", subscription.id);
        subscription
    }

    /// Number of live subscriptions across all clients sharing this store.
    pub fn subscriber_count(&self) -> usize {
        self.inner.changes.receiver_count()
    }
}

/// Receiving end of `on_auth_state_change`. Dropping it unsubscribes.
pub struct AuthSubscription {
    id: Uuid,
    receiver: broadcast::Receiver<AuthChange>,
}

impl AuthSubscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next change, or `None` once the store is gone. A subscriber that fell
    /// behind skips the changes it missed.
    pub async fn recv(&mut self) -> Option<AuthChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "Auth subscription {} lagged, skipped {} change(s)",
                        self.id, skipped
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        debug!("Auth subscription {} closed", self.id);
    }
}
