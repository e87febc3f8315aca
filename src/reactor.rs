//! Reaction to provider-pushed auth events

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;

use castgate_auth::{AuthChange, AuthChangeEvent, AuthSubscription, Session};

use crate::auth::ProviderHandle;
use crate::bootstrap::ProfileResolver;
use crate::error::{Error, Result};
use crate::navigation::Navigator;
use crate::profile::Profile;
use crate::router::{BootTerminal, RoleRouter};
use crate::state::SharedState;

/// What the reactor needs from the mounted context.
#[derive(Clone)]
pub struct ReactorDeps {
    pub provider: ProviderHandle,
    pub resolver: ProfileResolver,
    pub state: SharedState,
    pub router: Arc<RoleRouter>,
    pub navigator: Arc<dyn Navigator>,
    /// Upper bound for the profile lookup after a sign-in. Later events
    /// queue behind it.
    pub deadline: Duration,
}

/// Consumes one auth subscription on a background task. The subscription
/// lives exactly as long as the reactor.
pub struct AuthEventReactor {
    task: JoinHandle<()>,
}

impl AuthEventReactor {
    pub fn spawn(mut subscription: AuthSubscription, deps: ReactorDeps) -> Self {
        let task = tokio::spawn(async move {
            let id = subscription.id();
            debug!("Auth event reactor started on subscription {}", id);

            while let Some(change) = subscription.recv().await {
                if !deps.state.is_mounted() {
                    break;
                }
                let event = change.event;
                match AssertUnwindSafe(deps.handle(change)).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!("Handling {} failed: {}", event, e),
                    Err(_) => error!("Handler for {} panicked, listener kept alive", event),
                }
            }

            debug!("Auth event reactor on subscription {} stopped", id);
        });

        Self { task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn abort(&self) {
        self.task.abort();
    }

    /// Stops the reactor and waits until its subscription is dropped.
    pub async fn stop(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

impl ReactorDeps {
    async fn handle(&self, change: AuthChange) -> Result<()> {
        debug!("Auth event {}", change.event);
        match change.event {
            AuthChangeEvent::SignedIn => {
                let session = change
                    .session
                    .ok_or_else(|| Error::session("SIGNED_IN without a session"))?;
                self.signed_in(session).await
            }
            AuthChangeEvent::SignedOut => {
                self.signed_out();
                Ok(())
            }
            AuthChangeEvent::TokenRefreshed | AuthChangeEvent::UserUpdated => {
                if let Some(session) = change.session {
                    self.state.update(|s| s.set_session(session));
                }
                Ok(())
            }
            AuthChangeEvent::InitialSession | AuthChangeEvent::PasswordRecovery => Ok(()),
        }
    }

    async fn signed_in(&self, session: Session) -> Result<()> {
        let user_id = session.user_id().to_string();
        info!("Signed in as {}", user_id);
        let lookup = self.resolver.hydrate(&self.state, session);
        let hydration = match tokio::time::timeout(self.deadline, lookup).await {
            Ok(hydration) => hydration,
            Err(_) => {
                warn!("Profile lookup for {} exceeded {:?}", user_id, self.deadline);
                let timed_out: Result<Option<Profile>> = Err(Error::general(format!(
                    "profile lookup timed out after {:?}",
                    self.deadline
                )));
                self.state.update(|s| s.apply_resolution(&user_id, &timed_out));
                return Ok(());
            }
        };
        if !hydration.applied {
            return Ok(());
        }

        let snapshot = self.state.snapshot();
        if !snapshot.has_handled_initial_session {
            // The first load is placed by the page gate.
            return Ok(());
        }
        if snapshot.needs_profile_setup() {
            debug!("Profile unresolved, leaving navigation to the page");
            return Ok(());
        }

        let current = self.navigator.current_path();
        if self.router.table().category(&current).is_auth_adjacent() {
            return Ok(());
        }

        match self.router.decide(&snapshot.boot_state()) {
            Some(terminal) if terminal != BootTerminal::Login => {
                if !self.router.is_at(&current, terminal) {
                    info!("Sign-in moves {} to {}", current, terminal);
                    self.navigator.refresh();
                    self.navigator.push(terminal.path());
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn signed_out(&self) {
        info!("Signed out");
        self.state.update(|s| s.clear());
        self.provider.reset();

        let current = self.navigator.current_path();
        if !self.router.table().category(&current).allows_signed_out() {
            self.navigator.hard_navigate(BootTerminal::Login.path());
        }
    }
}
