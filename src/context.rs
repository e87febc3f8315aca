//! The mounted auth context
//!
//! [`AuthContext::mount`] wires a provider, the profile store and a
//! [`Navigator`] together: it subscribes to auth changes, starts the event
//! reactor and then runs the session bootstrap. Consumers read the
//! [`AuthState`] and call the auth actions through the context.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::watch;

use castgate_auth::{ResendType, Session, SignUpOptions, SignUpResponse};

use crate::auth::ProviderHandle;
use crate::bootstrap::{ProfileResolver, SessionBootstrap};
use crate::config::GateOptions;
use crate::error::{Error, Result};
use crate::navigation::Navigator;
use crate::profile::{Profile, ProfileRepair, ProfileStore, ProfileUpdate};
use crate::reactor::{AuthEventReactor, ReactorDeps};
use crate::router::{BootTerminal, GateDecision, RoleRouter};
use crate::routes::RouteTable;
use crate::state::{AuthState, SharedState};

/// Collaborators of a context.
#[derive(Clone)]
pub struct GateDeps {
    pub provider: ProviderHandle,
    pub profiles: Arc<dyn ProfileStore>,
    pub repair: Arc<dyn ProfileRepair>,
    pub routes: RouteTable,
    pub options: GateOptions,
}

pub struct AuthContext {
    provider: ProviderHandle,
    resolver: ProfileResolver,
    state: SharedState,
    router: Arc<RoleRouter>,
    navigator: Arc<dyn Navigator>,
    options: GateOptions,
    reactor: Option<AuthEventReactor>,
}

impl AuthContext {
    /// Must be called inside a tokio runtime.
    pub fn mount(deps: GateDeps, navigator: Arc<dyn Navigator>) -> Self {
        let GateDeps {
            provider,
            profiles,
            repair,
            routes,
            options,
        } = deps;

        let state = SharedState::new();
        let router = Arc::new(RoleRouter::new(routes));
        let resolver = ProfileResolver::new(profiles, repair).with_retry(
            options.profile_retry_attempts,
            options.profile_retry_backoff,
        );

        // Subscribe before the initial session check so no change is missed.
        let subscription = provider.get().on_auth_state_change();
        let reactor = AuthEventReactor::spawn(
            subscription,
            ReactorDeps {
                provider: provider.clone(),
                resolver: resolver.clone(),
                state: state.clone(),
                router: router.clone(),
                navigator: navigator.clone(),
                deadline: options.bootstrap_deadline,
            },
        );

        let bootstrap = SessionBootstrap::new(
            provider.clone(),
            resolver.clone(),
            state.clone(),
            options.bootstrap_deadline,
        );
        tokio::spawn(async move { bootstrap.run().await });

        debug!("Auth context mounted");
        Self {
            provider,
            resolver,
            state,
            router,
            navigator,
            options,
            reactor: Some(reactor),
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.snapshot()
    }

    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn router(&self) -> &RoleRouter {
        &self.router
    }

    pub fn provider(&self) -> &ProviderHandle {
        &self.provider
    }

    /// Waits until the state satisfies `predicate`.
    pub async fn wait_for(&self, predicate: impl FnMut(&AuthState) -> bool) -> Result<AuthState> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(predicate)
            .await
            .map_err(|_| Error::session("auth context is gone"))?;
        Ok(AuthState::clone(&state))
    }

    /// Waits for the bootstrap to stop loading.
    pub async fn loaded(&self) -> Result<AuthState> {
        self.wait_for(|s| !s.is_loading).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let session = self
            .provider
            .get()
            .sign_in_with_password(email, password)
            .await?;
        Ok(session)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        mut options: SignUpOptions,
    ) -> Result<SignUpResponse> {
        if options.email_redirect_to.is_none() {
            options.email_redirect_to = self.options.email_redirect_to.clone();
        }
        let response = self.provider.get().sign_up(email, password, options).await?;
        if response.session.is_none() {
            info!("Sign-up for {} awaits email confirmation", email);
        }
        Ok(response)
    }

    /// Signs out locally and leaves for the login page even when the remote
    /// call fails; its error is returned afterwards.
    pub async fn sign_out(&self) -> Result<()> {
        let remote = self.provider.get().sign_out().await;
        if let Err(e) = &remote {
            warn!("Remote sign-out failed, signing out locally: {}", e);
        }

        self.state.update(|s| s.clear());
        self.provider.reset();

        let current = self.navigator.current_path();
        if !self.router.is_at(&current, BootTerminal::Login) {
            self.navigator.hard_navigate(BootTerminal::Login.path());
        }

        remote.map_err(Error::from)
    }

    /// Sends the sign-up confirmation email again to the signed-in user.
    pub async fn send_verification_email(&self) -> Result<()> {
        let email = self
            .state
            .snapshot()
            .user
            .and_then(|u| u.email)
            .ok_or_else(|| Error::session("no signed-in user with an email address"))?;

        self.provider
            .get()
            .resend(
                ResendType::Signup,
                &email,
                self.options.email_redirect_to.as_deref(),
            )
            .await?;
        Ok(())
    }

    pub async fn reset_password(&self, email: &str) -> Result<()> {
        self.provider
            .get()
            .reset_password_for_email(email, self.options.password_reset_redirect_to.as_deref())
            .await?;
        Ok(())
    }

    /// Runs profile resolution, repair included, again for the current
    /// session.
    pub async fn retry_profile_setup(&self) -> Result<Option<Profile>> {
        let session = self.current_session()?;
        info!("Retrying profile setup for {}", session.user_id());
        self.resolver.hydrate(&self.state, session).await.result
    }

    /// Stores the onboarding form and moves to the resulting terminal.
    pub async fn save_onboarding(&self, update: ProfileUpdate) -> Result<BootTerminal> {
        let session = self.current_session()?;
        let current = self
            .state
            .snapshot()
            .profile
            .ok_or_else(|| Error::profile("no profile loaded"))?;

        let update = update.normalized();
        let missing = update.missing_for(&current);
        if !missing.is_empty() {
            return Err(Error::validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let profiles = self.resolver.profiles();
        let stored = match profiles.update_profile(&session, &update).await? {
            Some(profile) => Some(profile),
            None => profiles.fetch_profile(&session).await?,
        };
        let profile = stored.ok_or_else(|| Error::profile("updated profile is not readable"))?;

        let user_id = session.user_id().to_string();
        let applied = self
            .state
            .update(|s| s.apply_resolution(&user_id, &Ok(Some(profile))))
            .unwrap_or(false);
        if !applied {
            return Err(Error::session("signed out while saving onboarding"));
        }

        self.converge()
            .ok_or_else(|| Error::general("profile still loading after onboarding"))
    }

    /// Gate decision for `path` under the current state.
    pub fn gate(&self, path: &str) -> GateDecision {
        self.router.gate(path, &self.state.snapshot().boot_state())
    }

    /// Gates the navigator's current location, replacing it on redirect.
    pub fn guard(&self) -> GateDecision {
        let current = self.navigator.current_path();
        let decision = self.gate(&current);
        if let GateDecision::Redirect(target) = &decision {
            debug!("Gate sends {} to {}", current, target);
            self.navigator.replace(target);
        }
        decision
    }

    /// Pushes the terminal for the current state unless already there.
    pub fn converge(&self) -> Option<BootTerminal> {
        self.router
            .converge(self.navigator.as_ref(), &self.state.snapshot().boot_state())
    }

    /// Stops the reactor and drops its subscription. Work still in flight
    /// can no longer change the state.
    pub async fn unmount(mut self) {
        self.state.unmount();
        if let Some(reactor) = self.reactor.take() {
            reactor.stop().await;
        }
        debug!("Auth context unmounted");
    }

    fn current_session(&self) -> Result<Session> {
        self.state
            .snapshot()
            .session
            .ok_or_else(|| Error::session("not signed in"))
    }
}

impl Drop for AuthContext {
    fn drop(&mut self) {
        self.state.unmount();
        if let Some(reactor) = &self.reactor {
            reactor.abort();
        }
    }
}
