//! In-memory auth state shared by the bootstrap, the reactor and consumers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;
use tokio::sync::watch;

use castgate_auth::{Session, User};

use crate::error::Result;
use crate::profile::{AccountType, Profile, UserRole};
use crate::router::BootState;

/// Where the profile lookup for the current session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileStatus {
    /// No session, nothing to look up.
    #[default]
    Idle,
    Loading,
    Ready,
    /// The row is absent and could not be repaired.
    Missing,
    /// The lookup itself failed.
    Failed,
}

impl ProfileStatus {
    pub fn is_pending(self) -> bool {
        self == ProfileStatus::Loading
    }

    /// Settled without a profile; the page may offer a retry.
    pub fn needs_retry(self) -> bool {
        matches!(self, ProfileStatus::Missing | ProfileStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    pub session: Option<Session>,
    pub role: Option<UserRole>,
    pub account_type: AccountType,
    pub profile: Option<Profile>,
    pub profile_status: ProfileStatus,
    pub is_loading: bool,
    pub is_email_verified: bool,
    pub has_handled_initial_session: bool,
}

impl AuthState {
    /// State right after mount, before anything is known.
    pub fn loading() -> Self {
        Self {
            user: None,
            session: None,
            role: None,
            account_type: AccountType::Unassigned,
            profile: None,
            profile_status: ProfileStatus::Idle,
            is_loading: true,
            is_email_verified: false,
            has_handled_initial_session: false,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_id())
    }

    pub fn boot_state(&self) -> BootState {
        BootState {
            has_session: self.session.is_some(),
            profile_pending: self.session.is_some() && self.profile_status.is_pending(),
            profile_unresolved: self.needs_profile_setup(),
            role: self.role,
            account_type: self.account_type,
            profile_complete: self
                .profile
                .as_ref()
                .map_or(false, Profile::is_onboarding_complete),
        }
    }

    pub fn needs_profile_setup(&self) -> bool {
        self.session.is_some() && self.profile_status.needs_retry()
    }

    /// Session and user only; the profile is left alone.
    pub fn set_session(&mut self, session: Session) {
        self.is_email_verified = session.user.is_email_confirmed();
        self.user = Some(session.user.clone());
        self.session = Some(session);
    }

    /// Drops the previous user's profile when the subject changes.
    pub fn begin_profile(&mut self, session: Session) {
        let same_user = self.user_id() == Some(session.user_id());
        self.set_session(session);
        if !same_user {
            self.set_profile(None);
        }
        self.profile_status = ProfileStatus::Loading;
    }

    pub fn set_profile(&mut self, profile: Option<Profile>) {
        self.role = profile.as_ref().and_then(|p| p.role);
        self.account_type = profile
            .as_ref()
            .map(|p| p.account_type)
            .unwrap_or_default();
        self.profile = profile;
    }

    /// Everything back to signed-out. Loading is over.
    pub fn clear(&mut self) {
        let handled = self.has_handled_initial_session;
        *self = Self::loading();
        self.is_loading = false;
        self.has_handled_initial_session = handled;
    }

    /// Applies a profile lookup for `user_id`. Lookups for a user who is no
    /// longer signed in are ignored.
    pub fn apply_resolution(&mut self, user_id: &str, result: &Result<Option<Profile>>) -> bool {
        if self.user_id() != Some(user_id) {
            debug!("Dropping profile result for {}: user changed", user_id);
            return false;
        }
        match result {
            Ok(Some(profile)) => {
                self.set_profile(Some(profile.clone()));
                self.profile_status = ProfileStatus::Ready;
            }
            Ok(None) => {
                self.set_profile(None);
                self.profile_status = ProfileStatus::Missing;
            }
            Err(_) => {
                self.set_profile(None);
                self.profile_status = ProfileStatus::Failed;
            }
        }
        true
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::loading()
    }
}

/// Cloneable handle on the state of one mounted context. Writes are dropped
/// once the context is unmounted.
#[derive(Clone)]
pub struct SharedState {
    sender: Arc<watch::Sender<AuthState>>,
    mounted: Arc<AtomicBool>,
}

impl SharedState {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(AuthState::loading());
        Self {
            sender: Arc::new(sender),
            mounted: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn snapshot(&self) -> AuthState {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.sender.subscribe()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Runs `f` against the state and returns its result, or `None` when
    /// unmounted.
    pub fn update<R>(&self, f: impl FnOnce(&mut AuthState) -> R) -> Option<R> {
        if !self.is_mounted() {
            debug!("Discarding state update after unmount");
            return None;
        }
        let mut out = None;
        self.sender.send_modify(|state| out = Some(f(state)));
        out
    }

    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn session(id: &str, confirmed: bool) -> Session {
        serde_json::from_value(serde_json::json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "token_type": "bearer",
            "user": {
                "id": id,
                "email_confirmed_at": if confirmed { Some("2024-01-01T00:00:00Z") } else { None }
            }
        }))
        .unwrap()
    }

    #[test]
    fn stale_resolution_is_ignored() {
        let mut state = AuthState::loading();
        state.begin_profile(session("u-2", true));

        let applied = state.apply_resolution("u-1", &Ok(Some(Profile::new("u-1"))));
        assert!(!applied);
        assert!(state.profile.is_none());
        assert_eq!(state.profile_status, ProfileStatus::Loading);
    }

    #[test]
    fn resolution_outcomes_map_to_status() {
        let mut state = AuthState::loading();
        state.begin_profile(session("u-1", false));
        assert!(state.boot_state().profile_pending);
        assert!(!state.is_email_verified);

        let mut profile = Profile::new("u-1");
        profile.role = Some(UserRole::Admin);
        state.apply_resolution("u-1", &Ok(Some(profile)));
        assert_eq!(state.role, Some(UserRole::Admin));
        assert_eq!(state.profile_status, ProfileStatus::Ready);

        state.apply_resolution("u-1", &Err(Error::repair("boom")));
        assert_eq!(state.role, None);
        assert!(state.needs_profile_setup());
        assert!(state.boot_state().profile_unresolved);
    }

    #[test]
    fn switching_user_drops_old_profile() {
        let mut state = AuthState::loading();
        state.begin_profile(session("u-1", true));
        let mut profile = Profile::new("u-1");
        profile.role = Some(UserRole::Client);
        state.apply_resolution("u-1", &Ok(Some(profile)));

        state.begin_profile(session("u-1", true));
        assert_eq!(state.role, Some(UserRole::Client));

        state.begin_profile(session("u-2", true));
        assert_eq!(state.role, None);
        assert!(state.profile.is_none());
    }

    #[test]
    fn clear_keeps_initial_flag() {
        let mut state = AuthState::loading();
        state.has_handled_initial_session = true;
        state.set_session(session("u-1", true));
        state.clear();
        assert!(state.session.is_none());
        assert!(!state.is_loading);
        assert!(state.has_handled_initial_session);
    }

    #[test]
    fn updates_after_unmount_are_dropped() {
        let shared = SharedState::new();
        assert_eq!(shared.update(|s| s.is_loading = false), Some(()));
        shared.unmount();
        assert_eq!(shared.update(|s| s.is_loading = true), None);
        assert!(!shared.snapshot().is_loading);
    }
}
