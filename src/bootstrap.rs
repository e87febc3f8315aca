//! Session bootstrap and profile resolution

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use log::{debug, error, info, warn};
use tokio::time::sleep;

use castgate_auth::Session;

use crate::auth::ProviderHandle;
use crate::error::{Error, Result};
use crate::profile::{Profile, ProfileRepair, ProfileStore};
use crate::state::{ProfileStatus, SharedState};

/// Outcome of resolving and applying a profile for one session.
#[derive(Debug)]
pub struct Hydration {
    /// False when the user changed while the lookup was in flight.
    pub applied: bool,
    pub result: Result<Option<Profile>>,
}

/// Finds the profile for a session, repairing a missing row.
#[derive(Clone)]
pub struct ProfileResolver {
    profiles: Arc<dyn ProfileStore>,
    repair: Arc<dyn ProfileRepair>,
    retry_attempts: u32,
    retry_backoff: Duration,
}

impl ProfileResolver {
    pub fn new(profiles: Arc<dyn ProfileStore>, repair: Arc<dyn ProfileRepair>) -> Self {
        Self {
            profiles,
            repair,
            retry_attempts: 1,
            retry_backoff: Duration::from_millis(300),
        }
    }

    pub fn with_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_backoff = backoff;
        self
    }

    pub fn profiles(&self) -> &Arc<dyn ProfileStore> {
        &self.profiles
    }

    /// `Ok(None)` when the row is still absent after repair.
    pub async fn resolve(&self, session: &Session) -> Result<Option<Profile>> {
        let user_id = session.user_id();

        if let Some(profile) = self.profiles.fetch_profile(session).await? {
            return Ok(Some(profile));
        }

        info!("No profile for {}, requesting repair", user_id);
        let outcome = self.repair.ensure_profile(session).await?;

        if let Some(message) = outcome.error {
            return Err(Error::repair(message));
        }
        if let Some(profile) = outcome.profile {
            debug!("Repair returned the profile for {}", user_id);
            return Ok(Some(profile));
        }
        if !outcome.exists {
            warn!("Repair reported no profile for {}", user_id);
            return Ok(None);
        }

        // The row exists but is not readable yet.
        for attempt in 1..=self.retry_attempts {
            sleep(self.retry_backoff * attempt).await;
            debug!("Profile re-read {} for {}", attempt, user_id);
            if let Some(profile) = self.profiles.fetch_profile(session).await? {
                return Ok(Some(profile));
            }
        }

        warn!(
            "Profile for {} still unreadable after {} re-read(s)",
            user_id, self.retry_attempts
        );
        Ok(None)
    }

    /// Marks the profile as loading for `session`, resolves it and applies the
    /// result. Nothing awaits between applying and returning.
    pub async fn hydrate(&self, state: &SharedState, session: Session) -> Hydration {
        let user_id = session.user_id().to_string();
        state.update(|s| s.begin_profile(session.clone()));

        let result = self.resolve(&session).await;
        if let Err(e) = &result {
            warn!("Profile resolution for {} failed: {}", user_id, e);
        }

        let applied = state
            .update(|s| s.apply_resolution(&user_id, &result))
            .unwrap_or(false);
        Hydration { applied, result }
    }
}

/// Establishes the initial session and profile of a mounted context.
pub struct SessionBootstrap {
    provider: ProviderHandle,
    resolver: ProfileResolver,
    state: SharedState,
    deadline: Duration,
    settled: AtomicBool,
}

impl SessionBootstrap {
    pub fn new(
        provider: ProviderHandle,
        resolver: ProfileResolver,
        state: SharedState,
        deadline: Duration,
    ) -> Self {
        Self {
            provider,
            resolver,
            state,
            deadline,
            settled: AtomicBool::new(false),
        }
    }

    /// Runs one bootstrap cycle. Loading ends exactly once: when resolution
    /// finishes or when the deadline passes, whichever is first. Resolution
    /// keeps going after the deadline and may still fill in the profile.
    pub async fn run(&self) {
        let work = AssertUnwindSafe(self.resolve_initial()).catch_unwind();
        tokio::pin!(work);

        let outcome = tokio::select! {
            outcome = &mut work => outcome,
            _ = sleep(self.deadline) => {
                warn!("Bootstrap deadline of {:?} passed, no longer loading", self.deadline);
                self.settle();
                work.await
            }
        };

        if outcome.is_err() {
            error!("Session bootstrap panicked");
            self.state.update(|s| {
                if s.profile_status == ProfileStatus::Loading {
                    s.profile_status = ProfileStatus::Failed;
                }
            });
        }
        self.settle();
    }

    async fn resolve_initial(&self) {
        let session = match self.provider.get().get_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!("Reading the initial session failed: {}", e);
                None
            }
        };

        let session = match session {
            Some(session) => session,
            None => {
                debug!("No initial session");
                return;
            }
        };

        info!("Initial session for {}", session.user_id());
        self.resolver.hydrate(&self.state, session).await;
    }

    fn settle(&self) {
        if self.settled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.state.update(|s| {
            s.is_loading = false;
            s.has_handled_initial_session = true;
        });
    }
}
