#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use castgate::auth::{AuthProvider, ProviderHandle};
use castgate::auth_client::{
    AuthChangeEvent, AuthError, AuthSubscription, ResendType, Session, SessionStore,
    SignUpOptions, SignUpResponse, User, UserAttributes,
};
use castgate::config::GateOptions;
use castgate::context::{AuthContext, GateDeps};
use castgate::error::{Error, Result};
use castgate::navigation::MemoryNavigator;
use castgate::profile::{
    Profile, ProfileRepair, ProfileStore, ProfileUpdate, RepairOutcome, UserRole,
};
use castgate::routes::RouteTable;
use castgate::state::AuthState;

pub fn init_logger() {
    let _ = pretty_env_logger::try_init();
}

pub fn session_for(id: &str) -> Session {
    session_with_token(id, &format!("token-{}", id))
}

pub fn session_with_token(id: &str, token: &str) -> Session {
    serde_json::from_value(json!({
        "access_token": token,
        "refresh_token": format!("refresh-{}", id),
        "expires_in": 3600,
        "expires_at": 4_102_444_800i64,
        "token_type": "bearer",
        "user": {
            "id": id,
            "email": format!("{}@example.com", id),
            "email_confirmed_at": "2024-01-01T00:00:00Z"
        }
    }))
    .unwrap()
}

pub fn talent(id: &str, complete: bool) -> Profile {
    let mut profile = Profile::new(id);
    profile.role = Some(UserRole::Talent);
    profile.first_name = Some("Ada".into());
    profile.last_name = Some("Obi".into());
    if complete {
        profile.location = Some("Lagos".into());
    }
    profile
}

pub fn client(id: &str) -> Profile {
    let mut profile = Profile::new(id);
    profile.role = Some(UserRole::Client);
    profile.company_name = Some("Northlight Studios".into());
    profile
}

pub fn admin(id: &str) -> Profile {
    let mut profile = Profile::new(id);
    profile.role = Some(UserRole::Admin);
    profile
}

/// Auth provider over a shared session store, like a browser tab.
#[derive(Clone)]
pub struct FakeProvider {
    store: SessionStore,
    behavior: Arc<Mutex<Behavior>>,
    calls: Arc<Mutex<Vec<String>>>,
}

#[derive(Debug, Default, Clone)]
pub struct Behavior {
    pub fail_get_session: bool,
    pub hang_get_session: bool,
    pub fail_sign_out: bool,
}

impl FakeProvider {
    pub fn new(store: SessionStore) -> Self {
        Self {
            store,
            behavior: Arc::new(Mutex::new(Behavior::default())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn configure(&self, f: impl FnOnce(&mut Behavior)) {
        f(&mut self.behavior.lock().unwrap());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn behavior(&self) -> Behavior {
        self.behavior.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthProvider for FakeProvider {
    async fn get_session(&self) -> std::result::Result<Option<Session>, AuthError> {
        self.record("get_session".into());
        let behavior = self.behavior();
        if behavior.hang_get_session {
            std::future::pending::<()>().await;
        }
        if behavior.fail_get_session {
            return Err(AuthError::ApiError("connection refused".into()));
        }
        Ok(self.store.current())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> std::result::Result<Session, AuthError> {
        self.record(format!("sign_in:{}", email));
        if password == "wrong" {
            return Err(AuthError::AuthenticationError(
                "Invalid login credentials".into(),
            ));
        }
        let id = email.split('@').next().unwrap_or(email);
        let session = session_for(id);
        self.store
            .commit(AuthChangeEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        options: SignUpOptions,
    ) -> std::result::Result<SignUpResponse, AuthError> {
        self.record(format!(
            "sign_up:{}:{}",
            email,
            options.email_redirect_to.unwrap_or_default()
        ));
        let user: User = serde_json::from_value(json!({ "id": "new-user", "email": email }))
            .map_err(AuthError::from)?;
        Ok(SignUpResponse {
            user: Some(user),
            session: None,
        })
    }

    async fn sign_out(&self) -> std::result::Result<(), AuthError> {
        self.record("sign_out".into());
        self.store.commit(AuthChangeEvent::SignedOut, None);
        if self.behavior().fail_sign_out {
            return Err(AuthError::ApiError("logout endpoint unavailable".into()));
        }
        Ok(())
    }

    async fn update_user(&self, attributes: UserAttributes) -> std::result::Result<User, AuthError> {
        let session = self.store.current().ok_or(AuthError::MissingSession)?;
        let mut user = session.user.clone();
        if let Some(email) = attributes.email {
            user.email = Some(email);
        }
        self.store.commit(
            AuthChangeEvent::UserUpdated,
            Some(Session {
                user: user.clone(),
                ..session
            }),
        );
        Ok(user)
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> std::result::Result<(), AuthError> {
        self.record(format!("reset:{}:{}", email, redirect_to.unwrap_or_default()));
        Ok(())
    }

    async fn resend(
        &self,
        kind: ResendType,
        email: &str,
        _redirect_to: Option<&str>,
    ) -> std::result::Result<(), AuthError> {
        self.record(format!("resend:{:?}:{}", kind, email));
        Ok(())
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.store.subscribe()
    }
}

#[derive(Debug, Clone)]
pub enum StoreMode {
    Normal,
    Fail,
    Hang,
    Panic,
    Slow(Duration),
}

/// Profiles table kept in memory.
#[derive(Clone)]
pub struct FakeProfiles {
    rows: Arc<Mutex<HashMap<String, Profile>>>,
    mode: Arc<Mutex<StoreMode>>,
    hidden_reads: Arc<AtomicUsize>,
    fetches: Arc<AtomicUsize>,
}

impl FakeProfiles {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(Mutex::new(HashMap::new())),
            mode: Arc::new(Mutex::new(StoreMode::Normal)),
            hidden_reads: Arc::new(AtomicUsize::new(0)),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn insert(&self, profile: Profile) {
        self.rows.lock().unwrap().insert(profile.id.clone(), profile);
    }

    pub fn remove(&self, id: &str) {
        self.rows.lock().unwrap().remove(id);
    }

    pub fn get(&self, id: &str) -> Option<Profile> {
        self.rows.lock().unwrap().get(id).cloned()
    }

    pub fn set_mode(&self, mode: StoreMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// The next `n` reads of an existing row come back empty.
    pub fn hide_reads(&self, n: usize) {
        self.hidden_reads.store(n, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileStore for FakeProfiles {
    async fn fetch_profile(&self, session: &Session) -> Result<Option<Profile>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let mode = self.mode.lock().unwrap().clone();
        match mode {
            StoreMode::Normal => {}
            StoreMode::Fail => return Err(Error::general("connection reset by peer")),
            StoreMode::Hang => std::future::pending::<()>().await,
            StoreMode::Panic => panic!("profile store exploded"),
            StoreMode::Slow(delay) => tokio::time::sleep(delay).await,
        }

        let row = self.get(session.user_id());
        if row.is_some()
            && self
                .hidden_reads
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Ok(None);
        }
        Ok(row)
    }

    async fn update_profile(
        &self,
        session: &Session,
        update: &ProfileUpdate,
    ) -> Result<Option<Profile>> {
        let mut rows = self.rows.lock().unwrap();
        Ok(rows.get_mut(session.user_id()).map(|row| {
            update.apply_to(row);
            row.clone()
        }))
    }
}

#[derive(Debug, Clone)]
pub enum RepairMode {
    /// Creates the row and returns it.
    Create,
    /// Creates the row but only reports that it exists.
    CreateSilently,
    Fail(String),
    /// Neither creates nor finds anything.
    Nothing,
}

/// The ensure-profile action, writing into a [`FakeProfiles`].
#[derive(Clone)]
pub struct FakeRepair {
    profiles: FakeProfiles,
    mode: Arc<Mutex<RepairMode>>,
    templates: Arc<Mutex<HashMap<String, Profile>>>,
    calls: Arc<AtomicUsize>,
}

impl FakeRepair {
    pub fn new(profiles: FakeProfiles) -> Self {
        Self {
            profiles,
            mode: Arc::new(Mutex::new(RepairMode::Create)),
            templates: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_mode(&self, mode: RepairMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// The row created for `profile.id`, standing in for sign-up metadata.
    pub fn template(&self, profile: Profile) {
        self.templates
            .lock()
            .unwrap()
            .insert(profile.id.clone(), profile);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn create(&self, id: &str) -> Profile {
        if let Some(existing) = self.profiles.get(id) {
            return existing;
        }
        let row = self
            .templates
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_else(|| Profile::new(id));
        self.profiles.insert(row.clone());
        row
    }
}

#[async_trait]
impl ProfileRepair for FakeRepair {
    async fn ensure_profile(&self, session: &Session) -> Result<RepairOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mode = self.mode.lock().unwrap().clone();
        Ok(match mode {
            RepairMode::Create => RepairOutcome::created(self.create(session.user_id())),
            RepairMode::CreateSilently => {
                self.create(session.user_id());
                RepairOutcome::exists_without_profile()
            }
            RepairMode::Fail(message) => RepairOutcome::failed(&message),
            RepairMode::Nothing => RepairOutcome::default(),
        })
    }
}

pub fn fast_options() -> GateOptions {
    GateOptions::default()
        .with_bootstrap_deadline(Duration::from_secs(10))
        .with_profile_retry(1, Duration::from_millis(10))
        .with_email_redirect_to(Some("https://app.example.com/auth/callback"))
        .with_password_reset_redirect_to(Some("https://app.example.com/update-password"))
}

/// One browser with any number of tabs sharing its session storage.
pub struct Browser {
    pub store: SessionStore,
    pub provider: FakeProvider,
    pub profiles: FakeProfiles,
    pub repair: FakeRepair,
    pub builds: Arc<AtomicUsize>,
}

impl Browser {
    pub fn new() -> Self {
        init_logger();
        let store = SessionStore::new();
        let profiles = FakeProfiles::new();
        Self {
            provider: FakeProvider::new(store.clone()),
            repair: FakeRepair::new(profiles.clone()),
            profiles,
            store,
            builds: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A user signed in before the page loaded.
    pub fn signed_in(id: &str, profile: Option<Profile>) -> Self {
        let browser = Self::new();
        browser
            .store
            .commit(AuthChangeEvent::SignedIn, Some(session_for(id)));
        if let Some(profile) = profile {
            browser.profiles.insert(profile);
        }
        browser
    }

    pub fn handle(&self) -> ProviderHandle {
        let provider = self.provider.clone();
        let builds = self.builds.clone();
        ProviderHandle::new(move || {
            builds.fetch_add(1, Ordering::SeqCst);
            Arc::new(provider.clone()) as Arc<dyn AuthProvider>
        })
    }

    pub fn deps(&self, options: GateOptions) -> GateDeps {
        GateDeps {
            provider: self.handle(),
            profiles: Arc::new(self.profiles.clone()),
            repair: Arc::new(self.repair.clone()),
            routes: RouteTable::default(),
            options,
        }
    }

    pub fn open_tab(&self, path: &str) -> (AuthContext, MemoryNavigator) {
        self.open_tab_with(path, fast_options())
    }

    pub fn open_tab_with(&self, path: &str, options: GateOptions) -> (AuthContext, MemoryNavigator) {
        let navigator = MemoryNavigator::new(path);
        let context = AuthContext::mount(self.deps(options), Arc::new(navigator.clone()));
        (context, navigator)
    }
}

pub async fn within(
    context: &AuthContext,
    predicate: impl FnMut(&AuthState) -> bool,
) -> AuthState {
    tokio::time::timeout(Duration::from_secs(30), context.wait_for(predicate))
        .await
        .expect("state never matched")
        .unwrap()
}

/// Lets spawned tasks drain their queues.
pub async fn flush() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
