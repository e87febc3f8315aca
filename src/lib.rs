//! castgate
//!
//! Client session layer of a talent marketplace built on a Supabase-style
//! backend: it establishes the session and profile on mount, keeps them in
//! sync with auth events pushed by the provider, and routes every user to the
//! one page that fits their role.

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod context;
pub mod error;
pub mod fetch;
pub mod navigation;
pub mod profile;
pub mod reactor;
pub mod router;
pub mod routes;
pub mod state;

use std::sync::Arc;

use log::debug;
use reqwest::Client;

use castgate_auth::{Auth, AuthOptions, SessionStore};

use crate::auth::{AuthProvider, ProviderHandle};
use crate::config::{GateOptions, ProjectConfig};
use crate::context::{AuthContext, GateDeps};
use crate::error::Result;
use crate::navigation::Navigator;
use crate::profile::{HttpProfileRepair, PostgrestProfileStore};
use crate::routes::RouteTable;

pub use castgate_auth as auth_client;
pub use castgate_postgrest as postgrest;

/// Entry point: one backend project plus the session storage shared by every
/// context built from it.
#[derive(Clone)]
pub struct CastGate {
    config: ProjectConfig,
    http_client: Client,
    options: GateOptions,
    store: SessionStore,
}

impl CastGate {
    pub fn new(config: ProjectConfig, options: GateOptions) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        Ok(Self {
            config,
            http_client,
            options,
            store: SessionStore::new(),
        })
    }

    /// Configuration from `SUPABASE_URL` and `SUPABASE_ANON_KEY`.
    pub fn from_env(options: GateOptions) -> Result<Self> {
        Self::new(ProjectConfig::from_env()?, options)
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn options(&self) -> &GateOptions {
        &self.options
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// A fresh auth client over the shared session storage.
    pub fn auth(&self) -> Auth {
        Auth::with_store(
            &self.config.base_url(),
            &self.config.anon_key,
            self.http_client.clone(),
            AuthOptions {
                auto_refresh_token: self.options.auto_refresh_token,
                ..AuthOptions::default()
            },
            self.store.clone(),
        )
    }

    /// Provider handle that builds a new auth client after every reset.
    pub fn provider(&self) -> ProviderHandle {
        let gate = self.clone();
        ProviderHandle::new(move || {
            debug!("Creating auth client for {}", gate.config.base_url());
            Arc::new(gate.auth()) as Arc<dyn AuthProvider>
        })
    }

    pub fn profiles(&self) -> PostgrestProfileStore {
        PostgrestProfileStore::new(
            &self.config.base_url(),
            &self.config.anon_key,
            &self.options.profiles_table,
            &self.options.profile_columns,
            self.http_client.clone(),
        )
    }

    pub fn repair(&self) -> HttpProfileRepair {
        HttpProfileRepair::new(
            &self.config.base_url(),
            &self.options.repair_path,
            &self.config.anon_key,
            self.http_client.clone(),
        )
    }

    pub fn deps(&self) -> GateDeps {
        GateDeps {
            provider: self.provider(),
            profiles: Arc::new(self.profiles()),
            repair: Arc::new(self.repair()),
            routes: RouteTable::default(),
            options: self.options.clone(),
        }
    }

    /// Mounts a context, the equivalent of opening one tab.
    pub fn mount(&self, navigator: Arc<dyn Navigator>) -> AuthContext {
        AuthContext::mount(self.deps(), navigator)
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::auth::{AuthProvider, ProviderHandle};
    pub use crate::config::{GateOptions, ProjectConfig};
    pub use crate::context::{AuthContext, GateDeps};
    pub use crate::error::Error;
    pub use crate::navigation::{MemoryNavigator, Navigator};
    pub use crate::profile::{Profile, ProfileUpdate, UserRole};
    pub use crate::router::{BootTerminal, GateDecision, RoleRouter};
    pub use crate::state::{AuthState, ProfileStatus};
    pub use crate::CastGate;
}
