//! Configuration for the session layer

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// Where the backend lives.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub url: Url,
    pub anon_key: String,
}

impl ProjectConfig {
    /// Creates a new configuration, validating the URL and key.
    pub fn new(url: &str, anon_key: &str) -> Result<Self> {
        let url = Url::parse(url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "unsupported URL scheme: {}",
                url.scheme()
            )));
        }
        if anon_key.trim().is_empty() {
            return Err(Error::config("anon_key cannot be empty"));
        }
        Ok(Self {
            url,
            anon_key: anon_key.to_string(),
        })
    }

    /// Reads `SUPABASE_URL` and `SUPABASE_ANON_KEY`.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("SUPABASE_URL")
            .map_err(|_| Error::config("SUPABASE_URL environment variable not found"))?;
        let anon_key = std::env::var("SUPABASE_ANON_KEY")
            .map_err(|_| Error::config("SUPABASE_ANON_KEY environment variable not found"))?;
        Self::new(&url, &anon_key)
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> String {
        self.url.as_str().trim_end_matches('/').to_string()
    }
}

/// Tunables for session bootstrap, profile resolution and the HTTP clients.
#[derive(Debug, Clone)]
pub struct GateOptions {
    /// Whether to refresh an expired stored session on read
    pub auto_refresh_token: bool,

    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// Upper bound on how long the bootstrap may keep `is_loading` set
    pub bootstrap_deadline: Duration,

    /// Profile re-reads after the repair action reports the row exists
    pub profile_retry_attempts: u32,

    /// Delay before the first re-read, growing linearly per attempt
    pub profile_retry_backoff: Duration,

    /// The profiles table
    pub profiles_table: String,

    /// Columns selected from the profiles table
    pub profile_columns: String,

    /// Path of the profile repair endpoint, relative to the project URL
    pub repair_path: String,

    /// Landing page for confirmation emails
    pub email_redirect_to: Option<String>,

    /// Landing page for password reset emails
    pub password_reset_redirect_to: Option<String>,
}

impl Default for GateOptions {
    fn default() -> Self {
        Self {
            auto_refresh_token: true,
            request_timeout: Some(Duration::from_secs(30)),
            bootstrap_deadline: Duration::from_secs(10),
            profile_retry_attempts: 1,
            profile_retry_backoff: Duration::from_millis(300),
            profiles_table: "profiles".to_string(),
            profile_columns: "*".to_string(),
            repair_path: "/functions/v1/ensure-profile".to_string(),
            email_redirect_to: None,
            password_reset_redirect_to: None,
        }
    }
}

impl GateOptions {
    pub fn with_auto_refresh_token(mut self, value: bool) -> Self {
        self.auto_refresh_token = value;
        self
    }

    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    pub fn with_bootstrap_deadline(mut self, value: Duration) -> Self {
        self.bootstrap_deadline = value;
        self
    }

    pub fn with_profile_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.profile_retry_attempts = attempts;
        self.profile_retry_backoff = backoff;
        self
    }

    pub fn with_profiles_table(mut self, value: &str) -> Self {
        self.profiles_table = value.to_string();
        self
    }

    pub fn with_profile_columns(mut self, value: &str) -> Self {
        self.profile_columns = value.to_string();
        self
    }

    pub fn with_repair_path(mut self, value: &str) -> Self {
        self.repair_path = value.to_string();
        self
    }

    pub fn with_email_redirect_to(mut self, value: Option<&str>) -> Self {
        self.email_redirect_to = value.map(str::to_string);
        self
    }

    pub fn with_password_reset_redirect_to(mut self, value: Option<&str>) -> Self {
        self.password_reset_redirect_to = value.map(str::to_string);
        self
    }
}
