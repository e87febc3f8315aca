//! Wire types for the auth API

use chrono::Utc;
use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::AuthError;

/// Seconds before the real expiry at which a session is treated as expired.
pub const EXPIRY_MARGIN_SECS: i64 = 10;

/// ユーザー情報
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Set once the user has followed the confirmation link.
    #[serde(default)]
    pub email_confirmed_at: Option<String>,
    #[serde(default)]
    pub last_sign_in_at: Option<String>,
    #[serde(default)]
    pub app_metadata: serde_json::Value,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl User {
    pub fn is_email_confirmed(&self) -> bool {
        self.email_confirmed_at
            .as_deref()
            .map_or(false, |at| !at.trim().is_empty())
    }
}

/// セッション情報
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    /// Unix timestamp, seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub token_type: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
struct AccessClaims {
    #[serde(default)]
    exp: Option<i64>,
}

impl Session {
    /// Subject identity of the session.
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    /// Absolute expiry, falling back to the `exp` claim of the access token.
    pub fn expiry(&self) -> Option<i64> {
        match self.expires_at {
            Some(at) => Some(at),
            None => decode_expiry(&self.access_token).ok().flatten(),
        }
    }

    pub fn is_expired(&self) -> bool {
        match self.expiry() {
            Some(at) => Utc::now().timestamp() + EXPIRY_MARGIN_SECS >= at,
            None => false,
        }
    }

    /// Fills in `expires_at` from `expires_in` when the server omitted it.
    pub(crate) fn stamped(mut self) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = decode_expiry(&self.access_token)
                .ok()
                .flatten()
                .or_else(|| Some(Utc::now().timestamp() + self.expires_in));
        }
        self
    }
}

/// Reads `exp` from an access token without verifying its signature; the
/// signing secret never reaches the client.
pub fn decode_expiry(access_token: &str) -> Result<Option<i64>, AuthError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = jsonwebtoken::decode::<AccessClaims>(
        access_token,
        &DecodingKey::from_secret(&[]),
        &validation,
    )
    .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    Ok(data.claims.exp)
}

/// クライアントオプション
#[derive(Debug, Clone)]
pub struct AuthOptions {
    /// Refresh an expired session transparently in `get_session`.
    pub auto_refresh_token: bool,
    /// Sent as `X-Client-Info` on every request.
    pub client_info: String,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            auto_refresh_token: true,
            client_info: concat!("castgate-auth/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Extra data attached to a sign-up request.
#[derive(Debug, Clone, Default)]
pub struct SignUpOptions {
    /// Stored as the user's `user_metadata`.
    pub data: Option<serde_json::Value>,
    /// Where the confirmation link should land.
    pub email_redirect_to: Option<String>,
}

/// Sign-up yields a session only when email confirmation is disabled.
#[derive(Debug, Clone)]
pub struct SignUpResponse {
    pub user: Option<User>,
    pub session: Option<Session>,
}

/// User attributes that can be updated
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Which email to send again through `resend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResendType {
    Signup,
    EmailChange,
}
