//! Auth provider client for castgate
//!
//! A GoTrue REST client: password sign-in and sign-up, sign-out, token
//! refresh, user updates and recovery emails. Sessions live in a
//! [`SessionStore`] that several clients may share, and every state change is
//! broadcast to the subscriptions handed out by
//! [`Auth::on_auth_state_change`].

mod store;
mod types;

use log::{debug, info, warn};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;

pub use store::{AuthChange, AuthChangeEvent, AuthSubscription, SessionStore};
pub use types::{
    decode_expiry, AuthOptions, ResendType, Session, SignUpOptions, SignUpResponse, User,
    UserAttributes, EXPIRY_MARGIN_SECS,
};

/// エラー型
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing session")]
    MissingSession,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// Error body shapes GoTrue uses across versions.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiErrorBody {
    fn into_message(self, fallback: String) -> String {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
            .unwrap_or(fallback)
    }
}

async fn ensure_success(response: Response) -> Result<Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&text)
        .unwrap_or_default()
        .into_message(if text.is_empty() {
            status.to_string()
        } else {
            text
        });

    Err(match status {
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AuthError::AuthenticationError(message)
        }
        StatusCode::TOO_MANY_REQUESTS => AuthError::RateLimited(message),
        _ => AuthError::ApiError(message),
    })
}

fn with_redirect(url: String, redirect_to: Option<&str>) -> String {
    match redirect_to {
        Some(target) => format!("{}?redirect_to={}", url, urlencoding::encode(target)),
        None => url,
    }
}

/// Auth クライアント
#[derive(Clone)]
pub struct Auth {
    url: String,
    key: String,
    http_client: Client,
    options: AuthOptions,
    store: SessionStore,
}

impl Auth {
    /// Client with a private session store.
    pub fn new(url: &str, key: &str, http_client: Client, options: AuthOptions) -> Self {
        Self::with_store(url, key, http_client, options, SessionStore::new())
    }

    /// Client over a store shared with other clients.
    pub fn with_store(
        url: &str,
        key: &str,
        http_client: Client,
        options: AuthOptions,
        store: SessionStore,
    ) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            http_client,
            options,
            store,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.url, path)
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.http_client
            .post(url)
            .header("apikey", &self.key)
            .header("X-Client-Info", &self.options.client_info)
    }

    fn access_token(&self) -> Result<String, AuthError> {
        self.store
            .current()
            .map(|session| session.access_token)
            .ok_or(AuthError::MissingSession)
    }

    /// Stored session, refreshed first when it has expired and
    /// `auto_refresh_token` is on.
    pub async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let session = match self.store.current() {
            Some(session) => session,
            None => return Ok(None),
        };

        if !session.is_expired() {
            return Ok(Some(session));
        }

        if self.options.auto_refresh_token {
            debug!("Stored session for {} expired, refreshing", session.user.id);
            self.refresh_session().await.map(Some)
        } else {
            Ok(None)
        }
    }

    /// メール・パスワードでログイン
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let url = self.auth_url("/token?grant_type=password");

        let response = self
            .post(&url)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await?;

        let session = ensure_success(response)
            .await?
            .json::<Session>()
            .await?
            .stamped();

        info!("Signed in as {}", session.user.id);
        self.store
            .commit(AuthChangeEvent::SignedIn, Some(session.clone()));

        Ok(session)
    }

    /// ユーザー登録
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        options: SignUpOptions,
    ) -> Result<SignUpResponse, AuthError> {
        let url = with_redirect(
            self.auth_url("/signup"),
            options.email_redirect_to.as_deref(),
        );

        let mut payload = serde_json::json!({
            "email": email,
            "password": password,
        });
        if let Some(data) = options.data {
            payload["data"] = data;
        }

        let response = self.post(&url).json(&payload).send().await?;
        let body = ensure_success(response)
            .await?
            .json::<serde_json::Value>()
            .await?;

        // A body with tokens is a session; otherwise confirmation is pending
        // and the body is the bare user.
        if body.get("access_token").is_some() {
            let session = serde_json::from_value::<Session>(body)?.stamped();
            info!("Signed up and signed in as {}", session.user.id);
            self.store
                .commit(AuthChangeEvent::SignedIn, Some(session.clone()));
            Ok(SignUpResponse {
                user: Some(session.user.clone()),
                session: Some(session),
            })
        } else {
            let user = serde_json::from_value::<User>(body)?;
            info!("Signed up {}, awaiting email confirmation", user.id);
            Ok(SignUpResponse {
                user: Some(user),
                session: None,
            })
        }
    }

    /// Clears the stored session and broadcasts `SignedOut` whatever the
    /// server answers; a failed remote logout is reported afterwards.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let remote = match self.store.current() {
            Some(session) => {
                let url = self.auth_url("/logout");
                match self
                    .post(&url)
                    .bearer_auth(&session.access_token)
                    .send()
                    .await
                {
                    Ok(response) => ensure_success(response).await.map(|_| ()),
                    Err(e) => Err(AuthError::from(e)),
                }
            }
            None => Ok(()),
        };

        if let Err(e) = &remote {
            warn!("Remote sign-out failed, clearing local session anyway: {}", e);
        }

        self.store.commit(AuthChangeEvent::SignedOut, None);
        remote
    }

    /// セッションをリフレッシュ
    pub async fn refresh_session(&self) -> Result<Session, AuthError> {
        let current = self.store.current().ok_or(AuthError::MissingSession)?;
        let url = self.auth_url("/token?grant_type=refresh_token");

        let response = self
            .post(&url)
            .json(&serde_json::json!({
                "refresh_token": current.refresh_token,
            }))
            .send()
            .await?;

        let session = match ensure_success(response).await {
            Ok(response) => response.json::<Session>().await?.stamped(),
            Err(AuthError::AuthenticationError(message)) => {
                // The refresh token was revoked; the session cannot recover.
                warn!("Refresh rejected for {}: {}", current.user.id, message);
                self.store.commit(AuthChangeEvent::SignedOut, None);
                return Err(AuthError::AuthenticationError(message));
            }
            Err(e) => return Err(e),
        };

        debug!("Refreshed session for {}", session.user.id);
        self.store
            .commit(AuthChangeEvent::TokenRefreshed, Some(session.clone()));

        Ok(session)
    }

    /// 現在のユーザーを取得
    pub async fn get_user(&self) -> Result<User, AuthError> {
        let token = self.access_token()?;
        let url = self.auth_url("/user");

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.key)
            .header("X-Client-Info", &self.options.client_info)
            .bearer_auth(&token)
            .send()
            .await?;

        Ok(ensure_success(response).await?.json::<User>().await?)
    }

    /// Updates the signed-in user and broadcasts `UserUpdated`.
    pub async fn update_user(&self, attributes: UserAttributes) -> Result<User, AuthError> {
        let session = self.store.current().ok_or(AuthError::MissingSession)?;
        let url = self.auth_url("/user");

        let response = self
            .http_client
            .put(&url)
            .header("apikey", &self.key)
            .header("X-Client-Info", &self.options.client_info)
            .bearer_auth(&session.access_token)
            .json(&attributes)
            .send()
            .await?;

        let user = ensure_success(response).await?.json::<User>().await?;

        let updated = Session {
            user: user.clone(),
            ..session
        };
        self.store
            .commit(AuthChangeEvent::UserUpdated, Some(updated));

        Ok(user)
    }

    /// パスワードリセットメールの送信
    pub async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), AuthError> {
        let url = with_redirect(self.auth_url("/recover"), redirect_to);

        let response = self
            .post(&url)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }

    /// Sends the confirmation (or email-change) message again.
    pub async fn resend(
        &self,
        kind: ResendType,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), AuthError> {
        let url = with_redirect(self.auth_url("/resend"), redirect_to);

        let response = self
            .post(&url)
            .json(&serde_json::json!({
                "type": kind,
                "email": email,
            }))
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }

    /// Subscribes to every auth change on this client's store.
    pub fn on_auth_state_change(&self) -> AuthSubscription {
        self.store.subscribe()
    }
}
