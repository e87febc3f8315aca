//! The auth provider as seen by the session layer
//!
//! [`AuthProvider`] is the seam between the session layer and the auth SDK;
//! tests substitute their own implementation. [`ProviderHandle`] owns the
//! current provider instance and can rebuild it after sign-out.

mod handle;

use async_trait::async_trait;

use castgate_auth::{
    Auth, AuthError, AuthSubscription, ResendType, Session, SignUpOptions, SignUpResponse, User,
    UserAttributes,
};

pub use handle::{ProviderFactory, ProviderHandle};

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;

    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> Result<Session, AuthError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        options: SignUpOptions,
    ) -> Result<SignUpResponse, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    async fn update_user(&self, attributes: UserAttributes) -> Result<User, AuthError>;

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), AuthError>;

    async fn resend(
        &self,
        kind: ResendType,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), AuthError>;

    /// Subscription to auth changes. It must outlive a provider reset, so
    /// implementations hand out subscriptions on storage shared across
    /// instances.
    fn on_auth_state_change(&self) -> AuthSubscription;
}

#[async_trait]
impl AuthProvider for Auth {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        Auth::get_session(self).await
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        Auth::sign_in_with_password(self, email, password).await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        options: SignUpOptions,
    ) -> Result<SignUpResponse, AuthError> {
        Auth::sign_up(self, email, password, options).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        Auth::sign_out(self).await
    }

    async fn update_user(&self, attributes: UserAttributes) -> Result<User, AuthError> {
        Auth::update_user(self, attributes).await
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), AuthError> {
        Auth::reset_password_for_email(self, email, redirect_to).await
    }

    async fn resend(
        &self,
        kind: ResendType,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), AuthError> {
        Auth::resend(self, kind, email, redirect_to).await
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        Auth::on_auth_state_change(self)
    }
}
