//! Error handling for castgate

use std::fmt;
use thiserror::Error;

use castgate_auth::AuthError;
use castgate_postgrest::PostgrestError;

/// Unified error type for the session layer
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Errors reported by the auth provider
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Profile store query errors
    #[error("Database error: {0}")]
    Database(#[from] PostgrestError),

    /// The profile store answered, but not with a usable profile
    #[error("Profile error: {0}")]
    Profile(String),

    /// The profile repair action failed
    #[error("Profile repair error: {0}")]
    Repair(String),

    /// An operation needed a signed-in user and there was none
    #[error("Session error: {0}")]
    Session(String),

    /// Submitted data was rejected before reaching the backend
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// General errors
    #[error("{0}")]
    General(String),
}

impl Error {
    pub fn profile<T: fmt::Display>(msg: T) -> Self {
        Error::Profile(msg.to_string())
    }

    pub fn repair<T: fmt::Display>(msg: T) -> Self {
        Error::Repair(msg.to_string())
    }

    pub fn session<T: fmt::Display>(msg: T) -> Self {
        Error::Session(msg.to_string())
    }

    pub fn validation<T: fmt::Display>(msg: T) -> Self {
        Error::Validation(msg.to_string())
    }

    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    pub fn general<T: fmt::Display>(msg: T) -> Self {
        Error::General(msg.to_string())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
