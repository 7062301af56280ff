//! Client side of the register: a typed HTTP client, the signed-in
//! session and the register state a UI drives.

pub mod api;
pub mod register;

use reqwest::StatusCode;

use crate::domain::access::Access;
use crate::domain::aggregates::User;

pub use api::ApiClient;
pub use register::Register;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport failure or timeout; safe to retry.
    #[error("network error: {0}")]
    Network(String),
    /// The token was refused; the session is gone.
    #[error("session expired")]
    Unauthorized,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("a request is already in progress")]
    Busy,
    #[error("not signed in")]
    NotSignedIn,
}

impl ClientError {
    pub fn is_retryable(&self) -> bool { matches!(self, Self::Network(_)) }

    /// One line for the cashier.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Could not reach the server. Check the connection and try again.".to_string(),
            Self::Unauthorized | Self::NotSignedIn => "Your session has ended. Please sign in again.".to_string(),
            Self::Forbidden(_) => "You do not have permission to do that.".to_string(),
            Self::Api { message, .. } | Self::Validation(message) => message.clone(),
            Self::Busy => "Please wait, the previous request is still being processed.".to_string(),
        }
    }

    pub(crate) fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::FORBIDDEN => Self::Forbidden(message),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Self::Validation(message),
            _ => Self::Api { status: status.as_u16(), message },
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self { Self::Network(err.to_string()) }
}

/// A signed-in user and their token. Never mutated; signing in again
/// produces a new one.
#[derive(Debug, Clone)]
pub struct Session {
    token: String,
    user: User,
}

impl Session {
    pub fn new(token: String, user: User) -> Self { Self { token, user } }
    pub fn token(&self) -> &str { &self.token }
    pub fn user(&self) -> &User { &self.user }
    pub fn access(&self) -> Access { Access::for_role(self.user.role) }
}
